//! Lazily initialized provider handle.
//!
//! A slot is built at startup and handed to the components that need the
//! provider. The provider itself is only constructed on the first call to
//! [`ProviderSlot::get`]; a failed construction is not cached, so the next
//! call tries again.

use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::ProviderError;

type Factory<T> = Box<dyn Fn() -> Result<Arc<T>, ProviderError> + Send + Sync>;

/// A provider that is constructed on first use.
pub struct ProviderSlot<T: ?Sized> {
    label: &'static str,
    cell: OnceCell<Arc<T>>,
    factory: Factory<T>,
}

impl<T: ?Sized + Send + Sync + 'static> ProviderSlot<T> {
    /// Create a slot that builds its provider with `factory` on first use.
    pub fn lazy<F>(label: &'static str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<T>, ProviderError> + Send + Sync + 'static,
    {
        Self {
            label,
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// Create a slot holding an already constructed provider.
    pub fn ready(label: &'static str, provider: Arc<T>) -> Self {
        Self {
            label,
            cell: OnceCell::new_with(Some(provider.clone())),
            factory: Box::new(move || Ok(provider.clone())),
        }
    }

    /// Create a slot that never initializes, reporting `reason`.
    pub fn unavailable(label: &'static str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::lazy(label, move || Err(ProviderError::Unavailable(reason.clone())))
    }

    /// Get the provider, initializing it if needed.
    pub async fn get(&self) -> Result<Arc<T>, ProviderError> {
        let provider = self
            .cell
            .get_or_try_init(|| async {
                match (self.factory)() {
                    Ok(provider) => {
                        info!(provider = self.label, "Provider initialized");
                        Ok(provider)
                    }
                    Err(e) => {
                        warn!(provider = self.label, error = %e, "Provider initialization failed");
                        Err(e)
                    }
                }
            })
            .await?;

        Ok(Arc::clone(provider))
    }

    /// Whether the provider has been constructed.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// The label used in logs.
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl<T: ?Sized> fmt::Debug for ProviderSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("label", &self.label)
            .field("initialized", &self.cell.initialized())
            .finish()
    }
}
