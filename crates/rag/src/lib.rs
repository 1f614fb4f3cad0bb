//! Retrieval-augmented answers and conversation context.
//!
//! - [`history`] builds the ordered context handed to the completion provider:
//!   the tenant's system prompt followed by its most recent messages.
//! - [`retriever`] ranks a tenant's FAQ entries against a query by cosine
//!   distance.
//! - [`assembler`] turns retrieved entries into a grounded answer, or a
//!   deterministic fallback when nothing relevant is stored.

pub mod assembler;
pub mod error;
pub mod history;
pub mod retriever;

pub use assembler::{build_messages, fallback_answer, format_context, RagService};
pub use error::RagError;
pub use history::{assemble_history, history, DEFAULT_HISTORY_WINDOW};
pub use retriever::{embed_faq, faq_document, retrieve, DEFAULT_TOP_K};
