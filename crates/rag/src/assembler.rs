//! RAG Response Assembler.
//!
//! Builds a grounded prompt from retrieved FAQ entries and hands it to the
//! completion provider. A query with no relevant entries gets a fixed fallback
//! answer without a provider call.

use std::fmt::Write as _;
use std::sync::Arc;

use database::{tenant, Database, DatabaseError, FaqMatch};
use provider_core::{ChatCompleter, ChatMessage, Embedder, ProviderSlot};
use tracing::{info, instrument};

use crate::error::RagError;
use crate::retriever::{retrieve, DEFAULT_TOP_K};

const FALLBACK_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Deterministic answer used when the knowledge base has nothing relevant.
pub fn fallback_answer(query: &str) -> String {
    format!("I couldn't find any information about \"{query}\" in the knowledge base.")
}

/// Render retrieved entries as a numbered context block.
pub fn format_context(matches: &[FaqMatch]) -> String {
    let mut context = String::from("Relevant information from knowledge base:\n");
    for (i, m) in matches.iter().enumerate() {
        let _ = writeln!(context, "{}. Question: {}\n   Answer: {}", i + 1, m.question, m.answer);
    }
    context
}

/// The messages sent to the completion provider for a grounded answer.
pub fn build_messages(system_prompt: &str, matches: &[FaqMatch], query: &str) -> Vec<ChatMessage> {
    let system_prompt = match system_prompt.trim() {
        "" => FALLBACK_SYSTEM_PROMPT,
        prompt => prompt,
    };

    vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(format!("{}\nUser question: {}", format_context(matches), query)),
    ]
}

/// Answers questions from a tenant's knowledge base.
#[derive(Debug, Clone)]
pub struct RagService {
    db: Database,
    embedder: Arc<ProviderSlot<dyn Embedder>>,
    completer: Arc<ProviderSlot<dyn ChatCompleter>>,
    top_k: usize,
}

impl RagService {
    pub fn new(
        db: Database,
        embedder: Arc<ProviderSlot<dyn Embedder>>,
        completer: Arc<ProviderSlot<dyn ChatCompleter>>,
    ) -> Self {
        Self {
            db,
            embedder,
            completer,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Override the number of retrieved entries.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `query` for a tenant using the given system prompt.
    ///
    /// Fails with [`RagError::Unavailable`] when a provider cannot be
    /// initialized and [`RagError::Upstream`] when a provider call fails.
    #[instrument(skip_all, fields(correlation_id = %correlation_id, tenant_id = %tenant_id))]
    pub async fn answer(
        &self,
        correlation_id: &str,
        tenant_id: &str,
        query: &str,
        system_prompt: &str,
    ) -> Result<String, RagError> {
        let embedder = self.embedder.get().await?;
        let matches = retrieve(
            self.db.pool(),
            Some(embedder.as_ref()),
            tenant_id,
            query,
            self.top_k,
        )
        .await?;

        if matches.is_empty() {
            info!("No relevant FAQ entries; returning fallback answer");
            return Ok(fallback_answer(query));
        }

        let completer = self.completer.get().await?;
        let messages = build_messages(system_prompt, &matches, query);
        let answer = completer.complete(&messages).await?;

        info!(hits = matches.len(), provider = completer.name(), "RAG answer generated");
        Ok(answer)
    }

    /// Look up the tenant and answer with its system prompt.
    pub async fn answer_for_tenant(
        &self,
        correlation_id: &str,
        tenant_id: &str,
        query: &str,
    ) -> Result<String, RagError> {
        let tenant = match tenant::get_tenant(self.db.pool(), tenant_id).await {
            Ok(tenant) => tenant,
            Err(DatabaseError::NotFound { .. }) => {
                return Err(RagError::TenantNotFound(tenant_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        self.answer(correlation_id, &tenant.id, query, &tenant.system_prompt)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{faq, NewTenant};
    use mock_provider::{EchoCompleter, FailingCompleter, HashedEmbedder};

    fn hit(id: i64, question: &str, answer: &str) -> FaqMatch {
        FaqMatch {
            id,
            question: question.to_string(),
            answer: answer.to_string(),
            distance: 0.1,
        }
    }

    async fn setup(with_faq: bool) -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        tenant::create_tenant(
            db.pool(),
            &NewTenant {
                id: "t1".to_string(),
                phone_id: "123".to_string(),
                wh_token: "token".to_string(),
                system_prompt: Some("You are the pizzeria bot.".to_string()),
            },
        )
        .await
        .unwrap();

        if with_faq {
            let embedder = HashedEmbedder::new(64);
            let (q, a) = ("When are you open?", "Daily from noon");
            let vector = embedder.embed_text(&crate::faq_document(q, a));
            faq::create_faq(db.pool(), "t1", q, a, Some(&vector)).await.unwrap();
        }
        db
    }

    fn service(
        db: Database,
        completer: Arc<dyn ChatCompleter>,
    ) -> RagService {
        RagService::new(
            db,
            Arc::new(ProviderSlot::ready(
                "embedder",
                Arc::new(HashedEmbedder::new(64)) as Arc<dyn Embedder>,
            )),
            Arc::new(ProviderSlot::ready("completer", completer)),
        )
    }

    #[test]
    fn test_format_context() {
        let context = format_context(&[hit(1, "Hours?", "9-5"), hit(2, "Card?", "Yes")]);
        assert_eq!(
            context,
            "Relevant information from knowledge base:\n\
             1. Question: Hours?\n   Answer: 9-5\n\
             2. Question: Card?\n   Answer: Yes\n"
        );
    }

    #[test]
    fn test_build_messages_defaults_system_prompt() {
        let messages = build_messages("  ", &[hit(1, "Hours?", "9-5")], "when open");
        assert_eq!(messages[0], ChatMessage::system("You are a helpful assistant."));
        assert!(messages[1].content.ends_with("\nUser question: when open"));
    }

    #[tokio::test]
    async fn test_answer_with_hits_calls_completer() {
        let db = setup(true).await;
        let completer = Arc::new(EchoCompleter::new());
        let rag = service(db, completer.clone());

        let answer = rag.answer_for_tenant("req-1", "t1", "when are you open").await.unwrap();
        assert!(answer.contains("Daily from noon"));

        let calls = completer.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], ChatMessage::system("You are the pizzeria bot."));
    }

    #[tokio::test]
    async fn test_empty_knowledge_base_returns_fallback() {
        let db = setup(false).await;
        let completer = Arc::new(EchoCompleter::new());
        let rag = service(db, completer.clone());

        let answer = rag.answer_for_tenant("req-1", "t1", "refund policy").await.unwrap();
        assert_eq!(
            answer,
            "I couldn't find any information about \"refund policy\" in the knowledge base."
        );
        assert!(completer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tenant() {
        let db = setup(false).await;
        let rag = service(db, Arc::new(EchoCompleter::new()));
        let err = rag.answer_for_tenant("req-1", "ghost", "hi").await.unwrap_err();
        assert!(matches!(err, RagError::TenantNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_unavailable_embedder() {
        let db = setup(true).await;
        let rag = RagService::new(
            db,
            Arc::new(ProviderSlot::unavailable("embedder", "OPENAI_API_KEY not set")),
            Arc::new(ProviderSlot::ready(
                "completer",
                Arc::new(EchoCompleter::new()) as Arc<dyn ChatCompleter>,
            )),
        );
        let err = rag.answer_for_tenant("req-1", "t1", "open?").await.unwrap_err();
        assert!(matches!(err, RagError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_failing_completer_is_upstream_error() {
        let db = setup(true).await;
        let rag = service(db, Arc::new(FailingCompleter::new()));
        let err = rag.answer_for_tenant("req-1", "t1", "when are you open").await.unwrap_err();
        assert!(matches!(err, RagError::Upstream(_)));
    }
}
