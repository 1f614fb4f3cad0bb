//! Queue worker that runs reply and FAQ import jobs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use database::{faq, message, task, tenant, Database, DatabaseError, InsertOutcome, NewMessage, Task};
use metrics::{counter, histogram};
use provider_core::{ChatCompleter, Embedder, ProviderSlot};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use whatsapp_client::MessageSender;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::jobs::{FaqImportJob, FaqImportReport, ReplyJob, FAQ_IMPORT_KIND, REPLY_KIND};

/// Result of processing a single claimed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// The job finished and the task was acknowledged.
    Succeeded { task_id: String, kind: String },
    /// The attempt failed and the task was rescheduled.
    Retrying {
        task_id: String,
        attempt: i64,
        delay: Duration,
        error: String,
    },
    /// The task failed terminally.
    Dead {
        task_id: String,
        attempt: i64,
        error: String,
    },
    /// Another worker took the task over after our lease expired.
    LeaseLost { task_id: String },
}

impl ProcessResult {
    /// Label used for the task outcome metric.
    pub fn status(&self) -> &'static str {
        match self {
            ProcessResult::Succeeded { .. } => "success",
            ProcessResult::Retrying { .. } => "retry",
            ProcessResult::Dead { .. } => "dead",
            ProcessResult::LeaseLost { .. } => "lease_lost",
        }
    }
}

/// Output of one reply job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    /// Id of the stored assistant message.
    pub message_id: Option<i64>,
    /// Id assigned by WhatsApp to the delivered message.
    pub whatsapp_message_id: Option<String>,
    pub text: String,
}

/// Claims tasks from the queue and runs them one at a time.
#[derive(Clone)]
pub struct ReplyWorker {
    db: Database,
    completer: Arc<ProviderSlot<dyn ChatCompleter>>,
    embedder: Arc<ProviderSlot<dyn Embedder>>,
    sender: Arc<dyn MessageSender>,
    config: WorkerConfig,
    worker_id: String,
}

fn decode<T: DeserializeOwned>(task: &Task) -> Result<T, WorkerError> {
    task.payload_as()
        .map_err(|e| WorkerError::InvalidPayload(e.to_string()))
}

fn is_lease_lost(e: &DatabaseError) -> bool {
    matches!(e, DatabaseError::NotFound { entity, .. } if *entity == "Running task")
}

impl ReplyWorker {
    pub fn new(
        db: Database,
        completer: Arc<ProviderSlot<dyn ChatCompleter>>,
        embedder: Arc<ProviderSlot<dyn Embedder>>,
        sender: Arc<dyn MessageSender>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            db,
            completer,
            embedder,
            sender,
            config,
            worker_id: format!("reply-worker-{}", Uuid::new_v4()),
        }
    }

    /// Replace the generated worker id.
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Claim and process the next ready task, if any.
    pub async fn run_once(&self) -> Result<Option<ProcessResult>, WorkerError> {
        let claimed = task::claim_next(
            self.db.pool(),
            &self.worker_id,
            Utc::now(),
            self.config.hard_time_limit,
        )
        .await?;

        match claimed {
            Some(task) => self.process_task(task).await.map(Some),
            None => Ok(None),
        }
    }

    /// Run a claimed task under the soft time limit and record the outcome.
    #[instrument(
        skip_all,
        fields(
            task_id = %task.id,
            kind = %task.kind,
            attempt = task.attempts,
            correlation_id = task.correlation_id.as_deref().unwrap_or("-"),
        )
    )]
    pub async fn process_task(&self, task: Task) -> Result<ProcessResult, WorkerError> {
        info!(worker_id = %self.worker_id, "Claimed task");
        counter!("worker_tasks_total", "task_name" => task.kind.clone(), "status" => "started")
            .increment(1);
        let started = Instant::now();

        let outcome = match timeout(self.config.soft_time_limit, self.execute(&task)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(WorkerError::TimedOut(self.config.soft_time_limit)),
        };

        let pool = self.db.pool();
        let recorded = match outcome {
            Ok(result) => task::mark_succeeded(pool, &task.id, &self.worker_id, result.as_ref())
                .await
                .map(|()| {
                    info!("Task succeeded");
                    ProcessResult::Succeeded {
                        task_id: task.id.clone(),
                        kind: task.kind.clone(),
                    }
                }),
            Err(err) if err.is_retryable() && task.can_retry() => {
                let delay = self.config.retry_delay(task.attempts, err.is_delivery());
                let error = err.to_string();
                task::mark_retry(pool, &task.id, &self.worker_id, &error, delay)
                    .await
                    .map(|()| {
                        warn!(error = %error, retry_in_secs = delay.as_secs(), "Task failed; scheduled retry");
                        ProcessResult::Retrying {
                            task_id: task.id.clone(),
                            attempt: task.attempts,
                            delay,
                            error,
                        }
                    })
            }
            Err(err) => {
                let error = err.to_string();
                task::mark_dead(pool, &task.id, &self.worker_id, &error)
                    .await
                    .map(|()| {
                        error!(error = %error, "Task failed; moved to dead letter");
                        ProcessResult::Dead {
                            task_id: task.id.clone(),
                            attempt: task.attempts,
                            error,
                        }
                    })
            }
        };

        let result = match recorded {
            Ok(result) => result,
            Err(e) if is_lease_lost(&e) => {
                warn!("Lease lost before the outcome could be recorded");
                ProcessResult::LeaseLost {
                    task_id: task.id.clone(),
                }
            }
            Err(e) => return Err(e.into()),
        };

        counter!("worker_tasks_total", "task_name" => task.kind.clone(), "status" => result.status())
            .increment(1);
        histogram!("worker_task_duration_seconds", "task_name" => task.kind)
            .record(started.elapsed().as_secs_f64());
        Ok(result)
    }

    async fn execute(&self, task: &Task) -> Result<Option<Value>, WorkerError> {
        match task.kind.as_str() {
            REPLY_KIND => {
                let job: ReplyJob = decode(task)?;
                let outcome = self.process_reply(&job).await?;
                Ok(Some(json!({
                    "message_id": outcome.message_id,
                    "whatsapp_message_id": outcome.whatsapp_message_id,
                })))
            }
            FAQ_IMPORT_KIND => {
                let job: FaqImportJob = decode(task)?;
                let report = self.import_faqs(&job).await?;
                let value = serde_json::to_value(report)
                    .map_err(|e| WorkerError::InvalidPayload(e.to_string()))?;
                Ok(Some(value))
            }
            other => Err(WorkerError::UnknownKind(other.to_string())),
        }
    }

    /// Generate, store, and deliver the reply for one inbound message.
    ///
    /// Every attempt runs all three steps. A reply stored by an earlier attempt
    /// whose delivery failed is stored again.
    pub async fn process_reply(&self, job: &ReplyJob) -> Result<ReplyOutcome, WorkerError> {
        let completer = self.completer.get().await?;
        let conversation = job.conversation();

        let started = Instant::now();
        let text = completer.complete(&conversation).await?;
        debug!(
            provider = completer.name(),
            turns = conversation.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Completion finished"
        );

        let stored = message::insert_message(
            self.db.pool(),
            &NewMessage::assistant(&job.tenant_id, &job.recipient, &text),
        )
        .await?;
        let message_id = match stored {
            InsertOutcome::Inserted(message) => Some(message.id),
            InsertOutcome::AlreadyExists => None,
        };

        let sent = self
            .sender
            .send_text(&job.phone_id, &job.wh_token, &job.recipient, &text)
            .await?;

        info!(
            tenant_id = %job.tenant_id,
            inbound_message_id = job.message_id,
            whatsapp_message_id = sent.message_id.as_deref().unwrap_or("-"),
            "Reply delivered"
        );

        Ok(ReplyOutcome {
            message_id,
            whatsapp_message_id: sent.message_id,
            text,
        })
    }

    /// Embed and store a batch of FAQ entries.
    ///
    /// Per-item failures are collected in the report. Entries already stored with
    /// the same question and answer count as imported, so a retried job does not
    /// duplicate them.
    pub async fn import_faqs(&self, job: &FaqImportJob) -> Result<FaqImportReport, WorkerError> {
        let pool = self.db.pool();
        tenant::get_tenant(pool, &job.tenant_id).await?;
        let embedder = self.embedder.get().await?;

        let mut report = FaqImportReport::new(&job.tenant_id, job.items.len());
        for item in &job.items {
            let (question, answer) = (item.question.trim(), item.answer.trim());
            if question.is_empty() || answer.is_empty() {
                report.record_failure(question, "question and answer must not be empty");
                continue;
            }

            if faq::faq_exists(pool, &job.tenant_id, question, answer).await? {
                report.successful_items += 1;
                continue;
            }

            let embedding = match rag::embed_faq(embedder.as_ref(), question, answer).await {
                Ok(Some(embedding)) => embedding,
                Ok(None) => {
                    report.record_failure(question, "Failed to generate embedding");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to embed FAQ entry");
                    report.record_failure(question, e.to_string());
                    continue;
                }
            };

            match faq::create_faq(pool, &job.tenant_id, question, answer, Some(&embedding)).await {
                Ok(_) => report.successful_items += 1,
                Err(e) => report.record_failure(question, e.to_string()),
            }
        }

        info!(
            tenant_id = %job.tenant_id,
            successful = report.successful_items,
            failed = report.failed_items,
            "FAQ import finished"
        );
        Ok(report)
    }

    /// Dead-letter tasks whose lease expired on their last attempt.
    async fn reap(&self) {
        match task::reap_expired(self.db.pool(), Utc::now()).await {
            Ok(0) => {}
            Ok(reaped) => warn!(reaped, "Dead-lettered tasks with expired leases"),
            Err(e) => error!(error = %e, "Failed to reap expired tasks"),
        }
    }

    /// Process tasks until `shutdown` turns true.
    ///
    /// A task in flight when shutdown is requested is finished first.
    pub async fn run_until_shutdown(self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.worker_id, "Starting reply worker");

        while !*shutdown.borrow() {
            match self.run_once().await {
                Ok(Some(result)) => debug!(?result, "Task processed"),
                Ok(None) => {
                    self.reap().await;
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "Failed to claim task");
                    tokio::select! {
                        _ = shutdown.changed() => {}
                        _ = sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!(worker_id = %self.worker_id, "Reply worker stopped");
    }
}
