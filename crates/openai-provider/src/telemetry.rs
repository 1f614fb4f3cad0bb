//! Prometheus-style metrics for provider calls.

use std::time::Duration;

use metrics::{counter, histogram};

use crate::api_types::Usage;

pub(crate) const CHAT_ENDPOINT: &str = "chat.completions";
pub(crate) const EMBEDDINGS_ENDPOINT: &str = "embeddings";

/// Count one call and record its latency.
pub(crate) fn record_call(model: &str, endpoint: &'static str, elapsed: Duration, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        "openai_api_calls_total",
        "model" => model.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .increment(1);
    histogram!(
        "openai_api_duration_seconds",
        "model" => model.to_string(),
        "endpoint" => endpoint
    )
    .record(elapsed.as_secs_f64());
}

/// Add reported token usage to the per-model counters.
pub(crate) fn record_usage(model: &str, usage: &Usage) {
    counter!("openai_api_tokens_total", "model" => model.to_string(), "type" => "prompt")
        .increment(u64::from(usage.prompt_tokens));
    if usage.completion_tokens > 0 {
        counter!("openai_api_tokens_total", "model" => model.to_string(), "type" => "completion")
            .increment(u64::from(usage.completion_tokens));
    }
}
