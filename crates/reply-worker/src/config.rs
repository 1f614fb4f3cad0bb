//! Worker configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::WorkerError;

/// Queue worker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Number of concurrent claim loops.
    pub concurrency: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff base for delivery failures; other failures use half.
    pub retry_delay: Duration,
    /// Upper bound on a single backoff.
    pub max_retry_delay: Duration,
    /// Per-attempt deadline enforced by the worker.
    pub soft_time_limit: Duration,
    /// Lease length; a task still running after this can be reclaimed.
    pub hard_time_limit: Duration,
    /// Sleep between polls of an empty queue.
    pub poll_interval: Duration,
    /// Address of the Prometheus scrape listener; metrics are not exported when unset.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:whatsapp_bot.db?mode=rwc".to_string(),
            concurrency: 4,
            max_retries: 3,
            retry_delay: Duration::from_secs(60),
            max_retry_delay: Duration::from_secs(900),
            soft_time_limit: Duration::from_secs(240),
            hard_time_limit: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
            metrics_addr: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, WorkerError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| WorkerError::Config(format!("invalid {name}: {raw:?}"))),
        _ => Ok(default),
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DATABASE_URL` | SQLite database URL | `sqlite:whatsapp_bot.db?mode=rwc` |
    /// | `WORKER_CONCURRENCY` | Claim loops | `4` |
    /// | `WORKER_MAX_RETRIES` | Retries per task | `3` |
    /// | `WORKER_RETRY_DELAY_SECS` | Backoff base | `60` |
    /// | `WORKER_MAX_RETRY_DELAY_SECS` | Backoff cap | `900` |
    /// | `WORKER_SOFT_TIME_LIMIT_SECS` | Attempt deadline | `240` |
    /// | `WORKER_HARD_TIME_LIMIT_SECS` | Lease length | `300` |
    /// | `WORKER_POLL_INTERVAL_MS` | Idle poll interval | `500` |
    /// | `WORKER_METRICS_ADDR` | Prometheus listener, e.g. `0.0.0.0:9100` | unset |
    pub fn from_env() -> Result<Self, WorkerError> {
        let defaults = Self::default();

        let database_url = env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let concurrency = parse_var("WORKER_CONCURRENCY", defaults.concurrency)?;
        let max_retries = parse_var("WORKER_MAX_RETRIES", defaults.max_retries)?;
        let retry_delay = parse_var("WORKER_RETRY_DELAY_SECS", defaults.retry_delay.as_secs())?;
        let max_retry_delay =
            parse_var("WORKER_MAX_RETRY_DELAY_SECS", defaults.max_retry_delay.as_secs())?;
        let soft = parse_var("WORKER_SOFT_TIME_LIMIT_SECS", defaults.soft_time_limit.as_secs())?;
        let hard = parse_var("WORKER_HARD_TIME_LIMIT_SECS", defaults.hard_time_limit.as_secs())?;
        let poll = parse_var("WORKER_POLL_INTERVAL_MS", defaults.poll_interval.as_millis() as u64)?;
        let metrics_addr = parse_var("WORKER_METRICS_ADDR", String::new())?;
        let metrics_addr = match metrics_addr.as_str() {
            "" => None,
            raw => Some(raw.parse().map_err(|_| {
                WorkerError::Config(format!("invalid WORKER_METRICS_ADDR: {raw:?}"))
            })?),
        };

        if concurrency == 0 {
            return Err(WorkerError::Config("WORKER_CONCURRENCY must be at least 1".to_string()));
        }
        if soft >= hard {
            return Err(WorkerError::Config(format!(
                "soft time limit ({soft}s) must be below the hard time limit ({hard}s)"
            )));
        }

        Ok(Self {
            database_url,
            concurrency,
            max_retries,
            retry_delay: Duration::from_secs(retry_delay),
            max_retry_delay: Duration::from_secs(max_retry_delay),
            soft_time_limit: Duration::from_secs(soft),
            hard_time_limit: Duration::from_secs(hard),
            poll_interval: Duration::from_millis(poll),
            metrics_addr,
        })
    }

    /// Total attempts per task.
    pub fn max_attempts(&self) -> i64 {
        i64::from(self.max_retries) + 1
    }

    /// Backoff before the next attempt after `attempt` failed.
    ///
    /// `base * 2^(attempt - 1)`, capped at `max_retry_delay`. Delivery failures use
    /// the full base; everything else uses half of it.
    pub fn retry_delay(&self, attempt: i64, delivery_failure: bool) -> Duration {
        let base = if delivery_failure {
            self.retry_delay
        } else {
            self.retry_delay / 2
        };
        let exponent = u32::try_from(attempt.saturating_sub(1)).unwrap_or(0).min(16);
        base.saturating_mul(1 << exponent).min(self.max_retry_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_backoff() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_attempts(), 4);
        assert_eq!(config.retry_delay(1, true), Duration::from_secs(60));
        assert_eq!(config.retry_delay(2, true), Duration::from_secs(120));
        assert_eq!(config.retry_delay(1, false), Duration::from_secs(30));
        assert_eq!(config.retry_delay(3, false), Duration::from_secs(120));
        assert_eq!(config.retry_delay(10, true), Duration::from_secs(900));
    }

    // Env vars are process-global; keep every scenario in one test.
    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        const VARS: [&str; 9] = [
            "DATABASE_URL",
            "WORKER_CONCURRENCY",
            "WORKER_MAX_RETRIES",
            "WORKER_RETRY_DELAY_SECS",
            "WORKER_MAX_RETRY_DELAY_SECS",
            "WORKER_SOFT_TIME_LIMIT_SECS",
            "WORKER_HARD_TIME_LIMIT_SECS",
            "WORKER_POLL_INTERVAL_MS",
            "WORKER_METRICS_ADDR",
        ];
        let clear = || VARS.iter().for_each(|v| env::remove_var(v));

        clear();
        assert_eq!(WorkerConfig::from_env().unwrap(), WorkerConfig::default());

        env::set_var("WORKER_MAX_RETRIES", "5");
        env::set_var("WORKER_POLL_INTERVAL_MS", "50");
        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.max_attempts(), 6);
        assert_eq!(config.poll_interval, Duration::from_millis(50));

        env::set_var("WORKER_METRICS_ADDR", "127.0.0.1:9100");
        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.metrics_addr, Some(SocketAddr::from(([127, 0, 0, 1], 9100))));

        env::set_var("WORKER_METRICS_ADDR", "not-an-addr");
        assert!(matches!(WorkerConfig::from_env(), Err(WorkerError::Config(_))));
        env::remove_var("WORKER_METRICS_ADDR");

        env::set_var("WORKER_CONCURRENCY", "many");
        assert!(matches!(WorkerConfig::from_env(), Err(WorkerError::Config(_))));

        clear();
        env::set_var("WORKER_SOFT_TIME_LIMIT_SECS", "300");
        assert!(WorkerConfig::from_env().is_err());

        clear();
    }
}
