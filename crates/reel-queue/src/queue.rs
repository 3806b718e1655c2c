//! Export job queue using Redis Streams.
//!
//! Entries carry the JSON payload under `data` and the number of previous
//! failed attempts under `attempt`. A claimed entry stays pending in the
//! consumer group, invisible to other consumers, until it is completed or
//! failed.

use std::collections::HashMap;
use std::time::Duration;

use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::{ClaimedJob, ExportJobPayload};

const DEFAULT_QUEUE_NAME: &str = "video-export";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis connection string
    pub url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Failed attempts before an entry goes to the DLQ
    pub max_retries: u32,
    /// Idle time after which a pending entry may be reclaimed
    pub visibility_timeout: Duration,
}

impl QueueConfig {
    /// Config for a named queue with default policy.
    pub fn new(url: impl Into<String>, queue_name: &str) -> Self {
        Self {
            url: url.into(),
            stream_name: queue_name.to_string(),
            consumer_group: format!("{}:workers", queue_name),
            dlq_stream_name: format!("{}:dlq", queue_name),
            max_retries: 3,
            visibility_timeout: Duration::from_secs(600), // 10 minutes
        }
    }

    /// Create config from environment variables.
    ///
    /// `QUEUE_URL` (or `REDIS_URL`) is required.
    pub fn from_env() -> QueueResult<Self> {
        let url = std::env::var("QUEUE_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| QueueError::config("QUEUE_URL is not set"))?;

        let queue_name = std::env::var("QUEUE_NAME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());

        let mut config = Self::new(url, &queue_name);
        config.max_retries = std::env::var("QUEUE_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);
        config.visibility_timeout = Duration::from_secs(
            std::env::var("QUEUE_VISIBILITY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(600),
        );
        Ok(config)
    }
}

/// Job queue client.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
    consumer_name: String,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;
        let consumer_name = format!("reel-worker-{}", uuid::Uuid::new_v4());
        Ok(Self {
            client,
            config,
            consumer_name,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env()?)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Add a payload to the queue.
    pub async fn enqueue(&self, payload: &ExportJobPayload) -> QueueResult<String> {
        self.add_entry(payload, 0).await
    }

    async fn add_entry(&self, payload: &ExportJobPayload, attempt: u32) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let data = serde_json::to_string(payload)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("data")
            .arg(&data)
            .arg("attempt")
            .arg(attempt)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::enqueue_failed(e.to_string()))?;

        debug!("Enqueued {} as {} (attempt {})", data, message_id, attempt);
        Ok(message_id)
    }

    /// Claim at most one entry.
    ///
    /// New entries are read first; when there are none, an entry abandoned
    /// by another consumer for longer than the visibility timeout is taken
    /// over. Never blocks waiting for work.
    pub async fn claim(&self) -> QueueResult<Option<ClaimedJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let entry = result.keys.into_iter().flat_map(|k| k.ids).next();
        if let Some(entry) = entry {
            let job = claimed_from_entry(&entry.id, &entry.map);
            info!(message_id = %job.id, attempt = job.attempt, "Claimed queue entry");
            return Ok(Some(job));
        }

        self.claim_stale().await
    }

    /// Take over one pending entry idle for longer than the visibility timeout.
    async fn claim_stale(&self) -> QueueResult<Option<ClaimedJob>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let min_idle_ms = self.config.visibility_timeout.as_millis() as u64;

        let pending: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(1)
            .query_async(&mut conn)
            .await?;

        let Some(stale) = pending.ids.into_iter().next() else {
            return Ok(None);
        };

        let result: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.consumer_name)
            .arg(min_idle_ms)
            .arg(&stale.id)
            .query_async(&mut conn)
            .await?;

        // Another consumer may have reclaimed it first
        Ok(result.ids.into_iter().next().map(|entry| {
            let job = claimed_from_entry(&entry.id, &entry.map);
            warn!(
                message_id = %job.id,
                previous_consumer = %stale.consumer,
                "Reclaimed abandoned queue entry"
            );
            job
        }))
    }

    /// Mark an entry as done (ack + delete).
    pub async fn complete(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        debug!("Completed queue entry: {}", message_id);
        Ok(())
    }

    /// Mark an entry as failed.
    ///
    /// The payload is re-queued with an incremented attempt count until
    /// `max_retries` failures, after which it moves to the dead letter
    /// stream with the failure reason.
    pub async fn fail(&self, job: &ClaimedJob, reason: &str) -> QueueResult<()> {
        let attempts = job.attempt + 1;

        if job.data.job_ref().is_some() && attempts < self.config.max_retries {
            let retry_id = self.add_entry(&job.data, attempts).await?;
            info!(
                message_id = %job.id,
                retry_id = %retry_id,
                attempts,
                "Re-queued failed entry: {}",
                reason
            );
        } else {
            self.dlq(job, attempts, reason).await?;
        }

        self.complete(&job.id).await
    }

    async fn dlq(&self, job: &ClaimedJob, attempts: u32, reason: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let data = serde_json::to_string(&job.data)?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("data")
            .arg(&data)
            .arg("error")
            .arg(reason)
            .arg("attempts")
            .arg(attempts)
            .arg("original_id")
            .arg(&job.id)
            .query_async::<()>(&mut conn)
            .await?;

        warn!(message_id = %job.id, attempts, "Moved entry to DLQ: {}", reason);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }
}

fn field(map: &HashMap<String, redis::Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        redis::Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        redis::Value::SimpleString(s) => Some(s.clone()),
        redis::Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Build a claim from a stream entry. Malformed payloads yield a claim
/// without a job reference rather than an error.
fn claimed_from_entry(id: &str, map: &HashMap<String, redis::Value>) -> ClaimedJob {
    let data = match field(map, "data") {
        Some(raw) => {
            let payload = ExportJobPayload::parse(&raw);
            if payload.job_ref().is_none() {
                warn!(message_id = %id, "Queue entry has no export job reference");
            }
            payload
        }
        None => ExportJobPayload::default(),
    };
    let attempt = field(map, "attempt")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    ClaimedJob::new(id, data, attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "QUEUE_URL",
            "REDIS_URL",
            "QUEUE_NAME",
            "QUEUE_MAX_RETRIES",
            "QUEUE_VISIBILITY_TIMEOUT_SECS",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_config_requires_url() {
        clear_env();
        assert!(matches!(QueueConfig::from_env(), Err(QueueError::Config(_))));
    }

    #[test]
    #[serial]
    fn test_config_names_derive_from_queue_name() {
        clear_env();
        std::env::set_var("REDIS_URL", "redis://localhost:6379");
        std::env::set_var("QUEUE_MAX_RETRIES", "5");

        let config = QueueConfig::from_env().unwrap();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.stream_name, "video-export");
        assert_eq!(config.consumer_group, "video-export:workers");
        assert_eq!(config.dlq_stream_name, "video-export:dlq");
        assert_eq!(config.max_retries, 5);

        std::env::set_var("QUEUE_URL", "redis://queue:6379");
        std::env::set_var("QUEUE_NAME", "exports");
        let config = QueueConfig::from_env().unwrap();
        assert_eq!(config.url, "redis://queue:6379");
        assert_eq!(config.dlq_stream_name, "exports:dlq");
        clear_env();
    }

    #[test]
    fn test_entry_parsing() {
        let mut map = HashMap::new();
        map.insert(
            "data".to_string(),
            redis::Value::BulkString(br#"{"exportJobId":"exp_9"}"#.to_vec()),
        );
        map.insert("attempt".to_string(), redis::Value::BulkString(b"2".to_vec()));

        let job = claimed_from_entry("1-0", &map);
        assert_eq!(job.id, "1-0");
        assert_eq!(job.data.job_ref(), Some("exp_9"));
        assert_eq!(job.attempt, 2);
    }

    #[test]
    fn test_malformed_entry_has_no_reference() {
        let mut map = HashMap::new();
        map.insert("data".to_string(), redis::Value::BulkString(b"{oops".to_vec()));
        let job = claimed_from_entry("2-0", &map);
        assert_eq!(job.data.job_ref(), None);
        assert_eq!(job.attempt, 0);

        let job = claimed_from_entry("3-0", &HashMap::new());
        assert_eq!(job.data.job_ref(), None);
    }

    /// Requires a Redis server at `REDIS_URL`.
    #[tokio::test]
    #[ignore]
    async fn test_claim_complete_roundtrip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let mut config = QueueConfig::new(url, &format!("reel-test-{}", uuid::Uuid::new_v4()));
        config.max_retries = 1;
        let queue = JobQueue::new(config).unwrap();
        queue.init().await.unwrap();

        queue.enqueue(&ExportJobPayload::new("exp_1")).await.unwrap();
        let job = queue.claim().await.unwrap().unwrap();
        assert_eq!(job.data.job_ref(), Some("exp_1"));
        assert!(queue.claim().await.unwrap().is_none());

        queue.fail(&job, "boom").await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 0);
        assert_eq!(queue.dlq_len().await.unwrap(), 1);
    }
}
