//! Redis-backed work queue client.
//!
//! The external sender and asset workers consume these lists with
//! at-least-once semantics, so every envelope carries the ids a consumer
//! needs to report status back idempotently. Batch publication is reconciled
//! item by item: the batch call returns a partition of successes and
//! failures, never an all-or-nothing error.

use smscore::payload::MessagePayload;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Hard per-call limit of the queue's batch publish.
pub const MAX_BATCH_SIZE: usize = 10;

/// One provider send, resolved for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEnvelope {
    pub message_id: String,
    pub campaign_id: String,
    pub audience_member_id: String,
    pub organization_id: String,
    pub attempt: i32,
    pub payload: MessagePayload,
}

/// One asset generation request for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetJob {
    pub campaign_id: String,
    pub audience_member_id: String,
    pub organization_id: String,
    pub template_id: String,
    pub media_kinds: Vec<String>,
}

#[derive(Debug)]
pub struct FailedPublish {
    /// The envelope's `message_id` (or member id for asset jobs).
    pub id: String,
    pub error: String,
}

/// Per-item partition of one batch publish call.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<FailedPublish>,
}

#[derive(Clone)]
pub struct RedisQueue {
    client: redis::Client,
}

impl RedisQueue {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> redis::RedisResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Publish a single message, returning the minted queue message id.
    pub async fn publish<T: Serialize>(&self, queue: &str, body: &T) -> anyhow::Result<String> {
        let mut conn = self.connection().await?;
        let id = format!("qm_{}", nanoid::nanoid!(12));
        let entry = serde_json::to_string(&json!({ "id": id, "body": body }))?;
        redis::cmd("LPUSH")
            .arg(queue)
            .arg(entry)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(id)
    }

    /// Publish up to [`MAX_BATCH_SIZE`] dispatch envelopes, partitioning the
    /// result per item. A connection failure fails every item, not the call.
    pub async fn publish_batch(&self, queue: &str, envelopes: &[DispatchEnvelope]) -> BatchOutcome {
        debug_assert!(envelopes.len() <= MAX_BATCH_SIZE);
        let mut outcome = BatchOutcome::default();

        let mut conn = match self.connection().await {
            Ok(conn) => conn,
            Err(err) => {
                for envelope in envelopes {
                    outcome.failed.push(FailedPublish {
                        id: envelope.message_id.clone(),
                        error: err.to_string(),
                    });
                }
                return outcome;
            }
        };

        for envelope in envelopes {
            let result = async {
                let entry = serde_json::to_string(envelope)?;
                redis::cmd("LPUSH")
                    .arg(queue)
                    .arg(entry)
                    .query_async::<_, ()>(&mut conn)
                    .await?;
                anyhow::Ok(())
            }
            .await;

            match result {
                Ok(()) => outcome.successful.push(envelope.message_id.clone()),
                Err(err) => outcome.failed.push(FailedPublish {
                    id: envelope.message_id.clone(),
                    error: err.to_string(),
                }),
            }
        }

        outcome
    }

    /// Current depth of a queue, for the operational health surface.
    pub async fn depth(&self, queue: &str) -> anyhow::Result<i64> {
        let mut conn = self.connection().await?;
        let depth: i64 = redis::cmd("LLEN").arg(queue).query_async(&mut conn).await?;
        Ok(depth)
    }
}

/// Split eligible envelopes into queue-sized batches.
pub fn chunk_batches(envelopes: Vec<DispatchEnvelope>) -> Vec<Vec<DispatchEnvelope>> {
    let mut batches = Vec::with_capacity(envelopes.len().div_ceil(MAX_BATCH_SIZE));
    let mut current = Vec::with_capacity(MAX_BATCH_SIZE);
    for envelope in envelopes {
        current.push(envelope);
        if current.len() == MAX_BATCH_SIZE {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(n: usize) -> DispatchEnvelope {
        DispatchEnvelope {
            message_id: format!("msg_{n}"),
            campaign_id: "cmp_1".into(),
            audience_member_id: format!("aud_{n}"),
            organization_id: "org_1".into(),
            attempt: 0,
            payload: MessagePayload::Text {
                recipient: "+14155552671".into(),
                content: "hi".into(),
            },
        }
    }

    #[test]
    fn test_twelve_envelopes_make_two_batches() {
        let batches = chunk_batches((0..12).map(envelope).collect());
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 10);
        assert_eq!(batches[1].len(), 2);
    }

    #[test]
    fn test_exact_multiple_has_no_empty_tail() {
        let batches = chunk_batches((0..20).map(envelope).collect());
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 10));
    }

    #[test]
    fn test_empty_input_no_batches() {
        assert!(chunk_batches(Vec::new()).is_empty());
    }

    #[test]
    fn test_envelope_serializes_camel_case() {
        let json = serde_json::to_value(envelope(1)).unwrap();
        assert_eq!(json["messageId"], "msg_1");
        assert_eq!(json["audienceMemberId"], "aud_1");
        assert_eq!(json["payload"]["messageType"], "text");
    }
}
