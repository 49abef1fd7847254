//! SQS command queue

use crate::error::{GateError, Result};
use crate::provider::QueueProvider;
use crate::types::QueueMessage;
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use std::time::Duration;

/// SQS allows at most 10 messages per receive
const SQS_MAX_BATCH: usize = 10;

/// SQS allows at most a 20 second long poll
const SQS_MAX_WAIT_SECS: u64 = 20;

/// Queue provider backed by Amazon SQS
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    /// Create a provider from an existing client
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Create a provider from shared SDK configuration
    pub fn from_config(config: &aws_config::SdkConfig, queue_url: impl Into<String>) -> Self {
        Self::new(aws_sdk_sqs::Client::new(config), queue_url)
    }

    /// Get the queue URL
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl QueueProvider for SqsQueue {
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>> {
        let max = max_messages.clamp(1, SQS_MAX_BATCH) as i32;
        let wait_secs = wait.as_secs().min(SQS_MAX_WAIT_SECS) as i32;

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max)
            .wait_time_seconds(wait_secs)
            .send()
            .await
            .map_err(|e| {
                GateError::Queue(format!(
                    "receive from {}: {}",
                    self.queue_url,
                    DisplayErrorContext(&e)
                ))
            })?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|m| {
                let Some(handle) = m.receipt_handle() else {
                    tracing::warn!(message_id = ?m.message_id(), "Message without receipt handle");
                    return None;
                };
                let msg = QueueMessage::new(handle, m.body().unwrap_or_default());
                Some(match m.message_id() {
                    Some(id) => msg.with_message_id(id),
                    None => msg,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| {
                GateError::Queue(format!(
                    "delete from {}: {}",
                    self.queue_url,
                    DisplayErrorContext(&e)
                ))
            })?;

        tracing::debug!(queue = %self.queue_url, receipt_handle, "Message deleted");
        Ok(())
    }

    fn name(&self) -> &str {
        "sqs"
    }
}
