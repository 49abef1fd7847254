//! AWS providers — SQS command queue and S3 evidence storage
//!
//! Credentials and region come from the standard AWS provider chain
//! (environment, `~/.aws/credentials`, instance profile).

mod s3;
mod sqs;

pub use s3::S3Storage;
pub use sqs::SqsQueue;

/// Load the shared SDK configuration from the default provider chain
pub async fn load_sdk_config() -> aws_config::SdkConfig {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    tracing::debug!(region = ?config.region(), "AWS configuration loaded");
    config
}
