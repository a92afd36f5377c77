//! AWS SDK client bundle.

use anyhow::Result;
use aws_config::BehaviorVersion;

/// Bundle of AWS SDK clients used by the optional AWS-backed strategies.
///
/// Both clients share the same underlying [`aws_config::SdkConfig`] so that
/// credentials are resolved once and reused. The bundle is only built when a
/// configured strategy needs it (`secret-manager` key source or `distributed`
/// replay store).
#[derive(Clone)]
pub struct AwsClients {
    /// Secrets Manager client for exported key material.
    pub secretsmanager: aws_sdk_secretsmanager::Client,
    /// DynamoDB client for the distributed nonce table.
    pub dynamodb: aws_sdk_dynamodb::Client,
}

impl AwsClients {
    /// Initialise all AWS SDK clients via the standard credential chain and
    /// region resolution.
    pub async fn init() -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Ok(Self {
            secretsmanager: aws_sdk_secretsmanager::Client::new(&config),
            dynamodb: aws_sdk_dynamodb::Client::new(&config),
        })
    }
}
