use crate::{config::ClassifierServiceConfig, model::ClassificationResult};
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tonic::{
    transport::{Channel, Error},
    Request, Status,
};
use tracing::instrument;
use vision_proto::{vision_service_client::VisionServiceClient, ClassificationRequest};

pub(crate) const UNKNOWN_FAILURE: &str = "An unknown error occurred during image analysis.";

#[derive(Error, Debug)]
pub enum ClassifierClientError {
    #[error("Failed to connect to gRPC server: {0}")]
    ConnectionFailed(#[from] Error),
    #[error("Maximum connection retries exceeded.")]
    MaxRetriesExceeded,
    #[error("gRPC request failed: {0}")]
    Rpc(#[from] Status),
}

impl ClassifierClientError {
    /// Text shown on the page when a classification fails.
    pub fn user_message(&self) -> String {
        match self {
            ClassifierClientError::Rpc(status) if !status.message().trim().is_empty() => {
                status.message().to_string()
            }
            _ => UNKNOWN_FAILURE.to_string(),
        }
    }
}

#[tonic::async_trait]
pub trait ImageClassifier: Send + Sync + 'static {
    async fn classify(
        &self,
        photo_data_uri: String,
    ) -> Result<ClassificationResult, ClassifierClientError>;
}

pub struct ClassifierClient {
    client: VisionServiceClient<Channel>,
}

impl ClassifierClient {
    pub async fn connect(config: &ClassifierServiceConfig) -> Result<Self, ClassifierClientError> {
        let client = Self::get_client(config.get_address(), config.connect_retries).await?;
        Ok(Self { client })
    }

    async fn get_client(
        address: String,
        max_retries: u32,
    ) -> Result<VisionServiceClient<Channel>, ClassifierClientError> {
        let mut retry_delay = Duration::from_millis(50);
        let max_retry_delay = Duration::from_secs(1);
        let mut retry_count = 0;

        while retry_count < max_retries {
            match timeout(
                Duration::from_secs(1),
                VisionServiceClient::connect(address.clone()),
            )
            .await
            {
                Ok(Ok(client)) => {
                    tracing::info!("Connected to classifier at {}", address);
                    return Ok(client);
                }
                Ok(Err(e)) => {
                    tracing::error!("Failed to connect to gRPC server: {:?}", e);
                }
                Err(_) => {
                    tracing::error!("Connection timeout");
                }
            }

            retry_count += 1;
            let jitter = rand::random::<f32>() * 0.2 + 0.9;
            sleep(retry_delay.mul_f32(jitter)).await;
            retry_delay = (retry_delay * 2).min(max_retry_delay);
        }

        Err(ClassifierClientError::MaxRetriesExceeded)
    }
}

#[tonic::async_trait]
impl ImageClassifier for ClassifierClient {
    /// One RPC per call. Channels multiplex, so each call works on its own
    /// clone of the client.
    #[instrument(skip(self, photo_data_uri))]
    async fn classify(
        &self,
        photo_data_uri: String,
    ) -> Result<ClassificationResult, ClassifierClientError> {
        let mut client = self.client.clone();
        let request = Request::new(ClassificationRequest { photo_data_uri });

        let response = client.classify(request).await?;
        let result = ClassificationResult::from(response.into_inner());
        tracing::debug!("Received {} labels", result.labels.len());

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_uses_status_text() {
        let err = ClassifierClientError::from(Status::failed_precondition(
            "Image was blocked by safety filters",
        ));
        assert_eq!(err.user_message(), "Image was blocked by safety filters");
    }

    #[test]
    fn test_user_message_falls_back() {
        let err = ClassifierClientError::from(Status::internal(""));
        assert_eq!(err.user_message(), UNKNOWN_FAILURE);
        assert_eq!(
            ClassifierClientError::MaxRetriesExceeded.user_message(),
            UNKNOWN_FAILURE
        );
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_retries() {
        let config = ClassifierServiceConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_retries: 2,
        };
        let result = ClassifierClient::connect(&config).await;
        assert!(matches!(
            result,
            Err(ClassifierClientError::MaxRetriesExceeded)
        ));
    }
}
