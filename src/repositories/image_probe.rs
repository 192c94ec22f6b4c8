use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use crate::error::GatewayError;

/// Loads a photo ahead of display so the results list never renders half-loaded.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn preload(&self, url: &str) -> Result<(), GatewayError>;
}

pub struct HttpImageProbe {
    client: Client,
}

impl HttpImageProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn preload(&self, url: &str) -> Result<(), GatewayError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status { status: status.as_u16(), detail: None });
        }

        let is_image = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(GatewayError::MalformedPayload(format!("{} is not an image", url)));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(GatewayError::MalformedPayload(format!("{} returned no bytes", url)));
        }
        Ok(())
    }
}
