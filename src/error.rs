use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected status {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("{provider} rejected the request credentials ({status})")]
    Unauthorized { provider: &'static str, status: u16 },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl GatewayError {
    /// The structured `detail` message the backend attached to an error response, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            GatewayError::Status { detail: Some(detail), .. } => Some(detail.as_str()),
            _ => None,
        }
    }
}
