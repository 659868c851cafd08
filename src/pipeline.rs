use crate::error::RelayError;
use async_trait::async_trait;
use axum::body::Bytes;
use std::net::SocketAddr;

/// The parts of an inbound webhook call the pipelines look at.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub remote_addr: Option<SocketAddr>,
    /// Query parameters in request order, repeated names included.
    pub query: Vec<(String, String)>,
    pub body: Bytes,
}

impl InboundRequest {
    /// First value of the named query parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Remote address for log lines, `unknown` when the transport did not provide one.
    pub fn remote(&self) -> String {
        self.remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// One provider's receive, authenticate, normalize and dispatch sequence.
#[async_trait]
pub trait WebhookPipeline: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: InboundRequest) -> Result<(), RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_returns_first_value() {
        let request = InboundRequest {
            remote_addr: None,
            query: vec![
                ("other".to_string(), "x".to_string()),
                ("secret".to_string(), "first".to_string()),
                ("secret".to_string(), "second".to_string()),
            ],
            body: Bytes::new(),
        };
        assert_eq!(request.query_param("secret"), Some("first"));
        assert_eq!(request.query_param("missing"), None);
        assert_eq!(request.remote(), "unknown");
    }
}
