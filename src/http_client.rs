use crate::config::Http;
use anyhow::{Context, Result};
use reqwest::{Certificate, Client};
use std::fs;
use std::time::Duration;
use tracing::info;

/// Builds the outbound client shared by the DockerHub callback and the Jenkins trigger.
/// Every request it sends is bounded by the configured timeout.
pub fn create_client(config: &Http) -> Result<Client> {
    info!(
        "Initializing outbound HTTP client with a {}s request timeout",
        config.timeout_seconds
    );
    // System certificates are loaded automatically with rustls-tls-native-roots
    let mut client_builder = Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(concat!("registry-webhook-relay/", env!("CARGO_PKG_VERSION")));

    for file_path in &config.ca_certificate_paths {
        let file_content = fs::read(file_path)
            .with_context(|| format!("Failed to read file {}", file_path.display()))?;
        let cert = Certificate::from_pem(&file_content).context("Failed to parse certificate")?;
        client_builder = client_builder.add_root_certificate(cert);
    }

    client_builder.build().context("Failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_without_extra_roots() {
        assert!(create_client(&Http::default()).is_ok());
    }

    #[test]
    fn test_create_client_missing_certificate_file() {
        let config = Http {
            timeout_seconds: 1,
            ca_certificate_paths: vec!["/nonexistent/ca.pem".into()],
        };
        let err = create_client(&config).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ca.pem"));
    }
}
