use crate::secret_string::SecretString;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::net::IpAddr;
use std::path::PathBuf;
use std::{env, fs, path::Path};
use tracing::info;

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub webserver: Webserver,
    pub dockerhub: DockerHub,
    pub gcr: Gcr,
    pub jenkins: Jenkins,
    #[serde(default)]
    pub http: Http,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webserver {
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
}

#[derive(Debug, Deserialize)]
pub struct DockerHub {
    #[serde(default)]
    pub namespaces: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Gcr {
    pub secret: SecretString,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Jenkins {
    pub url: String,
    pub job: String,
    pub username: Option<String>,
    pub api_token: Option<SecretString>,
    pub build_token: Option<SecretString>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Http {
    #[serde(default = "default_http_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub ca_certificate_paths: Vec<PathBuf>,
}

impl Default for Http {
    fn default() -> Self {
        Http {
            timeout_seconds: DEFAULT_HTTP_TIMEOUT_SECONDS,
            ca_certificate_paths: Vec::new(),
        }
    }
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_http_timeout_seconds() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECONDS
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    info!("Loading config from file {}", path.as_ref().display());
    let yaml_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let expanded = expand_env_vars(&yaml_str)?;

    let config: Config = serde_yaml_ng::from_str(&expanded)
        .context("Failed to parse YAML config after environment variable expansion")?;

    if config.dockerhub.namespaces.is_empty() {
        tracing::warn!(
            "No DockerHub namespaces configured, every DockerHub webhook will be rejected"
        );
    }

    Ok(config)
}

/// Replaces `${VAR}` placeholders with environment variables values.
/// Returns an error naming the first missing env var.
fn expand_env_vars(input: &str) -> Result<String> {
    let re =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });

    if let Some(var_name) = missing {
        anyhow::bail!("Missing environment variable: {}", var_name);
    }

    Ok(result.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_expand_env_vars_success() {
        unsafe {
            env::set_var("RELAY_TEST_VAR", "value123");
        }
        let input = "This is a test: ${RELAY_TEST_VAR}";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, "This is a test: value123");
        unsafe {
            env::remove_var("RELAY_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_var() {
        let input = "This will fail: ${RELAY_MISSING_VAR}";
        let err = expand_env_vars(input).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: RELAY_MISSING_VAR"
        );
    }

    #[test]
    fn test_expand_env_vars_multiple_vars() {
        unsafe {
            env::set_var("RELAY_VAR1", "foo");
            env::set_var("RELAY_VAR2", "bar");
        }
        let input = "${RELAY_VAR1} and ${RELAY_VAR2}";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, "foo and bar");
        unsafe {
            env::remove_var("RELAY_VAR1");
            env::remove_var("RELAY_VAR2");
        }
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "No variables here";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, input);
    }

    #[test]
    fn test_load_config_file() {
        unsafe {
            env::set_var("RELAY_TEST_GCR_SECRET", "pubsub-secret");
        }
        let yaml_content = r#"
        webserver:
          port: 8080
        dockerhub:
          namespaces:
            - acme
            - widgets
        gcr:
          secret: ${RELAY_TEST_GCR_SECRET}
        jenkins:
          url: https://jenkins.example.com
          job: image-pushed
          username: bot
          apiToken: api_token
        http:
          timeoutSeconds: 3
        "#;

        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let path = tmp_file.path();
        fs::write(path, yaml_content).expect("Failed to write to temp file");

        let config = load_config(path).expect("Should load config");

        assert_eq!(config.webserver.port, 8080);
        assert_eq!(config.webserver.bind_address, default_bind_address());
        assert_eq!(config.dockerhub.namespaces, vec!["acme", "widgets"]);
        assert_eq!(config.gcr.secret.expose_secret(), "pubsub-secret");
        assert_eq!(config.jenkins.job, "image-pushed");
        assert_eq!(config.jenkins.username.as_deref(), Some("bot"));
        assert_eq!(
            config.jenkins.api_token.as_ref().map(|t| t.expose_secret()),
            Some("api_token")
        );
        assert!(config.jenkins.build_token.is_none());
        assert_eq!(config.http.timeout_seconds, 3);
        assert!(config.http.ca_certificate_paths.is_empty());
        unsafe {
            env::remove_var("RELAY_TEST_GCR_SECRET");
        }
    }

    #[test]
    fn test_load_config_defaults_http_section() {
        let yaml_content = r#"
        webserver:
          port: 9000
          bindAddress: 127.0.0.1
        dockerhub:
          namespaces: []
        gcr:
          secret: s
        jenkins:
          url: http://localhost:8081
          job: build
        "#;

        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        fs::write(tmp_file.path(), yaml_content).expect("Failed to write to temp file");

        let config = load_config(tmp_file.path()).expect("Should load config");

        assert_eq!(config.webserver.bind_address, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.http.timeout_seconds, DEFAULT_HTTP_TIMEOUT_SECONDS);
        assert!(config.dockerhub.namespaces.is_empty());
    }
}
