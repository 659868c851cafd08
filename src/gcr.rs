use crate::error::RelayError;
use crate::image_reference::ImageReference;
use crate::pipeline::{InboundRequest, WebhookPipeline};
use crate::secret_string::SecretString;
use crate::trigger::{self, CanonicalTrigger, Provider, Trigger};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

static SECRET_QUERY_PARAM: &str = "secret";
static INSERT_ACTION: &str = "INSERT";

/// Pub/Sub push subscription delivery wrapping a Container Registry notification.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PubSubMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    /// Base64 encoded [`RegistryEvent`] JSON.
    pub data: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Container Registry notification, e.g.
/// `{"action":"INSERT","digest":"gcr.io/p/img@sha256:..","tag":"gcr.io/p/img:latest"}`.
#[derive(Debug, Deserialize)]
pub struct RegistryEvent {
    pub action: String,
    pub digest: String,
    #[serde(default)]
    pub tag: Option<String>,
}

/// A registry push that passed the structural checks.
#[derive(Debug, PartialEq, Eq)]
pub struct ImagePush {
    pub repository_domain: String,
    pub repository_name: String,
    pub tag_or_digest: String,
}

pub fn parse(body: &[u8]) -> Result<(PushEnvelope, RegistryEvent), RelayError> {
    let envelope: PushEnvelope = serde_json::from_slice(body)
        .map_err(|e| RelayError::MalformedPayload(format!("invalid Pub/Sub envelope: {}", e)))?;

    let data = B64.decode(envelope.message.data.trim()).map_err(|e| {
        RelayError::MalformedPayload(format!("message data is not valid base64: {}", e))
    })?;
    let event: RegistryEvent = serde_json::from_slice(&data).map_err(|e| {
        RelayError::MalformedPayload(format!("invalid Container Registry event: {}", e))
    })?;

    Ok((envelope, event))
}

pub fn check_secret(secret: &SecretString, request: &InboundRequest) -> Result<(), RelayError> {
    match request.query_param(SECRET_QUERY_PARAM) {
        Some(candidate) if secret.matches(candidate) => Ok(()),
        Some(_) => Err(RelayError::Unauthorized(
            "secret query parameter does not match".to_string(),
        )),
        None => Err(RelayError::Unauthorized(
            "secret query parameter is missing".to_string(),
        )),
    }
}

impl RegistryEvent {
    fn tag(&self) -> Option<&str> {
        self.tag.as_deref().filter(|tag| !tag.is_empty())
    }

    /// Accepts pushed images only and resolves where the image lives. The tag wins over
    /// the digest as it is what a human pushed; the digest identifies untagged pushes.
    pub fn validate(&self) -> Result<ImagePush, RelayError> {
        if self.action != INSERT_ACTION {
            return Err(RelayError::MalformedPayload(format!(
                "unsupported action {}",
                self.action
            )));
        }

        let reference = match self.tag() {
            Some(tag) => ImageReference::parse(tag),
            None => ImageReference::parse(&self.digest),
        }
        .map_err(|e| RelayError::MalformedPayload(format!("invalid repository path: {}", e)))?;

        let tag_or_digest = match (&reference.tag, &reference.digest) {
            (Some(tag), _) => tag.clone(),
            (None, Some(digest)) => digest.clone(),
            (None, None) => {
                return Err(RelayError::MalformedPayload(format!(
                    "{} carries neither tag nor digest",
                    reference
                )));
            }
        };

        let path = reference.path();
        let (repository_domain, repository_name) = path.rsplit_once('/').ok_or_else(|| {
            RelayError::MalformedPayload(format!("invalid repository path {}", path))
        })?;

        Ok(ImagePush {
            repository_domain: repository_domain.to_string(),
            repository_name: repository_name.to_string(),
            tag_or_digest,
        })
    }
}

impl ImagePush {
    fn into_trigger(self, raw_payload: Vec<u8>) -> CanonicalTrigger {
        CanonicalTrigger {
            provider: Provider::Gcr,
            repository_name: self.repository_name,
            repository_scope: self.repository_domain,
            tag_or_digest: self.tag_or_digest,
            raw_payload,
        }
    }
}

pub struct GcrPipeline {
    secret: SecretString,
    trigger: Arc<dyn Trigger>,
    dispatch_timeout: Duration,
}

impl GcrPipeline {
    pub fn new(
        secret: SecretString,
        trigger: Arc<dyn Trigger>,
        dispatch_timeout: Duration,
    ) -> Self {
        GcrPipeline {
            secret,
            trigger,
            dispatch_timeout,
        }
    }
}

#[async_trait]
impl WebhookPipeline for GcrPipeline {
    fn name(&self) -> &'static str {
        Provider::Gcr.as_str()
    }

    async fn handle(&self, request: InboundRequest) -> Result<(), RelayError> {
        // The secret is checked before any decoding, unauthenticated bodies are never parsed
        check_secret(&self.secret, &request)?;

        let (envelope, event) = parse(&request.body)?;
        info!(
            remote = %request.remote(),
            message_id = envelope.message.message_id.as_deref().unwrap_or("-"),
            subscription = envelope.subscription.as_deref().unwrap_or("-"),
            action = %event.action,
            digest = %event.digest,
            "Parsed Container Registry event"
        );

        let push = event.validate()?;
        let canonical = push.into_trigger(request.body.to_vec());
        trigger::dispatch(self.trigger.as_ref(), canonical, self.dispatch_timeout).await
    }
}
