use crate::error::RelayError;
use crate::pipeline::{InboundRequest, WebhookPipeline};
use crate::trigger::{self, CanonicalTrigger, Provider, Trigger};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

static CALLBACK_CONTEXT: &str = "registry-webhook-relay";

/// The DockerHub push webhook body. Fields the relay does not use are ignored.
#[derive(Debug, Deserialize)]
pub struct PushEvent {
    pub repository: Repository,
    pub push_data: PushData,
    pub callback_url: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Deserialize)]
pub struct PushData {
    pub tag: String,
}

impl PushEvent {
    pub fn parse(body: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice(body).map_err(|e| {
            RelayError::MalformedPayload(format!("invalid DockerHub push event: {}", e))
        })
    }

    fn into_trigger(self, raw_payload: Vec<u8>) -> CanonicalTrigger {
        CanonicalTrigger {
            provider: Provider::DockerHub,
            repository_name: self.repository.name,
            repository_scope: self.repository.namespace,
            tag_or_digest: self.push_data.tag,
            raw_payload,
        }
    }
}

/// Namespaces whose pushes may trigger builds. Matching is exact and case-sensitive.
#[derive(Debug, Clone, Default)]
pub struct NamespaceAllowList(HashSet<String>);

impl NamespaceAllowList {
    pub fn is_allowed(&self, namespace: &str) -> bool {
        self.0.contains(namespace)
    }

    pub fn check(&self, namespace: &str) -> Result<(), RelayError> {
        if self.is_allowed(namespace) {
            Ok(())
        } else {
            Err(RelayError::Unauthorized(format!(
                "namespace {} is not in the allow-list",
                namespace
            )))
        }
    }
}

impl<S: Into<String>> FromIterator<S> for NamespaceAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        NamespaceAllowList(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Serialize)]
struct CallbackStatus<'a> {
    state: &'a str,
    description: &'a str,
    context: &'a str,
}

/// Confirms a push by posting a success status to the callback URL DockerHub sent along.
/// A push is only trusted once DockerHub accepted that callback.
#[derive(Clone)]
pub struct CallbackAcknowledger {
    client: Client,
}

impl CallbackAcknowledger {
    pub fn new(client: Client) -> Self {
        CallbackAcknowledger { client }
    }

    pub async fn acknowledge(&self, callback_url: &str) -> Result<(), RelayError> {
        let status = CallbackStatus {
            state: "success",
            description: "Build trigger accepted",
            context: CALLBACK_CONTEXT,
        };

        debug!("Acknowledging push at callback URL {}", callback_url);
        let response = self
            .client
            .post(callback_url)
            .json(&status)
            .send()
            .await
            .map_err(|e| RelayError::CallbackFailed(format!("request failed: {}", e)))?;

        let response_status = response.status();
        if !response_status.is_success() {
            return Err(RelayError::CallbackFailed(format!(
                "callback returned error status {}",
                response_status
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| RelayError::CallbackFailed(format!("invalid callback response: {}", e)))?;
        Ok(())
    }
}

pub struct DockerHubPipeline {
    allow_list: NamespaceAllowList,
    acknowledger: CallbackAcknowledger,
    trigger: Arc<dyn Trigger>,
    dispatch_timeout: Duration,
}

impl DockerHubPipeline {
    pub fn new(
        allow_list: NamespaceAllowList,
        acknowledger: CallbackAcknowledger,
        trigger: Arc<dyn Trigger>,
        dispatch_timeout: Duration,
    ) -> Self {
        DockerHubPipeline {
            allow_list,
            acknowledger,
            trigger,
            dispatch_timeout,
        }
    }
}

#[async_trait]
impl WebhookPipeline for DockerHubPipeline {
    fn name(&self) -> &'static str {
        Provider::DockerHub.as_str()
    }

    async fn handle(&self, request: InboundRequest) -> Result<(), RelayError> {
        let event = PushEvent::parse(&request.body)?;
        info!(
            remote = %request.remote(),
            namespace = %event.repository.namespace,
            repository = %event.repository.name,
            tag = %event.push_data.tag,
            "Parsed DockerHub push event"
        );

        self.allow_list.check(&event.repository.namespace)?;
        self.acknowledger.acknowledge(&event.callback_url).await?;

        let canonical = event.into_trigger(request.body.to_vec());
        trigger::dispatch(self.trigger.as_ref(), canonical, self.dispatch_timeout).await
    }
}
