//! Server-to-client calls.
//!
//! Everything the engine says to the connected client goes through
//! [`ClientChannel`]: list-changed and resource-updated notifications,
//! progress, sampling and elicitation. [`PeerChannel`] is the rmcp-backed
//! implementation; it is attached to the session peer during `initialize`.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use miette::Diagnostic;
use rmcp::model::{
    ClientCapabilities, ContextInclusion, CreateElicitationRequestParams,
    CreateMessageRequestParams, ElicitationSchema, ProgressNotificationParam, ProgressToken,
    ResourceUpdatedNotificationParam, SamplingMessage,
};
use rmcp::{Peer, RoleServer};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use super::capabilities::CapabilityKind;
use crate::events::ListenerError;

pub use rmcp::model::ElicitationAction;

/// Errors from talking to the client.
#[derive(Error, Diagnostic, Debug)]
pub enum ChannelError {
    #[error("No client session is attached")]
    #[diagnostic(code(epicme::client::not_connected))]
    NotConnected,

    #[error("Client does not support {capability}")]
    #[diagnostic(code(epicme::client::unsupported))]
    Unsupported { capability: String },

    #[error("Client request failed: {message}")]
    #[diagnostic(code(epicme::client::request_failed))]
    Request { message: String },

    #[error("Unexpected client response: {message}")]
    #[diagnostic(code(epicme::client::invalid_response))]
    InvalidResponse { message: String },
}

pub type ChannelResult<T> = Result<T, ChannelError>;

impl From<ChannelError> for ListenerError {
    fn from(e: ChannelError) -> Self {
        ListenerError::Notify {
            message: e.to_string(),
        }
    }
}

/// A text-generation request sent to the client's model.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// A structured-input request shown to the client's user.
#[derive(Debug, Clone, PartialEq)]
pub struct ElicitationRequest {
    pub message: String,
    pub schema: ElicitationSchema,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElicitationResponse {
    pub action: ElicitationAction,
    pub content: Option<Value>,
}

impl ElicitationResponse {
    /// True when the user accepted and set `field` to `true`.
    pub fn confirmed(&self, field: &str) -> bool {
        self.action == ElicitationAction::Accept
            && self
                .content
                .as_ref()
                .and_then(|c| c.get(field))
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }
}

/// Outbound calls to the connected client. Mocked in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClientChannel: Send + Sync {
    async fn list_changed(&self, kind: CapabilityKind) -> ChannelResult<()>;

    async fn resource_updated(&self, uri: &str, title: &str) -> ChannelResult<()>;

    async fn progress(
        &self,
        token: ProgressToken,
        progress: f64,
        total: f64,
        message: Option<String>,
    ) -> ChannelResult<()>;

    /// Ask the client's model for text.
    async fn create_message(&self, request: SamplingRequest) -> ChannelResult<String>;

    fn supports_elicitation(&self) -> bool;

    async fn elicit(&self, request: ElicitationRequest) -> ChannelResult<ElicitationResponse>;
}

/// rmcp-backed channel for one MCP session.
#[derive(Clone, Default)]
pub struct PeerChannel {
    peer: Arc<OnceLock<Peer<RoleServer>>>,
}

impl PeerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the session peer. Later calls are ignored.
    pub fn attach(&self, peer: Peer<RoleServer>) {
        if self.peer.set(peer).is_err() {
            debug!("Client peer already attached");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.peer.get().is_some()
    }

    fn peer(&self) -> ChannelResult<&Peer<RoleServer>> {
        self.peer.get().ok_or(ChannelError::NotConnected)
    }

    /// Whether the client declared a capability during initialize.
    fn client_supports(&self, declared: impl Fn(&ClientCapabilities) -> bool) -> bool {
        self.peer
            .get()
            .and_then(|peer| peer.peer_info())
            .is_some_and(|info| declared(&info.capabilities))
    }
}

fn request_failed(e: impl std::fmt::Display) -> ChannelError {
    ChannelError::Request {
        message: e.to_string(),
    }
}

#[async_trait]
impl ClientChannel for PeerChannel {
    async fn list_changed(&self, kind: CapabilityKind) -> ChannelResult<()> {
        let peer = self.peer()?;
        let sent = match kind {
            CapabilityKind::Tool => peer.notify_tool_list_changed().await,
            CapabilityKind::Resource => peer.notify_resource_list_changed().await,
            CapabilityKind::Prompt => peer.notify_prompt_list_changed().await,
        };
        sent.map_err(request_failed)
    }

    async fn resource_updated(&self, uri: &str, title: &str) -> ChannelResult<()> {
        let peer = self.peer()?;
        // The notification carries only the URI; clients re-read for the rest.
        debug!(uri, title, "Sending resource update");
        peer.notify_resource_updated(ResourceUpdatedNotificationParam::new(uri))
            .await
            .map_err(request_failed)
    }

    async fn progress(
        &self,
        token: ProgressToken,
        progress: f64,
        total: f64,
        message: Option<String>,
    ) -> ChannelResult<()> {
        let peer = self.peer()?;
        let mut params = ProgressNotificationParam::new(token, progress).with_total(total);
        if let Some(message) = message {
            params = params.with_message(message);
        }
        peer.notify_progress(params).await.map_err(request_failed)
    }

    async fn create_message(&self, request: SamplingRequest) -> ChannelResult<String> {
        let peer = self.peer()?;
        if !self.client_supports(|caps| caps.sampling.is_some()) {
            return Err(ChannelError::Unsupported {
                capability: "sampling".to_string(),
            });
        }

        let params = CreateMessageRequestParams::new(
            vec![SamplingMessage::user_text(request.prompt)],
            request.max_tokens,
        )
        .with_system_prompt(request.system_prompt)
        .with_include_context(ContextInclusion::None);

        let result = peer.create_message(params).await.map_err(request_failed)?;
        result
            .message
            .content
            .first()
            .and_then(|content| content.as_text())
            .map(|text| text.text.clone())
            .ok_or_else(|| ChannelError::InvalidResponse {
                message: "sampling result has no text content".to_string(),
            })
    }

    fn supports_elicitation(&self) -> bool {
        self.client_supports(|caps| caps.elicitation.is_some())
    }

    async fn elicit(&self, request: ElicitationRequest) -> ChannelResult<ElicitationResponse> {
        let peer = self.peer()?;
        if !self.supports_elicitation() {
            return Err(ChannelError::Unsupported {
                capability: "elicitation".to_string(),
            });
        }

        let params = CreateElicitationRequestParams::FormElicitationParams {
            meta: None,
            message: request.message,
            requested_schema: request.schema,
        };
        let result = peer
            .create_elicitation(params)
            .await
            .map_err(request_failed)?;

        Ok(ElicitationResponse {
            action: result.action,
            content: result.content,
        })
    }
}
