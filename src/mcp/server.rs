//! MCP server implementation
//!
//! This module implements the per-session MCP server coordinator. It owns
//! the session's capability flags and resource subscriptions, listens on
//! the storage buses and delegates tool calls to the entity tool structs.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::tool::ToolCallContext,
    model::*,
    service::RequestContext,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::events::ListenerGuard;
use crate::render::RenderConfig;

use super::capabilities::{CapabilityFlags, CapabilityKind, CapabilityStateMachine};
use super::client::{ClientChannel, PeerChannel};
use super::subscriptions::{ResourceNotifier, SubscriptionRegistry};
use super::tools::{EntryTools, TagSuggestions, TagTools, VideoTools};
use super::{prompts, resources};

/// Main MCP server coordinator
///
/// Generic over `D: Database` for zero-cost abstraction (no dynamic dispatch).
/// One instance serves one client session.
///
/// # Architecture
///
/// The server delegates to separate tool structs, each responsible for one entity type:
/// - EntryTools: Journal entry operations
/// - TagTools: Tag operations
/// - VideoTools: Year-in-review rendering
pub struct McpServer<D: Database> {
    db: Arc<D>,
    peer: PeerChannel,
    flags: Arc<CapabilityFlags>,
    subscriptions: Arc<SubscriptionRegistry>,
    capabilities: Arc<CapabilityStateMachine<D>>,
    entry_tools: EntryTools<D>,
    tag_tools: TagTools<D>,
    video_tools: VideoTools<D>,
    _guards: Arc<Vec<ListenerGuard>>,
}

impl<D: Database> Clone for McpServer<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            peer: self.peer.clone(),
            flags: Arc::clone(&self.flags),
            subscriptions: Arc::clone(&self.subscriptions),
            capabilities: Arc::clone(&self.capabilities),
            entry_tools: self.entry_tools.clone(),
            tag_tools: self.tag_tools.clone(),
            video_tools: self.video_tools.clone(),
            _guards: Arc::clone(&self._guards),
        }
    }
}

impl<D: Database + 'static> McpServer<D> {
    /// Create a server talking to the session peer attached at `initialize`.
    pub fn new(db: Arc<D>, render: Arc<RenderConfig>) -> Self {
        let peer = PeerChannel::new();
        let channel: Arc<dyn ClientChannel> = Arc::new(peer.clone());
        Self::build(db, render, peer, channel)
    }

    /// Create a server that talks to the client through `channel`.
    pub fn with_channel(
        db: Arc<D>,
        render: Arc<RenderConfig>,
        channel: Arc<dyn ClientChannel>,
    ) -> Self {
        Self::build(db, render, PeerChannel::new(), channel)
    }

    fn build(
        db: Arc<D>,
        render: Arc<RenderConfig>,
        peer: PeerChannel,
        channel: Arc<dyn ClientChannel>,
    ) -> Self {
        let flags = Arc::new(CapabilityFlags::default());
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let capabilities = Arc::new(CapabilityStateMachine::new(
            Arc::clone(&db),
            Arc::clone(&flags),
            Arc::clone(&channel),
        ));
        let notifier = Arc::new(ResourceNotifier::new(
            Arc::clone(&db),
            Arc::clone(&subscriptions),
            Arc::clone(&channel),
        ));

        // Capabilities first so list-changed precedes resource updates.
        let guards = vec![
            db.changes().subscribe_guarded(capabilities.clone()),
            db.changes().subscribe_guarded(notifier.clone()),
            db.video_changes().subscribe_guarded(capabilities.clone()),
            db.video_changes().subscribe_guarded(notifier),
        ];

        Self {
            entry_tools: EntryTools::new(Arc::clone(&db), Arc::clone(&channel)),
            tag_tools: TagTools::new(Arc::clone(&db), Arc::clone(&channel)),
            video_tools: VideoTools::new(Arc::clone(&db), channel, render),
            db,
            peer,
            flags,
            subscriptions,
            capabilities,
            _guards: Arc::new(guards),
        }
    }

    /// Choose when tag suggestions run after `create_entry`.
    pub fn with_tag_suggestions(mut self, suggestions: TagSuggestions) -> Self {
        self.entry_tools = self.entry_tools.with_suggestions(suggestions);
        self
    }

    pub fn flags(&self) -> &CapabilityFlags {
        &self.flags
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Align capability flags with storage without notifying the client.
    pub async fn prime(&self) {
        if let Err(e) = self.capabilities.prime().await {
            warn!(error = %e, "Failed to compute initial capabilities");
        }
    }

    /// Tool definitions currently enabled, sorted by name.
    pub fn tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self
            .entry_tools
            .router()
            .list_all()
            .into_iter()
            .chain(self.tag_tools.router().list_all())
            .chain(self.video_tools.router().list_all())
            .filter(|tool| self.flags.is_enabled(CapabilityKind::Tool, &tool.name))
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    async fn dispatch(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let name = request.name.to_string();
        if !self.flags.is_enabled(CapabilityKind::Tool, &name) {
            debug!(tool = %name, "Rejected call to unavailable tool");
            return Err(McpError::invalid_params(
                "tool_unavailable",
                Some(json!({ "name": name })),
            ));
        }

        if self.entry_tools.router().has_route(&name) {
            let ctx = ToolCallContext::new(&self.entry_tools, request, context);
            return self.entry_tools.router().call(ctx).await;
        }
        if self.tag_tools.router().has_route(&name) {
            let ctx = ToolCallContext::new(&self.tag_tools, request, context);
            return self.tag_tools.router().call(ctx).await;
        }
        if self.video_tools.router().has_route(&name) {
            let ctx = ToolCallContext::new(&self.video_tools, request, context);
            return self.video_tools.router().call(ctx).await;
        }

        Err(McpError::invalid_params(
            "unknown_tool",
            Some(json!({ "name": name })),
        ))
    }
}

impl<D: Database + 'static> ServerHandler for McpServer<D> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(
            ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .enable_resources()
                .enable_resources_list_changed()
                .enable_resources_subscribe()
                .enable_prompts()
                .enable_prompts_list_changed()
                .build(),
        )
        .with_instructions(
            "EpicMe journal server - Write journal entries, organise them with tags and render a year in review. More tools appear as the journal fills up.",
        )
    }

    fn initialize(
        &self,
        request: InitializeRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<InitializeResult, McpError>> + Send + '_ {
        async move {
            if context.peer.peer_info().is_none() {
                context.peer.set_peer_info(request);
            }
            self.peer.attach(context.peer.clone());
            self.prime().await;
            info!("Client session initialized");
            Ok(self.get_info())
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult::with_all_items(self.tools())))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        self.dispatch(request, context)
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move { resources::list(&*self.db, &self.flags).await }
    }

    fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourceTemplatesResult, McpError>> + Send + '_
    {
        std::future::ready(Ok(resources::templates(&self.flags)))
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move { resources::read(&*self.db, &self.flags, &request.uri).await }
    }

    fn subscribe(
        &self,
        request: SubscribeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<(), McpError>> + Send + '_ {
        let added = self.subscriptions.subscribe(request.uri.clone());
        debug!(uri = %request.uri, added, "Resource subscribe");
        std::future::ready(Ok(()))
    }

    fn unsubscribe(
        &self,
        request: UnsubscribeRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<(), McpError>> + Send + '_ {
        let removed = self.subscriptions.unsubscribe(&request.uri);
        debug!(uri = %request.uri, removed, "Resource unsubscribe");
        std::future::ready(Ok(()))
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        std::future::ready(Ok(prompts::list(&self.flags)))
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        async move {
            prompts::get(
                &*self.db,
                &self.flags,
                &request.name,
                request.arguments.as_ref(),
            )
            .await
        }
    }
}
