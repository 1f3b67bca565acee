//! Routes one resolved tool call to the collaborator that owns it —
//! `HttpHandler` for endpoint tools, `CommandHandler` for command tools,
//! `KnowledgeHandler` for the three knowledge tools, `AuthSetupHandler` for
//! `{service}_auth_setup` — the way `sa_gateway::nodes::router::ToolRouter`
//! dispatched a resolved route to its destination handler.

use serde_json::{Map, Value};

use fusion_domain::error::{Error, Result};
use fusion_domain::tenant::TenantContext;
use tokio_util::sync::CancellationToken;

use crate::auth_setup::configured_instructions;
use crate::bootstrap::Gateway;
use crate::registrar::{KnowledgeOp, ToolDefinition};

impl Gateway {
    /// Looks up `tool_name` and dispatches; `Error::Configuration` for an
    /// unknown tool name (the registrar is the single source of truth for
    /// what tools exist).
    pub async fn invoke_tool(&self, tool_name: &str, args: Map<String, Value>, ctx: &TenantContext, cancel: CancellationToken) -> Result<String> {
        let definition = self.tools.get(tool_name).ok_or_else(|| {
            Error::config("tool_name", tool_name, "no tool registered under this name")
        })?;

        match definition {
            ToolDefinition::Endpoint { service_id, endpoint_id } => {
                let service = self.config.services.get(service_id).ok_or_else(|| {
                    Error::config("service_id", service_id, "service no longer present in config")
                })?;
                let endpoint = service.endpoints.iter().find(|e| &e.id == endpoint_id).ok_or_else(|| {
                    Error::config("endpoint_id", endpoint_id, "endpoint no longer present in service config")
                })?;
                self.http_handler.call_endpoint(service_id, service, endpoint, args, ctx).await
            }
            ToolDefinition::Command { group_id, command_id } => {
                let group = self.config.commands.get(group_id).ok_or_else(|| {
                    Error::config("group_id", group_id, "command group no longer present in config")
                })?;
                let command = group.commands.iter().find(|c| &c.id == command_id).ok_or_else(|| {
                    Error::config("command_id", command_id, "command no longer present in group config")
                })?;
                self.command_handler.invoke(command, args, cancel).await
            }
            ToolDefinition::Knowledge(op) => match op {
                KnowledgeOp::Set => self.knowledge_handler.set(ctx, args).await,
                KnowledgeOp::Get => self.knowledge_handler.get(ctx, args).await,
                KnowledgeOp::Delete => self.knowledge_handler.delete(ctx, args).await,
            },
            ToolDefinition::AuthSetup { service_id } => {
                let service = self.config.services.get(service_id).ok_or_else(|| {
                    Error::config("service_id", service_id, "service no longer present in config")
                })?;
                let instructions = configured_instructions(&service.auth);
                self.auth_setup_handler.invoke(ctx, service_id, instructions.as_deref()).await
            }
        }
    }
}
