//! Tool registrar (spec §4.15): composes every configured endpoint,
//! command, knowledge, and auth-setup tool into one lookup map, the way
//! `sa_gateway::nodes::router::ToolRouter::resolve` composed routing
//! destinations and `ProviderRegistry` built its provider lookup at
//! construction time.

use std::collections::HashMap;

use fusion_domain::config::{AuthType, Config};

#[derive(Debug, Clone)]
pub enum KnowledgeOp {
    Set,
    Get,
    Delete,
}

#[derive(Debug, Clone)]
pub enum ToolDefinition {
    Endpoint { service_id: String, endpoint_id: String },
    Command { group_id: String, command_id: String },
    Knowledge(KnowledgeOp),
    AuthSetup { service_id: String },
}

/// Builds the full `{name} -> ToolDefinition` map for a loaded `Config`:
/// one tool per `(service, endpoint)` pair, one per `(command group,
/// command)` pair, the three fixed knowledge tools, and one `{service}_auth_setup`
/// tool for every service whose auth type needs interactive setup (spec §4.15).
pub fn build_tool_map(config: &Config) -> HashMap<String, ToolDefinition> {
    let mut tools = HashMap::new();

    for (service_id, service) in &config.services {
        for endpoint in &service.endpoints {
            let name = format!("{service_id}_{}", endpoint.id);
            tools.insert(
                name,
                ToolDefinition::Endpoint { service_id: service_id.clone(), endpoint_id: endpoint.id.clone() },
            );
        }
        if matches!(service.auth.auth_type, AuthType::Oauth2External | AuthType::UserCredentials) {
            tools.insert(format!("{service_id}_auth_setup"), ToolDefinition::AuthSetup { service_id: service_id.clone() });
        }
    }

    for (group_id, group) in &config.commands {
        for command in &group.commands {
            let name = format!("{group_id}_{}", command.id);
            tools.insert(name, ToolDefinition::Command { group_id: group_id.clone(), command_id: command.id.clone() });
        }
    }

    tools.insert("knowledge_set".to_string(), ToolDefinition::Knowledge(KnowledgeOp::Set));
    tools.insert("knowledge_get".to_string(), ToolDefinition::Knowledge(KnowledgeOp::Get));
    tools.insert("knowledge_delete".to_string(), ToolDefinition::Knowledge(KnowledgeOp::Delete));

    tools
}
