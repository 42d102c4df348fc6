//! Workspace and agent API types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::provider::types::Agent;

/// A workspace as exposed to dashboard clients. The provider API key is
/// deliberately not part of this type: credentials never leave the process.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceResponse {
    pub name: String,
}

/// An agent with its display name (synthesized from the identifier prefix
/// when the provider supplies none).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentResponse {
    pub agent_id: String,
    pub name: String,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            agent_id: agent.agent_id,
            name: agent.name,
        }
    }
}
