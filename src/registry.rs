//! Declarative agent-network routing table.
//!
//! The routing table names the agents, the prompt template each resolves
//! its instructions from, the tools each may call, and the down-chain
//! agents each may delegate to. It is consumed verbatim by the external
//! orchestration framework; this server only loads it at startup and
//! validates that every reference resolves.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::prompts::PromptLibrary;

/// The agent network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNetwork {
    /// Network name.
    pub name: String,
    /// Agent declarations.
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

/// A single agent declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Agent name.
    pub name: String,
    /// Where the agent's instructions come from.
    #[serde(default)]
    pub instructions: Option<InstructionsRef>,
    /// Tools the agent may call.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Down-chain agents the agent may delegate to.
    #[serde(default)]
    pub down_chain: Vec<String>,
}

/// Reference into the prompt template store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionsRef {
    /// Template agent name.
    pub agent: String,
    /// Optional use case.
    #[serde(default)]
    pub use_case: Option<String>,
}

impl AgentNetwork {
    /// Load the network from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse the network from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Check that every tool, down-chain and instructions reference
    /// resolves.
    pub fn validate(&self, known_tools: &[String], prompts: &PromptLibrary) -> Result<()> {
        for agent in &self.agents {
            for tool in &agent.tools {
                if !known_tools.contains(tool) {
                    return Err(Error::Config(format!(
                        "agent '{}' references unknown tool '{}'",
                        agent.name, tool
                    )));
                }
            }
            for down in &agent.down_chain {
                if !self.agents.iter().any(|other| &other.name == down) {
                    return Err(Error::Config(format!(
                        "agent '{}' references unknown down-chain agent '{}'",
                        agent.name, down
                    )));
                }
            }
            if let Some(instructions) = &agent.instructions {
                prompts.retrieve(&instructions.agent, instructions.use_case.as_deref())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
name: enterprise_access_portal
agents:
  - name: access_request_orchestrator_agent
    instructions:
      agent: access_request_orchestrator_agent
      use_case: dataiku
    tools:
      - user_verification
      - prompt_retriever
    down_chain:
      - ons_agent
  - name: ons_agent
    instructions:
      agent: ons_agent
    tools:
      - ons_ticket_verification
";

    fn known_tools() -> Vec<String> {
        ["user_verification", "prompt_retriever", "ons_ticket_verification"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_and_validate() {
        let network = AgentNetwork::from_yaml(SAMPLE).unwrap();
        assert_eq!(network.agents.len(), 2);
        network
            .validate(&known_tools(), &PromptLibrary::new())
            .unwrap();
    }

    #[test]
    fn test_unknown_tool_rejected() {
        let network = AgentNetwork::from_yaml(SAMPLE).unwrap();
        let tools = vec!["prompt_retriever".to_string()];
        let err = network.validate(&tools, &PromptLibrary::new()).unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn test_unknown_down_chain_rejected() {
        let yaml = "\
name: portal
agents:
  - name: orchestrator
    down_chain: [missing_agent]
";
        let network = AgentNetwork::from_yaml(yaml).unwrap();
        let err = network.validate(&[], &PromptLibrary::new()).unwrap_err();
        assert!(err.to_string().contains("down-chain"));
    }

    #[test]
    fn test_unknown_instructions_rejected() {
        let yaml = "\
name: portal
agents:
  - name: orchestrator
    instructions:
      agent: nobody
";
        let network = AgentNetwork::from_yaml(yaml).unwrap();
        assert!(network.validate(&[], &PromptLibrary::new()).is_err());
    }

    #[test]
    fn test_shipped_network_is_valid() {
        let network = AgentNetwork::from_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/config/agent_network.yaml"
        ))
        .unwrap();
        let tools: Vec<String> = [
            "user_verification",
            "training_requirements",
            "training_completions",
            "approvals_required",
            "prompt_retriever",
            "ons_ticket_creator",
            "ons_ticket_verification",
            "incident_debugging",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        network.validate(&tools, &PromptLibrary::new()).unwrap();
    }
}
