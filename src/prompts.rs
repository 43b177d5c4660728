//! Prompt template store.
//!
//! Agent instructions are served at runtime through the `prompt_retriever`
//! tool. Templates are embedded at compile time from the `prompts/`
//! directory. An agent either has a single template or a set of use-case
//! variants; variants may include a `default` that is used when no use case
//! is requested. `{instructions_prefix}` placeholders are substituted before
//! a template is returned.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Error, Result};

const INSTRUCTIONS_PREFIX: &str = include_str!("../prompts/instructions_prefix.md");
const AAOSA_INSTRUCTIONS: &str = include_str!("../prompts/aaosa_instructions.md");
const ORCHESTRATOR_DEFAULT: &str =
    include_str!("../prompts/access_request_orchestrator/default.md");
const ORCHESTRATOR_DATAIKU: &str =
    include_str!("../prompts/access_request_orchestrator/dataiku.md");
const ORCHESTRATOR_DI_CAMCOS: &str =
    include_str!("../prompts/access_request_orchestrator/di_camcos.md");
const ORCHESTRATOR_LMS: &str = include_str!("../prompts/access_request_orchestrator/lms.md");
const ONS_AGENT: &str = include_str!("../prompts/ons_agent/default.md");

const PREFIX_PLACEHOLDER: &str = "{instructions_prefix}";

/// A template entry: a single prompt or a set of use-case variants.
#[derive(Debug, Clone)]
enum PromptTemplate {
    Text(&'static str),
    UseCases(BTreeMap<&'static str, &'static str>),
}

/// Store of prompt templates keyed by agent name.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    entries: BTreeMap<&'static str, PromptTemplate>,
}

impl PromptLibrary {
    /// Build the library with the built-in agent templates.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            "instructions_prefix",
            PromptTemplate::Text(INSTRUCTIONS_PREFIX),
        );
        entries.insert(
            "aaosa_instructions",
            PromptTemplate::Text(AAOSA_INSTRUCTIONS),
        );
        entries.insert(
            "access_request_orchestrator_agent",
            PromptTemplate::UseCases(BTreeMap::from([
                ("default", ORCHESTRATOR_DEFAULT),
                ("dataiku", ORCHESTRATOR_DATAIKU),
                ("DI_CAMCOS", ORCHESTRATOR_DI_CAMCOS),
                ("LMS", ORCHESTRATOR_LMS),
            ])),
        );
        // The ONS agent ships the same instructions for every application.
        entries.insert(
            "ons_agent",
            PromptTemplate::UseCases(BTreeMap::from([
                ("default", ONS_AGENT),
                ("dataiku", ONS_AGENT),
                ("DI_CAMCOS", ONS_AGENT),
            ])),
        );
        Self { entries }
    }

    /// Names of all known agents.
    pub fn agent_names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Retrieve the instructions for an agent, optionally for a specific use
    /// case, with the instructions prefix substituted in.
    pub fn retrieve(&self, agent_name: &str, use_case: Option<&str>) -> Result<String> {
        debug!(
            "retrieving prompt for agent={} use_case={:?}",
            agent_name, use_case
        );

        let template = self.entries.get(agent_name).ok_or_else(|| {
            Error::NotFound(format!(
                "no prompt found for agent '{}', available agents: {}",
                agent_name,
                self.entries
                    .keys()
                    .copied()
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;

        let prompt = match template {
            PromptTemplate::UseCases(cases) => match use_case {
                Some(case) => *cases.get(case).ok_or_else(|| {
                    Error::NotFound(format!(
                        "use case '{}' not found for agent '{}', available use cases: {}",
                        case,
                        agent_name,
                        cases.keys().copied().collect::<Vec<_>>().join(", ")
                    ))
                })?,
                None => match cases.get("default") {
                    Some(default) => *default,
                    None => {
                        return Err(Error::InvalidParams(format!(
                            "agent '{}' supports multiple use cases, specify one of: {}",
                            agent_name,
                            cases.keys().copied().collect::<Vec<_>>().join(", ")
                        )))
                    }
                },
            },
            PromptTemplate::Text(text) => {
                if use_case.is_some() {
                    warn!(
                        "agent '{}' does not support use cases, ignoring use_case parameter",
                        agent_name
                    );
                }
                *text
            }
        };

        Ok(prompt.replace(PREFIX_PLACEHOLDER, INSTRUCTIONS_PREFIX))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}
