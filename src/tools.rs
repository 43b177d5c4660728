//! Tool definitions for the access portal.
//!
//! Each tool is a stateless named operation: a JSON-Schema-described
//! argument mapping in, a structured result out. The registry is a plain
//! forwarding table from tool name to implementation. Failures inside a
//! tool (malformed arguments, unreadable tables, upstream errors) become
//! structured `isError` results; only an unknown tool name is a
//! protocol-level error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::PortalConfig;
use crate::dispatch::IncidentDispatcher;
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeBase;
use crate::prompts::PromptLibrary;
use crate::protocol::{ToolCallResult, ToolDefinition};
use crate::tickets::{TicketClient, TicketRequest};

/// Tool trait for implementing MCP tools.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult>;
}

/// Shared state passed to tools during execution.
pub struct ToolContext {
    /// Knowledge tables.
    pub knowledge: KnowledgeBase,
    /// Prompt template store.
    pub prompts: PromptLibrary,
    /// Ticket system client.
    pub tickets: TicketClient,
    /// Incident debugging dispatcher.
    pub dispatcher: IncidentDispatcher,
}

impl ToolContext {
    /// Build the context from server configuration.
    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        let tickets = if config.mock_tickets {
            TicketClient::mock()
        } else {
            match &config.servicenow {
                Some(snow) => TicketClient::servicenow(snow.clone())?,
                None => {
                    return Err(Error::Config(
                        "servicenow credentials required when mock tickets are disabled".into(),
                    ))
                }
            }
        };

        Ok(Self {
            knowledge: KnowledgeBase::new(&config.knowdocs_dir),
            prompts: PromptLibrary::new(),
            tickets,
            dispatcher: IncidentDispatcher::new(
                config.incident_debug_url.clone(),
                config.dispatch_timeout,
            ),
        })
    }
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    /// Create a registry with the default portal tools.
    pub fn new(context: ToolContext) -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
            context: Arc::new(context),
        };
        registry.register_default_tools();
        registry
    }

    fn register_default_tools(&mut self) {
        self.register(Arc::new(UserVerificationTool));
        self.register(Arc::new(TrainingRequirementsTool));
        self.register(Arc::new(TrainingCompletionsTool));
        self.register(Arc::new(ApprovalsRequiredTool));
        self.register(Arc::new(PromptRetrieverTool));
        self.register(Arc::new(TicketCreatorTool));
        self.register(Arc::new(TicketVerificationTool));
        self.register(Arc::new(IncidentDebuggingTool));
    }

    /// Register a tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        self.tools.insert(name, tool);
    }

    /// Get all tool definitions.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.tools.values().map(|tool| tool.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Registered tool names.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Execute a tool by name. Tool failures come back as `isError`
    /// results; only an unknown name is an `Err`.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<ToolCallResult> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::InvalidParams(format!("unknown tool: {}", name)))?;

        match tool.execute(arguments, &self.context).await {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!("tool {} failed: {}", name, err);
                Ok(ToolCallResult::failure(err.to_string()))
            }
        }
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments).map_err(|err| Error::InvalidParams(err.to_string()))
}

// =============================================================================
// Tool Implementations
// =============================================================================

/// Verifies a user's identity against the central users table.
pub struct UserVerificationTool;

#[derive(Debug, Deserialize)]
struct UserVerificationArgs {
    user_id: String,
    dataiku_id: String,
}

#[async_trait::async_trait]
impl Tool for UserVerificationTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "user_verification".into(),
            description: "Verify a user's identity against the central users table.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "The user's ID in the system"
                    },
                    "dataiku_id": {
                        "type": "string",
                        "description": "The user's Dataiku ID"
                    }
                },
                "required": ["user_id", "dataiku_id"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: UserVerificationArgs = parse_args(arguments)?;
        let verified = context
            .knowledge
            .verify_user(args.user_id.trim(), args.dataiku_id.trim())?;
        ToolCallResult::json(&json!(verified))
    }
}

/// Returns training requirements for an environment.
pub struct TrainingRequirementsTool;

#[derive(Debug, Deserialize)]
struct TrainingRequirementsArgs {
    env: String,
}

#[async_trait::async_trait]
impl Tool for TrainingRequirementsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "training_requirements".into(),
            description: "Return training requirements for a specific environment.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "env": {
                        "type": "string",
                        "description": "The environment type (DEV, QA, PROD, CORE++)"
                    }
                },
                "required": ["env"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: TrainingRequirementsArgs = parse_args(arguments)?;
        let requirements = context.knowledge.training_requirements(&args.env)?;
        ToolCallResult::json(&requirements)
    }
}

/// Checks a training completion by certificate id.
pub struct TrainingCompletionsTool;

#[derive(Debug, Deserialize)]
struct TrainingCompletionsArgs {
    user_id: String,
    training_name: String,
    certificate_id: String,
}

#[async_trait::async_trait]
impl Tool for TrainingCompletionsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "training_completions".into(),
            description:
                "Check if a user has completed a specific training using their certificate ID."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "user_id": {
                        "type": "string",
                        "description": "The user's ID in the system"
                    },
                    "training_name": {
                        "type": "string",
                        "description": "The name of the training to verify"
                    },
                    "certificate_id": {
                        "type": "string",
                        "description": "The user's provided certificate ID for the training"
                    }
                },
                "required": ["user_id", "training_name", "certificate_id"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: TrainingCompletionsArgs = parse_args(arguments)?;
        let completed = context.knowledge.training_completed(
            args.user_id.trim(),
            args.training_name.trim(),
            args.certificate_id.trim(),
        )?;
        ToolCallResult::json(&json!(completed))
    }
}

/// Checks whether an access type is permitted for an environment.
pub struct ApprovalsRequiredTool;

#[derive(Debug, Deserialize)]
struct ApprovalsRequiredArgs {
    env: String,
    access_type: String,
}

#[async_trait::async_trait]
impl Tool for ApprovalsRequiredTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "approvals_required".into(),
            description:
                "Check if a requested access type is permitted for a given environment based on company policies."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "env": {
                        "type": "string",
                        "description": "The environment type (e.g., DEV, PROD)"
                    },
                    "access_type": {
                        "type": "string",
                        "description": "The type of access requested (e.g., Read, Write)"
                    }
                },
                "required": ["env", "access_type"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: ApprovalsRequiredArgs = parse_args(arguments)?;
        let permitted = context
            .knowledge
            .access_permitted(&args.env, &args.access_type)?;
        ToolCallResult::json(&json!(permitted))
    }
}

/// Retrieves agent instructions from the prompt store.
pub struct PromptRetrieverTool;

#[derive(Debug, Deserialize)]
struct PromptRetrieverArgs {
    agent_name: String,
    use_case: Option<String>,
}

#[async_trait::async_trait]
impl Tool for PromptRetrieverTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "prompt_retriever".into(),
            description:
                "Retrieve agent instructions/prompts from the server. Allows agents to dynamically fetch their instructions."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "agent_name": {
                        "type": "string",
                        "description": "The name of the agent to get instructions for"
                    },
                    "use_case": {
                        "type": "string",
                        "description": "Optional: the specific use case for agents that support multiple applications"
                    }
                },
                "required": ["agent_name"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: PromptRetrieverArgs = parse_args(arguments)?;
        let agent_name = args.agent_name.trim();
        if agent_name.is_empty() {
            return Err(Error::InvalidParams("agent_name parameter is required".into()));
        }
        let use_case = args
            .use_case
            .as_deref()
            .map(str::trim)
            .filter(|case| !case.is_empty());
        let prompt = context.prompts.retrieve(agent_name, use_case)?;
        Ok(ToolCallResult::text(prompt))
    }
}

/// Creates an incident ticket.
pub struct TicketCreatorTool;

#[derive(Debug, Deserialize, Default)]
struct TicketCreatorArgs {
    short_description: Option<String>,
    description: Option<String>,
    #[serde(default)]
    urgency: Option<Value>,
    #[serde(default)]
    impact: Option<Value>,
    category: Option<String>,
}

#[async_trait::async_trait]
impl Tool for TicketCreatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "ons_ticket_creator".into(),
            description: "Create an incident ticket for an access request and return its number."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "short_description": {
                        "type": "string",
                        "description": "Brief description of the incident"
                    },
                    "description": {
                        "type": "string",
                        "description": "Detailed description"
                    },
                    "urgency": {
                        "type": "string",
                        "description": "1-3, defaults to 3"
                    },
                    "impact": {
                        "type": "string",
                        "description": "1-3, defaults to 3"
                    },
                    "category": {
                        "type": "string",
                        "description": "Category, defaults to 'inquiry'"
                    }
                },
                "required": []
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: TicketCreatorArgs = parse_args(arguments)?;
        let defaults = TicketRequest::default();
        let request = TicketRequest {
            short_description: args.short_description.unwrap_or(defaults.short_description),
            description: args.description.unwrap_or(defaults.description),
            urgency: args.urgency.map(value_to_string).unwrap_or(defaults.urgency),
            impact: args.impact.map(value_to_string).unwrap_or(defaults.impact),
            category: args.category.unwrap_or(defaults.category),
        };

        let record = context.tickets.create(request).await?;
        ToolCallResult::json(&serde_json::to_value(record)?)
    }
}

/// Verifies an incident ticket.
pub struct TicketVerificationTool;

#[derive(Debug, Deserialize)]
struct TicketVerificationArgs {
    ticket_number: String,
    #[serde(default)]
    return_details: bool,
}

#[async_trait::async_trait]
impl Tool for TicketVerificationTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "ons_ticket_verification".into(),
            description: "Verify an incident ticket exists and optionally retrieve its details."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ticket_number": {
                        "type": "string",
                        "description": "The incident number to verify (e.g., 'INC0010374')"
                    },
                    "return_details": {
                        "type": "boolean",
                        "description": "If true, return full incident details (defaults to false)"
                    }
                },
                "required": ["ticket_number"]
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: TicketVerificationArgs = parse_args(arguments)?;
        let verification = context.tickets.verify(&args.ticket_number).await?;

        if args.return_details {
            ToolCallResult::json(&serde_json::to_value(verification)?)
        } else {
            ToolCallResult::json(&json!(verification.exists))
        }
    }
}

/// Forwards an incident to the external debugging network.
pub struct IncidentDebuggingTool;

#[derive(Debug, Deserialize, Default)]
struct IncidentDebuggingArgs {
    incident_number: Option<String>,
}

#[async_trait::async_trait]
impl Tool for IncidentDebuggingTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "incident_debugging".into(),
            description:
                "Send an incident to the external debugging agent network for analysis and return the solution."
                    .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "incident_number": {
                        "type": "string",
                        "description": "The incident number to analyze"
                    }
                },
                "required": []
            }),
        }
    }

    async fn execute(&self, arguments: Value, context: &ToolContext) -> Result<ToolCallResult> {
        let args: IncidentDebuggingArgs = parse_args(arguments)?;
        let analysis = context
            .dispatcher
            .analyze(args.incident_number.as_deref())
            .await;
        Ok(ToolCallResult::text(analysis))
    }
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
