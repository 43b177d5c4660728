//! Enterprise Access Portal MCP Server
//!
//! This crate is the tool-server half of an enterprise access-request
//! portal. It exposes a fixed set of validation, prompt-retrieval, ticket
//! and dispatch tools over the MCP protocol; the multi-agent routing that
//! drives them lives in an external orchestration framework that consumes
//! the declarative network file in `config/agent_network.yaml`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               External orchestration framework                   │
//! │        (access_request_orchestrator_agent, ons_agent)            │
//! └───────────────────────────┬─────────────────────────────────────┘
//!                             │ MCP (JSON-RPC over stdio or HTTP)
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       access-portal-mcp                          │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐   │
//! │  │ Knowledge  │ │ Prompt     │ │ Ticket     │ │ Incident   │   │
//! │  │ Tables     │ │ Library    │ │ Client     │ │ Dispatcher │   │
//! │  └─────┬──────┘ └────────────┘ └─────┬──────┘ └─────┬──────┘   │
//! └────────┼─────────────────────────────┼──────────────┼──────────┘
//!          ▼                             ▼              ▼
//!   knowdocs/*.md                  ServiceNow      debugging agent
//!   (read-only tables)             (or mock)       network (or fallback)
//! ```
//!
//! # MCP Tools
//!
//! | Tool | Description |
//! |------|-------------|
//! | `user_verification` | Verify a user against the central users table |
//! | `training_requirements` | Training requirements for an environment |
//! | `training_completions` | Check a training completion by certificate |
//! | `approvals_required` | Policy check for (environment, access type) |
//! | `prompt_retriever` | Fetch agent instructions by name and use case |
//! | `ons_ticket_creator` | Open an incident ticket (mock or ServiceNow) |
//! | `ons_ticket_verification` | Verify an incident ticket exists |
//! | `incident_debugging` | Forward an incident to the debugging network |

pub mod config;
pub mod dispatch;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod knowledge;
pub mod prompts;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod tickets;
pub mod tools;

pub use config::{PortalConfig, ServiceNowConfig};
pub use dispatch::IncidentDispatcher;
pub use error::{Error, Result};
pub use knowledge::KnowledgeBase;
pub use prompts::PromptLibrary;
pub use protocol::{McpRequest, McpResponse};
pub use registry::AgentNetwork;
pub use server::PortalMcpServer;
pub use tickets::TicketClient;
pub use tools::{ToolContext, ToolRegistry};
