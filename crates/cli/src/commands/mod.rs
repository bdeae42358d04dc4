pub mod agents;
pub mod config;
pub mod intake;
pub mod lead;
pub mod leads;
pub mod schema;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use loamdesk_core::audit::TracingAuditSink;
use loamdesk_core::config::{AppConfig, LoadOptions};
use loamdesk_core::errors::{ApplicationError, InterfaceError};
use loamdesk_core::intake::loan::loan_application_schema;
use loamdesk_core::intake::schema::{SchemaError, WizardSchema};
use loamdesk_core::lifecycle::LeadLifecycle;
use loamdesk_store::fixtures::{demo_agents, seed_demo_leads};
use loamdesk_store::{InMemoryAgentDirectory, InMemoryLeadRepository, LeadDesk};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub(crate) fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        Self::from_partial_failure(command, error, correlation_id, &[])
    }

    /// Failure after some changes were already committed; `applied` lines lead the message.
    pub(crate) fn from_partial_failure(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
        applied: &[String],
    ) -> Self {
        let interface = error.into_interface(correlation_id);
        let (class, exit_code) = match &interface {
            InterfaceError::BadRequest { .. } => ("bad_request", 4),
            InterfaceError::NotFound { .. } => ("not_found", 4),
            InterfaceError::ServiceUnavailable { .. } => ("service_unavailable", 5),
            InterfaceError::Internal { .. } => ("internal", 5),
        };
        let failure = format!("{} ({interface})", interface.user_message());
        let message = if applied.is_empty() {
            failure
        } else {
            format!("{}\nstopped: {failure}", applied.join("\n"))
        };
        Self::failure(command, class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, config_path: Option<&Path>) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    })
    .map_err(|error| {
        CommandResult::failure(command, "config_validation", format!("configuration issue: {error}"), 2)
    })
}

/// Configured wizard definition, falling back to the built-in loan application.
pub(crate) fn load_schema(config: &AppConfig) -> Result<WizardSchema, SchemaError> {
    match &config.intake.schema_path {
        Some(path) => WizardSchema::load(path),
        None => loan_application_schema(),
    }
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime_init",
            format!("failed to initialize async runtime: {error}"),
            3,
        )
    })
}

pub(crate) type DemoDesk =
    LeadDesk<InMemoryLeadRepository, Arc<InMemoryAgentDirectory>, TracingAuditSink>;

/// Demo lead store seeded with the sample leads and agent roster. State lives only
/// for the current invocation.
pub(crate) struct DemoStore {
    pub repository: Arc<InMemoryLeadRepository>,
    pub directory: Arc<InMemoryAgentDirectory>,
    pub desk: DemoDesk,
}

pub(crate) async fn demo_store(config: &AppConfig) -> Result<DemoStore, ApplicationError> {
    let repository = Arc::new(InMemoryLeadRepository::default());
    let directory = Arc::new(InMemoryAgentDirectory::new(demo_agents()));
    seed_demo_leads(repository.as_ref(), directory.as_ref()).await?;

    let lifecycle =
        LeadLifecycle::new(Arc::clone(&directory), TracingAuditSink, config.lifecycle.policy);
    let desk = LeadDesk::new(Arc::clone(&repository), lifecycle);
    Ok(DemoStore { repository, directory, desk })
}

pub(crate) fn correlation_id(command: &str) -> String {
    format!("cli-{command}-{}", std::process::id())
}
