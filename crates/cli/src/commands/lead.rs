use std::path::Path;

use loamdesk_core::audit::AuditContext;
use loamdesk_core::domain::lead::{LeadId, LeadStatus};
use loamdesk_core::errors::ApplicationError;
use loamdesk_core::intake::review;
use loamdesk_core::lifecycle::{LeadChange, LifecycleOutcome};
use loamdesk_store::InMemoryAgentDirectory;

use crate::commands::leads::{agent_ref, assignment_label, summary_line};
use crate::commands::{
    correlation_id, demo_store, load_config, load_schema, runtime, CommandResult, DemoStore,
};

#[derive(Debug, Clone, Default)]
pub struct LeadEdit {
    pub status: Option<String>,
    pub agent: Option<String>,
    pub unassign: bool,
    pub notes: Option<String>,
    pub actor: String,
}

impl LeadEdit {
    fn is_empty(&self) -> bool {
        self.status.is_none() && self.agent.is_none() && !self.unassign && self.notes.is_none()
    }
}

/// Shows a lead, or applies status, assignment, and notes edits in that order.
/// Edits stop at the first rejection; earlier ones stay applied and are reported.
pub fn run(config_path: Option<&Path>, id: &str, edit: LeadEdit) -> CommandResult {
    let config = match load_config("lead", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let status = match edit.status.as_deref().map(str::parse::<LeadStatus>).transpose() {
        Ok(status) => status,
        Err(error) => return CommandResult::failure("lead", "bad_request", error.to_string(), 4),
    };
    if edit.unassign && edit.agent.is_some() {
        return CommandResult::failure(
            "lead",
            "bad_request",
            "--agent and --unassign cannot be combined",
            4,
        );
    }
    let schema = if edit.is_empty() {
        match load_schema(&config) {
            Ok(schema) => Some(schema),
            Err(error) => {
                return CommandResult::failure("lead", "schema_invalid", error.to_string(), 4);
            }
        }
    } else {
        None
    };
    let runtime = match runtime("lead") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let correlation_id = correlation_id("lead");
    let audit = AuditContext::new(correlation_id.clone(), edit.actor.clone());
    let id = LeadId(id.trim().to_owned());

    let result = runtime.block_on(async {
        let store = demo_store(&config).await?;
        let mut changes = Vec::new();
        let failure = apply_edits(&store, &id, status, &edit, &audit, &mut changes).await.err();
        let lead = match store.desk.get(&id).await {
            Ok(lead) => lead,
            Err(error) => return Err(failure.unwrap_or(error)),
        };
        Ok::<_, ApplicationError>((lead, changes, failure, store.directory))
    });

    let (lead, changes, failure, directory) = match result {
        Ok(output) => output,
        Err(error) => return CommandResult::from_application_error("lead", error, &correlation_id),
    };
    let described = changes.iter().map(|change| describe(change, &directory)).collect::<Vec<_>>();
    if let Some(error) = failure {
        return CommandResult::from_partial_failure("lead", error, &correlation_id, &described);
    }

    let mut lines = vec![summary_line(&lead, &directory)];
    if let Some(schema) = schema {
        for section in review::compile(&schema, lead.application()).sections {
            lines.push(format!("[{}]", section.title));
            lines.extend(
                section
                    .entries
                    .into_iter()
                    .map(|entry| format!("  {}: {}", entry.label, entry.value)),
            );
        }
        let notes = if lead.notes().is_empty() { "(none)" } else { lead.notes() };
        lines.push(format!("notes: {notes}"));
    } else {
        lines.extend(described);
        lines.push(format!("revision {}", lead.revision()));
    }

    CommandResult::success("lead", lines.join("\n"))
}

async fn apply_edits(
    store: &DemoStore,
    id: &LeadId,
    status: Option<LeadStatus>,
    edit: &LeadEdit,
    audit: &AuditContext,
    changes: &mut Vec<LifecycleOutcome>,
) -> Result<(), ApplicationError> {
    if let Some(status) = status {
        changes.push(store.desk.transition(id, status, audit).await?);
    }
    if edit.unassign {
        changes.push(store.desk.assign(id, None, audit).await?);
    } else if let Some(agent) = edit.agent.as_deref() {
        let agent = agent_ref(&store.directory, agent);
        changes.push(store.desk.assign(id, Some(agent), audit).await?);
    }
    if let Some(notes) = edit.notes.clone() {
        changes.push(store.desk.annotate(id, notes, audit).await?);
    }
    Ok(())
}

fn describe(outcome: &LifecycleOutcome, directory: &InMemoryAgentDirectory) -> String {
    let verb = if outcome.applied { "changed" } else { "unchanged" };
    match &outcome.change {
        LeadChange::Status { from, to } => format!("status {verb}: {from} -> {to}"),
        LeadChange::Assignment { from, to } => format!(
            "assignment {verb}: {} -> {}",
            assignment_label(from, directory),
            assignment_label(to, directory)
        ),
        LeadChange::Notes => format!("notes {verb}"),
    }
}
