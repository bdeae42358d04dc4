use std::path::Path;

use loamdesk_core::domain::agent::{AgentDirectory, AgentId};
use loamdesk_core::domain::lead::{Assignment, LeadRecord, LeadStatus};
use loamdesk_core::intake::format;
use loamdesk_store::{InMemoryAgentDirectory, LeadFilter};

use crate::commands::{correlation_id, demo_store, load_config, runtime, CommandResult};

#[derive(Debug, Clone, Default)]
pub struct LeadsQuery {
    pub status: Option<String>,
    pub agent: Option<String>,
    pub search: Option<String>,
}

pub fn run(config_path: Option<&Path>, query: LeadsQuery) -> CommandResult {
    let config = match load_config("leads", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let status = match query.status.as_deref().map(str::parse::<LeadStatus>).transpose() {
        Ok(status) => status,
        Err(error) => return CommandResult::failure("leads", "bad_request", error.to_string(), 4),
    };
    let runtime = match runtime("leads") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let store = demo_store(&config).await?;
        let filter = LeadFilter {
            status,
            agent: query.agent.as_deref().map(|agent| agent_ref(&store.directory, agent)),
            search: query.search.clone(),
        };
        let leads = store.desk.list(&filter).await?;
        Ok::<_, loamdesk_core::errors::ApplicationError>((leads, store.directory))
    });

    match result {
        Ok((leads, _)) if leads.is_empty() => CommandResult::success("leads", "no leads match"),
        Ok((leads, directory)) => {
            let lines =
                leads.iter().map(|lead| summary_line(lead, &directory)).collect::<Vec<_>>();
            CommandResult::success("leads", lines.join("\n"))
        }
        Err(error) => CommandResult::from_application_error("leads", error, &correlation_id("leads")),
    }
}

/// Accepts an agent id or a display name.
pub(crate) fn agent_ref(directory: &InMemoryAgentDirectory, raw: &str) -> AgentId {
    directory
        .find_by_name(raw)
        .map(|agent| agent.id)
        .unwrap_or_else(|| AgentId(raw.trim().to_owned()))
}

pub(crate) fn assignment_label(assignment: &Assignment, directory: &InMemoryAgentDirectory) -> String {
    match assignment {
        Assignment::Agent(id) => {
            directory.resolve(id).map(|agent| agent.name).unwrap_or_else(|_| id.to_string())
        }
        other => other.to_string(),
    }
}

pub(crate) fn summary_line(lead: &LeadRecord, directory: &InMemoryAgentDirectory) -> String {
    let amount = lead
        .application()
        .get("loanAmount")
        .and_then(|value| value.as_number())
        .map(format::currency)
        .unwrap_or_else(|| "-".to_owned());
    format!(
        "{}  {}  {}  {}  {}  {}  {}",
        lead.id(),
        lead.reference(),
        lead.applicant_name().unwrap_or_else(|| "(unnamed)".to_owned()),
        lead.status(),
        assignment_label(lead.assignment(), directory),
        amount,
        lead.submitted_at().format("%Y-%m-%d"),
    )
}
