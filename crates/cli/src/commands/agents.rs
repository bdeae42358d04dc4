use std::path::Path;

use loamdesk_core::domain::agent::AgentIdentity;
use loamdesk_core::errors::ApplicationError;
use loamdesk_store::{AgentChanges, InMemoryAgentDirectory, LeadFilter};

use crate::commands::leads::agent_ref;
use crate::commands::{correlation_id, demo_store, load_config, runtime, CommandResult};

/// Roster change applied to the demo store before the roster is printed. Agents
/// are addressed by id or display name.
#[derive(Debug, Clone, Default)]
pub enum AgentAction {
    #[default]
    List,
    Add(AgentChanges),
    Edit { agent: String, changes: AgentChanges },
    Remove { agent: String },
}

pub fn run(config_path: Option<&Path>, action: AgentAction) -> CommandResult {
    let config = match load_config("agents", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("agents") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let store = demo_store(&config).await?;
        let directory = &store.directory;
        let summary = match action {
            AgentAction::List => None,
            AgentAction::Add(changes) => {
                let agent = directory.add(changes)?;
                Some(format!("agent added: {}", roster_line(&agent)))
            }
            AgentAction::Edit { agent, changes } => {
                let agent = directory.update(&agent_ref(directory, &agent), changes)?;
                Some(format!("agent updated: {}", roster_line(&agent)))
            }
            AgentAction::Remove { agent } => {
                let removed = directory.remove(&agent_ref(directory, &agent))?;
                let filter =
                    LeadFilter { agent: Some(removed.id.clone()), ..LeadFilter::default() };
                let orphaned = store.desk.list(&filter).await?.len();
                let mut line = format!("agent removed: {}", roster_line(&removed));
                if orphaned > 0 {
                    line.push_str(&format!(" ({orphaned} lead(s) still assigned)"));
                }
                Some(line)
            }
        };
        Ok::<_, ApplicationError>((summary, roster(directory)))
    });

    match result {
        Ok((summary, roster)) => {
            let lines = summary.into_iter().chain(roster).collect::<Vec<_>>();
            CommandResult::success("agents", lines.join("\n"))
        }
        Err(error) => {
            CommandResult::from_application_error("agents", error, &correlation_id("agents"))
        }
    }
}

fn roster(directory: &InMemoryAgentDirectory) -> Vec<String> {
    directory.list().iter().map(roster_line).collect()
}

fn roster_line(agent: &AgentIdentity) -> String {
    let state = if agent.active { "active" } else { "inactive" };
    format!("{}  {}  <{}>  {state}", agent.id, agent.name, agent.email)
}
