pub mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use loamdesk_core::config::{AppConfig, LoadOptions, LogFormat};
use loamdesk_store::AgentChanges;
use tracing_subscriber::EnvFilter;

use commands::agents::AgentAction;
use commands::lead::LeadEdit;
use commands::leads::LeadsQuery;

#[derive(Debug, Parser)]
#[command(
    name = "loamdesk",
    about = "Loamdesk operator CLI",
    long_about = "Inspect configuration and the intake wizard, submit applications, and review loan leads.",
    after_help = "Examples:\n  loamdesk schema\n  loamdesk intake --answers application.toml\n  loamdesk lead 3 --status approved --agent \"Mike Brown\""
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file (defaults to loamdesk.toml or config/loamdesk.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "List the intake wizard steps, fields, and cross-field rules")]
    Schema,
    #[command(about = "Run an answers file through the intake wizard and submit it")]
    Intake {
        #[arg(long, help = "TOML or JSON file mapping field keys to answers")]
        answers: PathBuf,
    },
    #[command(about = "List demo leads, newest first")]
    Leads {
        #[arg(long, help = "pending|reviewing|approved|declined")]
        status: Option<String>,
        #[arg(long, help = "Agent id or name")]
        agent: Option<String>,
        #[arg(long, help = "Match applicant name, email, or reference")]
        search: Option<String>,
    },
    #[command(about = "Show a lead, or change its status, assignment, or notes")]
    Lead {
        id: String,
        #[arg(long, help = "pending|reviewing|approved|declined")]
        status: Option<String>,
        #[arg(long, conflicts_with = "unassign", help = "Agent id or name")]
        agent: Option<String>,
        #[arg(long, help = "Record an explicit unassigned decision")]
        unassign: bool,
        #[arg(long, help = "Replace the lead notes")]
        notes: Option<String>,
        #[arg(long, default_value = "operator", help = "Actor recorded in the audit trail")]
        actor: String,
    },
    #[command(about = "List the agent roster, or add, edit, activate, deactivate, or remove an agent")]
    Agents {
        #[command(subcommand)]
        action: Option<AgentsCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum AgentsCommand {
    #[command(about = "Add an agent to the roster")]
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, help = "Add the agent as inactive")]
        inactive: bool,
    },
    #[command(about = "Change an agent's name or email")]
    Edit {
        #[arg(help = "Agent id or name")]
        agent: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    #[command(about = "Make an agent assignable again")]
    Activate {
        #[arg(help = "Agent id or name")]
        agent: String,
    },
    #[command(about = "Stop new assignments to an agent")]
    Deactivate {
        #[arg(help = "Agent id or name")]
        agent: String,
    },
    #[command(about = "Remove an agent from the roster")]
    Remove {
        #[arg(help = "Agent id or name")]
        agent: String,
    },
}

impl From<AgentsCommand> for AgentAction {
    fn from(command: AgentsCommand) -> Self {
        let toggle = |agent, active| AgentAction::Edit {
            agent,
            changes: AgentChanges { active: Some(active), ..AgentChanges::default() },
        };
        match command {
            AgentsCommand::Add { name, email, inactive } => AgentAction::Add(AgentChanges {
                name: Some(name),
                email: Some(email),
                active: Some(!inactive),
            }),
            AgentsCommand::Edit { agent, name, email } => {
                AgentAction::Edit { agent, changes: AgentChanges { name, email, active: None } }
            }
            AgentsCommand::Activate { agent } => toggle(agent, true),
            AgentsCommand::Deactivate { agent } => toggle(agent, false),
            AgentsCommand::Remove { agent } => AgentAction::Remove { agent },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    init_logging(config_path);

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(config_path) }
        }
        Command::Schema => commands::schema::run(config_path),
        Command::Intake { answers } => commands::intake::run(config_path, &answers),
        Command::Leads { status, agent, search } => {
            commands::leads::run(config_path, LeadsQuery { status, agent, search })
        }
        Command::Lead { id, status, agent, unassign, notes, actor } => commands::lead::run(
            config_path,
            &id,
            LeadEdit { status, agent, unassign, notes, actor },
        ),
        Command::Agents { action } => {
            commands::agents::run(config_path, action.map(AgentAction::from).unwrap_or_default())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON envelope. `RUST_LOG` wins over
/// the configured level. Config errors are reported by the command itself.
fn init_logging(config_path: Option<&Path>) {
    let config = AppConfig::load(LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        ..LoadOptions::default()
    })
    .unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.trim().to_ascii_lowercase()));
    let builder =
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
