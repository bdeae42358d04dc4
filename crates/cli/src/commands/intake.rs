use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};

use loamdesk_core::intake::controller::{StepOutcome, SubmitOutcome, WizardController};
use loamdesk_core::intake::review::ReviewSummary;
use loamdesk_core::intake::validation::ErrorMap;
use loamdesk_core::intake::values::ValueMap;
use loamdesk_store::RepositorySubmissionService;

use crate::commands::{correlation_id, demo_store, load_config, load_schema, runtime, CommandResult};

/// Runs the answers file through the wizard step by step, then submits it.
pub fn run(config_path: Option<&Path>, answers_path: &Path) -> CommandResult {
    let config = match load_config("intake", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let schema = match load_schema(&config) {
        Ok(schema) => Arc::new(schema),
        Err(error) => {
            return CommandResult::failure("intake", "schema_invalid", error.to_string(), 4);
        }
    };
    let answers = match load_answers(answers_path) {
        Ok(answers) => answers,
        Err(error) => {
            return CommandResult::failure("intake", "answers_invalid", format!("{error:#}"), 4);
        }
    };

    let mut wizard = WizardController::new(schema);
    for (key, value) in answers {
        if let Err(error) = wizard.set_field(&key, value) {
            return CommandResult::failure("intake", "answers_invalid", error.to_string(), 4);
        }
    }

    while !wizard.is_last_step() {
        match wizard.next() {
            Ok(StepOutcome::Blocked { step, errors }) => {
                let title = wizard.schema().steps()[step].title.clone();
                return blocked(&title, &errors);
            }
            Ok(_) => {}
            Err(error) => {
                return CommandResult::failure("intake", "wizard_state", error.to_string(), 4);
            }
        }
    }

    let runtime = match runtime("intake") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let store = demo_store(&config).await?;
        let service = RepositorySubmissionService::new(
            Arc::clone(&store.repository),
            config.intake.reference_length,
        );
        Ok::<_, loamdesk_core::errors::ApplicationError>(wizard.submit(&service).await)
    });

    match result {
        Ok(Ok(SubmitOutcome::Submitted(reference)))
        | Ok(Ok(SubmitOutcome::AlreadySubmitted(reference))) => CommandResult::success(
            "intake",
            format!(
                "application submitted; reference {reference}\n{}",
                render_review(&wizard.review())
            ),
        ),
        Ok(Ok(SubmitOutcome::Blocked { step, errors })) => {
            let title = wizard.schema().steps()[step].title.clone();
            blocked(&title, &errors)
        }
        Ok(Ok(SubmitOutcome::Failed(error))) => CommandResult::failure(
            "intake",
            "submission",
            format!("submission failed, answers kept for retry: {error}"),
            5,
        ),
        Ok(Err(error)) => CommandResult::failure("intake", "wizard_state", error.to_string(), 4),
        Err(error) => {
            CommandResult::from_application_error("intake", error, &correlation_id("intake"))
        }
    }
}

/// Flat map of field key to value, as TOML or (for `.json` files) JSON.
fn load_answers(path: &Path) -> anyhow::Result<ValueMap> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read answers file `{}`", path.display()))?;

    let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
    let answers: ValueMap = if is_json {
        serde_json::from_str(&raw)
            .with_context(|| format!("could not parse JSON answers `{}`", path.display()))?
    } else {
        toml::from_str(&raw)
            .with_context(|| format!("could not parse TOML answers `{}`", path.display()))?
    };

    if answers.is_empty() {
        bail!("answers file `{}` does not contain any fields", path.display());
    }
    Ok(answers)
}

fn blocked(step_title: &str, errors: &ErrorMap) -> CommandResult {
    let mut lines = vec![format!("step \"{step_title}\" did not validate:")];
    lines.extend(errors.field_errors().map(|error| format!("- {}: {}", error.field, error.message)));
    lines.extend(
        errors
            .cross_field_errors()
            .map(|error| format!("- {} ({}): {}", error.rule, error.fields.join(", "), error.message)),
    );
    CommandResult::failure("intake", "validation", lines.join("\n"), 4)
}

fn render_review(summary: &ReviewSummary) -> String {
    let mut lines = Vec::new();
    for section in &summary.sections {
        lines.push(format!("[{}]", section.title));
        lines.extend(
            section.entries.iter().map(|entry| format!("  {}: {}", entry.label, entry.value)),
        );
    }
    lines.join("\n")
}
