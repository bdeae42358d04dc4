use std::path::Path;

use loamdesk_core::intake::schema::{FieldKind, FieldSchema, Requirement};

use crate::commands::{load_config, load_schema, CommandResult};

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let config = match load_config("schema", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let schema = match load_schema(&config) {
        Ok(schema) => schema,
        Err(error) => {
            return CommandResult::failure("schema", "schema_invalid", error.to_string(), 4);
        }
    };

    let mut lines = Vec::new();
    for (index, step) in schema.steps().iter().enumerate() {
        let review = if step.reviewed { "" } else { " [not reviewed]" };
        lines.push(format!("{}. {} ({}){review}", index + 1, step.title, step.id));
        lines.extend(step.fields.iter().map(describe_field));
        lines.extend(step.rules.iter().map(|rule| format!("   ! {}: {}", rule.id, rule.message)));
    }

    CommandResult::success("schema", lines.join("\n"))
}

fn describe_field(field: &FieldSchema) -> String {
    let requirement = match &field.required {
        Requirement::Always => "required",
        Requirement::Optional => "optional",
        Requirement::When(_) => "conditionally required",
    };
    let conditional = if field.applies_when.is_some() { ", conditional" } else { "" };
    let detail = match &field.kind {
        FieldKind::Enum { options } => format!(
            " [{}]",
            options.iter().map(|option| option.value.as_str()).collect::<Vec<_>>().join("|")
        ),
        _ => String::new(),
    };
    format!(
        "   - {} \"{}\": {}, {requirement}{conditional}{detail}",
        field.key,
        field.label,
        field.kind.name()
    )
}
