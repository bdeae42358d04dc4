//! TOML wizard definitions, so a deployment can describe its own steps without code.
//!
//! ```toml
//! [[steps]]
//! id = "household"
//! title = "Household"
//!
//! [[steps.fields]]
//! key = "dependents"
//! label = "Dependents"
//! type = "number"
//! min = 0
//! integer = true
//! ```

use std::fs;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::intake::schema::{
    Comparison, Condition, DisplayFormat, EnumOption, FieldKind, FieldSchema, Operand,
    Requirement, SchemaError, StepDefinition, StepRule, TextFormat, WizardSchema,
};

impl WizardSchema {
    pub fn from_toml_str(raw: &str) -> Result<Self, SchemaError> {
        let document: RawDocument =
            toml::from_str(raw).map_err(|error| SchemaError::Parse(error.to_string()))?;
        let steps = document.steps.into_iter().map(RawStep::build).collect::<Result<_, _>>()?;
        Self::new(steps)
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let raw = fs::read_to_string(path).map_err(|error| SchemaError::Read {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    id: String,
    title: String,
    #[serde(default = "default_true")]
    reviewed: bool,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawFieldType {
    Text,
    Email,
    Number,
    Enum,
    Boolean,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOption {
    Plain(String),
    Labeled { value: String, label: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    key: String,
    label: String,
    #[serde(rename = "type")]
    field_type: RawFieldType,
    #[serde(default = "default_true")]
    required: bool,
    required_when: Option<Condition>,
    applies_when: Option<Condition>,
    required_message: Option<String>,
    #[serde(default)]
    display: DisplayFormat,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min: Option<Decimal>,
    max: Option<Decimal>,
    #[serde(default)]
    integer: bool,
    #[serde(default)]
    one_of: Vec<Decimal>,
    #[serde(default)]
    options: Vec<RawOption>,
    #[serde(default)]
    must_accept: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    id: String,
    message: String,
    left: String,
    op: Comparison,
    right_field: Option<String>,
    right_value: Option<Decimal>,
    applies_when: Option<Condition>,
}

fn default_true() -> bool {
    true
}

impl RawStep {
    fn build(self) -> Result<StepDefinition, SchemaError> {
        let mut step = StepDefinition::new(self.id, self.title);
        step.reviewed = self.reviewed;
        for field in self.fields {
            step = step.field(field.build()?);
        }
        for rule in self.rules {
            step = step.rule(rule.build()?);
        }
        Ok(step)
    }
}

impl RawField {
    fn build(self) -> Result<FieldSchema, SchemaError> {
        let kind = match self.field_type {
            RawFieldType::Text | RawFieldType::Email => FieldKind::Text {
                min_length: self.min_length,
                max_length: self.max_length,
                format: matches!(self.field_type, RawFieldType::Email).then_some(TextFormat::Email),
            },
            RawFieldType::Number => FieldKind::Number {
                min: self.min,
                max: self.max,
                integer: self.integer,
                one_of: self.one_of,
            },
            RawFieldType::Enum => FieldKind::Enum {
                options: self
                    .options
                    .into_iter()
                    .map(|option| match option {
                        RawOption::Plain(value) => EnumOption::new(value.clone(), value),
                        RawOption::Labeled { value, label } => EnumOption::new(value, label),
                    })
                    .collect(),
            },
            RawFieldType::Boolean => FieldKind::Boolean { must_accept: self.must_accept },
        };

        let mut field = FieldSchema::new(self.key, self.label, kind).display(self.display);
        field.required = match (self.required, self.required_when) {
            (_, Some(condition)) => Requirement::When(condition),
            (true, None) => Requirement::Always,
            (false, None) => Requirement::Optional,
        };
        field.applies_when = self.applies_when;
        field.required_message = self.required_message;
        Ok(field)
    }
}

impl RawRule {
    fn build(self) -> Result<StepRule, SchemaError> {
        let right = match (self.right_field, self.right_value) {
            (Some(field), None) => Operand::Field(field),
            (None, Some(value)) => Operand::Value(value),
            _ => {
                return Err(SchemaError::Parse(format!(
                    "rule `{}` needs exactly one of right_field or right_value",
                    self.id
                )))
            }
        };

        let rule = StepRule::compare(self.id, self.message, self.left, self.op, right);
        Ok(match self.applies_when {
            Some(condition) => rule.applies_when(condition),
            None => rule,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use crate::intake::schema::{FieldKind, SchemaError, WizardSchema};
    use crate::intake::validation::validate_step;
    use crate::intake::values::{FieldValue, ValueMap};

    const HOUSEHOLD: &str = r#"
[[steps]]
id = "household"
title = "Household"

[[steps.fields]]
key = "housing"
label = "Housing"
type = "enum"
options = ["rent", { value = "own", label = "Homeowner" }]

[[steps.fields]]
key = "monthlyRent"
label = "Monthly Rent"
type = "number"
min = 0
display = "currency"
applies_when = { op = "equals", field = "housing", value = "rent" }

[[steps.fields]]
key = "monthlyIncome"
label = "Monthly Income"
type = "number"
min = 0

[[steps.rules]]
id = "rentBelowIncome"
message = "Rent cannot exceed income"
left = "monthlyRent"
op = "le"
right_field = "monthlyIncome"

[[steps]]
id = "confirm"
title = "Confirm"
reviewed = false

[[steps.fields]]
key = "confirmed"
label = "Confirmed"
type = "boolean"
must_accept = true
"#;

    fn values(entries: &[(&str, FieldValue)]) -> ValueMap {
        entries.iter().map(|(key, value)| ((*key).to_owned(), value.clone())).collect()
    }

    #[test]
    fn parses_fields_conditions_and_rules() {
        let schema = WizardSchema::from_toml_str(HOUSEHOLD).expect("schema parses");

        assert_eq!(schema.step_count(), 2);
        assert!(!schema.steps()[1].reviewed);
        let housing = schema.field("housing").expect("housing field");
        assert_eq!(housing.option_label("own"), Some("Homeowner"));
        assert!(matches!(
            schema.field("monthlyRent").map(|field| &field.kind),
            Some(FieldKind::Number { min: Some(min), .. }) if *min == Decimal::ZERO
        ));

        let owner = values(&[("housing", "own".into()), ("monthlyIncome", 4_000_i64.into())]);
        assert!(validate_step(&schema.steps()[0], &owner).is_empty());

        let renter = values(&[
            ("housing", "rent".into()),
            ("monthlyRent", 5_000_i64.into()),
            ("monthlyIncome", 4_000_i64.into()),
        ]);
        let errors = validate_step(&schema.steps()[0], &renter);
        assert!(errors.cross_field("rentBelowIncome").is_some());
    }

    #[test]
    fn rejects_references_to_undeclared_fields() {
        let raw = r#"
[[steps]]
id = "only"
title = "Only"

[[steps.fields]]
key = "a"
label = "A"
type = "text"
applies_when = { op = "present", field = "ghost" }
"#;
        assert!(matches!(
            WizardSchema::from_toml_str(raw),
            Err(SchemaError::UnknownFieldReference { ref field, .. }) if field == "ghost"
        ));
    }

    #[test]
    fn rejects_rules_with_two_right_operands() {
        let raw = r#"
[[steps]]
id = "only"
title = "Only"

[[steps.fields]]
key = "a"
label = "A"
type = "number"

[[steps.rules]]
id = "r"
message = "m"
left = "a"
op = "gt"
right_field = "a"
right_value = 1
"#;
        assert!(matches!(WizardSchema::from_toml_str(raw), Err(SchemaError::Parse(_))));
    }

    #[test]
    fn load_reports_missing_files() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("wizard.toml");
        assert!(matches!(WizardSchema::load(&path), Err(SchemaError::Read { .. })));

        fs::write(&path, HOUSEHOLD).expect("write schema");
        assert_eq!(WizardSchema::load(&path).expect("load").step_count(), 2);
    }
}
