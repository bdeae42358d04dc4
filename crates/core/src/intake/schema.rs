use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intake::values::{present, FieldValue, ValueMap};

/// Pure predicate over the full in-progress value set.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    check: Arc<dyn Fn(&ValueMap) -> bool + Send + Sync>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ValueMap) -> bool + Send + Sync + 'static,
    {
        Self { name: name.into(), check: Arc::new(check) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self, values: &ValueMap) -> bool {
        (self.check)(values)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Equals {
        field: String,
        value: FieldValue,
    },
    OneOf {
        field: String,
        values: Vec<FieldValue>,
    },
    /// Also holds when the field is absent.
    NoneOf {
        field: String,
        values: Vec<FieldValue>,
    },
    Present {
        field: String,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
    #[serde(skip)]
    Custom(Predicate),
}

impl Condition {
    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::Equals { field: field.into(), value: value.into() }
    }

    pub fn one_of<V>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<FieldValue>,
    {
        Self::OneOf { field: field.into(), values: values.into_iter().map(Into::into).collect() }
    }

    pub fn none_of<V>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<FieldValue>,
    {
        Self::NoneOf { field: field.into(), values: values.into_iter().map(Into::into).collect() }
    }

    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&ValueMap) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Predicate::new(name, check))
    }

    pub fn evaluate(&self, values: &ValueMap) -> bool {
        match self {
            Self::Equals { field, value } => present(values, field) == Some(value),
            Self::OneOf { field, values: allowed } => {
                present(values, field).is_some_and(|current| allowed.contains(current))
            }
            Self::NoneOf { field, values: excluded } => {
                present(values, field).map_or(true, |current| !excluded.contains(current))
            }
            Self::Present { field } => present(values, field).is_some(),
            Self::All { conditions } => conditions.iter().all(|c| c.evaluate(values)),
            Self::Any { conditions } => conditions.iter().any(|c| c.evaluate(values)),
            Self::Not { condition } => !condition.evaluate(values),
            Self::Custom(predicate) => predicate.evaluate(values),
        }
    }

    /// Field keys this condition reads. Custom predicates are opaque.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Equals { field, .. }
            | Self::OneOf { field, .. }
            | Self::NoneOf { field, .. }
            | Self::Present { field } => out.push(field.as_str()),
            Self::All { conditions } | Self::Any { conditions } => {
                conditions.iter().for_each(|c| c.collect_fields(out));
            }
            Self::Not { condition } => condition.collect_fields(out),
            Self::Custom(_) => {}
        }
    }
}

#[derive(Clone, Debug, Default)]
pub enum Requirement {
    #[default]
    Always,
    Optional,
    When(Condition),
}

impl Requirement {
    pub fn is_required(&self, values: &ValueMap) -> bool {
        match self {
            Self::Always => true,
            Self::Optional => false,
            Self::When(condition) => condition.evaluate(values),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Email,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub value: String,
    pub label: String,
}

impl EnumOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text { min_length: Option<usize>, max_length: Option<usize>, format: Option<TextFormat> },
    Number { min: Option<Decimal>, max: Option<Decimal>, integer: bool, one_of: Vec<Decimal> },
    Enum { options: Vec<EnumOption> },
    Boolean { must_accept: bool },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Number { .. } => "number",
            Self::Enum { .. } => "enum",
            Self::Boolean { .. } => "boolean",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    #[default]
    Plain,
    Currency,
    Months,
}

#[derive(Clone, Debug)]
pub struct FieldSchema {
    pub key: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: Requirement,
    /// When this evaluates false the field is disabled: never validated, never reviewed.
    pub applies_when: Option<Condition>,
    pub display: DisplayFormat,
    pub required_message: Option<String>,
}

impl FieldSchema {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            required: Requirement::Always,
            applies_when: None,
            display: DisplayFormat::Plain,
            required_message: None,
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Text { min_length: None, max_length: None, format: None })
    }

    pub fn email(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(
            key,
            label,
            FieldKind::Text { min_length: None, max_length: None, format: Some(TextFormat::Email) },
        )
    }

    pub fn number(
        key: impl Into<String>,
        label: impl Into<String>,
        min: Option<Decimal>,
        max: Option<Decimal>,
    ) -> Self {
        Self::new(key, label, FieldKind::Number { min, max, integer: false, one_of: Vec::new() })
    }

    pub fn choice(
        key: impl Into<String>,
        label: impl Into<String>,
        options: Vec<EnumOption>,
    ) -> Self {
        Self::new(key, label, FieldKind::Enum { options })
    }

    pub fn acceptance(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Boolean { must_accept: true })
    }

    pub fn optional(mut self) -> Self {
        self.required = Requirement::Optional;
        self
    }

    pub fn required_when(mut self, condition: Condition) -> Self {
        self.required = Requirement::When(condition);
        self
    }

    pub fn applies_when(mut self, condition: Condition) -> Self {
        self.applies_when = Some(condition);
        self
    }

    pub fn display(mut self, display: DisplayFormat) -> Self {
        self.display = display;
        self
    }

    pub fn required_message(mut self, message: impl Into<String>) -> Self {
        self.required_message = Some(message.into());
        self
    }

    pub fn is_applicable(&self, values: &ValueMap) -> bool {
        self.applies_when.as_ref().map_or(true, |condition| condition.evaluate(values))
    }

    /// Normalizes form input to the field's kind. Unparseable input is kept as-is
    /// so validation can report it.
    pub fn coerce(&self, value: FieldValue) -> FieldValue {
        match (&self.kind, value) {
            (FieldKind::Number { .. }, FieldValue::Text(text)) => {
                let cleaned = text.trim().trim_start_matches('$').replace(',', "");
                match Decimal::from_str(&cleaned) {
                    Ok(number) if !cleaned.is_empty() => FieldValue::Number(number),
                    _ => FieldValue::Text(text),
                }
            }
            (FieldKind::Boolean { .. }, FieldValue::Text(text)) => {
                match text.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" => FieldValue::Bool(true),
                    "false" | "no" | "off" => FieldValue::Bool(false),
                    _ => FieldValue::Text(text),
                }
            }
            (FieldKind::Text { .. } | FieldKind::Enum { .. }, FieldValue::Number(number)) => {
                FieldValue::Text(number.normalize().to_string())
            }
            (_, value) => value,
        }
    }

    pub fn option_label(&self, value: &str) -> Option<&str> {
        match &self.kind {
            FieldKind::Enum { options } => options
                .iter()
                .find(|option| option.value == value)
                .map(|option| option.label.as_str()),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(self, left: Decimal, right: Decimal) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
            Self::Eq => left == right,
            Self::Ne => left != right,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Field(String),
    Value(Decimal),
}

#[derive(Clone, Debug)]
pub enum RuleCheck {
    /// Skipped unless both sides resolve to numbers.
    Compare { left: String, op: Comparison, right: Operand },
    /// Satisfied when the predicate returns true.
    Custom { predicate: Predicate, fields: Vec<String> },
}

/// Cross-field rule evaluated against the whole value set after field checks.
#[derive(Clone, Debug)]
pub struct StepRule {
    pub id: String,
    pub message: String,
    pub applies_when: Option<Condition>,
    pub check: RuleCheck,
}

impl StepRule {
    pub fn compare(
        id: impl Into<String>,
        message: impl Into<String>,
        left: impl Into<String>,
        op: Comparison,
        right: Operand,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            applies_when: None,
            check: RuleCheck::Compare { left: left.into(), op, right },
        }
    }

    pub fn custom<F>(
        id: impl Into<String>,
        message: impl Into<String>,
        fields: Vec<String>,
        check: F,
    ) -> Self
    where
        F: Fn(&ValueMap) -> bool + Send + Sync + 'static,
    {
        let id = id.into();
        Self {
            message: message.into(),
            applies_when: None,
            check: RuleCheck::Custom { predicate: Predicate::new(id.clone(), check), fields },
            id,
        }
    }

    pub fn applies_when(mut self, condition: Condition) -> Self {
        self.applies_when = Some(condition);
        self
    }

    /// Field keys the rule spans, in declaration order.
    pub fn fields(&self) -> Vec<String> {
        match &self.check {
            RuleCheck::Compare { left, right: Operand::Field(right), .. } => {
                vec![left.clone(), right.clone()]
            }
            RuleCheck::Compare { left, .. } => vec![left.clone()],
            RuleCheck::Custom { fields, .. } => fields.clone(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StepDefinition {
    pub id: String,
    pub title: String,
    pub fields: Vec<FieldSchema>,
    pub rules: Vec<StepRule>,
    /// Whether the step contributes a section to the review summary.
    pub reviewed: bool,
}

impl StepDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            fields: Vec::new(),
            rules: Vec::new(),
            reviewed: true,
        }
    }

    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn rule(mut self, rule: StepRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn hidden_from_review(mut self) -> Self {
        self.reviewed = false;
        self
    }

    pub fn field_schema(&self, key: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.key.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("wizard must declare at least one step")]
    NoSteps,
    #[error("field key `{0}` is declared more than once")]
    DuplicateFieldKey(String),
    #[error("rule id `{0}` collides with another rule or field key")]
    DuplicateRuleId(String),
    #[error("`{owner}` references undeclared field `{field}`")]
    UnknownFieldReference { owner: String, field: String },
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("could not read schema file `{path}`: {reason}")]
    Read { path: String, reason: String },
    #[error("could not parse schema: {0}")]
    Parse(String),
}

/// Ordered, validated list of steps. Field keys are unique across the whole wizard.
#[derive(Clone, Debug)]
pub struct WizardSchema {
    steps: Vec<StepDefinition>,
}

impl WizardSchema {
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, SchemaError> {
        if steps.is_empty() {
            return Err(SchemaError::NoSteps);
        }

        let mut keys = HashSet::new();
        for field in steps.iter().flat_map(|step| step.fields.iter()) {
            if !keys.insert(field.key.as_str()) {
                return Err(SchemaError::DuplicateFieldKey(field.key.clone()));
            }
            validate_kind(field)?;
        }

        let mut rule_ids = HashSet::new();
        for rule in steps.iter().flat_map(|step| step.rules.iter()) {
            if keys.contains(rule.id.as_str()) || !rule_ids.insert(rule.id.as_str()) {
                return Err(SchemaError::DuplicateRuleId(rule.id.clone()));
            }
            for field in rule.fields() {
                ensure_declared(&keys, &rule.id, &field)?;
            }
            if let Some(condition) = &rule.applies_when {
                for field in condition.referenced_fields() {
                    ensure_declared(&keys, &rule.id, field)?;
                }
            }
        }

        for field in steps.iter().flat_map(|step| step.fields.iter()) {
            let conditions = [
                field.applies_when.as_ref(),
                match &field.required {
                    Requirement::When(condition) => Some(condition),
                    _ => None,
                },
            ];
            for condition in conditions.into_iter().flatten() {
                for referenced in condition.referenced_fields() {
                    ensure_declared(&keys, &field.key, referenced)?;
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn field(&self, key: &str) -> Option<&FieldSchema> {
        self.steps.iter().find_map(|step| step.field_schema(key))
    }

    pub fn step_of(&self, key: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.field_schema(key).is_some())
    }
}

fn ensure_declared(keys: &HashSet<&str>, owner: &str, field: &str) -> Result<(), SchemaError> {
    if keys.contains(field) {
        Ok(())
    } else {
        Err(SchemaError::UnknownFieldReference { owner: owner.to_owned(), field: field.to_owned() })
    }
}

fn validate_kind(field: &FieldSchema) -> Result<(), SchemaError> {
    let invalid =
        |reason: &str| SchemaError::InvalidField { field: field.key.clone(), reason: reason.into() };

    if field.key.trim().is_empty() {
        return Err(invalid("key must not be empty"));
    }

    match &field.kind {
        FieldKind::Text { min_length: Some(min), max_length: Some(max), .. } if min > max => {
            Err(invalid("min_length exceeds max_length"))
        }
        FieldKind::Number { min: Some(min), max: Some(max), .. } if min > max => {
            Err(invalid("min exceeds max"))
        }
        FieldKind::Enum { options } => {
            if options.is_empty() {
                return Err(invalid("enum fields need at least one option"));
            }
            let mut seen = HashSet::new();
            if options.iter().any(|option| !seen.insert(option.value.as_str())) {
                return Err(invalid("enum option values must be unique"));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        Comparison, Condition, EnumOption, FieldSchema, Operand, Requirement, SchemaError,
        StepDefinition, StepRule, WizardSchema,
    };
    use crate::intake::values::{FieldValue, ValueMap};

    fn values(pairs: &[(&str, FieldValue)]) -> ValueMap {
        pairs.iter().map(|(key, value)| ((*key).to_owned(), value.clone())).collect()
    }

    #[test]
    fn duplicate_keys_across_steps_are_rejected() {
        let error = WizardSchema::new(vec![
            StepDefinition::new("one", "One").field(FieldSchema::text("name", "Name")),
            StepDefinition::new("two", "Two").field(FieldSchema::text("name", "Name again")),
        ])
        .expect_err("keys must be unique across the wizard");

        assert_eq!(error, SchemaError::DuplicateFieldKey("name".to_owned()));
    }

    #[test]
    fn conditions_must_reference_declared_fields() {
        let error = WizardSchema::new(vec![StepDefinition::new("one", "One").field(
            FieldSchema::text("employer", "Employer")
                .applies_when(Condition::one_of("status", ["full-time"])),
        )])
        .expect_err("status is not declared");

        assert!(matches!(error, SchemaError::UnknownFieldReference { ref field, .. } if field == "status"));
    }

    #[test]
    fn rule_ids_may_not_shadow_field_keys() {
        let error = WizardSchema::new(vec![StepDefinition::new("one", "One")
            .field(FieldSchema::number("amount", "Amount", None, None))
            .rule(StepRule::compare(
                "amount",
                "too big",
                "amount",
                Comparison::Le,
                Operand::Value(Decimal::from(10)),
            ))])
        .expect_err("rule id collides");

        assert_eq!(error, SchemaError::DuplicateRuleId("amount".to_owned()));
    }

    #[test]
    fn empty_enum_is_rejected() {
        let error = WizardSchema::new(vec![StepDefinition::new("one", "One")
            .field(FieldSchema::choice("purpose", "Purpose", Vec::new()))])
        .expect_err("enum needs options");
        assert!(matches!(error, SchemaError::InvalidField { .. }));

        let duplicate = WizardSchema::new(vec![StepDefinition::new("one", "One").field(
            FieldSchema::choice(
                "purpose",
                "Purpose",
                vec![EnumOption::new("a", "A"), EnumOption::new("a", "A again")],
            ),
        )]);
        assert!(duplicate.is_err());
    }

    #[test]
    fn none_of_holds_for_absent_field_and_one_of_does_not() {
        let empty = ValueMap::new();
        assert!(Condition::none_of("status", ["unemployed"]).evaluate(&empty));
        assert!(!Condition::one_of("status", ["full-time"]).evaluate(&empty));

        let unemployed = values(&[("status", FieldValue::from("unemployed"))]);
        assert!(!Condition::none_of("status", ["unemployed", "student"]).evaluate(&unemployed));
    }

    #[test]
    fn custom_requirement_reads_whole_value_set() {
        let requirement = Requirement::When(Condition::custom("large_loan", |values| {
            values
                .get("amount")
                .and_then(FieldValue::as_number)
                .is_some_and(|amount| amount > Decimal::from(20_000))
        }));

        assert!(!requirement.is_required(&values(&[("amount", FieldValue::from(5_000_i64))])));
        assert!(requirement.is_required(&values(&[("amount", FieldValue::from(25_000_i64))])));
    }

    #[test]
    fn coerce_parses_form_text_for_typed_fields() {
        let amount = FieldSchema::number("loanAmount", "Loan Amount", None, None);
        assert_eq!(
            amount.coerce(FieldValue::from("$50,000")),
            FieldValue::Number(Decimal::from(50_000))
        );
        assert_eq!(amount.coerce(FieldValue::from("lots")), FieldValue::from("lots"));
        assert_eq!(amount.coerce(FieldValue::from("  ")), FieldValue::from("  "));

        let terms = FieldSchema::acceptance("agreeTerms", "Terms");
        assert_eq!(terms.coerce(FieldValue::from("yes")), FieldValue::Bool(true));

        let name = FieldSchema::text("idNumber", "ID");
        assert_eq!(name.coerce(FieldValue::from(123_456_i64)), FieldValue::from("123456"));
    }

    #[test]
    fn lookup_helpers_resolve_steps_and_labels() {
        let schema = WizardSchema::new(vec![
            StepDefinition::new("one", "One").field(FieldSchema::text("name", "Name")),
            StepDefinition::new("two", "Two").field(FieldSchema::choice(
                "purpose",
                "Purpose",
                vec![EnumOption::new("home", "Home Improvement")],
            )),
        ])
        .expect("valid schema");

        assert_eq!(schema.step_count(), 2);
        assert_eq!(schema.last_index(), 1);
        assert_eq!(schema.step_of("purpose"), Some(1));
        assert_eq!(
            schema.field("purpose").and_then(|field| field.option_label("home")),
            Some("Home Improvement")
        );
        assert!(schema.field("missing").is_none());
    }
}
