use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::intake::format;
use crate::intake::schema::{
    FieldKind, FieldSchema, Operand, RuleCheck, StepDefinition, StepRule, TextFormat,
};
use crate::intake::values::{present, FieldValue, ValueMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    Required,
    TypeMismatch,
    InvalidFormat,
    TooShort,
    TooLong,
    BelowMinimum,
    AboveMaximum,
    NotInteger,
    NotAllowed,
    MustAccept,
}

/// One field, one schema violation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
    pub message: String,
}

/// A step-level rule violation not attributable to a single field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossFieldError {
    pub rule: String,
    pub fields: Vec<String>,
    pub message: String,
}

/// Field errors keyed by field key, cross-field errors keyed by rule id. The two
/// keyspaces are kept apart so a rule can never overwrite a field error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMap {
    fields: BTreeMap<String, FieldError>,
    cross_field: BTreeMap<String, CrossFieldError>,
}

impl ErrorMap {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.cross_field.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.cross_field.len()
    }

    pub fn field(&self, key: &str) -> Option<&FieldError> {
        self.fields.get(key)
    }

    pub fn cross_field(&self, rule: &str) -> Option<&CrossFieldError> {
        self.cross_field.get(rule)
    }

    pub fn field_errors(&self) -> impl Iterator<Item = &FieldError> {
        self.fields.values()
    }

    pub fn cross_field_errors(&self) -> impl Iterator<Item = &CrossFieldError> {
        self.cross_field.values()
    }

    /// Keeps the first error recorded for a field.
    pub fn insert_field(&mut self, error: FieldError) {
        self.fields.entry(error.field.clone()).or_insert(error);
    }

    pub fn insert_cross_field(&mut self, error: CrossFieldError) {
        self.cross_field.entry(error.rule.clone()).or_insert(error);
    }

    /// Drops every entry owned by `step` (its field keys and rule ids).
    pub fn clear_step(&mut self, step: &StepDefinition) {
        for key in step.keys() {
            self.fields.remove(key);
        }
        for rule in &step.rules {
            self.cross_field.remove(&rule.id);
        }
    }

    /// Replaces the entries owned by `step` with `errors`.
    pub fn replace_step(&mut self, step: &StepDefinition, errors: ErrorMap) {
        self.clear_step(step);
        self.fields.extend(errors.fields);
        self.cross_field.extend(errors.cross_field);
    }

    pub fn retain_fields<F>(&self, mut keep: F) -> ErrorMap
    where
        F: FnMut(&str) -> bool,
    {
        ErrorMap {
            fields: self
                .fields
                .iter()
                .filter(|(key, _)| keep(key))
                .map(|(key, error)| (key.clone(), error.clone()))
                .collect(),
            cross_field: self
                .cross_field
                .iter()
                .filter(|(_, error)| error.fields.iter().any(|field| keep(field)))
                .map(|(rule, error)| (rule.clone(), error.clone()))
                .collect(),
        }
    }
}

/// Validates one step against the full value set. Pure: identical inputs give
/// identical maps, and the map always holds every violation for the step.
pub fn validate_step(step: &StepDefinition, values: &ValueMap) -> ErrorMap {
    let mut errors = ErrorMap::default();

    for field in &step.fields {
        if let Some(error) = validate_field(field, values) {
            errors.insert_field(error);
        }
    }

    for rule in &step.rules {
        if let Some(error) = evaluate_rule(rule, values) {
            errors.insert_cross_field(error);
        }
    }

    errors
}

/// Disabled fields (`applies_when` false) are skipped whatever value they hold.
pub fn validate_field(field: &FieldSchema, values: &ValueMap) -> Option<FieldError> {
    if !field.is_applicable(values) {
        return None;
    }

    let Some(value) = present(values, &field.key) else {
        if field.required.is_required(values) {
            let message = field
                .required_message
                .clone()
                .unwrap_or_else(|| format!("{} is required", field.label));
            return Some(field_error(field, FieldErrorKind::Required, message));
        }
        return None;
    };

    check_constraints(field, value).map(|(kind, message)| field_error(field, kind, message))
}

fn field_error(field: &FieldSchema, kind: FieldErrorKind, message: String) -> FieldError {
    FieldError { field: field.key.clone(), kind, message }
}

fn check_constraints(field: &FieldSchema, value: &FieldValue) -> Option<(FieldErrorKind, String)> {
    let label = &field.label;
    let mismatch =
        || Some((FieldErrorKind::TypeMismatch, format!("{label} must be {}", expected(&field.kind))));

    match (&field.kind, value) {
        (FieldKind::Text { min_length, max_length, format }, FieldValue::Text(text)) => {
            let text = text.trim();
            let length = text.chars().count();
            if let Some(min) = min_length.filter(|min| length < *min) {
                return Some((
                    FieldErrorKind::TooShort,
                    format!("{label} must be at least {min} characters"),
                ));
            }
            if let Some(max) = max_length.filter(|max| length > *max) {
                return Some((
                    FieldErrorKind::TooLong,
                    format!("{label} must be at most {max} characters"),
                ));
            }
            match format {
                Some(TextFormat::Email) if !is_email(text) => {
                    Some((FieldErrorKind::InvalidFormat, "Invalid email address".to_owned()))
                }
                _ => None,
            }
        }
        (FieldKind::Number { min, max, integer, one_of }, FieldValue::Number(number)) => {
            let number = *number;
            if *integer && !number.fract().is_zero() {
                return Some((FieldErrorKind::NotInteger, format!("{label} must be a whole number")));
            }
            if let Some(min) = min.filter(|min| number < *min) {
                return Some((
                    FieldErrorKind::BelowMinimum,
                    format!("{label} must be at least {}", format::number(min, field.display)),
                ));
            }
            if let Some(max) = max.filter(|max| number > *max) {
                return Some((
                    FieldErrorKind::AboveMaximum,
                    format!("{label} must be at most {}", format::number(max, field.display)),
                ));
            }
            if !one_of.is_empty() && !one_of.contains(&number) {
                let allowed = one_of
                    .iter()
                    .map(|candidate| candidate.normalize().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Some((
                    FieldErrorKind::NotAllowed,
                    format!("{label} must be one of: {allowed}"),
                ));
            }
            None
        }
        (FieldKind::Enum { options }, FieldValue::Text(text)) => {
            if options.iter().any(|option| option.value == *text) {
                None
            } else {
                Some((FieldErrorKind::NotAllowed, format!("{label} has an unsupported value")))
            }
        }
        (FieldKind::Boolean { must_accept }, FieldValue::Bool(accepted)) => {
            if *must_accept && !accepted {
                Some((FieldErrorKind::MustAccept, format!("{label} must be accepted")))
            } else {
                None
            }
        }
        _ => mismatch(),
    }
}

fn expected(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Text { .. } | FieldKind::Enum { .. } => "text",
        FieldKind::Number { .. } => "a number",
        FieldKind::Boolean { .. } => "yes or no",
    }
}

fn evaluate_rule(rule: &StepRule, values: &ValueMap) -> Option<CrossFieldError> {
    if rule.applies_when.as_ref().is_some_and(|condition| !condition.evaluate(values)) {
        return None;
    }

    let satisfied = match &rule.check {
        RuleCheck::Compare { left, op, right } => {
            let left = number_at(values, left);
            let right = match right {
                Operand::Field(key) => number_at(values, key),
                Operand::Value(value) => Some(*value),
            };
            match (left, right) {
                (Some(left), Some(right)) => op.holds(left, right),
                _ => true,
            }
        }
        RuleCheck::Custom { predicate, .. } => predicate.evaluate(values),
    };

    (!satisfied).then(|| CrossFieldError {
        rule: rule.id.clone(),
        fields: rule.fields(),
        message: rule.message.clone(),
    })
}

fn number_at(values: &ValueMap, key: &str) -> Option<Decimal> {
    present(values, key).and_then(FieldValue::as_number)
}

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").ok())
        .as_ref()
}

fn is_email(candidate: &str) -> bool {
    email_pattern().is_some_and(|pattern| pattern.is_match(candidate))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{is_email, validate_field, validate_step, CrossFieldError, ErrorMap, FieldErrorKind};
    use crate::intake::schema::{
        Comparison, Condition, FieldKind, FieldSchema, Operand, StepDefinition, StepRule,
    };
    use crate::intake::values::{FieldValue, ValueMap};

    fn values(pairs: &[(&str, FieldValue)]) -> ValueMap {
        pairs.iter().map(|(key, value)| ((*key).to_owned(), value.clone())).collect()
    }

    fn contact_step() -> StepDefinition {
        StepDefinition::new("personal", "Personal Information")
            .field(FieldSchema::text("firstName", "First Name").required_message("First name is required"))
            .field(FieldSchema::email("email", "Email Address"))
    }

    #[test]
    fn reports_every_violation_in_the_step() {
        let errors = validate_step(
            &contact_step(),
            &values(&[("firstName", FieldValue::from("")), ("email", FieldValue::from("bad"))]),
        );

        assert_eq!(errors.len(), 2);
        let first_name = errors.field("firstName").expect("firstName error");
        assert_eq!(first_name.kind, FieldErrorKind::Required);
        assert_eq!(first_name.message, "First name is required");
        let email = errors.field("email").expect("email error");
        assert_eq!(email.kind, FieldErrorKind::InvalidFormat);
        assert_eq!(email.message, "Invalid email address");
    }

    #[test]
    fn validation_is_deterministic() {
        let step = contact_step();
        let input = values(&[("email", FieldValue::from("x@"))]);
        assert_eq!(validate_step(&step, &input), validate_step(&step, &input));
    }

    #[test]
    fn disabled_field_is_ignored_even_with_stale_invalid_value() {
        let duration = FieldSchema::choice(
            "employmentDuration",
            "Employment Duration",
            vec![crate::intake::schema::EnumOption::new("1-2 years", "1-2 years")],
        )
        .applies_when(Condition::none_of("employmentStatus", ["unemployed", "student"]));

        let stale = values(&[
            ("employmentStatus", FieldValue::from("unemployed")),
            ("employmentDuration", FieldValue::from("not-an-option")),
        ]);
        assert!(validate_field(&duration, &stale).is_none());

        let employed = values(&[
            ("employmentStatus", FieldValue::from("full-time")),
            ("employmentDuration", FieldValue::from("not-an-option")),
        ]);
        let error = validate_field(&duration, &employed).expect("enum membership enforced");
        assert_eq!(error.kind, FieldErrorKind::NotAllowed);
    }

    #[test]
    fn conditional_requirement_false_never_reports_absence() {
        let field = FieldSchema::text("coSigner", "Co-signer")
            .required_when(Condition::equals("hasCoSigner", true));

        assert!(validate_field(&field, &ValueMap::new()).is_none());
        assert!(validate_field(&field, &values(&[("hasCoSigner", FieldValue::from(false))])).is_none());
        let error = validate_field(&field, &values(&[("hasCoSigner", FieldValue::from(true))]))
            .expect("required once predicate holds");
        assert_eq!(error.message, "Co-signer is required");
    }

    #[test]
    fn numeric_bounds_use_display_format_in_messages() {
        let amount = FieldSchema::number(
            "loanAmount",
            "Loan Amount",
            Some(Decimal::from(1_000)),
            Some(Decimal::from(100_000)),
        )
        .display(crate::intake::schema::DisplayFormat::Currency);

        let low = validate_field(&amount, &values(&[("loanAmount", FieldValue::from(500_i64))]))
            .expect("below minimum");
        assert_eq!(low.kind, FieldErrorKind::BelowMinimum);
        assert_eq!(low.message, "Loan Amount must be at least $1,000");

        let high = validate_field(&amount, &values(&[("loanAmount", FieldValue::from(250_000_i64))]))
            .expect("above maximum");
        assert_eq!(high.message, "Loan Amount must be at most $100,000");

        let text = validate_field(&amount, &values(&[("loanAmount", FieldValue::from("lots"))]))
            .expect("type mismatch");
        assert_eq!(text.kind, FieldErrorKind::TypeMismatch);
    }

    #[test]
    fn allowed_number_set_is_enforced() {
        let term = FieldSchema::new(
            "loanTerm",
            "Loan Term",
            FieldKind::Number {
                min: None,
                max: None,
                integer: true,
                one_of: vec![Decimal::from(12), Decimal::from(60)],
            },
        );

        assert!(validate_field(&term, &values(&[("loanTerm", FieldValue::from(60_i64))])).is_none());
        let error = validate_field(&term, &values(&[("loanTerm", FieldValue::from(18_i64))]))
            .expect("18 is not offered");
        assert_eq!(error.kind, FieldErrorKind::NotAllowed);
        assert_eq!(error.message, "Loan Term must be one of: 12, 60");
    }

    #[test]
    fn cross_field_errors_live_beside_field_errors() {
        let step = StepDefinition::new("income", "Income")
            .field(FieldSchema::number("monthlyIncome", "Monthly Income", None, None))
            .field(FieldSchema::number("monthlyDebt", "Monthly Debt", None, None))
            .rule(StepRule::compare(
                "debtBelowIncome",
                "Monthly debt must not exceed monthly income",
                "monthlyDebt",
                Comparison::Le,
                Operand::Field("monthlyIncome".to_owned()),
            ));

        let errors = validate_step(
            &step,
            &values(&[
                ("monthlyIncome", FieldValue::from(1_000_i64)),
                ("monthlyDebt", FieldValue::from(1_500_i64)),
            ]),
        );

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.cross_field("debtBelowIncome"),
            Some(&CrossFieldError {
                rule: "debtBelowIncome".to_owned(),
                fields: vec!["monthlyDebt".to_owned(), "monthlyIncome".to_owned()],
                message: "Monthly debt must not exceed monthly income".to_owned(),
            })
        );

        let missing = validate_step(&step, &values(&[("monthlyDebt", FieldValue::from(1_500_i64))]));
        assert!(missing.cross_field("debtBelowIncome").is_none());
        assert!(missing.field("monthlyIncome").is_some());
    }

    #[test]
    fn replace_step_only_touches_that_step() {
        let step = contact_step();
        let other = StepDefinition::new("loan", "Loan").field(FieldSchema::text("loanPurpose", "Purpose"));

        let mut stored = ErrorMap::default();
        stored.replace_step(&other, validate_step(&other, &ValueMap::new()));
        stored.replace_step(&step, validate_step(&step, &ValueMap::new()));
        assert_eq!(stored.len(), 3);

        stored.clear_step(&step);
        assert_eq!(stored.len(), 1);
        assert!(stored.field("loanPurpose").is_some());
    }

    #[test]
    fn email_shape_check() {
        assert!(is_email("john.smith@example.com"));
        assert!(!is_email("bad"));
        assert!(!is_email("a@b"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a b@example.com"));
        assert!(!is_email("a@@example.com"));
        assert!(!is_email("ada@example.c"));
        assert!(is_email("first+tag@mail.example.co"));
    }
}
