use serde::Serialize;

use crate::intake::format;
use crate::intake::schema::{FieldKind, FieldSchema, WizardSchema};
use crate::intake::values::{present, FieldValue, ValueMap};

pub const NOT_PROVIDED: &str = "Not provided";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    pub key: String,
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReviewSection {
    pub step_id: String,
    pub title: String,
    pub entries: Vec<ReviewEntry>,
}

/// Read-only, display-ready projection of the collected values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub sections: Vec<ReviewSection>,
}

impl ReviewSummary {
    pub fn entry(&self, key: &str) -> Option<&ReviewEntry> {
        self.sections.iter().flat_map(|section| section.entries.iter()).find(|entry| entry.key == key)
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.entry(key).map(|entry| entry.value.as_str())
    }
}

/// Builds the review projection. Total over any value set: absent fields render as
/// [`NOT_PROVIDED`], disabled fields are omitted.
pub fn compile(schema: &WizardSchema, values: &ValueMap) -> ReviewSummary {
    let sections = schema
        .steps()
        .iter()
        .filter(|step| step.reviewed)
        .map(|step| ReviewSection {
            step_id: step.id.clone(),
            title: step.title.clone(),
            entries: step
                .fields
                .iter()
                .filter(|field| field.is_applicable(values))
                .map(|field| ReviewEntry {
                    key: field.key.clone(),
                    label: field.label.clone(),
                    value: render(field, values),
                })
                .collect(),
        })
        .filter(|section| !section.entries.is_empty())
        .collect();

    ReviewSummary { sections }
}

fn render(field: &FieldSchema, values: &ValueMap) -> String {
    let Some(value) = present(values, &field.key) else {
        return NOT_PROVIDED.to_owned();
    };

    match (value, &field.kind) {
        (FieldValue::Number(number), _) => format::number(*number, field.display),
        (FieldValue::Text(text), FieldKind::Enum { .. }) => {
            field.option_label(text).unwrap_or(text).to_owned()
        }
        (FieldValue::Text(text), _) => text.trim().to_owned(),
        (FieldValue::Bool(true), _) => "Yes".to_owned(),
        (FieldValue::Bool(false), _) => "No".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::{compile, NOT_PROVIDED};
    use crate::intake::loan::loan_application_schema;
    use crate::intake::values::{FieldValue, ValueMap};

    fn completed(status: &str) -> ValueMap {
        [
            ("firstName", FieldValue::from("Robert")),
            ("lastName", FieldValue::from("Williams")),
            ("email", FieldValue::from("rob.w@example.com")),
            ("phone", FieldValue::from("555-456-7890")),
            ("idNumber", FieldValue::from("P1234567")),
            ("loanAmount", FieldValue::from(50_000_i64)),
            ("loanTerm", FieldValue::from(60_i64)),
            ("loanPurpose", FieldValue::from("Business")),
            ("employmentStatus", FieldValue::from(status)),
            ("employerName", FieldValue::from("Acme Corporation")),
            ("monthlyIncome", FieldValue::from(7_800_i64)),
            ("employmentDuration", FieldValue::from("3-5 years")),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
    }

    #[test]
    fn formats_currency_terms_and_enum_labels() {
        let schema = loan_application_schema().expect("schema");
        let summary = compile(&schema, &completed("full-time"));

        assert_eq!(summary.value("loanAmount"), Some("$50,000"));
        assert_eq!(summary.value("loanTerm"), Some("60 months"));
        assert_eq!(summary.value("monthlyIncome"), Some("$7,800"));
        assert_eq!(summary.value("employmentStatus"), Some("Full time"));
        assert_eq!(summary.value("employerName"), Some("Acme Corporation"));
        assert_eq!(summary.sections.len(), 3);
        assert!(summary.sections.iter().all(|section| section.step_id != "review"));
    }

    #[test]
    fn omits_fields_irrelevant_to_the_branch() {
        let schema = loan_application_schema().expect("schema");
        let summary = compile(&schema, &completed("unemployed"));

        assert!(summary.entry("employerName").is_none());
        assert!(summary.entry("employmentDuration").is_none());
        assert_eq!(summary.value("employmentStatus"), Some("Unemployed"));
    }

    #[test]
    fn is_total_and_leaves_values_untouched() {
        let schema = loan_application_schema().expect("schema");
        let values = ValueMap::new();
        let summary = compile(&schema, &values);

        assert_eq!(summary.value("firstName"), Some(NOT_PROVIDED));
        assert!(values.is_empty());
    }
}
