//! Built-in four-step personal loan intake.

use rust_decimal::Decimal;

use crate::intake::schema::{
    Condition, DisplayFormat, EnumOption, FieldKind, FieldSchema, SchemaError, StepDefinition,
    WizardSchema,
};

pub const LOAN_PURPOSES: [&str; 9] = [
    "Debt Consolidation",
    "Home Improvement",
    "Medical Expenses",
    "Education",
    "Business",
    "Vehicle Purchase",
    "Wedding",
    "Vacation",
    "Other",
];

pub const LOAN_TERMS_MONTHS: [i64; 6] = [6, 12, 24, 36, 48, 60];

pub const EMPLOYMENT_STATUSES: [(&str, &str); 7] = [
    ("full-time", "Full time"),
    ("part-time", "Part time"),
    ("self-employed", "Self employed"),
    ("contract", "Contract"),
    ("unemployed", "Unemployed"),
    ("retired", "Retired"),
    ("student", "Student"),
];

pub const EMPLOYMENT_DURATIONS: [&str; 5] =
    ["Less than 1 year", "1-2 years", "3-5 years", "5-10 years", "More than 10 years"];

/// Statuses for which an employer name is collected.
pub const EMPLOYED_STATUSES: [&str; 3] = ["full-time", "part-time", "contract"];

/// Statuses for which employment duration is disabled.
pub const NO_TENURE_STATUSES: [&str; 2] = ["unemployed", "student"];

pub fn loan_application_schema() -> Result<WizardSchema, SchemaError> {
    WizardSchema::new(vec![personal_step(), loan_step(), employment_step(), review_step()])
}

fn personal_step() -> StepDefinition {
    StepDefinition::new("personal", "Personal Information")
        .field(FieldSchema::text("firstName", "First Name").required_message("First name is required"))
        .field(FieldSchema::text("lastName", "Last Name").required_message("Last name is required"))
        .field(FieldSchema::email("email", "Email Address").required_message("Email is required"))
        .field(FieldSchema::text("phone", "Phone Number").required_message("Phone number is required"))
        .field(
            FieldSchema::text("idNumber", "ID Number / Passport")
                .required_message("ID number is required"),
        )
}

fn loan_step() -> StepDefinition {
    StepDefinition::new("loan", "Loan Details")
        .field(
            FieldSchema::number(
                "loanAmount",
                "Loan Amount",
                Some(Decimal::from(1_000)),
                Some(Decimal::from(100_000)),
            )
            .display(DisplayFormat::Currency)
            .required_message("Loan amount is required"),
        )
        .field(
            FieldSchema::new(
                "loanTerm",
                "Loan Term",
                FieldKind::Number {
                    min: None,
                    max: None,
                    integer: true,
                    one_of: LOAN_TERMS_MONTHS.iter().copied().map(Decimal::from).collect(),
                },
            )
            .display(DisplayFormat::Months)
            .required_message("Loan term is required"),
        )
        .field(
            FieldSchema::choice(
                "loanPurpose",
                "Loan Purpose",
                LOAN_PURPOSES.iter().map(|purpose| EnumOption::new(*purpose, *purpose)).collect(),
            )
            .required_message("Loan purpose is required"),
        )
}

fn employment_step() -> StepDefinition {
    StepDefinition::new("employment", "Employment Information")
        .field(
            FieldSchema::choice(
                "employmentStatus",
                "Employment Status",
                EMPLOYMENT_STATUSES
                    .iter()
                    .map(|(value, label)| EnumOption::new(*value, *label))
                    .collect(),
            )
            .required_message("Employment status is required"),
        )
        .field(
            FieldSchema::text("employerName", "Employer")
                .applies_when(Condition::one_of("employmentStatus", EMPLOYED_STATUSES))
                .required_message("Employer name is required"),
        )
        .field(
            FieldSchema::number("monthlyIncome", "Monthly Income", Some(Decimal::ZERO), None)
                .display(DisplayFormat::Currency)
                .required_message("Monthly income is required"),
        )
        .field(
            FieldSchema::choice(
                "employmentDuration",
                "Employment Duration",
                EMPLOYMENT_DURATIONS
                    .iter()
                    .map(|duration| EnumOption::new(*duration, *duration))
                    .collect(),
            )
            .applies_when(Condition::none_of("employmentStatus", NO_TENURE_STATUSES))
            .required_message("Employment duration is required"),
        )
}

/// Read-only confirmation page. It collects nothing, so submission is gated by the
/// three data steps alone.
fn review_step() -> StepDefinition {
    StepDefinition::new("review", "Review & Submit").hidden_from_review()
}

#[cfg(test)]
mod tests {
    use super::loan_application_schema;

    #[test]
    fn built_in_schema_is_valid_and_ordered() {
        let schema = loan_application_schema().expect("built-in schema is valid");
        let ids = schema.steps().iter().map(|step| step.id.as_str()).collect::<Vec<_>>();

        assert_eq!(ids, vec!["personal", "loan", "employment", "review"]);
        assert_eq!(schema.step_of("employerName"), Some(2));
        assert!(!schema.steps()[3].reviewed);
        assert!(schema.steps()[3].fields.is_empty());
    }
}
