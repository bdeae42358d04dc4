//! Step-validated intake wizard: schema model, validation, navigation, review.

pub mod controller;
pub mod format;
pub mod loan;
pub mod review;
pub mod schema;
pub mod schema_file;
pub mod validation;
pub mod values;

pub use controller::{
    StepOutcome, SubmissionStart, SubmitOutcome, WizardController, WizardError, WizardPhase,
    WizardState,
};
pub use review::{ReviewEntry, ReviewSection, ReviewSummary};
pub use schema::{
    Condition, FieldKind, FieldSchema, Requirement, SchemaError, StepDefinition, StepRule,
    WizardSchema,
};
pub use validation::{CrossFieldError, ErrorMap, FieldError, FieldErrorKind};
pub use values::{FieldValue, ValueMap};
