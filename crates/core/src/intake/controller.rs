use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::intake::review::{self, ReviewSummary};
use crate::intake::schema::{StepDefinition, WizardSchema};
use crate::intake::validation::{validate_step, ErrorMap};
use crate::intake::values::{FieldValue, ValueMap};
use crate::submission::{ReferenceToken, SubmissionError, SubmissionService};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum WizardPhase {
    Editing,
    Submitting,
    Submitted { reference: ReferenceToken },
}

#[derive(Clone, Debug, Serialize)]
pub struct WizardState {
    pub step_index: usize,
    pub values: ValueMap,
    pub touched: BTreeSet<String>,
    pub errors: ErrorMap,
    pub phase: WizardPhase,
    /// Last submission failure, kept apart from field errors.
    pub submission_error: Option<SubmissionError>,
}

impl WizardState {
    fn new() -> Self {
        Self {
            step_index: 0,
            values: ValueMap::new(),
            touched: BTreeSet::new(),
            errors: ErrorMap::default(),
            phase: WizardPhase::Editing,
            submission_error: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { from: usize, to: usize },
    Retreated { from: usize, to: usize },
    Blocked { step: usize, errors: ErrorMap },
    Unchanged { step: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionStart {
    /// Snapshot of the values to hand to the submission service.
    Ready(ValueMap),
    Blocked { step: usize, errors: ErrorMap },
    AlreadySubmitted(ReferenceToken),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(ReferenceToken),
    AlreadySubmitted(ReferenceToken),
    Blocked { step: usize, errors: ErrorMap },
    Failed(SubmissionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("a submission is in flight; edits and navigation are paused")]
    SubmissionInFlight,
    #[error("the application has already been submitted")]
    Closed,
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("submission is only available on the final step (current {current}, final {last})")]
    NotOnFinalStep { current: usize, last: usize },
    #[error("no submission is in flight")]
    NoSubmissionInFlight,
}

/// Drives one intake session over a shared schema.
pub struct WizardController {
    schema: Arc<WizardSchema>,
    state: WizardState,
}

impl WizardController {
    pub fn new(schema: Arc<WizardSchema>) -> Self {
        Self { schema, state: WizardState::new() }
    }

    pub fn schema(&self) -> &WizardSchema {
        &self.schema
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step_index(&self) -> usize {
        self.state.step_index
    }

    pub fn current_step(&self) -> &StepDefinition {
        &self.schema.steps()[self.state.step_index]
    }

    pub fn is_last_step(&self) -> bool {
        self.state.step_index == self.schema.last_index()
    }

    pub fn values(&self) -> &ValueMap {
        &self.state.values
    }

    pub fn phase(&self) -> &WizardPhase {
        &self.state.phase
    }

    /// Stores a value without validating it.
    pub fn set_field(
        &mut self,
        key: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), WizardError> {
        self.ensure_editable()?;
        let field =
            self.schema.field(key).ok_or_else(|| WizardError::UnknownField(key.to_owned()))?;
        let value = field.coerce(value.into());

        self.state.values.insert(key.to_owned(), value);
        self.state.touched.insert(key.to_owned());
        Ok(())
    }

    /// Removes a value so the field reads as absent again.
    pub fn clear_field(&mut self, key: &str) -> Result<(), WizardError> {
        self.ensure_editable()?;
        if self.schema.field(key).is_none() {
            return Err(WizardError::UnknownField(key.to_owned()));
        }
        self.state.values.remove(key);
        self.state.touched.insert(key.to_owned());
        Ok(())
    }

    pub fn touch(&mut self, key: &str) -> Result<(), WizardError> {
        self.ensure_editable()?;
        if self.schema.field(key).is_none() {
            return Err(WizardError::UnknownField(key.to_owned()));
        }
        self.state.touched.insert(key.to_owned());
        Ok(())
    }

    /// Recomputes the current step's errors without storing them.
    pub fn validate_current(&self) -> ErrorMap {
        validate_step(self.current_step(), &self.state.values)
    }

    /// Stored errors restricted to fields the user has interacted with.
    pub fn visible_errors(&self) -> ErrorMap {
        let touched = &self.state.touched;
        self.state.errors.retain_fields(|key| touched.contains(key))
    }

    pub fn next(&mut self) -> Result<StepOutcome, WizardError> {
        self.ensure_editable()?;
        let from = self.state.step_index;
        let schema = Arc::clone(&self.schema);
        let step = &schema.steps()[from];
        let errors = validate_step(step, &self.state.values);

        if !errors.is_empty() {
            self.state.touched.extend(step.keys().map(str::to_owned));
            self.state.errors.replace_step(step, errors.clone());
            debug!(
                event_name = "intake.step_blocked",
                step = %step.id,
                error_count = errors.len(),
                "step validation failed"
            );
            return Ok(StepOutcome::Blocked { step: from, errors });
        }

        self.state.errors.clear_step(step);
        if from == schema.last_index() {
            return Ok(StepOutcome::Unchanged { step: from });
        }

        self.state.step_index = from + 1;
        debug!(event_name = "intake.step_advanced", from, to = from + 1, "wizard advanced");
        Ok(StepOutcome::Advanced { from, to: from + 1 })
    }

    /// Moves back one step. Values and stored errors are left as they are.
    pub fn back(&mut self) -> Result<StepOutcome, WizardError> {
        self.ensure_editable()?;
        let from = self.state.step_index;
        if from == 0 {
            return Ok(StepOutcome::Unchanged { step: 0 });
        }

        self.state.step_index = from - 1;
        debug!(event_name = "intake.step_retreated", from, to = from - 1, "wizard moved back");
        Ok(StepOutcome::Retreated { from, to: from - 1 })
    }

    pub fn review(&self) -> ReviewSummary {
        review::compile(&self.schema, &self.state.values)
    }

    /// Gates submission. Every step is re-validated, so answers changed after a
    /// step was passed cannot slip through; the wizard moves to the first step that
    /// no longer validates.
    pub fn begin_submission(&mut self) -> Result<SubmissionStart, WizardError> {
        match &self.state.phase {
            WizardPhase::Submitting => return Err(WizardError::SubmissionInFlight),
            WizardPhase::Submitted { reference } => {
                return Ok(SubmissionStart::AlreadySubmitted(reference.clone()));
            }
            WizardPhase::Editing => {}
        }

        let last = self.schema.last_index();
        if self.state.step_index != last {
            return Err(WizardError::NotOnFinalStep { current: self.state.step_index, last });
        }

        let schema = Arc::clone(&self.schema);
        for (index, step) in schema.steps().iter().enumerate() {
            let errors = validate_step(step, &self.state.values);
            if errors.is_empty() {
                continue;
            }

            self.state.touched.extend(step.keys().map(str::to_owned));
            self.state.errors.replace_step(step, errors.clone());
            self.state.step_index = index;
            debug!(
                event_name = "intake.submission_blocked",
                step = %step.id,
                error_count = errors.len(),
                "submission blocked by step validation"
            );
            return Ok(SubmissionStart::Blocked { step: index, errors });
        }

        self.state.phase = WizardPhase::Submitting;
        self.state.submission_error = None;
        info!(event_name = "intake.submission_started", "submitting application");
        Ok(SubmissionStart::Ready(self.state.values.clone()))
    }

    pub fn finish_submission(
        &mut self,
        result: Result<ReferenceToken, SubmissionError>,
    ) -> Result<SubmitOutcome, WizardError> {
        if self.state.phase != WizardPhase::Submitting {
            return Err(WizardError::NoSubmissionInFlight);
        }

        match result {
            Ok(reference) => {
                info!(
                    event_name = "intake.submission_succeeded",
                    reference = %reference,
                    "application submitted"
                );
                self.state.errors = ErrorMap::default();
                self.state.phase = WizardPhase::Submitted { reference: reference.clone() };
                Ok(SubmitOutcome::Submitted(reference))
            }
            Err(error) => {
                warn!(
                    event_name = "intake.submission_failed",
                    error = %error,
                    "application submission failed; retry available"
                );
                self.state.phase = WizardPhase::Editing;
                self.state.submission_error = Some(error.clone());
                Ok(SubmitOutcome::Failed(error))
            }
        }
    }

    pub async fn submit<S>(&mut self, service: &S) -> Result<SubmitOutcome, WizardError>
    where
        S: SubmissionService + ?Sized,
    {
        let values = match self.begin_submission()? {
            SubmissionStart::Ready(values) => values,
            SubmissionStart::Blocked { step, errors } => {
                return Ok(SubmitOutcome::Blocked { step, errors });
            }
            SubmissionStart::AlreadySubmitted(reference) => {
                return Ok(SubmitOutcome::AlreadySubmitted(reference));
            }
        };

        let result = service.submit(&values).await;
        self.finish_submission(result)
    }

    fn ensure_editable(&self) -> Result<(), WizardError> {
        match self.state.phase {
            WizardPhase::Editing => Ok(()),
            WizardPhase::Submitting => Err(WizardError::SubmissionInFlight),
            WizardPhase::Submitted { .. } => Err(WizardError::Closed),
        }
    }
}
