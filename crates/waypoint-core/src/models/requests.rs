//! Validated form of an `update_plan` call.

use std::str::FromStr;

use crate::{error::EngineError, params::UpdatePlan};

/// The actions `update_plan` understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    StartStep,
    CompleteStep,
    FailStep,
    SkipStep,
    AddStep,
    Note,
}

impl FromStr for PlanAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start_step" => Ok(PlanAction::StartStep),
            "complete_step" => Ok(PlanAction::CompleteStep),
            "fail_step" => Ok(PlanAction::FailStep),
            "skip_step" => Ok(PlanAction::SkipStep),
            "add_step" => Ok(PlanAction::AddStep),
            "note" => Ok(PlanAction::Note),
            _ => Err(format!(
                "Unknown action '{s}'. Must be one of start_step, complete_step, fail_step, skip_step, add_step, note"
            )),
        }
    }
}

/// A fully validated step mutation, ready to apply to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum StepCommand {
    Start {
        step_number: u32,
    },
    Complete {
        step_number: u32,
        result: Option<String>,
    },
    Fail {
        step_number: u32,
        reason: Option<String>,
    },
    Skip {
        step_number: u32,
        reason: Option<String>,
    },
    Add {
        description: String,
        after_step: Option<u32>,
    },
    Note {
        step_number: Option<u32>,
        text: String,
    },
}

impl TryFrom<&UpdatePlan> for StepCommand {
    type Error = EngineError;

    /// Convert an `update_plan` call into a command, checking that the fields
    /// the action needs are present.
    ///
    /// # Errors
    ///
    /// * `EngineError::InvalidInput` - unknown action, or a required field is
    ///   missing for the action
    ///
    /// # Examples
    ///
    /// ```rust
    /// use waypoint_core::{models::StepCommand, params::UpdatePlan};
    ///
    /// let params = UpdatePlan::for_step("complete_step", 1).with_result("ok");
    /// let command = StepCommand::try_from(&params)?;
    /// assert_eq!(
    ///     command,
    ///     StepCommand::Complete { step_number: 1, result: Some("ok".to_string()) }
    /// );
    /// # waypoint_core::Result::<()>::Ok(())
    /// ```
    fn try_from(params: &UpdatePlan) -> Result<Self, Self::Error> {
        let action = PlanAction::from_str(&params.action)
            .map_err(|reason| EngineError::invalid_input("action").with_reason(reason))?;

        let step_number = || {
            params.step_number.ok_or_else(|| {
                EngineError::invalid_input("step_number")
                    .with_reason(format!("step_number is required for {}", params.action))
            })
        };

        let command = match action {
            PlanAction::StartStep => StepCommand::Start {
                step_number: step_number()?,
            },
            PlanAction::CompleteStep => StepCommand::Complete {
                step_number: step_number()?,
                result: params.result.clone(),
            },
            PlanAction::FailStep => StepCommand::Fail {
                step_number: step_number()?,
                reason: params.reason.clone(),
            },
            PlanAction::SkipStep => StepCommand::Skip {
                step_number: step_number()?,
                reason: params.reason.clone(),
            },
            PlanAction::AddStep => {
                let new_step = params.new_step.as_ref().ok_or_else(|| {
                    EngineError::invalid_input("new_step")
                        .with_reason("new_step is required for add_step")
                })?;
                if new_step.description.trim().is_empty() {
                    return Err(EngineError::invalid_input("new_step")
                        .with_reason("new_step.description must not be empty"));
                }
                StepCommand::Add {
                    description: new_step.description.clone(),
                    after_step: new_step.after_step,
                }
            }
            PlanAction::Note => {
                let text = params
                    .note
                    .clone()
                    .filter(|text| !text.trim().is_empty())
                    .ok_or_else(|| {
                        EngineError::invalid_input("note").with_reason("note text is required")
                    })?;
                StepCommand::Note {
                    step_number: params.step_number,
                    text,
                }
            }
        };

        Ok(command)
    }
}

impl StepCommand {
    /// Step the command targets, if any.
    pub fn step_number(&self) -> Option<u32> {
        match self {
            StepCommand::Start { step_number }
            | StepCommand::Complete { step_number, .. }
            | StepCommand::Fail { step_number, .. }
            | StepCommand::Skip { step_number, .. } => Some(*step_number),
            StepCommand::Add { after_step, .. } => *after_step,
            StepCommand::Note { step_number, .. } => *step_number,
        }
    }
}
