//! Input admission and step-gating rules. Everything here is pure.

use lecturebuddy_core::{DenyReason, InputRejection, WorkflowStep};

use crate::state::WorkflowState;

/// Largest accepted image, inclusive.
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Longest accepted text in characters, inclusive, measured after trimming.
pub const MAX_TEXT_CHARS: usize = 50_000;

pub fn validate_image_file(mime_type: &str, size: u64) -> Result<(), InputRejection> {
    if !mime_type.starts_with("image/") {
        return Err(InputRejection::NotAnImage);
    }
    if size > MAX_IMAGE_BYTES {
        return Err(InputRejection::ImageTooLarge);
    }
    Ok(())
}

pub fn validate_text_input(text: &str) -> Result<(), InputRejection> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InputRejection::EmptyText);
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(InputRejection::TextTooLong);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationCheck {
    pub allowed: bool,
    pub reason: Option<DenyReason>,
}

impl NavigationCheck {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Whether `target` may become the current step.
///
/// Locks win over everything; moving back or staying put is otherwise free;
/// moving forward needs the data the target consumes.
pub fn can_navigate_to_step(target: WorkflowStep, state: &WorkflowState) -> NavigationCheck {
    if state.is_locked(target) {
        return NavigationCheck::deny(DenyReason::StepLocked);
    }
    if target <= state.current_step {
        return NavigationCheck::allow();
    }
    match target {
        WorkflowStep::Input => NavigationCheck::allow(),
        WorkflowStep::Optimizer => {
            if state.input_data.is_none() {
                NavigationCheck::deny(DenyReason::NoInput)
            } else {
                NavigationCheck::allow()
            }
        }
        WorkflowStep::Tools => {
            if state.is_processing {
                NavigationCheck::deny(DenyReason::OptimizerProcessing)
            } else if state.optimized_data.is_none() {
                NavigationCheck::deny(DenyReason::NotOptimized)
            } else {
                NavigationCheck::allow()
            }
        }
    }
}
