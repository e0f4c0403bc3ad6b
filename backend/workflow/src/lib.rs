//! The wizard's state machine.
//!
//! Provides:
//! - `WorkflowState` and the closed `WorkflowAction` vocabulary
//! - a pure reducer and the `WorkflowStore` that serializes every mutation
//! - input admission and step-gating rules
//! - the single guarded-transition function every navigation entry point uses
//! - the step-lock guard used while OCR is authoritative for a step

pub mod action;
pub mod lock;
pub mod navigation;
pub mod prefs;
pub mod reducer;
pub mod state;
pub mod store;
pub mod validation;

pub use action::WorkflowAction;
pub use lock::{Liveness, StepLock};
pub use navigation::{
    decide, guarded_transition, Confirmation, Decision, NavOutcome, Navigator, PendingTransition,
    Prompt,
};
pub use prefs::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore};
pub use reducer::reduce;
pub use state::{StepView, WorkflowState};
pub use store::WorkflowStore;
pub use validation::{
    can_navigate_to_step, validate_image_file, validate_text_input, NavigationCheck,
    MAX_IMAGE_BYTES, MAX_TEXT_CHARS,
};
