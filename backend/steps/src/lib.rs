//! Controllers for the first two wizard steps.
//!
//! Each controller reads and writes the shared `WorkflowStore` and talks to
//! its collaborators (file system, camera, OCR). User-facing outcomes are
//! reported through a `Notifier`; nothing here panics on bad input.

pub mod debounce;
pub mod input;
pub mod optimizer;

pub use debounce::Debouncer;
pub use input::{FrameSourceFactory, InputController, TEXT_DEBOUNCE};
pub use optimizer::{EnterOutcome, OptimizerController, EDIT_DEBOUNCE};
