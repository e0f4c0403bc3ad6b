//! Terminal UI for the Lecture Buddy wizard.
//!
//! Holds the screen state, maps keys to commands and draws the frame. The
//! CLI owns the runtime loop and executes the commands against the
//! controllers.

pub mod app;
pub mod input;
pub mod markdown_view;
pub mod render;
pub mod terminal;

pub use app::{AppState, CapabilityRow, Dialog, DialogState, Editor, ToolTab};
pub use input::{UiCommand, handle_key_event};
pub use render::draw_ui;
pub use terminal::{TerminalGuard, next_key};
