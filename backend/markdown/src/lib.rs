//! Markdown Intermediate Representation Parser and Renderers
//!
//! Converts Markdown produced by the local models into a typed tree and
//! renders it for terminals and plain-text exports.

pub mod ir;
pub mod renderer;

pub use ir::{IrParser, MarkdownNode};
pub use renderer::Renderer;
