//! Console presentation.
//!
//! - **renderer**: incremental transcript printer and input prompt

pub mod renderer;

pub use renderer::Renderer;
