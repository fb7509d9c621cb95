//! UI module for consistent terminal output
//!
//! Uses `cliclack` log lines and spinners in interactive terminals,
//! with automatic fallback to plain output in CI/non-interactive
//! environments.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_ok_detail, step_warn_hint};
pub use progress::TaskSpinner;
