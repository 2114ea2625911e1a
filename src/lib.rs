//! # greenlight
//!
//! Fail-fast CI workflow and lint gate runner for Poetry-managed Python
//! projects.
//!
//! The CI half provisions a pinned interpreter and dependency manager,
//! restores a dependency environment cached by lockfile hash (installing on
//! a miss), and runs the project's test command. The lint half runs the
//! configured style, format, and type checks strictly in order, halting at
//! the first failure and propagating its exit code unchanged.
//!
//! ## Features
//!
//! - **Trigger gate**: pushes fire only for watched branches, pull requests
//!   fire for any base; events are reconstructed from CI environment
//!   variables or the local branch
//! - **Content-addressed caching**: `venv-<os>-<python>-<lockfile-hash>`
//!   keys; a changed lockfile invalidates the entry and forces an install
//! - **Fail-fast everywhere**: the first non-zero exit status wins, with no
//!   retries and no partial-success reporting
//!
//! ## Example
//!
//! ```rust,no_run
//! use greenlight::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> greenlight::Result<()> {
//!     let config = Config::load_or_default()?;
//!
//!     let pipeline = Pipeline::new(config);
//!     let result = pipeline.run().await?;
//!
//!     std::process::exit(result.exit_code());
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/greenlight/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod checks;
pub mod cli;
pub mod config;
pub mod core;
pub mod pipeline;

// Re-export main types for convenience
pub use config::Config;
pub use core::error::{Error, Result};
pub use core::runner::{CheckResult, GateResult, Runner};
pub use core::trigger::{Decision, Event, Trigger};
pub use pipeline::{Pipeline, PipelineResult, StepResult};
