//! Bazel project reconciliation
//!
//! Parses the `.bazelproject` membership file, scans the source tree for build
//! packages, and writes the resulting selection back as a membership file and a
//! multi-root workspace descriptor.

pub mod bazel_project;
pub mod descriptor;
pub mod error;
pub mod membership;
pub mod module;
pub mod pass_scheduler;
pub mod scanner;

pub use bazel_project::BazelProject;
pub use error::ProjectError;
pub use module::ModuleNode;
pub use pass_scheduler::{PassScheduler, TriggerOutcome};
pub use scanner::{ModuleScanner, ScanOptions};
