//! I/O layer - File system abstraction consumed by the project core
//!
//! The scanner and the writers never touch `std::fs` directly; they go through
//! [`FileSystemTrait`] so reconciliation can run against an in-memory tree in tests.

pub mod file_system;

pub use file_system::{DirEntry, EntryKind, FileSystemTrait, RealFileSystem};

#[cfg(test)]
pub use file_system::TestFileSystem;
