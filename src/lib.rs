//! # reachscan
//!
//! Reachability analysis for vulnerable dependencies.
//!
//! A dependency with a published advisory is only a problem if the code
//! actually calls into the vulnerable part of it. reachscan parses every
//! source file with tree-sitter, records how each file imports its
//! dependencies and which calls it makes, looks up advisories from OSV and
//! reports the call sites that reach an advisory's symbols.
//!
//! ## Supported Languages
//!
//! JavaScript, TypeScript (including TSX), Python, Go
//!
//! ## Output Formats
//!
//! - **Text**: grouped per file and package, for terminals
//! - **JSON**: the full [`core::ScanReport`] for tooling

pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod parsers;
