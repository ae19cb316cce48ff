//! Shared test utilities for B-Lib test suites
//!
//! # Modules
//!
//! - [`memory`]: in-memory remote store with failure injection and gates
//! - [`fixtures`]: bookmark builders
//! - [`assertions`]: collection invariants and output predicates
//! - [`logging`]: test logging configuration
//! - [`cli`]: command builder for the `blib` binary
//! - [`workspace`]: temp directories with a config file
//!
//! # Example
//!
//! ```rust
//! use blib_test_helpers::prelude::*;
//!
//! let store = MemoryStore::with_rows(vec![bookmark("b1", at(10, 0))]);
//! assert_eq!(store.rows_for(&owner()).len(), 1);
//! ```

pub mod assertions;
pub mod cli;
pub mod fixtures;
pub mod logging;
pub mod memory;
pub mod workspace;

pub use memory::{Gate, MemoryStore};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::cli::blib_command;
    pub use crate::fixtures::*;
    pub use crate::logging::{init_test_logging, suppress_logs};
    pub use crate::memory::{CallCounts, Gate, MemoryStore};
    pub use crate::workspace::{init_workspace, temp_dir, workspace_with_config};
}
