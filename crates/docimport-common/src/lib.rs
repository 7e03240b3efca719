//! docimport common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and the logging subsystem for the docimport workspace.
//!
//! - **Types**: file records, content hashes and tri-state bookkeeping flags
//! - **Error Handling**: validation errors for the shared types
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//!
//! # Example
//!
//! ```
//! use docimport_common::types::{ContentHash, Flag};
//!
//! let hash = ContentHash::new("9f86d081884c7d65").unwrap();
//! assert_eq!(hash.pdf_file_name(), "9f86d081884c7d65.pdf");
//! assert!(!Flag::Unset.is_true());
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
