//! Structured logging facility
//!
//! - One initialization point, `init(profile)`
//! - Boundary macros (`log_op_start!`, `log_op_end!`, `log_op_error!`) used by
//!   the managed object context around every public operation
//! - Canonical field and event names in [`schema`]
//! - An in-memory capture layer so tests can assert on emitted events
//!
//! Stores and the save cascade log their SQL-level details with
//! `tracing::debug!` only; boundary events belong to the context.
//!
//! ```rust
//! use keel_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod schema;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
