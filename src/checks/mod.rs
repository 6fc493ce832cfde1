//! Built-in check units.
//!
//! These implement [`crate::script::CheckScript`] like any externally
//! authored unit would; nothing in the core treats them specially.

pub mod file_audit;

pub use file_audit::FileAuditCheck;
