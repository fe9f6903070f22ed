//! Per-run failures of the incremental engine (O1xxx).
//!
//! Only analyzer-input problems surface as errors; internal invariant
//! violations are assertions, because a broken graph must not be reused.
//! After an error the optimizer state is half-mutated: callers should
//! [`crate::IncOptimizer::reset`] and rebuild in batch mode.

use miette::Diagnostic;
use stoat_identity::Name;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum OptimizerError {
    #[error("class {class} extends {superclass}, which is not part of the program")]
    #[diagnostic(code(O1001))]
    MissingSuperclass { class: Name, superclass: Name },

    #[error("class {class} has no superclass, but the hierarchy is already rooted at {root}")]
    #[diagnostic(code(O1002))]
    DuplicateRoot { class: Name, root: Name },
}
