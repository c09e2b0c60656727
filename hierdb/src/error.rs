//! Error types of the netlist database.

use thiserror::Error;

/// Errors returned by netlist queries, edits and the loader.
///
/// Every error is raised before any modification is made,
/// so the database is left in its previous state.
#[derive(Debug, Error)]
pub enum HierError {
    /// A name, path or handle lookup failed.
    #[error("{kind} `{name}` not found")]
    NotFound {
        /// What was looked up (design, instance, net, ...).
        kind: &'static str,
        /// The name or handle that was looked up.
        name: String,
    },

    /// A name is already taken inside its uniqueness scope.
    #[error("{kind} `{name}` already exists in {scope}")]
    DuplicateName {
        /// What was being named.
        kind: &'static str,
        /// The colliding name.
        name: String,
        /// The scope in which names must be unique.
        scope: String,
    },

    /// A terminal already sits on another net and reconnection
    /// was not requested.
    #[error("terminal {term} is already connected to net {net}")]
    AlreadyConnected {
        /// The terminal.
        term: String,
        /// The net it is connected to.
        net: String,
    },

    /// A structurally invalid request, e.g. an instantiation
    /// cycle or a net used outside its design.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A bit index outside the declared bus range.
    #[error("index {index:?} out of range {range} for `{name}`")]
    IndexOutOfRange {
        /// The bus name.
        name: String,
        /// The requested index, `None` meaning the scalar bit.
        index: Option<isize>,
        /// The declared range.
        range: String,
    },

    /// A resolved equipotential has more than one driver.
    #[error("{net} has {count} drivers: {drivers}")]
    MultiDriver {
        /// The net the equipotential was resolved from.
        net: String,
        /// The number of drivers.
        count: usize,
        /// The driver terminals.
        drivers: String,
    },

    /// Invalid structural verilog input.
    #[error("verilog: {0}")]
    Parse(String),

    /// I/O failure when reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type of the netlist database.
pub type Result<T> = std::result::Result<T, HierError>;

impl HierError {
    #[inline]
    pub(crate) fn not_found(kind: &'static str, name: impl ToString) -> HierError {
        HierError::NotFound { kind, name: name.to_string() }
    }

    #[inline]
    pub(crate) fn duplicate(
        kind: &'static str, name: impl ToString, scope: impl ToString
    ) -> HierError {
        HierError::DuplicateName {
            kind, name: name.to_string(), scope: scope.to_string()
        }
    }
}
