//! Discovery run errors.

use miette::Diagnostic;
use quarry_diag::Diagnostic as QuarryDiagnostic;
use thiserror::Error;

/// Unrecoverable configuration errors.
///
/// These abort the whole run immediately: continuing would leave downstream
/// state unsound (colliding ids, migrations outside the tree being built).
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum FatalError {
    #[error("duplicate resource id '{id}'")]
    #[diagnostic(
        code(quarry::duplicate_resource),
        help("every resource must have a unique name within its package")
    )]
    DuplicateResource { id: String },

    #[error("migration directory '{dir}' of package '{package}' is outside the application root")]
    #[diagnostic(
        code(quarry::migrations_outside_root),
        help("migrations must live under the application root, next to the service they belong to")
    )]
    MigrationsOutsideRoot { package: String, dir: String },
}

/// The ways a discovery run can end without a graph.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Validation produced diagnostics. The run collected everything it
    /// could before failing; `report` is the rendered, deterministic text.
    #[error("discovery failed with {} diagnostic(s)", diagnostics.len())]
    Invalid {
        diagnostics: Vec<QuarryDiagnostic>,
        report: String,
    },

    /// A configuration error aborted the run.
    #[error(transparent)]
    Fatal(#[from] FatalError),

    /// The run was cancelled before the barrier.
    #[error("discovery cancelled")]
    Cancelled,
}
