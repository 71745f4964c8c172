use thiserror::Error;

/// The crate's single fallible-operation error type. Every public entry
/// point that can fail for a reason a caller controls — bad input, a call
/// made out of lifecycle order, a numerical solve that didn't converge —
/// returns `Result<T, SimError>`. Conditions that indicate a bug in the
/// crate itself (not reachable from validated public input) stay as
/// `debug_assert!`, not a `SimError` variant.
#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    /// A simulation API was invoked before the instance it needs exists
    /// (e.g. stepping a `Simulation` whose Hamiltonian has never been
    /// assembled).
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// A call was made that the current lifecycle state forbids.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The Hamiltonian parser, gate-name lookup, or pulse-format lookup
    /// failed on malformed or unknown input.
    #[error("parse error: {0}")]
    ParseError(String),

    /// A structurally well-formed request nonetheless violates one of the
    /// data model's hard invariants (two-qubit gate missing its second
    /// qubit, a term with more than two operators, a negative schedule
    /// time, ...).
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The ODE stepper or the steady-state Krylov solve failed to meet
    /// its tolerance within its iteration budget.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
}
