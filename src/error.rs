// =============================================================================
// Error types
// =============================================================================

use thiserror::Error;

/// Broker-level precondition violations. The engine only ever calls
/// `PaperBroker::enter` from the flat branch, so these are programmer
/// errors, not expected runtime outcomes — they should panic loudly at the
/// call site rather than propagate as a `reject_reason`.
#[derive(Debug, Error, PartialEq)]
pub enum BrokerError {
    #[error("enter() called while already in a position")]
    AlreadyInPosition,
}
