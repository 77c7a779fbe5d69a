//! Error types

use alloy_primitives::B256;
use counter_bindings::AbiError;
use thiserror::Error;

/// Failures reported by the wallet / chain collaborator
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP transport failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// JSON-RPC error object; the message is kept verbatim
    #[error("{message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Provider message
        message: String,
    },
    /// Response that could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// A write was attempted without a connected account
    #[error("no account connected")]
    NoAccount,
    /// Calldata could not be built or return data decoded
    #[error(transparent)]
    Abi(#[from] AbiError),
    /// The receipt did not show up in time
    #[error("transaction {0:#x} not confirmed in time")]
    ConfirmationTimeout(B256),
}

/// Rejected user input for `setNumber`. No transaction is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Empty input field
    #[error("enter a value")]
    Empty,
    /// Not a non-negative decimal integer
    #[error("`{0}` is not a whole number")]
    NotNumeric(String),
    /// Larger than `uint256`
    #[error("`{0}` does not fit in uint256")]
    OutOfRange(String),
}
