use thiserror::Error;

/// Error taxonomy for the dashboard core.
///
/// Validation errors (`InvalidChoice`, `NoSigner`, `InvalidAddress`) are
/// raised before any network call. Network and contract errors carry the
/// underlying cause so the boundary layer can render it; nothing is retried
/// automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("no injected wallet provider found")]
    NoProviderFound,

    #[error("wallet connection rejected: {0}")]
    UserRejected(String),

    #[error("no signing caller bound; connect a wallet first")]
    NoSigner,

    #[error("invalid vote choice {0}; expected 1 (yes), 2 (no) or 3 (abstain)")]
    InvalidChoice(u8),

    #[error("read call failed: {0}")]
    ReadFailed(String),

    #[error("submission rejected before inclusion: {0}")]
    SubmissionRejected(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("a submission for this action is still pending")]
    SubmissionInFlight,

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Transport-level failure reported by an injected caller capability.
///
/// The gateway and lifecycle translate these into the user-facing
/// [`GovernanceError`] taxonomy at the call boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("rejected by signer or network: {0}")]
    Rejected(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("timed out awaiting inclusion")]
    Timeout,
}
