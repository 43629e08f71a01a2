pub mod errors;
pub mod gateway;
pub mod lifecycle;
pub mod store;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used items
pub use errors::{CallFailure, GovernanceError};
pub use gateway::{ContractGateway, RawProposal, SigningCaller, TransactionHandle, ViewCaller};
pub use lifecycle::TransactionLifecycle;
pub use store::{LoadPhase, ProposalStore};
pub use types::{
    Address, Proposal, ProposalSnapshot, Session, SessionToken, TxId, TxState, VoteChoice, Word,
};
pub use wallet::{WalletProvider, WalletSession};

#[cfg(test)]
mod tests {
    pub mod integration;
}
