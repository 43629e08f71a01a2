//! Typed façade over the governance contract's fixed ABI.
//!
//! The gateway is a stateless translation layer: it holds the bound contract
//! address, a view caller for reads and optionally a signing caller for
//! writes, and turns typed intents into contract calls. Decoding is
//! all-or-nothing; a proposal is either fully decoded or the read fails.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;

use crate::errors::{CallFailure, GovernanceError};
use crate::types::{Address, Proposal, TxId, TxState, VoteChoice, Word};

#[cfg(test)]
pub mod tests;

/// Raw `getProposal` return tuple, numeric fields still in wire form.
#[derive(Clone, Debug)]
pub struct RawProposal {
    pub id: Word,
    pub proposer: Address,
    pub start: Word,
    pub end: Word,
    pub metadata_uri: String,
    pub yes: Word,
    pub no: Word,
    pub abstain: Word,
    pub executed: bool,
}

/// Read-only chain transport for the governance ABI.
#[async_trait]
pub trait ViewCaller: Send + Sync {
    async fn get_proposal_ids(&self, dao: &Address) -> Result<Vec<Word>, CallFailure>;
    async fn get_proposal(&self, dao: &Address, id: u64) -> Result<RawProposal, CallFailure>;
}

/// Signing chain transport bound to one account.
///
/// A submitted call completes through the caller it was constructed with;
/// an account change never reroutes an in-flight submission.
#[async_trait]
pub trait SigningCaller: Send + Sync {
    fn account(&self) -> Address;
    async fn create_proposal(&self, dao: &Address, metadata_uri: &str)
        -> Result<TxId, CallFailure>;
    async fn vote(&self, dao: &Address, id: u64, choice: u8) -> Result<TxId, CallFailure>;
    async fn await_inclusion(&self, tx: &TxId) -> Result<(), CallFailure>;
}

/// Handle for one submitted write: created at submission, terminal at
/// `Confirmed` or `Failed`, never reused for a second submission.
///
/// Clones share the same state cell, so the boundary layer can observe the
/// handle the lifecycle is driving. The signing caller that produced the
/// submission rides along so the inclusion wait uses the same identity.
#[derive(Clone)]
pub struct TransactionHandle {
    tx: TxId,
    caller: Arc<dyn SigningCaller>,
    state: Arc<Mutex<TxState>>,
}

impl TransactionHandle {
    fn submitted(tx: TxId, caller: Arc<dyn SigningCaller>) -> Self {
        TransactionHandle {
            tx,
            caller,
            state: Arc::new(Mutex::new(TxState::Pending)),
        }
    }

    pub fn tx(&self) -> TxId {
        self.tx
    }

    pub fn state(&self) -> TxState {
        self.state.lock().clone()
    }

    pub(crate) async fn await_inclusion(&self) -> Result<(), CallFailure> {
        self.caller.await_inclusion(&self.tx).await
    }

    /// Moves the handle out of `Pending`. Terminal states are final; a late
    /// resolution against a settled handle is ignored.
    pub(crate) fn resolve(&self, next: TxState) {
        let mut state = self.state.lock();
        if *state == TxState::Pending {
            *state = next;
        } else {
            debug!("ignoring resolution for settled transaction {}", self.tx);
        }
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("tx", &self.tx)
            .field("state", &self.state())
            .finish()
    }
}

/// Stateless façade bound to `(dao address, view caller, optional signer)`.
#[derive(Clone)]
pub struct ContractGateway {
    dao: Address,
    views: Arc<dyn ViewCaller>,
    signer: Option<Arc<dyn SigningCaller>>,
}

impl fmt::Debug for ContractGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractGateway")
            .field("dao", &self.dao)
            .field("signer", &self.signer.is_some())
            .finish()
    }
}

impl ContractGateway {
    pub fn new(dao: Address, views: Arc<dyn ViewCaller>, signer: Option<Arc<dyn SigningCaller>>) -> Self {
        ContractGateway { dao, views, signer }
    }

    /// Gateway without a signing caller; only view calls will succeed.
    pub fn read_only(dao: Address, views: Arc<dyn ViewCaller>) -> Self {
        ContractGateway::new(dao, views, None)
    }

    pub fn dao(&self) -> Address {
        self.dao
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }

    pub fn signer_account(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.account())
    }

    pub async fn list_proposal_ids(&self) -> Result<Vec<u64>, GovernanceError> {
        let words = self
            .views
            .get_proposal_ids(&self.dao)
            .await
            .map_err(read_failed)?;
        words
            .into_iter()
            .map(|word| {
                word.to_u64().ok_or_else(|| {
                    GovernanceError::ReadFailed(format!("proposal id {word} exceeds u64 range"))
                })
            })
            .collect()
    }

    pub async fn get_proposal(&self, id: u64) -> Result<Proposal, GovernanceError> {
        let raw = self
            .views
            .get_proposal(&self.dao, id)
            .await
            .map_err(read_failed)?;
        decode_proposal(raw)
    }

    pub async fn create_proposal(
        &self,
        metadata_uri: &str,
    ) -> Result<TransactionHandle, GovernanceError> {
        let signer = self.signer()?;
        let tx = signer
            .create_proposal(&self.dao, metadata_uri)
            .await
            .map_err(submission_rejected)?;
        debug!("createProposal submitted to {}: {}", self.dao, tx);
        Ok(TransactionHandle::submitted(tx, signer.clone()))
    }

    pub async fn vote(
        &self,
        id: u64,
        choice: VoteChoice,
    ) -> Result<TransactionHandle, GovernanceError> {
        let signer = self.signer()?;
        let tx = signer
            .vote(&self.dao, id, choice.as_u8())
            .await
            .map_err(submission_rejected)?;
        debug!("vote({id}, {choice:?}) submitted to {}: {}", self.dao, tx);
        Ok(TransactionHandle::submitted(tx, signer.clone()))
    }

    /// Entry point for untrusted raw ballot values. Membership in {1, 2, 3}
    /// is checked here, before any network call.
    pub async fn vote_raw(&self, id: u64, raw: u8) -> Result<TransactionHandle, GovernanceError> {
        let choice = VoteChoice::from_raw(raw).ok_or(GovernanceError::InvalidChoice(raw))?;
        self.vote(id, choice).await
    }

    fn signer(&self) -> Result<&Arc<dyn SigningCaller>, GovernanceError> {
        self.signer.as_ref().ok_or(GovernanceError::NoSigner)
    }
}

fn read_failed(err: CallFailure) -> GovernanceError {
    GovernanceError::ReadFailed(err.to_string())
}

fn submission_rejected(err: CallFailure) -> GovernanceError {
    GovernanceError::SubmissionRejected(err.to_string())
}

/// Decodes a raw contract tuple into a [`Proposal`]. All-or-nothing: any
/// field out of range, or `start > end`, fails the whole decode.
pub(crate) fn decode_proposal(raw: RawProposal) -> Result<Proposal, GovernanceError> {
    let id = narrow_u64(raw.id, "id")?;
    let start = narrow_u64(raw.start, "start")?;
    let end = narrow_u64(raw.end, "end")?;
    if start > end {
        return Err(GovernanceError::ReadFailed(format!(
            "proposal {id} has start {start} after end {end}"
        )));
    }
    Ok(Proposal {
        id,
        proposer: raw.proposer,
        start,
        end,
        metadata_uri: raw.metadata_uri,
        yes: narrow_u128(raw.yes, "yes")?,
        no: narrow_u128(raw.no, "no")?,
        abstain: narrow_u128(raw.abstain, "abstain")?,
        executed: raw.executed,
    })
}

fn narrow_u64(word: Word, field: &str) -> Result<u64, GovernanceError> {
    word.to_u64()
        .ok_or_else(|| GovernanceError::ReadFailed(format!("field {field} ({word}) exceeds u64 range")))
}

fn narrow_u128(word: Word, field: &str) -> Result<u128, GovernanceError> {
    word.to_u128().ok_or_else(|| {
        GovernanceError::ReadFailed(format!("field {field} ({word}) exceeds u128 range"))
    })
}
