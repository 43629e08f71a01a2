//! End-to-end driver for a single user-initiated write.
//!
//! Submit through the gateway, suspend until inclusion, settle the handle.
//! Confirmation does not refresh the proposal store; submission and view
//! refresh are independent lifecycles and the caller triggers the reload.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::errors::GovernanceError;
use crate::gateway::{ContractGateway, TransactionHandle};
use crate::types::{SessionToken, TxState, VoteChoice};
use crate::wallet::WalletSession;


/// Drives one user action's write from submission to a terminal handle.
///
/// One instance guards one user action: a second submission while the first
/// is outstanding fails `SubmissionInFlight` before any network call.
/// Independent instances may run concurrently; there is no global write
/// lock and their handles are never confused.
pub struct TransactionLifecycle {
    session: Arc<WalletSession>,
    in_flight: AtomicBool,
}

impl TransactionLifecycle {
    pub fn new(session: Arc<WalletSession>) -> Self {
        TransactionLifecycle {
            session,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Submits a `createProposal` write and awaits inclusion.
    pub async fn create_proposal(
        &self,
        gateway: &ContractGateway,
        metadata_uri: &str,
    ) -> Result<TransactionHandle, GovernanceError> {
        let _guard = self.begin()?;
        let token = self.session.token();
        let handle = gateway.create_proposal(metadata_uri).await?;
        self.settle(handle, token).await
    }

    /// Submits a vote and awaits inclusion.
    pub async fn vote(
        &self,
        gateway: &ContractGateway,
        id: u64,
        choice: VoteChoice,
    ) -> Result<TransactionHandle, GovernanceError> {
        let _guard = self.begin()?;
        let token = self.session.token();
        let handle = gateway.vote(id, choice).await?;
        self.settle(handle, token).await
    }

    /// Vote entry point for untrusted raw ballot values; `InvalidChoice`
    /// surfaces before submission.
    pub async fn vote_raw(
        &self,
        gateway: &ContractGateway,
        id: u64,
        raw: u8,
    ) -> Result<TransactionHandle, GovernanceError> {
        let _guard = self.begin()?;
        let token = self.session.token();
        let handle = gateway.vote_raw(id, raw).await?;
        self.settle(handle, token).await
    }

    fn begin(&self) -> Result<InFlightGuard<'_>, GovernanceError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(GovernanceError::SubmissionInFlight);
        }
        Ok(InFlightGuard {
            flag: &self.in_flight,
        })
    }

    /// Awaits inclusion and settles the handle, unless the session changed
    /// while suspended. A stale outcome is discarded: the handle stays
    /// `Pending` and no shared state moves on behalf of the old session.
    async fn settle(
        &self,
        handle: TransactionHandle,
        token: SessionToken,
    ) -> Result<TransactionHandle, GovernanceError> {
        let outcome = handle.await_inclusion().await;
        if self.session.is_stale(token) {
            debug!(
                "discarding inclusion outcome for {}: session changed mid-flight",
                handle.tx()
            );
            return Ok(handle);
        }
        match outcome {
            Ok(()) => {
                info!("transaction {} confirmed", handle.tx());
                handle.resolve(TxState::Confirmed);
            }
            Err(cause) => {
                let err = GovernanceError::TransactionFailed(cause.to_string());
                warn!("transaction {}: {err}", handle.tx());
                handle.resolve(TxState::Failed(err.to_string()));
            }
        }
        Ok(handle)
    }
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
