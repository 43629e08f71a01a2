//! Last-synchronized proposal snapshot for one governance contract.
//!
//! State machine per dao address: `Idle → Loading → Loaded | LoadFailed`.
//! The published snapshot lives next to the phase, not inside it, so a
//! failed reload never clobbers the last good snapshot. Stale results
//! (session changed while the load was suspended) are discarded, not
//! published and not reported as errors.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::errors::GovernanceError;
use crate::gateway::ContractGateway;
use crate::types::{Address, Proposal, ProposalSnapshot};
use crate::wallet::WalletSession;


/// Load phase of the store. `LoadFailed` carries the user-visible cause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    LoadFailed(String),
}

struct StoreState {
    phase: LoadPhase,
    snapshot: Option<ProposalSnapshot>,
}

/// Holds the last-synchronized snapshot of all proposals for one dao.
pub struct ProposalStore {
    dao: Address,
    session: Arc<WalletSession>,
    state: Mutex<StoreState>,
}

impl ProposalStore {
    pub fn new(dao: Address, session: Arc<WalletSession>) -> Self {
        ProposalStore {
            dao,
            session,
            state: Mutex::new(StoreState {
                phase: LoadPhase::Idle,
                snapshot: None,
            }),
        }
    }

    pub fn dao(&self) -> Address {
        self.dao
    }

    pub fn phase(&self) -> LoadPhase {
        self.state.lock().phase.clone()
    }

    pub fn snapshot(&self) -> Option<ProposalSnapshot> {
        self.state.lock().snapshot.clone()
    }

    /// Fetches the id list and then every proposal record, publishing one
    /// consistent snapshot ordered most-recently-created first.
    ///
    /// A call while already `Loading` is a no-op. Any single per-id failure
    /// fails the whole load; partial snapshots are never published. A result
    /// arriving after the session changed mid-flight is discarded and the
    /// previous phase restored.
    pub async fn load(&self, gateway: &ContractGateway) -> Result<(), GovernanceError> {
        debug_assert_eq!(gateway.dao(), self.dao, "gateway bound to a different dao");
        let token = self.session.token();
        let viewer = self.session.account();
        let prior = {
            let mut state = self.state.lock();
            if state.phase == LoadPhase::Loading {
                debug!("load already in progress for {}", self.dao);
                return Ok(());
            }
            let prior = state.phase.clone();
            state.phase = LoadPhase::Loading;
            prior
        };

        match self.fetch_all(gateway).await {
            Ok(mut proposals) => {
                if self.session.is_stale(token) {
                    debug!(
                        "discarding snapshot for {}: session changed during load",
                        self.dao
                    );
                    self.state.lock().phase = prior;
                    return Ok(());
                }
                proposals.sort_by(|a, b| b.id.cmp(&a.id));
                let count = proposals.len();
                let mut state = self.state.lock();
                state.snapshot = Some(ProposalSnapshot {
                    dao: self.dao,
                    viewer,
                    proposals,
                });
                state.phase = LoadPhase::Loaded;
                info!("loaded {count} proposal(s) from {}", self.dao);
                Ok(())
            }
            Err(err) => {
                if self.session.is_stale(token) {
                    debug!(
                        "discarding load failure for {}: session changed during load",
                        self.dao
                    );
                    self.state.lock().phase = prior;
                    return Ok(());
                }
                warn!("proposal load failed for {}: {err}", self.dao);
                self.state.lock().phase = LoadPhase::LoadFailed(err.to_string());
                Err(err)
            }
        }
    }

    /// The id-list fetch strictly precedes the per-id fetches; the per-id
    /// order itself carries no guarantee.
    async fn fetch_all(&self, gateway: &ContractGateway) -> Result<Vec<Proposal>, GovernanceError> {
        let ids: BTreeSet<u64> = gateway.list_proposal_ids().await?.into_iter().collect();
        let mut proposals = Vec::with_capacity(ids.len());
        for id in ids {
            proposals.push(gateway.get_proposal(id).await?);
        }
        Ok(proposals)
    }
}
