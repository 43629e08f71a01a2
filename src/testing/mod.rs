//! In-memory fakes for the injected capabilities: a scripted governance
//! chain and a wallet provider whose account changes are fired manually.
//! Available to downstream crates through the `test-utils` feature.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::CallFailure;
use crate::gateway::{RawProposal, SigningCaller, ViewCaller};
use crate::types::{Address, Proposal, TxId, Word};
use crate::wallet::{AccountsChangedHandler, WalletProvider, WalletSession};

/// Shorthand for a distinguishable test address.
pub fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

fn tx_id(n: u64) -> TxId {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    TxId(bytes)
}

enum PendingWrite {
    Create { proposer: Address, uri: String },
    Vote { id: u64, choice: u8 },
}

/// Scripted governance contract plus chain. Reads and writes are counted so
/// tests can assert that client-side validation never reaches the network.
pub struct MockChain {
    dao: Address,
    proposals: Mutex<BTreeMap<u64, Proposal>>,
    id_order: Mutex<Vec<u64>>,
    next_id: AtomicU64,
    next_tx: AtomicU64,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    fail_id_list: AtomicBool,
    fail_get: Mutex<BTreeSet<u64>>,
    reject_next_write: Mutex<Option<String>>,
    revert_next_inclusion: Mutex<Option<String>>,
    pending: Mutex<HashMap<TxId, PendingWrite>>,
    before_get: Mutex<Option<Box<dyn FnMut(u64) + Send>>>,
    before_inclusion: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl MockChain {
    pub fn new(dao: Address) -> Arc<Self> {
        Arc::new(MockChain {
            dao,
            proposals: Mutex::new(BTreeMap::new()),
            id_order: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            next_tx: AtomicU64::new(1),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            fail_id_list: AtomicBool::new(false),
            fail_get: Mutex::new(BTreeSet::new()),
            reject_next_write: Mutex::new(None),
            revert_next_inclusion: Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            before_get: Mutex::new(None),
            before_inclusion: Mutex::new(None),
        })
    }

    pub fn dao(&self) -> Address {
        self.dao
    }

    /// Signing caller bound directly to this chain, bypassing the provider.
    pub fn signer(self: &Arc<Self>, account: Address) -> Arc<MockSigner> {
        Arc::new(MockSigner {
            chain: self.clone(),
            account,
        })
    }

    /// Seeds a proposal; the id list is returned in seeding order unless
    /// overridden with [`MockChain::set_id_order`].
    pub fn seed(&self, proposal: Proposal) {
        let id = proposal.id;
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
        self.proposals.lock().insert(id, proposal);
        self.id_order.lock().push(id);
    }

    /// Overrides the order of the raw id list, e.g. to model a contract
    /// that returns ids out of creation order.
    pub fn set_id_order(&self, ids: Vec<u64>) {
        *self.id_order.lock() = ids;
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Makes the next (and every later) id-list fetch fail.
    pub fn fail_id_list(&self, fail: bool) {
        self.fail_id_list.store(fail, Ordering::SeqCst);
    }

    /// Makes every `getProposal(id)` for this id fail until cleared.
    pub fn fail_reads_for(&self, id: u64) {
        self.fail_get.lock().insert(id);
    }

    pub fn clear_read_failures(&self) {
        self.fail_get.lock().clear();
    }

    /// Rejects the next submission at the signer/network boundary.
    pub fn reject_next_write(&self, cause: &str) {
        *self.reject_next_write.lock() = Some(cause.to_string());
    }

    /// Reverts the next inclusion wait instead of applying the write.
    pub fn revert_next_inclusion(&self, cause: &str) {
        *self.revert_next_inclusion.lock() = Some(cause.to_string());
    }

    /// Installs a hook fired before every per-id read, e.g. to flip the
    /// wallet account in the middle of a load.
    pub fn on_before_get(&self, hook: Box<dyn FnMut(u64) + Send>) {
        *self.before_get.lock() = Some(hook);
    }

    /// Installs a hook fired before every inclusion wait resolves, e.g. to
    /// flip the wallet account while a write is suspended.
    pub fn on_before_inclusion(&self, hook: Box<dyn FnMut() + Send>) {
        *self.before_inclusion.lock() = Some(hook);
    }

    /// Direct chain-state inspection, bypassing call counting.
    pub fn proposal(&self, id: u64) -> Option<Proposal> {
        self.proposals.lock().get(&id).cloned()
    }

    fn check_dao(&self, dao: &Address) -> Result<(), CallFailure> {
        if *dao != self.dao {
            return Err(CallFailure::Rpc(format!("unknown contract {dao}")));
        }
        Ok(())
    }

    fn apply(&self, write: PendingWrite, at: TxId) -> Result<(), CallFailure> {
        match write {
            PendingWrite::Create { proposer, uri } => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                let start = 1_700_000_000 + id;
                self.proposals.lock().insert(
                    id,
                    Proposal {
                        id,
                        proposer,
                        start,
                        end: start + 604_800,
                        metadata_uri: uri,
                        yes: 0,
                        no: 0,
                        abstain: 0,
                        executed: false,
                    },
                );
                self.id_order.lock().push(id);
                Ok(())
            }
            PendingWrite::Vote { id, choice } => {
                let mut proposals = self.proposals.lock();
                let proposal = proposals
                    .get_mut(&id)
                    .ok_or_else(|| CallFailure::Reverted(format!("unknown proposal {id}")))?;
                match choice {
                    1 => proposal.yes += 1,
                    2 => proposal.no += 1,
                    3 => proposal.abstain += 1,
                    other => {
                        return Err(CallFailure::Reverted(format!(
                            "invalid choice {other} in {at}"
                        )))
                    }
                }
                Ok(())
            }
        }
    }

    fn submit(&self, write: PendingWrite) -> Result<TxId, CallFailure> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cause) = self.reject_next_write.lock().take() {
            return Err(CallFailure::Rejected(cause));
        }
        let tx = tx_id(self.next_tx.fetch_add(1, Ordering::SeqCst));
        self.pending.lock().insert(tx, write);
        Ok(tx)
    }

    fn encode(proposal: &Proposal) -> RawProposal {
        RawProposal {
            id: Word::from_u64(proposal.id),
            proposer: proposal.proposer,
            start: Word::from_u64(proposal.start),
            end: Word::from_u64(proposal.end),
            metadata_uri: proposal.metadata_uri.clone(),
            yes: Word::from_u128(proposal.yes),
            no: Word::from_u128(proposal.no),
            abstain: Word::from_u128(proposal.abstain),
            executed: proposal.executed,
        }
    }
}

#[async_trait]
impl ViewCaller for MockChain {
    async fn get_proposal_ids(&self, dao: &Address) -> Result<Vec<Word>, CallFailure> {
        // Every fake call yields once so tests exercise real suspension points
        tokio::task::yield_now().await;
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check_dao(dao)?;
        if self.fail_id_list.load(Ordering::SeqCst) {
            return Err(CallFailure::Rpc("id list unavailable".to_string()));
        }
        Ok(self.id_order.lock().iter().map(|id| Word::from_u64(*id)).collect())
    }

    async fn get_proposal(&self, dao: &Address, id: u64) -> Result<RawProposal, CallFailure> {
        tokio::task::yield_now().await;
        if let Some(hook) = self.before_get.lock().as_mut() {
            hook(id);
        }
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check_dao(dao)?;
        if self.fail_get.lock().contains(&id) {
            return Err(CallFailure::Rpc(format!("getProposal({id}) unavailable")));
        }
        self.proposals
            .lock()
            .get(&id)
            .map(MockChain::encode)
            .ok_or_else(|| CallFailure::Rpc(format!("unknown proposal {id}")))
    }
}

/// Signing transport bound to one account, handed out by the provider.
pub struct MockSigner {
    chain: Arc<MockChain>,
    account: Address,
}

#[async_trait]
impl SigningCaller for MockSigner {
    fn account(&self) -> Address {
        self.account
    }

    async fn create_proposal(
        &self,
        dao: &Address,
        metadata_uri: &str,
    ) -> Result<TxId, CallFailure> {
        tokio::task::yield_now().await;
        self.chain.check_dao(dao)?;
        self.chain.submit(PendingWrite::Create {
            proposer: self.account,
            uri: metadata_uri.to_string(),
        })
    }

    async fn vote(&self, dao: &Address, id: u64, choice: u8) -> Result<TxId, CallFailure> {
        tokio::task::yield_now().await;
        self.chain.check_dao(dao)?;
        self.chain.submit(PendingWrite::Vote { id, choice })
    }

    async fn await_inclusion(&self, tx: &TxId) -> Result<(), CallFailure> {
        tokio::task::yield_now().await;
        if let Some(hook) = self.chain.before_inclusion.lock().as_mut() {
            hook();
        }
        if let Some(cause) = self.chain.revert_next_inclusion.lock().take() {
            self.chain.pending.lock().remove(tx);
            return Err(CallFailure::Reverted(cause));
        }
        let write = self
            .chain
            .pending
            .lock()
            .remove(tx)
            .ok_or_else(|| CallFailure::Rpc(format!("unknown transaction {tx}")))?;
        self.chain.apply(write, *tx)
    }
}

/// Fake injected wallet. Account changes are pushed with
/// [`MockWalletProvider::fire_accounts_changed`], mirroring the external
/// `accountsChanged` notification.
pub struct MockWalletProvider {
    chain: Arc<MockChain>,
    accounts: Mutex<Vec<Address>>,
    reject_connect: Mutex<Option<String>>,
    handlers: Mutex<Vec<AccountsChangedHandler>>,
}

impl MockWalletProvider {
    pub fn new(chain: Arc<MockChain>, accounts: Vec<Address>) -> Arc<Self> {
        Arc::new(MockWalletProvider {
            chain,
            accounts: Mutex::new(accounts),
            reject_connect: Mutex::new(None),
            handlers: Mutex::new(Vec::new()),
        })
    }

    /// Makes the next connection request fail as a user decline.
    pub fn reject_connect(&self, cause: &str) {
        *self.reject_connect.lock() = Some(cause.to_string());
    }

    /// Pushes an external account change to every registered handler.
    pub fn fire_accounts_changed(&self, accounts: Vec<Address>) {
        *self.accounts.lock() = accounts.clone();
        for handler in self.handlers.lock().iter() {
            handler(accounts.clone());
        }
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, CallFailure> {
        tokio::task::yield_now().await;
        if let Some(cause) = self.reject_connect.lock().take() {
            return Err(CallFailure::Rejected(cause));
        }
        Ok(self.accounts.lock().clone())
    }

    fn on_accounts_changed(&self, handler: AccountsChangedHandler) {
        self.handlers.lock().push(handler);
    }

    fn view_caller(&self) -> Arc<dyn ViewCaller> {
        self.chain.clone()
    }

    fn signing_caller(&self, account: &Address) -> Arc<dyn SigningCaller> {
        Arc::new(MockSigner {
            chain: self.chain.clone(),
            account: *account,
        })
    }
}

/// Wraps the fake provider in a wallet session, upcasting to the injected
/// capability trait.
pub fn wallet_session(provider: Arc<MockWalletProvider>) -> Arc<WalletSession> {
    let provider: Arc<dyn WalletProvider> = provider;
    WalletSession::new(Some(provider))
}

/// Seeds a minimal valid proposal for tests that only care about ids.
pub fn proposal(id: u64, proposer: Address) -> Proposal {
    let start = 1_700_000_000 + id;
    Proposal {
        id,
        proposer,
        start,
        end: start + 604_800,
        metadata_uri: format!("ipfs://proposal-{id}"),
        yes: 0,
        no: 0,
        abstain: 0,
        executed: false,
    }
}
