//! Wallet session handling for the injected browser provider.
//!
//! The provider is an explicitly injected capability, never ambient state,
//! so the whole core runs against a fake provider in tests. Account changes
//! arrive as push notifications from the wallet and bump the session
//! generation; every suspended operation captures a [`SessionToken`] before
//! its first await and discards its result if the token is stale at
//! resumption.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use parking_lot::Mutex;

use crate::errors::{CallFailure, GovernanceError};
use crate::gateway::{ContractGateway, SigningCaller, ViewCaller};
use crate::types::{Address, Session, SessionToken};


/// Callback registered for the wallet's `accountsChanged` push notification.
pub type AccountsChangedHandler = Box<dyn Fn(Vec<Address>) + Send + Sync>;

/// Capability surface of an injected browser wallet.
///
/// Mirrors the provider/signer split of the wallet object: account
/// authorization and change notifications on one side, chain transports on
/// the other. Absence of the injected object is represented by constructing
/// [`WalletSession`] with `None`, a checked condition rather than a crash.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Asks the wallet to authorize accounts. The first address in the
    /// returned list is the active account.
    async fn request_accounts(&self) -> Result<Vec<Address>, CallFailure>;

    /// Registers a handler fired whenever the wallet reports a new account
    /// list. An empty list means the user disconnected.
    fn on_accounts_changed(&self, handler: AccountsChangedHandler);

    /// Read-only chain transport for view calls.
    fn view_caller(&self) -> Arc<dyn ViewCaller>;

    /// Signing transport bound to one account. The returned caller keeps
    /// that identity for its whole lifetime; it never switches mid-flight.
    fn signing_caller(&self, account: &Address) -> Arc<dyn SigningCaller>;
}

struct SessionShared {
    session: Mutex<Session>,
    generation: AtomicU64,
}

impl SessionShared {
    fn apply_accounts(&self, accounts: &[Address]) {
        {
            let mut session = self.session.lock();
            match accounts.first() {
                Some(account) => {
                    session.account = Some(*account);
                    session.connected = true;
                }
                None => {
                    session.account = None;
                    session.connected = false;
                }
            }
        }
        // Every account change opens a new epoch; results captured under an
        // older token are discarded at resumption.
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

/// Owns the connection to the injected wallet: current account, connect
/// requests, and reaction to externally fired account changes.
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    shared: Arc<SessionShared>,
}

impl WalletSession {
    /// Wraps the injected provider, or its absence. When a provider is
    /// present the accounts-changed hook is registered immediately so
    /// external account switches are never missed.
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Arc<Self> {
        let shared = Arc::new(SessionShared {
            session: Mutex::new(Session::default()),
            generation: AtomicU64::new(0),
        });
        if let Some(provider) = &provider {
            let hook = Arc::downgrade(&shared);
            provider.on_accounts_changed(Box::new(move |accounts| {
                if let Some(shared) = hook.upgrade() {
                    debug!(
                        "wallet reported accountsChanged ({} account(s))",
                        accounts.len()
                    );
                    shared.apply_accounts(&accounts);
                }
            }));
        }
        Arc::new(WalletSession { provider, shared })
    }

    /// Requests account access from the injected provider.
    ///
    /// Fails with `NoProviderFound` when no wallet is injected and with
    /// `UserRejected` when the human declines or authorizes no accounts.
    pub async fn connect(&self) -> Result<Session, GovernanceError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(GovernanceError::NoProviderFound)?;
        let accounts = provider
            .request_accounts()
            .await
            .map_err(|err| GovernanceError::UserRejected(err.to_string()))?;
        if accounts.is_empty() {
            return Err(GovernanceError::UserRejected(
                "no accounts authorized".to_string(),
            ));
        }
        self.shared.apply_accounts(&accounts);
        info!("wallet connected: {}", accounts[0]);
        Ok(self.session())
    }

    pub fn session(&self) -> Session {
        self.shared.session.lock().clone()
    }

    pub fn account(&self) -> Option<Address> {
        self.shared.session.lock().account
    }

    /// Current session epoch. Capture before suspending, compare after.
    pub fn token(&self) -> SessionToken {
        SessionToken(self.shared.generation.load(Ordering::SeqCst))
    }

    pub fn is_stale(&self, token: SessionToken) -> bool {
        self.token() != token
    }

    /// Binds a gateway to the current session: the provider's view caller
    /// plus, when an account is connected, a signing caller for it.
    ///
    /// Callers must rebind after an account change; the token discipline
    /// makes any gateway bound under an older session harmless, but only a
    /// fresh binding can sign for the new account.
    pub fn bind_gateway(&self, dao: Address) -> Result<ContractGateway, GovernanceError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(GovernanceError::NoProviderFound)?;
        let signer = self
            .account()
            .map(|account| provider.signing_caller(&account));
        Ok(ContractGateway::new(dao, provider.view_caller(), signer))
    }
}
