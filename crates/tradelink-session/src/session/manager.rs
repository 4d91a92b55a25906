/*
[INPUT]:  Auth API, persistence, notifier, transport events, login inputs
[OUTPUT]: Observable session state and login/logout/refresh operations
[POS]:    Session layer - facade composing reducer, storage, scheduler and flows
[UPDATE]: When adding session operations or changing lifecycle policy
*/

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{PageLocation, WalletChallengeFlow, WalletLogin, WalletSigner, take_link_token};
use crate::config::{DEFAULT_FALLBACK_TELEGRAM_ID, SessionConfig};
use crate::http::{AuthApi, AuthClient, Result, SESSION_EXPIRED_MESSAGE, SessionError};
use crate::types::{TokenTriad, User};

use super::events::{AuthEventSource, TransportEvent};
use super::notice::{Notice, Notifier, TracingNotifier};
use super::scheduler::{DEFAULT_REFRESH_INTERVAL, RefreshScheduler, RefreshTick};
use super::state::{Session, SessionAction};
use super::storage::{FileStore, SessionStorage};

const LOGOUT_MESSAGE: &str = "Logged out successfully";

/// Builder for [`SessionManager`]
pub struct SessionManagerBuilder {
    api: Arc<dyn AuthApi>,
    storage: Option<SessionStorage>,
    notifier: Option<Arc<dyn Notifier>>,
    events: Option<Arc<dyn AuthEventSource>>,
    refresh_interval: Duration,
    fallback_telegram_id: i64,
    ref_id: Option<String>,
}

impl SessionManagerBuilder {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self {
            api,
            storage: None,
            notifier: None,
            events: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fallback_telegram_id: DEFAULT_FALLBACK_TELEGRAM_ID,
            ref_id: None,
        }
    }

    /// HTTP client, file storage and timers taken from `config`
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        let client = AuthClient::with_config(config.client_config(), &config.api_base_url)?;
        let storage = SessionStorage::new(Arc::new(FileStore::new(&config.storage_dir)));

        Ok(Self::new(Arc::new(client))
            .storage(storage)
            .refresh_interval(config.refresh_interval())
            .fallback_telegram_id(config.fallback_telegram_id)
            .ref_id(config.ref_id.clone()))
    }

    pub fn storage(mut self, storage: SessionStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn events(mut self, events: Arc<dyn AuthEventSource>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn fallback_telegram_id(mut self, telegram_id: i64) -> Self {
        self.fallback_telegram_id = telegram_id;
        self
    }

    pub fn ref_id(mut self, ref_id: Option<String>) -> Self {
        self.ref_id = ref_id;
        self
    }

    pub fn build(self) -> SessionManager {
        let (scheduler, ticks) = RefreshScheduler::new(self.refresh_interval);
        let (state, _) = watch::channel(Session::default());

        SessionManager {
            inner: Arc::new(Inner {
                api: self.api,
                storage: self.storage.unwrap_or_else(SessionStorage::in_memory),
                notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
                events: self.events,
                state,
                epoch: AtomicU64::new(0),
                lifecycle: Mutex::new(()),
                scheduler,
                ticks: Mutex::new(Some(ticks)),
                driver: Mutex::new(None),
                background: Mutex::new(Vec::new()),
                fallback_telegram_id: self.fallback_telegram_id,
                ref_id: self.ref_id,
            }),
        }
    }
}

struct Inner {
    api: Arc<dyn AuthApi>,
    storage: SessionStorage,
    notifier: Arc<dyn Notifier>,
    events: Option<Arc<dyn AuthEventSource>>,
    state: watch::Sender<Session>,
    /// Bumped on every login and logout; responses from an older epoch are dropped
    epoch: AtomicU64,
    /// Held while an epoch is checked or moved together with the writes it guards
    lifecycle: Mutex<()>,
    scheduler: RefreshScheduler,
    ticks: Mutex<Option<mpsc::UnboundedReceiver<RefreshTick>>>,
    driver: Mutex<Option<CancellationToken>>,
    /// Detached post-login work, awaited by `settle`
    background: Mutex<Vec<JoinHandle<()>>>,
    fallback_telegram_id: i64,
    ref_id: Option<String>,
}

/// What the local half of a logout found before resetting the session
struct EndedSession {
    refresh_token: Option<String>,
    was_authenticated: bool,
}

/// Single entry point for session operations.
///
/// Cheap to clone; clones share one session. All state changes go through
/// [`SessionManager::dispatch`], so reducer updates never interleave.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn builder(api: Arc<dyn AuthApi>) -> SessionManagerBuilder {
        SessionManagerBuilder::new(api)
    }

    /// Manager backed by the HTTP client and file storage described by `config`
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Ok(SessionManagerBuilder::from_config(config)?.build())
    }

    /// Snapshot of the current session
    pub fn state(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.inner.state.borrow().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.borrow().access_token().map(str::to_string)
    }

    pub fn is_refresh_armed(&self) -> bool {
        self.inner.scheduler.is_armed()
    }

    /// The single dispatch point into the reducer
    pub fn dispatch(&self, action: SessionAction) {
        self.inner
            .state
            .send_modify(|session| *session = session.reduce(action));
    }

    fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn next_epoch(&self) -> u64 {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lifecycle(&self) -> MutexGuard<'_, ()> {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Restore from persistence, arm the scheduler and start listening.
    ///
    /// Restored tokens are trusted as-is; no network call is made. Must run
    /// inside a tokio runtime. Calling it twice does nothing the second time.
    pub fn initialize(&self) {
        let Some(ticks) = self.inner.ticks.lock().ok().and_then(|mut t| t.take()) else {
            warn!("session manager already initialized");
            return;
        };

        match self.inner.storage.load() {
            Some(stored) => {
                let _lifecycle = self.lifecycle();
                let epoch = self.next_epoch();
                info!(
                    auth_method = ?stored.user.auth_method(),
                    username = %stored.user.username,
                    epoch,
                    "session restored from storage"
                );
                self.dispatch(SessionAction::LoginSuccess {
                    user: stored.user,
                    tokens: stored.tokens,
                });
                self.inner.scheduler.arm();
            }
            None => debug!("no persisted session"),
        }

        self.spawn_driver(ticks);
    }

    /// Stop listening for transport events and cancel the refresh timer
    pub fn shutdown(&self) {
        if let Ok(mut driver) = self.inner.driver.lock()
            && let Some(token) = driver.take()
        {
            token.cancel();
        }
        self.inner.scheduler.cancel();
        debug!("session manager shut down");
    }

    fn spawn_driver(&self, mut ticks: mpsc::UnboundedReceiver<RefreshTick>) {
        let mut events = self.inner.events.as_ref().map(|source| source.subscribe());
        let token = CancellationToken::new();
        if let Ok(mut driver) = self.inner.driver.lock() {
            *driver = Some(token.clone());
        }

        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    tick = ticks.recv() => match tick {
                        Some(tick) => manager.on_tick(tick).await,
                        None => break,
                    },
                    event = next_event(&mut events) => match event {
                        Some(event) => manager.handle_transport_event(event).await,
                        None => {
                            debug!("transport event source closed");
                            events = None;
                        }
                    },
                }
            }
            debug!("session driver stopped");
        });
    }

    async fn on_tick(&self, tick: RefreshTick) {
        if !self.inner.scheduler.is_current(tick) {
            debug!(generation = tick.generation, "ignoring tick from a replaced timer");
            return;
        }
        if let Err(err) = self.refresh().await {
            debug!(error = %err, "scheduled refresh did not complete");
        }
    }

    /// React to a signal raised by the transport layer
    pub async fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::TokensRefreshed(tokens) => {
                if self.store_refreshed_tokens(tokens, self.epoch()) {
                    debug!("tokens refreshed by transport");
                } else {
                    debug!("ignoring transport-refreshed tokens for a signed-out session");
                }
            }
            TransportEvent::AuthenticationFailed {
                should_logout: true,
                reason,
            } => {
                let Some(ended) = self.end_session(None, None) else {
                    return;
                };
                warn!(
                    %reason,
                    was_authenticated = ended.was_authenticated,
                    "transport reported authentication failure"
                );
                if ended.was_authenticated {
                    self.inner.notifier.notify(Notice::error(SESSION_EXPIRED_MESSAGE));
                }
            }
            TransportEvent::AuthenticationFailed {
                should_logout: false,
                reason,
            } => {
                debug!(%reason, "transport authentication warning");
            }
        }
    }

    /// Adopt `tokens` if the session captured at `epoch` is still signed in
    fn store_refreshed_tokens(&self, tokens: TokenTriad, epoch: u64) -> bool {
        let _lifecycle = self.lifecycle();
        if self.epoch() != epoch || self.user().is_none() {
            return false;
        }
        if let Err(err) = self.inner.storage.save_tokens(&tokens) {
            warn!(error = %err, "failed to persist refreshed tokens");
        }
        self.dispatch(SessionAction::RefreshSuccess(tokens));
        self.inner.scheduler.arm();
        true
    }

    /// Local half of logout: stop the timer, forget persisted state, reset.
    ///
    /// With `expected_epoch` set, nothing happens if the session has since
    /// moved on. `error` is stamped onto the reset session.
    fn end_session(
        &self,
        expected_epoch: Option<u64>,
        error: Option<&str>,
    ) -> Option<EndedSession> {
        let _lifecycle = self.lifecycle();
        if expected_epoch.is_some_and(|epoch| epoch != self.epoch()) {
            return None;
        }

        let session = self.state();
        self.next_epoch();
        self.inner.scheduler.cancel();
        if let Err(err) = self.inner.storage.clear() {
            warn!(error = %err, "failed to clear persisted session");
        }
        self.dispatch(SessionAction::Logout);
        if let Some(message) = error {
            self.dispatch(SessionAction::SetError(Some(message.to_string())));
        }

        Some(EndedSession {
            refresh_token: session.refresh_token().map(str::to_string),
            was_authenticated: session.is_authenticated(),
        })
    }

    /// Remote half of logout; failures are logged and swallowed
    async fn revoke(&self, refresh_token: Option<String>) {
        let Some(refresh_token) = refresh_token else {
            return;
        };
        match self.inner.api.logout(&refresh_token).await {
            Ok(message) => debug!(%message, "remote logout acknowledged"),
            Err(err) => warn!(error = %err, "remote logout failed, continuing locally"),
        }
    }

    fn complete_login(&self, user: User, tokens: TokenTriad) {
        let _lifecycle = self.lifecycle();
        let epoch = self.next_epoch();
        if let Err(err) = self.inner.storage.save(&user, &tokens) {
            warn!(error = %err, "failed to persist session");
        }
        info!(
            auth_method = ?user.auth_method(),
            username = %user.username,
            epoch,
            "login succeeded"
        );
        self.dispatch(SessionAction::LoginSuccess { user, tokens });
        self.inner.scheduler.arm();
    }

    fn fail_login(&self, err: &SessionError, message: &'static str) {
        self.dispatch(SessionAction::SetLoading(false));
        self.dispatch(SessionAction::SetError(Some(message.to_string())));
        self.inner.notifier.notify(Notice::error(message));
        debug!(error = %err, "login failure surfaced");
    }

    /// Sign in by signing a server challenge with `signer`.
    ///
    /// A declined or unsupported signature is returned to the caller only;
    /// the session's `error` stays untouched.
    pub async fn login_with_wallet(&self, signer: &dyn WalletSigner) -> Result<User> {
        self.dispatch(SessionAction::SetError(None));
        self.dispatch(SessionAction::SetLoading(true));

        let mut flow = WalletChallengeFlow::new(self.inner.api.as_ref())
            .with_ref_id(self.inner.ref_id.as_deref());

        match flow.run(signer).await {
            Ok(WalletLogin { user, tokens }) => {
                self.complete_login(user.clone(), tokens.clone());
                self.spawn_routing_address_sync(user.solana_wallet_address.clone(), tokens);
                Ok(user)
            }
            Err(err) if err.is_rejection() => {
                info!(error = %err, "wallet signature declined");
                self.dispatch(SessionAction::SetLoading(false));
                Err(err)
            }
            Err(err) => {
                self.fail_login(&err, err.login_message());
                Err(err)
            }
        }
    }

    /// Adopt the backend's routing address once balances are known.
    ///
    /// Runs detached; failures are logged and never undo the login.
    fn spawn_routing_address_sync(&self, signing_address: String, tokens: TokenTriad) {
        let manager = self.clone();
        let epoch = self.epoch();

        let handle = tokio::spawn(async move {
            let snapshot = match manager.inner.api.fetch_balances(&tokens.access_token).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(error = %err, "balance fetch after login failed");
                    return;
                }
            };

            let Some(routing_address) = snapshot.routing_address(&signing_address) else {
                return;
            };
            if manager.apply_wallet_address(routing_address, Some(epoch)) {
                info!(%routing_address, "adopted routing address");
            } else {
                debug!("session changed before routing address arrived");
            }
        });

        if let Ok(mut background) = self.inner.background.lock() {
            background.retain(|task| !task.is_finished());
            background.push(handle);
        }
    }

    /// Wait for detached post-login work, such as the routing address sync
    pub async fn settle(&self) {
        let pending = match self.inner.background.lock() {
            Ok(mut background) => std::mem::take(&mut *background),
            Err(_) => return,
        };
        for task in pending {
            if let Err(err) = task.await {
                warn!(error = %err, "background session task failed");
            }
        }
    }

    /// Sign in with a one-time token handed off through the page fragment.
    ///
    /// Returns `Ok(None)` when the page carries no token. The fragment is
    /// stripped before verification so the token is consumed exactly once.
    pub async fn login_with_link(&self, location: &dyn PageLocation) -> Result<Option<User>> {
        let Some(link) = take_link_token(location) else {
            return Ok(None);
        };

        self.dispatch(SessionAction::SetError(None));
        self.dispatch(SessionAction::SetLoading(true));

        match self.inner.api.verify_token(&link.token).await {
            Ok(tokens) => {
                let telegram_id = link.telegram_id_or(self.inner.fallback_telegram_id);
                let user = User::from_telegram_handoff(telegram_id, Utc::now().timestamp());
                self.complete_login(user.clone(), tokens);
                Ok(Some(user))
            }
            Err(err) => {
                warn!(error = %err, "link token verification failed");
                self.fail_login(&err, err.credential_message());
                Err(err)
            }
        }
    }

    /// Exchange the held refresh token for a new triad.
    ///
    /// Any failure ends the session: the user is logged out and the error is
    /// classified as expired or generic.
    pub async fn refresh(&self) -> Result<TokenTriad> {
        let Some(refresh_token) = self.state().refresh_token().map(str::to_string) else {
            return Err(SessionError::NoRefreshToken);
        };
        let epoch = self.epoch();

        match self.inner.api.refresh_token(&refresh_token).await {
            Ok(tokens) => {
                if !self.store_refreshed_tokens(tokens.clone(), epoch) {
                    debug!("dropping refresh response for a replaced session");
                    return Err(SessionError::StaleSession);
                }
                debug!("tokens refreshed");
                Ok(tokens)
            }
            Err(err) => {
                let message = err.credential_message();
                let Some(ended) = self.end_session(Some(epoch), Some(message)) else {
                    debug!(error = %err, "refresh failed for a replaced session");
                    return Err(err);
                };
                warn!(error = %err, expired = err.is_expiry(), "token refresh failed, logged out");
                self.inner.notifier.notify(Notice::error(message));

                self.revoke(ended.refresh_token).await;
                self.inner.notifier.notify(Notice::success(LOGOUT_MESSAGE));
                Err(err)
            }
        }
    }

    /// End the session.
    ///
    /// Local state is reset before the remote revoke is attempted, so nothing
    /// can re-arm the timer or re-populate the session while it is in flight.
    pub async fn logout(&self) {
        self.dispatch(SessionAction::SetLoading(true));
        let ended = self.end_session(None, None);

        self.revoke(ended.and_then(|ended| ended.refresh_token)).await;
        self.inner.notifier.notify(Notice::success(LOGOUT_MESSAGE));
        info!("logged out");
    }

    pub fn clear_error(&self) {
        self.dispatch(SessionAction::SetError(None));
    }

    /// Re-address the signed-in user and persist the updated record
    pub fn update_wallet_address(&self, address: &str) {
        self.apply_wallet_address(address, None);
    }

    fn apply_wallet_address(&self, address: &str, expected_epoch: Option<u64>) -> bool {
        let _lifecycle = self.lifecycle();
        if expected_epoch.is_some_and(|epoch| epoch != self.epoch()) {
            return false;
        }
        self.dispatch(SessionAction::UpdateWalletAddress(address.to_string()));
        if let Some(user) = self.user()
            && let Err(err) = self.inner.storage.save_user(&user)
        {
            warn!(error = %err, "failed to persist updated user");
        }
        true
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    let Some(rx) = events.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "transport events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
