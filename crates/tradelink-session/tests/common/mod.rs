/*
[INPUT]:  Test scenarios needing a backend, storage and notifier
[OUTPUT]: Scriptable fake auth API and shared fixtures
[POS]:    Test infrastructure - shared across session integration tests
[UPDATE]: When the auth API trait or fixtures change
*/

//! Common test utilities for tradelink-session tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tradelink_session::session::{MemoryStore, RecordingNotifier, SessionManagerBuilder};
use tradelink_session::{
    AuthApi, BalanceSnapshot, ChallengeStamp, Result, SessionError, SessionManager,
    SessionStorage, TokenTriad, User, WalletChallenge,
};

pub const WALLET_ADDRESS: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
pub const ROUTING_ADDRESS: &str = "RouTe7a8b9c0d1e2f3g4h5i6j7k8L9m0n1o2p3q4r5Zz";

pub fn triad(tag: &str) -> TokenTriad {
    TokenTriad::new(format!("access-{tag}"), format!("refresh-{tag}"), format!("tid-{tag}"))
}

pub fn wallet_user() -> User {
    User::from_wallet(WALLET_ADDRESS, 1_700_000_000)
}

/// Backend whose answers are set per test; failures are given as message text
pub struct FakeApi {
    pub verify: Mutex<std::result::Result<TokenTriad, String>>,
    pub refresh: Mutex<std::result::Result<TokenTriad, String>>,
    pub logout_error: Mutex<Option<String>>,
    pub routing_address: Mutex<Option<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            verify: Mutex::new(Ok(triad("login"))),
            refresh: Mutex::new(Ok(triad("refreshed"))),
            logout_error: Mutex::new(None),
            routing_address: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_refresh_error(&self, message: &str) {
        *self.refresh.lock().unwrap() = Err(message.to_string());
    }

    pub fn set_verify_error(&self, message: &str) {
        *self.verify.lock().unwrap() = Err(message.to_string());
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unauthorized(message: &str) -> SessionError {
    SessionError::api_error(StatusCode::UNAUTHORIZED, message)
}

#[async_trait]
impl AuthApi for FakeApi {
    async fn generate_wallet_challenge(&self, wallet_address: &str) -> Result<WalletChallenge> {
        self.record(format!("challenge:{wallet_address}"));
        Ok(WalletChallenge {
            message: "Sign in to Tradelink".to_string(),
            wallet_address: wallet_address.to_string(),
            nonce: "nonce-1".to_string(),
            iat: ChallengeStamp::Number(1_700_000_000),
            exp: ChallengeStamp::Number(1_700_000_300),
            domain: "app.tradelink.app".to_string(),
            version: "1".to_string(),
        })
    }

    async fn create_token_by_wallet(
        &self,
        signature_hex: &str,
        _challenge: &WalletChallenge,
        ref_id: Option<&str>,
    ) -> Result<String> {
        self.record(format!("create_token:{signature_hex}:{}", ref_id.unwrap_or("-")));
        Ok("one-time-token".to_string())
    }

    async fn verify_token(&self, token: &str) -> Result<TokenTriad> {
        self.record(format!("verify:{token}"));
        self.verify.lock().unwrap().clone().map_err(|m| unauthorized(&m))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenTriad> {
        self.record(format!("refresh:{refresh_token}"));
        self.refresh.lock().unwrap().clone().map_err(|m| unauthorized(&m))
    }

    async fn logout(&self, refresh_token: &str) -> Result<String> {
        self.record(format!("logout:{refresh_token}"));
        match self.logout_error.lock().unwrap().clone() {
            Some(message) => Err(SessionError::api_error(StatusCode::SERVICE_UNAVAILABLE, message)),
            None => Ok("Logged out".to_string()),
        }
    }

    async fn fetch_balances(&self, access_token: &str) -> Result<BalanceSnapshot> {
        self.record(format!("balances:{access_token}"));
        Ok(BalanceSnapshot {
            wallet_address: self.routing_address.lock().unwrap().clone(),
            sol_balance: None,
            tokens: Vec::new(),
        })
    }
}

/// Everything a facade test needs to inspect afterwards
pub struct Harness {
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub manager: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    pub fn with(configure: impl FnOnce(SessionManagerBuilder) -> SessionManagerBuilder) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), configure)
    }

    pub fn with_store(
        store: Arc<MemoryStore>,
        configure: impl FnOnce(SessionManagerBuilder) -> SessionManagerBuilder,
    ) -> Self {
        let api = Arc::new(FakeApi::default());
        let notifier = Arc::new(RecordingNotifier::new());
        let builder = SessionManager::builder(api.clone())
            .storage(SessionStorage::new(store.clone()))
            .notifier(notifier.clone());
        let manager = configure(builder).build();

        Self {
            api,
            store,
            notifier,
            manager,
        }
    }

    pub fn storage(&self) -> SessionStorage {
        SessionStorage::new(self.store.clone())
    }
}
