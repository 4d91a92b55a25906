/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public session crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod config;
pub mod http;
pub mod session;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    BrowserLocation,
    Ed25519WalletSigner,
    LinkToken,
    MockWalletSigner,
    PageLocation,
    SignerError,
    WalletChallengeFlow,
    WalletLoginStep,
    WalletSigner,
};

pub use config::SessionConfig;

// Re-export commonly used types from http
pub use http::{
    AuthApi,
    AuthClient,
    ClientConfig,
    Result,
    SessionError,
};

// Re-export commonly used types from session
pub use session::{
    KeyValueStore,
    Notice,
    Notifier,
    Session,
    SessionAction,
    SessionManager,
    SessionStorage,
    TransportEvent,
    TransportEvents,
};

// Re-export all types
pub use types::*;
