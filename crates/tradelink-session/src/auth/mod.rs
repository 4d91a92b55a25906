/*
[INPUT]:  Wallet signers, page addresses and the auth API
[OUTPUT]: Verified credentials from either login method
[POS]:    Auth layer - the two login flows and the signing capability
[UPDATE]: When adding a login method or changing flow steps
*/

pub mod challenge;
pub mod link;
pub mod wallet;

pub use challenge::{
    WalletChallengeFlow, WalletLogin, WalletLoginStep, canonical_message, encode_signature,
};
pub use link::{
    BrowserLocation, LinkToken, PageLocation, clear_link_token, extract_link_token,
    has_link_token, parse_fragment, take_link_token,
};
pub use wallet::{Ed25519WalletSigner, MockWalletSigner, SignerError, WalletSigner};
