/*
[INPUT]:  Session data model and serde requirements
[OUTPUT]: Typed identity, credential, and challenge structs
[POS]:    Data layer - core domain types shared by every session component
[UPDATE]: When identity fields or credential shapes change
*/

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    Wallet,
    Telegram,
}

/// Profile data that only exists for users who arrived through the messaging bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramProfile {
    #[serde(rename = "telegramId")]
    pub telegram_id: i64,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

/// Login origin of a user, tagged by `authMethod` in the persisted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "authMethod", rename_all = "lowercase")]
pub enum UserOrigin {
    Wallet,
    Telegram(TelegramProfile),
}

/// Canonical identity of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Display identifier; replaced by the routing address once one is known
    #[serde(rename = "walletAddress")]
    pub wallet_address: String,
    /// Address the user originally signed in with; never reassigned
    #[serde(rename = "solanaWalletAddress")]
    pub solana_wallet_address: String,
    pub auth_date: i64,
    pub username: String,
    #[serde(flatten)]
    pub origin: UserOrigin,
}

impl User {
    /// Synthesize the user for a completed wallet challenge login
    pub fn from_wallet(address: &str, auth_date: i64) -> Self {
        Self {
            id: address.to_string(),
            wallet_address: address.to_string(),
            solana_wallet_address: address.to_string(),
            auth_date,
            username: short_address(address),
            origin: UserOrigin::Wallet,
        }
    }

    /// Synthesize the minimal user a link-token handoff can vouch for
    pub fn from_telegram_handoff(telegram_id: i64, auth_date: i64) -> Self {
        Self {
            id: telegram_id.to_string(),
            wallet_address: String::new(),
            solana_wallet_address: String::new(),
            auth_date,
            username: format!("tg_{telegram_id}"),
            origin: UserOrigin::Telegram(TelegramProfile {
                telegram_id,
                first_name: "Telegram User".to_string(),
                last_name: None,
                photo_url: None,
                hash: None,
            }),
        }
    }

    pub fn auth_method(&self) -> AuthMethod {
        match self.origin {
            UserOrigin::Wallet => AuthMethod::Wallet,
            UserOrigin::Telegram(_) => AuthMethod::Telegram,
        }
    }

    pub fn telegram_id(&self) -> Option<i64> {
        match &self.origin {
            UserOrigin::Telegram(profile) => Some(profile.telegram_id),
            UserOrigin::Wallet => None,
        }
    }

    /// Copy of this user re-addressed to `address`, with display fields re-derived
    pub fn with_wallet_address(&self, address: &str) -> Self {
        Self {
            id: address.to_string(),
            wallet_address: address.to_string(),
            username: short_address(address),
            ..self.clone()
        }
    }
}

/// Shorten an address to `first4...last4` for display
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Access token, refresh token and token id; always replaced as a unit
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTriad {
    pub access_token: String,
    pub refresh_token: String,
    pub token_id: String,
}

impl TokenTriad {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_id: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_id: token_id.into(),
        }
    }
}

impl fmt::Debug for TokenTriad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenTriad")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_id", &self.token_id)
            .finish()
    }
}

/// Issued-at / expiry stamp, kept in whatever shape the server sent it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChallengeStamp {
    Number(i64),
    Text(String),
}

impl fmt::Display for ChallengeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeStamp::Number(value) => write!(f, "{value}"),
            ChallengeStamp::Text(value) => f.write_str(value),
        }
    }
}

/// Server-issued challenge for one wallet login attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletChallenge {
    pub message: String,
    pub wallet_address: String,
    pub nonce: String,
    pub iat: ChallengeStamp,
    pub exp: ChallengeStamp,
    pub domain: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub mint: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Balances of the signed-in user, plus the routing address the backend assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub sol_balance: Option<Decimal>,
    #[serde(default)]
    pub tokens: Vec<TokenBalance>,
}

impl BalanceSnapshot {
    /// Routing address to adopt, if the backend assigned one different from `signing_address`
    pub fn routing_address(&self, signing_address: &str) -> Option<&str> {
        self.wallet_address
            .as_deref()
            .filter(|address| !address.is_empty() && *address != signing_address)
    }
}
