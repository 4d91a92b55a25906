/*
[INPUT]:  Backend auth endpoint payloads
[OUTPUT]: Typed response envelopes with success checks
[POS]:    Data layer - response definitions for API communication
[UPDATE]: When auth endpoint response schema changes
*/

use serde::{Deserialize, Serialize};

use super::models::{TokenTriad, WalletChallenge};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletChallengeResponse {
    pub success: bool,
    #[serde(default)]
    pub payload: Option<WalletChallenge>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTokenResponse {
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Shared by `verifyToken` and `refreshToken`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub success: bool,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TokenPairResponse {
    /// All three credentials, or `None` if the backend left any of them out
    pub fn into_triad(self) -> Option<TokenTriad> {
        Some(TokenTriad {
            access_token: self.access_token?,
            refresh_token: self.refresh_token?,
            token_id: self.token_id?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
