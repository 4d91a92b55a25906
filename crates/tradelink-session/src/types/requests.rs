/*
[INPUT]:  Session operations that call the backend
[OUTPUT]: Serializable request bodies for auth endpoints
[POS]:    Data layer - request definitions for API communication
[UPDATE]: When auth endpoint request schema changes
*/

use serde::Serialize;

use super::models::WalletChallenge;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletChallengeRequest {
    pub wallet_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenByWalletRequest {
    pub signature: String,
    pub challenge: WalletChallenge,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}
