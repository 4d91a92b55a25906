/*
[INPUT]:  Wallet addresses, signatures, one-time tokens, refresh tokens
[OUTPUT]: Challenges, token triads, balances, logout acknowledgements
[POS]:    HTTP layer - remote auth operations consumed by the session core
[UPDATE]: When auth endpoints, envelopes or the consumed operation set change
*/

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::http::{AuthClient, Result, SessionError};
use crate::types::{
    BalanceSnapshot, CreateTokenByWalletRequest, CreateTokenResponse, LogoutRequest,
    LogoutResponse, RefreshTokenRequest, TokenPairResponse, TokenTriad, VerifyTokenRequest,
    WalletChallenge, WalletChallengeRequest, WalletChallengeResponse,
};

/// Remote operations the session core depends on
///
/// `AuthClient` implements this against the real backend; tests substitute
/// scripted fakes.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn generate_wallet_challenge(&self, wallet_address: &str) -> Result<WalletChallenge>;

    /// Exchange a hex signature over the canonical challenge message for a one-time token
    async fn create_token_by_wallet(
        &self,
        signature_hex: &str,
        challenge: &WalletChallenge,
        ref_id: Option<&str>,
    ) -> Result<String>;

    async fn verify_token(&self, token: &str) -> Result<TokenTriad>;

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenTriad>;

    /// Revoke the refresh token server-side; returns the backend's message
    async fn logout(&self, refresh_token: &str) -> Result<String>;

    async fn fetch_balances(&self, access_token: &str) -> Result<BalanceSnapshot>;
}

fn rejected(message: Option<String>, fallback: &str) -> SessionError {
    SessionError::Rejected {
        message: message.unwrap_or_else(|| fallback.to_string()),
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    /// POST /api/auth/wallet/challenge
    async fn generate_wallet_challenge(&self, wallet_address: &str) -> Result<WalletChallenge> {
        let body = WalletChallengeRequest {
            wallet_address: wallet_address.to_string(),
        };
        let builder = self
            .request(Method::POST, "/api/auth/wallet/challenge")?
            .json(&body);
        let response: WalletChallengeResponse = self.send_json(builder).await?;

        match response {
            WalletChallengeResponse {
                success: true,
                payload: Some(challenge),
                ..
            } => Ok(challenge),
            WalletChallengeResponse { message, .. } => {
                Err(rejected(message, "challenge generation failed"))
            }
        }
    }

    /// POST /api/auth/wallet/token
    async fn create_token_by_wallet(
        &self,
        signature_hex: &str,
        challenge: &WalletChallenge,
        ref_id: Option<&str>,
    ) -> Result<String> {
        let body = CreateTokenByWalletRequest {
            signature: signature_hex.to_string(),
            challenge: challenge.clone(),
            ref_id: ref_id.map(str::to_string),
        };
        let builder = self.request(Method::POST, "/api/auth/wallet/token")?.json(&body);
        let response: CreateTokenResponse = self.send_json(builder).await?;

        match response {
            CreateTokenResponse {
                success: true,
                token: Some(token),
                ..
            } => Ok(token),
            CreateTokenResponse { message, .. } => Err(rejected(message, "token creation failed")),
        }
    }

    /// POST /api/auth/verify
    async fn verify_token(&self, token: &str) -> Result<TokenTriad> {
        let body = VerifyTokenRequest {
            token: token.to_string(),
        };
        let builder = self.request(Method::POST, "/api/auth/verify")?.json(&body);
        let response: TokenPairResponse = self.send_json(builder).await?;
        triad_from(response, "token verification failed")
    }

    /// POST /api/auth/refresh
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenTriad> {
        let body = RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        };
        let builder = self.request(Method::POST, "/api/auth/refresh")?.json(&body);
        let response: TokenPairResponse = self.send_json(builder).await?;
        triad_from(response, "token refresh failed")
    }

    /// POST /api/auth/logout
    async fn logout(&self, refresh_token: &str) -> Result<String> {
        let body = LogoutRequest {
            refresh_token: refresh_token.to_string(),
        };
        let builder = self.request(Method::POST, "/api/auth/logout")?.json(&body);
        let response: LogoutResponse = self.send_json(builder).await?;

        if response.success {
            Ok(response.message.unwrap_or_default())
        } else {
            Err(rejected(response.message, "logout failed"))
        }
    }

    /// GET /api/wallet/balances
    async fn fetch_balances(&self, access_token: &str) -> Result<BalanceSnapshot> {
        let builder = self
            .request(Method::GET, "/api/wallet/balances")?
            .bearer_auth(access_token);
        self.send_json(builder).await
    }
}

fn triad_from(response: TokenPairResponse, fallback: &str) -> Result<TokenTriad> {
    if !response.success {
        return Err(rejected(response.message, fallback));
    }
    response.into_triad().ok_or_else(|| {
        debug!("token response is missing part of the triad");
        SessionError::InvalidResponse("incomplete token triad".to_string())
    })
}
