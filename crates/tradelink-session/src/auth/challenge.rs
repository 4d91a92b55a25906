/*
[INPUT]:  Wallet signer and auth API
[OUTPUT]: Verified token triad and synthesized wallet user
[POS]:    Auth layer - orchestrates the wallet challenge/signature login
[UPDATE]: When challenge fields, message layout or flow steps change
*/

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::http::{AuthApi, Result, SessionError};
use crate::types::{TokenTriad, User, WalletChallenge};

use super::WalletSigner;

/// Progress of one wallet login attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletLoginStep {
    Idle,
    ChallengeRequested,
    MessageSigned,
    TokenExchanged,
    Verified,
    LoggedIn,
    Failed,
}

/// Outcome of a successful challenge exchange
#[derive(Debug, Clone)]
pub struct WalletLogin {
    pub user: User,
    pub tokens: TokenTriad,
}

/// Build the exact text the wallet signs.
///
/// Field order is fixed by the verifier: message, address, nonce, issued-at,
/// expiry, domain, version, newline separated.
pub fn canonical_message(challenge: &WalletChallenge) -> String {
    [
        challenge.message.clone(),
        challenge.wallet_address.clone(),
        challenge.nonce.clone(),
        challenge.iat.to_string(),
        challenge.exp.to_string(),
        challenge.domain.clone(),
        challenge.version.clone(),
    ]
    .join("\n")
}

/// Lowercase hex, two digits per byte, no separators
pub fn encode_signature(signature: &[u8]) -> String {
    hex::encode(signature)
}

/// Drives challenge → sign → token exchange → verify for one attempt
pub struct WalletChallengeFlow<'a> {
    api: &'a dyn AuthApi,
    ref_id: Option<&'a str>,
    step: WalletLoginStep,
}

impl<'a> WalletChallengeFlow<'a> {
    pub fn new(api: &'a dyn AuthApi) -> Self {
        Self {
            api,
            ref_id: None,
            step: WalletLoginStep::Idle,
        }
    }

    /// Attach a referral id to the token exchange
    pub fn with_ref_id(mut self, ref_id: Option<&'a str>) -> Self {
        self.ref_id = ref_id;
        self
    }

    pub fn step(&self) -> WalletLoginStep {
        self.step
    }

    /// Run the whole flow. Any error leaves the flow in `Failed`.
    pub async fn run(&mut self, signer: &dyn WalletSigner) -> Result<WalletLogin> {
        let result = self.advance(signer).await;
        if let Err(err) = &result {
            warn!(step = ?self.step, error = %err, "wallet login failed");
            self.step = WalletLoginStep::Failed;
        }
        result
    }

    async fn advance(&mut self, signer: &dyn WalletSigner) -> Result<WalletLogin> {
        let address = signer.address().to_string();

        self.step = WalletLoginStep::ChallengeRequested;
        let challenge = self
            .api
            .generate_wallet_challenge(&address)
            .await
            .map_err(|err| {
                if err.is_unavailable() {
                    err
                } else {
                    SessionError::Challenge(err.to_string())
                }
            })?;
        debug!(wallet_address = %address, nonce = %challenge.nonce, "challenge received");

        let message = canonical_message(&challenge);
        let signature = signer.sign_message(message.as_bytes()).await?;
        self.step = WalletLoginStep::MessageSigned;

        let signature_hex = encode_signature(&signature);
        let one_time_token = self
            .api
            .create_token_by_wallet(&signature_hex, &challenge, self.ref_id)
            .await?;
        self.step = WalletLoginStep::TokenExchanged;

        let tokens = self.api.verify_token(&one_time_token).await?;
        self.step = WalletLoginStep::Verified;

        let user = User::from_wallet(&address, Utc::now().timestamp());
        self.step = WalletLoginStep::LoggedIn;
        info!(wallet_address = %address, "wallet login verified");

        Ok(WalletLogin { user, tokens })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MockWalletSigner, SignerError};
    use crate::types::{BalanceSnapshot, ChallengeStamp};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ADDRESS: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn challenge() -> WalletChallenge {
        WalletChallenge {
            message: "Sign in to Tradelink".to_string(),
            wallet_address: ADDRESS.to_string(),
            nonce: "abc123".to_string(),
            iat: ChallengeStamp::Number(1_700_000_000),
            exp: ChallengeStamp::Text("1700000300".to_string()),
            domain: "app.tradelink.app".to_string(),
            version: "1".to_string(),
        }
    }

    #[derive(Default)]
    struct ScriptedApi {
        fail_challenge: bool,
        signatures: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuthApi for ScriptedApi {
        async fn generate_wallet_challenge(&self, _wallet_address: &str) -> Result<WalletChallenge> {
            if self.fail_challenge {
                return Err(SessionError::InvalidResponse("boom".to_string()));
            }
            Ok(challenge())
        }

        async fn create_token_by_wallet(
            &self,
            signature_hex: &str,
            _challenge: &WalletChallenge,
            _ref_id: Option<&str>,
        ) -> Result<String> {
            self.signatures.lock().unwrap().push(signature_hex.to_string());
            Ok("one-time".to_string())
        }

        async fn verify_token(&self, token: &str) -> Result<TokenTriad> {
            assert_eq!(token, "one-time");
            Ok(TokenTriad::new("a", "r", "t"))
        }

        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenTriad> {
            unreachable!()
        }

        async fn logout(&self, _refresh_token: &str) -> Result<String> {
            unreachable!()
        }

        async fn fetch_balances(&self, _access_token: &str) -> Result<BalanceSnapshot> {
            unreachable!()
        }
    }

    #[test]
    fn test_canonical_message_field_order() {
        assert_eq!(
            canonical_message(&challenge()),
            format!(
                "Sign in to Tradelink\n{ADDRESS}\nabc123\n1700000000\n1700000300\napp.tradelink.app\n1"
            )
        );
    }

    #[test]
    fn test_encode_signature_lowercase_hex() {
        assert_eq!(encode_signature(&[0x00, 0x0f, 0xab, 0xff]), "000fabff");
    }

    #[tokio::test]
    async fn test_flow_happy_path() {
        let api = ScriptedApi::default();
        let signer = MockWalletSigner::new(ADDRESS, &[0xde, 0xad, 0xbe, 0xef]);
        let mut flow = WalletChallengeFlow::new(&api);

        let login = flow.run(&signer).await.unwrap();

        assert_eq!(flow.step(), WalletLoginStep::LoggedIn);
        assert_eq!(login.tokens, TokenTriad::new("a", "r", "t"));
        assert_eq!(login.user.wallet_address, ADDRESS);
        assert_eq!(login.user.username, "9xQe...VFin");
        assert_eq!(*api.signatures.lock().unwrap(), vec!["deadbeef".to_string()]);
    }

    #[tokio::test]
    async fn test_flow_challenge_failure() {
        let api = ScriptedApi {
            fail_challenge: true,
            ..Default::default()
        };
        let signer = MockWalletSigner::new(ADDRESS, &[1]);
        let mut flow = WalletChallengeFlow::new(&api);

        let err = flow.run(&signer).await.unwrap_err();
        assert!(matches!(err, SessionError::Challenge(_)));
        assert_eq!(flow.step(), WalletLoginStep::Failed);
    }

    #[tokio::test]
    async fn test_flow_user_rejection_stops_before_exchange() {
        let api = ScriptedApi::default();
        let signer = MockWalletSigner::failing(
            ADDRESS,
            SignerError::Failed("User rejected the request.".to_string()),
        );
        let mut flow = WalletChallengeFlow::new(&api);

        let err = flow.run(&signer).await.unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(flow.step(), WalletLoginStep::Failed);
        assert!(api.signatures.lock().unwrap().is_empty());
    }
}
