/*
[INPUT]:  Message bytes to sign and (for local signers) a Solana-format private key
[OUTPUT]: Raw signature bytes, or a signer failure the login flow can classify
[POS]:    Auth layer - wallet signing capability abstraction
[UPDATE]: When adding new wallet types or changing signer error reporting
*/

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::http::{Result, SessionError};

/// Failure reported by a wallet's signing capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// The connected wallet cannot sign arbitrary messages
    #[error("wallet does not support signMessage")]
    Unsupported,

    /// The wallet returned an error; the text is what the wallet said
    #[error("{0}")]
    Failed(String),
}

impl From<SignerError> for SessionError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Unsupported => SessionError::SigningUnsupported,
            SignerError::Failed(message) => SessionError::from_signer_message(message),
        }
    }
}

/// Trait for wallet signing operations
///
/// The trait is async to support browser extensions, hardware wallets and
/// other external signers that prompt the user.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Get the wallet address (base58 public key)
    fn address(&self) -> &str;

    /// Sign raw message bytes and return the raw signature bytes
    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Vec<u8>, SignerError>;
}

/// Local ed25519 signer using a Solana-format key
#[derive(Debug)]
pub struct Ed25519WalletSigner {
    signing_key: SigningKey,
    address: String,
}

impl Ed25519WalletSigner {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Create a signer from a base58-encoded private key
    /// Supports 64-byte keypair or 32-byte seed
    pub fn from_base58(private_key: &str) -> Result<Self> {
        let bytes = bs58::decode(private_key.trim())
            .into_vec()
            .map_err(|e| SessionError::Config(format!("Invalid base58 private key: {e}")))?;

        let signing_key = match bytes.len() {
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| SessionError::Config(format!("Invalid keypair bytes: {e}")))?
            }
            other => {
                return Err(SessionError::Config(format!(
                    "Invalid private key length: expected 32 or 64 bytes, got {other}"
                )));
            }
        };

        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = bs58::encode(signing_key.verifying_key().as_bytes()).into_string();
        Self {
            signing_key,
            address,
        }
    }

    /// Verify a signature against a message
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.signing_key
            .verifying_key()
            .verify(message, &signature)
            .is_ok()
    }
}

#[async_trait]
impl WalletSigner for Ed25519WalletSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Vec<u8>, SignerError> {
        Ok(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

/// Mock wallet signer for testing
#[derive(Debug, Clone)]
pub struct MockWalletSigner {
    address: String,
    outcome: std::result::Result<Vec<u8>, SignerError>,
}

impl MockWalletSigner {
    /// Create a mock signer with a predetermined signature
    pub fn new(address: &str, signature: &[u8]) -> Self {
        Self {
            address: address.to_string(),
            outcome: Ok(signature.to_vec()),
        }
    }

    /// Create a mock signer whose every signing attempt fails with `error`
    pub fn failing(address: &str, error: SignerError) -> Self {
        Self {
            address: address.to_string(),
            outcome: Err(error),
        }
    }
}

#[async_trait]
impl WalletSigner for MockWalletSigner {
    fn address(&self) -> &str {
        &self.address
    }

    async fn sign_message(&self, _message: &[u8]) -> std::result::Result<Vec<u8>, SignerError> {
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ed25519_signer_from_seed() {
        // A dummy 32-byte seed in base58 (all zeros)
        let seed = "11111111111111111111111111111111";
        let signer = Ed25519WalletSigner::from_base58(seed).unwrap();

        let decoded = bs58::decode(signer.address()).into_vec().unwrap();
        assert_eq!(decoded.len(), 32);

        let signature = signer.sign_message(b"hello world").await.unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signer.verify(b"hello world", &signature));
        assert!(!signer.verify(b"hello there", &signature));
    }

    #[tokio::test]
    async fn test_ed25519_signer_from_keypair_bytes() {
        let original = Ed25519WalletSigner::generate();
        let keypair = bs58::encode(original.signing_key.to_keypair_bytes()).into_string();

        let restored = Ed25519WalletSigner::from_base58(&keypair).unwrap();
        assert_eq!(restored.address(), original.address());
    }

    #[test]
    fn test_ed25519_signer_invalid_key() {
        assert!(Ed25519WalletSigner::from_base58("invalid_base58_!@#").is_err());
        assert!(Ed25519WalletSigner::from_base58("bs58tooShort").is_err());
    }

    #[tokio::test]
    async fn test_mock_signer_failure_maps_to_rejection() {
        let signer = MockWalletSigner::failing(
            "addr",
            SignerError::Failed("User rejected the request.".to_string()),
        );
        let err: SessionError = signer.sign_message(b"msg").await.unwrap_err().into();
        assert!(matches!(err, SessionError::SignatureRejected));

        let err: SessionError = SignerError::Unsupported.into();
        assert!(matches!(err, SessionError::SigningUnsupported));
    }
}
