/*
[INPUT]:  Current session and a session action
[OUTPUT]: Next session value
[POS]:    Session layer - pure reducer, single source of truth for auth state
[UPDATE]: When adding actions or session fields
*/

use crate::types::{TokenTriad, User};

/// Process-wide authentication state
///
/// `user` and `tokens` are set and cleared together by login and logout;
/// authentication is derived from both being present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub is_loading: bool,
    pub error: Option<String>,
    pub user: Option<User>,
    pub tokens: Option<TokenTriad>,
}

/// Everything that may change a [`Session`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionAction {
    SetLoading(bool),
    SetError(Option<String>),
    LoginSuccess { user: User, tokens: TokenTriad },
    RefreshSuccess(TokenTriad),
    UpdateWalletAddress(String),
    Logout,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.tokens.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.refresh_token.as_str())
    }

    pub fn token_id(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.token_id.as_str())
    }

    /// Apply `action` and return the resulting session. Never fails.
    pub fn reduce(&self, action: SessionAction) -> Session {
        match action {
            SessionAction::SetLoading(is_loading) => Session {
                is_loading,
                ..self.clone()
            },
            SessionAction::SetError(error) => Session {
                error,
                ..self.clone()
            },
            SessionAction::LoginSuccess { user, tokens } => Session {
                is_loading: false,
                error: None,
                user: Some(user),
                tokens: Some(tokens),
            },
            SessionAction::RefreshSuccess(tokens) => Session {
                tokens: Some(tokens),
                ..self.clone()
            },
            SessionAction::UpdateWalletAddress(address) => match &self.user {
                Some(user) => Session {
                    user: Some(user.with_wallet_address(&address)),
                    ..self.clone()
                },
                None => self.clone(),
            },
            SessionAction::Logout => Session::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthMethod, UserOrigin};

    const ADDRESS: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn logged_in() -> Session {
        Session::default().reduce(SessionAction::LoginSuccess {
            user: User::from_wallet(ADDRESS, 1_700_000_000),
            tokens: TokenTriad::new("a1", "r1", "t1"),
        })
    }

    #[test]
    fn test_initial_session_is_unauthenticated() {
        let session = Session::default();
        assert!(!session.is_authenticated());
        assert!(!session.is_loading);
        assert_eq!(session.refresh_token(), None);
    }

    #[test]
    fn test_login_success_sets_identity_and_clears_error() {
        let session = Session::default()
            .reduce(SessionAction::SetLoading(true))
            .reduce(SessionAction::SetError(Some("old".to_string())))
            .reduce(SessionAction::LoginSuccess {
                user: User::from_wallet(ADDRESS, 1),
                tokens: TokenTriad::new("a1", "r1", "t1"),
            });

        assert!(session.is_authenticated());
        assert!(!session.is_loading);
        assert_eq!(session.error, None);
        assert_eq!(session.access_token(), Some("a1"));
        assert_eq!(session.token_id(), Some("t1"));
    }

    #[test]
    fn test_refresh_success_keeps_user() {
        let before = logged_in();
        let after = before.reduce(SessionAction::RefreshSuccess(TokenTriad::new("a2", "r2", "t2")));

        assert_eq!(after.user, before.user);
        assert_eq!(after.refresh_token(), Some("r2"));
    }

    #[test]
    fn test_update_wallet_address_rederives_display_fields() {
        let session = logged_in().reduce(SessionAction::UpdateWalletAddress(
            "AbCdEfGhIjKlMnOpQrStUvWxyz".to_string(),
        ));
        let user = session.user.unwrap();

        assert_eq!(user.wallet_address, "AbCdEfGhIjKlMnOpQrStUvWxyz");
        assert_eq!(user.id, "AbCdEfGhIjKlMnOpQrStUvWxyz");
        assert_eq!(user.username, "AbCd...Wxyz");
        assert_eq!(user.solana_wallet_address, ADDRESS);
        assert_eq!(user.auth_method(), AuthMethod::Wallet);
    }

    #[test]
    fn test_update_wallet_address_keeps_telegram_profile() {
        let session = Session::default()
            .reduce(SessionAction::LoginSuccess {
                user: User::from_telegram_handoff(42, 1),
                tokens: TokenTriad::new("a", "r", "t"),
            })
            .reduce(SessionAction::UpdateWalletAddress("RoutingAddress0001".to_string()));
        let user = session.user.unwrap();

        assert!(matches!(user.origin, UserOrigin::Telegram(_)));
        assert_eq!(user.telegram_id(), Some(42));
    }

    #[test]
    fn test_update_wallet_address_without_user_is_noop() {
        let session = Session::default();
        assert_eq!(
            session.reduce(SessionAction::UpdateWalletAddress("x".repeat(32))),
            session
        );
    }

    #[test]
    fn test_logout_resets_to_initial_state() {
        let session = logged_in()
            .reduce(SessionAction::SetError(Some("e".to_string())))
            .reduce(SessionAction::Logout);
        assert_eq!(session, Session::default());
    }
}
