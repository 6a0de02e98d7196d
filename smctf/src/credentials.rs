use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Access/refresh token pair. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub team_name: Option<String>,
}

/// Everything a credential store holds; also the persisted form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(default)]
    pub tokens: Option<TokenPair>,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

/// Holder of the current session.
///
/// The client only reads access tokens through this trait; writes happen on
/// login, refresh and logout.
pub trait CredentialStore: Send + Sync {
    fn read(&self) -> Option<TokenPair>;

    fn replace(&self, tokens: TokenPair);

    fn user(&self) -> Option<AuthUser>;

    fn set_user(&self, user: Option<AuthUser>);

    /// Drops tokens and user identity together.
    fn clear(&self);
}

/// In-process store. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    state: RwLock<AuthState>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: AuthState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    #[must_use]
    pub fn with_tokens(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self::with_state(AuthState {
            tokens: Some(TokenPair {
                access_token: access_token.into(),
                refresh_token: refresh_token.into(),
            }),
            user: None,
        })
    }

    /// Copy of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut AuthState)) {
        let mut guard = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read(&self) -> Option<TokenPair> {
        self.snapshot().tokens
    }

    fn replace(&self, tokens: TokenPair) {
        self.update(|state| state.tokens = Some(tokens));
    }

    fn user(&self) -> Option<AuthUser> {
        self.snapshot().user
    }

    fn set_user(&self, user: Option<AuthUser>) {
        self.update(|state| state.user = user);
    }

    fn clear(&self) {
        self.update(|state| *state = AuthState::default());
    }
}
