pub mod classify;
pub mod credentials;
pub mod error;
mod refresh;
pub mod request;
pub mod timeline;
mod transport;
pub mod types;

pub use crate::credentials::{AuthState, AuthUser, CredentialStore, MemoryCredentialStore, TokenPair};
pub use crate::error::{ApiError, Error, ErrorKind, FieldError, RateLimit};
pub use crate::request::ApiRequest;

use crate::refresh::RefreshCoordinator;
use crate::transport::Transport;
use crate::types::{
    AppConfig, AuthResponse, Challenge, ChallengeList, CreateChallenge, FlagResult,
    FlagSubmission, Leaderboard, LoginRequest, RefreshTokenRequest, RegisterRequest,
    RegisterResponse, SolvedChallenge, TeamLeaderboard, TeamMember, TeamSolvedChallenge,
    TeamSummary, TeamTimeline, Timeline, UpdateMe, UserSummary,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub struct SmctfClient {
    transport: Transport,
    store: Arc<dyn CredentialStore>,
    refresher: RefreshCoordinator,
}

impl SmctfClient {
    /// Creates a client talking to [`DEFAULT_BASE_URL`] with the given credential store.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        let transport = Transport::new(DEFAULT_BASE_URL);
        Self {
            refresher: RefreshCoordinator::new(transport.clone(), Arc::clone(&store)),
            transport,
            store,
        }
    }

    /// Sets the API base URL, e.g. `https://ctf.example.com`.
    #[must_use]
    pub fn with_base_url(self, base_url: impl AsRef<str>) -> Self {
        let mut transport = Transport::new(base_url.as_ref());
        transport.client = self.transport.client;
        Self::from_parts(transport, self.store)
    }

    /// Uses a preconfigured HTTP client (timeouts, proxies, TLS).
    #[must_use]
    pub fn with_http_client(self, client: Client) -> Self {
        let mut transport = self.transport;
        transport.client = client;
        Self::from_parts(transport, self.store)
    }

    fn from_parts(transport: Transport, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            refresher: RefreshCoordinator::new(transport.clone(), Arc::clone(&store)),
            transport,
            store,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.transport.base_url
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Sends `request`, refreshing the session once on 401 when allowed.
    ///
    /// Returns `None` for 204 responses and for bodies not declared as JSON.
    ///
    /// # Errors
    /// Returns [`Error::Api`] for any non-2xx outcome, [`Error::AuthenticationExpired`]
    /// or [`Error::AuthenticationRequired`] when the session could not be refreshed
    /// (credentials are cleared in both cases), and a transport or decode error otherwise.
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<Option<T>, Error> {
        let token = if request.requires_auth {
            self.store.read().map(|t| t.access_token)
        } else {
            None
        };
        let response = self.transport.dispatch(request, token.as_deref()).await?;
        let status = response.status();
        if status.is_success() {
            return transport::payload(response).await;
        }
        if status == StatusCode::UNAUTHORIZED && request.can_refresh() {
            return self.retry_after_refresh(request).await;
        }
        Err(Error::Api(transport::api_error(response).await))
    }

    /// Like [`send`](Self::send) but requires a JSON payload.
    ///
    /// # Errors
    /// Everything `send` returns, plus [`Error::UnexpectedBody`] when the
    /// response carried no JSON.
    pub async fn send_expect<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, Error> {
        self.send(request)
            .await?
            .ok_or_else(|| Error::UnexpectedBody {
                path: request.path.clone(),
            })
    }

    async fn retry_after_refresh<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<Option<T>, Error> {
        let token = match self.refresher.refresh().await {
            Ok(token) => token,
            Err(err) => {
                warn!(path = %request.path, error = %err, "session refresh failed; logging out");
                self.store.clear();
                return Err(err.into_session_expired());
            }
        };

        let retry = request.clone().without_auth_retry();
        let result = self.dispatch_retry(&retry, &token).await;
        if let Err(err) = &result {
            debug!(path = %request.path, error = %err, "retry after refresh failed");
        }
        result
    }

    async fn dispatch_retry<T: DeserializeOwned>(
        &self,
        retry: &ApiRequest,
        token: &str,
    ) -> Result<Option<T>, Error> {
        let response = self.transport.dispatch(retry, Some(token)).await?;
        if response.status().is_success() {
            return transport::payload(response).await;
        }
        Err(Error::Api(transport::api_error(response).await))
    }

    /// Forces a token refresh, sharing any refresh already in flight.
    ///
    /// # Errors
    /// Returns [`Error::AuthenticationRequired`] without a stored refresh token,
    /// otherwise the refresh endpoint's error. Credentials are cleared on failure.
    pub async fn refresh(&self) -> Result<String, Error> {
        self.refresher.refresh().await
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Creates an account. Does not log in.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn register(&self, payload: &RegisterRequest) -> Result<RegisterResponse, Error> {
        let request = ApiRequest::post("/api/auth/register").with_json(payload)?;
        self.send_expect(&request).await
    }

    /// Logs in and stores the returned tokens and user.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn login(&self, payload: &LoginRequest) -> Result<AuthResponse, Error> {
        let request = ApiRequest::post("/api/auth/login").with_json(payload)?;
        let auth: AuthResponse = self.send_expect(&request).await?;
        self.store.replace(TokenPair {
            access_token: auth.access_token.clone(),
            refresh_token: auth.refresh_token.clone(),
        });
        self.store.set_user(Some(auth.user.clone()));
        Ok(auth)
    }

    /// Revokes the refresh token (if any) and clears local credentials.
    ///
    /// Local credentials are cleared even when the server call fails.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails.
    pub async fn logout(&self) -> Result<(), Error> {
        let Some(tokens) = self.store.read() else {
            self.store.clear();
            return Ok(());
        };
        let result = match ApiRequest::post("/api/auth/logout").with_json(&RefreshTokenRequest {
            refresh_token: &tokens.refresh_token,
        }) {
            Ok(request) => self.send::<serde_json::Value>(&request).await.map(|_| ()),
            Err(err) => Err(err),
        };
        self.store.clear();
        result
    }

    /// Retrieves the logged-in user and caches it in the credential store.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn me(&self) -> Result<AuthUser, Error> {
        let user: AuthUser = self
            .send_expect(&ApiRequest::get("/api/me").authenticated())
            .await?;
        self.store.set_user(Some(user.clone()));
        Ok(user)
    }

    /// Updates the logged-in user's profile.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn update_me(&self, update: &UpdateMe) -> Result<AuthUser, Error> {
        let request = ApiRequest::put("/api/me").authenticated().with_json(update)?;
        let user: AuthUser = self.send_expect(&request).await?;
        self.store.set_user(Some(user.clone()));
        Ok(user)
    }

    // =========================================================================
    // CHALLENGES
    // =========================================================================

    /// Lists active challenges.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn challenges(&self) -> Result<ChallengeList, Error> {
        self.send_expect(&ApiRequest::get("/api/challenges")).await
    }

    /// Submits a flag for a challenge.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    /// A rate-limited submission yields [`ErrorKind::RateLimited`].
    pub async fn submit_flag(&self, challenge_id: i64, flag: &str) -> Result<FlagResult, Error> {
        let request = ApiRequest::post(format!("/api/challenges/{challenge_id}/submit"))
            .authenticated()
            .with_json(&FlagSubmission { flag })?;
        self.send_expect(&request).await
    }

    /// Creates a challenge (admin only).
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn create_challenge(&self, challenge: &CreateChallenge) -> Result<Challenge, Error> {
        let request = ApiRequest::post("/api/admin/challenges")
            .authenticated()
            .with_json(challenge)?;
        self.send_expect(&request).await
    }

    // =========================================================================
    // SCOREBOARD
    // =========================================================================

    /// Retrieves the user leaderboard, highest score first.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn leaderboard(&self) -> Result<Leaderboard, Error> {
        self.send_expect(&ApiRequest::get("/api/leaderboard")).await
    }

    /// Retrieves the team leaderboard, highest score first.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn team_leaderboard(&self) -> Result<TeamLeaderboard, Error> {
        self.send_expect(&ApiRequest::get("/api/leaderboard/teams"))
            .await
    }

    /// Retrieves user scoring events, optionally limited to a trailing window.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn timeline(&self, window_minutes: Option<u32>) -> Result<Timeline, Error> {
        self.send_expect(&ApiRequest::get(timeline_path("/api/timeline", window_minutes)))
            .await
    }

    /// Retrieves team scoring events, optionally limited to a trailing window.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn team_timeline(&self, window_minutes: Option<u32>) -> Result<TeamTimeline, Error> {
        self.send_expect(&ApiRequest::get(timeline_path(
            "/api/timeline/teams",
            window_minutes,
        )))
        .await
    }

    // =========================================================================
    // USERS & TEAMS
    // =========================================================================

    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn users(&self) -> Result<Vec<UserSummary>, Error> {
        self.send_expect(&ApiRequest::get("/api/users")).await
    }

    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn user(&self, user_id: i64) -> Result<UserSummary, Error> {
        self.send_expect(&ApiRequest::get(format!("/api/users/{user_id}")))
            .await
    }

    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn user_solved(&self, user_id: i64) -> Result<Vec<SolvedChallenge>, Error> {
        self.send_expect(&ApiRequest::get(format!("/api/users/{user_id}/solved")))
            .await
    }

    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn teams(&self) -> Result<Vec<TeamSummary>, Error> {
        self.send_expect(&ApiRequest::get("/api/teams")).await
    }

    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn team(&self, team_id: i64) -> Result<TeamSummary, Error> {
        self.send_expect(&ApiRequest::get(format!("/api/teams/{team_id}")))
            .await
    }

    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn team_members(&self, team_id: i64) -> Result<Vec<TeamMember>, Error> {
        self.send_expect(&ApiRequest::get(format!("/api/teams/{team_id}/members")))
            .await
    }

    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn team_solved(&self, team_id: i64) -> Result<Vec<TeamSolvedChallenge>, Error> {
        self.send_expect(&ApiRequest::get(format!("/api/teams/{team_id}/solved")))
            .await
    }

    /// Retrieves the public site configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or response cannot be parsed.
    pub async fn config(&self) -> Result<AppConfig, Error> {
        self.send_expect(&ApiRequest::get("/api/config")).await
    }
}

fn timeline_path(base: &str, window_minutes: Option<u32>) -> String {
    match window_minutes {
        Some(window) => format!("{base}?window={window}"),
        None => base.to_string(),
    }
}
