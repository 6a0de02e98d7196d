use crate::Error;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Description of one API call. Cheap to clone so it can be re-issued.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub path: String,
    pub method: Method,
    pub body: Option<Value>,
    pub requires_auth: bool,
    pub retry_on_auth_failure: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            requires_auth: false,
            retry_on_auth_failure: true,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches the current access token and enables refresh-on-401.
    #[must_use]
    pub const fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    #[must_use]
    pub const fn without_auth_retry(mut self) -> Self {
        self.retry_on_auth_failure = false;
        self
    }

    /// Serializes `body` once; retries resend the same value.
    ///
    /// # Errors
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Whether a 401 on this request may be recovered by refreshing.
    #[must_use]
    pub const fn can_refresh(&self) -> bool {
        self.requires_auth && self.retry_on_auth_failure
    }
}
