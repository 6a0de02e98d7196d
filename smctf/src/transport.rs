use crate::classify::classify;
use crate::error::ApiError;
use crate::request::ApiRequest;
use crate::Error;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

const JSON: &str = "application/json";

/// Raw HTTP plumbing shared by the pipeline and the refresh coordinator.
#[derive(Debug, Clone)]
pub(crate) struct Transport {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl Transport {
    pub(crate) fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_base_url(base_url),
        }
    }

    /// Issues `request` once. `token`, when given, is sent as a bearer credential.
    pub(crate) async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, Error> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, JSON);
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.header(CONTENT_TYPE, JSON).json(body);
        }
        let response = builder.send().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status().as_u16(),
            "api request"
        );
        Ok(response)
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn declares_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(JSON))
}

/// Payload of a 2xx response: `None` for 204 or a non-JSON body.
pub(crate) async fn payload<T: DeserializeOwned>(response: Response) -> Result<Option<T>, Error> {
    if response.status() == StatusCode::NO_CONTENT || !declares_json(response.headers()) {
        return Ok(None);
    }
    let bytes = response.bytes().await?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Structured error of a non-2xx response. Unreadable bodies count as absent.
pub(crate) async fn api_error(response: Response) -> ApiError {
    let status = response.status();
    let headers = response.headers().clone();
    let body = if declares_json(&headers) {
        response
            .bytes()
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
    } else {
        None
    };
    classify(status, &headers, body.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn base_url_loses_trailing_slashes() {
        assert_eq!(
            normalize_base_url("http://localhost:8080//"),
            "http://localhost:8080"
        );
    }

    #[test]
    fn json_detection_accepts_charset() {
        let mut headers = HeaderMap::new();
        assert!(!declares_json(&headers));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(declares_json(&headers));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!declares_json(&headers));
    }
}
