use serde::Deserialize;
use smctf::{CredentialStore, MemoryCredentialStore, SmctfClient};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Deserialize)]
pub struct Fixture {
    pub request: FixtureRequest,
    pub response: FixtureResponse,
}

#[derive(Deserialize)]
pub struct FixtureRequest {
    pub method: String,
    pub path_pattern: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
}

#[derive(Deserialize)]
pub struct FixtureResponse {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

pub struct SmctfMock {
    pub server: MockServer,
    pub store: Arc<MemoryCredentialStore>,
}

impl SmctfMock {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            store: Arc::new(MemoryCredentialStore::new()),
        }
    }

    #[allow(dead_code)]
    pub async fn logged_in(access_token: &str, refresh_token: &str) -> Self {
        Self {
            server: MockServer::start().await,
            store: Arc::new(MemoryCredentialStore::with_tokens(
                access_token,
                refresh_token,
            )),
        }
    }

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
    }

    #[allow(dead_code)]
    pub async fn mount_fixture(&self, fixture_path: &str) {
        let full_path = Self::fixtures_dir().join(fixture_path);

        let content = fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", full_path.display(), e));

        let fixture: Fixture = serde_json::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", full_path.display(), e));

        let mut mock = Mock::given(method(fixture.request.method.as_str()))
            .and(path_regex(&fixture.request.path_pattern));
        for (key, value) in &fixture.request.query {
            mock = mock.and(query_param(key.as_str(), value.as_str()));
        }

        let mut template =
            ResponseTemplate::new(fixture.response.status_code).set_body_json(&fixture.response.body);
        for (name, value) in &fixture.response.headers {
            template = template.insert_header(name.as_str(), value.as_str());
        }

        mock.respond_with(template).mount(&self.server).await;
    }

    /// Answers `verb path` with a JSON body.
    #[allow(dead_code)]
    pub async fn mount_json(&self, verb: &str, route: &str, status: u16, body: serde_json::Value) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub fn client(&self) -> SmctfClient {
        let store: Arc<dyn CredentialStore> = self.store.clone();
        SmctfClient::new(store).with_base_url(self.server.uri())
    }

    /// Requests received so far for `route`.
    #[allow(dead_code)]
    pub async fn requests_to(&self, route: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == route)
            .collect()
    }
}

#[allow(dead_code)]
pub fn authorization(request: &Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
