//! Single-flight access token refresh.

use crate::credentials::{CredentialStore, TokenPair};
use crate::request::ApiRequest;
use crate::transport::{self, Transport};
use crate::types::RefreshTokenRequest;
use crate::Error;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const REFRESH_PATH: &str = "/api/auth/refresh";

type PendingRefresh = Shared<BoxFuture<'static, Result<String, Error>>>;

#[derive(Default)]
struct RefreshSlot {
    generation: u64,
    pending: Option<PendingRefresh>,
}

/// Coalesces concurrent refreshes into one call to the refresh endpoint.
pub(crate) struct RefreshCoordinator {
    transport: Transport,
    store: Arc<dyn CredentialStore>,
    in_flight: Arc<Mutex<RefreshSlot>>,
}

impl RefreshCoordinator {
    pub(crate) fn new(transport: Transport, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            store,
            in_flight: Arc::new(Mutex::new(RefreshSlot::default())),
        }
    }

    /// Returns the new access token. Callers arriving while a refresh is
    /// outstanding share its result.
    pub(crate) async fn refresh(&self) -> Result<String, Error> {
        let pending = {
            let mut slot = self.in_flight.lock().await;
            match slot.pending.as_ref() {
                Some(pending) => pending.clone(),
                None => {
                    let pending = self.start(&mut slot);
                    slot.pending = Some(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        // The task normally empties the slot itself; this covers a task that
        // never got that far.
        let mut slot = self.in_flight.lock().await;
        if slot.pending.as_ref().is_some_and(|current| current.ptr_eq(&pending)) {
            slot.pending = None;
        }
        result
    }

    fn start(&self, slot: &mut RefreshSlot) -> PendingRefresh {
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        let transport = self.transport.clone();
        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);

        // Spawned so the refresh settles and releases the slot even if every
        // waiter goes away.
        let task = tokio::spawn(async move {
            let result = refresh_tokens(transport, store).await;
            let mut slot = in_flight.lock().await;
            if slot.generation == generation {
                slot.pending = None;
            }
            result
        });
        async move {
            task.await
                .unwrap_or_else(|err| Err(Error::RefreshTask(err.to_string())))
        }
        .boxed()
        .shared()
    }
}

async fn refresh_tokens(
    transport: Transport,
    store: Arc<dyn CredentialStore>,
) -> Result<String, Error> {
    let Some(tokens) = store.read().filter(|t| !t.refresh_token.is_empty()) else {
        return Err(Error::AuthenticationRequired);
    };

    info!("refreshing access token");
    match exchange(&transport, &tokens.refresh_token).await {
        Ok(fresh) => {
            let access_token = fresh.access_token.clone();
            store.replace(fresh);
            info!("access token refreshed");
            Ok(access_token)
        }
        Err(err) => {
            warn!(error = %err, "token refresh failed; clearing credentials");
            store.clear();
            Err(err)
        }
    }
}

async fn exchange(transport: &Transport, refresh_token: &str) -> Result<TokenPair, Error> {
    let request = ApiRequest::post(REFRESH_PATH).with_json(&RefreshTokenRequest { refresh_token })?;
    let response = transport.dispatch(&request, None).await?;
    if !response.status().is_success() {
        return Err(Error::Api(transport::api_error(response).await));
    }
    transport::payload(response)
        .await?
        .ok_or_else(|| Error::UnexpectedBody {
            path: REFRESH_PATH.to_string(),
        })
}
