//! Batched heartbeat delivery and offline queue draining.
//!
//! Heartbeats are sanitized, serialized to a JSON array, and posted to
//! the bulk endpoint in batches of 25. Each batch either succeeds (with
//! per-item reconciliation against the response), fails with a classified
//! outcome, or lands back in the offline queue. After a successful send
//! the queue is drained opportunistically in the same batch size.

use std::time::Duration;

use serde_json::Value;

use crate::cli::{API_ERROR, AUTH_ERROR, CONNECTION_ERROR, SUCCESS};
use crate::config::{Settings, HEARTBEATS_PER_REQUEST};
use crate::heartbeat::{self, Heartbeat};
use crate::queue::{Queue, Sleeper, ThreadSleeper};
use crate::session::{SessionCache, SessionState};

/// Pause between queue drain batches.
const DRAIN_PAUSE: Duration = Duration::from_secs(1);

/// Classified result of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Batch accepted (201/202), per-item failures already re-queued.
    Sent,
    /// The api answered with a non-auth error.
    ApiError,
    /// Invalid credential; stop talking to the api this run.
    AuthError,
    /// The request never got an answer.
    ConnectionError,
}

impl SendOutcome {
    /// The process exit code for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            SendOutcome::Sent => SUCCESS,
            SendOutcome::ApiError => API_ERROR,
            SendOutcome::AuthError => AUTH_ERROR,
            SendOutcome::ConnectionError => CONNECTION_ERROR,
        }
    }
}

/// Client for the bulk heartbeats endpoint.
pub struct ApiClient<'a> {
    settings: &'a Settings,
    http: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    queue: Queue,
    session_cache: SessionCache,
    sleeper: Box<dyn Sleeper>,
}

impl<'a> ApiClient<'a> {
    pub fn new(settings: &'a Settings) -> anyhow::Result<Self> {
        Self::with_sleeper(settings, Box::new(ThreadSleeper))
    }

    /// Build a client with an injected clock, for deterministic tests.
    pub fn with_sleeper(settings: &'a Settings, sleeper: Box<dyn Sleeper>) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let http = reqwest::Client::builder().build()?;

        Ok(ApiClient {
            settings,
            http,
            runtime,
            queue: Queue::new(&settings.db_file),
            session_cache: SessionCache::new(&settings.db_file),
            sleeper,
        })
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn session_cache(&self) -> &SessionCache {
        &self.session_cache
    }

    /// Send any number of heartbeats in api-sized batches, stopping at
    /// the first failure. Unsent leftovers go to the offline queue.
    pub fn send_all(&self, heartbeats: &[Heartbeat]) -> SendOutcome {
        if heartbeats.is_empty() {
            return SendOutcome::Sent;
        }

        let mut outcome = SendOutcome::Sent;
        let mut chunks = heartbeats.chunks(HEARTBEATS_PER_REQUEST);
        for chunk in chunks.by_ref() {
            outcome = self.send_heartbeats(chunk);
            if outcome != SendOutcome::Sent {
                break;
            }
        }

        if outcome != SendOutcome::Sent && self.settings.offline {
            let leftovers: Vec<Heartbeat> = chunks.flatten().cloned().collect();
            self.queue.push_many(&leftovers);
        }
        outcome
    }

    /// Send one batch (at most 25 heartbeats) to the bulk endpoint.
    pub fn send_heartbeats(&self, heartbeats: &[Heartbeat]) -> SendOutcome {
        if heartbeats.is_empty() {
            return SendOutcome::Sent;
        }
        tracing::debug!(
            "sending {} heartbeats to api at {}",
            heartbeats.len(),
            self.settings.api_url
        );

        let sanitized: Vec<Heartbeat> = heartbeats
            .iter()
            .map(|h| h.sanitize(self.settings))
            .collect();
        let body = serde_json::to_string(&sanitized).unwrap_or_else(|_| "[]".to_string());

        let mut session = self.session_cache.get();
        let response = self.runtime.block_on(self.post(&body, &session));

        match response {
            Err(e) => {
                if self.settings.offline {
                    tracing::warn!("connection error, queueing batch: {}", e);
                    self.queue.push_many(heartbeats);
                } else {
                    tracing::error!("connection error: {}", e);
                }
                self.session_cache.delete();
                SendOutcome::ConnectionError
            }
            Ok(response) => {
                if response.status == 201 || response.status == 202 {
                    let results = parse_results(&response.body);
                    self.process_server_results(
                        heartbeats,
                        response.status,
                        &response.body,
                        &results,
                    );
                    session
                        .update_from_set_cookie(response.set_cookies.iter().map(String::as_str));
                    self.session_cache.save(&session);
                    SendOutcome::Sent
                } else if response.status == 401 {
                    tracing::error!("invalid api key (401)");
                    self.handle_unsent(heartbeats, Some(response.status), &response.body);
                    self.session_cache.delete();
                    SendOutcome::AuthError
                } else {
                    tracing::debug!(
                        "api error {}: {}",
                        response.status,
                        response.body
                    );
                    self.handle_unsent(heartbeats, Some(response.status), &response.body);
                    self.session_cache.delete();
                    SendOutcome::ApiError
                }
            }
        }
    }

    async fn post(&self, body: &str, session: &SessionState) -> reqwest::Result<ApiResponse> {
        let mut request = self
            .http
            .post(&self.settings.api_url)
            .header("User-Agent", heartbeat::user_agent(self.settings.plugin.as_deref()))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header(
                "Authorization",
                format!("Basic {}", base64::encode(&self.settings.api_key)),
            )
            .timeout(self.settings.timeout)
            .body(body.to_string());

        if let Some(hostname) = self.machine_name() {
            request = request.header("X-Machine-Name", hostname);
        }
        if let Some(cookie) = session.cookie_header() {
            request = request.header("Cookie", cookie);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(String::from))
            .collect();
        let body = response.text().await.unwrap_or_default();

        Ok(ApiResponse {
            status,
            body,
            set_cookies,
        })
    }

    fn machine_name(&self) -> Option<String> {
        if let Some(hostname) = &self.settings.hostname {
            return Some(hostname.clone());
        }
        hostname::get().ok().map(|h| h.to_string_lossy().into_owned())
    }

    /// Reconcile per-item results from a successful bulk response.
    ///
    /// Items whose result is not a success are re-queued individually; a
    /// results array shorter than the batch re-queues the unaccounted
    /// tail.
    fn process_server_results(
        &self,
        heartbeats: &[Heartbeat],
        code: u16,
        content: &str,
        results: &[Value],
    ) {
        tracing::debug!("response {} with {} results", code, results.len());

        if results.len() > heartbeats.len() {
            tracing::warn!("results from api not matching heartbeats sent");
        }

        for index in unaccepted_indexes(heartbeats.len(), results) {
            let item_code = results
                .get(index)
                .and_then(|r| r.get(1))
                .and_then(Value::as_u64)
                .map(|c| c as u16);
            match item_code {
                Some(item_code) => {
                    self.handle_unsent(&heartbeats[index..=index], Some(item_code), content)
                }
                None => self.handle_unsent(&heartbeats[index..=index], Some(code), content),
            }
        }

        let leftover = heartbeats.len().saturating_sub(results.len());
        if leftover > 0 {
            tracing::warn!("missing {} results from api", leftover);
        }
    }

    /// Queue heartbeats that did not make it, unless offline mode is off
    /// or the failure was a permanent payload error (400) that would just
    /// fail again.
    fn handle_unsent(&self, heartbeats: &[Heartbeat], code: Option<u16>, content: &str) {
        if self.settings.offline {
            if code == Some(400) {
                tracing::error!(
                    "bad request, dropping {} heartbeats: {}",
                    heartbeats.len(),
                    content
                );
            } else {
                tracing::warn!("queueing {} unsent heartbeats", heartbeats.len());
                self.queue.push_many(heartbeats);
            }
        } else {
            tracing::error!("api error {:?}: {}", code, content);
        }
    }

    /// Opportunistically drain the offline queue, bounded by the
    /// configured sync amount, stopping at the first failure.
    pub fn drain_offline_queue(&self) -> SendOutcome {
        let limit = self.settings.sync_offline_activity;
        if limit == 0 {
            return SendOutcome::Sent;
        }

        let mut outcome = SendOutcome::Sent;
        for batch in self.queue.pop_many(limit) {
            self.sleeper.sleep(DRAIN_PAUSE);
            outcome = self.send_heartbeats(&batch);
            if outcome != SendOutcome::Sent {
                break;
            }
        }
        outcome
    }
}

struct ApiResponse {
    status: u16,
    body: String,
    set_cookies: Vec<String>,
}

/// Extract the per-item results array (`[[echoed_item, status], ...]`)
/// from a bulk response body.
fn parse_results(body: &str) -> Vec<Value> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("responses").cloned())
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
}

/// Indexes of batch items that were not accepted: items whose result
/// carries a non-success status, plus the whole unaccounted tail when the
/// results array is shorter than the batch.
fn unaccepted_indexes(sent: usize, results: &[Value]) -> Vec<usize> {
    let mut indexes = Vec::new();
    for (i, result) in results.iter().enumerate() {
        if i >= sent {
            break;
        }
        let status = result.get(1).and_then(Value::as_u64).unwrap_or(0);
        if status != 201 && status != 202 {
            indexes.push(i);
        }
    }
    for i in results.len()..sent {
        indexes.push(i);
    }
    indexes
}
