//! Cached network session persisted across invocations.
//!
//! Each invocation is a fresh process, so anything that amortizes the
//! cost of talking to the api (cookies assigned by the load balancer,
//! primarily) is kept in a single-row table in the local store. The cache
//! is a pure performance hint: a narrow, versioned blob that is thrown
//! away on any read, parse, or version mismatch.

use std::path::PathBuf;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

/// Bump when the blob layout changes; older rows are silently discarded.
const SESSION_VERSION: i64 = 1;

/// One cookie carried between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

/// The persisted session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<SessionCookie>,
}

impl SessionState {
    /// Value for a `Cookie` request header, if any cookies are held.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Absorb `Set-Cookie` response headers, replacing same-named cookies.
    pub fn update_from_set_cookie<'a>(&mut self, headers: impl IntoIterator<Item = &'a str>) {
        for header in headers {
            let pair = header.split(';').next().unwrap_or("");
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim().to_string();
                let value = value.trim().to_string();
                if name.is_empty() {
                    continue;
                }
                self.cookies.retain(|c| c.name != name);
                self.cookies.push(SessionCookie { name, value });
            }
        }
    }
}

/// Store for the cached session blob.
pub struct SessionCache {
    db_file: PathBuf,
}

impl SessionCache {
    pub fn new(db_file: impl Into<PathBuf>) -> Self {
        SessionCache {
            db_file: db_file.into(),
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.db_file)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS session_cache (version INTEGER, value BLOB)",
        )?;
        Ok(conn)
    }

    /// The cached session, or a fresh one on any failure.
    pub fn get(&self) -> SessionState {
        let Ok(conn) = self.connect() else {
            return SessionState::default();
        };
        let row: Option<(i64, Vec<u8>)> = conn
            .query_row("SELECT version, value FROM session_cache LIMIT 1", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .optional()
            .unwrap_or(None);

        match row {
            Some((version, blob)) if version == SESSION_VERSION => {
                serde_json::from_slice(&blob).unwrap_or_default()
            }
            _ => SessionState::default(),
        }
    }

    /// Save the session for the next heartbeat process. Errors are
    /// swallowed; the worst case is a fresh handshake next time.
    pub fn save(&self, state: &SessionState) {
        let result = self.connect().and_then(|conn| {
            conn.execute("DELETE FROM session_cache", [])?;
            let blob = serde_json::to_vec(state).unwrap_or_default();
            conn.execute(
                "INSERT INTO session_cache VALUES (?1, ?2)",
                params![SESSION_VERSION, blob],
            )?;
            Ok(())
        });
        if let Err(e) = result {
            tracing::debug!("session cache save failed: {}", e);
        }
    }

    /// Clear the cached session.
    pub fn delete(&self) {
        let result = self
            .connect()
            .and_then(|conn| conn.execute("DELETE FROM session_cache", []));
        if let Err(e) = result {
            tracing::debug!("session cache delete failed: {}", e);
        }
    }

    /// Whether a session row currently exists.
    pub fn exists(&self) -> bool {
        self.connect()
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM session_cache", [], |r| {
                    r.get::<_, i64>(0)
                })
            })
            .map(|n| n > 0)
            .unwrap_or(false)
    }
}
