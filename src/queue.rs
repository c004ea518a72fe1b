//! Durable queue for saving heartbeats while offline.
//!
//! One row per undelivered heartbeat in `~/.codetick.db`, keyed by the
//! heartbeat's composite id. The store is shared by many independent
//! agent processes, so every read-modify access runs inside an
//! immediate-mode transaction with a bounded busy retry. Push errors are
//! swallowed: losing telemetry is acceptable, stalling the host editor is
//! not.

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::config::HEARTBEATS_PER_REQUEST;
use crate::heartbeat::Heartbeat;

const POP_TRIES: u32 = 3;
const POP_BACKOFF: Duration = Duration::from_millis(100);

/// Injectable clock so busy-retry backoff is deterministic in tests.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Default wall-clock sleeper.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// The offline heartbeat queue.
pub struct Queue {
    db_file: PathBuf,
    sleeper: Box<dyn Sleeper>,
}

impl Queue {
    pub fn new(db_file: impl Into<PathBuf>) -> Self {
        Queue {
            db_file: db_file.into(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_sleeper(db_file: impl Into<PathBuf>, sleeper: Box<dyn Sleeper>) -> Self {
        Queue {
            db_file: db_file.into(),
            sleeper,
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.db_file)?;
        conn.execute_batch("CREATE TABLE IF NOT EXISTS heartbeat_2 (id TEXT, heartbeat TEXT)")?;
        Ok(conn)
    }

    /// Insert one heartbeat. Duplicate ids are tolerated; store errors
    /// are logged and swallowed.
    pub fn push(&self, heartbeat: &Heartbeat) {
        if let Err(e) = self.try_push(heartbeat) {
            tracing::debug!("offline queue push failed: {}", e);
        }
    }

    fn try_push(&self, heartbeat: &Heartbeat) -> rusqlite::Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO heartbeat_2 VALUES (?1, ?2)",
            params![heartbeat.id(), heartbeat.to_json()],
        )?;
        Ok(())
    }

    pub fn push_many(&self, heartbeats: &[Heartbeat]) {
        for heartbeat in heartbeats {
            self.push(heartbeat);
        }
    }

    /// Atomically remove and return one heartbeat.
    ///
    /// When another process holds the write lock, retries up to 3 times
    /// with a short backoff, then gives up and leaves the record intact.
    pub fn pop(&self) -> Option<Heartbeat> {
        let mut conn = match self.connect() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!("offline queue connect failed: {}", e);
                return None;
            }
        };

        let mut tries = 0;
        loop {
            match Self::pop_one(&mut conn) {
                Ok(row) => return row.and_then(|json| Heartbeat::from_json(&json)),
                Err(e) => {
                    tries += 1;
                    if tries > POP_TRIES {
                        tracing::debug!("offline queue pop failed: {}", e);
                        return None;
                    }
                    self.sleeper.sleep(POP_BACKOFF);
                }
            }
        }
    }

    fn pop_one(conn: &mut Connection) -> rusqlite::Result<Option<String>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let row: Option<(String, String)> = tx
            .query_row(
                "SELECT id, heartbeat FROM heartbeat_2 LIMIT 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        let json = match row {
            Some((id, json)) => {
                tx.execute("DELETE FROM heartbeat_2 WHERE id = ?1", params![id])?;
                Some(json)
            }
            None => None,
        };
        tx.commit()?;
        Ok(json)
    }

    /// Drain up to `limit` heartbeats lazily, in network-batch-sized
    /// chunks. Records are only popped as batches are consumed, so a
    /// caller that stops early leaves the rest untouched.
    pub fn pop_many(&self, limit: usize) -> PopMany<'_> {
        PopMany {
            queue: self,
            remaining: limit,
        }
    }

    /// Number of queued heartbeats, zero when the store is unreadable.
    pub fn count(&self) -> usize {
        self.connect()
            .and_then(|conn| {
                conn.query_row("SELECT COUNT(*) FROM heartbeat_2", [], |r| {
                    r.get::<_, i64>(0)
                })
            })
            .map(|n| n as usize)
            .unwrap_or(0)
    }
}

/// Lazy batch iterator returned by `Queue::pop_many`.
pub struct PopMany<'q> {
    queue: &'q Queue,
    remaining: usize,
}

impl Iterator for PopMany<'_> {
    type Item = Vec<Heartbeat>;

    fn next(&mut self) -> Option<Vec<Heartbeat>> {
        if self.remaining == 0 {
            return None;
        }
        let mut batch = Vec::new();
        while batch.len() < HEARTBEATS_PER_REQUEST && self.remaining > 0 {
            match self.queue.pop() {
                Some(heartbeat) => {
                    batch.push(heartbeat);
                    self.remaining -= 1;
                }
                None => {
                    self.remaining = 0;
                    break;
                }
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}
