//! Codetick - command-line agent for the CodeTick time-tracking API.
//!
//! The agent is invoked once per editor activity event. Each invocation
//! builds one (or, with `--extra-heartbeats`, several) heartbeat records,
//! enriches them with language, dependency, and project information,
//! sanitizes them according to the user's obfuscation settings, and posts
//! them to the bulk heartbeat endpoint. Heartbeats that cannot be delivered
//! are buffered in a local SQLite queue and drained opportunistically on
//! later invocations.
//!
//! # Architecture
//!
//! - `cli`: argument surface and the per-invocation run loop
//! - `config`: merged CLI + `~/.codetick.toml` settings
//! - `heartbeat`: the validated, sanitizable heartbeat record
//! - `lexers`: bundled tokenizers and language descriptors
//! - `dependencies`: per-language import extraction over token streams
//! - `stats`: language detection and file statistics
//! - `project`: project/branch detection (marker file, map, git, hg)
//! - `queue`: durable offline heartbeat queue
//! - `session`: cached network session blob
//! - `api`: batched sends and offline queue draining
//!
//! # Adding a New Language
//!
//! Add a descriptor in `lexers`, implement `TokenParser` in a module under
//! `dependencies/`, and register it in `dependencies::init`.

pub mod api;
pub mod cli;
pub mod config;
pub mod dependencies;
pub mod heartbeat;
pub mod lexers;
pub mod logs;
pub mod project;
pub mod queue;
pub mod session;
pub mod stats;

pub use api::{ApiClient, SendOutcome};
pub use config::Settings;
pub use heartbeat::{Heartbeat, RawHeartbeat, SkipHeartbeat};
pub use queue::Queue;
pub use session::SessionCache;

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    dependencies::init();
}
