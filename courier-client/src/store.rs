//! Pluggable state storage.
//!
//! The [`StateBackend`] trait abstracts over where the two state documents
//! live, so callers can swap in a directory of JSON files, an SQLite
//! database, an in-memory map, or anything else offering upsert-by-key.
//!
//! [`StateStore`] sits on top of a backend and is the only way the rest of
//! the crate touches persisted state. It hands out owned snapshots and
//! serialises every load-modify-save cycle, so the send pipeline and the reply
//! monitor never observe torn documents.
//!
//! Built-in backends:
//! * [`JsonFileBackend`]: one `<key>.json` file per document.
//! * [`InMemoryBackend`]: nothing on disk; for tests and dry runs.
//! * [`SqliteBackend`]: SQLite (requires the `sqlite-store` Cargo feature).

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::state::{ReplyState, SendingState};

/// Key of the sending-progress document.
pub const SENDING_KEY: &str = "sending_state";
/// Key of the reply-monitoring document.
pub const REPLY_KEY: &str = "reply_state";

// ─── Trait ────────────────────────────────────────────────────────────────────

/// An abstraction over where and how state documents are persisted.
///
/// Documents are opaque JSON strings addressed by a fixed key; `save` must
/// replace any previous document under the same key.
pub trait StateBackend: Send + Sync {
    /// Insert or replace the document stored under `key`.
    fn save(&self, key: &str, document: &str) -> io::Result<()>;

    /// Load the document under `key`, or `None` if none was ever saved.
    fn load(&self, key: &str) -> io::Result<Option<String>>;

    /// Remove the document under `key`, if present.
    fn delete(&self, key: &str) -> io::Result<()>;

    /// Human-readable name of this backend (for log messages).
    fn name(&self) -> &str;
}

// ─── JsonFileBackend ──────────────────────────────────────────────────────────

/// Stores each document as `<dir>/<key>.json`, replaced atomically.
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    /// Uses `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateBackend for JsonFileBackend {
    fn save(&self, key: &str, document: &str) -> io::Result<()> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, document)?;
        std::fs::rename(&tmp, &path)
    }

    fn load(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn name(&self) -> &str { "json-file" }
}

// ─── InMemoryBackend ─────────────────────────────────────────────────────────

/// An ephemeral backend that stores nothing on disk.
///
/// Useful for testing or for dry runs that should always start fresh.
#[derive(Default)]
pub struct InMemoryBackend {
    docs: Mutex<HashMap<String, String>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for InMemoryBackend {
    fn save(&self, key: &str, document: &str) -> io::Result<()> {
        lock(&self.docs).insert(key.to_owned(), document.to_owned());
        Ok(())
    }

    fn load(&self, key: &str) -> io::Result<Option<String>> {
        Ok(lock(&self.docs).get(key).cloned())
    }

    fn delete(&self, key: &str) -> io::Result<()> {
        lock(&self.docs).remove(key);
        Ok(())
    }

    fn name(&self) -> &str { "in-memory" }
}

// ─── SqliteBackend ────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite-store")]
pub use sqlite_backend::SqliteBackend;

#[cfg(feature = "sqlite-store")]
mod sqlite_backend {
    use super::*;
    use rusqlite::{Connection, OptionalExtension, params};

    fn sql_err(e: rusqlite::Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, e)
    }

    /// SQLite-backed state store.
    ///
    /// Creates a `documents` table if it does not exist.
    ///
    /// Enable with the `sqlite-store` Cargo feature:
    /// ```toml
    /// [dependencies]
    /// courier-client = { version = "*", features = ["sqlite-store"] }
    /// ```
    pub struct SqliteBackend {
        path: PathBuf,
    }

    impl SqliteBackend {
        pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
            let path = path.into();
            // Open and initialise the schema immediately so errors surface early.
            let conn = Connection::open(&path).map_err(sql_err)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (
                    key        TEXT    PRIMARY KEY,
                    body       TEXT    NOT NULL,
                    updated_at INTEGER NOT NULL
                );",
            ).map_err(sql_err)?;
            Ok(Self { path })
        }

        fn open(&self) -> io::Result<Connection> {
            Connection::open(&self.path).map_err(sql_err)
        }
    }

    impl StateBackend for SqliteBackend {
        fn save(&self, key: &str, document: &str) -> io::Result<()> {
            self.open()?.execute(
                "INSERT INTO documents (key, body, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                    body       = excluded.body,
                    updated_at = excluded.updated_at",
                params![key, document, chrono::Utc::now().timestamp()],
            ).map_err(sql_err)?;
            Ok(())
        }

        fn load(&self, key: &str) -> io::Result<Option<String>> {
            self.open()?
                .query_row(
                    "SELECT body FROM documents WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(sql_err)
        }

        fn delete(&self, key: &str) -> io::Result<()> {
            self.open()?
                .execute("DELETE FROM documents WHERE key = ?1", params![key])
                .map_err(sql_err)?;
            Ok(())
        }

        fn name(&self) -> &str { "sqlite" }
    }
}

// ─── StateStore ───────────────────────────────────────────────────────────────

/// Typed access to the sending and reply documents. Cheap to clone.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn StateBackend>,
    sending: Arc<Mutex<()>>,
    reply:   Arc<Mutex<()>>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        tracing::debug!("[store] using {} backend", backend.name());
        Self {
            backend,
            sending: Arc::new(Mutex::new(())),
            reply:   Arc::new(Mutex::new(())),
        }
    }

    /// A store over a fresh [`InMemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    // ── Sending state ──────────────────────────────────────────────────────

    /// Snapshot of the sending document (defaults if never saved).
    pub fn load_sending(&self) -> io::Result<SendingState> {
        let _guard = lock(&self.sending);
        self.load_doc(SENDING_KEY)
    }

    /// Replace the sending document with `state`.
    pub fn save_sending(&self, state: &SendingState) -> io::Result<()> {
        let _guard = lock(&self.sending);
        self.save_doc(SENDING_KEY, state)
    }

    /// Persist pipeline progress without losing a stop request.
    ///
    /// Everything in `state` is written except `should_stop`, which is the
    /// OR of `state` and what is stored, so a stop requested by another
    /// process survives. Returns the resulting `should_stop`.
    pub fn save_progress(&self, state: &SendingState) -> io::Result<bool> {
        let _guard = lock(&self.sending);
        let stored: SendingState = self.load_doc(SENDING_KEY)?;
        let mut merged = state.clone();
        merged.should_stop = state.should_stop || (stored.is_sending && stored.should_stop);
        self.save_doc(SENDING_KEY, &merged)?;
        Ok(merged.should_stop)
    }

    /// Ask the running job to stop. Returns `false` if no job is running.
    pub fn request_stop(&self) -> io::Result<bool> {
        let _guard = lock(&self.sending);
        let mut state: SendingState = self.load_doc(SENDING_KEY)?;
        if !state.is_sending {
            return Ok(false);
        }
        state.should_stop = true;
        self.save_doc(SENDING_KEY, &state)?;
        Ok(true)
    }

    // ── Reply state ────────────────────────────────────────────────────────

    /// Snapshot of the reply document (defaults if never saved).
    pub fn load_reply(&self) -> io::Result<ReplyState> {
        let _guard = lock(&self.reply);
        self.load_doc(REPLY_KEY)
    }

    /// Replace the reply document with `state`.
    pub fn save_reply(&self, state: &ReplyState) -> io::Result<()> {
        let _guard = lock(&self.reply);
        self.save_doc(REPLY_KEY, state)
    }

    /// Load, modify and save the reply document as one step.
    pub fn update_reply<R>(&self, f: impl FnOnce(&mut ReplyState) -> R) -> io::Result<R> {
        let _guard = lock(&self.reply);
        let mut state: ReplyState = self.load_doc(REPLY_KEY)?;
        let out = f(&mut state);
        self.save_doc(REPLY_KEY, &state)?;
        Ok(out)
    }

    // ── Private helpers ────────────────────────────────────────────────────

    fn load_doc<T: DeserializeOwned + Default>(&self, key: &str) -> io::Result<T> {
        match self.backend.load(key)? {
            Some(doc) => serde_json::from_str(&doc)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{key}: {e}"))),
            None => Ok(T::default()),
        }
    }

    fn save_doc<T: Serialize>(&self, key: &str, value: &T) -> io::Result<()> {
        let doc = serde_json::to_string(value)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{key}: {e}")))?;
        self.backend.save(key, &doc)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
