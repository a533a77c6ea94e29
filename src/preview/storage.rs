//! Per-session artifact directories.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::dap::protocol::Event;
use crate::dap::ClientEvent;
use crate::weak_error;

const MAX_NAME_LEN: usize = 50;
const EXTENSION: &str = "ply";

/// Outcome of [`SessionStorage::release`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Release {
    /// Session directory is gone.
    Removed,
    /// Directory is forgotten but could not be removed, see the log.
    Failed,
    /// Session never saved anything or was released already.
    Untracked,
}

/// How a watched session ended, see [`release_on_termination`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SessionEnd {
    pub reason: String,
    pub release: Release,
}

struct SessionDir {
    path: PathBuf,
    /// File names handed out for this session.
    issued: HashSet<String>,
}

/// Owns `<base>/<session id>` directories, one per live debug session.
pub struct SessionStorage {
    base: PathBuf,
    sessions: Mutex<HashMap<String, SessionDir>>,
}

impl SessionStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            sessions: Mutex::default(),
        }
    }

    /// `<system temp>/plysnap`
    pub fn default_base() -> PathBuf {
        std::env::temp_dir().join("plysnap")
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory of a session if it was created and not released yet.
    pub fn session_dir(&self, session_id: &str) -> Option<PathBuf> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(session_id).map(|dir| dir.path.clone())
    }

    /// Fresh destination for a snapshot of `expression`, creates the session directory
    /// if needed.
    ///
    /// The file is named `<sanitized expression>_<unix millis>.ply`; a `-<n>` suffix is
    /// added when that name was already handed out or exists on disk.
    pub fn artifact_path(&self, session_id: &str, expression: &str) -> io::Result<PathBuf> {
        let path = self.base.join(session_dir_name(session_id));
        if path.parent() != Some(self.base.as_path()) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("session id `{session_id}` does not map to a directory"),
            ));
        }

        let mut sessions = self.sessions.lock().unwrap();
        let dir = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionDir {
                path,
                issued: HashSet::new(),
            });
        fs::create_dir_all(&dir.path)?;

        let stem = format!(
            "{}_{}",
            sanitize(expression),
            chrono::Utc::now().timestamp_millis()
        );
        let mut name = format!("{stem}.{EXTENSION}");
        let mut n = 0;
        while dir.issued.contains(&name) || dir.path.join(&name).exists() {
            n += 1;
            name = format!("{stem}-{n}.{EXTENSION}");
        }

        let path = dir.path.join(&name);
        dir.issued.insert(name);
        log::debug!(target: "plysnap::storage", "new artifact {}", path.display());
        Ok(path)
    }

    /// Remove the directory of a terminated session with everything in it.
    ///
    /// The session is forgotten even if removal fails, there is no retry.
    pub fn release(&self, session_id: &str) -> Release {
        let Some(dir) = self.sessions.lock().unwrap().remove(session_id) else {
            return Release::Untracked;
        };

        match fs::remove_dir_all(&dir.path) {
            Ok(()) => {
                log::info!(target: "plysnap::storage", "removed {}", dir.path.display());
                Release::Removed
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Release::Removed,
            Err(e) => {
                log::warn!(target: "plysnap::storage", "remove {}: {e}", dir.path.display());
                Release::Failed
            }
        }
    }

    /// Remove every directory under the base path not owned by a live session of this
    /// process. Returns the number of removed directories.
    pub fn purge_stale(&self) -> usize {
        let live: HashSet<PathBuf> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .map(|dir| dir.path.clone())
            .collect();

        let entries = match fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                log::warn!(target: "plysnap::storage", "read {}: {e}", self.base.display());
                return 0;
            }
        };

        entries
            .filter_map(|entry| weak_error!(entry, "storage entry:"))
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && !live.contains(path))
            .filter(|path| {
                let removed = weak_error!(fs::remove_dir_all(path), "purge:").is_some();
                if removed {
                    log::info!(target: "plysnap::storage", "purged {}", path.display());
                }
                removed
            })
            .count()
    }
}

/// Consume session events until the debuggee terminates or the connection is lost, then
/// release the session's directory.
///
/// Other events are handed to `on_event`.
pub fn release_on_termination(
    storage: &SessionStorage,
    session_id: &str,
    events: impl IntoIterator<Item = ClientEvent>,
    mut on_event: impl FnMut(&Event),
) -> SessionEnd {
    let mut reason = "event channel closed".to_string();
    for event in events {
        match event {
            ClientEvent::Event(ev) if ev.is_termination() => {
                reason = format!("debuggee {}", ev.event);
                break;
            }
            ClientEvent::Event(ev) => on_event(&ev),
            ClientEvent::Closed(why) => {
                reason = why;
                break;
            }
        }
    }

    log::debug!(target: "plysnap::storage", "session {session_id} ended: {reason}");
    SessionEnd {
        reason,
        release: storage.release(session_id),
    }
}

/// Single normal path component for a session id: sanitized, never empty and never `.`
/// or `..`.
fn session_dir_name(session_id: &str) -> String {
    let name = sanitize(session_id);
    if name.chars().all(|c| c == '.') {
        format!("_{name}")
    } else {
        name
    }
}

/// Map everything outside `[A-Za-z0-9_.-]` to `_` and keep at most 50 characters.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect()
}
