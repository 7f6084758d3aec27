//! Per-nick session cache with one JSON snapshot per nick on disk.
//!
//! Snapshots live at `<storage_dir>/<nick>.json` and are rewritten whole on
//! every save (temp file + rename).

use super::Session;
use color_eyre::eyre::{Result, WrapErr, eyre};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Memoizing session store: memory first, then disk, then a fresh session.
pub struct SessionStore {
    dir: PathBuf,
    sessions: HashMap<String, Session>,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sessions: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the session for `nick`, loading or creating it on first use.
    ///
    /// Always returns the same session for the same nick within this store.
    pub fn for_nick(&mut self, nick: &str) -> &mut Session {
        let dir = &self.dir;
        self.sessions
            .entry(nick.to_owned())
            .or_insert_with(|| load_snapshot(dir, nick).unwrap_or_else(|| Session::new(nick)))
    }

    /// Read-only lookup of an already loaded session.
    pub fn get(&self, nick: &str) -> Option<&Session> {
        self.sessions.get(nick)
    }

    /// Persist the full session for `nick`, replacing any previous snapshot.
    pub fn save(&self, nick: &str) -> Result<()> {
        let session = self
            .sessions
            .get(nick)
            .ok_or_else(|| eyre!("no session loaded for {nick}"))?;

        std::fs::create_dir_all(&self.dir)
            .wrap_err_with(|| format!("failed to create {}", self.dir.display()))?;
        let path = snapshot_path(&self.dir, nick);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&tmp, json)
            .wrap_err_with(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .wrap_err_with(|| format!("failed to replace {}", path.display()))?;

        tracing::debug!(nick, path = %path.display(), "saved session");
        Ok(())
    }

    /// Nicks that have a snapshot on disk, sorted. Names come from the
    /// snapshots themselves, since file names are sanitized. Unreadable
    /// snapshots are skipped.
    pub fn persisted_nicks(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("failed to read {}", self.dir.display()));
            }
        };

        let mut nicks = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(nick) = snapshot_nick(&path)
            {
                nicks.push(nick);
            }
        }
        nicks.sort();
        Ok(nicks)
    }
}

/// Snapshot file for a nick. Path separators are replaced so a nick can never
/// escape the storage directory.
pub fn snapshot_path(dir: &Path, nick: &str) -> PathBuf {
    let file: String = nick
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    let file = if file.starts_with('.') {
        format!("_{file}")
    } else {
        file
    };
    dir.join(format!("{file}.json"))
}

/// Just the nick stored in a snapshot file.
fn snapshot_nick(path: &Path) -> Option<String> {
    #[derive(Deserialize)]
    struct Header {
        nick: String,
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(color_eyre::Report::from)
        .and_then(|content| Ok(serde_json::from_str::<Header>(&content)?));
    match parsed {
        Ok(header) => Some(header.nick),
        Err(e) => {
            tracing::warn!(path = %path.display(), "skipping unreadable session: {e}");
            None
        }
    }
}

/// Load a nick's snapshot, or `None` if it is missing or unreadable.
fn load_snapshot(dir: &Path, nick: &str) -> Option<Session> {
    let path = snapshot_path(dir, nick);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(nick, path = %path.display(), "failed to read session: {e}");
            }
            return None;
        }
    };

    match serde_json::from_str::<Session>(&content) {
        Ok(mut session) => {
            session.nick = nick.to_owned();
            tracing::debug!(nick, "loaded session from {}", path.display());
            Some(session)
        }
        Err(e) => {
            tracing::warn!(nick, path = %path.display(), "ignoring corrupt session: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn for_nick_is_memoized() {
        let dir = TempDir::new().unwrap();
        let mut store = SessionStore::new(dir.path());

        store.for_nick("fred").token = Some("fish".into());
        assert_eq!(store.for_nick("fred").token.as_deref(), Some("fish"));

        let first: *const Session = store.for_nick("fred");
        let second: *const Session = store.for_nick("fred");
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn snapshot_file_is_named_by_nick() {
        assert_eq!(
            snapshot_path(Path::new("/tmp"), "dug"),
            PathBuf::from("/tmp/dug.json")
        );
        assert_eq!(
            snapshot_path(Path::new("/tmp"), "../etc/passwd"),
            PathBuf::from("/tmp/_.._etc_passwd.json")
        );
    }

    #[test]
    fn save_without_session_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.save("nobody").is_err());
    }

    #[test]
    fn save_overwrites_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let mut store = SessionStore::new(dir.path());

        store.for_nick("dug").token = Some("one".into());
        store.save("dug").unwrap();
        store.for_nick("dug").token = Some("two".into());
        store.save("dug").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["dug.json".to_string()]);

        let mut fresh = SessionStore::new(dir.path());
        assert_eq!(fresh.for_nick("dug").token.as_deref(), Some("two"));
    }

    #[test]
    fn persisted_nicks_lists_snapshots() {
        let dir = TempDir::new().unwrap();
        let mut store = SessionStore::new(dir.path().join("sessions"));
        assert!(store.persisted_nicks().unwrap().is_empty());

        store.for_nick("zed");
        store.for_nick("amy");
        store.save("zed").unwrap();
        store.save("amy").unwrap();
        assert_eq!(store.persisted_nicks().unwrap(), vec!["amy", "zed"]);
    }

    #[test]
    fn persisted_nicks_reports_real_nicks_not_file_names() {
        let dir = TempDir::new().unwrap();
        let mut store = SessionStore::new(dir.path());

        store.for_nick("../etc/passwd");
        store.save("../etc/passwd").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();

        assert_eq!(store.persisted_nicks().unwrap(), vec!["../etc/passwd"]);
    }
}
