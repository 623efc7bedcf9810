//! Client session key.
//!
//! The server partitions conversation listings by an opaque, unauthenticated
//! session id chosen by the client.  The terminal client generates one on
//! first use and keeps it in the user's config directory so the same
//! history shows up on the next run.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

const APP_DIR: &str = "parley";
const SESSION_FILE: &str = "session_id";

/// `session_<unix millis>_<9 random alphanumerics>`.
pub fn generate() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("session_{}_{}", Utc::now().timestamp_millis(), &random[..9])
}

pub fn default_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join(APP_DIR).join(SESSION_FILE))
}

/// Read the stored id at `path`, or generate and store a new one.
pub fn load_or_create(path: &Path) -> io::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(stored) if !stored.trim().is_empty() => {
            debug!(path = %path.display(), "using stored session id");
            return Ok(stored.trim().to_owned());
        }
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    let id = generate();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &id)?;
    debug!(path = %path.display(), "stored new session id");
    Ok(id)
}

/// Explicit id, else the persisted one, else a throwaway id for this run.
pub fn resolve(explicit: Option<String>) -> String {
    if let Some(id) = explicit.filter(|s| !s.trim().is_empty()) {
        return id;
    }
    let Some(path) = default_path() else {
        warn!("no config directory; using a session id for this run only");
        return generate();
    };
    load_or_create(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "cannot persist session id; using one for this run only");
        generate()
    })
}
