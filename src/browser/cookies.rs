// Cookie snapshot persisted between runs.
//
// The jar is a JSON array of cookie objects. Each save overwrites the whole
// file; saves are serialized and go through a temp file + rename so a reader
// never sees a half-written jar.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::sync::Mutex;

use super::BrowserError;

pub struct CookieJar {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl CookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// A jar that never touches the filesystem.
    pub fn disabled() -> Self {
        Self {
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Missing file means no cookies yet.
    pub async fn load(&self) -> Result<Vec<Value>, BrowserError> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let cookies: Vec<Value> = serde_json::from_slice(&raw)?;
        tracing::debug!("cookie jar: loaded {} cookies from {}", cookies.len(), path.display());
        Ok(cookies)
    }

    pub async fn save(&self, cookies: &[Value]) -> Result<(), BrowserError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let body = serde_json::to_vec(cookies)?;

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!("cookie jar: saved {} cookies to {}", cookies.len(), path.display());
        Ok(())
    }
}
