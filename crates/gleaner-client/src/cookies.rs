use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use cookie_store::CookieStore;
use gleaner_core::error::AppError;
use reqwest::header::HeaderValue;

/// File-backed cookie jar.
///
/// Cookies set by responses during the session are resent on subsequent
/// requests and persisted as JSON at the configured path when the session
/// is closed. Only persistent (expiring) cookies survive a save, matching
/// the usual browser jar semantics.
#[derive(Debug)]
pub struct FileJar {
    store: Mutex<CookieStore>,
    path: PathBuf,
}

impl FileJar {
    /// Open the jar at `path`, loading any previously saved cookies. A
    /// missing file starts an empty jar; an unreadable or corrupt one is
    /// reported as a cookie-jar error.
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let store = if path.exists() {
            let file = fs::File::open(path).map_err(|e| {
                AppError::CookieJar(format!("cannot read {}: {e}", path.display()))
            })?;
            CookieStore::load_json(BufReader::new(file)).map_err(|e| {
                AppError::CookieJar(format!("corrupt cookie jar {}: {e}", path.display()))
            })?
        } else {
            CookieStore::default()
        };

        Ok(Self {
            store: Mutex::new(store),
            path: path.to_path_buf(),
        })
    }

    /// Persist the current cookies to the jar file.
    pub fn save(&self) -> Result<(), AppError> {
        let file = fs::File::create(&self.path).map_err(|e| {
            AppError::CookieJar(format!("cannot write {}: {e}", self.path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        self.lock()
            .save_json(&mut writer)
            .map_err(|e| AppError::CookieJar(e.to_string()))
    }

    fn lock(&self) -> MutexGuard<'_, CookieStore> {
        // A poisoned lock still holds a usable store.
        self.store.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl reqwest::cookie::CookieStore for FileJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &url::Url) {
        let mut store = self.lock();
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else { continue };
            if let Err(err) = store.parse(raw, url) {
                tracing::debug!(error = %err, "Ignoring unparseable cookie");
            }
        }
    }

    fn cookies(&self, url: &url::Url) -> Option<HeaderValue> {
        let store = self.lock();
        let value = store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if value.is_empty() {
            return None;
        }
        HeaderValue::from_str(&value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore as _;

    fn header(s: &str) -> HeaderValue {
        HeaderValue::from_str(s).unwrap()
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let jar = FileJar::open(&dir.path().join("cookies.json")).unwrap();
        let url = url::Url::parse("http://example.com/").unwrap();
        assert!(jar.cookies(&url).is_none());
    }

    #[test]
    fn stores_and_returns_cookies_for_matching_url() {
        let dir = tempfile::tempdir().unwrap();
        let jar = FileJar::open(&dir.path().join("cookies.json")).unwrap();
        let url = url::Url::parse("http://example.com/").unwrap();

        let set = vec![header("session=abc123; Path=/")];
        jar.set_cookies(&mut set.iter(), &url);

        let sent = jar.cookies(&url).unwrap();
        assert_eq!(sent.to_str().unwrap(), "session=abc123");

        // Different host gets nothing.
        let other = url::Url::parse("http://other.test/").unwrap();
        assert!(jar.cookies(&other).is_none());
    }

    #[test]
    fn persistent_cookies_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        let url = url::Url::parse("http://example.com/").unwrap();

        {
            let jar = FileJar::open(&path).unwrap();
            let set = vec![header("token=xyz; Max-Age=3600; Path=/")];
            jar.set_cookies(&mut set.iter(), &url);
            jar.save().unwrap();
        }

        let reopened = FileJar::open(&path).unwrap();
        let sent = reopened.cookies(&url).unwrap();
        assert_eq!(sent.to_str().unwrap(), "token=xyz");
    }

    #[test]
    fn corrupt_file_is_a_cookie_jar_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(&path, "not json at all").unwrap();

        let err = FileJar::open(&path).unwrap_err();
        assert!(matches!(err, AppError::CookieJar(_)));
    }

    #[test]
    fn unparseable_set_cookie_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let jar = FileJar::open(&dir.path().join("cookies.json")).unwrap();
        let url = url::Url::parse("http://example.com/").unwrap();

        let set = vec![header(";;;"), header("good=1; Path=/")];
        jar.set_cookies(&mut set.iter(), &url);

        assert_eq!(jar.cookies(&url).unwrap().to_str().unwrap(), "good=1");
    }
}
