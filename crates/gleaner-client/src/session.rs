use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use gleaner_core::error::AppError;
use gleaner_core::traits::Fetcher;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cookies::FileJar;

/// Fixed desktop-browser User-Agent sent unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const GET_TIMEOUT: Duration = Duration::from_secs(5);
const POST_TIMEOUT: Duration = Duration::from_secs(10);
const MULTIPART_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a transport session can be configured with, as one explicit
/// struct: no hidden mutable client state, no string-keyed option bags.
/// Unknown options simply do not exist at compile time.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub user_agent: String,
    pub referrer: Option<String>,
    pub proxy: Option<String>,
    /// Basic-auth pair applied to every request of the session.
    pub credentials: Option<(String, String)>,
    /// Path of the on-disk cookie jar. `None` disables cookie persistence.
    pub cookie_jar: Option<PathBuf>,
    /// Extra request headers, in order.
    pub headers: Vec<(String, String)>,
    /// Local address to bind outgoing connections to.
    pub bind_ip: Option<IpAddr>,
    /// Issue HEAD requests and return header information instead of bodies.
    pub head_only: bool,
    /// Treat non-2xx/3xx statuses as request failures.
    pub fail_on_error: bool,
    /// Skip TLS certificate verification. Off unless explicitly requested:
    /// it raises scrape success against misconfigured hosts at the price of
    /// removing a security guarantee.
    pub accept_invalid_certs: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referrer: None,
            proxy: None,
            credentials: None,
            cookie_jar: None,
            headers: Vec::new(),
            bind_ip: None,
            head_only: false,
            fail_on_error: true,
            accept_invalid_certs: false,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Set the Referer header for all requests of the session.
    pub fn referrer(mut self, url: impl Into<String>) -> Self {
        self.referrer = Some(url.into());
        self
    }

    /// Route all requests through a proxy (http, https or socks5 URL).
    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }

    /// Enable basic auth for all requests of the session.
    pub fn credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self
    }

    /// Persist cookies at `path` and resend stored cookies on subsequent
    /// requests, within and across sessions.
    pub fn cookie_jar(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_jar = Some(path.into());
        self
    }

    /// Add one extra request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = Some(ip);
        self
    }

    /// Suppress body retrieval: `get` issues HEAD and returns the response
    /// head rendered as text. Redirects are capped at one hop in this mode.
    pub fn head_only(mut self, yes: bool) -> Self {
        self.head_only = yes;
        self
    }

    pub fn fail_on_error(mut self, yes: bool) -> Self {
        self.fail_on_error = yes;
        self
    }

    /// Accept invalid/self-signed TLS certificates. A deliberate,
    /// documented trade-off — never the default.
    pub fn accept_invalid_certs(mut self, yes: bool) -> Self {
        self.accept_invalid_certs = yes;
        self
    }
}

/// A successful HTTP exchange. Failures never produce a `Response`; they
/// are the `Err` side of the operation, so "empty body" and "request
/// failed" cannot be confused.
#[derive(Debug, Clone)]
pub struct Response {
    pub body: String,
    pub status: u16,
    /// URL after following redirects.
    pub effective_url: String,
}

#[derive(Debug, Default)]
struct LastRequest {
    status: Option<u16>,
    effective_url: Option<String>,
    error: Option<String>,
}

/// One configurable HTTP session over a shared reqwest client.
///
/// Redirect-following is on by default, compressed responses
/// (`gzip, deflate`) are requested and decoded transparently, and the
/// session-wide state (cookies, proxy, credentials, headers) is fixed by
/// [`SessionConfig`] at construction.
#[derive(Clone, Debug)]
pub struct HttpSession {
    client: Client,
    config: SessionConfig,
    jar: Option<Arc<FileJar>>,
    last: Arc<Mutex<LastRequest>>,
}

impl HttpSession {
    pub fn new(config: SessionConfig) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| AppError::Config(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value.trim())
                .map_err(|e| AppError::Config(format!("invalid header value for {name}: {e}")))?;
            headers.append(name, value);
        }
        if let Some(referrer) = &config.referrer {
            let value = HeaderValue::from_str(referrer)
                .map_err(|e| AppError::Config(format!("invalid referrer {referrer:?}: {e}")))?;
            headers.insert(REFERER, value);
        }

        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .gzip(true)
            .deflate(true)
            .redirect(if config.head_only {
                Policy::limited(1)
            } else {
                Policy::default()
            });

        if config.accept_invalid_certs {
            tracing::warn!("TLS certificate verification disabled for this session");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ip) = config.bind_ip {
            builder = builder.local_address(ip);
        }
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| AppError::Config(format!("invalid proxy {proxy:?}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let jar = match &config.cookie_jar {
            Some(path) => Some(Arc::new(FileJar::open(path)?)),
            None => None,
        };
        if let Some(jar) = &jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        let client = builder.build().map_err(|e| AppError::Http(e.to_string()))?;

        Ok(Self {
            client,
            config,
            jar,
            last: Arc::new(Mutex::new(LastRequest::default())),
        })
    }

    /// Fetch a URL. In head-only mode the body contains the response head
    /// rendered as `Name: value` lines instead of page content.
    pub async fn get(&self, url: &str, timeout: Option<Duration>) -> Result<Response, AppError> {
        let timeout = timeout.unwrap_or(GET_TIMEOUT);
        if self.config.head_only {
            return self.fetch_head(url, timeout).await;
        }
        let resp = self.send(self.request(Method::GET, url, timeout), timeout).await?;
        self.read_body(resp).await
    }

    /// POST `body` URL-encoded.
    pub async fn post_form(
        &self,
        url: &str,
        body: &FormBody,
        timeout: Option<Duration>,
    ) -> Result<Response, AppError> {
        let timeout = timeout.unwrap_or(POST_TIMEOUT);
        let req = self.request(Method::POST, url, timeout);
        let req = match body {
            FormBody::Fields(fields) => req.form(fields),
            FormBody::Raw(raw) => req
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(raw.clone()),
        };
        let resp = self.send(req, timeout).await?;
        self.read_body(resp).await
    }

    /// POST a multipart body built from text fields plus file attachments
    /// (each file value is a filesystem path). Requires at least one part;
    /// an empty request is rejected before any I/O happens.
    ///
    /// The transport never sends `Expect: 100-continue`, so the two-phase
    /// request stall some servers exhibit with that header cannot occur.
    pub async fn post_multipart(
        &self,
        url: &str,
        fields: &[(String, String)],
        files: &[(String, PathBuf)],
        timeout: Option<Duration>,
    ) -> Result<Response, AppError> {
        if fields.is_empty() && files.is_empty() {
            return Err(AppError::Config(
                "multipart POST requires at least one field or file".into(),
            ));
        }
        let timeout = timeout.unwrap_or(MULTIPART_TIMEOUT);

        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name.clone(), value.clone());
        }
        for (name, path) in files {
            form = form.part(name.clone(), file_part(path).await?);
        }

        let req = self.request(Method::POST, url, timeout).multipart(form);
        let resp = self.send(req, timeout).await?;
        self.read_body(resp).await
    }

    /// Stream the response body into `sink` instead of buffering it in
    /// memory. Returns the number of bytes written.
    pub async fn download_to<W>(
        &self,
        url: &str,
        sink: &mut W,
        timeout: Option<Duration>,
    ) -> Result<u64, AppError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let timeout = timeout.unwrap_or(DOWNLOAD_TIMEOUT);
        let mut resp = self.send(self.request(Method::GET, url, timeout), timeout).await?;

        let mut written = 0u64;
        loop {
            let chunk = resp.chunk().await.map_err(|e| {
                let err = AppError::Http(format!("failed to read response body: {e}"));
                self.record_error(&err);
                err
            })?;
            let Some(chunk) = chunk else { break };
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        sink.flush().await?;
        Ok(written)
    }

    /// URL of the most recent request, after redirects.
    pub fn effective_url(&self) -> Option<String> {
        self.last_state().effective_url.clone()
    }

    /// Status code of the most recent request.
    pub fn status_code(&self) -> Option<u16> {
        self.last_state().status
    }

    /// Error detail of the most recent request, if it failed.
    pub fn last_error(&self) -> Option<String> {
        self.last_state().error.clone()
    }

    /// Release the session, persisting the cookie jar if one is configured.
    pub fn close(self) -> Result<(), AppError> {
        if let Some(jar) = &self.jar {
            jar.save()?;
        }
        Ok(())
    }

    fn request(&self, method: Method, url: &str, timeout: Duration) -> RequestBuilder {
        let mut req = self.client.request(method, url).timeout(timeout);
        if let Some((user, pass)) = &self.config.credentials {
            req = req.basic_auth(user, Some(pass));
        }
        req
    }

    async fn send(
        &self,
        req: RequestBuilder,
        timeout: Duration,
    ) -> Result<reqwest::Response, AppError> {
        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                {
                    let mut last = self.last_state();
                    last.status = Some(status.as_u16());
                    last.effective_url = Some(resp.url().to_string());
                    last.error = None;
                }
                if self.config.fail_on_error
                    && !(status.is_success() || status.is_redirection())
                {
                    let err = AppError::HttpStatus {
                        status: status.as_u16(),
                        url: resp.url().to_string(),
                    };
                    self.record_error(&err);
                    return Err(err);
                }
                Ok(resp)
            }
            Err(e) => {
                let err = if e.is_timeout() {
                    AppError::Timeout(timeout.as_secs())
                } else if e.is_connect() {
                    AppError::Network(format!("connection failed: {e}"))
                } else {
                    AppError::Http(e.to_string())
                };
                self.record_error(&err);
                Err(err)
            }
        }
    }

    async fn fetch_head(&self, url: &str, timeout: Duration) -> Result<Response, AppError> {
        let resp = self.send(self.request(Method::HEAD, url, timeout), timeout).await?;
        let status = resp.status();
        let effective_url = resp.url().to_string();

        let mut body = format!("{:?} {}\r\n", resp.version(), status);
        for (name, value) in resp.headers() {
            body.push_str(name.as_str());
            body.push_str(": ");
            body.push_str(value.to_str().unwrap_or("<binary>"));
            body.push_str("\r\n");
        }

        Ok(Response {
            body,
            status: status.as_u16(),
            effective_url,
        })
    }

    async fn read_body(&self, resp: reqwest::Response) -> Result<Response, AppError> {
        let status = resp.status().as_u16();
        let effective_url = resp.url().to_string();
        let body = resp.text().await.map_err(|e| {
            let err = AppError::Http(format!("failed to read response body: {e}"));
            self.record_error(&err);
            err
        })?;
        Ok(Response {
            body,
            status,
            effective_url,
        })
    }

    fn record_error(&self, err: &AppError) {
        self.last_state().error = Some(err.to_string());
    }

    fn last_state(&self) -> MutexGuard<'_, LastRequest> {
        self.last.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// URL-encoded POST payload: named fields or a prebuilt raw body.
#[derive(Debug, Clone)]
pub enum FormBody {
    Fields(Vec<(String, String)>),
    Raw(String),
}

impl Fetcher for HttpSession {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        Ok(self.get(url, None).await?.body)
    }
}

async fn file_part(path: &Path) -> Result<reqwest::multipart::Part, AppError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::Config(format!("cannot attach {}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(reqwest::multipart::Part::bytes(bytes).file_name(file_name))
}
