use std::{
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use axum::http::StatusCode;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::{Host, Url};

const MAX_REDIRECTS: usize = 5;
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const CONTENT_SELECTORS: [&str; 7] = [
    "main",
    "[role=\"main\"]",
    ".post-content",
    ".entry-content",
    ".article-body",
    "#content",
    ".content",
];

const SKIPPED_TAGS: [&str; 11] = [
    "script", "style", "nav", "header", "footer", "aside", "noscript", "form", "svg", "iframe",
    "template",
];

const BLOCK_TAGS: [&str; 20] = [
    "p", "div", "section", "article", "main", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5",
    "h6", "br", "tr", "blockquote", "pre", "figure", "table",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("the URL is malformed")]
    InvalidUrl,
    #[error("only http and https URLs are supported")]
    UnsupportedScheme,
    /// SSRF guard and DNS failures share one generic message.
    #[error("this URL cannot be fetched")]
    Forbidden,
    #[error("the page took too long to respond")]
    Timeout,
    #[error("the site refused access to this page")]
    AccessBlocked,
    #[error("the page was not found")]
    NotFound,
    #[error("the site returned a server error")]
    UpstreamServerError,
    #[error("the page could not be fetched (status {0})")]
    UpstreamStatus(u16),
    #[error("the page redirected too many times")]
    TooManyRedirects,
    #[error("the page could not be fetched")]
    Fetch,
    #[error("not enough readable text was found on the page; paste the text instead")]
    TooShort,
}

impl AcquisitionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AcquisitionError::InvalidUrl | AcquisitionError::UnsupportedScheme => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AcquisitionError::InvalidUrl => "invalid_url",
            AcquisitionError::UnsupportedScheme => "unsupported_scheme",
            AcquisitionError::Forbidden => "url_forbidden",
            AcquisitionError::Timeout => "fetch_timeout",
            AcquisitionError::AccessBlocked => "fetch_blocked",
            AcquisitionError::NotFound => "fetch_not_found",
            AcquisitionError::UpstreamServerError => "fetch_server_error",
            AcquisitionError::UpstreamStatus(_) | AcquisitionError::Fetch => "fetch_failed",
            AcquisitionError::TooManyRedirects => "too_many_redirects",
            AcquisitionError::TooShort => "extraction_too_short",
        }
    }
}

/// Extracts readable text from a user-supplied URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, AcquisitionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> anyhow::Result<Vec<IpAddr>>;
}

pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> anyhow::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Transport(String),
}

/// One HTTP exchange against an address that was already validated. Never follows redirects.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, pinned: SocketAddr) -> Result<FetchedPage, FetchFailure>;
}

pub struct ReqwestFetcher {
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url, pinned: SocketAddr) -> Result<FetchedPage, FetchFailure> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(self.timeout)
            .user_agent(BROWSER_USER_AGENT);
        // Pin the connection to the checked address so a second lookup cannot swap it.
        if let Some(host) = url.domain() {
            builder = builder.resolve(host, pinned);
        }
        let client = builder
            .build()
            .map_err(|err| FetchFailure::Transport(err.to_string()))?;

        let mut resp = client
            .get(url.as_str())
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        if (200..300).contains(&status) {
            while let Some(chunk) = resp.chunk().await.map_err(map_reqwest_error)? {
                let room = MAX_BODY_BYTES.saturating_sub(body.len());
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                if body.len() >= MAX_BODY_BYTES {
                    break;
                }
            }
        }

        Ok(FetchedPage {
            status,
            location,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Transport(err.to_string())
    }
}

/// Whitespace rules applied to extracted text.
pub struct TextNormalizer {
    horizontal: Regex,
    around_newline: Regex,
    blank_runs: Regex,
}

impl TextNormalizer {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            horizontal: Regex::new(r"[ \t\x{A0}]+")?,
            around_newline: Regex::new(r" *\n *")?,
            blank_runs: Regex::new(r"\n{3,}")?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let text = raw.replace("\r\n", "\n").replace('\r', "\n");
        let text = self.horizontal.replace_all(&text, " ");
        let text = self.around_newline.replace_all(&text, "\n");
        let text = self.blank_runs.replace_all(&text, "\n\n");
        text.trim().to_string()
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub fn is_blocked_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_ipv4(v4),
        IpAddr::V6(v6) => is_blocked_ipv6(v6),
    }
}

fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let [first, second, ..] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || first == 0
        // 100.64.0.0/10 shared address space
        || (first == 100 && (64..128).contains(&second))
}

fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_blocked_ipv4(mapped);
    }

    let first_segment = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fe80::/10 link-local
        || (first_segment & 0xffc0) == 0xfe80
        // fc00::/7 unique local
        || (first_segment & 0xfe00) == 0xfc00
}

/// Fetches a URL only after every hop resolves to public addresses. Always fails closed.
pub struct SafeContentAcquirer<H, F>
where
    H: HostResolver + Send + Sync + 'static,
    F: PageFetcher + Send + Sync + 'static,
{
    resolver: Arc<H>,
    fetcher: Arc<F>,
    normalizer: TextNormalizer,
    max_chars: usize,
    min_chars: usize,
}

impl<H, F> SafeContentAcquirer<H, F>
where
    H: HostResolver + Send + Sync + 'static,
    F: PageFetcher + Send + Sync + 'static,
{
    pub fn new(
        resolver: Arc<H>,
        fetcher: Arc<F>,
        max_chars: usize,
        min_chars: usize,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            resolver,
            fetcher,
            normalizer: TextNormalizer::new()?,
            max_chars,
            min_chars,
        })
    }

    async fn pin_address(&self, url: &Url) -> Result<SocketAddr, AcquisitionError> {
        let port = url
            .port_or_known_default()
            .ok_or(AcquisitionError::InvalidUrl)?;

        let ip = match url.host() {
            Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
            Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                if domain == "localhost" || domain.ends_with(".localhost") {
                    warn!(host = %domain, "acquirer: refused localhost target");
                    return Err(AcquisitionError::Forbidden);
                }

                let addrs = self.resolver.resolve(&domain, port).await.map_err(|err| {
                    warn!(host = %domain, error = ?err, "acquirer: DNS resolution failed");
                    AcquisitionError::Forbidden
                })?;

                if let Some(blocked) = addrs.iter().copied().find(|ip| is_blocked_ip(*ip)) {
                    warn!(host = %domain, ip = %blocked, "acquirer: host resolves to blocked address");
                    return Err(AcquisitionError::Forbidden);
                }

                addrs.first().copied().ok_or_else(|| {
                    warn!(host = %domain, "acquirer: DNS returned no addresses");
                    AcquisitionError::Forbidden
                })?
            }
            None => return Err(AcquisitionError::InvalidUrl),
        };

        if is_blocked_ip(ip) {
            warn!(ip = %ip, "acquirer: refused blocked address literal");
            return Err(AcquisitionError::Forbidden);
        }

        Ok(SocketAddr::new(ip, port))
    }

    fn read_page(&self, url: &Url, page: FetchedPage) -> Result<String, AcquisitionError> {
        match page.status {
            200..=299 => {}
            401 | 403 => return Err(AcquisitionError::AccessBlocked),
            404 | 410 => return Err(AcquisitionError::NotFound),
            500..=599 => return Err(AcquisitionError::UpstreamServerError),
            other => return Err(AcquisitionError::UpstreamStatus(other)),
        }

        let text = extract_readable_text(&page.body, &self.normalizer, self.min_chars);
        let text = truncate_chars(&text, self.max_chars);
        let chars = text.chars().count();

        if chars < self.min_chars {
            info!(url = %url, chars, "acquirer: extracted text below minimum length");
            return Err(AcquisitionError::TooShort);
        }

        debug!(url = %url, chars, "acquirer: extracted readable text");
        Ok(text)
    }
}

#[async_trait]
impl<H, F> ContentSource for SafeContentAcquirer<H, F>
where
    H: HostResolver + Send + Sync + 'static,
    F: PageFetcher + Send + Sync + 'static,
{
    async fn extract(&self, raw_url: &str) -> Result<String, AcquisitionError> {
        let mut current = parse_target(raw_url)?;

        for _ in 0..=MAX_REDIRECTS {
            let pinned = self.pin_address(&current).await?;

            let page = self
                .fetcher
                .fetch(&current, pinned)
                .await
                .map_err(|err| match err {
                    FetchFailure::Timeout => AcquisitionError::Timeout,
                    FetchFailure::Transport(detail) => {
                        warn!(url = %current, error = %detail, "acquirer: fetch failed");
                        AcquisitionError::Fetch
                    }
                })?;

            if (300..400).contains(&page.status) {
                let Some(location) = page.location.as_deref() else {
                    return Err(AcquisitionError::UpstreamStatus(page.status));
                };
                let next = current
                    .join(location)
                    .map_err(|_| AcquisitionError::InvalidUrl)?;
                check_target(&next)?;
                debug!(from = %current, to = %next, "acquirer: following redirect");
                current = next;
                continue;
            }

            return self.read_page(&current, page);
        }

        Err(AcquisitionError::TooManyRedirects)
    }
}

fn parse_target(raw: &str) -> Result<Url, AcquisitionError> {
    let url = Url::parse(raw.trim()).map_err(|_| AcquisitionError::InvalidUrl)?;
    check_target(&url)?;
    Ok(url)
}

fn check_target(url: &Url) -> Result<(), AcquisitionError> {
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(AcquisitionError::UnsupportedScheme),
    }
    if !url.username().is_empty() || url.password().is_some() {
        warn!("acquirer: refused URL carrying credentials");
        return Err(AcquisitionError::Forbidden);
    }
    if url.host().is_none() {
        return Err(AcquisitionError::InvalidUrl);
    }
    Ok(())
}

/// Main-content heuristic: `<article>`, then common content containers, then the whole body.
pub fn extract_readable_text(html: &str, normalizer: &TextNormalizer, min_chars: usize) -> String {
    let document = Html::parse_document(html);

    let candidates = std::iter::once("article").chain(CONTENT_SELECTORS);
    for css in candidates {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };

        let best = document
            .select(&selector)
            .map(|element| normalizer.normalize(&element_text(element)))
            .max_by_key(|text| text.chars().count());

        if let Some(text) = best.filter(|text| text.chars().count() >= min_chars) {
            return text;
        }
    }

    let body_selector = Selector::parse("body").ok();
    let body = body_selector
        .as_ref()
        .and_then(|selector| document.select(selector).next())
        .unwrap_or_else(|| document.root_element());
    normalizer.normalize(&element_text(body))
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    out
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }

        let Some(child_element) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_element.value().name();
        if SKIPPED_TAGS.contains(&name) {
            continue;
        }

        let is_block = BLOCK_TAGS.contains(&name);
        if is_block {
            out.push('\n');
        }
        collect_text(child_element, out);
        if is_block {
            out.push('\n');
        }
    }
}
