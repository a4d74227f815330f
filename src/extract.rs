//! Text extraction for uploaded papers.
//!
//! Turns PDF bytes, arXiv links, PDF URLs and ordinary web pages into plain
//! text plus a best-effort title. Extraction never panics; every failure is
//! an [`ExtractError`] and the caller decides how to surface it.
//!
//! | Input | Handling |
//! |-------|----------|
//! | PDF bytes | `pdf-extract`, then [`clean_text`] |
//! | `arxiv.org/abs/<id>`, `arxiv.org/pdf/<id>`, `arxiv:<id>` | rewritten to `https://arxiv.org/pdf/<id>.pdf` |
//! | URL ending in `.pdf` | downloaded and extracted as PDF |
//! | any other URL | fetched as HTML and stripped by [`html_to_text`] |

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

/// Title used when no plausible line is found.
pub const UNTITLED: &str = "Untitled Paper";

/// Title used for web pages without a `<title>`.
pub const WEB_PAGE_TITLE: &str = "Web Page Content";

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("paper-rag/", env!("CARGO_PKG_VERSION"));

const HEADER_KEYWORDS: &[&str] = &[
    "abstract",
    "introduction",
    "arxiv:",
    "doi:",
    "email:",
    "@",
    "university",
    "department",
    "conference",
    "journal",
];

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => panic!("extraction regex {pattern:?} is invalid: {err}"),
    }
}

static BLANK_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"\n\s*\n"));
static SPACE_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r" +"));
static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<script[^>]*>.*?</script>"));
static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<style[^>]*>.*?</style>"));
static TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]+>"));
static TITLE_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<title[^>]*>(.*?)</title>"));
static ARXIV_ID: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"(?i)(?:arxiv\.org/abs/|arxiv\.org/pdf/|arxiv:)([^/\s?#]+)")
});

/// Extraction failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("could not extract an arXiv id from {0}")]
    ArxivId(String),

    #[error("fetching {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("no text content could be extracted")]
    Empty,
}

/// Extracted text and its title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub title: String,
}

impl Extracted {
    fn from_text(text: String) -> Result<Self, ExtractError> {
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        let title = extract_title(&text);
        Ok(Self { text, title })
    }
}

/// Extract and clean the text of a PDF held in memory.
pub fn extract_pdf(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let raw =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Extracted::from_text(clean_text(&raw))
}

/// [`extract_pdf`] on a blocking thread.
///
/// pdf-extract is CPU-bound and panics on some malformed files; a panic is
/// reported as [`ExtractError::Pdf`] like any other unreadable PDF.
pub async fn extract_pdf_task(bytes: Vec<u8>) -> Result<Extracted, ExtractError> {
    pdf_task(move || extract_pdf(&bytes)).await
}

async fn pdf_task<F>(f: F) -> Result<Extracted, ExtractError>
where
    F: FnOnce() -> Result<Extracted, ExtractError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ExtractError::Pdf(format!("extraction aborted: {}", e)))?
}

/// Clean plain text the same way extracted PDF text is cleaned.
pub fn extract_plain(text: &str) -> Result<Extracted, ExtractError> {
    Extracted::from_text(clean_text(text))
}

/// Normalize extracted text.
///
/// Blank-line runs and repeated spaces are collapsed, and lines that are
/// bare page numbers or shorter than three characters are dropped.
pub fn clean_text(text: &str) -> String {
    let text = BLANK_RUN.replace_all(text, "\n\n");
    let text = SPACE_RUN.replace_all(&text, " ");

    text.lines()
        .map(str::trim)
        .filter(|line| !is_page_number(line) && line.chars().count() >= 3)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_page_number(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c.is_ascii_digit())
}

/// Guess a paper's title from its first lines.
///
/// Takes the first line among the first ten that is longer than fifteen
/// characters, does not end with a period and does not look like an
/// author, affiliation or section header. Falls back to the first long
/// line among the first twenty, then to [`UNTITLED`].
pub fn extract_title(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let heading = lines.iter().take(10).find(|line| {
        let lower = line.to_lowercase();
        line.chars().count() > 15
            && !line.ends_with('.')
            && !HEADER_KEYWORDS.iter().any(|k| lower.contains(k))
    });
    if let Some(line) = heading {
        return line.to_string();
    }

    lines
        .iter()
        .take(20)
        .find(|line| line.chars().count() > 15)
        .map(|line| line.to_string())
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// The arXiv identifier in `url`, without any `.pdf` suffix.
pub fn arxiv_id(url: &str) -> Option<String> {
    let caps = ARXIV_ID.captures(url)?;
    let id = caps.get(1)?.as_str();
    let id = id.strip_suffix(".pdf").unwrap_or(id);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

/// How a URL will be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlTarget {
    /// Download and extract as PDF from this address.
    Pdf(String),
    /// Fetch as an HTML page.
    Html(String),
}

/// Decide how to fetch `url`, rewriting arXiv links to their PDF.
pub fn classify_url(url: &str) -> Result<UrlTarget, ExtractError> {
    let lower = url.to_lowercase();
    if lower.contains("arxiv.org") || lower.starts_with("arxiv:") {
        let id = arxiv_id(url).ok_or_else(|| ExtractError::ArxivId(url.to_string()))?;
        return Ok(UrlTarget::Pdf(format!("https://arxiv.org/pdf/{}.pdf", id)));
    }
    if lower.ends_with(".pdf") {
        return Ok(UrlTarget::Pdf(url.to_string()));
    }
    Ok(UrlTarget::Html(url.to_string()))
}

/// Strip an HTML page down to its text and `<title>`.
pub fn html_to_text(html: &str) -> Result<Extracted, ExtractError> {
    let text = SCRIPT_BLOCK.replace_all(html, "");
    let text = STYLE_BLOCK.replace_all(&text, "");
    let text = TAG.replace_all(&text, "");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    let text = SPACE_RUN.replace_all(&text, " ");
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::Empty);
    }

    let title = TITLE_TAG
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| TAG.replace_all(m.as_str(), "").trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| WEB_PAGE_TITLE.to_string());

    Ok(Extracted {
        text: text.to_string(),
        title,
    })
}

/// Build the HTTP client used for URL ingestion.
pub fn http_client() -> Result<reqwest::Client, ExtractError> {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ExtractError::Fetch {
            url: String::new(),
            message: e.to_string(),
        })
}

/// Fetch `url` and extract its text.
pub async fn fetch_url(client: &reqwest::Client, url: &str) -> Result<Extracted, ExtractError> {
    let target = classify_url(url)?;
    debug!(url, target = ?target, "fetching paper");

    match target {
        UrlTarget::Pdf(pdf_url) => {
            let bytes = fetch_bytes(client, &pdf_url).await?;
            let pdf_len = bytes.len();
            let extracted = extract_pdf_task(bytes).await?;
            info!(url = %pdf_url, bytes = pdf_len, "extracted PDF from URL");
            Ok(extracted)
        }
        UrlTarget::Html(page_url) => {
            let bytes = fetch_bytes(client, &page_url).await?;
            html_to_text(&String::from_utf8_lossy(&bytes))
        }
    }
}

async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, ExtractError> {
    let fetch_err = |message: String| ExtractError::Fetch {
        url: url.to_string(),
        message,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_err(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fetch_err(format!("HTTP {}", status)));
    }
    let bytes = response.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_drops_page_numbers_and_short_lines() {
        let raw = "Attention Is All You Need\n\n\n\n12\nab\nThe   dominant   sequence models.\n";
        let cleaned = clean_text(raw);
        assert_eq!(
            cleaned,
            "Attention Is All You Need\nThe dominant sequence models."
        );
    }

    #[test]
    fn test_extract_title_skips_header_lines() {
        let text = "arXiv:1706.03762v7 [cs.CL]\n\
                    Attention Is All You Need\n\
                    Ashish Vaswani ashish@google.com\n\
                    Abstract";
        assert_eq!(extract_title(text), "Attention Is All You Need");
    }

    #[test]
    fn test_extract_title_fallbacks() {
        let sentences = "This line ends with a period.\nSo does this longer line here.";
        assert_eq!(extract_title(sentences), "This line ends with a period.");
        assert_eq!(extract_title("short\nlines\nonly"), UNTITLED);
    }

    #[test]
    fn test_arxiv_id_patterns() {
        assert_eq!(
            arxiv_id("https://arxiv.org/abs/1706.03762").as_deref(),
            Some("1706.03762")
        );
        assert_eq!(
            arxiv_id("https://arxiv.org/pdf/1706.03762v7.pdf").as_deref(),
            Some("1706.03762v7")
        );
        assert_eq!(arxiv_id("arXiv:2101.00001").as_deref(), Some("2101.00001"));
        assert_eq!(arxiv_id("https://example.com/paper"), None);
    }

    #[test]
    fn test_classify_url() {
        assert_eq!(
            classify_url("https://arxiv.org/abs/1706.03762").unwrap(),
            UrlTarget::Pdf("https://arxiv.org/pdf/1706.03762.pdf".to_string())
        );
        assert_eq!(
            classify_url("https://example.com/files/Paper.PDF").unwrap(),
            UrlTarget::Pdf("https://example.com/files/Paper.PDF".to_string())
        );
        assert_eq!(
            classify_url("https://example.com/blog").unwrap(),
            UrlTarget::Html("https://example.com/blog".to_string())
        );
        assert!(matches!(
            classify_url("https://arxiv.org/"),
            Err(ExtractError::ArxivId(_))
        ));
    }

    #[test]
    fn test_html_to_text() {
        let html = "<html><head><title> Sparse <b>Attention</b> </title>\
                    <style>body { color: red; }</style>\
                    <script type=\"text/javascript\">var x = 1;</script></head>\
                    <body><h1>Results</h1><p>Sparse   attention scales.</p></body></html>";
        let page = html_to_text(html).unwrap();
        assert_eq!(page.title, "Sparse Attention");
        assert!(page.text.contains("Results"));
        assert!(page.text.contains("Sparse attention scales."));
        assert!(!page.text.contains("var x"));
        assert!(!page.text.contains("color: red"));
    }

    #[test]
    fn test_html_without_title_or_text() {
        let page = html_to_text("<p>Just a paragraph of text.</p>").unwrap();
        assert_eq!(page.title, WEB_PAGE_TITLE);
        assert!(matches!(
            html_to_text("<script>only()</script>"),
            Err(ExtractError::Empty)
        ));
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        assert!(matches!(
            extract_pdf(b"not a valid pdf"),
            Err(ExtractError::Pdf(_))
        ));
    }

    #[tokio::test]
    async fn test_pdf_task_reports_panic_as_pdf_error() {
        let err = pdf_task(|| panic!("broken font table")).await.unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(ref msg) if msg.contains("extraction aborted")));

        assert!(matches!(
            extract_pdf_task(b"not a valid pdf".to_vec()).await,
            Err(ExtractError::Pdf(_))
        ));
    }

    #[test]
    fn test_extract_plain_rejects_blank() {
        assert!(matches!(extract_plain("\n 1 \n ab \n"), Err(ExtractError::Empty)));
        let doc = extract_plain("Graph Neural Networks for Chemistry\nWe study graphs.").unwrap();
        assert_eq!(doc.title, "Graph Neural Networks for Chemistry");
    }

    #[tokio::test]
    async fn test_fetch_url_html_and_status_errors() {
        use axum::{http::StatusCode, routing::get, Router};

        let app = Router::new()
            .route(
                "/page",
                get(|| async {
                    axum::response::Html(
                        "<title>Local Page</title><p>Retrieval augmented generation.</p>",
                    )
                }),
            )
            .route("/gone", get(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = http_client().unwrap();
        let page = fetch_url(&client, &format!("http://{}/page", addr))
            .await
            .unwrap();
        assert_eq!(page.title, "Local Page");
        assert_eq!(page.text, "Local PageRetrieval augmented generation.");

        let err = fetch_url(&client, &format!("http://{}/gone", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Fetch { .. }));
        assert!(err.to_string().contains("404"));
    }
}
