//! Pagecharm
//!
//! Captures a web page or a local document as a PNG/JPEG image or a PDF by
//! driving a headless browser through exactly one launch, navigate, wait,
//! capture, teardown cycle.
//!
//! # Features
//!
//! - **CDP Backend** (default): Uses Chrome DevTools Protocol via headless Chrome
//! - **Swappable engine**: the orchestrator only talks to the traits in [`engine`]
//! - **Guaranteed teardown**: the browser is closed on every success and failure path
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "cdp")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pagecharm::{ArtifactKind, CaptureOrchestrator, CaptureRequest, OutputTarget, Source};
//! use pagecharm::cdp::ChromeLauncher;
//!
//! let mut request = CaptureRequest::new(Source::Url("https://example.com".into()));
//! request.kind = ArtifactKind::Pdf;
//! request.page_format = "A4".to_string();
//! request.output = OutputTarget::Path("example.pdf".into());
//!
//! CaptureOrchestrator::new(ChromeLauncher).capture(&request)?;
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "cdp"))]
//! # fn main() {}
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod error;
pub use error::{Error, Result};

pub mod engine;
pub mod paper;

pub mod capture;
pub use capture::CaptureOrchestrator;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async-friendly entry point (one worker thread per capture)
pub mod async_api;

pub mod cli;

/// Default selector waited for before capturing
pub const DEFAULT_SELECTOR: &str = "body";
/// Default budget, in milliseconds, for both navigation and readiness waiting
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Where the page to capture comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A remote (or any scheme-qualified) URL, used verbatim
    Url(String),
    /// A local file, converted to a `file://` locator before navigation
    File(PathBuf),
}

impl Source {
    /// Pick a source from the optional file and URL inputs.
    ///
    /// A non-empty URL wins over a file. Empty strings count as absent.
    pub fn from_parts(file: Option<&Path>, url: Option<&str>) -> Result<Self> {
        if let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) {
            return Ok(Source::Url(url.to_string()));
        }
        match file.filter(|f| !f.as_os_str().is_empty()) {
            Some(file) => Ok(Source::File(file.to_path_buf())),
            None => Err(Error::Config("No url or file provided.".into())),
        }
    }

    /// Resolve into a location the browser can navigate to.
    pub fn location(&self) -> Result<String> {
        match self {
            Source::Url(url) => Ok(url.clone()),
            Source::File(path) => {
                let absolute = if path.is_absolute() {
                    path.clone()
                } else {
                    std::env::current_dir()
                        .map_err(|e| Error::Config(format!("Cannot resolve {}: {}", path.display(), e)))?
                        .join(path)
                };
                url::Url::from_file_path(&absolute)
                    .map(String::from)
                    .map_err(|_| Error::Config(format!("Cannot build a file URL for {}", absolute.display())))
            }
        }
    }
}

/// Destination of the produced artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write the bytes to this file
    Path(PathBuf),
    /// Write the bytes to the process's standard output
    Stdout,
    /// Keep the bytes in memory and hand them back in the result
    Discard,
}

impl OutputTarget {
    /// Interpret a command-line output argument: `-` or nothing streams to stdout.
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("-") | Some("") => OutputTarget::Stdout,
            Some(path) => OutputTarget::Path(PathBuf::from(path)),
        }
    }
}

/// Kind of artifact to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactKind {
    #[default]
    Png,
    Jpeg,
    Pdf,
}

impl ArtifactKind {
    pub fn is_image(self) -> bool {
        !matches!(self, ArtifactKind::Pdf)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ArtifactKind::Png => "image/png",
            ArtifactKind::Jpeg => "image/jpeg",
            ArtifactKind::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Ok(ArtifactKind::Png),
            "jpeg" | "jpg" | "image/jpeg" | "image/jpg" => Ok(ArtifactKind::Jpeg),
            "pdf" | "document/pdf" | "application/pdf" => Ok(ArtifactKind::Pdf),
            other => Err(Error::Config(format!(
                "Unknown output type '{}', expected png, jpeg, jpg or pdf",
                other
            ))),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactKind::Png => "png",
            ArtifactKind::Jpeg => "jpeg",
            ArtifactKind::Pdf => "pdf",
        })
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

/// Page margins for document output, as CSS lengths (`6.25mm`, `0.5in`, `20px`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Margins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: "6.25mm".to_string(),
            right: "6.25mm".to_string(),
            bottom: "14.11mm".to_string(),
            left: "6.25mm".to_string(),
        }
    }
}

/// Everything one capture needs to know
///
/// Built once per invocation and never mutated while a capture is running.
/// `quality` and `full_page` only affect image output; `page_format` and
/// `margins` only affect PDF output.
///
/// # Examples
///
/// ```
/// use pagecharm::{CaptureRequest, Source};
///
/// let req = CaptureRequest::new(Source::File("index.html".into()));
/// assert_eq!(req.viewport.width, 1200);
/// assert_eq!(req.selector, "body");
/// ```
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub source: Source,
    pub output: OutputTarget,
    pub kind: ArtifactKind,
    pub viewport: Viewport,
    /// Selector of the element that must be present and visible before capturing
    pub selector: String,
    pub navigation_timeout_ms: u64,
    pub readiness_timeout_ms: u64,
    /// JPEG quality, 0-100
    pub quality: Option<u8>,
    /// Capture the whole scrollable page instead of the selected element
    pub full_page: bool,
    /// Paper format name (`Letter`, `A4`, ...)
    pub page_format: String,
    pub margins: Margins,
    pub headless: bool,
    /// When false, the browser's sandbox and setuid sandbox are disabled
    pub sandboxed: bool,
}

impl CaptureRequest {
    /// A request with every optional field at its default.
    pub fn new(source: Source) -> Self {
        Self {
            source,
            output: OutputTarget::Discard,
            kind: ArtifactKind::Png,
            viewport: Viewport::default(),
            selector: DEFAULT_SELECTOR.to_string(),
            navigation_timeout_ms: DEFAULT_TIMEOUT_MS,
            readiness_timeout_ms: DEFAULT_TIMEOUT_MS,
            quality: None,
            full_page: false,
            page_format: "Letter".to_string(),
            margins: Margins::default(),
            headless: true,
            sandboxed: true,
        }
    }
}

/// Outcome of a successful capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureResult {
    /// The sink was `Discard`; the artifact is returned here
    InMemory(Vec<u8>),
    /// The artifact was written to this file
    Written { path: PathBuf, len: usize },
    /// The artifact was written to standard output
    Streamed { len: usize },
}

impl CaptureResult {
    /// The artifact bytes, when they were kept in memory
    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            CaptureResult::InMemory(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Size of the produced artifact
    pub fn len(&self) -> usize {
        match self {
            CaptureResult::InMemory(bytes) => bytes.len(),
            CaptureResult::Written { len, .. } | CaptureResult::Streamed { len } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request() {
        let req = CaptureRequest::new(Source::Url("https://example.com".into()));
        assert_eq!(req.viewport, Viewport { width: 1200, height: 600 });
        assert_eq!(req.navigation_timeout_ms, 30000);
        assert_eq!(req.readiness_timeout_ms, 30000);
        assert_eq!(req.page_format, "Letter");
        assert_eq!(req.margins.bottom, "14.11mm");
        assert!(req.headless);
        assert!(req.sandboxed);
        assert!(!req.full_page);
        assert_eq!(req.output, OutputTarget::Discard);
    }

    #[test]
    fn url_takes_precedence_over_file() {
        let src = Source::from_parts(Some(Path::new("index.html")), Some("https://example.com")).unwrap();
        assert_eq!(src, Source::Url("https://example.com".into()));
    }

    #[test]
    fn empty_url_falls_back_to_file() {
        let src = Source::from_parts(Some(Path::new("index.html")), Some("")).unwrap();
        assert_eq!(src, Source::File("index.html".into()));
    }

    #[test]
    fn missing_source_is_config_error() {
        assert!(matches!(Source::from_parts(None, None), Err(Error::Config(_))));
        assert!(matches!(Source::from_parts(Some(Path::new("")), Some("  ")), Err(Error::Config(_))));
    }

    #[test]
    fn file_source_becomes_file_url() {
        let cwd = std::env::current_dir().unwrap();
        let loc = Source::File("index.html".into()).location().unwrap();
        assert!(loc.starts_with("file://"));
        assert!(loc.ends_with("/index.html"));
        let expected = url::Url::from_file_path(cwd.join("index.html")).unwrap();
        assert_eq!(loc, expected.as_str());
    }

    #[test]
    fn url_source_is_used_verbatim() {
        let loc = Source::Url("http://127.0.0.1:8080/a?b=c".into()).location().unwrap();
        assert_eq!(loc, "http://127.0.0.1:8080/a?b=c");
    }

    #[test]
    fn artifact_kind_aliases() {
        assert_eq!("jpg".parse::<ArtifactKind>().unwrap(), ArtifactKind::Jpeg);
        assert_eq!("JPEG".parse::<ArtifactKind>().unwrap(), ArtifactKind::Jpeg);
        assert_eq!("image/png".parse::<ArtifactKind>().unwrap(), ArtifactKind::Png);
        assert_eq!("document/pdf".parse::<ArtifactKind>().unwrap(), ArtifactKind::Pdf);
        assert!("gif".parse::<ArtifactKind>().is_err());
    }

    #[test]
    fn output_arg_mapping() {
        assert_eq!(OutputTarget::from_arg(Some("-")), OutputTarget::Stdout);
        assert_eq!(OutputTarget::from_arg(None), OutputTarget::Stdout);
        assert_eq!(
            OutputTarget::from_arg(Some("out.png")),
            OutputTarget::Path(PathBuf::from("out.png"))
        );
    }
}
