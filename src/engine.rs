//! The rendering-engine capability the orchestrator drives.
//!
//! A [`Launcher`] starts one browser process and hands back a
//! [`RenderingSession`]; the session opens [`PageContext`]s. Backends (see
//! `cdp`) implement these traits, tests implement them with in-process fakes.

use crate::paper::{MarginsInches, PaperSize};
use crate::{ArtifactKind, Result, Viewport};
use std::time::Duration;

/// Options applied when starting the rendering environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub headless: bool,
    /// When false, both the sandbox and the setuid sandbox are disabled
    pub sandboxed: bool,
    /// How long the backend may go without hearing from the browser before giving up
    pub idle_timeout: Duration,
}

/// Condition a navigation must reach before it counts as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The `load` event fired
    Load,
    /// No request in flight for a short quiet period
    NetworkIdle,
}

/// Quiet window used for [`WaitUntil::NetworkIdle`]
pub const NETWORK_IDLE_QUIET: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitForSelector {
    pub visible: bool,
    pub timeout: Duration,
}

/// A rectangle in CSS pixels, in document coordinates
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Image encoding requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_kind(kind: ArtifactKind) -> Option<Self> {
        match kind {
            ArtifactKind::Png => Some(ImageFormat::Png),
            ArtifactKind::Jpeg => Some(ImageFormat::Jpeg),
            ArtifactKind::Pdf => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotOptions {
    pub format: ImageFormat,
    /// Only ever set for JPEG
    pub quality: Option<u8>,
    pub full_page: bool,
    /// Region to rasterize; `None` means the viewport (or the whole page when `full_page`)
    pub clip: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper: PaperSize,
    pub margins: MarginsInches,
}

/// Starts rendering environments
pub trait Launcher {
    type Session: RenderingSession;

    /// Start one rendering environment. Failure here is fatal for the capture.
    fn launch(&self, settings: &LaunchSettings) -> Result<Self::Session>;
}

/// A live rendering environment
pub trait RenderingSession {
    type Page: PageContext;

    /// Open a page/document context
    fn new_page(&mut self) -> Result<Self::Page>;

    /// Tear the environment down. Consumes the session so it cannot be reused.
    fn close(self) -> Result<()>;
}

/// One page inside a rendering session
pub trait PageContext {
    fn set_navigation_timeout(&mut self, timeout: Duration);

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Load `location` and block until every condition in `wait_until` holds
    fn goto(&mut self, location: &str, wait_until: &[WaitUntil]) -> Result<()>;

    /// Block until `selector` matches an element (a visible one when `opts.visible`)
    fn wait_for_selector(&mut self, selector: &str, opts: WaitForSelector) -> Result<()>;

    /// Bounding box of the first element matching `selector`.
    ///
    /// `Ok(None)` when the element exists but has no layout box.
    fn bounding_box(&mut self, selector: &str) -> Result<Option<Rect>>;

    fn screenshot(&mut self, opts: &ScreenshotOptions) -> Result<Vec<u8>>;

    fn render_pdf(&mut self, opts: &PdfOptions) -> Result<Vec<u8>>;
}
