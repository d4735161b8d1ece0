//! Capture orchestration: one launch, one page, one artifact, one teardown.

use crate::engine::{
    ImageFormat, LaunchSettings, Launcher, PageContext, PdfOptions, RenderingSession,
    ScreenshotOptions, WaitForSelector, WaitUntil,
};
use crate::paper::{paper_size, MarginsInches};
use crate::{CaptureRequest, CaptureResult, Error, OutputTarget, Result};
use log::{debug, info, warn};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Slack added on top of the longest phase budget for the backend's idle watchdog
const IDLE_SLACK: Duration = Duration::from_secs(10);

/// Drives a single capture against whatever engine `L` launches.
///
/// Every call launches a fresh rendering session and closes it before
/// returning, whether the capture succeeded or not. Sessions are never
/// pooled or reused.
pub struct CaptureOrchestrator<L> {
    launcher: L,
}

/// What to ask the engine for once the page is ready
#[derive(Debug, Clone, PartialEq)]
enum ArtifactPlan {
    Image {
        format: ImageFormat,
        quality: Option<u8>,
    },
    Pdf(PdfOptions),
}

impl ArtifactPlan {
    fn resolve(request: &CaptureRequest) -> Result<Self> {
        if let Some(q) = request.quality {
            if q > 100 {
                return Err(Error::Config(format!("Quality must be between 0 and 100, got {}", q)));
            }
        }
        match ImageFormat::from_kind(request.kind) {
            Some(format) => Ok(ArtifactPlan::Image {
                format,
                quality: match format {
                    ImageFormat::Jpeg => request.quality,
                    ImageFormat::Png => None,
                },
            }),
            None => Ok(ArtifactPlan::Pdf(PdfOptions {
                paper: paper_size(&request.page_format)?,
                margins: MarginsInches::from_css(&request.margins)?,
            })),
        }
    }
}

fn launch_settings(request: &CaptureRequest) -> LaunchSettings {
    let longest = request.navigation_timeout_ms.max(request.readiness_timeout_ms);
    LaunchSettings {
        headless: request.headless,
        sandboxed: request.sandboxed,
        idle_timeout: Duration::from_millis(longest) + IDLE_SLACK,
    }
}

impl<L: Launcher> CaptureOrchestrator<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Capture `request`, streaming to the process's stdout when the sink asks for it.
    ///
    /// Stdout is locked only while the artifact is written to it.
    pub fn capture(&self, request: &CaptureRequest) -> Result<CaptureResult> {
        self.capture_with(request, || std::io::stdout().lock())
    }

    /// Capture `request`, using `stdout` as the standard output stream.
    pub fn capture_to<W: Write>(&self, request: &CaptureRequest, stdout: &mut W) -> Result<CaptureResult> {
        self.capture_with(request, || stdout)
    }

    /// `open_stdout` is called at most once, and only for [`OutputTarget::Stdout`].
    fn capture_with<W, F>(&self, request: &CaptureRequest, open_stdout: F) -> Result<CaptureResult>
    where
        W: Write,
        F: FnOnce() -> W,
    {
        // Everything that can be rejected without a browser is rejected here.
        let plan = ArtifactPlan::resolve(request)?;
        let location = request.source.location()?;
        let settings = launch_settings(request);

        info!(
            "Launching browser (headless: {}, sandboxed: {})",
            settings.headless, settings.sandboxed
        );
        let mut session = self.launcher.launch(&settings).map_err(|e| match e {
            Error::Launch(_) => e,
            other => Error::Launch(other.to_string()),
        })?;

        let outcome = run_session(&mut session, request, &plan, &location, open_stdout);

        debug!("Closing browser");
        match (outcome, session.close()) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(result), Err(teardown)) => {
                warn!("Browser teardown failed after a successful capture: {}", teardown);
                Ok(result)
            }
            (Err(primary), Ok(())) => Err(primary),
            (Err(primary), Err(teardown)) => {
                warn!("Browser teardown failed while handling '{}': {}", primary, teardown);
                Err(primary)
            }
        }
    }
}

fn run_session<S: RenderingSession, W: Write>(
    session: &mut S,
    request: &CaptureRequest,
    plan: &ArtifactPlan,
    location: &str,
    open_stdout: impl FnOnce() -> W,
) -> Result<CaptureResult> {
    let mut page = session.new_page()?;
    page.set_navigation_timeout(Duration::from_millis(request.navigation_timeout_ms));
    page.set_viewport(request.viewport)?;

    info!("Navigating to {}", location);
    page.goto(location, &[WaitUntil::Load, WaitUntil::NetworkIdle])?;

    debug!("Waiting for `{}` to become visible", request.selector);
    page.wait_for_selector(
        &request.selector,
        WaitForSelector {
            visible: true,
            timeout: Duration::from_millis(request.readiness_timeout_ms),
        },
    )?;

    let bytes = produce(&mut page, request, plan)?;
    if bytes.is_empty() {
        return Err(Error::ArtifactProduction("engine returned an empty artifact".into()));
    }
    info!("Produced {} ({} bytes)", request.kind.mime_type(), bytes.len());

    deliver(&request.output, bytes, open_stdout)
}

fn produce<P: PageContext>(page: &mut P, request: &CaptureRequest, plan: &ArtifactPlan) -> Result<Vec<u8>> {
    match plan {
        ArtifactPlan::Pdf(opts) => page.render_pdf(opts),
        ArtifactPlan::Image { format, quality } => {
            let clip = if request.full_page {
                None
            } else {
                match page.bounding_box(&request.selector)? {
                    Some(rect) if rect.has_area() => Some(rect),
                    _ => {
                        debug!("`{}` has no layout box, capturing the viewport", request.selector);
                        None
                    }
                }
            };
            page.screenshot(&ScreenshotOptions {
                format: *format,
                quality: *quality,
                full_page: request.full_page,
                clip,
            })
        }
    }
}

fn deliver<W: Write>(
    output: &OutputTarget,
    bytes: Vec<u8>,
    open_stdout: impl FnOnce() -> W,
) -> Result<CaptureResult> {
    match output {
        OutputTarget::Discard => Ok(CaptureResult::InMemory(bytes)),
        OutputTarget::Path(path) => {
            write_file(path, &bytes)?;
            Ok(CaptureResult::Written {
                path: path.clone(),
                len: bytes.len(),
            })
        }
        OutputTarget::Stdout => {
            let mut stdout = open_stdout();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .map_err(|source| Error::OutputWrite {
                    target: "stdout".to_string(),
                    source,
                })?;
            Ok(CaptureResult::Streamed { len: bytes.len() })
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).map_err(|source| {
        // A truncated file is not a valid artifact
        let _ = std::fs::remove_file(path);
        Error::OutputWrite {
            target: path.display().to_string(),
            source,
        }
    })
}
