//! In-process fake rendering engine shared by the integration tests.
#![allow(dead_code)]

use pagecharm::engine::{
    ImageFormat, LaunchSettings, Launcher, PageContext, PdfOptions, Rect, RenderingSession,
    ScreenshotOptions, WaitForSelector, WaitUntil,
};
use pagecharm::{Error, Result, Viewport};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the fake page behaves
#[derive(Debug, Clone)]
pub struct Script {
    pub launch_fails: bool,
    /// Time the fake browser takes to start
    pub launch_delay: Option<Duration>,
    pub page_fails: bool,
    /// Navigation never settles, so it times out
    pub unreachable: bool,
    /// Selectors that exist and are visible on the fake page
    pub visible: Vec<String>,
    /// Bounding box reported for any visible selector
    pub bounding_box: Option<Rect>,
    pub screenshot_fails: bool,
    pub pdf_fails: bool,
    pub close_fails: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            launch_fails: false,
            launch_delay: None,
            page_fails: false,
            unreachable: false,
            visible: vec!["body".to_string()],
            bounding_box: Some(body_box()),
            screenshot_fails: false,
            pdf_fails: false,
            close_fails: false,
        }
    }
}

pub fn body_box() -> Rect {
    Rect {
        x: 8.0,
        y: 8.0,
        width: 1184.0,
        height: 120.0,
    }
}

/// Everything the orchestrator asked the fake to do
#[derive(Debug, Default)]
pub struct Calls {
    pub launches: Vec<LaunchSettings>,
    pub pages: usize,
    pub closes: usize,
    pub navigation_timeout: Option<Duration>,
    pub viewports: Vec<Viewport>,
    pub gotos: Vec<(String, Vec<WaitUntil>)>,
    pub readiness_waits: Vec<(String, WaitForSelector)>,
    pub bounding_boxes: Vec<String>,
    pub screenshots: Vec<ScreenshotOptions>,
    pub pdfs: Vec<PdfOptions>,
}

#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub script: Script,
    pub calls: Arc<Mutex<Calls>>,
}

impl FakeLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap()
    }
}

pub struct FakeSession {
    script: Script,
    calls: Arc<Mutex<Calls>>,
}

pub struct FakePage {
    script: Script,
    calls: Arc<Mutex<Calls>>,
    navigation_timeout: Duration,
}

impl Launcher for FakeLauncher {
    type Session = FakeSession;

    fn launch(&self, settings: &LaunchSettings) -> Result<FakeSession> {
        self.calls.lock().unwrap().launches.push(settings.clone());
        if let Some(delay) = self.script.launch_delay {
            std::thread::sleep(delay);
        }
        if self.script.launch_fails {
            return Err(Error::Launch("no browser binary found".into()));
        }
        Ok(FakeSession {
            script: self.script.clone(),
            calls: self.calls.clone(),
        })
    }
}

impl RenderingSession for FakeSession {
    type Page = FakePage;

    fn new_page(&mut self) -> Result<FakePage> {
        self.calls.lock().unwrap().pages += 1;
        if self.script.page_fails {
            return Err(Error::Launch("Failed to open a page: target closed".into()));
        }
        Ok(FakePage {
            script: self.script.clone(),
            calls: self.calls.clone(),
            navigation_timeout: Duration::from_secs(30),
        })
    }

    fn close(self) -> Result<()> {
        self.calls.lock().unwrap().closes += 1;
        if self.script.close_fails {
            return Err(Error::Other("browser refused to exit".into()));
        }
        Ok(())
    }
}

/// Deterministic artifact bytes derived from what was asked for
fn fake_artifact(magic: &[u8], description: String) -> Vec<u8> {
    let mut bytes = magic.to_vec();
    bytes.extend_from_slice(description.as_bytes());
    bytes
}

pub const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
pub const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF";
pub const PDF_MAGIC: &[u8] = b"%PDF-1.4";

impl PageContext for FakePage {
    fn set_navigation_timeout(&mut self, timeout: Duration) {
        self.navigation_timeout = timeout;
        self.calls.lock().unwrap().navigation_timeout = Some(timeout);
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.calls.lock().unwrap().viewports.push(viewport);
        Ok(())
    }

    fn goto(&mut self, location: &str, wait_until: &[WaitUntil]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .gotos
            .push((location.to_string(), wait_until.to_vec()));
        if self.script.unreachable {
            return Err(Error::NavigationTimeout(self.navigation_timeout.as_millis() as u64));
        }
        Ok(())
    }

    fn wait_for_selector(&mut self, selector: &str, opts: WaitForSelector) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .readiness_waits
            .push((selector.to_string(), opts));
        if self.script.visible.iter().any(|s| s == selector) {
            Ok(())
        } else {
            Err(Error::ReadinessTimeout {
                selector: selector.to_string(),
                timeout_ms: opts.timeout.as_millis() as u64,
            })
        }
    }

    fn bounding_box(&mut self, selector: &str) -> Result<Option<Rect>> {
        self.calls.lock().unwrap().bounding_boxes.push(selector.to_string());
        if !self.script.visible.iter().any(|s| s == selector) {
            return Err(Error::ArtifactProduction(format!("No element matches `{}`", selector)));
        }
        Ok(self.script.bounding_box)
    }

    fn screenshot(&mut self, opts: &ScreenshotOptions) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().screenshots.push(opts.clone());
        if self.script.screenshot_fails {
            return Err(Error::ArtifactProduction("Screenshot failed: target crashed".into()));
        }
        let magic = match opts.format {
            ImageFormat::Png => PNG_MAGIC,
            ImageFormat::Jpeg => JPEG_MAGIC,
        };
        Ok(fake_artifact(magic, format!("{:?}", opts)))
    }

    fn render_pdf(&mut self, opts: &PdfOptions) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().pdfs.push(opts.clone());
        if self.script.pdf_fails {
            return Err(Error::ArtifactProduction("PDF rendering failed".into()));
        }
        Ok(fake_artifact(PDF_MAGIC, format!("{:?}", opts)))
    }
}
