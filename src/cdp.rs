//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)

use crate::engine::{
    ImageFormat, LaunchSettings, Launcher, PageContext, PdfOptions, Rect, RenderingSession,
    ScreenshotOptions, WaitForSelector, WaitUntil, NETWORK_IDLE_QUIET,
};
use crate::{Error, Result, Viewport};
use base64::Engine as _;
use headless_chrome::browser::tab::{EventListener, Tab};
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Emulation, Network, Page};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(100);
const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(50);

// Every script returns a JSON string; CDP hands objects back by reference only.
const SELECTOR_STATE_JS: &str = r#"(function(selector, visible) {
    var element;
    try { element = document.querySelector(selector); }
    catch (e) { return JSON.stringify({ state: 'invalid', message: String(e) }); }
    if (!element) return JSON.stringify({ state: 'missing' });
    if (!visible) return JSON.stringify({ state: 'ready' });
    var style = window.getComputedStyle(element);
    var rect = element.getBoundingClientRect();
    var shown = !!style && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
    return JSON.stringify({ state: shown ? 'ready' : 'hidden' });
})"#;

const BOUNDING_BOX_JS: &str = r#"(function(selector) {
    var element = document.querySelector(selector);
    if (!element) return JSON.stringify({ found: false });
    var r = element.getBoundingClientRect();
    var rect = (r.width || r.height)
        ? { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height }
        : null;
    return JSON.stringify({ found: true, rect: rect });
})"#;

const PAGE_SIZE_JS: &str = "JSON.stringify({ \
     width: Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0), \
     height: Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0) })";

#[derive(Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
enum SelectorState {
    Ready,
    Missing,
    Hidden,
    Invalid { message: String },
}

#[derive(Deserialize)]
struct BoxReport {
    found: bool,
    rect: Option<Rect>,
}

#[derive(Deserialize)]
struct PageSize {
    width: f64,
    height: f64,
}

type NetworkListener = dyn EventListener<Event> + Send + Sync;

/// Requests the page has sent and not yet seen finish or fail
#[derive(Debug)]
struct InFlight {
    pending: HashSet<String>,
    /// When `pending` last became empty; `None` while requests are open
    idle_since: Option<Instant>,
}

impl InFlight {
    fn new(now: Instant) -> Self {
        Self {
            pending: HashSet::new(),
            idle_since: Some(now),
        }
    }

    fn started(&mut self, request_id: &str) {
        // Redirects reuse the id, so a set keeps them counted once.
        self.pending.insert(request_id.to_string());
        self.idle_since = None;
    }

    fn settled(&mut self, request_id: &str, now: Instant) {
        self.pending.remove(request_id);
        if self.pending.is_empty() && self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }

    fn is_idle(&self, now: Instant, quiet: Duration) -> bool {
        self.idle_since
            .map_or(false, |since| now.saturating_duration_since(since) >= quiet)
    }

    fn observe(&mut self, event: &Event) {
        match event {
            Event::NetworkRequestWillBeSent(e) => self.started(&e.params.request_id),
            Event::NetworkLoadingFinished(e) => self.settled(&e.params.request_id, Instant::now()),
            Event::NetworkLoadingFailed(e) => self.settled(&e.params.request_id, Instant::now()),
            _ => {}
        }
    }
}

/// A registered network listener feeding an [`InFlight`] tracker
struct NetworkWatch {
    in_flight: Arc<Mutex<InFlight>>,
    listener: Weak<NetworkListener>,
}

fn launch_options(settings: &LaunchSettings) -> Result<LaunchOptions<'static>> {
    // `sandbox(false)` already adds --no-sandbox and --disable-setuid-sandbox.
    LaunchOptions::default_builder()
        .headless(settings.headless)
        .sandbox(settings.sandboxed)
        .idle_browser_timeout(settings.idle_timeout)
        .build()
        .map_err(|e| Error::Launch(format!("Failed to build launch options: {}", e)))
}

/// Launches a local Chrome/Chromium through `headless_chrome`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

impl Launcher for ChromeLauncher {
    type Session = CdpSession;

    fn launch(&self, settings: &LaunchSettings) -> Result<CdpSession> {
        let launch_options = launch_options(settings)?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Launch(format!("Failed to launch browser: {}", e)))?;

        Ok(CdpSession { browser })
    }
}

/// A running Chrome instance
pub struct CdpSession {
    browser: Browser,
}

impl RenderingSession for CdpSession {
    type Page = CdpPage;

    fn new_page(&mut self) -> Result<CdpPage> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::Launch(format!("Failed to open a page: {}", e)))?;

        Ok(CdpPage {
            tab,
            navigation_timeout: Duration::from_millis(crate::DEFAULT_TIMEOUT_MS),
        })
    }

    fn close(self) -> Result<()> {
        // Dropping the browser terminates the child process.
        drop(self.browser);
        Ok(())
    }
}

/// A single tab
pub struct CdpPage {
    tab: Arc<Tab>,
    navigation_timeout: Duration,
}

impl CdpPage {
    fn eval_json<T: DeserializeOwned>(&self, expression: &str) -> anyhow::Result<T> {
        let object = self.tab.evaluate(expression, false)?;
        let text = object
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("script did not return a string"))?;
        Ok(serde_json::from_str(text)?)
    }

    /// Start counting in-flight requests. Must run before navigating.
    fn watch_network(&self) -> anyhow::Result<NetworkWatch> {
        self.tab.call_method(Network::Enable {
            max_total_buffer_size: None,
            max_resource_buffer_size: None,
            max_post_data_size: None,
            report_direct_socket_traffic: None,
            enable_durable_messages: None,
        })?;

        let in_flight = Arc::new(Mutex::new(InFlight::new(Instant::now())));
        let sink = Arc::clone(&in_flight);
        let listener: Arc<NetworkListener> = Arc::new(move |event: &Event| {
            if let Ok(mut in_flight) = sink.lock() {
                in_flight.observe(event);
            }
        });
        let listener = self.tab.add_event_listener(listener)?;

        Ok(NetworkWatch { in_flight, listener })
    }

    fn unwatch_network(&self, watch: NetworkWatch) {
        if let Err(e) = self.tab.remove_event_listener(&watch.listener) {
            debug!("Failed to remove network listener: {}", e);
        }
    }

    /// Wait until no request has been in flight for the quiet window.
    fn wait_for_network_idle(&self, watch: &NetworkWatch, deadline: Instant, timeout_ms: u64) -> Result<()> {
        loop {
            let now = Instant::now();
            let idle = watch
                .in_flight
                .lock()
                .map(|in_flight| in_flight.is_idle(now, NETWORK_IDLE_QUIET))
                .unwrap_or(false);
            if idle {
                return Ok(());
            }
            if now >= deadline {
                return Err(Error::NavigationTimeout(timeout_ms));
            }
            std::thread::sleep(NETWORK_POLL_INTERVAL.min(deadline.saturating_duration_since(now)));
        }
    }

    fn emulate_viewport(&self, width: u32, height: u32) -> anyhow::Result<()> {
        self.tab.call_method(Emulation::SetDeviceMetricsOverride {
            width,
            height,
            device_scale_factor: 1.0,
            mobile: false,
            scale: None,
            screen_width: None,
            screen_height: None,
            position_x: None,
            position_y: None,
            dont_set_visible_size: None,
            screen_orientation: None,
            viewport: None,
            display_feature: None,
            device_posture: None,
        })?;
        Ok(())
    }

    fn navigate(&self, location: &str, wait_until: &[WaitUntil], watch: Option<&NetworkWatch>) -> Result<()> {
        let budget = self.navigation_timeout;
        let started = Instant::now();

        self.tab
            .navigate_to(location)
            .map_err(|e| navigation_error(e, started, budget))?;

        if wait_until.contains(&WaitUntil::Load) {
            self.tab
                .wait_until_navigated()
                .map_err(|e| navigation_error(e, started, budget))?;
        }

        if let Some(watch) = watch {
            self.wait_for_network_idle(watch, started + budget, budget.as_millis() as u64)?;
        }

        debug!("Navigation to {} settled after {:?}", location, started.elapsed());
        Ok(())
    }
}

fn navigation_error(err: anyhow::Error, started: Instant, budget: Duration) -> Error {
    if started.elapsed() >= budget {
        Error::NavigationTimeout(budget.as_millis() as u64)
    } else {
        Error::Navigation(err.to_string())
    }
}

impl PageContext for CdpPage {
    fn set_navigation_timeout(&mut self, timeout: Duration) {
        self.navigation_timeout = timeout;
        self.tab.set_default_timeout(timeout);
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.emulate_viewport(viewport.width, viewport.height)
            .map_err(|e| Error::ArtifactProduction(format!("Failed to set viewport: {}", e)))
    }

    fn goto(&mut self, location: &str, wait_until: &[WaitUntil]) -> Result<()> {
        let watch = if wait_until.contains(&WaitUntil::NetworkIdle) {
            let watch = self
                .watch_network()
                .map_err(|e| Error::Navigation(format!("Cannot observe network activity: {}", e)))?;
            Some(watch)
        } else {
            None
        };

        let outcome = self.navigate(location, wait_until, watch.as_ref());
        if let Some(watch) = watch {
            self.unwatch_network(watch);
        }
        outcome
    }

    fn wait_for_selector(&mut self, selector: &str, opts: WaitForSelector) -> Result<()> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| Error::ArtifactProduction(format!("Cannot quote selector: {}", e)))?;
        let expression = format!("{}({}, {})", SELECTOR_STATE_JS, quoted, opts.visible);
        let deadline = Instant::now() + opts.timeout;

        loop {
            match self.eval_json::<SelectorState>(&expression) {
                Ok(SelectorState::Ready) => return Ok(()),
                Ok(SelectorState::Invalid { message }) => {
                    return Err(Error::ArtifactProduction(format!(
                        "Invalid selector `{}`: {}",
                        selector, message
                    )))
                }
                Ok(SelectorState::Missing) | Ok(SelectorState::Hidden) => {}
                Err(e) => debug!("Selector check failed: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::ReadinessTimeout {
                    selector: selector.to_string(),
                    timeout_ms: opts.timeout.as_millis() as u64,
                });
            }
            std::thread::sleep(SELECTOR_POLL_INTERVAL.min(deadline - now));
        }
    }

    fn bounding_box(&mut self, selector: &str) -> Result<Option<Rect>> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| Error::ArtifactProduction(format!("Cannot quote selector: {}", e)))?;
        let report: BoxReport = self
            .eval_json(&format!("{}({})", BOUNDING_BOX_JS, quoted))
            .map_err(|e| Error::ArtifactProduction(format!("Failed to measure `{}`: {}", selector, e)))?;

        if !report.found {
            return Err(Error::ArtifactProduction(format!("No element matches `{}`", selector)));
        }
        Ok(report.rect)
    }

    fn screenshot(&mut self, opts: &ScreenshotOptions) -> Result<Vec<u8>> {
        let format = match opts.format {
            ImageFormat::Png => Page::CaptureScreenshotFormatOption::Png,
            ImageFormat::Jpeg => Page::CaptureScreenshotFormatOption::Jpeg,
        };

        let region = if opts.full_page {
            let size: PageSize = self
                .eval_json(PAGE_SIZE_JS)
                .map_err(|e| Error::ArtifactProduction(format!("Failed to measure page: {}", e)))?;
            Some(Rect {
                x: 0.0,
                y: 0.0,
                width: size.width.ceil(),
                height: size.height.ceil(),
            })
        } else {
            opts.clip
        };

        let clip = region.map(|r| Page::Viewport {
            x: r.x,
            y: r.y,
            width: r.width,
            height: r.height,
            scale: 1.0,
        });
        // Without this Chrome crops clips to the visible viewport.
        let capture_beyond_viewport = clip.is_some();

        let data = self
            .tab
            .call_method(Page::CaptureScreenshot {
                format: Some(format),
                quality: opts.quality.map(u32::from),
                clip,
                from_surface: Some(true),
                capture_beyond_viewport: Some(capture_beyond_viewport),
                optimize_for_speed: None,
            })
            .map_err(|e| Error::ArtifactProduction(format!("Screenshot failed: {}", e)))?
            .data;

        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| Error::ArtifactProduction(format!("Screenshot payload is not base64: {}", e)))
    }

    fn render_pdf(&mut self, opts: &PdfOptions) -> Result<Vec<u8>> {
        let options = PrintToPdfOptions {
            paper_width: Some(opts.paper.width),
            paper_height: Some(opts.paper.height),
            margin_top: Some(opts.margins.top),
            margin_right: Some(opts.margins.right),
            margin_bottom: Some(opts.margins.bottom),
            margin_left: Some(opts.margins.left),
            ..Default::default()
        };

        self.tab
            .print_to_pdf(Some(options))
            .map_err(|e| Error::ArtifactProduction(format!("PDF rendering failed: {}", e)))
    }
}
