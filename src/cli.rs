//! Command-line adapter: turns arguments into a [`CaptureRequest`] and maps
//! outcomes to exit codes.

use crate::engine::Launcher;
use crate::{
    ArtifactKind, CaptureOrchestrator, CaptureRequest, Margins, OutputTarget, Result, Source, Viewport,
    DEFAULT_SELECTOR, DEFAULT_TIMEOUT_MS,
};
use clap::{ArgAction, CommandFactory, Parser};
use log::error;
use std::io::Write;
use std::path::PathBuf;

/// Exit status for a completed capture
pub const EXIT_OK: u8 = 0;
/// Exit status for usage errors and failed captures
pub const EXIT_FAILURE: u8 = 1;

/// Capture a web page or local document as an image or PDF
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pagecharm",
    version,
    about = "Capture a web page or local document as a PNG, JPEG or PDF",
    disable_help_flag = true,
    after_help = "ENVIRONMENT VARIABLES:\n\
        RUST_LOG    Log filter (overrides -v), logs go to stderr"
)]
pub struct Args {
    /// File pathname to navigate to
    #[arg(value_name = "FILE")]
    pub file_arg: Option<PathBuf>,

    /// File pathname to navigate to
    #[arg(short, long = "file", value_name = "FILE", conflicts_with = "file_arg")]
    pub file: Option<PathBuf>,

    /// URL to navigate to, including the scheme (e.g. https://)
    #[arg(short, long)]
    pub url: Option<String>,

    /// File to save the capture to; `-` or nothing writes to stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output type: png, jpeg (or jpg) or pdf
    #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "png")]
    pub kind: ArtifactKind,

    /// CSS selector of the element to wait for (and to clip images to)
    #[arg(short, long, default_value = DEFAULT_SELECTOR)]
    pub selector: String,

    /// Viewport width in pixels
    #[arg(short, long, default_value_t = 1200)]
    pub width: u32,

    /// Viewport height in pixels
    #[arg(short = 'h', long, default_value_t = 600)]
    pub height: u32,

    /// Maximum time to wait for navigation and for the selector, in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout: u64,

    /// JPEG quality between 0 and 100 (ignored for png)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: Option<u8>,

    /// Capture the full scrollable page instead of the selected element
    #[arg(long = "full-page", alias = "fullPage")]
    pub full_page: bool,

    /// PDF paper format: Letter, Legal, Tabloid, Ledger, A0-A6
    #[arg(long, default_value = "Letter")]
    pub format: String,

    /// PDF top margin
    #[arg(long, default_value = "6.25mm")]
    pub margin_top: String,

    /// PDF right margin
    #[arg(long, default_value = "6.25mm")]
    pub margin_right: String,

    /// PDF bottom margin
    #[arg(long, default_value = "14.11mm")]
    pub margin_bottom: String,

    /// PDF left margin
    #[arg(long, default_value = "6.25mm")]
    pub margin_left: String,

    /// Show the browser window
    #[arg(long = "no-headless", alias = "noheadless")]
    pub no_headless: bool,

    /// Disable the browser sandbox and setuid sandbox
    #[arg(long = "no-sandbox", alias = "nosandbox")]
    pub no_sandbox: bool,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Print this help
    #[arg(short = '?', long, action = ArgAction::SetTrue)]
    pub help: bool,
}

impl Args {
    /// Build the capture request. Fails when neither a file nor a URL was given.
    pub fn into_request(self) -> Result<CaptureRequest> {
        let file = self.file.as_deref().or(self.file_arg.as_deref());
        let source = Source::from_parts(file, self.url.as_deref())?;

        Ok(CaptureRequest {
            source,
            output: OutputTarget::from_arg(self.output.as_deref()),
            kind: self.kind,
            viewport: Viewport {
                width: self.width,
                height: self.height,
            },
            selector: self.selector,
            navigation_timeout_ms: self.timeout,
            readiness_timeout_ms: self.timeout,
            quality: self.quality,
            full_page: self.full_page,
            page_format: self.format,
            margins: Margins {
                top: self.margin_top,
                right: self.margin_right,
                bottom: self.margin_bottom,
                left: self.margin_left,
            },
            headless: !self.no_headless,
            sandboxed: !self.no_sandbox,
        })
    }

    /// Default log filter for the requested verbosity
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Rendered usage text
pub fn usage() -> String {
    Args::command().render_help().to_string()
}

/// Run the tool for already-parsed arguments and return the process exit status.
///
/// Usage problems and capture failures are reported on `stderr`.
pub fn run<L: Launcher, W: Write>(args: Args, launcher: L, stderr: &mut W) -> u8 {
    if args.help {
        let _ = write!(stderr, "{}", usage());
        return EXIT_FAILURE;
    }

    let request = match args.into_request() {
        Ok(request) => request,
        Err(e) => {
            let _ = writeln!(stderr, "{}", e);
            let _ = write!(stderr, "{}", usage());
            return EXIT_FAILURE;
        }
    };

    match CaptureOrchestrator::new(launcher).capture(&request) {
        Ok(_) => EXIT_OK,
        Err(e) => {
            error!("Capture failed: {}", e);
            let _ = writeln!(stderr, "Error: {}", e);
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pagecharm").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_request_defaults() {
        let req = parse(&["index.html"]).into_request().unwrap();
        let expected = CaptureRequest::new(Source::File("index.html".into()));
        assert_eq!(req.source, expected.source);
        assert_eq!(req.viewport, expected.viewport);
        assert_eq!(req.selector, expected.selector);
        assert_eq!(req.navigation_timeout_ms, expected.navigation_timeout_ms);
        assert_eq!(req.margins, expected.margins);
        assert_eq!(req.page_format, expected.page_format);
        assert_eq!(req.kind, ArtifactKind::Png);
        assert!(req.headless && req.sandboxed);
        // The command line streams to stdout when no output is given
        assert_eq!(req.output, OutputTarget::Stdout);
    }

    #[test]
    fn short_flags() {
        let req = parse(&[
            "-u", "https://example.com", "-o", "shot.jpg", "-t", "jpg", "-q", "50", "-w", "800", "-h", "400",
            "-s", "#main",
        ])
        .into_request()
        .unwrap();
        assert_eq!(req.source, Source::Url("https://example.com".into()));
        assert_eq!(req.output, OutputTarget::Path("shot.jpg".into()));
        assert_eq!(req.kind, ArtifactKind::Jpeg);
        assert_eq!(req.quality, Some(50));
        assert_eq!(req.viewport, Viewport { width: 800, height: 400 });
        assert_eq!(req.selector, "#main");
    }

    #[test]
    fn timeout_sets_both_budgets() {
        let req = parse(&["-f", "a.html", "--timeout", "1500"]).into_request().unwrap();
        assert_eq!(req.navigation_timeout_ms, 1500);
        assert_eq!(req.readiness_timeout_ms, 1500);
    }

    #[test]
    fn session_toggles() {
        let req = parse(&["a.html", "--no-headless", "--nosandbox"]).into_request().unwrap();
        assert!(!req.headless);
        assert!(!req.sandboxed);
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        assert!(Args::try_parse_from(["pagecharm", "a.html", "-q", "101"]).is_err());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(Args::try_parse_from(["pagecharm", "a.html", "-t", "gif"]).is_err());
    }

    #[test]
    fn missing_source_is_config_error() {
        let err = parse(&["-t", "pdf"]).into_request().unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        assert_eq!(err.to_string(), "Invalid configuration: No url or file provided.");
    }

    #[test]
    fn verbosity_filters() {
        assert_eq!(parse(&[]).log_filter(), "warn");
        assert_eq!(parse(&["-v"]).log_filter(), "info");
        assert_eq!(parse(&["-vvv"]).log_filter(), "debug");
    }

    #[test]
    fn usage_lists_options() {
        let text = usage();
        assert!(text.contains("--url"));
        assert!(text.contains("--full-page"));
        assert!(text.contains("--no-sandbox"));
    }
}
