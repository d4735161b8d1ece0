//! Paper formats and CSS length conversion for PDF output.
//!
//! The DevTools `printToPDF` call takes paper size and margins in inches, while
//! requests carry a format name and CSS lengths. Everything here is pure.

use crate::{Error, Margins, Result};

const PX_PER_INCH: f64 = 96.0;

/// Paper dimensions in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width: f64,
    pub height: f64,
}

/// Margins in inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginsInches {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

const FORMATS: &[(&str, PaperSize)] = &[
    ("letter", PaperSize { width: 8.5, height: 11.0 }),
    ("legal", PaperSize { width: 8.5, height: 14.0 }),
    ("tabloid", PaperSize { width: 11.0, height: 17.0 }),
    ("ledger", PaperSize { width: 17.0, height: 11.0 }),
    ("a0", PaperSize { width: 33.1, height: 46.8 }),
    ("a1", PaperSize { width: 23.4, height: 33.1 }),
    ("a2", PaperSize { width: 16.54, height: 23.4 }),
    ("a3", PaperSize { width: 11.7, height: 16.54 }),
    ("a4", PaperSize { width: 8.27, height: 11.7 }),
    ("a5", PaperSize { width: 5.83, height: 8.27 }),
    ("a6", PaperSize { width: 4.13, height: 5.83 }),
];

/// Look up a paper format by name (case-insensitive).
pub fn paper_size(format: &str) -> Result<PaperSize> {
    let wanted = format.trim().to_ascii_lowercase();
    FORMATS
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, size)| *size)
        .ok_or_else(|| Error::Config(format!("Unknown paper format: {}", format)))
}

/// Convert a CSS length (`px`, `in`, `cm`, `mm`, or a bare pixel count) to inches.
pub fn length_to_inches(length: &str) -> Result<f64> {
    let text = length.trim().to_ascii_lowercase();
    let (number, px_per_unit) = match text.get(text.len().saturating_sub(2)..) {
        Some("px") => (&text[..text.len() - 2], 1.0),
        Some("in") => (&text[..text.len() - 2], PX_PER_INCH),
        Some("cm") => (&text[..text.len() - 2], 37.8),
        Some("mm") => (&text[..text.len() - 2], 3.78),
        _ => (text.as_str(), 1.0),
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid length: {}", length)))?;
    if !value.is_finite() || value < 0.0 {
        return Err(Error::Config(format!("Invalid length: {}", length)));
    }
    Ok(value * px_per_unit / PX_PER_INCH)
}

impl MarginsInches {
    pub fn from_css(margins: &Margins) -> Result<Self> {
        Ok(Self {
            top: length_to_inches(&margins.top)?,
            right: length_to_inches(&margins.right)?,
            bottom: length_to_inches(&margins.bottom)?,
            left: length_to_inches(&margins.left)?,
        })
    }
}
