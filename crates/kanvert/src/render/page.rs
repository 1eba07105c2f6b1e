//! Page geometry for HTML to PDF rendering.
//!
//! Request options describing paper size, orientation, and margins are turned
//! into a CSS `@page` rule, which both Chromium and WeasyPrint honour.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Options;
use crate::{KanvertError, Result};

const PAGE_SIZES: [&str; 5] = ["A3", "A4", "A5", "Letter", "Legal"];

static CSS_LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d*)?|\.\d+)\s*(cm|mm|in|px)?$").expect("CSS length regex pattern is valid and should compile")
});

/// Parse a CSS length (`2cm`, `15mm`, `1in`, `96px`, or bare inches) to inches.
pub fn parse_margin(value: &str) -> Result<f64> {
    let value = value.trim();
    let invalid = || KanvertError::validation(format!("Invalid margin value '{}'", value));

    let captures = CSS_LENGTH.captures(value).ok_or_else(invalid)?;
    let number: f64 = captures[1].parse().map_err(|_| invalid())?;
    let divisor = match captures.get(2).map(|unit| unit.as_str()) {
        Some("cm") => 2.54,
        Some("mm") => 25.4,
        Some("px") => 96.0,
        _ => 1.0,
    };

    Ok(number / divisor)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: String,
    pub bottom: String,
    pub left: String,
    pub right: String,
}

impl Margins {
    pub fn uniform(value: &str) -> Self {
        Self {
            top: value.to_string(),
            bottom: value.to_string(),
            left: value.to_string(),
            right: value.to_string(),
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform("1cm")
    }
}

/// Page setup requested for a rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    pub page_size: String,
    /// Explicit page width and height; override `page_size` when both are set.
    pub dimensions: Option<(String, String)>,
    pub landscape: bool,
    pub margins: Margins,
    pub print_background: bool,
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            dimensions: None,
            landscape: false,
            margins: Margins::default(),
            print_background: true,
        }
    }
}

impl PageSetup {
    /// Read page options from a request, falling back to `defaults`.
    ///
    /// Recognised keys: `page_size`, `page_width`, `page_height`, `landscape`,
    /// `orientation` (`"landscape"`), `margins` (object with `top`, `bottom`,
    /// `left`, `right`), `print_background`.
    pub fn from_options(options: &Options, defaults: &PageSetup) -> Result<Self> {
        let mut setup = defaults.clone();

        if let Some(size) = options.get("page_size").and_then(|v| v.as_str()) {
            let known = PAGE_SIZES.iter().find(|s| s.eq_ignore_ascii_case(size)).ok_or_else(|| {
                KanvertError::validation(format!(
                    "Unsupported page size '{}', expected one of {}",
                    size,
                    PAGE_SIZES.join(", ")
                ))
            })?;
            setup.page_size = known.to_string();
        }

        let width = options.get("page_width").and_then(length_value);
        let height = options.get("page_height").and_then(length_value);
        if let (Some(width), Some(height)) = (width, height) {
            parse_margin(&width)?;
            parse_margin(&height)?;
            setup.dimensions = Some((width, height));
        }

        if let Some(landscape) = options.get("landscape").and_then(|v| v.as_bool()) {
            setup.landscape = landscape;
        } else if let Some(orientation) = options.get("orientation").and_then(|v| v.as_str()) {
            setup.landscape = orientation.eq_ignore_ascii_case("landscape");
        }

        if let Some(margins) = options.get("margins").and_then(|v| v.as_object()) {
            let side = |key: &str, current: &str| -> Result<String> {
                match margins.get(key).and_then(length_value) {
                    Some(value) => {
                        parse_margin(&value)?;
                        Ok(value)
                    }
                    None => Ok(current.to_string()),
                }
            };
            setup.margins = Margins {
                top: side("top", &setup.margins.top)?,
                bottom: side("bottom", &setup.margins.bottom)?,
                left: side("left", &setup.margins.left)?,
                right: side("right", &setup.margins.right)?,
            };
        }

        if let Some(background) = options.get("print_background").and_then(|v| v.as_bool()) {
            setup.print_background = background;
        }

        Ok(setup)
    }

    /// CSS `@page` rule with margins normalised to inches.
    pub fn to_css(&self) -> Result<String> {
        let size = match &self.dimensions {
            Some((width, height)) => format!("{:.3}in {:.3}in", parse_margin(width)?, parse_margin(height)?),
            None if self.landscape => format!("{} landscape", self.page_size),
            None => self.page_size.clone(),
        };

        let mut css = format!(
            "@page {{ size: {}; margin: {:.3}in {:.3}in {:.3}in {:.3}in; }}",
            size,
            parse_margin(&self.margins.top)?,
            parse_margin(&self.margins.right)?,
            parse_margin(&self.margins.bottom)?,
            parse_margin(&self.margins.left)?,
        );

        if self.print_background {
            css.push_str(" html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }");
        }

        Ok(css)
    }
}

/// Lengths may be given as strings (`"2cm"`) or bare numbers (inches).
fn length_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: serde_json::Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_margin_units() {
        assert!((parse_margin("2.54cm").unwrap() - 1.0).abs() < 1e-9);
        assert!((parse_margin("25.4mm").unwrap() - 1.0).abs() < 1e-9);
        assert!((parse_margin("0.5in").unwrap() - 0.5).abs() < 1e-9);
        assert!((parse_margin("48px").unwrap() - 0.5).abs() < 1e-9);
        assert!((parse_margin("2").unwrap() - 2.0).abs() < 1e-9);
        assert!(parse_margin("wide").is_err());
        assert!(parse_margin("-1cm").is_err());
    }

    #[test]
    fn test_defaults_produce_a4_rule() {
        let css = PageSetup::default().to_css().unwrap();
        assert!(css.starts_with("@page { size: A4; margin: 0.394in"));
        assert!(css.contains("print-color-adjust"));
    }

    #[test]
    fn test_options_override_defaults() {
        let setup = PageSetup::from_options(
            &options(json!({
                "page_size": "letter",
                "landscape": true,
                "margins": {"top": "1in", "left": "10mm"},
                "print_background": false
            })),
            &PageSetup::default(),
        )
        .unwrap();

        assert_eq!(setup.page_size, "Letter");
        assert!(setup.landscape);
        assert_eq!(setup.margins.top, "1in");
        assert_eq!(setup.margins.left, "10mm");
        assert_eq!(setup.margins.bottom, "1cm");
        let css = setup.to_css().unwrap();
        assert!(css.contains("size: Letter landscape"));
        assert!(!css.contains("print-color-adjust"));
    }

    #[test]
    fn test_explicit_dimensions_win() {
        let setup = PageSetup::from_options(
            &options(json!({"page_width": 8.27, "page_height": "11.7in"})),
            &PageSetup::default(),
        )
        .unwrap();
        assert!(setup.to_css().unwrap().contains("size: 8.270in 11.700in"));
    }

    #[test]
    fn test_orientation_option() {
        let setup =
            PageSetup::from_options(&options(json!({"orientation": "landscape"})), &PageSetup::default()).unwrap();
        assert!(setup.landscape);
    }

    #[test]
    fn test_invalid_page_options_rejected() {
        assert!(PageSetup::from_options(&options(json!({"page_size": "B7"})), &PageSetup::default()).is_err());
        assert!(
            PageSetup::from_options(&options(json!({"margins": {"top": "lots"}})), &PageSetup::default()).is_err()
        );
    }
}
