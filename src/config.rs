//! Conversion configuration: defaults, partial overrides, and page geometry
//! identifiers.
//!
//! A [`Configuration`] is always complete. Callers describe what they want
//! changed with a [`ConfigOverrides`], whose fields are all optional, and the
//! two are merged field by field.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Author string written into every document's metadata.
pub const DOCUMENT_AUTHOR: &str = "Page Region Export";
/// Creator string written into every document's metadata.
pub const DOCUMENT_CREATOR: &str = "HTML to PDF Converter";

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Portrait mode: height > width (default).
    #[default]
    Portrait,
    /// Landscape mode: width > height.
    Landscape,
}

impl FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "portrait" | "p" => Ok(Orientation::Portrait),
            "landscape" | "l" => Ok(Orientation::Landscape),
            other => Err(format!("unknown orientation '{other}'")),
        }
    }
}

/// Named paper sizes. Dimensions are portrait, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
}

impl PageSize {
    /// Portrait `(width, height)` in points.
    pub fn dimensions_pt(self) -> (f32, f32) {
        match self {
            PageSize::A3 => (841.89, 1190.55),
            // A4: 210mm × 297mm = 595.28 × 841.89 points
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
        }
    }

    /// `(width, height)` in points after applying `orientation`.
    pub fn oriented_pt(self, orientation: Orientation) -> (f32, f32) {
        let (w, h) = self.dimensions_pt();
        match orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }
}

impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a3" => Ok(PageSize::A3),
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            other => Err(format!("unknown page size '{other}'")),
        }
    }
}

impl TryFrom<String> for PageSize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageSize::A3 => "a3",
            PageSize::A4 => "a4",
            PageSize::A5 => "a5",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
        };
        f.write_str(name)
    }
}

/// Unit system a document writer interprets coordinates in. Page geometry
/// is computed in points, so that is the only unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Pt,
}

/// Fully resolved settings for one conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// Name of the downloaded file (default: "document.pdf").
    pub filename: String,
    /// Document title; the subject mirrors it (default: "Page Export PDF").
    pub title: String,
    pub page_size: PageSize,
    pub orientation: Orientation,
    /// Margin in points on every edge (default: 10).
    pub margin: f32,
    /// JPEG quality in (0, 1] (default: 1.0).
    pub quality: f32,
    /// Raster pixels per CSS pixel, at least 1 (default: 2).
    pub scale: f32,
    /// CSS colour painted under the region (default: "#ffffff").
    pub background_color: String,
    pub allow_taint: bool,
    pub use_cors: bool,
    /// Offset the bitmap on each page so consecutive pages show consecutive
    /// bands. Off by default: every page draws the whole bitmap at the same
    /// position.
    pub slice_pages: bool,
    /// Directory the finished document is written into.
    pub out_dir: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            filename: "document.pdf".to_string(),
            title: "Page Export PDF".to_string(),
            page_size: PageSize::A4,
            orientation: Orientation::Portrait,
            margin: 10.0,
            quality: 1.0,
            scale: 2.0,
            background_color: "#ffffff".to_string(),
            allow_taint: true,
            use_cors: true,
            slice_pages: false,
            out_dir: PathBuf::from("."),
        }
    }
}

impl Configuration {
    /// Defaults with `overrides` applied on top.
    pub fn merged(overrides: &ConfigOverrides) -> Self {
        overrides.apply_to(Self::default())
    }
}

/// Caller-supplied subset of [`Configuration`]. Unset fields keep whatever
/// the base configuration holds.
///
/// Deserialises from JSON with either snake_case or camelCase keys, e.g.
/// `{"pageSize": "a4", "useCORS": false}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub filename: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "pageSize")]
    pub page_size: Option<PageSize>,
    pub orientation: Option<Orientation>,
    pub margin: Option<f32>,
    pub quality: Option<f32>,
    pub scale: Option<f32>,
    #[serde(alias = "backgroundColor")]
    pub background_color: Option<String>,
    #[serde(alias = "allowTaint")]
    pub allow_taint: Option<bool>,
    #[serde(alias = "useCORS", alias = "useCors")]
    pub use_cors: Option<bool>,
    #[serde(alias = "slicePages")]
    pub slice_pages: Option<bool>,
    #[serde(alias = "outDir")]
    pub out_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Parse overrides from a JSON object.
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    /// Overlay `self` onto `other`; fields set in `self` win.
    pub fn or(self, other: ConfigOverrides) -> ConfigOverrides {
        ConfigOverrides {
            filename: self.filename.or(other.filename),
            title: self.title.or(other.title),
            page_size: self.page_size.or(other.page_size),
            orientation: self.orientation.or(other.orientation),
            margin: self.margin.or(other.margin),
            quality: self.quality.or(other.quality),
            scale: self.scale.or(other.scale),
            background_color: self.background_color.or(other.background_color),
            allow_taint: self.allow_taint.or(other.allow_taint),
            use_cors: self.use_cors.or(other.use_cors),
            slice_pages: self.slice_pages.or(other.slice_pages),
            out_dir: self.out_dir.or(other.out_dir),
        }
    }

    /// Shallow merge onto `base`, clamping out-of-range numbers.
    pub fn apply_to(&self, base: Configuration) -> Configuration {
        let mut cfg = base;
        if let Some(v) = &self.filename {
            cfg.filename = v.clone();
        }
        if let Some(v) = &self.title {
            cfg.title = v.clone();
        }
        if let Some(v) = self.page_size {
            cfg.page_size = v;
        }
        if let Some(v) = self.orientation {
            cfg.orientation = v;
        }
        if let Some(v) = self.margin {
            cfg.margin = if !v.is_finite() {
                log::warn!("Margin {v} is not a finite number; using {}", cfg.margin);
                cfg.margin
            } else if v < 0.0 {
                log::warn!("Negative margin {v} clamped to 0");
                0.0
            } else {
                v
            };
        }
        if let Some(v) = self.quality {
            cfg.quality = if v <= 0.0 || v.is_nan() {
                log::warn!("Quality {v} is not in (0, 1]; using 1.0");
                1.0
            } else if v > 1.0 {
                log::warn!("Quality {v} clamped to 1.0");
                1.0
            } else {
                v
            };
        }
        if let Some(v) = self.scale {
            cfg.scale = if v < 1.0 || v.is_nan() {
                log::warn!("Scale {v} clamped to 1");
                1.0
            } else {
                v
            };
        }
        if let Some(v) = &self.background_color {
            cfg.background_color = v.clone();
        }
        if let Some(v) = self.allow_taint {
            cfg.allow_taint = v;
        }
        if let Some(v) = self.use_cors {
            cfg.use_cors = v;
        }
        if let Some(v) = self.slice_pages {
            cfg.slice_pages = v;
        }
        if let Some(v) = &self.out_dir {
            cfg.out_dir = v.clone();
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overrides_yield_defaults() {
        assert_eq!(Configuration::merged(&ConfigOverrides::default()), Configuration::default());
    }

    #[test]
    fn overrides_replace_only_named_fields() {
        let overrides = ConfigOverrides {
            filename: Some("report.pdf".to_string()),
            margin: Some(20.0),
            use_cors: Some(false),
            ..Default::default()
        };
        let cfg = Configuration::merged(&overrides);
        let defaults = Configuration::default();

        assert_eq!(cfg.filename, "report.pdf");
        assert_eq!(cfg.margin, 20.0);
        assert!(!cfg.use_cors);

        assert_eq!(cfg.title, defaults.title);
        assert_eq!(cfg.page_size, defaults.page_size);
        assert_eq!(cfg.orientation, defaults.orientation);
        assert_eq!(cfg.quality, defaults.quality);
        assert_eq!(cfg.scale, defaults.scale);
        assert_eq!(cfg.background_color, defaults.background_color);
        assert_eq!(cfg.allow_taint, defaults.allow_taint);
        assert_eq!(cfg.slice_pages, defaults.slice_pages);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cfg = Configuration::merged(&ConfigOverrides {
            margin: Some(-4.0),
            quality: Some(1.7),
            scale: Some(0.25),
            ..Default::default()
        });
        assert_eq!(cfg.margin, 0.0);
        assert_eq!(cfg.quality, 1.0);
        assert_eq!(cfg.scale, 1.0);
    }

    #[test]
    fn non_finite_margin_keeps_base_value() {
        for margin in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let cfg = Configuration::merged(&ConfigOverrides {
                margin: Some(margin),
                ..Default::default()
            });
            assert_eq!(cfg.margin, 10.0, "margin {margin}");
        }
    }

    #[test]
    fn json_accepts_camel_case_keys() {
        let o = ConfigOverrides::from_json(
            r##"{"pageSize": "Letter", "orientation": "landscape", "useCORS": false, "backgroundColor": "#000"}"##,
        )
        .unwrap();
        assert_eq!(o.page_size, Some(PageSize::Letter));
        assert_eq!(o.orientation, Some(Orientation::Landscape));
        assert_eq!(o.use_cors, Some(false));
        assert_eq!(o.background_color.as_deref(), Some("#000"));
        assert_eq!(o.title, None);
    }

    #[test]
    fn json_rejects_unknown_page_size() {
        assert!(ConfigOverrides::from_json(r#"{"page_size": "b7"}"#).is_err());
    }

    #[test]
    fn or_prefers_left_hand_side() {
        let caller = ConfigOverrides {
            filename: Some("mine.pdf".to_string()),
            ..Default::default()
        };
        let preset = ConfigOverrides {
            filename: Some("preset.pdf".to_string()),
            title: Some("Preset".to_string()),
            ..Default::default()
        };
        let merged = caller.or(preset);
        assert_eq!(merged.filename.as_deref(), Some("mine.pdf"));
        assert_eq!(merged.title.as_deref(), Some("Preset"));
    }

    #[test]
    fn landscape_swaps_dimensions() {
        assert_eq!(PageSize::A4.oriented_pt(Orientation::Landscape), (841.89, 595.28));
        assert_eq!(PageSize::Letter.oriented_pt(Orientation::Portrait), (612.0, 792.0));
    }
}
