//! Style resolver – maps tag defaults and inline `style` attributes to a flat
//! [`ComputedStyle`] consumed by the layout engine and the rasterizer.

use crate::dom::{ElementNode, Tag};

/// Fully resolved style for a single element.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub flex_direction: FlexDirection,
    pub gap: f32,

    // Sizing
    pub width: Dimension,
    pub height: Dimension,

    // Spacing (px)
    pub margin: Edges,
    pub padding: Edges,

    // Border
    pub border_width: f32,
    pub border_color: Color,

    // Typography
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub font_family: String,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,

    pub background_color: Color,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            flex_direction: FlexDirection::Row,
            gap: 0.0,
            width: Dimension::Auto,
            height: Dimension::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            border_width: 0.0,
            border_color: Color::BLACK,
            font_size: 16.0,
            bold: false,
            italic: false,
            font_family: "Helvetica".to_string(),
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.4,
            background_color: Color::TRANSPARENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Flex,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dimension {
    Auto,
    Px(f32),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the containing block's width; `None` for `Auto`.
    pub fn resolve(self, container: f32) -> Option<f32> {
        match self {
            Dimension::Auto => None,
            Dimension::Px(v) => Some(v),
            Dimension::Percent(p) => Some(container * p / 100.0),
        }
    }
}

/// Top/right/bottom/left lengths in px.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn all(v: f32) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    /// CSS shorthand: 1, 2, 3 or 4 values.
    fn from_shorthand(val: &str) -> Option<Self> {
        let parts: Vec<f32> = val.split_whitespace().filter_map(parse_px).collect();
        match parts.as_slice() {
            [a] => Some(Self::all(*a)),
            [v, h] => Some(Self {
                top: *v,
                right: *h,
                bottom: *v,
                left: *h,
            }),
            [t, h, b] => Some(Self {
                top: *t,
                right: *h,
                bottom: *b,
                left: *h,
            }),
            [t, r, b, l] => Some(Self {
                top: *t,
                right: *r,
                bottom: *b,
                left: *l,
            }),
            _ => None,
        }
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn is_transparent(&self) -> bool {
        self.a < 0.001
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 | 8 => {
                let mut c = Self::rgb(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?);
                if hex.len() == 8 {
                    c.a = channel(&hex[6..8])?;
                }
                Some(c)
            }
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }

    /// Parse `#hex`, `rgb()`/`rgba()` or a handful of named colours.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase();
        if v.starts_with('#') {
            return Self::from_hex(&v);
        }
        if let Some(args) = v
            .strip_prefix("rgba(")
            .or_else(|| v.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let nums: Vec<f32> = args
                .split(',')
                .map(|p| p.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .ok()?;
            return match nums.as_slice() {
                [r, g, b] => Some(Self::rgb(r / 255.0, g / 255.0, b / 255.0)),
                [r, g, b, a] => Some(Self {
                    r: r / 255.0,
                    g: g / 255.0,
                    b: b / 255.0,
                    a: a.clamp(0.0, 1.0),
                }),
                _ => None,
            };
        }
        match v.as_str() {
            "transparent" | "none" => Some(Self::TRANSPARENT),
            "white" => Some(Self::WHITE),
            "black" => Some(Self::BLACK),
            "red" => Some(Self::rgb(1.0, 0.0, 0.0)),
            "green" => Some(Self::rgb(0.0, 0.502, 0.0)),
            "blue" => Some(Self::rgb(0.0, 0.0, 1.0)),
            "gray" | "grey" => Some(Self::rgb(0.502, 0.502, 0.502)),
            "lightgray" | "lightgrey" => Some(Self::rgb(0.827, 0.827, 0.827)),
            _ => None,
        }
    }

    /// 8-bit RGBA channels.
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its
/// parent.
pub fn resolve_style(element: &ElementNode, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let mut style = ComputedStyle::default();

    if let Some(p) = parent {
        style.font_size = p.font_size;
        style.bold = p.bold;
        style.italic = p.italic;
        style.font_family = p.font_family.clone();
        style.color = p.color;
        style.text_align = p.text_align;
        style.line_height = p.line_height;
    }

    apply_tag_defaults(&mut style, &element.tag);

    if element.has_class("hidden") {
        style.display = Display::None;
    }
    if let Some(inline) = element.inline_style() {
        apply_inline_style(&mut style, inline);
    }
    style
}

fn apply_tag_defaults(s: &mut ComputedStyle, tag: &Tag) {
    match tag {
        Tag::H1 => {
            s.font_size = 32.0;
            s.bold = true;
            s.margin = Edges {
                top: 16.0,
                bottom: 12.0,
                ..Edges::default()
            };
        }
        Tag::H2 => {
            s.font_size = 24.0;
            s.bold = true;
            s.margin = Edges {
                top: 14.0,
                bottom: 10.0,
                ..Edges::default()
            };
        }
        Tag::H3 => {
            s.font_size = 20.0;
            s.bold = true;
            s.margin = Edges {
                top: 12.0,
                bottom: 8.0,
                ..Edges::default()
            };
        }
        Tag::P => s.margin.bottom = 10.0,
        Tag::Ul | Tag::Ol => {
            s.margin.bottom = 10.0;
            s.padding.left = 24.0;
        }
        Tag::Li => s.margin.bottom = 4.0,
        Tag::Table => s.border_width = 1.0,
        Tag::Tr => {
            s.display = Display::Flex;
            s.flex_direction = FlexDirection::Row;
        }
        Tag::Td | Tag::Th => {
            s.padding = Edges {
                top: 4.0,
                right: 8.0,
                bottom: 4.0,
                left: 8.0,
            };
            s.border_width = 1.0;
            if *tag == Tag::Th {
                s.bold = true;
                s.background_color = Color::rgb(0.93, 0.93, 0.93);
            }
        }
        Tag::Span => s.display = Display::Inline,
        Tag::Img | Tag::Br => s.display = Display::Inline,
        Tag::Html | Tag::Body | Tag::Div | Tag::Section | Tag::Article | Tag::Other(_) => {}
    }
}

/// Apply a `style="..."` attribute value.
pub fn apply_inline_style(s: &mut ComputedStyle, style_str: &str) {
    for decl in style_str.split(';') {
        let Some((prop, val)) = decl.split_once(':') else {
            continue;
        };
        apply_css_property(s, prop.trim().to_ascii_lowercase().as_str(), val.trim());
    }
}

fn apply_css_property(s: &mut ComputedStyle, prop: &str, val: &str) {
    match prop {
        "display" => {
            s.display = match val {
                "flex" => Display::Flex,
                "inline" | "inline-block" => Display::Inline,
                "none" => Display::None,
                _ => Display::Block,
            }
        }
        "flex-direction" => {
            s.flex_direction = match val {
                "column" => FlexDirection::Column,
                _ => FlexDirection::Row,
            }
        }
        "gap" => {
            if let Some(v) = parse_px(val) {
                s.gap = v;
            }
        }
        "width" => s.width = parse_dimension(val),
        "height" => s.height = parse_dimension(val),
        "margin" => {
            if let Some(e) = Edges::from_shorthand(val) {
                s.margin = e;
            }
        }
        "padding" => {
            if let Some(e) = Edges::from_shorthand(val) {
                s.padding = e;
            }
        }
        "margin-top" => set_px(&mut s.margin.top, val),
        "margin-right" => set_px(&mut s.margin.right, val),
        "margin-bottom" => set_px(&mut s.margin.bottom, val),
        "margin-left" => set_px(&mut s.margin.left, val),
        "padding-top" => set_px(&mut s.padding.top, val),
        "padding-right" => set_px(&mut s.padding.right, val),
        "padding-bottom" => set_px(&mut s.padding.bottom, val),
        "padding-left" => set_px(&mut s.padding.left, val),
        "border" => {
            // `border: 1px solid #ccc`
            for part in val.split_whitespace() {
                if let Some(w) = parse_px(part) {
                    s.border_width = w;
                } else if let Some(c) = Color::parse(part) {
                    s.border_color = c;
                } else if part == "none" {
                    s.border_width = 0.0;
                }
            }
        }
        "border-width" => set_px(&mut s.border_width, val),
        "border-color" => {
            if let Some(c) = Color::parse(val) {
                s.border_color = c;
            }
        }
        "font-size" => set_px(&mut s.font_size, val),
        "font-weight" => s.bold = matches!(val, "bold" | "bolder" | "600" | "700" | "800" | "900"),
        "font-style" => s.italic = matches!(val, "italic" | "oblique"),
        "font-family" => {
            if let Some(first) = val.split(',').next() {
                s.font_family = first.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
            }
        }
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "background-color" | "background" => {
            if let Some(c) = Color::parse(val) {
                s.background_color = c;
            }
        }
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "line-height" => {
            // Unitless factor, or px converted to a factor of the font size.
            if let Ok(factor) = val.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(px) = parse_px(val) {
                if s.font_size > 0.0 {
                    s.line_height = px / s.font_size;
                }
            }
        }
        _ => {}
    }
}

fn set_px(slot: &mut f32, val: &str) {
    if let Some(v) = parse_px(val) {
        *slot = v;
    }
}

fn parse_px(s: &str) -> Option<f32> {
    let s = s.trim();
    let num = s.strip_suffix("px").unwrap_or(s);
    if num.is_empty() || num.ends_with('%') {
        return None;
    }
    num.parse::<f32>().ok()
}

fn parse_dimension(s: &str) -> Dimension {
    let s = s.trim();
    if let Some(p) = s.strip_suffix('%') {
        return p.parse::<f32>().map(Dimension::Percent).unwrap_or(Dimension::Auto);
    }
    parse_px(s).map(Dimension::Px).unwrap_or(Dimension::Auto)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomNode, Page};

    #[test]
    fn inline_style_overrides_tag_defaults() {
        let page = Page::parse(r#"<h1 style="font-size: 12px; margin: 0; color: #ff0000">T</h1>"#);
        let h1 = page.query_selector("h1").unwrap();
        let s = resolve_style(h1, None);
        assert_eq!(s.font_size, 12.0);
        assert!(s.bold);
        assert_eq!(s.margin, Edges::all(0.0));
        assert!((s.color.r - 1.0).abs() < 0.01);
    }

    #[test]
    fn text_properties_inherit() {
        let page = Page::parse(r#"<div style="color: rgb(0, 0, 255); font-size: 20px"><span>x</span></div>"#);
        let div = page.query_selector("div").unwrap();
        let parent = resolve_style(div, None);
        let DomNode::Element(span) = &div.children[0] else {
            panic!("Expected span");
        };
        let s = resolve_style(span, Some(&parent));
        assert_eq!(s.font_size, 20.0);
        assert_eq!(s.color, Color::rgb(0.0, 0.0, 1.0));
        assert_eq!(s.display, Display::Inline);
        // Box properties do not inherit.
        assert!(s.background_color.is_transparent());
    }

    #[test]
    fn shorthand_spacing() {
        let mut s = ComputedStyle::default();
        apply_inline_style(&mut s, "padding: 4px 8px; border: 2px solid #333");
        assert_eq!(s.padding.top, 4.0);
        assert_eq!(s.padding.left, 8.0);
        assert_eq!(s.border_width, 2.0);
        assert_eq!(s.border_color, Color::from_hex("#333").unwrap());
    }

    #[test]
    fn colour_parsing() {
        assert_eq!(Color::parse("white"), Some(Color::WHITE));
        assert_eq!(Color::parse("#FFF"), Some(Color::WHITE));
        assert_eq!(Color::WHITE.to_rgba8(), [255, 255, 255, 255]);
        let c = Color::parse("rgba(255, 0, 0, 0.5)").unwrap();
        assert_eq!(c.to_rgba8(), [255, 0, 0, 128]);
        assert!(Color::parse("not-a-colour").is_none());
        let c = Color::from_hex("#ff8800").unwrap();
        assert!((c.g - 0.533).abs() < 0.01);
    }

    #[test]
    fn dimensions() {
        assert_eq!(parse_dimension("50%"), Dimension::Percent(50.0));
        assert_eq!(parse_dimension("120px"), Dimension::Px(120.0));
        assert_eq!(parse_dimension("auto"), Dimension::Auto);
        assert_eq!(Dimension::Percent(50.0).resolve(800.0), Some(400.0));
    }
}
