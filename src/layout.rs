//! Layout engine – uses Taffy to lay out a region's element tree, then
//! converts the result into positioned boxes in region coordinates
//! (CSS px, origin at the region's top-left border edge).
//!
//! The region's scrollable extent is the union of its own box and every
//! descendant, so overflowing content is part of the capture.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::{wrap_text, FontManager};
use crate::images::ImageLoader;
use crate::style::{self, resolve_style, ComputedStyle};

/// Width used for regions that do not set their own.
pub const DEFAULT_VIEWPORT_WIDTH: f32 = 800.0;

/// A laid-out box in region coordinates.
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub style: ComputedStyle,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxContent {
    None,
    /// Pre-wrapped lines, each with its measured width.
    Text { lines: Vec<(String, f32)> },
    Image { src: String },
}

/// Result of laying out one region.
#[derive(Debug, Clone)]
pub struct RegionLayout {
    pub root: PositionedBox,
    /// Full scrollable width in CSS px.
    pub scroll_width: f32,
    /// Full scrollable height in CSS px.
    pub scroll_height: f32,
}

impl PositionedBox {
    /// Furthest right and bottom edge of this box and its descendants.
    fn far_edges(&self) -> (f32, f32) {
        self.children.iter().fold(
            (self.x + self.width, self.y + self.height),
            |(r, b), child| {
                let (cr, cb) = child.far_edges();
                (r.max(cr), b.max(cb))
            },
        )
    }
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    images: &'a ImageLoader,
    node_styles: HashMap<NodeId, ComputedStyle>,
    node_content: HashMap<NodeId, BoxContent>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager, images: &'a ImageLoader) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            images,
            node_styles: HashMap::new(),
            node_content: HashMap::new(),
        }
    }

    /// True when every child is text or an inline element holding only text.
    fn all_inline(children: &[DomNode]) -> bool {
        children.iter().all(|c| match c {
            DomNode::Text(_) => true,
            DomNode::Element(e) => matches!(e.tag, Tag::Span | Tag::Br) && Self::all_inline(&e.children),
        })
    }

    fn inline_text(children: &[DomNode], out: &mut String) {
        for child in children {
            match child {
                DomNode::Text(t) => out.push_str(t),
                DomNode::Element(e) if e.tag == Tag::Br => out.push('\n'),
                DomNode::Element(e) => Self::inline_text(&e.children, out),
            }
        }
    }

    fn build_element(
        &mut self,
        el: &ElementNode,
        parent: Option<&ComputedStyle>,
        available_width: f32,
        marker: Option<String>,
    ) -> Result<Option<NodeId>, String> {
        let style = resolve_style(el, parent);
        if style.display == style::Display::None {
            return Ok(None);
        }

        if el.tag == Tag::Img {
            return self.build_image(el, style, available_width).map(Some);
        }

        let own_width = style.width.resolve(available_width).unwrap_or(
            available_width - style.margin.left - style.margin.right,
        );
        let inner_width = (own_width
            - style.padding.left
            - style.padding.right
            - 2.0 * style.border_width)
            .max(1.0);

        let mut child_ids = Vec::new();

        if !el.children.is_empty() && Self::all_inline(&el.children) {
            let mut raw = String::new();
            Self::inline_text(&el.children, &mut raw);
            let collapsed: Vec<String> = raw
                .split('\n')
                .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect();
            let mut text = collapsed.join("\n").trim().to_string();
            if let Some(m) = marker {
                text = format!("{m}{text}");
            }
            if !text.is_empty() {
                child_ids.push(self.build_text(&text, &style, inner_width)?);
            }
        } else {
            let is_row = style.display == style::Display::Flex
                && style.flex_direction == style::FlexDirection::Row;
            let elem_count = el.child_elements().count().max(1);
            let child_width = if is_row {
                let gaps = style.gap * (elem_count - 1) as f32;
                ((inner_width - gaps) / elem_count as f32).max(1.0)
            } else {
                inner_width
            };

            let mut counter = 0u32;
            for child in &el.children {
                let id = match child {
                    DomNode::Text(t) => {
                        let text = t.split_whitespace().collect::<Vec<_>>().join(" ");
                        if text.is_empty() {
                            continue;
                        }
                        Some(self.build_text(&text, &style, child_width)?)
                    }
                    DomNode::Element(c) => {
                        let marker = (c.tag == Tag::Li).then(|| {
                            counter += 1;
                            if el.tag == Tag::Ol {
                                format!("{counter}. ")
                            } else {
                                "\u{2022} ".to_string()
                            }
                        });
                        self.build_element(c, Some(&style), child_width, marker)?
                    }
                };
                if let Some(id) = id {
                    if is_row {
                        self.make_flexible(id)?;
                    }
                    child_ids.push(id);
                }
            }
        }

        let node = self
            .taffy
            .new_with_children(self.container_style(&style), &child_ids)
            .map_err(|e| format!("layout: {e}"))?;
        self.node_styles.insert(node, style);
        Ok(Some(node))
    }

    /// Row children share the row width equally. Everything else keeps block
    /// semantics and never shrinks.
    fn make_flexible(&mut self, id: NodeId) -> Result<(), String> {
        let mut s = self.taffy.style(id).map_err(|e| format!("layout: {e}"))?.clone();
        if matches!(s.size.width, taffy::Dimension::Auto) {
            s.flex_grow = 1.0;
            s.flex_shrink = 1.0;
            s.flex_basis = taffy::Dimension::Length(0.0);
            s.min_size.width = taffy::Dimension::Length(0.0);
        }
        self.taffy.set_style(id, s).map_err(|e| format!("layout: {e}"))
    }

    fn build_text(&mut self, text: &str, style: &ComputedStyle, max_width: f32) -> Result<NodeId, String> {
        let lines = wrap_text(text, style.font_size, style.bold, max_width, self.fonts);
        let measured: Vec<(String, f32)> = lines
            .into_iter()
            .map(|l| {
                let w = self.fonts.measure(&l, style.font_size, style.bold);
                (l, w)
            })
            .collect();
        let height =
            measured.len() as f32 * self.fonts.line_height_px(style.font_size, style.line_height);

        let node = self
            .taffy
            .new_leaf(Style {
                // Auto width: stretched across the parent content box.
                size: Size {
                    width: taffy::Dimension::Auto,
                    height: taffy::Dimension::Length(height),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(|e| format!("layout: {e}"))?;

        // Text boxes paint glyph runs only; box decoration belongs to the parent.
        let text_style = ComputedStyle {
            background_color: style::Color::TRANSPARENT,
            border_width: 0.0,
            margin: style::Edges::default(),
            padding: style::Edges::default(),
            ..style.clone()
        };
        self.node_styles.insert(node, text_style);
        self.node_content.insert(node, BoxContent::Text { lines: measured });
        Ok(node)
    }

    fn build_image(
        &mut self,
        el: &ElementNode,
        style: ComputedStyle,
        available_width: f32,
    ) -> Result<NodeId, String> {
        let src = el.src().unwrap_or_default().to_string();
        let intrinsic = self
            .images
            .dimensions(&src)
            .map(|(w, h)| (w as f32, h as f32))
            .filter(|(w, h)| *w > 0.0 && *h > 0.0);

        let known_w = style.width.resolve(available_width);
        let known_h = style.height.resolve(available_width);
        let (w, h) = match (known_w, known_h, intrinsic) {
            (Some(w), Some(h), _) => (w, h),
            (Some(w), None, Some((iw, ih))) => (w, w * ih / iw),
            (None, Some(h), Some((iw, ih))) => (h * iw / ih, h),
            (None, None, Some((iw, ih))) => {
                // max-width: 100%
                let w = iw.min(available_width);
                (w, w * ih / iw)
            }
            (w, h, None) => (w.unwrap_or(0.0), h.unwrap_or(0.0)),
        };

        let node = self
            .taffy
            .new_leaf(Style {
                size: Size {
                    width: taffy::Dimension::Length(w),
                    height: taffy::Dimension::Length(h),
                },
                margin: margin_rect(&style),
                border: uniform_rect(style.border_width),
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(|e| format!("layout: {e}"))?;
        self.node_styles.insert(node, style);
        self.node_content.insert(node, BoxContent::Image { src });
        Ok(node)
    }

    fn container_style(&self, s: &ComputedStyle) -> Style {
        let row = s.display == style::Display::Flex && s.flex_direction == style::FlexDirection::Row;
        Style {
            display: taffy::Display::Flex,
            flex_direction: if row {
                taffy::FlexDirection::Row
            } else {
                taffy::FlexDirection::Column
            },
            align_items: Some(taffy::AlignItems::Stretch),
            flex_shrink: 0.0,
            size: Size {
                width: dim_to_taffy(s.width),
                height: dim_to_taffy(s.height),
            },
            margin: margin_rect(s),
            padding: Rect {
                top: LengthPercentage::Length(s.padding.top),
                right: LengthPercentage::Length(s.padding.right),
                bottom: LengthPercentage::Length(s.padding.bottom),
                left: LengthPercentage::Length(s.padding.left),
            },
            border: uniform_rect(s.border_width),
            gap: Size {
                width: LengthPercentage::Length(s.gap),
                height: LengthPercentage::Length(s.gap),
            },
            ..Default::default()
        }
    }

    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox, String> {
        let layout = self.taffy.layout(node).map_err(|e| format!("layout: {e}"))?;
        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .map_err(|e| format!("layout: {e}"))?
            .into_iter()
            .map(|child| self.extract(child, x, y))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            style: self.node_styles.get(&node).cloned().unwrap_or_default(),
            content: self
                .node_content
                .get(&node)
                .cloned()
                .unwrap_or(BoxContent::None),
            children,
        })
    }
}

fn dim_to_taffy(d: style::Dimension) -> taffy::Dimension {
    match d {
        style::Dimension::Auto => taffy::Dimension::Auto,
        style::Dimension::Px(v) => taffy::Dimension::Length(v),
        style::Dimension::Percent(v) => taffy::Dimension::Percent(v / 100.0),
    }
}

fn margin_rect(s: &ComputedStyle) -> Rect<LengthPercentageAuto> {
    Rect {
        top: LengthPercentageAuto::Length(s.margin.top),
        right: LengthPercentageAuto::Length(s.margin.right),
        bottom: LengthPercentageAuto::Length(s.margin.bottom),
        left: LengthPercentageAuto::Length(s.margin.left),
    }
}

fn uniform_rect(v: f32) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(v),
        right: LengthPercentage::Length(v),
        bottom: LengthPercentage::Length(v),
        left: LengthPercentage::Length(v),
    }
}

/// Lay out `element` as a capture region.
///
/// The region is sized to its own `width` when it has one, otherwise to
/// `viewport_width`. Its margins are not part of the capture.
pub fn layout_region(
    element: &ElementNode,
    viewport_width: f32,
    fonts: &FontManager,
    images: &ImageLoader,
) -> Result<RegionLayout, String> {
    let mut builder = LayoutBuilder::new(fonts, images);

    let own = resolve_style(element, None);
    let width = own.width.resolve(viewport_width).unwrap_or(viewport_width);

    let root = builder
        .build_element(element, None, width, None)?
        .ok_or_else(|| "region is not displayed (display: none)".to_string())?;

    // Pin the region to its capture width and drop its outer margin.
    let mut root_style = builder.taffy.style(root).map_err(|e| format!("layout: {e}"))?.clone();
    root_style.size.width = taffy::Dimension::Length(width);
    root_style.margin = Rect {
        top: LengthPercentageAuto::Length(0.0),
        right: LengthPercentageAuto::Length(0.0),
        bottom: LengthPercentageAuto::Length(0.0),
        left: LengthPercentageAuto::Length(0.0),
    };
    builder
        .taffy
        .set_style(root, root_style)
        .map_err(|e| format!("layout: {e}"))?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(|e| format!("layout: {e}"))?;

    let root_box = builder.extract(root, 0.0, 0.0)?;
    let (right, bottom) = root_box.far_edges();
    Ok(RegionLayout {
        scroll_width: right.max(0.0).ceil(),
        scroll_height: bottom.max(0.0).ceil(),
        root: root_box,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;

    fn lay_out(html: &str, selector: &str) -> RegionLayout {
        let page = Page::parse(html);
        let el = page.query_selector(selector).unwrap();
        let fonts = FontManager::default();
        let images = ImageLoader::new(None);
        layout_region(el, DEFAULT_VIEWPORT_WIDTH, &fonts, &images).unwrap()
    }

    #[test]
    fn paragraph_has_size() {
        let l = lay_out("<div id='r'><p>Hello world</p></div>", "#r");
        assert_eq!(l.scroll_width, DEFAULT_VIEWPORT_WIDTH);
        assert!(l.scroll_height > 0.0);
        assert!(!l.root.children.is_empty());
    }

    #[test]
    fn explicit_size_wins() {
        let l = lay_out(r#"<div id="r" style="width: 300px; height: 1200px">x</div>"#, "#r");
        assert_eq!(l.scroll_width, 300.0);
        assert_eq!(l.scroll_height, 1200.0);
    }

    #[test]
    fn overflow_extends_extent() {
        let l = lay_out(
            r#"<div id="r" style="width: 200px; height: 50px"><div style="width: 200px; height: 400px"></div></div>"#,
            "#r",
        );
        assert_eq!(l.root.height, 50.0);
        assert_eq!(l.scroll_height, 400.0);
    }

    #[test]
    fn more_content_is_taller() {
        let short = lay_out("<div id='r'><p>one</p></div>", "#r");
        let mut html = String::from("<div id='r'>");
        for i in 0..40 {
            html.push_str(&format!("<p>Paragraph {i}</p>"));
        }
        html.push_str("</div>");
        let long = lay_out(&html, "#r");
        assert!(long.scroll_height > short.scroll_height * 10.0);
    }

    #[test]
    fn list_items_get_markers() {
        let l = lay_out("<ol id='r'><li>a</li><li>b</li></ol>", "#r");
        let mut texts = Vec::new();
        fn walk(b: &PositionedBox, out: &mut Vec<String>) {
            if let BoxContent::Text { lines } = &b.content {
                out.extend(lines.iter().map(|(l, _)| l.clone()));
            }
            for c in &b.children {
                walk(c, out);
            }
        }
        walk(&l.root, &mut texts);
        assert_eq!(texts, vec!["1. a".to_string(), "2. b".to_string()]);
    }

    #[test]
    fn hidden_region_is_an_error() {
        let page = Page::parse(r#"<div id="r" style="display: none">x</div>"#);
        let el = page.query_selector("#r").unwrap();
        let res = layout_region(el, 800.0, &FontManager::default(), &ImageLoader::new(None));
        assert!(res.is_err());
    }

    #[test]
    fn image_uses_intrinsic_size() {
        let uri = crate::images::png_data_uri(40, 20);
        let l = lay_out(&format!(r#"<div id="r"><img src="{uri}"></div>"#), "#r");
        let img = &l.root.children[0];
        assert_eq!(img.content, BoxContent::Image { src: uri });
        assert_eq!((img.width, img.height), (40.0, 20.0));
    }
}
