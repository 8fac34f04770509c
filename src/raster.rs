//! Rasterization – turns a region into a bitmap.
//!
//! [`Rasterizer`] is the seam the converter talks to. [`LayoutRasterizer`]
//! is the built-in implementation: it lays the region out with
//! [`crate::layout`] and paints the resulting boxes into an RGBA canvas.
//! Text runs are painted as solid bars of their measured width; there is no
//! glyph rendering.

use std::future::Future;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, Blend};
use imageproc::rect::Rect;

use crate::dom::Region;
use crate::error::{ConvertError, Result};
use crate::fonts::FontManager;
use crate::images::{ImageLoader, ImageOrigin};
use crate::layout::{layout_region, BoxContent, PositionedBox, DEFAULT_VIEWPORT_WIDTH};
use crate::style::{Color, TextAlign};

/// Largest canvas (in pixels) a rasterization may allocate.
pub const MAX_CANVAS_PIXELS: u64 = 16_384 * 16_384;
/// Largest width or height a baseline JPEG can carry.
pub const MAX_JPEG_SIDE: u32 = u16::MAX as u32;

/// An immutable RGBA bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pixels: RgbaImage,
}

impl Bitmap {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// A bitmap filled with one colour.
    pub fn solid(width: u32, height: u32, color: Color) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(color.to_rgba8())))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Encode as baseline JPEG. `quality` is in (0, 1]; alpha is flattened
    /// onto white.
    pub fn to_jpeg(&self, quality: f32) -> std::result::Result<Vec<u8>, String> {
        let (w, h) = self.pixels.dimensions();
        if w == 0 || h == 0 {
            return Err("cannot encode an empty bitmap".to_string());
        }
        let mut rgb = Vec::with_capacity(w as usize * h as usize * 3);
        for px in self.pixels.pixels() {
            let [r, g, b, a] = px.0;
            let a = a as u16;
            for c in [r, g, b] {
                rgb.push(((c as u16 * a + 255 * (255 - a)) / 255) as u8);
            }
        }

        let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, q)
            .encode(&rgb, w, h, ExtendedColorType::Rgb8)
            .map_err(|e| format!("JPEG encode error: {e}"))?;
        Ok(out.into_inner())
    }
}

/// Parameters for one rasterization.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// Draw foreign images even though they taint the capture.
    pub allow_taint: bool,
    /// Load foreign images as if granted cross-origin access.
    pub use_cors: bool,
    /// Raster pixels per CSS pixel.
    pub scale: f32,
    /// Fill painted under the region.
    pub background: Color,
    /// Capture width in CSS px (the region's full scroll width).
    pub width: f32,
    /// Capture height in CSS px (the region's full scroll height).
    pub height: f32,
}

impl RasterOptions {
    /// Canvas size in pixels.
    pub fn canvas_size(&self) -> (u32, u32) {
        let px = |v: f32| (v * self.scale).ceil().max(0.0) as u32;
        (px(self.width), px(self.height))
    }

    fn foreign_images_allowed(&self) -> bool {
        self.allow_taint || self.use_cors
    }
}

/// Capability that turns a region into pixels.
pub trait Rasterizer {
    /// Whether the capability can be used at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether 2D drawing works in this environment. Advisory.
    fn probe_2d(&self) -> bool {
        probe_canvas().is_ok()
    }

    /// Full scrollable `(width, height)` of the region in CSS px.
    fn extent(&self, region: Region<'_>) -> Result<(f32, f32)>;

    fn rasterize(
        &self,
        region: Region<'_>,
        options: &RasterOptions,
    ) -> impl Future<Output = Result<Bitmap>> + Send;
}

/// Paint one pixel, encode it, and report the first failure.
pub fn probe_canvas() -> std::result::Result<(), String> {
    let mut canvas = RgbaImage::new(1, 1);
    draw_filled_rect_mut(&mut canvas, Rect::at(0, 0).of_size(1, 1), Rgba([0, 0, 0, 255]));
    Bitmap::new(canvas).to_jpeg(0.5).map(|_| ())
}

/// Box-model rasterizer backed by the Taffy layout.
#[derive(Clone)]
pub struct LayoutRasterizer {
    fonts: FontManager,
    viewport_width: f32,
}

impl Default for LayoutRasterizer {
    fn default() -> Self {
        Self {
            fonts: FontManager::default(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
        }
    }
}

impl LayoutRasterizer {
    pub fn new(fonts: FontManager, viewport_width: f32) -> Self {
        Self {
            fonts,
            viewport_width,
        }
    }

    fn render(&self, region: Region<'_>, options: &RasterOptions) -> Result<Bitmap> {
        let (w, h) = options.canvas_size();
        if w == 0 || h == 0 {
            return Err(ConvertError::Rasterization(
                "region has no visible area".to_string(),
            ));
        }
        if w > MAX_JPEG_SIDE || h > MAX_JPEG_SIDE {
            return Err(ConvertError::Rasterization(format!(
                "canvas of {w}x{h} px exceeds the {MAX_JPEG_SIDE} px JPEG side limit; \
                 lower the scale or capture a smaller region"
            )));
        }
        if w as u64 * h as u64 > MAX_CANVAS_PIXELS {
            return Err(ConvertError::Rasterization(format!(
                "canvas of {w}x{h} px exceeds the {MAX_CANVAS_PIXELS} px limit"
            )));
        }

        let images = ImageLoader::new(region.page.base_dir());
        let layout = layout_region(region.element, self.viewport_width, &self.fonts, &images)
            .map_err(ConvertError::Rasterization)?;

        let mut painter = Painter {
            canvas: Blend(RgbaImage::from_pixel(w, h, Rgba(options.background.to_rgba8()))),
            scale: options.scale,
            images: &images,
            options,
            fonts: &self.fonts,
        };
        painter.paint(&layout.root);
        log::debug!("Rasterized region into {w}x{h} px at scale {}", options.scale);
        Ok(Bitmap::new(painter.canvas.0))
    }
}

impl Rasterizer for LayoutRasterizer {
    fn extent(&self, region: Region<'_>) -> Result<(f32, f32)> {
        let images = ImageLoader::new(region.page.base_dir());
        let layout = layout_region(region.element, self.viewport_width, &self.fonts, &images)
            .map_err(ConvertError::Rasterization)?;
        Ok((layout.scroll_width, layout.scroll_height))
    }

    async fn rasterize(&self, region: Region<'_>, options: &RasterOptions) -> Result<Bitmap> {
        self.render(region, options)
    }
}

struct Painter<'a> {
    canvas: Blend<RgbaImage>,
    scale: f32,
    images: &'a ImageLoader,
    options: &'a RasterOptions,
    fonts: &'a FontManager,
}

impl Painter<'_> {
    fn rect(&self, x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
        let px = |v: f32| (v * self.scale).round();
        let (x0, y0) = (px(x), px(y));
        let (w, h) = ((px(x + w) - x0).max(0.0) as u32, (px(y + h) - y0).max(0.0) as u32);
        (w > 0 && h > 0).then(|| Rect::at(x0 as i32, y0 as i32).of_size(w, h))
    }

    fn fill(&mut self, x: f32, y: f32, w: f32, h: f32, color: Color) {
        if color.is_transparent() {
            return;
        }
        if let Some(r) = self.rect(x, y, w, h) {
            draw_filled_rect_mut(&mut self.canvas, r, Rgba(color.to_rgba8()));
        }
    }

    fn paint(&mut self, b: &PositionedBox) {
        let s = &b.style;
        self.fill(b.x, b.y, b.width, b.height, s.background_color);

        if s.border_width > 0.0 && !s.border_color.is_transparent() {
            let color = Rgba(s.border_color.to_rgba8());
            let rings = (s.border_width * self.scale).round().max(1.0) as u32;
            if let Some(outer) = self.rect(b.x, b.y, b.width, b.height) {
                for i in 0..rings {
                    let (w, h) = (outer.width() as i64 - 2 * i as i64, outer.height() as i64 - 2 * i as i64);
                    if w <= 0 || h <= 0 {
                        break;
                    }
                    let ring = Rect::at(outer.left() + i as i32, outer.top() + i as i32)
                        .of_size(w as u32, h as u32);
                    draw_hollow_rect_mut(&mut self.canvas, ring, color);
                }
            }
        }

        match &b.content {
            BoxContent::Text { lines } => self.paint_text(b, lines),
            BoxContent::Image { src } => self.paint_image(b, src),
            BoxContent::None => {}
        }

        for child in &b.children {
            self.paint(child);
        }
    }

    fn paint_text(&mut self, b: &PositionedBox, lines: &[(String, f32)]) {
        let s = &b.style;
        let line_h = self.fonts.line_height_px(s.font_size, s.line_height);
        let ascent = self.fonts.ascender_px(s.font_size);
        for (i, (line, width)) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let x = match s.text_align {
                TextAlign::Left => b.x,
                TextAlign::Center => b.x + (b.width - width) / 2.0,
                TextAlign::Right => b.x + b.width - width,
            };
            // Bar spans the x-height band above the baseline.
            let line_top = b.y + i as f32 * line_h + (line_h - s.font_size) / 2.0;
            let bar_h = s.font_size * 0.5;
            self.fill(x, line_top + ascent - bar_h, *width, bar_h, s.color);
        }
    }

    fn paint_image(&mut self, b: &PositionedBox, src: &str) {
        let drawable = match self.images.origin(src) {
            ImageOrigin::Inline => true,
            ImageOrigin::Foreign(_) => self.options.foreign_images_allowed(),
            ImageOrigin::Remote => false,
        };
        let loaded = if drawable { self.images.load(src) } else { None };

        let Some(img) = loaded else {
            if !drawable {
                log::debug!("Foreign image '{src}' not drawn (allow_taint and use_cors are off)");
            }
            self.fill(b.x, b.y, b.width, b.height, Color::rgb(0.9, 0.9, 0.9));
            return;
        };

        let Some(target) = self.rect(b.x, b.y, b.width, b.height) else {
            return;
        };
        let resized = imageops::resize(&*img, target.width(), target.height(), FilterType::Triangle);
        imageops::overlay(&mut self.canvas.0, &resized, target.left() as i64, target.top() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;

    fn options(width: f32, height: f32, scale: f32) -> RasterOptions {
        RasterOptions {
            allow_taint: true,
            use_cors: true,
            scale,
            background: Color::WHITE,
            width,
            height,
        }
    }

    fn region_of<'a>(page: &'a Page, selector: &str) -> Region<'a> {
        Region {
            element: page.query_selector(selector).unwrap(),
            page,
        }
    }

    #[test]
    fn jpeg_encoding_produces_jfif() {
        let bytes = Bitmap::solid(8, 4, Color::rgb(0.2, 0.4, 0.6)).to_jpeg(0.95).unwrap();
        assert_eq!(&bytes[0..2], &[0xFF, 0xD8], "JPEG SOI marker");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 4));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let mut img = RgbaImage::new(64, 64);
        for (x, y, px) in img.enumerate_pixels_mut() {
            *px = Rgba([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8, 255]);
        }
        let bitmap = Bitmap::new(img);
        let hi = bitmap.to_jpeg(1.0).unwrap();
        let lo = bitmap.to_jpeg(0.1).unwrap();
        assert!(lo.len() < hi.len());
    }

    #[test]
    fn probe_succeeds() {
        assert!(probe_canvas().is_ok());
        assert!(LayoutRasterizer::default().probe_2d());
    }

    #[tokio::test]
    async fn canvas_is_scaled_extent() {
        let page = Page::parse(r#"<div id="r" style="width: 100px; height: 60px; background: #ff0000"></div>"#);
        let r = LayoutRasterizer::default();
        let region = region_of(&page, "#r");
        let (w, h) = r.extent(region).unwrap();
        assert_eq!((w, h), (100.0, 60.0));

        let bmp = r.rasterize(region, &options(w, h, 2.0)).await.unwrap();
        assert_eq!((bmp.width(), bmp.height()), (200, 120));
        assert_eq!(bmp.pixels().get_pixel(100, 60).0, [255, 0, 0, 255]);
    }

    #[tokio::test]
    async fn background_fills_uncovered_area() {
        let page = Page::parse(r#"<div id="r" style="width: 10px; height: 10px"></div>"#);
        let r = LayoutRasterizer::default();
        let mut opts = options(10.0, 10.0, 1.0);
        opts.background = Color::rgb(0.0, 0.0, 1.0);
        let bmp = r.rasterize(region_of(&page, "#r"), &opts).await.unwrap();
        assert_eq!(bmp.pixels().get_pixel(5, 5).0, [0, 0, 255, 255]);
    }

    #[tokio::test]
    async fn empty_region_is_rejected() {
        let page = Page::parse(r#"<div id="r"></div>"#);
        let r = LayoutRasterizer::default();
        let err = r
            .rasterize(region_of(&page, "#r"), &options(100.0, 0.0, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Rasterization(_)));
    }

    #[tokio::test]
    async fn overlong_canvas_fails_before_painting() {
        let page = Page::parse(r#"<div id="r" style="width: 200px; height: 40000px"></div>"#);
        let r = LayoutRasterizer::default();
        let err = r
            .rasterize(region_of(&page, "#r"), &options(200.0, 40_000.0, 2.0))
            .await
            .unwrap_err();
        match err {
            ConvertError::Rasterization(msg) => assert!(msg.contains("400x80000"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_paints_ink() {
        let page = Page::parse(r#"<div id="r" style="width: 200px">Hello world</div>"#);
        let r = LayoutRasterizer::default();
        let region = region_of(&page, "#r");
        let (w, h) = r.extent(region).unwrap();
        let bmp = r.rasterize(region, &options(w, h, 1.0)).await.unwrap();
        let dark = bmp.pixels().pixels().filter(|p| p.0[0] < 64).count();
        assert!(dark > 0, "expected some dark pixels from the text run");
    }

    #[tokio::test]
    async fn foreign_images_need_permission() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::from_pixel(4, 4, Rgba([0, 200, 0, 255]))
            .save(dir.path().join("dot.png"))
            .unwrap();
        let page = Page::parse(r#"<div id="r"><img src="dot.png" style="width: 20px; height: 20px"></div>"#)
            .with_base_dir(Some(dir.path().to_path_buf()));
        let r = LayoutRasterizer::default();
        let region = region_of(&page, "#r");
        let (w, h) = r.extent(region).unwrap();

        let allowed = r.rasterize(region, &options(w, h, 1.0)).await.unwrap();
        assert_eq!(allowed.pixels().get_pixel(10, 10).0, [0, 200, 0, 255]);

        let mut strict = options(w, h, 1.0);
        strict.allow_taint = false;
        strict.use_cors = false;
        let blocked = r.rasterize(region, &strict).await.unwrap();
        assert_ne!(blocked.pixels().get_pixel(10, 10).0, [0, 200, 0, 255]);
    }
}
