//! Document writer – assembles placed images into a paginated PDF.
//!
//! [`DocumentWriterFactory`] and [`DocumentWriter`] are the seam the
//! converter talks to; [`PdfWriter`] implements them with `printpdf`
//! (v0.8 ops-based API). Coordinates passed to a writer are in points,
//! measured from the top-left corner of the page.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use printpdf::*;

use crate::config::{Orientation, PageSize, Unit};

const MM_PER_PT: f32 = 0.352778;

/// Encoding of the bytes passed to [`DocumentWriter::add_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    fn matches(self, data: &[u8]) -> bool {
        match self {
            ImageFormat::Jpeg => data.starts_with(&[0xFF, 0xD8]),
            ImageFormat::Png => data.starts_with(b"\x89PNG"),
        }
    }
}

/// Compression hint for embedded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Fast,
}

/// Document information dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: String,
    pub subject: String,
    pub author: String,
    pub creator: String,
}

/// Where an image goes on the current page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One document under construction. A new document starts with one page.
pub trait DocumentWriter {
    fn set_metadata(&mut self, metadata: &DocumentMetadata);

    /// Append a page and make it current.
    fn add_page(&mut self);

    /// Draw an image on the current page. Images sharing an `alias` are
    /// embedded once.
    fn add_image(
        &mut self,
        data: &[u8],
        format: ImageFormat,
        placement: Placement,
        alias: &str,
        compression: Compression,
    ) -> Result<(), String>;

    /// Finish the document, write it to `path` and return the written path.
    fn save(&mut self, path: &Path) -> impl Future<Output = Result<PathBuf, String>>;
}

/// Creates [`DocumentWriter`]s.
pub trait DocumentWriterFactory {
    type Writer: DocumentWriter;

    /// Whether documents can be produced at all.
    fn is_available(&self) -> bool {
        true
    }

    fn create(
        &self,
        orientation: Orientation,
        unit: Unit,
        page_size: PageSize,
    ) -> Result<Self::Writer, String>;
}

/// Factory for [`PdfWriter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfWriterFactory;

impl DocumentWriterFactory for PdfWriterFactory {
    type Writer = PdfWriter;

    fn create(
        &self,
        orientation: Orientation,
        unit: Unit,
        page_size: PageSize,
    ) -> Result<PdfWriter, String> {
        let (width, height) = page_size.oriented_pt(orientation);
        match unit {
            Unit::Pt => Ok(PdfWriter::new(width, height)),
        }
    }
}

/// An embedded image together with its pixel dimensions.
struct XObjectEntry {
    id: XObjectId,
    px_width: usize,
    px_height: usize,
}

/// `printpdf`-backed writer. Pages are kept as op lists until save.
pub struct PdfWriter {
    doc: PdfDocument,
    page_width_pt: f32,
    page_height_pt: f32,
    pages: Vec<Vec<Op>>,
    xobjects: HashMap<String, XObjectEntry>,
}

impl PdfWriter {
    pub fn new(page_width_pt: f32, page_height_pt: f32) -> Self {
        Self {
            doc: PdfDocument::new(""),
            page_width_pt,
            page_height_pt,
            pages: vec![Vec::new()],
            xobjects: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of distinct embedded images.
    pub fn image_count(&self) -> usize {
        self.xobjects.len()
    }

    fn embed(&mut self, data: &[u8], alias: &str) -> Result<&XObjectEntry, String> {
        if !self.xobjects.contains_key(alias) {
            let mut warnings = Vec::new();
            let raw = RawImage::decode_from_bytes(data, &mut warnings)
                .map_err(|e| format!("image '{alias}' could not be embedded: {e}"))?;
            for w in &warnings {
                log::debug!("Image '{alias}': {w:?}");
            }
            let (px_width, px_height) = (raw.width, raw.height);
            let id = self.doc.add_image(&raw);
            self.xobjects.insert(
                alias.to_string(),
                XObjectEntry {
                    id,
                    px_width,
                    px_height,
                },
            );
        }
        self.xobjects
            .get(alias)
            .ok_or_else(|| format!("image '{alias}' is not registered"))
    }
}

impl DocumentWriter for PdfWriter {
    fn set_metadata(&mut self, metadata: &DocumentMetadata) {
        let info = &mut self.doc.metadata.info;
        info.document_title = metadata.title.clone();
        info.subject = metadata.subject.clone();
        info.author = metadata.author.clone();
        info.creator = metadata.creator.clone();
    }

    fn add_page(&mut self) {
        self.pages.push(Vec::new());
    }

    fn add_image(
        &mut self,
        data: &[u8],
        format: ImageFormat,
        placement: Placement,
        alias: &str,
        compression: Compression,
    ) -> Result<(), String> {
        if !format.matches(data) {
            return Err(format!("image '{alias}' is not {format:?} data"));
        }
        // JPEG streams are embedded as-is.
        log::trace!("Embedding '{alias}' with {compression:?} compression");

        let page_height_pt = self.page_height_pt;
        let entry = self.embed(data, alias)?;
        let Placement {
            x: x_pt,
            y: top_pt,
            width: w_pt,
            height: h_pt,
        } = placement;
        // PDF origin is bottom-left.
        let bottom_pt = page_height_pt - top_pt - h_pt;

        let op = Op::UseXobject {
            id: entry.id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(x_pt)),
                translate_y: Some(Pt(bottom_pt)),
                // At 72 dpi one image pixel is one point.
                dpi: Some(72.0),
                scale_x: Some(w_pt / entry.px_width.max(1) as f32),
                scale_y: Some(h_pt / entry.px_height.max(1) as f32),
                rotate: None,
            },
        };
        self.pages
            .last_mut()
            .ok_or_else(|| "document has no pages".to_string())?
            .push(op);
        Ok(())
    }

    async fn save(&mut self, path: &Path) -> Result<PathBuf, String> {
        if self.pages.is_empty() {
            return Err("document has no pages".to_string());
        }
        let page_w = Mm(self.page_width_pt * MM_PER_PT);
        let page_h = Mm(self.page_height_pt * MM_PER_PT);
        let pages = std::mem::take(&mut self.pages)
            .into_iter()
            .map(|ops| PdfPage::new(page_w, page_h, ops))
            .collect();
        self.doc.with_pages(pages);
        let bytes = self.doc.save(&PdfSaveOptions::default(), &mut Vec::new());

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| format!("cannot create '{}': {e}", dir.display()))?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| format!("cannot write '{}': {e}", path.display()))?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Bitmap;
    use crate::style::Color;

    fn jpeg() -> Vec<u8> {
        Bitmap::solid(40, 80, Color::rgb(0.1, 0.5, 0.9)).to_jpeg(0.9).unwrap()
    }

    fn place(y: f32) -> Placement {
        Placement {
            x: 10.0,
            y,
            width: 575.28,
            height: 1150.56,
        }
    }

    #[test]
    fn landscape_swaps_page_size() {
        let w = PdfWriterFactory
            .create(Orientation::Landscape, Unit::Pt, PageSize::A4)
            .unwrap();
        assert!(w.page_width_pt > w.page_height_pt);
        assert_eq!(w.page_count(), 1);
    }

    #[test]
    fn shared_alias_embeds_once() {
        let data = jpeg();
        let mut w = PdfWriterFactory
            .create(Orientation::Portrait, Unit::Pt, PageSize::A4)
            .unwrap();
        w.add_image(&data, ImageFormat::Jpeg, place(10.0), "page", Compression::Fast)
            .unwrap();
        w.add_page();
        w.add_image(&data, ImageFormat::Jpeg, place(10.0), "page", Compression::Fast)
            .unwrap();
        assert_eq!(w.page_count(), 2);
        assert_eq!(w.image_count(), 1);
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let mut w = PdfWriter::new(100.0, 100.0);
        let err = w
            .add_image(b"not an image", ImageFormat::Jpeg, place(0.0), "x", Compression::Fast)
            .unwrap_err();
        assert!(err.contains("Jpeg"));
    }

    #[tokio::test]
    async fn save_writes_a_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.pdf");

        let mut w = PdfWriterFactory
            .create(Orientation::Portrait, Unit::Pt, PageSize::A4)
            .unwrap();
        w.set_metadata(&DocumentMetadata {
            title: "Test".into(),
            subject: "Test".into(),
            author: "Someone".into(),
            creator: "Tests".into(),
        });
        w.add_image(&jpeg(), ImageFormat::Jpeg, place(10.0), "page", Compression::Fast)
            .unwrap();

        let written = w.save(&target).await.unwrap();
        assert_eq!(written, target);
        let bytes = std::fs::read(&target).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
