//! The page-region-to-PDF converter.
//!
//! A [`Converter`] owns a parsed [`Page`] and two capabilities: a
//! [`Rasterizer`] that turns a region into one bitmap and a
//! [`DocumentWriterFactory`] that assembles the bitmap into pages. A
//! conversion runs strictly in order:
//!
//! ```text
//! resolve region → rasterize → compute page layout → emit pages → save
//! ```
//!
//! Every step reports to the [`StatusBoard`] and the log. Failures come back
//! as [`ConvertError`] and never panic.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::watch;

use crate::config::{ConfigOverrides, Configuration, Unit, DOCUMENT_AUTHOR, DOCUMENT_CREATOR};
use crate::dom::{Page, Region, RegionRef};
use crate::error::{ConvertError, Result};
use crate::pagination::PageLayout;
use crate::presets::Role;
use crate::raster::{LayoutRasterizer, RasterOptions, Rasterizer};
use crate::status::{Severity, StatusBoard, ERROR_CLEAR_DELAY, SUCCESS_CLEAR_DELAY};
use crate::style::Color;
use crate::writer::{
    Compression, DocumentMetadata, DocumentWriter, DocumentWriterFactory, ImageFormat,
    PdfWriterFactory, Placement,
};

pub const MSG_GENERATING: &str = "Generating PDF, please wait...";
pub const MSG_PROCESSING: &str = "Processing PDF content...";
pub const MSG_DOWNLOADING: &str = "PDF generated, downloading...";
pub const MSG_COMPLETE: &str = "PDF download complete!";

/// Alias under which the region bitmap is embedded; every page reuses it.
const PAGE_IMAGE_ALIAS: &str = "region";

/// Where a conversion is. Transitions are logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvertStage {
    /// No conversion has started yet.
    #[default]
    Idle,
    ResolvingRegion,
    Rasterizing,
    ComputingLayout,
    Assembling,
    Saving,
    Succeeded,
    Failed,
}

impl fmt::Display for ConvertStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConvertStage::Idle => "idle",
            ConvertStage::ResolvingRegion => "resolving-region",
            ConvertStage::Rasterizing => "rasterizing",
            ConvertStage::ComputingLayout => "computing-layout",
            ConvertStage::Assembling => "assembling",
            ConvertStage::Saving => "saving",
            ConvertStage::Succeeded => "succeeded",
            ConvertStage::Failed => "failed",
        })
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub filename: String,
    /// Where the document was written.
    pub path: PathBuf,
    pub page_count: usize,
    pub layout: PageLayout,
}

pub struct Converter<R, W> {
    page: Page,
    rasterizer: R,
    writers: W,
    status: StatusBoard,
    /// `None` until [`Converter::initialize`] has run.
    ready: watch::Sender<Option<bool>>,
    /// Stage of the most recent conversion.
    stage: watch::Sender<ConvertStage>,
}

impl Converter<LayoutRasterizer, PdfWriterFactory> {
    /// Converter with the built-in rasterizer and PDF writer.
    pub fn with_defaults(page: Page, status: StatusBoard) -> Self {
        Self::new(page, LayoutRasterizer::default(), PdfWriterFactory, status)
    }
}

impl<R: Rasterizer, W: DocumentWriterFactory> Converter<R, W> {
    pub fn new(page: Page, rasterizer: R, writers: W, status: StatusBoard) -> Self {
        let (ready, _) = watch::channel(None);
        let (stage, _) = watch::channel(ConvertStage::Idle);
        Self {
            page,
            rasterizer,
            writers,
            status,
            ready,
            stage,
        }
    }

    /// Stage the most recent conversion reached; `Idle` before the first.
    pub fn stage(&self) -> ConvertStage {
        *self.stage.borrow()
    }

    /// Check both capabilities and record the outcome.
    pub fn initialize(&self) -> bool {
        let ok = if !self.rasterizer.is_available() {
            log::error!("Rasterizer is not available; PDF conversion disabled");
            false
        } else if !self.writers.is_available() {
            log::error!("Document writer is not available; PDF conversion disabled");
            false
        } else {
            log::info!("PDF converter initialized");
            true
        };
        self.ready.send_replace(Some(ok));
        ok
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow() == Some(true)
    }

    /// Wait until [`Converter::initialize`] has run and return its outcome.
    pub async fn wait_ready(&self) -> bool {
        let mut rx = self.ready.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => *outcome,
            Err(_) => None,
        };
        outcome == Some(true)
    }

    /// Whether 2D drawing works here. Advisory; conversions are attempted
    /// regardless.
    pub fn check_compatibility(&self) -> bool {
        let ok = self.rasterizer.probe_2d();
        if !ok {
            log::warn!("2D drawing probe failed; conversions may not work");
        }
        ok
    }

    /// Capture `region` and write it out as a PDF.
    pub async fn convert<'a>(
        &self,
        region: impl Into<RegionRef<'a>>,
        overrides: &ConfigOverrides,
    ) -> Result<ConversionReport> {
        if !self.is_ready() {
            log::error!("PDF converter is not initialized");
            return Err(ConvertError::NotReady);
        }
        let region = region.into();

        match self.run(region, overrides).await {
            Ok(report) => {
                self.enter(ConvertStage::Succeeded);
                Ok(report)
            }
            Err(e) => {
                self.enter(ConvertStage::Failed);
                log::error!("PDF generation failed ({}): {e}", e.kind());
                self.status
                    .show(&format!("PDF generation failed: {e}"), Severity::Error);
                self.status.schedule_clear(ERROR_CLEAR_DELAY);
                Err(e)
            }
        }
    }

    /// Capture the content panel of a known page role.
    pub async fn convert_region_by_role(
        &self,
        role: Role,
        filename: Option<&str>,
    ) -> Result<ConversionReport> {
        self.convert_role_with(role, filename, &ConfigOverrides::default())
            .await
    }

    /// Like [`Converter::convert_region_by_role`], with `extra` overrides
    /// taking precedence over the role's preset.
    pub async fn convert_role_with(
        &self,
        role: Role,
        filename: Option<&str>,
        extra: &ConfigOverrides,
    ) -> Result<ConversionReport> {
        let preset = role.preset();
        let Some(element) = self.page.query_selector(preset.selector) else {
            log::error!("No element matches '{}' for role {role}", preset.selector);
            self.status.show(preset.not_found_message, Severity::Error);
            self.status.schedule_clear(ERROR_CLEAR_DELAY);
            return Err(ConvertError::RegionNotFound(preset.selector.to_string()));
        };
        let overrides = ConfigOverrides {
            filename: None,
            ..extra.clone()
        }
        .or(preset.overrides(filename));
        self.convert(element, &overrides).await
    }

    fn enter(&self, stage: ConvertStage) {
        log::debug!("Conversion stage: {stage}");
        self.stage.send_replace(stage);
    }

    fn resolve<'a>(&'a self, region: RegionRef<'a>) -> Option<Region<'a>> {
        let element = match region {
            RegionRef::Selector(selector) => self.page.query_selector(selector)?,
            RegionRef::Element(element) => element,
        };
        Some(Region {
            element,
            page: &self.page,
        })
    }

    async fn run(
        &self,
        region_ref: RegionRef<'_>,
        overrides: &ConfigOverrides,
    ) -> Result<ConversionReport> {
        self.enter(ConvertStage::ResolvingRegion);
        let region = self
            .resolve(region_ref)
            .ok_or_else(|| ConvertError::RegionNotFound(region_ref.describe()))?;
        let config = Configuration::merged(overrides);

        self.status.show(MSG_GENERATING, Severity::Loading);
        self.enter(ConvertStage::Rasterizing);
        let (width, height) = self.rasterizer.extent(region)?;
        let background = Color::parse(&config.background_color).unwrap_or_else(|| {
            log::warn!(
                "Unrecognised background colour '{}', using white",
                config.background_color
            );
            Color::WHITE
        });
        let options = RasterOptions {
            allow_taint: config.allow_taint,
            use_cors: config.use_cors,
            scale: config.scale,
            background,
            width,
            height,
        };
        let bitmap = self.rasterizer.rasterize(region, &options).await?;
        log::debug!(
            "Region {} rasterized to {}x{} px",
            region_ref.describe(),
            bitmap.width(),
            bitmap.height()
        );

        self.status.show(MSG_PROCESSING, Severity::Loading);
        self.enter(ConvertStage::ComputingLayout);
        let (page_width, page_height) = config.page_size.oriented_pt(config.orientation);
        let layout = PageLayout::compute(
            bitmap.width(),
            bitmap.height(),
            page_width,
            page_height,
            config.margin,
        )
        .map_err(ConvertError::Assembly)?;

        self.enter(ConvertStage::Assembling);
        let mut writer = self
            .writers
            .create(config.orientation, Unit::Pt, config.page_size)
            .map_err(ConvertError::Assembly)?;
        writer.set_metadata(&DocumentMetadata {
            title: config.title.clone(),
            subject: config.title.clone(),
            author: DOCUMENT_AUTHOR.to_string(),
            creator: DOCUMENT_CREATOR.to_string(),
        });

        let jpeg = bitmap.to_jpeg(config.quality).map_err(ConvertError::Assembly)?;
        for i in 0..layout.page_count {
            if i > 0 {
                writer.add_page();
            }
            let placement = Placement {
                x: config.margin,
                y: layout.image_y(i, config.slice_pages),
                width: layout.fitted_width,
                height: layout.fitted_height,
            };
            writer
                .add_image(
                    &jpeg,
                    ImageFormat::Jpeg,
                    placement,
                    PAGE_IMAGE_ALIAS,
                    Compression::Fast,
                )
                .map_err(ConvertError::Assembly)?;
        }

        self.status.show(MSG_DOWNLOADING, Severity::Success);
        self.enter(ConvertStage::Saving);
        let path = writer
            .save(&config.out_dir.join(&config.filename))
            .await
            .map_err(ConvertError::Assembly)?;

        self.status.show(MSG_COMPLETE, Severity::Success);
        self.status.schedule_clear(SUCCESS_CLEAR_DELAY);
        Ok(ConversionReport {
            filename: config.filename,
            path,
            page_count: layout.page_count,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::status::MemorySink;

    fn converter(html: &str) -> Converter<LayoutRasterizer, PdfWriterFactory> {
        Converter::with_defaults(Page::parse(html), StatusBoard::detached())
    }

    #[test]
    fn stage_names() {
        assert_eq!(ConvertStage::ResolvingRegion.to_string(), "resolving-region");
        assert_eq!(ConvertStage::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn wait_ready_resolves_after_initialize() {
        let c = Arc::new(converter("<p>x</p>"));
        let waiter = {
            let c = c.clone();
            tokio::spawn(async move { c.wait_ready().await })
        };
        tokio::task::yield_now().await;
        assert!(!c.is_ready());
        assert!(c.initialize());
        assert!(waiter.await.unwrap());
        assert!(c.is_ready());
    }

    #[tokio::test]
    async fn uninitialized_converter_refuses() {
        let c = converter("<p>x</p>");
        let err = c.convert("body", &ConfigOverrides::default()).await.unwrap_err();
        assert_eq!(err, ConvertError::NotReady);
    }

    #[test]
    fn default_rasterizer_passes_probe() {
        assert!(converter("<p>x</p>").check_compatibility());
    }

    #[tokio::test]
    async fn converts_a_region_to_a_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::new());
        let c = Converter::with_defaults(
            Page::parse(
                r#"<div id="doc" style="width: 300px; padding: 10px">
                    <h1>Title</h1><p>Some body text for the region.</p>
                </div>"#,
            ),
            StatusBoard::new(sink.clone()),
        );
        assert!(c.initialize());

        let overrides = ConfigOverrides {
            filename: Some("region.pdf".into()),
            out_dir: Some(dir.path().to_path_buf()),
            ..ConfigOverrides::default()
        };
        let report = c.convert("#doc", &overrides).await.unwrap();
        assert_eq!(report.filename, "region.pdf");
        assert_eq!(report.page_count, 1);
        assert_eq!(report.path, dir.path().join("region.pdf"));
        assert!(std::fs::read(&report.path).unwrap().starts_with(b"%PDF-"));

        let messages: Vec<String> = sink.history().into_iter().map(|s| s.message).collect();
        assert_eq!(
            messages,
            vec![MSG_GENERATING, MSG_PROCESSING, MSG_DOWNLOADING, MSG_COMPLETE]
        );
    }
}
