//! # region-pdf – capture a region of an HTML page as a paginated PDF
//!
//! The conversion pipeline stages are:
//!
//! 1. **Resolve** – find the region element in the parsed page ([`dom`])
//! 2. **Rasterize** – lay the region out with Taffy ([`layout`]) and paint it
//!    into one bitmap ([`raster`])
//! 3. **Paginate** – fit the bitmap to the page width and count pages
//!    ([`pagination`])
//! 4. **Assemble** – place the bitmap on every page and save the PDF via
//!    printpdf ([`writer`])
//!
//! [`converter::Converter`] drives the stages and reports progress through a
//! [`status::StatusBoard`].

pub mod config;
pub mod converter;
pub mod dom;
pub mod error;
pub mod fonts;
pub mod images;
pub mod layout;
pub mod pagination;
pub mod presets;
pub mod raster;
pub mod status;
pub mod style;
pub mod templates;
pub mod writer;

// Re-exports for convenience
pub use config::{ConfigOverrides, Configuration, Orientation, PageSize, Unit};
pub use converter::{ConversionReport, ConvertStage, Converter};
pub use dom::{Page, RegionRef};
pub use error::ConvertError;
pub use presets::Role;
pub use status::{Severity, Status, StatusBoard};
