//! Image sources referenced by `<img src>` inside a region.
//!
//! Three kinds of source exist:
//! - `data:` URIs, decoded in place (always same-origin);
//! - relative or absolute file paths, resolved against the page's base
//!   directory (treated as foreign content, see [`ImageOrigin::Foreign`]);
//! - remote `http(s)://` URLs, which are never fetched.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::RgbaImage;

/// Where an image's bytes come from, relative to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
    /// Embedded in the page itself.
    Inline,
    /// A file next to the page. Drawing it taints the capture unless the
    /// caller allows it.
    Foreign(PathBuf),
    /// Network resource; not fetched.
    Remote,
}

impl ImageOrigin {
    pub fn classify(src: &str, base_dir: Option<&Path>) -> Self {
        if src.starts_with("data:") {
            return ImageOrigin::Inline;
        }
        let lower = src.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//") {
            return ImageOrigin::Remote;
        }
        let path = src.strip_prefix("file://").unwrap_or(src);
        let path = Path::new(path);
        if path.is_absolute() {
            ImageOrigin::Foreign(path.to_path_buf())
        } else {
            ImageOrigin::Foreign(base_dir.unwrap_or(Path::new(".")).join(path))
        }
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the decoded bytes.
pub fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src
        .strip_prefix("data:")
        .ok_or_else(|| "not a data URI".to_string())?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URI is missing the ',' separator".to_string())?;
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(payload.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

/// Decodes and caches the images of one region. Failures are cached too so
/// each source is attempted once.
pub struct ImageLoader {
    base_dir: Option<PathBuf>,
    cache: RefCell<HashMap<String, Option<Rc<RgbaImage>>>>,
}

impl ImageLoader {
    pub fn new(base_dir: Option<&Path>) -> Self {
        Self {
            base_dir: base_dir.map(Path::to_path_buf),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn origin(&self, src: &str) -> ImageOrigin {
        ImageOrigin::classify(src, self.base_dir.as_deref())
    }

    /// Decoded pixels for `src`, or `None` when it is remote or unreadable.
    pub fn load(&self, src: &str) -> Option<Rc<RgbaImage>> {
        if let Some(hit) = self.cache.borrow().get(src) {
            return hit.clone();
        }
        let loaded = match self.decode(src) {
            Ok(img) => Some(Rc::new(img)),
            Err(e) => {
                log::warn!("Skipping image: {e}");
                None
            }
        };
        self.cache.borrow_mut().insert(src.to_string(), loaded.clone());
        loaded
    }

    /// Intrinsic pixel size of `src`.
    pub fn dimensions(&self, src: &str) -> Option<(u32, u32)> {
        self.load(src).map(|img| img.dimensions())
    }

    fn decode(&self, src: &str) -> Result<RgbaImage, String> {
        let bytes = match self.origin(src) {
            ImageOrigin::Inline => parse_data_uri(src)?,
            ImageOrigin::Foreign(path) => std::fs::read(&path)
                .map_err(|e| format!("cannot read '{}': {e}", path.display()))?,
            ImageOrigin::Remote => return Err(format!("remote image not fetched: {src}")),
        };
        ::image::load_from_memory(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(|e| format!("decode error: {e}"))
    }
}

/// A solid-red PNG of the given size as a data URI.
#[cfg(test)]
pub(crate) fn png_data_uri(w: u32, h: u32) -> String {
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    let img = RgbaImage::from_pixel(w, h, Rgba([200, 10, 10, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
    format!("data:image/png;base64,{}", BASE64_STD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_sources() {
        let base = Path::new("/srv/page");
        assert_eq!(ImageOrigin::classify("data:image/png;base64,AA==", Some(base)), ImageOrigin::Inline);
        assert_eq!(ImageOrigin::classify("https://cdn.example/x.png", Some(base)), ImageOrigin::Remote);
        assert_eq!(
            ImageOrigin::classify("img/logo.png", Some(base)),
            ImageOrigin::Foreign(PathBuf::from("/srv/page/img/logo.png"))
        );
    }

    #[test]
    fn data_uri_errors() {
        assert!(parse_data_uri("logo.png").is_err());
        assert!(parse_data_uri("data:image/png;base64").is_err());
        assert!(parse_data_uri("data:text/plain,hello").is_err());
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
    }

    #[test]
    fn loads_and_caches_inline_png() {
        let loader = ImageLoader::new(None);
        let uri = png_data_uri(3, 2);
        assert_eq!(loader.dimensions(&uri), Some((3, 2)));
        assert_eq!(loader.cache.borrow().len(), 1);
        assert!(loader.load("https://example.com/a.png").is_none());
        assert!(loader.load("missing-file.png").is_none());
        assert_eq!(loader.cache.borrow().len(), 3);
    }
}
