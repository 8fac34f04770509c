//! Text measurement for the rasterizer.
//!
//! Without a loaded face, widths use an average-advance heuristic
//! (0.5 × font size per char, 0.55 when bold). A TTF/OTF face loaded with
//! [`FontManager::load_font`] replaces the heuristic with real glyph advances
//! read through `ttf-parser`.

/// A loaded font face with its vertical metrics.
#[derive(Clone)]
struct Face {
    bytes: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
}

/// Measures text runs and wraps them to a width.
#[derive(Clone, Default)]
pub struct FontManager {
    face: Option<Face>,
}

impl FontManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF face used for all measurements.
    pub fn load_font(&mut self, bytes: Vec<u8>) -> Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| format!("Failed to parse font: {e}"))?;
        let units_per_em = face.units_per_em() as f32;
        let ascender = face.ascender() as f32;
        self.face = Some(Face {
            bytes,
            units_per_em,
            ascender,
        });
        Ok(())
    }

    pub fn has_real_font(&self) -> bool {
        self.face.is_some()
    }

    /// Width of `text` in px at `font_size`.
    pub fn measure(&self, text: &str, font_size: f32, bold: bool) -> f32 {
        let heuristic = |chars: usize| {
            let avg = if bold { 0.55 } else { 0.5 };
            chars as f32 * font_size * avg
        };

        let Some(face) = &self.face else {
            return heuristic(text.chars().count());
        };
        let Ok(parsed) = ttf_parser::Face::parse(&face.bytes, 0) else {
            return heuristic(text.chars().count());
        };

        let scale = font_size / face.units_per_em;
        text.chars()
            .map(|ch| {
                parsed
                    .glyph_index(ch)
                    .and_then(|gid| parsed.glyph_hor_advance(gid))
                    .map(|adv| adv as f32 * scale)
                    // Missing glyph
                    .unwrap_or(font_size * 0.5)
            })
            .sum()
    }

    /// Line box height in px.
    pub fn line_height_px(&self, font_size: f32, factor: f32) -> f32 {
        font_size * factor
    }

    /// Distance from the top of the em box to the baseline, in px.
    pub fn ascender_px(&self, font_size: f32) -> f32 {
        match &self.face {
            Some(f) => f.ascender * font_size / f.units_per_em,
            None => font_size * 0.75,
        }
    }
}

/// Greedy word wrap of `text` to `max_width` px. Explicit newlines always
/// break. Never returns an empty vector.
pub fn wrap_text(
    text: &str,
    font_size: f32,
    bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<String> {
    if max_width <= 0.0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{current} {word}");
            if fonts.measure(&candidate, font_size, bold) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let fonts = FontManager::default();
        // 5 chars × 16 × 0.5 = 40
        assert!((fonts.measure("Hello", 16.0, false) - 40.0).abs() < 0.1);
        assert!(fonts.measure("Hello", 16.0, true) > 40.0);
        assert!(!fonts.has_real_font());
    }

    #[test]
    fn wraps_on_width() {
        let fonts = FontManager::default();
        let lines = wrap_text("Hello world foo bar", 16.0, false, 60.0, &fonts);
        assert!(lines.len() >= 2, "Expected wrapping, got {lines:?}");
        assert!(lines.iter().all(|l| !l.is_empty()));
    }

    #[test]
    fn explicit_newlines_break() {
        let fonts = FontManager::default();
        let lines = wrap_text("a\nb", 16.0, false, 1000.0, &fonts);
        assert_eq!(lines, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_garbage_font_bytes() {
        let mut fonts = FontManager::new();
        assert!(fonts.load_font(vec![0, 1, 2, 3]).is_err());
        assert!(!fonts.has_real_font());
    }
}
