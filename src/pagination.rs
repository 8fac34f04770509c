//! Pagination – fits one tall bitmap onto fixed-size pages.
//!
//! The bitmap is scaled to the printable width of the page; the resulting
//! height decides how many pages are needed. All lengths are in points.

/// Page geometry for one bitmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    /// Width of the placed image: page width minus both margins.
    pub fitted_width: f32,
    /// Height of the placed image, keeping the bitmap's aspect ratio.
    pub fitted_height: f32,
    /// Vertical space available per page: page height minus both margins.
    pub printable_height: f32,
    /// Always at least 1.
    pub page_count: usize,
}

impl PageLayout {
    pub fn compute(
        raster_width: u32,
        raster_height: u32,
        page_width: f32,
        page_height: f32,
        margin: f32,
    ) -> Result<Self, String> {
        if raster_width == 0 || raster_height == 0 {
            return Err(format!(
                "cannot paginate an empty bitmap ({raster_width}x{raster_height} px)"
            ));
        }
        let fitted_width = page_width - 2.0 * margin;
        let printable_height = page_height - 2.0 * margin;
        if !fitted_width.is_finite()
            || !printable_height.is_finite()
            || fitted_width <= 0.0
            || printable_height <= 0.0
        {
            return Err(format!(
                "margin of {margin} pt leaves no printable area on a {page_width}x{page_height} pt page"
            ));
        }

        let fitted_height = fitted_width * (raster_height as f32 / raster_width as f32);
        let page_count = ((fitted_height / printable_height).ceil() as usize).max(1);

        Ok(Self {
            page_width,
            page_height,
            margin,
            fitted_width,
            fitted_height,
            printable_height,
            page_count,
        })
    }

    /// Top edge of the image on page `index`, measured from the top of the
    /// page. Without slicing every page shows the image from its top; with
    /// slicing each page is shifted up by one printable height so the pages
    /// show consecutive bands.
    pub fn image_y(&self, index: usize, slice: bool) -> f32 {
        if slice {
            self.margin - index as f32 * self.printable_height
        } else {
            self.margin
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A4: (f32, f32) = (595.28, 841.89);

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn tall_bitmap_spans_three_a4_pages() {
        let layout = PageLayout::compute(1000, 4000, A4.0, A4.1, 10.0).unwrap();
        assert!(close(layout.fitted_width, 575.28));
        assert!(close(layout.fitted_height, 2301.12));
        assert!(close(layout.printable_height, 821.89));
        assert_eq!(layout.page_count, 3);
    }

    #[test]
    fn short_bitmap_still_gets_one_page() {
        let layout = PageLayout::compute(800, 10, A4.0, A4.1, 20.0).unwrap();
        assert_eq!(layout.page_count, 1);
    }

    #[test]
    fn exact_fit_does_not_add_a_page() {
        // 100 x 100 page, margin 0: a square bitmap fills exactly one page.
        let layout = PageLayout::compute(50, 50, 100.0, 100.0, 0.0).unwrap();
        assert_eq!(layout.page_count, 1);
        let layout = PageLayout::compute(50, 150, 100.0, 100.0, 0.0).unwrap();
        assert_eq!(layout.page_count, 3);
    }

    #[test]
    fn oversized_margin_is_rejected() {
        assert!(PageLayout::compute(100, 100, A4.0, A4.1, 300.0).is_err());
        assert!(PageLayout::compute(0, 100, A4.0, A4.1, 10.0).is_err());
    }

    #[test]
    fn non_finite_geometry_is_rejected() {
        assert!(PageLayout::compute(100, 100, A4.0, A4.1, f32::NAN).is_err());
        assert!(PageLayout::compute(100, 100, f32::INFINITY, A4.1, 10.0).is_err());
        assert!(PageLayout::compute(100, 100, A4.0, f32::NAN, 10.0).is_err());
    }

    #[test]
    fn image_offsets() {
        let layout = PageLayout::compute(1000, 4000, A4.0, A4.1, 10.0).unwrap();
        assert_eq!(layout.image_y(2, false), 10.0);
        assert!(close(layout.image_y(1, true), 10.0 - 821.89));
        assert!(close(layout.image_y(2, true), 10.0 - 2.0 * 821.89));
    }
}
