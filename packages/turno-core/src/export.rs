/// Export pagination: how a full-page snapshot image is sliced across
/// document pages. Rendering itself belongs to the presentation layer.
pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;

/// A trailing slice shorter than this (in page units) is not worth a page.
const MIN_TRAILING_SLICE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    /// Image height once scaled to the page width, in page units.
    pub image_height: f64,
    /// Vertical offset into the scaled image where each page starts.
    pub page_offsets: Vec<f64>,
}

impl Pagination {
    pub fn page_count(&self) -> usize {
        self.page_offsets.len()
    }
}

/// Slice an `image_w` x `image_h` pixel snapshot onto pages of
/// `page_w` x `page_h`. Degenerate inputs yield a single empty page.
pub fn paginate(image_w: u32, image_h: u32, page_w: f64, page_h: f64) -> Pagination {
    if image_w == 0 || page_w <= 0.0 || page_h <= 0.0 {
        return Pagination {
            image_height: 0.0,
            page_offsets: vec![0.0],
        };
    }

    let image_height = f64::from(image_h) * page_w / f64::from(image_w);
    let mut page_offsets = vec![0.0];
    let mut y = page_h;
    while y < image_height - MIN_TRAILING_SLICE {
        page_offsets.push(y);
        y += page_h;
    }

    Pagination {
        image_height,
        page_offsets,
    }
}

/// Paginate onto portrait A4.
pub fn paginate_a4(image_w: u32, image_h: u32) -> Pagination {
    paginate(image_w, image_h, A4_WIDTH_MM, A4_HEIGHT_MM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_image_fits_one_page() {
        let pages = paginate_a4(1000, 1200);
        assert_eq!(pages.page_count(), 1);
        assert!((pages.image_height - 252.0).abs() < 1e-9);
    }

    #[test]
    fn test_long_image_spans_pages() {
        // 210 x 700 mm once scaled
        let pages = paginate(300, 1000, 210.0, 297.0);
        assert_eq!(pages.page_offsets, vec![0.0, 297.0, 594.0]);
    }

    #[test]
    fn test_sliver_does_not_add_page() {
        // 210 x 600 mm: the third slice would be 6 mm tall
        let pages = paginate(210, 600, 210.0, 297.0);
        assert_eq!(pages.page_count(), 2);
    }

    #[test]
    fn test_degenerate_input() {
        assert_eq!(paginate(0, 100, 210.0, 297.0).page_count(), 1);
    }
}
