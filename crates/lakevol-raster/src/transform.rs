//! Affine pixel-to-world transforms.

/// Affine transform from pixel space (col, row) to world coordinates (x, y).
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// `(col, row) = (0, 0)` is the outer corner of the top-left pixel. North-up
/// rasters have zero rotation terms and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    /// X coordinate of the top-left corner.
    pub origin_x: f64,
    /// Y coordinate of the top-left corner.
    pub origin_y: f64,
    /// Pixel size along X.
    pub pixel_width: f64,
    /// Pixel size along Y (usually negative).
    pub pixel_height: f64,
    /// X shift per row.
    pub row_rotation: f64,
    /// Y shift per column.
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a north-up transform.
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL ordering `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL ordering.
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// World coordinates of a fractional pixel position.
    ///
    /// Integer arguments address pixel corners; add 0.5 for pixel centers.
    #[inline]
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// World coordinates of a pixel center.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Fractional pixel position of a world coordinate, or `None` for a singular transform.
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        Some((col, row))
    }

    /// Ground area covered by one pixel, `|Δx·Δy|` for north-up grids.
    pub fn pixel_area(&self) -> f64 {
        self.determinant().abs()
    }

    /// Transform of a sub-window starting at `(col_off, row_off)`.
    pub fn offset(&self, col_off: usize, row_off: usize) -> Self {
        let (origin_x, origin_y) = self.apply(col_off as f64, row_off as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    /// True when the grid is axis aligned.
    pub fn is_north_up(&self) -> bool {
        self.row_rotation.abs() < 1e-12 && self.col_rotation.abs() < 1e-12
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_area() {
        let t = GeoTransform::new(500_000.0, 1_200_000.0, 10.0, -10.0);
        assert_relative_eq!(t.pixel_area(), 100.0);

        let t = GeoTransform::new(0.0, 0.0, 30.0, -20.0);
        assert_relative_eq!(t.pixel_area(), 600.0);
    }

    #[test]
    fn test_apply_and_invert() {
        let t = GeoTransform::new(1000.0, 2000.0, 10.0, -10.0);
        assert_eq!(t.apply(0.0, 0.0), (1000.0, 2000.0));
        assert_eq!(t.apply(3.0, 2.0), (1030.0, 1980.0));
        assert_eq!(t.pixel_center(0, 0), (1005.0, 1995.0));

        let (col, row) = t.invert(1030.0, 1980.0).unwrap();
        assert_relative_eq!(col, 3.0);
        assert_relative_eq!(row, 2.0);
    }

    #[test]
    fn test_offset_window() {
        let t = GeoTransform::new(1000.0, 2000.0, 10.0, -10.0);
        let w = t.offset(5, 3);
        assert_eq!(w.origin_x, 1050.0);
        assert_eq!(w.origin_y, 1970.0);
        assert_eq!(w.pixel_width, 10.0);
        assert_eq!(w.pixel_height, -10.0);
    }

    #[test]
    fn test_gdal_ordering() {
        let coeffs = [100.0, 10.0, 0.5, 200.0, 0.25, -10.0];
        let t = GeoTransform::from_gdal(coeffs);
        assert_eq!(t.row_rotation, 0.5);
        assert_eq!(t.col_rotation, 0.25);
        assert!(!t.is_north_up());
        assert_eq!(t.to_gdal(), coeffs);
    }

    #[test]
    fn test_singular_transform() {
        let t = GeoTransform::new(0.0, 0.0, 0.0, -10.0);
        assert!(t.invert(1.0, 1.0).is_none());
    }
}
