//! In-memory raster grids: multi-band images and elevation models.

use crate::transform::GeoTransform;
use crate::{RasterError, Result};
use chrono::NaiveDate;
use ndarray::{s, Array2, Array3, ArrayView2};

/// Coordinate-reference identifiers whose units are degrees rather than metres.
const GEOGRAPHIC_CRS: &[&str] = &["EPSG:4326", "EPSG:4269", "EPSG:4258", "EPSG:4283", "OGC:CRS84"];

/// Returns true when a CRS identifier names a geographic (degree-based) reference.
pub fn is_geographic_crs(crs: &str) -> bool {
    let crs = crs.trim();
    GEOGRAPHIC_CRS.iter().any(|known| known.eq_ignore_ascii_case(crs))
}

// ============================================================================
// Bounds and windows
// ============================================================================

/// Axis-aligned world-coordinate rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// West edge.
    pub min_x: f64,
    /// South edge.
    pub min_y: f64,
    /// East edge.
    pub max_x: f64,
    /// North edge.
    pub max_y: f64,
}

impl Bounds {
    /// Create bounds from two corners in any order.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    /// Check if a coordinate is within the bounds.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Width along X.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height along Y.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Rectangular pixel window within a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    /// First row.
    pub row_off: usize,
    /// First column.
    pub col_off: usize,
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl PixelWindow {
    /// Window covering a whole `rows x cols` grid.
    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            row_off: 0,
            col_off: 0,
            rows,
            cols,
        }
    }
}

/// World bounds of a `rows x cols` grid under `transform`.
fn grid_bounds(transform: &GeoTransform, rows: usize, cols: usize) -> Bounds {
    let corners = [
        transform.apply(0.0, 0.0),
        transform.apply(cols as f64, 0.0),
        transform.apply(0.0, rows as f64),
        transform.apply(cols as f64, rows as f64),
    ];
    let mut bounds = Bounds::new(corners[0].0, corners[0].1, corners[3].0, corners[3].1);
    for (x, y) in corners {
        bounds.min_x = bounds.min_x.min(x);
        bounds.min_y = bounds.min_y.min(y);
        bounds.max_x = bounds.max_x.max(x);
        bounds.max_y = bounds.max_y.max(y);
    }
    bounds
}

// ============================================================================
// Raster image
// ============================================================================

/// Immutable multi-band image with georeferencing.
///
/// Pixel data is stored as `(band, row, col)`. The CRS is optional here so that
/// inputs with missing metadata can still be represented; the water extractor
/// rejects them.
#[derive(Debug, Clone)]
pub struct RasterImage {
    id: String,
    date: Option<NaiveDate>,
    bands: Array3<f32>,
    transform: GeoTransform,
    crs: Option<String>,
    band_labels: Vec<Option<String>>,
}

impl RasterImage {
    /// Create an image from a `(band, row, col)` array.
    pub fn new(id: impl Into<String>, bands: Array3<f32>, transform: GeoTransform) -> Self {
        let count = bands.shape()[0];
        Self {
            id: id.into(),
            date: None,
            bands,
            transform,
            crs: None,
            band_labels: vec![None; count],
        }
    }

    /// Create an image from separate single-band grids of equal shape.
    pub fn from_bands(
        id: impl Into<String>,
        bands: &[Array2<f32>],
        transform: GeoTransform,
    ) -> Result<Self> {
        let (rows, cols) = bands.first().map(|b| b.dim()).unwrap_or((0, 0));
        let mut stack = Array3::<f32>::zeros((bands.len(), rows, cols));
        for (i, band) in bands.iter().enumerate() {
            if band.dim() != (rows, cols) {
                return Err(RasterError::ShapeMismatch {
                    expected: vec![rows, cols],
                    actual: band.shape().to_vec(),
                });
            }
            stack.slice_mut(s![i, .., ..]).assign(band);
        }
        Ok(Self::new(id, stack, transform))
    }

    /// Attach a coordinate-reference identifier (e.g. `EPSG:32644`).
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Attach per-band labels. Missing trailing labels are left empty.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let count = self.band_count();
        let mut out: Vec<Option<String>> = labels.into_iter().map(|l| l.map(Into::into)).collect();
        out.resize(count, None);
        out.truncate(count);
        self.band_labels = out;
        self
    }

    /// Attach an acquisition date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Image identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acquisition date, if known.
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    /// Coordinate-reference identifier, if known.
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// Affine transform.
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Per-band labels.
    pub fn band_labels(&self) -> &[Option<String>] {
        &self.band_labels
    }

    /// Number of bands.
    pub fn band_count(&self) -> usize {
        self.bands.shape()[0]
    }

    /// Grid shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        let shape = self.bands.shape();
        (shape[1], shape[2])
    }

    /// The full `(band, row, col)` stack.
    pub fn bands(&self) -> &Array3<f32> {
        &self.bands
    }

    /// One band as a 2D view.
    pub fn band(&self, index: usize) -> Result<ArrayView2<'_, f32>> {
        if index >= self.band_count() {
            return Err(RasterError::BandOutOfRange {
                index,
                count: self.band_count(),
            });
        }
        Ok(self.bands.slice(s![index, .., ..]))
    }

    /// World bounds of the grid.
    pub fn bounds(&self) -> Bounds {
        let (rows, cols) = self.shape();
        grid_bounds(&self.transform, rows, cols)
    }
}

// ============================================================================
// Elevation raster
// ============================================================================

/// Single-band elevation grid in a metric coordinate reference.
///
/// Loaded once per run and shared read-only across images.
#[derive(Debug, Clone)]
pub struct ElevationRaster {
    data: Array2<f32>,
    transform: GeoTransform,
    crs: Option<String>,
    no_data_value: Option<f32>,
}

impl ElevationRaster {
    /// Create an elevation raster.
    pub fn new(data: Array2<f32>, transform: GeoTransform) -> Self {
        Self {
            data,
            transform,
            crs: None,
            no_data_value: None,
        }
    }

    /// Attach a coordinate-reference identifier.
    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = Some(crs.into());
        self
    }

    /// Attach a no-data value.
    pub fn with_no_data(mut self, value: f32) -> Self {
        self.no_data_value = Some(value);
        self
    }

    /// Elevation grid.
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    /// Affine transform.
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Coordinate-reference identifier, if known.
    pub fn crs(&self) -> Option<&str> {
        self.crs.as_deref()
    }

    /// No-data value, if any.
    pub fn no_data_value(&self) -> Option<f32> {
        self.no_data_value
    }

    /// Grid shape as `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Ground area of one pixel in squared CRS units.
    pub fn pixel_area(&self) -> f64 {
        self.transform.pixel_area()
    }

    /// Whether a sample is a usable elevation.
    ///
    /// Values at or below zero are DEM background, not basin floor.
    #[inline]
    pub fn is_valid(&self, value: f32) -> bool {
        if !value.is_finite() || value <= 0.0 {
            return false;
        }
        match self.no_data_value {
            Some(nodata) => (value - nodata).abs() >= 0.001,
            None => true,
        }
    }

    /// Iterator over valid samples.
    pub fn valid_samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().copied().filter(|v| self.is_valid(*v))
    }

    /// World bounds of the grid.
    pub fn bounds(&self) -> Bounds {
        let (rows, cols) = self.shape();
        grid_bounds(&self.transform, rows, cols)
    }

    /// Pixel window covering `bounds`, clipped to the grid.
    ///
    /// Returns `None` when the bounds do not overlap the grid.
    pub fn window_for(&self, bounds: &Bounds) -> Option<PixelWindow> {
        let (rows, cols) = self.shape();
        let corners = [
            (bounds.min_x, bounds.min_y),
            (bounds.min_x, bounds.max_y),
            (bounds.max_x, bounds.min_y),
            (bounds.max_x, bounds.max_y),
        ];

        let mut col_min = f64::INFINITY;
        let mut col_max = f64::NEG_INFINITY;
        let mut row_min = f64::INFINITY;
        let mut row_max = f64::NEG_INFINITY;
        for (x, y) in corners {
            let (col, row) = self.transform.invert(x, y)?;
            col_min = col_min.min(col);
            col_max = col_max.max(col);
            row_min = row_min.min(row);
            row_max = row_max.max(row);
        }

        let c0 = col_min.floor().max(0.0);
        let r0 = row_min.floor().max(0.0);
        let c1 = col_max.ceil().min(cols as f64);
        let r1 = row_max.ceil().min(rows as f64);
        if c1 <= c0 || r1 <= r0 {
            return None;
        }

        Some(PixelWindow {
            row_off: r0 as usize,
            col_off: c0 as usize,
            rows: (r1 - r0) as usize,
            cols: (c1 - c0) as usize,
        })
    }

    /// Copy of a pixel window with its transform shifted accordingly.
    pub fn crop(&self, window: &PixelWindow) -> Result<Self> {
        let (rows, cols) = self.shape();
        if window.row_off + window.rows > rows || window.col_off + window.cols > cols {
            return Err(RasterError::ShapeMismatch {
                expected: vec![rows, cols],
                actual: vec![window.row_off + window.rows, window.col_off + window.cols],
            });
        }
        let data = self
            .data
            .slice(s![
                window.row_off..window.row_off + window.rows,
                window.col_off..window.col_off + window.cols
            ])
            .to_owned();
        Ok(Self {
            data,
            transform: self.transform.offset(window.col_off, window.row_off),
            crs: self.crs.clone(),
            no_data_value: self.no_data_value,
        })
    }
}
