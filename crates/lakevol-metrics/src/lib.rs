//! Metric definitions for lakevol analysis runs.
//!
//! Every metric the pipeline records is declared once here as a [`Metric`]
//! constant so names, units and label keys stay consistent. The `metrics`
//! crate is re-exported; without an installed recorder all calls are no-ops.
//!
//! # Example
//!
//! ```rust
//! use lakevol_metrics::{metric_defs, describe_metrics, RunLabels};
//!
//! describe_metrics();
//!
//! let labels = RunLabels::new("basin_dem.tif", "largest-only");
//! metrics::counter!(metric_defs::IMAGES_PROCESSED.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use lakevol_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const SCENES: Metric = Metric::counter("lakevol.test.scenes")
///     .with_description("Scenes seen")
///     .with_unit(Unit::Count)
///     .with_labels(&["dem"]);
///
/// assert_eq!(SCENES.kind, MetricKind::Counter);
/// assert_eq!(SCENES.unit_str(), "count");
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name, dotted (`lakevol.<area>.<what>`).
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement, if any.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Declare a counter.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Declare a gauge.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Declare a histogram.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Set the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(self.name, unit, self.description),
            (MetricKind::Counter, None) => describe_counter!(self.name, self.description),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(self.name, unit, self.description),
            (MetricKind::Gauge, None) => describe_gauge!(self.name, self.description),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(self.name, unit, self.description),
            (MetricKind::Histogram, None) => describe_histogram!(self.name, self.description),
        }
    }

    /// Unit as a short string, empty when unset.
    pub fn unit_str(&self) -> &'static str {
        match self.unit {
            Some(unit) => unit.as_str(),
            None => "",
        }
    }
}

/// All metrics recorded by the analysis pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Label Keys
    // ========================================================================

    /// Labels present on every run-scoped metric.
    pub const RUN_LABELS: &[&str] = &["dem", "policy"];

    // ========================================================================
    // Image Metrics
    // ========================================================================

    /// Images that produced a result.
    ///
    /// Labels: dem, policy, cloud_strategy, reliability
    pub const IMAGES_PROCESSED: Metric = Metric::counter("lakevol.images.processed")
        .with_description("Images that produced an analysis result")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy", "cloud_strategy", "reliability"]);

    /// Images that failed input validation or loading.
    ///
    /// Labels: dem, policy, reason
    pub const IMAGES_FAILED: Metric = Metric::counter("lakevol.images.failed")
        .with_description("Images rejected before analysis")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy", "reason"]);

    /// Images where the cloud model was wanted but could not be used.
    pub const CLOUD_DEGRADED: Metric = Metric::counter("lakevol.cloud.degraded")
        .with_description("Images analysed without any cloud mask")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy"]);

    /// Time spent extracting water from one image.
    pub const EXTRACT_TIME: Metric = Metric::histogram("lakevol.water.extract_seconds")
        .with_description("Water extraction time per image")
        .with_unit(Unit::Seconds)
        .with_labels(&["dem", "policy"]);

    /// Selected water area per image.
    pub const WATER_AREA: Metric = Metric::histogram("lakevol.water.area_ha")
        .with_description("Selected water area per image in hectares")
        .with_labels(&["dem", "policy"]);

    // ========================================================================
    // Curve Metrics
    // ========================================================================

    /// Volume curves built from a DEM.
    ///
    /// Labels: dem, policy, floor
    pub const CURVE_BUILDS: Metric = Metric::counter("lakevol.curve.builds")
        .with_description("Volume curves built")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy", "floor"]);

    /// Curve requests answered from the cache.
    pub const CURVE_CACHE_HITS: Metric = Metric::counter("lakevol.curve.cache_hits")
        .with_description("Volume curve requests served from the cache")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy"]);

    /// Time spent building one curve.
    pub const CURVE_BUILD_TIME: Metric = Metric::histogram("lakevol.curve.build_seconds")
        .with_description("Volume curve build time")
        .with_unit(Unit::Seconds)
        .with_labels(&["dem", "policy"]);

    /// Lookups clamped to the top of the curve.
    pub const VOLUME_OVER_RANGE: Metric = Metric::counter("lakevol.volume.over_range")
        .with_description("Observed areas larger than the volume curve")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy"]);

    // ========================================================================
    // Frequency Metrics
    // ========================================================================

    /// Masks left out of the frequency map because their grid differed.
    pub const FREQUENCY_SKIPPED: Metric = Metric::counter("lakevol.frequency.skipped")
        .with_description("Water masks skipped by the frequency map")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy"]);

    /// Images folded into the frequency map.
    pub const FREQUENCY_IMAGES: Metric = Metric::gauge("lakevol.frequency.images")
        .with_description("Images accumulated in the frequency map")
        .with_unit(Unit::Count)
        .with_labels(&["dem", "policy"]);

    /// Every metric above.
    pub const ALL: &[&Metric] = &[
        &IMAGES_PROCESSED,
        &IMAGES_FAILED,
        &CLOUD_DEGRADED,
        &EXTRACT_TIME,
        &WATER_AREA,
        &CURVE_BUILDS,
        &CURVE_CACHE_HITS,
        &CURVE_BUILD_TIME,
        &VOLUME_OVER_RANGE,
        &FREQUENCY_SKIPPED,
        &FREQUENCY_IMAGES,
    ];
}

/// Labels identifying one analysis run.
///
/// ```rust
/// use lakevol_metrics::RunLabels;
///
/// let labels = RunLabels::new("basin.tif", "merge-all");
/// let extended = labels.with(&[("reason", "missing_crs".to_string())]);
/// assert_eq!(extended.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLabels {
    /// DEM the run measures against.
    pub dem: String,
    /// Polygon policy in effect.
    pub policy: String,
}

impl RunLabels {
    /// Create labels for a run.
    pub fn new(dem: impl Into<String>, policy: impl Into<String>) -> Self {
        Self {
            dem: dem.into(),
            policy: policy.into(),
        }
    }

    /// Labels in `metrics` crate form.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("dem", self.dem.clone()), ("policy", self.policy.clone())]
    }

    /// Labels plus extra key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describe every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
