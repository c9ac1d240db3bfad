//! Model Plot Result
//!
//! A model plot is the per-bucket, per-detector snapshot of what the model
//! expected (lower/upper bounds and median) next to what was observed. It is
//! optionally segmented by partition, over and by field values.
//!
//! Records are assembled through [`ModelPlotBuilder`] and are immutable once
//! built. The binary codec lives in `wire`, the structured view in `xcontent`.

use crate::error::RecordError;
use chrono::{DateTime, Utc};
use std::hash::{Hash, Hasher};

/// Result type tag of a model plot.
pub const RESULT_TYPE_VALUE: &str = "model_plot";

/// Detector index of records that predate per-detector tracking.
pub const UNKNOWN_DETECTOR_INDEX: i32 = -1;

/// Modeled interval and observed value of one bucket for one detector.
///
/// Built through [`ModelPlotBuilder`]; the finished value is read-only.
#[derive(Debug, Clone)]
pub struct ModelPlot {
    // === Identity ===
    /// Job that produced the result (never empty)
    pub(crate) job_id: String,
    /// Bucket start time (millisecond precision)
    pub(crate) timestamp: DateTime<Utc>,
    /// Bucket length in seconds (never negative)
    pub(crate) bucket_span: i64,
    /// Position of the detector in the job config, or [`UNKNOWN_DETECTOR_INDEX`]
    pub(crate) detector_index: i32,

    // === Segmentation ===
    /// Name of the partition field, if the detector partitions
    pub(crate) partition_field_name: Option<String>,
    /// Partition this plot belongs to
    pub(crate) partition_field_value: Option<String>,
    /// Name of the over field, for population detectors
    pub(crate) over_field_name: Option<String>,
    /// Population member this plot belongs to
    pub(crate) over_field_value: Option<String>,
    /// Name of the by field, if the detector splits by one
    pub(crate) by_field_name: Option<String>,
    /// By-field value this plot belongs to
    pub(crate) by_field_value: Option<String>,
    /// Modeled feature, e.g. `'mean value by person'`
    pub(crate) model_feature: Option<String>,

    // === Model ===
    /// Lower bound of the modeled interval
    pub(crate) model_lower: f64,
    /// Upper bound of the modeled interval (not checked against the lower bound)
    pub(crate) model_upper: f64,
    /// Modeled median
    pub(crate) model_median: f64,
    /// `None` for buckets where nothing was observed; the model still plots.
    pub(crate) actual: Option<f64>,
}

impl ModelPlot {
    /// Start a record from its identity fields.
    pub fn builder(
        job_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        bucket_span: i64,
        detector_index: i32,
    ) -> ModelPlotBuilder {
        ModelPlotBuilder::new(job_id, timestamp, bucket_span, detector_index)
    }

    /// Job that produced the result
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Bucket start time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Bucket length in seconds; `0` when decoded from a pre-5.5.0 payload
    pub fn bucket_span(&self) -> i64 {
        self.bucket_span
    }

    /// Detector position; `-1` when decoded from a pre-6.1.0 payload
    pub fn detector_index(&self) -> i32 {
        self.detector_index
    }

    /// Name of the partition field
    pub fn partition_field_name(&self) -> Option<&str> {
        self.partition_field_name.as_deref()
    }

    /// Partition field value
    pub fn partition_field_value(&self) -> Option<&str> {
        self.partition_field_value.as_deref()
    }

    /// Name of the over field
    pub fn over_field_name(&self) -> Option<&str> {
        self.over_field_name.as_deref()
    }

    /// Over field value
    pub fn over_field_value(&self) -> Option<&str> {
        self.over_field_value.as_deref()
    }

    /// Name of the by field
    pub fn by_field_name(&self) -> Option<&str> {
        self.by_field_name.as_deref()
    }

    /// By field value
    pub fn by_field_value(&self) -> Option<&str> {
        self.by_field_value.as_deref()
    }

    /// Modeled feature
    pub fn model_feature(&self) -> Option<&str> {
        self.model_feature.as_deref()
    }

    /// Lower bound of the modeled interval
    pub fn model_lower(&self) -> f64 {
        self.model_lower
    }

    /// Upper bound of the modeled interval
    pub fn model_upper(&self) -> f64 {
        self.model_upper
    }

    /// Modeled median
    pub fn model_median(&self) -> f64 {
        self.model_median
    }

    /// Observed value, `None` if nothing was observed in the bucket
    pub fn actual(&self) -> Option<f64> {
        self.actual
    }

    /// Document id of this result.
    ///
    /// The by/over/partition values are folded into a 32-bit hash plus their
    /// total length instead of being spelled out. Distinct value triples with
    /// equal hash and equal length map to the same id; consumers deduplicate on
    /// this exact scheme, so it is kept as-is.
    pub fn id(&self) -> String {
        let values = [
            self.by_field_value.as_deref(),
            self.over_field_value.as_deref(),
            self.partition_field_value.as_deref(),
        ];
        let values_hash = values.iter().fold(1i32, |acc, v| {
            acc.wrapping_mul(31)
                .wrapping_add(v.map(string_hash).unwrap_or(0))
        });
        let length: usize = values
            .iter()
            .map(|v| v.map(|s| s.encode_utf16().count()).unwrap_or(0))
            .sum();

        format!(
            "{}_{}_{}_{}_{}_{}_{}",
            self.job_id,
            RESULT_TYPE_VALUE,
            self.timestamp.timestamp_millis(),
            self.bucket_span,
            self.detector_index,
            values_hash,
            length
        )
    }
}

/// 31-polynomial string hash over UTF-16 code units, as computed by every
/// other producer of model plot ids.
fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

impl PartialEq for ModelPlot {
    fn eq(&self, other: &Self) -> bool {
        let Self {
            job_id,
            timestamp,
            bucket_span,
            detector_index,
            partition_field_name,
            partition_field_value,
            over_field_name,
            over_field_value,
            by_field_name,
            by_field_value,
            model_feature,
            model_lower,
            model_upper,
            model_median,
            actual,
        } = self;

        *job_id == other.job_id
            && *timestamp == other.timestamp
            && *bucket_span == other.bucket_span
            && *detector_index == other.detector_index
            && *partition_field_name == other.partition_field_name
            && *partition_field_value == other.partition_field_value
            && *over_field_name == other.over_field_name
            && *over_field_value == other.over_field_value
            && *by_field_name == other.by_field_name
            && *by_field_value == other.by_field_value
            && *model_feature == other.model_feature
            && *model_lower == other.model_lower
            && *model_upper == other.model_upper
            && *model_median == other.model_median
            && actual.map(actual_bits) == other.actual.map(actual_bits)
    }
}

/// Bit pattern of a double with `-0.0` folded onto `0.0`, so values that
/// compare equal hash equally.
fn double_bits(v: f64) -> u64 {
    if v == 0.0 { 0 } else { v.to_bits() }
}

/// Identity bits of an observed value: every NaN is the same value, and
/// `-0.0` differs from `0.0`.
fn actual_bits(v: f64) -> u64 {
    if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() }
}

impl Hash for ModelPlot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let Self {
            job_id,
            timestamp,
            bucket_span,
            detector_index,
            partition_field_name,
            partition_field_value,
            over_field_name,
            over_field_value,
            by_field_name,
            by_field_value,
            model_feature,
            model_lower,
            model_upper,
            model_median,
            actual,
        } = self;

        job_id.hash(state);
        timestamp.hash(state);
        bucket_span.hash(state);
        detector_index.hash(state);
        partition_field_name.hash(state);
        partition_field_value.hash(state);
        over_field_name.hash(state);
        over_field_value.hash(state);
        by_field_name.hash(state);
        by_field_value.hash(state);
        model_feature.hash(state);
        double_bits(*model_lower).hash(state);
        double_bits(*model_upper).hash(state);
        double_bits(*model_median).hash(state);
        actual.map(actual_bits).hash(state);
    }
}

/// Accumulates the fields of a [`ModelPlot`] before it is frozen.
#[derive(Debug, Clone)]
pub struct ModelPlotBuilder {
    plot: ModelPlot,
}

impl ModelPlotBuilder {
    /// Start a builder; optional fields are absent and model values are zero.
    pub fn new(
        job_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        bucket_span: i64,
        detector_index: i32,
    ) -> Self {
        Self {
            plot: ModelPlot {
                job_id: job_id.into(),
                timestamp,
                bucket_span,
                detector_index,
                partition_field_name: None,
                partition_field_value: None,
                over_field_name: None,
                over_field_value: None,
                by_field_name: None,
                by_field_value: None,
                model_feature: None,
                model_lower: 0.0,
                model_upper: 0.0,
                model_median: 0.0,
                actual: None,
            },
        }
    }

    /// Set the partition field name
    pub fn partition_field_name(mut self, name: impl Into<String>) -> Self {
        self.plot.partition_field_name = Some(name.into());
        self
    }

    /// Set the partition field value
    pub fn partition_field_value(mut self, value: impl Into<String>) -> Self {
        self.plot.partition_field_value = Some(value.into());
        self
    }

    /// Set the over field name
    pub fn over_field_name(mut self, name: impl Into<String>) -> Self {
        self.plot.over_field_name = Some(name.into());
        self
    }

    /// Set the over field value
    pub fn over_field_value(mut self, value: impl Into<String>) -> Self {
        self.plot.over_field_value = Some(value.into());
        self
    }

    /// Set the by field name
    pub fn by_field_name(mut self, name: impl Into<String>) -> Self {
        self.plot.by_field_name = Some(name.into());
        self
    }

    /// Set the by field value
    pub fn by_field_value(mut self, value: impl Into<String>) -> Self {
        self.plot.by_field_value = Some(value.into());
        self
    }

    /// Set the modeled feature
    pub fn model_feature(mut self, feature: impl Into<String>) -> Self {
        self.plot.model_feature = Some(feature.into());
        self
    }

    /// Set the lower bound of the modeled interval
    pub fn model_lower(mut self, value: f64) -> Self {
        self.plot.model_lower = value;
        self
    }

    /// Set the upper bound of the modeled interval
    pub fn model_upper(mut self, value: f64) -> Self {
        self.plot.model_upper = value;
        self
    }

    /// Set the modeled median
    pub fn model_median(mut self, value: f64) -> Self {
        self.plot.model_median = value;
        self
    }

    /// Set the observed value; pass `None` for a bucket without data
    pub fn actual(mut self, value: impl Into<Option<f64>>) -> Self {
        self.plot.actual = value.into();
        self
    }

    // Optional-field setters for decoders, where absence is carried through.

    pub(crate) fn set_partition(&mut self, name: Option<String>, value: Option<String>) {
        self.plot.partition_field_name = name;
        self.plot.partition_field_value = value;
    }

    pub(crate) fn set_over(&mut self, name: Option<String>, value: Option<String>) {
        self.plot.over_field_name = name;
        self.plot.over_field_value = value;
    }

    pub(crate) fn set_by(&mut self, name: Option<String>, value: Option<String>) {
        self.plot.by_field_name = name;
        self.plot.by_field_value = value;
    }

    pub(crate) fn set_model_feature(&mut self, feature: Option<String>) {
        self.plot.model_feature = feature;
    }

    pub(crate) fn set_model(&mut self, lower: f64, upper: f64, median: f64) {
        self.plot.model_lower = lower;
        self.plot.model_upper = upper;
        self.plot.model_median = median;
    }

    /// Validate the identity fields and freeze the record
    pub fn build(self) -> Result<ModelPlot, RecordError> {
        if self.plot.job_id.is_empty() {
            return Err(RecordError::EmptyJobId);
        }
        if self.plot.bucket_span < 0 {
            return Err(RecordError::NegativeBucketSpan(self.plot.bucket_span));
        }
        Ok(self.plot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::DefaultHasher;

    fn ts(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    fn hash_of(plot: &ModelPlot) -> u64 {
        let mut h = DefaultHasher::new();
        plot.hash(&mut h);
        h.finish()
    }

    fn full() -> ModelPlotBuilder {
        ModelPlot::builder("job-1", ts(1000), 60, 0)
            .partition_field_name("part")
            .partition_field_value("p1")
            .over_field_name("over")
            .over_field_value("o1")
            .by_field_name("by")
            .by_field_value("b1")
            .model_feature("mean")
            .model_lower(1.0)
            .model_upper(3.0)
            .model_median(2.0)
            .actual(2.5)
    }

    #[test]
    fn test_builder_rejects_invalid_core() {
        assert_eq!(
            ModelPlot::builder("", ts(0), 60, 0).build().unwrap_err(),
            RecordError::EmptyJobId
        );
        assert_eq!(
            ModelPlot::builder("job", ts(0), -1, 0).build().unwrap_err(),
            RecordError::NegativeBucketSpan(-1)
        );
    }

    #[test]
    fn test_builder_defaults() {
        let plot = ModelPlot::builder("job", ts(0), 0, UNKNOWN_DETECTOR_INDEX)
            .build()
            .unwrap();
        assert_eq!(plot.model_lower(), 0.0);
        assert_eq!(plot.actual(), None);
        assert_eq!(plot.partition_field_name(), None);
        assert_eq!(plot.detector_index(), -1);
    }

    #[test]
    fn test_id_format() {
        let plot = ModelPlot::builder("job-1", ts(1000), 60, 0).build().unwrap();
        // three absent values: ((1 * 31) * 31) * 31
        assert_eq!(plot.id(), "job-1_model_plot_1000_60_0_29791_0");
    }

    #[test]
    fn test_id_value_hash() {
        let plot = ModelPlot::builder("job-1", ts(1000), 60, 2)
            .by_field_value("a")
            .build()
            .unwrap();
        // (31 + 97) * 31 * 31
        assert_eq!(plot.id(), "job-1_model_plot_1000_60_2_123008_1");
    }

    #[test]
    fn test_string_hash_matches_polynomial() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("ab"), 97 * 31 + 98);
        // wraps rather than overflowing
        let _ = string_hash(&"z".repeat(64));
    }

    #[test]
    fn test_id_is_pure() {
        let plot = full().build().unwrap();
        assert_eq!(plot.id(), plot.id());
    }

    #[test]
    fn test_id_changes_with_values() {
        let a = full().build().unwrap();
        let b = full().by_field_value("b2").build().unwrap();
        let c = full().over_field_value("o2").build().unwrap();
        let d = full().partition_field_value("p22").build().unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_ne!(a.id(), d.id());
        assert_ne!(b.id(), c.id());
    }

    #[test]
    fn test_id_is_order_sensitive() {
        let a = ModelPlot::builder("j", ts(0), 1, 0)
            .by_field_value("x")
            .over_field_value("y")
            .build()
            .unwrap();
        let b = ModelPlot::builder("j", ts(0), 1, 0)
            .by_field_value("y")
            .over_field_value("x")
            .build()
            .unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_equality_and_hash() {
        let a = full().build().unwrap();
        let b = full().build().unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let a = full().actual(None).build().unwrap();
        let b = full().actual(None).build().unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_negative_zero_hashes_like_zero() {
        let a = full().model_lower(0.0).build().unwrap();
        let b = full().model_lower(-0.0).build().unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_nan_actual_equals_itself() {
        let a = full().actual(f64::NAN).build().unwrap();
        let b = full().actual(-f64::NAN).build().unwrap();
        assert_eq!(a, a.clone());
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, full().actual(None).build().unwrap());
    }

    #[test]
    fn test_signed_zero_actual_is_distinct() {
        let a = full().actual(0.0).build().unwrap();
        let b = full().actual(-0.0).build().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_any_field_change_breaks_equality() {
        let base = full().build().unwrap();
        let variants = [
            ModelPlot::builder("job-2", ts(1000), 60, 0),
            ModelPlot::builder("job-1", ts(1001), 60, 0),
            ModelPlot::builder("job-1", ts(1000), 61, 0),
            ModelPlot::builder("job-1", ts(1000), 60, 1),
        ];
        for builder in variants {
            let mut b = builder;
            b.set_partition(Some("part".into()), Some("p1".into()));
            b.set_over(Some("over".into()), Some("o1".into()));
            b.set_by(Some("by".into()), Some("b1".into()));
            b.set_model_feature(Some("mean".into()));
            b.set_model(1.0, 3.0, 2.0);
            assert_ne!(base, b.actual(2.5).build().unwrap());
        }

        let changed = [
            full().partition_field_name("x"),
            full().partition_field_value("x"),
            full().over_field_name("x"),
            full().over_field_value("x"),
            full().by_field_name("x"),
            full().by_field_value("x"),
            full().model_feature("x"),
            full().model_lower(1.5),
            full().model_upper(3.5),
            full().model_median(2.5),
            full().actual(None),
            full().actual(0.0),
        ];
        for builder in changed {
            assert_ne!(base, builder.build().unwrap());
        }
    }
}
