//! Versioned Binary Codec for Model Plots
//!
//! The field order is fixed; which version-gated fields appear is decided once
//! per stream by [`WireShape::for_version`]. Encoder and decoder walk the same
//! straight-line sequence so that a payload written for version N is read back
//! by a node speaking version N.

use crate::error::WireError;
use crate::model_plot::{ModelPlot, ModelPlotBuilder, UNKNOWN_DETECTOR_INDEX};
use crate::stream::{StreamInput, StreamOutput};
use crate::time;
use crate::version::{Version, WireShape};
use bytes::Bytes;
use tracing::{debug, trace};

impl ModelPlot {
    pub fn write_to(&self, out: &mut StreamOutput) {
        let shape = WireShape::for_version(out.version());
        trace!(job_id = %self.job_id, version = %out.version(), ?shape, "Writing model plot");

        out.write_string(&self.job_id);
        if shape.optional_timestamp {
            // a built record always carries a timestamp
            out.write_bool(true);
        }
        out.write_long(self.timestamp.timestamp_millis());
        if shape.legacy_id_placeholder {
            out.write_optional_string(None);
        }
        out.write_optional_string(self.partition_field_name.as_deref());
        out.write_optional_string(self.partition_field_value.as_deref());
        out.write_optional_string(self.over_field_name.as_deref());
        out.write_optional_string(self.over_field_value.as_deref());
        out.write_optional_string(self.by_field_name.as_deref());
        out.write_optional_string(self.by_field_value.as_deref());
        out.write_optional_string(self.model_feature.as_deref());
        out.write_double(self.model_lower);
        out.write_double(self.model_upper);
        out.write_double(self.model_median);
        if shape.optional_actual {
            out.write_optional_double(self.actual);
        } else {
            out.write_double(self.legacy_actual(out.version()));
        }
        if shape.bucket_span {
            out.write_long(self.bucket_span);
        }
        if shape.detector_index {
            out.write_int(self.detector_index);
        }
    }

    /// Actual as a required double for receivers that cannot express absence.
    ///
    /// A missing actual is sent as `0.0`, which the receiver reads back as an
    /// observed zero. Old receivers have always seen it that way.
    fn legacy_actual(&self, version: Version) -> f64 {
        match self.actual {
            Some(actual) => actual,
            None => {
                debug!(
                    job_id = %self.job_id,
                    %version,
                    "Model plot has no actual; sending 0.0 to pre-6.0.0-rc1 receiver"
                );
                0.0
            }
        }
    }

    /// Decode a record written at the stream's version.
    ///
    /// Besides truncated or malformed input, this rejects payloads that would
    /// not make a valid record: an empty job id, a negative bucket span, or a
    /// timestamp outside the representable range. Such payloads surface as
    /// [`WireError::InvalidRecord`] rather than as a half-built value.
    ///
    /// Pre-5.5.0 payloads without a timestamp are stamped with the current
    /// time, and the removed id field they carry is read and dropped.
    pub fn read_from(input: &mut StreamInput) -> Result<Self, WireError> {
        let shape = WireShape::for_version(input.version());

        let job_id = input.read_string()?;
        let timestamp = if shape.optional_timestamp && !input.read_bool()? {
            trace!(%job_id, "Legacy model plot without timestamp; using now");
            time::now_millis()
        } else {
            time::from_epoch_millis(input.read_long()?)?
        };
        if shape.legacy_id_placeholder {
            let _ = input.read_optional_string()?;
        }

        let partition_field_name = input.read_optional_string()?;
        let partition_field_value = input.read_optional_string()?;
        let over_field_name = input.read_optional_string()?;
        let over_field_value = input.read_optional_string()?;
        let by_field_name = input.read_optional_string()?;
        let by_field_value = input.read_optional_string()?;
        let model_feature = input.read_optional_string()?;
        let model_lower = input.read_double()?;
        let model_upper = input.read_double()?;
        let model_median = input.read_double()?;
        let actual = if shape.optional_actual {
            input.read_optional_double()?
        } else {
            Some(input.read_double()?)
        };
        let bucket_span = if shape.bucket_span {
            input.read_long()?
        } else {
            0
        };
        let detector_index = if shape.detector_index {
            input.read_int()?
        } else {
            UNKNOWN_DETECTOR_INDEX
        };

        let mut builder = ModelPlotBuilder::new(job_id, timestamp, bucket_span, detector_index);
        builder.set_partition(partition_field_name, partition_field_value);
        builder.set_over(over_field_name, over_field_value);
        builder.set_by(by_field_name, by_field_value);
        builder.set_model_feature(model_feature);
        builder.set_model(model_lower, model_upper, model_median);
        Ok(builder.actual(actual).build()?)
    }

    pub fn to_wire_bytes(&self, version: Version) -> Bytes {
        let mut out = StreamOutput::new(version);
        self.write_to(&mut out);
        out.freeze()
    }

    pub fn from_wire_bytes(bytes: impl Into<Bytes>, version: Version) -> Result<Self, WireError> {
        Self::read_from(&mut StreamInput::new(bytes, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn scenario() -> ModelPlot {
        ModelPlot::builder("job-1", DateTime::from_timestamp_millis(1000).unwrap(), 60, 0)
            .model_lower(1.0)
            .model_upper(3.0)
            .model_median(2.0)
            .build()
            .unwrap()
    }

    #[test]
    fn test_current_layout() {
        let bytes = scenario().to_wire_bytes(Version::CURRENT);
        let mut expected = vec![5u8];
        expected.extend_from_slice(b"job-1");
        expected.extend_from_slice(&1000i64.to_be_bytes());
        expected.extend_from_slice(&[0; 7]);
        expected.extend_from_slice(&1.0f64.to_bits().to_be_bytes());
        expected.extend_from_slice(&3.0f64.to_bits().to_be_bytes());
        expected.extend_from_slice(&2.0f64.to_bits().to_be_bytes());
        expected.push(0);
        expected.extend_from_slice(&60i64.to_be_bytes());
        expected.extend_from_slice(&0i32.to_be_bytes());
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_legacy_layout() {
        let bytes = scenario().to_wire_bytes(Version::V_5_4_0);
        let mut expected = vec![5u8];
        expected.extend_from_slice(b"job-1");
        expected.push(1);
        expected.extend_from_slice(&1000i64.to_be_bytes());
        // removed id placeholder, then seven absent optional strings
        expected.extend_from_slice(&[0; 8]);
        expected.extend_from_slice(&1.0f64.to_bits().to_be_bytes());
        expected.extend_from_slice(&3.0f64.to_bits().to_be_bytes());
        expected.extend_from_slice(&2.0f64.to_bits().to_be_bytes());
        expected.extend_from_slice(&0.0f64.to_bits().to_be_bytes());
        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_missing_timestamp_decodes_as_now() {
        let mut out = StreamOutput::new(Version::V_5_4_0);
        out.write_string("job-1");
        out.write_bool(false);
        out.write_optional_string(None);
        for _ in 0..7 {
            out.write_optional_string(None);
        }
        out.write_double(1.0);
        out.write_double(3.0);
        out.write_double(2.0);
        out.write_double(0.0);

        let before = time::now_millis();
        let plot = ModelPlot::from_wire_bytes(out.freeze(), Version::V_5_4_0).unwrap();
        let after = time::now_millis();
        assert!(plot.timestamp() >= before && plot.timestamp() <= after);
        assert_eq!(plot.bucket_span(), 0);
        assert_eq!(plot.detector_index(), UNKNOWN_DETECTOR_INDEX);
        assert_eq!(plot.actual(), Some(0.0));
    }

    #[test]
    fn test_legacy_id_placeholder_is_skipped() {
        let mut out = StreamOutput::new(Version::V_5_4_0);
        out.write_string("job-1");
        out.write_bool(true);
        out.write_long(1000);
        out.write_optional_string(Some("old-id"));
        out.write_optional_string(Some("part"));
        out.write_optional_string(Some("p1"));
        for _ in 0..5 {
            out.write_optional_string(None);
        }
        out.write_double(1.0);
        out.write_double(3.0);
        out.write_double(2.0);
        out.write_double(2.5);

        let plot = ModelPlot::from_wire_bytes(out.freeze(), Version::V_5_4_0).unwrap();
        assert_eq!(plot.timestamp().timestamp_millis(), 1000);
        assert_eq!(plot.partition_field_name(), Some("part"));
        assert_eq!(plot.partition_field_value(), Some("p1"));
        assert_eq!(plot.over_field_name(), None);
        assert_eq!(plot.model_median(), 2.0);
        assert_eq!(plot.actual(), Some(2.5));
        assert_eq!(plot.bucket_span(), 0);
        assert!(!plot.id().contains("old-id"));
    }

    #[test]
    fn test_nan_actual_round_trips() {
        let plot = ModelPlot::builder("job-1", DateTime::from_timestamp_millis(1000).unwrap(), 60, 0)
            .actual(f64::NAN)
            .build()
            .unwrap();
        let back = ModelPlot::from_wire_bytes(plot.to_wire_bytes(Version::CURRENT), Version::CURRENT)
            .unwrap();
        assert!(back.actual().unwrap().is_nan());
        assert_eq!(back, plot);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = scenario().to_wire_bytes(Version::CURRENT);
        let cut = bytes.slice(..bytes.len() - 2);
        assert!(matches!(
            ModelPlot::from_wire_bytes(cut, Version::CURRENT),
            Err(WireError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_empty_job_id_on_wire() {
        let mut out = StreamOutput::new(Version::CURRENT);
        out.write_string("");
        let mut bytes = out.freeze().to_vec();
        bytes.extend_from_slice(&scenario().to_wire_bytes(Version::CURRENT)[6..]);
        assert!(matches!(
            ModelPlot::from_wire_bytes(bytes, Version::CURRENT),
            Err(WireError::InvalidRecord(_))
        ));
    }
}
