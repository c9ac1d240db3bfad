//! Structured-Text View of Model Plots
//!
//! A flat JSON object for external consumers. Absent optional fields are left
//! out entirely; the model bounds and median are always written. Parsing goes
//! through [`ModelPlotBuilder`] so the result is validated like any other
//! record.

use crate::error::XContentError;
use crate::model_plot::{ModelPlot, ModelPlotBuilder, RESULT_TYPE_VALUE};
use crate::time;
use serde::de::{self, Deserializer, IgnoredAny, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

pub const JOB_ID: &str = "job_id";
pub const RESULT_TYPE: &str = "result_type";
pub const TIMESTAMP: &str = "timestamp";
pub const TIMESTAMP_STRING: &str = "timestamp_string";
pub const BUCKET_SPAN: &str = "bucket_span";
pub const DETECTOR_INDEX: &str = "detector_index";
pub const PARTITION_FIELD_NAME: &str = "partition_field_name";
pub const PARTITION_FIELD_VALUE: &str = "partition_field_value";
pub const OVER_FIELD_NAME: &str = "over_field_name";
pub const OVER_FIELD_VALUE: &str = "over_field_value";
pub const BY_FIELD_NAME: &str = "by_field_name";
pub const BY_FIELD_VALUE: &str = "by_field_value";
pub const MODEL_FEATURE: &str = "model_feature";
pub const MODEL_LOWER: &str = "model_lower";
pub const MODEL_UPPER: &str = "model_upper";
pub const MODEL_MEDIAN: &str = "model_median";
pub const ACTUAL: &str = "actual";

/// Rendering options for the structured view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XContentConfig {
    /// Pair `timestamp` with a readable `timestamp_string`.
    pub human_readable: bool,
}

impl Default for XContentConfig {
    fn default() -> Self {
        Self {
            human_readable: true,
        }
    }
}

/// A model plot paired with the options used to render it.
#[derive(Debug, Clone, Copy)]
pub struct XContent<'a> {
    plot: &'a ModelPlot,
    config: XContentConfig,
}

impl ModelPlot {
    pub fn xcontent(&self, config: XContentConfig) -> XContent<'_> {
        XContent { plot: self, config }
    }
}

impl Serialize for XContent<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let p = self.plot;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(JOB_ID, &p.job_id)?;
        map.serialize_entry(RESULT_TYPE, RESULT_TYPE_VALUE)?;
        map.serialize_entry(BUCKET_SPAN, &p.bucket_span)?;
        map.serialize_entry(DETECTOR_INDEX, &p.detector_index)?;

        map.serialize_entry(TIMESTAMP, &p.timestamp.timestamp_millis())?;
        if self.config.human_readable {
            map.serialize_entry(TIMESTAMP_STRING, &time::format_date(&p.timestamp))?;
        }

        let optional = [
            (PARTITION_FIELD_NAME, &p.partition_field_name),
            (PARTITION_FIELD_VALUE, &p.partition_field_value),
            (OVER_FIELD_NAME, &p.over_field_name),
            (OVER_FIELD_VALUE, &p.over_field_value),
            (BY_FIELD_NAME, &p.by_field_name),
            (BY_FIELD_VALUE, &p.by_field_value),
            (MODEL_FEATURE, &p.model_feature),
        ];
        for (field, value) in optional {
            if let Some(value) = value {
                map.serialize_entry(field, value)?;
            }
        }

        map.serialize_entry(MODEL_LOWER, &p.model_lower)?;
        map.serialize_entry(MODEL_UPPER, &p.model_upper)?;
        map.serialize_entry(MODEL_MEDIAN, &p.model_median)?;
        if let Some(actual) = p.actual {
            map.serialize_entry(ACTUAL, &actual)?;
        }
        map.end()
    }
}

impl Serialize for ModelPlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.xcontent(XContentConfig::default()).serialize(serializer)
    }
}

/// Flat document shape accepted by the parser.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelPlotDoc {
    job_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: i64,
    bucket_span: i64,
    detector_index: i32,
    #[serde(default, rename = "result_type")]
    _result_type: Option<String>,
    #[serde(default, rename = "timestamp_string")]
    _timestamp_string: Option<IgnoredAny>,
    #[serde(default)]
    partition_field_name: Option<String>,
    #[serde(default)]
    partition_field_value: Option<String>,
    #[serde(default)]
    over_field_name: Option<String>,
    #[serde(default)]
    over_field_value: Option<String>,
    #[serde(default)]
    by_field_name: Option<String>,
    #[serde(default)]
    by_field_value: Option<String>,
    #[serde(default)]
    model_feature: Option<String>,
    #[serde(default)]
    model_lower: Option<f64>,
    #[serde(default)]
    model_upper: Option<f64>,
    #[serde(default)]
    model_median: Option<f64>,
    #[serde(default)]
    actual: Option<f64>,
}

impl ModelPlotDoc {
    fn into_builder(self) -> Result<ModelPlotBuilder, crate::error::RecordError> {
        let timestamp = time::from_epoch_millis(self.timestamp)?;
        let mut builder =
            ModelPlotBuilder::new(self.job_id, timestamp, self.bucket_span, self.detector_index);
        builder.set_partition(self.partition_field_name, self.partition_field_value);
        builder.set_over(self.over_field_name, self.over_field_value);
        builder.set_by(self.by_field_name, self.by_field_value);
        builder.set_model_feature(self.model_feature);
        builder.set_model(
            self.model_lower.unwrap_or_default(),
            self.model_upper.unwrap_or_default(),
            self.model_median.unwrap_or_default(),
        );
        Ok(builder.actual(self.actual))
    }
}

impl<'de> Deserialize<'de> for ModelPlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ModelPlotDoc::deserialize(deserializer)?
            .into_builder()
            .and_then(ModelPlotBuilder::build)
            .map_err(de::Error::custom)
    }
}

/// Epoch millis from a number, or from a date string.
fn deserialize_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    deserializer.deserialize_any(TimestampVisitor)
}

struct TimestampVisitor;

impl TimestampVisitor {
    fn unexpected<E: de::Error>(token: &str) -> E {
        E::custom(format!("unexpected token [{}] for [{}]", token, TIMESTAMP))
    }
}

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("epoch milliseconds or a date string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        Ok(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v).map_err(|_| E::custom(format!("[{}] value {} out of range", TIMESTAMP, v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        Ok(v as i64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        time::date_string_to_epoch(v)
            .ok_or_else(|| E::custom(format!("failed to parse date [{}] for [{}]", v, TIMESTAMP)))
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<i64, E> {
        Err(Self::unexpected("VALUE_BOOLEAN"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<i64, E> {
        Err(Self::unexpected("VALUE_NULL"))
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, _: A) -> Result<i64, A::Error> {
        Err(Self::unexpected("START_ARRAY"))
    }

    fn visit_map<A: de::MapAccess<'de>>(self, _: A) -> Result<i64, A::Error> {
        Err(Self::unexpected("START_OBJECT"))
    }
}

pub fn to_json_value(plot: &ModelPlot, config: XContentConfig) -> Result<serde_json::Value, XContentError> {
    Ok(serde_json::to_value(plot.xcontent(config))?)
}

pub fn to_json_string(plot: &ModelPlot, config: XContentConfig) -> Result<String, XContentError> {
    Ok(serde_json::to_string(&plot.xcontent(config))?)
}

/// Write the document to `writer`; write failures surface as [`XContentError::Io`].
pub fn to_json_writer<W: Write>(
    mut writer: W,
    plot: &ModelPlot,
    config: XContentConfig,
) -> Result<(), XContentError> {
    serde_json::to_writer(&mut writer, &plot.xcontent(config)).map_err(|e| {
        if e.is_io() {
            XContentError::Io(e.into())
        } else {
            XContentError::Json(e)
        }
    })?;
    writer.flush()?;
    Ok(())
}

pub fn from_json_str(s: &str) -> Result<ModelPlot, XContentError> {
    Ok(serde_json::from_str(s)?)
}

pub fn from_json_slice(bytes: &[u8]) -> Result<ModelPlot, XContentError> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn from_json_value(value: serde_json::Value) -> Result<ModelPlot, XContentError> {
    Ok(serde_json::from_value(value)?)
}
