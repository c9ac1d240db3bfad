//! Model plot results of the anomaly detection engine.
//!
//! A [`ModelPlot`] records the modeled interval and the observed value of one
//! bucket for one detector. It travels between nodes in a versioned binary
//! format ([`wire`]) and is exposed to external consumers as flat JSON
//! ([`xcontent`]).

pub mod error;
pub mod model_plot;
pub mod stream;
pub mod time;
pub mod version;
pub mod wire;
pub mod xcontent;

pub use error::{RecordError, WireError, XContentError};
pub use model_plot::{ModelPlot, ModelPlotBuilder, RESULT_TYPE_VALUE, UNKNOWN_DETECTOR_INDEX};
pub use stream::{StreamInput, StreamOutput};
pub use version::{Version, WireShape};
pub use xcontent::XContentConfig;
