use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, OutputFormat, Pacing, parse_duration_value};
use crate::error::ValidationError;

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub method: Option<HttpMethod>,
    pub requests: Option<u64>,
    #[serde(alias = "concurrent")]
    pub concurrency: Option<usize>,
    pub rate: Option<u64>,
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    pub pacing: Option<Pacing>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub drain_timeout: Option<DurationValue>,
    pub output_format: Option<OutputFormat>,
    pub no_progress: Option<bool>,
    pub no_color: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(0) => Err(ValidationError::DurationZero),
            DurationValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            DurationValue::Text(text) => parse_duration_value(text),
        }
    }
}
