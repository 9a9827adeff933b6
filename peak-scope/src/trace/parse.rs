//! Line parsers for the two input streams.
//!
//! Both parsers return `None` for anything they do not understand; a bad line
//! is dropped and the stream carries on.

use time::OffsetDateTime;

use crate::model::sample::{DeviceSample, FileIoSample};

/// Column count of a per-file sampler row.
const FILE_FIELDS: usize = 8;

/// Substrings marking the sampler's banner and header lines.
const FILE_HEADER_MARKERS: &[&str] = &["loadavg"];
const FILE_HEADER_PREFIX: &str = "TID";

/// Picks a device's rate column out of whitespace-separated device lines.
#[derive(Debug, Clone)]
pub struct DeviceLineParser {
    device: String,
    rate_column: usize,
}

impl DeviceLineParser {
    pub fn new(device: impl Into<String>, rate_column: usize) -> Self {
        Self {
            device: device.into(),
            rate_column,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn parse(&self, line: &str, ts: OffsetDateTime) -> Option<DeviceSample> {
        let mut fields = line.split_whitespace();
        if fields.next()? != self.device {
            return None;
        }
        // first field already consumed
        let raw = fields.nth(self.rate_column.checked_sub(1)?)?;
        let read_rate = raw.parse::<f64>().ok().filter(|r| r.is_finite())?;

        Some(DeviceSample {
            device: self.device.clone(),
            read_rate,
            ts,
        })
    }
}

/// Which per-file rows count as valid samples.
///
/// The sampler reports every file a process touches; deployments either key
/// on a filename suffix (log segments) or on the type column (regular files).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleFilter {
    /// Filename ends with this suffix.
    Suffix(String),
    /// Type column equals this marker.
    FileType(String),
    Any,
}

impl SampleFilter {
    pub fn accepts(&self, sample: &FileIoSample) -> bool {
        match self {
            SampleFilter::Suffix(suffix) => sample.filename.ends_with(suffix.as_str()),
            SampleFilter::FileType(marker) => sample.file_type == *marker,
            SampleFilter::Any => true,
        }
    }
}

pub fn is_file_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(FILE_HEADER_PREFIX)
        || FILE_HEADER_MARKERS.iter().any(|m| trimmed.contains(m))
}

/// Parse one sampler row: `TID COMM READS WRITES R_Kb W_Kb T FILE`.
///
/// A filename containing spaces spans the trailing fields and is rejoined
/// with single spaces.
pub fn parse_file_sample(line: &str, filter: &SampleFilter) -> Option<FileIoSample> {
    if line.trim().is_empty() || is_file_header(line) {
        return None;
    }

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < FILE_FIELDS {
        return None;
    }

    let sample = FileIoSample {
        id: parts[0].to_string(),
        process: parts[1].to_string(),
        reads: parts[2].parse().ok()?,
        writes: parts[3].parse().ok()?,
        read_kb: parse_kb(parts[4])?,
        write_kb: parse_kb(parts[5])?,
        file_type: parts[6].to_string(),
        filename: parts[FILE_FIELDS - 1..].join(" "),
    };
    filter.accepts(&sample).then_some(sample)
}

fn parse_kb(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
