use time::OffsetDateTime;

/// One periodic measurement of the monitored block device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSample {
    pub device: String,
    /// Reads per second.
    pub read_rate: f64,
    pub ts: OffsetDateTime,
}

/// One row of the per-file sampler's output.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIoSample {
    /// Thread or process id, kept verbatim.
    pub id: String,
    pub process: String,
    pub reads: u64,
    pub writes: u64,
    pub read_kb: f64,
    pub write_kb: f64,
    pub file_type: String,
    pub filename: String,
}
