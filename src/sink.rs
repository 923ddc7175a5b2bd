//! Reading sinks
//!
//! A sink receives every decoded [`Reading`] from the pipeline together with
//! the wall-clock time it was received. Sinks run sequentially on the pipeline
//! task; a failing sink is logged by the caller and skipped for that reading.
//! [`CsvSink`] does its file I/O on tokio's blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::protocol::format::{CHANNEL_COUNT, PULSE_COUNTER_COUNT, TEMPERATURE_COUNT};
use crate::{GemError, Reading, Result};

/// ISO-8601 without fraction or offset, e.g. `2020-06-15T12:30:45`.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Consumer of decoded readings.
#[async_trait]
pub trait ReadingSink: Send {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    async fn write(&mut self, reading: &Reading, received_at: DateTime<Utc>) -> Result<()>;
}

/// Appends one CSV row per reading.
pub struct CsvSink {
    path: PathBuf,
    // Taken while a write runs on the blocking pool
    writer: Option<csv::Writer<File>>,
    rows: u64,
}

impl CsvSink {
    /// Create or truncate `path` and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| GemError::file_error(&path, e))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

        writer.write_record(header())?;
        writer.flush().map_err(|e| GemError::file_error(&path, e))?;
        info!(path = %path.display(), "CSV output created");

        Ok(Self { path, writer: Some(writer), rows: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written since creation, excluding the header.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

#[async_trait]
impl ReadingSink for CsvSink {
    fn name(&self) -> &str {
        "csv"
    }

    async fn write(&mut self, reading: &Reading, received_at: DateTime<Utc>) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Err(GemError::file_error(
                &self.path,
                std::io::Error::other("writer lost after a failed write task"),
            ));
        };
        let record = row(reading, received_at);
        let path = self.path.clone();

        let (writer, written) = tokio::task::spawn_blocking(move || {
            let written = writer
                .write_record(&record)
                .map_err(GemError::from)
                .and_then(|()| writer.flush().map_err(|e| GemError::file_error(&path, e)));
            (writer, written)
        })
        .await
        .map_err(|e| GemError::io_error("CSV write task", std::io::Error::other(e)))?;

        self.writer = Some(writer);
        written?;
        self.rows += 1;
        debug!(device = %reading.device_id, rows = self.rows, "CSV row written");
        Ok(())
    }
}

impl std::fmt::Debug for CsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink").field("path", &self.path).field("rows", &self.rows).finish()
    }
}

/// Column names, in row order.
pub fn header() -> Vec<String> {
    let mut columns: Vec<String> =
        ["UTC", "Serial", "Voltage", "Seconds", "TimeStamp"].map(String::from).to_vec();
    numbered(&mut columns, "Temperature", TEMPERATURE_COUNT);
    numbered(&mut columns, "PulseCounter", PULSE_COUNTER_COUNT);
    numbered(&mut columns, "Current", CHANNEL_COUNT);
    numbered(&mut columns, "AbsoluteWattSeconds", CHANNEL_COUNT);
    numbered(&mut columns, "PolarizedWattSeconds", CHANNEL_COUNT);
    columns
}

fn numbered(columns: &mut Vec<String>, prefix: &str, count: usize) {
    columns.extend((1..=count).map(|i| format!("{}-{}", prefix, i)));
}

/// One reading as CSV fields.
pub fn row(reading: &Reading, received_at: DateTime<Utc>) -> Vec<String> {
    let mut fields = vec![
        received_at.format(TIME_FORMAT).to_string(),
        reading.device_id.to_string(),
        reading.voltage.to_string(),
        reading.elapsed_seconds.to_string(),
        reading.device_time.format(TIME_FORMAT).to_string(),
    ];
    fields.extend(reading.temperatures.iter().map(ToString::to_string));
    fields.extend(reading.pulse_counters.iter().map(ToString::to_string));
    fields.extend(reading.currents.iter().map(ToString::to_string));
    fields.extend(reading.absolute_watt_seconds.iter().map(ToString::to_string));
    fields.extend(reading.polarized_watt_seconds.iter().map(ToString::to_string));
    fields
}

/// Logs each reading through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl ReadingSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn write(&mut self, reading: &Reading, _received_at: DateTime<Utc>) -> Result<()> {
        info!(
            device = %reading.device_id,
            voltage = reading.voltage,
            seconds = reading.elapsed_seconds,
            device_time = %reading.device_time.format(TIME_FORMAT),
            "Reading"
        );
        debug!("\n{}", reading);
        Ok(())
    }
}
