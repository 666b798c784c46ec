//! FIT decoding into 1 Hz telemetry.
//!
//! Downloads may arrive zipped; [`unpack_activity_archive`] extracts the first
//! `.fit` entry and passes anything else through untouched. Record messages
//! are placed on a per-second grid by timestamp, so seconds the device did not
//! record come out as missing samples.

use fitparser::profile::MesgNum;
use fitparser::Value;
use log::{debug, info};
use std::io::{Cursor, Read};

use crate::error::{IntervalError, Result};
use crate::source::TelemetryDecoder;
use crate::ActivityTelemetry;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const MS_TO_KMH: f64 = 3.6;
/// Refuse to allocate a grid longer than two days of samples.
const MAX_SAMPLES: usize = 2 * 24 * 3600;
/// Largest up-front buffer reserved for an archived FIT entry.
const MAX_FIT_PREALLOC: usize = 16 * 1024 * 1024;

/// Initial buffer size for an entry whose header declares `declared` bytes.
fn extract_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_FIT_PREALLOC, |d| d.min(MAX_FIT_PREALLOC))
}

/// Return the first `.fit` file inside a zip archive, or the input itself
/// when it is not a zip.
pub fn unpack_activity_archive(bytes: &[u8]) -> Result<Vec<u8>> {
    if !bytes.starts_with(ZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| IntervalError::decode(format!("Invalid zip archive: {}", e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| IntervalError::decode(format!("Unreadable zip entry: {}", e)))?;
        if !entry.name().to_ascii_lowercase().ends_with(".fit") {
            continue;
        }

        debug!("[Fit] Extracting {} from archive", entry.name());
        let mut out = Vec::with_capacity(extract_capacity(entry.size()));
        entry
            .read_to_end(&mut out)
            .map_err(|e| IntervalError::decode(format!("Failed to extract FIT entry: {}", e)))?;
        return Ok(out);
    }

    Err(IntervalError::decode("Archive contains no .fit file"))
}

/// One decoded record message.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RecordRow {
    /// Unix seconds
    timestamp: Option<i64>,
    /// km/h
    speed: Option<f64>,
    heart_rate: Option<f64>,
    distance: Option<f64>,
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::UInt8(v) | Value::UInt8z(v) | Value::Byte(v) => Some(*v as f64),
        Value::SInt8(v) => Some(*v as f64),
        Value::UInt16(v) | Value::UInt16z(v) => Some(*v as f64),
        Value::SInt16(v) => Some(*v as f64),
        Value::UInt32(v) | Value::UInt32z(v) => Some(*v as f64),
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt64(v) | Value::UInt64z(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::Array(values) => values.iter().find_map(value_to_f64),
        _ => None,
    }
}

fn read_rows(fit: &[u8]) -> Result<Vec<RecordRow>> {
    let messages = fitparser::de::from_bytes(fit)
        .map_err(|e| IntervalError::decode(format!("Invalid FIT data: {}", e)))?;

    let mut rows = Vec::new();
    for message in messages {
        if message.kind() != MesgNum::Record {
            continue;
        }

        let mut row = RecordRow::default();
        let mut enhanced_speed = None;
        let mut speed = None;
        for field in message.fields() {
            match field.name() {
                "timestamp" => {
                    if let Value::Timestamp(ts) = field.value() {
                        row.timestamp = Some(ts.timestamp());
                    }
                }
                "enhanced_speed" => enhanced_speed = value_to_f64(field.value()),
                "speed" => speed = value_to_f64(field.value()),
                "heart_rate" => row.heart_rate = value_to_f64(field.value()),
                "distance" => row.distance = value_to_f64(field.value()),
                _ => {}
            }
        }
        row.speed = enhanced_speed.or(speed).map(|ms| ms * MS_TO_KMH);
        rows.push(row);
    }
    Ok(rows)
}

/// Lay rows out on a 1 Hz grid.
///
/// With timestamps on every row, each row lands at its offset from the first
/// one (later rows win on duplicate seconds). Otherwise rows are taken as
/// consecutive seconds.
fn rows_to_telemetry(rows: &[RecordRow]) -> Result<ActivityTelemetry> {
    let offsets: Option<Vec<usize>> = match rows.first().and_then(|r| r.timestamp) {
        Some(t0) => rows
            .iter()
            .map(|r| r.timestamp.and_then(|t| usize::try_from(t - t0).ok()))
            .collect(),
        None => None,
    };
    let offsets = offsets.unwrap_or_else(|| (0..rows.len()).collect());

    let len = offsets.iter().max().map_or(0, |&m| m + 1);
    if len > MAX_SAMPLES {
        return Err(IntervalError::decode(format!(
            "Activity spans {} seconds, more than {}",
            len, MAX_SAMPLES
        )));
    }

    let mut speed = vec![None; len];
    let mut heart_rate = vec![None; len];
    let mut distance = vec![None; len];
    for (row, &i) in rows.iter().zip(&offsets) {
        speed[i] = row.speed;
        heart_rate[i] = row.heart_rate;
        distance[i] = row.distance;
    }

    let mut telemetry = ActivityTelemetry::from_speed(speed);
    if heart_rate.iter().any(Option::is_some) {
        telemetry = telemetry.with_heart_rate(heart_rate);
    }
    if distance.iter().any(Option::is_some) {
        telemetry = telemetry.with_distance(distance);
    }
    Ok(telemetry)
}

/// [`TelemetryDecoder`] for FIT activity files, zipped or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitDecoder;

impl TelemetryDecoder for FitDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<ActivityTelemetry> {
        let fit = unpack_activity_archive(bytes)?;
        let rows = read_rows(&fit)?;
        let telemetry = rows_to_telemetry(&rows)?;

        info!(
            "[Fit] {} record messages -> {} samples (hr: {}, distance: {})",
            rows.len(),
            telemetry.len(),
            telemetry.heart_rate.is_some(),
            telemetry.distance.is_some()
        );
        Ok(telemetry)
    }
}
