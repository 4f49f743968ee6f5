// Live feed aggregation and the bounded display window
use super::telemetry::{flatten, FlatRow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const LIVE_BUFFER_CAPACITY: usize = 30;

/// Channels averaged per record, in point order.
pub const LIVE_CHANNELS: [&str; 6] = [
    "temperature",
    "humidity",
    "pressure",
    "IAQ",
    "CO2eq",
    "VOC",
];

/// How an absent channel value enters a record's mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentPolicy {
    /// Absent values count as 0 and still add to the divisor.
    #[default]
    TreatAsZero,
    /// Only present values are averaged.
    IgnoreAbsent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePoint {
    pub seq: usize,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub iaq: f64,
    pub co2_eq: f64,
    pub voc: f64,
}

impl LivePoint {
    fn from_channels(seq: usize, c: [f64; 6]) -> Self {
        Self {
            seq,
            temperature: c[0],
            humidity: c[1],
            pressure: c[2],
            iaq: c[3],
            co2_eq: c[4],
            voc: c[5],
        }
    }
}

/// Fixed-capacity window; replaced wholesale on every poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveBuffer {
    points: Vec<LivePoint>,
}

impl LiveBuffer {
    /// Keep only the last `LIVE_BUFFER_CAPACITY` points of a batch.
    pub fn from_batch(mut points: Vec<LivePoint>) -> Self {
        if points.len() > LIVE_BUFFER_CAPACITY {
            points.drain(..points.len() - LIVE_BUFFER_CAPACITY);
        }
        Self { points }
    }

    pub fn points(&self) -> &[LivePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// One point per record, sequence numbers starting at 0 for this batch.
pub fn aggregate(records: &[Value], policy: AbsentPolicy) -> Vec<LivePoint> {
    records
        .iter()
        .enumerate()
        .map(|(seq, record)| {
            let rows = flatten(record);
            let mut channels = [0.0; 6];
            for (slot, name) in channels.iter_mut().zip(LIVE_CHANNELS) {
                *slot = channel_mean(&rows, name, policy);
            }
            LivePoint::from_channels(seq, channels)
        })
        .collect()
}

fn channel_mean(rows: &[FlatRow], channel: &str, policy: AbsentPolicy) -> f64 {
    let values = rows
        .iter()
        .map(|r| r.get(channel).and_then(|v| v.as_f64()));

    let (sum, count) = match policy {
        AbsentPolicy::TreatAsZero => (values.map(|v| v.unwrap_or(0.0)).sum::<f64>(), rows.len()),
        AbsentPolicy::IgnoreAbsent => values
            .flatten()
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1)),
    };

    if count == 0 { 0.0 } else { sum / count as f64 }
}
