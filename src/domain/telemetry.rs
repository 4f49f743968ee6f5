// Telemetry record domain model and flattening into tabular rows
use super::dataset::CellValue;
use serde_json::Value;

/// Sub-groups carried by each sensor entry, in flattening order.
pub const SENSOR_GROUPS: [&str; 4] = [
    "environmental",
    "airQuality",
    "gasResistance",
    "systemStatus",
];

/// One flattened, ordered row. Top-level record fields come first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRow {
    fields: Vec<(String, CellValue)>,
}

impl FlatRow {
    fn insert(&mut self, key: &str, value: CellValue) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn into_fields(self) -> Vec<(String, CellValue)> {
        self.fields
    }
}

/// Flatten one nested telemetry record into one row per sensor entry.
///
/// Malformed input never fails: a missing or non-array `sensors` field gives no rows,
/// and sub-group fields that are absent stay absent rather than defaulting to zero.
pub fn flatten(record: &Value) -> Vec<FlatRow> {
    let Some(sensors) = record.get("sensors").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut header = FlatRow::default();
    for key in ["timestamp", "deviceId", "boardMode"] {
        if let Some(value) = record.get(key).and_then(to_cell) {
            header.insert(key, value);
        }
    }

    sensors
        .iter()
        .map(|sensor| {
            let mut row = header.clone();
            if let Some(id) = sensor.get("sensorId").and_then(to_cell) {
                row.insert("sensorId", id);
            }
            for group in SENSOR_GROUPS {
                let Some(fields) = sensor.get(group).and_then(Value::as_object) else {
                    continue;
                };
                for (name, raw) in fields {
                    if let Some(value) = to_cell(raw) {
                        row.insert(name, value);
                    }
                }
            }
            row
        })
        .collect()
}

fn to_cell(value: &Value) -> Option<CellValue> {
    match value {
        Value::Number(n) => n.as_f64().map(CellValue::Number),
        Value::String(s) => Some(CellValue::Text(s.clone())),
        _ => None,
    }
}
