// Device manifest uploaded during registration
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const MANIFEST_SCHEMA_VERSION: &str = "1.0";
pub const MANIFEST_CONTENT_TYPE: &str = "application/json";
const MANIFEST_KEY_PREFIX: &str = "devices/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connection {
    #[default]
    Wifi,
    Bluetooth,
    Usb,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warn: f64,
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn: 150.0,
            critical: 250.0,
        }
    }
}

/// Operator-entered form contents, kept intact across failed submissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestDraft {
    pub device_id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub firmware: Option<String>,
    pub notes: Option<String>,
    pub tags: BTreeSet<String>,
    pub connection: Connection,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceManifest {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub tags: BTreeSet<String>,
    pub connection: Connection,
    pub thresholds: Thresholds,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub schema_version: String,
}

impl ManifestDraft {
    /// Validate the draft and stamp it. Returns `None` when the device id is blank.
    pub fn to_manifest(&self, now: DateTime<Utc>) -> Option<DeviceManifest> {
        let device_id = self.device_id.trim();
        if device_id.is_empty() {
            return None;
        }

        Some(DeviceManifest {
            device_id: device_id.to_string(),
            name: non_blank(&self.name),
            location: non_blank(&self.location),
            firmware: non_blank(&self.firmware),
            notes: non_blank(&self.notes),
            tags: self
                .tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            connection: self.connection,
            thresholds: self.thresholds,
            created_at: now,
            updated_at: now,
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
        })
    }
}

impl DeviceManifest {
    /// Storage key: one manifest per device id.
    pub fn storage_key(&self) -> String {
        storage_key_for(&self.device_id)
    }
}

pub fn storage_key_for(device_id: &str) -> String {
    let safe: String = device_id
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}/manifest.json", MANIFEST_KEY_PREFIX, safe)
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
