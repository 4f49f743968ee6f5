// Export packager - Trained model + heater profile download artifacts
use crate::domain::access::{Capability, SessionContext};
use crate::domain::error::{WorkbenchError, WorkbenchResult};
use crate::domain::heater::{HeaterProfile, HeaterStep};
use crate::domain::model::TrainedModel;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BUNDLE_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Model, heater profile and export metadata as one JSON document
    Bundle,
    /// C header exposing the model's identifying strings; no heater profile
    Header,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "bundle" | "json" => Some(ExportFormat::Bundle),
            "header" | "h" => Some(ExportFormat::Header),
            _ => None,
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Bundle => "bundle.json",
            ExportFormat::Header => "h",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Bundle => "application/json",
            ExportFormat::Header => "text/x-c",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Bundle<'a> {
    model: &'a TrainedModel,
    heater_profile: BundleProfile<'a>,
    metadata: BundleMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleProfile<'a> {
    steps: &'a [HeaterStep],
    total_duration_ms: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleMetadata {
    exported_at: DateTime<Utc>,
    format: ExportFormat,
    schema_version: &'static str,
    generator: String,
}

/// Package `model` for download. Without a completed model there is nothing to export.
pub fn export(
    ctx: &SessionContext,
    format: ExportFormat,
    model: Option<&TrainedModel>,
    profile: &HeaterProfile,
    now: DateTime<Utc>,
) -> WorkbenchResult<Option<ExportArtifact>> {
    if !ctx.has(Capability::CanExport) {
        tracing::warn!("Export denied for role {:?}", ctx.role);
        return Err(WorkbenchError::CapabilityDenied(Capability::CanExport));
    }
    let Some(model) = model else {
        tracing::debug!("Export requested without a completed model");
        return Ok(None);
    };

    let bytes = match format {
        ExportFormat::Bundle => {
            let bundle = Bundle {
                model,
                heater_profile: BundleProfile {
                    steps: profile.steps(),
                    total_duration_ms: profile.total_duration_ms(),
                },
                metadata: BundleMetadata {
                    exported_at: now,
                    format,
                    schema_version: BUNDLE_SCHEMA_VERSION,
                    generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
                },
            };
            serde_json::to_vec_pretty(&bundle).context("Failed to serialize export bundle")?
        }
        ExportFormat::Header => render_header(model).into_bytes(),
    };

    let artifact = ExportArtifact {
        file_name: file_name(&model.id, format),
        content_type: format.content_type(),
        bytes,
    };
    tracing::info!("Exported {} ({} bytes)", artifact.file_name, artifact.bytes.len());
    Ok(Some(artifact))
}

pub fn file_name(model_id: &str, format: ExportFormat) -> String {
    format!("{}.{}", sanitize(model_id, '-'), format.extension())
}

fn render_header(model: &TrainedModel) -> String {
    let guard = format!("{}_H", sanitize(&model.id, '_').to_ascii_uppercase());
    let constants = [
        ("MODEL_ID", model.id.as_str()),
        ("MODEL_TYPE", model.task.as_str()),
        ("MODEL_ALGORITHM", model.algorithm.as_str()),
        ("MODEL_LABEL", model.label.as_str()),
    ];

    let mut out = String::new();
    out.push_str(&format!("// Generated by {}\n", env!("CARGO_PKG_NAME")));
    out.push_str(&format!("#ifndef {}\n#define {}\n\n", guard, guard));
    for (name, value) in constants {
        out.push_str(&format!("static const char *{} = \"{}\";\n", name, escape_c(value)));
    }
    out.push_str(&format!("\n#endif // {}\n", guard));
    out
}

fn sanitize(raw: &str, replacement: char) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { replacement })
        .map(|c| if replacement == '_' && c == '-' { '_' } else { c })
        .collect()
}

fn escape_c(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
