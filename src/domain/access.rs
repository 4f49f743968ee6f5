// Explicit session context for capability-gated operations
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Capability {
    #[serde(rename = "can-train")]
    CanTrain,
    #[serde(rename = "can-export")]
    CanExport,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::CanTrain => "can-train",
            Capability::CanExport => "can-export",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Viewer,
    Operator,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "viewer" => Some(Role::Viewer),
            "operator" => Some(Role::Operator),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Passed into every gated operation instead of being read from ambient storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub role: Role,
}

impl SessionContext {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn has(&self, capability: Capability) -> bool {
        match (self.role, capability) {
            (Role::Admin, _) => true,
            (Role::Operator, Capability::CanTrain) => true,
            _ => false,
        }
    }
}
