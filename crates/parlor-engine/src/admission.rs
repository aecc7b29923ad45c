//! The admission gate: startup compatibility check against the gateway's
//! declared interface version and capability surfaces.
//!
//! Admission is pass/fail, never degraded: a version mismatch or a missing
//! required surface is fatal to the session and surfaced distinctly from
//! connectivity loss, so an operator can tell "wrong backend" apart from
//! "backend down".

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::AdmissionError;

/// Interface version this client speaks. Anything else is refused.
pub const REQUIRED_INTERFACE_VERSION: u32 = 2;

/// Surfaces that must all be enabled for the engine to operate.
pub const REQUIRED_SURFACES: [&str; 3] = ["historical-fetch", "intent-ingress", "live-tail"];

/// The gateway's declared capabilities.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Declared interface version.
    pub interface_version: u32,
    /// Available model providers.
    #[serde(default)]
    pub providers: Vec<ProviderInfo>,
    /// Named boolean surfaces.
    #[serde(default)]
    pub surfaces: HashMap<String, bool>,
}

/// One model provider advertised by the gateway.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider instance id.
    pub id: String,
    /// Provider family name.
    pub provider: String,
    /// Models this provider serves.
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// One selectable model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier used in intent envelopes.
    pub id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Capabilities {
    /// The default model: the first provider's first model.
    #[must_use]
    pub fn default_model(&self) -> Option<&str> {
        self.providers
            .first()
            .and_then(|p| p.models.first())
            .map(|m| m.id.as_str())
    }

    /// All selectable model ids across providers.
    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.providers
            .iter()
            .flat_map(|p| p.models.iter().map(|m| m.id.as_str()))
    }
}

/// Evaluate the admission gate over declared capabilities.
///
/// The version must match [`REQUIRED_INTERFACE_VERSION`] exactly and every
/// surface in [`REQUIRED_SURFACES`] must be present and enabled.
pub fn evaluate(capabilities: &Capabilities) -> Result<(), AdmissionError> {
    if capabilities.interface_version != REQUIRED_INTERFACE_VERSION {
        return Err(AdmissionError::VersionMismatch {
            required: REQUIRED_INTERFACE_VERSION,
            actual: capabilities.interface_version,
        });
    }
    for surface in REQUIRED_SURFACES {
        if !capabilities.surfaces.get(surface).copied().unwrap_or(false) {
            return Err(AdmissionError::MissingSurface(surface.to_owned()));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn admissible() -> Capabilities {
        serde_json::from_value(json!({
            "interface_version": 2,
            "providers": [
                {"id": "anthropic-main", "provider": "anthropic", "models": [
                    {"id": "claude-sonnet-4", "name": "Claude Sonnet 4"},
                    {"id": "claude-haiku-3"}
                ]},
                {"id": "local", "provider": "ollama", "models": [{"id": "qwen3"}]}
            ],
            "surfaces": {
                "historical-fetch": true,
                "intent-ingress": true,
                "live-tail": true,
                "metrics-export": false
            }
        }))
        .unwrap()
    }

    #[test]
    fn compatible_gateway_is_admitted() {
        assert_matches!(evaluate(&admissible()), Ok(()));
    }

    #[test]
    fn version_mismatch_is_fatal() {
        let mut caps = admissible();
        caps.interface_version = 3;
        assert_matches!(
            evaluate(&caps),
            Err(AdmissionError::VersionMismatch { required: 2, actual: 3 })
        );
    }

    #[test]
    fn disabled_surface_is_fatal() {
        let mut caps = admissible();
        let _ = caps.surfaces.insert("live-tail".into(), false);
        assert_matches!(
            evaluate(&caps),
            Err(AdmissionError::MissingSurface(s)) if s == "live-tail"
        );
    }

    #[test]
    fn absent_surface_is_fatal() {
        let mut caps = admissible();
        let _ = caps.surfaces.remove("intent-ingress");
        assert_matches!(
            evaluate(&caps),
            Err(AdmissionError::MissingSurface(s)) if s == "intent-ingress"
        );
    }

    #[test]
    fn extra_surfaces_do_not_matter() {
        let mut caps = admissible();
        let _ = caps.surfaces.insert("experimental-voice".into(), true);
        assert_matches!(evaluate(&caps), Ok(()));
    }

    #[test]
    fn default_model_is_first_of_first_provider() {
        assert_eq!(admissible().default_model(), Some("claude-sonnet-4"));
        assert_eq!(Capabilities::default().default_model(), None);
    }

    #[test]
    fn model_ids_flatten_across_providers() {
        let caps = admissible();
        let ids: Vec<&str> = caps.model_ids().collect();
        assert_eq!(ids, vec!["claude-sonnet-4", "claude-haiku-3", "qwen3"]);
    }
}
