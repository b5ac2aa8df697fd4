//! Loading shift configuration (defaults, exam price overrides, and an
//! optional local case bank) from TOML.
//!
//! See `ShiftConfig` and `CaseCfg` for the expected schema.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Patient, Question, Vitals};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ShiftConfig {
    /// Category served when the client does not pick one.
    #[serde(default)]
    pub default_category: Option<String>,
    /// Per-key exam price overrides, merged over the base table.
    #[serde(default)]
    pub costs: HashMap<String, i64>,
    #[serde(default)]
    pub cases: Vec<CaseCfg>,
}

/// Case entry accepted in TOML configuration. `id` is optional (a UUID is
/// assigned on load); `disease` and at least one option are required to make
/// the entry playable, which `AppState` checks on insert.
#[derive(Clone, Debug, Deserialize)]
pub struct CaseCfg {
    #[serde(default)]
    pub id: Option<String>,
    pub category: String,

    pub patient: Patient,
    pub vitals: Vitals,

    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub exam_results: HashMap<String, String>,

    pub disease: String,
    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub conduct: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub explanation: String,
}

/// Attempt to load `ShiftConfig` from SHIFT_CONFIG_PATH. On any parsing/IO
/// error, returns None.
pub fn load_shift_config_from_env() -> Option<ShiftConfig> {
    let path = std::env::var("SHIFT_CONFIG_PATH").ok()?;
    match std::fs::read_to_string(&path) {
        Ok(s) => match toml::from_str::<ShiftConfig>(&s) {
            Ok(cfg) => {
                info!(target: "shiftsim_backend", %path, "Loaded shift config (TOML)");
                Some(cfg)
            }
            Err(e) => {
                error!(target: "shiftsim_backend", %path, error = %e, "Failed to parse TOML config");
                None
            }
        },
        Err(e) => {
            error!(target: "shiftsim_backend", %path, error = %e, "Failed to read TOML config file");
            None
        }
    }
}
