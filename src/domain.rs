//! Domain models for the emergency-shift simulation: patients, cases,
//! askable questions, and where a case came from.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where did we get the case from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseOrigin {
    RemoteApi,  // fetched from the external case provider
    LocalBank,  // from user-provided TOML bank
    Seed,       // built-in seeds (last resort)
}

/// One history-taking question the player can ask the patient.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub answer: String,
    #[serde(default)]
    pub clue: String,
}

/// Patient descriptor shown in the case header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patient {
    pub name: String,
    pub age: u8,
    pub gender: String,
    #[serde(default)]
    pub avatar: String,
    pub chief_complaint: String,
}

/// Vital-signs snapshot for the monitor widget.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vitals {
    pub heart_rate: u16,
    pub blood_pressure: String,
    pub respiratory_rate: u16,
    pub temperature_c: f32,
    pub spo2: u8,
}

/// One clinical vignette, immutable once fetched.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Case {
    pub case_id: String,
    pub category: String,
    pub origin: CaseOrigin,

    pub patient: Patient,
    pub vitals: Vitals,

    /// Finite ordered list of askable questions.
    pub questions: Vec<Question>,
    /// Exam/procedure key -> result text.
    #[serde(default)]
    pub exam_results: HashMap<String, String>,

    /// Ground-truth diagnosis.
    pub disease: String,
    /// Diagnosis candidates; must contain `disease` (see `repair_options`).
    pub options: Vec<String>,

    pub conduct: String,
    #[serde(default)]
    pub treatment: String,
    #[serde(default)]
    pub explanation: String,
}

impl Case {
    /// Enforce the `disease ∈ options` invariant. Upstream sources sometimes
    /// emit option sets that omit the ground truth; in that situation the
    /// last option is replaced with `disease` so the case stays winnable.
    pub fn repair_options(&mut self) {
        if self.options.is_empty() {
            self.options.push(self.disease.clone());
            return;
        }
        if !self.options.iter().any(|o| o == &self.disease) {
            let last = self.options.len() - 1;
            self.options[last] = self.disease.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_with_options(disease: &str, options: &[&str]) -> Case {
        Case {
            case_id: "t1".into(),
            category: "general".into(),
            origin: CaseOrigin::Seed,
            patient: Patient {
                name: "Test".into(),
                age: 40,
                gender: "F".into(),
                avatar: String::new(),
                chief_complaint: "test".into(),
            },
            vitals: Vitals {
                heart_rate: 80,
                blood_pressure: "120/80".into(),
                respiratory_rate: 16,
                temperature_c: 36.8,
                spo2: 98,
            },
            questions: vec![],
            exam_results: HashMap::new(),
            disease: disease.into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            conduct: String::new(),
            treatment: String::new(),
            explanation: String::new(),
        }
    }

    #[test]
    fn repair_substitutes_last_option_when_disease_missing() {
        let mut c = case_with_options("Flu", &["Cold", "Covid", "Sinusitis"]);
        c.repair_options();
        assert_eq!(c.options, vec!["Cold", "Covid", "Flu"]);
        assert_eq!(c.options.iter().filter(|o| *o == "Flu").count(), 1);
    }

    #[test]
    fn repair_keeps_valid_option_set_untouched() {
        let mut c = case_with_options("Flu", &["Flu", "Cold"]);
        c.repair_options();
        assert_eq!(c.options, vec!["Flu", "Cold"]);
    }

    #[test]
    fn repair_handles_empty_option_set() {
        let mut c = case_with_options("Flu", &[]);
        c.repair_options();
        assert_eq!(c.options, vec!["Flu"]);
    }
}
