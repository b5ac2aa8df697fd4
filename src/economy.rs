//! Session economy: exam pricing and the scoring constants applied on
//! diagnosis submission.
//!
//! Reputation and money only move at the points named here:
//!   - ordering an exam debits its price (blocked if funds are short)
//!   - a correct diagnosis pays +150 and +5 reputation (capped at 100)
//!   - a wrong diagnosis costs 15 reputation
//! Reaching zero reputation ends the shift.

use std::collections::HashMap;

pub const INITIAL_REPUTATION: i32 = 100;
pub const INITIAL_MONEY: i64 = 500;
pub const REPUTATION_CAP: i32 = 100;

pub const CORRECT_REPUTATION_BONUS: i32 = 5;
pub const CORRECT_MONEY_REWARD: i64 = 150;
pub const WRONG_REPUTATION_PENALTY: i32 = 15;

/// Price charged for exam keys missing from the table.
pub const DEFAULT_EXAM_COST: i64 = 40;

/// Base price table. Bedside/lab panels ~10-25 credits, imaging 60-120.
const BASE_COSTS: &[(&str, i64)] = &[
    ("glucose", 10),
    ("blood_count", 15),
    ("urinalysis", 15),
    ("electrolytes", 20),
    ("ecg", 25),
    ("troponin", 25),
    ("blood_culture", 25),
    ("chest_xray", 60),
    ("abdominal_xray", 60),
    ("ultrasound", 80),
    ("lumbar_puncture", 90),
    ("ct_scan", 120),
    ("mri", 120),
];

/// Exam price lookup with optional per-key overrides from TOML config.
#[derive(Clone, Debug, Default)]
pub struct ExamPricing {
    overrides: HashMap<String, i64>,
}

impl ExamPricing {
    pub fn new(overrides: HashMap<String, i64>) -> Self {
        Self { overrides }
    }

    /// Price of one exam key. Override wins over the base table; unknown
    /// keys fall back to [`DEFAULT_EXAM_COST`].
    pub fn cost_of(&self, key: &str) -> i64 {
        if let Some(c) = self.overrides.get(key) {
            return *c;
        }
        BASE_COSTS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, c)| *c)
            .unwrap_or(DEFAULT_EXAM_COST)
    }

    /// Full price list for the UI shop widget (base table plus overrides,
    /// sorted by key).
    pub fn price_list(&self) -> Vec<(String, i64)> {
        let mut out: HashMap<String, i64> = BASE_COSTS
            .iter()
            .map(|(k, c)| (k.to_string(), *c))
            .collect();
        for (k, c) in &self.overrides {
            out.insert(k.clone(), *c);
        }
        let mut list: Vec<(String, i64)> = out.into_iter().collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_table_prices_resolve() {
        let p = ExamPricing::default();
        assert_eq!(p.cost_of("glucose"), 10);
        assert_eq!(p.cost_of("ct_scan"), 120);
    }

    #[test]
    fn unknown_key_uses_default_cost() {
        let p = ExamPricing::default();
        assert_eq!(p.cost_of("tarot_reading"), DEFAULT_EXAM_COST);
    }

    #[test]
    fn override_wins_over_base_table() {
        let mut o = HashMap::new();
        o.insert("ecg".to_string(), 5);
        o.insert("biopsy".to_string(), 200);
        let p = ExamPricing::new(o);
        assert_eq!(p.cost_of("ecg"), 5);
        assert_eq!(p.cost_of("biopsy"), 200);
        // untouched keys keep base prices
        assert_eq!(p.cost_of("ultrasound"), 80);
    }

    #[test]
    fn price_list_merges_and_sorts() {
        let mut o = HashMap::new();
        o.insert("biopsy".to_string(), 200);
        let p = ExamPricing::new(o);
        let list = p.price_list();
        assert!(list.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(list.iter().any(|(k, c)| k == "biopsy" && *c == 200));
        assert!(list.iter().any(|(k, c)| k == "mri" && *c == 120));
    }
}
