//! Application state: the case bank, exam pricing, and the shared supplier.
//!
//! This module owns:
//!   - the local case bank assembled from TOML config plus built-in seeds
//!   - the exam price table (base prices + config overrides)
//!   - the optional remote case-provider client
//!
//! Per-session state (queue, economy, state machine) lives in `session` and
//! is created per WebSocket connection; `AppState` only carries what every
//! session shares.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::load_shift_config_from_env;
use crate::domain::{Case, CaseOrigin};
use crate::economy::ExamPricing;
use crate::provider::{CaseApi, CaseSupplier};
use crate::seeds::seed_cases;

#[derive(Clone)]
pub struct AppState {
    pub supplier: Arc<CaseSupplier>,
    pub pricing: ExamPricing,
    pub default_category: String,
    pub categories: Vec<String>,
}

impl AppState {
    /// Build state from env: load config, assemble the bank, init the
    /// remote provider client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_shift_config_from_env().unwrap_or_default();
        let default_category = cfg
            .default_category
            .clone()
            .unwrap_or_else(|| "general".to_string());
        let pricing = ExamPricing::new(cfg.costs.clone());

        let mut bank: Vec<Case> = Vec::new();
        let mut seen_ids = HashSet::new();

        // Config-bank entries first; they may shadow seed ids.
        for cc in cfg.cases {
            let id = cc.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
            if cc.disease.trim().is_empty() {
                error!(target: "case_supply", %id, "Skipping bank case: missing disease.");
                continue;
            }
            if !seen_ids.insert(id.clone()) {
                error!(target: "case_supply", %id, "Skipping bank case: duplicate id.");
                continue;
            }
            let mut case = Case {
                case_id: id,
                category: cc.category,
                origin: CaseOrigin::LocalBank,
                patient: cc.patient,
                vitals: cc.vitals,
                questions: cc.questions,
                exam_results: cc.exam_results,
                disease: cc.disease,
                options: cc.options,
                conduct: cc.conduct,
                treatment: cc.treatment,
                explanation: cc.explanation,
            };
            // Bank entries may omit the ground truth from their options.
            case.repair_options();
            bank.push(case);
        }

        // Always append built-in seeds, without clobbering bank ids.
        for c in seed_cases() {
            if seen_ids.insert(c.case_id.clone()) {
                bank.push(c);
            }
        }

        // Inventory summary by category/origin.
        let mut count_by_cat: HashMap<String, (usize, usize)> = HashMap::new();
        for c in &bank {
            let entry = count_by_cat.entry(c.category.clone()).or_insert((0, 0));
            match c.origin {
                CaseOrigin::LocalBank => entry.0 += 1,
                _ => entry.1 += 1,
            }
        }
        for (category, (from_bank, from_seed)) in &count_by_cat {
            info!(target: "case_supply", %category, bank = from_bank, seed = from_seed, "Startup case inventory");
        }

        let mut categories: Vec<String> = count_by_cat.into_keys().collect();
        if !categories.contains(&default_category) {
            categories.push(default_category.clone());
        }
        categories.sort();

        // Build the optional remote provider client.
        let api = CaseApi::from_env();
        if let Some(a) = &api {
            info!(target: "shiftsim_backend", base_url = %a.base_url, "Remote case provider enabled.");
        } else {
            info!(target: "shiftsim_backend", "Remote case provider disabled (no CASE_API_BASE_URL). Using local bank.");
        }

        Self {
            supplier: Arc::new(CaseSupplier::new(api, bank)),
            pricing,
            default_category,
            categories,
        }
    }
}
