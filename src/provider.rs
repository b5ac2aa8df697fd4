//! Case supply: the external case-provider REST client and the supplier
//! wrapper the queue consumes.
//!
//! `CaseApi` talks to the remote provider (paginated batch fetch plus a
//! fire-and-forget "used" notification). `CaseSupplier` layers the local
//! bank fallback and the used-id bookkeeping on top, so the rest of the
//! engine sees one `fetch_batch`/`notify_used` surface regardless of where
//! cases actually come from.
//!
//! NOTE: We never log the API token and we keep payload truncations short.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock as StdRwLock;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Case, CaseOrigin, Patient, Question, Vitals};
use crate::util::trunc_for_log;
use uuid::Uuid;

/// REST client for the external case provider.
///
/// Env:
///   CASE_API_BASE_URL : enables the remote provider if present
///   CASE_API_TOKEN    : optional bearer token
#[derive(Clone)]
pub struct CaseApi {
    client: reqwest::Client,
    pub base_url: String,
    token: Option<String>,
}

impl CaseApi {
    /// Construct the client if CASE_API_BASE_URL is set; otherwise None.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("CASE_API_BASE_URL").ok()?;
        let token = std::env::var("CASE_API_TOKEN").ok();

        // A hung provider becomes a fetch error instead of a stuck player.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .ok()?;

        Some(Self { client, base_url, token })
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req
            .header(USER_AGENT, "shiftsim-backend/0.1")
            .header(CONTENT_TYPE, "application/json");
        match &self.token {
            Some(t) => req.header(AUTHORIZATION, format!("Bearer {}", t)),
            None => req,
        }
    }

    /// Fetch up to `count` cases for a category, `start` being the running
    /// offset of cases already fetched this session.
    #[instrument(level = "info", skip(self), fields(%category, start, count))]
    pub async fn fetch_batch(
        &self,
        category: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<Case>, String> {
        let url = format!("{}/api/cases", self.base_url);
        let start_s = start.to_string();
        let count_s = count.to_string();
        let begun = std::time::Instant::now();
        let res = self
            .request(self.client.get(&url).query(&[
                ("category", category),
                ("start", start_s.as_str()),
                ("count", count_s.as_str()),
            ]))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let msg = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
            return Err(format!("case provider HTTP {}: {}", status, msg));
        }

        let body: FetchBatchResponse = res.json().await.map_err(|e| e.to_string())?;
        let elapsed = begun.elapsed();
        info!(?elapsed, received = body.cases.len(), "Case batch received");

        Ok(body.cases.into_iter().map(ApiCase::into_case).collect())
    }

    /// Best-effort "this case was played" signal. Errors bubble up as
    /// strings so the caller can log-and-swallow.
    #[instrument(level = "debug", skip(self), fields(%case_id))]
    pub async fn notify_used(&self, case_id: &str) -> Result<(), String> {
        let url = format!("{}/api/cases/{}/used", self.base_url, case_id);
        let res = self
            .request(self.client.post(&url))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            let msg = extract_api_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
            return Err(format!("case provider HTTP {}: {}", status, msg));
        }
        Ok(())
    }
}

/// Supplier surface consumed by the queue manager: remote provider first,
/// local bank fallback. A case leaves the pool only when it is retired
/// (`mark_used`/`notify_used`); fetching alone never consumes it, so a
/// discarded queue's unplayed cases stay servable. Callers pass the ids
/// they already hold as `exclude` so a session never re-fetches its own
/// buffered batch.
pub struct CaseSupplier {
    api: Option<CaseApi>,
    bank: Vec<Case>,
    used: StdRwLock<HashSet<String>>,
    fetch_calls: AtomicUsize,
}

impl CaseSupplier {
    pub fn new(api: Option<CaseApi>, bank: Vec<Case>) -> Self {
        Self {
            api,
            bank,
            used: StdRwLock::new(HashSet::new()),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// How many batch fetches have been issued (diagnostics and tests).
    #[allow(dead_code)]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Fetch a batch for `category`. Returns between 0 and `count` cases;
    /// an empty batch is the degenerate "supply exhausted" answer the
    /// caller must handle. `exclude` holds the case ids the caller already
    /// has in hand (active or buffered).
    #[instrument(level = "info", skip(self, exclude), fields(%category, start, count))]
    pub async fn fetch_batch(
        &self,
        category: &str,
        start: usize,
        count: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<Case>, String> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(api) = &self.api {
            match api.fetch_batch(category, start, count).await {
                Ok(batch) if !batch.is_empty() => {
                    let filtered = self.drop_known(batch, exclude);
                    if !filtered.is_empty() {
                        return Ok(filtered);
                    }
                    warn!(target: "case_supply", %category, "Remote batch fully deduplicated; trying local bank");
                }
                Ok(_) => {
                    warn!(target: "case_supply", %category, "Remote provider returned no cases; trying local bank");
                }
                Err(e) => {
                    warn!(target: "case_supply", %category, error = %e, "Remote fetch failed; trying local bank");
                }
            }
        }

        let batch = self.fetch_from_bank(category, count, exclude);
        debug!(target: "case_supply", %category, served = batch.len(), "Bank batch served");
        Ok(batch)
    }

    /// Drop retired or already-held cases from a remote batch.
    fn drop_known(&self, batch: Vec<Case>, exclude: &HashSet<String>) -> Vec<Case> {
        let used = self.used.read().expect("used set poisoned");
        batch
            .into_iter()
            .filter(|c| !used.contains(&c.case_id) && !exclude.contains(&c.case_id))
            .collect()
    }

    /// Local bank batch: cases of the category not yet retired and not yet
    /// in the caller's hands, in bank order.
    fn fetch_from_bank(&self, category: &str, count: usize, exclude: &HashSet<String>) -> Vec<Case> {
        let used = self.used.read().expect("used set poisoned");
        let mut out = Vec::new();
        for c in &self.bank {
            if out.len() == count {
                break;
            }
            if c.category != category
                || used.contains(&c.case_id)
                || exclude.contains(&c.case_id)
            {
                continue;
            }
            out.push(c.clone());
        }
        out
    }

    /// Local dedup bookkeeping: takes effect immediately, so a fetch issued
    /// right after a retire never resupplies the case.
    pub fn mark_used(&self, case_id: &str) {
        self.used
            .write()
            .expect("used set poisoned")
            .insert(case_id.to_string());
    }

    /// Fire-and-forget dedup hint. Local bookkeeping always succeeds;
    /// remote rejections are logged and dropped, never surfaced.
    #[instrument(level = "debug", skip(self), fields(%case_id))]
    pub async fn notify_used(&self, case_id: &str) {
        self.mark_used(case_id);
        if let Some(api) = &self.api {
            if let Err(e) = api.notify_used(case_id).await {
                warn!(target: "case_supply", %case_id, error = %e, "notify_used failed (ignored)");
            }
        }
    }
}

// --- Wire DTOs (provider speaks camelCase) ---

#[derive(Deserialize)]
struct FetchBatchResponse {
    cases: Vec<ApiCase>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCase {
    #[serde(default)]
    case_id: Option<String>,
    #[serde(default)]
    category: String,
    patient: ApiPatient,
    vitals: ApiVitals,
    #[serde(default)]
    questions: Vec<ApiQuestion>,
    #[serde(default)]
    exam_results: HashMap<String, String>,
    disease: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    conduct: String,
    #[serde(default)]
    treatment: String,
    #[serde(default)]
    explanation: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPatient {
    name: String,
    age: u8,
    gender: String,
    #[serde(default)]
    avatar: String,
    chief_complaint: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVitals {
    heart_rate: u16,
    blood_pressure: String,
    respiratory_rate: u16,
    temperature_c: f32,
    spo2: u8,
}

#[derive(Deserialize)]
struct ApiQuestion {
    text: String,
    answer: String,
    #[serde(default)]
    clue: String,
}

impl ApiCase {
    fn into_case(self) -> Case {
        Case {
            case_id: self.case_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            category: self.category,
            origin: CaseOrigin::RemoteApi,
            patient: Patient {
                name: self.patient.name,
                age: self.patient.age,
                gender: self.patient.gender,
                avatar: self.patient.avatar,
                chief_complaint: self.patient.chief_complaint,
            },
            vitals: Vitals {
                heart_rate: self.vitals.heart_rate,
                blood_pressure: self.vitals.blood_pressure,
                respiratory_rate: self.vitals.respiratory_rate,
                temperature_c: self.vitals.temperature_c,
                spo2: self.vitals.spo2,
            },
            questions: self
                .questions
                .into_iter()
                .map(|q| Question { text: q.text, answer: q.answer, clue: q.clue })
                .collect(),
            exam_results: self.exam_results,
            disease: self.disease,
            options: self.options,
            conduct: self.conduct,
            treatment: self.treatment,
            explanation: self.explanation,
        }
    }
}

/// Try to extract a clean error message from a provider error body.
fn extract_api_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct EWrap {
        error: EObj,
    }
    #[derive(Deserialize)]
    struct EObj {
        message: String,
    }
    match serde_json::from_str::<EWrap>(body) {
        Ok(w) => Some(w.error.message),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::seed_cases;

    #[tokio::test]
    async fn fetching_alone_does_not_consume_bank_cases() {
        let sup = CaseSupplier::new(None, seed_cases());
        let first = sup.fetch_batch("general", 0, 10, &HashSet::new()).await.unwrap();
        assert_eq!(first.len(), 3);
        // only retiring removes a case from the pool
        let again = sup.fetch_batch("general", 0, 10, &HashSet::new()).await.unwrap();
        assert_eq!(again.len(), 3);
    }

    #[tokio::test]
    async fn exclude_set_hides_a_callers_own_batch() {
        let sup = CaseSupplier::new(None, seed_cases());
        let first = sup.fetch_batch("general", 0, 10, &HashSet::new()).await.unwrap();
        let held: HashSet<String> = first.iter().map(|c| c.case_id.clone()).collect();
        let second = sup.fetch_batch("general", 3, 10, &held).await.unwrap();
        assert!(second.is_empty(), "a session must not re-fetch what it holds");
    }

    #[tokio::test]
    async fn bank_fetch_respects_count_and_order() {
        let sup = CaseSupplier::new(None, seed_cases());
        let batch = sup.fetch_batch("general", 0, 2, &HashSet::new()).await.unwrap();
        let ids: Vec<&str> = batch.iter().map(|c| c.case_id.as_str()).collect();
        assert_eq!(ids, vec!["seed-flu-01", "seed-appendicitis-01"]);
    }

    #[tokio::test]
    async fn notify_used_excludes_case_from_future_batches() {
        let sup = CaseSupplier::new(None, seed_cases());
        sup.notify_used("seed-flu-01").await;
        let batch = sup.fetch_batch("general", 0, 10, &HashSet::new()).await.unwrap();
        assert!(batch.iter().all(|c| c.case_id != "seed-flu-01"));
        assert_eq!(batch.len(), 2);
    }

    #[tokio::test]
    async fn mark_used_takes_effect_for_an_immediate_fetch() {
        let sup = CaseSupplier::new(None, seed_cases());
        sup.mark_used("seed-appendicitis-01");
        let batch = sup.fetch_batch("general", 0, 10, &HashSet::new()).await.unwrap();
        assert!(batch.iter().all(|c| c.case_id != "seed-appendicitis-01"));
    }

    #[tokio::test]
    async fn unknown_category_yields_empty_batch() {
        let sup = CaseSupplier::new(None, seed_cases());
        let batch = sup.fetch_batch("obstetrics", 0, 10, &HashSet::new()).await.unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn api_error_extraction() {
        let body = r#"{"error":{"message":"category not found"}}"#;
        assert_eq!(extract_api_error(body).as_deref(), Some("category not found"));
        assert_eq!(extract_api_error("plain text"), None);
    }
}
