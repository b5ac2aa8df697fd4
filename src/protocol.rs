//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Patient, Vitals};
use crate::session::{LogEntry, Phase, SessionState, Tab};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartShift {
        category: Option<String>,
    },
    SelectTab {
        tab: Tab,
    },
    AskQuestion {
        index: usize,
    },
    OrderExam {
        key: String,
    },
    SubmitDiagnosis {
        option: String,
    },
    NextCase,
    SkipCase,
    Restart,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Session {
        session: SessionOut,
    },
    Error {
        message: String,
    },
}

/// One askable question as the UI sees it: text and asked-flag only, the
/// answer and clue arrive through the event log once asked.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub index: usize,
    pub text: String,
    pub asked: bool,
}

/// Observable session snapshot rendered by the simulation screen.
#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(flatten)]
    pub phase: Phase,
    pub tab: Tab,
    pub reputation: i32,
    pub money: i64,
    pub cases_solved: u32,

    pub patient: Option<Patient>,
    pub vitals: Option<Vitals>,
    pub questions: Vec<QuestionOut>,
    pub exams_done: Vec<String>,
    pub options: Vec<String>,
    pub log: Vec<LogEntry>,
}

/// Convert the engine's state (internal) to the public DTO. The case's
/// disease, answers and clues are deliberately absent.
pub fn to_out(s: &SessionState) -> SessionOut {
    let questions = s
        .active_case
        .as_ref()
        .map(|c| {
            c.questions
                .iter()
                .enumerate()
                .map(|(i, q)| QuestionOut {
                    index: i,
                    text: q.text.clone(),
                    asked: s.questions_asked.contains(&i),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut exams_done: Vec<String> = s.exams_done.iter().cloned().collect();
    exams_done.sort();

    SessionOut {
        phase: s.phase.clone(),
        tab: s.tab,
        reputation: s.reputation,
        money: s.money,
        cases_solved: s.cases_solved,
        patient: s.active_case.as_ref().map(|c| c.patient.clone()),
        vitals: s.active_case.as_ref().map(|c| c.vitals.clone()),
        questions,
        exams_done,
        options: s
            .active_case
            .as_ref()
            .map(|c| c.options.clone())
            .unwrap_or_default(),
        log: s.log.clone(),
    }
}

//
// HTTP response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct CategoriesOut {
    pub default_category: String,
    pub categories: Vec<String>,
}

#[derive(Serialize)]
pub struct ExamPriceOut {
    pub key: String,
    pub cost: i64,
}

#[derive(Serialize)]
pub struct ExamPricesOut {
    pub default_cost: i64,
    pub prices: Vec<ExamPriceOut>,
}
