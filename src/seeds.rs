//! Built-in seed cases that keep the simulation playable even without an
//! external case provider or a TOML bank.

use std::collections::HashMap;

use crate::domain::{Case, CaseOrigin, Patient, Question, Vitals};

fn q(text: &str, answer: &str, clue: &str) -> Question {
    Question {
        text: text.into(),
        answer: answer.into(),
        clue: clue.into(),
    }
}

/// Minimal set of complete vignettes covering the "general" category.
pub fn seed_cases() -> Vec<Case> {
    vec![
        Case {
            case_id: "seed-flu-01".into(),
            category: "general".into(),
            origin: CaseOrigin::Seed,
            patient: Patient {
                name: "Marina Lopes".into(),
                age: 29,
                gender: "F".into(),
                avatar: "avatar_f_01".into(),
                chief_complaint: "Fever and body aches for two days".into(),
            },
            vitals: Vitals {
                heart_rate: 98,
                blood_pressure: "118/76".into(),
                respiratory_rate: 18,
                temperature_c: 38.6,
                spo2: 97,
            },
            questions: vec![
                q(
                    "When did the fever start?",
                    "Two days ago, it came on suddenly with chills.",
                    "Abrupt onset points away from a common cold.",
                ),
                q(
                    "Any cough or sore throat?",
                    "A dry cough and my throat is a bit scratchy.",
                    "Dry cough with systemic symptoms fits a viral syndrome.",
                ),
                q(
                    "Anyone around you sick?",
                    "Half of my office is out with the same thing.",
                    "Sick contacts in flu season are a strong hint.",
                ),
            ],
            exam_results: HashMap::from([
                (
                    "blood_count".to_string(),
                    "Mild leukopenia, lymphocyte predominance.".to_string(),
                ),
                (
                    "chest_xray".to_string(),
                    "No consolidation or effusion.".to_string(),
                ),
            ]),
            disease: "Influenza".into(),
            options: vec![
                "Influenza".into(),
                "Common cold".into(),
                "Bacterial pneumonia".into(),
                "Dengue fever".into(),
            ],
            conduct: "Rest, hydration and antipyretics; review if dyspnea develops.".into(),
            treatment: "Oseltamivir 75 mg twice daily for 5 days if within 48 h of onset.".into(),
            explanation: "Sudden fever, myalgia, dry cough and sick contacts during flu season \
                          with a clean chest film favor influenza over bacterial pneumonia."
                .into(),
        },
        Case {
            case_id: "seed-appendicitis-01".into(),
            category: "general".into(),
            origin: CaseOrigin::Seed,
            patient: Patient {
                name: "Jonas Ferreira".into(),
                age: 22,
                gender: "M".into(),
                avatar: "avatar_m_02".into(),
                chief_complaint: "Abdominal pain migrating to the right lower quadrant".into(),
            },
            vitals: Vitals {
                heart_rate: 104,
                blood_pressure: "124/80".into(),
                respiratory_rate: 18,
                temperature_c: 37.9,
                spo2: 99,
            },
            questions: vec![
                q(
                    "Where did the pain start?",
                    "Around my belly button, then it moved down to the right.",
                    "Periumbilical pain migrating to the RLQ is the classic story.",
                ),
                q(
                    "Any nausea or vomiting?",
                    "I vomited twice and have no appetite at all.",
                    "Anorexia after pain onset supports appendicitis.",
                ),
                q(
                    "Does moving make it worse?",
                    "Every bump in the car ride here was awful.",
                    "Pain on movement suggests peritoneal irritation.",
                ),
            ],
            exam_results: HashMap::from([
                (
                    "blood_count".to_string(),
                    "Leukocytosis 14.2 with neutrophilia.".to_string(),
                ),
                (
                    "ultrasound".to_string(),
                    "Non-compressible tubular structure in the RLQ, 9 mm.".to_string(),
                ),
                (
                    "urinalysis".to_string(),
                    "No alterations.".to_string(),
                ),
            ]),
            disease: "Acute appendicitis".into(),
            options: vec![
                "Acute appendicitis".into(),
                "Renal colic".into(),
                "Gastroenteritis".into(),
                "Ectopic pregnancy".into(),
            ],
            conduct: "Keep fasting, start IV fluids and analgesia, request surgical evaluation."
                .into(),
            treatment: "Appendectomy plus perioperative antibiotics.".into(),
            explanation: "Migratory RLQ pain, anorexia, localized peritonism, leukocytosis and a \
                          dilated non-compressible appendix on ultrasound close the diagnosis."
                .into(),
        },
        Case {
            case_id: "seed-mi-01".into(),
            category: "general".into(),
            origin: CaseOrigin::Seed,
            patient: Patient {
                name: "Helena Duarte".into(),
                age: 61,
                gender: "F".into(),
                avatar: "avatar_f_03".into(),
                chief_complaint: "Crushing chest pain radiating to the left arm".into(),
            },
            vitals: Vitals {
                heart_rate: 92,
                blood_pressure: "150/95".into(),
                respiratory_rate: 20,
                temperature_c: 36.7,
                spo2: 95,
            },
            questions: vec![
                q(
                    "What were you doing when the pain began?",
                    "Climbing the stairs at home, about an hour ago.",
                    "Exertional onset raises the ischemic suspicion.",
                ),
                q(
                    "Any sweating or nausea with the pain?",
                    "I got drenched in cold sweat and felt sick.",
                    "Autonomic symptoms often accompany infarction.",
                ),
                q(
                    "Do you have any known conditions?",
                    "High blood pressure and diabetes, both for years.",
                    "Hypertension and diabetes are major coronary risk factors.",
                ),
            ],
            exam_results: HashMap::from([
                (
                    "ecg".to_string(),
                    "ST elevation in leads II, III and aVF.".to_string(),
                ),
                (
                    "troponin".to_string(),
                    "Elevated at 1.8 ng/mL, rising pattern.".to_string(),
                ),
                (
                    "chest_xray".to_string(),
                    "No alterations.".to_string(),
                ),
            ]),
            disease: "Acute myocardial infarction".into(),
            options: vec![
                "Acute myocardial infarction".into(),
                "Unstable angina".into(),
                "Aortic dissection".into(),
                "Panic attack".into(),
            ],
            conduct: "MONA protocol as indicated, continuous monitoring, activate the cath lab."
                .into(),
            treatment: "Dual antiplatelet therapy, anticoagulation and primary PCI.".into(),
            explanation: "Exertional crushing pain with autonomic symptoms, inferior ST \
                          elevation and rising troponin define an inferior STEMI; dissection is \
                          unlikely with symmetric pulses and a normal mediastinum."
                .into(),
        },
    ]
}
