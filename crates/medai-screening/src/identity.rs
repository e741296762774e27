//! Prescription serial and patient identity extraction.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static SERIAL_PRIMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:prescription\s*serial|rx\s*no|prescription\s*no)\s*[:#\-]?\s*(\d{3,})")
        .expect("Invalid serial regex")
});

static SERIAL_FALLBACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)serial\s*no\s*[:#\-]?\s*(\d{3,})").expect("Invalid serial regex")
});

static PATIENT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Patient\s*ID|Pt\s*ID|PID|ID)\s*[:\-]?\s*([A-Za-z0-9/\-]+)")
        .expect("Invalid patient id regex")
});

// The stop word is matched (not looked ahead) and excluded from the capture.
// Greedy capture plus leftmost-first semantics pick the same name a
// lookahead would.
static PATIENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:Patient\s*Name|Pt\s*Name|Name)\s*[:\-]?\s*([A-Za-z.\s]{3,60})\s*(?:Contact|Phone|Mobile|Gender|Age|Wt|Weight|Ht|Height|BP|Blood|$)",
    )
    .expect("Invalid patient name regex")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:Contact|Phone|Mobile|Tel)?\s*[:\-]?\s*(\+?8801\d{9}|01\d{9})")
        .expect("Invalid phone regex")
});

/// Patient identity fields printed on a prescription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientIdentity {
    pub patient_id: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

fn first_group(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Finds the prescription serial number.
pub fn extract_prescription_serial(text: &str) -> Option<String> {
    first_group(&SERIAL_PRIMARY, text).or_else(|| first_group(&SERIAL_FALLBACK, text))
}

/// Extracts patient id, name and phone when present.
pub fn extract_patient_identity(text: &str) -> PatientIdentity {
    PatientIdentity {
        patient_id: first_group(&PATIENT_ID, text),
        name: first_group(&PATIENT_NAME, text),
        phone: first_group(&PHONE, text),
    }
}
