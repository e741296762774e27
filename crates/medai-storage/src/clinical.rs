//! Visit ingestion and history query types.

use std::collections::BTreeMap;

use medai_core::Disease;
use time::OffsetDateTime;

/// Patient demographics captured from a prescription. Upserted on every visit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientDetails {
    pub patient_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<i64>,
}

/// Comma-separated terms found by entity recognition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClinicalNotes {
    pub symptoms: Option<String>,
    pub medicines: Option<String>,
    pub tests: Option<String>,
}

/// Measurements kept with each health record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VitalsSnapshot {
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub bp_systolic: Option<i64>,
    pub bp_diastolic: Option<i64>,
}

/// Result of one disease model that ran on the visit.
#[derive(Debug, Clone, PartialEq)]
pub struct DiseaseOutcome {
    pub result: i64,
    pub confidence: f64,
    pub risk: f64,
    /// Serialized `{features, expected_features}` object.
    pub features_json: String,
}

/// The prediction row of a visit. Diseases without an outcome are stored as nulls.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub outcomes: BTreeMap<Disease, DiseaseOutcome>,
    pub disease_ids: Option<String>,
    pub disease_names: Option<String>,
    pub model_name: String,
    pub model_version: String,
}

/// Everything written for one uploaded prescription.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitIngest {
    pub serial: String,
    pub patient: PatientDetails,
    pub clean_text: String,
    pub clinical: ClinicalNotes,
    pub vitals: VitalsSnapshot,
    pub prediction: PredictionRow,
}

/// A stored outcome as read back; any column may be null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredOutcome {
    pub result: Option<i64>,
    pub confidence: Option<f64>,
    pub risk: Option<f64>,
    pub features_json: Option<String>,
}

impl From<&DiseaseOutcome> for StoredOutcome {
    fn from(outcome: &DiseaseOutcome) -> Self {
        Self {
            result: Some(outcome.result),
            confidence: Some(outcome.confidence),
            risk: Some(outcome.risk),
            features_json: Some(outcome.features_json.clone()),
        }
    }
}

/// A prescription joined with its patient, health record and prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRow {
    pub serial: String,
    pub created_at: OffsetDateTime,
    pub patient: PatientDetails,
    pub vitals: VitalsSnapshot,
    pub clinical: ClinicalNotes,
    pub outcomes: BTreeMap<Disease, StoredOutcome>,
}

impl VisitRow {
    pub fn outcome(&self, disease: Disease) -> Option<&StoredOutcome> {
        self.outcomes.get(&disease)
    }

    /// Highest stored risk over all diseases, nulls counting as zero.
    pub fn max_risk(&self) -> f64 {
        Disease::ALL
            .iter()
            .map(|d| self.outcome(*d).and_then(|o| o.risk).unwrap_or(0.0))
            .fold(0.0, f64::max)
    }
}

/// Which visits a history query covers.
#[derive(Debug, Clone, PartialEq)]
pub enum VisitSelector {
    /// Doctor lookup: the patient id or phone recorded on the prescription.
    ByPatientIdOrPhone(String),
    /// Patient portal: visits of the account's linked patient id.
    ByAccount(i64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    Risk,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisitQuery {
    pub selector: VisitSelector,
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
    pub sort: SortField,
    pub order: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl VisitQuery {
    pub fn new(selector: VisitSelector, page: u32, limit: u32) -> Self {
        Self {
            selector,
            from: None,
            to: None,
            sort: SortField::default(),
            order: SortOrder::default(),
            page,
            limit,
        }
    }

    /// Rows to skip for the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Whether a visit time falls inside the inclusive `from`/`to` window.
    pub fn in_window(&self, at: OffsetDateTime) -> bool {
        self.from.is_none_or(|from| at >= from) && self.to.is_none_or(|to| at <= to)
    }

    /// Orders rows the way the query asks, newest first on ties.
    pub fn sort_rows(&self, rows: &mut [VisitRow]) {
        rows.sort_by(|a, b| {
            let primary = match self.sort {
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Risk => a.max_risk().total_cmp(&b.max_risk()),
            };
            let primary = match self.order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| b.created_at.cmp(&a.created_at))
        });
    }
}

/// Positive prediction counts over a patient's visits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct HistorySummary {
    pub total_visits: u64,
    pub obesity_positive: u64,
    pub diabetes_positive: u64,
    pub liver_positive: u64,
    pub hypertension_positive: u64,
}

impl HistorySummary {
    /// Counts one visit's prediction results.
    pub fn add_visit(&mut self, outcomes: &BTreeMap<Disease, StoredOutcome>) {
        self.total_visits += 1;
        let positive = |d: Disease| {
            u64::from(outcomes.get(&d).and_then(|o| o.result) == Some(1))
        };
        self.obesity_positive += positive(Disease::Obesity);
        self.diabetes_positive += positive(Disease::Diabetes);
        self.liver_positive += positive(Disease::Liver);
        self.hypertension_positive += positive(Disease::Cardiovascular);
    }
}

/// One entry of the cursor-paginated history listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorEntry {
    pub serial: String,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn row(serial: &str, at: OffsetDateTime, risk: Option<f64>) -> VisitRow {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            Disease::Diabetes,
            StoredOutcome {
                result: Some(1),
                risk,
                ..StoredOutcome::default()
            },
        );
        VisitRow {
            serial: serial.into(),
            created_at: at,
            patient: PatientDetails::default(),
            vitals: VitalsSnapshot::default(),
            clinical: ClinicalNotes::default(),
            outcomes,
        }
    }

    #[test]
    fn risk_sort_treats_null_as_zero() {
        let mut rows = vec![
            row("a", datetime!(2025-01-01 10:00 UTC), None),
            row("b", datetime!(2025-01-02 10:00 UTC), Some(40.0)),
            row("c", datetime!(2025-01-03 10:00 UTC), Some(80.0)),
        ];
        let mut query = VisitQuery::new(VisitSelector::ByAccount(1), 1, 10);
        query.sort = SortField::Risk;
        query.sort_rows(&mut rows);
        let order: Vec<_> = rows.iter().map(|r| r.serial.as_str()).collect();
        assert_eq!(order, ["c", "b", "a"]);

        query.order = SortOrder::Asc;
        query.sort_rows(&mut rows);
        assert_eq!(rows[0].serial, "a");
    }

    #[test]
    fn equal_risk_falls_back_to_newest_first() {
        let mut rows = vec![
            row("old", datetime!(2025-01-01 10:00 UTC), Some(10.0)),
            row("new", datetime!(2025-02-01 10:00 UTC), Some(10.0)),
        ];
        let mut query = VisitQuery::new(VisitSelector::ByAccount(1), 1, 10);
        query.sort = SortField::Risk;
        query.sort_rows(&mut rows);
        assert_eq!(rows[0].serial, "new");
    }

    #[test]
    fn window_is_inclusive() {
        let mut query = VisitQuery::new(VisitSelector::ByAccount(1), 2, 10);
        query.from = Some(datetime!(2025-01-01 00:00 UTC));
        query.to = Some(datetime!(2025-01-31 23:59:59 UTC));
        assert!(query.in_window(datetime!(2025-01-01 00:00 UTC)));
        assert!(!query.in_window(datetime!(2025-02-01 00:00 UTC)));
        assert_eq!(query.offset(), 10);
    }

    #[test]
    fn summary_counts_hypertension_from_cardiovascular() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            Disease::Cardiovascular,
            StoredOutcome {
                result: Some(1),
                ..StoredOutcome::default()
            },
        );
        outcomes.insert(
            Disease::Obesity,
            StoredOutcome {
                result: Some(0),
                ..StoredOutcome::default()
            },
        );
        let mut summary = HistorySummary::default();
        summary.add_visit(&outcomes);
        summary.add_visit(&BTreeMap::new());
        assert_eq!(summary.total_visits, 2);
        assert_eq!(summary.hypertension_positive, 1);
        assert_eq!(summary.obesity_positive, 0);
    }
}
