//! Visit ingestion and history queries.
//!
//! A visit spans four tables joined by prescription serial: `prescriptions`,
//! `patient_health_records`, `disease_prediction`, plus `patient_details`
//! keyed by patient id. Prediction columns are named `<storage_key>_<field>`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use medai_core::Disease;
use medai_storage::{
    ClinicalNotes, ClinicalStore, CursorEntry, HistorySummary, PatientDetails, SortField,
    SortOrder, StorageError, StorageResult, StoredOutcome, VisitIngest, VisitQuery, VisitRow,
    VisitSelector, VitalsSnapshot,
};
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query::{Query, query};
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_core::row::Row;
use sqlx_postgres::{PgArguments, PgRow, Postgres};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::error::{is_unique_violation, query_error};
use crate::storage::PostgresStorage;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

const DUPLICATE_SERIAL: &str = "This prescription has already been uploaded";

const FROM_VISITS: &str = r#"FROM prescriptions pr
LEFT JOIN patient_details pd ON pd.patient_id = pr.patient_id
LEFT JOIN patient_health_records hr ON hr.serial = pr.serial
LEFT JOIN disease_prediction dp ON dp.serial = pr.serial"#;

const ACCOUNT_FILTER: &str = "pr.patient_id = (SELECT patient_id FROM patients WHERE id = $1)";

fn outcome_fields(prefix: &str) -> Vec<String> {
    Disease::ALL
        .iter()
        .flat_map(|d| {
            let key = d.storage_key();
            ["result", "confidence", "risk", "features_json"]
                .map(|field| format!("{prefix}{key}_{field}"))
        })
        .collect()
}

fn select_visits() -> String {
    format!(
        r#"SELECT pr.serial, pr.created_at, pr.patient_id,
       pd.name, pd.phone, pd.age, pd.gender,
       hr.height_cm, hr.weight_kg, hr.bmi, hr.bp_systolic, hr.bp_diastolic,
       pr.symptoms, pr.medicines, pr.tests,
       {}
{FROM_VISITS}"#,
        outcome_fields("dp.").join(", ")
    )
}

/// Highest risk of a visit with nulls as zero.
fn max_risk_expr() -> String {
    let terms: Vec<String> = Disease::ALL
        .iter()
        .map(|d| format!("COALESCE(dp.{}_risk, 0)", d.storage_key()))
        .collect();
    format!("GREATEST({})", terms.join(", "))
}

fn selector_filter(selector: &VisitSelector) -> &'static str {
    match selector {
        VisitSelector::ByPatientIdOrPhone(_) => "(pd.patient_id = $1 OR pd.phone = $1)",
        VisitSelector::ByAccount(_) => ACCOUNT_FILTER,
    }
}

fn where_clause(selector: &VisitSelector) -> String {
    format!(
        "WHERE {} AND ($2::timestamptz IS NULL OR pr.created_at >= $2) \
         AND ($3::timestamptz IS NULL OR pr.created_at <= $3)",
        selector_filter(selector)
    )
}

fn order_clause(query: &VisitQuery) -> String {
    let field = match query.sort {
        SortField::CreatedAt => "pr.created_at".to_string(),
        SortField::Risk => max_risk_expr(),
    };
    let direction = match query.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    format!("ORDER BY {field} {direction}, pr.created_at DESC")
}

fn bind_filters<'q>(q: PgQuery<'q>, query: &'q VisitQuery) -> PgQuery<'q> {
    let q = match &query.selector {
        VisitSelector::ByPatientIdOrPhone(term) => q.bind(term.as_str()),
        VisitSelector::ByAccount(id) => q.bind(*id),
    };
    q.bind(query.from).bind(query.to)
}

fn visit_from_row(row: &PgRow) -> Result<VisitRow, SqlxError> {
    let mut outcomes = BTreeMap::new();
    for disease in Disease::ALL {
        let key = disease.storage_key();
        outcomes.insert(
            disease,
            StoredOutcome {
                result: row.try_get(format!("{key}_result").as_str())?,
                confidence: row.try_get(format!("{key}_confidence").as_str())?,
                risk: row.try_get(format!("{key}_risk").as_str())?,
                features_json: row.try_get(format!("{key}_features_json").as_str())?,
            },
        );
    }

    Ok(VisitRow {
        serial: row.try_get("serial")?,
        created_at: row.try_get("created_at")?,
        patient: PatientDetails {
            patient_id: row.try_get("patient_id")?,
            name: row.try_get("name")?,
            phone: row.try_get("phone")?,
            age: row.try_get("age")?,
            gender: row.try_get("gender")?,
        },
        vitals: VitalsSnapshot {
            height_cm: row.try_get("height_cm")?,
            weight_kg: row.try_get("weight_kg")?,
            bmi: row.try_get("bmi")?,
            bp_systolic: row.try_get("bp_systolic")?,
            bp_diastolic: row.try_get("bp_diastolic")?,
        },
        clinical: ClinicalNotes {
            symptoms: row.try_get("symptoms")?,
            medicines: row.try_get("medicines")?,
            tests: row.try_get("tests")?,
        },
        outcomes,
    })
}

fn insert_prediction_sql() -> String {
    let outcome_columns = outcome_fields("");
    let fixed = [
        "serial",
        "patient_id",
        "phone",
        "model_name",
        "model_version",
        "disease_ids",
        "disease_names",
    ];
    let columns: Vec<&str> = fixed
        .iter()
        .copied()
        .chain(outcome_columns.iter().map(String::as_str))
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO disease_prediction ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    )
}

#[async_trait]
impl ClinicalStore for PostgresStorage {
    async fn disease_catalog(&self) -> StorageResult<Vec<(Disease, i32)>> {
        let rows: Vec<(i32, String)> = query_as("SELECT id, key FROM diseases ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(|e| query_error("Failed to load disease catalog", e))?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, key)| match key.parse::<Disease>() {
                Ok(disease) => Some((disease, id)),
                Err(_) => {
                    warn!(id, key = %key, "ignoring unknown disease in catalog");
                    None
                }
            })
            .collect())
    }

    #[instrument(skip(self, visit), fields(serial = %visit.serial))]
    async fn ingest_visit(&self, visit: VisitIngest) -> StorageResult<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin transaction", e))?;

        let exists: bool =
            query_scalar("SELECT EXISTS (SELECT 1 FROM prescriptions WHERE serial = $1)")
                .bind(&visit.serial)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| query_error("Failed to check prescription serial", e))?;
        if exists {
            return Err(StorageError::conflict(DUPLICATE_SERIAL));
        }

        let patient = &visit.patient;
        query(
            r#"INSERT INTO patient_details (patient_id, name, phone, age, gender, updated_at)
               VALUES ($1, $2, $3, $4, $5, NOW())
               ON CONFLICT (patient_id) DO UPDATE SET
                   name = EXCLUDED.name,
                   phone = EXCLUDED.phone,
                   age = EXCLUDED.age,
                   gender = EXCLUDED.gender,
                   updated_at = NOW()"#,
        )
        .bind(&patient.patient_id)
        .bind(&patient.name)
        .bind(&patient.phone)
        .bind(patient.age)
        .bind(patient.gender)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to upsert patient details", e))?;

        let clinical = &visit.clinical;
        query(
            r#"INSERT INTO prescriptions (serial, patient_id, clean_text, symptoms, medicines, tests)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&visit.serial)
        .bind(&patient.patient_id)
        .bind(&visit.clean_text)
        .bind(&clinical.symptoms)
        .bind(&clinical.medicines)
        .bind(&clinical.tests)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::conflict(DUPLICATE_SERIAL)
            } else {
                query_error("Failed to insert prescription", e)
            }
        })?;

        let vitals = &visit.vitals;
        query(
            r#"INSERT INTO patient_health_records
                   (serial, patient_id, phone, clean_text, symptoms, medicines, tests,
                    height_cm, weight_kg, bmi, bp_systolic, bp_diastolic)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
        )
        .bind(&visit.serial)
        .bind(&patient.patient_id)
        .bind(&patient.phone)
        .bind(&visit.clean_text)
        .bind(&clinical.symptoms)
        .bind(&clinical.medicines)
        .bind(&clinical.tests)
        .bind(vitals.height_cm)
        .bind(vitals.weight_kg)
        .bind(vitals.bmi)
        .bind(vitals.bp_systolic)
        .bind(vitals.bp_diastolic)
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to insert health record", e))?;

        let prediction = &visit.prediction;
        let sql = insert_prediction_sql();
        let mut insert = query(&sql)
            .bind(&visit.serial)
            .bind(&patient.patient_id)
            .bind(&patient.phone)
            .bind(&prediction.model_name)
            .bind(&prediction.model_version)
            .bind(&prediction.disease_ids)
            .bind(&prediction.disease_names);
        for disease in Disease::ALL {
            let outcome = prediction.outcomes.get(&disease);
            insert = insert
                .bind(outcome.map(|o| o.result))
                .bind(outcome.map(|o| o.confidence))
                .bind(outcome.map(|o| o.risk))
                .bind(outcome.map(|o| o.features_json.as_str()));
        }
        insert
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to insert prediction", e))?;

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit visit", e))?;

        debug!(outcomes = prediction.outcomes.len(), "visit stored");
        Ok(())
    }

    async fn count_visits(&self, visit_query: &VisitQuery) -> StorageResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) {FROM_VISITS} {}",
            where_clause(&visit_query.selector)
        );
        let row = bind_filters(query(&sql), visit_query)
            .fetch_one(self.pool())
            .await
            .map_err(|e| query_error("Failed to count visits", e))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| query_error("Failed to read visit count", e))?;
        Ok(count.max(0) as u64)
    }

    async fn list_visits(&self, visit_query: &VisitQuery) -> StorageResult<Vec<VisitRow>> {
        let sql = format!(
            "{} {} {} LIMIT $4 OFFSET $5",
            select_visits(),
            where_clause(&visit_query.selector),
            order_clause(visit_query)
        );
        let offset = i64::try_from(visit_query.offset()).unwrap_or(i64::MAX);
        let rows = bind_filters(query(&sql), visit_query)
            .bind(i64::from(visit_query.limit))
            .bind(offset)
            .fetch_all(self.pool())
            .await
            .map_err(|e| query_error("Failed to list visits", e))?;
        rows.iter()
            .map(visit_from_row)
            .collect::<Result<_, _>>()
            .map_err(|e| query_error("Failed to decode visit", e))
    }

    async fn visit_detail(&self, account_id: i64, serial: &str) -> StorageResult<Option<VisitRow>> {
        let sql = format!(
            "{} WHERE {ACCOUNT_FILTER} AND pr.serial = $2",
            select_visits()
        );
        let row = query(&sql)
            .bind(account_id)
            .bind(serial)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| query_error("Failed to load visit", e))?;
        row.as_ref()
            .map(visit_from_row)
            .transpose()
            .map_err(|e| query_error("Failed to decode visit", e))
    }

    async fn visit_cursor(
        &self,
        account_id: i64,
        cursor: Option<OffsetDateTime>,
        limit: u32,
    ) -> StorageResult<Vec<CursorEntry>> {
        let sql = format!(
            r#"SELECT pr.serial, pr.created_at FROM prescriptions pr
               WHERE {ACCOUNT_FILTER}
                 AND ($2::timestamptz IS NULL OR pr.created_at < $2)
               ORDER BY pr.created_at DESC
               LIMIT $3"#
        );
        let rows: Vec<(String, OffsetDateTime)> = query_as(&sql)
            .bind(account_id)
            .bind(cursor)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .map_err(|e| query_error("Failed to page visits", e))?;
        Ok(rows
            .into_iter()
            .map(|(serial, created_at)| CursorEntry { serial, created_at })
            .collect())
    }

    async fn history_summary(&self, account_id: i64) -> StorageResult<HistorySummary> {
        let positive = |d: Disease| {
            format!(
                "COUNT(*) FILTER (WHERE dp.{}_result = 1)",
                d.storage_key()
            )
        };
        let sql = format!(
            r#"SELECT COUNT(*), {}, {}, {}, {}
               FROM prescriptions pr
               LEFT JOIN disease_prediction dp ON dp.serial = pr.serial
               WHERE {ACCOUNT_FILTER}"#,
            positive(Disease::Obesity),
            positive(Disease::Diabetes),
            positive(Disease::Liver),
            positive(Disease::Cardiovascular),
        );
        let (total, obesity, diabetes, liver, hypertension): (i64, i64, i64, i64, i64) =
            query_as(&sql)
                .bind(account_id)
                .fetch_one(self.pool())
                .await
                .map_err(|e| query_error("Failed to summarize history", e))?;
        let count = |n: i64| n.max(0) as u64;
        Ok(HistorySummary {
            total_visits: count(total),
            obesity_positive: count(obesity),
            diabetes_positive: count(diabetes),
            liver_positive: count(liver),
            hypertension_positive: count(hypertension),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_insert_binds_every_column() {
        let sql = insert_prediction_sql();
        assert!(sql.contains("hypertension_features_json"));
        assert!(!sql.contains("cardiovascular"));
        assert!(sql.ends_with("$23)"));
    }

    #[test]
    fn risk_sort_uses_greatest_of_coalesced_risks() {
        let mut visit_query = VisitQuery::new(VisitSelector::ByAccount(1), 1, 10);
        visit_query.sort = SortField::Risk;
        visit_query.order = SortOrder::Asc;
        let order = order_clause(&visit_query);
        assert!(order.starts_with("ORDER BY GREATEST(COALESCE(dp.obesity_risk, 0)"));
        assert!(order.ends_with("ASC, pr.created_at DESC"));
    }

    #[test]
    fn doctor_lookup_matches_patient_id_or_phone() {
        let clause = where_clause(&VisitSelector::ByPatientIdOrPhone("0171".into()));
        assert!(clause.contains("pd.patient_id = $1 OR pd.phone = $1"));
        assert!(clause.contains("pr.created_at <= $3"));
    }
}
