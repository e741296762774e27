//! Regex extraction of clinical measurements from cleaned OCR text.

use medai_core::Gender;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::sync::LazyLock;

/// Fixed-shape measurement record extracted from a prescription.
///
/// Field names double as model feature names, so the serialized keys must not
/// change. Every field is optional; missing measurements serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub age: Option<i64>,
    pub gender: Option<i64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,

    pub age_of_the_patient: Option<i64>,
    pub gender_of_the_patient: Option<i64>,
    pub total_bilirubin: Option<f64>,
    pub direct_bilirubin: Option<f64>,
    pub alkphos_alkaline_phosphotase: Option<f64>,
    pub sgpt_alamine_aminotransferase: Option<f64>,
    pub sgot_aspartate_aminotransferase: Option<f64>,
    pub total_protiens: Option<f64>,
    pub alb_albumin: Option<f64>,
    #[serde(rename = "a/g_ratio_albumin_and_globulin_ratio")]
    pub ag_ratio: Option<f64>,

    pub ap_hi: Option<i64>,
    pub ap_lo: Option<i64>,
    pub cholesterol: Option<i64>,
    pub gluc: Option<i64>,
    pub smoke: Option<i64>,
    pub alco: Option<i64>,
    pub active: Option<i64>,
    /// Integral when derived from blood pressure, as written otherwise.
    pub pulse_pressure: Option<Number>,
    pub map: Option<f64>,

    pub pregnancies: Option<i64>,
    pub glucose: Option<i64>,
    pub skin_thickness: Option<f64>,
    pub insulin: Option<f64>,
    pub dpf: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Vitals {
    /// Looks up a numeric measurement by its feature name.
    pub fn feature(&self, name: &str) -> Option<f64> {
        let int = |v: Option<i64>| v.map(|v| v as f64);
        match name {
            "age" => int(self.age),
            "gender" => int(self.gender),
            "height_cm" => self.height_cm,
            "weight_kg" => self.weight_kg,
            "bmi" => self.bmi,
            "age_of_the_patient" => int(self.age_of_the_patient),
            "gender_of_the_patient" => int(self.gender_of_the_patient),
            "total_bilirubin" => self.total_bilirubin,
            "direct_bilirubin" => self.direct_bilirubin,
            "alkphos_alkaline_phosphotase" => self.alkphos_alkaline_phosphotase,
            "sgpt_alamine_aminotransferase" => self.sgpt_alamine_aminotransferase,
            "sgot_aspartate_aminotransferase" => self.sgot_aspartate_aminotransferase,
            "total_protiens" => self.total_protiens,
            "alb_albumin" => self.alb_albumin,
            "a/g_ratio_albumin_and_globulin_ratio" => self.ag_ratio,
            "ap_hi" => int(self.ap_hi),
            "ap_lo" => int(self.ap_lo),
            "cholesterol" => int(self.cholesterol),
            "gluc" => int(self.gluc),
            "smoke" => int(self.smoke),
            "alco" => int(self.alco),
            "active" => int(self.active),
            "pulse_pressure" => self.pulse_pressure.as_ref().and_then(Number::as_f64),
            "map" => self.map,
            "pregnancies" => int(self.pregnancies),
            "glucose" => int(self.glucose),
            "skin_thickness" => self.skin_thickness,
            "insulin" => self.insulin,
            "dpf" => self.dpf,
            _ => None,
        }
    }

    /// Feature value as JSON, keeping integer measurements integral.
    pub fn feature_json(&self, name: &str) -> serde_json::Value {
        let int = |v: Option<i64>| v.map_or(serde_json::Value::Null, serde_json::Value::from);
        match name {
            "age" => int(self.age),
            "gender" => int(self.gender),
            "age_of_the_patient" => int(self.age_of_the_patient),
            "gender_of_the_patient" => int(self.gender_of_the_patient),
            "ap_hi" => int(self.ap_hi),
            "ap_lo" => int(self.ap_lo),
            "cholesterol" => int(self.cholesterol),
            "gluc" => int(self.gluc),
            "smoke" => int(self.smoke),
            "alco" => int(self.alco),
            "active" => int(self.active),
            "pregnancies" => int(self.pregnancies),
            "glucose" => int(self.glucose),
            "pulse_pressure" => self
                .pulse_pressure
                .clone()
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            other => self
                .feature(other)
                .map_or(serde_json::Value::Null, serde_json::Value::from),
        }
    }
}

struct LabelPatterns {
    age: Regex,
    height: Regex,
    weight: Regex,
    total_bilirubin: Regex,
    direct_bilirubin: Regex,
    alkphos: Regex,
    sgpt: Regex,
    sgot: Regex,
    total_protein: Regex,
    albumin: Regex,
    ag_ratio: Regex,
    cholesterol: Regex,
    glucose: Regex,
    smoke: Regex,
    alcohol: Regex,
    active: Regex,
    pulse_pressure: Regex,
    map: Regex,
    pregnancies: Regex,
    skin_thickness: Regex,
    insulin: Regex,
    dpf: Regex,
    bp: Regex,
    ap_high_low: Regex,
    gender: Regex,
}

fn decimal(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){label}[:\- ]*(\d+\.?\d*)")).expect("Invalid vitals regex")
}

fn integer(label: &str) -> Regex {
    Regex::new(&format!(r"(?i){label}[:\- ]*(\d+)")).expect("Invalid vitals regex")
}

impl LabelPatterns {
    fn compile() -> Self {
        Self {
            age: integer("Age"),
            height: decimal("Height"),
            weight: decimal("Weight"),
            total_bilirubin: decimal("Total Bilirubin"),
            direct_bilirubin: decimal("Direct Bilirubin"),
            alkphos: decimal("(?:ALP|Alkaline Phosphatase)"),
            sgpt: decimal(r"SGPT(?:\s*\(ALT\))?"),
            sgot: decimal(r"SGOT(?:\s*\(AST\))?"),
            total_protein: decimal("(?:Total Protein|Total Proteins)"),
            albumin: decimal("(?:Albumin|ALB)"),
            ag_ratio: decimal("(?:A/G Ratio|Albumin/Globulin Ratio)"),
            cholesterol: integer("Cholesterol"),
            glucose: integer("Glucose"),
            smoke: integer("(?:Smoking|Smoke)"),
            alcohol: integer("Alcohol"),
            active: integer("(?:Physical Activity|Active)"),
            pulse_pressure: decimal("Pulse Pressure"),
            map: decimal("MAP"),
            pregnancies: integer("Pregnancies"),
            skin_thickness: decimal("(?:Skin Thickness|SkinFold)"),
            insulin: decimal("Insulin"),
            dpf: decimal("(?:DPF|Diabetes Pedigree Function)"),
            // Only the uppercase "BP" label counts.
            bp: Regex::new(r"BP[:\- ]*(\d{2,3})\s*/\s*(\d{2,3})").expect("Invalid BP regex"),
            ap_high_low: Regex::new(r"(?i)AP High[:\- ]*(\d{2,3}).*?AP Low[:\- ]*(\d{2,3})")
                .expect("Invalid AP regex"),
            gender: Regex::new(r"(?i)\b(Male|Female)\b").expect("Invalid gender regex"),
        }
    }
}

static PATTERNS: LazyLock<LabelPatterns> = LazyLock::new(LabelPatterns::compile);

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn capture_i64(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn blood_pressure(text: &str) -> Option<(i64, i64)> {
    let p = &*PATTERNS;
    let caps = p
        .bp
        .captures(text)
        .or_else(|| p.ap_high_low.captures(text))?;
    let hi = caps.get(1)?.as_str().parse().ok()?;
    let lo = caps.get(2)?.as_str().parse().ok()?;
    Some((hi, lo))
}

/// Parses cleaned prescription text into a [`Vitals`] record.
pub fn extract_vitals(text: &str) -> Vitals {
    let p = &*PATTERNS;

    let age = capture_i64(&p.age, text);
    let mut vitals = Vitals {
        age,
        height_cm: capture_f64(&p.height, text),
        weight_kg: capture_f64(&p.weight, text),
        age_of_the_patient: age,
        total_bilirubin: capture_f64(&p.total_bilirubin, text),
        direct_bilirubin: capture_f64(&p.direct_bilirubin, text),
        alkphos_alkaline_phosphotase: capture_f64(&p.alkphos, text),
        sgpt_alamine_aminotransferase: capture_f64(&p.sgpt, text),
        sgot_aspartate_aminotransferase: capture_f64(&p.sgot, text),
        total_protiens: capture_f64(&p.total_protein, text),
        alb_albumin: capture_f64(&p.albumin, text),
        ag_ratio: capture_f64(&p.ag_ratio, text),
        cholesterol: capture_i64(&p.cholesterol, text),
        gluc: capture_i64(&p.glucose, text),
        smoke: capture_i64(&p.smoke, text),
        alco: capture_i64(&p.alcohol, text),
        active: capture_i64(&p.active, text),
        pulse_pressure: capture_f64(&p.pulse_pressure, text).and_then(Number::from_f64),
        map: capture_f64(&p.map, text),
        pregnancies: capture_i64(&p.pregnancies, text),
        skin_thickness: capture_f64(&p.skin_thickness, text),
        insulin: capture_f64(&p.insulin, text),
        dpf: capture_f64(&p.dpf, text),
        ..Vitals::default()
    };

    if let Some((hi, lo)) = blood_pressure(text) {
        vitals.ap_hi = Some(hi);
        vitals.ap_lo = Some(lo);

        let derived = hi - lo;
        let pulse_pressure = vitals
            .pulse_pressure
            .get_or_insert_with(|| derived.into())
            .as_f64()
            .unwrap_or(derived as f64);
        if vitals.map.is_none() {
            vitals.map = Some(round2(lo as f64 + pulse_pressure / 3.0));
        }
    }

    vitals.glucose = vitals.gluc;

    if let Some(gender) = p
        .gender
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| Gender::parse(m.as_str()))
    {
        vitals.gender = Some(gender.code());
        vitals.gender_of_the_patient = Some(gender.code());
    }

    if let (Some(h), Some(w)) = (vitals.height_cm, vitals.weight_kg) {
        if h != 0.0 && w != 0.0 {
            let meters = h / 100.0;
            vitals.bmi = Some(round2(w / (meters * meters)));
        }
    }

    if vitals.age.is_none() {
        vitals.age = vitals.age_of_the_patient;
    }

    vitals
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Rx No: 20451 Patient Name: Rahima Begum Age: 52 Female \
        Height: 158 cm Weight: 71.5 kg BP: 150/95 Glucose: 148 Cholesterol: 2 \
        Smoking: 0 Alcohol: 0 Physical Activity: 1 Pregnancies: 3 Insulin: 85 \
        Skin Thickness: 23 DPF: 0.52";

    #[test]
    fn extracts_anthropometrics_and_bmi() {
        let v = extract_vitals(SAMPLE);
        assert_eq!(v.age, Some(52));
        assert_eq!(v.age_of_the_patient, Some(52));
        assert_eq!(v.height_cm, Some(158.0));
        assert_eq!(v.weight_kg, Some(71.5));
        assert_eq!(v.bmi, Some(28.64));
        assert_eq!(v.gender, Some(1));
        assert_eq!(v.gender_of_the_patient, Some(1));
    }

    #[test]
    fn blood_pressure_derives_pulse_pressure_and_map() {
        let v = extract_vitals(SAMPLE);
        assert_eq!(v.ap_hi, Some(150));
        assert_eq!(v.ap_lo, Some(95));
        assert_eq!(v.pulse_pressure, Some(55.into()));
        assert_eq!(v.map, Some(113.33));

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["pulse_pressure"].to_string(), "55");
        assert_eq!(v.feature("pulse_pressure"), Some(55.0));
        assert_eq!(v.feature_json("pulse_pressure").to_string(), "55");
    }

    #[test]
    fn explicit_pulse_pressure_wins_over_derived() {
        let v = extract_vitals("BP 120/80 Pulse Pressure: 45");
        assert_eq!(v.feature("pulse_pressure"), Some(45.0));
        assert_eq!(v.map, Some(95.0));
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["pulse_pressure"].to_string(), "45.0");
    }

    #[test]
    fn lowercase_bp_is_ignored_but_ap_labels_are_not() {
        let v = extract_vitals("bp 130/85");
        assert_eq!(v.ap_hi, None);

        let v = extract_vitals("ap high: 130 something ap low: 85");
        assert_eq!(v.ap_hi, Some(130));
        assert_eq!(v.ap_lo, Some(85));
    }

    #[test]
    fn glucose_mirrors_gluc() {
        let v = extract_vitals(SAMPLE);
        assert_eq!(v.gluc, Some(148));
        assert_eq!(v.glucose, Some(148));
    }

    #[test]
    fn liver_panel_labels() {
        let v = extract_vitals(
            "Total Bilirubin: 1.4 Direct Bilirubin: 0.3 Alkaline Phosphatase: 210 \
             SGPT (ALT): 45 SGOT (AST): 38 Total Proteins: 6.8 ALB: 3.4 A/G Ratio: 1.1",
        );
        assert_eq!(v.total_bilirubin, Some(1.4));
        assert_eq!(v.direct_bilirubin, Some(0.3));
        assert_eq!(v.alkphos_alkaline_phosphotase, Some(210.0));
        assert_eq!(v.sgpt_alamine_aminotransferase, Some(45.0));
        assert_eq!(v.sgot_aspartate_aminotransferase, Some(38.0));
        assert_eq!(v.total_protiens, Some(6.8));
        assert_eq!(v.alb_albumin, Some(3.4));
        assert_eq!(v.ag_ratio, Some(1.1));
    }

    #[test]
    fn zero_height_skips_bmi() {
        let v = extract_vitals("Height: 0 Weight: 70");
        assert_eq!(v.bmi, None);
    }

    #[test]
    fn male_is_not_matched_inside_female() {
        assert_eq!(extract_vitals("Sex: Female").gender, Some(1));
        assert_eq!(extract_vitals("Sex: MALE").gender, Some(0));
        assert_eq!(extract_vitals("no sex given").gender, None);
    }

    #[test]
    fn serialized_keys_match_feature_names() {
        let json = serde_json::to_value(extract_vitals(SAMPLE)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("a/g_ratio_albumin_and_globulin_ratio"));
        assert!(obj.get("total_bilirubin").unwrap().is_null());
        assert!(!obj.contains_key("patient_id"));
        assert_eq!(obj.get("age").unwrap(), &serde_json::json!(52));
    }

    #[test]
    fn feature_lookup_covers_every_model_input() {
        let v = Vitals::default();
        for disease in medai_core::Disease::ALL {
            for name in disease.features() {
                // Known names resolve (to None on an empty record) rather than panicking.
                assert_eq!(v.feature(name), None);
            }
        }
        let v = extract_vitals(SAMPLE);
        assert_eq!(v.feature("ap_lo"), Some(95.0));
        assert_eq!(v.feature_json("ap_lo"), serde_json::json!(95));
        assert_eq!(v.feature("unknown"), None);
    }
}
