use crate::vitals::Vitals;
use medai_core::Disease;

fn points(value: f64, bands: [(f64, u32); 3]) -> u32 {
    bands
        .iter()
        .find(|(min, _)| value >= *min)
        .map_or(0, |(_, pts)| *pts)
}

/// Rule-based future risk score in `0..=100`.
///
/// Age, BMI, glucose and diastolic pressure each add up to 25 points.
/// A positive prediction raises the score to at least the disease's
/// baseline. Missing measurements count as zero.
pub fn future_risk(vitals: &Vitals, disease: Disease, prediction: i64) -> u32 {
    let v = |name| vitals.feature(name).unwrap_or(0.0);

    let mut risk = points(v("age"), [(60.0, 25), (45.0, 18), (30.0, 10)])
        + points(v("bmi"), [(35.0, 25), (30.0, 18), (25.0, 10)])
        + points(v("glucose"), [(140.0, 25), (126.0, 18), (100.0, 10)])
        + points(v("ap_lo"), [(100.0, 25), (90.0, 18), (85.0, 10)]);

    if prediction == 1 {
        risk = risk.max(disease.baseline_risk());
    }
    risk.min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record_scores_zero() {
        assert_eq!(future_risk(&Vitals::default(), Disease::Obesity, 0), 0);
    }

    #[test]
    fn bands_accumulate() {
        let vitals = Vitals {
            age: Some(47),
            bmi: Some(31.2),
            glucose: Some(99),
            ap_lo: Some(100),
            ..Vitals::default()
        };
        assert_eq!(future_risk(&vitals, Disease::Liver, 0), 18 + 18 + 25);
    }

    #[test]
    fn positive_prediction_lifts_to_baseline() {
        let vitals = Vitals {
            age: Some(31),
            ..Vitals::default()
        };
        assert_eq!(future_risk(&vitals, Disease::Diabetes, 1), 40);
        assert_eq!(future_risk(&vitals, Disease::Cardiovascular, 1), 35);
        assert_eq!(future_risk(&vitals, Disease::Diabetes, 0), 10);
    }

    #[test]
    fn every_band_maxed_scores_one_hundred() {
        let vitals = Vitals {
            age: Some(70),
            bmi: Some(40.0),
            glucose: Some(200),
            ap_lo: Some(110),
            ..Vitals::default()
        };
        assert_eq!(future_risk(&vitals, Disease::Obesity, 1), 100);
    }
}
