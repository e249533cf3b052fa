//! Recommendation synthesizer: turns a classifier verdict plus the latest
//! sensor snapshot into a human-readable care recommendation. Pure given
//! its inputs; performs no I/O.

use crate::control::ranges::Ranges;
use crate::control::SensorSample;
use crate::db::models::RecKind;

use super::classifier::{Analysis, CLASS_DEFICIENCY, CLASS_DISEASE, CLASS_HEALTHY, CLASS_PEST};

/// EC deficits (µS/cm below minimum) separating the deficiency tiers.
const EC_DEFICIT_CRITICAL: f64 = 300.0;
const EC_DEFICIT_MODERATE: f64 = 150.0;

/// Produces `(kind, text)` for a valid classification. Out-of-distribution
/// results get no recommendation.
pub fn synthesize(
    analysis: &Analysis,
    sample: &SensorSample,
    ranges: &Ranges,
) -> Option<(RecKind, String)> {
    match analysis.class_id {
        CLASS_DEFICIENCY => Some((RecKind::Deficiency, deficiency_text(sample, ranges))),
        CLASS_DISEASE => Some((RecKind::Disease, disease_text(sample))),
        CLASS_HEALTHY => Some((RecKind::Healthy, healthy_text(sample))),
        CLASS_PEST => Some((RecKind::Pest, pest_text())),
        _ => None,
    }
}

fn deficiency_text(sample: &SensorSample, ranges: &Ranges) -> String {
    let ec = sample.ec;

    if ec < ranges.ec.min {
        let deficit = ranges.ec.min - ec;
        if deficit > EC_DEFICIT_CRITICAL {
            format!(
                "CRITICAL nutrient deficiency: EC is {ec:.0} µS/cm, {deficit:.0} below minimum. \
                 Add 2-3 doses of nutrient solution and re-test within the hour."
            )
        } else if deficit > EC_DEFICIT_MODERATE {
            format!(
                "Moderate nutrient deficiency: EC is {ec:.0} µS/cm. \
                 Add 1-2 doses of nutrient solution."
            )
        } else {
            format!(
                "Mild nutrient deficiency: EC is {ec:.0} µS/cm, slightly below minimum. \
                 Apply a light nutrient supplement."
            )
        }
    } else if ec > ranges.ec.max {
        format!(
            "Possible specific nutrient deficiency despite adequate EC ({ec:.0} µS/cm). \
             Check Fe/Ca/Mg levels and consider a foliar spray."
        )
    } else if !ranges.ph.contains(sample.ph) {
        format!(
            "Nutrient lockout suspected due to pH imbalance (pH {:.1}). \
             Correct pH before dosing more nutrients.",
            sample.ph
        )
    } else {
        "Visual deficiency detected but sensors are normal. \
         Monitor for 24h, then flush and remix the reservoir if symptoms persist."
            .to_string()
    }
}

fn disease_text(sample: &SensorSample) -> String {
    format!(
        "Disease detected. IMMEDIATE ACTIONS: \
         1) Isolate the affected plants. \
         2) Remove visibly infected leaves with sterilized shears. \
         3) Reduce humidity and improve airflow around the canopy. \
         4) Apply a copper-based or biological fungicide. \
         5) Re-inspect in 24h and discard plants that keep declining. \
         Current conditions: Temp {:.1}°C, pH {:.1}.",
        sample.temperature, sample.ph
    )
}

fn healthy_text(sample: &SensorSample) -> String {
    format!(
        "Plant looks healthy. Maintain the current regimen \
         (Temp {:.1}°C, pH {:.1}, EC {:.0} µS/cm).",
        sample.temperature, sample.ph, sample.ec
    )
}

fn pest_text() -> String {
    "Pest damage detected. IMMEDIATE ACTIONS: \
     1) Inspect leaf undersides and stems for insects. \
     2) Remove heavily infested leaves. \
     3) Apply insecticidal soap or neem oil. \
     4) Introduce beneficial insects if available. \
     5) Quarantine new plants before adding them to the unit."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::{CLASS_NAMES, CLASS_UNKNOWN};
    use chrono::Utc;

    fn analysis_for(class_id: i32) -> Analysis {
        let name = if class_id >= 0 {
            CLASS_NAMES[class_id as usize].to_string()
        } else {
            "Unknown (Not a Plant)".to_string()
        };
        Analysis {
            class_id,
            class_name: name,
            confidence: 0.8,
            probs: vec![0.05, 0.05, 0.8, 0.1],
            entropy: 0.9,
            green_ratio: 0.5,
            valid_plant: class_id >= 0,
        }
    }

    fn sample(temperature: f64, ph: f64, ec: f64) -> SensorSample {
        SensorSample {
            temperature,
            ph,
            ec,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn deficiency_tiers_by_ec_deficit() {
        let ranges = Ranges::default(); // ec min 560

        let (kind, text) =
            synthesize(&analysis_for(0), &sample(21.0, 6.0, 200.0), &ranges).unwrap();
        assert_eq!(kind, RecKind::Deficiency);
        assert!(text.starts_with("CRITICAL"));
        assert!(text.contains("2-3 doses"));

        let (_, text) = synthesize(&analysis_for(0), &sample(21.0, 6.0, 350.0), &ranges).unwrap();
        assert!(text.starts_with("Moderate"));
        assert!(text.contains("1-2 doses"));

        let (_, text) = synthesize(&analysis_for(0), &sample(21.0, 6.0, 500.0), &ranges).unwrap();
        assert!(text.starts_with("Mild"));
        assert!(text.contains("light nutrient supplement"));
    }

    #[test]
    fn deficiency_with_high_ec_suspects_micronutrients() {
        let ranges = Ranges::default();
        let (_, text) = synthesize(&analysis_for(0), &sample(21.0, 6.0, 900.0), &ranges).unwrap();
        assert!(text.contains("Fe/Ca/Mg"));
        assert!(text.contains("foliar"));
    }

    #[test]
    fn deficiency_with_ph_imbalance_suspects_lockout() {
        let ranges = Ranges::default();
        let (_, text) = synthesize(&analysis_for(0), &sample(21.0, 7.2, 700.0), &ranges).unwrap();
        assert!(text.contains("lockout"));
        assert!(text.contains("7.2"));
    }

    #[test]
    fn deficiency_with_normal_sensors_waits() {
        let ranges = Ranges::default();
        let (_, text) = synthesize(&analysis_for(0), &sample(21.0, 6.0, 700.0), &ranges).unwrap();
        assert!(text.contains("Monitor for 24h"));
    }

    #[test]
    fn disease_checklist_with_conditions() {
        let ranges = Ranges::default();
        let (kind, text) =
            synthesize(&analysis_for(1), &sample(22.5, 6.1, 700.0), &ranges).unwrap();
        assert_eq!(kind, RecKind::Disease);
        assert!(text.starts_with("Disease detected. IMMEDIATE ACTIONS:"));
        assert!(text.contains("5)"));
        assert!(text.contains("22.5"));
        assert!(text.contains("6.1"));
    }

    #[test]
    fn healthy_one_liner_reports_all_three_parameters() {
        let ranges = Ranges::default();
        let (kind, text) =
            synthesize(&analysis_for(2), &sample(21.0, 6.0, 700.0), &ranges).unwrap();
        assert_eq!(kind, RecKind::Healthy);
        assert!(text.contains("21.0"));
        assert!(text.contains("6.0"));
        assert!(text.contains("700"));
    }

    #[test]
    fn pest_checklist() {
        let ranges = Ranges::default();
        let (kind, text) =
            synthesize(&analysis_for(3), &sample(21.0, 6.0, 700.0), &ranges).unwrap();
        assert_eq!(kind, RecKind::Pest);
        assert!(text.starts_with("Pest damage detected."));
        assert!(text.contains("neem"));
    }

    #[test]
    fn ood_gets_no_recommendation() {
        let ranges = Ranges::default();
        assert!(synthesize(
            &analysis_for(CLASS_UNKNOWN),
            &sample(21.0, 6.0, 700.0),
            &ranges
        )
        .is_none());
    }
}
