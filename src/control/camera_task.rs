//! Camera + inference task.
//!
//! On each activation: capture a frame, classify it, and emit the image,
//! prediction, logs, recommendation, and alert messages. A failed capture
//! skips the cycle without stopping later ones; an out-of-distribution
//! frame is recorded but produces no recommendation and clears the alert
//! LED.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::camera::{Capture, CameraDevice};
use crate::db::models::{AlertKind, LogCategory};
use crate::ml::classifier::{
    Analysis, Classifier, CLASS_DEFICIENCY, CLASS_DISEASE, CLASS_HEALTHY, CLASS_PEST, CLASS_NAMES,
};
use crate::ml::recommend;
use crate::wire::WireMessage;

use super::{SensorSample, Shared};

/// Secondary classes at or above this probability get their own log line.
const SECONDARY_PROB_THRESHOLD: f32 = 0.20;

/// Non-Healthy verdicts at or above this confidence raise a critical alert.
const ALERT_CONFIDENCE_THRESHOLD: f32 = 0.70;

pub(crate) async fn run(
    shared: Arc<Shared>,
    mut camera: Box<dyn CameraDevice>,
    classifier: Arc<Classifier>,
) {
    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            _ = shared.camera_wake.notified() => {}
        }

        if let Err(err) = run_cycle(&shared, camera.as_mut(), &classifier).await {
            error!("camera cycle failed: {err:#}");
        }
    }
}

async fn run_cycle(
    shared: &Arc<Shared>,
    camera: &mut dyn CameraDevice,
    classifier: &Arc<Classifier>,
) -> Result<()> {
    let Some(capture) = camera.take_photo() else {
        warn!("no frame captured this cycle");
        return Ok(());
    };

    shared.bus.send(&WireMessage::Image {
        filename: capture.filename.clone(),
        path: capture.path.display().to_string(),
    });

    let analysis = {
        let classifier = Arc::clone(classifier);
        let path = capture.path.clone();
        tokio::task::spawn_blocking(move || classifier.analyze_detailed(&path))
            .await
            .context("inference worker join failed")??
    };

    info!(
        "analysis: class={} confidence={:.3} entropy={:.3} green={:.3}",
        analysis.class_name,
        analysis.confidence,
        analysis.entropy,
        analysis.green_ratio
    );

    if !analysis.valid_plant {
        emit_ood(shared, &capture, &analysis);
        return Ok(());
    }

    emit_prediction(shared, &capture, &analysis);
    Ok(())
}

fn emit_ood(shared: &Arc<Shared>, capture: &Capture, analysis: &Analysis) {
    shared.bus.send(&WireMessage::Prediction {
        filename: capture.filename.clone(),
        label: analysis.class_name.clone(),
        confidence: analysis.confidence as f64,
    });
    shared.bus.send(&WireMessage::Log {
        category: LogCategory::MlAnalysis,
        title: "Out-of-Distribution Detected".to_string(),
        detail: format!(
            "Entropy: {:.2}, Confidence: {}, Green ratio: {:.2}",
            analysis.entropy,
            percent(analysis.confidence),
            analysis.green_ratio
        ),
    });
    // Not a plant in frame: nothing to alert about.
    shared.led.set(false);
}

fn emit_prediction(shared: &Arc<Shared>, capture: &Capture, analysis: &Analysis) {
    shared.bus.send(&WireMessage::Prediction {
        filename: capture.filename.clone(),
        label: analysis.class_name.clone(),
        confidence: analysis.confidence as f64,
    });
    shared.bus.send(&WireMessage::Log {
        category: LogCategory::MlAnalysis,
        title: analysis.class_name.clone(),
        detail: format!("Confidence: {}", percent(analysis.confidence)),
    });

    shared.led.set(analysis.class_id != CLASS_HEALTHY);

    let sample = latest_or_nominal(shared);
    let ranges = shared.ranges.snapshot();
    if let Some((kind, text)) = recommend::synthesize(analysis, &sample, &ranges) {
        shared.bus.send(&WireMessage::Recommendation {
            filename: capture.filename.clone(),
            kind,
            text,
            confidence: analysis.confidence as f64,
        });
    }

    for (index, &prob) in analysis.probs.iter().enumerate() {
        if index as i32 == analysis.class_id || prob < SECONDARY_PROB_THRESHOLD {
            continue;
        }
        shared.bus.send(&WireMessage::Log {
            category: LogCategory::MlAnalysis,
            title: format!("Secondary: {}", CLASS_NAMES[index]),
            detail: format!("Confidence: {}", percent(prob)),
        });
    }

    if should_alert(analysis.class_id, analysis.confidence) {
        shared.bus.send(&WireMessage::Alert {
            kind: AlertKind::Critical,
            message: format!(
                "{} detected with {} confidence",
                analysis.class_name,
                percent(analysis.confidence)
            ),
            detail: None,
        });
    }

    match analysis.class_id {
        CLASS_DISEASE => shared.bus.send(&WireMessage::Log {
            category: LogCategory::Disease,
            title: analysis.class_name.clone(),
            detail: format!("Confidence: {}", percent(analysis.confidence)),
        }),
        CLASS_DEFICIENCY => shared.bus.send(&WireMessage::Log {
            category: LogCategory::Deficiency,
            title: analysis.class_name.clone(),
            detail: format!(
                "Confidence: {}, Current EC: {:.0} µS/cm",
                percent(analysis.confidence),
                sample.ec
            ),
        }),
        CLASS_PEST => shared.bus.send(&WireMessage::Log {
            category: LogCategory::Disease,
            title: "Pest Damage".to_string(),
            detail: format!("Confidence: {}", percent(analysis.confidence)),
        }),
        _ => {}
    }
}

/// The camera task may fire before the first sensor pass; fall back to the
/// range midpoints so the synthesizer always has a coherent snapshot.
fn latest_or_nominal(shared: &Arc<Shared>) -> SensorSample {
    if let Some(sample) = *shared.latest_sample.lock().unwrap() {
        return sample;
    }
    let ranges = shared.ranges.snapshot();
    SensorSample {
        temperature: (ranges.temp.min + ranges.temp.max) / 2.0,
        ph: (ranges.ph.min + ranges.ph.max) / 2.0,
        ec: (ranges.ec.min + ranges.ec.max) / 2.0,
        timestamp: chrono::Utc::now(),
    }
}

/// A confident non-Healthy verdict warrants a critical alert. The
/// threshold is inclusive.
fn should_alert(class_id: i32, confidence: f32) -> bool {
    class_id != CLASS_HEALTHY && confidence >= ALERT_CONFIDENCE_THRESHOLD
}

fn percent(p: f32) -> String {
    format!("{:.0}%", p * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_threshold_is_inclusive() {
        assert!(should_alert(CLASS_DISEASE, 0.70));
        assert!(!should_alert(CLASS_DISEASE, 0.699));
        assert!(should_alert(CLASS_PEST, 0.95));
        assert!(!should_alert(CLASS_HEALTHY, 0.99));
    }

    #[test]
    fn percent_rounds_to_whole_numbers() {
        assert_eq!(percent(0.82), "82%");
        assert_eq!(percent(0.9802), "98%");
        assert_eq!(percent(1.0), "100%");
    }
}
