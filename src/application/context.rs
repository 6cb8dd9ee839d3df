use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::{
    alerts::{Alert, AlertGate},
    clock::{Clock, SystemClock},
    detection::{BoundingBox, DetectionFrame},
    errors::DomainResult,
    motion::MotionClassifier,
    smoother::DetectionSmoother,
    stream::TickReport,
};

/// Estado del pipeline de una cámara: suavizado de presencia, clasificación
/// de movimiento y filtrado de alertas. Una instancia por fuente, propiedad
/// del bucle que la conduce.
pub struct MonitoringContext {
    smoother: DetectionSmoother,
    classifier: MotionClassifier,
    gate: AlertGate,
    cooldown: Duration,
    frame_count: u64,
    detector_failures: u64,
}

impl MonitoringContext {
    pub fn new(cooldown: Duration) -> Self {
        Self::with_clock(cooldown, Arc::new(SystemClock))
    }

    pub fn with_clock(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            smoother: DetectionSmoother::new(),
            classifier: MotionClassifier::new(),
            gate: AlertGate::with_clock(clock),
            cooldown,
            frame_count: 0,
            detector_failures: 0,
        }
    }

    /// Ejecuta un tick. Un error del detector cuenta como "no hay nadie".
    pub fn tick(&mut self, frame: Option<&RgbImage>, detection: DomainResult<DetectionFrame>) -> TickReport {
        let (detection, detector_failed) = match detection {
            Ok(d) => (d, false),
            Err(e) => {
                self.detector_failures += 1;
                warn!("Detector falló en el frame {}: {}", self.frame_count, e);
                (DetectionFrame::empty(), true)
            }
        };

        self.smoother.record(detection.presence);

        let boxes: &[BoundingBox] = if detection.presence { &detection.boxes } else { &[] };
        let reading = self.classifier.classify(frame, boxes);

        let alert = if self.gate.should_alert(reading.activity, reading.motion_level, self.cooldown) {
            let alert = self.gate.add_alert(reading.activity, reading.motion_level, reading.confidence);
            info!(
                "🚨 Alerta: {} (movimiento {:.1}%, confianza {})",
                alert.activity,
                alert.motion_level * 100.0,
                alert.confidence
            );
            Some(alert)
        } else {
            None
        };

        let report = TickReport {
            frame_index: self.frame_count,
            humans: boxes.len(),
            presence_confidence: self.smoother.confidence(),
            detector_confidence: detection.confidence,
            detector_failed,
            reading,
            alert,
        };
        self.frame_count += 1;
        report
    }

    pub fn recent_alerts(&self, n: usize) -> Vec<Alert> {
        self.gate.recent(n)
    }

    pub fn alert_count(&self) -> usize {
        self.gate.len()
    }

    pub fn presence_confidence(&self) -> f32 {
        self.smoother.confidence()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn detector_failures(&self) -> u64 {
        self.detector_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ActivityLevel;
    use crate::domain::alerts::AlertSeverity;
    use crate::domain::clock::ManualClock;
    use crate::domain::errors::DomainError;
    use image::Rgb;

    fn calm() -> RgbImage {
        RgbImage::from_pixel(100, 100, Rgb([80, 80, 80]))
    }

    /// Un bloque claro de 40x40: el 16% del frame.
    fn sprinting() -> RgbImage {
        let mut f = calm();
        for y in 30..70 {
            for x in 30..70 {
                f.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        f
    }

    fn seen(boxes: Vec<BoundingBox>) -> DomainResult<DetectionFrame> {
        Ok(DetectionFrame { presence: !boxes.is_empty(), confidence: 0.9, boxes })
    }

    fn person() -> Vec<BoundingBox> {
        vec![BoundingBox::new(20, 20, 60, 60)]
    }

    fn context(cooldown_secs: u64) -> (MonitoringContext, ManualClock) {
        let clock = ManualClock::new();
        let ctx = MonitoringContext::with_clock(Duration::from_secs(cooldown_secs), Arc::new(clock.clone()));
        (ctx, clock)
    }

    #[test]
    fn detector_failure_degrades_to_no_detection() {
        let (mut ctx, _) = context(60);
        let report = ctx.tick(Some(&calm()), Err(DomainError::DetectionFailed("session lost".into())));

        assert!(report.detector_failed);
        assert_eq!(report.humans, 0);
        assert_eq!(report.reading.activity, ActivityLevel::NoHumans);
        assert_eq!(ctx.detector_failures(), 1);
        assert_eq!(ctx.presence_confidence(), 0.0);
        assert_eq!(ctx.frame_count(), 1);
    }

    #[test]
    fn first_frame_has_no_background_yet() {
        let (mut ctx, _) = context(60);
        let boot = ctx.tick(Some(&calm()), seen(person()));
        // toda la caja cuenta como movimiento hasta que el modelo tiene referencia
        assert_eq!(boot.reading.activity, ActivityLevel::Running);
        let settled = ctx.tick(Some(&calm()), seen(person()));
        assert_eq!(settled.reading.activity, ActivityLevel::Standing);
    }

    #[test]
    fn running_person_raises_one_alert_per_cooldown() {
        let (mut ctx, clock) = context(60);
        for _ in 0..50 {
            ctx.tick(Some(&calm()), seen(person()));
        }
        clock.advance(Duration::from_secs(61));
        assert_eq!(ctx.alert_count(), 1);

        let first = ctx.tick(Some(&sprinting()), seen(person()));
        assert_eq!(first.reading.activity, ActivityLevel::Running);
        let alert = first.alert.expect("first sprint must alert");
        assert_eq!(alert.severity, AlertSeverity::Danger);

        clock.advance(Duration::from_secs(1));
        ctx.tick(Some(&calm()), seen(person()));
        clock.advance(Duration::from_secs(1));
        let second = ctx.tick(Some(&sprinting()), seen(person()));
        assert_eq!(second.reading.activity, ActivityLevel::Running);
        assert!(second.alert.is_none());

        clock.advance(Duration::from_secs(61));
        ctx.tick(Some(&calm()), seen(person()));
        let third = ctx.tick(Some(&sprinting()), seen(person()));
        assert!(third.alert.is_some());

        assert_eq!(ctx.alert_count(), 3);
        assert_eq!(ctx.recent_alerts(1)[0].timestamp, third.alert.unwrap().timestamp);
    }

    #[test]
    fn empty_scene_is_no_humans_and_lowers_presence() {
        let (mut ctx, _) = context(60);
        ctx.tick(Some(&calm()), seen(person()));
        let report = ctx.tick(Some(&sprinting()), seen(vec![]));

        assert_eq!(report.reading.activity, ActivityLevel::NoHumans);
        assert!(report.alert.is_none());
        assert!((report.presence_confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn missing_frame_with_people_is_no_humans() {
        let (mut ctx, _) = context(60);
        let report = ctx.tick(None, seen(person()));
        assert_eq!(report.reading.activity, ActivityLevel::NoHumans);
        assert_eq!(report.humans, 1);
        assert_eq!(report.presence_confidence, 1.0);
    }
}
