use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

use super::alerts::ALERT_CAPACITY;
use super::camera::{CameraMode, CameraSource, FrameSize, Rotation};
use super::errors::{DomainError, DomainResult};
use super::model::{InferenceConfig, ModelId, YoloParams};

pub const COOLDOWN_SECS: RangeInclusive<u64> = 10..=300;
pub const CONFIDENCE_THRESHOLD: RangeInclusive<f32> = 0.1..=0.9;
pub const MOTION_SENSITIVITY: RangeInclusive<u8> = 1..=10;
pub const TICK_HZ: RangeInclusive<u32> = 1..=60;

fn check<T: PartialOrd + std::fmt::Display>(field: &str, value: T, range: &RangeInclusive<T>) -> DomainResult<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(DomainError::InvalidInput(format!(
            "{field} = {value} fuera de rango [{}, {}]",
            range.start(),
            range.end()
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8090, static_dir: "static".into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraSource,
    pub fourcc: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub rotation: Rotation,
    /// Espera máxima de cada lectura de frame, webcam o cámara IP.
    #[serde(alias = "ip_camera_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: CameraSource::default(),
            fourcc: "MJPG".into(),
            width: 640,
            height: 480,
            fps: 30,
            rotation: Rotation::Deg0,
            read_timeout_secs: 5,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.width == 0 || self.height == 0 || self.fps == 0 {
            return Err(DomainError::InvalidInput("camera width/height/fps deben ser > 0".into()));
        }
        if self.fourcc.len() != 4 {
            return Err(DomainError::InvalidInput("FourCC debe tener 4 caracteres".into()));
        }
        check("camera.read_timeout_secs", self.read_timeout_secs, &(1..=60))?;
        if let CameraSource::IpCamera { url } = &self.source {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(DomainError::InvalidInput(format!("URL de cámara IP inválida: {url}")));
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> CameraMode {
        CameraMode {
            format: self.fourcc.clone(),
            size: FrameSize { width: self.width, height: self.height },
            fps: self.fps,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub model_path: String,
    pub input_size: u32,
    /// Puntuación YOLO mínima de una caja de persona.
    pub min_human_confidence: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Control del panel. Se valida y se reporta; la clasificación no lo usa.
    pub confidence_threshold: f32,
    /// Control del panel. Se valida y se reporta; la clasificación no lo usa.
    pub motion_sensitivity: u8,
    /// Cadencia de proceso.
    pub tick_hz: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".into(),
            input_size: 640,
            min_human_confidence: 0.5,
            iou_threshold: 0.45,
            max_detections: 100,
            confidence_threshold: 0.5,
            motion_sensitivity: 5,
            tick_hz: 10,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> DomainResult<()> {
        if self.model_path.trim().is_empty() {
            return Err(DomainError::InvalidInput("detection.model_path vacío".into()));
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            return Err(DomainError::InvalidInput(format!(
                "detection.input_size = {} debe ser múltiplo de 32",
                self.input_size
            )));
        }
        check("detection.min_human_confidence", self.min_human_confidence, &(0.0..=1.0))?;
        check("detection.iou_threshold", self.iou_threshold, &(0.0..=1.0))?;
        if self.max_detections == 0 {
            return Err(DomainError::InvalidInput("detection.max_detections debe ser > 0".into()));
        }
        check("detection.confidence_threshold", self.confidence_threshold, &CONFIDENCE_THRESHOLD)?;
        check("detection.motion_sensitivity", self.motion_sensitivity, &MOTION_SENSITIVITY)?;
        check("detection.tick_hz", self.tick_hz, &TICK_HZ)
    }

    pub fn inference(&self) -> InferenceConfig {
        InferenceConfig {
            model: ModelId { name: "yolo".into(), onnx_path: self.model_path.clone() },
            params: YoloParams {
                input_size: self.input_size,
                conf_threshold: self.min_human_confidence,
                iou_threshold: self.iou_threshold,
                max_detections: self.max_detections,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub cooldown_secs: u64,
    pub sound_enabled: bool,
    pub max_alerts_display: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { cooldown_secs: 60, sound_enabled: true, max_alerts_display: 10 }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> DomainResult<()> {
        check("alerts.cooldown_secs", self.cooldown_secs, &COOLDOWN_SECS)?;
        check("alerts.max_alerts_display", self.max_alerts_display, &(1..=ALERT_CAPACITY))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Todo lo que necesita una sesión de monitoreo; editable desde el panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub alerts: AlertConfig,
}

impl MonitorConfig {
    pub fn validate(&self) -> DomainResult<()> {
        self.camera.validate()?;
        self.detection.validate()?;
        self.alerts.validate()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(flatten)]
    pub monitor: MonitorConfig,
}

impl AppConfig {
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let cfg: AppConfig = serde_json::from_str(raw)
            .map_err(|e| DomainError::InvalidInput(format!("configuración JSON inválida: {e}")))?;
        cfg.monitor.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MonitorConfig::default().validate().unwrap();
        assert_eq!(AlertConfig::default().cooldown(), Duration::from_secs(60));
    }

    #[test]
    fn cooldown_range_is_enforced() {
        let mut alerts = AlertConfig::default();
        alerts.cooldown_secs = 9;
        assert!(alerts.validate().is_err());
        alerts.cooldown_secs = 10;
        assert!(alerts.validate().is_ok());
        alerts.cooldown_secs = 300;
        assert!(alerts.validate().is_ok());
        alerts.cooldown_secs = 301;
        let err = alerts.validate().unwrap_err().to_string();
        assert!(err.contains("alerts.cooldown_secs"), "{err}");
    }

    #[test]
    fn dashboard_controls_are_range_checked() {
        let mut detection = DetectionConfig::default();
        detection.confidence_threshold = 0.95;
        assert!(detection.validate().is_err());

        let mut detection = DetectionConfig::default();
        detection.motion_sensitivity = 0;
        assert!(detection.validate().is_err());

        let mut detection = DetectionConfig::default();
        detection.input_size = 600;
        assert!(detection.validate().is_err());
    }

    #[test]
    fn ip_camera_needs_http_url() {
        let mut camera = CameraConfig::default();
        camera.source = CameraSource::IpCamera { url: "rtsp://cam/stream".into() };
        assert!(camera.validate().is_err());
        camera.source = CameraSource::IpCamera { url: "http://10.191.172.173:8080/video".into() };
        assert!(camera.validate().is_ok());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg = AppConfig::from_json(
            r#"{ "server": { "port": 9000 }, "alerts": { "cooldown_secs": 120 }, "camera": { "rotation": 180 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.static_dir, "static");
        assert_eq!(cfg.monitor.alerts.cooldown_secs, 120);
        assert_eq!(cfg.monitor.camera.rotation, Rotation::Deg180);
        assert_eq!(cfg.monitor.detection.tick_hz, 10);
    }

    #[test]
    fn read_timeout_applies_to_every_source() {
        let cfg = AppConfig::from_json(r#"{ "camera": { "read_timeout_secs": 2 } }"#).unwrap();
        assert_eq!(cfg.monitor.camera.read_timeout(), Duration::from_secs(2));

        let legacy = AppConfig::from_json(r#"{ "camera": { "ip_camera_timeout_secs": 7 } }"#).unwrap();
        assert_eq!(legacy.monitor.camera.read_timeout(), Duration::from_secs(7));

        let mut camera = CameraConfig::default();
        camera.read_timeout_secs = 0;
        assert!(camera.validate().is_err());
    }

    #[test]
    fn invalid_file_is_rejected() {
        assert!(AppConfig::from_json(r#"{ "alerts": { "cooldown_secs": 5 } }"#).is_err());
        assert!(AppConfig::from_json("not json").is_err());
    }
}
