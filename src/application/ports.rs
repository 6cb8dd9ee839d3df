use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::broadcast;

use crate::domain::{
    alerts::Alert,
    camera::CameraInfo,
    config::{CameraConfig, DetectionConfig, MonitorConfig},
    detection::DetectionFrame,
    errors::DomainResult,
    model::ModelId,
    stream::{FrameMeta, MonitorSnapshot},
};

#[async_trait]
pub trait CameraCatalogPort: Send + Sync {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>>;
}

#[async_trait]
pub trait ModelCatalogPort: Send + Sync {
    async fn validate_model(&self, model: &ModelId) -> DomainResult<()>;
}

/// Productor bloqueante de frames, leído desde un hilo dedicado. Cada
/// implementación acota su propio tiempo de lectura.
pub trait FrameSourcePort: Send {
    fn next_frame(&mut self) -> DomainResult<RgbImage>;
    fn describe(&self) -> String;
}

pub trait FrameSourceFactory: Send + Sync {
    fn open(&self, camera: &CameraConfig) -> DomainResult<Box<dyn FrameSourcePort>>;
}

/// Detector de personas, una vez por frame procesado.
pub trait DetectorPort: Send {
    fn detect(&mut self, frame: &RgbImage) -> DomainResult<DetectionFrame>;
}

pub trait DetectorFactory: Send + Sync {
    fn load(&self, detection: &DetectionConfig) -> DomainResult<Box<dyn DetectorPort>>;
}

/// Canal lateral para las alertas disparadas (sonido). No debe bloquear al llamador.
pub trait AlertNotifierPort: Send + Sync {
    fn notify(&self, alert: &Alert);
}

#[async_trait]
pub trait MonitorPort: Send + Sync {
    async fn start(&self, config: MonitorConfig) -> DomainResult<()>;
    async fn stop(&self) -> DomainResult<()>;
    async fn is_running(&self) -> bool;
    async fn snapshot(&self) -> DomainResult<MonitorSnapshot>;
    async fn subscribe(&self) -> DomainResult<broadcast::Receiver<(FrameMeta, Vec<u8>)>>;
}
