use async_trait::async_trait;
use v4l::video::Capture;
use v4l::Device;
use crate::application::ports::CameraCatalogPort;
use crate::domain::camera::*;
use crate::domain::errors::{DomainError, DomainResult};

pub struct V4l2CameraCatalog;
impl V4l2CameraCatalog { pub fn new() -> Self { Self } }

#[async_trait]
impl CameraCatalogPort for V4l2CameraCatalog {
    /// Dispositivos V4L2 con capacidad de captura de vídeo, ordenados por ruta.
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        tokio::task::spawn_blocking(|| {
            let mut out = Vec::new();
            for node in v4l::context::enum_devices() {
                let path = node.path().to_string_lossy().to_string();
                let Ok(dev) = Device::with_path(&path) else { continue };
                let Ok(caps) = dev.query_caps() else { continue };
                if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                    continue;
                }
                out.push(CameraInfo {
                    id: CameraId { path },
                    name: node.name().unwrap_or_else(|| "Unknown".to_string()),
                    driver: caps.driver,
                    card: caps.card,
                    bus: caps.bus,
                });
            }
            out.sort_by(|a, b| a.id.path.cmp(&b.id.path));
            out
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("enumeración de cámaras abortada: {e}")))
    }
}
