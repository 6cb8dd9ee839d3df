use image::RgbImage;
use tokio::runtime::Handle;
use tracing::info;

use crate::adapters::ipcam::http_camera::IpCameraSource;
use crate::adapters::v4l2::capture::V4l2Capture;
use crate::application::ports::{FrameSourceFactory, FrameSourcePort};
use crate::domain::camera::{CameraId, CameraSource, Rotation};
use crate::domain::config::CameraConfig;
use crate::domain::errors::{DomainError, DomainResult};

/// Abre la fuente indicada por `CameraConfig` (webcam V4L2 o cámara IP)
/// y aplica la rotación configurada a cada frame.
pub struct CameraSourceFactory {
    handle: Handle,
}

impl CameraSourceFactory {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl FrameSourceFactory for CameraSourceFactory {
    fn open(&self, camera: &CameraConfig) -> DomainResult<Box<dyn FrameSourcePort>> {
        let source: Box<dyn FrameSourcePort> = match &camera.source {
            CameraSource::Webcam { index } => {
                let id = CameraId::from_index(*index);
                let capture = V4l2Capture::open(&id, &camera.mode(), camera.read_timeout())
                    .map_err(|e| DomainError::FrameUnavailable(format!("no se pudo abrir {}: {e}", id.path)))?;
                Box::new(capture)
            }
            CameraSource::IpCamera { url } => {
                let ip = IpCameraSource::new(url, camera.read_timeout(), self.handle.clone())
                    .map_err(|e| DomainError::OperationFailed(format!("cliente HTTP: {e}")))?;
                Box::new(ip)
            }
        };

        info!("🎥 Fuente abierta: {} (rotación {}°)", source.describe(), camera.rotation.degrees());
        Ok(RotatingSource::wrap(source, camera.rotation))
    }
}

/// Decorador que rota cada frame antes de entregarlo.
pub struct RotatingSource {
    inner: Box<dyn FrameSourcePort>,
    rotation: Rotation,
}

impl RotatingSource {
    pub fn wrap(inner: Box<dyn FrameSourcePort>, rotation: Rotation) -> Box<dyn FrameSourcePort> {
        if rotation == Rotation::Deg0 {
            return inner;
        }
        Box::new(Self { inner, rotation })
    }
}

impl FrameSourcePort for RotatingSource {
    fn next_frame(&mut self) -> DomainResult<RgbImage> {
        Ok(self.rotation.apply(self.inner.next_frame()?))
    }

    fn describe(&self) -> String {
        format!("{} ({}°)", self.inner.describe(), self.rotation.degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    struct Fixed(RgbImage);

    impl FrameSourcePort for Fixed {
        fn next_frame(&mut self) -> DomainResult<RgbImage> {
            Ok(self.0.clone())
        }
        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    struct Broken;

    impl FrameSourcePort for Broken {
        fn next_frame(&mut self) -> DomainResult<RgbImage> {
            Err(DomainError::FrameUnavailable("sin señal".into()))
        }
        fn describe(&self) -> String {
            "broken".into()
        }
    }

    fn marked() -> RgbImage {
        // 4x2 con el píxel superior derecho marcado
        let mut img = RgbImage::from_pixel(4, 2, Rgb([0, 0, 0]));
        img.put_pixel(3, 0, Rgb([255, 0, 0]));
        img
    }

    #[test]
    fn quarter_turn_swaps_dimensions_counter_clockwise() {
        let mut src = RotatingSource::wrap(Box::new(Fixed(marked())), Rotation::Deg90);
        let frame = src.next_frame().unwrap();
        assert_eq!(frame.dimensions(), (2, 4));
        // Girando a la izquierda, la esquina superior derecha pasa a la superior izquierda
        assert_eq!(frame.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(src.describe(), "fixed (90°)");
    }

    #[test]
    fn zero_rotation_is_passthrough() {
        let mut src = RotatingSource::wrap(Box::new(Fixed(marked())), Rotation::Deg0);
        assert_eq!(src.describe(), "fixed");
        assert_eq!(src.next_frame().unwrap(), marked());
    }

    #[test]
    fn errors_pass_through_rotation() {
        let mut src = RotatingSource::wrap(Box::new(Broken), Rotation::Deg180);
        assert!(matches!(src.next_frame(), Err(DomainError::FrameUnavailable(_))));
    }
}
