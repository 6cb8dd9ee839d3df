use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraId { pub path: String }

impl CameraId {
    pub fn from_index(index: u32) -> Self {
        Self { path: format!("/dev/video{}", index) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    pub id: CameraId,
    pub name: String,
    pub card: String,
    pub driver: String,
    pub bus: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraMode {
    pub format: String,
    pub size: FrameSize,
    pub fps: u32,
}

/// Origen de los frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraSource {
    Webcam { index: u32 },
    /// Endpoint HTTP que sirve snapshots JPEG o un stream MJPEG.
    IpCamera { url: String },
}

impl CameraSource {
    pub fn describe(&self) -> String {
        match self {
            CameraSource::Webcam { index } => format!("webcam {}", CameraId::from_index(*index).path),
            CameraSource::IpCamera { url } => format!("ip camera {}", url),
        }
    }
}

impl Default for CameraSource {
    fn default() -> Self {
        CameraSource::Webcam { index: 0 }
    }
}

/// Corrección en sentido antihorario para una cámara montada girada.
///
/// A 90° y 270° el frame resultante intercambia ancho y alto; no se recorta
/// a la resolución original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn apply(self, frame: RgbImage) -> RgbImage {
        match self {
            Rotation::Deg0 => frame,
            // imageops gira en sentido horario
            Rotation::Deg90 => imageops::rotate270(&frame),
            Rotation::Deg180 => imageops::rotate180(&frame),
            Rotation::Deg270 => imageops::rotate90(&frame),
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = DomainError;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(DomainError::InvalidInput(format!("la rotación debe ser 0, 90, 180 o 270, no {other}"))),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> Self {
        r.degrees()
    }
}
