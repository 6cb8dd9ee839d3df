use anyhow::{anyhow, Result};
use std::time::Duration;
use image::{ImageFormat, RgbImage};
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use crate::application::ports::FrameSourcePort;
use crate::domain::camera::{CameraId, CameraMode};
use crate::domain::errors::{DomainError, DomainResult};

/// Webcam local leída con V4L2 en modo MMAP.
pub struct V4l2Capture {
    stream: Stream<'static>,
    camera: CameraId,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

impl V4l2Capture {
    /// Abre el dispositivo y fija formato, resolución y FPS. El driver puede
    /// ajustar los valores a los más cercanos soportados.
    ///
    /// Cada lectura espera como mucho `read_timeout`; pasado ese tiempo
    /// `next_frame` devuelve `FrameUnavailable`.
    pub fn open(camera: &CameraId, mode: &CameraMode, read_timeout: Duration) -> Result<Self> {
        let dev = Device::with_path(&camera.path)?;

        let mut fmt = dev.format()?;
        let b = mode.format.as_bytes();
        if b.len() != 4 {
            return Err(anyhow!("FourCC debe tener 4 caracteres"));
        }
        fmt.fourcc = FourCC::new(&[b[0], b[1], b[2], b[3]]);
        fmt.width = mode.size.width;
        fmt.height = mode.size.height;
        let actual_fmt = dev.set_format(&fmt)?;

        let mut params = dev.params()?;
        params.interval.numerator = 1;
        params.interval.denominator = mode.fps;
        let _ = dev.set_params(&params);

        // El stream guarda su propio handle: el descriptor se cierra al soltar la captura.
        let mut stream = Stream::with_buffers(&dev, v4l::buffer::Type::VideoCapture, 4)?;
        stream.set_timeout(read_timeout);

        tracing::info!(
            "Cámara abierta: {} {}x{} [{}] a {} FPS",
            camera.path, actual_fmt.width, actual_fmt.height, actual_fmt.fourcc, mode.fps
        );

        Ok(Self {
            stream,
            camera: camera.clone(),
            fourcc: actual_fmt.fourcc,
            width: actual_fmt.width,
            height: actual_fmt.height,
        })
    }

    fn read_rgb(&mut self) -> Result<RgbImage> {
        let (data, _) = self.stream.next()?;
        let fcc_str = self.fourcc.str().map_err(|_| anyhow!("FourCC inválido"))?;

        match fcc_str {
            "MJPG" => Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8()),
            "YUYV" => Ok(yuyv_to_rgb(data, self.width, self.height)),
            _ => Err(anyhow!("Formato de cámara {} no soportado", fcc_str)),
        }
    }
}

impl FrameSourcePort for V4l2Capture {
    fn next_frame(&mut self) -> DomainResult<RgbImage> {
        self.read_rgb()
            .map_err(|e| DomainError::FrameUnavailable(format!("{}: {e}", self.camera.path)))
    }

    fn describe(&self) -> String {
        format!("webcam {}", self.camera.path)
    }
}

/// YUYV (YUV 4:2:2) a RGB, BT.601.
fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);

    // Cada bloque de 4 bytes define 2 píxeles: [Y0, U, Y1, V]
    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let y0 = chunk[0] as f32;
        let u  = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v  = chunk[3] as f32 - 128.0;

        let pixel_idx = i as u32 * 2;
        let x = pixel_idx % w;
        let y = pixel_idx / w;

        if y < h {
            out.put_pixel(x, y, image::Rgb(bt601(y0, u, v)));
            if x + 1 < w {
                out.put_pixel(x + 1, y, image::Rgb(bt601(y1, u, v)));
            }
        }
    }
    out
}

fn bt601(luma: f32, u: f32, v: f32) -> [u8; 3] {
    [
        (luma + 1.402 * v).clamp(0.0, 255.0) as u8,
        (luma - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8,
        (luma + 1.772 * u).clamp(0.0, 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::camera::FrameSize;
    use std::path::Path;

    fn mode() -> CameraMode {
        CameraMode { format: "MJPG".into(), size: FrameSize { width: 640, height: 480 }, fps: 15 }
    }

    /// Descriptores del proceso que apuntan a `path`.
    fn open_handles_to(path: &Path) -> usize {
        let Ok(entries) = std::fs::read_dir("/proc/self/fd") else { return 0 };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| std::fs::read_link(e.path()).map(|t| t == path).unwrap_or(false))
            .count()
    }

    #[test]
    fn failed_opens_release_the_device() {
        let path = std::env::temp_dir().join(format!("cctv-not-a-camera-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();
        let camera = CameraId { path: path.to_string_lossy().to_string() };

        for _ in 0..32 {
            assert!(V4l2Capture::open(&camera, &mode(), Duration::from_millis(100)).is_err());
        }
        assert_eq!(open_handles_to(&path), 0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn dropped_captures_close_the_device() {
        let path = Path::new("/dev/video0");
        if !path.exists() {
            return;
        }
        let camera = CameraId { path: path.to_string_lossy().to_string() };
        let before = open_handles_to(path);

        for _ in 0..16 {
            let Ok(capture) = V4l2Capture::open(&camera, &mode(), Duration::from_millis(200)) else {
                return;
            };
            drop(capture);
        }
        assert_eq!(open_handles_to(path), before);
    }

    #[test]
    fn neutral_chroma_is_grey() {
        // 2x1: Y0=16, Y1=235, U=V=128
        let rgb = yuyv_to_rgb(&[16, 128, 235, 128], 2, 1);
        assert_eq!(rgb.get_pixel(0, 0).0, [16, 16, 16]);
        assert_eq!(rgb.get_pixel(1, 0).0, [235, 235, 235]);
    }

    #[test]
    fn short_buffer_leaves_remaining_pixels_black() {
        let rgb = yuyv_to_rgb(&[200, 128, 200, 128], 4, 1);
        assert_eq!(rgb.get_pixel(1, 0).0, [200, 200, 200]);
        assert_eq!(rgb.get_pixel(3, 0).0, [0, 0, 0]);
    }

    #[test]
    fn red_chroma_pushes_red_channel() {
        let rgb = yuyv_to_rgb(&[100, 128, 100, 228], 2, 1);
        let [r, g, b] = rgb.get_pixel(0, 0).0;
        assert!(r > g && r > b);
        assert_eq!(b, 100);
    }
}
