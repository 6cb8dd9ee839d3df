use anyhow::{anyhow, Result};
use image::{ImageFormat, RgbImage};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::application::ports::FrameSourcePort;
use crate::domain::errors::{DomainError, DomainResult};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Límite del buffer de un stream MJPEG sin marcadores válidos.
const MAX_PENDING_BYTES: usize = 8 * 1024 * 1024;

/// Cámara IP por HTTP. Acepta tanto snapshots JPEG sueltos como streams
/// MJPEG (`multipart/x-mixed-replace`), que se mantienen abiertos entre frames.
///
/// Se conduce desde un hilo bloqueante: cada lectura se ejecuta sobre el
/// runtime de Tokio con `block_on` y está acotada por `timeout`.
pub struct IpCameraSource {
    url: String,
    client: reqwest::Client,
    handle: Handle,
    timeout: Duration,
    stream: Option<reqwest::Response>,
    pending: Vec<u8>,
}

impl IpCameraSource {
    pub fn new(url: &str, timeout: Duration, handle: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            url: url.to_string(),
            client,
            handle,
            timeout,
            stream: None,
            pending: Vec::new(),
        })
    }

    fn read_jpeg(&mut self) -> Result<Vec<u8>> {
        let handle = self.handle.clone();
        let timeout = self.timeout;
        handle.block_on(async {
            tokio::time::timeout(timeout, self.fetch_jpeg())
                .await
                .map_err(|_| anyhow!("sin respuesta en {:?}", timeout))?
        })
    }

    async fn fetch_jpeg(&mut self) -> Result<Vec<u8>> {
        if self.stream.is_none() {
            let response = self.client.get(&self.url).send().await?.error_for_status()?;
            let multipart = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.starts_with("multipart/"));

            if !multipart {
                return Ok(response.bytes().await?.to_vec());
            }
            info!("📡 Stream MJPEG abierto: {}", self.url);
            self.pending.clear();
            self.stream = Some(response);
        }

        loop {
            if let Some(jpeg) = take_jpeg(&mut self.pending) {
                return Ok(jpeg);
            }
            let Some(response) = self.stream.as_mut() else {
                return Err(anyhow!("stream cerrado"));
            };
            match response.chunk().await? {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None => return Err(anyhow!("el servidor cerró el stream")),
            }
            if self.pending.len() > MAX_PENDING_BYTES {
                self.pending.clear();
                return Err(anyhow!("stream MJPEG sin frames válidos"));
            }
        }
    }
}

impl FrameSourcePort for IpCameraSource {
    fn next_frame(&mut self) -> DomainResult<RgbImage> {
        let frame = self.read_jpeg().and_then(|jpeg| {
            Ok(image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)?.to_rgb8())
        });

        frame.map_err(|e| {
            // Reconectar en la próxima lectura
            if self.stream.take().is_some() {
                warn!("Stream de cámara IP descartado: {e}");
            }
            DomainError::FrameUnavailable(format!("{}: {e}", self.url))
        })
    }

    fn describe(&self) -> String {
        format!("ip camera {}", self.url)
    }
}

/// Extrae el primer JPEG completo (SOI..EOI) del buffer y descarta lo anterior.
fn take_jpeg(buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let Some(start) = find(buf, &SOI, 0) else {
        // Conservar el último byte por si es la mitad de un SOI.
        let keep_from = buf.len().saturating_sub(1);
        buf.drain(..keep_from);
        return None;
    };
    let end = find(buf, &EOI, start + 2)? + 2;
    let jpeg = buf[start..end].to_vec();
    buf.drain(..end);
    Some(jpeg)
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == needle)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_frames_from_multipart_body() {
        let mut buf = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        buf.extend_from_slice(&[0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);
        buf.extend_from_slice(b"\r\n--frame\r\n");
        buf.extend_from_slice(&[0xFF, 0xD8, 9]);

        let first = take_jpeg(&mut buf).unwrap();
        assert_eq!(first, vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9]);

        // Segundo frame incompleto: se queda en el buffer
        assert!(take_jpeg(&mut buf).is_none());
        buf.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(take_jpeg(&mut buf).unwrap(), vec![0xFF, 0xD8, 9, 0xFF, 0xD9]);
    }

    #[test]
    fn marker_split_across_chunks_is_kept() {
        let mut buf = b"boundary".to_vec();
        buf.push(0xFF);
        assert!(take_jpeg(&mut buf).is_none());
        assert_eq!(buf, vec![0xFF]);

        buf.extend_from_slice(&[0xD8, 7, 0xFF, 0xD9]);
        assert_eq!(take_jpeg(&mut buf).unwrap(), vec![0xFF, 0xD8, 7, 0xFF, 0xD9]);
        assert!(buf.is_empty());
    }

    #[test]
    fn soi_bytes_do_not_count_as_eoi() {
        // FF D8 D9: el EOI debe empezar después del SOI
        let mut buf = vec![0xFF, 0xD8, 0xD9];
        assert!(take_jpeg(&mut buf).is_none());
        assert_eq!(buf.len(), 3);
    }
}
