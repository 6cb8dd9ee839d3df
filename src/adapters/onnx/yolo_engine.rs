use anyhow::{anyhow, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array4, ArrayViewD, Axis, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Value;
use std::fs;
use tracing::info;

use crate::application::ports::{DetectorFactory, DetectorPort};
use crate::domain::config::DetectionConfig;
use crate::domain::detection::{Detection, DetectionFrame, PERSON_CLASS_ID};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::YoloParams;

pub struct OnnxYoloEngine {
    session: Session,
}

impl OnnxYoloEngine {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(4)?;

        // CUDA es opcional: si está disponible se registra, si no continuamos en CPU.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = builder_with_cuda;
        }

        // Con `ort` sin default-features, usamos commit_from_memory.
        let model_bytes = fs::read(path)?;
        let session = builder.commit_from_memory(&model_bytes)?;

        Ok(Self { session })
    }

    /// Candidatos de persona por encima de `conf_threshold`, tras NMS.
    pub fn infer(&mut self, rgb: &RgbImage, params: &YoloParams) -> Result<Vec<Detection>> {
        let imgsz = params.input_size as usize;
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Nearest);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y as usize, x as usize]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y as usize, x as usize]] = pixel[2] as f32 / 255.0;
        }

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let input_tensor = Value::from_array((input_shape, input.into_raw_vec()))?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.into_iter().map(|&x| x as usize).collect();
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out)?;
        let view = array_view.index_axis(Axis(0), 0);

        // [4 + clases, candidatos]
        if view.ndim() != 2 || view.shape()[0] <= 4 {
            return Err(anyhow!("salida YOLO inesperada: {:?}", dims));
        }
        let num_candidates = view.shape()[1];
        let sx = rgb.width() as f32 / imgsz as f32;
        let sy = rgb.height() as f32 / imgsz as f32;

        let mut detections = Vec::new();

        for i in 0..num_candidates {
            let scores = view.slice(s![4.., i]);
            let Some((class_id, &max_score)) = scores
                .indexed_iter()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
            else {
                continue;
            };

            if class_id == PERSON_CLASS_ID && max_score > params.conf_threshold {
                let cx = view[[0, i]];
                let cy = view[[1, i]];
                let w = view[[2, i]];
                let h = view[[3, i]];

                detections.push(Detection {
                    x1: (cx - w / 2.0) * sx,
                    y1: (cy - h / 2.0) * sy,
                    x2: (cx + w / 2.0) * sx,
                    y2: (cy + h / 2.0) * sy,
                    score: max_score,
                    class_id,
                });
            }
        }

        let mut kept = nms(params.iou_threshold, detections);
        kept.truncate(params.max_detections);
        Ok(kept)
    }
}

/// Greedy non-maximum suppression; result sorted by descending score.
pub fn nms(iou_threshold: f32, mut boxes: Vec<Detection>) -> Vec<Detection> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..boxes.len() {
            if !suppressed[j] && iou(&boxes[i], &boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    boxes
        .into_iter()
        .zip(suppressed)
        .filter_map(|(b, s)| (!s).then_some(b))
        .collect()
}

fn iou(a: &Detection, b: &Detection) -> f32 {
    let left = a.x1.max(b.x1);
    let top = a.y1.max(b.y1);
    let right = a.x2.min(b.x2);
    let bottom = a.y2.min(b.y2);

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);

    intersection / (area_a + area_b - intersection).max(1e-7)
}

/// Adaptador `DetectorPort`: YOLO filtrado a personas.
pub struct YoloPersonDetector {
    engine: OnnxYoloEngine,
    params: YoloParams,
}

impl DetectorPort for YoloPersonDetector {
    fn detect(&mut self, frame: &RgbImage) -> DomainResult<DetectionFrame> {
        let detections = self.engine
            .infer(frame, &self.params)
            .map_err(|e| DomainError::DetectionFailed(e.to_string()))?;
        Ok(DetectionFrame::from_detections(&detections, self.params.conf_threshold))
    }
}

pub struct OnnxDetectorFactory;

impl OnnxDetectorFactory {
    pub fn new() -> Self { Self }
}

impl DetectorFactory for OnnxDetectorFactory {
    fn load(&self, detection: &DetectionConfig) -> DomainResult<Box<dyn DetectorPort>> {
        let infer = detection.inference();
        let engine = OnnxYoloEngine::load(&infer.model.onnx_path)
            .map_err(|e| DomainError::OperationFailed(format!("Error cargando modelo YOLO: {e}")))?;
        info!("Modelo YOLO cargado: {}", infer.model.onnx_path);
        Ok(Box::new(YoloPersonDetector { engine, params: infer.params }))
    }
}
