use image::RgbImage;
use ndarray::{s, Array2, Zip};

use super::activity::MotionReading;
use super::background::{BackgroundModel, BackgroundParams, ForegroundMask, PixelClass};
use super::detection::BoundingBox;

/// Clasifica cuánto se mueven las personas de un frame.
///
/// Es dueño del modelo de fondo de una única fuente de vídeo.
pub struct MotionClassifier {
    background: BackgroundModel,
}

impl MotionClassifier {
    pub fn new() -> Self {
        Self::with_params(BackgroundParams::default())
    }

    pub fn with_params(params: BackgroundParams) -> Self {
        Self {
            background: BackgroundModel::new(params),
        }
    }

    /// Sin frame o sin personas el modelo de fondo no se toca y se devuelve
    /// la lectura `no_humans`.
    pub fn classify(&mut self, frame: Option<&RgbImage>, boxes: &[BoundingBox]) -> MotionReading {
        let Some(frame) = frame else {
            return MotionReading::no_humans();
        };
        if boxes.is_empty() {
            return MotionReading::no_humans();
        }

        let mut mask = self.background.apply(frame);
        keep_inside_boxes(&mut mask, boxes);
        MotionReading::from_motion_level(moving_fraction(&mask))
    }

    pub fn frames_seen(&self) -> u32 {
        self.background.frames_seen()
    }
}

impl Default for MotionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Limpia los píxeles de la máscara fuera de la unión de `boxes`.
fn keep_inside_boxes(mask: &mut ForegroundMask, boxes: &[BoundingBox]) {
    let (rows, cols) = mask.dim();
    let mut inside = Array2::from_elem((rows, cols), false);
    for b in boxes {
        if let Some((x0, y0, x1, y1)) = b.clip(cols, rows) {
            inside.slice_mut(s![y0..y1, x0..x1]).fill(true);
        }
    }
    Zip::from(mask).and(&inside).for_each(|px, &keep| {
        if !keep {
            *px = PixelClass::Background;
        }
    });
}

/// Normalizado por el frame completo, no por el área de las cajas.
fn moving_fraction(mask: &ForegroundMask) -> f64 {
    let total = mask.len();
    if total == 0 {
        return 0.0;
    }
    let moving = mask.iter().filter(|px| px.is_moving()).count();
    (moving as f64 / total as f64).clamp(0.0, 1.0)
}
