use serde::{Deserialize, Serialize};

/// Índice de la clase COCO "person".
pub const PERSON_CLASS_ID: usize = 0;

/// Candidato YOLO en coordenadas de la imagen de entrada (xyxy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn is_person(&self) -> bool {
        self.class_id == PERSON_CLASS_ID
    }

    /// Trunca a píxeles enteros; las esquinas negativas se saturan a cero.
    pub fn to_bounding_box(&self) -> BoundingBox {
        let x = self.x1 as u32;
        let y = self.y1 as u32;
        BoundingBox {
            x,
            y,
            width: (self.x2 as u32).saturating_sub(x),
            height: (self.y2 as u32).saturating_sub(y),
        }
    }
}

/// Región alineada a los ejes `(x, y, ancho, alto)` en píxeles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Ventana semiabierta `(x0, y0, x1, y1)` de la caja dentro de una rejilla
    /// `cols x rows`, o `None` si no queda nada visible.
    pub fn clip(&self, cols: usize, rows: usize) -> Option<(usize, usize, usize, usize)> {
        let x0 = (self.x as usize).min(cols);
        let y0 = (self.y as usize).min(rows);
        let x1 = (self.x as usize).saturating_add(self.width as usize).min(cols);
        let y1 = (self.y as usize).saturating_add(self.height as usize).min(rows);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }
}

/// Lo que el detector informa para un frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub presence: bool,
    /// Mejor puntuación de persona del frame, 0 si no hay nadie.
    pub confidence: f32,
    pub boxes: Vec<BoundingBox>,
}

impl DetectionFrame {
    /// El centinela "sin detección".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Conserva las personas con puntuación estrictamente mayor que `min_confidence`.
    pub fn from_detections(detections: &[Detection], min_confidence: f32) -> Self {
        let people: Vec<&Detection> = detections
            .iter()
            .filter(|d| d.is_person() && d.score > min_confidence)
            .collect();

        let confidence = people.iter().map(|d| d.score).fold(0.0_f32, f32::max);
        let boxes: Vec<BoundingBox> = people.iter().map(|d| d.to_bounding_box()).collect();

        Self {
            presence: !boxes.is_empty(),
            confidence: confidence.clamp(0.0, 1.0),
            boxes,
        }
    }
}
