use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::activity::MotionReading;
use super::alerts::Alert;
use super::detection::BoundingBox;

/// Resultado de un tick de proceso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub frame_index: u64,
    pub humans: usize,
    pub presence_confidence: f32,
    pub detector_confidence: f32,
    pub detector_failed: bool,
    pub reading: MotionReading,
    pub alert: Option<Alert>,
}

/// Tiempos del bucle de proceso.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LoopMetrics {
    pub total_ticks: u64,
    pub deadline_misses: u64,
    pub worst_tick_ms: f32,
}

/// Mensaje por frame para la vista en vivo. El JPEG viaja aparte.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
    pub infer_ms: f32,
    pub fps_est: f32,
    pub boxes: Vec<BoundingBox>,
    pub report: TickReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsFrameMetaMessage {
    pub r#type: String,
    pub meta: FrameMeta,
}

/// Lo que consulta el panel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub running: bool,
    pub source: Option<String>,
    pub started_at: Option<DateTime<Local>>,
    pub last_update: Option<DateTime<Local>>,
    pub uptime_secs: u64,
    pub frame_count: u64,
    pub detector_failures: u64,
    pub frame_failures: u64,
    pub alert_count: usize,
    pub confidence_threshold: f32,
    pub motion_sensitivity: u8,
    pub metrics: LoopMetrics,
    pub latest: Option<TickReport>,
    /// La más reciente primero.
    pub alerts: Vec<Alert>,
}
