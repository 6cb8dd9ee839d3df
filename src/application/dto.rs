use serde::{Deserialize, Serialize};

use crate::domain::{
    alerts::Alert,
    camera::{CameraInfo, FrameSize},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsQuery {
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertView {
    pub time_label: String,
    #[serde(flatten)]
    pub alert: Alert,
}

impl From<Alert> for AlertView {
    fn from(alert: Alert) -> Self {
        Self { time_label: alert.timestamp_label(), alert }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<AlertView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSummary {
    pub index: u32,
    pub card: String,
    pub path: String,
}

impl From<CameraInfo> for CameraSummary {
    fn from(c: CameraInfo) -> Self {
        let index = c.id.path.chars().filter(|ch| ch.is_ascii_digit()).collect::<String>().parse::<u32>().unwrap_or(0);
        Self { index, card: c.card, path: c.id.path }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraTestResponse {
    pub ok: bool,
    pub source: String,
    pub resolution: FrameSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::camera::CameraId;

    #[test]
    fn camera_index_comes_from_device_path() {
        let info = CameraInfo {
            id: CameraId::from_index(2),
            name: "cam".into(),
            card: "USB Camera".into(),
            driver: "uvcvideo".into(),
            bus: "usb-0000:00:14.0-1".into(),
        };
        let summary = CameraSummary::from(info);
        assert_eq!(summary.index, 2);
        assert_eq!(summary.path, "/dev/video2");
    }
}
