use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::activity::{ActivityLevel, ConfidenceLabel};
use super::clock::{Clock, SystemClock};

/// Alertas guardadas en memoria; las más antiguas se descartan.
pub const ALERT_CAPACITY: usize = 20;

/// Además de correr, el movimiento debe superar esta fracción del frame para alertar.
pub const RUNNING_MOTION_FLOOR: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Danger,
    Warning,
}

impl AlertSeverity {
    pub fn for_activity(activity: ActivityLevel) -> Self {
        if activity == ActivityLevel::Running {
            AlertSeverity::Danger
        } else {
            AlertSeverity::Warning
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Local>,
    pub activity: ActivityLevel,
    pub motion_level: f64,
    pub confidence: ConfidenceLabel,
    pub severity: AlertSeverity,
}

impl Alert {
    /// `YYYY-mm-dd HH:MM:SS`, como se muestra en el panel.
    pub fn timestamp_label(&self) -> String {
        self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Historial de capacidad fija, la más reciente primero.
#[derive(Debug, Clone)]
pub struct AlertLog {
    entries: VecDeque<Alert>,
    capacity: usize,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::with_capacity(ALERT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Inserta al principio y devuelve la entrada expulsada del final, si la hay.
    pub fn push(&mut self, alert: Alert) -> Option<Alert> {
        self.entries.push_front(alert);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    pub fn recent(&self, n: usize) -> Vec<Alert> {
        self.entries.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Convierte lecturas de actividad en alertas limitadas por cooldown.
///
/// No hay objeto de estado explícito: la puerta está "alertada" mientras
/// `last_alert_time` sea más reciente que el cooldown, e inactiva si no.
pub struct AlertGate {
    log: AlertLog,
    last_alert_time: Option<Instant>,
    clock: Arc<dyn Clock>,
}

impl AlertGate {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            log: AlertLog::new(),
            last_alert_time: None,
            clock,
        }
    }

    /// Comprueba la condición de alerta y, si se cumple, rearma el cooldown en
    /// la misma llamada. `&mut self` hace indivisibles la comprobación y la actualización.
    pub fn should_alert(&mut self, activity: ActivityLevel, motion_level: f64, cooldown: Duration) -> bool {
        if activity != ActivityLevel::Running || motion_level <= RUNNING_MOTION_FLOOR {
            return false;
        }

        let now = self.clock.now();
        let cooled_down = match self.last_alert_time {
            None => true,
            Some(last) => now.saturating_duration_since(last) > cooldown,
        };

        if cooled_down {
            self.last_alert_time = Some(now);
        }
        cooled_down
    }

    pub fn add_alert(&mut self, activity: ActivityLevel, motion_level: f64, confidence: ConfidenceLabel) -> Alert {
        let alert = Alert {
            timestamp: Local::now(),
            activity,
            motion_level,
            confidence,
            severity: AlertSeverity::for_activity(activity),
        };
        self.log.push(alert.clone());
        alert
    }

    pub fn recent(&self, n: usize) -> Vec<Alert> {
        self.log.recent(n)
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

}

impl Default for AlertGate {
    fn default() -> Self {
        Self::new()
    }
}
