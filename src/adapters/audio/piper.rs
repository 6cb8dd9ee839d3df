use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{error, info};

use crate::application::ports::AlertNotifierPort;
use crate::domain::activity::ActivityLevel;
use crate::domain::alerts::Alert;

/// Anuncia las alertas por voz: piper sintetiza el texto y aplay lo reproduce.
/// Cada anuncio corre en su propio hilo para no frenar el bucle de proceso.
pub struct PiperAnnouncer {
    piper_path: PathBuf,
    voice_path: PathBuf,
}

impl PiperAnnouncer {
    pub fn new(piper_path: impl Into<PathBuf>, voice_path: impl Into<PathBuf>) -> Self {
        Self { piper_path: piper_path.into(), voice_path: voice_path.into() }
    }
}

impl Default for PiperAnnouncer {
    fn default() -> Self {
        Self::new("./piper_voice/piper/piper", "./piper_voice/en_US-lessac-medium.onnx")
    }
}

impl AlertNotifierPort for PiperAnnouncer {
    fn notify(&self, alert: &Alert) {
        let text = announcement(alert);
        let piper_path = self.piper_path.clone();
        let voice_path = self.voice_path.clone();
        info!("🎙️ Anunciando: {}", text);

        std::thread::spawn(move || {
            if !voice_path.exists() {
                error!("❌ Modelo de voz no encontrado: {}", voice_path.display());
                return;
            }

            let mut piper = match Command::new(&piper_path)
                .arg("--model")
                .arg(&voice_path)
                .arg("--output_raw")
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .spawn()
            {
                Ok(p) => p,
                Err(e) => {
                    error!("❌ No se pudo iniciar Piper: {}", e);
                    return;
                }
            };

            if let Some(mut stdin) = piper.stdin.take() {
                let _ = stdin.write_all(text.as_bytes());
            }

            if let Some(stdout) = piper.stdout.take() {
                match Command::new("aplay")
                    .args(["-r", "22050", "-f", "S16_LE", "-t", "raw", "-q"])
                    .stdin(stdout)
                    .status()
                {
                    Ok(_) => {}
                    Err(e) => error!("❌ No se pudo iniciar aplay: {}", e),
                }
            }
            let _ = piper.wait();
        });
    }
}

/// Texto hablado para una alerta.
fn announcement(alert: &Alert) -> String {
    let activity = match alert.activity {
        ActivityLevel::Running => "Person running",
        ActivityLevel::PossibleRunning => "Possible running",
        ActivityLevel::WalkingFast => "Person walking fast",
        ActivityLevel::Walking => "Person walking",
        ActivityLevel::Talking => "Person talking",
        ActivityLevel::Standing => "Person standing",
        ActivityLevel::NoHumans => "No people",
    };
    format!("Alert. {} detected. Motion {:.0} percent.", activity, alert.motion_level * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::ConfidenceLabel;
    use crate::domain::alerts::AlertSeverity;

    #[test]
    fn announcement_names_activity_and_motion() {
        let alert = Alert {
            timestamp: chrono::Local::now(),
            activity: ActivityLevel::Running,
            motion_level: 0.123,
            confidence: ConfidenceLabel::High,
            severity: AlertSeverity::Danger,
        };
        assert_eq!(announcement(&alert), "Alert. Person running detected. Motion 12 percent.");
    }
}
