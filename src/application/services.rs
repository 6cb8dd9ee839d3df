use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    application::ports::{CameraCatalogPort, FrameSourceFactory, ModelCatalogPort, MonitorPort},
    domain::{
        alerts::Alert,
        camera::{CameraInfo, FrameSize},
        config::{CameraConfig, MonitorConfig},
        errors::{DomainError, DomainResult},
        stream::{FrameMeta, MonitorSnapshot},
    },
};

/// Servicio encargado de la gestión de dispositivos físicos de captura.
/// Permite listar cámaras y comprobar que una fuente entrega frames.
#[derive(Clone)]
pub struct CameraService {
    catalog: Arc<dyn CameraCatalogPort>,
    sources: Arc<dyn FrameSourceFactory>,
}

impl CameraService {
    pub fn new(catalog: Arc<dyn CameraCatalogPort>, sources: Arc<dyn FrameSourceFactory>) -> Self {
        Self { catalog, sources }
    }

    pub async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        self.catalog.list_cameras().await
    }

    /// Abre la fuente, lee un frame (ya rotado) y devuelve su resolución.
    pub async fn test_camera(&self, camera: CameraConfig) -> DomainResult<FrameSize> {
        camera.validate()?;
        let sources = self.sources.clone();

        tokio::task::spawn_blocking(move || -> DomainResult<FrameSize> {
            let mut source = sources.open(&camera)?;
            let frame = source.next_frame()?;
            let (width, height) = frame.dimensions();
            info!("Prueba de cámara correcta: {} ({}x{})", source.describe(), width, height);
            Ok(FrameSize { width, height })
        })
        .await
        .map_err(|e| DomainError::OperationFailed(format!("prueba de cámara abortada: {e}")))?
    }
}

/// Orquestador de la sesión de monitoreo (captura + detección + alertas).
pub struct MonitorService {
    monitor: Arc<dyn MonitorPort>,
    model_catalog: Arc<dyn ModelCatalogPort>,
    config: RwLock<MonitorConfig>,
}

impl MonitorService {
    pub fn new(monitor: Arc<dyn MonitorPort>, model_catalog: Arc<dyn ModelCatalogPort>, config: MonitorConfig) -> Self {
        Self {
            monitor,
            model_catalog,
            config: RwLock::new(config),
        }
    }

    pub fn config(&self) -> DomainResult<MonitorConfig> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|_| DomainError::OperationFailed("Lock de configuración fallido".into()))
    }

    /// Valida y guarda la configuración. Si hay una sesión activa se reinicia
    /// con los nuevos valores.
    pub async fn apply_config(&self, config: MonitorConfig) -> DomainResult<()> {
        config.validate()?;
        {
            let mut lock = self.config.write()
                .map_err(|_| DomainError::OperationFailed("Lock de configuración fallido".into()))?;
            *lock = config;
        }

        if self.monitor.is_running().await {
            info!("Configuración cambiada con el monitoreo activo: reiniciando sesión");
            self.monitor.stop().await?;
            self.start().await?;
        }
        Ok(())
    }

    /// Antes de arrancar, valida que el modelo seleccionado exista.
    pub async fn start(&self) -> DomainResult<()> {
        let config = self.config()?;
        config.validate()?;
        self.model_catalog.validate_model(&config.detection.inference().model).await?;
        self.monitor.start(config).await
    }

    pub async fn stop(&self) -> DomainResult<()> {
        self.monitor.stop().await
    }

    pub async fn status(&self) -> DomainResult<MonitorSnapshot> {
        self.monitor.snapshot().await
    }

    /// Las `count` alertas más recientes; nunca más de las que existen.
    pub async fn recent_alerts(&self, count: Option<usize>) -> DomainResult<Vec<Alert>> {
        let count = match count {
            Some(n) => n,
            None => self.config()?.alerts.max_alerts_display,
        };
        let snapshot = self.monitor.snapshot().await?;
        Ok(snapshot.alerts.into_iter().take(count).collect())
    }

    /// Proporciona un receptor para el canal de difusión (broadcast)
    /// donde se publican los frames procesados y los metadatos.
    pub async fn subscribe(&self) -> DomainResult<broadcast::Receiver<(FrameMeta, Vec<u8>)>> {
        self.monitor.subscribe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::activity::{ActivityLevel, ConfidenceLabel};
    use crate::domain::alerts::AlertSeverity;
    use crate::domain::model::ModelId;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMonitor {
        running: Mutex<bool>,
        starts: Mutex<Vec<MonitorConfig>>,
        alerts: Vec<Alert>,
    }

    #[async_trait]
    impl MonitorPort for FakeMonitor {
        async fn start(&self, config: MonitorConfig) -> DomainResult<()> {
            *self.running.lock().unwrap() = true;
            self.starts.lock().unwrap().push(config);
            Ok(())
        }
        async fn stop(&self) -> DomainResult<()> {
            *self.running.lock().unwrap() = false;
            Ok(())
        }
        async fn is_running(&self) -> bool {
            *self.running.lock().unwrap()
        }
        async fn snapshot(&self) -> DomainResult<MonitorSnapshot> {
            Ok(MonitorSnapshot { alerts: self.alerts.clone(), ..Default::default() })
        }
        async fn subscribe(&self) -> DomainResult<broadcast::Receiver<(FrameMeta, Vec<u8>)>> {
            Err(DomainError::OperationFailed("no stream".into()))
        }
    }

    struct Models { ok: bool }

    #[async_trait]
    impl ModelCatalogPort for Models {
        async fn validate_model(&self, model: &ModelId) -> DomainResult<()> {
            if self.ok { Ok(()) } else { Err(DomainError::NotFound(model.onnx_path.clone())) }
        }
    }

    fn alert(motion_level: f64) -> Alert {
        Alert {
            timestamp: chrono::Local::now(),
            activity: ActivityLevel::Running,
            motion_level,
            confidence: ConfidenceLabel::High,
            severity: AlertSeverity::Danger,
        }
    }

    fn service(monitor: Arc<FakeMonitor>, models_ok: bool) -> MonitorService {
        MonitorService::new(monitor, Arc::new(Models { ok: models_ok }), MonitorConfig::default())
    }

    #[tokio::test]
    async fn start_requires_a_model() {
        let monitor = Arc::new(FakeMonitor::default());
        let svc = service(monitor.clone(), false);
        assert!(matches!(svc.start().await, Err(DomainError::NotFound(_))));
        assert!(!monitor.is_running().await);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_and_kept_out() {
        let svc = service(Arc::new(FakeMonitor::default()), true);
        let mut cfg = MonitorConfig::default();
        cfg.alerts.cooldown_secs = 1000;
        assert!(matches!(svc.apply_config(cfg).await, Err(DomainError::InvalidInput(_))));
        assert_eq!(svc.config().unwrap().alerts.cooldown_secs, 60);
    }

    #[tokio::test]
    async fn config_change_restarts_running_session() {
        let monitor = Arc::new(FakeMonitor::default());
        let svc = service(monitor.clone(), true);
        svc.start().await.unwrap();

        let mut cfg = MonitorConfig::default();
        cfg.alerts.cooldown_secs = 30;
        svc.apply_config(cfg).await.unwrap();

        let starts = monitor.starts.lock().unwrap();
        assert_eq!(starts.len(), 2);
        assert_eq!(starts[1].alerts.cooldown_secs, 30);
    }

    #[tokio::test]
    async fn recent_alerts_clamps_and_defaults() {
        let monitor = Arc::new(FakeMonitor {
            alerts: (0..15).rev().map(|i| alert(i as f64 / 100.0)).collect(),
            ..Default::default()
        });
        let svc = service(monitor, true);

        assert_eq!(svc.recent_alerts(None).await.unwrap().len(), 10);
        assert_eq!(svc.recent_alerts(Some(100)).await.unwrap().len(), 15);
        let top = svc.recent_alerts(Some(2)).await.unwrap();
        assert_eq!(top[0].motion_level, 0.14);
        assert_eq!(top[1].motion_level, 0.13);
    }
}
