use std::sync::Arc;
use crate::application::services::{CameraService, MonitorService};

/// Estado compartido para los manejadores HTTP de Axum.
/// Contiene los servicios de aplicación (casos de uso), no los adaptadores.
#[derive(Clone)]
pub struct HttpState {
    /// Inventario de cámaras y prueba de fuentes.
    pub camera: Arc<CameraService>,
    /// Configuración y ciclo de vida de la sesión de monitoreo.
    pub monitor: Arc<MonitorService>,
}
