mod domain;
mod application;
mod adapters;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use crate::application::services::{CameraService, MonitorService};
use crate::adapters::{
    audio::piper::PiperAnnouncer,
    http::{router, state::HttpState},
    onnx::{model_catalog::OnnxModelCatalog, yolo_engine::OnnxDetectorFactory},
    pipeline::PipelineAdapter,
    sources::CameraSourceFactory,
    v4l2::camera_repo::V4l2CameraCatalog,
};
use crate::domain::config::AppConfig;

const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Carga la configuración del fichero indicado por `CCTV_CONFIG`.
/// Si el fichero no existe se usan los valores por defecto.
fn load_config() -> anyhow::Result<AppConfig> {
    let path = std::env::var("CCTV_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if !Path::new(&path).exists() {
        tracing::info!("⚙️ {} no existe, usando configuración por defecto", path);
        return Ok(AppConfig::default());
    }

    let raw = std::fs::read_to_string(&path).with_context(|| format!("leyendo {path}"))?;
    let config = AppConfig::from_json(&raw).with_context(|| format!("configuración inválida en {path}"))?;
    tracing::info!("⚙️ Configuración cargada desde {}", path);
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Inicializar logs (RUST_LOG=info por defecto)
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = load_config()?;

    tracing::info!("🔧 Inicializando adaptadores de infraestructura...");

    // 2. Adaptadores
    let camera_cat = Arc::new(V4l2CameraCatalog::new());
    let model_cat = Arc::new(OnnxModelCatalog::new());
    let sources = Arc::new(CameraSourceFactory::new(tokio::runtime::Handle::current()));
    let detectors = Arc::new(OnnxDetectorFactory::new());
    let announcer = Arc::new(PiperAnnouncer::default());
    let pipeline_adapter = Arc::new(PipelineAdapter::new(sources.clone(), detectors, announcer));

    // 3. Servicios (casos de uso)
    let camera_service = Arc::new(CameraService::new(camera_cat, sources));
    let monitor_service = Arc::new(MonitorService::new(pipeline_adapter, model_cat, config.monitor));

    let state = HttpState {
        camera: camera_service,
        monitor: monitor_service,
    };

    // 4. Router y archivos estáticos
    let app = router(state)
        .fallback_service(ServeDir::new(&config.server.static_dir));

    // 5. Servidor
    let addr = format!("0.0.0.0:{}", config.server.port);

    tracing::info!("🚀 Monitor CCTV iniciado en http://{}", addr);
    tracing::info!("📂 Archivos estáticos servidos desde '{}'", config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
