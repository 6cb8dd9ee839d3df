use async_trait::async_trait;
use std::path::Path;

use crate::application::ports::ModelCatalogPort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::model::ModelId;

/// Comprueba en disco el modelo YOLO antes de arrancar una sesión.
pub struct OnnxModelCatalog;

impl OnnxModelCatalog {
    pub fn new() -> Self { Self }
}

#[async_trait]
impl ModelCatalogPort for OnnxModelCatalog {
    async fn validate_model(&self, model: &ModelId) -> DomainResult<()> {
        let path = Path::new(model.onnx_path.trim());
        if model.onnx_path.trim().is_empty() {
            return Err(DomainError::InvalidInput("model_path vacío".into()));
        }
        if path.extension().and_then(|e| e.to_str()) != Some("onnx") {
            return Err(DomainError::InvalidInput(format!("el modelo debe ser .onnx: {}", model.onnx_path)));
        }
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(DomainError::NotFound(format!("modelo no encontrado: {}", model.onnx_path)));
        }
        Ok(())
    }
}
