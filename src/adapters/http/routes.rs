use axum::{extract::{Query, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use crate::adapters::http::state::HttpState;
use crate::application::dto::{
    AlertView, AlertsQuery, AlertsResponse, CameraSummary, CameraTestResponse, ErrorResponse, OkResponse,
};
use crate::domain::config::{CameraConfig, MonitorConfig};
use crate::domain::errors::DomainError;
use crate::domain::stream::MonitorSnapshot;

/// `DomainError` convertido en respuesta JSON con el código HTTP adecuado.
pub struct ApiError(DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DomainError::OperationFailed(_)
            | DomainError::DetectionFailed(_)
            | DomainError::FrameUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn get_config(State(st): State<HttpState>) -> ApiResult<MonitorConfig> {
    Ok(Json(st.monitor.config()?))
}

pub async fn apply_config(State(st): State<HttpState>, Json(req): Json<MonitorConfig>) -> ApiResult<OkResponse> {
    st.monitor.apply_config(req).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn list_cameras(State(st): State<HttpState>) -> ApiResult<Vec<CameraSummary>> {
    let cameras = st.camera.list_cameras().await?;
    Ok(Json(cameras.into_iter().map(CameraSummary::from).collect()))
}

/// Sin cuerpo se prueba la cámara de la configuración actual.
pub async fn test_camera(
    State(st): State<HttpState>,
    req: Option<Json<CameraConfig>>,
) -> ApiResult<CameraTestResponse> {
    let camera = match req {
        Some(Json(camera)) => camera,
        None => st.monitor.config()?.camera,
    };
    let source = camera.source.describe();
    let resolution = st.camera.test_camera(camera).await?;
    Ok(Json(CameraTestResponse { ok: true, source, resolution }))
}

pub async fn start_monitor(State(st): State<HttpState>) -> ApiResult<OkResponse> {
    st.monitor.start().await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn stop_monitor(State(st): State<HttpState>) -> ApiResult<OkResponse> {
    st.monitor.stop().await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn status(State(st): State<HttpState>) -> ApiResult<MonitorSnapshot> {
    Ok(Json(st.monitor.status().await?))
}

pub async fn recent_alerts(State(st): State<HttpState>, Query(query): Query<AlertsQuery>) -> ApiResult<AlertsResponse> {
    let alerts = st.monitor.recent_alerts(query.count).await?;
    Ok(Json(AlertsResponse { alerts: alerts.into_iter().map(AlertView::from).collect() }))
}
