use axum::extract::ws::{WebSocketUpgrade, WebSocket, Message};
use axum::extract::State;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;
use crate::adapters::http::state::HttpState;
use crate::domain::stream::WsFrameMetaMessage;

pub async fn ws_handler(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

/// Por cada tick: un mensaje de texto con los metadatos y después el JPEG en binario.
async fn handle_socket(mut socket: WebSocket, st: HttpState) {
    let mut rx = match st.monitor.subscribe().await {
        Ok(r) => r,
        Err(_) => return,
    };

    loop {
        let (meta, jpeg) = match rx.recv().await {
            Ok(frame) => frame,
            // Cliente lento: se saltan los frames perdidos
            Err(RecvError::Lagged(skipped)) => {
                debug!("Cliente WebSocket retrasado, {} frames descartados", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let json = serde_json::to_string(&WsFrameMetaMessage { r#type: "frame".into(), meta }).unwrap_or_default();

        if socket.send(Message::Text(json.into())).await.is_err() { break; }
        if socket.send(Message::Binary(jpeg.into())).await.is_err() { break; }
    }
}
