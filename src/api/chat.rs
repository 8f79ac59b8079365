// =============================================================================
// Chat relay endpoint — Server-Sent Events
// =============================================================================
//
// The upstream call runs on its own task and feeds a bounded channel; the
// response stream drains that channel.  When the client disconnects the
// receiver is dropped and the task stops at its next send.
// =============================================================================

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::gemini::{ChatRequest, RelayEvent};

const RELAY_BUFFER: usize = 32;

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);

    if let Some(client) = state.chat.clone() {
        info!(messages = req.messages.len(), "chat relay started");
        tokio::spawn(async move {
            if let Err(e) = client.stream_chat(&req.messages, &tx).await {
                warn!(error = %e, "chat relay failed");
                let _ = tx
                    .send(RelayEvent::Error(format!("An error occurred: {e}")))
                    .await;
            }
        });
    } else {
        let _ = tx.try_send(RelayEvent::Error("Gemini API not configured.".to_string()));
    }

    let stream = ReceiverStream::new(rx)
        .map(|event| Ok(Event::default().data(event.to_json().to_string())));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
