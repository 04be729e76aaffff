use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::rest::auth::CurrentUser;
use crate::state::AppState;

pub async fn ws_handler(
    CurrentUser(user): CurrentUser,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!(user_id = %user.id, "log feed subscription");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.log_events_tx.subscribe();
    state.metrics.log_subscribers.inc();

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            let entry = match rx.recv().await {
                Ok(entry) => entry,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging, skipped log entries");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&entry) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize log entry for ws");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    first_to_finish(send_task, recv_task).await;

    state.metrics.log_subscribers.dec();
    info!("websocket client disconnected");
}

/// Waits for either half of the socket to end and aborts the other, so a
/// closed client drops its broadcast receiver right away.
async fn first_to_finish(mut send_task: JoinHandle<()>, mut recv_task: JoinHandle<()>) {
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast;

    use super::*;

    #[tokio::test]
    async fn disconnect_drops_the_subscription() {
        let (tx, mut rx) = broadcast::channel::<u32>(4);
        let send_task = tokio::spawn(async move {
            while rx.recv().await.is_ok() {}
        });
        let recv_task = tokio::spawn(async {});
        assert_eq!(tx.receiver_count(), 1);

        first_to_finish(send_task, recv_task).await;
        for _ in 0..10 {
            if tx.receiver_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(tx.receiver_count(), 0);
    }
}
