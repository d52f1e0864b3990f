//! Actix-Web WebSocket handler for the event gateway.
//!
//! Clients receive every broadcast `GatewayEvent` as JSON text frames,
//! starting with a replay of the recent-event ring buffer. The only inbound
//! method is "ping".

use crate::gateway::events::EventBroadcaster;
use crate::gateway::protocol::{RpcRequest, RpcResponse};
use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::AggregatedMessage;
use futures_util::StreamExt;
use std::sync::Arc;

use crate::AppState;

/// WebSocket handler for Actix-Web
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;

    let broadcaster = state.broadcaster.clone();
    actix_web::rt::spawn(handle_ws_connection(session, msg_stream, broadcaster));

    Ok(response)
}

async fn handle_ws_connection(
    mut session: actix_ws::Session,
    msg_stream: actix_ws::MessageStream,
    broadcaster: Arc<EventBroadcaster>,
) {
    log::info!("New gateway WebSocket connection");

    let mut msg_stream = msg_stream
        .aggregate_continuations()
        .max_continuation_size(64 * 1024);

    let (client_id, mut event_rx) = broadcaster.subscribe();
    log::info!(
        "Gateway client {} subscribed to events (total: {} clients)",
        client_id,
        broadcaster.client_count()
    );

    // Replay recent events so a late observer sees in-flight sessions
    for event in broadcaster.get_recent_events() {
        if let Ok(json) = serde_json::to_string(&event) {
            if session.text(json).await.is_err() {
                broadcaster.unsubscribe(&client_id);
                return;
            }
        }
    }

    loop {
        tokio::select! {
            // Forward broadcast events
            event = event_rx.recv() => {
                match event {
                    Some(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if session.text(json).await.is_err() {
                                break;
                            }
                        }
                    }
                    None => break,
                }
            }
            // Process inbound messages
            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(AggregatedMessage::Text(text))) => {
                        let response = match serde_json::from_str::<RpcRequest>(&text) {
                            Ok(request) if request.method == "ping" => {
                                RpcResponse::success(request.id, serde_json::json!("pong"))
                            }
                            Ok(request) => RpcResponse::error(
                                request.id,
                                format!("Unknown method '{}'", request.method),
                            ),
                            Err(_) => RpcResponse::error(String::new(), "Parse error"),
                        };
                        if let Ok(json) = serde_json::to_string(&response) {
                            if session.text(json).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(AggregatedMessage::Ping(data))) => {
                        if session.pong(&data).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(AggregatedMessage::Close(_))) | None => break,
                    Some(Err(e)) => {
                        log::error!("WebSocket error: {:?}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    broadcaster.unsubscribe(&client_id);
    let _ = session.close(None).await;
    log::info!("Gateway client {} disconnected", client_id);
}
