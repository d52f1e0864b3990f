use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Optional per-session override of the configured step budget
    #[serde(default)]
    pub max_steps: Option<u32>,
}

#[derive(Serialize)]
pub struct ChatErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct StopResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/chat").route(web::post().to(chat)))
        .service(web::resource("/api/chat/stop").route(web::post().to(stop_session)));
}

/// Start a session and stream its events back as NDJSON. The session id is
/// returned in the `X-Session-Id` header so the caller can fetch the ledger
/// mid-stream or cancel.
async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> impl Responder {
    let message = body.message.trim();
    if message.is_empty() {
        return HttpResponse::BadRequest().json(ChatErrorResponse {
            success: false,
            error: "No message provided".to_string(),
        });
    }

    let (session_id, rx) = state
        .orchestrator
        .clone()
        .start_session(message.to_string(), body.max_steps);

    let event_stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let mut line = serde_json::to_vec(&event).unwrap_or_default();
        line.push(b'\n');
        Some((Ok::<_, actix_web::Error>(web::Bytes::from(line)), rx))
    });

    HttpResponse::Ok()
        .content_type("application/x-ndjson")
        .insert_header(("X-Session-Id", session_id.to_string()))
        .streaming(event_stream)
}

async fn stop_session(state: web::Data<AppState>, body: web::Json<StopRequest>) -> impl Responder {
    if state.tracker.cancel(&body.session_id) {
        HttpResponse::Ok().json(StopResponse {
            success: true,
            error: None,
        })
    } else {
        HttpResponse::NotFound().json(StopResponse {
            success: false,
            error: Some(format!(
                "No running session with id {}",
                body.session_id
            )),
        })
    }
}
