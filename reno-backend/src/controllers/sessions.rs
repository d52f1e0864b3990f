use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use uuid::Uuid;

use crate::session::LedgerEntry;
use crate::AppState;

#[derive(Serialize)]
pub struct SessionStatusResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub request: String,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<crate::session::TerminalState>,
    pub started_at: String,
    pub ledger_entries: usize,
}

#[derive(Serialize)]
pub struct LedgerResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Serialize)]
pub struct NotFoundResponse {
    pub success: bool,
    pub error: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/sessions/{id}").route(web::get().to(session_status)))
        .service(web::resource("/api/sessions/{id}/ledger").route(web::get().to(session_ledger)));
}

fn not_found(id: Uuid) -> HttpResponse {
    HttpResponse::NotFound().json(NotFoundResponse {
        success: false,
        error: format!("Unknown session {}", id),
    })
}

async fn session_status(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    match state.tracker.get(&id) {
        Some(session) => HttpResponse::Ok().json(SessionStatusResponse {
            success: true,
            session_id: id,
            request: session.request.clone(),
            running: session.is_running(),
            terminal: session.terminal(),
            started_at: session.started_at.to_rfc3339(),
            ledger_entries: session.ledger.len(),
        }),
        None => not_found(id),
    }
}

/// The flat ordered audit trail, readable at any time, including while the
/// session is still streaming.
async fn session_ledger(state: web::Data<AppState>, path: web::Path<Uuid>) -> impl Responder {
    let id = path.into_inner();
    match state.tracker.get(&id) {
        Some(session) => HttpResponse::Ok().json(LedgerResponse {
            success: true,
            session_id: id,
            entries: session.ledger.snapshot(),
        }),
        None => not_found(id),
    }
}
