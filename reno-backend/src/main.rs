use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mod agents;
mod ai;
mod config;
mod controllers;
mod datasets;
mod gateway;
mod http;
mod router;
mod session;
mod tools;

use ai::{Inference, MockModel, QwenClient};
use config::Config;
use datasets::ReferenceData;
use gateway::EventBroadcaster;
use session::{Orchestrator, SessionConfig, SessionTracker};

pub struct AppState {
    pub config: Config,
    pub orchestrator: Arc<Orchestrator>,
    pub tracker: Arc<SessionTracker>,
    pub broadcaster: Arc<EventBroadcaster>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let port = config.port;

    log::info!("Loading reference data from {}", config.data_dir);
    let data = Arc::new(ReferenceData::load(Path::new(&config.data_dir)));

    log::info!("Initializing tool registry");
    let registry = Arc::new(tools::builtin::create_default_registry());
    log::info!("Registered {} tools", registry.len());

    let agent_set = Arc::new(agents::create_default_agents());
    log::info!("Configured {} capability agents", agent_set.len());

    // Without an API key the scripted model keeps the whole pipeline
    // drivable end to end
    let model: Arc<dyn Inference> = match config.qwen_api_key.as_deref() {
        Some(api_key) => {
            let client = QwenClient::new(
                api_key,
                config.qwen_endpoint.as_deref(),
                config.qwen_model.as_deref(),
            )
            .expect("Failed to create Qwen client");
            log::info!("Using Qwen inference capability");
            Arc::new(client)
        }
        None => {
            log::warn!("QWEN_API_KEY not set, using the scripted mock model");
            Arc::new(MockModel)
        }
    };

    let broadcaster = Arc::new(EventBroadcaster::new());
    let tracker = Arc::new(SessionTracker::new());

    let session_config = SessionConfig {
        max_steps: config.max_session_steps,
        tool_timeout: Duration::from_secs(config.tool_timeout_secs),
    };

    let orchestrator = Arc::new(
        Orchestrator::new(
            model,
            agent_set,
            registry,
            data,
            broadcaster.clone(),
            tracker.clone(),
            session_config,
        )
        .expect("Failed to initialize orchestrator"),
    );

    log::info!("Starting reno-backend server on port {}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                config: config.clone(),
                orchestrator: Arc::clone(&orchestrator),
                tracker: Arc::clone(&tracker),
                broadcaster: Arc::clone(&broadcaster),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::chat::config)
            .configure(controllers::sessions::config)
            .service(web::resource("/ws").route(web::get().to(gateway::ws::ws_handler)))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
