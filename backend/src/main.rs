mod config;
mod inference;
mod pipeline;
mod report;
mod routes;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use config::PipelineConfig;
use inference::registry::ClassifierRegistry;
use pipeline::orchestrator::Pipeline;
use report::narrative::{AzureOpenAiClient, NarrativeApi};
use report::service::ReportService;
use routes::configure_routes;
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let mut config = PipelineConfig::load_or_default();
    if let Ok(models_dir) = env::var("MODELS_DIR") {
        config.models_dir = models_dir;
    }
    log::info!(
        "Using models directory {} with decision threshold {}",
        config.models_dir,
        config.decision_threshold
    );

    let registry = Arc::new(ClassifierRegistry::new(
        config.models_dir.clone(),
        config.image_size,
    ));
    registry.preload();
    let pipeline = Pipeline::new(registry, &config);

    let narrative_timeout = Duration::from_millis(config.narrative_timeout_ms);
    let narrative = AzureOpenAiClient::from_env(narrative_timeout)
        .map(|client| Arc::new(client) as Arc<dyn NarrativeApi>);
    if narrative.is_none() {
        log::warn!(
            "Narrative service is not configured; reports will use deterministic templates."
        );
    }
    let report_service = ReportService::new(narrative);

    let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(pipeline.clone()))
            .app_data(web::Data::new(report_service.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
