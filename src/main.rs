mod classifier;
mod config;
mod errors;
mod handlers;
mod models;

use std::env;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use crate::classifier::{SpamClassifier, TextClassifier};
use crate::config::Settings;

/// Permissive CORS unless an allow-list is configured.
fn cors_for(allowed_origins: &[String]) -> Cors {
    if allowed_origins.is_empty() {
        return Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();
    }
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "debug");
    }
    pretty_env_logger::init();

    let settings = Settings::from_env();
    log::debug!(
        "Settings: bind={}, model={}, tokenizer={}, architecture={}, max_seq_len={}, allowed_origins={:?}",
        settings.bind_addr,
        settings.model_path.display(),
        settings.tokenizer_path.display(),
        settings.model_config_path.display(),
        settings.max_seq_len,
        settings.allowed_origins
    );

    let classifier = match SpamClassifier::load(&settings) {
        Ok(classifier) => classifier,
        Err(err) => {
            log::error!("Startup aborted: {}", err);
            std::process::exit(1);
        }
    };
    let classifier: Arc<dyn TextClassifier> = Arc::new(classifier);
    let classifier = web::Data::from(classifier);

    log::info!("Server running at http://{}", settings.bind_addr);

    let bind_addr = settings.bind_addr.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors_for(&settings.allowed_origins))
            .app_data(classifier.clone())
            .app_data(web::JsonConfig::default().error_handler(handlers::json_error_handler))
            .service(web::resource("/predict").route(web::post().to(handlers::predict)))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
