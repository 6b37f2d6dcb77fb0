mod classifier;
mod config;
mod error;
mod handler;
mod normalize;
mod routes;
mod upload;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use classifier::Classifier;
use config::AppConfig;
use handler::ClassifyHandler;
use normalize::ResultNormalizer;
use routes::configure_routes;
use std::env;
use std::sync::Arc;
use upload::{ScratchFileManager, UploadValidator};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let scratch = ScratchFileManager::new(&config.upload.dir);
    scratch.ensure_dir().map_err(|e| {
        log::error!("{}", e);
        std::io::Error::other(e.to_string())
    })?;
    log::info!("Upload directory: {}", scratch.dir().display());

    let classifier = load_classifier(&config)?;

    let handler = web::Data::new(ClassifyHandler::new(
        UploadValidator::new(&config.upload),
        scratch,
        classifier,
        ResultNormalizer::new(config.model.model_info()),
    ));

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let cors_origins = config.server.cors_origins.clone();
    log::info!("Starting Forest Fire Classifier on {}", bind_address);

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(handler.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}

#[cfg(feature = "torch")]
fn load_classifier(config: &AppConfig) -> std::io::Result<Arc<dyn Classifier>> {
    match classifier::torch::TorchClassifier::load(&config.model) {
        Ok(model) => {
            log::info!("Successfully loaded {} model", config.model.architecture);
            Ok(Arc::new(model))
        }
        Err(e) => {
            log::error!("Failed to preload model at startup: {}", e);
            Err(std::io::Error::other(format!("Model loading failed: {}", e)))
        }
    }
}

#[cfg(not(feature = "torch"))]
fn load_classifier(config: &AppConfig) -> std::io::Result<Arc<dyn Classifier>> {
    log::error!(
        "No classifier backend compiled in; rebuild with `--features torch` to serve {}",
        config.model.path.display()
    );
    Err(std::io::Error::other("classifier backend unavailable"))
}
