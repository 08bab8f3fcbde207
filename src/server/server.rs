//! HTTP server core implementation

use crate::config::Config;
use crate::server::routes;
use crate::server::state::AppState;
use crate::utils::error::{FleetError, Result};
use actix_cors::Cors;
use actix_web::{App, HttpServer as ActixHttpServer, middleware::DefaultHeaders, web};
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;

/// HTTP server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with fully wired state
    pub async fn new(config: Config) -> Result<Self> {
        info!("Creating HTTP server");
        let state = AppState::build(config).await?;
        Ok(Self { state })
    }

    /// Application state, exposed for integration tests
    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn build_cors(state: &AppState) -> Cors {
        let cors_config = &state.config.server.cors;
        if !cors_config.enabled {
            return Cors::default();
        }

        let mut cors = Cors::default()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allow_any_header()
            .max_age(cors_config.max_age as usize);

        if cors_config.allows_all_origins() {
            warn!("CORS allows all origins");
            cors = cors.allow_any_origin();
        } else {
            for origin in &cors_config.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        cors
    }

    /// Start the HTTP server and the background loops
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.state.config.server.address();
        let workers = self.state.config.server.worker_count();
        let max_body = self.state.config.server.max_body_size;

        self.state.spawn_background_loops();

        let state = web::Data::new(self.state.clone());
        info!("Starting HTTP server on {}", bind_addr);

        let server = ActixHttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .app_data(web::JsonConfig::default().limit(max_body))
                .app_data(web::PayloadConfig::new(max_body))
                .wrap(Self::build_cors(&state))
                .wrap(TracingLogger::default())
                .wrap(DefaultHeaders::new().add(("Server", "fleetgate")))
                .configure(routes::health::configure_routes)
                .configure(routes::ai::configure_routes)
                .configure(routes::admin::configure_routes)
        })
        .workers(workers)
        .bind(&bind_addr)
        .map_err(|e| FleetError::config(format!("failed to bind {}: {}", bind_addr, e)))?
        .run();

        info!("HTTP server listening on {}", bind_addr);
        let result = server.await;

        // One final flush so buffered usage is not lost on shutdown.
        if let Err(e) = self.state.meter.drain().await {
            warn!("final usage flush failed: {}", e);
        }

        result.map_err(|e| FleetError::internal(format!("server error: {}", e)))?;
        info!("HTTP server stopped");
        Ok(())
    }
}
