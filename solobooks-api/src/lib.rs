pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::{
    routing::{get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use solobooks_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::Config;
use middleware::auth::JwtService;
use middleware::{auth_middleware, metrics::metrics_middleware};
use services::database::Database;
use services::metrics::init_metrics;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: JwtService,
    pub config: Config,
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        init_metrics();

        let db = Database::new(
            config.database.url.expose_secret(),
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let jwt = JwtService::new(&config.auth.jwt_secret);

        let state = AppState {
            db,
            jwt,
            config: config.clone(),
        };

        let protected = Router::new()
            .route(
                "/client",
                post(handlers::clients::create_client).get(handlers::clients::list_clients),
            )
            .route(
                "/client/:id",
                get(handlers::clients::get_client)
                    .put(handlers::clients::update_client)
                    .delete(handlers::clients::delete_client),
            )
            .route(
                "/project",
                post(handlers::projects::create_project).get(handlers::projects::list_projects),
            )
            .route(
                "/project/:id",
                get(handlers::projects::get_project)
                    .put(handlers::projects::update_project)
                    .delete(handlers::projects::delete_project),
            )
            .route(
                "/timelog",
                post(handlers::time_logs::create_time_log).get(handlers::time_logs::list_time_logs),
            )
            .route("/timelog/unbilled", get(handlers::time_logs::get_unbilled))
            .route(
                "/timelog/:id",
                get(handlers::time_logs::get_time_log)
                    .put(handlers::time_logs::update_time_log)
                    .delete(handlers::time_logs::delete_time_log),
            )
            .route(
                "/invoice",
                post(handlers::invoices::create_invoice).get(handlers::invoices::list_invoices),
            )
            .route(
                "/invoice/from-timelogs",
                post(handlers::invoices::generate_invoice),
            )
            .route(
                "/invoice/:id",
                get(handlers::invoices::get_invoice).delete(handlers::invoices::delete_invoice),
            )
            .route("/invoice/:id/paid", put(handlers::invoices::mark_paid))
            .route(
                "/expense",
                post(handlers::expenses::create_expense).get(handlers::expenses::list_expenses),
            )
            .route(
                "/expense/:id",
                put(handlers::expenses::update_expense)
                    .delete(handlers::expenses::delete_expense),
            )
            .route("/report/summary", get(handlers::reports::summary))
            .layer(from_fn_with_state(state.clone(), auth_middleware));

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            .merge(protected)
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        // Port 0 binds a random port, used by integration tests.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        tracing::info!("solobooks-api listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
