use axum::{
    routing::{get, post},
    Router,
};
use duelground_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    // Notification delivery worker.
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.notifications.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "notification worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    // Simulated-opponent worker: plays due answers for bot duels.
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.bots.run_once(&state.answers).await {
                    Ok(true) => {
                        tokio::time::sleep(Duration::from_millis(250)).await;
                    }
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(750)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "bot worker error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });
    }

    // Expiry sweep: expires unstarted duels, settles overdue in-progress
    // ones, and drops abandoned matchmaking entries.
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = state
                    .duels
                    .sweep_expired(&state.scoring, &state.notifications)
                    .await
                {
                    tracing::error!(error = ?e, "expiry sweep error");
                }
                if let Err(e) = state.matchmaking.purge_abandoned().await {
                    tracing::error!(error = ?e, "matchmaking purge error");
                }
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let api = Router::new()
        .route("/api/matchmaking", post(routes::matchmaking::request_match))
        .route("/api/duels", post(routes::duel::create_challenge))
        .route("/api/duels/:id", get(routes::duel::get_duel))
        .route("/api/duels/:id/accept", post(routes::duel::accept_duel))
        .route("/api/duels/:id/decline", post(routes::duel::decline_duel))
        .route("/api/duels/:id/cancel", post(routes::duel::cancel_duel))
        .route(
            "/api/duels/:id/answers",
            get(routes::duel::get_answers).post(routes::duel::submit_answer),
        )
        .layer(axum::middleware::from_fn_with_state(
            duelground_backend::middleware::rate_limit::new_rps_state(config.public_rps),
            duelground_backend::middleware::rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
