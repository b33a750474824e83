//! WebBridge binary entry point

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webbridge::service::{AuthService, Bridge};
use webbridge::telegram::BotApiClient;
use webbridge::{config, AppState};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Load configuration from file and environment
/// 3. Initialize AppState and bot client
/// 4. Start the update polling loop
/// 5. Start the HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("WEBBRIDGE__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "webbridge=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "webbridge=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting WebBridge...");

    // 2. Initialize metrics
    webbridge::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        domain = %config.server.domain,
        protocol = %config.server.protocol,
        "Configuration loaded"
    );

    // 4. Bot client and application state
    let bot = Arc::new(BotApiClient::new(
        &config.bot.api_base,
        &config.bot.token,
        Duration::from_secs(config.bot.poll_timeout_seconds),
    )?);

    let me = bot.get_me().await?;
    tracing::info!(
        bot_id = me.id,
        bot_username = me.username.as_deref().unwrap_or(""),
        "Bot authenticated"
    );

    let state = AppState::new(config.clone(), bot.clone()).await?;

    let auth = Arc::new(AuthService::new(state.db.clone(), state.chat.clone()));
    let bridge = Arc::new(Bridge::new(
        state.config.clone(),
        auth,
        state.registry.clone(),
        state.chat.clone(),
        state.resolver.clone(),
    ));

    // 5. Start the update polling loop
    spawn_polling_loop(bot, bridge);

    // 6. Build Axum router and start the HTTP server
    let app = webbridge::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Public URL: {}", config.server.base_url());

    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn the long-poll update loop.
///
/// Each update is handled in its own task so one slow handler never
/// stalls the poll. Poll failures back off briefly and retry; the loop
/// itself never exits.
fn spawn_polling_loop(bot: Arc<BotApiClient>, bridge: Arc<Bridge>) {
    tokio::spawn(async move {
        let mut offset: i64 = 0;

        loop {
            let updates = match bot.get_updates(offset).await {
                Ok(updates) => updates,
                Err(error) => {
                    tracing::error!(%error, "Update poll failed; retrying");
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);

                let bridge = bridge.clone();
                tokio::spawn(async move {
                    let update_id = update.update_id;
                    if let Err(error) = bridge.handle_update(update).await {
                        tracing::error!(%error, update_id, "Update handling failed");
                    }
                });
            }
        }
    });

    tracing::info!("Update polling loop spawned");
}
