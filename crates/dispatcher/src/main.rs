use std::sync::Arc;

use delay_common::config::AppConfig;
use delay_common::{db, redis_pool};
use delay_engine::clock::SystemClock;
use delay_engine::dispatcher::Dispatcher;
use delay_engine::method::PgNotificationMethodStore;
use delay_engine::processor::Pipeline;
use delay_engine::queue::RedisQueue;
use delay_engine::recency::CooldownWindow;
use delay_engine::subscription::PgSubscriptionStore;
use delay_notifier::FirebasePusher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "delay_dispatcher=info,delay_engine=info,delay_notifier=info".into()
            }),
        )
        .json()
        .init();

    tracing::info!("Delay notification dispatcher starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Attach to the event queue
    let redis = redis_pool::create_redis_pool(&config.redis_url).await?;
    let source = RedisQueue::connect(redis, config.queue_name.clone()).await?;

    let push = FirebasePusher::from_config(&config)?;

    let clock = Arc::new(SystemClock);
    let pipeline = Pipeline::new(
        Arc::new(PgSubscriptionStore::new(
            pool.clone(),
            clock.clone(),
            CooldownWindow::minutes(config.cooldown_minutes),
        )),
        Arc::new(PgNotificationMethodStore::new(pool)),
        Arc::new(push),
        clock,
    )
    .with_concurrency_limit(config.notification_limit());

    tracing::info!(
        queue = %config.queue_name,
        look_ahead = config.look_ahead,
        cooldown_minutes = config.cooldown_minutes,
        max_concurrent_notifications = config.max_concurrent_notifications,
        "Dispatcher configured"
    );

    let stats = Dispatcher::new(source, pipeline)
        .with_look_ahead(config.look_ahead)
        .run(shutdown_signal())
        .await;

    tracing::info!(
        received = stats.received,
        delays = stats.delays,
        cancellations = stats.cancellations,
        dropped = stats.dropped,
        ack_failures = stats.ack_failures,
        receive_errors = stats.receive_errors,
        "Delay notification dispatcher stopped."
    );
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Received shutdown signal, draining in-flight notifications...");
}
