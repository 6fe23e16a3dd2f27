// region:    --- Imports
use bidsphere::config::Config;
use bidsphere::database::DatabaseManager;
use bidsphere::handlers;
use bidsphere::identity::{IdentityChange, IdentityProvider, LocalIdentityProvider};
use bidsphere::live::{relay_group_id, EventPublisher, KafkaEventPublisher, LiveFeed, LiveRelay};
use bidsphere::message_broker::KafkaManager;
use bidsphere::scheduler::AuctionScheduler;
use bidsphere::state::AppState;
use bidsphere::store::{AccountStore, InMemoryStore, PostgresStore, Store};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::load()?;

    // Store
    let (store, accounts): (Arc<dyn Store>, Arc<dyn AccountStore>) = match config.database_url() {
        Some(url) => {
            let db_manager =
                Arc::new(DatabaseManager::connect(url, config.database_max_connections).await?);
            if let Err(e) = db_manager.initialize_database(config.reset_database).await {
                error!("{:<12} --> database initialization failed: {:?}", "Main", e);
                return Err(e.into());
            }
            info!("{:<12} --> database ready", "Main");
            let postgres = Arc::new(PostgresStore::new(db_manager));
            (postgres.clone() as Arc<dyn Store>, postgres as Arc<dyn AccountStore>)
        }
        None => {
            warn!("{:<12} --> no DATABASE_URL, data lives in memory only", "Main");
            let memory = Arc::new(InMemoryStore::new());
            (memory.clone() as Arc<dyn Store>, memory as Arc<dyn AccountStore>)
        }
    };

    // Live updates
    let live = LiveFeed::default();
    let publisher: Arc<dyn EventPublisher> = match &config.kafka_brokers {
        Some(brokers) => {
            let kafka_manager = KafkaManager::new(brokers);
            if let Err(e) = kafka_manager.ensure_topic(&config.events_topic, 5, 1).await {
                error!("{:<12} --> Kafka initialization failed: {}", "Main", e);
                return Err(e.into());
            }

            let group_id = relay_group_id(&config.kafka_group_id);
            let consumer = kafka_manager.consumer(&group_id)?;
            let relay = LiveRelay::new(live.clone(), consumer, config.events_topic.clone());
            tokio::spawn(async move {
                relay.start().await;
            });
            info!("{:<12} --> live events relayed through Kafka as {}", "Main", group_id);
            let producer = kafka_manager.producer()?;
            Arc::new(KafkaEventPublisher::new(producer, config.events_topic.clone()))
        }
        None => Arc::new(live.clone()),
    };

    // Identity
    let identity = Arc::new(LocalIdentityProvider::with_accounts(&config.admin_emails, accounts));
    spawn_identity_log(identity.as_ref());

    // Closing sweep
    AuctionScheduler::new(
        Arc::clone(&store),
        Arc::clone(&publisher),
        config.scheduler_interval,
    )
    .start();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let listen_addr = config.listen_addr.clone();
    let state = AppState {
        store,
        identity,
        publisher,
        live,
        config: Arc::new(config),
    };
    let routes_all = handlers::routes(state).layer(cors);

    let listener = TcpListener::bind(&listen_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    if let Err(err) = axum::serve(listener, routes_all.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    info!("{:<12} --> shut down", "Main");
    Ok(())
}

// endregion: --- Main

fn spawn_identity_log(identity: &dyn IdentityProvider) {
    let mut changes = identity.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(IdentityChange::SignedUp(who)) => {
                    info!("{:<12} --> signed up: {}", "Identity", who.email)
                }
                Ok(IdentityChange::SignedIn(who)) => {
                    debug!("{:<12} --> signed in: {}", "Identity", who.email)
                }
                Ok(IdentityChange::SignedOut(who)) => {
                    debug!("{:<12} --> signed out: {}", "Identity", who.email)
                }
                Ok(IdentityChange::Removed(who)) => {
                    info!("{:<12} --> removed: {}", "Identity", who.email)
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{:<12} --> skipped {} identity changes", "Identity", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("{:<12} --> cannot listen for Ctrl+C: {}", "Main", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("{:<12} --> cannot listen for SIGTERM: {}", "Main", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("{:<12} --> received Ctrl+C", "Main"),
        _ = terminate => info!("{:<12} --> received terminate signal", "Main"),
    }
}
