use patchbay::config::Config;
use patchbay::domain::call::{CallReceiver, CallStorage};
use patchbay::domain::channel::Line;
use patchbay::domain::current_call::{
    new_calls_per_line, CurrentCallFormatter, CurrentCallManager, CurrentCallNotifier,
};
use patchbay::domain::directory::{Directory, InMemoryDirectory, UserLine};
use patchbay::domain::extension::Extension;
use patchbay::domain::signaling::SignalingClient;
use patchbay::infrastructure::ami::AmiClient;
use patchbay::interface::metrics::init_metrics;
use patchbay::interface::router::build_router;
use patchbay::interface::ws::WsState;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting Patchbay CTI server");

    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;
    info!("Configuration loaded: {:?}", config.server);

    // Initialize metrics exporter
    let prometheus_handle = init_metrics();

    // Endpoint status store, with status changes logged on transition
    let mut storage = CallStorage::new();
    storage.set_status_callback(Box::new(|extension, status| {
        info!(extension = %extension, status = %status.as_str(), "endpoint status changed");
    }));
    let storage = Arc::new(storage);

    // Directory tables from configuration
    let mut directory = InMemoryDirectory::new(storage.clone());
    for user in &config.directory.users {
        directory.add_user(
            user.user_id,
            UserLine {
                identity: user.line.clone(),
                number: user.number.clone(),
                context: user.context.clone(),
                caller_id: user.caller_id.clone(),
            },
        );
    }
    for line in &config.directory.lines {
        directory.add_line(
            Line::new(&line.line),
            Extension::new(&line.number, &line.context, true),
        );
    }
    for queue in &config.directory.queues {
        directory.add_queue(&queue.name, &queue.number, &queue.context);
    }
    let directory: Arc<dyn Directory> = Arc::new(directory);

    // AMI transport
    let (ami_client, mut events) =
        AmiClient::connect(&config.ami_addr(), &config.ami.username, &config.ami.secret)
            .await?;
    let signaling: Arc<dyn SignalingClient> = Arc::new(ami_client);
    info!("AMI connected to {}", config.ami_addr());

    // Call-state core, wired by explicit constructor injection
    let calls_per_line = new_calls_per_line();
    let notifier = Arc::new(CurrentCallNotifier::new(CurrentCallFormatter::new(
        calls_per_line.clone(),
    )));
    let manager = Arc::new(CurrentCallManager::new(
        calls_per_line,
        notifier.clone(),
        signaling,
        directory.clone(),
        storage.clone(),
    ));
    let receiver = CallReceiver::new(storage, manager.clone(), directory);

    // Single consumer task owns all event-driven mutations
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            receiver.handle(event).await;
        }
        info!("AMI event stream ended");
    });

    // Client-facing WebSocket/HTTP interface
    let app = build_router(WsState { manager, notifier }, prometheus_handle);
    let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
    info!("CTI interface listening on {}", config.server_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
