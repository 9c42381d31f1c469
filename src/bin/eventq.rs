//! eventq CLI: operator interface to the event queue.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use eventq::api;
use eventq::config::Config;
use eventq::db::{self, Db};
use eventq::engine::{EventService, ServiceConfig, WorkerConfig, WorkerPool};
use eventq::model::EventId;
use eventq::store::{EventStore, MemoryStore};
use eventq::telemetry::{Role, TelemetryConfig, TelemetryGuard, init_telemetry};
use eventq::words::Dictionary;
use secrecy::ExposeSecret;
use tracing::info;

#[derive(Parser)]
#[command(name = "eventq", about = "Event queue with exclusive claiming and sync waits")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Worker loops to run inside the API process
        #[arg(long, default_value_t = 0)]
        workers: usize,
        /// Keep events in process memory instead of Postgres
        #[arg(long)]
        in_memory: bool,
    },
    /// Run worker loops until interrupted
    Worker {
        /// Number of concurrent worker loops
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
    /// Event operations
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
}

#[derive(Subcommand)]
enum EventAction {
    /// Create a new event
    Create {
        /// Wait for a worker to complete it
        #[arg(long)]
        sync: bool,
    },
    /// Show an event
    Show {
        /// Event ID
        id: EventId,
    },
    /// Print the number of events
    Count,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { workers, in_memory } => cmd_serve(workers, in_memory).await,
        Command::Worker { concurrency } => cmd_worker(concurrency).await,
        Command::Event { action } => {
            let config = Config::from_env()?;
            let _guard = telemetry(&config, Role::Cli, 0)?;
            let db = connect(&config, 0).await?;
            let service = EventService::new(Arc::new(db), ServiceConfig::default());

            match action {
                EventAction::Create { sync } => cmd_event_create(&service, sync).await,
                EventAction::Show { id } => cmd_event_show(&service, id).await,
                EventAction::Count => {
                    println!("{}", service.count().await?);
                    Ok(())
                }
            }
        }
    }
}

fn telemetry(config: &Config, role: Role, workers: usize) -> anyhow::Result<TelemetryGuard> {
    Ok(init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        log_level: config.log_level.clone(),
        role,
        workers,
    })?)
}

/// Connect with a pool large enough for `claimants` worker loops.
async fn connect(config: &Config, claimants: usize) -> anyhow::Result<Db> {
    let max_connections = db::pool_size(claimants, config.db_max_connections)?;
    let db = Db::connect_with_retry(
        config.require_database_url()?.expose_secret(),
        max_connections,
        config.connect_attempts,
        config.connect_backoff,
    )
    .await?;
    db.migrate().await?;
    Ok(db)
}

async fn cmd_serve(workers: usize, in_memory: bool) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = telemetry(&config, Role::Api, workers)?;

    // Load the word list before anything starts serving.
    let dictionary = if workers > 0 {
        Some(Arc::new(Dictionary::load(&config.words_path)?))
    } else {
        None
    };

    let store: Arc<dyn EventStore> = if in_memory {
        info!("using in-memory event store");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(connect(&config, workers).await?)
    };

    let pool = dictionary.map(|dictionary| {
        WorkerPool::spawn(workers, Arc::clone(&store), dictionary, WorkerConfig::default())
    });

    let service = EventService::new(store, ServiceConfig::default());
    api::serve(&config.bind_addr, service, async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;

    if let Some(pool) = pool {
        pool.shutdown();
        pool.join().await?;
    }
    Ok(())
}

async fn cmd_worker(concurrency: usize) -> anyhow::Result<()> {
    let concurrency = concurrency.max(1);
    let config = Config::from_env()?;
    let _guard = telemetry(&config, Role::Worker, concurrency)?;

    let dictionary = Arc::new(Dictionary::load(&config.words_path)?);
    let db = connect(&config, concurrency).await?;

    let pool = WorkerPool::spawn(
        concurrency,
        Arc::new(db),
        dictionary,
        WorkerConfig::default(),
    );

    tokio::signal::ctrl_c().await.ok();
    info!("interrupted, stopping workers");
    pool.shutdown();
    pool.join().await?;
    Ok(())
}

async fn cmd_event_create(service: &EventService, sync: bool) -> anyhow::Result<()> {
    let event = if sync {
        service.create_sync().await?
    } else {
        service.create_async().await?
    };
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

async fn cmd_event_show(service: &EventService, id: EventId) -> anyhow::Result<()> {
    let Some(event) = service.get_by_id(id).await? else {
        anyhow::bail!("no event with id {id}");
    };

    println!("ID:         {}", event.id);
    println!("State:      {}", event.state());
    println!("Value:      {}", event.value.as_deref().unwrap_or("-"));
    println!("Created:    {}", event.created_at);
    if let Some(completed) = event.completed_at {
        println!("Completed:  {completed}");
    }
    Ok(())
}
