/// Marketplace Order Backend
///
/// Entry point for the order subsystem of the grocery marketplace: cart
/// checkout into per-vendor orders, inventory adjustments, and role-gated
/// order lifecycle management over a REST API.
///
/// # Architecture
///
/// - Repository layer for data access (`repository`)
/// - Service layer for the transaction boundary and business rules (`service`)
/// - API layer for HTTP endpoints (`server`)
/// - Metrics for monitoring
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{error, info};

use app_config::AppConfig;
use repository::{
    PgAddressesRepository, PgCartRepository, PgInventoryRepository, PgOrderItemsRepository,
    PgOrdersRepository,
};
use server::Server;
use service::{OrderServiceImpl, PricingPolicy};
use tokio_postgres::{Client, NoTls};

/// Opens one dedicated client connection and drives it on a background
/// task. Needed per repository because `tokio_postgres::Client` is not
/// `Clone`.
async fn connect(dsn: &str, label: &'static str) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(dsn, NoTls)
        .await
        .with_context(|| format!("Failed to connect to database for {label} repository"))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("{} connection error: {}", label, e);
        }
    });
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Marketplace order backend starting...");

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize database (pool + migrations)
    let db_pool = db::init_db_pool(&config)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized successfully");

    let dsn = db::dsn(&config);

    // Initialize repositories, each on its own connection
    let orders_repo = PgOrdersRepository::new(connect(&dsn, "orders").await?);
    let items_repo = PgOrderItemsRepository::new(connect(&dsn, "order items").await?);
    let cart_repo = PgCartRepository::new(connect(&dsn, "cart").await?);
    let addresses_repo = PgAddressesRepository::new(connect(&dsn, "addresses").await?);
    let inventory_repo = PgInventoryRepository::new();

    let pricing = PricingPolicy {
        tax_rate_bps: config.tax_rate_bps,
        delivery_fee: config.delivery_fee_cents,
    };

    // Initialize order service
    let order_service = Arc::new(OrderServiceImpl::new(
        db_pool.clone(),
        orders_repo,
        items_repo,
        cart_repo,
        addresses_repo,
        inventory_repo,
        pricing,
    ));

    // Start HTTP server
    let mut tasks = JoinSet::new();
    let http_server = Server::new(config.http_port, order_service, config.shutdown_timeout);
    tasks.spawn(async move {
        if let Err(err) = http_server.start().await {
            error!("HTTP server error: {}", err);
            std::process::exit(1);
        }
    });

    // Wait for all tasks to complete
    while let Some(res) = tasks.join_next().await {
        if let Err(err) = res {
            error!("Task error: {}", err);
        }
    }

    info!("Application stopped");
    Ok(())
}
