#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::Arc;

    use cart_reservations::{
        AppConfig, MemoryReservationStore, ReservationRepository, ReservationService, http_api,
        logging,
    };

    let config = AppConfig::load()?;
    logging::init(config.log_format, config.verbose);
    let addr = config.socket_addr()?;

    let repository: Arc<dyn ReservationRepository> = match &config.database_path {
        #[cfg(feature = "sqlite")]
        Some(path) => {
            tracing::info!(path = %path.display(), "using SQLite reservation store");
            Arc::new(cart_reservations::SqliteReservationStore::new(path)?)
        }
        #[cfg(not(feature = "sqlite"))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "built without `sqlite`, falling back to memory"
            );
            Arc::new(MemoryReservationStore::new())
        }
        None => {
            tracing::info!("using in-memory reservation store");
            Arc::new(MemoryReservationStore::new())
        }
    };

    let service = ReservationService::new(repository, config.clock())
        .with_calendar(config.school_calendar())
        .with_horizon_days(config.horizon_days);

    if config.admin_emails.is_empty() {
        tracing::warn!("no admin_emails configured, admin views are open to every caller");
    }
    let state = http_api::AppState::new(service).with_admins(&config.admin_emails);

    println!("cart-reservations HTTP API listening on http://{addr}");
    http_api::serve(addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
