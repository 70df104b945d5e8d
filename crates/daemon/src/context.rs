//! Application context - dependency injection container

use std::sync::Arc;

use calrecon_common::SystemClock;
use calrecon_core::{CycleRunner, EnginePorts, ReconciliationEngine};
use calrecon_domain::{Config, Result};
use calrecon_infra::{
    CycleScheduler, CycleSchedulerConfig, DbManager, GoogleCalendarService, HttpFeedSource,
    SqliteEventStore, SqliteSuppressionList,
};
use tracing::{info, warn};

/// Everything a running daemon holds on to
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub engine: Arc<ReconciliationEngine>,
    pub scheduler: CycleScheduler,
}

impl AppContext {
    /// Open and migrate the database, build every adapter and the engine.
    /// The scheduler is returned stopped.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;
        db.health_check()?;
        info!(path = %db.path().display(), "database ready");

        if config.calendar.access_token.is_none() {
            warn!("no calendar access token configured; remote calls will be rejected");
        }

        let ports = EnginePorts {
            store: Arc::new(SqliteEventStore::new(db.pool())),
            suppressions: Arc::new(SqliteSuppressionList::new(db.pool())),
            feed: Arc::new(HttpFeedSource::new(&config.feed)?),
            calendar: Arc::new(GoogleCalendarService::new(&config.calendar)?),
        };
        let engine =
            Arc::new(ReconciliationEngine::new(config.clone(), ports, Arc::new(SystemClock)));

        let runner: Arc<dyn CycleRunner> = engine.clone();
        let scheduler = CycleScheduler::new(runner, CycleSchedulerConfig::from_config(&config));

        info!(
            queries = config.feed.queries.len(),
            locations = config.target_locations().len(),
            "application context initialized"
        );
        Ok(Self { config, db, engine, scheduler })
    }
}
