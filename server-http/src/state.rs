use keeper::auth::{AuthService, CachedCredentialDirectory, IndexCredentialDirectory};
use keeper::domain::ReclamationPolicy;
use keeper::planes::control::ReclamationCoordinator;
use keeper::planes::data::CacheGateway;
use keeper::ports::{Clock, Stores, SystemClock};
use keeper::tracker::AccessTracker;
use shared::config::Config;
use std::sync::Arc;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<CacheGateway>,
    pub auth_service: Arc<AuthService>,
    pub coordinator: Arc<ReclamationCoordinator>,
}

impl AppState {
    pub fn new(stores: Stores, config: &Config) -> Self {
        Self::with_clock(stores, config, Arc::new(SystemClock))
    }

    pub fn with_clock(stores: Stores, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let tracker = AccessTracker::new(stores.index.clone());
        let gateway = Arc::new(CacheGateway::new(stores.blobs.clone(), tracker, clock));

        let directory = Arc::new(IndexCredentialDirectory::new(stores.index.clone()));
        let cached = Arc::new(CachedCredentialDirectory::new(
            directory,
            config.credential_cache_ttl,
        ));
        let auth_service = Arc::new(AuthService::new(cached));

        let policy = ReclamationPolicy::from(&config.reclamation);
        tracing::info!(
            "Reclamation policy: max idle {:?} ms, size budget {:?} byte(s), concurrency {}",
            policy.max_idle(),
            policy.size_budget(),
            policy.concurrency()
        );
        let coordinator = Arc::new(ReclamationCoordinator::new(
            stores.blobs,
            stores.index,
            policy,
        ));

        Self {
            gateway,
            auth_service,
            coordinator,
        }
    }
}
