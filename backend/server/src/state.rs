use std::sync::Arc;

use bank::Clock;
use tracing::info;

use super::{
    auth::SessionVerifier,
    config::Config,
    database::{CouponStore, init_store},
    error::AppResult,
    manager::CouponManager,
};

pub struct State {
    pub config: Config,
    pub verifier: SessionVerifier,
    pub manager: CouponManager,
}

impl State {
    pub async fn new() -> AppResult<Arc<Self>> {
        let config = Config::load()?;

        let clock = Arc::new(config.clock()?);

        info!("Using {:?} store", config.store);
        let store = init_store(&config, clock.current_month()).await?;

        Ok(Self::with_parts(config, store, clock).await)
    }

    pub async fn with_parts(
        config: Config,
        store: Arc<dyn CouponStore>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let verifier = SessionVerifier::new(&config.jwt_secret, config.jwt_audience.as_deref());
        let manager = CouponManager::new(store, clock).await;

        Arc::new(Self {
            config,
            verifier,
            manager,
        })
    }
}
