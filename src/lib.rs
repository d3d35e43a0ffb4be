use std::sync::Arc;

use ai::{LlmProvider, LocationEnhancer};
use config::Config;
use game::GameService;
use jobs::JobService;
use store::GameStore;

pub mod ai;
pub mod client;
pub mod config;
pub mod error;
pub mod game;
pub mod geo;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod progress;
pub mod router;
pub mod routes;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: Arc<GameService>,
    pub enhancer: Arc<LocationEnhancer>,
    pub jobs: Arc<JobService>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn GameStore>, provider: Arc<dyn LlmProvider>) -> Self {
        let enhancer = Arc::new(LocationEnhancer::new(provider, config.region.clone()));
        let jobs = Arc::new(JobService::new(
            store.clone(),
            enhancer.clone(),
            config.job_settings(),
        ));
        Self {
            game: Arc::new(GameService::new(store)),
            config: Arc::new(config),
            enhancer,
            jobs,
        }
    }
}
