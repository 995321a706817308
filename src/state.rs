use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::reference::{ReferenceLookup, StaticReference};
use crate::services::{
    AccountAdministrator, Authenticator, CityRegistry, SaltedHasher, SeaOrmAccountAdministrator,
    SeaOrmAuthenticator, SeaOrmCityRegistry, TokenService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub reference: Arc<dyn ReferenceLookup>,

    pub authenticator: Arc<dyn Authenticator>,

    pub tokens: TokenService,

    pub accounts: Arc<dyn AccountAdministrator>,

    pub cities: Arc<dyn CityRegistry>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let reference = Arc::new(StaticReference::load(
            config.reference.dataset_path.as_deref(),
        )?);
        Self::with_reference(config, reference).await
    }

    /// Builds the state around an already loaded reference dataset.
    pub async fn with_reference(
        config: Config,
        reference: Arc<dyn ReferenceLookup>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let hasher = SaltedHasher::new(&config.security)?;

        let authenticator = Arc::new(SeaOrmAuthenticator::new(store.clone(), hasher.clone())?)
            as Arc<dyn Authenticator + Send + Sync + 'static>;

        let tokens = TokenService::new(store.clone(), &config.security);

        let accounts = Arc::new(SeaOrmAccountAdministrator::new(store.clone(), hasher))
            as Arc<dyn AccountAdministrator + Send + Sync + 'static>;

        let cities = Arc::new(SeaOrmCityRegistry::new(store.clone(), reference.clone()))
            as Arc<dyn CityRegistry + Send + Sync + 'static>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            reference,
            authenticator,
            tokens,
            accounts,
            cities,
        })
    }
}
