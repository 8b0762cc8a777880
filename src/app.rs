use crate::errors::ToolError;
use crate::managers::calendar::{
    CalendarApi, ListCalendarEvents, ListCalendars, RetrieveFreeBusy, RetrieveTimezone,
};
use crate::managers::graphql::{GraphqlApi, MutationQuery, ReadonlyQuery, SchemaDocs};
use crate::managers::tasks::TaskManager;
use crate::managers::team::TeamOverview;
use crate::managers::weather::WeatherLookup;
use crate::services::config::{Config, ToolGroup};
use crate::services::credentials::{CredentialStore, FileCredentialStore, TokenSource};
use crate::services::dispatcher::{Dispatcher, ToolHandler};
use crate::services::logger::Logger;
use crate::services::upstream::{HttpUpstream, Upstream};
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub config: Arc<Config>,
    pub store: Arc<dyn CredentialStore>,
    pub dispatcher: Dispatcher,
}

impl App {
    /// Production wiring: environment config, encrypted credential file, reqwest client.
    pub fn from_env() -> Result<Self, ToolError> {
        let logger = Logger::new("relay");
        let config = Arc::new(Config::from_env()?);
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::open(config.credentials_path.clone())?);
        let upstream: Arc<dyn Upstream> = Arc::new(HttpUpstream::new(logger.clone(), config.timeout)?);
        Self::initialize(logger, config, store, upstream)
    }

    pub fn initialize(
        logger: Logger,
        config: Arc<Config>,
        store: Arc<dyn CredentialStore>,
        upstream: Arc<dyn Upstream>,
    ) -> Result<Self, ToolError> {
        config.validate()?;
        let handlers = build_handlers(&logger, &config, &store, &upstream)?;
        let dispatcher = Dispatcher::new(logger.clone(), handlers)?;
        logger.info(
            "tools registered",
            Some(&serde_json::json!({
                "templates": config.templates,
                "tools": dispatcher.registry().names(),
            })),
        );
        Ok(Self {
            logger,
            config,
            store,
            dispatcher,
        })
    }
}

fn token_for(store: &Arc<dyn CredentialStore>, group: ToolGroup) -> Result<TokenSource, ToolError> {
    TokenSource::for_group(store.clone(), group).ok_or_else(|| {
        ToolError::internal(format!("Template '{}' has no credential binding", group))
    })
}

fn build_handlers(
    logger: &Logger,
    config: &Arc<Config>,
    store: &Arc<dyn CredentialStore>,
    upstream: &Arc<dyn Upstream>,
) -> Result<Vec<Arc<dyn ToolHandler>>, ToolError> {
    let mut handlers: Vec<Arc<dyn ToolHandler>> = Vec::new();
    for group in config.templates.iter().copied() {
        match group {
            ToolGroup::Tasks => {
                let token = token_for(store, group)?;
                handlers.push(Arc::new(TaskManager::new(
                    config.clone(),
                    upstream.clone(),
                    token.clone(),
                )));
                handlers.push(Arc::new(TeamOverview::new(
                    config.clone(),
                    upstream.clone(),
                    token,
                    logger.clone(),
                )));
            }
            ToolGroup::Weather => {
                handlers.push(Arc::new(WeatherLookup::new(config.clone(), upstream.clone())));
            }
            ToolGroup::Calendar => {
                let api = CalendarApi::new(config.clone(), upstream.clone(), token_for(store, group)?);
                handlers.push(Arc::new(ListCalendars::new(api.clone())));
                handlers.push(Arc::new(ListCalendarEvents::new(api.clone())));
                handlers.push(Arc::new(RetrieveTimezone::new(api.clone())));
                handlers.push(Arc::new(RetrieveFreeBusy::new(api)));
            }
            ToolGroup::Graphql => {
                let api = GraphqlApi::new(config.clone(), upstream.clone(), token_for(store, group)?);
                handlers.push(Arc::new(ReadonlyQuery::new(api.clone())));
                handlers.push(Arc::new(MutationQuery::new(api.clone())));
                handlers.push(Arc::new(SchemaDocs::new(api)));
            }
        }
    }
    Ok(handlers)
}
