// =============================================================================
// Central Application State
// =============================================================================
//
// Built once at start-up and shared with every handler via `Arc<AppState>`.
// Nothing in here is mutated after construction: each request fetches its
// own bars and computes its own indicators.
// =============================================================================

use tracing::{error, warn};

use crate::gemini::ChatClient;
use crate::market_data::YahooClient;
use crate::service_config::ServiceConfig;

pub struct AppState {
    pub config: ServiceConfig,
    pub market_data: YahooClient,
    /// `None` when the relay is not configured.
    pub chat: Option<ChatClient>,
}

impl AppState {
    /// Construct the HTTP clients from configuration.
    ///
    /// A chat client that fails to build disables the relay instead of
    /// aborting start-up; the market-data client is mandatory.
    pub fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        let market_data = YahooClient::new(&config.market_data)?;

        let chat = match ChatClient::from_config(&config.chat) {
            Ok(Some(client)) => Some(client),
            Ok(None) => {
                warn!("GEMINI_API_KEY not set, chat relay disabled");
                None
            }
            Err(e) => {
                error!(error = %e, "failed to initialise chat client, chat relay disabled");
                None
            }
        };

        Ok(Self {
            config,
            market_data,
            chat,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_is_disabled_without_key() {
        let state = AppState::new(ServiceConfig::default()).unwrap();
        assert!(state.chat.is_none());
    }

    #[test]
    fn invalid_key_disables_chat_instead_of_failing() {
        let mut config = ServiceConfig::default();
        config.chat.api_key = Some("bad\nkey".to_string());
        let state = AppState::new(config).unwrap();
        assert!(state.chat.is_none());
    }

    #[test]
    fn chat_is_enabled_with_key() {
        let mut config = ServiceConfig::default();
        config.chat.api_key = Some("key".to_string());
        assert!(AppState::new(config).unwrap().chat.is_some());
    }
}
