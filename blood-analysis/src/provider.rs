//! Decides which chat-completion endpoint, credential and model serve a request.

use tracing::debug;

use crate::config::{AnalysisConfig, redact};

const OPENAI_KEY_PREFIX: &str = "sk-";
// OpenRouter keys share OpenAI's prefix.
const AGGREGATOR_KEY_PREFIX: &str = "sk-or-";

/// Credential and model the user saved locally. Loaded by the caller and
/// passed in per request.
#[derive(Clone, Default)]
pub struct UserPreferences {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl UserPreferences {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Self {
        Self { api_key, model }
    }
}

impl std::fmt::Debug for UserPreferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPreferences")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderRoute {
    /// User's own OpenAI key against the OpenAI endpoint.
    Direct,
    /// Shared key against the aggregator endpoint, free-tier model.
    Fallback,
}

/// Headers aggregator endpoints require to attribute traffic to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub referer: String,
    pub title: String,
}

/// Routing decision for one request. Recomputed every time, never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderChoice {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub route: ProviderRoute,
    pub attribution: Option<Attribution>,
}

impl ProviderChoice {
    pub fn uses_personal_key(&self) -> bool {
        self.route == ProviderRoute::Direct
    }
}

impl std::fmt::Debug for ProviderChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChoice")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("route", &self.route)
            .field("attribution", &self.attribution)
            .finish()
    }
}

/// True for keys minted by OpenAI itself: `sk-` but not `sk-or-`.
pub fn is_personal_openai_key(credential: &str) -> bool {
    credential.starts_with(OPENAI_KEY_PREFIX) && !credential.starts_with(AGGREGATOR_KEY_PREFIX)
}

/// Pick the endpoint for a request. Does not check that the fallback key is
/// set; an empty key fails at the provider with 401.
pub fn select_provider(config: &AnalysisConfig, preferences: &UserPreferences) -> ProviderChoice {
    let personal_key = preferences
        .api_key
        .as_deref()
        .filter(|key| is_personal_openai_key(key));

    let choice = match personal_key {
        Some(key) => ProviderChoice {
            api_url: config.direct_api_url.clone(),
            api_key: key.to_string(),
            model: preferences
                .model
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(config.default_user_model.as_str())
                .to_string(),
            route: ProviderRoute::Direct,
            attribution: None,
        },
        None => ProviderChoice {
            api_url: config.fallback_api_url.clone(),
            api_key: config.fallback_api_key.clone(),
            model: config.free_model.clone(),
            route: ProviderRoute::Fallback,
            attribution: Some(Attribution {
                referer: config.app_referer.clone(),
                title: config.app_title.clone(),
            }),
        },
    };

    debug!(route = ?choice.route, model = %choice.model, "Selected provider");
    choice
}
