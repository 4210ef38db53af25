pub const DEFAULT_DIRECT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_FALLBACK_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_FREE_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_USER_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_APP_REFERER: &str = "http://localhost:3000";
pub const DEFAULT_APP_TITLE: &str = "Blood Analysis AI";

/// Deployment settings for provider routing. Built once by the caller and
/// passed in; core logic never reads the environment itself.
#[derive(Clone)]
pub struct AnalysisConfig {
    pub direct_api_url: String,
    pub fallback_api_url: String,
    /// Shared pre-funded key. Left empty when unset; the provider rejects it.
    pub fallback_api_key: String,
    pub free_model: String,
    pub default_user_model: String,
    pub app_referer: String,
    pub app_title: String,
}

impl AnalysisConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Self {
            direct_api_url: get_or("OPENAI_API_URL", DEFAULT_DIRECT_API_URL),
            fallback_api_url: get_or("FALLBACK_API_URL", DEFAULT_FALLBACK_API_URL),
            fallback_api_key: get("OPENROUTER_API_KEY")
                .or_else(|| get("API_KEY"))
                .unwrap_or_default(),
            free_model: get_or("FREE_MODEL", DEFAULT_FREE_MODEL),
            default_user_model: get_or("DEFAULT_USER_MODEL", DEFAULT_USER_MODEL),
            app_referer: get_or("APP_REFERER", DEFAULT_APP_REFERER),
            app_title: get_or("APP_TITLE", DEFAULT_APP_TITLE),
        }
    }

    pub fn has_fallback_key(&self) -> bool {
        !self.fallback_api_key.is_empty()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl std::fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("direct_api_url", &self.direct_api_url)
            .field("fallback_api_url", &self.fallback_api_url)
            .field("fallback_api_key", &redact(&self.fallback_api_key))
            .field("free_model", &self.free_model)
            .field("default_user_model", &self.default_user_model)
            .field("app_referer", &self.app_referer)
            .field("app_title", &self.app_title)
            .finish()
    }
}

pub(crate) fn redact(key: &str) -> &'static str {
    if key.is_empty() { "<unset>" } else { "<redacted>" }
}
