//! Startup configuration for the edit client.
//!
//! Built once when the process starts and handed to the client explicitly.
//! A missing credential is a startup failure, never a runtime one.

use crate::client::GeminiModel;
use crate::error::{EditError, Result};

/// Default Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked for the API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GOOGLE_API_KEY"];

/// Overrides the model (`gemini-2.5-flash-image`, `nano-banana-pro-preview`).
pub const MODEL_VAR: &str = "GENEDIT_MODEL";

/// Overrides the API base URL.
pub const BASE_URL_VAR: &str = "GENEDIT_BASE_URL";

/// Configuration for [`GeminiEditClient`](crate::client::GeminiEditClient).
#[derive(Clone)]
pub struct EditConfig {
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl EditConfig {
    /// Creates a configuration with the given key and default settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EditError::Config("API key must not be empty".into()));
        }
        Ok(Self {
            api_key,
            model: GeminiModel::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = API_KEY_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .find(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                EditError::Config(format!(
                    "{} environment variable is not set",
                    API_KEY_VARS.join(" or ")
                ))
            })?;

        let mut config = Self::new(api_key)?;
        if let Some(model) = lookup(MODEL_VAR) {
            let model = GeminiModel::from_id(&model)
                .ok_or_else(|| EditError::Config(format!("unknown model: {model}")))?;
            config = config.with_model(model);
        }
        if let Some(base_url) = lookup(BASE_URL_VAR) {
            config = config.with_base_url(base_url);
        }
        Ok(config)
    }

    /// Sets the Gemini model variant.
    pub fn with_model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the API base URL (trailing slashes are dropped).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Model variant.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    /// API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for EditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}
