//! Builds the live provider set from configuration.
//!
//! Backend selection is by name only — no runtime type inspection. An
//! unknown name in the config is an error at build time; an enabled cloud
//! backend whose API key is missing is skipped with a warning, and agents
//! bound to it surface the failure at request time.

use crate::anthropic::AnthropicProvider;
use crate::gemini::GeminiProvider;
use crate::ollama::OllamaProvider;
use pixelprompt_config::{AppConfig, ProviderConfig};
use pixelprompt_core::error::Error;
use pixelprompt_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Instantiate every enabled, startable provider, keyed by config name.
pub fn build_providers(config: &AppConfig) -> Result<HashMap<String, Arc<dyn Provider>>, Error> {
    let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();

    for (name, provider_config) in config.enabled_providers() {
        match build_one(name, provider_config)? {
            Some(provider) => {
                info!(provider = name, "Registered provider");
                providers.insert(name.to_string(), provider);
            }
            None => {
                warn!(provider = name, "Skipping provider");
            }
        }
    }

    if providers.is_empty() {
        warn!("No providers available; agents will report errors on every request");
    }

    Ok(providers)
}

fn build_one(name: &str, config: &ProviderConfig) -> Result<Option<Arc<dyn Provider>>, Error> {
    match name {
        "ollama" => {
            let base_url = config
                .base_url
                .clone()
                .unwrap_or_else(|| crate::ollama::DEFAULT_BASE_URL.to_string());
            Ok(Some(Arc::new(OllamaProvider::new(
                base_url,
                config.timeout_secs,
            ))))
        }
        "anthropic" => {
            let Some(api_key) = require_key(name, config) else {
                return Ok(None);
            };
            let mut provider = AnthropicProvider::new(api_key);
            if let Some(ref base_url) = config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Some(Arc::new(provider)))
        }
        "gemini" => {
            let Some(api_key) = require_key(name, config) else {
                return Ok(None);
            };
            let mut provider = GeminiProvider::new(api_key);
            if let Some(ref base_url) = config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Some(Arc::new(provider)))
        }
        other => Err(Error::Config {
            message: format!("unknown provider '{other}' in config"),
        }),
    }
}

fn require_key(name: &str, config: &ProviderConfig) -> Option<String> {
    let key = AppConfig::resolve_api_key(config);
    if key.is_none() {
        warn!(
            provider = name,
            env = config.api_key_env.as_deref().unwrap_or("<unset>"),
            "API key not found in environment"
        );
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_config(enabled: bool) -> ProviderConfig {
        ProviderConfig {
            enabled,
            base_url: None,
            api_key_env: None,
            default_model: None,
            timeout_secs: 30,
        }
    }

    #[test]
    fn builds_ollama_without_credentials() {
        let mut config = AppConfig::default();
        config.providers.clear();
        config
            .providers
            .insert("ollama".into(), provider_config(true));

        let providers = build_providers(&config).unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers["ollama"].name(), "Ollama");
    }

    #[test]
    fn disabled_providers_are_not_built() {
        let mut config = AppConfig::default();
        config.providers.clear();
        config
            .providers
            .insert("ollama".into(), provider_config(false));

        assert!(build_providers(&config).unwrap().is_empty());
    }

    #[test]
    fn cloud_provider_without_key_is_skipped() {
        let mut config = AppConfig::default();
        config.providers.clear();
        let mut anthropic = provider_config(true);
        anthropic.api_key_env = Some("PIXELPROMPT_TEST_MISSING_KEY".into());
        config.providers.insert("anthropic".into(), anthropic);

        assert!(build_providers(&config).unwrap().is_empty());
    }

    #[test]
    fn unknown_provider_name_is_an_error() {
        let mut config = AppConfig::default();
        config.providers.clear();
        config
            .providers
            .insert("mystery".into(), provider_config(true));

        let err = build_providers(&config).unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn disabled_unknown_provider_is_ignored() {
        let mut config = AppConfig::default();
        config.providers.clear();
        config
            .providers
            .insert("mystery".into(), provider_config(false));

        assert!(build_providers(&config).unwrap().is_empty());
    }

    #[test]
    fn cloud_provider_with_key_is_built() {
        unsafe { std::env::set_var("PIXELPROMPT_TEST_GEMINI_KEY", "test-key") };

        let mut config = AppConfig::default();
        config.providers.clear();
        let mut gemini = provider_config(true);
        gemini.api_key_env = Some("PIXELPROMPT_TEST_GEMINI_KEY".into());
        config.providers.insert("gemini".into(), gemini);

        let providers = build_providers(&config).unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers["gemini"].name(), "Google Gemini");
    }
}
