//! Settings resolution and model client construction, shared by startup and `/reload`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use edo_talker::config::{resolve_settings_path, AppConfig, CoreConfig, Settings};
use edo_talker::llm::{ModelClient, OpenAiCompatClient, OpenAiCompatOptions};
use edo_talker::log_debug;

/// Everything needed to rebuild settings the same way startup did.
#[derive(Debug, Clone)]
pub(crate) struct SettingsSource {
    cli: AppConfig,
    path: Option<PathBuf>,
}

impl SettingsSource {
    pub(crate) fn new(cli: &AppConfig) -> Self {
        Self {
            cli: cli.clone(),
            path: resolve_settings_path(cli.config.as_deref()),
        }
    }

    /// File values with CLI overrides layered on top.
    pub(crate) fn load(&self) -> Settings {
        let mut settings = Settings::load_or_default(self.path.as_deref());
        settings.apply_cli(&self.cli);
        settings
    }

    /// A fresh config snapshot and client, as `/reload` hands to the session.
    pub(crate) fn reload(&self) -> (Arc<CoreConfig>, Option<Arc<dyn ModelClient>>) {
        let settings = self.load();
        let config = Arc::new(CoreConfig::from_settings(&settings));
        (config, build_client(&settings))
    }
}

/// Build the HTTP client when the model is enabled. A construction failure
/// leaves the session without a client, so turns end as unavailable.
pub(crate) fn build_client(settings: &Settings) -> Option<Arc<dyn ModelClient>> {
    if !settings.llm.enabled {
        return None;
    }
    let llm = &settings.llm;
    let api_key = Some(llm.api_key.trim().to_string()).filter(|key| !key.is_empty());
    let options = OpenAiCompatOptions {
        base_url: llm.base_url.clone(),
        api_key,
        model: llm.model.clone(),
        temperature: llm.temperature,
        max_tokens: llm.max_tokens,
        request_timeout: Duration::from_millis(llm.request_timeout_ms.max(1)),
    };
    match OpenAiCompatClient::new(options) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            log_debug(&format!("model client unavailable: {err:#}"));
            tracing::warn!(error = %format!("{err:#}"), "model client construction failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_model_builds_no_client() {
        let settings = Settings::default();
        assert!(!settings.llm.enabled);
        assert!(build_client(&settings).is_none());
    }

    #[test]
    fn enabled_model_builds_client() {
        let mut settings = Settings::default();
        settings.llm.enabled = true;
        assert!(build_client(&settings).is_some());
    }

    #[test]
    fn cli_overrides_apply_on_every_load() {
        let dir = std::env::temp_dir().join(format!("edo-talker-runtime-{}", std::process::id()));
        let cli = AppConfig {
            config: Some(dir.join("missing.toml")),
            no_llm: true,
            chat_mode: true,
            ..AppConfig::default()
        };
        let source = SettingsSource::new(&cli);
        let settings = source.load();
        assert!(!settings.llm.enabled);
        assert!(settings.talk.chat_mode);
        let (config, client) = source.reload();
        assert!(!config.model_enabled);
        assert!(client.is_none());
    }
}
