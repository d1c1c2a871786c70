use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const ENV_PREFIX: &str = "SCRAPER";
const CONFIG_FILE: &str = "scraper";

const DEFAULT_INSTRUCTIONS: &str = "Résume l'offre d'emploi suivante en quelques phrases claires : \
intitulé du poste, entreprise, lieu, missions principales, profil recherché et date limite \
de candidature si elle est indiquée. Réponds en français, sans inventer d'information.";

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub port: u16,
    #[serde(default)]
    pub database_path: String,
    #[serde(default)]
    pub api_key: String,
    pub listings_url: String,
    pub base_url: String,
    pub summarizer_endpoint: String,
    pub summarizer_model: String,
    pub summarizer_instructions: String,
    pub request_timeout_secs: u64,
}

/// Command-line values; these win over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub database_path: Option<String>,
    pub port: Option<u16>,
}

impl Settings {
    /// Load from `scraper.{toml,yaml,json}` (optional) then `SCRAPER_*` env vars.
    pub fn load(overrides: Overrides) -> Result<Self, ConfigError> {
        Self::build(None, overrides)
    }

    fn build(
        env: Option<HashMap<String, String>>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let conf = Config::builder()
            .set_default("port", 5000)?
            .set_default("listings_url", "https://www.mediacongo.net/emplois/")?
            .set_default("base_url", "https://www.mediacongo.net/")?
            .set_default(
                "summarizer_endpoint",
                "https://openrouter.ai/api/v1/chat/completions",
            )?
            .set_default(
                "summarizer_model",
                "mistralai/mistral-small-24b-instruct-2501:free",
            )?
            .set_default("summarizer_instructions", DEFAULT_INSTRUCTIONS)?
            .set_default("request_timeout_secs", 30)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).source(env))
            .set_override_option("database_path", overrides.database_path)?
            .set_override_option("port", overrides.port.map(i64::from))?
            .build()?;

        let settings: Settings = conf.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::Message(format!(
                "{}_DATABASE_PATH must be set",
                ENV_PREFIX
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Message(format!(
                "{}_API_KEY must be set",
                ENV_PREFIX
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
