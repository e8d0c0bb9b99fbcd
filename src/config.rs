use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Runtime settings: defaults, then `wikipeople.toml` if present, then
/// `WIKIPEOPLE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub local_api: String,
    pub shared_api: String,
    pub kb_api: String,
    pub label_language: String,
    pub user_agent: String,
    pub db_path: String,
    pub csv_dir: String,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

pub fn load() -> Result<Settings> {
    let config = builder()?
        .add_source(File::with_name("wikipeople").required(false))
        .add_source(Environment::with_prefix("WIKIPEOPLE"))
        .build()
        .context("Failed to load configuration")?;
    config
        .try_deserialize()
        .context("Invalid configuration")
}

fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(Config::builder()
        .set_default("local_api", "https://en.wikipedia.org/w/api.php")?
        .set_default("shared_api", "https://commons.wikimedia.org/w/api.php")?
        .set_default("kb_api", "https://www.wikidata.org/w/api.php")?
        .set_default("label_language", "en")?
        .set_default(
            "user_agent",
            concat!("wikipeople/", env!("CARGO_PKG_VERSION")),
        )?
        .set_default("db_path", "data/people.sqlite")?
        .set_default("csv_dir", "csvs")?
        .set_default("max_retries", 3)?
        .set_default("backoff_ms", 2000)?)
}
