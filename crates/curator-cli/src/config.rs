//! Environment and file configuration assembly.
//!
//! Secrets and paths come from the environment; collection sources and
//! prompt templates come from TOML files read once per run. Validation is
//! fatal and happens before any I/O: a missing LLM key or a half-configured
//! social credential set aborts the process.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use curator_core::{PromptConfig, UrlsConfig};

const SOCIAL_KEYS: [&str; 5] = [
    "SOCIAL_API_KEY",
    "SOCIAL_API_SECRET",
    "SOCIAL_ACCESS_TOKEN",
    "SOCIAL_ACCESS_TOKEN_SECRET",
    "SOCIAL_BEARER_TOKEN",
];

#[derive(Debug, Clone)]
pub struct SocialCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    pub bearer_token: String,
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub llm_api_key: String,
    pub database_path: PathBuf,
    pub output_dir: PathBuf,
    pub social: Option<SocialCredentials>,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

pub fn database_path_from_env() -> PathBuf {
    var("DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/curator.db"))
}

pub fn output_dir_from_env() -> PathBuf {
    var("OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("public/data"))
}

impl EnvConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let llm_api_key = var("LLM_API_KEY").context("LLM_API_KEY is required")?;
        let values: Vec<Option<String>> = SOCIAL_KEYS.iter().map(|k| var(k)).collect();
        let social = social_from_values(values)?;

        Ok(Self {
            llm_api_key,
            database_path: database_path_from_env(),
            output_dir: output_dir_from_env(),
            social,
        })
    }
}

/// The social credential set is all-or-none: posting works with the full
/// set, is cleanly disabled with none, and a partial set is a config bug.
fn social_from_values(values: Vec<Option<String>>) -> anyhow::Result<Option<SocialCredentials>> {
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    if values.iter().any(Option::is_none) {
        let missing: Vec<&str> = SOCIAL_KEYS
            .iter()
            .zip(&values)
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        anyhow::bail!(
            "social credentials are all-or-none; missing: {}",
            missing.join(", ")
        );
    }

    let [api_key, api_secret, access_token, access_token_secret, bearer_token]: [String; 5] =
        values
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| anyhow::anyhow!("social credential set has the wrong shape"))?;

    Ok(Some(SocialCredentials {
        api_key,
        api_secret,
        access_token,
        access_token_secret,
        bearer_token,
    }))
}

pub fn load_urls_config(config_dir: &Path) -> anyhow::Result<UrlsConfig> {
    let path = config_dir.join("urls.toml");
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn load_prompt_config(config_dir: &Path) -> anyhow::Result<PromptConfig> {
    let path = config_dir.join("prompts.toml");
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
