use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File, FileFormat};
use tracing::{debug, warn};

use crate::cli::{ConfigArgs, EndpointArgs};

pub const DEFAULT_SECTION: &str = "DEFAULT";
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_MODEL: &str = "local-model";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

const ENV_PREFIX: &str = "LMS_EVAL";

/// Key/value sections loaded from an INI file, with `LMS_EVAL__<SECTION>__<KEY>`
/// environment overrides layered on top.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    sections: HashMap<String, HashMap<String, String>>,
    environment: String,
}

impl Settings {
    pub fn load(path: &Path, environment: &str) -> Result<Self> {
        if !path.exists() {
            bail!("configuration file not found: {}", path.display());
        }

        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("failed to load configuration: {}", path.display()))?;

        let raw = config
            .try_deserialize::<HashMap<String, HashMap<String, String>>>()
            .with_context(|| format!("failed to read configuration: {}", path.display()))?;

        let settings = Self::from_sections(raw, environment);

        if !settings.has_section(environment) {
            bail!(
                "configuration section '{}' not found in {}",
                environment,
                path.display()
            );
        }

        debug!(
            path = %path.display(),
            environment = %environment,
            sections = settings.sections.len(),
            "loaded configuration"
        );

        Ok(settings)
    }

    fn from_sections(raw: HashMap<String, HashMap<String, String>>, environment: &str) -> Self {
        let sections = raw
            .into_iter()
            .map(|(section, entries)| {
                let entries: HashMap<String, String> = entries
                    .into_iter()
                    .map(|(key, value)| (key.to_ascii_lowercase(), value))
                    .collect();
                (section.to_ascii_lowercase(), entries)
            })
            .collect();

        Self {
            sections,
            environment: environment.to_string(),
        }
    }

    #[cfg(test)]
    pub fn from_pairs(environment: &str, pairs: &[(&str, &str, &str)]) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (section, key, value) in pairs {
            sections
                .entry(section.to_ascii_lowercase())
                .or_default()
                .insert(key.to_ascii_lowercase(), value.to_string());
        }
        Self {
            sections,
            environment: environment.to_string(),
        }
    }

    fn has_section(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(DEFAULT_SECTION)
            || self.sections.contains_key(&name.to_ascii_lowercase())
    }

    /// Looks a key up in the selected section, then in `DEFAULT`.
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        [self.environment.as_str(), DEFAULT_SECTION]
            .iter()
            .filter_map(|section| self.sections.get(&section.to_ascii_lowercase()))
            .find_map(|entries| entries.get(&key))
            .map(String::as_str)
    }

    fn get_or(&self, key: &str, fallback: &str) -> String {
        self.get(key).unwrap_or(fallback).to_string()
    }

    pub fn model(&self) -> String {
        self.get_or("MODEL", "Model")
    }

    pub fn prompt(&self) -> String {
        self.get_or("PROMPT", "Prompt")
    }

    pub fn model_path(&self) -> String {
        self.get_or("MODEL_PATH", "Model_Path").replace('\\', "/")
    }

    pub fn base_url(&self) -> String {
        self.get_or("BASE_URL", DEFAULT_BASE_URL)
    }

    pub fn request_model(&self) -> String {
        self.get_or("REQUEST_MODEL", DEFAULT_REQUEST_MODEL)
    }

    pub fn temperature(&self) -> Result<f64> {
        match self.get("TEMPERATURE") {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .with_context(|| format!("invalid TEMPERATURE value: {raw}")),
            None => Ok(DEFAULT_TEMPERATURE),
        }
    }
}

/// Endpoint parameters after applying command-line overrides to the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub base_url: String,
    pub request_model: String,
    pub temperature: f64,
    pub timeout_secs: Option<u64>,
}

impl Endpoint {
    pub fn resolve(settings: &Settings, args: &EndpointArgs) -> Result<Self> {
        let temperature = match args.temperature {
            Some(value) => value,
            None => settings.temperature()?,
        };

        Ok(Self {
            base_url: args.base_url.clone().unwrap_or_else(|| settings.base_url()),
            request_model: args
                .request_model
                .clone()
                .unwrap_or_else(|| settings.request_model()),
            temperature,
            timeout_secs: args.timeout_secs,
        })
    }
}

/// Loads settings, tolerating a missing file: every key then takes its literal fallback.
pub fn load_optional(args: &ConfigArgs) -> Result<Settings> {
    if args.config.exists() {
        return Settings::load(&args.config, &args.environment);
    }

    warn!(path = %args.config.display(), "configuration file missing, using defaults");
    Ok(Settings {
        sections: HashMap::new(),
        environment: args.environment.clone(),
    })
}
