// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rollcall_app::{CascadeMode, ViewKind};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_LOG_LEVEL: &str = "info";
const API_KEY_ENV: &str = "ROLLCALL_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            remote: Remote::default(),
            storage: Storage::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

/// PostgREST endpoint. Leaving `base_url` unset selects the local store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Remote {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
    pub cascade: Option<String>,
    pub cascade_function: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub start_view: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            start_view: Some("dashboard".to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ROLLCALL_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ROLLCALL_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(rollcall_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version; add `version = 1` and put values under [remote], [storage], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            rollcall_db::validate_db_path(db_path)?;
        }

        if let Some(timeout) = &self.remote.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "remote.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(cascade) = &self.remote.cascade
            && CascadeMode::parse(cascade).is_none()
        {
            bail!(
                "remote.cascade in {} must be \"atomic\" or \"sequential\", got {:?}",
                path.display(),
                cascade
            );
        }

        if let Some(name) = &self.remote.cascade_function
            && !is_identifier(name)
        {
            bail!(
                "remote.cascade_function in {} must be a plain function name, got {:?}",
                path.display(),
                name
            );
        }

        if let Some(view) = &self.ui.start_view
            && ViewKind::parse(view).is_none()
        {
            bail!(
                "ui.start_view in {} must be one of dashboard, records, help; got {:?}",
                path.display(),
                view
            );
        }

        Ok(())
    }

    pub fn remote_base_url(&self) -> Option<&str> {
        self.remote
            .base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
    }

    /// `ROLLCALL_API_KEY` wins over the file so keys can stay out of it.
    pub fn api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.remote.api_key.clone())
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.remote.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn cascade_mode(&self) -> CascadeMode {
        self.remote
            .cascade
            .as_deref()
            .and_then(CascadeMode::parse)
            .unwrap_or_default()
    }

    pub fn cascade_function(&self) -> &str {
        self.remote
            .cascade_function
            .as_deref()
            .unwrap_or(rollcall_rest::DEFAULT_CASCADE_FUNCTION)
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => rollcall_db::default_db_path(),
        }
    }

    pub fn start_view(&self) -> ViewKind {
        self.ui
            .start_view
            .as_deref()
            .and_then(ViewKind::parse)
            .unwrap_or(ViewKind::Dashboard)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let state_root = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow!("cannot resolve log directory; set [log].file"))?;
        Ok(state_root
            .join(rollcall_db::APP_NAME)
            .join(format!("{}.log", rollcall_db::APP_NAME)))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# rollcall config\n# Place this file at: {}\n\nversion = 1\n\n[remote]\n# Optional. Leave unset to use the local SQLite store.\n# base_url = \"https://your-project.supabase.co\"\n# api_key = \"...\"  # or set {}\ntimeout = \"{}\"\n# atomic: one store-side call; sequential: transactions, then participant\ncascade = \"atomic\"\ncascade_function = \"{}\"\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/rollcall/rollcall.db)\n# db_path = \"/absolute/path/to/rollcall.db\"\n\n[ui]\nstart_view = \"dashboard\"\n\n[log]\nlevel = \"{}\"\n# file = \"/absolute/path/to/rollcall.log\"\n",
            path.display(),
            API_KEY_ENV,
            DEFAULT_TIMEOUT,
            rollcall_rest::DEFAULT_CASCADE_FUNCTION,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}
