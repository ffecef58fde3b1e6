// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use gridsync_core::{
    ControllerConfig, DEFAULT_ID_FIELD, FieldLabels, PAGE_SIZES, SaveContext, SortDirection,
    SortOrder,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "gridsync";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_RESOURCE: &str = "orders";
const DEFAULT_GRID_KEY: &str = "orders";
const DEFAULT_TIMEOUT: &str = "5s";
const DEFAULT_BLANK_ROW_DELAY: &str = "100ms";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub grid: Grid,
    #[serde(default)]
    pub storage: Storage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            grid: Grid::default(),
            storage: Storage::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub resource: Option<String>,
    pub id_field: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            resource: Some(DEFAULT_RESOURCE.to_owned()),
            id_field: Some(DEFAULT_ID_FIELD.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Grid {
    pub key: Option<String>,
    pub page_size: Option<u32>,
    /// Entries look like `name:asc` or `due:desc`.
    pub default_sort: Option<Vec<String>>,
    pub row_navigation: Option<bool>,
    pub blank_row_delay: Option<String>,
    pub first_editable_column: Option<String>,
    pub label_prefix: Option<String>,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            key: Some(DEFAULT_GRID_KEY.to_owned()),
            page_size: Some(gridsync_core::DEFAULT_PAGE_SIZE),
            default_sort: Some(Vec::new()),
            row_navigation: Some(false),
            blank_row_delay: Some(DEFAULT_BLANK_ROW_DELAY.to_owned()),
            first_editable_column: None,
            label_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub view_state_path: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("GRIDSYNC_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set GRIDSYNC_CONFIG_PATH to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
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
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [grid], and [storage]",
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
        if let Some(base_url) = &self.api.base_url
            && base_url.trim().is_empty()
        {
            bail!("api.base_url in {} must not be empty", path.display());
        }

        if let Some(resource) = &self.api.resource
            && resource.trim().trim_matches('/').is_empty()
        {
            bail!("api.resource in {} must not be empty", path.display());
        }

        if let Some(id_field) = &self.api.id_field
            && id_field.trim().is_empty()
        {
            bail!("api.id_field in {} must not be empty", path.display());
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(key) = &self.grid.key
            && key.trim().is_empty()
        {
            bail!("grid.key in {} must not be empty", path.display());
        }

        if let Some(size) = self.grid.page_size
            && !PAGE_SIZES.contains(&size)
        {
            bail!(
                "grid.page_size in {} must be one of {:?}, got {}",
                path.display(),
                PAGE_SIZES,
                size
            );
        }

        if let Some(delay) = &self.grid.blank_row_delay {
            parse_duration(delay)
                .with_context(|| format!("grid.blank_row_delay in {}", path.display()))?;
        }

        for entry in self.grid.default_sort.iter().flatten() {
            parse_sort(entry)
                .with_context(|| format!("grid.default_sort in {}", path.display()))?;
        }

        if let Some(view_state_path) = &self.storage.view_state_path
            && view_state_path.trim().is_empty()
        {
            bail!(
                "storage.view_state_path in {} must not be empty; remove it to use the default",
                path.display()
            );
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.api.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn resource(&self) -> &str {
        self.api.resource.as_deref().unwrap_or(DEFAULT_RESOURCE)
    }

    pub fn id_field(&self) -> &str {
        self.api.id_field.as_deref().unwrap_or(DEFAULT_ID_FIELD)
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn grid_key(&self) -> &str {
        self.grid.key.as_deref().unwrap_or(DEFAULT_GRID_KEY)
    }

    pub fn default_sort(&self) -> Result<Vec<SortOrder>> {
        self.grid
            .default_sort
            .iter()
            .flatten()
            .map(|entry| parse_sort(entry))
            .collect()
    }

    pub fn view_state_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage.view_state_path {
            return Ok(PathBuf::from(path));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set storage.view_state_path in the config")
        })?;
        Ok(data_root.join(APP_NAME).join("view-state.json"))
    }

    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let labels = FieldLabels::new(self.grid.label_prefix.clone().unwrap_or_default());
        let save = SaveContext {
            id_field: self.id_field().to_owned(),
            labels,
        };
        let mut config = ControllerConfig::new(self.grid_key())
            .with_default_sort(self.default_sort()?)
            .with_row_navigation(self.grid.row_navigation.unwrap_or(false))
            .with_save_context(save);
        if let Some(column) = &self.grid.first_editable_column {
            config = config.with_first_editable_column(column.clone());
        }
        if let Some(size) = self.grid.page_size {
            config.page_size = size;
        }
        config.blank_row_delay = parse_duration(
            self.grid
                .blank_row_delay
                .as_deref()
                .unwrap_or(DEFAULT_BLANK_ROW_DELAY),
        )?;
        Ok(config)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# gridsync config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\nresource = \"{}\"\nid_field = \"{}\"\ntimeout = \"{}\"\n\n[grid]\nkey = \"{}\"\npage_size = {}\ndefault_sort = [\"name:asc\"]\nrow_navigation = false\nblank_row_delay = \"{}\"\n# first_editable_column = \"name\"\n# label_prefix = \"orders\"\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/gridsync/view-state.json)\n# view_state_path = \"/absolute/path/to/view-state.json\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_RESOURCE,
            DEFAULT_ID_FIELD,
            DEFAULT_TIMEOUT,
            DEFAULT_GRID_KEY,
            gridsync_core::DEFAULT_PAGE_SIZE,
            DEFAULT_BLANK_ROW_DELAY,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}

/// `field` alone sorts ascending.
fn parse_sort(raw: &str) -> Result<SortOrder> {
    let (field, direction) = match raw.split_once(':') {
        Some((field, direction)) => {
            let parsed = SortDirection::parse(direction.trim()).ok_or_else(|| {
                anyhow!("invalid sort direction {direction:?} in {raw:?}; use asc or desc")
            })?;
            (field.trim(), parsed)
        }
        None => (raw.trim(), SortDirection::Asc),
    };
    if field.is_empty() {
        bail!("sort entry {raw:?} names no field");
    }
    Ok(SortOrder::new(field, direction))
}
