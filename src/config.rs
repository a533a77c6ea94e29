//! User configuration, read from `~/.config/plysnap/config.toml`.

use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::muted_error;
use crate::preview::{ArrayWriter, PreviewOptions, SessionStorage, Strategy};

const DEFAULT_PATH: &str = ".config/plysnap/config.toml";

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub strategy: Strategy,
    pub array_writer: ArrayWriter,
    /// Command that opens produced files, called as `<viewer> <path>`.
    pub viewer: Option<String>,
    pub log_file: Option<PathBuf>,
    pub storage: StorageConfig,
    /// Arguments of the DAP `attach` request.
    pub attach: toml::Table,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub base_dir: Option<PathBuf>,
    /// Remove leftovers of previous runs at start.
    pub purge_on_start: bool,
}

impl Config {
    /// Load configuration from `path` or from the default location.
    ///
    /// A missing file at the default location means defaults, a file given explicitly
    /// must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let data = match path {
            Some(path) => read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?,
            None => {
                let Some(home) = home::home_dir() else {
                    return Ok(Self::default());
                };
                match muted_error!(read_to_string(home.join(DEFAULT_PATH)), "default config:") {
                    Some(data) => data,
                    None => return Ok(Self::default()),
                }
            }
        };
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> anyhow::Result<Self> {
        toml::de::from_str(data).context("parse config")
    }

    pub fn base_dir(&self) -> PathBuf {
        self.storage
            .base_dir
            .clone()
            .unwrap_or_else(SessionStorage::default_base)
    }

    pub fn preview_options(&self) -> PreviewOptions {
        PreviewOptions {
            strategy: self.strategy,
            array_writer: self.array_writer,
        }
    }

    /// `attach` table as a JSON object.
    pub fn attach_arguments(&self) -> anyhow::Result<serde_json::Value> {
        serde_json::to_value(&self.attach).context("attach arguments")
    }
}
