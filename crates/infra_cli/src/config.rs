//! `infrakit.toml` project settings.
//!
//! Every setting is optional; command-line flags (and their environment
//! variables) take precedence over the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use infra_core::{AccountContext, IdentifierGenerator};

use crate::commands::CommandError;

/// Default settings file, looked up in the working directory.
pub const CONFIG_FILE: &str = "infrakit.toml";

const DEFAULT_TEMPLATES_DIR: &str = "templates";
const DEFAULT_OUT_DIR: &str = "cdk.out";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub templates_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub secrets_file: Option<PathBuf>,
    pub account: Option<String>,
    pub region: Option<String>,
    pub partition: Option<String>,
    pub max_identifier_length: Option<usize>,
}

impl CliConfig {
    /// Load `path`, or `infrakit.toml` when no path is given. Only an
    /// explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        let config: CliConfig = toml::from_str(&content).map_err(|e| CommandError::InvalidConfig {
            path: path.clone(),
            message: e.to_string(),
        })?;
        debug!("Loaded settings from {:?}", path);
        Ok(config)
    }

    pub fn templates_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.templates_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR))
    }

    pub fn out_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.out_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR))
    }

    pub fn secrets_file(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.secrets_file.clone())
    }

    /// Account context from flags or settings; `None` unless both account
    /// and region are known.
    pub fn account(&self, account: Option<String>, region: Option<String>) -> Result<Option<AccountContext>> {
        let account = account.or_else(|| self.account.clone());
        let region = region.or_else(|| self.region.clone());
        let (Some(account), Some(region)) = (account, region) else {
            return Ok(None);
        };

        let mut context = AccountContext::new(account, region)?;
        if let Some(partition) = &self.partition {
            context = context.with_partition(partition);
            context.validate()?;
        }
        Ok(Some(context))
    }

    pub fn identifiers(&self) -> IdentifierGenerator {
        match self.max_identifier_length {
            Some(limit) => IdentifierGenerator::new().with_max_length(limit),
            None => IdentifierGenerator::new(),
        }
    }
}
