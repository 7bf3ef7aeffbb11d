//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::model::{ToolSpec, Tools};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".ferry/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolTable,
    #[serde(default)]
    pub transfer: TransferSettings,
}

/// One entry per supported operation. Missing keys fall back to the built-in tool table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolTable {
    #[serde(default)]
    pub size: ToolEntry,
    #[serde(default)]
    pub sync: ToolEntry,
    #[serde(default)]
    pub archive_create: ToolEntry,
    #[serde(default)]
    pub archive_extract: ToolEntry,
    #[serde(default)]
    pub download: ToolEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolEntry {
    #[serde(default)]
    program: Option<String>,
    #[serde(default)]
    args: Option<Vec<String>>,
    #[serde(default)]
    output_flag: Option<String>,
}

impl ToolEntry {
    fn merge(self, overlay: Self) -> Self {
        Self {
            program: overlay.program.or(self.program),
            args: overlay.args.or(self.args),
            output_flag: overlay.output_flag.or(self.output_flag),
        }
    }

    fn resolve(&self, fallback: ToolSpec) -> ToolSpec {
        ToolSpec {
            program: self.program.clone().unwrap_or(fallback.program),
            args: self.args.clone().unwrap_or(fallback.args),
            output_flag: self.output_flag.clone().or(fallback.output_flag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TransferSettings {
    #[serde(default)]
    mirror_flags: Option<Vec<String>>,
    #[serde(default)]
    elevate: Option<String>,
}

impl TransferSettings {
    pub fn mirror_flags(&self) -> Vec<String> {
        self.mirror_flags
            .clone()
            .unwrap_or_else(|| Tools::default().mirror_flags)
    }

    pub fn elevate(&self) -> String {
        self.elevate
            .clone()
            .unwrap_or_else(|| Tools::default().elevate)
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    sync_program: Option<String>,
    elevate: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            sync_program: env::var("FERRY_SYNC_PROGRAM").ok(),
            elevate: env::var("FERRY_ELEVATE").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(sync_program: &str, elevate: &str) -> Self {
        Self {
            sync_program: Some(sync_program.to_owned()),
            elevate: Some(elevate.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::parse(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            tracing::debug!(path = %global_path.display(), "loading user config");
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            tracing::debug!(path = %workspace_path.display(), "loading workspace config");
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            tools: merge_tools(self.tools, other.tools),
            transfer: merge_transfer(self.transfer, other.transfer),
        }
    }

    /// Resolve the effective tool table.
    pub fn tools(&self) -> Tools {
        let defaults = Tools::default();
        Tools {
            size: self.tools.size.resolve(defaults.size),
            sync: self.tools.sync.resolve(defaults.sync),
            archive_create: self.tools.archive_create.resolve(defaults.archive_create),
            archive_extract: self.tools.archive_extract.resolve(defaults.archive_extract),
            download: self.tools.download.resolve(defaults.download),
            mirror_flags: self.transfer.mirror_flags(),
            elevate: self.transfer.elevate(),
        }
    }
}

fn merge_tools(base: ToolTable, overlay: ToolTable) -> ToolTable {
    ToolTable {
        size: base.size.merge(overlay.size),
        sync: base.sync.merge(overlay.sync),
        archive_create: base.archive_create.merge(overlay.archive_create),
        archive_extract: base.archive_extract.merge(overlay.archive_extract),
        download: base.download.merge(overlay.download),
    }
}

fn merge_transfer(mut base: TransferSettings, overlay: TransferSettings) -> TransferSettings {
    if let Some(value) = overlay.mirror_flags {
        base.mirror_flags = Some(value);
    }
    if let Some(value) = overlay.elevate {
        base.elevate = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("ferry/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir().context("unable to determine working directory")?;
    Ok(find_workspace_config(&cwd))
}

fn find_workspace_config(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DEFAULT_WORKSPACE_CONFIG_PATH))
        .find(|candidate| candidate.is_file())
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(program) = env.sync_program {
        config.tools.sync.program = Some(program);
    }
    if let Some(elevate) = env.elevate {
        config.transfer.elevate = Some(elevate);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.tools(), Tools::default());
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[tools.sync]
program = "/usr/local/bin/rsync"
[transfer]
mirror_flags = ["--delete-after"]
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".ferry"))?;
        fs::write(
            workspace_dir.join(".ferry/config.toml"),
            r#"
[tools.sync]
args = ["-av"]
[tools.archive_extract]
program = "7z"
args = ["x"]
output_flag = "-o"
"#,
        )?;

        let nested = workspace_dir.join("src/deep");
        fs::create_dir_all(&nested)?;
        let workspace_path = find_workspace_config(&nested);
        assert_eq!(
            workspace_path.as_deref(),
            Some(workspace_dir.join(".ferry/config.toml").as_path())
        );

        let config = Config::load_with_layers(Some(global), workspace_path, EnvOverrides::default())?;
        let tools = config.tools();

        assert_eq!(tools.sync.program, "/usr/local/bin/rsync");
        assert_eq!(tools.sync.args, vec!["-av".to_string()]);
        assert_eq!(tools.mirror_flags, vec!["--delete-after".to_string()]);
        assert_eq!(tools.archive_extract.program, "7z");
        assert_eq!(tools.archive_extract.output_flag.as_deref(), Some("-o"));
        assert_eq!(tools.size, Tools::default().size);

        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("openrsync", "doas");
        let tools = Config::load_with_layers(None, None, overrides)?.tools();
        assert_eq!(tools.sync.program, "openrsync");
        assert_eq!(tools.elevate, "doas");
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn missing_workspace_config_is_none() -> Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(find_workspace_config(temp.path()).is_none());
        Ok(())
    }
}
