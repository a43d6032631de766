//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".xtailor/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub export: Export,
    #[serde(default)]
    pub keybindings: Keybindings,
}

/// Editor settings. Like [`Export`], unset fields fall through to lower layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    show_preview: Option<bool>,
}

impl Defaults {
    fn default_theme() -> &'static str {
        "base16-ocean.dark"
    }

    pub fn theme(&self) -> &str {
        self.theme.as_deref().unwrap_or(Self::default_theme())
    }

    pub fn set_theme(&mut self, theme: impl Into<String>) {
        self.theme = Some(theme.into());
    }

    pub fn show_preview(&self) -> bool {
        self.show_preview.unwrap_or(true)
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            theme: Some(Self::default_theme().to_owned()),
            show_preview: Some(true),
        }
    }
}

/// Export settings. Unset fields fall through to lower configuration layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    tailoring_id: Option<String>,
    #[serde(default)]
    locale: Option<String>,
    #[serde(default)]
    escape_markup: Option<bool>,
    #[serde(default)]
    copy_to_clipboard: Option<bool>,
}

impl Export {
    fn default_file_name() -> &'static str {
        "tailoring_custom.xml"
    }

    fn default_template() -> &'static str {
        "xccdf_tailoring"
    }

    fn default_tailoring_id() -> &'static str {
        "xccdf_scap-workbench_tailoring_default"
    }

    fn default_locale() -> &'static str {
        "en-US"
    }

    pub fn file_name(&self) -> String {
        self.file_name
            .clone()
            .unwrap_or_else(|| Self::default_file_name().to_owned())
    }

    pub fn template(&self) -> String {
        self.template
            .clone()
            .unwrap_or_else(|| Self::default_template().to_owned())
    }

    pub fn tailoring_id(&self) -> String {
        self.tailoring_id
            .clone()
            .unwrap_or_else(|| Self::default_tailoring_id().to_owned())
    }

    pub fn locale(&self) -> String {
        self.locale
            .clone()
            .unwrap_or_else(|| Self::default_locale().to_owned())
    }

    pub fn escape_markup(&self) -> bool {
        self.escape_markup.unwrap_or(true)
    }

    pub fn copy_to_clipboard(&self) -> bool {
        self.copy_to_clipboard.unwrap_or(false)
    }
}

impl Default for Export {
    fn default() -> Self {
        Self {
            file_name: Some(Self::default_file_name().to_owned()),
            template: Some(Self::default_template().to_owned()),
            tailoring_id: Some(Self::default_tailoring_id().to_owned()),
            locale: Some(Self::default_locale().to_owned()),
            escape_markup: Some(true),
            copy_to_clipboard: Some(false),
        }
    }
}

/// Key bindings as written in config files, e.g. `"ctrl+e"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keybindings {
    #[serde(default)]
    pub up: Option<String>,
    #[serde(default)]
    pub down: Option<String>,
    #[serde(default)]
    pub toggle: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub delete: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub export: Option<String>,
}

impl Keybindings {
    pub const DEFAULT_UP: &'static str = "k";
    pub const DEFAULT_DOWN: &'static str = "j";
    pub const DEFAULT_TOGGLE: &'static str = "space";
    pub const DEFAULT_SEVERITY: &'static str = "s";
    pub const DEFAULT_DELETE: &'static str = "d";
    pub const DEFAULT_FILTER: &'static str = "/";
    pub const DEFAULT_EXPORT: &'static str = "ctrl+e";

    pub fn up(&self) -> &str {
        self.up.as_deref().unwrap_or(Self::DEFAULT_UP)
    }

    pub fn down(&self) -> &str {
        self.down.as_deref().unwrap_or(Self::DEFAULT_DOWN)
    }

    pub fn toggle(&self) -> &str {
        self.toggle.as_deref().unwrap_or(Self::DEFAULT_TOGGLE)
    }

    pub fn severity(&self) -> &str {
        self.severity.as_deref().unwrap_or(Self::DEFAULT_SEVERITY)
    }

    pub fn delete(&self) -> &str {
        self.delete.as_deref().unwrap_or(Self::DEFAULT_DELETE)
    }

    pub fn filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(Self::DEFAULT_FILTER)
    }

    pub fn export(&self) -> &str {
        self.export.as_deref().unwrap_or(Self::DEFAULT_EXPORT)
    }
}

impl Default for Keybindings {
    fn default() -> Self {
        Self {
            up: Some(Self::DEFAULT_UP.to_owned()),
            down: Some(Self::DEFAULT_DOWN.to_owned()),
            toggle: Some(Self::DEFAULT_TOGGLE.to_owned()),
            severity: Some(Self::DEFAULT_SEVERITY.to_owned()),
            delete: Some(Self::DEFAULT_DELETE.to_owned()),
            filter: Some(Self::DEFAULT_FILTER.to_owned()),
            export: Some(Self::DEFAULT_EXPORT.to_owned()),
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    output: Option<String>,
    theme: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            output: env::var("XTAILOR_OUTPUT").ok(),
            theme: env::var("XTAILOR_THEME").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(output: &str, theme: &str) -> Self {
        Self {
            output: Some(output.to_owned()),
            theme: Some(theme.to_owned()),
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

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

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
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            export: merge_export(self.export, other.export),
            keybindings: merge_keybindings(self.keybindings, other.keybindings),
        }
    }
}

fn merge_defaults(base: Defaults, overlay: Defaults) -> Defaults {
    Defaults {
        theme: overlay.theme.or(base.theme),
        show_preview: overlay.show_preview.or(base.show_preview),
    }
}

fn merge_export(mut base: Export, overlay: Export) -> Export {
    if let Some(value) = overlay.file_name {
        base.file_name = Some(value);
    }
    if let Some(value) = overlay.template {
        base.template = Some(value);
    }
    if let Some(value) = overlay.tailoring_id {
        base.tailoring_id = Some(value);
    }
    if let Some(value) = overlay.locale {
        base.locale = Some(value);
    }
    if let Some(value) = overlay.escape_markup {
        base.escape_markup = Some(value);
    }
    if let Some(value) = overlay.copy_to_clipboard {
        base.copy_to_clipboard = Some(value);
    }
    base
}

fn merge_keybindings(base: Keybindings, overlay: Keybindings) -> Keybindings {
    Keybindings {
        up: overlay.up.or(base.up),
        down: overlay.down.or(base.down),
        toggle: overlay.toggle.or(base.toggle),
        severity: overlay.severity.or(base.severity),
        delete: overlay.delete.or(base.delete),
        filter: overlay.filter.or(base.filter),
        export: overlay.export.or(base.export),
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("xtailor/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(output) = env.output {
        config.export.file_name = Some(output);
    }
    if let Some(theme) = env.theme {
        config.defaults.set_theme(theme);
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
        assert_eq!(config.export.file_name(), "tailoring_custom.xml");
        assert_eq!(config.export.tailoring_id(), "xccdf_scap-workbench_tailoring_default");
        assert!(config.export.escape_markup());
        assert_eq!(config.keybindings.export(), "ctrl+e");
        assert!(config.defaults.show_preview());
    }

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let embedded = Config::from_str(&DEFAULT_CONFIG).unwrap();
        assert_eq!(embedded, Config::default());
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[defaults]
theme = "InspiredGitHub"
[export]
locale = "de-DE"
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".xtailor"))?;
        fs::write(
            workspace_dir.join(".xtailor/config.toml"),
            r#"
[export]
escape_markup = false
[keybindings]
delete = "x"
"#,
        )?;

        let config = Config::load_with_layers(
            Some(global),
            Some(workspace_dir.join(".xtailor/config.toml")),
            EnvOverrides::default(),
        )?;

        assert_eq!(config.defaults.theme(), "InspiredGitHub");
        assert_eq!(config.export.locale(), "de-DE");
        assert!(!config.export.escape_markup());
        assert_eq!(config.export.file_name(), "tailoring_custom.xml");
        assert_eq!(config.keybindings.delete(), "x");
        assert_eq!(config.keybindings.toggle(), "space");
        Ok(())
    }

    #[test]
    fn workspace_can_restore_default_values() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[defaults]
theme = "InspiredGitHub"
show_preview = false
[keybindings]
delete = "x"
"#,
        )?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(
            &workspace,
            r#"
[defaults]
theme = "base16-ocean.dark"
show_preview = true
[keybindings]
delete = "d"
"#,
        )?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;
        assert_eq!(config.defaults.theme(), "base16-ocean.dark");
        assert!(config.defaults.show_preview());
        assert_eq!(config.keybindings.delete(), "d");
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("hardened.xml", "Solarized (dark)");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.export.file_name(), "hardened.xml");
        assert_eq!(config.defaults.theme(), "Solarized (dark)");
        Ok(())
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        assert!(Config::from_file(&file).is_err());
        Ok(())
    }
}
