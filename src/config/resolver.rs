//! Startup configuration resolution
//!
//! Runs once before anything else: installs pre-staged overrides, keeps the
//! installed baseline in sync with the shipped one, migrates the legacy YAML
//! config, layers the user file over the baseline and normalizes the display
//! identifier. Any failure here is a [`ConfigFatal`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, info, warn};

use super::display::DisplayType;
use super::error::ConfigFatal;
use super::merge::{legacy_to_table, merge_config};
use crate::constants::config::*;

/// Every file location the resolver touches
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Baseline shipped with this build (read-only, source of truth for upgrades)
    pub defaults_resource: PathBuf,
    /// Installed copy of the baseline inside the config directory
    pub baseline: PathBuf,
    /// Operator override, current format
    pub user: PathBuf,
    /// Removable volume that may carry a staged override (None = never look)
    pub staging_mount: Option<PathBuf>,
}

impl ConfigPaths {
    /// Standard layout: `<config_dir>/defaults.toml` + `<config_dir>/config.toml`
    pub fn in_dir(defaults_resource: impl Into<PathBuf>, config_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref();
        Self {
            defaults_resource: defaults_resource.into(),
            baseline: config_dir.join(BASELINE_FILENAME),
            user: config_dir.join(USER_FILENAME),
            staging_mount: None,
        }
    }

    /// System layout under /etc with the boot volume as staging mount
    pub fn system(defaults_resource: impl Into<PathBuf>) -> Self {
        Self::in_dir(defaults_resource, SYSTEM_CONFIG_DIR)
            .with_staging_mount(Some(PathBuf::from(STAGING_MOUNT)))
    }

    pub fn with_staging_mount(mut self, mount: Option<PathBuf>) -> Self {
        self.staging_mount = mount;
        self
    }

    /// Legacy file sitting next to the user config (`config.toml` -> `config.yml`)
    pub fn legacy(&self) -> PathBuf {
        self.user.with_extension(LEGACY_EXTENSION)
    }

    /// Directory holding the user config; replaced wholesale by a staged directory
    pub fn config_dir(&self) -> &Path {
        self.user.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Resolved runtime configuration; immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    table: Table,
    display: DisplayType,
}

impl EffectiveConfig {
    /// Normalize the display identifier of an already merged tree
    pub fn from_table(mut table: Table) -> Result<Self, ConfigFatal> {
        let display = normalize_display(&mut table)?;
        Ok(Self { table, display })
    }

    pub fn display(&self) -> DisplayType {
        self.display
    }

    pub fn as_table(&self) -> &Table {
        &self.table
    }

    /// Look up a value by dotted path, e.g. `"ui.display.type"`
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let mut current = self.table.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.table)
    }
}

/// Produce the effective configuration or fail fatally
pub fn resolve(paths: &ConfigPaths) -> Result<EffectiveConfig, ConfigFatal> {
    ensure_parent(&paths.user)?;

    if let Some(mount) = &paths.staging_mount {
        install_staged(mount, paths)?;
        // a staged directory may have replaced the config dir entirely
        ensure_parent(&paths.user)?;
    }

    ensure_parent(&paths.baseline)?;
    refresh_baseline(paths)?;
    bootstrap_user(paths)?;

    let defaults = load_table(&paths.baseline)?;
    let config = match load_user(paths)? {
        Some(user) => merge_config(user, &defaults),
        None => defaults,
    };

    let effective = EffectiveConfig::from_table(config)?;
    info!(display = %effective.display(), "Configuration resolved");
    Ok(effective)
}

fn ensure_parent(path: &Path) -> Result<(), ConfigFatal> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        debug!(dir = %parent.display(), "Creating config directory");
        fs::create_dir_all(parent).map_err(|e| ConfigFatal::io("create", parent, e))?;
    }
    Ok(())
}

/// Consume overrides left on the staging mount (file first, then directory)
fn install_staged(mount: &Path, paths: &ConfigPaths) -> Result<(), ConfigFatal> {
    for name in STAGED_FILES {
        let staged = mount.join(name);
        if !staged.is_file() {
            continue;
        }

        let is_legacy = staged
            .extension()
            .is_some_and(|ext| ext == LEGACY_EXTENSION);
        if is_legacy {
            let legacy = paths.legacy();
            info!(from = %staged.display(), to = %legacy.display(), "Installing staged legacy config");
            move_path(&staged, &legacy)?;
            // drop the current-format file so the staged one gets migrated
            match fs::remove_file(&paths.user) {
                Ok(()) => info!(path = %paths.user.display(), "Removed superseded user config"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ConfigFatal::io("remove", &paths.user, e)),
            }
        } else {
            info!(from = %staged.display(), to = %paths.user.display(), "Installing staged config");
            move_path(&staged, &paths.user)?;
        }
        break;
    }

    let config_dir = paths.config_dir();
    let dir_name = config_dir
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(APP_DIR));
    let staged_dir = mount.join(dir_name);
    if staged_dir.is_dir() {
        info!(from = %staged_dir.display(), to = %config_dir.display(), "Installing staged config directory");
        if let Err(e) = fs::remove_dir_all(config_dir)
            && e.kind() != ErrorKind::NotFound
        {
            warn!(dir = %config_dir.display(), error = %e, "Could not remove existing config directory");
        }
        move_path(&staged_dir, config_dir)?;
    }

    Ok(())
}

/// Rename, or copy-and-remove when the staging volume is a different filesystem
fn move_path(from: &Path, to: &Path) -> Result<(), ConfigFatal> {
    if let Err(e) = fs::rename(from, to) {
        debug!(from = %from.display(), to = %to.display(), error = %e, "Rename failed, copying instead");
        copy_then_remove(from, to)?;
    }
    Ok(())
}

fn copy_then_remove(from: &Path, to: &Path) -> Result<(), ConfigFatal> {
    if from.is_dir() {
        copy_dir_all(from, to)?;
        fs::remove_dir_all(from).map_err(|e| ConfigFatal::io("remove", from, e))
    } else {
        fs::copy(from, to).map_err(|e| ConfigFatal::io("copy", from, e))?;
        fs::remove_file(from).map_err(|e| ConfigFatal::io("remove", from, e))
    }
}

fn copy_dir_all(from: &Path, to: &Path) -> Result<(), ConfigFatal> {
    fs::create_dir_all(to).map_err(|e| ConfigFatal::io("create", to, e))?;
    let entries = fs::read_dir(from).map_err(|e| ConfigFatal::io("read", from, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfigFatal::io("read", from, e))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        if source.is_dir() {
            copy_dir_all(&source, &target)?;
        } else {
            fs::copy(&source, &target).map_err(|e| ConfigFatal::io("copy", &source, e))?;
        }
    }
    Ok(())
}

/// Make the installed baseline byte-identical to the shipped one
fn refresh_baseline(paths: &ConfigPaths) -> Result<(), ConfigFatal> {
    let shipped = fs::read(&paths.defaults_resource)
        .map_err(|e| ConfigFatal::io("read", &paths.defaults_resource, e))?;

    let installed = match fs::read(&paths.baseline) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(ConfigFatal::io("read", &paths.baseline, e)),
    };

    match installed {
        Some(bytes) if bytes == shipped => return Ok(()),
        Some(_) => warn!(
            path = %paths.baseline.display(),
            "Installed baseline differs from release defaults, overwriting"
        ),
        None => info!(
            from = %paths.defaults_resource.display(),
            to = %paths.baseline.display(),
            "Installing baseline"
        ),
    }

    fs::write(&paths.baseline, &shipped).map_err(|e| ConfigFatal::io("write", &paths.baseline, e))
}

/// First run: seed the user file with the shipped baseline
fn bootstrap_user(paths: &ConfigPaths) -> Result<(), ConfigFatal> {
    if paths.user.exists() || paths.legacy().exists() {
        return Ok(());
    }
    info!(
        from = %paths.defaults_resource.display(),
        to = %paths.user.display(),
        "No user config found, copying defaults"
    );
    fs::copy(&paths.defaults_resource, &paths.user)
        .map_err(|e| ConfigFatal::io("copy", &paths.defaults_resource, e))?;
    Ok(())
}

fn load_table(path: &Path) -> Result<Table, ConfigFatal> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigFatal::io("read", path, e))?;
    toml::from_str(&contents).map_err(|source| ConfigFatal::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the override, migrating the legacy file when it is the only one present
fn load_user(paths: &ConfigPaths) -> Result<Option<Table>, ConfigFatal> {
    let legacy = paths.legacy();
    if !paths.user.exists() && legacy.exists() {
        info!(from = %legacy.display(), to = %paths.user.display(), "Old yaml config found, converting to toml");
        let contents = fs::read_to_string(&legacy).map_err(|e| ConfigFatal::io("read", &legacy, e))?;
        let doc: serde_yaml::Value =
            serde_yaml::from_str(&contents).map_err(|source| ConfigFatal::LegacyParse {
                path: legacy.clone(),
                source,
            })?;
        let table = legacy_to_table(doc).ok_or_else(|| ConfigFatal::NotATable { path: legacy.clone() })?;
        let rendered = toml::to_string(&table).map_err(|source| ConfigFatal::Serialize {
            path: paths.user.clone(),
            source,
        })?;
        fs::write(&paths.user, rendered).map_err(|e| ConfigFatal::io("write", &paths.user, e))?;
        return Ok(Some(table));
    }

    if paths.user.exists() {
        return load_table(&paths.user).map(Some);
    }
    Ok(None)
}

fn normalize_display(table: &mut Table) -> Result<DisplayType, ConfigFatal> {
    let [ui, display, kind] = DISPLAY_TYPE_KEY;
    let slot = table
        .get_mut(ui)
        .and_then(Value::as_table_mut)
        .and_then(|t| t.get_mut(display))
        .and_then(Value::as_table_mut)
        .and_then(|t| t.get_mut(kind))
        .ok_or(ConfigFatal::MissingDisplayType)?;

    let resolved = match slot.as_str() {
        Some(alias) => DisplayType::from_alias(alias)?,
        None => return Err(ConfigFatal::UnsupportedDisplay(slot.to_string())),
    };
    *slot = Value::String(resolved.as_str().to_string());
    Ok(resolved)
}
