//! Layered parameter resolution.
//!
//! Effective parameters come from three sources, highest precedence first:
//! explicit command-line flags, the project's `skipper.yaml`, built-in defaults.
//! Every scalar is resolved independently through that chain. `env` is the one
//! field merged per key: file entries are expanded against an [`EnvSnapshot`]
//! and keep their declaration order, then each command-line `-e KEY=VALUE`
//! entry drops any earlier entry of the same name and is appended.

use anyhow::{Context, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::errors::SkipperError;

pub const CONFIG_FILE_NAME: &str = "skipper.yaml";
pub const DEFAULT_MAKEFILE: &str = "Makefile";

/// Contents of `skipper.yaml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    pub registry: Option<String>,
    pub build_container_image: Option<String>,
    pub build_container_tag: Option<String>,
    #[serde(default)]
    pub make: MakeSection,
    /// `env` entries in the order they are written in the file.
    #[serde(default, deserialize_with = "ordered_env")]
    pub env: Vec<(String, String)>,
}

fn ordered_env<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvVisitor;

    impl<'de> Visitor<'de> for EnvVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a mapping of variable names to values")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries: Vec<(String, String)> = Vec::new();
            while let Some((key, value)) = map.next_entry::<String, String>()? {
                entries.retain(|(existing, _)| *existing != key);
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_any(EnvVisitor)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MakeSection {
    pub makefile: Option<String>,
}

impl ConfigFile {
    /// Loads `skipper.yaml` from `project_root`. A missing file is an empty config.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            log::debug!("No {} in {}", CONFIG_FILE_NAME, project_root.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .context(format!("Failed to read {}", path.display()))?;
        Self::parse(&content).context(format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Values that apply when neither the file nor the command line says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub registry: Option<String>,
    pub build_container_image: Option<String>,
    pub build_container_tag: Option<String>,
    pub makefile: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            registry: None,
            build_container_image: None,
            build_container_tag: None,
            makefile: DEFAULT_MAKEFILE.to_string(),
        }
    }
}

/// Parameters given explicitly on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub registry: Option<String>,
    pub build_container_image: Option<String>,
    pub build_container_tag: Option<String>,
    pub makefile: Option<String>,
    /// Raw `KEY=VALUE` entries in command-line order.
    pub env: Vec<String>,
}

/// Snapshot of process environment variables used for `$NAME` expansion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub registry: Option<String>,
    pub build_container_image: Option<String>,
    pub build_container_tag: Option<String>,
    pub makefile: String,
    pub env: Vec<(String, String)>,
}

impl EffectiveConfig {
    pub fn require_registry(&self) -> Result<&str, SkipperError> {
        self.registry
            .as_deref()
            .ok_or(SkipperError::MissingParameter("--registry"))
    }

    pub fn require_build_container_image(&self) -> Result<&str, SkipperError> {
        self.build_container_image
            .as_deref()
            .ok_or(SkipperError::MissingParameter("--build-container-image"))
    }

    /// The environment as `KEY=VALUE` strings: file entries first, then
    /// command-line entries in the order given.
    pub fn environment(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }
}

/// Merges defaults, file config and command-line overrides.
pub fn resolve(
    defaults: &Defaults,
    file: &ConfigFile,
    cli: &CliOverrides,
    snapshot: &EnvSnapshot,
) -> Result<EffectiveConfig, SkipperError> {
    let mut env: Vec<(String, String)> = file
        .env
        .iter()
        .map(|(key, value)| (key.clone(), expand_value(value, snapshot)))
        .collect();

    for entry in &cli.env {
        let (key, value) = parse_env_entry(entry)?;
        env.retain(|(existing, _)| existing != key);
        env.push((key.to_string(), value.to_string()));
    }

    Ok(EffectiveConfig {
        registry: pick(&cli.registry, &file.registry, &defaults.registry),
        build_container_image: pick(
            &cli.build_container_image,
            &file.build_container_image,
            &defaults.build_container_image,
        ),
        build_container_tag: pick(
            &cli.build_container_tag,
            &file.build_container_tag,
            &defaults.build_container_tag,
        ),
        makefile: cli
            .makefile
            .clone()
            .or_else(|| file.make.makefile.clone())
            .unwrap_or_else(|| defaults.makefile.clone()),
        env,
    })
}

fn pick(cli: &Option<String>, file: &Option<String>, default: &Option<String>) -> Option<String> {
    cli.clone().or_else(|| file.clone()).or_else(|| default.clone())
}

/// Splits `KEY=VALUE` at the first `=`. The value may be empty.
pub fn parse_env_entry(entry: &str) -> Result<(&str, &str), SkipperError> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(SkipperError::InvalidEnv(entry.to_string())),
    }
}

/// Expands `$NAME` and `${NAME}` references against `snapshot`.
///
/// A value starting with `$$` is taken literally with one `$` dropped.
/// References to unset variables are kept verbatim.
pub fn expand_value(value: &str, snapshot: &EnvSnapshot) -> String {
    if let Some(escaped) = value.strip_prefix('$') {
        if escaped.starts_with('$') {
            return escaped.to_string();
        }
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match snapshot.get(name) {
            Some(resolved) if !name.is_empty() => out.push_str(resolved),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}
