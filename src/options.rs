use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_GIT_BIN, GIT_BIN_OPTION};

/// Pick the first value present, highest precedence first: the per-call override,
/// then the instance-level value, then the hard-coded default.
pub fn resolve<'a, T: ?Sized>(
    call: Option<&'a T>,
    instance: Option<&'a T>,
    default: &'a T,
) -> &'a T {
    call.or(instance).unwrap_or(default)
}

/// Interprets a value the way git spells booleans.
pub fn parse_git_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

/// Options controlling how commands are executed, plus repository specific values
/// such as `core.bare` that get merged over the loaded repository config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecOptions {
    /// Path or name of the binary. None means `git` from the $PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_bin: Option<PathBuf>,
    /// When set, the child gets exactly this environment instead of inheriting ours
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_env: Option<BTreeMap<String, String>>,
    #[serde(default, rename = "options", skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ExecOptions {
    pub fn with_git_bin(mut self, git_bin: impl Into<PathBuf>) -> Self {
        self.git_bin = Some(git_bin.into());
        self
    }

    pub fn with_git_env<K, V>(mut self, env: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.git_env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Builds options from a flat string-keyed bag. `cast.git_bin` sets the binary,
    /// every other key is kept as a repository option.
    pub fn from_map<K, V>(bag: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut options = Self::default();
        for (key, value) in bag {
            let key = key.into();
            if key == GIT_BIN_OPTION {
                options.git_bin = Some(PathBuf::from(value.into()));
            } else {
                options.extra.insert(key, value.into());
            }
        }
        options
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|source| OptionsError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(parse_git_bool)
    }

    /// The binary to launch once the default is applied
    pub fn git_bin(&self) -> &Path {
        self.git_bin.as_deref().unwrap_or(Path::new(DEFAULT_GIT_BIN))
    }

    /// Effective options for a single call: each field of `call` wins over ours,
    /// repository options are merged with the call's entries winning.
    pub fn layered(&self, call: Option<&ExecOptions>) -> ExecOptions {
        let Some(call) = call else {
            return self.clone();
        };

        let mut extra = self.extra.clone();
        extra.extend(call.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        ExecOptions {
            git_bin: call.git_bin.clone().or_else(|| self.git_bin.clone()),
            git_env: call.git_env.clone().or_else(|| self.git_env.clone()),
            extra,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid options file `{path}`: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_follows_precedence() {
        assert_eq!(*resolve(Some(&1), Some(&2), &3), 1);
        assert_eq!(*resolve(None, Some(&2), &3), 2);
        assert_eq!(*resolve::<i32>(None, None, &3), 3);
    }

    #[test]
    fn git_bin_defaults_to_git() {
        assert_eq!(ExecOptions::default().git_bin(), Path::new("git"));
        let options = ExecOptions::default().with_git_bin("/opt/git/bin/git");
        assert_eq!(options.git_bin(), Path::new("/opt/git/bin/git"));
    }

    #[test]
    fn layered_prefers_call_values() {
        let instance = ExecOptions::default()
            .with_git_bin("instance-git")
            .with_git_env([("HOME", "/instance")])
            .with_option("core.bare", "false")
            .with_option("user.name", "instance");
        let call = ExecOptions::default()
            .with_git_bin("call-git")
            .with_option("core.bare", "true");

        let effective = instance.layered(Some(&call));
        assert_eq!(effective.git_bin(), Path::new("call-git"));
        // the call didn't specify an env so the instance one is used
        assert_eq!(
            effective.git_env.as_ref().and_then(|e| e.get("HOME")).map(String::as_str),
            Some("/instance")
        );
        assert_eq!(effective.get("core.bare"), Some("true"));
        assert_eq!(effective.get("user.name"), Some("instance"));
    }

    #[test]
    fn layered_without_call_is_the_instance() {
        let instance = ExecOptions::default().with_git_bin("git2");
        assert_eq!(instance.layered(None), instance);
    }

    #[test]
    fn from_map_splits_binary_from_options() {
        let options = ExecOptions::from_map([
            ("cast.git_bin", "/usr/local/bin/git"),
            ("core.bare", "yes"),
        ]);
        assert_eq!(options.git_bin(), Path::new("/usr/local/bin/git"));
        assert_eq!(options.get_bool("core.bare"), Some(true));
        assert_eq!(options.get("cast.git_bin"), None);
    }

    #[test]
    fn can_parse_options_file() {
        let content = r#"
git_bin = "/usr/bin/git"

[git_env]
HOME = "/tmp/home"

[options]
"core.bare" = "true"
"#;
        let options = ExecOptions::from_toml_str(content).unwrap();
        assert_eq!(options.git_bin(), Path::new("/usr/bin/git"));
        assert_eq!(options.git_env.unwrap()["HOME"], "/tmp/home");
        assert_eq!(options.extra["core.bare"], "true");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(ExecOptions::from_toml_str("gitbin = \"git\"").is_err());
    }

    #[test]
    fn git_booleans() {
        for v in ["true", "TRUE", "yes", "on", "1", " true "] {
            assert!(parse_git_bool(v), "{v}");
        }
        for v in ["false", "no", "off", "0", "", "maybe"] {
            assert!(!parse_git_bool(v), "{v}");
        }
    }
}
