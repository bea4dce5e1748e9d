//! Configuration
//!
//! Loaded from YAML (`mockshift.yaml` in the working directory, or the file
//! named by `--config`). Every section is optional:
//!
//! ```yaml
//! style:
//!   qualified: false          # Mockito.when(..) instead of when(..)
//!   indent: "    "
//!   answer_param: invocation
//!   in_order_var: inOrder
//! policy:
//!   duplicate_verification: prefer-explicit   # or keep-both
//!   defer_strict_verifications: true
//! types:
//!   com.acme.Clock:
//!     - "long now()"
//!     - "void sleep(long millis)"
//! extensions: [java]
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    ast::Span,
    err_ctx, err_msg,
    errors::to_error_source,
    MockshiftError,
};

pub const DEFAULT_CONFIG_FILE: &str = "mockshift.yaml";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub style: StyleConfig,
    pub policy: PolicyConfig,
    /// Method signatures of types that are not part of the processed sources,
    /// keyed by fully qualified or simple type name.
    pub types: BTreeMap<String, Vec<String>>,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleConfig {
    pub qualified: bool,
    pub indent: String,
    pub answer_param: String,
    pub in_order_var: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            qualified: false,
            indent: "    ".to_string(),
            answer_param: "invocation".to_string(),
            in_order_var: "inOrder".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Drop the implicit count check of a strict stub when a verification
    /// block in the same method checks the same call.
    #[default]
    PreferExplicit,
    KeepBoth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub duplicate_verification: DuplicatePolicy,
    /// Emit the count checks of strict stubs at the end of the method body
    /// instead of next to the stub.
    pub defer_strict_verifications: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            duplicate_verification: DuplicatePolicy::PreferExplicit,
            defer_strict_verifications: true,
        }
    }
}

impl Config {
    /// Parses a YAML document. `name` labels the source in error reports.
    pub fn from_yaml_str(text: &str, name: &str) -> Result<Self, MockshiftError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| {
            let message = e.to_string();
            match e.location() {
                Some(loc) => {
                    let src = to_error_source(name, text);
                    err_ctx!(Config, message, &src, Span::new(loc.index(), loc.index() + 1))
                }
                None => err_msg!(Config, "{}: {}", name, message),
            }
        })
    }

    /// Loads `explicit` if given, otherwise `mockshift.yaml` from `dir` when present.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self, MockshiftError> {
        let path: PathBuf = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = dir.join(DEFAULT_CONFIG_FILE);
                if !candidate.is_file() {
                    debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let text = fs::read_to_string(&path).map_err(|e| {
            err_msg!(Config, "cannot read {}: {}", path.display(), e).with_cause(e)
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Self::from_yaml_str(&text, &path.display().to_string())
    }

    /// File extensions to discover, `java` unless configured.
    pub fn extensions(&self) -> Vec<String> {
        if self.extensions.is_empty() {
            vec!["java".to_string()]
        } else {
            self.extensions.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let cfg = Config::from_yaml_str("", "mockshift.yaml").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.extensions(), vec!["java".to_string()]);
        assert!(cfg.policy.defer_strict_verifications);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let yaml = "style:\n  qualified: true\npolicy:\n  duplicate_verification: keep-both\n";
        let cfg = Config::from_yaml_str(yaml, "mockshift.yaml").unwrap();
        assert!(cfg.style.qualified);
        assert_eq!(cfg.style.answer_param, "invocation");
        assert_eq!(cfg.policy.duplicate_verification, DuplicatePolicy::KeepBoth);
    }

    #[test]
    fn type_signatures_are_read_in_order() {
        let yaml = "types:\n  Clock:\n    - long now()\n    - void sleep(long millis)\n";
        let cfg = Config::from_yaml_str(yaml, "mockshift.yaml").unwrap();
        assert_eq!(cfg.types["Clock"], vec!["long now()", "void sleep(long millis)"]);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_yaml_str("styles: {}\n", "mockshift.yaml").unwrap_err();
        assert_eq!(err.error_type(), crate::errors::ErrorType::Config);
    }
}
