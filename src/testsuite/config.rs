use crate::core::error::Error;
use crate::core::relay::{HERMES_REPOSITORY, HERMES_TAG};
use crate::primitives::funcs::parse_bool;
use std::{env, path::PathBuf};

pub const GAIAD_IMAGE: &str = "cosmos/gaiad-e2e";

/// Settings read from the environment at the start of a test session.
#[derive(Debug, Clone)]
pub struct E2eConfig {
    /// Raw `GAIA_E2E_SKIP_CLEANUP`, parsed at teardown
    pub skip_cleanup: Option<String>,
    pub gaiad_image: String,
    pub hermes_repository: String,
    pub hermes_tag: String,
    /// Directory holding `hermes_bootstrap.sh`
    pub scripts_dir: PathBuf,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            skip_cleanup: None,
            gaiad_image: GAIAD_IMAGE.to_string(),
            hermes_repository: HERMES_REPOSITORY.to_string(),
            hermes_tag: HERMES_TAG.to_string(),
            scripts_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scripts"),
        }
    }
}

impl E2eConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            skip_cleanup: non_empty("GAIA_E2E_SKIP_CLEANUP"),
            gaiad_image: non_empty("GAIA_E2E_IMAGE").unwrap_or(defaults.gaiad_image),
            hermes_repository: non_empty("GAIA_E2E_HERMES_IMAGE")
                .unwrap_or(defaults.hermes_repository),
            hermes_tag: non_empty("GAIA_E2E_HERMES_TAG").unwrap_or(defaults.hermes_tag),
            scripts_dir: non_empty("GAIA_E2E_SCRIPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scripts_dir),
        }
    }

    /// Whether teardown should leave containers and directories behind. An unset or empty
    /// variable means clean up.
    pub fn skip_cleanup(&self) -> Result<bool, Error> {
        match &self.skip_cleanup {
            Some(value) => parse_bool(value),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> E2eConfig {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        E2eConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = config(&[]);
        assert_eq!(config.gaiad_image, "cosmos/gaiad-e2e");
        assert_eq!(config.hermes_repository, "ghcr.io/cosmos/hermes-e2e");
        assert_eq!(config.hermes_tag, "1.0.0");
        assert!(config.scripts_dir.ends_with("scripts"));
        assert!(!config.skip_cleanup().unwrap());
    }

    #[test]
    fn skip_cleanup_parses_bool() {
        assert!(config(&[("GAIA_E2E_SKIP_CLEANUP", "true")]).skip_cleanup().unwrap());
        assert!(config(&[("GAIA_E2E_SKIP_CLEANUP", "1")]).skip_cleanup().unwrap());
        assert!(!config(&[("GAIA_E2E_SKIP_CLEANUP", "F")]).skip_cleanup().unwrap());
        assert!(!config(&[("GAIA_E2E_SKIP_CLEANUP", "")]).skip_cleanup().unwrap());
        assert!(config(&[("GAIA_E2E_SKIP_CLEANUP", "yes")]).skip_cleanup().is_err());
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("GAIA_E2E_IMAGE", "gaiad:dev"),
            ("GAIA_E2E_HERMES_TAG", "1.2.0"),
            ("GAIA_E2E_SCRIPTS_DIR", "/opt/scripts"),
        ]);
        assert_eq!(config.gaiad_image, "gaiad:dev");
        assert_eq!(config.hermes_tag, "1.2.0");
        assert_eq!(config.scripts_dir, PathBuf::from("/opt/scripts"));
    }
}
