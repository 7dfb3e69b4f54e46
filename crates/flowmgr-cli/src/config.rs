use anyhow::{Context as AnyhowContext, Result};
use flowmgr_core::ManagerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A named deployment: where its collaborators live and the environment
/// handed to `call` subprocesses.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Deployment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions_url: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,
}

impl Deployment {
    /// Overlay the deployment's URLs onto a manager configuration.
    pub fn apply(&self, config: &mut ManagerConfig) {
        if let Some(url) = &self.engine_url {
            config.engine_url = url.clone();
        }
        if let Some(url) = &self.state_url {
            config.state_url = url.clone();
        }
        if let Some(url) = &self.functions_url {
            config.functions_url = url.clone();
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub current_deployment: Option<String>,
    #[serde(default)]
    pub deployments: HashMap<String, Deployment>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid deployment config {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".flowmgr").join("config.yaml"))
    }

    pub fn get_current_deployment(&self) -> Option<(&String, &Deployment)> {
        self.current_deployment
            .as_ref()
            .and_then(|name| self.deployments.get(name).map(|d| (name, d)))
    }

    /// The deployment named on the command line, or the current one.
    ///
    /// Naming a deployment that does not exist is an error; having no
    /// current deployment is not.
    pub fn select(&self, name: Option<&str>) -> Result<Option<(&String, &Deployment)>> {
        match name {
            Some(name) => self
                .deployments
                .get_key_value(name)
                .map(Some)
                .with_context(|| format!("Deployment '{}' not found", name)),
            None => Ok(self.get_current_deployment()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(url: &str) -> Deployment {
        Deployment {
            engine_url: Some(url.to_string()),
            ..Deployment::default()
        }
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert!(config.deployments.is_empty());
        assert!(config.current_deployment.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        let mut prod = deployment("https://engine.example.com");
        prod.environment
            .insert("DATA_BUCKET".to_string(), "prod-data".to_string());
        config.deployments.insert("prod".to_string(), prod.clone());
        config.current_deployment = Some("prod".to_string());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        let (name, current) = loaded.get_current_deployment().unwrap();
        assert_eq!(name, "prod");
        assert_eq!(current, &prod);
    }

    #[test]
    fn test_select() {
        let mut config = Config::default();
        config
            .deployments
            .insert("dev".to_string(), deployment("http://dev:8083"));

        assert!(config.select(None).unwrap().is_none());
        assert_eq!(config.select(Some("dev")).unwrap().unwrap().0, "dev");
        assert!(config.select(Some("prod")).is_err());
    }

    #[test]
    fn test_apply_overrides_only_set_urls() {
        let mut manager = ManagerConfig::default();
        let original_state = manager.state_url.clone();

        deployment("http://engine:9000").apply(&mut manager);

        assert_eq!(manager.engine_url, "http://engine:9000");
        assert_eq!(manager.state_url, original_state);
    }
}
