use crate::error::{ImportError, Result};
use crate::pipeline::{PipelineConfig, StageConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One import profile: where results go and which stages run
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    pub profile: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    pub stages: Vec<StageConfig>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl ProfileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            ImportError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: ProfileConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::new(&self.profile, self.stages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_profile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        fs::write(
            &path,
            r#"
            profile = "supplier_feed"

            [[stages]]
            type = "source"
            path = "feed.json"

            [[stages]]
            type = "disabler"
            mode = "out_of_stock"
            "#,
        )
        .unwrap();

        let config = ProfileConfig::load(&path).unwrap();
        assert_eq!(config.profile, "supplier_feed");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.stages.len(), 2);
        assert!(config.pipeline_config().validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = ProfileConfig::load(Path::new("/nonexistent/profile.toml")).unwrap_err();
        assert!(matches!(err, ImportError::Config(_)));
    }
}
