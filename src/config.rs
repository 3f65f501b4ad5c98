use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::ProviderKind;
use crate::render::QualityPreset;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderKind,
    /// Model id; `None` means the provider's default
    pub model: Option<String>,
    /// Stored API keys by provider name
    pub api_keys: BTreeMap<String, String>,
    pub output_dir: PathBuf,
    pub default_quality: QualityPreset,
    pub max_attempts: u32,
    pub auto_preview: bool,
    pub verbose: bool,
    pub llm: LlmConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub ollama_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120000,
            max_tokens: 4096,
            temperature: 0.2,
            ollama_url: crate::llm::ollama::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Rendering engine executable
    pub engine: String,
    pub timeout_ms: u64,
    /// Where candidate scripts are written before rendering
    pub cache_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: "manim".to_string(),
            timeout_ms: 300000,
            cache_dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("manimator")
                .join("scripts"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            api_keys: BTreeMap::new(),
            output_dir: default_output_dir(),
            default_quality: QualityPreset::default(),
            max_attempts: 3,
            auto_preview: false,
            verbose: false,
            llm: LlmConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Videos")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("manimator")
}

/// Per-invocation values from the command line; each one wins over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub quality: Option<QualityPreset>,
    pub max_attempts: Option<u32>,
    pub preview: bool,
    pub verbose: bool,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            if !path.exists() {
                log::info!("Config {} does not exist yet, using defaults", path.display());
                return Ok(Self::default());
            }
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        if let Some(primary_config) = Self::user_config_path() {
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// `~/.config/manimator/manimator.yml`
    pub fn user_config_path() -> Option<PathBuf> {
        let project_name = env!("CARGO_PKG_NAME");
        dirs::config_dir().map(|dir| dir.join(project_name).join(format!("{}.yml", project_name)))
    }

    /// Persist to `path`, or to the user config location
    pub fn save(&self, path: Option<&PathBuf>) -> Result<PathBuf> {
        self.validate()?;

        let target = match path {
            Some(p) => p.clone(),
            None => Self::user_config_path().ok_or_else(|| eyre::eyre!("No config directory on this platform"))?,
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(&target, content).context(format!("Failed to write {}", target.display()))?;

        // the file may hold API keys
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&target, fs::Permissions::from_mode(0o600))
                .context("Failed to restrict config permissions")?;
        }

        log::info!("Saved config to: {}", target.display());
        Ok(target)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            eyre::bail!("max_attempts must be at least 1");
        }
        if self.render.timeout_ms == 0 {
            eyre::bail!("render.timeout_ms must be > 0");
        }
        if self.llm.timeout_ms == 0 {
            eyre::bail!("llm.timeout_ms must be > 0");
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the loaded file
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(provider) = overrides.provider {
            if provider != self.provider {
                // a model chosen for another provider would not make sense here
                self.model = None;
            }
            self.provider = provider;
        }
        if let Some(model) = &overrides.model {
            self.model = Some(model.clone());
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(quality) = overrides.quality {
            self.default_quality = quality;
        }
        if let Some(attempts) = overrides.max_attempts {
            self.max_attempts = attempts;
        }
        self.auto_preview |= overrides.preview;
        self.verbose |= overrides.verbose;
        self.validate()?;
        Ok(self)
    }

    pub fn model_for(&self, kind: ProviderKind) -> String {
        match &self.model {
            Some(model) if kind == self.provider => model.clone(),
            _ => kind.default_model().to_string(),
        }
    }

    /// Stored key first, then the provider's environment variable
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        if let Some(key) = self.api_keys.get(kind.as_str()).filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        kind.api_key_env()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }

    pub fn set_api_key(&mut self, kind: ProviderKind, key: impl Into<String>) {
        self.api_keys.insert(kind.as_str().to_string(), key.into());
    }

    /// Key for display: first 8 and last 4 characters
    pub fn masked_key(&self, kind: ProviderKind) -> String {
        match self.api_key(kind) {
            Some(key) if key.chars().count() > 12 => {
                let chars: Vec<char> = key.chars().collect();
                let head: String = chars[..8].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{}...{}", head, tail)
            }
            Some(_) => "***".to_string(),
            None => "(not set)".to_string(),
        }
    }
}
