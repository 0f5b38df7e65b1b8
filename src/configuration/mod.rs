use config::{Config, ConfigError, File};
use notify::{recommended_watcher, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::net::AddrParseError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{error, info, warn};

use std::{env, net::SocketAddr};

use crate::common::types::is_valid_weight;
use crate::common::WeightError;
use crate::selection_method::{LoadBalancingAlgorithm, DEFAULT_DECREMENT};

pub const CONFIG_NAME: &str = "config";

const PRODUCTION: &str = "production";

/// Extensions `config` tries when resolving a layer name to a file.
const LAYER_EXTENSIONS: [&str; 7] = ["toml", "json", "yaml", "yml", "ini", "ron", "json5"];

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid address {value:?}: {source}")]
    InvalidAddress {
        value: String,
        source: AddrParseError,
    },
    #[error("backend {name:?}: {source}")]
    InvalidBackend { name: String, source: WeightError },
    #[error(transparent)]
    Weight(#[from] WeightError),
    #[error("failed to watch configuration: {0}")]
    Watch(#[from] notify::Error),
    #[error("required configuration {} not found", .0.display())]
    MissingLayer(PathBuf),
}

#[derive(Debug, Deserialize)]
pub struct RawSettings {
    pub listen_addr: String,
    #[serde(default)]
    pub backends: Vec<RawBackend>,
    #[serde(default)]
    pub algorithm: LoadBalancingAlgorithm,
    #[serde(default = "default_decrement")]
    pub weight_decrement: f32,
}

#[derive(Debug, Deserialize)]
pub struct RawBackend {
    pub name: String,
    pub addr: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

fn default_decrement() -> f32 {
    DEFAULT_DECREMENT
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub name: String,
    pub addr: SocketAddr,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub backends: Vec<BackendSettings>,
    pub algorithm: LoadBalancingAlgorithm,
    pub weight_decrement: f32,
}

impl Settings {
    /// Load the layers named by `$RUN_MODE` from the working directory.
    pub fn new() -> Result<Self, ConfigurationError> {
        ConfigSource::from_env().load()
    }

    pub fn from_config(config: Config) -> Result<Self, ConfigurationError> {
        let raw: RawSettings = config.try_deserialize()?;
        Self::try_from(raw)
    }
}

/// Where the settings come from: `$RUN_MODE` (optional) layered under
/// `config`, which is required when running in production.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSource {
    pub dir: PathBuf,
    pub run_mode: String,
}

impl ConfigSource {
    pub fn new(dir: impl Into<PathBuf>, run_mode: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            run_mode: run_mode.into(),
        }
    }

    pub fn from_env() -> Self {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::new(".", run_mode)
    }

    /// Layer names in load order, with whether each one must exist.
    fn layers(&self) -> [(PathBuf, bool); 2] {
        [
            (self.dir.join(&self.run_mode), false),
            (self.dir.join(CONFIG_NAME), self.run_mode == PRODUCTION),
        ]
    }

    pub fn load(&self) -> Result<Settings, ConfigurationError> {
        let mut builder = Config::builder();
        for (name, required) in self.layers() {
            builder = builder.add_source(File::with_name(&name.to_string_lossy()).required(required));
        }

        Settings::from_config(builder.build()?)
    }

    /// Watch every layer that exists and send freshly loaded settings on each
    /// change. Missing optional layers are skipped.
    pub fn watch(
        &self,
    ) -> Result<(RecommendedWatcher, UnboundedReceiver<Settings>), ConfigurationError> {
        let (tx, rx) = unbounded_channel();
        let source = self.clone();

        let mut watcher: RecommendedWatcher =
            recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) if event.kind.is_modify() => match source.load() {
                    Ok(new_settings) => {
                        if let Err(e) = tx.send(new_settings) {
                            error!("Error sending new config: {:?}", e);
                        }
                    }
                    Err(e) => error!("Error reloading config: {}", e),
                },
                Ok(_) => {}
                Err(e) => error!("Watch error: {:?}", e),
            })?;

        for (name, required) in self.layers() {
            match resolve_layer(&name) {
                Some(path) => {
                    watcher.watch(&path, RecursiveMode::NonRecursive)?;
                    info!("Watching {} for changes", path.display());
                }
                None if required => return Err(ConfigurationError::MissingLayer(name)),
                None => warn!("No configuration layer {}, not watching it", name.display()),
            }
        }

        Ok((watcher, rx))
    }
}

fn resolve_layer(name: &Path) -> Option<PathBuf> {
    LAYER_EXTENSIONS
        .iter()
        .map(|ext| {
            let mut file = name.as_os_str().to_owned();
            file.push(".");
            file.push(ext);
            PathBuf::from(file)
        })
        .find(|path| path.is_file())
}

impl TryFrom<RawSettings> for Settings {
    type Error = ConfigurationError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let listen_addr = parse_addr(&raw.listen_addr)?;

        if !is_valid_weight(raw.weight_decrement) {
            return Err(WeightError::InvalidDecrement(raw.weight_decrement).into());
        }

        let backends = raw
            .backends
            .into_iter()
            .map(|backend| {
                if !is_valid_weight(backend.weight) {
                    return Err(ConfigurationError::InvalidBackend {
                        name: backend.name,
                        source: WeightError::InvalidWeight(backend.weight),
                    });
                }
                Ok(BackendSettings {
                    addr: parse_addr(&backend.addr)?,
                    name: backend.name,
                    weight: backend.weight,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            listen_addr,
            backends,
            algorithm: raw.algorithm,
            weight_decrement: raw.weight_decrement,
        })
    }
}

fn parse_addr(value: &str) -> Result<SocketAddr, ConfigurationError> {
    value
        .parse()
        .map_err(|source| ConfigurationError::InvalidAddress {
            value: value.to_string(),
            source,
        })
}
