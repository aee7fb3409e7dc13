use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub cluster: Option<ClusterConfig>,
    #[serde(default)]
    pub iam_role: Option<IamRoleConfig>,
    pub s3: S3Config,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
}

/// Connection parameters of the Redshift cluster.
#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    pub host: String,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IamRoleConfig {
    pub arn: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    pub log_data: String,
    pub song_data: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Caps the songs, artists and songplays record sets. Unset means no cap.
    #[serde(default)]
    pub row_limit: Option<usize>,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub engine: Engine,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Redshift,
    Local,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            row_limit: None,
            insert_batch_size: default_insert_batch_size(),
        }
    }
}

fn default_db_port() -> u16 {
    5439
}

fn default_s3_region() -> String {
    "us-west-2".to_string()
}

fn default_insert_batch_size() -> usize {
    500
}

impl ClusterConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        Self::load(path, environment())
    }

    fn load(path: &str, env: Environment) -> Result<Self, ConfigError> {
        let builder = Config::builder();
        let builder = match FileKind::of(path) {
            FileKind::LegacyIni => {
                let contents = std::fs::read_to_string(path).map_err(|e| {
                    ConfigError::Message(format!("Cannot read config file {}: {}", path, e))
                })?;
                let contents = lowercase_ini_names(&contents);
                builder.add_source(File::from_str(&contents, FileFormat::Ini))
            }
            FileKind::Toml => builder.add_source(File::new(path, FileFormat::Toml)),
            FileKind::Other => builder.add_source(File::with_name(path).format(FileFormat::Toml)),
        };

        // Build the configuration
        let config = builder.add_source(env).build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;

        debug!(
            engine = ?settings.warehouse.engine,
            log_data = %settings.s3.log_data,
            song_data = %settings.s3.song_data,
            row_limit = ?settings.pipeline.row_limit,
            "Parsed settings"
        );

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.insert_batch_size == 0 {
            return Err(ConfigError::Message(
                "pipeline.insert_batch_size must be at least 1".to_string(),
            ));
        }
        if self.warehouse.engine == Engine::Redshift && self.cluster.is_none() {
            return Err(ConfigError::NotFound("cluster".to_string()));
        }
        Ok(())
    }
}

/// Overrides such as `DWH_CLUSTER__DB_PASSWORD`.
fn environment() -> Environment {
    Environment::with_prefix("DWH")
        .prefix_separator("_")
        .separator("__")
}

enum FileKind {
    LegacyIni,
    Toml,
    Other,
}

impl FileKind {
    fn of(path: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("cfg") | Some("ini") => FileKind::LegacyIni,
            Some("toml") => FileKind::Toml,
            _ => FileKind::Other,
        }
    }
}

// Legacy `dwh.cfg` files spell sections and keys in upper case. Values keep
// their case.
fn lowercase_ini_names(contents: &str) -> String {
    contents
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with('[') {
                return line.to_ascii_lowercase();
            }
            if trimmed.starts_with(';') || trimmed.starts_with('#') {
                return line.to_string();
            }
            match line.find(['=', ':']) {
                Some(idx) => format!("{}{}", line[..idx].to_ascii_lowercase(), &line[idx..]),
                None => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
