use config::{Config, ConfigError};
use serde::Deserialize;

pub mod calendar;
pub mod domain;
pub mod loader;
pub mod navigation;
pub mod refresh;
pub mod remote;

#[derive(Clone, Debug, Deserialize)]
pub struct OtasukeConfig {
    pub backend: Backend,
    pub customer: Customer,
    pub logger: Logger,
    #[serde(default)]
    pub screen: Screen,
}

impl OtasukeConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("OTASUKE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize::<OtasukeConfig>()?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let density = self.screen.density;
        if !density.is_finite() || density <= 0.0 {
            return Err(ConfigError::Message(format!(
                "screen.density must be a positive number: {}",
                density
            )));
        }
        Ok(self)
    }
}

/// バックエンド接続設定
#[derive(Clone, Debug, Deserialize)]
pub struct Backend {
    pub url: String,
    pub api_key: String,
}

/// ログインしているお客様
#[derive(Clone, Debug, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Logger {
    pub level: Level,
}

/// 画面設定
#[derive(Clone, Debug, Deserialize)]
pub struct Screen {
    pub density: f32,
}

impl Default for Screen {
    fn default() -> Self {
        Self { density: 1.0 }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub enum Level {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}

impl From<&Level> for tracing::Level {
    fn from(value: &Level) -> Self {
        match value {
            Level::TRACE => tracing::Level::TRACE,
            Level::DEBUG => tracing::Level::DEBUG,
            Level::INFO => tracing::Level::INFO,
            Level::WARN => tracing::Level::WARN,
            Level::ERROR => tracing::Level::ERROR,
        }
    }
}
