use serde::Deserialize;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub classifier_service: ClassifierServiceConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierServiceConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

fn default_connect_retries() -> u32 {
    10
}

impl ClassifierServiceConfig {
    pub fn get_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_bytes: usize,
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * MIB,
            allowed_types: ["image/jpeg", "image/png", "image/webp", "image/gif"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl UploadConfig {
    /// Request body cap for upload routes. Leaves room for multipart framing
    /// so oversized files still reach validation and get a proper message.
    pub fn body_limit(&self) -> usize {
        self.max_bytes + MIB
    }
}

/// Caps and caption geometry for the results view.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_listed_labels: usize,
    pub max_overlays: usize,
    pub caption_height: f64,
    pub caption_gap: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_listed_labels: 5,
            max_overlays: 10,
            caption_height: 20.0,
            caption_gap: 5.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("VW")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let upload = UploadConfig::default();
        assert_eq!(upload.max_bytes, 5 * 1024 * 1024);
        assert_eq!(upload.allowed_types.len(), 4);

        let display = DisplayConfig::default();
        assert_eq!(display.max_listed_labels, 5);
        assert_eq!(display.max_overlays, 10);
        assert_eq!(display.caption_height, 20.0);
    }

    #[test]
    fn test_partial_display_section_keeps_defaults() {
        let display: DisplayConfig =
            serde_json::from_str(r#"{ "max_overlays": 3 }"#).unwrap();
        assert_eq!(display.max_overlays, 3);
        assert_eq!(display.max_listed_labels, 5);
    }

    #[test]
    fn test_classifier_address() {
        let cfg = ClassifierServiceConfig {
            host: "classifier".to_string(),
            port: 50051,
            connect_retries: 1,
        };
        assert_eq!(cfg.get_address(), "http://classifier:50051");
    }
}
