use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the authoritative ledger
    pub postgres_url: String,
    /// MongoDB balance cache (optional; an in-process cache is used when
    /// disabled or unreachable)
    #[serde(default)]
    pub mongo: MongoConfig,
    pub flutterwave: FlutterwaveConfig,
    /// Shared secret for validating identity-service JWTs
    pub jwt_secret: String,
    /// Base URL the payment gateway redirects users back to
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MongoConfig {
    pub enabled: bool,
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            uri: "mongodb://localhost:27017".to_string(),
            database: "dailywin".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlutterwaveConfig {
    #[serde(default = "default_flutterwave_base_url")]
    pub base_url: String,
    pub secret_key: String,
    /// Shared secret for webhook signature verification
    pub webhook_secret: String,
}

fn default_flutterwave_base_url() -> String {
    "https://api.flutterwave.com/v3".to_string()
}

fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
