use std::{env, fmt::Debug, net::SocketAddr};

use anyhow::Result;
use content_store::PinningConfig;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub structured_logging: bool,
    /// Directory for spooling inbound files before pinning.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default)]
    pub content_store: PinningConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

fn default_env() -> String {
    "dev".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_upload_dir() -> String {
    env::current_dir()
        .unwrap()
        .join("chainpin_storage/uploads")
        .to_str()
        .unwrap()
        .to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            env: default_env(),
            listen_addr: default_listen_addr(),
            structured_logging: false,
            upload_dir: default_upload_dir(),
            content_store: PinningConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        let config: ServerConfig = Figment::new().merge(Yaml::string(&config_str)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        let contract = &self.ledger.contract_address;
        if contract.is_empty() {
            return Err(anyhow::anyhow!("ledger contract_address is required"));
        }
        if !contract.starts_with("0x") || contract.len() != 42 {
            return Err(anyhow::anyhow!(
                "invalid ledger contract_address: {}",
                contract
            ));
        }
        if self.upload_dir.is_empty() {
            return Err(anyhow::anyhow!("upload_dir is required"));
        }
        Ok(())
    }
}
