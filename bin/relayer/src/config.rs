use alloy_primitives::Address;
use config::{ConfigError, MintParams, RelayParams, DEFAULT_MINT_GAS_LIMIT};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DEFAULT_STATE_FILE: &str = "scanner_state.json";

/// Top-level relayer configuration.
///
/// Read from a TOML file, then overridden by environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source chain RPC endpoint url
    pub source_rpc_url: String,

    /// Destination chain RPC endpoint url
    pub destination_rpc_url: String,

    /// Bridge contract emitting `TokensLocked` on the source chain
    pub source_bridge_address: Address,

    /// Bridge contract exposing `mintTokens` on the destination chain
    pub destination_bridge_address: Address,

    /// Token locked by the source bridge. Recorded on every deposit, the
    /// zero address when unknown.
    pub source_token_address: Address,

    /// Checkpoint file
    pub state_file: PathBuf,

    /// First block to scan when no checkpoint exists. When unset, scanning
    /// starts at the current safe head.
    pub start_block: Option<u64>,

    /// Destination chain id. Fetched from the destination RPC when unset.
    pub destination_chain_id: Option<u64>,

    pub gas_limit: u64,

    /// Fetched once from the destination RPC when unset
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,

    /// Serve Prometheus metrics on this port
    pub metrics_port: Option<u16>,

    pub relay: RelayParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_rpc_url: String::new(),
            destination_rpc_url: String::new(),
            source_bridge_address: Address::ZERO,
            destination_bridge_address: Address::ZERO,
            source_token_address: Address::ZERO,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            start_block: None,
            destination_chain_id: None,
            gas_limit: DEFAULT_MINT_GAS_LIMIT,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            metrics_port: None,
            relay: RelayParams::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;

        Ok(config)
    }

    /// Load `path` if it exists (defaults otherwise), apply environment
    /// overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Override settings from environment variables, looked up via `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("SOURCE_CHAIN_RPC_URL") {
            self.source_rpc_url = url;
        }
        if let Some(url) = var("DESTINATION_CHAIN_RPC_URL") {
            self.destination_rpc_url = url;
        }
        if let Some(v) = var("SOURCE_BRIDGE_CONTRACT_ADDRESS") {
            self.source_bridge_address = parse("SOURCE_BRIDGE_CONTRACT_ADDRESS", &v)?;
        }
        if let Some(v) = var("DESTINATION_BRIDGE_CONTRACT_ADDRESS") {
            self.destination_bridge_address = parse("DESTINATION_BRIDGE_CONTRACT_ADDRESS", &v)?;
        }
        if let Some(v) = var("SOURCE_TOKEN_ADDRESS") {
            self.source_token_address = parse("SOURCE_TOKEN_ADDRESS", &v)?;
        }
        if let Some(v) = var("BLOCK_CONFIRMATIONS_REQUIRED") {
            self.relay.block_confirmations_required = parse("BLOCK_CONFIRMATIONS_REQUIRED", &v)?;
        }
        if let Some(v) = var("SCAN_BATCH_SIZE") {
            self.relay.scan_batch_size = parse("SCAN_BATCH_SIZE", &v)?;
        }
        if let Some(v) = var("POLL_INTERVAL_SECONDS") {
            self.relay.poll_interval_secs = parse("POLL_INTERVAL_SECONDS", &v)?;
        }
        if let Some(path) = var("STATE_FILE") {
            self.state_file = PathBuf::from(path);
        }
        if let Some(v) = var("START_BLOCK") {
            self.start_block = Some(parse("START_BLOCK", &v)?);
        }
        if let Some(v) = var("DESTINATION_CHAIN_ID") {
            self.destination_chain_id = Some(parse("DESTINATION_CHAIN_ID", &v)?);
        }
        if let Some(v) = var("METRICS_PORT") {
            self.metrics_port = Some(parse("METRICS_PORT", &v)?);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_rpc_url.trim().is_empty() {
            return Err(ConfigError::Missing("source_rpc_url"));
        }
        if self.destination_rpc_url.trim().is_empty() {
            return Err(ConfigError::Missing("destination_rpc_url"));
        }
        if self.source_bridge_address.is_zero() {
            return Err(ConfigError::Missing("source_bridge_address"));
        }
        if self.destination_bridge_address.is_zero() {
            return Err(ConfigError::Missing("destination_bridge_address"));
        }
        if self.start_block == Some(0) {
            return Err(ConfigError::ZeroStartBlock);
        }
        if self.gas_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "gas_limit",
                reason: "must be at least 1".into(),
            });
        }
        if let (Some(max_fee), Some(priority_fee)) =
            (self.max_fee_per_gas, self.max_priority_fee_per_gas)
        {
            if max_fee < priority_fee {
                return Err(ConfigError::FeeInversion {
                    max_fee,
                    priority_fee,
                });
            }
        }
        self.relay.validate()
    }

    /// Mint parameters, if everything is configured and nothing has to be
    /// fetched from the destination chain.
    pub fn mint_params(&self) -> Option<MintParams> {
        Some(
            MintParams::new(
                self.destination_chain_id?,
                self.max_fee_per_gas?,
                self.max_priority_fee_per_gas?,
            )
            .with_gas_limit(self.gas_limit),
        )
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
source_rpc_url = "https://sepolia.example"
destination_rpc_url = "https://amoy.example"
source_bridge_address = "0x1111111111111111111111111111111111111111"
destination_bridge_address = "0x2222222222222222222222222222222222222222"
start_block = 4500101

[relay]
scan_batch_size = 100
"#;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(
            config.source_bridge_address,
            address!("0x1111111111111111111111111111111111111111")
        );
        assert_eq!(config.start_block, Some(4_500_101));
        assert_eq!(config.relay.scan_batch_size, 100);
        assert_eq!(config.relay.block_confirmations_required, 12);
        assert_eq!(config.state_file, PathBuf::from(DEFAULT_STATE_FILE));
        assert_eq!(config.gas_limit, 200_000);
        assert_eq!(config.source_token_address, Address::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_token_address() {
        let toml = SAMPLE.replacen(
            "start_block",
            "source_token_address = \"0x7070707070707070707070707070707070707070\"\nstart_block",
            1,
        );
        let mut config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.source_token_address, Address::repeat_byte(0x70));

        config
            .apply_env(env(&[(
                "SOURCE_TOKEN_ADDRESS",
                "0x7171717171717171717171717171717171717171",
            )]))
            .unwrap();
        assert_eq!(config.source_token_address, Address::repeat_byte(0x71));

        let err = config
            .apply_env(env(&[("SOURCE_TOKEN_ADDRESS", "0x71")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "SOURCE_TOKEN_ADDRESS",
                ..
            }
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config
            .apply_env(env(&[
                ("BLOCK_CONFIRMATIONS_REQUIRED", "6"),
                ("SCAN_BATCH_SIZE", "250"),
                ("POLL_INTERVAL_SECONDS", "5"),
                ("STATE_FILE", "/var/lib/relayer/state.json"),
                ("START_BLOCK", ""),
            ]))
            .unwrap();

        assert_eq!(config.relay.block_confirmations_required, 6);
        assert_eq!(config.relay.scan_batch_size, 250);
        assert_eq!(config.relay.poll_interval_secs, 5);
        assert_eq!(config.state_file, PathBuf::from("/var/lib/relayer/state.json"));
        // empty values are ignored
        assert_eq!(config.start_block, Some(4_500_101));
    }

    #[test]
    fn test_env_only() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("SOURCE_CHAIN_RPC_URL", "http://localhost:8545"),
                ("DESTINATION_CHAIN_RPC_URL", "http://localhost:9545"),
                (
                    "SOURCE_BRIDGE_CONTRACT_ADDRESS",
                    "0x1111111111111111111111111111111111111111",
                ),
                (
                    "DESTINATION_BRIDGE_CONTRACT_ADDRESS",
                    "0x2222222222222222222222222222222222222222",
                ),
            ]))
            .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.start_block, None);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("SCAN_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "SCAN_BATCH_SIZE",
                ..
            }
        ));
    }

    #[test]
    fn test_validation() {
        let valid: Config = toml::from_str(SAMPLE).unwrap();

        let config = Config::default();
        assert_eq!(config.validate(), Err(ConfigError::Missing("source_rpc_url")));

        let config = Config {
            destination_bridge_address: Address::ZERO,
            ..valid.clone()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Missing("destination_bridge_address"))
        );

        let config = Config {
            start_block: Some(0),
            ..valid.clone()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroStartBlock));

        let mut config = valid.clone();
        config.relay.block_confirmations_required = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroConfirmations));

        let config = Config {
            max_fee_per_gas: Some(1),
            max_priority_fee_per_gas: Some(2),
            ..valid
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::FeeInversion { .. })
        ));
    }

    #[test]
    fn test_mint_params_require_all_fields() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.mint_params(), None);

        config.destination_chain_id = Some(80_002);
        config.max_fee_per_gas = Some(30_000_000_000);
        config.max_priority_fee_per_gas = Some(1_000_000_000);
        let params = config.mint_params().unwrap();
        assert_eq!(params.chain_id, 80_002);
        assert_eq!(params.gas_limit, 200_000);
    }
}
