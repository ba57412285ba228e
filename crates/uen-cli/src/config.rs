//! Settings resolution: command-line flag, then `--config` file, then the
//! built-in deployment defaults. The signing key only ever comes from the
//! environment.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uen_ledger::{Address, GasConfig, ReceiptWait};
use uen_opendata::OpenDataConfig;
use uen_reconcile::RetryPolicy;

pub const SIGNER_KEY_ENV: &str = "UEN_SIGNER_KEY";

pub const DEFAULT_RPC_URL: &str = "https://rpc-evm-sidechain.xrpl.org";
pub const DEFAULT_CONTRACT: &str = "0x228dfCFf73CcF0a65034aA55621122a5aaD49FE7";
pub const DEFAULT_ABI_PATH: &str = "abi/uen_management.json";
pub const DEFAULT_DATA_ROOT: &str = "uen_data";
pub const DEFAULT_LIMIT: usize = 200;

/// Shape of the optional JSON config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub rpc_url: Option<String>,
    pub contract: Option<String>,
    pub abi_path: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
    pub limit: Option<usize>,
    pub use_sample: Option<bool>,
    pub rpc_timeout_secs: Option<u64>,
    pub receipt_timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub gas: Option<GasConfig>,
    pub retry: Option<RetryFile>,
    pub opendata: Option<OpenDataFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryFile {
    pub quarantine_after: Option<usize>,
    pub max_consecutive_failures: Option<usize>,
    pub max_duration_secs: Option<u64>,
    pub max_remote_read_failures: Option<usize>,
    pub remote_read_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenDataFile {
    pub base_url: Option<String>,
    pub datastore_url: Option<String>,
    pub delay_ms: Option<u64>,
    pub page_size: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        path.map(Self::load).transpose().map(Option::unwrap_or_default)
    }
}

/// Connection flags shared by every command that talks to the chain.
#[derive(Args, Debug, Clone, Default)]
pub struct ChainArgs {
    /// EVM JSON-RPC endpoint [default: https://rpc-evm-sidechain.xrpl.org]
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Registry contract address [default: 0x228dfCFf73CcF0a65034aA55621122a5aaD49FE7]
    #[arg(long)]
    pub contract: Option<String>,

    /// Contract ABI (artifact `{"abi": [...]}` or a bare array) [default: abi/uen_management.json]
    #[arg(long)]
    pub abi: Option<PathBuf>,

    /// Per-request RPC timeout in seconds [default: 30]
    #[arg(long)]
    pub rpc_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub contract: Address,
    pub abi_path: PathBuf,
    pub rpc_timeout: Duration,
    pub receipt_wait: ReceiptWait,
    pub gas: GasConfig,
}

impl ChainConfig {
    pub fn resolve(args: &ChainArgs, file: &FileConfig) -> Result<Self> {
        let contract = args
            .contract
            .clone()
            .or_else(|| file.contract.clone())
            .unwrap_or_else(|| DEFAULT_CONTRACT.to_string());
        let contract: Address = contract
            .parse()
            .map_err(|e| anyhow!("invalid contract address {contract}: {e}"))?;

        let defaults = ReceiptWait::default();
        Ok(Self {
            rpc_url: args
                .rpc_url
                .clone()
                .or_else(|| file.rpc_url.clone())
                .unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            contract,
            abi_path: args
                .abi
                .clone()
                .or_else(|| file.abi_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ABI_PATH)),
            rpc_timeout: Duration::from_secs(
                args.rpc_timeout_secs.or(file.rpc_timeout_secs).unwrap_or(30),
            ),
            receipt_wait: ReceiptWait {
                timeout: file
                    .receipt_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
                poll_interval: file
                    .poll_interval_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.poll_interval),
            },
            gas: file.gas.unwrap_or_default(),
        })
    }
}

/// The signing key from `UEN_SIGNER_KEY`, if set and non-empty.
pub fn signer_key_from_env() -> Option<String> {
    env::var(SIGNER_KEY_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

pub fn retry_policy(file: &FileConfig) -> RetryPolicy {
    let defaults = RetryPolicy::default();
    let Some(retry) = &file.retry else {
        return defaults;
    };
    RetryPolicy {
        quarantine_after: retry.quarantine_after.unwrap_or(defaults.quarantine_after),
        max_consecutive_failures: retry
            .max_consecutive_failures
            .unwrap_or(defaults.max_consecutive_failures),
        max_duration: retry
            .max_duration_secs
            .map(Duration::from_secs)
            .or(defaults.max_duration),
        max_remote_read_failures: retry
            .max_remote_read_failures
            .unwrap_or(defaults.max_remote_read_failures),
        remote_read_delay: retry
            .remote_read_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.remote_read_delay),
    }
}

pub fn opendata_config(file: &FileConfig) -> OpenDataConfig {
    let mut config = OpenDataConfig::default();
    if let Some(od) = &file.opendata {
        if let Some(base) = &od.base_url {
            config.base_url = base.clone();
        }
        if let Some(url) = &od.datastore_url {
            config.datastore_url = url.clone();
        }
        if let Some(ms) = od.delay_ms {
            config.delay = Duration::from_millis(ms);
        }
        if let Some(size) = od.page_size {
            config.page_size = size;
        }
    }
    config
}

pub fn data_root(flag: Option<&Path>, file: &FileConfig) -> PathBuf {
    flag.map(Path::to_path_buf)
        .or_else(|| file.data_root.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT))
}

/// `--full` wins; otherwise the config file; otherwise sample data.
pub fn use_sample(full_flag: bool, file: &FileConfig) -> bool {
    !full_flag && file.use_sample.unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_without_file_or_flags() {
        let chain = ChainConfig::resolve(&ChainArgs::default(), &FileConfig::default()).unwrap();
        assert_eq!(chain.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(chain.contract.to_string(), DEFAULT_CONTRACT);
        assert_eq!(chain.abi_path, PathBuf::from(DEFAULT_ABI_PATH));
        assert_eq!(chain.gas, GasConfig::default());
        assert_eq!(retry_policy(&FileConfig::default()), RetryPolicy::default());
    }

    #[test]
    fn flag_beats_file_beats_default() {
        let f = write_config(
            r#"{"rpc_url": "http://file:8545", "abi_path": "file.json", "limit": 50,
                "retry": {"quarantine_after": 0}, "gas": {"gas_limit": null,
                "max_fee_per_gas": 7, "max_priority_fee_per_gas": 1}}"#,
        );
        let file = FileConfig::load(f.path()).unwrap();
        let args = ChainArgs {
            rpc_url: Some("http://flag:8545".into()),
            ..ChainArgs::default()
        };
        let chain = ChainConfig::resolve(&args, &file).unwrap();

        assert_eq!(chain.rpc_url, "http://flag:8545");
        assert_eq!(chain.abi_path, PathBuf::from("file.json"));
        assert_eq!(chain.gas.gas_limit, None);
        assert_eq!(chain.gas.max_fee_per_gas, 7);
        assert_eq!(file.limit, Some(50));
        assert_eq!(retry_policy(&file).quarantine_after, 0);
        assert_eq!(retry_policy(&file).max_consecutive_failures, 32);
    }

    #[test]
    fn unknown_keys_and_bad_addresses_are_rejected() {
        let f = write_config(r#"{"rpc": "http://typo"}"#);
        assert!(FileConfig::load(f.path()).is_err());

        let args = ChainArgs {
            contract: Some("0x1234".into()),
            ..ChainArgs::default()
        };
        assert!(ChainConfig::resolve(&args, &FileConfig::default()).is_err());
    }

    #[test]
    fn sample_is_the_default_data_source() {
        let file = FileConfig::default();
        assert!(use_sample(false, &file));
        assert!(!use_sample(true, &file));
        let full = FileConfig {
            use_sample: Some(false),
            ..FileConfig::default()
        };
        assert!(!use_sample(false, &full));
        assert_eq!(data_root(None, &file), PathBuf::from("uen_data"));
    }
}
