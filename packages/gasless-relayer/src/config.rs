//! Relayer configuration.
//!
//! Amounts are integer base units: lamports for the native currency, raw token
//! units (scaled by `token_decimals`) for the fee token.

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Top-level relayer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    /// Base58 64-byte custodial keypair. Highest-priority key source.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Solana CLI keypair file (JSON byte array).
    #[serde(default)]
    pub keypair_path: Option<String>,

    /// AES-256-GCM key store; key comes from `RELAYER_KEYSTORE_KEY`.
    #[serde(default)]
    pub keystore_path: Option<String>,

    /// Mint of the token users pay fees in.
    #[serde(default)]
    pub token_mint: String,

    #[serde(default = "defaults::token_decimals")]
    pub token_decimals: u8,

    /// Receives swept tokens and native surplus.
    #[serde(default)]
    pub operator_address: String,

    #[serde(default = "defaults::pool_service_url")]
    pub pool_service_url: String,

    #[serde(default = "defaults::aggregator_url")]
    pub aggregator_url: String,

    /// Probe and decide, but never move operator funds.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub admission: AdmissionConfig,

    #[serde(default)]
    pub surplus: SurplusConfig,
}

/// Scheduled native-balance upkeep.
#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "defaults::period_secs")]
    pub period_secs: u64,
    #[serde(default = "defaults::floor_lamports")]
    pub floor_lamports: u64,
    #[serde(default = "defaults::target_lamports")]
    pub target_lamports: u64,
    /// Per-attempt faucet cap.
    #[serde(default = "defaults::max_top_up_lamports")]
    pub max_top_up_lamports: u64,
    #[serde(default = "defaults::safety_margin_lamports")]
    pub safety_margin_lamports: u64,
    /// Deficits smaller than this are not worth a faucet request.
    #[serde(default = "defaults::min_top_up_lamports")]
    pub min_top_up_lamports: u64,
    #[serde(default = "defaults::settle_delay_ms")]
    pub settle_delay_ms: u64,
}

/// Fee-token disposal.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Kept on hand; never swept.
    #[serde(default = "defaults::reserve_amount")]
    pub reserve_amount: u64,
    /// Excess above reserve must be strictly greater than this to sweep.
    #[serde(default = "defaults::threshold_amount")]
    pub threshold_amount: u64,
    #[serde(default = "defaults::canary_amount")]
    pub canary_amount: u64,
    #[serde(default = "defaults::slippage_bps")]
    pub slippage_bps: u16,
}

/// Per-request solvency gate.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default = "defaults::critical_floor_lamports")]
    pub critical_floor_lamports: u64,
    #[serde(default = "defaults::recovery_target_lamports")]
    pub recovery_target_lamports: u64,
    /// Admit requests when the balance cannot be read.
    #[serde(default = "defaults::fail_open")]
    pub fail_open: bool,
}

/// Native surplus distribution to the operator.
#[derive(Debug, Clone, Deserialize)]
pub struct SurplusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "defaults::surplus_ceiling_lamports")]
    pub ceiling_lamports: u64,
    #[serde(default = "defaults::surplus_min_transfer_lamports")]
    pub min_transfer_lamports: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            fallback_rpc_url: defaults::fallback_rpc_url(),
            bind_address: defaults::bind_address(),
            secret_key: None,
            keypair_path: None,
            keystore_path: None,
            token_mint: String::new(),
            token_decimals: defaults::token_decimals(),
            operator_address: String::new(),
            pool_service_url: defaults::pool_service_url(),
            aggregator_url: defaults::aggregator_url(),
            dry_run: false,
            maintenance: MaintenanceConfig::default(),
            sweep: SweepConfig::default(),
            admission: AdmissionConfig::default(),
            surplus: SurplusConfig::default(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            period_secs: defaults::period_secs(),
            floor_lamports: defaults::floor_lamports(),
            target_lamports: defaults::target_lamports(),
            max_top_up_lamports: defaults::max_top_up_lamports(),
            safety_margin_lamports: defaults::safety_margin_lamports(),
            min_top_up_lamports: defaults::min_top_up_lamports(),
            settle_delay_ms: defaults::settle_delay_ms(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            reserve_amount: defaults::reserve_amount(),
            threshold_amount: defaults::threshold_amount(),
            canary_amount: defaults::canary_amount(),
            slippage_bps: defaults::slippage_bps(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            critical_floor_lamports: defaults::critical_floor_lamports(),
            recovery_target_lamports: defaults::recovery_target_lamports(),
            fail_open: defaults::fail_open(),
        }
    }
}

impl Default for SurplusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ceiling_lamports: defaults::surplus_ceiling_lamports(),
            min_transfer_lamports: defaults::surplus_min_transfer_lamports(),
        }
    }
}

impl Config {
    /// Reject configurations the fund manager cannot run with.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let m = &self.maintenance;
        let a = &self.admission;
        if m.floor_lamports >= m.target_lamports {
            return Err(crate::Error::Config(format!(
                "maintenance floor ({}) must be below target ({})",
                m.floor_lamports, m.target_lamports
            )));
        }
        if a.critical_floor_lamports >= m.floor_lamports {
            return Err(crate::Error::Config(format!(
                "critical floor ({}) must be below maintenance floor ({})",
                a.critical_floor_lamports, m.floor_lamports
            )));
        }
        if a.critical_floor_lamports >= a.recovery_target_lamports {
            return Err(crate::Error::Config(format!(
                "critical floor ({}) must be below recovery target ({})",
                a.critical_floor_lamports, a.recovery_target_lamports
            )));
        }
        if m.max_top_up_lamports == 0 {
            return Err(crate::Error::Config("max_top_up_lamports must be > 0".into()));
        }
        // A full top-up lands at target + margin; a lower ceiling would forward it.
        let topped_up = m.target_lamports.saturating_add(m.safety_margin_lamports);
        if self.surplus.enabled && self.surplus.ceiling_lamports < topped_up {
            return Err(crate::Error::Config(format!(
                "surplus ceiling ({}) must be at least target + safety margin ({topped_up})",
                self.surplus.ceiling_lamports
            )));
        }
        if m.period_secs == 0 {
            return Err(crate::Error::Config("period_secs must be > 0".into()));
        }
        self.token_mint()?;
        self.operator()?;
        Ok(())
    }

    pub fn token_mint(&self) -> Result<Pubkey, crate::Error> {
        parse_pubkey("token_mint", &self.token_mint)
    }

    pub fn operator(&self) -> Result<Pubkey, crate::Error> {
        parse_pubkey("operator_address", &self.operator_address)
    }
}

impl MaintenanceConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, crate::Error> {
    if value.is_empty() {
        return Err(crate::Error::Config(format!("{field} is required")));
    }
    Pubkey::from_str(value)
        .map_err(|e| crate::Error::Config(format!("Invalid {field} '{value}': {e}")))
}

mod defaults {
    use super::LAMPORTS_PER_SOL;

    /// One whole token at the default 9 decimals.
    const TOKEN_UNIT: u64 = 1_000_000_000;

    pub fn rpc_url() -> String {
        std::env::var("RELAYER_RPC_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "https://api.devnet.solana.com".into())
    }

    pub fn fallback_rpc_url() -> String {
        "https://rpc.ankr.com/solana_devnet".into()
    }

    pub fn bind_address() -> String {
        "0.0.0.0:3000".into()
    }

    pub fn token_decimals() -> u8 {
        9
    }

    pub fn pool_service_url() -> String {
        "http://127.0.0.1:3000".into()
    }

    pub fn aggregator_url() -> String {
        "https://quote-api.jup.ag/v6".into()
    }

    pub fn period_secs() -> u64 {
        30 * 60
    }

    pub fn floor_lamports() -> u64 {
        LAMPORTS_PER_SOL / 2
    }

    pub fn target_lamports() -> u64 {
        LAMPORTS_PER_SOL * 3 / 2
    }

    pub fn max_top_up_lamports() -> u64 {
        2 * LAMPORTS_PER_SOL
    }

    pub fn safety_margin_lamports() -> u64 {
        LAMPORTS_PER_SOL / 2
    }

    pub fn min_top_up_lamports() -> u64 {
        LAMPORTS_PER_SOL / 10
    }

    pub fn settle_delay_ms() -> u64 {
        2_000
    }

    pub fn reserve_amount() -> u64 {
        TOKEN_UNIT / 2
    }

    pub fn threshold_amount() -> u64 {
        TOKEN_UNIT
    }

    pub fn canary_amount() -> u64 {
        TOKEN_UNIT / 10
    }

    pub fn slippage_bps() -> u16 {
        100
    }

    pub fn critical_floor_lamports() -> u64 {
        LAMPORTS_PER_SOL / 10
    }

    pub fn recovery_target_lamports() -> u64 {
        LAMPORTS_PER_SOL
    }

    pub fn fail_open() -> bool {
        true
    }

    pub fn surplus_ceiling_lamports() -> u64 {
        2 * LAMPORTS_PER_SOL
    }

    pub fn surplus_min_transfer_lamports() -> u64 {
        LAMPORTS_PER_SOL / 10
    }
}
