use cyclex_core::account::AccountKind;
use cyclex_core::amount::Frequency;
use cyclex_core::constants::*;
use cyclex_core::error::CyclexError;
use cyclex_core::license::LicenseKind;
use cyclex_core::params::ChainParameters;
use cyclex_core::types::{Share, Timestamp};
use serde::{Deserialize, Serialize};

/// Names of the three privileged accounts. Their ids are derived from the
/// names, and genesis creates them as wallets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenesisAuthorities {
    pub license_administrator: String,
    pub license_issuer: String,
    pub cycle_issuer: String,
}

impl Default for GenesisAuthorities {
    fn default() -> Self {
        Self {
            license_administrator: "license-administrator".into(),
            license_issuer: "license-issuer".into(),
            cycle_issuer: "cycle-issuer".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenesisAccount {
    pub name: String,
    pub kind: AccountKind,
    /// Initial coin balance in shares.
    #[serde(default)]
    pub balance: Share,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenesisLicenseType {
    pub name: String,
    pub amount: Share,
    pub kind: LicenseKind,
    #[serde(default)]
    pub balance_multipliers: Vec<u32>,
    #[serde(default)]
    pub requeue_multipliers: Vec<u32>,
    #[serde(default)]
    pub return_multipliers: Vec<u32>,
    #[serde(default)]
    pub upgrades: u8,
}

/// Genesis configuration, read from JSON. Every field is optional.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenesisParams {
    /// First reward interval runs at the first block at or after this time.
    pub genesis_time: Timestamp,
    pub authorities: GenesisAuthorities,
    pub parameters: ChainParameters,
    pub frequency: Frequency,
    pub license_types: Vec<GenesisLicenseType>,
    pub accounts: Vec<GenesisAccount>,
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self {
            genesis_time: 0,
            authorities: GenesisAuthorities::default(),
            parameters: ChainParameters::default(),
            frequency: Frequency(DEFAULT_FREQUENCY),
            license_types: default_license_types(),
            accounts: Vec::new(),
        }
    }
}

impl GenesisParams {
    pub fn from_json(s: &str) -> Result<Self, CyclexError> {
        serde_json::from_str(s).map_err(|e| CyclexError::Serialization(e.to_string()))
    }
}

/// The standard five-tier catalog. Each tier up doubles its balance once more.
pub fn default_license_types() -> Vec<GenesisLicenseType> {
    [
        ("standard", BASE_STANDARD_CYCLES, 1),
        ("manager", BASE_MANAGER_CYCLES, 2),
        ("pro", BASE_PRO_CYCLES, 3),
        ("executive", BASE_EXECUTIVE_CYCLES, 4),
        ("president", BASE_PRESIDENT_CYCLES, 5),
    ]
    .into_iter()
    .map(|(name, amount, tiers)| GenesisLicenseType {
        name: name.to_string(),
        amount,
        kind: LicenseKind::Regular,
        balance_multipliers: vec![2; tiers],
        requeue_multipliers: vec![2; tiers],
        return_multipliers: vec![2; tiers],
        upgrades: tiers as u8,
    })
    .collect()
}
