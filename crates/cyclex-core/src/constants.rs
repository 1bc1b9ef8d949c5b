/// ─── Cyclex Protocol Constants ──────────────────────────────────────────────
///
/// Cycles accrue to vault accounts through licenses and are redeemed through
/// the reward queue into coin at the network frequency.
///
/// Coin base unit:  1 coin = 100_000 shares (5 decimals)
/// Frequency unit:  1.0    = 10 (1 decimal)

// ── Precision ────────────────────────────────────────────────────────────────

/// Shares per whole coin.
pub const DASCOIN_DEFAULT_ASSET_PRECISION: i64 = 100_000;

/// Frequency values are stored scaled by this factor (200 == 20.0).
pub const FREQUENCY_PRECISION: i64 = 10;

/// Combined scale used by the cycle <-> coin conversion.
pub const CONVERSION_SCALE: i64 = DASCOIN_DEFAULT_ASSET_PRECISION * FREQUENCY_PRECISION;

// ── Chain defaults ───────────────────────────────────────────────────────────

/// Base block interval in seconds. Reward intervals must be a multiple.
pub const DEFAULT_BLOCK_INTERVAL_SECS: u32 = 5;

/// Default reward interval: 10 minutes.
pub const DEFAULT_REWARD_INTERVAL_SECS: u32 = 600;

/// Coin minted per reward interval by default (1000 coins).
pub const DEFAULT_DASCOIN_REWARD_AMOUNT: i64 = 1_000 * DASCOIN_DEFAULT_ASSET_PRECISION;

/// Network frequency at genesis (2.0).
pub const DEFAULT_FREQUENCY: i64 = 2 * FREQUENCY_PRECISION;

// ── Precision migration ──────────────────────────────────────────────────────

/// Coin precision moved from 4 to 5 decimals at this block time
/// (2018-10-20 01:46:40 UTC). Reward amounts submitted earlier were
/// expressed in the old unit.
pub const PRECISION_MIGRATION_CUTOVER: i64 = 1_540_000_000;

/// Factor between the old and the new coin unit.
pub const PRECISION_MIGRATION_FACTOR: i64 = 10;

// ── Cycle balances ───────────────────────────────────────────────────────────

/// Length of the spend-limit window for free cycle submissions.
pub const SPEND_LIMIT_WINDOW_SECS: i64 = 24 * 3600;

// ── Queue origins ────────────────────────────────────────────────────────────

pub const ORIGIN_RESERVE_CYCLES: &str = "reserve_cycles";
pub const ORIGIN_USER_SUBMIT: &str = "user_submit";

// ── Limits ───────────────────────────────────────────────────────────────────

/// Maximum length of a queue comment or frequency-update comment.
pub const MAX_COMMENT_BYTES: usize = 256;

/// Maximum length of a license type name.
pub const MAX_LICENSE_NAME_BYTES: usize = 64;

// ── Base license cycle amounts (genesis catalog) ─────────────────────────────

pub const BASE_STANDARD_CYCLES: i64 = 1_100;
pub const BASE_MANAGER_CYCLES: i64 = 5_500;
pub const BASE_PRO_CYCLES: i64 = 11_000;
pub const BASE_EXECUTIVE_CYCLES: i64 = 55_000;
pub const BASE_PRESIDENT_CYCLES: i64 = 110_000;
