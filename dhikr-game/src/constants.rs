//! Centralized balance and tuning constants for the session engine.
//!
//! These values define the deterministic math for spawning, scoring, the
//! difficulty ramp and the streak economy. Keeping them together ensures that
//! gameplay can only be adjusted via code changes reviewed in version control.
//! `SessionConfig` defaults are read from here.

// Tick quantum -------------------------------------------------------------
/// Reference tick the speed constants are expressed in.
pub const REFERENCE_TICK_MS: u32 = 50;
pub const DEFAULT_TICK_MS: u32 = 50;
pub const MAX_TICK_MS: u32 = 100;

// Travel -------------------------------------------------------------------
/// Items enter slightly off-screen so they slide in rather than pop.
pub const TRAVEL_START: f32 = -10.0;
/// Terminal bound; an instance past this point counts as a miss.
pub const TRAVEL_END: f32 = 100.0;
pub const LANE_MIN: f32 = 8.0;
pub const LANE_MAX: f32 = 82.0;
pub const LANE_MIN_SPACING: f32 = 12.0;
pub const LANE_MAX_ATTEMPTS: u32 = 4;

// Difficulty ramp (speeds per reference tick) ------------------------------
pub const BASE_SPEED: f32 = 0.30;
pub const SPEED_STEP: f32 = 0.05;
pub const SPEED_CAP: f32 = 0.55;
pub const SPEED_STEP_INTERVAL_SECS: u32 = 40;
pub const FREQUENCY_STEP_INTERVAL_SECS: u32 = 30;

// Concurrency --------------------------------------------------------------
pub const STANDARD_INITIAL_CONCURRENCY: usize = 2;
pub const MAX_CONCURRENT_ITEMS: usize = 4;
pub const TASBIH_CONCURRENCY: usize = 1;

// Lives and termination ----------------------------------------------------
pub const STARTING_LIVES: u32 = 5;
pub const STANDARD_MISS_CAP: u32 = 5;
pub const TASBIH_MISS_CAP: u32 = 10;

// Spawn scheduling ---------------------------------------------------------
pub const FOCUS_BOOTSTRAP_SPAWNS: u32 = 3;
pub const RESCUE_MISS_THRESHOLD: u32 = 3;
pub const RESCUE_GRANT_CAP: u32 = 2;
/// Cumulative bucket bounds for Tier1..Tier4.
pub const WEIGHT_TIER_BOUNDS: [f64; 4] = [0.90, 0.95, 0.97, 1.00];
pub const RECENT_SPAWN_WINDOW: usize = 4;
/// Scheduled appearances rendered as "new" after the unlock spawn itself.
pub const NEW_ITEM_HIGHLIGHT_SPAWNS: u8 = 3;

// Unlocks and scoring ------------------------------------------------------
pub const NAMES_TAPS_PER_UNLOCK: u64 = 33;
pub const NAMES_BASE_UNLOCKED: usize = 4;
pub const NAMES_POINTS_PER_TAP: u32 = 5;

// Streak economy -----------------------------------------------------------
pub const POINTS_PER_FREEZE_TOKEN: u64 = 30_000;
pub const MAX_FREEZE_TOKENS: u32 = 10;

// Leaderboard --------------------------------------------------------------
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;
