//! Redemption codes and their per-batch bookkeeping.
//!
//! This module provides:
//! - Normalization of hand-typed codes into the `XXXX-XXXX-XXXX` form
//! - Batch input parsing (normalize, drop empties, deduplicate)
//! - Result, status and attempt outcome types shared by the engine

pub mod normalize;
pub mod types;

pub use normalize::{normalize_code, parse_code_lines};
pub use types::{AttemptOutcome, RedeemStatus, RedemptionResult};
