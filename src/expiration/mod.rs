mod enumerator;
mod resolver;

pub use enumerator::{enumerate, enumerate_local};
pub use resolver::{resolve, resolve_local};

use serde::Serialize;

/// Longest duration (minutes) still offered as a turbo option.
pub const MAX_TURBO_MINUTES: u32 = 5;

/// Offer index the venue expects for every binary expiration.
pub const BINARY_INDEX: u8 = 5;

/// Binary expirations only land on these minute boundaries.
pub const QUARTER_HOUR_MINUTES: u32 = 15;

/// Number of short-term and long-term slots on the offer ladder.
pub const TURBO_SLOTS: usize = 5;
pub const BINARY_SLOTS: usize = 11;

/// Offer type, decided by the requested duration alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferClass {
    /// 1..=5 minutes, snapped to whole minutes.
    Turbo,
    /// More than 5 minutes, snapped to quarter hours.
    Binary,
}

impl OfferClass {
    /// Classify a duration in minutes. Zero is classed as turbo; callers
    /// validate it away before it matters.
    pub fn of(duration: u32) -> OfferClass {
        if duration <= MAX_TURBO_MINUTES {
            Self::Turbo
        } else {
            Self::Binary
        }
    }

    /// Offer index sent with the order: `duration - 1` for turbo (0..=4),
    /// the binary sentinel otherwise.
    pub fn index(duration: u32) -> u8 {
        match Self::of(duration) {
            // duration <= 5 here, so the cast cannot truncate
            Self::Turbo => duration.saturating_sub(1) as u8,
            Self::Binary => BINARY_INDEX,
        }
    }
}

/// Expiration to forward verbatim into an order request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpirationResult {
    /// Unix timestamp of the expiration, always on a whole minute.
    pub timestamp: i64,
    /// Offer index (0..=4 turbo, 5 binary).
    pub index: u8,
}

/// One currently biddable expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpirationSlot {
    /// Nominal offer length: 1..=5 on the turbo ladder, 15..=165 on the binary one.
    pub offer_minutes: u32,
    /// Seconds from the server time until this slot expires.
    pub seconds_remaining: i64,
}

impl ExpirationSlot {
    pub fn class(&self) -> OfferClass {
        OfferClass::of(self.offer_minutes)
    }

    /// Absolute expiration timestamp for the server time the slot was computed at.
    pub fn expires_at(&self, now: i64) -> i64 {
        now + self.seconds_remaining
    }
}
