//! Expiration timestamps for turbo and binary option orders.
//!
//! [`expiration::resolve`] picks the expiration for one order;
//! [`expiration::enumerate`] lists every expiration on offer. Both take the
//! venue's server time and an explicit [`clock::Calendar`].

pub mod clock;
pub mod config;
pub mod error;
pub mod expiration;

pub use clock::{Calendar, LocalMoment, ServerClock, SystemServerClock};
pub use error::{ExpiryError, Result};
pub use expiration::{
    enumerate, enumerate_local, resolve, resolve_local, ExpirationResult, ExpirationSlot,
    OfferClass,
};
