use chrono::{Local, TimeZone, Timelike};

use super::{ExpirationSlot, BINARY_SLOTS, QUARTER_HOUR_MINUTES, TURBO_SLOTS};
use crate::clock::{add_minutes, floor_minute, Calendar, LocalMoment};
use crate::error::{ExpiryError, Result};

/// With more than this many seconds left, the next whole minute is still
/// offered as the 1-minute turbo slot.
const NEXT_MINUTE_CUTOFF_SECS: i64 = 30;

/// Quarter hours closer than this are left to the turbo ladder.
const MIN_BINARY_LEAD_SECS: i64 = 300;

/// All expirations currently on offer at server time `now`.
///
/// Returns five turbo slots (offer minutes 1..=5, one whole minute apart)
/// followed by eleven binary slots (offer minutes 15, 30, ..., 165, on
/// successive quarter hours more than five minutes away).
pub fn enumerate<Tz: TimeZone>(calendar: &Calendar<Tz>, now: i64) -> Result<Vec<ExpirationSlot>> {
    if now < 0 {
        return Err(ExpiryError::InvalidArgument(format!(
            "server time must be non-negative, got {}",
            now
        )));
    }

    let current = floor_minute(calendar.to_local(now)?)?;
    let mut slots = Vec::with_capacity(TURBO_SLOTS + BINARY_SLOTS);
    turbo_ladder(calendar, current, now, &mut slots)?;
    // The binary ladder starts from `current`, not from the turbo ladder's
    // adjusted first minute.
    binary_ladder(calendar, current, now, &mut slots)?;

    tracing::trace!(now, slots = slots.len(), "enumerated expiration offers");
    Ok(slots)
}

/// [`enumerate`] against the host's local time zone.
pub fn enumerate_local(now: i64) -> Result<Vec<ExpirationSlot>> {
    enumerate(&Calendar::<Local>::local(), now)
}

fn turbo_ladder<Tz: TimeZone>(
    calendar: &Calendar<Tz>,
    current: LocalMoment,
    now: i64,
    slots: &mut Vec<ExpirationSlot>,
) -> Result<()> {
    let next_minute = add_minutes(current, 1)?;
    let to_next_minute = calendar.to_timestamp_at(&next_minute, now)? - now;
    let mut expiry = if to_next_minute > NEXT_MINUTE_CUTOFF_SECS {
        next_minute
    } else {
        add_minutes(current, 2)?
    };

    for offer_minutes in 1..=TURBO_SLOTS as u32 {
        slots.push(ExpirationSlot {
            offer_minutes,
            seconds_remaining: calendar.to_timestamp_at(&expiry, now)? - now,
        });
        expiry = add_minutes(expiry, 1)?;
    }
    Ok(())
}

fn binary_ladder<Tz: TimeZone>(
    calendar: &Calendar<Tz>,
    current: LocalMoment,
    now: i64,
    slots: &mut Vec<ExpirationSlot>,
) -> Result<()> {
    let mut expiry = current;
    let mut emitted: u32 = 0;
    while (emitted as usize) < BINARY_SLOTS {
        if expiry.minute() % QUARTER_HOUR_MINUTES == 0 {
            let seconds_remaining = calendar.to_timestamp_at(&expiry, now)? - now;
            if seconds_remaining > MIN_BINARY_LEAD_SECS {
                emitted += 1;
                slots.push(ExpirationSlot {
                    offer_minutes: QUARTER_HOUR_MINUTES * emitted,
                    seconds_remaining,
                });
            }
        }
        expiry = add_minutes(expiry, 1)?;
    }
    Ok(())
}
