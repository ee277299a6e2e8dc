use chrono::{Local, TimeZone, Timelike};

use super::{ExpirationResult, OfferClass, QUARTER_HOUR_MINUTES};
use crate::clock::{add_minutes, floor_minute, floor_to_step, Calendar, LocalMoment};
use crate::error::{ExpiryError, Result};

/// Seconds into the current minute after which a turbo order rolls one
/// minute further out.
const LATE_IN_MINUTE_SECS: u32 = 30;

/// Resolve the expiration for an order placed at server time `now` for
/// `duration` minutes.
///
/// Turbo durations (1..=5) land on a whole minute; one extra minute is added
/// once half of the current minute has gone. Binary durations land on the
/// quarter hour nearest to `now + duration`, ties going to the earlier one,
/// unless that earlier boundary is already behind `now`.
///
/// # Errors
/// `InvalidArgument` for a negative `now` or a zero `duration`.
pub fn resolve<Tz: TimeZone>(
    calendar: &Calendar<Tz>,
    now: i64,
    duration: u32,
) -> Result<ExpirationResult> {
    if now < 0 {
        return Err(ExpiryError::InvalidArgument(format!(
            "server time must be non-negative, got {}",
            now
        )));
    }
    if duration == 0 {
        return Err(ExpiryError::InvalidArgument(
            "duration must be at least one minute".to_string(),
        ));
    }

    let current = calendar.to_local(now)?;
    let expiration = match OfferClass::of(duration) {
        OfferClass::Turbo => turbo_expiration(current, duration)?,
        OfferClass::Binary => binary_expiration(current, duration)?,
    };

    let timestamp = calendar.to_timestamp_at(&expiration, now)?;
    let index = OfferClass::index(duration);
    tracing::debug!(now, duration, %expiration, timestamp, index, "resolved expiration");
    Ok(ExpirationResult { timestamp, index })
}

/// [`resolve`] against the host's local time zone.
pub fn resolve_local(now: i64, duration: u32) -> Result<ExpirationResult> {
    resolve(&Calendar::<Local>::local(), now, duration)
}

fn turbo_expiration(current: LocalMoment, duration: u32) -> Result<LocalMoment> {
    let minutes_to_add = if current.second() < LATE_IN_MINUTE_SECS {
        duration
    } else {
        duration + 1
    };
    floor_minute(add_minutes(current, i64::from(minutes_to_add))?)
}

fn binary_expiration(current: LocalMoment, duration: u32) -> Result<LocalMoment> {
    let desired = add_minutes(current, i64::from(duration))?;
    let (prev, next) = quarter_boundaries(desired)?;

    // The lower boundary must not already be behind the order time.
    if prev < current {
        return Ok(next);
    }

    let to_prev = (prev - desired).num_seconds().abs();
    let to_next = (next - desired).num_seconds().abs();
    tracing::trace!(%desired, %prev, %next, to_prev, to_next, "quarter-hour candidates");
    Ok(if to_prev <= to_next { prev } else { next })
}

/// Quarter-hour boundaries around `desired`: the one at or below it and the
/// first one strictly after its minute.
fn quarter_boundaries(desired: LocalMoment) -> Result<(LocalMoment, LocalMoment)> {
    let prev = floor_to_step(desired, QUARTER_HOUR_MINUTES)?;

    let step = QUARTER_HOUR_MINUTES;
    let raw = (desired.minute() + 1).div_ceil(step) * step;
    let top_of_hour = floor_to_step(desired, 60)?;
    let next = if raw >= 60 {
        add_minutes(top_of_hour, 60)?
    } else {
        add_minutes(top_of_hour, i64::from(raw))?
    };

    Ok((prev, next))
}
