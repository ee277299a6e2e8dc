//! Conversion between venue server time and wall-clock calendar moments.
//!
//! All calendar arithmetic used by the resolver and enumerator goes through
//! this module, so overflow and DST handling live in one place.

use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone, Timelike,
    Utc,
};

use crate::error::{ExpiryError, Result};

/// Server time rendered as wall-clock fields in some zone.
///
/// Arithmetic on a `LocalMoment` is wall-clock arithmetic: adding 60 minutes
/// moves the hour field by one even across a DST transition.
pub type LocalMoment = NaiveDateTime;

/// Clock adapter bound to an explicit time zone.
#[derive(Debug, Clone)]
pub struct Calendar<Tz: TimeZone> {
    tz: Tz,
}

impl Calendar<Local> {
    /// Host local time, the default the venue's tooling assumes.
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl<Tz: TimeZone> Calendar<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> &Tz {
        &self.tz
    }

    /// Render a server timestamp as a wall-clock moment.
    pub fn to_local(&self, ts: i64) -> Result<LocalMoment> {
        Ok(utc_at(ts)?.with_timezone(&self.tz).naive_local())
    }

    /// UTC offset in force at `ts`.
    pub fn offset_at(&self, ts: i64) -> Result<FixedOffset> {
        Ok(utc_at(ts)?.with_timezone(&self.tz).offset().fix())
    }

    /// Map a wall-clock moment back to a Unix timestamp.
    ///
    /// Ambiguous moments (clocks going back) take the earliest instant.
    /// Moments inside a forward gap are read with the offset in force just
    /// before the gap, which places them after it (02:30 becomes 03:30).
    pub fn to_timestamp(&self, moment: &LocalMoment) -> Result<i64> {
        self.resolve_moment(moment, None)
    }

    /// Like [`Calendar::to_timestamp`], but an ambiguous moment takes the
    /// instant whose offset matches the one in force at `reference`.
    ///
    /// Moments derived from `now` keep the pass of a repeated hour that `now`
    /// itself is in.
    pub fn to_timestamp_at(&self, moment: &LocalMoment, reference: i64) -> Result<i64> {
        let offset = self.offset_at(reference)?;
        self.resolve_moment(moment, Some(offset))
    }

    fn resolve_moment(&self, moment: &LocalMoment, preferred: Option<FixedOffset>) -> Result<i64> {
        match self.tz.from_local_datetime(moment) {
            LocalResult::Single(dt) => Ok(dt.timestamp()),
            LocalResult::Ambiguous(earliest, latest) => {
                let dt = match preferred {
                    Some(offset) if latest.offset().fix() == offset => latest,
                    _ => earliest,
                };
                Ok(dt.timestamp())
            }
            LocalResult::None => {
                let offset = self.offset_before_gap(moment)?;
                Ok(moment.and_utc().timestamp() - i64::from(offset.local_minus_utc()))
            }
        }
    }

    /// Walk back from a non-existent moment to the last wall-clock time the
    /// zone still had before the gap, and return its offset.
    fn offset_before_gap(&self, moment: &LocalMoment) -> Result<FixedOffset> {
        let mut earlier = *moment;
        for _ in 0..GAP_SEARCH_STEPS {
            earlier = add_minutes(earlier, -GAP_SEARCH_STEP_MINUTES)?;
            match self.tz.from_local_datetime(&earlier) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                    return Ok(dt.offset().fix())
                }
                LocalResult::None => {}
            }
        }
        Err(ExpiryError::UnresolvableLocalTime(*moment))
    }
}

/// Gaps are searched in quarter-hour steps for up to 25 hours, which covers
/// a whole skipped calendar day.
const GAP_SEARCH_STEP_MINUTES: i64 = 15;
const GAP_SEARCH_STEPS: usize = 100;

fn utc_at(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .ok_or_else(|| ExpiryError::CalendarOverflow(format!("timestamp {} is out of range", ts)))
}

fn shift(moment: LocalMoment, delta: TimeDelta) -> Result<LocalMoment> {
    moment.checked_add_signed(delta).ok_or_else(|| {
        ExpiryError::CalendarOverflow(format!("{} shifted by {} leaves the calendar", moment, delta))
    })
}

/// Wall-clock `moment + minutes`.
pub fn add_minutes(moment: LocalMoment, minutes: i64) -> Result<LocalMoment> {
    let delta = TimeDelta::try_minutes(minutes)
        .ok_or_else(|| ExpiryError::CalendarOverflow(format!("{} minutes", minutes)))?;
    shift(moment, delta)
}

/// Zero the seconds and sub-second fields.
pub fn floor_minute(moment: LocalMoment) -> Result<LocalMoment> {
    let into_minute = TimeDelta::seconds(i64::from(moment.second()))
        + TimeDelta::nanoseconds(i64::from(moment.nanosecond()));
    shift(moment, -into_minute)
}

/// Round down to a whole multiple of `step` minutes within the hour.
///
/// `step` must divide 60: 15 gives the quarter-hour, 60 the top of the hour.
pub fn floor_to_step(moment: LocalMoment, step: u32) -> Result<LocalMoment> {
    let minute = floor_minute(moment)?;
    add_minutes(minute, -i64::from(minute.minute() % step))
}

/// Source of the venue's current server time.
///
/// The expiration core never reads a clock itself; callers pass the value
/// this returns.
pub trait ServerClock: Send + Sync {
    fn now(&self) -> i64;
}

/// Host clock corrected by a known offset to the venue clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemServerClock {
    /// Venue time minus host time, in seconds.
    pub offset_secs: i64,
}

impl SystemServerClock {
    pub fn new(offset_secs: i64) -> Self {
        Self { offset_secs }
    }
}

impl ServerClock for SystemServerClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp() + self.offset_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> LocalMoment {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_utc_round_trip() {
        let cal = Calendar::new(Utc);
        let ts = 1_710_496_810; // 2024-03-15 10:00:10 UTC
        let local = cal.to_local(ts).unwrap();
        assert_eq!(local, at(2024, 3, 15, 10, 0, 10));
        assert_eq!(cal.to_timestamp(&local).unwrap(), ts);
    }

    #[test]
    fn test_fixed_offset_fields() {
        // UTC-3
        let cal = Calendar::new(FixedOffset::west_opt(3 * 3600).unwrap());
        let local = cal.to_local(1_710_496_810).unwrap();
        assert_eq!(local, at(2024, 3, 15, 7, 0, 10));
        assert_eq!(cal.to_timestamp(&local).unwrap(), 1_710_496_810);
    }

    #[test]
    fn test_out_of_range_timestamp() {
        let cal = Calendar::new(Utc);
        assert!(matches!(
            cal.to_local(i64::MAX),
            Err(ExpiryError::CalendarOverflow(_))
        ));
    }

    #[test]
    fn test_spring_forward_gap_lands_after_gap() {
        let cal = Calendar::new(chrono_tz::America::New_York);
        // 02:30 does not exist on 2024-03-10; read as EST it is 07:30 UTC (03:30 EDT).
        let ts = cal.to_timestamp(&at(2024, 3, 10, 2, 30, 0)).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 10, 7, 30, 0).unwrap().timestamp();
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_fall_back_takes_earliest() {
        let cal = Calendar::new(chrono_tz::America::New_York);
        // 01:30 occurs twice on 2024-11-03; the first is EDT (UTC-4).
        let ts = cal.to_timestamp(&at(2024, 11, 3, 1, 30, 0)).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 11, 3, 5, 30, 0).unwrap().timestamp();
        assert_eq!(ts, expected);
    }

    #[test]
    fn test_fall_back_follows_reference_pass() {
        let cal = Calendar::new(chrono_tz::America::New_York);
        let moment = at(2024, 11, 3, 1, 13, 0);

        // reference in the second pass (01:10:10 EST) → EST
        let second_pass = Utc.with_ymd_and_hms(2024, 11, 3, 6, 10, 10).unwrap().timestamp();
        let ts = cal.to_timestamp_at(&moment, second_pass).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 11, 3, 6, 13, 0).unwrap().timestamp());

        // reference in the first pass (01:10:10 EDT) → EDT
        let first_pass = Utc.with_ymd_and_hms(2024, 11, 3, 5, 10, 10).unwrap().timestamp();
        let ts = cal.to_timestamp_at(&moment, first_pass).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 11, 3, 5, 13, 0).unwrap().timestamp());
    }

    #[test]
    fn test_offset_at() {
        let cal = Calendar::new(chrono_tz::America::New_York);
        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap().timestamp();
        assert_eq!(cal.offset_at(summer).unwrap(), FixedOffset::west_opt(4 * 3600).unwrap());
    }

    #[test]
    fn test_two_hour_gap() {
        // Troll jumps from +00 to +02 at 01:00 UTC on 2024-03-31.
        let cal = Calendar::new(chrono_tz::Antarctica::Troll);
        let ts = cal.to_timestamp(&at(2024, 3, 31, 2, 0, 0)).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 31, 2, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn test_skipped_calendar_day() {
        // Apia went from 2011-12-29 23:59:59 (-10) straight to 2011-12-31 (+14).
        let cal = Calendar::new(chrono_tz::Pacific::Apia);
        let ts = cal.to_timestamp(&at(2011, 12, 30, 12, 0, 0)).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2011, 12, 30, 22, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn test_floor_helpers() {
        let m = at(2024, 3, 15, 10, 44, 59);
        assert_eq!(floor_minute(m).unwrap(), at(2024, 3, 15, 10, 44, 0));
        assert_eq!(floor_to_step(m, 15).unwrap(), at(2024, 3, 15, 10, 30, 0));
        assert_eq!(floor_to_step(m, 60).unwrap(), at(2024, 3, 15, 10, 0, 0));
    }

    #[test]
    fn test_add_minutes_crosses_year() {
        let m = at(2023, 12, 31, 23, 58, 0);
        assert_eq!(add_minutes(m, 3).unwrap(), at(2024, 1, 1, 0, 1, 0));
    }

    #[test]
    fn test_system_server_clock_applies_offset() {
        let plain = SystemServerClock::default().now();
        let ahead = SystemServerClock::new(3600).now();
        // Two reads of the host clock; allow a second of drift between them.
        assert!((ahead - plain - 3600).abs() <= 1);
    }
}
