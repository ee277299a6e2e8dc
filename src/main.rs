use anyhow::{Context, Result};
use chrono::TimeZone;
use serde::Serialize;

use expiry_rs::config::{Config, Zone};
use expiry_rs::{enumerate, resolve, Calendar, OfferClass, ServerClock, SystemServerClock};

const DEFAULT_DURATIONS: [u32; 7] = [1, 2, 3, 4, 5, 15, 30];

#[derive(Debug, Serialize)]
struct Report {
    server_time: i64,
    offers: Vec<OfferRow>,
    expirations: Vec<ResolvedRow>,
}

#[derive(Debug, Serialize)]
struct OfferRow {
    class: OfferClass,
    offer_minutes: u32,
    seconds_remaining: i64,
    local_time: String,
}

#[derive(Debug, Serialize)]
struct ResolvedRow {
    duration: u32,
    timestamp: i64,
    index: u8,
    local_time: String,
}

/// Usage: expiry-rs [SERVER_TS] [DURATION...] [--json]
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;
    cfg.general.init_tracing();
    tracing::debug!(?cfg, "loaded config");

    let mut json = false;
    let mut positional = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--json" {
            json = true;
        } else {
            positional.push(arg);
        }
    }

    let server_time = match positional.first() {
        Some(raw) => raw
            .parse::<i64>()
            .with_context(|| format!("invalid server timestamp {:?}", raw))?,
        None => SystemServerClock::new(cfg.clock.server_offset_secs).now(),
    };
    let mut durations = positional
        .iter()
        .skip(1)
        .map(|raw| {
            raw.parse::<u32>()
                .with_context(|| format!("invalid duration {:?}", raw))
        })
        .collect::<Result<Vec<_>>>()?;
    if durations.is_empty() {
        durations = DEFAULT_DURATIONS.to_vec();
    }

    let report = match cfg.zone()? {
        Zone::Local => build_report(&Calendar::local(), server_time, &durations)?,
        Zone::Named(tz) => build_report(&Calendar::new(tz), server_time, &durations)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn build_report<Tz: TimeZone>(
    calendar: &Calendar<Tz>,
    server_time: i64,
    durations: &[u32],
) -> Result<Report> {
    let offers = enumerate(calendar, server_time)?
        .into_iter()
        .map(|slot| -> Result<OfferRow> {
            let local = calendar.to_local(slot.expires_at(server_time))?;
            Ok(OfferRow {
                class: slot.class(),
                offer_minutes: slot.offer_minutes,
                seconds_remaining: slot.seconds_remaining,
                local_time: local.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let expirations = durations
        .iter()
        .map(|&duration| -> Result<ResolvedRow> {
            let result = resolve(calendar, server_time, duration)?;
            Ok(ResolvedRow {
                duration,
                timestamp: result.timestamp,
                index: result.index,
                local_time: calendar.to_local(result.timestamp)?.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Report {
        server_time,
        offers,
        expirations,
    })
}

fn print_report(report: &Report) {
    println!("Server time: {}", report.server_time);

    println!("\nOffers:");
    for row in &report.offers {
        let class = match row.class {
            OfferClass::Turbo => "turbo ",
            OfferClass::Binary => "binary",
        };
        println!(
            "  {} {:>3}m  in {:>5}s  at {}",
            class, row.offer_minutes, row.seconds_remaining, row.local_time
        );
    }

    println!("\nExpirations:");
    for row in &report.expirations {
        println!(
            "  {:>3}m -> {} (idx {})  at {}",
            row.duration, row.timestamp, row.index, row.local_time
        );
    }
}
