use std::future::Future;

use anyhow::Result;
use chrono::TimeZone;
use tokio::time::{interval, Duration};

use expiry_rs::config::{Config, Zone};
use expiry_rs::{enumerate, Calendar, ServerClock, SystemServerClock};

/// Re-enumerates the offer ladder every second and logs it whenever the
/// first turbo slot rolls to a new minute.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;
    cfg.general.init_tracing();

    let clock = SystemServerClock::new(cfg.clock.server_offset_secs);
    match cfg.zone()? {
        Zone::Local => watch(Calendar::local(), clock, shutdown_signal()).await,
        Zone::Named(tz) => watch(Calendar::new(tz), clock, shutdown_signal()).await,
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {}", err);
        std::future::pending::<()>().await;
    }
}

async fn watch<Tz: TimeZone>(
    calendar: Calendar<Tz>,
    clock: impl ServerClock,
    shutdown: impl Future<Output = ()>,
) {
    let mut ticker = interval(Duration::from_secs(1));
    let mut first_expiry: Option<i64> = None;
    tokio::pin!(shutdown);

    tracing::info!("watching offers (Ctrl+C to quit)");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now();
                match roll(&calendar, now, &mut first_expiry) {
                    Ok(Some(ladder)) => tracing::info!(now, %ladder, "offers rolled"),
                    Ok(None) => {}
                    Err(err) => tracing::warn!(now, error = %err, "failed to enumerate offers"),
                }
            }
            _ = &mut shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }
}

/// The ladder to log if the first turbo slot moved since the last tick.
fn roll<Tz: TimeZone>(
    calendar: &Calendar<Tz>,
    now: i64,
    first_expiry: &mut Option<i64>,
) -> expiry_rs::Result<Option<String>> {
    let slots = enumerate(calendar, now)?;
    let first = slots.first().map(|s| s.expires_at(now));
    if first == *first_expiry {
        return Ok(None);
    }
    *first_expiry = first;
    let ladder = slots
        .iter()
        .map(|s| format!("{}m:{}s", s.offer_minutes, s.seconds_remaining))
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Some(ladder))
}
