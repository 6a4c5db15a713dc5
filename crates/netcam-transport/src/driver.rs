//! Runs one role: serialises its timer ticks and inbound envelopes onto a
//! single task until cancelled.

use netcam_core::{Bus, Envelope, Role, SessionError};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Drive `role` until `cancel` fires or `inbound` closes.
///
/// The first tick comes after the bus timer's expiration, then one per
/// interval. Handlers never overlap: each returns before the next event is
/// taken. A fatal tick cancels `cancel` (so sibling tasks stop too) and is
/// returned.
pub async fn drive<R, B>(
    role: &mut R,
    bus: &mut B,
    inbound: &mut mpsc::Receiver<Envelope>,
    cancel: &CancellationToken,
) -> Result<(), SessionError>
where
    R: Role,
    B: Bus,
{
    let mut ticker = bus.timer_settings().and_then(|timer| {
        timer.interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + timer.expiration(), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        })
    });

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Driver cancelled");
                return Ok(());
            }

            _ = next_tick(&mut ticker) => {
                if let Err(e) = role.on_tick(bus) {
                    error!("{}", e);
                    cancel.cancel();
                    return Err(e);
                }
            }

            received = inbound.recv() => match received {
                Some(envelope) => role.on_envelope(envelope, bus),
                None => {
                    info!("Inbound channel closed");
                    return Ok(());
                }
            },
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
