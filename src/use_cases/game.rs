use super::session::Session;
use super::types::SessionEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{Notify, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Single authoritative task per lobby. Drains inbound events, then advances
/// simulated time by the real time elapsed since the previous tick.
pub async fn session_task(
    mut session: Session,
    mut event_rx: mpsc::Receiver<SessionEvent>,
    tick_interval: Duration,
    shutdown: Arc<Notify>,
) {
    // Drive the fixed-step loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                // Exit cleanly when the lobby is removed.
                info!(tick, "session task shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        loop {
            match event_rx.try_recv() {
                Ok(event) => session.handle(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!(tick, "event channel closed; session task exiting");
                    return;
                }
            }
        }

        let now = Instant::now();
        session.advance(now - last_tick);
        last_tick = now;
        tick += 1;
    }
}
