use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::services::controller::SessionController;

/// Periodic presence reaping plus optional no-show cancellation.
pub struct SessionSweeper {
    controller: Arc<SessionController>,
    interval: Duration,
    no_show_grace: Option<chrono::Duration>,
}

impl SessionSweeper {
    pub fn new(
        controller: Arc<SessionController>,
        interval_seconds: u64,
        no_show_grace_minutes: Option<i64>,
    ) -> Self {
        Self {
            controller,
            interval: Duration::from_secs(interval_seconds.max(1)),
            no_show_grace: no_show_grace_minutes.map(|m| chrono::Duration::minutes(m.max(0))),
        }
    }

    /// One pass; returns (presence flags cleared, no-shows cancelled).
    pub async fn tick(&self) -> (usize, usize) {
        let cleared = match self.controller.reap_stale_presence().await {
            Ok(count) => count,
            Err(err) => {
                warn!("Presence sweep failed: {}", err);
                0
            }
        };

        let cancelled = match self.no_show_grace {
            Some(grace) => match self.controller.cancel_no_shows(grace).await {
                Ok(count) => count,
                Err(err) => {
                    warn!("No-show sweep failed: {}", err);
                    0
                }
            },
            None => 0,
        };

        if cleared + cancelled > 0 {
            info!(
                "Session sweep cleared {} presence flags, cancelled {} no-shows",
                cleared, cancelled
            );
        } else {
            debug!("Session sweep: nothing to do");
        }
        (cleared, cancelled)
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(self.interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Session sweep stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
