use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::services::booking::BookingLedger;

/// Periodic RESERVED -> EXPIRED sweep.
pub struct ExpirySweeper {
    ledger: Arc<BookingLedger>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(ledger: Arc<BookingLedger>, interval_seconds: u64) -> Self {
        Self {
            ledger,
            interval: Duration::from_secs(interval_seconds.max(1)),
        }
    }

    /// One pass. Errors are logged; the next tick retries.
    pub async fn tick(&self) -> usize {
        match self.ledger.expire_stale_holds().await {
            Ok(0) => {
                debug!("Hold sweep: nothing to expire");
                0
            }
            Ok(count) => {
                info!("Hold sweep expired {} reservations", count);
                count
            }
            Err(err) => {
                warn!("Hold sweep failed: {}", err);
                0
            }
        }
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
                            info!("Hold sweep stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
