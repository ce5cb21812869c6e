use log::{debug, trace};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::query::{keys, QueryClient};

use super::NotificationService;

/// Background task keeping the cached unread count current.
///
/// Polls only while the session is authenticated and ends on its own once the
/// session is cleared. Dropping the handle stops it.
pub struct UnreadCountPoller {
    handle: JoinHandle<()>,
}

impl UnreadCountPoller {
    pub fn spawn(
        service: NotificationService,
        cache: QueryClient,
        mut auth: watch::Receiver<bool>,
        interval: Duration,
    ) -> Self {
        let handle = tokio::spawn(async move {
            if !*auth.borrow_and_update() {
                debug!("Not authenticated, unread count poller not started");
                return;
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match service.unread_count().await {
                            // the session may have ended while the request was out
                            Ok(count) if *auth.borrow() => {
                                trace!("Unread notifications: {}", count.unread_count);
                                cache.set_query_data(&keys::unread_count(), count);
                            }
                            Ok(_) => {}
                            Err(e) => debug!("Unread count poll failed: {}", e),
                        }
                    }
                    changed = auth.changed() => {
                        if changed.is_err() || !*auth.borrow_and_update() {
                            break;
                        }
                    }
                }
            }
            debug!("Session ended, unread count poller stopped");
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for UnreadCountPoller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
