//! # Mail Dispatcher
//!
//! Drains the `mail_outbox` table after order transactions commit.
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Mail Dispatcher Flow                                 │
//! │                                                                         │
//! │  Wake-ups:                                                              │
//! │  • handle.wake()    - right after place_order / set_status commits     │
//! │  • poll interval    - catches anything a wake-up missed (default 30s)  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  1. get_pending(batch_size, max_attempts), minus this drain's  │   │
//! │  │     failures                                                    │   │
//! │  │                                                                 │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     decode OrderEvent ─► reload order ─► render template       │   │
//! │  │                         ─► Mailer::send                        │   │
//! │  │                                                                 │   │
//! │  │  3. Ok  ─► mark_sent                                           │   │
//! │  │     Err ─► mark_failed (attempts += 1, last_error), warn!      │   │
//! │  │                                                                 │   │
//! │  │  4. Full batch? go again. Otherwise wait for the next wake-up. │   │
//! │  │     A failed entry is retried on a later drain, never this one.│   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Housekeeping (hourly): purge expired notifications and sent mail.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use super::{templates, MailError, Mailer};
use crate::config::MailSettings;
use flashmart_core::{Clock, OrderEvent};
use flashmart_db::{Database, DbResult, MailOutboxEntry};

/// How often expired rows are swept.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(3600);

/// Sent outbox rows are kept this long for inspection.
const SENT_RETENTION_DAYS: i64 = 7;

/// Outcome of one drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub failed: usize,
}

/// Handle for waking and stopping the dispatcher.
#[derive(Clone)]
pub struct MailDispatcherHandle {
    wake: Arc<Notify>,
    shutdown_tx: mpsc::Sender<()>,
}

impl MailDispatcherHandle {
    /// Asks the dispatcher to drain now. Never blocks.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Mail dispatcher already stopped");
        }
    }
}

/// Delivers queued order emails through a [`Mailer`].
pub struct MailDispatcher {
    db: Database,
    clock: Arc<dyn Clock>,
    mailer: Arc<dyn Mailer>,
    settings: MailSettings,
    wake: Arc<Notify>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl MailDispatcher {
    /// Creates a dispatcher and its handle.
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        settings: MailSettings,
    ) -> (Self, MailDispatcherHandle) {
        let wake = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = MailDispatcher {
            db,
            clock,
            mailer,
            settings,
            wake: wake.clone(),
            shutdown_rx,
        };

        (dispatcher, MailDispatcherHandle { wake, shutdown_tx })
    }

    /// Runs until shutdown. Spawn as a background task.
    pub async fn run(mut self) {
        info!("Mail dispatcher starting");

        let mut poll = tokio::time::interval(self.settings.poll_interval());
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let wake = self.wake.clone();

        loop {
            tokio::select! {
                _ = poll.tick() => self.drain_logged().await,

                _ = wake.notified() => self.drain_logged().await,

                _ = housekeeping.tick() => {
                    if let Err(e) = self.housekeeping().await {
                        error!(error = %e, "Housekeeping failed");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Mail dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Mail dispatcher stopped");
    }

    async fn drain_logged(&self) {
        match self.drain().await {
            Ok(report) if report.sent + report.failed > 0 => {
                info!(sent = report.sent, failed = report.failed, "Mail outbox drained");
            }
            Ok(_) => debug!("No pending mail"),
            Err(e) => error!(error = %e, "Failed to read mail outbox"),
        }
    }

    /// Delivers everything currently pending.
    ///
    /// Each entry is tried at most once per drain; a failed entry waits for
    /// the next wake-up or poll tick before its next attempt.
    pub async fn drain(&self) -> DbResult<DrainReport> {
        let mut report = DrainReport::default();
        let mut failed_ids: Vec<String> = Vec::new();

        loop {
            let batch = self
                .db
                .mail_outbox()
                .get_pending_excluding(
                    self.settings.batch_size,
                    self.settings.max_attempts,
                    &failed_ids,
                )
                .await?;

            for entry in &batch {
                match self.deliver(entry).await {
                    Ok(()) => {
                        self.db.mail_outbox().mark_sent(&entry.id, self.clock.now()).await?;
                        report.sent += 1;
                    }
                    Err(e) => {
                        self.record_failure(entry, &e).await?;
                        failed_ids.push(entry.id.clone());
                        report.failed += 1;
                    }
                }
            }

            if batch.len() < self.settings.batch_size as usize {
                return Ok(report);
            }
        }
    }

    async fn deliver(&self, entry: &MailOutboxEntry) -> Result<(), MailError> {
        let event = entry
            .event()
            .map_err(|e| MailError::Render(format!("bad payload: {}", e)))?;

        let order = self
            .db
            .orders()
            .get_by_id(event.order_id())
            .await
            .map_err(|e| MailError::Render(e.to_string()))?
            .ok_or_else(|| MailError::Render(format!("order {} not found", event.order_id())))?;

        let from = &self.settings.from_address;
        let message = match event {
            OrderEvent::OrderPlaced { .. } => templates::order_confirmation(&order, from),
            OrderEvent::StatusChanged { status, .. } => {
                templates::status_update(&order, status, from)
            }
        };

        self.mailer.send(&message).await?;

        debug!(
            kind = %entry.kind,
            order = %order.order_number,
            to = %message.to,
            "Email delivered"
        );
        Ok(())
    }

    async fn record_failure(&self, entry: &MailOutboxEntry, err: &MailError) -> DbResult<()> {
        let attempts = entry.attempts + 1;
        warn!(
            id = %entry.id,
            kind = %entry.kind,
            order = %entry.order_id,
            attempts,
            error = %err,
            "Email delivery failed"
        );
        if attempts >= i64::from(self.settings.max_attempts) {
            warn!(id = %entry.id, "Giving up on email after max attempts");
        }

        self.db
            .mail_outbox()
            .mark_failed(&entry.id, &err.to_string(), self.clock.now())
            .await
    }

    /// Sweeps expired notifications and old sent mail.
    pub async fn housekeeping(&self) -> DbResult<()> {
        let now = self.clock.now();
        let purged = self.db.notifications().purge_expired(now).await?;
        let cleaned = self
            .db
            .mail_outbox()
            .cleanup_sent(SENT_RETENTION_DAYS, now)
            .await?;

        debug!(purged, cleaned, "Housekeeping complete");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
