use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use leaveflow_core::config::SchedulerConfig;

use crate::service::LeaveWorkflowService;
use crate::sweeps::SweepKind;

/// Drives the document and stale-approval sweeps on independent timers until
/// the shutdown channel flips to `true` or its sender is dropped.
pub struct SweepScheduler {
    service: Arc<LeaveWorkflowService>,
    config: SchedulerConfig,
}

impl SweepScheduler {
    pub fn new(service: Arc<LeaveWorkflowService>, config: SchedulerConfig) -> Self {
        Self { service, config }
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut document_timer =
                interval(Duration::from_secs(self.config.document_sweep_interval_secs.max(1)));
            let mut stale_timer =
                interval(Duration::from_secs(self.config.stale_sweep_interval_secs.max(1)));
            document_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            stale_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                event_name = "scheduler.started",
                document_sweep_interval_secs = self.config.document_sweep_interval_secs,
                stale_sweep_interval_secs = self.config.stale_sweep_interval_secs,
                "sweep scheduler started"
            );

            loop {
                tokio::select! {
                    _ = document_timer.tick() => self.run(SweepKind::DocumentDeadline).await,
                    _ = stale_timer.tick() => self.run(SweepKind::StaleApproval).await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(event_name = "scheduler.stopped", "sweep scheduler stopped");
        })
    }

    async fn run(&self, kind: SweepKind) {
        let now = Utc::now();
        let result = match kind {
            SweepKind::DocumentDeadline => self.service.run_document_sweep(now).await,
            SweepKind::StaleApproval => self.service.run_stale_approval_sweep(now).await,
        };
        // Per-item failures are counted in the report; this is a failed listing.
        if let Err(error) = result {
            warn!(
                event_name = "scheduler.sweep.failed",
                sweep = kind.as_str(),
                error = %error,
                "sweep aborted"
            );
        }
    }
}
