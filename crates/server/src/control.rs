//! Scheduler control loop
//!
//! The one periodic task of the process. Each tick it re-detects counts
//! for every bound approach in fixed east/west/south/north order,
//! publishes reporting snapshots, advances the phase machine, commits
//! any new output vectors, and records the aggregated decision.
//! Collaborator failures leave that approach's values stale for the
//! tick; the loop itself never stops.

use approach_registry::{ApproachId, Registry};
use chrono::Utc;
use detection::VehicleDetector;
use phase_scheduler::PhaseEngine;
use reporting::{ApproachReport, ReportSink, SiteLayout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Operator commands delivered to the running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControlCommand {
    /// Switch between the day and night algorithms.
    ToggleMode,
}

pub(crate) struct ControlLoop {
    registry: Arc<Registry>,
    detector: Arc<dyn VehicleDetector>,
    reporter: Arc<dyn ReportSink>,
    layout: SiteLayout,
    engine: PhaseEngine,
    commands: mpsc::Receiver<ControlCommand>,
    tick_interval: Duration,
}

impl ControlLoop {
    pub(crate) fn new(
        registry: Arc<Registry>,
        detector: Arc<dyn VehicleDetector>,
        reporter: Arc<dyn ReportSink>,
        layout: SiteLayout,
        engine: PhaseEngine,
        commands: mpsc::Receiver<ControlCommand>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            registry,
            detector,
            reporter,
            layout,
            engine,
            commands,
            tick_interval,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(interval = ?self.tick_interval, "control loop started");
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now().timestamp();
                    self.run_cycle(now).await;
                }
                command = self.commands.recv() => match command {
                    Some(ControlCommand::ToggleMode) => self.engine.toggle_mode(),
                    None => {
                        info!("command channel closed, control loop stopping");
                        break;
                    }
                }
            }
        }
    }

    async fn run_cycle(&mut self, now: i64) {
        // 1. detection pass, fixed approach order for reproducible
        //    reporting
        for id in ApproachId::ALL {
            if !self.registry.is_bound(id) {
                continue;
            }
            self.registry.begin_cycle(id);
            // detection reads via the stamp captured here, not a
            // live-read mid-tick
            let Some(stamp) = self.registry.frame_stamp(id) else {
                continue;
            };
            let path = self.layout.frame_path(id, stamp);
            let detector = Arc::clone(&self.detector);
            match tokio::task::spawn_blocking(move || detector.detect(&path)).await {
                Ok(Ok(counts)) => self.registry.record_counts(id, counts),
                Ok(Err(e)) => {
                    warn!(approach = %id, error = %e, "detection failed, counts zeroed for this tick");
                }
                Err(e) => {
                    warn!(approach = %id, error = %e, "detection task aborted");
                }
            }
        }

        // 2. snapshot before the phase decision
        self.publish_snapshots().await;

        // 3. advance the phase machine on this tick's counts
        let counts = ApproachId::ALL.map(|id| self.registry.counts(id));
        let decision = self.engine.tick(&counts, now);

        // 4. commit new output vectors, then snapshot again
        if let Some(outputs) = decision.outputs {
            for id in ApproachId::ALL {
                self.registry.publish_outputs(id, outputs[id.index()]);
            }
            info!(phase = self.engine.phase(), "outputs committed");
        }
        self.publish_snapshots().await;

        // 5. aggregated accident flag over bound approaches
        let accident = ApproachId::ALL
            .iter()
            .any(|id| self.registry.is_bound(*id) && self.registry.counts(*id).accident > 0);

        // 6. decision record
        if let Err(e) = self
            .reporter
            .publish_decision(accident, decision.remaining_secs, decision.total_secs)
            .await
        {
            warn!(error = %e, "decision report failed");
        }
    }

    async fn publish_snapshots(&self) {
        for id in ApproachId::ALL {
            if !self.registry.is_bound(id) {
                continue;
            }
            let snap = self.registry.snapshot(id);
            let report = ApproachReport {
                id,
                stamp: snap.frame_stamp.unwrap_or(0),
                counts: snap.counts,
                leds: snap.leds,
            };
            if let Err(e) = self.reporter.publish_approach(report).await {
                warn!(approach = %id, error = %e, "approach report failed");
            }
        }
    }
}
