//! Phase engine implementation

use crate::outputs::{day_phase_outputs, night_phase_outputs, ALL_AMBER};
use crate::{DAY_AMBER_PHASE, NIGHT_AMBER_PHASE};
use approach_registry::{ApproachId, LedVector, VehicleCounts};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Day-mode extension bounds, seconds.
pub const DAY_EXTENSION_MIN: i64 = -5;
pub const DAY_EXTENSION_MAX: i64 = 10;

/// Night-mode defensive extension bounds, seconds. Night mode never
/// recomputes the extension from counts; the inherited value is merely
/// forced into this range on every evaluation.
pub const NIGHT_EXTENSION_MIN: i64 = 0;
pub const NIGHT_EXTENSION_MAX: i64 = 40;

/// Which phase algorithm is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Day,
    Night,
}

/// Scheduler timing configuration.
///
/// Defaults: 20 s base green and 5 s amber by day, a 10 s cross-green
/// window and 3 s amber by night, cross traffic triggering at two
/// vehicles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Base duration of a day-mode green phase, before extension.
    pub day_green_secs: i64,
    /// Day-mode amber interstitial duration.
    pub day_amber_secs: i64,
    /// Night-mode east/west green window.
    pub night_cross_green_secs: i64,
    /// Night-mode amber interstitial duration.
    pub night_amber_secs: i64,
    /// East/west vehicle count that releases the night-mode hold.
    pub night_cross_threshold: u32,
    /// Control loop tick interval.
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            day_green_secs: 20,
            day_amber_secs: 5,
            night_cross_green_secs: 10,
            night_amber_secs: 3,
            night_cross_threshold: 2,
            tick_interval_ms: 1000,
        }
    }
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Copy)]
pub struct TickDecision {
    /// New output vectors to publish, indexed east/west/south/north.
    /// `None` when the displayed phase did not change this tick.
    pub outputs: Option<[LedVector; 4]>,
    /// Seconds left in the currently displayed phase.
    pub remaining_secs: i64,
    /// Full duration of the currently displayed phase.
    pub total_secs: i64,
}

/// The intersection phase state machine.
///
/// `phase` is the phase currently displayed: day mode uses 0..=3 for
/// the green phases and [`DAY_AMBER_PHASE`] for amber; night mode uses
/// 0 (north/south held), 1 (east/west window) and
/// [`NIGHT_AMBER_PHASE`]. During amber, `next_phase` holds the saved
/// phase committed when the interstitial expires.
#[derive(Debug)]
pub struct PhaseEngine {
    config: SchedulerConfig,
    mode: Mode,
    phase: u8,
    next_phase: u8,
    phase_started_at: Option<i64>,
    amber_started_at: Option<i64>,
    extension: i64,
}

impl PhaseEngine {
    /// Create an engine ready to light its first phase on the next tick.
    pub fn new(mode: Mode, config: SchedulerConfig) -> Self {
        Self {
            config,
            mode,
            phase: 0,
            next_phase: 0,
            phase_started_at: None,
            amber_started_at: None,
            extension: 0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Current duration extension, seconds.
    pub fn extension(&self) -> i64 {
        self.extension
    }

    /// Switch algorithms. Resets all cycle state; the next tick lights
    /// the new mode's phase 0.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.phase = 0;
        self.next_phase = 0;
        self.phase_started_at = None;
        self.amber_started_at = None;
        self.extension = 0;
        info!(?mode, "scheduler mode switched");
    }

    /// Flip between day and night.
    pub fn toggle_mode(&mut self) {
        let next = match self.mode {
            Mode::Day => Mode::Night,
            Mode::Night => Mode::Day,
        };
        self.set_mode(next);
    }

    /// Advance the machine by one tick.
    ///
    /// `counts` is indexed east/west/south/north; `now` is the wall
    /// clock in unix seconds. Counts affect only durations and the
    /// night-mode hold, never the cycle order.
    pub fn tick(&mut self, counts: &[VehicleCounts; 4], now: i64) -> TickDecision {
        match self.mode {
            Mode::Day => self.tick_day(counts, now),
            Mode::Night => self.tick_night(counts, now),
        }
    }

    fn green_duration(&self) -> i64 {
        self.config.day_green_secs + self.extension
    }

    fn tick_day(&mut self, counts: &[VehicleCounts; 4], now: i64) -> TickDecision {
        let Some(started) = self.phase_started_at else {
            // cold start or fresh mode switch
            self.phase = 0;
            self.next_phase = 0;
            self.phase_started_at = Some(now);
            self.amber_started_at = None;
            let total = self.green_duration();
            info!(phase = self.phase, "day cycle started");
            return TickDecision {
                outputs: Some(day_phase_outputs(self.phase)),
                remaining_secs: total,
                total_secs: total,
            };
        };

        if self.phase == DAY_AMBER_PHASE {
            let amber_started = self.amber_started_at.unwrap_or(now);
            let elapsed = now - amber_started;
            if elapsed >= self.config.day_amber_secs {
                self.phase = self.next_phase;
                self.phase_started_at = Some(now);
                self.amber_started_at = None;
                let total = self.green_duration();
                info!(
                    phase = self.phase,
                    extension = self.extension,
                    "day phase committed"
                );
                TickDecision {
                    outputs: Some(day_phase_outputs(self.phase)),
                    remaining_secs: total,
                    total_secs: total,
                }
            } else {
                TickDecision {
                    outputs: None,
                    remaining_secs: self.config.day_amber_secs - elapsed,
                    total_secs: self.config.day_amber_secs,
                }
            }
        } else {
            let duration = self.green_duration();
            let elapsed = now - started;
            if elapsed >= duration {
                let (ns, ew) = front_totals(counts);
                let raw = match self.phase {
                    0 | 1 => 3 * (ns - ew),
                    _ => 3 * (ew - ns),
                };
                self.extension = raw.clamp(DAY_EXTENSION_MIN, DAY_EXTENSION_MAX);
                self.next_phase = (self.phase + 1) % 4;
                self.phase = DAY_AMBER_PHASE;
                self.amber_started_at = Some(now);
                // phase_started_at keeps its old anchor until amber
                // commits the saved phase
                debug!(
                    next_phase = self.next_phase,
                    extension = self.extension,
                    "entering amber"
                );
                TickDecision {
                    outputs: Some(ALL_AMBER),
                    remaining_secs: self.config.day_amber_secs,
                    total_secs: self.config.day_amber_secs,
                }
            } else {
                TickDecision {
                    outputs: None,
                    remaining_secs: duration - elapsed,
                    total_secs: duration,
                }
            }
        }
    }

    fn tick_night(&mut self, counts: &[VehicleCounts; 4], now: i64) -> TickDecision {
        // inherited value only, never recomputed at night
        self.extension = self
            .extension
            .clamp(NIGHT_EXTENSION_MIN, NIGHT_EXTENSION_MAX);

        let Some(started) = self.phase_started_at else {
            self.phase = 0;
            self.next_phase = 0;
            self.phase_started_at = Some(now);
            self.amber_started_at = None;
            info!("night cycle started, holding north/south green");
            return TickDecision {
                outputs: Some(night_phase_outputs(0)),
                remaining_secs: 0,
                total_secs: 0,
            };
        };

        match self.phase {
            NIGHT_AMBER_PHASE => {
                let amber_started = self.amber_started_at.unwrap_or(now);
                let elapsed = now - amber_started;
                if elapsed >= self.config.night_amber_secs {
                    self.phase = self.next_phase;
                    self.phase_started_at = Some(now);
                    self.amber_started_at = None;
                    let total = if self.phase == 1 {
                        self.config.night_cross_green_secs
                    } else {
                        0
                    };
                    info!(phase = self.phase, "night phase committed");
                    TickDecision {
                        outputs: Some(night_phase_outputs(self.phase)),
                        remaining_secs: total,
                        total_secs: total,
                    }
                } else {
                    TickDecision {
                        outputs: None,
                        remaining_secs: self.config.night_amber_secs - elapsed,
                        total_secs: self.config.night_amber_secs,
                    }
                }
            }
            0 => {
                let (_, ew) = front_totals(counts);
                if ew >= self.config.night_cross_threshold as i64 {
                    self.next_phase = 1;
                    self.phase = NIGHT_AMBER_PHASE;
                    self.amber_started_at = Some(now);
                    info!(ew_count = ew, "cross traffic detected, releasing hold");
                    TickDecision {
                        outputs: Some(ALL_AMBER),
                        remaining_secs: self.config.night_amber_secs,
                        total_secs: self.config.night_amber_secs,
                    }
                } else {
                    // held indefinitely; no countdown to report
                    TickDecision {
                        outputs: None,
                        remaining_secs: 0,
                        total_secs: 0,
                    }
                }
            }
            _ => {
                let duration = self.config.night_cross_green_secs;
                let elapsed = now - started;
                if elapsed >= duration {
                    self.next_phase = 0;
                    self.phase = NIGHT_AMBER_PHASE;
                    self.amber_started_at = Some(now);
                    TickDecision {
                        outputs: Some(ALL_AMBER),
                        remaining_secs: self.config.night_amber_secs,
                        total_secs: self.config.night_amber_secs,
                    }
                } else {
                    TickDecision {
                        outputs: None,
                        remaining_secs: duration - elapsed,
                        total_secs: duration,
                    }
                }
            }
        }
    }
}

/// North/south and east/west front-count totals.
fn front_totals(counts: &[VehicleCounts; 4]) -> (i64, i64) {
    let ew = counts[ApproachId::East.index()].front as i64
        + counts[ApproachId::West.index()].front as i64;
    let ns = counts[ApproachId::North.index()].front as i64
        + counts[ApproachId::South.index()].front as i64;
    (ns, ew)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_counts() -> [VehicleCounts; 4] {
        [VehicleCounts::default(); 4]
    }

    fn counts(east: u32, west: u32, south: u32, north: u32) -> [VehicleCounts; 4] {
        let mut c = zero_counts();
        c[ApproachId::East.index()].front = east;
        c[ApproachId::West.index()].front = west;
        c[ApproachId::South.index()].front = south;
        c[ApproachId::North.index()].front = north;
        c
    }

    fn accident_counts() -> [VehicleCounts; 4] {
        let mut c = zero_counts();
        c[ApproachId::East.index()].accident = 1;
        c
    }

    /// Run the engine forward until the displayed phase changes,
    /// returning the new phase. Ticks once per simulated second.
    fn advance_to_next_phase(
        engine: &mut PhaseEngine,
        counts: &[VehicleCounts; 4],
        now: &mut i64,
    ) -> u8 {
        for _ in 0..120 {
            *now += 1;
            if engine.tick(counts, *now).outputs.is_some() {
                return engine.phase();
            }
        }
        panic!("no phase change within 120 simulated seconds");
    }

    #[test]
    fn day_cycle_visits_phases_in_order_through_amber() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        let counts = zero_counts();
        let mut now = 0;

        let first = engine.tick(&counts, now);
        assert!(first.outputs.is_some());
        assert_eq!(engine.phase(), 0);

        let mut visited = Vec::new();
        for _ in 0..8 {
            visited.push(advance_to_next_phase(&mut engine, &counts, &mut now));
        }
        assert_eq!(visited, vec![4, 1, 4, 2, 4, 3, 4, 0]);
    }

    #[test]
    fn count_pressure_never_reorders_the_cycle() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        let heavy = counts(50, 50, 0, 0);
        let mut now = 0;
        engine.tick(&heavy, now);

        let mut greens = Vec::new();
        for _ in 0..16 {
            let phase = advance_to_next_phase(&mut engine, &heavy, &mut now);
            if phase != DAY_AMBER_PHASE {
                greens.push(phase);
            }
        }
        assert_eq!(greens, vec![1, 2, 3, 0, 1, 2, 3, 0]);
    }

    #[test]
    fn extension_from_phase_zero_is_clamped_high() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        // NS_count = 5, EW_count = 1 -> 3 * 4 = 12, clamped to 10
        let c = counts(1, 0, 2, 3);
        let mut now = 0;
        engine.tick(&c, now);

        let phase = advance_to_next_phase(&mut engine, &c, &mut now);
        assert_eq!(phase, DAY_AMBER_PHASE);
        assert_eq!(engine.extension(), DAY_EXTENSION_MAX);

        // the saved phase commits after amber with the extended duration
        let phase = advance_to_next_phase(&mut engine, &c, &mut now);
        assert_eq!(phase, 1);
        let decision = engine.tick(&c, now + 1);
        assert_eq!(decision.total_secs, 20 + DAY_EXTENSION_MAX);
    }

    #[test]
    fn extension_is_clamped_low_under_cross_pressure() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        // NS_count = 0, EW_count = 10 -> 3 * (0 - 10) = -30, clamped to -5
        let c = counts(6, 4, 0, 0);
        let mut now = 0;
        engine.tick(&c, now);

        let phase = advance_to_next_phase(&mut engine, &c, &mut now);
        assert_eq!(phase, DAY_AMBER_PHASE);
        assert_eq!(engine.extension(), DAY_EXTENSION_MIN);
    }

    #[test]
    fn extension_stays_clamped_across_many_transitions() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        let wild = counts(100, 100, 77, 3);
        let mut now = 0;
        engine.tick(&wild, now);
        for _ in 0..24 {
            advance_to_next_phase(&mut engine, &wild, &mut now);
            assert!(engine.extension() >= DAY_EXTENSION_MIN);
            assert!(engine.extension() <= DAY_EXTENSION_MAX);
        }
    }

    #[test]
    fn amber_duration_is_fixed() {
        let config = SchedulerConfig::default();
        let mut engine = PhaseEngine::new(Mode::Day, config.clone());
        let c = zero_counts();
        let mut now = 0;
        engine.tick(&c, now);

        advance_to_next_phase(&mut engine, &c, &mut now);
        assert_eq!(engine.phase(), DAY_AMBER_PHASE);
        let entered_amber = now;
        advance_to_next_phase(&mut engine, &c, &mut now);
        assert_eq!(now - entered_amber, config.day_amber_secs);
    }

    #[test]
    fn night_holds_until_cross_traffic() {
        let mut engine = PhaseEngine::new(Mode::Night, SchedulerConfig::default());
        let quiet = counts(1, 0, 0, 0); // EW_count = 1, below threshold
        let mut now = 0;
        let first = engine.tick(&quiet, now);
        assert!(first.outputs.is_some());
        assert_eq!(engine.phase(), 0);

        for _ in 0..300 {
            now += 1;
            let decision = engine.tick(&quiet, now);
            assert!(decision.outputs.is_none());
            assert_eq!(engine.phase(), 0);
        }
    }

    #[test]
    fn night_releases_within_one_tick_of_threshold() {
        let mut engine = PhaseEngine::new(Mode::Night, SchedulerConfig::default());
        let mut now = 0;
        engine.tick(&zero_counts(), now);

        now += 1;
        let decision = engine.tick(&counts(1, 1, 0, 0), now);
        assert!(decision.outputs.is_some());
        assert_eq!(engine.phase(), NIGHT_AMBER_PHASE);
    }

    #[test]
    fn night_cross_window_is_bounded_and_returns() {
        let config = SchedulerConfig::default();
        let mut engine = PhaseEngine::new(Mode::Night, config.clone());
        let busy = counts(2, 2, 0, 0);
        let mut now = 0;
        engine.tick(&busy, now);

        // hold -> amber -> cross green
        assert_eq!(advance_to_next_phase(&mut engine, &busy, &mut now), NIGHT_AMBER_PHASE);
        assert_eq!(advance_to_next_phase(&mut engine, &busy, &mut now), 1);
        let cross_started = now;

        // cross green -> amber -> hold, even with cross traffic still
        // present: the window is fixed
        assert_eq!(advance_to_next_phase(&mut engine, &busy, &mut now), NIGHT_AMBER_PHASE);
        assert_eq!(now - cross_started, config.night_cross_green_secs);
        assert_eq!(advance_to_next_phase(&mut engine, &busy, &mut now), 0);
    }

    #[test]
    fn night_never_recomputes_extension() {
        let mut engine = PhaseEngine::new(Mode::Night, SchedulerConfig::default());
        let busy = counts(30, 30, 40, 40);
        let mut now = 0;
        engine.tick(&busy, now);
        for _ in 0..6 {
            advance_to_next_phase(&mut engine, &busy, &mut now);
            assert_eq!(engine.extension(), 0);
        }
    }

    #[test]
    fn mode_switch_resets_cycle_state() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        let c = counts(0, 0, 5, 5);
        let mut now = 0;
        engine.tick(&c, now);
        advance_to_next_phase(&mut engine, &c, &mut now);
        assert_ne!(engine.extension(), 0);

        engine.toggle_mode();
        assert_eq!(engine.mode(), Mode::Night);
        assert_eq!(engine.phase(), 0);
        assert_eq!(engine.extension(), 0);

        // next tick lights night phase 0 afresh
        now += 1;
        let decision = engine.tick(&zero_counts(), now);
        assert!(decision.outputs.is_some());

        engine.toggle_mode();
        assert_eq!(engine.mode(), Mode::Day);
    }

    #[test]
    fn remaining_time_counts_down_during_green() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        let c = zero_counts();
        engine.tick(&c, 0);
        let d5 = engine.tick(&c, 5);
        assert_eq!(d5.remaining_secs, 15);
        assert_eq!(d5.total_secs, 20);
        let d12 = engine.tick(&c, 12);
        assert_eq!(d12.remaining_secs, 8);
    }

    #[test]
    fn accident_flag_does_not_disturb_the_machine() {
        let mut engine = PhaseEngine::new(Mode::Day, SchedulerConfig::default());
        let c = accident_counts();
        let mut now = 0;
        engine.tick(&c, now);
        assert_eq!(advance_to_next_phase(&mut engine, &c, &mut now), DAY_AMBER_PHASE);
    }
}
