//! Danger zone and game over
//!
//! Each tick, after merges have settled, the zone samples every ball. A ball
//! resting with its top edge above the danger line starts its own countdown;
//! leaving the zone or speeding up cancels it. The first countdown to reach
//! the configured duration ends the game. `Over` is terminal.

use std::collections::BTreeMap;

use super::registry::BallId;
use crate::config::GameConfig;
use crate::{ms_to_ticks, ticks_to_ms};

/// What the zone needs to know about one ball this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallSample {
    pub id: BallId,
    /// Y of the ball's top edge (world units)
    pub top_y: f32,
    pub speed: f32,
    pub in_grace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DangerState {
    Safe,
    /// The most advanced countdown
    CountingDown { ball: BallId, started_tick: u64 },
    Over { final_score: u64, at_tick: u64 },
}

/// Countdown changes produced by one sample
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DangerReport {
    pub started: Vec<BallId>,
    pub cleared: Vec<BallId>,
    /// A countdown ran out; the caller should end the game
    pub expired: Option<BallId>,
}

#[derive(Debug, Clone)]
pub struct DangerZone {
    line_y: f32,
    speed_epsilon: f32,
    duration_ticks: u64,
    countdowns: BTreeMap<BallId, u64>,
    over: Option<(u64, u64)>,
}

impl DangerZone {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            line_y: config.danger_line_y(),
            speed_epsilon: config.danger_speed_epsilon,
            duration_ticks: ms_to_ticks(config.danger_duration_ms),
            countdowns: BTreeMap::new(),
            over: None,
        }
    }

    pub fn line_y(&self) -> f32 {
        self.line_y
    }

    fn in_zone(&self, sample: &BallSample) -> bool {
        sample.top_y > self.line_y && sample.speed < self.speed_epsilon && !sample.in_grace
    }

    /// Update countdowns from this tick's snapshot. Read-only with respect to balls.
    pub fn sample(&mut self, samples: &[BallSample], now: u64) -> DangerReport {
        let mut report = DangerReport::default();
        if self.over.is_some() {
            return report;
        }

        for sample in samples {
            let counting = self.countdowns.contains_key(&sample.id);
            match (self.in_zone(sample), counting) {
                (true, false) => {
                    self.countdowns.insert(sample.id, now);
                    report.started.push(sample.id);
                }
                (false, true) => {
                    self.countdowns.remove(&sample.id);
                    report.cleared.push(sample.id);
                }
                _ => {}
            }
        }

        // Balls that no longer exist
        let gone: Vec<BallId> = self
            .countdowns
            .keys()
            .filter(|id| !samples.iter().any(|s| s.id == **id))
            .copied()
            .collect();
        for id in gone {
            self.countdowns.remove(&id);
            report.cleared.push(id);
        }

        report.expired = self
            .oldest()
            .filter(|&(_, started)| now.saturating_sub(started) >= self.duration_ticks)
            .map(|(id, _)| id);
        report
    }

    /// Enter `Over` with the score at this instant. Only the first call counts.
    pub fn trigger_over(&mut self, score: u64, now: u64) -> bool {
        if let Some((final_score, _)) = self.over {
            log::warn!("game over already triggered (final score {})", final_score);
            return false;
        }
        self.over = Some((score, now));
        self.countdowns.clear();
        true
    }

    pub fn is_over(&self) -> bool {
        self.over.is_some()
    }

    pub fn final_score(&self) -> Option<u64> {
        self.over.map(|(score, _)| score)
    }

    pub fn state(&self) -> DangerState {
        if let Some((final_score, at_tick)) = self.over {
            return DangerState::Over {
                final_score,
                at_tick,
            };
        }
        match self.oldest() {
            Some((ball, started_tick)) => DangerState::CountingDown { ball, started_tick },
            None => DangerState::Safe,
        }
    }

    /// Milliseconds left on the most advanced countdown, for a visible timer
    pub fn remaining_ms(&self, now: u64) -> Option<u64> {
        if self.over.is_some() {
            return None;
        }
        self.oldest().map(|(_, started)| {
            let elapsed = now.saturating_sub(started);
            ticks_to_ms(self.duration_ticks.saturating_sub(elapsed))
        })
    }

    pub fn counting(&self) -> usize {
        self.countdowns.len()
    }

    fn oldest(&self) -> Option<(BallId, u64)> {
        self.countdowns
            .iter()
            .min_by_key(|&(id, started)| (*started, *id))
            .map(|(id, started)| (*id, *started))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SIM_HZ;

    const SECOND: u64 = SIM_HZ as u64;

    fn zone() -> DangerZone {
        DangerZone::new(&GameConfig {
            danger_duration_ms: 3000,
            ..Default::default()
        })
    }

    fn resting_above(zone: &DangerZone, id: u32) -> BallSample {
        BallSample {
            id: BallId(id),
            top_y: zone.line_y() + 0.2,
            speed: 0.0,
            in_grace: false,
        }
    }

    fn below(zone: &DangerZone, id: u32) -> BallSample {
        BallSample {
            top_y: zone.line_y() - 0.5,
            ..resting_above(zone, id)
        }
    }

    #[test]
    fn test_danger_then_escape() {
        let mut zone = zone();
        let report = zone.sample(&[resting_above(&zone, 1)], 0);
        assert_eq!(report.started, vec![BallId(1)]);
        assert!(matches!(zone.state(), DangerState::CountingDown { .. }));

        for t in 1..SECOND {
            let report = zone.sample(&[resting_above(&zone, 1)], t);
            assert_eq!(report.expired, None);
        }
        let report = zone.sample(&[below(&zone, 1)], SECOND);
        assert_eq!(report.cleared, vec![BallId(1)]);
        assert_eq!(zone.state(), DangerState::Safe);

        // Well past the original deadline, still safe
        for t in SECOND..5 * SECOND {
            assert_eq!(zone.sample(&[below(&zone, 1)], t).expired, None);
        }
        assert!(!zone.is_over());
    }

    #[test]
    fn test_danger_to_game_over() {
        let mut zone = zone();
        let mut expired_at = None;
        for t in 0..=3 * SECOND {
            if let Some(id) = zone.sample(&[resting_above(&zone, 7)], t).expired {
                expired_at = Some((t, id));
                break;
            }
        }
        assert_eq!(expired_at, Some((3 * SECOND, BallId(7))));

        assert!(zone.trigger_over(450, 3 * SECOND));
        assert!(!zone.trigger_over(999, 3 * SECOND + 1));
        assert_eq!(zone.final_score(), Some(450));
        assert_eq!(
            zone.state(),
            DangerState::Over {
                final_score: 450,
                at_tick: 3 * SECOND
            }
        );
        // Terminal: sampling does nothing
        assert_eq!(
            zone.sample(&[resting_above(&zone, 8)], 4 * SECOND),
            DangerReport::default()
        );
    }

    #[test]
    fn test_fast_ball_not_counted() {
        let mut zone = zone();
        let passing = BallSample {
            speed: 5.0,
            ..resting_above(&zone, 1)
        };
        assert!(zone.sample(&[passing], 0).started.is_empty());
    }

    #[test]
    fn test_speeding_up_cancels() {
        let mut zone = zone();
        zone.sample(&[resting_above(&zone, 1)], 0);
        let bumped = BallSample {
            speed: 1.0,
            ..resting_above(&zone, 1)
        };
        assert_eq!(zone.sample(&[bumped], 10).cleared, vec![BallId(1)]);
    }

    #[test]
    fn test_grace_ball_not_counted() {
        let mut zone = zone();
        let fresh = BallSample {
            in_grace: true,
            ..resting_above(&zone, 1)
        };
        assert!(zone.sample(&[fresh], 0).started.is_empty());
    }

    #[test]
    fn test_removed_ball_cancels_countdown() {
        let mut zone = zone();
        zone.sample(&[resting_above(&zone, 1), resting_above(&zone, 2)], 0);
        let report = zone.sample(&[resting_above(&zone, 2)], 1);
        assert_eq!(report.cleared, vec![BallId(1)]);
        assert_eq!(zone.counting(), 1);
    }

    #[test]
    fn test_remaining_tracks_oldest() {
        let mut zone = zone();
        zone.sample(&[resting_above(&zone, 1)], 0);
        zone.sample(&[resting_above(&zone, 1), resting_above(&zone, 2)], SECOND);
        assert_eq!(zone.remaining_ms(SECOND), Some(2000));
        assert_eq!(
            zone.state(),
            DangerState::CountingDown {
                ball: BallId(1),
                started_tick: 0
            }
        );
    }
}
