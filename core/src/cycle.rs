//! Cycle phase derivation from a daily menstruation flag.

use serde::Serialize;

use crate::models::Phase;

/// Cycle numbering continues from cycles tracked before this data set.
pub const DEFAULT_CYCLE_OFFSET: u32 = 3;

/// One day of input, in date order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleInput {
    pub menstruation: bool,
    /// Phase typed into the log, kept when the flag says nothing.
    pub recorded_phase: Option<Phase>,
}

/// Derived cycle fields for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleDay {
    pub phase: Option<Phase>,
    pub phase_id: Option<u8>,
    pub cycle_number: u32,
    pub cycle_day: u32,
    /// This day opened a new cycle.
    pub cycle_start: bool,
}

#[derive(Debug, Clone, Copy)]
struct CycleState {
    prev_flag: bool,
    prev_marked_menstrual: bool,
    last_phase: Option<Phase>,
    cycle_number: u32,
    cycle_day: u32,
}

impl CycleState {
    fn new(offset: u32) -> Self {
        Self {
            prev_flag: false,
            prev_marked_menstrual: false,
            last_phase: None,
            cycle_number: offset,
            cycle_day: 0,
        }
    }

    fn step(&mut self, input: CycleInput) -> CycleDay {
        let marked = if input.menstruation {
            Some(Phase::Menstrual)
        } else if self.prev_flag {
            Some(Phase::Follicular)
        } else {
            input.recorded_phase
        };

        let is_menstrual = marked == Some(Phase::Menstrual);
        let cycle_start = is_menstrual && !self.prev_marked_menstrual;
        if cycle_start {
            self.cycle_number = self.cycle_number.saturating_add(1);
            self.cycle_day = 1;
        } else {
            self.cycle_day = self.cycle_day.saturating_add(1);
        }

        let phase = marked.or(self.last_phase);
        self.last_phase = phase;
        self.prev_flag = input.menstruation;
        self.prev_marked_menstrual = is_menstrual;

        CycleDay {
            phase,
            phase_id: phase.map(Phase::ordinal),
            cycle_number: self.cycle_number,
            cycle_day: self.cycle_day,
            cycle_start,
        }
    }
}

/// Single forward pass with one day of lookback.
///
/// Only `Menstrual` and `Follicular` are inferred. Any other phase comes from
/// the log itself and is carried forward over blank days.
#[derive(Debug, Clone, Copy)]
pub struct CyclePhaseDeriver {
    offset: u32,
}

impl Default for CyclePhaseDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_CYCLE_OFFSET)
    }
}

impl CyclePhaseDeriver {
    #[must_use]
    pub fn new(offset: u32) -> Self {
        Self { offset }
    }

    #[must_use]
    pub fn derive(&self, days: &[CycleInput]) -> Vec<CycleDay> {
        let mut state = CycleState::new(self.offset);
        days.iter().map(|day| state.step(*day)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(f: &[bool]) -> Vec<CycleInput> {
        f.iter()
            .map(|&m| CycleInput {
                menstruation: m,
                recorded_phase: None,
            })
            .collect()
    }

    #[test]
    fn test_flag_sequence_phases() {
        let mut input = flags(&[false, true, true, false, false]);
        input[0].recorded_phase = Some(Phase::Luteal);
        let days = CyclePhaseDeriver::default().derive(&input);
        let phases: Vec<_> = days.iter().map(|d| d.phase).collect();
        assert_eq!(
            phases,
            vec![
                Some(Phase::Luteal),
                Some(Phase::Menstrual),
                Some(Phase::Menstrual),
                Some(Phase::Follicular),
                Some(Phase::Follicular),
            ]
        );
        let cycle_days: Vec<_> = days.iter().map(|d| d.cycle_day).collect();
        assert_eq!(cycle_days, vec![1, 1, 2, 3, 4]);
        assert_eq!(days[0].cycle_number, 3);
        assert_eq!(days[1].cycle_number, 4);
        assert!(days[1].cycle_start);
        assert!(!days[2].cycle_start);
        assert_eq!(days[3].phase_id, Some(2));
    }

    #[test]
    fn test_cycle_number_increments_per_bleed() {
        let days = CyclePhaseDeriver::new(0).derive(&flags(&[true, false, false, true, true, false]));
        let numbers: Vec<_> = days.iter().map(|d| d.cycle_number).collect();
        assert_eq!(numbers, vec![1, 1, 1, 2, 2, 2]);
        assert_eq!(days[3].cycle_day, 1);
        assert_eq!(days[5].cycle_day, 3);
    }

    #[test]
    fn test_recorded_phase_kept_and_carried() {
        let mut input = flags(&[true, false, false, false, false]);
        input[3].recorded_phase = Some(Phase::Ovulatory);
        let days = CyclePhaseDeriver::default().derive(&input);
        assert_eq!(days[2].phase, Some(Phase::Follicular));
        assert_eq!(days[3].phase, Some(Phase::Ovulatory));
        assert_eq!(days[4].phase, Some(Phase::Ovulatory));
        assert_eq!(days[4].phase_id, Some(3));
    }

    #[test]
    fn test_huge_offset_saturates() {
        let days = CyclePhaseDeriver::new(u32::MAX).derive(&flags(&[true, false, true]));
        assert!(days.iter().all(|d| d.cycle_number == u32::MAX));
        assert!(days[2].cycle_start);
        assert_eq!(days[2].cycle_day, 1);
    }

    #[test]
    fn test_no_flags_no_phase() {
        let days = CyclePhaseDeriver::default().derive(&flags(&[false, false]));
        assert!(days.iter().all(|d| d.phase.is_none() && d.phase_id.is_none()));
        assert_eq!(days[1].cycle_day, 2);
        assert!(CyclePhaseDeriver::default().derive(&[]).is_empty());
    }
}
