use crate::hardware::context::AvidaContext;
use crate::hardware::merit::Merit;
use crate::schedule::Schedule;

/// Deterministic merit-proportional scheduling.
///
/// Slots take turns in order, and each turn is a burst of
/// `ave_time_slice * weight / mean_weight` consecutive ticks. The fractional
/// part of a burst is carried into the slot's next turn, so over a full
/// rotation every slot gets exactly its share.
#[derive(Clone, Debug, Default)]
pub struct IntegratedSchedule {
    weights: Vec<f64>,
    carry: Vec<f64>,
    total: f64,
    num_active: usize,
    cursor: usize,
    remaining: u64,
    ave_time_slice: f64,
}

impl IntegratedSchedule {
    pub fn new(size: usize, ave_time_slice: u32) -> Self {
        Self {
            weights: vec![0.0; size],
            carry: vec![0.0; size],
            total: 0.0,
            num_active: 0,
            cursor: size.saturating_sub(1),
            remaining: 0,
            ave_time_slice: ave_time_slice.max(1) as f64,
        }
    }

    fn recount(&mut self) {
        self.total = self.weights.iter().sum();
        self.num_active = self.weights.iter().filter(|w| **w > 0.0).count();
    }

    /// Starts a new burst on the next slot that earns at least one tick.
    fn next_burst(&mut self) -> Option<usize> {
        let n = self.weights.len();
        let mean = self.total / self.num_active as f64;
        // Two passes: carries can lift a slot that fell short on the first.
        for _ in 0..2 * n {
            self.cursor = (self.cursor + 1) % n;
            let weight = self.weights[self.cursor];
            if weight <= 0.0 {
                continue;
            }
            let budget = self.carry[self.cursor] + self.ave_time_slice * weight / mean;
            let whole = budget.floor();
            self.carry[self.cursor] = budget - whole;
            if whole >= 1.0 {
                self.remaining = whole as u64 - 1;
                return Some(self.cursor);
            }
        }
        let fallback = self.weights.iter().position(|w| *w > 0.0)?;
        self.cursor = fallback;
        self.remaining = 0;
        Some(fallback)
    }
}

impl Schedule for IntegratedSchedule {
    fn adjust(&mut self, id: usize, merit: &Merit) {
        if id >= self.weights.len() {
            return;
        }
        let weight = merit.value();
        let weight = if weight.is_nan() { 0.0 } else { weight.max(0.0) };
        if weight <= 0.0 {
            self.carry[id] = 0.0;
        }
        self.weights[id] = weight;
        // Re-summed rather than patched with deltas, which drift.
        self.recount();
    }

    fn next_id(&mut self, _ctx: &mut AvidaContext) -> Option<usize> {
        if self.num_active == 0 || self.weights.is_empty() {
            return None;
        }
        if self.remaining > 0 && self.weights.get(self.cursor).is_some_and(|w| *w > 0.0) {
            self.remaining -= 1;
            return Some(self.cursor);
        }
        self.next_burst()
    }

    fn set_size(&mut self, size: usize) {
        self.weights.resize(size, 0.0);
        self.carry.resize(size, 0.0);
        if self.cursor >= size {
            self.cursor = size.saturating_sub(1);
            self.remaining = 0;
        }
        self.recount();
    }

    fn size(&self) -> usize {
        self.weights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bursts_scale_with_weight() {
        let mut ctx = AvidaContext::new(1);
        let mut schedule = IntegratedSchedule::new(2, 4);
        schedule.adjust(0, &Merit::new(1.0));
        schedule.adjust(1, &Merit::new(3.0));
        // Mean weight 2: slot 0 gets 2 ticks, slot 1 gets 6.
        let order: Vec<_> = (0..8).filter_map(|_| schedule.next_id(&mut ctx)).collect();
        assert_eq!(order, vec![0, 0, 1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn fractional_bursts_carry_over() {
        let mut ctx = AvidaContext::new(2);
        let mut schedule = IntegratedSchedule::new(3, 1);
        schedule.adjust(0, &Merit::new(1.0));
        schedule.adjust(1, &Merit::new(1.0));
        schedule.adjust(2, &Merit::new(4.0));
        // Mean 2: slots 0 and 1 earn half a tick per turn, slot 2 earns two.
        let mut counts = [0usize; 3];
        for _ in 0..600 {
            counts[schedule.next_id(&mut ctx).unwrap()] += 1;
        }
        assert_eq!(counts[0], counts[1]);
        assert!((counts[2] as i64 - 4 * counts[0] as i64).abs() <= 4);
    }
}
