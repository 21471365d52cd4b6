//! Population schedulers: which slot's CPU runs the next tick.
//!
//! Every policy keeps one weight per population slot, mirrored from the
//! occupant's merit through [`Schedule::adjust`]. A weight of zero removes
//! the slot from consideration; with no positive weight left,
//! [`Schedule::next_id`] returns `None`.

pub mod const_schedule;
pub mod integrated_schedule;
pub mod prob_schedule;
pub mod weighted_index;

use crate::config::SlicingMethod;
use crate::hardware::context::AvidaContext;
use crate::hardware::merit::Merit;
pub use const_schedule::ConstSchedule;
pub use integrated_schedule::IntegratedSchedule;
pub use prob_schedule::ProbSchedule;

pub trait Schedule: Send {
    /// Sets the weight of slot `id` from its merit.
    fn adjust(&mut self, id: usize, merit: &Merit);

    /// Next slot to execute, or `None` when every weight is zero.
    fn next_id(&mut self, ctx: &mut AvidaContext) -> Option<usize>;

    /// Resizes the slot space; new slots start with weight zero.
    fn set_size(&mut self, size: usize);

    fn size(&self) -> usize;
}

pub fn create_schedule(
    method: SlicingMethod,
    size: usize,
    ave_time_slice: u32,
) -> Box<dyn Schedule> {
    match method {
        SlicingMethod::Constant => Box::new(ConstSchedule::new(size)),
        SlicingMethod::Probabilistic => Box::new(ProbSchedule::new(size)),
        SlicingMethod::Integrated => Box::new(IntegratedSchedule::new(size, ave_time_slice)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frequencies(schedule: &mut dyn Schedule, draws: usize, seed: u64) -> Vec<f64> {
        let mut ctx = AvidaContext::new(seed);
        let mut counts = vec![0usize; schedule.size()];
        for _ in 0..draws {
            let id = schedule.next_id(&mut ctx).unwrap();
            counts[id] += 1;
        }
        counts.into_iter().map(|c| c as f64 / draws as f64).collect()
    }

    fn all_methods() -> [SlicingMethod; 3] {
        [
            SlicingMethod::Constant,
            SlicingMethod::Probabilistic,
            SlicingMethod::Integrated,
        ]
    }

    #[test]
    fn equal_weights_are_fair() {
        for method in all_methods() {
            let mut schedule = create_schedule(method, 5, 10);
            for id in 0..5 {
                schedule.adjust(id, &Merit::new(3.0));
            }
            for f in frequencies(schedule.as_mut(), 50_000, 1) {
                assert!((f - 0.2).abs() < 0.01, "{:?}: frequency {}", method, f);
            }
        }
    }

    #[test]
    fn merit_weighted_policies_are_proportional() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        for method in [SlicingMethod::Probabilistic, SlicingMethod::Integrated] {
            let mut schedule = create_schedule(method, weights.len(), 30);
            for (id, w) in weights.iter().enumerate() {
                schedule.adjust(id, &Merit::new(*w));
            }
            let freqs = frequencies(schedule.as_mut(), 100_000, 2);
            for (f, w) in freqs.iter().zip(weights) {
                assert!((f - w / 10.0).abs() < 0.01, "{:?}: {} vs {}", method, f, w / 10.0);
            }
        }
    }

    #[test]
    fn all_zero_weights_yield_none() {
        let mut ctx = AvidaContext::new(3);
        for method in all_methods() {
            let mut schedule = create_schedule(method, 4, 30);
            assert_eq!(schedule.next_id(&mut ctx), None);
            schedule.adjust(2, &Merit::new(5.0));
            assert_eq!(schedule.next_id(&mut ctx), Some(2));
            schedule.adjust(2, &Merit::ZERO);
            assert_eq!(schedule.next_id(&mut ctx), None);

            let mut empty = create_schedule(method, 0, 30);
            assert_eq!(empty.next_id(&mut ctx), None);
        }
    }

    #[test]
    fn zero_weight_slots_are_never_chosen() {
        let mut ctx = AvidaContext::new(4);
        for method in all_methods() {
            let mut schedule = create_schedule(method, 6, 5);
            schedule.adjust(1, &Merit::new(1.0));
            schedule.adjust(4, &Merit::new(2.0));
            for _ in 0..1000 {
                let id = schedule.next_id(&mut ctx).unwrap();
                assert!(id == 1 || id == 4);
            }
        }
    }

    #[test]
    fn shrinking_drops_slots() {
        let mut ctx = AvidaContext::new(5);
        for method in all_methods() {
            let mut schedule = create_schedule(method, 4, 5);
            schedule.adjust(3, &Merit::new(1.0));
            schedule.set_size(3);
            assert_eq!(schedule.size(), 3);
            assert_eq!(schedule.next_id(&mut ctx), None);
            schedule.set_size(8);
            schedule.adjust(7, &Merit::new(1.0));
            assert_eq!(schedule.next_id(&mut ctx), Some(7));
        }
    }

    #[test]
    fn removing_a_huge_merit_leaves_exact_totals() {
        let mut ctx = AvidaContext::new(6);
        let mut schedule = create_schedule(SlicingMethod::Probabilistic, 4, 30);
        schedule.adjust(0, &Merit::new(1e16));
        schedule.adjust(1, &Merit::new(1.0));
        schedule.adjust(0, &Merit::ZERO);
        for _ in 0..5 {
            assert_eq!(schedule.next_id(&mut ctx), Some(1));
        }
    }

    #[test]
    fn integrated_bursts_recover_after_huge_merit_leaves() {
        let mut schedule = create_schedule(SlicingMethod::Integrated, 3, 30);
        schedule.adjust(0, &Merit::new(1e17));
        schedule.adjust(1, &Merit::new(1.0));
        schedule.adjust(2, &Merit::new(3.0));
        schedule.adjust(0, &Merit::ZERO);
        let freqs = frequencies(schedule.as_mut(), 4000, 7);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[1] - 0.25).abs() < 0.02, "{}", freqs[1]);
        assert!((freqs[2] - 0.75).abs() < 0.02, "{}", freqs[2]);
    }
}
