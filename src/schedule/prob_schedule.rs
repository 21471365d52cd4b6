use crate::hardware::context::AvidaContext;
use crate::hardware::merit::Merit;
use crate::schedule::Schedule;
use crate::schedule::weighted_index::WeightedIndex;

/// Lottery scheduling: each tick goes to a slot with probability
/// proportional to its merit.
#[derive(Clone, Debug, Default)]
pub struct ProbSchedule {
    index: WeightedIndex,
}

impl ProbSchedule {
    pub fn new(size: usize) -> Self {
        Self {
            index: WeightedIndex::new(size),
        }
    }

    pub fn weight(&self, id: usize) -> f64 {
        self.index.weight(id)
    }
}

impl Schedule for ProbSchedule {
    fn adjust(&mut self, id: usize, merit: &Merit) {
        self.index.set_weight(id, merit.value());
    }

    fn next_id(&mut self, ctx: &mut AvidaContext) -> Option<usize> {
        let total = self.index.total();
        if total.is_nan() || total <= 0.0 {
            return None;
        }
        let draw = ctx.random_f64() * total;
        self.index.find(draw)
    }

    fn set_size(&mut self, size: usize) {
        self.index.resize(size);
    }

    fn size(&self) -> usize {
        self.index.len()
    }
}
