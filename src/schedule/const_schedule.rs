use crate::hardware::context::AvidaContext;
use crate::hardware::merit::Merit;
use crate::schedule::Schedule;

/// Round robin over every slot with a positive weight; the weight's size
/// does not matter.
#[derive(Clone, Debug, Default)]
pub struct ConstSchedule {
    active: Vec<bool>,
    num_active: usize,
    last_id: usize,
}

impl ConstSchedule {
    pub fn new(size: usize) -> Self {
        Self {
            active: vec![false; size],
            num_active: 0,
            last_id: size.saturating_sub(1),
        }
    }
}

impl Schedule for ConstSchedule {
    fn adjust(&mut self, id: usize, merit: &Merit) {
        let Some(slot) = self.active.get_mut(id) else {
            return;
        };
        let now = !merit.is_zero();
        if *slot != now {
            *slot = now;
            if now {
                self.num_active += 1;
            } else {
                self.num_active -= 1;
            }
        }
    }

    fn next_id(&mut self, _ctx: &mut AvidaContext) -> Option<usize> {
        if self.num_active == 0 {
            return None;
        }
        let n = self.active.len();
        let mut id = self.last_id;
        for _ in 0..n {
            id = (id + 1) % n;
            if self.active[id] {
                self.last_id = id;
                return Some(id);
            }
        }
        None
    }

    fn set_size(&mut self, size: usize) {
        self.active.resize(size, false);
        self.num_active = self.active.iter().filter(|a| **a).count();
        if self.last_id >= size {
            self.last_id = size.saturating_sub(1);
        }
    }

    fn size(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_in_slot_order() {
        let mut ctx = AvidaContext::new(1);
        let mut schedule = ConstSchedule::new(5);
        for id in [0, 2, 3] {
            schedule.adjust(id, &Merit::new(1.0));
        }
        schedule.adjust(3, &Merit::new(50.0));
        let order: Vec<_> = (0..6).filter_map(|_| schedule.next_id(&mut ctx)).collect();
        assert_eq!(order, vec![0, 2, 3, 0, 2, 3]);
    }
}
