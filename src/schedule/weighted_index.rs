//! Partial-sum tree for weighted draws.
//!
//! Items live in an implicit binary tree (children of `i` are `2i + 1` and
//! `2i + 2`); every node stores its own weight and the total weight of its
//! subtree. Updating a weight re-sums each ancestor from its children on the
//! way to the root, and a draw walks down, both in `O(log n)`.

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightedIndex {
    item_weight: Vec<f64>,
    subtree_weight: Vec<f64>,
}

impl WeightedIndex {
    pub fn new(size: usize) -> Self {
        Self {
            item_weight: vec![0.0; size],
            subtree_weight: vec![0.0; size],
        }
    }

    pub fn len(&self) -> usize {
        self.item_weight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_weight.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.subtree_weight.first().copied().unwrap_or(0.0)
    }

    pub fn weight(&self, id: usize) -> f64 {
        self.item_weight.get(id).copied().unwrap_or(0.0)
    }

    /// Sets the weight of `id`. Negative and NaN weights count as zero; ids
    /// past the end are ignored.
    pub fn set_weight(&mut self, id: usize, weight: f64) {
        if id >= self.item_weight.len() {
            return;
        }
        let weight = if weight.is_nan() { 0.0 } else { weight.max(0.0) };
        self.item_weight[id] = weight;
        let mut node = id;
        loop {
            self.subtree_weight[node] = self.item_weight[node]
                + self.child_weight(2 * node + 1)
                + self.child_weight(2 * node + 2);
            if node == 0 {
                break;
            }
            node = (node - 1) / 2;
        }
    }

    fn child_weight(&self, node: usize) -> f64 {
        self.subtree_weight.get(node).copied().unwrap_or(0.0)
    }

    /// Grows or shrinks the index space. Surviving weights are kept; the
    /// subtree sums are rebuilt bottom-up.
    pub fn resize(&mut self, size: usize) {
        self.item_weight.resize(size, 0.0);
        self.rebuild();
    }

    /// Recomputes every subtree sum, discarding accumulated rounding drift.
    pub fn rebuild(&mut self) {
        let n = self.item_weight.len();
        self.subtree_weight = self.item_weight.clone();
        for node in (1..n).rev() {
            let parent = (node - 1) / 2;
            self.subtree_weight[parent] += self.subtree_weight[node];
        }
    }

    /// Item owning position `value` on the line `[0, total)`.
    pub fn find(&self, value: f64) -> Option<usize> {
        if self.total() <= 0.0 {
            return None;
        }
        let mut value = value.clamp(0.0, self.total());
        let mut node = 0;
        loop {
            let own = self.item_weight[node];
            if value < own {
                return Some(node);
            }
            value -= own;
            let left = 2 * node + 1;
            let right = left + 1;
            let left_weight = self.subtree_weight.get(left).copied().unwrap_or(0.0);
            if value < left_weight {
                node = left;
            } else if right < self.len() && self.subtree_weight[right] > 0.0 {
                value -= left_weight;
                node = right;
            } else if left_weight > 0.0 {
                // Rounding put the draw past the end; take the last non-empty branch.
                node = left;
                value = left_weight;
            } else if own > 0.0 {
                return Some(node);
            } else {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_follow_updates() {
        let mut index = WeightedIndex::new(5);
        index.set_weight(0, 1.0);
        index.set_weight(4, 3.0);
        index.set_weight(2, 2.0);
        assert_eq!(index.total(), 6.0);
        index.set_weight(4, 0.5);
        assert_eq!(index.total(), 3.5);
        index.set_weight(1, -7.0);
        assert_eq!(index.weight(1), 0.0);
        index.set_weight(99, 1.0);
        assert_eq!(index.total(), 3.5);
    }

    #[test]
    fn find_maps_intervals_to_items() {
        let mut index = WeightedIndex::new(4);
        for (id, w) in [(0, 1.0), (1, 2.0), (2, 3.0), (3, 4.0)] {
            index.set_weight(id, w);
        }
        // Tree order: node 0, then subtree 1 (nodes 1, 3), then subtree 2.
        assert_eq!(index.find(0.5), Some(0));
        assert_eq!(index.find(1.5), Some(1));
        assert_eq!(index.find(3.5), Some(3));
        assert_eq!(index.find(7.5), Some(2));
        assert_eq!(index.find(10.0), Some(2));
    }

    #[test]
    fn empty_or_zero_has_no_owner() {
        assert_eq!(WeightedIndex::new(0).find(0.0), None);
        assert_eq!(WeightedIndex::new(3).find(0.0), None);
    }

    #[test]
    fn resize_keeps_weights() {
        let mut index = WeightedIndex::new(2);
        index.set_weight(1, 2.0);
        index.resize(6);
        index.set_weight(5, 1.0);
        assert_eq!(index.total(), 3.0);
        index.resize(1);
        assert_eq!(index.total(), 0.0);
        assert_eq!(index.len(), 1);
    }
}
