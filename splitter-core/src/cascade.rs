//! Back-edges between relations, used to propagate inclusion to relations
//! that referenced an id before it became tracked.

use std::collections::HashMap;

use crate::bitset::GrowingBitset;

/// A many-to-many map from a relation id to the relations that reference it
/// as a member. Populated while the relation phase streams by; queried to
/// close over "R' contains R, R is in, so R' is in".
#[derive(Default)]
pub struct CascadingRelations {
    parents: HashMap<i64, Vec<i64>>,
}

impl CascadingRelations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `parent` references `member_ref` as a relation member.
    pub fn record(&mut self, member_ref: i64, parent: i64) {
        self.parents.entry(member_ref).or_default().push(parent);
    }

    /// Mark every relation transitively referencing `id` in `tracker`.
    ///
    /// Relation graphs can be cyclic, so this is a worklist fixpoint guarded
    /// by the tracker bits rather than a recursive walk.
    pub fn cascade(&self, tracker: &mut GrowingBitset, id: i64) {
        let mut work = vec![id];
        while let Some(current) = work.pop() {
            let Some(parents) = self.parents.get(&current) else {
                continue;
            };
            for &parent in parents {
                if !tracker.get(parent) {
                    debug!("cascading: {current} -> {parent}");
                    tracker.set(parent);
                    work.push(parent);
                }
            }
        }
    }
}
