use crate::arena::ArenaId;
use crate::id::{ClauseId, SolvableId};

/// A value assigned to a solvable, together with the clause that forced it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Decision {
    pub(crate) solvable_id: SolvableId,
    pub(crate) value: bool,
    pub(crate) derived_from: ClauseId,
}

impl Decision {
    pub(crate) fn new(solvable_id: SolvableId, value: bool, derived_from: ClauseId) -> Self {
        Self {
            solvable_id,
            value,
            derived_from,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Assignment {
    value: bool,
    level: u32,
}

/// The current value and decision level of every solvable. Unassigned solvables report level 0.
#[derive(Default)]
pub(crate) struct DecisionMap {
    slots: Vec<Option<Assignment>>,
}

impl DecisionMap {
    pub(crate) fn new(solvable_count: usize) -> Self {
        Self {
            slots: vec![None; solvable_count],
        }
    }

    pub(crate) fn set(&mut self, solvable_id: SolvableId, value: bool, level: u32) {
        let index = solvable_id.to_usize();
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(Assignment { value, level });
    }

    pub(crate) fn reset(&mut self, solvable_id: SolvableId) {
        if let Some(slot) = self.slots.get_mut(solvable_id.to_usize()) {
            slot.take();
        }
    }

    fn get(&self, solvable_id: SolvableId) -> Option<Assignment> {
        self.slots.get(solvable_id.to_usize()).copied().flatten()
    }

    pub(crate) fn value(&self, solvable_id: SolvableId) -> Option<bool> {
        self.get(solvable_id).map(|a| a.value)
    }

    pub(crate) fn level(&self, solvable_id: SolvableId) -> u32 {
        self.get(solvable_id).map_or(0, |a| a.level)
    }
}

/// The trail of decisions made so far. Decisions are appended in the order they are made and
/// removed from the back when the solver backjumps.
pub(crate) struct DecisionTracker {
    map: DecisionMap,
    trail: Vec<(Decision, u32)>,
    propagated: usize,
}

impl DecisionTracker {
    pub(crate) fn new(solvable_count: usize) -> Self {
        Self {
            map: DecisionMap::new(solvable_count),
            trail: Vec::new(),
            propagated: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    pub(crate) fn map(&self) -> &DecisionMap {
        &self.map
    }

    pub(crate) fn assigned_value(&self, solvable_id: SolvableId) -> Option<bool> {
        self.map.value(solvable_id)
    }

    pub(crate) fn level(&self, solvable_id: SolvableId) -> u32 {
        self.map.level(solvable_id)
    }

    /// Iterates the decisions from the oldest to the most recent one.
    pub(crate) fn stack(&self) -> impl DoubleEndedIterator<Item = &Decision> + '_ {
        self.trail.iter().map(|(decision, _)| decision)
    }

    /// Records `decision` at `level`.
    ///
    /// `Ok(true)` means the solvable was unassigned, `Ok(false)` that it already had the same
    /// value. Assigning the opposite value is a conflict and yields `Err(())`.
    pub(crate) fn try_add_decision(&mut self, decision: Decision, level: u32) -> Result<bool, ()> {
        match self.map.value(decision.solvable_id) {
            Some(current) if current == decision.value => Ok(false),
            Some(_) => Err(()),
            None => {
                self.map.set(decision.solvable_id, decision.value, level);
                self.trail.push((decision, level));
                Ok(true)
            }
        }
    }

    /// Pops every decision made above `level`.
    pub(crate) fn undo_until(&mut self, level: u32) {
        while matches!(self.trail.last(), Some(&(_, top)) if top > level) {
            self.undo_last();
        }
    }

    /// Pops the most recent decision and returns it with the level of the decision below it.
    pub(crate) fn undo_last(&mut self) -> Option<(Decision, u32)> {
        let (decision, _) = self.trail.pop()?;
        self.map.reset(decision.solvable_id);
        self.propagated = self.propagated.min(self.trail.len());
        let level_below = self.trail.last().map_or(0, |&(_, level)| level);
        Some((decision, level_below))
    }

    /// Hands out the oldest decision whose consequences have not been propagated yet.
    pub(crate) fn next_unpropagated(&mut self) -> Option<Decision> {
        let (decision, _) = *self.trail.get(self.propagated)?;
        self.propagated += 1;
        Some(decision)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decision(id: u32, value: bool) -> Decision {
        Decision::new(SolvableId::new(id), value, ClauseId::install_root())
    }

    #[test]
    fn test_map_set_and_reset() {
        let mut map = DecisionMap::new(2);
        let solvable = SolvableId::new(1);
        assert_eq!(map.value(solvable), None);

        map.set(solvable, false, 3);
        assert_eq!(map.value(solvable), Some(false));
        assert_eq!(map.level(solvable), 3);

        map.set(SolvableId::new(10), true, 1);
        assert_eq!(map.value(SolvableId::new(10)), Some(true));

        map.reset(solvable);
        assert_eq!(map.value(solvable), None);
        assert_eq!(map.level(solvable), 0);
    }

    #[test]
    fn test_conflicting_decision() {
        let mut tracker = DecisionTracker::new(4);
        assert_eq!(tracker.try_add_decision(decision(1, true), 1), Ok(true));
        assert_eq!(tracker.try_add_decision(decision(1, true), 2), Ok(false));
        assert_eq!(tracker.try_add_decision(decision(1, false), 2), Err(()));
        assert_eq!(tracker.level(SolvableId::new(1)), 1);
    }

    #[test]
    fn test_backjump() {
        let mut tracker = DecisionTracker::new(4);
        tracker.try_add_decision(decision(0, true), 1).unwrap();
        tracker.try_add_decision(decision(1, false), 2).unwrap();
        tracker.try_add_decision(decision(2, true), 3).unwrap();

        assert_eq!(tracker.next_unpropagated(), Some(decision(0, true)));
        assert_eq!(tracker.next_unpropagated(), Some(decision(1, false)));
        assert_eq!(tracker.next_unpropagated(), Some(decision(2, true)));
        assert_eq!(tracker.next_unpropagated(), None);

        tracker.undo_until(1);
        assert_eq!(tracker.assigned_value(SolvableId::new(1)), None);
        assert_eq!(tracker.assigned_value(SolvableId::new(2)), None);
        assert_eq!(tracker.stack().count(), 1);
        assert_eq!(tracker.next_unpropagated(), None);

        assert_eq!(tracker.undo_last(), Some((decision(0, true), 0)));
        assert!(tracker.is_empty());
    }
}
