use crate::arena::ArenaId;
use crate::id::{ClauseId, SolvableId};
use crate::solver::clause::ClauseState;

/// For every solvable, the head of an intrusive list of the clauses watching it. The rest of
/// the list is threaded through [`ClauseState`] itself.
pub(crate) struct WatchMap {
    heads: Vec<ClauseId>,
}

impl WatchMap {
    pub(crate) fn new(solvable_count: usize) -> Self {
        Self {
            heads: vec![ClauseId::null(); solvable_count],
        }
    }

    /// Pushes the clause onto the lists of both of its watched solvables.
    pub(crate) fn start_watching(&mut self, clause: &mut ClauseState, clause_id: ClauseId) {
        for (watch_index, solvable_id) in clause.watched_literals.into_iter().enumerate() {
            clause.link_to_clause(watch_index, self.first_clause_watching_solvable(solvable_id));
            self.set_head(solvable_id, clause_id);
        }
    }

    /// Moves watch `watch_index` of the clause from `previous_watch` to `new_watch`.
    ///
    /// `predecessor_clause` is the clause before this one in the list of `previous_watch`, or
    /// `None` when the clause is at the head.
    pub(crate) fn update_watched(
        &mut self,
        predecessor_clause: Option<&mut ClauseState>,
        clause: &mut ClauseState,
        clause_id: ClauseId,
        watch_index: usize,
        previous_watch: SolvableId,
        new_watch: SolvableId,
    ) {
        match predecessor_clause {
            Some(predecessor) => predecessor.unlink_clause(clause, previous_watch, watch_index),
            None => self.set_head(previous_watch, clause.get_linked_clause(watch_index)),
        }

        clause.watched_literals[watch_index] = new_watch;
        clause.link_to_clause(watch_index, self.first_clause_watching_solvable(new_watch));
        self.set_head(new_watch, clause_id);
    }

    pub(crate) fn first_clause_watching_solvable(&self, solvable_id: SolvableId) -> ClauseId {
        self.heads
            .get(solvable_id.to_usize())
            .copied()
            .unwrap_or_else(ClauseId::null)
    }

    fn set_head(&mut self, solvable_id: SolvableId, clause_id: ClauseId) {
        let index = solvable_id.to_usize();
        if self.heads.len() <= index {
            self.heads.resize(index + 1, ClauseId::null());
        }
        self.heads[index] = clause_id;
    }
}
