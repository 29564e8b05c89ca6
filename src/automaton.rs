// The in-memory transition graph: flat arc storage, per-state ranges.

use crate::symbols::{SymbolId, SymbolTable};

/// State index. The start state is always 0.
pub type StateId = u32;

/// One transition. The source state is implicit in the flat layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arc {
    pub upper: SymbolId,
    pub lower: SymbolId,
    pub target: StateId,
}

/// The transducer graph, immutable after construction.
///
/// Arcs live in one flat vector; each state holds an `(offset, len)` range
/// into it. States and symbols are referenced by id only, so the whole
/// graph is a plain value that can be shared across threads by reference.
#[derive(Debug)]
pub struct Automaton {
    arcs: Vec<Arc>,
    states: Vec<(u32, u32)>,
    accepting: Vec<bool>,
    sigma: SymbolTable,
}

impl Automaton {
    /// Assemble the graph from per-state arc lists.
    ///
    /// `arcs_by_state` and `accepting` must be the same length. An empty
    /// graph still gets one non-accepting state so that the start state
    /// exists.
    pub(crate) fn from_parts(
        arcs_by_state: Vec<Vec<Arc>>,
        mut accepting: Vec<bool>,
        sigma: SymbolTable,
    ) -> Self {
        debug_assert_eq!(arcs_by_state.len(), accepting.len());
        let mut states = Vec::with_capacity(arcs_by_state.len().max(1));
        let mut arcs = Vec::with_capacity(arcs_by_state.iter().map(Vec::len).sum());
        for state_arcs in arcs_by_state {
            states.push((arcs.len() as u32, state_arcs.len() as u32));
            arcs.extend(state_arcs);
        }
        if states.is_empty() {
            states.push((0, 0));
            accepting.push(false);
        }
        Automaton {
            arcs,
            states,
            accepting,
            sigma,
        }
    }

    pub fn start(&self) -> StateId {
        0
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    /// Outgoing arcs of a state, in insertion order.
    pub fn arcs(&self, state: StateId) -> &[Arc] {
        let (offset, len) = self.states[state as usize];
        &self.arcs[offset as usize..(offset + len) as usize]
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting[state as usize]
    }

    pub fn sigma(&self) -> &SymbolTable {
        &self.sigma
    }

    /// Swap the upper and lower label of every arc. Applied once at
    /// construction when the network's label convention is reversed.
    pub(crate) fn invert(&mut self) {
        for arc in &mut self.arcs {
            std::mem::swap(&mut arc.upper, &mut arc.lower);
        }
    }
}
