// Bidirectional depth-first path search with an explicit, resumable stack.

use crate::automaton::{Arc, Automaton, StateId};
use crate::flags::{check_flag, FlagCheckResult, FlagEnv, FlagValue};
use crate::symbols::{Symbol, Token};
use std::collections::HashSet;

/// Which label of each arc is matched against the input.
///
/// `Down` matches the lower label and emits the upper one (analysis);
/// `Up` is the reverse (generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Down,
    Up,
}

/// One suspended position in the depth-first traversal.
struct Frame {
    state: StateId,
    /// Input cursor on entry to this state.
    pos: usize,
    /// Next arc of `state` to try.
    arc_cursor: usize,
    /// Length of the shared output buffer before this frame's incoming
    /// edge appended to it.
    out_mark: usize,
    /// Index of this frame's feature environment in the row stack.
    env: usize,
    /// Whether this frame pushed its own environment row.
    owns_env: bool,
    /// Whether the accepting-state check already ran for this frame.
    checked: bool,
}

/// A lazy, finite stream of accepting paths.
///
/// Each `next()` resumes the traversal exactly where it paused and may do
/// an arbitrary amount of work before yielding. The yielded items are the
/// output-side symbols of one accepting path, free of epsilons and flag
/// diacritics; out-of-alphabet characters passed through an identity arc
/// appear as [`Token::Outside`].
///
/// Results follow arc-insertion order under depth-first traversal and are
/// stable across runs. They are not deduplicated: every accepting path is
/// reported once per distinct arc sequence. A per-path set of
/// `(state, cursor, environment)` triples refuses re-entry along the
/// current branch, so epsilon and flag cycles terminate.
pub struct PathIter<'a> {
    automaton: &'a Automaton,
    side: Side,
    tokens: Vec<Token>,
    stack: Vec<Frame>,
    /// Shared output buffer; frames push on entry and truncate on
    /// backtrack.
    out: Vec<Token>,
    /// Environment rows, copy-on-push: a row is added only when a flag
    /// arc changes the environment, and dropped when its frame pops.
    envs: Vec<FlagEnv>,
    visited: HashSet<(StateId, usize, FlagEnv)>,
}

impl<'a> PathIter<'a> {
    pub fn new(automaton: &'a Automaton, side: Side, tokens: Vec<Token>) -> Self {
        let env0: FlagEnv =
            vec![FlagValue::Unset; automaton.sigma().feature_count() as usize].into();
        let start = automaton.start();
        let mut visited = HashSet::new();
        visited.insert((start, 0, env0.clone()));
        PathIter {
            automaton,
            side,
            tokens,
            stack: vec![Frame {
                state: start,
                pos: 0,
                arc_cursor: 0,
                out_mark: 0,
                env: 0,
                owns_env: true,
                checked: false,
            }],
            out: Vec::new(),
            envs: vec![env0],
            visited,
        }
    }

    fn input_label(&self, arc: &Arc) -> u32 {
        match self.side {
            Side::Down => arc.lower,
            Side::Up => arc.upper,
        }
    }

    fn output_label(&self, arc: &Arc) -> u32 {
        match self.side {
            Side::Down => arc.upper,
            Side::Up => arc.lower,
        }
    }

    /// What an arc's output label contributes to the output buffer.
    ///
    /// `consumed` is the input token the arc consumed, if any. Identity
    /// re-emits it (wildcard pass-through); epsilon, unknown, and flag
    /// labels emit nothing.
    fn emitted(&self, arc: &Arc, consumed: Option<Token>) -> Option<Token> {
        let out_id = self.output_label(arc);
        match self.automaton.sigma().symbol(out_id) {
            Symbol::Grapheme(_) | Symbol::MultiChar(_) => Some(Token::Sigma(out_id)),
            Symbol::Identity => consumed,
            Symbol::Epsilon | Symbol::Unknown | Symbol::Flag(_) => None,
        }
    }

    /// Try to traverse `arc` from input position `pos` with environment
    /// row `env`. Pushes a frame and returns true on success.
    fn try_push(&mut self, arc: Arc, pos: usize, env: usize) -> bool {
        let automaton = self.automaton;
        let in_id = self.input_label(&arc);
        match automaton.sigma().symbol(in_id) {
            Symbol::Flag(flag) => {
                let current = self.envs[env][flag.feature as usize];
                match check_flag(flag, current) {
                    FlagCheckResult::Reject => false,
                    FlagCheckResult::AcceptNoUpdate => {
                        self.push_frame(arc.target, pos, env, None, None)
                    }
                    FlagCheckResult::AcceptAndUpdate(value) => {
                        let mut row = self.envs[env].clone();
                        row[flag.feature as usize] = value;
                        self.push_frame(arc.target, pos, env, Some(row), None)
                    }
                }
            }
            Symbol::Epsilon => {
                let emit = self.emitted(&arc, None);
                self.push_frame(arc.target, pos, env, None, emit)
            }
            in_sym => {
                let Some(&token) = self.tokens.get(pos) else {
                    return false;
                };
                let matches = match in_sym {
                    Symbol::Grapheme(_) | Symbol::MultiChar(_) => token == Token::Sigma(in_id),
                    // The wildcards match only characters outside sigma.
                    Symbol::Identity | Symbol::Unknown => matches!(token, Token::Outside(_)),
                    Symbol::Epsilon | Symbol::Flag(_) => unreachable!("handled above"),
                };
                if !matches {
                    return false;
                }
                let emit = self.emitted(&arc, Some(token));
                self.push_frame(arc.target, pos + 1, env, None, emit)
            }
        }
    }

    fn push_frame(
        &mut self,
        state: StateId,
        pos: usize,
        env: usize,
        new_row: Option<FlagEnv>,
        emit: Option<Token>,
    ) -> bool {
        let row = new_row.as_ref().unwrap_or(&self.envs[env]);
        let key = (state, pos, row.clone());
        // Refuse to re-enter a position already on the current branch.
        if !self.visited.insert(key) {
            return false;
        }

        let (env, owns_env) = match new_row {
            Some(row) => {
                self.envs.push(row);
                (self.envs.len() - 1, true)
            }
            None => (env, false),
        };
        let out_mark = self.out.len();
        if let Some(token) = emit {
            self.out.push(token);
        }
        self.stack.push(Frame {
            state,
            pos,
            arc_cursor: 0,
            out_mark,
            env,
            owns_env,
            checked: false,
        });
        true
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.stack.pop() {
            self.visited
                .remove(&(frame.state, frame.pos, self.envs[frame.env].clone()));
            if frame.owns_env {
                self.envs.pop();
            }
            self.out.truncate(frame.out_mark);
        }
    }
}

impl Iterator for PathIter<'_> {
    type Item = Vec<Token>;

    fn next(&mut self) -> Option<Vec<Token>> {
        loop {
            let depth = self.stack.len().checked_sub(1)?;

            if !self.stack[depth].checked {
                self.stack[depth].checked = true;
                let frame = &self.stack[depth];
                if frame.pos == self.tokens.len() && self.automaton.is_accepting(frame.state) {
                    return Some(self.out.clone());
                }
            }

            let (state, pos, env, cursor) = {
                let frame = &self.stack[depth];
                (frame.state, frame.pos, frame.env, frame.arc_cursor)
            };
            let arcs = self.automaton.arcs(state);
            let Some(&arc) = arcs.get(cursor) else {
                self.pop_frame();
                continue;
            };
            self.stack[depth].arc_cursor += 1;
            self.try_push(arc, pos, env);
        }
    }
}
