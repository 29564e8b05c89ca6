// The user-facing transducer: construction plus analyze/generate.

use crate::automaton::Automaton;
use crate::parse;
use crate::search::{PathIter, Side};
use crate::symbols::{Symbol, SymbolTable, Token};
use crate::FstError;
use std::path::Path;

/// Construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Swap the upper and lower label of every arc.
    ///
    /// Use this for networks that put the surface form on the upper side
    /// (HFST-style) instead of the lower side.
    pub invert: bool,
}

/// A loaded transducer.
///
/// Immutable once constructed; may be shared across threads by reference.
/// Each query returns an independent lazy iterator that owns its own
/// search state.
#[derive(Debug)]
pub struct Fst {
    automaton: Automaton,
    name: Option<String>,
    arity: Option<u32>,
}

impl Fst {
    /// Load a gzip-compressed network file, as written by `foma`'s
    /// `save stack`.
    pub fn from_path(path: impl AsRef<Path>, options: Options) -> Result<Fst, FstError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| FstError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Fst::from_bytes(&bytes, options)
    }

    /// Load a network from gzip-compressed bytes.
    pub fn from_bytes(bytes: &[u8], options: Options) -> Result<Fst, FstError> {
        Ok(Fst::build(parse::from_gzip(bytes)?, options))
    }

    /// Load a network from already-decompressed text.
    pub fn from_text(text: &str, options: Options) -> Result<Fst, FstError> {
        Ok(Fst::build(parse::from_text(text)?, options))
    }

    fn build(mut network: parse::Network, options: Options) -> Fst {
        if options.invert {
            network.automaton.invert();
        }
        Fst {
            automaton: network.automaton,
            name: network.name,
            arity: network.arity,
        }
    }

    /// The network name from the properties record, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The arity from the properties record (2 for a transducer).
    pub fn arity(&self) -> Option<u32> {
        self.arity
    }

    pub fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    /// All analyses of a surface form, lazily.
    ///
    /// Each analysis is a sequence of symbol texts: runs of adjacent
    /// graphemes joined into lemma fragments, multi-character tags
    /// standing alone. An out-of-alphabet character does not fail; it can
    /// only be consumed by identity/unknown arcs, so a form the network
    /// does not cover simply yields nothing.
    pub fn analyze<'a>(&'a self, surface: &str) -> Analyses<'a> {
        Analyses {
            paths: self.paths(surface, Side::Down),
            sigma: self.automaton.sigma(),
        }
    }

    /// All surface forms of an analysis, lazily.
    pub fn generate<'a>(&'a self, analysis: &str) -> Generations<'a> {
        Generations {
            paths: self.paths(analysis, Side::Up),
            sigma: self.automaton.sigma(),
        }
    }

    fn paths(&self, input: &str, side: Side) -> PathIter<'_> {
        let tokens = self.automaton.sigma().tokenize(input);
        PathIter::new(&self.automaton, side, tokens)
    }
}

/// Lazy iterator over the analyses of one surface form.
pub struct Analyses<'a> {
    paths: PathIter<'a>,
    sigma: &'a SymbolTable,
}

impl Iterator for Analyses<'_> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        let path = self.paths.next()?;
        let mut parts = Vec::new();
        let mut run = String::new();
        for token in path {
            match token {
                Token::Outside(c) => run.push(c),
                Token::Sigma(id) => match self.sigma.symbol(id) {
                    Symbol::Grapheme(text) => run.push_str(text),
                    Symbol::MultiChar(text) => {
                        if !run.is_empty() {
                            parts.push(std::mem::take(&mut run));
                        }
                        parts.push(text.clone());
                    }
                    _ => {}
                },
            }
        }
        if !run.is_empty() {
            parts.push(run);
        }
        Some(parts)
    }
}

/// Lazy iterator over the surface forms of one analysis.
pub struct Generations<'a> {
    paths: PathIter<'a>,
    sigma: &'a SymbolTable,
}

impl Iterator for Generations<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let path = self.paths.next()?;
        let mut surface = String::new();
        for token in path {
            match token {
                Token::Outside(c) => surface.push(c),
                Token::Sigma(id) => {
                    if self.sigma.symbol(id).is_graphical() {
                        surface.push_str(self.sigma.text(id));
                    }
                }
            }
        }
        Some(surface)
    }
}
