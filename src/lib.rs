//! Foma FST loading and bidirectional lookup.
//!
//! This crate reads a finite-state transducer in the Foma text-network
//! format (gzip-compressed, AT&T-style sections) and walks it in both
//! directions: [`Fst::analyze`] maps a surface form to its analyses
//! (lemma fragments plus tags such as `+V +3P +Sg`), [`Fst::generate`]
//! maps an analysis back to surface forms. Both return lazy iterators
//! over every accepting path.
//!
//! # Architecture
//!
//! - [`symbols`] -- Symbol table (dense-id interning, longest-match tokenizer)
//! - [`flags`] -- Flag diacritic operations (P, N, R, D, C, U)
//! - [`parse`] -- Foma text-network parsing (sections, sigma, states)
//! - [`automaton`] -- Immutable flat-vector transition graph
//! - [`search`] -- Lazy depth-first path search over either side
//! - [`fst`] -- The facade: construction options, `analyze`/`generate`

pub mod automaton;
pub mod flags;
pub mod fst;
pub mod parse;
pub mod search;
pub mod symbols;

pub use fst::{Analyses, Fst, Generations, Options};
pub use search::Side;

use std::path::PathBuf;

/// Error type for loading Foma networks.
///
/// Queries never fail: an input with no accepting path simply yields an
/// empty sequence.
#[derive(Debug, thiserror::Error)]
pub enum FstError {
    /// Malformed network text. `line` is 1-based within the decompressed
    /// stream.
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    /// The byte stream was not valid gzip-compressed UTF-8 text.
    #[error("could not decompress network: {0}")]
    Decompress(#[source] std::io::Error),
    /// The network file could not be read.
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FstError {
    pub(crate) fn parse(line: usize, reason: impl Into<String>) -> Self {
        FstError::Parse {
            line,
            reason: reason.into(),
        }
    }
}
