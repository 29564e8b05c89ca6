// Symbol table: dense-id interning and longest-match tokenization.

use crate::flags::FlagDiacritic;
use hashbrown::HashMap;

/// Dense symbol id. Id 0 is always [`Symbol::Epsilon`].
pub type SymbolId = u32;

/// The id of the epsilon symbol.
pub const EPSILON: SymbolId = 0;

/// A symbol in the transducer's alphabet.
///
/// Graphemes and multi-character symbols are the *graphical* symbols: they
/// carry surface text and participate in tokenization. Epsilon, the
/// identity/unknown wildcards, and flag diacritics never match input text
/// directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// Consumes no input, emits no output.
    Epsilon,
    /// Matches a character outside the alphabet without passing it through.
    Unknown,
    /// Matches a character outside the alphabet and passes it through.
    Identity,
    /// A single Unicode character, e.g. `a`.
    Grapheme(String),
    /// A multi-character tag, e.g. `+Sg` or `UN+`.
    MultiChar(String),
    /// A feature constraint, e.g. `@P.CASE.NOM@`.
    Flag(FlagDiacritic),
}

impl Symbol {
    /// Whether this symbol carries surface text.
    pub fn is_graphical(&self) -> bool {
        matches!(self, Symbol::Grapheme(_) | Symbol::MultiChar(_))
    }
}

/// One unit of tokenized input: either an alphabet symbol or a character
/// the alphabet does not cover.
///
/// Out-of-alphabet characters are not an error; they can only be consumed
/// by `Identity`/`Unknown` arcs during the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Sigma(SymbolId),
    Outside(char),
}

/// All symbols of one network, indexed by dense id.
///
/// Ids are assigned in order of appearance in the sigma section (epsilon is
/// pre-assigned id 0). Built once by the parser; immutable afterwards.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    /// Verbatim text per symbol, as written in the sigma section.
    texts: Vec<String>,
    /// Graphical text to id, for the tokenizer.
    graphical: HashMap<String, SymbolId>,
    /// Length in chars of the longest graphical text.
    longest_graphical: usize,
    /// Number of distinct flag-diacritic features.
    feature_count: u16,
}

impl SymbolTable {
    pub(crate) fn new() -> Self {
        SymbolTable {
            symbols: vec![Symbol::Epsilon],
            texts: vec!["@_EPSILON_SYMBOL_@".to_string()],
            graphical: HashMap::new(),
            longest_graphical: 0,
            feature_count: 0,
        }
    }

    /// Append a symbol, returning its dense id.
    pub(crate) fn intern(&mut self, text: &str, symbol: Symbol) -> SymbolId {
        let id = self.symbols.len() as SymbolId;
        if symbol.is_graphical() {
            let chars = text.chars().count();
            self.longest_graphical = self.longest_graphical.max(chars);
            // A later declaration of the same text overwrites the earlier
            // one in the tokenizer mapping.
            self.graphical.insert(text.to_string(), id);
        }
        self.symbols.push(symbol);
        self.texts.push(text.to_string());
        id
    }

    pub(crate) fn set_feature_count(&mut self, count: u16) {
        self.feature_count = count;
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id as usize]
    }

    /// The verbatim sigma text of a symbol.
    pub fn text(&self, id: SymbolId) -> &str {
        &self.texts[id as usize]
    }

    /// Number of distinct flag features, for sizing feature environments.
    pub fn feature_count(&self) -> u16 {
        self.feature_count
    }

    /// Split input into symbols, greedy longest match over the graphical
    /// vocabulary. A character that begins no symbol becomes
    /// [`Token::Outside`].
    pub fn tokenize(&self, input: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut rest = input;
        while let Some(ch) = rest.chars().next() {
            match self.longest_match(rest) {
                Some((id, len)) => {
                    tokens.push(Token::Sigma(id));
                    rest = &rest[len..];
                }
                None => {
                    tokens.push(Token::Outside(ch));
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        tokens
    }

    /// The longest graphical symbol that prefixes `text`, with its byte
    /// length. Candidate prefixes are bounded by the longest sigma text.
    fn longest_match(&self, text: &str) -> Option<(SymbolId, usize)> {
        let ends: Vec<usize> = text
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take(self.longest_graphical)
            .collect();
        for &end in ends.iter().rev() {
            if let Some(&id) = self.graphical.get(&text[..end]) {
                return Some((id, end));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, fn(String) -> Symbol)]) -> SymbolTable {
        let mut t = SymbolTable::new();
        for (text, make) in entries {
            t.intern(text, make(text.to_string()));
        }
        t
    }

    #[test]
    fn epsilon_is_id_zero() {
        let t = SymbolTable::new();
        assert_eq!(t.len(), 1);
        assert_eq!(*t.symbol(EPSILON), Symbol::Epsilon);
    }

    #[test]
    fn ids_are_dense_and_ordered() {
        let mut t = SymbolTable::new();
        let a = t.intern("a", Symbol::Grapheme("a".to_string()));
        let v = t.intern("+V", Symbol::MultiChar("+V".to_string()));
        assert_eq!(a, 1);
        assert_eq!(v, 2);
        assert_eq!(t.text(v), "+V");
    }

    #[test]
    fn later_duplicate_text_wins_the_tokenizer_mapping() {
        let mut t = SymbolTable::new();
        t.intern("a", Symbol::Grapheme("a".to_string()));
        let second = t.intern("a", Symbol::Grapheme("a".to_string()));
        assert_eq!(t.tokenize("a"), vec![Token::Sigma(second)]);
    }

    #[test]
    fn tokenize_single_characters() {
        let t = table(&[("a", Symbol::Grapheme), ("b", Symbol::Grapheme)]);
        assert_eq!(
            t.tokenize("ab"),
            vec![Token::Sigma(1), Token::Sigma(2)]
        );
    }

    #[test]
    fn tokenize_prefers_longest_match() {
        let t = table(&[
            ("+Past", Symbol::MultiChar),
            ("+PastPart", Symbol::MultiChar),
            ("e", Symbol::Grapheme),
        ]);
        // "+PastPart" must not be split into "+Past" plus leftovers.
        assert_eq!(t.tokenize("+PastPart"), vec![Token::Sigma(2)]);
        assert_eq!(
            t.tokenize("e+Past"),
            vec![Token::Sigma(3), Token::Sigma(1)]
        );
    }

    #[test]
    fn tokenize_unknown_characters() {
        let t = table(&[("a", Symbol::Grapheme)]);
        assert_eq!(
            t.tokenize("ax"),
            vec![Token::Sigma(1), Token::Outside('x')]
        );
    }

    #[test]
    fn tokenize_empty_input() {
        let t = table(&[("a", Symbol::Grapheme)]);
        assert!(t.tokenize("").is_empty());
    }

    #[test]
    fn tokenize_without_graphical_symbols() {
        let t = SymbolTable::new();
        assert_eq!(
            t.tokenize("ab"),
            vec![Token::Outside('a'), Token::Outside('b')]
        );
    }

    #[test]
    fn tokenize_multibyte_characters() {
        let t = table(&[("ê", Symbol::Grapheme), ("+V", Symbol::MultiChar)]);
        assert_eq!(
            t.tokenize("ê+V"),
            vec![Token::Sigma(1), Token::Sigma(2)]
        );
    }
}
