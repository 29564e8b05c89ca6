// Foma text-network parsing.
//
// A network file is gzip-compressed UTF-8 text made of sections delimited
// by `##...##` lines:
//
//     ##foma-net 1.0##
//     ##props##
//     <one record: twelve integer fields, then the network name>
//     ##sigma##
//     <id SP verbatim-symbol-text, one per line>
//     ##states##
//     <2..5 integer fields per record, ended by -1 -1 -1 -1 -1>
//     ##end##
//
// Files may concatenate several networks; only the first is loaded.

use crate::automaton::{Arc, Automaton, StateId};
use crate::flags::FlagRegistry;
use crate::symbols::{Symbol, SymbolId, SymbolTable, EPSILON};
use crate::FstError;
use flate2::read::GzDecoder;
use hashbrown::HashMap;
use std::io::Read;

/// One parsed network: the graph plus the properties worth keeping.
#[derive(Debug)]
pub struct Network {
    pub automaton: Automaton,
    pub name: Option<String>,
    pub arity: Option<u32>,
}

/// Decompress and parse a gzip-compressed network.
pub fn from_gzip(bytes: &[u8]) -> Result<Network, FstError> {
    let mut text = String::new();
    GzDecoder::new(bytes)
        .read_to_string(&mut text)
        .map_err(FstError::Decompress)?;
    from_text(&text)
}

/// Parse an already-decompressed network.
pub fn from_text(text: &str) -> Result<Network, FstError> {
    let mut parser = FomaParser::new();
    let mut line_count = 0;
    for (index, line) in text.split('\n').enumerate() {
        line_count = index + 1;
        parser.line(line_count, line)?;
        if parser.is_done() {
            break;
        }
    }
    parser.finish(line_count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Before the `##foma-net ...##` header.
    Start,
    /// Between the version header and `##props##`.
    Header,
    Props,
    Sigma,
    States,
    /// `##end##` seen; remaining input belongs to further networks and is
    /// ignored.
    End,
}

struct FomaParser {
    section: Section,
    symbols: SymbolTable,
    registry: FlagRegistry,
    /// Sigma ids as written in the file (possibly sparse) to dense ids.
    file_ids: HashMap<i64, SymbolId>,
    arcs_by_state: Vec<Vec<Arc>>,
    accepting: Vec<bool>,
    implied_state: Option<StateId>,
    saw_props_record: bool,
    saw_sentinel: bool,
    name: Option<String>,
    arity: Option<u32>,
}

impl FomaParser {
    fn new() -> Self {
        FomaParser {
            section: Section::Start,
            symbols: SymbolTable::new(),
            registry: FlagRegistry::new(),
            file_ids: HashMap::new(),
            arcs_by_state: Vec::new(),
            accepting: Vec::new(),
            implied_state: None,
            saw_props_record: false,
            saw_sentinel: false,
            name: None,
            arity: None,
        }
    }

    fn is_done(&self) -> bool {
        self.section == Section::End
    }

    fn line(&mut self, no: usize, line: &str) -> Result<(), FstError> {
        if line.starts_with("##") {
            return self.section_header(no, line);
        }
        match self.section {
            Section::Start => {
                if line.trim().is_empty() {
                    Ok(())
                } else {
                    Err(FstError::parse(no, "expected ##foma-net## header"))
                }
            }
            // Nothing of interest between the version header and ##props##.
            Section::Header => Ok(()),
            Section::Props => self.props_line(no, line),
            Section::Sigma => self.sigma_line(no, line),
            Section::States => self.states_line(no, line),
            Section::End => Ok(()),
        }
    }

    fn section_header(&mut self, no: usize, line: &str) -> Result<(), FstError> {
        let inner = line
            .strip_prefix("##")
            .and_then(|rest| rest.strip_suffix("##"))
            .ok_or_else(|| FstError::parse(no, format!("unterminated section header {line:?}")))?;

        self.section = match (self.section, inner) {
            (Section::Start, v) if v.starts_with("foma-net") => Section::Header,
            (Section::Header, "props") => Section::Props,
            (Section::Props, "sigma") => Section::Sigma,
            (Section::Sigma, "states") => Section::States,
            (Section::States, "end") => Section::End,
            (Section::End, _) => Section::End,
            _ => {
                return Err(FstError::parse(
                    no,
                    format!("unexpected section ##{inner}##"),
                ));
            }
        };
        Ok(())
    }

    /// The properties record: twelve integer fields, then the name. Only
    /// the arity (first field) and the name are kept.
    fn props_line(&mut self, no: usize, line: &str) -> Result<(), FstError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        if self.saw_props_record {
            return Err(FstError::parse(no, "more than one properties record"));
        }
        self.saw_props_record = true;

        let fields: Vec<&str> = line.split_whitespace().collect();
        let arity = fields
            .first()
            .and_then(|f| f.parse::<u32>().ok())
            .ok_or_else(|| FstError::parse(no, "malformed arity in properties record"))?;
        self.arity = Some(arity);
        if fields.len() > 12 {
            self.name = Some(fields[12..].join(" "));
        }
        Ok(())
    }

    /// A sigma entry: `id SP text`. Only the first space separates; the
    /// remainder of the line is the symbol text, verbatim (symbols may be
    /// or contain whitespace).
    fn sigma_line(&mut self, no: usize, line: &str) -> Result<(), FstError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let (id_text, text) = line
            .split_once(' ')
            .ok_or_else(|| FstError::parse(no, format!("malformed sigma entry {line:?}")))?;
        let id: i64 = id_text
            .parse()
            .map_err(|_| FstError::parse(no, format!("malformed symbol id {id_text:?}")))?;
        if id < 0 {
            return Err(FstError::parse(no, format!("negative symbol id {id}")));
        }
        if text.is_empty() {
            return Err(FstError::parse(no, format!("symbol {id} has empty text")));
        }

        let dense = self.classify(no, text)?;
        if self.file_ids.insert(id, dense).is_some() {
            return Err(FstError::parse(no, format!("duplicate symbol id {id}")));
        }
        Ok(())
    }

    /// Classify a sigma text and intern it, returning the dense id.
    fn classify(&mut self, no: usize, text: &str) -> Result<SymbolId, FstError> {
        let symbol = match text {
            "@_EPSILON_SYMBOL_@" => return Ok(EPSILON),
            "@_UNKNOWN_SYMBOL_@" => Symbol::Unknown,
            "@_IDENTITY_SYMBOL_@" => Symbol::Identity,
            _ => match self.registry.parse(text) {
                Err(reason) => return Err(FstError::parse(no, reason)),
                Ok(Some(flag)) => Symbol::Flag(flag),
                Ok(None) => {
                    if text.len() > 1 && text.starts_with('@') && text.ends_with('@') {
                        return Err(FstError::parse(
                            no,
                            format!("unrecognized special symbol {text:?}"),
                        ));
                    }
                    if text.chars().count() == 1 {
                        Symbol::Grapheme(text.to_string())
                    } else {
                        Symbol::MultiChar(text.to_string())
                    }
                }
            },
        };
        Ok(self.symbols.intern(text, symbol))
    }

    /// A states record: two to five integers.
    ///
    /// Two- and three-field records borrow their source state from the
    /// previous record. Four- and five-field records name the source and a
    /// trailing finality field; a negative destination means the record
    /// only marks the source as accepting.
    fn states_line(&mut self, no: usize, line: &str) -> Result<(), FstError> {
        if line.trim().is_empty() {
            return Ok(());
        }
        if self.saw_sentinel {
            return Err(FstError::parse(no, "states record after the end sentinel"));
        }

        let mut fields = [0i64; 5];
        let mut count = 0;
        for piece in line.split_whitespace() {
            if count == 5 {
                return Err(FstError::parse(no, "more than five fields in states record"));
            }
            fields[count] = piece
                .parse()
                .map_err(|_| FstError::parse(no, format!("malformed integer {piece:?}")))?;
            count += 1;
        }

        if fields[..count] == [-1, -1, -1, -1, -1] {
            self.saw_sentinel = true;
            return Ok(());
        }

        let (source, upper, lower, dest, is_final) = match &fields[..count] {
            &[i, d] => (self.implied(no)?, i, i, d, false),
            &[i, o, d] => (self.implied(no)?, i, o, d, false),
            &[s, i, d, f] => (s, i, i, d, f > 0),
            &[s, i, o, d, f] => (s, i, o, d, f > 0),
            _ => {
                return Err(FstError::parse(
                    no,
                    format!("expected 2 to 5 fields in states record, found {count}"),
                ));
            }
        };
        if source < 0 {
            return Err(FstError::parse(no, format!("negative state id {source}")));
        }
        let source = source as StateId;
        self.implied_state = Some(source);
        self.grow_states(source);
        if is_final {
            self.accepting[source as usize] = true;
        }

        if dest >= 0 {
            let upper = self.resolve(no, upper)?;
            let lower = self.resolve(no, lower)?;
            let target = dest as StateId;
            self.grow_states(target);
            self.arcs_by_state[source as usize].push(Arc {
                upper,
                lower,
                target,
            });
        }
        Ok(())
    }

    fn implied(&self, no: usize) -> Result<i64, FstError> {
        self.implied_state
            .map(|s| s as i64)
            .ok_or_else(|| FstError::parse(no, "implied state used before any full record"))
    }

    fn resolve(&self, no: usize, file_id: i64) -> Result<SymbolId, FstError> {
        self.file_ids
            .get(&file_id)
            .copied()
            .ok_or_else(|| FstError::parse(no, format!("symbol id {file_id} is not in sigma")))
    }

    /// Grow the state vectors to cover `state`. States may be referenced
    /// before (or without) ever appearing as a record's source.
    fn grow_states(&mut self, state: StateId) {
        let needed = state as usize + 1;
        if self.arcs_by_state.len() < needed {
            self.arcs_by_state.resize_with(needed, Vec::new);
            self.accepting.resize(needed, false);
        }
    }

    fn finish(mut self, line_count: usize) -> Result<Network, FstError> {
        if self.section != Section::End {
            return Err(FstError::parse(
                line_count,
                "truncated network: missing ##end##",
            ));
        }
        self.symbols.set_feature_count(self.registry.feature_count());
        Ok(Network {
            automaton: Automaton::from_parts(self.arcs_by_state, self.accepting, self.symbols),
            name: self.name,
            arity: self.arity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{FlagDiacritic, FlagOp};

    /// The "eat" network: eat/eats/eaten/eating/ate with verb and noun
    /// readings. 15 states, 19 arcs, 6 paths, accepting state 14.
    pub(crate) const EAT_NET: &str = "\
##foma-net 1.0##
##props##
2 19 15 19 1 6 1 1 1 1 1 2 eat
##sigma##
0 @_EPSILON_SYMBOL_@
3 +3P
4 +Mass
5 +N
6 +Past
7 +PastPart
8 +PresPart
9 +Sg
10 +V
11 a
12 e
13 g
14 i
15 n
16 s
17 t
##states##
0 12 11 4 0
12 1
1 11 2 0
2 17 3 0
3 10 0 8 0
10 14 9
10 12 11
5 16 12
4 11 17 5 0
5 17 12 6 0
6 10 0 7 0
7 6 0 14 0
8 0 0 14 0
3 16 13
9 8 15 10 0
10 0 13 14 0
11 7 15 14 0
12 4 0 14 0
13 9 0 14 0
14 -1 -1 1
-1 -1 -1 -1 -1
##end##
";

    fn parse(text: &str) -> Network {
        from_text(text).unwrap()
    }

    fn parse_err(text: &str) -> FstError {
        from_text(text).unwrap_err()
    }

    #[test]
    fn eat_network_shape() {
        let net = parse(EAT_NET);
        let automaton = &net.automaton;
        assert_eq!(automaton.state_count(), 15);
        assert_eq!(automaton.arc_count(), 19);
        for state in 0..15 {
            assert_eq!(automaton.is_accepting(state), state == 14);
        }
        // Epsilon plus 8 tags plus 7 letters.
        assert_eq!(automaton.sigma().len(), 16);
        assert_eq!(net.name.as_deref(), Some("eat"));
        assert_eq!(net.arity, Some(2));
    }

    #[test]
    fn eat_network_symbols() {
        let net = parse(EAT_NET);
        let sigma = net.automaton.sigma();
        let mut tags = 0;
        let mut letters = 0;
        for id in 0..sigma.len() as u32 {
            match sigma.symbol(id) {
                Symbol::MultiChar(_) => tags += 1,
                Symbol::Grapheme(_) => letters += 1,
                _ => {}
            }
        }
        assert_eq!(tags, 8);
        assert_eq!(letters, 7);
    }

    #[test]
    fn implied_state_shorthand_builds_arcs() {
        let net = parse(EAT_NET);
        let automaton = &net.automaton;
        // "12 1" borrowed state 0; both arcs from 0 exist.
        assert_eq!(automaton.arcs(0).len(), 2);
        // "10 14 9", "10 12 11", "5 16 12" borrowed state 3.
        assert_eq!(automaton.arcs(3).len(), 4);
        // "3 16 13" borrowed state 8.
        assert_eq!(automaton.arcs(8).len(), 2);
    }

    #[test]
    fn whitespace_symbols_survive_verbatim() {
        let net = parse(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 390211 90019 390213 5 -1 1 2 2 1 0 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             1 @_UNKNOWN_SYMBOL_@\n\
             2 @_IDENTITY_SYMBOL_@\n\
             3 \u{0020}\n\
             4 \u{00A0}\n\
             5 \u{00AD}\n\
             ##states##\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
        );
        let sigma = net.automaton.sigma();
        // Epsilon, unknown, identity, then the three space-like graphemes.
        assert_eq!(sigma.len(), 6);
        assert_eq!(*sigma.symbol(3), Symbol::Grapheme(" ".to_string()));
        assert_eq!(*sigma.symbol(4), Symbol::Grapheme("\u{00A0}".to_string()));
        assert_eq!(*sigma.symbol(5), Symbol::Grapheme("\u{00AD}".to_string()));
    }

    #[test]
    fn sparse_sigma_ids_are_remapped() {
        let net = parse(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 2 3 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 @P.UN.ON@\n\
             4 +Err/Orth\n\
             5 î\n\
             ##states##\n\
             0 3 1 0\n\
             1 4 2 0\n\
             2 5 3 0\n\
             3 -1 -1 1\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
        );
        let automaton = &net.automaton;
        let sigma = automaton.sigma();
        assert_eq!(
            *sigma.symbol(1),
            Symbol::Flag(FlagDiacritic {
                feature: 0,
                op: FlagOp::Positive(0),
            })
        );
        assert_eq!(*sigma.symbol(2), Symbol::MultiChar("+Err/Orth".to_string()));
        assert_eq!(*sigma.symbol(3), Symbol::Grapheme("î".to_string()));
        // Arcs reference the remapped ids.
        assert_eq!(automaton.arcs(0)[0].upper, 1);
        assert_eq!(automaton.arcs(1)[0].upper, 2);
        assert_eq!(automaton.arcs(2)[0].upper, 3);
        assert!(automaton.is_accepting(3));
    }

    #[test]
    fn lone_at_sign_is_a_grapheme() {
        let net = parse(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 390211 90019 390213 5 -1 1 2 2 1 0 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 @\n\
             ##states##\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
        );
        assert_eq!(
            *net.automaton.sigma().symbol(1),
            Symbol::Grapheme("@".to_string())
        );
    }

    #[test]
    fn first_network_wins() {
        let doubled = format!("{EAT_NET}{EAT_NET}");
        let net = parse(&doubled);
        assert_eq!(net.automaton.state_count(), 15);
        assert_eq!(net.automaton.arc_count(), 19);
    }

    #[test]
    fn accepting_only_record_creates_no_arc() {
        let net = parse(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 2 3 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 a\n\
             ##states##\n\
             0 3 1 0\n\
             1 -1 -1 1\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
        );
        assert_eq!(net.automaton.arc_count(), 1);
        assert!(net.automaton.is_accepting(1));
        assert!(net.automaton.arcs(1).is_empty());
    }

    #[test]
    fn states_grow_to_cover_referenced_ids() {
        let net = parse(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 2 3 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 a\n\
             ##states##\n\
             0 3 7 0\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
        );
        // The arc targets state 7, which is never a source.
        assert_eq!(net.automaton.state_count(), 8);
        assert!(net.automaton.arcs(7).is_empty());
    }

    #[test]
    fn empty_states_section_still_has_a_start_state() {
        let net = parse(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 0 0 0 0 0 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             ##states##\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
        );
        assert_eq!(net.automaton.state_count(), 1);
    }

    #[test]
    fn gzip_round_trip() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(EAT_NET.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let net = from_gzip(&compressed).unwrap();
        assert_eq!(net.automaton.state_count(), 15);
    }

    #[test]
    fn reject_raw_text_as_gzip() {
        assert!(matches!(
            from_gzip(EAT_NET.as_bytes()).unwrap_err(),
            FstError::Decompress(_)
        ));
    }

    // --- failure modes ---

    fn assert_parse_error(text: &str, expected_line: usize, fragment: &str) {
        match parse_err(text) {
            FstError::Parse { line, reason } => {
                assert_eq!(line, expected_line, "wrong line for: {reason}");
                assert!(
                    reason.contains(fragment),
                    "reason {reason:?} does not mention {fragment:?}"
                );
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn reject_duplicate_symbol_id() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 390211 90019 390213 5 -1 1 2 2 1 0 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 @P.UN.ON@\n\
             0 +Err/Orth\n\
             ##states##\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
            7,
            "duplicate symbol id",
        );
    }

    #[test]
    fn reject_unrecognized_special_symbol() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 1 1 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 @E.x.y@\n\
             ##states##\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
            6,
            "unrecognized special symbol",
        );
    }

    #[test]
    fn reject_flag_with_missing_value() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 1 1 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 @P.x@\n\
             ##states##\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
            6,
            "missing a value",
        );
    }

    #[test]
    fn reject_implied_state_without_predecessor() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 1 1 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 a\n\
             ##states##\n\
             3 1\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
            8,
            "implied state",
        );
    }

    #[test]
    fn reject_arc_with_unknown_symbol_id() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 1 1 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 a\n\
             ##states##\n\
             0 9 1 0\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
            8,
            "not in sigma",
        );
    }

    #[test]
    fn reject_malformed_integer_in_states() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 1 1 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 a\n\
             ##states##\n\
             0 3 one 0\n\
             -1 -1 -1 -1 -1\n\
             ##end##\n",
            8,
            "malformed integer",
        );
    }

    #[test]
    fn reject_record_after_sentinel() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##props##\n\
             2 1 1 1 1 1 1 1 1 1 1 2\n\
             ##sigma##\n\
             0 @_EPSILON_SYMBOL_@\n\
             3 a\n\
             ##states##\n\
             -1 -1 -1 -1 -1\n\
             0 3 1 0\n\
             ##end##\n",
            9,
            "after the end sentinel",
        );
    }

    #[test]
    fn reject_truncated_network() {
        let truncated = EAT_NET.replace("##end##\n", "");
        match parse_err(&truncated) {
            FstError::Parse { reason, .. } => assert!(reason.contains("truncated")),
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn reject_out_of_order_sections() {
        assert_parse_error(
            "##foma-net 1.0##\n\
             ##sigma##\n",
            2,
            "unexpected section",
        );
    }
}
