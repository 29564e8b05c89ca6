// Flag diacritic operations: P, N, R, D, C, U.

use hashbrown::HashMap;

/// Interned flag feature name (e.g. the `CASE` in `@P.CASE.NOM@`).
pub type FeatureId = u16;

/// Interned flag value name (e.g. the `NOM` in `@P.CASE.NOM@`).
pub type ValueId = u16;

/// A flag operation with its arity encoded in the variant.
///
/// `Require` and `Disallow` exist in a feature-only and a feature+value
/// shape; the other operators have exactly one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagOp {
    /// `@P.f.v@`: set `f` to `v`.
    Positive(ValueId),
    /// `@N.f.v@`: set `f` to the negation of `v`.
    Negative(ValueId),
    /// `@R.f@` requires `f` to be set to anything; `@R.f.v@` requires
    /// exactly `v`.
    Require(Option<ValueId>),
    /// `@D.f@` requires `f` to be unset; `@D.f.v@` forbids exactly `v`.
    Disallow(Option<ValueId>),
    /// `@C.f@`: unset `f`.
    Clear,
    /// `@U.f.v@`: unify `f` with `v` (set if compatible, fail otherwise).
    Unify(ValueId),
}

/// A parsed flag diacritic symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlagDiacritic {
    pub feature: FeatureId,
    pub op: FlagOp,
}

/// The value of one feature in a feature environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlagValue {
    #[default]
    Unset,
    Set(ValueId),
    /// Negatively set: known to be anything but this value.
    Negated(ValueId),
}

/// A feature environment: one value per feature, indexed by [`FeatureId`].
pub type FlagEnv = Box<[FlagValue]>;

/// Result of evaluating a flag diacritic against the current value of its
/// feature. The traversal owns the actual environment update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagCheckResult {
    /// Constraint violated: the arc cannot be taken.
    Reject,
    /// Arc allowed, environment unchanged.
    AcceptNoUpdate,
    /// Arc allowed; the flag's feature takes this new value.
    AcceptAndUpdate(FlagValue),
}

/// Evaluate a flag diacritic against the current value of its feature.
pub fn check_flag(flag: &FlagDiacritic, current: FlagValue) -> FlagCheckResult {
    use FlagCheckResult::*;
    match flag.op {
        FlagOp::Positive(v) => AcceptAndUpdate(FlagValue::Set(v)),
        FlagOp::Negative(v) => AcceptAndUpdate(FlagValue::Negated(v)),
        FlagOp::Clear => AcceptAndUpdate(FlagValue::Unset),
        FlagOp::Require(None) => match current {
            FlagValue::Unset => Reject,
            _ => AcceptNoUpdate,
        },
        FlagOp::Require(Some(v)) => {
            if current == FlagValue::Set(v) {
                AcceptNoUpdate
            } else {
                Reject
            }
        }
        FlagOp::Disallow(None) => match current {
            FlagValue::Unset => AcceptNoUpdate,
            _ => Reject,
        },
        FlagOp::Disallow(Some(v)) => {
            if current == FlagValue::Set(v) {
                Reject
            } else {
                AcceptNoUpdate
            }
        }
        FlagOp::Unify(v) => match current {
            FlagValue::Unset => AcceptAndUpdate(FlagValue::Set(v)),
            FlagValue::Set(w) if w == v => AcceptNoUpdate,
            // A negative setting to some other value is compatible.
            FlagValue::Negated(w) if w != v => AcceptAndUpdate(FlagValue::Set(v)),
            _ => Reject,
        },
    }
}

/// Interns feature and value names across all flag diacritics of one
/// network, assigning dense ids in order of first appearance.
pub struct FlagRegistry {
    features: HashMap<String, FeatureId>,
    values: HashMap<String, ValueId>,
}

impl Default for FlagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagRegistry {
    pub fn new() -> Self {
        FlagRegistry {
            features: HashMap::new(),
            values: HashMap::new(),
        }
    }

    /// Number of distinct features seen so far.
    pub fn feature_count(&self) -> u16 {
        self.features.len() as u16
    }

    /// Parse a sigma text as a flag diacritic.
    ///
    /// Returns `Ok(None)` when the text is not flag-shaped at all (no
    /// recognized operator letter followed by a dot). A flag-shaped text
    /// with the wrong arity for its operator is an error, carried as the
    /// reason string.
    pub fn parse(&mut self, text: &str) -> Result<Option<FlagDiacritic>, String> {
        let bytes = text.as_bytes();
        if bytes.len() < 5 || bytes[0] != b'@' || bytes[bytes.len() - 1] != b'@' {
            return Ok(None);
        }
        let op_letter = bytes[1];
        if !matches!(op_letter, b'P' | b'N' | b'R' | b'D' | b'C' | b'U') || bytes[2] != b'.' {
            return Ok(None);
        }

        // `@X.FEATURE@` or `@X.FEATURE.VALUE@`; the value may itself
        // contain dots, the feature may not.
        let inner = &text[3..text.len() - 1];
        let (feature, value) = match inner.split_once('.') {
            Some((f, v)) => (f, Some(v)),
            None => (inner, None),
        };
        if feature.is_empty() || feature.contains('@') {
            return Ok(None);
        }
        if let Some(v) = value {
            if v.is_empty() || v.contains('@') {
                return Ok(None);
            }
        }

        let op = match (op_letter, value) {
            (b'P', Some(v)) => FlagOp::Positive(self.value_id(v)),
            (b'N', Some(v)) => FlagOp::Negative(self.value_id(v)),
            (b'U', Some(v)) => FlagOp::Unify(self.value_id(v)),
            (b'R', v) => FlagOp::Require(v.map(|v| self.value_id(v))),
            (b'D', v) => FlagOp::Disallow(v.map(|v| self.value_id(v))),
            (b'C', None) => FlagOp::Clear,
            (b'P' | b'N' | b'U', None) => {
                return Err(format!("flag diacritic {text:?} is missing a value"));
            }
            (b'C', Some(_)) => {
                return Err(format!("flag diacritic {text:?} does not take a value"));
            }
            _ => unreachable!("operator letter checked above"),
        };

        let feature = self.feature_id(feature);
        Ok(Some(FlagDiacritic { feature, op }))
    }

    fn feature_id(&mut self, name: &str) -> FeatureId {
        let next = self.features.len() as FeatureId;
        *self.features.entry_ref(name).or_insert(next)
    }

    fn value_id(&mut self, name: &str) -> ValueId {
        let next = self.values.len() as ValueId;
        *self.values.entry_ref(name).or_insert(next)
    }
}
