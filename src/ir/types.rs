//! Inferred value types and the join/narrow lattice.
//!
//! Every abstract value tracked by frame inference carries a [`ValueType`].
//! Primitive types are sets of candidates rather than single types: a small
//! integer constant can legally originate from a `boolean`, `byte`, `char`,
//! `short` or `int` expression, and the real width only becomes known when a
//! typed operation reads the value (see [`ValueType::narrowed`]) or when two
//! values meet at a join point (see [`ValueType::join`]). Reference types are
//! opaque internal-form descriptors; class-hierarchy resolution happens
//! outside this crate, so the join of two distinct classes collapses to
//! `java/lang/Object`.
//!
//! The lattice is finite: candidate sets only shrink, reference joins only
//! move towards `java/lang/Object`, and incompatible combinations produce a
//! dead slot. That finiteness is what bounds the inference fixpoint.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::ir::Pc;

bitflags! {
    /// Candidate set for a primitive value.
    ///
    /// A mask with more than one bit set represents a value whose source-level
    /// width is not yet determined. Wide (category-2) candidates never mix
    /// with narrow ones: constants and descriptors introduce either a subset
    /// of [`PrimMask::INT_LIKE`] or a single wide flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PrimMask: u16 {
        /// `boolean`
        const BOOLEAN = 0x0001;
        /// `byte`
        const BYTE = 0x0002;
        /// `char`
        const CHAR = 0x0004;
        /// `short`
        const SHORT = 0x0008;
        /// `int`
        const INT = 0x0010;
        /// `long`
        const LONG = 0x0020;
        /// `float`
        const FLOAT = 0x0040;
        /// `double`
        const DOUBLE = 0x0080;

        /// All category-1 integral candidates.
        const INT_LIKE = Self::BOOLEAN.bits()
            | Self::BYTE.bits()
            | Self::CHAR.bits()
            | Self::SHORT.bits()
            | Self::INT.bits();
    }
}

impl PrimMask {
    /// Candidate set for an `int`-typed constant, by magnitude.
    ///
    /// `0` and `1` admit every integral candidate including `boolean`;
    /// larger magnitudes drop the candidates that cannot represent the
    /// value. `int` itself is always a candidate.
    #[must_use]
    pub fn for_int_constant(value: i32) -> Self {
        let mut mask = Self::INT;
        if value == 0 || value == 1 {
            mask |= Self::BOOLEAN;
        }
        if (-128..=127).contains(&value) {
            mask |= Self::BYTE;
        }
        if (-32768..=32767).contains(&value) {
            mask |= Self::SHORT;
        }
        if (0..=65535).contains(&value) {
            mask |= Self::CHAR;
        }
        mask
    }

    /// Returns `true` if the mask admits a category-2 (two-local-slot) value.
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        self.intersects(Self::LONG.union(Self::DOUBLE))
    }

    /// Returns `true` if exactly one candidate remains.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.bits().count_ones() == 1
    }
}

impl fmt::Display for PrimMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PrimMask, &str); 8] = [
            (PrimMask::BOOLEAN, "boolean"),
            (PrimMask::BYTE, "byte"),
            (PrimMask::CHAR, "char"),
            (PrimMask::SHORT, "short"),
            (PrimMask::INT, "int"),
            (PrimMask::LONG, "long"),
            (PrimMask::FLOAT, "float"),
            (PrimMask::DOUBLE, "double"),
        ];

        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "<none>")?;
        }
        Ok(())
    }
}

/// Reference-typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefType {
    /// The `null` constant, assignable to any reference slot.
    Null,
    /// A class or array type in internal form, e.g. `java/lang/String`
    /// or `[I`. Opaque to this crate.
    Object(Arc<str>),
}

impl RefType {
    /// Creates an object reference from an internal-form name.
    pub fn object(name: impl Into<Arc<str>>) -> Self {
        RefType::Object(name.into())
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefType::Null => write!(f, "null"),
            RefType::Object(name) => write!(f, "{}", name),
        }
    }
}

/// The inferred type of one abstract value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Primitive candidate set.
    Prim(PrimMask),
    /// Reference (class, array, or `null`).
    Ref(RefType),
    /// Return address pushed by a subroutine call; the payload is the
    /// subroutine's entry PC.
    RetAddr(Pc),
}

/// What a reading operation demands of the value it pops or loads.
///
/// Narrowing a [`ValueType`] against a demand either refines the candidate
/// set or proves the read illegal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demand {
    /// A primitive out of the given candidate set.
    Prim(PrimMask),
    /// Any reference, including `null`.
    Reference,
    /// A subroutine return address.
    RetAddr,
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Demand::Prim(mask) => write!(f, "{}", mask),
            Demand::Reference => write!(f, "reference"),
            Demand::RetAddr => write!(f, "returnAddress"),
        }
    }
}

impl ValueType {
    /// Common object reference, the top of the reference half-lattice.
    pub const OBJECT: &'static str = "java/lang/Object";

    /// Shorthand for a resolved `int`.
    #[must_use]
    pub const fn int() -> Self {
        ValueType::Prim(PrimMask::INT)
    }

    /// Returns `true` for values occupying two local slots (long/double).
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, ValueType::Prim(mask) if mask.is_wide())
    }

    /// Joins two types meeting at the same slot of a join point.
    ///
    /// Returns `None` when the combination is irreconcilable, in which
    /// case the slot becomes dead. Identical types join to themselves;
    /// primitive sets intersect; `null` is assignable to any reference;
    /// distinct classes collapse to [`ValueType::OBJECT`]; return
    /// addresses only join with the same subroutine's return address.
    #[must_use]
    pub fn join(&self, other: &ValueType) -> Option<ValueType> {
        match (self, other) {
            (ValueType::Prim(a), ValueType::Prim(b)) => {
                let meet = *a & *b;
                if meet.is_empty() {
                    None
                } else {
                    Some(ValueType::Prim(meet))
                }
            }
            (ValueType::Ref(RefType::Null), ValueType::Ref(r))
            | (ValueType::Ref(r), ValueType::Ref(RefType::Null)) => {
                Some(ValueType::Ref(r.clone()))
            }
            (ValueType::Ref(RefType::Object(a)), ValueType::Ref(RefType::Object(b))) => {
                if a == b {
                    Some(self.clone())
                } else {
                    Some(ValueType::Ref(RefType::object(Self::OBJECT)))
                }
            }
            (ValueType::RetAddr(a), ValueType::RetAddr(b)) if a == b => Some(self.clone()),
            _ => None,
        }
    }

    /// Narrows this type against a reader's demand.
    ///
    /// Returns the refined type, or `None` when the demand cannot be
    /// satisfied (e.g. a return address read as an integer).
    #[must_use]
    pub fn narrowed(&self, demand: &Demand) -> Option<ValueType> {
        match (self, demand) {
            (ValueType::Prim(mask), Demand::Prim(want)) => {
                let meet = *mask & *want;
                if meet.is_empty() {
                    None
                } else {
                    Some(ValueType::Prim(meet))
                }
            }
            (ValueType::Ref(_), Demand::Reference) => Some(self.clone()),
            (ValueType::RetAddr(_), Demand::RetAddr) => Some(self.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Prim(mask) => write!(f, "{}", mask),
            ValueType::Ref(r) => write!(f, "{}", r),
            ValueType::RetAddr(pc) => write!(f, "ret->{}", pc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_constant_candidates() {
        assert_eq!(
            PrimMask::for_int_constant(1),
            PrimMask::BOOLEAN | PrimMask::BYTE | PrimMask::SHORT | PrimMask::CHAR | PrimMask::INT
        );
        assert_eq!(
            PrimMask::for_int_constant(200),
            PrimMask::SHORT | PrimMask::CHAR | PrimMask::INT
        );
        assert_eq!(
            PrimMask::for_int_constant(-5),
            PrimMask::BYTE | PrimMask::SHORT | PrimMask::INT
        );
        assert_eq!(PrimMask::for_int_constant(100_000), PrimMask::INT);
    }

    #[test]
    fn join_primitives_intersects() {
        let a = ValueType::Prim(PrimMask::for_int_constant(1));
        let b = ValueType::Prim(PrimMask::for_int_constant(200));
        assert_eq!(
            a.join(&b),
            Some(ValueType::Prim(
                PrimMask::SHORT | PrimMask::CHAR | PrimMask::INT
            ))
        );

        let int = ValueType::int();
        let float = ValueType::Prim(PrimMask::FLOAT);
        assert_eq!(int.join(&float), None);
    }

    #[test]
    fn join_references() {
        let s = ValueType::Ref(RefType::object("java/lang/String"));
        let null = ValueType::Ref(RefType::Null);
        assert_eq!(s.join(&null), Some(s.clone()));
        assert_eq!(null.join(&s), Some(s.clone()));

        let list = ValueType::Ref(RefType::object("java/util/List"));
        assert_eq!(
            s.join(&list),
            Some(ValueType::Ref(RefType::object(ValueType::OBJECT)))
        );
        assert_eq!(s.join(&s), Some(s.clone()));
    }

    #[test]
    fn join_mixed_is_dead() {
        let s = ValueType::Ref(RefType::object("java/lang/String"));
        assert_eq!(s.join(&ValueType::int()), None);
        assert_eq!(ValueType::RetAddr(4).join(&ValueType::RetAddr(9)), None);
        assert_eq!(
            ValueType::RetAddr(4).join(&ValueType::RetAddr(4)),
            Some(ValueType::RetAddr(4))
        );
    }

    #[test]
    fn narrow_by_demand() {
        let ambiguous = ValueType::Prim(PrimMask::for_int_constant(1));
        assert_eq!(
            ambiguous.narrowed(&Demand::Prim(PrimMask::BOOLEAN)),
            Some(ValueType::Prim(PrimMask::BOOLEAN))
        );
        assert_eq!(ambiguous.narrowed(&Demand::Prim(PrimMask::LONG)), None);
        assert_eq!(ambiguous.narrowed(&Demand::Reference), None);

        let addr = ValueType::RetAddr(7);
        assert_eq!(addr.narrowed(&Demand::RetAddr), Some(addr.clone()));
        assert_eq!(addr.narrowed(&Demand::Prim(PrimMask::INT)), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(
            ValueType::Prim(PrimMask::BYTE | PrimMask::INT).to_string(),
            "byte|int"
        );
        assert_eq!(
            ValueType::Ref(RefType::object("[I")).to_string(),
            "[I"
        );
        assert_eq!(ValueType::RetAddr(12).to_string(), "ret->12");
    }
}
