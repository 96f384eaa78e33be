//! Field and method descriptor parsing.
//!
//! Operations carry their member descriptors as plain strings (resolution of
//! the referenced classes and members is out of scope); this module turns
//! those strings into [`ValueType`]s for the type-transfer rules. Grammar is
//! the class-file one: `B C D F I J S Z`, `L<internal name>;`, `[` prefixes,
//! and `(<params>)<return>` for methods with `V` as the void return marker.
//!
//! Array types stay opaque: `[I` parses to a reference whose name is the
//! full descriptor, mirroring how internal-form names are used elsewhere.

use std::sync::Arc;

use crate::ir::types::{Demand, PrimMask, RefType, ValueType};
use crate::Result;

/// Parses a single field descriptor into a [`ValueType`].
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for an empty descriptor, an
/// unterminated class name, an unknown type character, or trailing input.
pub fn parse_field_descriptor(desc: &str) -> Result<ValueType> {
    let bytes = desc.as_bytes();
    let mut pos = 0;
    let ty = parse_type(desc, bytes, &mut pos)?;
    if pos != bytes.len() {
        return Err(malformed_error!(
            "Trailing characters in field descriptor '{}'",
            desc
        ));
    }
    Ok(ty)
}

/// Parses a method descriptor into its parameter types and return type.
///
/// The return type is `None` for `V`. The receiver slot of instance methods
/// is not part of the descriptor and must be prepended by the caller.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] when the parameter list is not
/// parenthesized or any contained descriptor is invalid.
pub fn parse_method_descriptor(desc: &str) -> Result<(Vec<ValueType>, Option<ValueType>)> {
    let bytes = desc.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(malformed_error!(
            "Method descriptor '{}' does not start with '('",
            desc
        ));
    }

    let mut pos = 1;
    let mut params = Vec::new();
    loop {
        match bytes.get(pos) {
            Some(b')') => {
                pos += 1;
                break;
            }
            Some(_) => params.push(parse_type(desc, bytes, &mut pos)?),
            None => {
                return Err(malformed_error!(
                    "Unterminated parameter list in method descriptor '{}'",
                    desc
                ))
            }
        }
    }

    let ret = if bytes.get(pos) == Some(&b'V') {
        pos += 1;
        None
    } else {
        Some(parse_type(desc, bytes, &mut pos)?)
    };

    if pos != bytes.len() {
        return Err(malformed_error!(
            "Trailing characters in method descriptor '{}'",
            desc
        ));
    }
    Ok((params, ret))
}

/// The demand a declared sink (field store, argument pass, typed array
/// store) places on the value assigned to it.
///
/// Follows source-level assignability for the integral family: an `int`
/// sink accepts any narrower integral, a `short` sink also accepts `byte`,
/// while `boolean` and `char` only accept themselves.
pub(crate) fn sink_demand(ty: &ValueType) -> Demand {
    match ty {
        ValueType::Prim(mask) => {
            let want = if mask.contains(PrimMask::INT) {
                PrimMask::BYTE | PrimMask::CHAR | PrimMask::SHORT | PrimMask::INT
            } else if mask.contains(PrimMask::SHORT) {
                PrimMask::BYTE | PrimMask::SHORT
            } else {
                *mask
            };
            Demand::Prim(want)
        }
        ValueType::Ref(_) => Demand::Reference,
        ValueType::RetAddr(_) => Demand::RetAddr,
    }
}

fn parse_type(desc: &str, bytes: &[u8], pos: &mut usize) -> Result<ValueType> {
    let start = *pos;
    match bytes.get(*pos) {
        Some(b'Z') => prim(pos, PrimMask::BOOLEAN),
        Some(b'B') => prim(pos, PrimMask::BYTE),
        Some(b'C') => prim(pos, PrimMask::CHAR),
        Some(b'S') => prim(pos, PrimMask::SHORT),
        Some(b'I') => prim(pos, PrimMask::INT),
        Some(b'J') => prim(pos, PrimMask::LONG),
        Some(b'F') => prim(pos, PrimMask::FLOAT),
        Some(b'D') => prim(pos, PrimMask::DOUBLE),
        Some(b'L') => {
            let Some(end) = bytes[*pos..].iter().position(|&b| b == b';') else {
                return Err(malformed_error!(
                    "Unterminated class name in descriptor '{}'",
                    desc
                ));
            };
            let name: Arc<str> = desc[*pos + 1..*pos + end].into();
            *pos += end + 1;
            Ok(ValueType::Ref(RefType::Object(name)))
        }
        Some(b'[') => {
            while bytes.get(*pos) == Some(&b'[') {
                *pos += 1;
            }
            // Element type only validated; the array keeps its full spelling.
            parse_type(desc, bytes, pos)?;
            Ok(ValueType::Ref(RefType::object(&desc[start..*pos])))
        }
        Some(other) => Err(malformed_error!(
            "Unknown type character '{}' in descriptor '{}'",
            *other as char,
            desc
        )),
        None => Err(malformed_error!("Empty type in descriptor '{}'", desc)),
    }
}

fn prim(pos: &mut usize, mask: PrimMask) -> Result<ValueType> {
    *pos += 1;
    Ok(ValueType::Prim(mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_primitives() {
        assert_eq!(
            parse_field_descriptor("I").unwrap(),
            ValueType::Prim(PrimMask::INT)
        );
        assert_eq!(
            parse_field_descriptor("Z").unwrap(),
            ValueType::Prim(PrimMask::BOOLEAN)
        );
        assert_eq!(
            parse_field_descriptor("D").unwrap(),
            ValueType::Prim(PrimMask::DOUBLE)
        );
    }

    #[test]
    fn field_references() {
        assert_eq!(
            parse_field_descriptor("Ljava/lang/String;").unwrap(),
            ValueType::Ref(RefType::object("java/lang/String"))
        );
        assert_eq!(
            parse_field_descriptor("[[J").unwrap(),
            ValueType::Ref(RefType::object("[[J"))
        );
        assert_eq!(
            parse_field_descriptor("[Ljava/lang/Object;").unwrap(),
            ValueType::Ref(RefType::object("[Ljava/lang/Object;"))
        );
    }

    #[test]
    fn field_rejects_garbage() {
        assert!(parse_field_descriptor("").is_err());
        assert!(parse_field_descriptor("Q").is_err());
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_field_descriptor("II").is_err());
    }

    #[test]
    fn method_shapes() {
        let (params, ret) = parse_method_descriptor("(IJLjava/lang/String;)V").unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], ValueType::Prim(PrimMask::INT));
        assert_eq!(params[1], ValueType::Prim(PrimMask::LONG));
        assert_eq!(
            params[2],
            ValueType::Ref(RefType::object("java/lang/String"))
        );
        assert!(ret.is_none());

        let (params, ret) = parse_method_descriptor("()[I").unwrap();
        assert!(params.is_empty());
        assert_eq!(ret, Some(ValueType::Ref(RefType::object("[I"))));
    }

    #[test]
    fn method_rejects_garbage() {
        assert!(parse_method_descriptor("I)V").is_err());
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("(I)VX").is_err());
    }

    #[test]
    fn sink_demands_follow_assignability() {
        let int_sink = sink_demand(&ValueType::Prim(PrimMask::INT));
        assert_eq!(
            int_sink,
            Demand::Prim(PrimMask::BYTE | PrimMask::CHAR | PrimMask::SHORT | PrimMask::INT)
        );
        assert_eq!(
            sink_demand(&ValueType::Prim(PrimMask::SHORT)),
            Demand::Prim(PrimMask::BYTE | PrimMask::SHORT)
        );
        assert_eq!(
            sink_demand(&ValueType::Prim(PrimMask::BOOLEAN)),
            Demand::Prim(PrimMask::BOOLEAN)
        );
        assert_eq!(
            sink_demand(&ValueType::Ref(RefType::Null)),
            Demand::Reference
        );
    }
}
