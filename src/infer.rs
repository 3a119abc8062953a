//! Default wire types for untyped native values.

use crate::ast::{Type, Unit};
use crate::error::InferenceError;
use crate::value::{Data, NumArray};

/// Default type of `data`, used when no hints are given.
///
/// Empty sequences infer as `*_` (element type unknown). A sequence whose first element is
/// itself a list infers as a deeper list (`[[1, 2], [3, 4]]` is `*2i`).
pub fn infer(data: &Data) -> Result<Type, InferenceError> {
    Ok(match data {
        Data::None => Type::None,
        Data::Bool(_) => Type::Bool,
        Data::Int(n) => {
            if i32::try_from(*n).is_ok() || *n < 0 {
                Type::Int
            } else {
                Type::Word
            }
        }
        Data::Word(_) => Type::Word,
        Data::Bytes(_) | Data::Text(_) => Type::Str,
        Data::Time(_) => Type::Time,
        Data::Value(_, unit) => Type::Value(Unit::from_label(unit)),
        Data::Float(_) => Type::Value(Unit::Empty),
        Data::ComplexValue(_, unit) => Type::Complex(Unit::from_label(unit)),
        Data::Complex(_) => Type::Complex(Unit::Empty),
        Data::Tuple(items) => {
            if items.is_empty() {
                return Err(InferenceError("an empty tuple".to_string()));
            }
            let ty = Type::Cluster(items.iter().map(infer).collect::<Result<Vec<_>, _>>()?);
            if ty.prints_ambiguously() {
                return Err(ambiguous_tag(data));
            }
            ty
        }
        Data::Array(array) => Type::list(match array {
            NumArray::Int32(_) => Type::Int,
            NumArray::Word32(_) => Type::Word,
            NumArray::Float64(_) => Type::Value(Unit::Empty),
            NumArray::Complex128(_) => Type::Complex(Unit::Empty),
        }),
        Data::ValueArray(_, unit) => Type::list(Type::Value(Unit::from_label(unit))),
        Data::List(items) => match items.first() {
            None => Type::list_of_depth(None, 1),
            Some(first) => match infer(first)? {
                Type::List { elem, depth } if depth < 9 => Type::List {
                    elem,
                    depth: depth + 1,
                },
                elem => Type::list(elem),
            },
        },
        Data::Error(e) => Type::Error(match &e.payload {
            Some(p) => Some(Box::new(infer(p)?)),
            None => None,
        }),
    })
}

pub(crate) fn ambiguous_tag(data: &Data) -> InferenceError {
    InferenceError(format!(
        "{} (an error without payload cannot precede another cluster member)",
        data.kind()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_type;
    use crate::value::RemoteError;

    fn tag(data: &Data) -> String {
        infer(data).unwrap().to_string()
    }

    #[test]
    fn integers_pick_int_or_word() {
        assert_eq!(tag(&Data::Int(-2)), "i");
        assert_eq!(tag(&Data::Int(0x7fff_ffff)), "i");
        assert_eq!(tag(&Data::Int(0x8000_0000)), "w");
        assert_eq!(tag(&Data::Word(1)), "w");
    }

    #[test]
    fn nested_sequences_deepen_the_list() {
        let grid = Data::List(vec![
            Data::List(vec!["a".into(), "bb".into()]),
            Data::List(vec!["c".into(), "dd".into()]),
        ]);
        assert_eq!(infer(&grid).unwrap(), parse_type("*2s").unwrap());
        assert_eq!(tag(&Data::List(vec![Data::List(vec![])])), "*2_");
        assert_eq!(tag(&Data::List(vec![])), "*_");
    }

    #[test]
    fn empty_tuple_has_no_type() {
        assert!(infer(&Data::Tuple(vec![])).is_err());
        assert!(infer(&Data::List(vec![Data::Tuple(vec![])])).is_err());
    }

    #[test]
    fn bare_error_must_end_its_cluster() {
        let bare = Data::Error(RemoteError::new(3, "x"));
        assert!(infer(&Data::Tuple(vec![bare.clone(), Data::Int(1)])).is_err());
        assert!(infer(&Data::Tuple(vec![Data::List(vec![bare.clone()]), Data::Int(1)])).is_err());
        assert_eq!(tag(&Data::Tuple(vec![Data::Int(1), bare.clone()])), "(iE)");
        let carried = RemoteError::new(3, "x").with_payload(Data::Int(2));
        assert_eq!(tag(&Data::Tuple(vec![Data::Error(carried), Data::Int(1)])), "(Eii)");
    }
}
