//! Type specialization: fill list element types that resolution left unknown.
//!
//! All leaves of one list share a slot. When the slot's element type is unknown (or holds
//! unknown pieces, e.g. `*(*_)` because the first cluster's list was empty), the type is
//! refined leaf by leaf from the first leaf that actually carries data, and every leaf must
//! then conform to the unified type.

use crate::ast::{Type, Unit};
use crate::error::FlatteningError;
use crate::infer::infer;
use crate::resolve::{grid_error, integer};
use crate::value::Data;
use log::debug;

/// Refine `ty` against `data`, returning a type with as few unknown element types as the data allows.
pub fn specialize(data: &Data, ty: &Type) -> Result<Type, FlatteningError> {
    match ty {
        Type::Cluster(members) => match data {
            Data::Tuple(items) if items.len() == members.len() => members
                .iter()
                .zip(items)
                .map(|(t, d)| specialize(d, t))
                .collect::<Result<Vec<_>, _>>()
                .map(Type::Cluster),
            _ => Ok(ty.clone()),
        },
        Type::List { elem, depth } => {
            let known = elem.as_deref().map_or(false, Type::is_concrete);
            if known {
                return Ok(ty.clone());
            }
            let grid = data
                .grid(*depth)
                .map_err(|e| grid_error(e, *depth, data))?;
            let mut unified = elem.as_deref().cloned();
            for leaf in &grid.leaves {
                let current = match unified.take() {
                    Some(t) => t,
                    None => {
                        let t = infer(leaf)?;
                        debug!("list element type '{}' taken from {}", t, leaf.kind());
                        t
                    }
                };
                unified = Some(specialize(leaf, &current)?);
            }
            if let Some(u) = &unified {
                if let Some(bad) = grid.leaves.iter().find(|leaf| !conforms(leaf, u)) {
                    return Err(FlatteningError::Conflict {
                        unified: u.to_string(),
                        found: bad.kind(),
                    });
                }
            }
            Ok(Type::list_of_depth(unified, *depth))
        }
        Type::Error(Some(payload)) => match data {
            Data::Error(e) => match &e.payload {
                Some(p) => Ok(Type::Error(Some(Box::new(specialize(p, payload)?)))),
                None => Ok(ty.clone()),
            },
            _ => Ok(ty.clone()),
        },
        _ => Ok(ty.clone()),
    }
}

/// Structural validity of `data` under `ty`. Integer ranges are left to the encoder.
fn conforms(data: &Data, ty: &Type) -> bool {
    match ty {
        Type::None => matches!(data, Data::None),
        Type::Bool => matches!(data, Data::Bool(_)),
        Type::Int | Type::Word => integer(data).is_some(),
        Type::Str => matches!(data, Data::Bytes(_) | Data::Text(_)),
        Type::Time => matches!(data, Data::Time(_)),
        Type::Value(unit) => match data {
            Data::Float(_) | Data::Int(_) | Data::Word(_) => !matches!(unit, Unit::Named(_)),
            Data::Value(_, label) => unit_conforms(unit, label),
            _ => false,
        },
        Type::Complex(unit) => match data {
            Data::Complex(_) | Data::Float(_) | Data::Int(_) | Data::Word(_) => {
                !matches!(unit, Unit::Named(_))
            }
            Data::ComplexValue(_, label) | Data::Value(_, label) => unit_conforms(unit, label),
            _ => false,
        },
        Type::Cluster(members) => match data {
            Data::Tuple(items) => {
                items.len() == members.len()
                    && members.iter().zip(items).all(|(t, d)| conforms(d, t))
            }
            _ => false,
        },
        Type::List { elem, depth } => match data.grid(*depth) {
            Ok(grid) => match elem {
                Some(e) => grid.leaves.iter().all(|leaf| conforms(leaf, e)),
                None => grid.leaves.is_empty(),
            },
            Err(_) => false,
        },
        Type::Error(payload) => match data {
            Data::Error(e) => match (payload, &e.payload) {
                (Some(t), Some(p)) => conforms(p, t),
                (_, None) => true,
                (None, Some(_)) => false,
            },
            _ => false,
        },
    }
}

fn unit_conforms(unit: &Unit, label: &str) -> bool {
    *unit == Unit::Unspecified || *unit == Unit::from_label(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_type;

    #[test]
    fn empty_branch_borrows_type_from_sibling() {
        let data = Data::List(vec![
            Data::Tuple(vec![Data::List(vec![])]),
            Data::Tuple(vec![Data::List(vec![Data::Float(5.0)])]),
        ]);
        let partial = infer(&data).unwrap();
        assert_eq!(partial, parse_type("*(*_)").unwrap());
        assert_eq!(specialize(&data, &partial).unwrap(), parse_type("*(*v[])").unwrap());
    }

    #[test]
    fn conflicting_siblings_fail() {
        let data = Data::List(vec![
            Data::Tuple(vec![Data::List(vec![])]),
            Data::Tuple(vec![Data::List(vec![Data::Float(5.0)])]),
            Data::Tuple(vec![Data::List(vec!["x".into()])]),
        ]);
        let partial = infer(&data).unwrap();
        let err = specialize(&data, &partial).unwrap_err();
        assert!(matches!(err, FlatteningError::Conflict { .. }), "{:?}", err);
    }

    #[test]
    fn mixed_units_in_one_list_fail() {
        let data = Data::List(vec![Data::value(1.0, "m"), Data::value(10.0, "cm")]);
        let partial = Type::list_of_depth(None, 1);
        assert!(specialize(&data, &partial).is_err());
    }
}
