//! # labrad-types: LabRAD type tags and binary codec
//!
//! Type tags are a compact grammar describing the structured, unit-aware data that travels
//! between LabRAD clients, servers and the manager. This crate parses and prints tags, picks
//! a wire type for native values (inference, hint resolution, specialization), and converts
//! values to and from the canonical binary layout.
//!
//! ## Type tags
//!
//! - Scalars: `_` none, `b` bool, `i` int32, `w` uint32, `s` bytes, `t` time
//! - Units: `v`, `v[]`, `v[m/s]` (values), `c`, `c[]`, `c[GHz]` (complex)
//! - Clusters: `ii`, `(s)`, `b(t)`; printed with exactly one pair of parentheses
//! - Lists: `*i`, `*2v[Hz]`, `*_` (element type unknown, for empty lists)
//! - Errors: `E`, `Ew`, `E(w)`
//! - Hints only: `?` matches anything
//! - `:` starts a comment that runs to the end of the tag
//!
//! ## Example
//!
//! ```
//! use labrad_types::{flatten, hints, unflatten, Data};
//!
//! let data = Data::Tuple(vec![Data::Int(1), Data::Int(2), "a".into()]);
//! let (bytes, ty) = flatten(&data, &hints(&["ww?"]).unwrap()).unwrap();
//! assert_eq!(ty.to_string(), "(wws)");
//! let back = unflatten(&bytes, &ty).unwrap();
//! assert_eq!(back, Data::Tuple(vec![Data::Word(1), Data::Word(2), Data::Bytes(b"a".to_vec())]));
//! ```
//!
//! Units are opaque labels: flattening never converts between units, it only checks that a
//! value's unit is compatible with the requested one (see [`units`]).

pub mod ast;
pub mod codec;
pub mod error;
pub mod infer;
pub mod parser;
pub mod resolve;
pub mod specialize;
pub mod units;
pub mod value;

pub use ast::{Hint, Type, Unit};
pub use codec::{Codec, Endianness};
pub use error::{FlatteningError, InferenceError, TypeTagError, UnflatteningError};
pub use infer::infer;
pub use parser::{hints, parse_hint, parse_type};
pub use resolve::{resolve, resolve_with};
pub use specialize::specialize;
pub use units::{ExactUnits, StandardUnits, Units};
pub use value::{Complex, Data, NumArray, RemoteError};

/// Flatten with the default codec (big-endian, [`StandardUnits`]).
pub fn flatten(data: &Data, hints: &[Hint]) -> Result<(Vec<u8>, Type), FlatteningError> {
    Codec::default().flatten(data, hints)
}

/// Unflatten with the default codec (big-endian).
pub fn unflatten(bytes: &[u8], ty: &Type) -> Result<Data, UnflatteningError> {
    Codec::default().unflatten(bytes, ty)
}
