//! Native values for flattening/unflattening (codec representation).
//!
//! [`Data`] is a closed view over everything the codec knows how to carry: scalars, byte/text
//! buffers, timestamps, unit-bearing scalars and arrays, tuples, sequences, numeric arrays and
//! remote errors. Units are opaque labels; an empty label means dimensionless.

use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Complex number as two doubles.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }
}

/// Homogeneous numeric array, one dtype per array.
#[derive(Debug, Clone, PartialEq)]
pub enum NumArray {
    Int32(Vec<i32>),
    Word32(Vec<u32>),
    Float64(Vec<f64>),
    Complex128(Vec<Complex>),
}

impl NumArray {
    pub fn len(&self) -> usize {
        match self {
            NumArray::Int32(v) => v.len(),
            NumArray::Word32(v) => v.len(),
            NumArray::Float64(v) => v.len(),
            NumArray::Complex128(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `i` as a scalar [`Data`].
    pub fn get(&self, i: usize) -> Option<Data> {
        match self {
            NumArray::Int32(v) => v.get(i).map(|&x| Data::Int(x as i64)),
            NumArray::Word32(v) => v.get(i).map(|&x| Data::Word(x as u64)),
            NumArray::Float64(v) => v.get(i).map(|&x| Data::Float(x)),
            NumArray::Complex128(v) => v.get(i).map(|&x| Data::Complex(x)),
        }
    }

    fn scalars(&self) -> Vec<Data> {
        (0..self.len()).filter_map(|i| self.get(i)).collect()
    }
}

/// Error value carried on the wire as `E` / `E<payload>`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub code: i32,
    pub message: String,
    pub payload: Option<Box<Data>>,
}

impl RemoteError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        RemoteError {
            code,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Data) -> Self {
        self.payload = Some(Box::new(payload));
        self
    }
}

/// A native value.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    None,
    Bool(bool),
    /// Signed integer; defaults to `i`, or `w` when only the unsigned range fits.
    Int(i64),
    /// Explicitly unsigned integer; defaults to `w`.
    Word(u64),
    Bytes(Vec<u8>),
    /// Text; flattened as its UTF-8 bytes.
    Text(String),
    Time(DateTime<Utc>),
    Float(f64),
    Complex(Complex),
    /// Magnitude with a non-empty unit label. Build with [`Data::value`].
    Value(f64, String),
    /// Complex magnitude with a non-empty unit label. Build with [`Data::complex_value`].
    ComplexValue(Complex, String),
    /// Fixed-arity heterogeneous group.
    Tuple(Vec<Data>),
    /// Variable-length ordered sequence.
    List(Vec<Data>),
    Array(NumArray),
    /// Magnitudes sharing one non-empty unit label. Build with [`Data::value_array`].
    ValueArray(Vec<f64>, String),
    Error(RemoteError),
}

impl Data {
    /// Unit-bearing scalar; an empty unit yields a plain [`Data::Float`].
    pub fn value(magnitude: f64, unit: &str) -> Self {
        if unit.is_empty() {
            Data::Float(magnitude)
        } else {
            Data::Value(magnitude, unit.to_string())
        }
    }

    pub fn complex_value(c: Complex, unit: &str) -> Self {
        if unit.is_empty() {
            Data::Complex(c)
        } else {
            Data::ComplexValue(c, unit.to_string())
        }
    }

    /// Unit-bearing array; an empty unit yields a plain `Float64` array.
    pub fn value_array(magnitudes: Vec<f64>, unit: &str) -> Self {
        if unit.is_empty() {
            Data::Array(NumArray::Float64(magnitudes))
        } else {
            Data::ValueArray(magnitudes, unit.to_string())
        }
    }

    /// Short description used in error messages.
    pub fn kind(&self) -> String {
        match self {
            Data::None => "none".to_string(),
            Data::Bool(b) => format!("bool {}", b),
            Data::Int(n) => format!("integer {}", n),
            Data::Word(n) => format!("unsigned integer {}", n),
            Data::Bytes(b) => format!("bytes of length {}", b.len()),
            Data::Text(s) => format!("text of length {}", s.len()),
            Data::Time(t) => format!("time {}", t),
            Data::Float(x) => format!("number {}", x),
            Data::Complex(c) => format!("complex {}{:+}j", c.re, c.im),
            Data::Value(x, u) => format!("value {} [{}]", x, u),
            Data::ComplexValue(c, u) => format!("complex value {}{:+}j [{}]", c.re, c.im, u),
            Data::Tuple(items) => format!("tuple of {}", items.len()),
            Data::List(items) => format!("list of {}", items.len()),
            Data::Array(a) => format!("numeric array of {}", a.len()),
            Data::ValueArray(v, u) => format!("value array of {} [{}]", v.len(), u),
            Data::Error(e) => format!("error {}", e.code),
        }
    }

    /// Items of a list-like value (sequence, numeric array, value array).
    pub fn items(&self) -> Option<Vec<Cow<'_, Data>>> {
        match self {
            Data::List(items) => Some(items.iter().map(Cow::Borrowed).collect()),
            Data::Array(a) => Some(a.scalars().into_iter().map(Cow::Owned).collect()),
            Data::ValueArray(v, u) => Some(
                v.iter()
                    .map(|&x| Cow::Owned(Data::Value(x, u.clone())))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Walk a list of `depth` dimensions: per-dimension lengths and the leaves in row-major order.
    pub fn grid(&self, depth: u8) -> Result<Grid<'_>, GridError> {
        let mut grid = Grid {
            shape: Vec::with_capacity(depth as usize),
            leaves: Vec::new(),
        };
        walk_grid(self, depth as usize, 0, &mut grid)?;
        grid.shape.resize(depth as usize, 0);
        Ok(grid)
    }
}

/// Rectangular view of nested list data.
#[derive(Debug)]
pub struct Grid<'a> {
    pub shape: Vec<usize>,
    pub leaves: Vec<Cow<'a, Data>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// Not list-like at the given nesting level.
    NotASequence { level: usize },
    Ragged {
        level: usize,
        first: usize,
        other: usize,
    },
}

fn walk_grid<'a>(
    data: &'a Data,
    depth: usize,
    level: usize,
    grid: &mut Grid<'a>,
) -> Result<(), GridError> {
    let items = data.items().ok_or(GridError::NotASequence { level })?;
    match grid.shape.get(level) {
        None => grid.shape.push(items.len()),
        Some(&first) if first != items.len() => {
            return Err(GridError::Ragged {
                level,
                first,
                other: items.len(),
            })
        }
        Some(_) => {}
    }
    if level + 1 == depth {
        grid.leaves.extend(items);
        return Ok(());
    }
    for item in items {
        match item {
            Cow::Borrowed(inner) => walk_grid(inner, depth, level + 1, grid)?,
            Cow::Owned(_) => return Err(GridError::NotASequence { level: level + 1 }),
        }
    }
    Ok(())
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Data::Bool(b)
    }
}

impl From<i32> for Data {
    fn from(n: i32) -> Self {
        Data::Int(n as i64)
    }
}

impl From<i64> for Data {
    fn from(n: i64) -> Self {
        Data::Int(n)
    }
}

impl From<u32> for Data {
    fn from(n: u32) -> Self {
        Data::Word(n as u64)
    }
}

impl From<u64> for Data {
    fn from(n: u64) -> Self {
        Data::Word(n)
    }
}

impl From<f64> for Data {
    fn from(x: f64) -> Self {
        Data::Float(x)
    }
}

impl From<Complex> for Data {
    fn from(c: Complex) -> Self {
        Data::Complex(c)
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::Text(s.to_string())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::Text(s)
    }
}

impl From<&[u8]> for Data {
    fn from(b: &[u8]) -> Self {
        Data::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<[u8; N]> for Data {
    fn from(b: [u8; N]) -> Self {
        Data::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Data {
    fn from(b: &[u8; N]) -> Self {
        Data::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Data {
    fn from(b: Vec<u8>) -> Self {
        Data::Bytes(b)
    }
}

impl From<Box<[u8]>> for Data {
    fn from(b: Box<[u8]>) -> Self {
        Data::Bytes(b.into_vec())
    }
}

impl From<Cow<'_, [u8]>> for Data {
    fn from(b: Cow<'_, [u8]>) -> Self {
        Data::Bytes(b.into_owned())
    }
}

impl From<DateTime<Utc>> for Data {
    fn from(t: DateTime<Utc>) -> Self {
        Data::Time(t)
    }
}

impl From<NumArray> for Data {
    fn from(a: NumArray) -> Self {
        Data::Array(a)
    }
}

impl From<RemoteError> for Data {
    fn from(e: RemoteError) -> Self {
        Data::Error(e)
    }
}

impl From<Option<Data>> for Data {
    fn from(d: Option<Data>) -> Self {
        d.unwrap_or(Data::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_of_nested_lists() {
        let data = Data::List(vec![
            Data::List(vec![Data::Int(1), Data::Int(2)]),
            Data::List(vec![Data::Int(3), Data::Int(4)]),
        ]);
        let grid = data.grid(2).unwrap();
        assert_eq!(grid.shape, vec![2, 2]);
        assert_eq!(grid.leaves.len(), 4);
        assert_eq!(*grid.leaves[2], Data::Int(3));
    }

    #[test]
    fn grid_pads_shape_of_empty_lists() {
        assert_eq!(Data::List(vec![]).grid(3).unwrap().shape, vec![0, 0, 0]);
        let nested_empty = Data::List(vec![Data::List(vec![])]);
        assert_eq!(nested_empty.grid(2).unwrap().shape, vec![1, 0]);
    }

    #[test]
    fn grid_rejects_ragged_and_scalars() {
        let ragged = Data::List(vec![
            Data::List(vec![Data::Int(1)]),
            Data::List(vec![Data::Int(1), Data::Int(2)]),
        ]);
        assert_eq!(
            ragged.grid(2).unwrap_err(),
            GridError::Ragged { level: 1, first: 1, other: 2 }
        );
        let flat = Data::List(vec![Data::Int(1)]);
        assert_eq!(flat.grid(2).unwrap_err(), GridError::NotASequence { level: 1 });
    }

    #[test]
    fn empty_unit_is_dimensionless() {
        assert_eq!(Data::value(6.0, ""), Data::Float(6.0));
        assert_eq!(
            Data::value_array(vec![1.0, 2.0], ""),
            Data::Array(NumArray::Float64(vec![1.0, 2.0]))
        );
        assert_eq!(Data::value(7.0, "ms"), Data::Value(7.0, "ms".into()));
    }
}
