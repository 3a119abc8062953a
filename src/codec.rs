//! Flatten/unflatten native values to and from the LabRAD binary layout.
//!
//! Layout (integers and doubles in the codec's endianness):
//! - `_`: nothing. `b`: one byte, 0 or 1. `i` / `w`: 4 bytes.
//! - `s`: u32 length, then the raw bytes.
//! - `t`: i64 seconds since 1904-01-01 UTC, then u64 fraction of a second in units of 2^-64.
//! - `v`: f64. `c`: f64 real, f64 imaginary.
//! - Cluster: members back to back.
//! - List of depth d: d i32 lengths (outermost first), then the elements in row-major order.
//! - `E`: i32 code, message as `s`; `E<payload>` adds a present byte (0/1) and the payload.

use crate::ast::{Hint, Type, Unit};
use crate::error::{FlatteningError, UnflatteningError};
use crate::resolve::{check_int, check_word, grid_error, integer, resolve_with};
use crate::specialize::specialize;
use crate::units::{StandardUnits, Units};
use crate::value::{Complex, Data, NumArray, RemoteError};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};
use log::trace;
use std::io::{self, Cursor, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Seconds from 1904-01-01T00:00:00Z to the Unix epoch.
const EPOCH_OFFSET: i64 = 2_082_844_800;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Cap on decoded list cells that consume no input, e.g. `*_` rows or `*(_)` elements,
/// summed over one `unflatten` call.
pub const MAX_UNBACKED_CELLS: usize = 1 << 20;

struct DecodeContext {
    /// Unbacked list cells still allowed.
    unbacked: usize,
}

/// Codec configuration: byte order and the unit table used during hint resolution.
#[derive(Debug)]
pub struct Codec {
    pub endianness: Endianness,
    units: Box<dyn Units>,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(Endianness::default())
    }
}

impl Codec {
    pub fn new(endianness: Endianness) -> Self {
        Codec {
            endianness,
            units: Box::new(StandardUnits::default()),
        }
    }

    pub fn with_units(mut self, units: impl Units + 'static) -> Self {
        self.units = Box::new(units);
        self
    }

    pub fn units(&self) -> &dyn Units {
        self.units.as_ref()
    }

    /// Type `data` would be flattened as: hint resolution (or inference) followed by specialization.
    pub fn resolve(&self, data: &Data, hints: &[Hint]) -> Result<Type, FlatteningError> {
        let ty = resolve_with(data, hints, self.units())?;
        specialize(data, &ty)
    }

    /// Flatten `data`, steering the type with `hints` (tried in order; none means infer).
    pub fn flatten(&self, data: &Data, hints: &[Hint]) -> Result<(Vec<u8>, Type), FlatteningError> {
        let ty = self.resolve(data, hints)?;
        let bytes = self.flatten_as(data, &ty)?;
        Ok((bytes, ty))
    }

    /// Flatten `data` as exactly `ty`, with no resolution step.
    pub fn flatten_as(&self, data: &Data, ty: &Type) -> Result<Vec<u8>, FlatteningError> {
        let mut out = Vec::new();
        self.encode(&mut out, ty, data)?;
        Ok(out)
    }

    /// Stream `data` as exactly `ty` into `w`. Bytes already written stay written on failure.
    pub fn flatten_into<W: Write>(
        &self,
        w: &mut W,
        data: &Data,
        ty: &Type,
    ) -> Result<(), FlatteningError> {
        self.encode(w, ty, data)
    }

    /// Rebuild a value of type `ty`. The whole buffer must be consumed.
    pub fn unflatten(&self, bytes: &[u8], ty: &Type) -> Result<Data, UnflatteningError> {
        let mut cursor = Cursor::new(bytes);
        let mut ctx = DecodeContext {
            unbacked: MAX_UNBACKED_CELLS,
        };
        let data = self.decode(&mut cursor, &mut ctx, ty)?;
        let rest = remaining(&cursor);
        if rest > 0 {
            return Err(UnflatteningError::TrailingBytes(rest, ty.to_string()));
        }
        Ok(data)
    }

    fn encode<W: Write>(&self, w: &mut W, ty: &Type, data: &Data) -> Result<(), FlatteningError> {
        trace!("encode {} as '{}'", data.kind(), ty);
        let mismatch = || FlatteningError::Mismatch {
            expected: ty.to_string(),
            found: data.kind(),
        };
        match ty {
            Type::None => match data {
                Data::None => Ok(()),
                _ => Err(mismatch()),
            },
            Type::Bool => match data {
                Data::Bool(b) => {
                    w.write_u8(*b as u8)?;
                    Ok(())
                }
                _ => Err(mismatch()),
            },
            Type::Int => {
                let n = check_int(integer(data).ok_or_else(mismatch)?)?;
                self.write_i32(w, n)?;
                Ok(())
            }
            Type::Word => {
                let n = check_word(integer(data).ok_or_else(mismatch)?)?;
                self.write_u32(w, n)?;
                Ok(())
            }
            Type::Str => match data {
                Data::Bytes(b) => self.write_str(w, b),
                Data::Text(s) => self.write_str(w, s.as_bytes()),
                _ => Err(mismatch()),
            },
            Type::Time => match data {
                Data::Time(t) => {
                    let (seconds, fraction) = to_wire_time(t);
                    self.write_i64(w, seconds)?;
                    self.write_u64(w, fraction)?;
                    Ok(())
                }
                _ => Err(mismatch()),
            },
            Type::Value(unit) => {
                let (x, label) = match data {
                    Data::Float(x) => (*x, ""),
                    Data::Int(n) => (*n as f64, ""),
                    Data::Word(n) => (*n as f64, ""),
                    Data::Value(x, label) => (*x, label.as_str()),
                    _ => return Err(mismatch()),
                };
                check_unit(ty, unit, label)?;
                self.write_f64(w, x)?;
                Ok(())
            }
            Type::Complex(unit) => {
                let (c, label) = match data {
                    Data::Complex(c) => (*c, ""),
                    Data::Float(x) => (Complex::new(*x, 0.0), ""),
                    Data::Int(n) => (Complex::new(*n as f64, 0.0), ""),
                    Data::Word(n) => (Complex::new(*n as f64, 0.0), ""),
                    Data::ComplexValue(c, label) => (*c, label.as_str()),
                    Data::Value(x, label) => (Complex::new(*x, 0.0), label.as_str()),
                    _ => return Err(mismatch()),
                };
                check_unit(ty, unit, label)?;
                self.write_f64(w, c.re)?;
                self.write_f64(w, c.im)?;
                Ok(())
            }
            Type::Cluster(members) => match data {
                Data::Tuple(items) if items.len() == members.len() => {
                    for (t, d) in members.iter().zip(items) {
                        self.encode(w, t, d)?;
                    }
                    Ok(())
                }
                Data::Tuple(items) => Err(FlatteningError::ArityMismatch {
                    expected: ty.to_string(),
                    arity: members.len(),
                    found: items.len(),
                }),
                _ => Err(mismatch()),
            },
            Type::List { elem, depth } => {
                let grid = data
                    .grid(*depth)
                    .map_err(|e| grid_error(e, *depth, data))?;
                for &len in &grid.shape {
                    let n = i32::try_from(len).map_err(|_| FlatteningError::OutOfRange {
                        value: len as i128,
                        target: "i",
                    })?;
                    self.write_i32(w, n)?;
                }
                match elem {
                    Some(e) => {
                        for leaf in &grid.leaves {
                            self.encode(w, e, leaf)?;
                        }
                    }
                    None if grid.leaves.is_empty() => {}
                    None => return Err(FlatteningError::Unresolved(ty.to_string())),
                }
                Ok(())
            }
            Type::Error(payload) => match data {
                Data::Error(e) => {
                    self.write_i32(w, e.code)?;
                    self.write_str(w, e.message.as_bytes())?;
                    match (payload, &e.payload) {
                        (None, None) => {}
                        (None, Some(_)) => return Err(mismatch()),
                        (Some(_), None) => {
                            w.write_u8(0)?;
                        }
                        (Some(t), Some(p)) => {
                            w.write_u8(1)?;
                            self.encode(w, t, p)?;
                        }
                    }
                    Ok(())
                }
                _ => Err(mismatch()),
            },
        }
    }

    fn decode(
        &self,
        r: &mut Cursor<&[u8]>,
        ctx: &mut DecodeContext,
        ty: &Type,
    ) -> Result<Data, UnflatteningError> {
        trace!("decode '{}' at offset {}", ty, r.position());
        Ok(match ty {
            Type::None => Data::None,
            Type::Bool => match r.read_u8()? {
                0 => Data::Bool(false),
                1 => Data::Bool(true),
                b => return Err(UnflatteningError::InvalidBool(b)),
            },
            Type::Int => Data::Int(self.read_i32(r)? as i64),
            Type::Word => Data::Word(self.read_u32(r)? as u64),
            Type::Str => Data::Bytes(self.read_str(r)?),
            Type::Time => {
                let seconds = self.read_i64(r)?;
                let fraction = self.read_u64(r)?;
                Data::Time(from_wire_time(seconds, fraction)?)
            }
            Type::Value(unit) => Data::value(self.read_f64(r)?, unit.label().unwrap_or("")),
            Type::Complex(unit) => {
                let re = self.read_f64(r)?;
                let im = self.read_f64(r)?;
                Data::complex_value(Complex::new(re, im), unit.label().unwrap_or(""))
            }
            Type::Cluster(members) => Data::Tuple(
                members
                    .iter()
                    .map(|t| self.decode(r, ctx, t))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Type::List { elem, depth } => self.decode_list(r, ctx, elem.as_deref(), *depth)?,
            Type::Error(payload) => {
                let code = self.read_i32(r)?;
                let message = String::from_utf8_lossy(&self.read_str(r)?).into_owned();
                let mut e = RemoteError::new(code, message);
                if let Some(t) = payload {
                    match r.read_u8()? {
                        0 => {}
                        1 => e.payload = Some(Box::new(self.decode(r, ctx, t)?)),
                        b => return Err(UnflatteningError::InvalidFlag(b)),
                    }
                }
                Data::Error(e)
            }
        })
    }

    fn decode_list(
        &self,
        r: &mut Cursor<&[u8]>,
        ctx: &mut DecodeContext,
        elem: Option<&Type>,
        depth: u8,
    ) -> Result<Data, UnflatteningError> {
        let mut shape = Vec::with_capacity(depth as usize);
        for _ in 0..depth {
            let n = self.read_i32(r)?;
            shape.push(usize::try_from(n).map_err(|_| UnflatteningError::NegativeLength(n))?);
        }
        let too_large = || UnflatteningError::TooLarge(shape.clone());
        let total = cells(&shape).ok_or_else(too_large)?;
        // Zero-sized elements and the inner lists of an empty grid cost no input bytes.
        let rows = cells(&shape[..shape.len().saturating_sub(1)]).ok_or_else(too_large)?;
        let free = total == 0 || elem.map_or(true, |e| min_size(e) == 0);
        if free {
            ctx.unbacked = ctx
                .unbacked
                .checked_sub(total.max(rows))
                .ok_or_else(too_large)?;
        }
        let elem = match elem {
            Some(e) => e,
            None if total == 0 => return Ok(nest(Vec::new(), &shape)),
            None => return Err(UnflatteningError::UnknownElement(total)),
        };
        if total.saturating_mul(min_size(elem)) > remaining(r) {
            return Err(truncated(format!("list of shape {:?} of '{}'", shape, elem)));
        }
        if depth == 1 {
            if let Some(array) = self.decode_array(r, elem, total)? {
                return Ok(array);
            }
        }
        let mut leaves = Vec::with_capacity(total.min(remaining(r)));
        for _ in 0..total {
            leaves.push(self.decode(r, ctx, elem)?);
        }
        Ok(nest(leaves, &shape))
    }

    /// Depth-1 numeric lists decode straight into arrays.
    fn decode_array(
        &self,
        r: &mut Cursor<&[u8]>,
        elem: &Type,
        n: usize,
    ) -> Result<Option<Data>, UnflatteningError> {
        Ok(Some(match elem {
            Type::Int => {
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.read_i32(r)?);
                }
                Data::Array(NumArray::Int32(v))
            }
            Type::Word => {
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.read_u32(r)?);
                }
                Data::Array(NumArray::Word32(v))
            }
            Type::Value(unit) => {
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    v.push(self.read_f64(r)?);
                }
                Data::value_array(v, unit.label().unwrap_or(""))
            }
            Type::Complex(Unit::Unspecified | Unit::Empty) => {
                let mut v = Vec::with_capacity(n);
                for _ in 0..n {
                    let re = self.read_f64(r)?;
                    let im = self.read_f64(r)?;
                    v.push(Complex::new(re, im));
                }
                Data::Array(NumArray::Complex128(v))
            }
            _ => return Ok(None),
        }))
    }

    fn write_str<W: Write>(&self, w: &mut W, bytes: &[u8]) -> Result<(), FlatteningError> {
        let len = u32::try_from(bytes.len()).map_err(|_| FlatteningError::OutOfRange {
            value: bytes.len() as i128,
            target: "w",
        })?;
        self.write_u32(w, len)?;
        w.write_all(bytes)?;
        Ok(())
    }

    fn read_str(&self, r: &mut Cursor<&[u8]>) -> Result<Vec<u8>, UnflatteningError> {
        let len = self.read_u32(r)? as usize;
        if len > remaining(r) {
            return Err(truncated(format!("string of length {}", len)));
        }
        let mut buf = vec![0u8; len];
        r.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_i32(&self, r: &mut Cursor<&[u8]>) -> Result<i32, UnflatteningError> {
        Ok(match self.endianness {
            Endianness::Big => r.read_i32::<BigEndian>()?,
            Endianness::Little => r.read_i32::<LittleEndian>()?,
        })
    }
    fn read_u32(&self, r: &mut Cursor<&[u8]>) -> Result<u32, UnflatteningError> {
        Ok(match self.endianness {
            Endianness::Big => r.read_u32::<BigEndian>()?,
            Endianness::Little => r.read_u32::<LittleEndian>()?,
        })
    }
    fn read_i64(&self, r: &mut Cursor<&[u8]>) -> Result<i64, UnflatteningError> {
        Ok(match self.endianness {
            Endianness::Big => r.read_i64::<BigEndian>()?,
            Endianness::Little => r.read_i64::<LittleEndian>()?,
        })
    }
    fn read_u64(&self, r: &mut Cursor<&[u8]>) -> Result<u64, UnflatteningError> {
        Ok(match self.endianness {
            Endianness::Big => r.read_u64::<BigEndian>()?,
            Endianness::Little => r.read_u64::<LittleEndian>()?,
        })
    }
    fn read_f64(&self, r: &mut Cursor<&[u8]>) -> Result<f64, UnflatteningError> {
        Ok(match self.endianness {
            Endianness::Big => r.read_f64::<BigEndian>()?,
            Endianness::Little => r.read_f64::<LittleEndian>()?,
        })
    }

    fn write_i32<W: Write>(&self, w: &mut W, v: i32) -> Result<(), FlatteningError> {
        match self.endianness {
            Endianness::Big => w.write_i32::<BigEndian>(v)?,
            Endianness::Little => w.write_i32::<LittleEndian>(v)?,
        }
        Ok(())
    }
    fn write_u32<W: Write>(&self, w: &mut W, v: u32) -> Result<(), FlatteningError> {
        match self.endianness {
            Endianness::Big => w.write_u32::<BigEndian>(v)?,
            Endianness::Little => w.write_u32::<LittleEndian>(v)?,
        }
        Ok(())
    }
    fn write_i64<W: Write>(&self, w: &mut W, v: i64) -> Result<(), FlatteningError> {
        match self.endianness {
            Endianness::Big => w.write_i64::<BigEndian>(v)?,
            Endianness::Little => w.write_i64::<LittleEndian>(v)?,
        }
        Ok(())
    }
    fn write_u64<W: Write>(&self, w: &mut W, v: u64) -> Result<(), FlatteningError> {
        match self.endianness {
            Endianness::Big => w.write_u64::<BigEndian>(v)?,
            Endianness::Little => w.write_u64::<LittleEndian>(v)?,
        }
        Ok(())
    }
    fn write_f64<W: Write>(&self, w: &mut W, v: f64) -> Result<(), FlatteningError> {
        match self.endianness {
            Endianness::Big => w.write_f64::<BigEndian>(v)?,
            Endianness::Little => w.write_f64::<LittleEndian>(v)?,
        }
        Ok(())
    }
}

/// Data labelled `label` may only be written under exactly that unit; no conversion happens here.
fn check_unit(ty: &Type, unit: &Unit, label: &str) -> Result<(), FlatteningError> {
    match unit {
        Unit::Named(want) if want == label => Ok(()),
        Unit::Empty if label.is_empty() => Ok(()),
        Unit::Unspecified if label.is_empty() => Ok(()),
        Unit::Unspecified => Err(FlatteningError::Unresolved(ty.to_string())),
        Unit::Named(want) => Err(FlatteningError::UnitMismatch {
            expected: want.clone(),
            found: label.to_string(),
        }),
        Unit::Empty => Err(FlatteningError::UnitMismatch {
            expected: String::new(),
            found: label.to_string(),
        }),
    }
}

/// Lower bound on the encoded size of one value of `ty`.
fn min_size(ty: &Type) -> usize {
    match ty {
        Type::None => 0,
        Type::Bool => 1,
        Type::Int | Type::Word | Type::Str => 4,
        Type::Value(_) => 8,
        Type::Time | Type::Complex(_) => 16,
        Type::Cluster(members) => members.iter().map(min_size).sum(),
        Type::List { depth, .. } => 4 * *depth as usize,
        Type::Error(payload) => 8 + payload.as_ref().map_or(0, |_| 1),
    }
}

fn cells(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

fn remaining(r: &Cursor<&[u8]>) -> usize {
    r.get_ref().len().saturating_sub(r.position() as usize)
}

fn truncated(what: String) -> UnflatteningError {
    UnflatteningError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("buffer too short for {}", what),
    ))
}

/// Rebuild nested lists of `shape` from row-major leaves.
fn nest(leaves: Vec<Data>, shape: &[usize]) -> Data {
    match shape {
        [n, rest @ ..] if !rest.is_empty() => {
            let chunk: usize = rest.iter().product();
            let mut it = leaves.into_iter();
            Data::List(
                (0..*n)
                    .map(|_| nest(it.by_ref().take(chunk).collect(), rest))
                    .collect(),
            )
        }
        _ => Data::List(leaves),
    }
}

fn to_wire_time(t: &DateTime<Utc>) -> (i64, u64) {
    let nanos = (t.timestamp_subsec_nanos() as u128).min(NANOS_PER_SECOND - 1);
    let fraction = (nanos << 64) / NANOS_PER_SECOND;
    (t.timestamp() + EPOCH_OFFSET, fraction as u64)
}

fn from_wire_time(seconds: i64, fraction: u64) -> Result<DateTime<Utc>, UnflatteningError> {
    let invalid = || UnflatteningError::InvalidTime { seconds, fraction };
    let nanos = (fraction as u128 * NANOS_PER_SECOND + (1u128 << 63)) >> 64;
    let (carry, nanos) = if nanos >= NANOS_PER_SECOND {
        (1, nanos - NANOS_PER_SECOND)
    } else {
        (0, nanos)
    };
    let unix = seconds
        .checked_sub(EPOCH_OFFSET)
        .and_then(|s| s.checked_add(carry))
        .ok_or_else(invalid)?;
    DateTime::from_timestamp(unix, nanos as u32).ok_or_else(invalid)
}
