//! Decoder for numpy arrays serialized with `pickle` (what `ndarray.dump` writes).
//!
//! The opcode stream is evaluated into a [`Value`] tree without executing
//! anything; callables stay symbolic (`Global`, `Reduce`, `Build`) and the
//! ndarray reconstruction pattern is recognised afterwards.

use std::collections::HashMap;

use crate::input::array::{ArrayError, DType, NdArray, element_count};

pub const PROTO: u8 = 0x80;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dict(Vec<(Value, Value)>),
    Global { module: String, name: String },
    Reduce { callable: Box<Value>, args: Box<Value> },
    Build { object: Box<Value>, state: Box<Value> },
}

impl Value {
    fn is_global(&self, wanted: &str) -> bool {
        matches!(self, Value::Global { name, .. } if name == wanted)
    }
}

pub fn parse_pickle(bytes: &[u8]) -> Result<NdArray, ArrayError> {
    let value = Machine::new(bytes).run()?;
    ndarray_from_value(&value)
}

fn err(msg: impl Into<String>) -> ArrayError {
    ArrayError::Pickle(msg.into())
}

struct Machine<'a> {
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<Value>,
    marks: Vec<usize>,
    memo: HashMap<u32, Value>,
}

impl<'a> Machine<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            stack: Vec::new(),
            marks: Vec::new(),
            memo: HashMap::new(),
        }
    }

    fn run(mut self) -> Result<Value, ArrayError> {
        loop {
            let op = self.take_u8()?;
            match op {
                PROTO => {
                    let version = self.take_u8()?;
                    if version > 5 {
                        return Err(err(format!("unsupported protocol {version}")));
                    }
                }
                // FRAME
                0x95 => {
                    self.take(8)?;
                }
                b'.' => return self.pop(),

                b'N' => self.stack.push(Value::None),
                0x88 => self.stack.push(Value::Bool(true)),
                0x89 => self.stack.push(Value::Bool(false)),
                b'J' => {
                    let raw = self.take_array::<4>()?;
                    self.stack.push(Value::Int(i32::from_le_bytes(raw) as i64));
                }
                b'K' => {
                    let v = self.take_u8()?;
                    self.stack.push(Value::Int(v as i64));
                }
                b'M' => {
                    let raw = self.take_array::<2>()?;
                    self.stack.push(Value::Int(u16::from_le_bytes(raw) as i64));
                }
                // LONG1
                0x8a => {
                    let n = self.take_u8()? as usize;
                    let v = self.take_long(n)?;
                    self.stack.push(Value::Int(v));
                }
                b'G' => {
                    let raw = self.take_array::<8>()?;
                    self.stack.push(Value::Float(f64::from_be_bytes(raw)));
                }

                // SHORT_BINUNICODE / BINUNICODE / BINUNICODE8
                0x8c => {
                    let n = self.take_u8()? as usize;
                    let s = self.take_utf8(n)?;
                    self.stack.push(Value::Str(s));
                }
                b'X' => {
                    let n = u32::from_le_bytes(self.take_array::<4>()?) as usize;
                    let s = self.take_utf8(n)?;
                    self.stack.push(Value::Str(s));
                }
                0x8d => {
                    let n = self.take_len8()?;
                    let s = self.take_utf8(n)?;
                    self.stack.push(Value::Str(s));
                }
                // SHORT_BINBYTES / BINBYTES / BINBYTES8, and python 2 byte strings
                b'C' | b'U' => {
                    let n = self.take_u8()? as usize;
                    let b = self.take(n)?.to_vec();
                    self.stack.push(Value::Bytes(b));
                }
                b'B' | b'T' => {
                    let n = u32::from_le_bytes(self.take_array::<4>()?) as usize;
                    let b = self.take(n)?.to_vec();
                    self.stack.push(Value::Bytes(b));
                }
                0x8e => {
                    let n = self.take_len8()?;
                    let b = self.take(n)?.to_vec();
                    self.stack.push(Value::Bytes(b));
                }

                b'(' => self.marks.push(self.stack.len()),
                b')' => self.stack.push(Value::Tuple(Vec::new())),
                b't' => {
                    let items = self.pop_mark()?;
                    self.stack.push(Value::Tuple(items));
                }
                0x85 | 0x86 | 0x87 => {
                    let n = (op - 0x84) as usize;
                    let items = self.pop_n(n)?;
                    self.stack.push(Value::Tuple(items));
                }
                b']' => self.stack.push(Value::List(Vec::new())),
                b'l' => {
                    let items = self.pop_mark()?;
                    self.stack.push(Value::List(items));
                }
                b'a' => {
                    let item = self.pop()?;
                    self.extend_list(vec![item])?;
                }
                b'e' => {
                    let items = self.pop_mark()?;
                    self.extend_list(items)?;
                }
                b'}' => self.stack.push(Value::Dict(Vec::new())),
                b's' => {
                    let value = self.pop()?;
                    let key = self.pop()?;
                    self.extend_dict(vec![key, value])?;
                }
                b'u' => {
                    let items = self.pop_mark()?;
                    self.extend_dict(items)?;
                }

                b'c' => {
                    let module = self.take_line()?;
                    let name = self.take_line()?;
                    self.stack.push(Value::Global { module, name });
                }
                // STACK_GLOBAL
                0x93 => {
                    let name = self.pop()?;
                    let module = self.pop()?;
                    match (module, name) {
                        (Value::Str(module), Value::Str(name)) => {
                            self.stack.push(Value::Global { module, name })
                        }
                        _ => return Err(err("STACK_GLOBAL expects two strings")),
                    }
                }
                // REDUCE / NEWOBJ
                b'R' | 0x81 => {
                    let args = self.pop()?;
                    let callable = self.pop()?;
                    self.stack.push(Value::Reduce {
                        callable: Box::new(callable),
                        args: Box::new(args),
                    });
                }
                b'b' => {
                    let state = self.pop()?;
                    let object = self.pop()?;
                    self.stack.push(Value::Build {
                        object: Box::new(object),
                        state: Box::new(state),
                    });
                }

                b'q' => {
                    let idx = self.take_u8()? as u32;
                    self.memo_put(idx)?;
                }
                b'r' => {
                    let idx = u32::from_le_bytes(self.take_array::<4>()?);
                    self.memo_put(idx)?;
                }
                // MEMOIZE
                0x94 => {
                    let idx = self.memo.len() as u32;
                    self.memo_put(idx)?;
                }
                b'h' => {
                    let idx = self.take_u8()? as u32;
                    self.memo_get(idx)?;
                }
                b'j' => {
                    let idx = u32::from_le_bytes(self.take_array::<4>()?);
                    self.memo_get(idx)?;
                }

                b'0' => {
                    self.pop()?;
                }
                b'1' => {
                    self.pop_mark()?;
                }
                b'2' => {
                    let top = self.stack.last().cloned().ok_or_else(|| err("DUP on empty stack"))?;
                    self.stack.push(top);
                }

                other => {
                    return Err(err(format!(
                        "unsupported opcode 0x{other:02x} at offset {}",
                        self.pos - 1
                    )));
                }
            }
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ArrayError> {
        let bytes = self.bytes;
        let end = self.pos.checked_add(n).filter(|&end| end <= bytes.len());
        match end {
            Some(end) => {
                let out = &bytes[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(ArrayError::Truncated {
                offset: self.pos,
                needed: n,
                available: bytes.len() - self.pos,
            }),
        }
    }

    fn take_u8(&mut self) -> Result<u8, ArrayError> {
        Ok(self.take(1)?[0])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ArrayError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn take_len8(&mut self) -> Result<usize, ArrayError> {
        let n = u64::from_le_bytes(self.take_array::<8>()?);
        usize::try_from(n).map_err(|_| err("length does not fit in memory"))
    }

    fn take_long(&mut self, n: usize) -> Result<i64, ArrayError> {
        if n == 0 {
            return Ok(0);
        }
        if n > 8 {
            return Err(err(format!("LONG1 of {n} bytes does not fit in i64")));
        }
        let raw = self.take(n)?;
        let mut buf = [0u8; 8];
        buf[..n].copy_from_slice(raw);
        if raw[n - 1] & 0x80 != 0 {
            buf[n..].fill(0xff);
        }
        Ok(i64::from_le_bytes(buf))
    }

    fn take_utf8(&mut self, n: usize) -> Result<String, ArrayError> {
        let raw = self.take(n)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| err("invalid utf-8 in unicode string"))
    }

    fn take_line(&mut self) -> Result<String, ArrayError> {
        let rest = &self.bytes[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| err("unterminated GLOBAL name"))?;
        let line = std::str::from_utf8(&rest[..end])
            .map_err(|_| err("invalid utf-8 in GLOBAL name"))?
            .to_string();
        self.pos += end + 1;
        Ok(line)
    }

    fn pop(&mut self) -> Result<Value, ArrayError> {
        let floor = self.marks.last().copied().unwrap_or(0);
        if self.stack.len() <= floor {
            return Err(err("stack underflow"));
        }
        self.stack.pop().ok_or_else(|| err("stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, ArrayError> {
        let floor = self.marks.last().copied().unwrap_or(0);
        if self.stack.len() < floor + n {
            return Err(err("stack underflow"));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn pop_mark(&mut self) -> Result<Vec<Value>, ArrayError> {
        let mark = self.marks.pop().ok_or_else(|| err("no MARK on stack"))?;
        Ok(self.stack.split_off(mark))
    }

    fn extend_list(&mut self, items: Vec<Value>) -> Result<(), ArrayError> {
        match self.stack.last_mut() {
            Some(Value::List(list)) => {
                list.extend(items);
                Ok(())
            }
            _ => Err(err("APPEND target is not a list")),
        }
    }

    fn extend_dict(&mut self, items: Vec<Value>) -> Result<(), ArrayError> {
        if items.len() % 2 != 0 {
            return Err(err("SETITEMS with odd item count"));
        }
        match self.stack.last_mut() {
            Some(Value::Dict(entries)) => {
                let mut iter = items.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    entries.push((k, v));
                }
                Ok(())
            }
            _ => Err(err("SETITEM target is not a dict")),
        }
    }

    fn memo_put(&mut self, idx: u32) -> Result<(), ArrayError> {
        let top = self
            .stack
            .last()
            .cloned()
            .ok_or_else(|| err("memoize on empty stack"))?;
        self.memo.insert(idx, top);
        Ok(())
    }

    fn memo_get(&mut self, idx: u32) -> Result<(), ArrayError> {
        let value = self
            .memo
            .get(&idx)
            .cloned()
            .ok_or_else(|| err(format!("memo key {idx} not found")))?;
        self.stack.push(value);
        Ok(())
    }
}

/// Recognises `_reconstruct(ndarray, ...)` + BUILD state, or a plain list of numbers.
pub fn ndarray_from_value(value: &Value) -> Result<NdArray, ArrayError> {
    match value {
        Value::Build { object, state } => {
            let Value::Reduce { callable, .. } = object.as_ref() else {
                return Err(err("BUILD target is not a reconstructed object"));
            };
            if !callable.is_global("_reconstruct") {
                return Err(err(format!("unexpected reconstructor {callable:?}")));
            }
            ndarray_from_state(state)
        }
        Value::List(items) | Value::Tuple(items) => {
            let values = items
                .iter()
                .map(scalar_from_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NdArray::vector(values))
        }
        other => Err(err(format!("pickle does not hold an ndarray: {other:?}"))),
    }
}

fn ndarray_from_state(state: &Value) -> Result<NdArray, ArrayError> {
    let Value::Tuple(items) = state else {
        return Err(err("ndarray state is not a tuple"));
    };
    // (version, shape, dtype, is_fortran, data); version is dropped by some writers.
    let items = match items.len() {
        5 => &items[1..],
        4 => &items[..],
        n => return Err(err(format!("ndarray state has {n} fields"))),
    };
    let shape = match &items[0] {
        Value::Tuple(dims) => dims
            .iter()
            .map(|d| match d {
                Value::Int(v) if *v >= 0 => Ok(*v as usize),
                other => Err(err(format!("invalid shape dimension {other:?}"))),
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => return Err(err(format!("invalid shape {other:?}"))),
    };
    let count = element_count(&shape)?;

    let values = match &items[3] {
        Value::List(elements) => elements
            .iter()
            .map(scalar_from_value)
            .collect::<Result<Vec<_>, _>>()?,
        data => {
            let dtype = dtype_from_value(&items[1])?;
            let raw = bytes_from_value(data)?;
            dtype.decode(&raw, count)?
        }
    };
    if values.len() != count {
        return Err(err(format!(
            "ndarray holds {} values but shape {shape:?} needs {count}",
            values.len()
        )));
    }
    Ok(NdArray { shape, values })
}

fn dtype_from_value(value: &Value) -> Result<DType, ArrayError> {
    let (reduce, state) = match value {
        Value::Build { object, state } => (object.as_ref(), Some(state.as_ref())),
        other => (other, None),
    };
    let Value::Reduce { callable, args } = reduce else {
        return Err(err(format!("invalid dtype {value:?}")));
    };
    if !callable.is_global("dtype") {
        return Err(err(format!("invalid dtype constructor {callable:?}")));
    }
    let code = match args.as_ref() {
        Value::Tuple(a) => match a.first() {
            Some(Value::Str(code)) => code.clone(),
            Some(Value::Bytes(code)) => String::from_utf8_lossy(code).into_owned(),
            _ => return Err(err("dtype without type code")),
        },
        _ => return Err(err("dtype arguments are not a tuple")),
    };
    // state: (version, byteorder, subdescr, names, fields, elsize, alignment, flags)
    let endian = match state {
        Some(Value::Tuple(st)) => match st.get(1) {
            Some(Value::Str(order)) => order.chars().next(),
            Some(Value::Bytes(order)) => order.first().map(|&b| b as char),
            _ => None,
        },
        _ => None,
    };
    DType::from_parts(&code, endian)
}

fn bytes_from_value(value: &Value) -> Result<Vec<u8>, ArrayError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        // py2-compatible protocols wrap bytes as _codecs.encode(str, 'latin1')
        Value::Reduce { callable, args } if callable.is_global("encode") => {
            let Value::Tuple(a) = args.as_ref() else {
                return Err(err("encode arguments are not a tuple"));
            };
            match a.first() {
                Some(Value::Str(s)) => latin1_bytes(s),
                Some(Value::Bytes(b)) => Ok(b.clone()),
                _ => Err(err("encode without a string argument")),
            }
        }
        Value::Str(s) => latin1_bytes(s),
        other => Err(err(format!("ndarray data is not bytes: {other:?}"))),
    }
}

fn latin1_bytes(s: &str) -> Result<Vec<u8>, ArrayError> {
    s.chars()
        .map(|c| u8::try_from(c as u32).map_err(|_| err("non latin-1 character in array data")))
        .collect()
}

fn scalar_from_value(value: &Value) -> Result<f64, ArrayError> {
    match value {
        Value::Int(v) => Ok(*v as f64),
        Value::Float(v) => Ok(*v),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        // numpy.core.multiarray.scalar(dtype, data)
        Value::Reduce { callable, args } if callable.is_global("scalar") => {
            let Value::Tuple(a) = args.as_ref() else {
                return Err(err("scalar arguments are not a tuple"));
            };
            if a.len() < 2 {
                return Err(err("scalar needs dtype and data"));
            }
            let dtype = dtype_from_value(&a[0])?;
            let raw = bytes_from_value(&a[1])?;
            dtype
                .decode(&raw, 1)?
                .first()
                .copied()
                .ok_or_else(|| err("empty scalar"))
        }
        other => Err(err(format!("not a numeric value: {other:?}"))),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/pickle.rs"]
mod tests;
