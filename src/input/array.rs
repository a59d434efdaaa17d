use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArrayError {
    #[error("file is empty")]
    Empty,
    #[error("unrecognised array format (expected .npy, pickled ndarray or gzip)")]
    UnknownFormat,
    #[error("truncated data: needed {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("invalid npy header: {0}")]
    Header(String),
    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(String),
    #[error("pickle error: {0}")]
    Pickle(String),
    #[error("expected a one-dimensional array, got shape {0:?}")]
    NotOneDimensional(Vec<usize>),
    #[error("gzip decode failed: {0}")]
    Gzip(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Float,
    Int,
    UInt,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DType {
    pub kind: ScalarKind,
    pub size: usize,
    pub endian: Endian,
}

impl DType {
    /// Parses a numpy array-protocol type string such as `<f8`, `|u1` or `i4`.
    pub fn parse(descr: &str) -> Result<Self, ArrayError> {
        let descr = descr.trim();
        let (endian_char, code) = match descr.chars().next() {
            Some(c @ ('<' | '>' | '|' | '=')) => (Some(c), &descr[1..]),
            _ => (None, descr),
        };
        Self::from_parts(code, endian_char)
    }

    /// Builds a dtype from a type code (`f8`) and an optional byte-order character.
    pub fn from_parts(code: &str, endian_char: Option<char>) -> Result<Self, ArrayError> {
        let mut chars = code.chars();
        let kind = match chars.next() {
            Some('f') => ScalarKind::Float,
            Some('i') => ScalarKind::Int,
            Some('u') => ScalarKind::UInt,
            Some('b') => ScalarKind::Bool,
            _ => return Err(ArrayError::UnsupportedDtype(code.to_string())),
        };
        let size: usize = chars
            .as_str()
            .parse()
            .map_err(|_| ArrayError::UnsupportedDtype(code.to_string()))?;
        let size_ok = match kind {
            ScalarKind::Float => matches!(size, 4 | 8),
            ScalarKind::Int | ScalarKind::UInt => matches!(size, 1 | 2 | 4 | 8),
            ScalarKind::Bool => size == 1,
        };
        if !size_ok {
            return Err(ArrayError::UnsupportedDtype(code.to_string()));
        }
        let endian = match endian_char {
            Some('>') => Endian::Big,
            Some('<') | Some('|') | Some('=') | None => Endian::Little,
            Some(other) => {
                return Err(ArrayError::UnsupportedDtype(format!("{other}{code}")));
            }
        };
        Ok(Self { kind, size, endian })
    }

    /// Decodes `count` consecutive elements from `data`, widening to f64.
    pub fn decode(&self, data: &[u8], count: usize) -> Result<Vec<f64>, ArrayError> {
        let needed = count
            .checked_mul(self.size)
            .ok_or_else(|| ArrayError::Header("element count overflow".to_string()))?;
        if data.len() < needed {
            return Err(ArrayError::Truncated {
                offset: 0,
                needed,
                available: data.len(),
            });
        }
        Ok(data[..needed]
            .chunks_exact(self.size)
            .map(|chunk| self.decode_one(chunk))
            .collect())
    }

    fn decode_one(&self, chunk: &[u8]) -> f64 {
        let mut raw = [0u8; 8];
        raw[..self.size].copy_from_slice(chunk);
        if self.endian == Endian::Big {
            raw[..self.size].reverse();
        }
        match (self.kind, self.size) {
            (ScalarKind::Float, 4) => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
            (ScalarKind::Float, _) => f64::from_le_bytes(raw),
            (ScalarKind::Bool, _) => {
                if raw[0] != 0 {
                    1.0
                } else {
                    0.0
                }
            }
            (ScalarKind::UInt, _) => u64::from_le_bytes(raw) as f64,
            (ScalarKind::Int, size) => {
                let shift = 64 - 8 * size as u32;
                ((i64::from_le_bytes(raw) << shift) >> shift) as f64
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl NdArray {
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// Flattens to a vector; at most one axis may be longer than one.
    pub fn into_vector(self) -> Result<Vec<f64>, ArrayError> {
        let long_axes = self.shape.iter().filter(|&&d| d > 1).count();
        if long_axes > 1 {
            return Err(ArrayError::NotOneDimensional(self.shape));
        }
        Ok(self.values)
    }
}

pub fn element_count(shape: &[usize]) -> Result<usize, ArrayError> {
    shape.iter().try_fold(1usize, |acc, &d| {
        acc.checked_mul(d)
            .ok_or_else(|| ArrayError::Header(format!("shape {shape:?} overflows")))
    })
}
