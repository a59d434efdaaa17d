use crate::input::array::{ArrayError, DType, NdArray, element_count};

pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq)]
pub struct NpyHeader {
    pub version: (u8, u8),
    pub dtype: DType,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
    pub data_offset: usize,
}

pub fn parse_npy(bytes: &[u8]) -> Result<NdArray, ArrayError> {
    let header = parse_header(bytes)?;
    tracing::debug!(
        version = ?header.version,
        fortran_order = header.fortran_order,
        shape = ?header.shape,
        "npy header"
    );
    let count = element_count(&header.shape)?;
    let data = &bytes[header.data_offset..];
    let values = header.dtype.decode(data, count).map_err(|e| match e {
        ArrayError::Truncated {
            needed, available, ..
        } => ArrayError::Truncated {
            offset: header.data_offset,
            needed,
            available,
        },
        other => other,
    })?;
    Ok(NdArray {
        shape: header.shape,
        values,
    })
}

pub fn parse_header(bytes: &[u8]) -> Result<NpyHeader, ArrayError> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(ArrayError::Header("missing \\x93NUMPY magic".to_string()));
    }
    let version = (bytes[6], bytes[7]);
    let (header_len, header_start) = match version.0 {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10usize),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(truncated(8, 4, bytes.len()));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12usize)
        }
        major => {
            return Err(ArrayError::Header(format!(
                "unsupported format version {}.{}",
                major, version.1
            )));
        }
    };
    let data_offset = header_start + header_len;
    if data_offset > bytes.len() {
        return Err(truncated(header_start, header_len, bytes.len()));
    }
    let text: String = bytes[header_start..data_offset]
        .iter()
        .map(|&b| b as char)
        .collect();

    let descr = dict_value(&text, "descr")?;
    let descr = parse_quoted(descr).ok_or_else(|| {
        ArrayError::UnsupportedDtype(format!("structured or malformed descr: {descr}"))
    })?;
    let dtype = DType::parse(descr)?;

    let fortran_order = match dict_value(&text, "fortran_order")? {
        v if v.starts_with("True") => true,
        v if v.starts_with("False") => false,
        v => {
            return Err(ArrayError::Header(format!("invalid fortran_order: {v}")));
        }
    };

    let shape = parse_shape(dict_value(&text, "shape")?)?;

    Ok(NpyHeader {
        version,
        dtype,
        fortran_order,
        shape,
        data_offset,
    })
}

fn truncated(offset: usize, needed: usize, len: usize) -> ArrayError {
    ArrayError::Truncated {
        offset,
        needed,
        available: len.saturating_sub(offset),
    }
}

/// Returns the text following `'key':` in a Python dict literal, trimmed on the left.
fn dict_value<'a>(text: &'a str, key: &str) -> Result<&'a str, ArrayError> {
    for quote in ['\'', '"'] {
        let needle = format!("{quote}{key}{quote}");
        if let Some(pos) = text.find(&needle) {
            let rest = text[pos + needle.len()..].trim_start();
            if let Some(rest) = rest.strip_prefix(':') {
                return Ok(rest.trim_start());
            }
        }
    }
    Err(ArrayError::Header(format!("missing key '{key}'")))
}

fn parse_quoted(value: &str) -> Option<&str> {
    let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let rest = &value[1..];
    let end = rest.find(quote)?;
    Some(&rest[..end])
}

fn parse_shape(value: &str) -> Result<Vec<usize>, ArrayError> {
    let inner = value
        .strip_prefix('(')
        .and_then(|rest| rest.find(')').map(|end| &rest[..end]))
        .ok_or_else(|| ArrayError::Header(format!("invalid shape: {value}")))?;
    let mut shape = Vec::new();
    for part in inner.split(',') {
        let part = part.trim().trim_end_matches('L');
        if part.is_empty() {
            continue;
        }
        let dim = part
            .parse::<usize>()
            .map_err(|_| ArrayError::Header(format!("invalid shape dimension: {part}")))?;
        shape.push(dim);
    }
    Ok(shape)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/npy.rs"]
mod tests;
