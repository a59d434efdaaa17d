use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use memmap2::Mmap;
use thiserror::Error;

pub mod array;
pub mod npy;
pub mod pickle;

use array::{ArrayError, NdArray};
use npy::{NPY_MAGIC, parse_npy};
use pickle::{PROTO, parse_pickle};

pub const COMPRESSION_FILE: &str = "lt_compression.dat";
pub const WINNING_ACCURACY_FILE: &str = "lt_bestaccuracy.dat";
pub const REINIT_ACCURACY_FILE: &str = "reinit_bestaccuracy.dat";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("missing input: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: ArrayError,
    },
}

impl InputError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            InputError::NotFound(path.to_path_buf())
        } else {
            InputError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// The three per-pair arrays written by the pruning run.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketDumps {
    pub compression: Vec<f64>,
    pub winning_accuracy: Vec<f64>,
    pub reinit_accuracy: Vec<f64>,
}

pub fn dump_paths(dump_dir: &Path) -> [PathBuf; 3] {
    [
        dump_dir.join(COMPRESSION_FILE),
        dump_dir.join(WINNING_ACCURACY_FILE),
        dump_dir.join(REINIT_ACCURACY_FILE),
    ]
}

pub fn load_dumps(dump_dir: &Path) -> Result<TicketDumps, InputError> {
    let [compression_path, winning_path, reinit_path] = dump_paths(dump_dir);

    tracing::debug!(
        "loading dumps: compression={}, winning={}, reinit={}",
        compression_path.display(),
        winning_path.display(),
        reinit_path.display()
    );

    Ok(TicketDumps {
        compression: load_array(&compression_path)?,
        winning_accuracy: load_array(&winning_path)?,
        reinit_accuracy: load_array(&reinit_path)?,
    })
}

pub fn load_array(path: &Path) -> Result<Vec<f64>, InputError> {
    let file = File::open(path).map_err(|e| InputError::io(path, e))?;
    let len = file.metadata().map_err(|e| InputError::io(path, e))?.len();
    let decoded = if len == 0 {
        Err(ArrayError::Empty)
    } else {
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| InputError::io(path, e))?;
        decode_array(&mmap[..])
    };
    decoded
        .and_then(NdArray::into_vector)
        .map_err(|source| InputError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Sniffs the container format from the leading bytes and decodes it.
pub fn decode_array(bytes: &[u8]) -> Result<NdArray, ArrayError> {
    if bytes.is_empty() {
        return Err(ArrayError::Empty);
    }
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut inflated)?;
        if inflated.starts_with(&GZIP_MAGIC) {
            return Err(ArrayError::UnknownFormat);
        }
        return decode_array(&inflated);
    }
    if bytes.starts_with(NPY_MAGIC) {
        return parse_npy(bytes);
    }
    if bytes[0] == PROTO {
        return parse_pickle(bytes);
    }
    Err(ArrayError::UnknownFormat)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/tests.rs"]
mod tests;

#[cfg(test)]
#[path = "../../tests/src_inline/input/fixtures.rs"]
pub mod fixtures;
