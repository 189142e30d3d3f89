use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackerError>;

/// Which structural check a container failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Signature,
    EntryCount,
    Overlap,
    Bounds,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::Signature => "signature",
            Check::EntryCount => "entry count",
            Check::Overlap => "entry overlap",
            Check::Bounds => "container bounds",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PackerError {
    #[error("no known packer marker in buffer")]
    NotRecognized,

    #[error("malformed {vendor} header at {offset:#x}: {reason}")]
    MalformedHeader { vendor: &'static str, offset: u64, reason: String },

    #[error("structural inconsistency ({check}){}", entry_suffix(.index))]
    StructuralInconsistency { index: Option<u32>, check: Check },

    #[error("no table slot for entry reference {0}")]
    UnknownEntryReference(String),

    #[error("rebuilt size {size:#x} exceeds limit {limit:#x}{}", entry_suffix(.index))]
    SizeLimitExceeded { index: Option<u32>, size: u64, limit: u64 },

    #[error("entry {index}: replacement is {found}, original is {expected}")]
    KindMismatch { index: u32, expected: &'static str, found: &'static str },

    #[error("signature catalog entry '{0}' has an empty pattern")]
    EmptyPattern(&'static str),

    #[error("binary layout error: {0}")]
    Binrw(#[from] binrw::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn entry_suffix(index: &Option<u32>) -> String {
    match index {
        Some(i) => format!(" at entry {}", i),
        None => String::new(),
    }
}

impl PackerError {
    pub fn inconsistent(index: Option<u32>, check: Check) -> Self {
        PackerError::StructuralInconsistency { index, check }
    }

    /// Short kind name, printed by the CLI when an operation aborts.
    pub fn kind(&self) -> &'static str {
        match self {
            PackerError::NotRecognized => "NotRecognized",
            PackerError::MalformedHeader { .. } => "MalformedHeader",
            PackerError::StructuralInconsistency { .. } => "StructuralInconsistency",
            PackerError::UnknownEntryReference(_) => "UnknownEntryReference",
            PackerError::SizeLimitExceeded { .. } => "SizeLimitExceeded",
            PackerError::KindMismatch { .. } => "KindMismatch",
            PackerError::EmptyPattern(_) => "EmptyPattern",
            PackerError::Binrw(_) => "Binrw",
            PackerError::Io(_) => "Io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_message_names_entry_and_check() {
        let err = PackerError::inconsistent(Some(3), Check::Overlap);
        assert_eq!(err.to_string(), "structural inconsistency (entry overlap) at entry 3");
        assert_eq!(err.kind(), "StructuralInconsistency");
    }

    #[test]
    fn size_limit_without_entry() {
        let err = PackerError::SizeLimitExceeded { index: None, size: 0x20, limit: 0x10 };
        assert_eq!(err.to_string(), "rebuilt size 0x20 exceeds limit 0x10");
    }
}
