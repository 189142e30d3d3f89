use memchr::memmem::Finder;

use crate::error::{PackerError, Result};
use crate::formats::asus::include::PACKAGE_MARKER;
use crate::formats::msi::include::MSI_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub tag: &'static str,
    pub pattern: &'static [u8],
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanHit {
    pub offset: u64,
    pub signature: &'static Signature,
}

pub static CATALOG: &[Signature] = &[
    Signature { tag: "ASUS Packer", pattern: &PACKAGE_MARKER, label: "ASUS Packer Header" },
    Signature { tag: "$MsI$", pattern: MSI_MARKER, label: "MSI Packer Header" },
    Signature { tag: "MZ", pattern: b"MZ", label: "PE/DOS Executable" },
    Signature { tag: "PE", pattern: b"PE\x00\x00", label: "PE Header" },
    Signature { tag: "ELF", pattern: b"\x7fELF", label: "ELF Binary" },
    Signature { tag: "ZIP", pattern: b"PK\x03\x04", label: "ZIP Archive" },
    Signature { tag: "GZIP", pattern: b"\x1f\x8b", label: "GZIP" },
    Signature { tag: "BM", pattern: b"BM", label: "Bitmap Image" },
    Signature { tag: "JPEG", pattern: b"\xff\xd8\xff", label: "JPEG Image" },
    Signature { tag: "PNG", pattern: b"\x89PNG", label: "PNG Image" },
    Signature { tag: "GIF", pattern: b"GIF8", label: "GIF Image" },
    Signature { tag: "RIFF", pattern: b"RIFF", label: "RIFF Container" },
    Signature { tag: "ICO", pattern: b"\x00\x00\x01\x00", label: "ICO Image" },
    Signature { tag: "_FVH", pattern: b"_FVH", label: "UEFI Firmware Volume" },
    Signature { tag: "$FV$", pattern: b"$FV$", label: "UEFI Firmware Volume Signature" },
];

pub struct Scanner<'a> {
    data: &'a [u8],
    finders: Vec<(&'static Signature, Finder<'static>)>,
}

impl<'a> Scanner<'a> {
    /// Fails only when a catalog entry has an empty pattern.
    pub fn new(data: &'a [u8], catalog: &'static [Signature]) -> Result<Self> {
        let mut finders = Vec::with_capacity(catalog.len());
        for signature in catalog {
            if signature.pattern.is_empty() {
                return Err(PackerError::EmptyPattern(signature.tag));
            }
            finders.push((signature, Finder::new(signature.pattern)));
        }
        Ok(Scanner { data, finders })
    }

    /// A fresh pass over the buffer, ascending by offset. Ties keep catalog order.
    pub fn hits(&self) -> ScanHits<'_, 'a> {
        let next = self.finders.iter().map(|(_, finder)| finder.find(self.data)).collect();
        ScanHits { scanner: self, next }
    }
}

pub struct ScanHits<'s, 'a> {
    scanner: &'s Scanner<'a>,
    next: Vec<Option<usize>>,
}

impl Iterator for ScanHits<'_, '_> {
    type Item = ScanHit;

    fn next(&mut self) -> Option<ScanHit> {
        let (slot, pos) = self
            .next
            .iter()
            .enumerate()
            .filter_map(|(i, pos)| pos.map(|p| (i, p)))
            .min_by_key(|&(i, p)| (p, i))?;

        let (signature, finder) = &self.scanner.finders[slot];
        // step one byte so overlapping occurrences of the same pattern are reported
        let resume = pos + 1;
        self.next[slot] = if resume < self.scanner.data.len() {
            finder.find(&self.scanner.data[resume..]).map(|p| p + resume)
        } else {
            None
        };

        Some(ScanHit { offset: pos as u64, signature: *signature })
    }
}

/// Convenience wrapper: collect every hit of `catalog` in `data`.
pub fn scan(data: &[u8], catalog: &'static [Signature]) -> Result<Vec<ScanHit>> {
    Ok(Scanner::new(data, catalog)?.hits().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    static EMPTY: &[Signature] = &[Signature { tag: "bad", pattern: b"", label: "broken" }];
    static AA: &[Signature] = &[Signature { tag: "AA", pattern: b"AA", label: "double A" }];

    #[test]
    fn reports_msi_and_pe_in_offset_order() {
        let mut data = vec![0u8; 0x2000];
        data[0..2].copy_from_slice(b"MZ");
        data[0x1000..0x1005].copy_from_slice(b"$MsI$");

        let hits = scan(&data, CATALOG).unwrap();
        let found: Vec<(u64, &str)> = hits.iter().map(|h| (h.offset, h.signature.tag)).collect();
        assert_eq!(found, vec![(0x0, "MZ"), (0x1000, "$MsI$")]);
    }

    #[test]
    fn empty_pattern_is_a_catalog_error() {
        let err = Scanner::new(b"anything", EMPTY).err().unwrap();
        assert!(matches!(err, PackerError::EmptyPattern("bad")));
    }

    #[test]
    fn overlapping_matches_are_all_reported() {
        let offsets: Vec<u64> = scan(b"xAAAy", AA).unwrap().iter().map(|h| h.offset).collect();
        assert_eq!(offsets, vec![1, 2]);
    }

    #[test]
    fn different_signatures_at_same_offset() {
        // "BM" and "MZ" overlap inside "BMZ"
        let hits = scan(b"BMZ", CATALOG).unwrap();
        let tags: Vec<&str> = hits.iter().map(|h| h.signature.tag).collect();
        assert_eq!(tags, vec!["BM", "MZ"]);
    }

    #[test]
    fn hit_sequence_is_restartable() {
        let data = b"MZ..MZ..GIF8";
        let scanner = Scanner::new(data, CATALOG).unwrap();
        let first: Vec<ScanHit> = scanner.hits().collect();
        let second: Vec<ScanHit> = scanner.hits().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(scanner.hits().next().unwrap().offset, 0);
    }
}
