use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Asus,
    Msi,
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Asus => f.write_str("ASUS"),
            Vendor::Msi => f.write_str("MSI"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImageKind {
    Bmp,
    Jpeg,
    Png,
    Gif,
    Ico,
    Riff,
    Pe,
    Unknown,
}

impl ImageKind {
    /// Classify from the leading payload bytes only.
    pub fn classify(payload: &[u8]) -> ImageKind {
        if payload.starts_with(b"BM") {
            ImageKind::Bmp
        } else if payload.starts_with(b"\xff\xd8\xff") {
            ImageKind::Jpeg
        } else if payload.starts_with(b"\x89PNG") {
            ImageKind::Png
        } else if payload.starts_with(b"GIF8") {
            ImageKind::Gif
        } else if payload.starts_with(b"\x00\x00\x01\x00") || payload.starts_with(b"\x00\x00\x02\x00") {
            ImageKind::Ico
        } else if payload.starts_with(b"RIFF") {
            ImageKind::Riff
        } else if payload.starts_with(b"MZ") {
            ImageKind::Pe
        } else {
            ImageKind::Unknown
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Bmp => "bmp",
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Ico => "ico",
            ImageKind::Riff => "riff",
            ImageKind::Pe => "efi",
            ImageKind::Unknown => "img",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ImageKind::Bmp => "BMP Image",
            ImageKind::Jpeg => "JPEG Image",
            ImageKind::Png => "PNG Image",
            ImageKind::Gif => "GIF Image",
            ImageKind::Ico => "ICO Image",
            ImageKind::Riff => "RIFF Container",
            ImageKind::Pe => "PE/DOS Executable",
            ImageKind::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Absolute offset of the container inside the source buffer.
    pub base: u64,
    /// Vendor marker as found in the buffer.
    pub signature: Vec<u8>,
    /// Fixed header bytes preceding the first entry record (may be empty).
    pub raw: Vec<u8>,
    pub entry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub index: u32,
    /// Payload offset, relative to the container start.
    pub offset: u64,
    pub size: u64,
    pub kind: ImageKind,
    /// Table record immediately preceding the payload.
    pub record: Vec<u8>,
    pub payload: Vec<u8>,
    /// Bytes between the end of the payload and the next record.
    pub trailer: Vec<u8>,
}

impl Entry {
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Offset of the table record, relative to the container start.
    pub fn record_offset(&self) -> u64 {
        self.offset - self.record.len() as u64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerModel {
    pub vendor: Vendor,
    pub header: ContainerHeader,
    pub entries: Vec<Entry>,
    pub total_size: u64,
}

impl ContainerModel {
    pub fn base(&self) -> u64 {
        self.header.base
    }

    pub fn end(&self) -> u64 {
        self.header.base + self.total_size
    }

    pub fn entry(&self, index: u32) -> Option<&Entry> {
        self.entries.iter().find(|e| e.index == index)
    }

    /// Sum of payload sizes.
    pub fn payload_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    /// Recompute offsets and the total size from the record/payload/trailer
    /// lengths, keeping table order.
    pub fn relayout(&mut self) {
        let mut pos = self.header.raw.len() as u64;
        for entry in &mut self.entries {
            pos += entry.record.len() as u64;
            entry.offset = pos;
            entry.size = entry.payload.len() as u64;
            pos += entry.size + entry.trailer.len() as u64;
        }
        self.header.entry_count = self.entries.len() as u32;
        self.total_size = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_prefix() {
        assert_eq!(ImageKind::classify(b"BM\x36\x00"), ImageKind::Bmp);
        assert_eq!(ImageKind::classify(b"\xff\xd8\xff\xe0"), ImageKind::Jpeg);
        assert_eq!(ImageKind::classify(b"\x89PNG\r\n"), ImageKind::Png);
        assert_eq!(ImageKind::classify(b"\x00\x00\x02\x00"), ImageKind::Ico);
        assert_eq!(ImageKind::classify(b"xxBM"), ImageKind::Unknown);
        assert_eq!(ImageKind::classify(b""), ImageKind::Unknown);
        assert_eq!(ImageKind::Jpeg.extension(), "jpg");
    }

    #[test]
    fn relayout_accounts_for_records_and_trailers() {
        let entry = |index, payload: &[u8], trailer: &[u8]| Entry {
            index,
            offset: 0,
            size: 0,
            kind: ImageKind::Unknown,
            record: vec![0; 4],
            payload: payload.to_vec(),
            trailer: trailer.to_vec(),
        };
        let mut model = ContainerModel {
            vendor: Vendor::Msi,
            header: ContainerHeader { base: 0x100, signature: vec![], raw: vec![0; 8], entry_count: 0 },
            entries: vec![entry(0, b"abc", b"\0"), entry(1, b"defgh", b"")],
            total_size: 0,
        };
        model.relayout();

        assert_eq!(model.entries[0].offset, 12);
        assert_eq!(model.entries[0].record_offset(), 8);
        assert_eq!(model.entries[1].offset, 12 + 3 + 1 + 4);
        assert_eq!(model.total_size, 25);
        assert_eq!(model.end(), 0x100 + 25);
        assert_eq!(model.header.entry_count, 2);
        assert_eq!(model.payload_size(), 8);
    }
}
