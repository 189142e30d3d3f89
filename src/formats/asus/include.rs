use binrw::{BinRead, BinWrite};

pub const HEADER_SIZE: usize = 32;
pub const RECORD_SIZE: usize = 32;
pub const ALIGNMENT: usize = 4;

// 00000000 20000000 FFFF0000 FFFF0000 + 16 zero bytes
pub const PACKAGE_MARKER: [u8; HEADER_SIZE] = [
    0x00, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// last 16 bytes of every entry record, directly in front of the image data
pub const RECORD_TAG: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x30, 0x00, 0x09, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[derive(BinRead, BinWrite, Debug)]
#[brw(little)]
pub struct PackageHeader {
    _reserved: u32,
    pub header_size: u32, //offset of the first entry record
    _marker_a: u32,       //0xFFFF
    _marker_b: u32,       //0xFFFF
    _reserved2: [u8; 16],
}

#[derive(BinRead, BinWrite, Debug, Clone)]
#[brw(little)]
pub struct EntryRecord {
    pub image_size: u32,
    pub data_offset: u32, //relative to the record start, always RECORD_SIZE
    pub attributes: [u8; 8],
    pub tag: [u8; 16],
}
impl EntryRecord {
    pub fn is_entry(&self) -> bool {
        self.image_size != 0 && self.data_offset == RECORD_SIZE as u32 && self.tag == RECORD_TAG
    }
}

pub fn padding_for(size: usize) -> usize {
    (ALIGNMENT - size % ALIGNMENT) % ALIGNMENT
}
