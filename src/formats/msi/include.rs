use binrw::{BinRead, BinWrite};

// the on-disk magic is 4 bytes; the 5th marker byte is the sector field
pub const MSI_MARKER: &[u8] = b"$MsI$";
pub const RECORD_SIZE: usize = 12;

#[derive(BinRead, BinWrite, Debug, Clone)]
#[brw(little, magic = b"$MsI")]
pub struct ImageRecord {
    pub sector: u8,
    pub layer: u8,
    pub image_number: u8,
    pub reserved: u8,
    pub image_size: u32,
}
