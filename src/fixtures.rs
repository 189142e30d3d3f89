use crate::formats::asus::include::{padding_for, PACKAGE_MARKER, RECORD_SIZE, RECORD_TAG};
use crate::formats::msi::include::MSI_MARKER;

pub const ASUS_ATTRIBUTES: [u8; 8] = [0xFF, 0xFF, 0x0A, 0x00, 0xFF, 0xFF, 0x00, 0x40];

const FILLER: u8 = 0x11;

fn image(magic: &[u8], len: usize) -> Vec<u8> {
    let mut out = magic.to_vec();
    out.resize(len.max(magic.len()), FILLER);
    out
}

pub fn bmp(len: usize) -> Vec<u8> {
    image(b"BM", len)
}

pub fn png(len: usize) -> Vec<u8> {
    image(b"\x89PNG", len)
}

pub fn jpeg(len: usize) -> Vec<u8> {
    image(b"\xff\xd8\xff", len)
}

pub fn gif(len: usize) -> Vec<u8> {
    image(b"GIF8", len)
}

pub fn asus_record(size: u32, attributes: [u8; 8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(RECORD_SIZE);
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    out.extend_from_slice(&attributes);
    out.extend_from_slice(&RECORD_TAG);
    out
}

/// Marker header followed by record, payload and zero padding per image.
pub fn asus_package(images: &[Vec<u8>]) -> Vec<u8> {
    let mut out = PACKAGE_MARKER.to_vec();
    for image in images {
        out.extend_from_slice(&asus_record(image.len() as u32, ASUS_ATTRIBUTES));
        out.extend_from_slice(image);
        out.resize(out.len() + padding_for(image.len()), 0);
    }
    out
}

pub fn msi_record(layer: u8, image_number: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = MSI_MARKER.to_vec();
    out.extend_from_slice(&[layer, image_number, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}
