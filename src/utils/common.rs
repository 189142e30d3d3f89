use binrw::{BinRead, BinReaderExt, BinWrite, BinWriterExt};
use std::io::Cursor;

/// Bytes `[offset, offset + size)` of `data`, or `None` if they run past the end.
pub fn slice_at(data: &[u8], offset: usize, size: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(size)?)
}

pub fn read_le_at<T>(data: &[u8], offset: usize) -> binrw::BinResult<T>
where
    T: BinRead,
    for<'a> T::Args<'a>: Default,
{
    let mut reader = Cursor::new(data.get(offset..).unwrap_or_default());
    reader.read_le()
}

pub fn to_le_bytes<T>(value: &T) -> binrw::BinResult<Vec<u8>>
where
    T: BinWrite,
    for<'a> T::Args<'a>: Default,
{
    let mut writer = Cursor::new(Vec::new());
    writer.write_le(value)?;
    Ok(writer.into_inner())
}

pub fn u32_le_at(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = slice_at(data, offset, 4)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}

pub fn hex_preview(data: &[u8], max: usize) -> String {
    hex::encode_upper(&data[..data.len().min(max)])
}
