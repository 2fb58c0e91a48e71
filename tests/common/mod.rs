use std::fs;
use std::path::Path;

/// Builds a minimal 24-bit uncompressed BMP so imagesize can read
/// dimensions without shipping binary fixtures.
pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    const HEADER_LEN: u32 = 54;
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = HEADER_LEN + pixel_array_size;

    let mut header = [0u8; HEADER_LEN as usize];
    header[0..2].copy_from_slice(b"BM");
    header[2..6].copy_from_slice(&file_size.to_le_bytes());
    header[10..14].copy_from_slice(&HEADER_LEN.to_le_bytes());
    header[14..18].copy_from_slice(&40u32.to_le_bytes());
    header[18..22].copy_from_slice(&(width as i32).to_le_bytes());
    header[22..26].copy_from_slice(&(height as i32).to_le_bytes());
    header[26..28].copy_from_slice(&1u16.to_le_bytes());
    header[28..30].copy_from_slice(&24u16.to_le_bytes());
    header[34..38].copy_from_slice(&pixel_array_size.to_le_bytes());
    header[38..42].copy_from_slice(&2835u32.to_le_bytes());
    header[42..46].copy_from_slice(&2835u32.to_le_bytes());

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(&header);
    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Writes a text file, creating parent directories first.
pub fn write_text(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, contents).expect("write text file");
}
