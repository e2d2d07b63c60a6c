//! PNG encoding for RGBA tile data.
//!
//! Hand-rolled chunk writer (IHDR/PLTE/tRNS/IDAT/IEND over `flate2` deflate
//! and `crc32fast` CRCs). GLM tiles are fixed at 256x256 and the color ramp
//! has only 7 distinct RGBA values (plus fully transparent), so every tile
//! qualifies for indexed (PNG8) encoding; palette extraction stays
//! sequential since a tile this small and this low in distinct colors
//! never justifies parallelizing it.

use std::collections::HashMap;
use std::io::Write;

const MAX_PALETTE_SIZE: usize = 256;

/// Encode RGBA pixel data as a PNG, choosing indexed (color type 3) when
/// the tile has 256 or fewer unique colors, RGBA (color type 6) otherwise.
pub fn encode_rgba_auto(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    match extract_palette(pixels) {
        Some((palette, indices)) => encode_indexed(width, height, &palette, &indices),
        None => encode_rgba(pixels, width, height),
    }
}

#[inline(always)]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

fn extract_palette(pixels: &[u8]) -> Option<(Vec<(u8, u8, u8, u8)>, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<(u8, u8, u8, u8)> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let packed = pack_color(chunk[0], chunk[1], chunk[2], chunk[3]);
        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push((chunk[0], chunk[1], chunk[2], chunk[3]));
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

fn encode_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
) -> Vec<u8> {
    let mut png = Vec::new();
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(3); // color type 3 = indexed
    ihdr.push(0);
    ihdr.push(0);
    ihdr.push(0);
    write_chunk(&mut png, b"IHDR", &ihdr);

    let mut plte = Vec::with_capacity(palette.len() * 3);
    for (r, g, b, _) in palette {
        plte.push(*r);
        plte.push(*g);
        plte.push(*b);
    }
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.iter().any(|(_, _, _, a)| *a < 255) {
        let trns: Vec<u8> = palette.iter().map(|(_, _, _, a)| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines_indexed(indices, width, height);
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    png
}

fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut png = Vec::new();
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8);
    ihdr.push(6); // color type 6 = RGBA
    ihdr.push(0);
    ihdr.push(0);
    ihdr.push(0);
    write_chunk(&mut png, b"IHDR", &ihdr);

    let idat = deflate_scanlines_rgba(pixels, width, height);
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    png
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);
    let crc_data = [chunk_type.as_slice(), data].concat();
    png.extend_from_slice(&crc32fast::hash(&crc_data).to_be_bytes());
}

fn deflate_scanlines_indexed(indices: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut raw = Vec::with_capacity(height * (1 + width));
    for y in 0..height {
        raw.push(0); // filter: none
        let start = y * width;
        raw.extend_from_slice(&indices[start..start + width]);
    }
    deflate(&raw)
}

fn deflate_scanlines_rgba(pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut raw = Vec::with_capacity(height * (1 + width * 4));
    for y in 0..height {
        raw.push(0);
        let start = y * width * 4;
        raw.extend_from_slice(&pixels[start..start + width * 4]);
    }
    deflate(&raw)
}

fn deflate(raw: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(raw)
        .expect("writing to an in-memory ZlibEncoder never fails");
    encoder
        .finish()
        .expect("finishing an in-memory ZlibEncoder never fails")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_signature_ok(bytes: &[u8]) -> bool {
        bytes.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10])
    }

    #[test]
    fn all_transparent_tile_encodes_as_valid_indexed_png() {
        let pixels = vec![0u8; 256 * 256 * 4];
        let png = encode_rgba_auto(&pixels, 256, 256);
        assert!(png_signature_ok(&png));
        assert!(png.windows(4).any(|w| w == b"PLTE"));
    }

    #[test]
    fn many_unique_colors_falls_back_to_rgba_mode() {
        let mut pixels = Vec::with_capacity(300 * 4);
        for i in 0..300u32 {
            pixels.extend_from_slice(&[(i % 256) as u8, 0, 0, 255]);
        }
        let png = encode_rgba_auto(&pixels, 300, 1);
        assert!(png_signature_ok(&png));
        assert!(!png.windows(4).any(|w| w == b"PLTE"));
    }
}
