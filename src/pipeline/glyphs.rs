//! Built-in 5x7 glyphs for overlay annotations.
//!
//! The overlay only ever shows short diagnostic strings (the threshold
//! value, shape labels), so the appliance carries a small fixed bitmap set
//! instead of a font asset. Rendering is bounds-checked; drawing off the
//! edge of the image is a no-op. Lowercase letters render as uppercase,
//! characters outside the set are skipped.

use image::{Rgb, RgbImage};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Blank columns between glyphs, pre-scale.
const GLYPH_GAP: u32 = 1;

/// Rows top to bottom, bit 4 is the leftmost column.
type Glyph = [u8; 7];

fn glyph(c: char) -> Option<Glyph> {
    let g: Glyph = match c.to_ascii_uppercase() {
        ' ' => [0x00; 7],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '?' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
        _ => return None,
    };
    Some(g)
}

/// Draw `text` with its top-left corner at `(x, y)`, each glyph pixel
/// scaled to a `scale` x `scale` block.
pub fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1);
    let advance = ((GLYPH_WIDTH + GLYPH_GAP) * scale) as i32;
    let mut pen_x = x;
    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            draw_glyph(image, &rows, pen_x, y, scale, color);
        }
        pen_x += advance;
    }
}

/// Pixel width of `text` at the given scale.
pub fn text_width(text: &str, scale: u32) -> u32 {
    let scale = scale.max(1);
    (text.chars().count() as u32) * (GLYPH_WIDTH + GLYPH_GAP) * scale
}

fn draw_glyph(image: &mut RgbImage, rows: &Glyph, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (0x10 >> col) == 0 {
                continue;
            }
            let block_x = x + (col * scale) as i32;
            let block_y = y + (row as u32 * scale) as i32;
            for dy in 0..scale as i32 {
                for dx in 0..scale as i32 {
                    put_pixel_checked(image, block_x + dx, block_y + dy, color);
                }
            }
        }
    }
}

fn put_pixel_checked(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
