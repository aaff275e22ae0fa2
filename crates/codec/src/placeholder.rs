//! Flat placeholder frames shown when no source image is available.

use fauxcam_core::prelude::*;
use image::{Rgba, RgbaImage};

const GLYPH_W: usize = 5;
const GLYPH_H: usize = 7;

/// 5x7 glyph rows, bit 4 is the leftmost column.
fn glyph(c: char) -> [u8; GLYPH_H] {
    match c.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
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
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ' ' => [0x00; GLYPH_H],
        _ => [0x1F, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1F],
    }
}

/// Label color that contrasts with `background`.
fn ink_for(background: [u8; 4]) -> Rgba<u8> {
    let luma = (background[0] as u32 * 299 + background[1] as u32 * 587 + background[2] as u32 * 114)
        / 1000;
    if luma > 128 {
        Rgba([0, 0, 0, 255])
    } else {
        Rgba([230, 230, 230, 255])
    }
}

/// Solid `color` frame with `label` centered in a 5x7 bitmap font.
///
/// The label is scaled to the largest integer factor that fits inside the frame with a
/// margin and is skipped when even a 1x rendering does not fit. Returns `None` if the
/// pixel buffer cannot be allocated.
///
/// # Example
/// ```rust
/// use fauxcam_codec::placeholder::placeholder;
/// use fauxcam_core::prelude::Resolution;
///
/// let img = placeholder(Resolution::new(64, 32).unwrap(), [48, 48, 48, 255], "NO IMAGE").unwrap();
/// assert_eq!(img.get_pixel(0, 0).0, [48, 48, 48, 255]);
/// ```
pub fn placeholder(target: Resolution, color: [u8; 4], label: &str) -> Option<RgbaImage> {
    let mut raw = Vec::new();
    if !try_resize(&mut raw, target.pixels() * 4) {
        log::warn!("placeholder: cannot allocate {target} frame");
        return None;
    }
    for px in raw.chunks_exact_mut(4) {
        px.copy_from_slice(&color);
    }
    let mut image = RgbaImage::from_raw(target.width.get(), target.height.get(), raw)?;

    let chars: Vec<char> = label.chars().collect();
    if chars.is_empty() {
        return Some(image);
    }
    // One blank column between glyphs.
    let text_w = chars.len() * (GLYPH_W + 1) - 1;
    let usable_w = target.w() * 4 / 5;
    let usable_h = target.h() * 4 / 5;
    let scale = (usable_w / text_w).min(usable_h / GLYPH_H).min(8);
    if scale == 0 {
        return Some(image);
    }

    let ink = ink_for(color);
    let origin_x = (target.w() - text_w * scale) / 2;
    let origin_y = (target.h() - GLYPH_H * scale) / 2;
    for (i, c) in chars.into_iter().enumerate() {
        let rows = glyph(c);
        let gx = origin_x + i * (GLYPH_W + 1) * scale;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (0x10 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = (gx + col * scale + dx) as u32;
                        let y = (origin_y + row * scale + dy) as u32;
                        image.put_pixel(x, y, ink);
                    }
                }
            }
        }
    }
    Some(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_label_in_contrasting_ink() {
        let bg = [48, 48, 48, 255];
        let img = placeholder(Resolution::new(160, 120).unwrap(), bg, "NO IMAGE").unwrap();
        let ink = img.pixels().filter(|p| p.0 != bg).count();
        assert!(ink > 0);
        assert!(img.pixels().all(|p| p.0 == bg || p.0 == [230, 230, 230, 255]));
        // Corners stay background.
        assert_eq!(img.get_pixel(0, 0).0, bg);
        assert_eq!(img.get_pixel(159, 119).0, bg);
    }

    #[test]
    fn tiny_targets_skip_the_label() {
        let bg = [255, 255, 255, 255];
        let img = placeholder(Resolution::new(4, 4).unwrap(), bg, "NO IMAGE").unwrap();
        assert!(img.pixels().all(|p| p.0 == bg));
    }

    #[test]
    fn is_deterministic() {
        let res = Resolution::new(97, 33).unwrap();
        let a = placeholder(res, [10, 200, 10, 255], "fauxcam 2").unwrap();
        let b = placeholder(res, [10, 200, 10, 255], "fauxcam 2").unwrap();
        assert_eq!(a, b);
    }
}
