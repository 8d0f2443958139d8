//! A small 3x5 bitmap font, scaled up by an integer factor when drawn.
//! Lowercase letters render as uppercase; anything without a glyph renders
//! as a solid block.

use image::Rgb;

use crate::compositor::Canvas;

const GLYPH_W: i32 = 3;
const GLYPH_H: i32 = 5;

fn glyph(c: char) -> [u8; 5] {
    match c.to_ascii_uppercase() {
        '0' => [0x7, 0x5, 0x5, 0x5, 0x7],
        '1' => [0x2, 0x6, 0x2, 0x2, 0x7],
        '2' => [0x7, 0x1, 0x7, 0x4, 0x7],
        '3' => [0x7, 0x1, 0x7, 0x1, 0x7],
        '4' => [0x5, 0x5, 0x7, 0x1, 0x1],
        '5' => [0x7, 0x4, 0x7, 0x1, 0x7],
        '6' => [0x7, 0x4, 0x7, 0x5, 0x7],
        '7' => [0x7, 0x1, 0x2, 0x4, 0x4],
        '8' => [0x7, 0x5, 0x7, 0x5, 0x7],
        '9' => [0x7, 0x5, 0x7, 0x1, 0x7],
        'A' => [0x2, 0x5, 0x7, 0x5, 0x5],
        'B' => [0x6, 0x5, 0x6, 0x5, 0x6],
        'C' => [0x3, 0x4, 0x4, 0x4, 0x3],
        'D' => [0x6, 0x5, 0x5, 0x5, 0x6],
        'E' => [0x7, 0x4, 0x6, 0x4, 0x7],
        'F' => [0x7, 0x4, 0x6, 0x4, 0x4],
        'G' => [0x3, 0x4, 0x5, 0x5, 0x3],
        'H' => [0x5, 0x5, 0x7, 0x5, 0x5],
        'I' => [0x7, 0x2, 0x2, 0x2, 0x7],
        'J' => [0x1, 0x1, 0x1, 0x5, 0x2],
        'K' => [0x5, 0x5, 0x6, 0x5, 0x5],
        'L' => [0x4, 0x4, 0x4, 0x4, 0x7],
        'M' => [0x5, 0x7, 0x7, 0x5, 0x5],
        'N' => [0x6, 0x5, 0x5, 0x5, 0x5],
        'O' => [0x2, 0x5, 0x5, 0x5, 0x2],
        'P' => [0x6, 0x5, 0x6, 0x4, 0x4],
        'Q' => [0x2, 0x5, 0x5, 0x6, 0x3],
        'R' => [0x6, 0x5, 0x6, 0x5, 0x5],
        'S' => [0x3, 0x4, 0x2, 0x1, 0x6],
        'T' => [0x7, 0x2, 0x2, 0x2, 0x2],
        'U' => [0x5, 0x5, 0x5, 0x5, 0x7],
        'V' => [0x5, 0x5, 0x5, 0x5, 0x2],
        'W' => [0x5, 0x5, 0x7, 0x7, 0x5],
        'X' => [0x5, 0x5, 0x2, 0x5, 0x5],
        'Y' => [0x5, 0x5, 0x2, 0x2, 0x2],
        'Z' => [0x7, 0x1, 0x2, 0x4, 0x7],
        ' ' => [0x0, 0x0, 0x0, 0x0, 0x0],
        ':' => [0x0, 0x2, 0x0, 0x2, 0x0],
        '%' => [0x5, 0x1, 0x2, 0x4, 0x5],
        '!' => [0x2, 0x2, 0x2, 0x0, 0x2],
        '?' => [0x6, 0x1, 0x2, 0x0, 0x2],
        '.' => [0x0, 0x0, 0x0, 0x0, 0x2],
        ',' => [0x0, 0x0, 0x0, 0x2, 0x4],
        '-' => [0x0, 0x0, 0x7, 0x0, 0x0],
        _ => [0x7, 0x7, 0x7, 0x7, 0x7],
    }
}

/// Width in pixels of `text`, including one blank column after each glyph.
pub fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * (GLYPH_W as u32 + 1) * scale
}

pub fn text_height(scale: u32) -> u32 {
    GLYPH_H as u32 * scale
}

/// Draws `text` with its top-left corner at (x, y). Pixels falling outside
/// the canvas are clipped.
pub fn draw_text(canvas: &mut Canvas, x: i32, y: i32, text: &str, color: Rgb<u8>, scale: u32) {
    let scale = scale.max(1) as i32;
    let mut cx = x;
    for c in text.chars() {
        draw_char(canvas, cx, y, c, color, scale);
        cx += (GLYPH_W + 1) * scale;
    }
}

fn draw_char(canvas: &mut Canvas, x: i32, y: i32, c: char, color: Rgb<u8>, scale: i32) {
    for (row, bits) in glyph(c).iter().enumerate() {
        for col in 0..GLYPH_W {
            if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                continue;
            }
            let px = x + col * scale;
            let py = y + row as i32 * scale;
            canvas.fill_rect(px, py, scale as u32, scale as u32, color);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_measure() {
        assert_eq!(text_width("Battery: 87%", 4), 12 * 16);
        assert_eq!(text_height(4), 20);
        assert_eq!(text_width("", 3), 0);
    }

    #[test]
    fn test_draw_one_glyph() {
        let mut canvas = Canvas::row_major(RgbImage::new(8, 8));
        let red = Rgb([255, 0, 0]);
        draw_text(&mut canvas, 1, 1, "1", red, 1);
        // '1' = 010 / 110 / 010 / 010 / 111
        assert_eq!(canvas.get_pixel(2, 1), Some(red));
        assert_eq!(canvas.get_pixel(1, 1), Some(Rgb([0, 0, 0])));
        assert_eq!(canvas.get_pixel(1, 2), Some(red));
        assert_eq!(canvas.get_pixel(1, 5), Some(red));
        assert_eq!(canvas.get_pixel(3, 5), Some(red));
    }

    #[test]
    fn test_clipped_drawing_does_not_panic() {
        let mut canvas = Canvas::row_major(RgbImage::new(4, 4));
        draw_text(&mut canvas, -6, 2, "SLEEPY!", Rgb([1, 2, 3]), 3);
        draw_text(&mut canvas, 3, 3, "88", Rgb([1, 2, 3]), 2);
    }
}
