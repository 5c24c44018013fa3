//! Colour-table lookups for palette bands.

use crate::raster::{ColorTable, PaletteInterpretation};

/// Drawn for indices the colour table has no entry for.
pub const MISSING_ENTRY_COLOR: [u8; 4] = [255, 0, 0, 255];

/// RGBA for palette `index`, or `None` if the table has no such entry.
pub fn palette_color(table: &ColorTable, index: usize) -> Option<[u8; 4]> {
    table
        .entry(index)
        .map(|entry| entry_to_rgba(table.interpretation, entry))
}

/// Convert one raw colour-table entry to RGBA.
pub fn entry_to_rgba(interp: PaletteInterpretation, entry: [i16; 4]) -> [u8; 4] {
    let [c1, c2, c3, c4] = entry;
    match interp {
        PaletteInterpretation::Rgb => [channel(c1), channel(c2), channel(c3), channel(c4)],
        PaletteInterpretation::Gray => {
            let g = channel(c1);
            [g, g, g, 255]
        }
        PaletteInterpretation::Cmyk => {
            let [r, g, b] = cmyk_to_rgb(c1, c2, c3, c4);
            [r, g, b, 255]
        }
        PaletteInterpretation::Hls => {
            let [r, g, b] = hls_to_rgb(c1, c2, c3);
            [r, g, b, 255]
        }
    }
}

fn channel(v: i16) -> u8 {
    v.clamp(0, 255) as u8
}

fn unit(v: i16) -> f64 {
    channel(v) as f64 / 255.0
}

fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Components in 0..=255.
fn cmyk_to_rgb(c: i16, m: i16, y: i16, k: i16) -> [u8; 3] {
    let k = unit(k);
    [
        to_byte((1.0 - unit(c)) * (1.0 - k)),
        to_byte((1.0 - unit(m)) * (1.0 - k)),
        to_byte((1.0 - unit(y)) * (1.0 - k)),
    ]
}

/// Hue, lightness and saturation in 0..=255.
fn hls_to_rgb(h: i16, l: i16, s: i16) -> [u8; 3] {
    let (h, l, s) = (unit(h), unit(l), unit(s));
    if s == 0.0 {
        let v = to_byte(l);
        return [v, v, v];
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - s * l };
    let p = 2.0 * l - q;
    [
        to_byte(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        to_byte(hue_to_rgb(p, q, h)),
        to_byte(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    ]
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if 6.0 * t < 1.0 {
        p + (q - p) * 6.0 * t
    } else if 2.0 * t < 1.0 {
        q
    } else if 3.0 * t < 2.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}
