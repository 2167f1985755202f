//! Feed colors.
//!
//! Feeds are painted with an index into the 256-color terminal palette. The
//! config bounds hue, saturation and lightness; the allowed range is every
//! palette index whose HSL falls inside those bounds. New feeds get a random
//! pick from that range.

use rand::seq::SliceRandom;
use ratatui::style::{Color, Style};

use crate::config::ColorConfig;

/// Palette index used for the placeholder feed of a failed fetch.
pub const ERROR_COLOR: u8 = 9;

/// Color passed to fetches whose real color is restored afterwards.
pub const NEUTRAL_COLOR: u8 = 0;

/// Picked when the configured bounds admit no color at all.
pub const FALLBACK_COLOR: u8 = 15;

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

const SYSTEM_COLORS: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (128, 0, 0),
    (0, 128, 0),
    (128, 128, 0),
    (0, 0, 128),
    (128, 0, 128),
    (0, 128, 128),
    (192, 192, 192),
    (128, 128, 128),
    (255, 0, 0),
    (0, 255, 0),
    (255, 255, 0),
    (0, 0, 255),
    (255, 0, 255),
    (0, 255, 255),
    (255, 255, 255),
];

// ============================================================================
// Color math
// ============================================================================

/// RGB value of a 256-color palette index (xterm layout).
pub fn indexed_rgb(code: u8) -> (u8, u8, u8) {
    match code {
        0..=15 => SYSTEM_COLORS[code as usize],
        16..=231 => {
            let i = code - 16;
            (
                CUBE_LEVELS[(i / 36) as usize],
                CUBE_LEVELS[((i / 6) % 6) as usize],
                CUBE_LEVELS[(i % 6) as usize],
            )
        }
        _ => {
            let level = 8 + (code - 232) * 10;
            (level, level, level)
        }
    }
}

/// Hue in degrees `[0, 360)`, saturation and lightness in percent, all
/// truncated to integers.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (i32, i32, i32) {
    let rf = f64::from(r) / 255.0;
    let gf = f64::from(g) / 255.0;
    let bf = f64::from(b) / 255.0;
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let l = (max + min) / 2.0;

    if max == min {
        return (0, 0, (l * 100.0) as i32);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == rf {
        let h = (gf - bf) / d;
        if gf < bf {
            h + 6.0
        } else {
            h
        }
    } else if max == gf {
        (bf - rf) / d + 2.0
    } else {
        (rf - gf) / d + 4.0
    };

    ((h * 60.0) as i32, (s * 100.0) as i32, (l * 100.0) as i32)
}

/// Every palette index whose HSL lies inside the configured bounds.
pub fn color_range(bounds: &ColorConfig) -> Vec<u8> {
    (0..=u8::MAX)
        .filter(|&code| {
            let (r, g, b) = indexed_rgb(code);
            let (h, s, l) = rgb_to_hsl(r, g, b);
            (bounds.min_hue..=bounds.max_hue).contains(&h)
                && (bounds.min_saturation..=bounds.max_saturation).contains(&s)
                && (bounds.min_lightness..=bounds.max_lightness).contains(&l)
        })
        .collect()
}

// ============================================================================
// Palette
// ============================================================================

/// The allowed colors for the current config.
#[derive(Debug, Clone)]
pub struct Palette {
    enable_paint: bool,
    allowed: Vec<u8>,
}

impl Palette {
    pub fn from_config(config: &ColorConfig) -> Self {
        let allowed = color_range(config);
        if allowed.is_empty() {
            tracing::warn!(?config, "Color bounds admit no palette entries, using fallback");
        }
        Self {
            enable_paint: config.enable_paint,
            allowed,
        }
    }

    pub fn allowed(&self) -> &[u8] {
        &self.allowed
    }

    pub fn is_allowed(&self, code: u8) -> bool {
        self.allowed.contains(&code)
    }

    pub fn paint_enabled(&self) -> bool {
        self.enable_paint
    }

    /// A random allowed color.
    pub fn random(&self) -> u8 {
        self.allowed
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(FALLBACK_COLOR)
    }

    /// Text style for a feed or item with the given color code.
    ///
    /// With painting disabled every entry renders in the default style.
    pub fn style(&self, code: u8) -> Style {
        if self.enable_paint {
            Style::default().fg(Color::Indexed(code))
        } else {
            Style::default()
        }
    }

    /// Wrap `text` in the 256-color escape for `code`, for line-oriented
    /// output outside a full-screen terminal.
    pub fn paint(&self, code: u8, text: &str) -> String {
        if self.enable_paint {
            format!("\x1b[38;5;{}m{}\x1b[0m", code, text)
        } else {
            text.to_owned()
        }
    }
}
