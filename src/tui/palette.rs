//! Todoist color tokens to terminal colors.

use ratatui::style::Color;

const PALETTE: [(&str, (u8, u8, u8)); 20] = [
    ("berry_red", (0xB8, 0x25, 0x5F)),
    ("red", (0xDC, 0x4C, 0x3E)),
    ("orange", (0xC7, 0x71, 0x00)),
    ("yellow", (0xB2, 0x91, 0x04)),
    ("olive_green", (0x94, 0x9C, 0x31)),
    ("lime_green", (0x65, 0xA3, 0x3A)),
    ("green", (0x36, 0x93, 0x07)),
    ("mint_green", (0x42, 0xA3, 0x93)),
    ("teal", (0x14, 0x8F, 0xAD)),
    ("sky_blue", (0x31, 0x9D, 0xC0)),
    ("light_blue", (0x69, 0x88, 0xA4)),
    ("blue", (0x41, 0x80, 0xFF)),
    ("grape", (0x69, 0x2E, 0xC2)),
    ("violet", (0xCA, 0x3F, 0xEE)),
    ("lavender", (0xA4, 0x69, 0x8C)),
    ("magenta", (0xE0, 0x50, 0x95)),
    ("salmon", (0xC9, 0x76, 0x6F)),
    ("charcoal", (0x80, 0x80, 0x80)),
    ("grey", (0x99, 0x99, 0x99)),
    ("taupe", (0x8F, 0x7A, 0x69)),
];

/// Unknown tokens fall back to charcoal.
pub fn todoist_color(token: &str) -> Color {
    let (r, g, b) = PALETTE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(token))
        .map_or((0x80, 0x80, 0x80), |(_, rgb)| *rgb);
    Color::Rgb(r, g, b)
}

/// Todoist's API priority 4 is the UI's "P1".
pub fn priority_color(priority: u8) -> Color {
    match priority {
        4 => Color::Rgb(0xD1, 0x45, 0x3B),
        3 => Color::Rgb(0xEB, 0x89, 0x09),
        2 => Color::Rgb(0x24, 0x6F, 0xE0),
        _ => Color::Reset,
    }
}
