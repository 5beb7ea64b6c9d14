use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 120, g: 200, b: 255 };
pub const ACCENT: Color = Color::TrueColor { r: 255, g: 180, b: 80 };
pub const SEPARATOR: Color = Color::BrightBlack;
pub const TEXT_DEFAULT: Color = Color::White;
pub const IPV4_ADDR: Color = Color::TrueColor { r: 130, g: 230, b: 130 };
pub const MAC_ADDR: Color = Color::TrueColor { r: 210, g: 160, b: 255 };
pub const SECRET: Color = Color::BrightBlack;
pub const WARNING: Color = Color::Yellow;
