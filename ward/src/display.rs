//! Display attributes for areas.
//!
//! Position and color are inert data for whatever layer draws the ward.
//! Nothing in admission reads them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Side of the square an area is drawn as, in pixels.
pub const AREA_SIDE: i32 = 120;

/// Center of an area in the display layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Top-left and bottom-right corners of a square of `side` pixels
    /// centered on this position.
    pub fn bounds(&self, side: i32) -> (Position, Position) {
        let half = side / 2;
        (
            Position::new(self.x.saturating_sub(half), self.y.saturating_sub(half)),
            Position::new(self.x.saturating_add(half), self.y.saturating_add(half)),
        )
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const GRAY: Color = Color::rgb(128, 128, 128);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const ORANGE: Color = Color::rgb(255, 200, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(s: &str) -> Result<Self, ParseColorError> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseColorError(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ParseColorError(s.to_string()))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::GRAY
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}', expected #rrggbb")]
pub struct ParseColorError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_color_is_gray() {
        assert_eq!(Color::default(), Color::GRAY);
    }

    #[test]
    fn color_displays_as_hex() {
        assert_eq!(Color::GRAY.to_string(), "#808080");
        assert_eq!(Color::ORANGE.to_string(), "#ffc800");
    }

    #[test]
    fn color_parses_with_and_without_hash() {
        assert_eq!(Color::from_hex("#ff0000").unwrap(), Color::RED);
        assert_eq!("0000FF".parse::<Color>().unwrap(), Color::BLUE);
    }

    #[test]
    fn color_rejects_malformed_hex() {
        assert!(Color::from_hex("#fff").is_err());
        assert!(Color::from_hex("#gg0000").is_err());
        assert!(Color::from_hex("#ff00ff00").is_err());
        // from_str_radix alone would take a leading sign in each channel
        assert!(Color::from_hex("#+f+f+f").is_err());
        assert!(Color::from_hex("+fffff").is_err());
        assert!(Color::from_hex("#-f0000").is_err());
    }

    #[test]
    fn color_serde_uses_hex_string() {
        assert_eq!(serde_json::to_string(&Color::GREEN).unwrap(), "\"#00ff00\"");
        assert_eq!(
            serde_json::from_str::<Color>("\"#808080\"").unwrap(),
            Color::GRAY
        );
    }

    #[test]
    fn bounds_center_the_square() {
        let (top_left, bottom_right) = Position::new(200, 100).bounds(AREA_SIDE);
        assert_eq!(top_left, Position::new(140, 40));
        assert_eq!(bottom_right, Position::new(260, 160));
    }

    #[test]
    fn bounds_saturate_at_the_edges() {
        let (top_left, bottom_right) = Position::new(i32::MAX, i32::MIN).bounds(AREA_SIDE);
        assert_eq!(top_left, Position::new(i32::MAX - 60, i32::MIN));
        assert_eq!(bottom_right, Position::new(i32::MAX, i32::MIN + 60));
    }
}
