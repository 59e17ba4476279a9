//! Hex colours from the `color` CSV column.

/// An sRGB colour with alpha, one byte per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba8(pub [u8; 4]);

impl Rgba8 {
    /// Grey used for rows without a colour.
    pub const DEFAULT: Self = Self([102, 102, 102, 255]);

    /// Parse `RRGGBB` or `RRGGBBAA`, with or without a leading `#`.
    pub fn parse_hex(text: &str) -> Option<Self> {
        let digits = text.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if !matches!(digits.len(), 6 | 8) || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let mut rgba = [255; 4];
        for (channel, pair) in rgba.iter_mut().zip(digits.as_bytes().chunks(2)) {
            let pair = std::str::from_utf8(pair).ok()?;
            *channel = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(Self(rgba))
    }

    pub fn is_opaque(self) -> bool {
        self.0[3] == 255
    }
}

impl Default for Rgba8 {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(Rgba8::parse_hex("#ff8000"), Some(Rgba8([255, 128, 0, 255])));
        assert_eq!(Rgba8::parse_hex("FF800080"), Some(Rgba8([255, 128, 0, 128])));
        assert_eq!(Rgba8::parse_hex(" #0000ff "), Some(Rgba8([0, 0, 255, 255])));
    }

    #[test]
    fn test_parse_hex_rejects_malformed() {
        for text in ["", "#", "#fff", "#ff80001", "#gg0000", "red", "#ff 000"] {
            assert_eq!(Rgba8::parse_hex(text), None, "{text:?}");
        }
    }

    #[test]
    fn test_default_is_opaque_grey() {
        assert_eq!(Rgba8::default(), Rgba8([102, 102, 102, 255]));
        assert!(Rgba8::default().is_opaque());
        assert!(!Rgba8([0, 0, 0, 10]).is_opaque());
    }
}
