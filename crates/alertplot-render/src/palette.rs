//! Line colours.

use image::Rgb;

use crate::error::{RenderError, Result};

/// The eight-colour qualitative "Dark2" scheme from `ColorBrewer`.
pub const DARK2: [Rgb<u8>; 8] = [
    Rgb([0x1b, 0x9e, 0x77]),
    Rgb([0xd9, 0x5f, 0x02]),
    Rgb([0x75, 0x70, 0xb3]),
    Rgb([0xe7, 0x29, 0x8a]),
    Rgb([0x66, 0xa6, 0x1e]),
    Rgb([0xe6, 0xab, 0x02]),
    Rgb([0xa6, 0x76, 0x1d]),
    Rgb([0x66, 0x66, 0x66]),
];

/// A fixed list of colours assigned to series by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    /// Creates a palette from a non-empty list of colours.
    pub fn new(colors: Vec<Rgb<u8>>) -> Result<Self> {
        if colors.is_empty() {
            return Err(RenderError::EmptyPalette);
        }
        Ok(Self { colors })
    }

    /// The Dark2 palette.
    #[must_use]
    pub fn dark2() -> Self {
        Self {
            colors: DARK2.to_vec(),
        }
    }

    /// Number of distinct colours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always false; palettes cannot be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Colour of the series at `index`, cycling through the palette.
    #[must_use]
    pub fn color(&self, index: usize) -> Rgb<u8> {
        self.colors[index % self.colors.len()]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::dark2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_colours() {
        let palette = Palette::dark2();
        assert_eq!(palette.len(), 8);
        assert_eq!(palette.color(0), DARK2[0]);
        assert_eq!(palette.color(7), DARK2[7]);
        assert_eq!(palette.color(8), DARK2[0]);
        assert_eq!(palette.color(19), DARK2[3]);
    }

    #[test]
    fn empty_palette_is_rejected() {
        assert!(matches!(Palette::new(Vec::new()), Err(RenderError::EmptyPalette)));
    }

    #[test]
    fn custom_palette() {
        let palette = Palette::new(vec![Rgb([1, 2, 3]), Rgb([4, 5, 6])]).unwrap();
        assert_eq!(palette.color(3), Rgb([4, 5, 6]));
    }
}
