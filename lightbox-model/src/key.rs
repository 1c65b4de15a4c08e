use std::fmt;

use crate::source::SourceId;

/// Identifies one requested derivative: a source photograph plus the target
/// box it should be scaled into.
///
/// Equality is structural. [`DerivativeKey::rotated`] swaps the target
/// dimensions and represents "the same logical box, rotated 90 degrees";
/// a key is never equal to its rotation unless the box is square.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DerivativeKey {
    pub source: SourceId,
    pub width: u32,
    pub height: u32,
}

impl DerivativeKey {
    pub fn new(source: impl Into<SourceId>, width: u32, height: u32) -> Self {
        Self {
            source: source.into(),
            width,
            height,
        }
    }

    /// The transposed key: same source, width and height swapped.
    pub fn rotated(&self) -> Self {
        Self {
            source: self.source.clone(),
            width: self.height,
            height: self.width,
        }
    }

    /// True when the target box is square, i.e. `rotated()` is a no-op.
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

impl fmt::Debug for DerivativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeKey")
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl fmt::Display for DerivativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}x{}", self.source, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_swaps_dimensions() {
        let key = DerivativeKey::new("a.jpg", 160, 120);
        let rotated = key.rotated();
        assert_eq!(rotated.width, 120);
        assert_eq!(rotated.height, 160);
        assert_eq!(rotated.source, key.source);
    }

    #[test]
    fn rotated_twice_is_identity() {
        let key = DerivativeKey::new("a.jpg", 160, 120);
        assert_eq!(key.rotated().rotated(), key);
    }

    #[test]
    fn key_differs_from_rotation_unless_square() {
        let oblong = DerivativeKey::new("a.jpg", 160, 120);
        assert_ne!(oblong, oblong.rotated());

        let square = DerivativeKey::new("a.jpg", 128, 128);
        assert_eq!(square, square.rotated());
    }

    #[test]
    fn keys_for_different_sources_differ() {
        let a = DerivativeKey::new("a.jpg", 160, 120);
        let b = DerivativeKey::new("b.jpg", 160, 120);
        assert_ne!(a, b);
    }
}
