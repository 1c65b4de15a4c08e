/// Rotation to apply when displaying a photograph, as recorded by the camera.
///
/// Only the four pure rotations are modelled. The mirrored EXIF variants are
/// rare in practice and collapse onto the nearest rotation, which is what the
/// thumbnail path cares about: whether axes swap and which way is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Orientation {
    #[default]
    Normal,
    Rotate90Cw,
    Rotate180,
    Rotate270Cw,
}

impl Orientation {
    /// Map a raw EXIF orientation code (tag 0x0112, values 1..=8) onto a
    /// rotation. Unknown or out-of-range codes read as `Normal`.
    pub fn from_exif_code(code: u32) -> Self {
        match code {
            3 | 4 => Orientation::Rotate180,
            5 | 6 => Orientation::Rotate90Cw,
            7 | 8 => Orientation::Rotate270Cw,
            _ => Orientation::Normal,
        }
    }

    /// Whether displaying at this orientation swaps width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Orientation::Rotate90Cw | Orientation::Rotate270Cw)
    }

    /// Logical (displayed) dimensions for a raster stored at `(width, height)`
    /// in sensor orientation.
    pub fn corrected_dimensions(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        }
    }
}
