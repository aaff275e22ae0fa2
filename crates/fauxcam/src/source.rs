//! Source images (single or rotating) and optional pre-encoded still bytes.

use fauxcam_core::prelude::{FrameTransform, Rotation90};
use image::{RgbaImage, imageops};

/// Apply `orientation` to `image`; `None` when it is the identity.
pub fn orient(image: &RgbaImage, orientation: FrameTransform) -> Option<RgbaImage> {
    if orientation.is_identity() {
        return None;
    }
    let rotated = match orientation.rotation {
        Rotation90::Deg0 => image.clone(),
        Rotation90::Deg90 => imageops::rotate90(image),
        Rotation90::Deg180 => imageops::rotate180(image),
        Rotation90::Deg270 => imageops::rotate270(image),
    };
    Some(if orientation.mirror {
        imageops::flip_horizontal(&rotated)
    } else {
        rotated
    })
}

struct SourceEntry {
    original: RgbaImage,
    oriented: Option<RgbaImage>,
}

impl SourceEntry {
    fn new(original: RgbaImage, orientation: FrameTransform) -> Self {
        let oriented = orient(&original, orientation);
        Self { original, oriented }
    }

    fn image(&self) -> &RgbaImage {
        self.oriented.as_ref().unwrap_or(&self.original)
    }
}

/// Owns the configured source images.
///
/// A single image and a rotating list are mutually exclusive; each setter replaces the
/// whole source. Images are stored oriented, so synthesis never rotates per frame.
#[derive(Default)]
pub struct SourceImageStore {
    entries: Vec<SourceEntry>,
    next: usize,
    current: usize,
    still: Option<Vec<u8>>,
    orientation: FrameTransform,
}

impl SourceImageStore {
    /// Replace the source with one image and its optional pre-encoded still.
    pub fn set_single(&mut self, image: RgbaImage, still: Option<Vec<u8>>) {
        self.entries = vec![SourceEntry::new(image, self.orientation)];
        self.next = 0;
        self.current = 0;
        self.still = still;
    }

    /// Replace the source with a rotating list; an empty list clears it.
    pub fn set_rotating(&mut self, images: Vec<RgbaImage>) {
        let orientation = self.orientation;
        self.entries = images
            .into_iter()
            .map(|image| SourceEntry::new(image, orientation))
            .collect();
        self.next = 0;
        self.current = 0;
        self.still = None;
    }

    pub fn set_still(&mut self, bytes: Vec<u8>) {
        self.still = Some(bytes);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.next = 0;
        self.current = 0;
        self.still = None;
    }

    /// Re-derive every stored image for a new orientation.
    pub fn set_orientation(&mut self, orientation: FrameTransform) {
        self.orientation = orientation;
        for entry in &mut self.entries {
            entry.oriented = orient(&entry.original, orientation);
        }
    }

    pub fn orientation(&self) -> FrameTransform {
        self.orientation
    }

    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn is_rotating(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn still(&self) -> Option<&[u8]> {
        self.still.as_deref()
    }

    /// Image for the next synthesized frame; advances a rotating list.
    pub fn advance(&mut self) -> Option<&RgbaImage> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self.next % self.entries.len();
        self.current = idx;
        self.next = (idx + 1) % self.entries.len();
        Some(self.entries[idx].image())
    }

    /// Image most recently handed out (or the first one), without advancing.
    pub fn current(&self) -> Option<&RgbaImage> {
        self.entries.get(self.current).map(SourceEntry::image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(2, 1, Rgba([v, v, v, 255]))
    }

    #[test]
    fn rotating_list_advances_and_wraps() {
        let mut store = SourceImageStore::default();
        store.set_rotating(vec![solid(1), solid(2), solid(3)]);
        assert!(store.is_rotating());
        let seen: Vec<u8> = (0..4)
            .map(|_| store.advance().unwrap().get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(seen, [1, 2, 3, 1]);
        assert_eq!(store.current().unwrap().get_pixel(0, 0).0[0], 1);
        store.set_rotating(vec![solid(5), solid(6)]);
        assert_eq!(store.current().unwrap().get_pixel(0, 0).0[0], 5);
    }

    #[test]
    fn single_image_clears_list_and_still_follows_source() {
        let mut store = SourceImageStore::default();
        store.set_rotating(vec![solid(1), solid(2)]);
        store.set_single(solid(9), Some(vec![0xFF, 0xD8]));
        assert!(!store.is_rotating());
        assert_eq!(store.still(), Some(&[0xFF, 0xD8][..]));
        assert_eq!(store.advance().unwrap().get_pixel(0, 0).0[0], 9);
        store.set_rotating(vec![solid(4)]);
        assert_eq!(store.still(), None);
        store.clear();
        assert!(!store.is_active());
        assert!(store.advance().is_none());
    }

    #[test]
    fn orientation_is_applied_to_stored_images() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let mut store = SourceImageStore::default();
        store.set_single(image, None);
        store.set_orientation(FrameTransform {
            rotation: Rotation90::Deg90,
            mirror: false,
        });
        let oriented = store.advance().unwrap();
        assert_eq!(oriented.dimensions(), (1, 2));
        assert_eq!(oriented.get_pixel(0, 0).0, [255, 0, 0, 255]);

        store.set_orientation(FrameTransform {
            rotation: Rotation90::Deg0,
            mirror: true,
        });
        let mirrored = store.advance().unwrap();
        assert_eq!(mirrored.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }
}
