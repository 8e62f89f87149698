//! Texture Descriptions
//!
//! Image data handed over by the asset loader, and the GPU-side environment
//! map handle the patched material samples from.
//!
//! Environment maps arrive as equirectangular panoramas and are projected
//! onto the six cube faces on the CPU: every face texel is turned into a
//! direction and looked up by longitude (`atan2(z, x)`) and latitude
//! (`asin(y)`).

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::errors::{HoloError, Result};
use crate::renderer::core::TextureId;

/// Decoded RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let image = Self {
            width,
            height,
            pixels,
        };
        image.validate()?;
        Ok(image)
    }

    /// Decodes a PNG or JPEG file into RGBA8.
    pub fn decode(bytes: &[u8], label: &str) -> Result<Self> {
        use image::GenericImageView;

        let img = image::load_from_memory(bytes).map_err(|e| HoloError::ImageDecode {
            label: label.to_string(),
            message: e.to_string(),
        })?;
        let (width, height) = img.dimensions();
        log::debug!("Decoded image `{label}` ({width}x{height})");
        Self::new(width, height, img.to_rgba8().into_raw())
    }

    /// Single-colour image.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(width, height, pixels)
    }

    /// Checks that the image is non-empty and `pixels` holds exactly
    /// `width * height` RGBA texels.
    pub fn validate(&self) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.pixels.len() != expected {
            return Err(HoloError::InvalidConfiguration(format!(
                "image {}x{} needs {expected} RGBA bytes, got {}",
                self.width,
                self.height,
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// Bilinear lookup at normalized `(u, v)`; wraps horizontally, clamps
    /// vertically.
    fn sample(&self, u: f32, v: f32) -> [u8; 4] {
        let (w, h) = (self.width as usize, self.height as usize);
        let fx = u * w as f32 - 0.5;
        let fy = (v * h as f32 - 0.5).clamp(0.0, (h - 1) as f32);

        let (x_floor, y_floor) = (fx.floor(), fy.floor());
        let (tx, ty) = (fx - x_floor, fy - y_floor);
        let x0 = (x_floor as i64).rem_euclid(w as i64) as usize;
        let x1 = (x0 + 1) % w;
        let y0 = y_floor as usize;
        let y1 = (y0 + 1).min(h - 1);

        let texel = |x: usize, y: usize, c: usize| f32::from(self.pixels[(y * w + x) * 4 + c]);
        std::array::from_fn(|c| {
            let top = texel(x0, y0, c) + (texel(x1, y0, c) - texel(x0, y0, c)) * tx;
            let bottom = texel(x0, y1, c) + (texel(x1, y1, c) - texel(x0, y1, c)) * tx;
            (top + (bottom - top) * ty).round() as u8
        })
    }
}

/// Six square faces in +X, -X, +Y, -Y, +Z, -Z order, one entry per mip level.
#[derive(Debug, Clone)]
pub struct CubeTextureData {
    pub size: u32,
    pub mips: Vec<[Vec<u8>; 6]>,
}

impl CubeTextureData {
    /// Projects an equirectangular panorama onto a cube, box-filtering each
    /// successive mip so rougher samples read blurrier levels.
    pub fn from_image(image: &ImageData, size: u32) -> Result<Self> {
        image.validate()?;
        if size == 0 || !size.is_power_of_two() {
            return Err(HoloError::InvalidConfiguration(format!(
                "cube size {size} must be a non-zero power of two"
            )));
        }

        let base: [Vec<u8>; 6] = std::array::from_fn(|face| project_face(image, face, size));
        let mut mips = vec![base];
        let mut level_size = size;
        while level_size > 1 {
            let prev = &mips[mips.len() - 1];
            let next = std::array::from_fn(|face| downsample(&prev[face], level_size));
            level_size /= 2;
            mips.push(next);
        }

        Ok(Self { size, mips })
    }

    #[must_use]
    pub fn mip_count(&self) -> u32 {
        self.mips.len() as u32
    }
}

/// World direction through face texel `(u, v)`, both in `[-1, 1]`.
fn face_direction(face: usize, u: f32, v: f32) -> Vec3 {
    let dir = match face {
        0 => Vec3::new(1.0, -v, -u),
        1 => Vec3::new(-1.0, -v, u),
        2 => Vec3::new(u, 1.0, v),
        3 => Vec3::new(u, -1.0, -v),
        4 => Vec3::new(u, -v, 1.0),
        _ => Vec3::new(-u, -v, -1.0),
    };
    dir.normalize()
}

fn project_face(image: &ImageData, face: usize, size: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(size as usize * size as usize * 4);
    for y in 0..size {
        for x in 0..size {
            let u = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
            let v = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
            let dir = face_direction(face, u, v);

            let lon = dir.z.atan2(dir.x);
            let lat = dir.y.clamp(-1.0, 1.0).asin();
            out.extend_from_slice(&image.sample(lon / TAU + 0.5, 0.5 - lat / PI));
        }
    }
    out
}

fn downsample(src: &[u8], size: u32) -> Vec<u8> {
    let half = (size / 2) as usize;
    let size = size as usize;
    let mut out = Vec::with_capacity(half * half * 4);
    for y in 0..half {
        for x in 0..half {
            for c in 0..4 {
                let sum: u32 = [(0, 0), (1, 0), (0, 1), (1, 1)]
                    .iter()
                    .map(|(dx, dy)| u32::from(src[((2 * y + dy) * size + 2 * x + dx) * 4 + c]))
                    .sum();
                out.push((sum / 4) as u8);
            }
        }
    }
    out
}

/// Prefiltered cube radiance map resident on the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentMap {
    pub texture: TextureId,
    pub mip_levels: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    /// 8x4 panorama, blue over the middle half of the longitudes (facing +X),
    /// red elsewhere (facing -X).
    fn split_panorama() -> ImageData {
        let mut pixels = Vec::with_capacity(8 * 4 * 4);
        for _ in 0..4 {
            for x in 0..8 {
                pixels.extend_from_slice(if (2..6).contains(&x) { &BLUE } else { &RED });
            }
        }
        ImageData::new(8, 4, pixels).unwrap()
    }

    fn texels(face: &[u8]) -> impl Iterator<Item = &[u8]> {
        face.chunks_exact(4)
    }

    #[test]
    fn cube_mips_halve_down_to_one_texel() {
        let image = ImageData::solid(8, 4, [255, 128, 0, 255]).unwrap();
        let cube = CubeTextureData::from_image(&image, 16).unwrap();

        assert_eq!(cube.mip_count(), 5);
        assert_eq!(cube.mips[4][0], vec![255, 128, 0, 255]);
    }

    #[test]
    fn panorama_is_projected_per_face() {
        let cube = CubeTextureData::from_image(&split_panorama(), 4).unwrap();
        let base = &cube.mips[0];

        assert_ne!(base[0], base[1]);
        assert!(texels(&base[0]).all(|t| t == BLUE));
        assert!(texels(&base[1]).all(|t| t == RED));

        // Each face keeps its own mip chain.
        let last = cube.mips.last().unwrap();
        assert_eq!(last[0], BLUE.to_vec());
        assert_eq!(last[1], RED.to_vec());
    }

    #[test]
    fn face_directions_point_along_their_axis() {
        let axes = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
        for (face, axis) in axes.iter().enumerate() {
            assert!(face_direction(face, 0.0, 0.0).abs_diff_eq(*axis, 1e-6));
        }
    }

    #[test]
    fn image_size_is_checked() {
        assert!(ImageData::new(2, 2, vec![0; 15]).is_err());
        assert!(ImageData::solid(0, 0, [0; 4]).is_err());
        assert!(
            CubeTextureData::from_image(&ImageData::solid(1, 1, [0; 4]).unwrap(), 12).is_err()
        );
    }

    #[test]
    fn empty_image_is_rejected_before_projection() {
        let empty = ImageData {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };
        let err = CubeTextureData::from_image(&empty, 128).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let decoded = ImageData::decode(&png, "swatch").unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        assert_eq!(&decoded.pixels[..4], &[10, 20, 30, 255]);

        let err = ImageData::decode(b"not an image", "junk").unwrap_err();
        assert!(matches!(err, HoloError::ImageDecode { .. }));
    }
}
