//! Texture decoding and upload.
//!
//! Images are decoded with the `image` crate, flipped so the first row is the
//! bottom one (GL texture convention), and uploaded with a full mip chain.
//! Cubemaps are read from six face files in one directory and are not flipped.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use prism_rhi::GraphicsDevice;
use prism_rhi::TextureHandle;
use prism_rhi::texture::{TextureData, TextureDescriptor, TextureFormat, WrapMode};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Index returned when a texture could not be loaded.
pub const INVALID_TEXTURE: usize = usize::MAX;

/// Index of the 1x1 white placeholder every registry starts with.
pub const WHITE_TEXTURE: usize = 0;

/// Face file stems of a cubemap directory, in `+X, -X, +Y, -Y, +Z, -Z` order.
pub const CUBEMAP_FACES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// What a texture is sampled as. Decides the wrap mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Albedo,
    Normal,
    Height,
    Cubemap,
}

impl TextureKind {
    /// Albedo and normal maps tile; height maps and cubemaps clamp so that
    /// relief offsets and seams do not sample the opposite edge.
    pub fn wrap_mode(self) -> WrapMode {
        match self {
            TextureKind::Albedo | TextureKind::Normal => WrapMode::Repeat,
            TextureKind::Height | TextureKind::Cubemap => WrapMode::ClampToEdge,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureKind::Albedo => "albedo",
            TextureKind::Normal => "normal",
            TextureKind::Height => "height",
            TextureKind::Cubemap => "cubemap",
        }
    }
}

/// A texture owned by the registry.
#[derive(Clone, Debug)]
pub struct Texture {
    pub handle: TextureHandle,
    /// Source path, used as the deduplication key. Empty for generated textures.
    pub path: PathBuf,
    pub kind: TextureKind,
}

/// Decoded pixels ready for upload.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    fn from_dynamic(path: &Path, image: DynamicImage) -> ResourceResult<Self> {
        let (width, height) = (image.width(), image.height());
        let (format, pixels) = match image.color().channel_count() {
            // Grey images are widened to RGB(A)
            1 | 3 => (TextureFormat::Rgb8, image.into_rgb8().into_raw()),
            2 | 4 => (TextureFormat::Rgba8, image.into_rgba8().into_raw()),
            channels => {
                return Err(ResourceError::UnsupportedChannels {
                    path: path.to_path_buf(),
                    channels,
                });
            }
        };
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }
}

/// Decodes an image file, flipping it vertically.
pub fn decode_image(path: &Path) -> ResourceResult<DecodedImage> {
    decode(path, true)
}

fn decode(path: &Path, flip: bool) -> ResourceResult<DecodedImage> {
    if !path.exists() {
        return Err(ResourceError::FileNotFound(path.to_path_buf()));
    }
    let image = image::open(path)?;
    let image = if flip { image.flipv() } else { image };
    DecodedImage::from_dynamic(path, image)
}

/// Uploads a decoded 2D image as a mipmapped texture.
pub fn create_texture(
    device: &mut dyn GraphicsDevice,
    image: &DecodedImage,
    kind: TextureKind,
) -> ResourceResult<TextureHandle> {
    let desc = TextureDescriptor::new_2d(image.width, image.height, image.format)
        .with_wrap(kind.wrap_mode())
        .with_mipmaps(true);
    let handle = device.create_texture(&desc, TextureData::Pixels(&image.pixels))?;
    debug!(
        "Created {} texture {} ({}x{} {:?})",
        kind.name(),
        handle,
        image.width,
        image.height,
        image.format
    );
    Ok(handle)
}

/// Creates the 1x1 opaque white texture used for absent slots.
pub fn create_white_texture(device: &mut dyn GraphicsDevice) -> ResourceResult<TextureHandle> {
    let desc = TextureDescriptor::new_2d(1, 1, TextureFormat::Rgba8);
    Ok(device.create_texture(&desc, TextureData::Pixels(&[255, 255, 255, 255]))?)
}

/// Finds `<dir>/<stem>.{png,jpg,jpeg}`.
fn find_face(dir: &Path, stem: &str) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.exists())
}

/// Decodes the six faces of a cubemap directory.
///
/// All faces are converted to RGBA8 and must be square and of equal size.
pub fn decode_cubemap(dir: &Path) -> ResourceResult<[DecodedImage; 6]> {
    let invalid = |message: String| ResourceError::InvalidCubemap {
        path: dir.to_path_buf(),
        message,
    };

    let mut faces = Vec::with_capacity(6);
    for stem in CUBEMAP_FACES {
        let path = find_face(dir, stem).ok_or_else(|| invalid(format!("missing face '{stem}'")))?;
        let image = image::open(&path)?;
        faces.push(DecodedImage {
            width: image.width(),
            height: image.height(),
            format: TextureFormat::Rgba8,
            pixels: image.into_rgba8().into_raw(),
        });
    }

    let size = faces[0].width;
    if let Some(bad) = faces
        .iter()
        .position(|face| face.width != size || face.height != size)
    {
        return Err(invalid(format!(
            "face '{}' is {}x{}, expected {}x{}",
            CUBEMAP_FACES[bad], faces[bad].width, faces[bad].height, size, size
        )));
    }

    faces
        .try_into()
        .map_err(|_| invalid("expected six faces".to_string()))
}

/// Uploads six decoded faces as a cubemap.
pub fn create_cubemap(
    device: &mut dyn GraphicsDevice,
    faces: &[DecodedImage; 6],
) -> ResourceResult<TextureHandle> {
    let desc = TextureDescriptor::new_cube(faces[0].width, faces[0].format)
        .with_wrap(TextureKind::Cubemap.wrap_mode())
        .with_mipmaps(true);
    let data = TextureData::CubeFaces([
        &faces[0].pixels,
        &faces[1].pixels,
        &faces[2].pixels,
        &faces[3].pixels,
        &faces[4].pixels,
        &faces[5].pixels,
    ]);
    let handle = device.create_texture(&desc, data)?;
    debug!("Created cubemap {} ({}px faces)", handle, faces[0].width);
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_rhi::HeadlessDevice;

    fn write_png(path: &Path, width: u32, height: u32, rgba: bool) {
        if rgba {
            image::RgbaImage::from_fn(width, height, |_, y| image::Rgba([y as u8, 0, 0, 255]))
                .save(path)
                .unwrap();
        } else {
            image::RgbImage::from_fn(width, height, |_, y| image::Rgb([y as u8, 0, 0]))
                .save(path)
                .unwrap();
        }
    }

    #[test]
    fn test_wrap_defaults() {
        assert_eq!(TextureKind::Albedo.wrap_mode(), WrapMode::Repeat);
        assert_eq!(TextureKind::Normal.wrap_mode(), WrapMode::Repeat);
        assert_eq!(TextureKind::Height.wrap_mode(), WrapMode::ClampToEdge);
        assert_eq!(TextureKind::Cubemap.wrap_mode(), WrapMode::ClampToEdge);
    }

    #[test]
    fn test_decode_flips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.png");
        write_png(&path, 2, 4, false);

        let image = decode_image(&path).unwrap();
        assert_eq!((image.width, image.height), (2, 4));
        assert_eq!(image.format, TextureFormat::Rgb8);
        // Bottom source row (y = 3) comes first
        assert_eq!(image.pixels[0], 3);
        assert_eq!(image.pixels[image.pixels.len() - 3], 0);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_image(Path::new("/nonexistent/texture.png")).unwrap_err();
        assert!(matches!(err, ResourceError::FileNotFound(_)));
    }

    #[test]
    fn test_create_texture_uses_kind_wrap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("height.png");
        write_png(&path, 4, 4, true);

        let mut device = HeadlessDevice::new();
        let image = decode_image(&path).unwrap();
        let handle = create_texture(&mut device, &image, TextureKind::Height).unwrap();

        let desc = device.texture(handle).unwrap();
        assert_eq!(desc.wrap, WrapMode::ClampToEdge);
        assert_eq!(desc.format, TextureFormat::Rgba8);
        assert!(desc.mipmaps);
    }

    #[test]
    fn test_decode_cubemap() {
        let dir = tempfile::tempdir().unwrap();
        for stem in CUBEMAP_FACES {
            write_png(&dir.path().join(format!("{stem}.png")), 8, 8, false);
        }

        let faces = decode_cubemap(dir.path()).unwrap();
        assert!(faces.iter().all(|f| f.format == TextureFormat::Rgba8));

        let mut device = HeadlessDevice::new();
        let handle = create_cubemap(&mut device, &faces).unwrap();
        assert_eq!(
            device.texture(handle).unwrap().target,
            prism_rhi::texture::TextureTarget::CubeMap
        );
    }

    #[test]
    fn test_decode_cubemap_rejects_mismatched_faces() {
        let dir = tempfile::tempdir().unwrap();
        for stem in CUBEMAP_FACES {
            let size = if stem == "top" { 4 } else { 8 };
            write_png(&dir.path().join(format!("{stem}.png")), size, size, false);
        }
        assert!(matches!(
            decode_cubemap(dir.path()),
            Err(ResourceError::InvalidCubemap { .. })
        ));

        std::fs::remove_file(dir.path().join("back.png")).unwrap();
        assert!(matches!(
            decode_cubemap(dir.path()),
            Err(ResourceError::InvalidCubemap { .. })
        ));
    }
}
