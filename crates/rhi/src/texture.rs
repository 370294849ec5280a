//! Texture descriptions.

/// Texture binding target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    #[default]
    Texture2D,
    CubeMap,
}

impl TextureTarget {
    /// Converts to the GL binding target.
    pub fn to_gl(self) -> u32 {
        match self {
            TextureTarget::Texture2D => glow::TEXTURE_2D,
            TextureTarget::CubeMap => glow::TEXTURE_CUBE_MAP,
        }
    }
}

/// Pixel storage format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGB, decoded images without alpha.
    Rgb8,
    /// 8-bit RGBA.
    Rgba8,
    /// Half-float RGBA, used for G-buffer attachments.
    Rgba16F,
    /// 24-bit depth.
    Depth24,
}

impl TextureFormat {
    /// `(internal format, pixel format, pixel type)` for `glTexImage2D`.
    pub fn to_gl(self) -> (u32, u32, u32) {
        match self {
            TextureFormat::Rgb8 => (glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE),
            TextureFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
            TextureFormat::Rgba16F => (glow::RGBA16F, glow::RGBA, glow::FLOAT),
            TextureFormat::Depth24 => (
                glow::DEPTH_COMPONENT24,
                glow::DEPTH_COMPONENT,
                glow::UNSIGNED_INT,
            ),
        }
    }

    /// Bytes per pixel of client data uploaded in this format.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 => 4,
            TextureFormat::Rgba16F => 16,
            TextureFormat::Depth24 => 4,
        }
    }

    /// Returns true for depth formats.
    #[inline]
    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::Depth24)
    }

    /// Returns true if the format can be a color attachment.
    #[inline]
    pub fn is_color_renderable(self) -> bool {
        !self.is_depth()
    }
}

/// Minification / magnification filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

impl Filter {
    /// GL filter, taking the mipmap variant for minification when mipmaps exist.
    pub fn to_gl(self, mipmapped: bool) -> u32 {
        match (self, mipmapped) {
            (Filter::Nearest, false) => glow::NEAREST,
            (Filter::Linear, false) => glow::LINEAR,
            (Filter::Nearest, true) => glow::NEAREST_MIPMAP_NEAREST,
            (Filter::Linear, true) => glow::LINEAR_MIPMAP_LINEAR,
        }
    }
}

/// Texture coordinate wrapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
}

impl WrapMode {
    pub fn to_gl(self) -> u32 {
        match self {
            WrapMode::Repeat => glow::REPEAT,
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
        }
    }
}

/// Everything needed to allocate a texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub target: TextureTarget,
    pub filter: Filter,
    pub wrap: WrapMode,
    /// Generate a full mip chain after upload.
    pub mipmaps: bool,
}

impl TextureDescriptor {
    /// A 2D texture with linear filtering and repeat wrapping.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            target: TextureTarget::Texture2D,
            filter: Filter::Linear,
            wrap: WrapMode::Repeat,
            mipmaps: false,
        }
    }

    /// A cubemap with square `size` faces, linear filtering and edge clamping.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            width: size,
            height: size,
            format,
            target: TextureTarget::CubeMap,
            filter: Filter::Linear,
            wrap: WrapMode::ClampToEdge,
            mipmaps: false,
        }
    }

    /// A render target attachment: nearest filtering, clamped, no mipmaps.
    pub fn attachment(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            filter: Filter::Nearest,
            wrap: WrapMode::ClampToEdge,
            ..Self::new_2d(width, height, format)
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn with_mipmaps(mut self, mipmaps: bool) -> Self {
        self.mipmaps = mipmaps;
        self
    }

    /// Bytes of client data expected for one face.
    pub fn face_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel() as usize
    }
}

/// Initial contents of a texture.
#[derive(Clone, Copy, Debug)]
pub enum TextureData<'a> {
    /// Storage only, contents undefined (render targets).
    Empty,
    /// Pixels of a 2D texture, bottom row first.
    Pixels(&'a [u8]),
    /// Six faces in `+X, -X, +Y, -Y, +Z, -Z` order.
    CubeFaces([&'a [u8]; 6]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_to_gl() {
        assert_eq!(
            TextureFormat::Rgba16F.to_gl(),
            (glow::RGBA16F, glow::RGBA, glow::FLOAT)
        );
        assert_eq!(TextureFormat::Depth24.to_gl().0, glow::DEPTH_COMPONENT24);
        assert_eq!(TextureFormat::Rgb8.to_gl().1, glow::RGB);
    }

    #[test]
    fn test_format_classification() {
        assert!(TextureFormat::Depth24.is_depth());
        assert!(!TextureFormat::Depth24.is_color_renderable());
        assert!(TextureFormat::Rgba16F.is_color_renderable());
    }

    #[test]
    fn test_filter_mipmap_variants() {
        assert_eq!(Filter::Linear.to_gl(false), glow::LINEAR);
        assert_eq!(Filter::Linear.to_gl(true), glow::LINEAR_MIPMAP_LINEAR);
        assert_eq!(Filter::Nearest.to_gl(false), glow::NEAREST);
    }

    #[test]
    fn test_attachment_descriptor() {
        let desc = TextureDescriptor::attachment(640, 480, TextureFormat::Rgba16F);
        assert_eq!(desc.filter, Filter::Nearest);
        assert_eq!(desc.wrap, WrapMode::ClampToEdge);
        assert!(!desc.mipmaps);
        assert_eq!(desc.target, TextureTarget::Texture2D);
    }

    #[test]
    fn test_face_size() {
        let desc = TextureDescriptor::new_2d(4, 2, TextureFormat::Rgb8);
        assert_eq!(desc.face_size(), 24);
        let cube = TextureDescriptor::new_cube(8, TextureFormat::Rgba8);
        assert_eq!(cube.face_size(), 256);
    }
}
