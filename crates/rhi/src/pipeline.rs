//! Fixed-function pipeline state.
//!
//! GL keeps depth, culling and index format as global state rather than in a
//! pipeline object. These types describe that state and convert to GL enums.

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Do not cull any faces.
    None,
    /// Cull front-facing triangles.
    Front,
    /// Cull back-facing triangles.
    #[default]
    Back,
}

impl CullMode {
    /// Converts to the GL face enum. `None` disables culling instead.
    pub fn to_gl(self) -> Option<u32> {
        match self {
            CullMode::None => None,
            CullMode::Front => Some(glow::FRONT),
            CullMode::Back => Some(glow::BACK),
        }
    }
}

/// Depth comparison operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompareOp {
    /// Never passes.
    Never,
    /// Passes if less than.
    #[default]
    Less,
    /// Passes if equal.
    Equal,
    /// Passes if less than or equal.
    LessOrEqual,
    /// Passes if greater than.
    Greater,
    /// Passes if not equal.
    NotEqual,
    /// Passes if greater than or equal.
    GreaterOrEqual,
    /// Always passes.
    Always,
}

impl CompareOp {
    /// Converts to the GL depth function.
    pub fn to_gl(self) -> u32 {
        match self {
            CompareOp::Never => glow::NEVER,
            CompareOp::Less => glow::LESS,
            CompareOp::Equal => glow::EQUAL,
            CompareOp::LessOrEqual => glow::LEQUAL,
            CompareOp::Greater => glow::GREATER,
            CompareOp::NotEqual => glow::NOTEQUAL,
            CompareOp::GreaterOrEqual => glow::GEQUAL,
            CompareOp::Always => glow::ALWAYS,
        }
    }
}

/// Depth test configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthState {
    /// Enable the depth test.
    pub test_enable: bool,
    /// Enable depth writes.
    pub write_enable: bool,
    /// Comparison used when the test is enabled.
    pub compare_op: CompareOp,
}

impl DepthState {
    /// Test and write with `Less`; the state every geometry pass uses.
    pub const OPAQUE: Self = Self {
        test_enable: true,
        write_enable: true,
        compare_op: CompareOp::Less,
    };

    /// Test with `LessOrEqual` and no writes, for a skybox drawn at the far plane.
    pub const SKYBOX: Self = Self {
        test_enable: true,
        write_enable: false,
        compare_op: CompareOp::LessOrEqual,
    };

    /// No depth test, no writes. Used by full-screen passes.
    pub const DISABLED: Self = Self {
        test_enable: false,
        write_enable: false,
        compare_op: CompareOp::Always,
    };
}

impl Default for DepthState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

/// Index element type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexType {
    U16,
    #[default]
    U32,
}

impl IndexType {
    /// Converts to the GL element type.
    pub fn to_gl(self) -> u32 {
        match self {
            IndexType::U16 => glow::UNSIGNED_SHORT,
            IndexType::U32 => glow::UNSIGNED_INT,
        }
    }

    /// Size of one index in bytes.
    pub fn size(self) -> u32 {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}
