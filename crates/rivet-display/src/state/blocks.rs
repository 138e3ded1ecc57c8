use crate::error::DisplayError;
use crate::math::lerp;

macro_rules! int_enum {
    ($name:ident, $kind:literal, { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl TryFrom<i32> for $name {
            type Error = DisplayError;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => {
                        log::error!("invalid {}: {value}", $kind);
                        Err(DisplayError::InvalidEnum { kind: $kind, value })
                    }
                }
            }
        }
    };
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Subtract,
    Modulate,
    CopySrc,
    AlphaMask,
    AlphaKnockOut,
    AlphaMultiply,
    WeightedMultiply,
    InvertDest,
    NoEffect,
}

int_enum!(BlendMode, "blend mode", {
    Normal = 0,
    Add = 1,
    Subtract = 2,
    Modulate = 3,
    CopySrc = 4,
    AlphaMask = 5,
    AlphaKnockOut = 6,
    AlphaMultiply = 7,
    WeightedMultiply = 8,
    InvertDest = 9,
    NoEffect = 10,
});

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstColor,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendOp {
    Add,
    /// `src - dst`.
    Subtract,
}

/// Source factor, destination factor and operator applied to both colour and alpha.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlendEquation {
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
}

impl BlendMode {
    pub fn equation(self) -> BlendEquation {
        use BlendFactor::*;
        let (src, dst, op) = match self {
            BlendMode::Normal => (SrcAlpha, InvSrcAlpha, BlendOp::Add),
            BlendMode::Add => (SrcAlpha, One, BlendOp::Add),
            BlendMode::Subtract => (SrcAlpha, Zero, BlendOp::Add),
            BlendMode::Modulate => (Zero, SrcColor, BlendOp::Add),
            BlendMode::CopySrc => (One, Zero, BlendOp::Add),
            BlendMode::AlphaMask => (Zero, One, BlendOp::Add),
            BlendMode::AlphaKnockOut => (Zero, One, BlendOp::Add),
            BlendMode::AlphaMultiply => (SrcAlpha, Zero, BlendOp::Add),
            BlendMode::WeightedMultiply => (DstColor, SrcColor, BlendOp::Add),
            BlendMode::InvertDest => (One, One, BlendOp::Subtract),
            BlendMode::NoEffect => (Zero, One, BlendOp::Add),
        };
        BlendEquation { src, dst, op }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum CullMode {
    Back,
    Front,
    #[default]
    None,
}

int_enum!(CullMode, "cull mode", {
    Back = 0,
    Front = 1,
    None = 2,
});

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum ZTestMode {
    #[default]
    Off,
    WriteOnPass,
    WriteOnFail,
}

int_enum!(ZTestMode, "z-test mode", {
    Off = 0,
    WriteOnPass = 1,
    WriteOnFail = 2,
});

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CompareFunc {
    Always,
    LessEqual,
    Greater,
}

impl ZTestMode {
    pub fn compare(self) -> CompareFunc {
        match self {
            ZTestMode::Off => CompareFunc::Always,
            ZTestMode::WriteOnPass => CompareFunc::LessEqual,
            ZTestMode::WriteOnFail => CompareFunc::Greater,
        }
    }
}

/// How a texture unit combines its sample with the incoming colour.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum TextureMode {
    #[default]
    Modulate,
    /// Keeps the incoming colour; alpha is modulated.
    Glow,
    /// Adds colour; alpha is modulated.
    Add,
}

int_enum!(TextureMode, "texture mode", {
    Modulate = 0,
    Glow = 1,
    Add = 2,
});

impl TextureMode {
    pub(crate) fn shader_code(self) -> u32 {
        match self {
            TextureMode::Modulate => 0,
            TextureMode::Glow => 1,
            TextureMode::Add => 2,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct BlendState {
    pub mode: BlendMode,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct DepthStencilState {
    pub write: bool,
    pub test: ZTestMode,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RasterState {
    pub cull: CullMode,
    /// Viewport depth range `[min, max]`, adjusted by z-bias.
    pub depth_range: [f32; 2],
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull: CullMode::None,
            depth_range: [0.0, 1.0],
        }
    }
}

/// Depth range for a z-bias in `[0, 1]`: `0` is the full range, `1` pulls geometry
/// toward the viewer.
pub fn z_bias_range(bias: f32) -> [f32; 2] {
    [lerp(0.05, 0.0, bias), lerp(1.0, 0.95, bias)]
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct SamplerState {
    pub linear: bool,
    pub wrap: bool,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self {
            linear: true,
            wrap: false,
        }
    }
}
