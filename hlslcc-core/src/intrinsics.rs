//! Intrinsic function registry.
//!
//! Maps intrinsic names to ids, minimum shader models and categories, and
//! upgrades overloaded ids by argument count.

use std::fmt;

/// Numeric capability level gating intrinsics and types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShaderModel {
    pub major: u32,
    pub minor: u32,
}

impl ShaderModel {
    pub const fn new(major: u32, minor: u32) -> Self {
        ShaderModel { major, minor }
    }
}

impl fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicCategory {
    Default,
    /// Method intrinsics on texture objects (`obj.Sample(...)`).
    Texture,
    /// Compute-stage synchronization.
    Barrier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Abs,
    ACos,
    All,
    Any,
    ASin,
    AsDouble,
    AsFloat,
    AsInt,
    AsUInt1,
    AsUInt3,
    ATan,
    ATan2,
    Ceil,
    Clamp,
    Clip,
    Cos,
    CosH,
    Cross,
    DDX,
    DDY,
    Degrees,
    Determinant,
    Distance,
    Dot,
    Exp,
    Exp2,
    Floor,
    FMod,
    Frac,
    IsInf,
    IsNaN,
    Length,
    Lerp,
    Log,
    Log2,
    Log10,
    Max,
    Min,
    Mul,
    Normalize,
    Pow,
    Radians,
    Reflect,
    Refract,
    Round,
    RSqrt,
    Saturate,
    Sign,
    Sin,
    SinH,
    SmoothStep,
    Sqrt,
    Step,
    Tan,
    TanH,
    Transpose,
    Trunc,

    GroupMemoryBarrier,
    GroupMemoryBarrierWithGroupSync,
    DeviceMemoryBarrier,
    DeviceMemoryBarrierWithGroupSync,
    AllMemoryBarrier,
    AllMemoryBarrierWithGroupSync,

    Tex1D2,
    Tex1D4,
    Tex2D2,
    Tex2D4,
    Tex3D2,
    Tex3D4,
    TexCube2,
    TexCube4,

    TextureGetDimensions,
    TextureLoad1,
    TextureLoad2,
    TextureLoad3,
    TextureSample2,
    TextureSample3,
    TextureSample4,
    TextureSample5,
    TextureSampleBias3,
    TextureSampleBias4,
    TextureSampleBias5,
    TextureSampleBias6,
    TextureSampleCmp3,
    TextureSampleCmp4,
    TextureSampleCmp5,
    TextureSampleCmp6,
    TextureSampleGrad4,
    TextureSampleGrad5,
    TextureSampleGrad6,
    TextureSampleGrad7,
    TextureSampleLevel3,
    TextureSampleLevel4,
    TextureSampleLevel5,
}

impl Intrinsic {
    pub fn is_texture_method(&self) -> bool {
        use Intrinsic::*;
        matches!(
            self,
            TextureGetDimensions
                | TextureLoad1
                | TextureLoad2
                | TextureLoad3
                | TextureSample2
                | TextureSample3
                | TextureSample4
                | TextureSample5
                | TextureSampleBias3
                | TextureSampleBias4
                | TextureSampleBias5
                | TextureSampleBias6
                | TextureSampleCmp3
                | TextureSampleCmp4
                | TextureSampleCmp5
                | TextureSampleCmp6
                | TextureSampleGrad4
                | TextureSampleGrad5
                | TextureSampleGrad6
                | TextureSampleGrad7
                | TextureSampleLevel3
                | TextureSampleLevel4
                | TextureSampleLevel5
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntrinsicEntry {
    pub intrinsic: Intrinsic,
    pub min_shader_model: ShaderModel,
    pub category: IntrinsicCategory,
}

/// Looks up an intrinsic by its call name.
pub fn find_intrinsic(name: &str) -> Option<IntrinsicEntry> {
    use Intrinsic as I;
    use IntrinsicCategory as C;

    const SM1: ShaderModel = ShaderModel::new(1, 0);
    const SM2: ShaderModel = ShaderModel::new(2, 0);
    const SM3: ShaderModel = ShaderModel::new(3, 0);
    const SM4: ShaderModel = ShaderModel::new(4, 0);
    const SM5: ShaderModel = ShaderModel::new(5, 0);

    let entry = |intrinsic, min_shader_model, category| IntrinsicEntry {
        intrinsic,
        min_shader_model,
        category,
    };

    let found = match name {
        "abs" => entry(I::Abs, SM1, C::Default),
        "acos" => entry(I::ACos, SM1, C::Default),
        "all" => entry(I::All, SM1, C::Default),
        "any" => entry(I::Any, SM1, C::Default),
        "asin" => entry(I::ASin, SM1, C::Default),
        "asdouble" => entry(I::AsDouble, SM5, C::Default),
        "asfloat" => entry(I::AsFloat, SM4, C::Default),
        "asint" => entry(I::AsInt, SM4, C::Default),
        "asuint" => entry(I::AsUInt1, SM4, C::Default),
        "atan" => entry(I::ATan, SM1, C::Default),
        "atan2" => entry(I::ATan2, SM1, C::Default),
        "ceil" => entry(I::Ceil, SM1, C::Default),
        "clamp" => entry(I::Clamp, SM1, C::Default),
        "clip" => entry(I::Clip, SM1, C::Default),
        "cos" => entry(I::Cos, SM1, C::Default),
        "cosh" => entry(I::CosH, SM1, C::Default),
        "cross" => entry(I::Cross, SM1, C::Default),
        "ddx" => entry(I::DDX, SM2, C::Default),
        "ddy" => entry(I::DDY, SM2, C::Default),
        "degrees" => entry(I::Degrees, SM1, C::Default),
        "determinant" => entry(I::Determinant, SM1, C::Default),
        "distance" => entry(I::Distance, SM1, C::Default),
        "dot" => entry(I::Dot, SM1, C::Default),
        "exp" => entry(I::Exp, SM1, C::Default),
        "exp2" => entry(I::Exp2, SM1, C::Default),
        "floor" => entry(I::Floor, SM1, C::Default),
        "fmod" => entry(I::FMod, SM1, C::Default),
        "frac" => entry(I::Frac, SM1, C::Default),
        "isinf" => entry(I::IsInf, SM1, C::Default),
        "isnan" => entry(I::IsNaN, SM1, C::Default),
        "length" => entry(I::Length, SM1, C::Default),
        "lerp" => entry(I::Lerp, SM1, C::Default),
        "log" => entry(I::Log, SM1, C::Default),
        "log2" => entry(I::Log2, SM1, C::Default),
        "log10" => entry(I::Log10, SM1, C::Default),
        "max" => entry(I::Max, SM1, C::Default),
        "min" => entry(I::Min, SM1, C::Default),
        "mul" => entry(I::Mul, SM1, C::Default),
        "normalize" => entry(I::Normalize, SM1, C::Default),
        "pow" => entry(I::Pow, SM1, C::Default),
        "radians" => entry(I::Radians, SM1, C::Default),
        "reflect" => entry(I::Reflect, SM1, C::Default),
        "refract" => entry(I::Refract, SM1, C::Default),
        "round" => entry(I::Round, SM1, C::Default),
        "rsqrt" => entry(I::RSqrt, SM1, C::Default),
        "saturate" => entry(I::Saturate, SM1, C::Default),
        "sign" => entry(I::Sign, SM1, C::Default),
        "sin" => entry(I::Sin, SM1, C::Default),
        "sinh" => entry(I::SinH, SM1, C::Default),
        "smoothstep" => entry(I::SmoothStep, SM1, C::Default),
        "sqrt" => entry(I::Sqrt, SM1, C::Default),
        "step" => entry(I::Step, SM1, C::Default),
        "tan" => entry(I::Tan, SM1, C::Default),
        "tanh" => entry(I::TanH, SM1, C::Default),
        "transpose" => entry(I::Transpose, SM1, C::Default),
        "trunc" => entry(I::Trunc, SM1, C::Default),

        "GroupMemoryBarrier" => entry(I::GroupMemoryBarrier, SM5, C::Barrier),
        "GroupMemoryBarrierWithGroupSync" => {
            entry(I::GroupMemoryBarrierWithGroupSync, SM5, C::Barrier)
        }
        "DeviceMemoryBarrier" => entry(I::DeviceMemoryBarrier, SM5, C::Barrier),
        "DeviceMemoryBarrierWithGroupSync" => {
            entry(I::DeviceMemoryBarrierWithGroupSync, SM5, C::Barrier)
        }
        "AllMemoryBarrier" => entry(I::AllMemoryBarrier, SM5, C::Barrier),
        "AllMemoryBarrierWithGroupSync" => {
            entry(I::AllMemoryBarrierWithGroupSync, SM5, C::Barrier)
        }

        "tex1D" => entry(I::Tex1D2, SM1, C::Default),
        "tex2D" => entry(I::Tex2D2, SM1, C::Default),
        "tex3D" => entry(I::Tex3D2, SM1, C::Default),
        "texCUBE" => entry(I::TexCube2, SM1, C::Default),

        "GetDimensions" => entry(I::TextureGetDimensions, SM4, C::Texture),
        "Load" => entry(I::TextureLoad1, SM4, C::Texture),
        "Sample" => entry(I::TextureSample2, SM4, C::Texture),
        "SampleBias" => entry(I::TextureSampleBias3, SM4, C::Texture),
        "SampleCmp" => entry(I::TextureSampleCmp3, SM4, C::Texture),
        "SampleGrad" => entry(I::TextureSampleGrad4, SM4, C::Texture),
        "SampleLevel" => entry(I::TextureSampleLevel3, SM4, C::Texture),

        _ => return None,
    };
    Some(found)
}

/// Upgrades an intrinsic id by argument count for intrinsics with
/// overloaded argument lists. Ordered; the first match wins.
pub fn upgrade_intrinsic(intrinsic: Intrinsic, num_args: usize) -> Intrinsic {
    use Intrinsic as I;

    const CONVERSIONS: [(Intrinsic, usize, Intrinsic); 21] = [
        (I::AsUInt1, 3, I::AsUInt3),
        (I::Tex1D2, 4, I::Tex1D4),
        (I::Tex2D2, 4, I::Tex2D4),
        (I::Tex3D2, 4, I::Tex3D4),
        (I::TexCube2, 4, I::TexCube4),
        (I::TextureLoad1, 2, I::TextureLoad2),
        (I::TextureLoad1, 3, I::TextureLoad3),
        (I::TextureSample2, 3, I::TextureSample3),
        (I::TextureSample2, 4, I::TextureSample4),
        (I::TextureSample2, 5, I::TextureSample5),
        (I::TextureSampleBias3, 4, I::TextureSampleBias4),
        (I::TextureSampleBias3, 5, I::TextureSampleBias5),
        (I::TextureSampleBias3, 6, I::TextureSampleBias6),
        (I::TextureSampleCmp3, 4, I::TextureSampleCmp4),
        (I::TextureSampleCmp3, 5, I::TextureSampleCmp5),
        (I::TextureSampleCmp3, 6, I::TextureSampleCmp6),
        (I::TextureSampleGrad4, 5, I::TextureSampleGrad5),
        (I::TextureSampleGrad4, 6, I::TextureSampleGrad6),
        (I::TextureSampleGrad4, 7, I::TextureSampleGrad7),
        (I::TextureSampleLevel3, 4, I::TextureSampleLevel4),
        (I::TextureSampleLevel3, 5, I::TextureSampleLevel5),
    ];

    for (base, argc, upgraded) in CONVERSIONS {
        if intrinsic == base && num_args == argc {
            return upgraded;
        }
    }
    intrinsic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_and_shader_model() {
        let clip = find_intrinsic("clip").unwrap();
        assert_eq!(clip.intrinsic, Intrinsic::Clip);

        let sample = find_intrinsic("Sample").unwrap();
        assert_eq!(sample.intrinsic, Intrinsic::TextureSample2);
        assert_eq!(sample.min_shader_model, ShaderModel::new(4, 0));
        assert_eq!(sample.category, IntrinsicCategory::Texture);

        assert!(find_intrinsic("Sampler").is_none());
        assert!(find_intrinsic("main").is_none());
    }

    #[test]
    fn test_shader_model_ordering() {
        assert!(ShaderModel::new(3, 0) < ShaderModel::new(4, 0));
        assert!(ShaderModel::new(4, 1) > ShaderModel::new(4, 0));
    }

    #[test]
    fn test_argc_upgrades() {
        use Intrinsic as I;
        assert_eq!(upgrade_intrinsic(I::AsUInt1, 3), I::AsUInt3);
        assert_eq!(upgrade_intrinsic(I::AsUInt1, 1), I::AsUInt1);
        assert_eq!(upgrade_intrinsic(I::Tex2D2, 4), I::Tex2D4);
        assert_eq!(upgrade_intrinsic(I::TextureLoad1, 2), I::TextureLoad2);
        assert_eq!(upgrade_intrinsic(I::TextureLoad1, 3), I::TextureLoad3);
        assert_eq!(upgrade_intrinsic(I::TextureSample2, 5), I::TextureSample5);
        assert_eq!(upgrade_intrinsic(I::TextureSampleBias3, 6), I::TextureSampleBias6);
        assert_eq!(upgrade_intrinsic(I::TextureSampleCmp3, 4), I::TextureSampleCmp4);
        assert_eq!(upgrade_intrinsic(I::TextureSampleGrad4, 7), I::TextureSampleGrad7);
        assert_eq!(upgrade_intrinsic(I::TextureSampleLevel3, 5), I::TextureSampleLevel5);
        // No conversion listed: id stays as recorded.
        assert_eq!(upgrade_intrinsic(I::TextureSample2, 2), I::TextureSample2);
    }
}
