//! Keyword tables for the GLSL output language.

use crate::ast::{IndexedSemantic, SystemValue};
use crate::ty::{BufferType, DataType, ScalarType};
use crate::ShaderTarget;

/// Maps a base data type to its GLSL keyword, or `None` if the type has no
/// GLSL counterpart.
pub fn data_type_to_glsl(data_type: DataType) -> Option<String> {
    let keyword = match data_type {
        DataType::String => return None,
        DataType::Scalar(scalar) => scalar_keyword(scalar).to_string(),
        DataType::Vector(scalar, 1) => scalar_keyword(scalar).to_string(),
        DataType::Vector(scalar, n) => format!("{}vec{}", vector_prefix(scalar), n),
        DataType::Matrix(scalar, 1, 1) => scalar_keyword(scalar).to_string(),
        DataType::Matrix(scalar, m, 1) => format!("{}vec{}", vector_prefix(scalar), m),
        DataType::Matrix(scalar, 1, n) => format!("{}vec{}", vector_prefix(scalar), n),
        DataType::Matrix(scalar, m, n) => {
            // Non-float matrices have no direct GLSL form below 4.x; emit
            // the float matrix type as the closest match.
            let _ = scalar;
            if m == n {
                format!("mat{}", m)
            } else {
                format!("mat{}x{}", m, n)
            }
        }
    };
    Some(keyword)
}

fn scalar_keyword(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Bool => "bool",
        ScalarType::Int => "int",
        ScalarType::UInt => "uint",
        ScalarType::Half => "float",
        ScalarType::Float => "float",
        ScalarType::Double => "double",
    }
}

fn vector_prefix(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Bool => "b",
        ScalarType::Int => "i",
        ScalarType::UInt => "u",
        ScalarType::Half | ScalarType::Float => "",
        ScalarType::Double => "d",
    }
}

/// Maps a texture object type to the combined GLSL sampler keyword.
pub fn texture_type_to_glsl(buffer_type: BufferType) -> Option<&'static str> {
    let keyword = match buffer_type {
        BufferType::GenericTexture => "sampler2D",
        BufferType::Texture1D => "sampler1D",
        BufferType::Texture1DArray => "sampler1DArray",
        BufferType::Texture2D => "sampler2D",
        BufferType::Texture2DArray => "sampler2DArray",
        BufferType::Texture3D => "sampler3D",
        BufferType::TextureCube => "samplerCube",
        BufferType::TextureCubeArray => "samplerCubeArray",
        BufferType::Texture2DMS => "sampler2DMS",
        BufferType::Texture2DMSArray => "sampler2DMSArray",
        BufferType::RWTexture1D => "image1D",
        BufferType::RWTexture1DArray => "image1DArray",
        BufferType::RWTexture2D => "image2D",
        BufferType::RWTexture2DArray => "image2DArray",
        BufferType::RWTexture3D => "image3D",
        _ => return None,
    };
    Some(keyword)
}

/// Maps a system-value semantic to the GLSL built-in variable for the
/// given stage and direction, or `None` for user-defined varyings.
pub fn semantic_to_glsl(
    semantic: &IndexedSemantic,
    target: ShaderTarget,
    output: bool,
) -> Option<String> {
    let sv = semantic.system_value()?;
    let keyword = match sv {
        SystemValue::VertexPosition => "gl_Position",
        SystemValue::Position => {
            if target == ShaderTarget::Fragment && !output {
                "gl_FragCoord"
            } else {
                "gl_Position"
            }
        }
        SystemValue::Depth => "gl_FragDepth",
        SystemValue::VertexId => "gl_VertexID",
        SystemValue::InstanceId => "gl_InstanceID",
        SystemValue::IsFrontFace => "gl_FrontFacing",
        SystemValue::PrimitiveId => "gl_PrimitiveID",
        SystemValue::SampleIndex => "gl_SampleID",
        SystemValue::DispatchThreadId => "gl_GlobalInvocationID",
        SystemValue::GroupId => "gl_WorkGroupID",
        SystemValue::GroupIndex => "gl_LocalInvocationIndex",
        SystemValue::GroupThreadId => "gl_LocalInvocationID",
        SystemValue::DomainLocation => "gl_TessCoord",
        SystemValue::OutputControlPointId => "gl_InvocationID",
        SystemValue::TessFactor => "gl_TessLevelOuter",
        SystemValue::InsideTessFactor => "gl_TessLevelInner",
        SystemValue::ClipDistance => "gl_ClipDistance",
        SystemValue::CullDistance => "gl_CullDistance",
        SystemValue::Coverage => "gl_SampleMask",
        SystemValue::RenderTargetArrayIndex => "gl_Layer",
        SystemValue::ViewportArrayIndex => "gl_ViewportIndex",
        SystemValue::StencilRef => return None,
        // Fragment targets become ordinary 'out' variables.
        SystemValue::Target => return None,
    };
    Some(keyword.to_string())
}

/// Reserved GLSL keywords and built-in prefixes that require name mangling
/// when used as identifiers in the source.
pub fn is_glsl_keyword(ident: &str) -> bool {
    if ident.starts_with("gl_") {
        return true;
    }
    const KEYWORDS: [&str; 60] = [
        "attribute",
        "varying",
        "uniform",
        "buffer",
        "shared",
        "layout",
        "centroid",
        "flat",
        "smooth",
        "noperspective",
        "patch",
        "sample",
        "precision",
        "highp",
        "mediump",
        "lowp",
        "vec2",
        "vec3",
        "vec4",
        "ivec2",
        "ivec3",
        "ivec4",
        "uvec2",
        "uvec3",
        "uvec4",
        "bvec2",
        "bvec3",
        "bvec4",
        "dvec2",
        "dvec3",
        "dvec4",
        "mat2",
        "mat3",
        "mat4",
        "mat2x2",
        "mat2x3",
        "mat2x4",
        "mat3x2",
        "mat3x3",
        "mat3x4",
        "mat4x2",
        "mat4x3",
        "mat4x4",
        "sampler1D",
        "sampler2D",
        "sampler3D",
        "samplerCube",
        "sampler1DArray",
        "sampler2DArray",
        "samplerCubeArray",
        "sampler2DShadow",
        "texture",
        "texelFetch",
        "textureLod",
        "textureGrad",
        "textureProj",
        "discard",
        "input",
        "output",
        "mix",
    ];
    KEYWORDS.contains(&ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_table() {
        assert_eq!(
            data_type_to_glsl(DataType::Matrix(ScalarType::Float, 4, 4)).as_deref(),
            Some("mat4")
        );
        assert_eq!(
            data_type_to_glsl(DataType::Matrix(ScalarType::Float, 3, 4)).as_deref(),
            Some("mat3x4")
        );
        assert_eq!(
            data_type_to_glsl(DataType::Vector(ScalarType::Float, 3)).as_deref(),
            Some("vec3")
        );
        assert_eq!(
            data_type_to_glsl(DataType::Vector(ScalarType::Int, 2)).as_deref(),
            Some("ivec2")
        );
        assert_eq!(
            data_type_to_glsl(DataType::Scalar(ScalarType::Half)).as_deref(),
            Some("float")
        );
        assert_eq!(data_type_to_glsl(DataType::String), None);
    }

    #[test]
    fn test_texture_table() {
        assert_eq!(
            texture_type_to_glsl(BufferType::Texture2D),
            Some("sampler2D")
        );
        assert_eq!(
            texture_type_to_glsl(BufferType::TextureCube),
            Some("samplerCube")
        );
        assert_eq!(texture_type_to_glsl(BufferType::Buffer), None);
    }

    #[test]
    fn test_semantic_mapping_depends_on_stage() {
        let pos = IndexedSemantic::parse("SV_Position");
        assert_eq!(
            semantic_to_glsl(&pos, ShaderTarget::Fragment, false).as_deref(),
            Some("gl_FragCoord")
        );
        assert_eq!(
            semantic_to_glsl(&pos, ShaderTarget::Vertex, true).as_deref(),
            Some("gl_Position")
        );
        let uv = IndexedSemantic::parse("TEXCOORD0");
        assert_eq!(semantic_to_glsl(&uv, ShaderTarget::Vertex, false), None);
    }

    #[test]
    fn test_keyword_set() {
        assert!(is_glsl_keyword("varying"));
        assert!(is_glsl_keyword("gl_Position"));
        assert!(!is_glsl_keyword("color"));
    }
}
