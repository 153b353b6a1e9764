//! Type denoters: the compiler's internal model of source-language types,
//! separate from the AST nodes that spell them.

use std::fmt;

/// Scalar component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Half,
    Float,
    Double,
}

impl ScalarType {
    pub fn keyword(&self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Half => "half",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::UInt)
    }

    pub fn is_real(&self) -> bool {
        matches!(self, ScalarType::Half | ScalarType::Float | ScalarType::Double)
    }
}

/// Base data types: scalars, 1-4 vectors, 1-4 x 1-4 matrices, and string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Scalar(ScalarType),
    Vector(ScalarType, u8),
    Matrix(ScalarType, u8, u8),
}

impl DataType {
    /// Parses an HLSL type keyword ("float", "int3", "half2x4", "string").
    pub fn from_keyword(keyword: &str) -> Option<DataType> {
        if keyword == "string" {
            return Some(DataType::String);
        }
        for scalar in [
            ScalarType::Bool,
            ScalarType::Int,
            ScalarType::UInt,
            ScalarType::Half,
            ScalarType::Float,
            ScalarType::Double,
        ] {
            if let Some(suffix) = keyword.strip_prefix(scalar.keyword()) {
                match suffix.as_bytes() {
                    [] => return Some(DataType::Scalar(scalar)),
                    [d @ b'1'..=b'4'] => return Some(DataType::Vector(scalar, d - b'0')),
                    [m @ b'1'..=b'4', b'x', n @ b'1'..=b'4'] => {
                        return Some(DataType::Matrix(scalar, m - b'0', n - b'0'))
                    }
                    _ => {}
                }
            }
        }
        None
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            DataType::String => None,
            DataType::Scalar(s) | DataType::Vector(s, _) | DataType::Matrix(s, _, _) => Some(*s),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, DataType::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::Vector(_, _))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, DataType::Matrix(_, _, _))
    }

    /// Vector dimension, or matrix dimensions flattened, or 1 for scalars.
    pub fn num_components(&self) -> u32 {
        match self {
            DataType::String => 0,
            DataType::Scalar(_) => 1,
            DataType::Vector(_, n) => u32::from(*n),
            DataType::Matrix(_, m, n) => u32::from(*m) * u32::from(*n),
        }
    }

    /// The data type a single-component subscript yields.
    pub fn base_scalar(&self) -> Option<DataType> {
        self.scalar_type().map(DataType::Scalar)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::String => write!(f, "string"),
            DataType::Scalar(s) => write!(f, "{}", s.keyword()),
            DataType::Vector(s, n) => write!(f, "{}{}", s.keyword(), n),
            DataType::Matrix(s, m, n) => write!(f, "{}{}x{}", s.keyword(), m, n),
        }
    }
}

/// Texture and storage buffer object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    GenericTexture,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    Texture2DMS,
    Texture2DMSArray,
    RWTexture1D,
    RWTexture1DArray,
    RWTexture2D,
    RWTexture2DArray,
    RWTexture3D,
    Buffer,
    ByteAddressBuffer,
    StructuredBuffer,
    AppendStructuredBuffer,
    ConsumeStructuredBuffer,
    RWBuffer,
    RWByteAddressBuffer,
    RWStructuredBuffer,
}

impl BufferType {
    pub fn from_keyword(keyword: &str) -> Option<BufferType> {
        let ty = match keyword {
            "texture" => BufferType::GenericTexture,
            "Texture1D" => BufferType::Texture1D,
            "Texture1DArray" => BufferType::Texture1DArray,
            "Texture2D" => BufferType::Texture2D,
            "Texture2DArray" => BufferType::Texture2DArray,
            "Texture3D" => BufferType::Texture3D,
            "TextureCube" => BufferType::TextureCube,
            "TextureCubeArray" => BufferType::TextureCubeArray,
            "Texture2DMS" => BufferType::Texture2DMS,
            "Texture2DMSArray" => BufferType::Texture2DMSArray,
            "RWTexture1D" => BufferType::RWTexture1D,
            "RWTexture1DArray" => BufferType::RWTexture1DArray,
            "RWTexture2D" => BufferType::RWTexture2D,
            "RWTexture2DArray" => BufferType::RWTexture2DArray,
            "RWTexture3D" => BufferType::RWTexture3D,
            "Buffer" => BufferType::Buffer,
            "ByteAddressBuffer" => BufferType::ByteAddressBuffer,
            "StructuredBuffer" => BufferType::StructuredBuffer,
            "AppendStructuredBuffer" => BufferType::AppendStructuredBuffer,
            "ConsumeStructuredBuffer" => BufferType::ConsumeStructuredBuffer,
            "RWBuffer" => BufferType::RWBuffer,
            "RWByteAddressBuffer" => BufferType::RWByteAddressBuffer,
            "RWStructuredBuffer" => BufferType::RWStructuredBuffer,
            _ => return None,
        };
        Some(ty)
    }

    /// True for the storage-buffer family (as opposed to sampled textures).
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            BufferType::Buffer
                | BufferType::ByteAddressBuffer
                | BufferType::StructuredBuffer
                | BufferType::AppendStructuredBuffer
                | BufferType::ConsumeStructuredBuffer
                | BufferType::RWBuffer
                | BufferType::RWByteAddressBuffer
                | BufferType::RWStructuredBuffer
        )
    }
}

/// cbuffer / tbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformBufferType {
    ConstantBuffer,
    TextureBuffer,
}

impl UniformBufferType {
    pub fn from_keyword(keyword: &str) -> Option<UniformBufferType> {
        match keyword {
            "cbuffer" => Some(UniformBufferType::ConstantBuffer),
            "tbuffer" => Some(UniformBufferType::TextureBuffer),
            _ => None,
        }
    }
}

/// The type algebra. Aliases and struct names are resolved against the
/// analyzer's symbol table, never stored as references.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDenoter {
    Void,
    Base(DataType),
    Texture(BufferType),
    Sampler,
    /// Named structure; anonymous structures get a generated name.
    Struct(String),
    /// Unresolved type name introduced by typedef or forward use.
    Alias(String),
    /// Array with optional pre-evaluated dimensions (None = dynamic).
    Array(Box<TypeDenoter>, Vec<Option<i64>>),
}

impl TypeDenoter {
    pub fn is_void(&self) -> bool {
        matches!(self, TypeDenoter::Void)
    }

    pub fn is_base(&self) -> bool {
        matches!(self, TypeDenoter::Base(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, TypeDenoter::Base(dt) if dt.is_scalar())
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, TypeDenoter::Base(dt) if dt.is_vector())
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, TypeDenoter::Base(dt) if dt.is_matrix())
    }

    pub fn base_type(&self) -> Option<DataType> {
        match self {
            TypeDenoter::Base(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Identifier this denoter was spelled with, for aliases and structs.
    pub fn ident(&self) -> Option<&str> {
        match self {
            TypeDenoter::Struct(ident) | TypeDenoter::Alias(ident) => Some(ident),
            TypeDenoter::Array(base, _) => base.ident(),
            _ => None,
        }
    }

    /// Removes `count` array dimensions, yielding the element type once all
    /// dimensions are peeled.
    pub fn peel_array(&self, count: usize) -> TypeDenoter {
        match self {
            TypeDenoter::Array(base, dims) if count > 0 => {
                if count >= dims.len() {
                    base.as_ref().clone()
                } else {
                    TypeDenoter::Array(base.clone(), dims[count..].to_vec())
                }
            }
            _ => self.clone(),
        }
    }
}

impl fmt::Display for TypeDenoter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDenoter::Void => write!(f, "void"),
            TypeDenoter::Base(dt) => write!(f, "{}", dt),
            TypeDenoter::Texture(_) => write!(f, "texture"),
            TypeDenoter::Sampler => write!(f, "sampler"),
            TypeDenoter::Struct(ident) => write!(f, "struct {}", ident),
            TypeDenoter::Alias(ident) => write!(f, "{}", ident),
            TypeDenoter::Array(base, dims) => {
                write!(f, "{}", base)?;
                for dim in dims {
                    match dim {
                        Some(n) => write!(f, "[{}]", n)?,
                        None => write!(f, "[]")?,
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_from_keyword() {
        assert_eq!(
            DataType::from_keyword("float"),
            Some(DataType::Scalar(ScalarType::Float))
        );
        assert_eq!(
            DataType::from_keyword("int3"),
            Some(DataType::Vector(ScalarType::Int, 3))
        );
        assert_eq!(
            DataType::from_keyword("half2x4"),
            Some(DataType::Matrix(ScalarType::Half, 2, 4))
        );
        assert_eq!(DataType::from_keyword("float0"), None);
        assert_eq!(DataType::from_keyword("vec3"), None);
    }

    #[test]
    fn test_peel_array() {
        let elem = TypeDenoter::Base(DataType::Scalar(ScalarType::Float));
        let arr = TypeDenoter::Array(Box::new(elem.clone()), vec![Some(4), Some(2)]);
        assert_eq!(
            arr.peel_array(1),
            TypeDenoter::Array(Box::new(elem.clone()), vec![Some(2)])
        );
        assert_eq!(arr.peel_array(2), elem);
        assert_eq!(arr.peel_array(5), elem);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TypeDenoter::Base(DataType::Matrix(ScalarType::Float, 4, 4)).to_string(),
            "float4x4"
        );
        let arr = TypeDenoter::Array(
            Box::new(TypeDenoter::Base(DataType::Vector(ScalarType::Float, 2))),
            vec![Some(8)],
        );
        assert_eq!(arr.to_string(), "float2[8]");
    }
}
