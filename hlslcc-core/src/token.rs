//! Token representation shared by the scanner, preprocessor and parser.

use crate::source::{SourceArea, SourcePos};

/// Closed set of token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// (letter | '_') (letter | '_' | digit)*
    Ident,

    BoolLiteral,
    IntLiteral,
    FloatLiteral,
    StringLiteral,

    /// =, +=, -=, *=, /=, %=, <<=, >>=, |=, &=, ^=
    AssignOp,
    /// &&, ||, |, ^, &, <<, >>, +, -, *, /, %, ==, !=, <, >, <=, >=
    BinaryOp,
    /// !, ~, ++, --
    UnaryOp,
    /// ?
    TernaryOp,

    Dot,
    Colon,
    Semicolon,
    Comma,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    /// string
    StringType,
    /// bool, int, uint, half, float, double
    ScalarType,
    /// scalar type with a '1'-'4' suffix
    VectorType,
    /// scalar type with a '1'-'4' 'x' '1'-'4' suffix
    MatrixType,

    /// sampler, sampler1D, sampler2D, sampler3D, samplerCUBE
    Sampler,
    /// sampler_state, SamplerState, SamplerComparisonState
    SamplerState,
    /// texture, Texture1D ... RWTexture3D
    Texture,
    /// Buffer, StructuredBuffer, RW* and append/consume variants
    StorageBuffer,
    /// cbuffer, tbuffer
    UniformBuffer,

    /// generic 'vector' keyword (e.g. "vector<float, 3>")
    Vector,
    /// generic 'matrix' keyword (e.g. "matrix<int, 4, 4>")
    Matrix,

    Void,

    /// reserved for future use; not allowed in sources
    Reserved,

    Do,
    While,
    For,
    If,
    Else,
    Switch,
    Case,
    Default,

    Typedef,
    Struct,
    Register,
    PackOffset,

    /// break, continue, discard
    CtrlTransfer,
    Return,

    /// in, out, inout, uniform
    InputModifier,
    /// extern, static, groupshared, shared, volatile, and friends
    StorageClass,
    /// const, row_major, column_major
    TypeModifier,

    Inline,

    Technique,
    Pass,
    Compile,

    /// '#' IDENT
    Directive,
    /// '##'
    DirectiveConcat,
    Comment,
    WhiteSpace,
    NewLine,
    /// line continuation '\' inside a directive
    LineBreak,
    /// '...'
    VarArg,
    Misc,

    EndOfStream,
}

impl TokenKind {
    /// Descriptive name used in "expected X, got Y" diagnostics.
    pub fn describe(&self) -> &'static str {
        use TokenKind::*;
        match self {
            Ident => "identifier",
            BoolLiteral => "boolean literal",
            IntLiteral => "integer literal",
            FloatLiteral => "floating-point literal",
            StringLiteral => "string literal",
            AssignOp => "assign operator",
            BinaryOp => "binary operator",
            UnaryOp => "unary operator",
            TernaryOp => "ternary operator",
            Dot => "'.'",
            Colon => "':'",
            Semicolon => "';'",
            Comma => "','",
            LParen => "'('",
            RParen => "')'",
            LBrace => "'{'",
            RBrace => "'}'",
            LBracket => "'['",
            RBracket => "']'",
            StringType => "string type",
            ScalarType => "scalar type",
            VectorType => "vector type",
            MatrixType => "matrix type",
            Sampler => "sampler type",
            SamplerState => "sampler state",
            Texture => "texture type",
            StorageBuffer => "buffer type",
            UniformBuffer => "uniform buffer",
            Vector => "'vector'",
            Matrix => "'matrix'",
            Void => "'void'",
            Reserved => "reserved keyword",
            Do => "'do'",
            While => "'while'",
            For => "'for'",
            If => "'if'",
            Else => "'else'",
            Switch => "'switch'",
            Case => "'case'",
            Default => "'default'",
            Typedef => "'typedef'",
            Struct => "'struct'",
            Register => "'register'",
            PackOffset => "'packoffset'",
            CtrlTransfer => "control transfer",
            Return => "'return'",
            InputModifier => "input modifier",
            StorageClass => "storage class",
            TypeModifier => "type modifier",
            Inline => "'inline'",
            Technique => "'technique'",
            Pass => "'pass'",
            Compile => "'compile'",
            Directive => "preprocessor directive",
            DirectiveConcat => "'##'",
            Comment => "comment",
            WhiteSpace => "whitespace",
            NewLine => "newline",
            LineBreak => "line break",
            VarArg => "'...'",
            Misc => "miscellaneous token",
            EndOfStream => "end of stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub spell: String,
    pub pos: SourcePos,
}

impl Token {
    pub fn new(kind: TokenKind, spell: impl Into<String>, pos: SourcePos) -> Self {
        Token {
            kind,
            spell: spell.into(),
            pos,
        }
    }

    pub fn area(&self) -> SourceArea {
        SourceArea::new(self.pos, self.spell.chars().count().max(1) as u32)
    }

    /// Spelling without decoration, i.e. the text between the quotes of a
    /// string literal; everything else is returned verbatim.
    pub fn spell_content(&self) -> &str {
        if self.kind == TokenKind::StringLiteral
            && self.spell.len() >= 2
            && self.spell.starts_with('"')
            && self.spell.ends_with('"')
        {
            &self.spell[1..self.spell.len() - 1]
        } else {
            &self.spell
        }
    }
}

/// Classifies an identifier spelling as an HLSL keyword.
pub fn keyword_kind(ident: &str) -> Option<TokenKind> {
    use TokenKind::*;

    if let Some(kind) = type_keyword_kind(ident) {
        return Some(kind);
    }

    let kind = match ident {
        "true" | "false" => BoolLiteral,
        "void" => Void,
        "vector" => Vector,
        "matrix" => Matrix,
        "do" => Do,
        "while" => While,
        "for" => For,
        "if" => If,
        "else" => Else,
        "switch" => Switch,
        "case" => Case,
        "default" => Default,
        "typedef" => Typedef,
        "struct" => Struct,
        "register" => Register,
        "packoffset" => PackOffset,
        "return" => Return,
        "break" | "continue" | "discard" => CtrlTransfer,
        "in" | "out" | "inout" | "uniform" => InputModifier,
        "extern" | "nointerpolation" | "precise" | "shared" | "groupshared" | "static"
        | "volatile" | "linear" | "centroid" | "noperspective" | "sample" => StorageClass,
        "const" | "row_major" | "column_major" => TypeModifier,
        "inline" => Inline,
        "technique" => Technique,
        "pass" => Pass,
        "compile" => Compile,
        "auto" | "catch" | "char" | "class" | "const_cast" | "delete" | "dynamic_cast"
        | "enum" | "explicit" | "friend" | "goto" | "long" | "mutable" | "new" | "operator"
        | "private" | "protected" | "public" | "reinterpret_cast" | "short" | "signed"
        | "sizeof" | "static_cast" | "template" | "this" | "throw" | "try" | "typename"
        | "union" | "unsigned" | "using" | "virtual" => Reserved,
        _ => return None,
    };
    Some(kind)
}

/// Classifies type keywords: scalars with optional vector/matrix suffixes,
/// the sampler and texture families and buffer keywords.
fn type_keyword_kind(ident: &str) -> Option<TokenKind> {
    use TokenKind::*;

    const SCALARS: [&str; 6] = ["bool", "int", "uint", "half", "float", "double"];

    for scalar in SCALARS {
        if let Some(suffix) = ident.strip_prefix(scalar) {
            match suffix.as_bytes() {
                [] => return Some(ScalarType),
                [d] if (b'1'..=b'4').contains(d) => return Some(VectorType),
                [m, b'x', n] if (b'1'..=b'4').contains(m) && (b'1'..=b'4').contains(n) => {
                    return Some(MatrixType)
                }
                _ => {}
            }
        }
    }

    let kind = match ident {
        "string" => StringType,
        "sampler" | "sampler1D" | "sampler2D" | "sampler3D" | "samplerCUBE" => Sampler,
        "sampler_state" | "SamplerState" | "SamplerComparisonState" => SamplerState,
        "texture" | "Texture1D" | "Texture1DArray" | "Texture2D" | "Texture2DArray"
        | "Texture3D" | "TextureCube" | "TextureCubeArray" | "Texture2DMS"
        | "Texture2DMSArray" | "RWTexture1D" | "RWTexture1DArray" | "RWTexture2D"
        | "RWTexture2DArray" | "RWTexture3D" => Texture,
        "Buffer" | "ByteAddressBuffer" | "StructuredBuffer" | "AppendStructuredBuffer"
        | "ConsumeStructuredBuffer" | "RWBuffer" | "RWByteAddressBuffer"
        | "RWStructuredBuffer" => StorageBuffer,
        "cbuffer" | "tbuffer" => UniformBuffer,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_keyword_classification() {
        assert_eq!(keyword_kind("float"), Some(TokenKind::ScalarType));
        assert_eq!(keyword_kind("float3"), Some(TokenKind::VectorType));
        assert_eq!(keyword_kind("float4x4"), Some(TokenKind::MatrixType));
        assert_eq!(keyword_kind("int2x3"), Some(TokenKind::MatrixType));
        assert_eq!(keyword_kind("float5"), None);
        assert_eq!(keyword_kind("Texture2D"), Some(TokenKind::Texture));
        assert_eq!(keyword_kind("StructuredBuffer"), Some(TokenKind::StorageBuffer));
        assert_eq!(keyword_kind("cbuffer"), Some(TokenKind::UniformBuffer));
        assert_eq!(keyword_kind("SamplerState"), Some(TokenKind::SamplerState));
        assert_eq!(keyword_kind("sampler2D"), Some(TokenKind::Sampler));
    }

    #[test]
    fn test_non_keywords_are_idents() {
        assert_eq!(keyword_kind("main"), None);
        assert_eq!(keyword_kind("floatX"), None);
        assert_eq!(keyword_kind("Position"), None);
    }

    #[test]
    fn test_string_literal_content() {
        use crate::source::{FileId, SourcePos};
        let tkn = Token::new(
            TokenKind::StringLiteral,
            "\"file.h\"",
            SourcePos::new(FileId(0), 1, 1),
        );
        assert_eq!(tkn.spell_content(), "file.h");
    }
}
