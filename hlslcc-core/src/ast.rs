//! Abstract syntax tree.
//!
//! Ownership is a strict tree; analyzer decorations are stored as owned
//! facts (flags, resolved denoters, intrinsic ids) rather than references
//! into other parts of the tree.

use crate::intrinsics::Intrinsic;
use crate::source::SourceArea;
use crate::ty::{BufferType, DataType, TypeDenoter, UniformBufferType};
use crate::ShaderTarget;

/// Bit-set of node decorations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags(pub u32);

impl Flags {
    pub const IS_ENTRY_POINT: u32 = 1 << 0;
    pub const IS_SHADER_INPUT: u32 = 1 << 1;
    pub const IS_SHADER_OUTPUT: u32 = 1 << 2;
    pub const IS_SYSTEM_VALUE: u32 = 1 << 3;
    pub const CAN_INLINE_INTRINSIC_WRAPPER: u32 = 1 << 4;
    pub const DISABLE_CODEGEN: u32 = 1 << 5;
    pub const IS_NESTED_STRUCT: u32 = 1 << 6;
    pub const IS_ANONYMOUS: u32 = 1 << 7;
    pub const IS_END_OF_FUNCTION: u32 = 1 << 8;
    pub const IS_FRAG_COORD_USED: u32 = 1 << 9;
    pub const HAS_SM3_SCREEN_SPACE: u32 = 1 << 10;

    pub fn set(&mut self, flag: u32) {
        self.0 |= flag;
    }

    pub fn has(&self, flag: u32) -> bool {
        (self.0 & flag) != 0
    }
}

/* ----- Semantics ----- */

/// System-value semantics (`SV_*`) plus the internal vertex-position marker
/// the analyzer rewrites `SV_Position` into for vertex shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemValue {
    ClipDistance,
    CullDistance,
    Coverage,
    Depth,
    DispatchThreadId,
    DomainLocation,
    GroupId,
    GroupIndex,
    GroupThreadId,
    InstanceId,
    IsFrontFace,
    OutputControlPointId,
    Position,
    PrimitiveId,
    RenderTargetArrayIndex,
    SampleIndex,
    StencilRef,
    Target,
    TessFactor,
    InsideTessFactor,
    VertexId,
    ViewportArrayIndex,
    /// Not a source-level semantic: result of remapping `SV_Position` on a
    /// vertex-shader binding.
    VertexPosition,
}

impl SystemValue {
    fn from_name(upper: &str) -> Option<SystemValue> {
        let sv = match upper {
            "SV_CLIPDISTANCE" => SystemValue::ClipDistance,
            "SV_CULLDISTANCE" => SystemValue::CullDistance,
            "SV_COVERAGE" => SystemValue::Coverage,
            "SV_DEPTH" => SystemValue::Depth,
            "SV_DISPATCHTHREADID" => SystemValue::DispatchThreadId,
            "SV_DOMAINLOCATION" => SystemValue::DomainLocation,
            "SV_GROUPID" => SystemValue::GroupId,
            "SV_GROUPINDEX" => SystemValue::GroupIndex,
            "SV_GROUPTHREADID" => SystemValue::GroupThreadId,
            "SV_INSTANCEID" => SystemValue::InstanceId,
            "SV_ISFRONTFACE" => SystemValue::IsFrontFace,
            "SV_OUTPUTCONTROLPOINTID" => SystemValue::OutputControlPointId,
            "SV_POSITION" => SystemValue::Position,
            "SV_PRIMITIVEID" => SystemValue::PrimitiveId,
            "SV_RENDERTARGETARRAYINDEX" => SystemValue::RenderTargetArrayIndex,
            "SV_SAMPLEINDEX" => SystemValue::SampleIndex,
            "SV_STENCILREF" => SystemValue::StencilRef,
            "SV_TARGET" => SystemValue::Target,
            "SV_TESSFACTOR" => SystemValue::TessFactor,
            "SV_INSIDETESSFACTOR" => SystemValue::InsideTessFactor,
            "SV_VERTEXID" => SystemValue::VertexId,
            "SV_VIEWPORTARRAYINDEX" => SystemValue::ViewportArrayIndex,
            _ => return None,
        };
        Some(sv)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Semantic {
    System(SystemValue),
    User(String),
}

/// Semantic with trailing index digits split off (TEXCOORD0 -> TEXCOORD, 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSemantic {
    pub semantic: Semantic,
    pub index: u32,
}

impl IndexedSemantic {
    /// Parses a semantic identifier. `SV_*` names are matched
    /// case-insensitively, as HLSL does.
    pub fn parse(ident: &str) -> IndexedSemantic {
        let split = ident.len() - ident.chars().rev().take_while(|c| c.is_ascii_digit()).count();
        let (name, digits) = ident.split_at(split);
        let index = digits.parse().unwrap_or(0);

        let upper = name.to_ascii_uppercase();
        let semantic = match SystemValue::from_name(&upper) {
            Some(sv) => Semantic::System(sv),
            None => Semantic::User(name.to_string()),
        };
        IndexedSemantic { semantic, index }
    }

    pub fn is_system_value(&self) -> bool {
        matches!(self.semantic, Semantic::System(_))
    }

    pub fn system_value(&self) -> Option<SystemValue> {
        match self.semantic {
            Semantic::System(sv) => Some(sv),
            Semantic::User(_) => None,
        }
    }

    pub fn to_string(&self) -> String {
        match &self.semantic {
            Semantic::System(sv) => format!("{:?}{}", sv, self.index),
            Semantic::User(name) => {
                if self.index > 0 {
                    format!("{}{}", name, self.index)
                } else {
                    name.clone()
                }
            }
        }
    }
}

/* ----- Operator enums ----- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    LogicalAnd,
    LogicalOr,
    Or,
    Xor,
    And,
    LShift,
    RShift,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl BinaryOp {
    pub fn from_spell(spell: &str) -> Option<BinaryOp> {
        let op = match spell {
            "&&" => BinaryOp::LogicalAnd,
            "||" => BinaryOp::LogicalOr,
            "|" => BinaryOp::Or,
            "^" => BinaryOp::Xor,
            "&" => BinaryOp::And,
            "<<" => BinaryOp::LShift,
            ">>" => BinaryOp::RShift,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "==" => BinaryOp::Equal,
            "!=" => BinaryOp::NotEqual,
            "<" => BinaryOp::Less,
            ">" => BinaryOp::Greater,
            "<=" => BinaryOp::LessEqual,
            ">=" => BinaryOp::GreaterEqual,
            _ => return None,
        };
        Some(op)
    }

    pub fn spell(&self) -> &'static str {
        match self {
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::And => "&",
            BinaryOp::LShift => "<<",
            BinaryOp::RShift => ">>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
        }
    }

    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
                | BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEqual
                | BinaryOp::GreaterEqual
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    LogicalNot,
    Not,
    Nop,
    Negate,
    Inc,
    Dec,
}

impl UnaryOp {
    pub fn from_spell(spell: &str) -> Option<UnaryOp> {
        let op = match spell {
            "!" => UnaryOp::LogicalNot,
            "~" => UnaryOp::Not,
            "+" => UnaryOp::Nop,
            "-" => UnaryOp::Negate,
            "++" => UnaryOp::Inc,
            "--" => UnaryOp::Dec,
            _ => return None,
        };
        Some(op)
    }

    pub fn spell(&self) -> &'static str {
        match self {
            UnaryOp::LogicalNot => "!",
            UnaryOp::Not => "~",
            UnaryOp::Nop => "+",
            UnaryOp::Negate => "-",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LShift,
    RShift,
    Or,
    And,
    Xor,
}

impl AssignOp {
    pub fn from_spell(spell: &str) -> Option<AssignOp> {
        let op = match spell {
            "=" => AssignOp::Set,
            "+=" => AssignOp::Add,
            "-=" => AssignOp::Sub,
            "*=" => AssignOp::Mul,
            "/=" => AssignOp::Div,
            "%=" => AssignOp::Mod,
            "<<=" => AssignOp::LShift,
            ">>=" => AssignOp::RShift,
            "|=" => AssignOp::Or,
            "&=" => AssignOp::And,
            "^=" => AssignOp::Xor,
            _ => return None,
        };
        Some(op)
    }

    pub fn spell(&self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::LShift => "<<=",
            AssignOp::RShift => ">>=",
            AssignOp::Or => "|=",
            AssignOp::And => "&=",
            AssignOp::Xor => "^=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlTransfer {
    Break,
    Continue,
    Discard,
}

impl CtrlTransfer {
    pub fn from_spell(spell: &str) -> Option<CtrlTransfer> {
        match spell {
            "break" => Some(CtrlTransfer::Break),
            "continue" => Some(CtrlTransfer::Continue),
            "discard" => Some(CtrlTransfer::Discard),
            _ => None,
        }
    }

    pub fn spell(&self) -> &'static str {
        match self {
            CtrlTransfer::Break => "break",
            CtrlTransfer::Continue => "continue",
            CtrlTransfer::Discard => "discard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Extern,
    NoInterpolation,
    Precise,
    Shared,
    GroupShared,
    Static,
    Volatile,
    Linear,
    Centroid,
    NoPerspective,
    Sample,
}

impl StorageClass {
    pub fn from_spell(spell: &str) -> Option<StorageClass> {
        let sc = match spell {
            "extern" => StorageClass::Extern,
            "nointerpolation" => StorageClass::NoInterpolation,
            "precise" => StorageClass::Precise,
            "shared" => StorageClass::Shared,
            "groupshared" => StorageClass::GroupShared,
            "static" => StorageClass::Static,
            "volatile" => StorageClass::Volatile,
            "linear" => StorageClass::Linear,
            "centroid" => StorageClass::Centroid,
            "noperspective" => StorageClass::NoPerspective,
            "sample" => StorageClass::Sample,
            _ => return None,
        };
        Some(sc)
    }
}

/// Register classes: t textures, s samplers, b constant buffers, u UAVs,
/// plus the D3D9-era c/i classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterType {
    Undefined,
    ConstantBuffer,
    Texture,
    Sampler,
    UnorderedAccess,
    FloatConstant,
    IntConstant,
}

impl RegisterType {
    pub fn from_char(c: char) -> RegisterType {
        match c {
            'b' | 'B' => RegisterType::ConstantBuffer,
            't' | 'T' => RegisterType::Texture,
            's' | 'S' => RegisterType::Sampler,
            'u' | 'U' => RegisterType::UnorderedAccess,
            'c' | 'C' => RegisterType::FloatConstant,
            'i' | 'I' => RegisterType::IntConstant,
            _ => RegisterType::Undefined,
        }
    }
}

/* ----- Support nodes ----- */

#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    pub shader_target: Option<ShaderTarget>,
    pub register_type: RegisterType,
    pub slot: i32,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackOffset {
    pub register_name: String,
    pub vector_component: Option<String>,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub ident: String,
    pub arguments: Vec<Expr>,
    pub area: SourceArea,
}

/// State value inside a sampler declaration body.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerValue {
    pub name: String,
    pub value: Expr,
    pub area: SourceArea,
}

/// Dotted identifier chain with array indices, e.g. `light[0].color.rgb`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarIdent {
    pub ident: String,
    pub array_indices: Vec<Expr>,
    pub next: Option<Box<VarIdent>>,
    pub area: SourceArea,
    /// Filled by the analyzer: what the leading identifier resolved to.
    pub symbol: Option<SymbolKind>,
}

impl VarIdent {
    pub fn new(ident: impl Into<String>, area: SourceArea) -> Self {
        VarIdent {
            ident: ident.into(),
            array_indices: Vec::new(),
            next: None,
            area,
            symbol: None,
        }
    }

    /// Identifier of the last component in the chain.
    pub fn last_ident(&self) -> &str {
        match &self.next {
            Some(next) => next.last_ident(),
            None => &self.ident,
        }
    }

    pub fn to_string(&self) -> String {
        let mut s = self.ident.clone();
        let mut next = self.next.as_deref();
        while let Some(ident) = next {
            s.push('.');
            s.push_str(&ident.ident);
            next = ident.next.as_deref();
        }
        s
    }
}

/// Kind of declaration an identifier resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Texture,
    Sampler,
    StructType,
    AliasType,
    Function,
}

/* ----- Declarations ----- */

#[derive(Debug, Clone, PartialEq)]
pub struct VarType {
    /// Inline structure declaration, e.g. `struct { ... } v;`.
    pub struct_decl: Option<StructDecl>,
    pub type_denoter: TypeDenoter,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ident: String,
    pub array_dims: Vec<Expr>,
    pub semantic: Option<IndexedSemantic>,
    pub pack_offset: Option<PackOffset>,
    pub initializer: Option<Expr>,
    pub flags: Flags,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDecl {
    pub ident: String,
    pub array_dims: Vec<Expr>,
    pub slot_registers: Vec<Register>,
    pub flags: Flags,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDecl {
    pub ident: String,
    pub array_dims: Vec<Expr>,
    pub slot_registers: Vec<Register>,
    /// DX9-style `texture = <ident>;` binding.
    pub texture_ident: Option<String>,
    pub sampler_values: Vec<SamplerValue>,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub ident: String,
    pub base_struct_name: Option<String>,
    pub members: Vec<VarDeclStmt>,
    pub flags: Flags,
    pub area: SourceArea,
}

impl StructDecl {
    pub fn is_anonymous(&self) -> bool {
        self.ident.is_empty()
    }

    pub fn signature_to_string(&self) -> String {
        if self.is_anonymous() {
            "struct <anonymous>".to_string()
        } else {
            format!("struct '{}'", self.ident)
        }
    }

    pub fn num_members(&self) -> usize {
        self.members.iter().map(|m| m.var_decls.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDecl {
    pub ident: String,
    pub type_denoter: TypeDenoter,
    pub area: SourceArea,
}

/* ----- Declaration statements ----- */

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub attribs: Vec<Attribute>,
    pub return_type: VarType,
    pub ident: String,
    pub parameters: Vec<VarDeclStmt>,
    pub semantic: Option<IndexedSemantic>,
    pub code_block: Option<CodeBlock>,
    pub flags: Flags,
    pub area: SourceArea,
}

impl FunctionDecl {
    pub fn signature_to_string(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| p.var_type.type_denoter.to_string())
            .collect();
        format!("function '{}({})'", self.ident, params.join(", "))
    }

    pub fn has_body(&self) -> bool {
        self.code_block.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDeclStmt {
    pub buffer_type: UniformBufferType,
    pub ident: String,
    pub slot_registers: Vec<Register>,
    pub members: Vec<VarDeclStmt>,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDeclStmt {
    pub texture_type: BufferType,
    /// Generic color type from `Texture2D<float4>`.
    pub color_type: Option<DataType>,
    pub num_samples: Option<i64>,
    pub texture_decls: Vec<TextureDecl>,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDeclStmt {
    /// Sampler type keyword spelling (`sampler2D`, `SamplerState`, ...).
    pub sampler_type: String,
    pub sampler_decls: Vec<SamplerDecl>,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclStmt {
    pub struct_decl: StructDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclStmt {
    pub input_modifier: Option<String>,
    pub storage_classes: Vec<StorageClass>,
    pub type_modifiers: Vec<String>,
    pub var_type: VarType,
    pub var_decls: Vec<VarDecl>,
    pub area: SourceArea,
}

impl VarDeclStmt {
    pub fn is_input(&self) -> bool {
        !matches!(self.input_modifier.as_deref(), Some("out"))
    }

    pub fn is_output(&self) -> bool {
        matches!(self.input_modifier.as_deref(), Some("out") | Some("inout"))
    }

    pub fn is_const(&self) -> bool {
        self.type_modifiers.iter().any(|m| m == "const")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDeclStmt {
    /// Structure declared inline in the typedef.
    pub struct_decl: Option<StructDecl>,
    pub alias_decls: Vec<AliasDecl>,
}

/* ----- Statements ----- */

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// None for the `default` case.
    pub expr: Option<Expr>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseStmt {
    pub body: Box<Stmt>,
    pub area: SourceArea,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub area: SourceArea,
    pub comment: Option<String>,
    pub flags: Flags,
}

impl Stmt {
    pub fn new(kind: StmtKind, area: SourceArea) -> Self {
        Stmt {
            kind,
            area,
            comment: None,
            flags: Flags::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Null,
    CodeBlock(CodeBlock),
    FunctionDecl(FunctionDecl),
    BufferDecl(BufferDeclStmt),
    TextureDecl(TextureDeclStmt),
    SamplerDecl(SamplerDeclStmt),
    StructDecl(StructDeclStmt),
    VarDecl(VarDeclStmt),
    AliasDecl(AliasDeclStmt),
    For {
        attribs: Vec<Attribute>,
        init: Box<Stmt>,
        condition: Option<Expr>,
        iteration: Option<Expr>,
        body: Box<Stmt>,
    },
    While {
        attribs: Vec<Attribute>,
        condition: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        attribs: Vec<Attribute>,
        body: Box<Stmt>,
        condition: Expr,
    },
    If {
        attribs: Vec<Attribute>,
        condition: Expr,
        body: Box<Stmt>,
        else_stmt: Option<ElseStmt>,
    },
    Switch {
        attribs: Vec<Attribute>,
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    Expr(Expr),
    Return(Option<Expr>),
    CtrlTransfer(CtrlTransfer),
}

/* ----- Expressions ----- */

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub data_type: DataType,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarAccessExpr {
    pub var_ident: VarIdent,
    pub assign_op: Option<AssignOp>,
    pub assign_expr: Option<Box<Expr>>,
}

/// Function or type-constructor call. Either `var_ident` (named call,
/// possibly a texture-object method) or `type_denoter` (constructor) is set.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub var_ident: Option<VarIdent>,
    pub type_denoter: Option<TypeDenoter>,
    pub arguments: Vec<Expr>,
    /// Filled by the analyzer when the call names an intrinsic.
    pub intrinsic: Option<Intrinsic>,
    /// Resolved base type of the first argument, filled by the analyzer
    /// for intrinsics whose emission depends on it (`clip`).
    pub intrinsic_arg_type: Option<DataType>,
    pub flags: Flags,
    pub area: SourceArea,
}

impl FunctionCall {
    /// Name the call dispatches on: the trailing component of a dotted
    /// prefix, else the bare identifier.
    pub fn call_ident(&self) -> Option<&str> {
        self.var_ident.as_ref().map(|v| v.last_ident())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub area: SourceArea,
}

impl Expr {
    pub fn new(kind: ExprKind, area: SourceArea) -> Self {
        Expr { kind, area }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Dynamic array dimension `[]`.
    Null,
    /// Comma expression.
    List(Box<Expr>, Box<Expr>),
    Literal(LiteralExpr),
    TypeName(TypeDenoter),
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    PostUnary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call(FunctionCall),
    Bracket(Box<Expr>),
    Suffix {
        expr: Box<Expr>,
        var_ident: VarIdent,
    },
    ArrayAccess {
        expr: Box<Expr>,
        indices: Vec<Expr>,
    },
    Cast {
        type_denoter: TypeDenoter,
        expr: Box<Expr>,
    },
    VarAccess(VarAccessExpr),
    Initializer(Vec<Expr>),
}

/* ----- Program ----- */

/// One flattened entry-point input or output binding.
#[derive(Debug, Clone, PartialEq)]
pub struct IoVar {
    pub ident: String,
    pub data_type: DataType,
    pub semantic: IndexedSemantic,
    pub flags: Flags,
}

/// Entry-point facts collected by the analyzer for the generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryPointInfo {
    pub ident: String,
    pub inputs: Vec<IoVar>,
    pub outputs: Vec<IoVar>,
    /// From a `[numthreads(x, y, z)]` attribute.
    pub num_threads: Option<[u32; 3]>,
    /// Local variable that aliases the output interface (struct returns).
    pub output_alias: Option<String>,
    /// Struct type the entry point returns, if any.
    pub return_struct: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub global_stmts: Vec<Stmt>,
    pub flags: Flags,
    pub entry_point: Option<EntryPointInfo>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            global_stmts: Vec::new(),
            flags: Flags::default(),
            entry_point: None,
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_parsing() {
        let sem = IndexedSemantic::parse("TEXCOORD3");
        assert_eq!(sem.semantic, Semantic::User("TEXCOORD".to_string()));
        assert_eq!(sem.index, 3);
        assert!(!sem.is_system_value());

        let sv = IndexedSemantic::parse("SV_Position");
        assert_eq!(sv.semantic, Semantic::System(SystemValue::Position));
        assert!(sv.is_system_value());

        let target = IndexedSemantic::parse("sv_target2");
        assert_eq!(target.semantic, Semantic::System(SystemValue::Target));
        assert_eq!(target.index, 2);
    }

    #[test]
    fn test_var_ident_chain() {
        use crate::source::SourceArea;
        let mut ident = VarIdent::new("light", SourceArea::ignore());
        ident.next = Some(Box::new(VarIdent::new("color", SourceArea::ignore())));
        assert_eq!(ident.last_ident(), "color");
        assert_eq!(ident.to_string(), "light.color");
    }

    #[test]
    fn test_flags() {
        let mut flags = Flags::default();
        assert!(!flags.has(Flags::IS_ENTRY_POINT));
        flags.set(Flags::IS_ENTRY_POINT);
        flags.set(Flags::IS_SHADER_INPUT);
        assert!(flags.has(Flags::IS_ENTRY_POINT));
        assert!(flags.has(Flags::IS_SHADER_INPUT));
        assert!(!flags.has(Flags::IS_SYSTEM_VALUE));
    }
}
