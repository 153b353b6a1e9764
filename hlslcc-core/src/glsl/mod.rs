//! GLSL output backend: keyword tables, the lowering pass and the code
//! emitter.

pub mod converter;
pub mod generator;
pub mod keywords;

pub use converter::GlslConverter;
pub use generator::generate;
