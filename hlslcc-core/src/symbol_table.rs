//! Scoped, overload-aware symbol table.
//!
//! Each scope maps an identifier to an overload set. Function symbols with
//! distinct parameter lists augment the set; everything else is a
//! redefinition error.

use crate::ast::IndexedSemantic;
use crate::ty::{BufferType, DataType, TypeDenoter};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct VarSymbol {
    pub type_denoter: TypeDenoter,
    pub semantic: Option<IndexedSemantic>,
    pub is_const: bool,
    /// Constant buffer the variable is declared inside, if any.
    pub buffer_ident: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureSymbol {
    pub texture_type: BufferType,
    pub color_type: Option<DataType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncSignature {
    pub params: Vec<TypeDenoter>,
    pub return_type: TypeDenoter,
    pub has_body: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Var(VarSymbol),
    Texture(TextureSymbol),
    Sampler,
    StructType(String),
    AliasType(TypeDenoter),
    Func(FuncSignature),
}

impl Symbol {
    fn describe(&self) -> &'static str {
        match self {
            Symbol::Var(_) => "variable",
            Symbol::Texture(_) => "texture",
            Symbol::Sampler => "sampler",
            Symbol::StructType(_) => "structure",
            Symbol::AliasType(_) => "type alias",
            Symbol::Func(_) => "function",
        }
    }
}

/// What `register` decided to do with a same-name entry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    Installed,
    Overloaded,
    /// Redefinition; carries a message describing the clash.
    Rejected(String),
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, Vec<Symbol>>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn open_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn close_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Installs `symbol` in the innermost scope. Functions with distinct
    /// parameter lists form overload sets; any other same-name entry is a
    /// redefinition.
    pub fn register(&mut self, ident: &str, symbol: Symbol) -> RegisterOutcome {
        let scope = self.scopes.last_mut().expect("symbol table has no scope");

        match scope.get_mut(ident) {
            None => {
                scope.insert(ident.to_string(), vec![symbol]);
                RegisterOutcome::Installed
            }
            Some(overloads) => {
                let new_sig = match &symbol {
                    Symbol::Func(sig) => sig.clone(),
                    _ => {
                        return RegisterOutcome::Rejected(format!(
                            "identifier '{}' is already declared as {}",
                            ident,
                            overloads[0].describe()
                        ))
                    }
                };
                for existing in overloads.iter_mut() {
                    match existing {
                        Symbol::Func(sig) if sig.params == new_sig.params => {
                            // Forward declaration followed by a definition
                            // replaces; two definitions clash.
                            if sig.has_body && new_sig.has_body {
                                return RegisterOutcome::Rejected(format!(
                                    "function '{}' is already defined with this signature",
                                    ident
                                ));
                            }
                            *sig = new_sig;
                            return RegisterOutcome::Installed;
                        }
                        Symbol::Func(_) => {}
                        other => {
                            return RegisterOutcome::Rejected(format!(
                                "identifier '{}' is already declared as {}",
                                ident,
                                other.describe()
                            ))
                        }
                    }
                }
                overloads.push(symbol);
                RegisterOutcome::Overloaded
            }
        }
    }

    /// Looks up the overload set for `ident`, walking scopes from innermost
    /// outward.
    pub fn fetch(&self, ident: &str) -> Option<&[Symbol]> {
        for scope in self.scopes.iter().rev() {
            if let Some(overloads) = scope.get(ident) {
                return Some(overloads);
            }
        }
        None
    }

    /// First (and for non-functions only) symbol bound to `ident`.
    pub fn fetch_single(&self, ident: &str) -> Option<&Symbol> {
        self.fetch(ident).and_then(|set| set.first())
    }

    pub fn is_declared_in_current_scope(&self, ident: &str) -> bool {
        self.scopes
            .last()
            .map(|scope| scope.contains_key(ident))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::{DataType, ScalarType};

    fn float_ty() -> TypeDenoter {
        TypeDenoter::Base(DataType::Scalar(ScalarType::Float))
    }

    fn int_ty() -> TypeDenoter {
        TypeDenoter::Base(DataType::Scalar(ScalarType::Int))
    }

    fn var(ty: TypeDenoter) -> Symbol {
        Symbol::Var(VarSymbol {
            type_denoter: ty,
            semantic: None,
            is_const: false,
            buffer_ident: None,
        })
    }

    fn func(params: Vec<TypeDenoter>) -> Symbol {
        Symbol::Func(FuncSignature {
            params,
            return_type: TypeDenoter::Void,
            has_body: true,
        })
    }

    #[test]
    fn test_shadowing_in_inner_scope() {
        let mut table = SymbolTable::new();
        assert_eq!(table.register("x", var(float_ty())), RegisterOutcome::Installed);
        table.open_scope();
        assert_eq!(table.register("x", var(int_ty())), RegisterOutcome::Installed);
        match table.fetch_single("x") {
            Some(Symbol::Var(v)) => assert_eq!(v.type_denoter, int_ty()),
            other => panic!("unexpected symbol: {:?}", other),
        }
        table.close_scope();
        match table.fetch_single("x") {
            Some(Symbol::Var(v)) => assert_eq!(v.type_denoter, float_ty()),
            other => panic!("unexpected symbol: {:?}", other),
        }
    }

    #[test]
    fn test_function_overloading() {
        let mut table = SymbolTable::new();
        assert_eq!(table.register("f", func(vec![float_ty()])), RegisterOutcome::Installed);
        assert_eq!(table.register("f", func(vec![int_ty()])), RegisterOutcome::Overloaded);
        assert_eq!(table.fetch("f").unwrap().len(), 2);
    }

    #[test]
    fn test_redefinition_rejected() {
        let mut table = SymbolTable::new();
        table.register("x", var(float_ty()));
        assert!(matches!(
            table.register("x", var(float_ty())),
            RegisterOutcome::Rejected(_)
        ));
        // A function cannot take a variable's name either.
        assert!(matches!(
            table.register("x", func(vec![])),
            RegisterOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_duplicate_definition_rejected() {
        let mut table = SymbolTable::new();
        table.register("f", func(vec![int_ty()]));
        assert!(matches!(
            table.register("f", func(vec![int_ty()])),
            RegisterOutcome::Rejected(_)
        ));
    }
}
