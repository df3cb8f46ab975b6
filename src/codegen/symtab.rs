//! Scoped symbol table
//!
//! Three tables are kept: globals (whole compilation), locals (the callable
//! currently being translated, cleared when it ends) and forward declarations
//! (independent of the other two). Lookups consult them in the order
//! local → forward → global. Redeclaration is checked only against the
//! currently effective table, so a local may shadow a global.
//!
//! Declaring a variable or constant also allocates its storage through the
//! [`IrBuilder`]: stack slots for local integers, globals for everything else.

use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::codegen::errors::SemanticError;
use crate::ir::{FuncId, GlobalKind, IrBuilder, Linkage, Value};
use crate::parser::ast::SourceLocation;

/// Shape of a declared entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Object {
    Integer,
    /// Inclusive bounds, `from < to`
    Array { from: i32, to: i32 },
    Callable { params: usize, returns_value: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Var,
    Const,
}

/// Built-in callables, translated inline rather than called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    WriteLn,
    ReadLn,
    Write,
    Dec,
    Exit,
}

/// Where a symbol lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Pointer to a global or a stack slot
    Address(Value),
    Function(FuncId),
    Intrinsic(Builtin),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    /// Shared by all names of one `var a, b: T` group
    pub object: Rc<Object>,
    pub modifier: Modifier,
    pub storage: Storage,
    /// Value of a constant, usable where a compile-time constant is required
    pub const_value: Option<i32>,
    pub location: SourceLocation,
}

impl Symbol {
    pub fn address(&self) -> Option<Value> {
        match self.storage {
            Storage::Address(value) => Some(value),
            _ => None,
        }
    }
}

type Table = FxHashMap<String, Symbol>;

#[derive(Debug, Default)]
pub struct SymbolTable {
    globals: Table,
    locals: Table,
    forward: Table,
    local_scope: bool,
    function: Option<FuncId>,
    function_ident: String,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    // ===== Scopes =====

    /// Enter the body of callable `ident`; declarations go to the local
    /// table until [`SymbolTable::set_global_scope`].
    pub fn set_local_scope(&mut self, function: FuncId, ident: &str) {
        self.local_scope = true;
        self.function = Some(function);
        self.function_ident = ident.to_string();
    }

    pub fn set_global_scope(&mut self) {
        self.local_scope = false;
        self.function = None;
        self.locals.clear();
    }

    /// Name of the callable whose body is being translated
    pub fn function_ident(&self) -> Option<&str> {
        self.local_scope.then_some(self.function_ident.as_str())
    }

    pub fn function(&self) -> Option<FuncId> {
        self.function
    }

    /// Symbol of the callable whose body is being translated, ignoring
    /// locals that shadow its name.
    pub fn enclosing_callable(&self) -> Option<&Symbol> {
        let ident = self.function_ident()?;
        self.forward.get(ident).or_else(|| self.globals.get(ident))
    }

    fn current_table(&mut self) -> &mut Table {
        if self.local_scope {
            &mut self.locals
        } else {
            &mut self.globals
        }
    }

    // ===== Queries =====

    pub fn get(&self, ident: &str) -> Option<&Symbol> {
        if self.local_scope {
            if let Some(symbol) = self.locals.get(ident) {
                return Some(symbol);
            }
        }
        self.forward
            .get(ident)
            .or_else(|| self.globals.get(ident))
    }

    pub fn exists(&self, ident: &str) -> bool {
        self.exists_global(ident) || self.exists_local(ident) || self.exists_forward(ident)
    }

    pub fn exists_global(&self, ident: &str) -> bool {
        self.globals.contains_key(ident)
    }

    /// Declared in the currently effective table
    pub fn exists_local(&self, ident: &str) -> bool {
        if self.local_scope {
            self.locals.contains_key(ident)
        } else {
            self.globals.contains_key(ident)
        }
    }

    pub fn exists_forward(&self, ident: &str) -> bool {
        self.forward.contains_key(ident)
    }

    pub fn forward_symbol(&self, ident: &str) -> Option<&Symbol> {
        self.forward.get(ident)
    }

    /// Forward declarations that have no definition in the global table
    pub fn undefined_forwards(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.forward
            .iter()
            .filter(|(ident, _)| !self.globals.contains_key(ident.as_str()))
            .map(|(ident, symbol)| (ident.as_str(), symbol))
    }

    // ===== Guards =====

    pub fn ensure_declared(
        &self,
        ident: &str,
        location: SourceLocation,
    ) -> Result<&Symbol, SemanticError> {
        self.get(ident).ok_or_else(|| SemanticError::Undeclared {
            name: ident.to_string(),
            location,
        })
    }

    pub fn ensure_not_declared(
        &self,
        ident: &str,
        location: SourceLocation,
    ) -> Result<(), SemanticError> {
        if self.exists_local(ident) {
            return Err(SemanticError::Redeclared {
                name: ident.to_string(),
                location,
            });
        }
        Ok(())
    }

    pub fn ensure_not_declared_forward(
        &self,
        ident: &str,
        location: SourceLocation,
    ) -> Result<(), SemanticError> {
        if self.exists_forward(ident) {
            return Err(SemanticError::Redeclared {
                name: ident.to_string(),
                location,
            });
        }
        Ok(())
    }

    pub fn ensure_const(
        &self,
        ident: &str,
        location: SourceLocation,
    ) -> Result<&Symbol, SemanticError> {
        let symbol = self.ensure_declared(ident, location)?;
        if symbol.modifier != Modifier::Const {
            return Err(SemanticError::NotConstant {
                what: format!("Var '{}'", ident),
                location,
            });
        }
        Ok(symbol)
    }

    pub fn ensure_not_const(
        &self,
        ident: &str,
        location: SourceLocation,
    ) -> Result<&Symbol, SemanticError> {
        let symbol = self.ensure_declared(ident, location)?;
        if symbol.modifier == Modifier::Const {
            return Err(SemanticError::AssignToConst {
                name: ident.to_string(),
                location,
            });
        }
        Ok(symbol)
    }

    // ===== Declarations =====

    /// Declare a variable and allocate its storage. Pass clones of one
    /// `Rc<Object>` for names declared together.
    pub fn decl_var<B: IrBuilder>(
        &mut self,
        builder: &mut B,
        ident: &str,
        object: Rc<Object>,
        location: SourceLocation,
    ) -> Result<(), SemanticError> {
        self.ensure_not_declared(ident, location)?;

        let address = match *object {
            Object::Integer if self.local_scope => builder.alloca(ident),
            Object::Integer => {
                builder.add_global(ident, GlobalKind::Int(0), false, Linkage::External)
            }
            Object::Array { from, to } => {
                if from >= to {
                    return Err(SemanticError::InvalidArrayBounds {
                        name: ident.to_string(),
                        from,
                        to,
                        location,
                    });
                }
                let len = (i64::from(to) - i64::from(from) + 1) as usize;
                // arrays are globals even inside callables
                builder.add_global(ident, GlobalKind::IntArray(len), false, Linkage::Common)
            }
            Object::Callable { .. } => {
                return Err(SemanticError::NotAssignable {
                    name: ident.to_string(),
                    location,
                })
            }
        };

        debug!(
            "var {} : {:?} ({})",
            ident,
            object,
            if self.local_scope { "local" } else { "global" }
        );
        self.current_table().insert(
            ident.to_string(),
            Symbol {
                object,
                modifier: Modifier::Var,
                storage: Storage::Address(address),
                const_value: None,
                location,
            },
        );
        Ok(())
    }

    /// Declare an integer constant, stored in a constant global.
    pub fn decl_const<B: IrBuilder>(
        &mut self,
        builder: &mut B,
        ident: &str,
        value: i32,
        location: SourceLocation,
    ) -> Result<(), SemanticError> {
        self.ensure_not_declared(ident, location)?;
        let address = builder.add_global(ident, GlobalKind::Int(value), true, Linkage::External);

        debug!("const {} = {}", ident, value);
        self.current_table().insert(
            ident.to_string(),
            Symbol {
                object: Rc::new(Object::Integer),
                modifier: Modifier::Const,
                storage: Storage::Address(address),
                const_value: Some(value),
                location,
            },
        );
        Ok(())
    }

    /// Declare a callable, in the forward table or in the effective one.
    pub fn decl_callable(
        &mut self,
        forward: bool,
        ident: &str,
        object: Object,
        storage: Storage,
        location: SourceLocation,
    ) -> Result<(), SemanticError> {
        if forward {
            self.ensure_not_declared_forward(ident, location)?;
        } else {
            self.ensure_not_declared(ident, location)?;
        }

        debug!(
            "{}callable {} : {:?}",
            if forward { "forward " } else { "" },
            ident,
            object
        );
        let symbol = Symbol {
            object: Rc::new(object),
            modifier: Modifier::Var,
            storage,
            const_value: None,
            location,
        };
        let table = if forward {
            &mut self.forward
        } else {
            self.current_table()
        };
        table.insert(ident.to_string(), symbol);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, ModuleBuilder};

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    fn builder_in_function() -> (ModuleBuilder, FuncId) {
        let mut builder = ModuleBuilder::new("test");
        let f = builder.declare_function("f", 0, false);
        let body = builder.append_block(f, "body");
        builder.set_insert_point(body);
        (builder, f)
    }

    #[test]
    fn test_global_and_local_storage() {
        let (mut builder, f) = builder_in_function();
        let mut table = SymbolTable::new();

        table
            .decl_var(&mut builder, "g", Rc::new(Object::Integer), loc())
            .unwrap();
        assert!(matches!(
            table.get("g").unwrap().storage,
            Storage::Address(Value::Global(_))
        ));

        table.set_local_scope(f, "f");
        table
            .decl_var(&mut builder, "l", Rc::new(Object::Integer), loc())
            .unwrap();
        assert!(matches!(
            table.get("l").unwrap().storage,
            Storage::Address(Value::Reg(_))
        ));
        assert!(matches!(
            builder.module().function(f).blocks[0].instructions[0],
            Instruction::Alloca { .. }
        ));

        table.set_global_scope();
        assert!(table.get("l").is_none());
        assert!(table.get("g").is_some());
    }

    #[test]
    fn test_shared_object() {
        let (mut builder, _) = builder_in_function();
        let mut table = SymbolTable::new();
        let object = Rc::new(Object::Integer);
        table
            .decl_var(&mut builder, "a", Rc::clone(&object), loc())
            .unwrap();
        table
            .decl_var(&mut builder, "b", Rc::clone(&object), loc())
            .unwrap();
        assert!(Rc::ptr_eq(
            &table.get("a").unwrap().object,
            &table.get("b").unwrap().object
        ));
    }

    #[test]
    fn test_redeclaration_and_shadowing() {
        let (mut builder, f) = builder_in_function();
        let mut table = SymbolTable::new();

        table
            .decl_var(&mut builder, "x", Rc::new(Object::Integer), loc())
            .unwrap();
        let err = table
            .decl_var(&mut builder, "x", Rc::new(Object::Integer), loc())
            .unwrap_err();
        assert!(matches!(err, SemanticError::Redeclared { .. }));

        table.set_local_scope(f, "f");
        table
            .decl_var(&mut builder, "x", Rc::new(Object::Integer), loc())
            .unwrap();
        assert!(matches!(
            table.get("x").unwrap().storage,
            Storage::Address(Value::Reg(_))
        ));
        let err = table
            .decl_var(&mut builder, "x", Rc::new(Object::Integer), loc())
            .unwrap_err();
        assert!(matches!(err, SemanticError::Redeclared { .. }));
    }

    #[test]
    fn test_array_bounds() {
        let (mut builder, _) = builder_in_function();
        let mut table = SymbolTable::new();

        table
            .decl_var(
                &mut builder,
                "ok",
                Rc::new(Object::Array { from: -2, to: 7 }),
                loc(),
            )
            .unwrap();
        assert_eq!(builder.module().globals[0].kind, GlobalKind::IntArray(10));
        assert_eq!(builder.module().globals[0].linkage, Linkage::Common);

        for (from, to) in [(5, 1), (3, 3)] {
            let err = table
                .decl_var(
                    &mut builder,
                    "bad",
                    Rc::new(Object::Array { from, to }),
                    loc(),
                )
                .unwrap_err();
            assert!(matches!(err, SemanticError::InvalidArrayBounds { .. }));
        }
    }

    #[test]
    fn test_constants() {
        let (mut builder, _) = builder_in_function();
        let mut table = SymbolTable::new();
        table.decl_const(&mut builder, "n", 42, loc()).unwrap();
        table
            .decl_var(&mut builder, "v", Rc::new(Object::Integer), loc())
            .unwrap();

        assert_eq!(table.ensure_const("n", loc()).unwrap().const_value, Some(42));
        assert!(matches!(
            table.ensure_not_const("n", loc()),
            Err(SemanticError::AssignToConst { .. })
        ));
        assert!(matches!(
            table.ensure_const("v", loc()),
            Err(SemanticError::NotConstant { .. })
        ));
        assert!(builder.module().globals[0].constant);
    }

    #[test]
    fn test_forward_lookup_order() {
        let mut table = SymbolTable::new();
        let object = Object::Callable {
            params: 1,
            returns_value: true,
        };
        table
            .decl_callable(true, "f", object, Storage::Function(FuncId(3)), loc())
            .unwrap();
        assert!(table.exists("f"));
        assert!(table.exists_forward("f"));
        assert!(!table.exists_global("f"));
        assert_eq!(table.undefined_forwards().count(), 1);

        let err = table
            .decl_callable(true, "f", object, Storage::Function(FuncId(3)), loc())
            .unwrap_err();
        assert!(matches!(err, SemanticError::Redeclared { .. }));

        table
            .decl_callable(false, "f", object, Storage::Function(FuncId(3)), loc())
            .unwrap();
        assert!(table.exists_global("f"));
        assert_eq!(table.undefined_forwards().count(), 0);
        assert_eq!(table.get("f").unwrap().storage, Storage::Function(FuncId(3)));
    }

    #[test]
    fn test_enclosing_callable_ignores_locals() {
        let (mut builder, f) = builder_in_function();
        let mut table = SymbolTable::new();
        let object = Object::Callable {
            params: 1,
            returns_value: false,
        };
        table
            .decl_callable(false, "p", object, Storage::Function(f), loc())
            .unwrap();
        table.set_local_scope(f, "p");
        table
            .decl_var(&mut builder, "p", Rc::new(Object::Integer), loc())
            .unwrap();

        assert_eq!(*table.get("p").unwrap().object, Object::Integer);
        assert_eq!(*table.enclosing_callable().unwrap().object, object);
        assert_eq!(table.function_ident(), Some("p"));
        assert_eq!(table.function(), Some(f));
    }

    #[test]
    fn test_undeclared() {
        let table = SymbolTable::new();
        assert!(matches!(
            table.ensure_declared("nope", loc()),
            Err(SemanticError::Undeclared { .. })
        ));
    }
}
