//! Nested-scope symbol resolution for the compiler.

use std::collections::HashMap;

/// Where a resolved name lives, which decides the Get/Set opcodes the
/// compiler emits for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    Free,
    /// The enclosing function's own name, for recursive self-reference.
    Function,
}

/// A resolved binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// A chain of scopes mapping names to symbols. The root scope is Global;
/// each function body pushes a fresh scope on top.
#[derive(Debug, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    /// Running count of bindings defined directly in this scope; becomes
    /// the function's `num_locals`.
    pub num_definitions: usize,
    /// Outer-scope originals this scope closes over, in resolution order.
    /// The compiler loads these, in order, right before `OpClosure`.
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh scope nested inside `outer`.
    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Tear this scope down, yielding the outer scope it wrapped together
    /// with this scope's definition count and captured free symbols.
    pub fn into_parts(self) -> (Option<SymbolTable>, usize, Vec<Symbol>) {
        (self.outer.map(|b| *b), self.num_definitions, self.free_symbols)
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Bind a name in this scope.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Bind a builtin at its registry index.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Bind the enclosing function's own name at the top of its scope.
    pub fn define_function(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Rebind an outer symbol as a free variable of this scope.
    fn define_free(&mut self, original: Symbol) -> Symbol {
        self.free_symbols.push(original.clone());
        let symbol = Symbol {
            name: original.name,
            scope: SymbolScope::Free,
            index: self.free_symbols.len() - 1,
        };
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Resolve a name, walking outward. Globals and builtins propagate
    /// unchanged; anything else crossing a function boundary is rewritten
    /// into a Free binding of this scope.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let symbol = self.outer.as_mut()?.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            _ => Some(self.define_free(symbol)),
        }
    }
}
