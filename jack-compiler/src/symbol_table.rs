//! Two-scope identifier registry
//!
//! Class scope holds `static` and `field` symbols for the lifetime of the
//! class; subroutine scope holds arguments and locals and is wiped by the
//! paired begin/end calls around each subroutine. Each kind keeps its own
//! running index: a symbol's index is the count of earlier symbols of the
//! same kind in its scope.

use crate::vm_writer::Segment;
use std::collections::HashMap;

/// Storage class of a Jack identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Static,
    Field,
    Arg,
    Var,
}

impl Kind {
    /// The VM segment this kind of variable lives in.
    #[must_use]
    pub fn segment(self) -> Segment {
        match self {
            Self::Static => Segment::Static,
            Self::Field => Segment::This,
            Self::Arg => Segment::Argument,
            Self::Var => Segment::Local,
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Static => 0,
            Self::Field => 1,
            Self::Arg => 2,
            Self::Var => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub ty: String,
    pub kind: Kind,
    pub index: u16,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    class_symbols: HashMap<String, Symbol>,
    subroutine_symbols: HashMap<String, Symbol>,
    counts: [u16; 4],
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a fresh subroutine scope: the subroutine map and the ARG/VAR
    /// counters reset. STATIC/FIELD counters persist with the class.
    pub fn begin_subroutine(&mut self) {
        self.subroutine_symbols.clear();
        self.counts[Kind::Arg.slot()] = 0;
        self.counts[Kind::Var.slot()] = 0;
    }

    /// Closes the subroutine scope. No subroutine-scope entry survives
    /// this call.
    pub fn end_subroutine(&mut self) {
        self.subroutine_symbols.clear();
    }

    /// Defines a symbol, assigning the next running index of its kind.
    pub fn define(&mut self, name: &str, ty: &str, kind: Kind) {
        let index = self.counts[kind.slot()];
        self.counts[kind.slot()] += 1;

        let symbol = Symbol {
            ty: ty.to_string(),
            kind,
            index,
        };
        match kind {
            Kind::Static | Kind::Field => {
                self.class_symbols.insert(name.to_string(), symbol);
            }
            Kind::Arg | Kind::Var => {
                self.subroutine_symbols.insert(name.to_string(), symbol);
            }
        }
    }

    /// Looks a name up, subroutine scope first, then class scope.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_symbols
            .get(name)
            .or_else(|| self.class_symbols.get(name))
    }

    /// Number of symbols of `kind` defined in its scope so far.
    #[must_use]
    pub fn var_count(&self, kind: Kind) -> u16 {
        self.counts[kind.slot()]
    }

    #[must_use]
    pub fn kind_of(&self, name: &str) -> Option<Kind> {
        self.get(name).map(|s| s.kind)
    }

    #[must_use]
    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.get(name).map(|s| s.ty.as_str())
    }

    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u16> {
        self.get(name).map(|s| s.index)
    }
}
