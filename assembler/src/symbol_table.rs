//! Symbol table for the Hack assembler
//!
//! Predefined platform symbols live in a compile-time perfect hash map;
//! user labels and variables go into a `HashMap` populated during the two
//! passes. Variables allocate RAM addresses from 16 upward on first sight.

use phf::phf_map;
use std::collections::HashMap;

/// First RAM address available to user variables.
pub const FIRST_VARIABLE_ADDRESS: u16 = 16;

/// Built-in Hack platform symbols.
static PREDEFINED_SYMBOLS: phf::Map<&'static str, u16> = phf_map! {
    // Virtual registers
    "R0" => 0,
    "R1" => 1,
    "R2" => 2,
    "R3" => 3,
    "R4" => 4,
    "R5" => 5,
    "R6" => 6,
    "R7" => 7,
    "R8" => 8,
    "R9" => 9,
    "R10" => 10,
    "R11" => 11,
    "R12" => 12,
    "R13" => 13,
    "R14" => 14,
    "R15" => 15,

    // VM segment pointers
    "SP" => 0,
    "LCL" => 1,
    "ARG" => 2,
    "THIS" => 3,
    "THAT" => 4,

    // Memory-mapped I/O
    "SCREEN" => 16384,
    "KBD" => 24576,
};

/// Maps label and variable symbols to addresses.
///
/// # Example
/// ```
/// use hack_assembler::SymbolTable;
///
/// let mut table = SymbolTable::new();
/// assert_eq!(table.address_of("SP"), Some(0));
///
/// table.define("LOOP", 100);
/// assert_eq!(table.address_of("LOOP"), Some(100));
/// ```
#[derive(Debug, Default)]
pub struct SymbolTable {
    user_symbols: HashMap<String, u16>,
    next_variable_address: u16,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_symbols: HashMap::with_capacity(32),
            next_variable_address: FIRST_VARIABLE_ADDRESS,
        }
    }

    /// Records a label symbol at a fixed address (pass 1).
    #[inline]
    pub fn define(&mut self, symbol: &str, address: u16) {
        self.user_symbols.insert(symbol.to_string(), address);
    }

    /// Whether the symbol is known, predefined or user-defined.
    #[inline]
    #[must_use]
    pub fn contains(&self, symbol: &str) -> bool {
        PREDEFINED_SYMBOLS.contains_key(symbol) || self.user_symbols.contains_key(symbol)
    }

    /// The address bound to a symbol, if any.
    #[inline]
    #[must_use]
    pub fn address_of(&self, symbol: &str) -> Option<u16> {
        PREDEFINED_SYMBOLS
            .get(symbol)
            .or_else(|| self.user_symbols.get(symbol))
            .copied()
    }

    /// Resolves a symbol, allocating the next free RAM slot for a variable
    /// seen for the first time. This is the hot path of pass 2.
    #[inline]
    pub fn resolve_or_allocate(&mut self, symbol: &str) -> u16 {
        use std::collections::hash_map::Entry;

        if let Some(&addr) = PREDEFINED_SYMBOLS.get(symbol) {
            return addr;
        }

        match self.user_symbols.entry(symbol.to_string()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let addr = self.next_variable_address;
                self.next_variable_address += 1;
                *e.insert(addr)
            }
        }
    }

    /// Number of user-defined symbols (labels plus variables).
    #[inline]
    #[must_use]
    pub fn user_symbol_count(&self) -> usize {
        self.user_symbols.len()
    }
}
