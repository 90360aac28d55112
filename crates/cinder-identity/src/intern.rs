// intern.rs
//
// String interning for Symbol IDs.

use crate::Symbol;
use rustc_hash::FxHashMap;

/// Interns strings to unique Symbol IDs
#[derive(Debug, Clone, Default)]
pub struct Interner {
    map: FxHashMap<String, Symbol>,
    strings: Vec<String>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let sym = Symbol::new(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.map.insert(s.to_string(), sym);
        sym
    }

    pub fn resolve(&self, sym: Symbol) -> &str {
        &self.strings[sym.index() as usize]
    }

    /// Returns the number of interned strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if no strings have been interned.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Look up a string to get its symbol, if it has been interned.
    pub fn lookup(&self, s: &str) -> Option<Symbol> {
        self.map.get(s).copied()
    }

    /// Join several symbols with `.`, e.g. a namespace path.
    pub fn join(&self, path: &[Symbol]) -> String {
        let parts: Vec<&str> = path.iter().map(|&s| self.resolve(s)).collect();
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_returns_same_symbol() {
        let mut interner = Interner::new();
        let s1 = interner.intern("hello");
        let s2 = interner.intern("hello");
        let s3 = interner.intern("world");

        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn resolve_returns_original_string() {
        let mut interner = Interner::new();
        let sym = interner.intern("test");
        assert_eq!(interner.resolve(sym), "test");
    }

    #[test]
    fn join_builds_dotted_path() {
        let mut interner = Interner::new();
        let path = [interner.intern("zoo"), interner.intern("birds")];
        assert_eq!(interner.join(&path), "zoo.birds");
        assert_eq!(interner.lookup("birds"), Some(path[1]));
        assert_eq!(interner.lookup("fish"), None);
    }
}
