use crate::language::span::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Variable { mutable: bool },
    Function { arity: usize, index: usize },
}

/// A top-level declaration of one compilation unit. `slot` addresses the
/// value inside that unit's submission record.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub slot: usize,
    pub span: Span,
}

impl Symbol {
    pub fn is_mutable(&self) -> bool {
        matches!(self.kind, SymbolKind::Variable { mutable: true })
    }
}

/// Declarations in slot order. Redeclaring a variable appends a new slot;
/// lookups see the latest one.
#[derive(Clone, Debug, Default)]
pub struct SubmissionSymbols {
    symbols: Vec<Symbol>,
}

impl SubmissionSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, kind: SymbolKind, span: Span) -> &Symbol {
        let slot = self.symbols.len();
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind,
            slot,
            span,
        });
        &self.symbols[slot]
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().rev().find(|symbol| symbol.name == name)
    }

    pub fn get(&self, slot: usize) -> Option<&Symbol> {
        self.symbols.get(slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols
            .iter()
            .filter(|symbol| matches!(symbol.kind, SymbolKind::Function { .. }))
    }

    pub fn slot_names(&self) -> Vec<String> {
        self.symbols.iter().map(|symbol| symbol.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclaration_shadows_but_keeps_slot() {
        let mut symbols = SubmissionSymbols::new();
        let span = Span::new(0, 1);
        symbols.declare("x", SymbolKind::Variable { mutable: false }, span);
        symbols.declare("f", SymbolKind::Function { arity: 1, index: 0 }, span);
        symbols.declare("x", SymbolKind::Variable { mutable: true }, span);

        let latest = symbols.lookup("x").expect("x");
        assert_eq!(latest.slot, 2);
        assert!(latest.is_mutable());
        assert_eq!(symbols.slot_names(), vec!["x", "f", "x"]);
        assert_eq!(symbols.functions().count(), 1);
    }
}
