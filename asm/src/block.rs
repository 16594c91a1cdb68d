use indexmap::IndexMap;

/// Link-time patch: `halves` half-bytes starting at `offset`, adjusted by
/// the signed external `symbol` (sign included, e.g. `+BUFEND`).
#[derive(Debug, Clone, PartialEq)]
pub struct ModRecord {
    pub offset: u32,
    pub halves: u8,
    pub symbol: String,
}

/// One program section, opened by START/CSECT and moved into the result
/// map at the next boundary. Maps keep declaration order so Define/Refer/
/// Modification records come out in source order.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub name: String,
    pub symbols: IndexMap<String, u32>,
    /// Literal tokens pending until the next LTORG/END, deduplicated.
    pub pool: Vec<String>,
    /// Exported symbols; the address resolves when the symbol is defined.
    pub extdef: IndexMap<String, Option<u32>>,
    /// Imported symbol names, in declaration order.
    pub extref: Vec<String>,
    pub mods: Vec<ModRecord>,
}

impl Block {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn resolve(&self, symbol: &str) -> Option<u32> {
        self.symbols.get(symbol).copied()
    }

    /// True for the placeholder section used before any START is seen.
    pub fn is_unnamed_and_empty(&self) -> bool {
        self.name.is_empty() && self.symbols.is_empty() && self.extref.is_empty()
    }
}
