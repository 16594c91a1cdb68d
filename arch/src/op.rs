use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
pub enum Format {
    #[strum(serialize = "1")]
    One,
    #[strum(serialize = "2")]
    Two,
    #[strum(serialize = "3")]
    Three,
    #[strum(serialize = "4")]
    Four,
}

/// One opcode-table entry: the base opcode byte and the instruction
/// formats the mnemonic supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDesc {
    pub code: u8,
    pub formats: Vec<Format>,
}

impl OpDesc {
    pub fn has(&self, fmt: Format) -> bool {
        self.formats.contains(&fmt)
    }
}

// ----------------------------------------------------------------------------
// Opcode table

/// Mnemonic lookup table, loaded once and never mutated afterwards.
pub struct OpTable(IndexMap<String, OpDesc>);

// Entries mirror the loadable resource format: MNEMONIC FORMATS HEXCODE.
const ENTRIES: &[(&str, &str, u8)] = &[
    ("LDA", "3/4", 0x00),
    ("LDX", "3/4", 0x04),
    ("LDL", "3/4", 0x08),
    ("STA", "3/4", 0x0C),
    ("STX", "3/4", 0x10),
    ("STL", "3/4", 0x14),
    ("ADD", "3/4", 0x18),
    ("SUB", "3/4", 0x1C),
    ("MUL", "3/4", 0x20),
    ("DIV", "3/4", 0x24),
    ("COMP", "3/4", 0x28),
    ("TIX", "3/4", 0x2C),
    ("JEQ", "3/4", 0x30),
    ("JGT", "3/4", 0x34),
    ("JLT", "3/4", 0x38),
    ("J", "3/4", 0x3C),
    ("AND", "3/4", 0x40),
    ("OR", "3/4", 0x44),
    ("JSUB", "3/4", 0x48),
    ("RSUB", "3/4", 0x4C),
    ("LDCH", "3/4", 0x50),
    ("STCH", "3/4", 0x54),
    ("ADDF", "3/4", 0x58),
    ("SUBF", "3/4", 0x5C),
    ("MULF", "3/4", 0x60),
    ("DIVF", "3/4", 0x64),
    ("LDB", "3/4", 0x68),
    ("LDS", "3/4", 0x6C),
    ("LDF", "3/4", 0x70),
    ("LDT", "3/4", 0x74),
    ("STB", "3/4", 0x78),
    ("STS", "3/4", 0x7C),
    ("STF", "3/4", 0x80),
    ("STT", "3/4", 0x84),
    ("COMPF", "3/4", 0x88),
    ("ADDR", "2", 0x90),
    ("SUBR", "2", 0x94),
    ("MULR", "2", 0x98),
    ("DIVR", "2", 0x9C),
    ("COMPR", "2", 0xA0),
    ("SHIFTL", "2", 0xA4),
    ("SHIFTR", "2", 0xA8),
    ("RMO", "2", 0xAC),
    ("SVC", "2", 0xB0),
    ("CLEAR", "2", 0xB4),
    ("TIXR", "2", 0xB8),
    ("FLOAT", "1", 0xC0),
    ("FIX", "1", 0xC4),
    ("NORM", "1", 0xC8),
    ("LPS", "3/4", 0xD0),
    ("STI", "3/4", 0xD4),
    ("RD", "3/4", 0xD8),
    ("WD", "3/4", 0xDC),
    ("TD", "3/4", 0xE0),
    ("STSW", "3/4", 0xE8),
    ("SSK", "3/4", 0xEC),
    ("SIO", "1", 0xF0),
    ("HIO", "1", 0xF4),
    ("TIO", "1", 0xF8),
];

static BUILTIN: Lazy<OpTable> = Lazy::new(|| {
    let mut map = IndexMap::new();
    for (mnemonic, formats, code) in ENTRIES {
        let formats = parse_formats(formats).expect("builtin opcode table");
        map.insert(mnemonic.to_string(), OpDesc { code: *code, formats });
    }
    OpTable(map)
});

fn parse_formats(s: &str) -> Result<Vec<Format>, String> {
    s.split('/')
        .map(|f| f.parse::<Format>().map_err(|_| format!("Unknown format: {f}")))
        .collect()
}

impl OpTable {
    /// The standard SIC/XE mnemonic set.
    pub fn builtin() -> &'static OpTable {
        &BUILTIN
    }

    /// Parse an opcode-table resource: one entry per line,
    /// `MNEMONIC FORMAT1[/FORMAT2] HEXCODE`, whitespace-separated.
    pub fn parse(src: &str) -> Result<OpTable, String> {
        let mut map = IndexMap::new();
        for line in src.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            if words.len() != 3 {
                return Err(format!("Bad opcode entry: `{}`", line.trim()));
            }
            let (mnemonic, formats, code) = (words[0], words[1], words[2]);
            let code =
                u8::from_str_radix(code, 16).map_err(|_| format!("Bad opcode byte: {code}"))?;
            let formats = parse_formats(formats)?;
            map.insert(mnemonic.to_string(), OpDesc { code, formats });
        }
        Ok(OpTable(map))
    }

    pub fn get(&self, mnemonic: &str) -> Option<&OpDesc> {
        self.0.get(mnemonic)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        let tab = OpTable::builtin();
        assert_eq!(tab.get("LDA").unwrap().code, 0x00);
        assert_eq!(tab.get("JSUB").unwrap().code, 0x48);
        assert_eq!(tab.get("COMPR").unwrap().formats, vec![Format::Two]);
        assert_eq!(tab.get("FIX").unwrap().formats, vec![Format::One]);
        assert!(tab.get("LDA").unwrap().has(Format::Four));
        assert!(tab.get("NOPE").is_none());
    }

    #[test]
    fn parse_resource() {
        let tab = OpTable::parse("LDA 3/4 00\nFIX 1 C4\n\nCLEAR 2 B4\n").unwrap();
        assert_eq!(tab.len(), 3);
        assert_eq!(tab.get("CLEAR").unwrap().code, 0xB4);
        assert_eq!(
            tab.get("LDA").unwrap().formats,
            vec![Format::Three, Format::Four]
        );
        assert!(OpTable::parse("LDA 3/4").is_err());
        assert!(OpTable::parse("LDA 9 00").is_err());
        assert!(OpTable::parse("LDA 3/4 GG").is_err());
    }
}
