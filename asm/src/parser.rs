use arch::directive::Directive;
use arch::op::OpTable;

use crate::error::Error;

// ----------------------------------------------------------------------------
// Operand

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    One(String),
    List(Vec<String>),
}

impl Operand {
    pub fn first(&self) -> Option<&str> {
        match self {
            Operand::None => None,
            Operand::One(s) => Some(s),
            Operand::List(l) => l.first().map(|s| s.as_str()),
        }
    }

    pub fn second(&self) -> Option<&str> {
        match self {
            Operand::List(l) => l.get(1).map(|s| s.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::One(s) => write!(f, "{}", s),
            Operand::List(l) => write!(f, "{}", l.join(",")),
        }
    }
}

// ----------------------------------------------------------------------------
// Instruction

/// One source statement. `location` is filled in by pass one, `code` by
/// pass two; literal-pool placeholders (symbol `*`) are synthesized between
/// the two.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub line: usize,
    pub symbol: Option<String>,
    pub mnemonic: String,
    pub operand: Operand,
    pub location: Option<u32>,
    pub code: Vec<u8>,
}

/// Mnemonics taking a register pair, tried before the symbol+mnemonic
/// reading of a three-token line.
const TWO_REG: &[&str] = &["ADDR", "COMPR", "DIVR", "MULR", "RMO", "SHIFTL", "SHIFTR"];

/// Zero-operand mnemonics that may still carry a leading symbol.
const SYMBOL_ONLY: &[&str] = &["FIX", "FLOAT", "HIO", "NORM", "SIO", "TIO", "CSECT", "LTORG"];

impl Instruction {
    fn new(line: usize, symbol: Option<&str>, mnemonic: &str, operand: Operand) -> Self {
        Self {
            line,
            symbol: symbol.map(str::to_string),
            mnemonic: mnemonic.to_string(),
            operand,
            location: None,
            code: vec![],
        }
    }

    /// Parse one source line (0-based index). Blank lines and comment lines
    /// yield `None`.
    pub fn parse(idx: usize, raw: &str, optab: &OpTable) -> Result<Option<Instruction>, Error> {
        let line = idx + 1;
        let code = raw.replace([',', '\t'], " ");
        let tokens: Vec<&str> = code.split_whitespace().collect();

        if tokens.is_empty() || tokens[0].starts_with('.') {
            return Ok(None);
        }

        // EXTDEF/EXTREF open the line; a symbol in front is not permitted
        if tokens[0] == "EXTDEF" || tokens[0] == "EXTREF" {
            let names = tokens[1..].iter().map(|s| s.to_string()).collect();
            return Ok(Some(Self::new(line, None, tokens[0], Operand::List(names))));
        }
        if let Some(t) = tokens[1..].iter().find(|t| **t == "EXTDEF" || **t == "EXTREF") {
            return Err(Error::DirectiveWithSymbol {
                line,
                directive: t.to_string(),
            });
        }

        match tokens.len() {
            1 => {
                if recognized(optab, tokens[0]) {
                    Ok(Some(Self::new(line, None, tokens[0], Operand::None)))
                } else {
                    Err(Error::UnknownMnemonic {
                        line,
                        mnemonic: tokens[0].to_string(),
                    })
                }
            }
            2 => {
                if SYMBOL_ONLY.contains(&tokens[1]) {
                    Ok(Some(Self::new(line, Some(tokens[0]), tokens[1], Operand::None)))
                } else if tokens[0] == "EQU" {
                    Err(Error::EquWithoutSymbol { line })
                } else if recognized(optab, tokens[0]) {
                    let operand = Operand::One(tokens[1].to_string());
                    Ok(Some(Self::new(line, None, tokens[0], operand)))
                } else {
                    Err(Error::UnknownMnemonic {
                        line,
                        mnemonic: tokens[0].to_string(),
                    })
                }
            }
            3 => {
                if TWO_REG.contains(&tokens[0]) {
                    let operand = Operand::List(vec![tokens[1].to_string(), tokens[2].to_string()]);
                    Ok(Some(Self::new(line, None, tokens[0], operand)))
                } else if tokens[2] == "X" && recognized(optab, tokens[0]) {
                    let operand = Operand::List(vec![tokens[1].to_string(), tokens[2].to_string()]);
                    Ok(Some(Self::new(line, None, tokens[0], operand)))
                } else if recognized(optab, tokens[1]) {
                    let operand = Operand::One(tokens[2].to_string());
                    Ok(Some(Self::new(line, Some(tokens[0]), tokens[1], operand)))
                } else {
                    Err(Error::UnknownMnemonic {
                        line,
                        mnemonic: tokens[1].to_string(),
                    })
                }
            }
            _ => {
                if recognized(optab, tokens[1]) {
                    let operand = tokens[2..].iter().map(|s| s.to_string()).collect();
                    Ok(Some(Self::new(
                        line,
                        Some(tokens[0]),
                        tokens[1],
                        Operand::List(operand),
                    )))
                } else {
                    Err(Error::UnknownMnemonic {
                        line,
                        mnemonic: tokens[1].to_string(),
                    })
                }
            }
        }
    }

    /// Mnemonic with any extended-format `+` prefix stripped.
    pub fn plain(&self) -> &str {
        self.mnemonic.strip_prefix('+').unwrap_or(&self.mnemonic)
    }

    pub fn is_extended(&self) -> bool {
        self.mnemonic.starts_with('+')
    }

    /// Literal-pool placeholder synthesized by pass one.
    pub fn is_literal(&self) -> bool {
        self.mnemonic.starts_with('=')
    }

    pub fn directive(&self) -> Option<Directive> {
        Directive::parse(self.plain()).ok()
    }
}

fn recognized(optab: &OpTable, token: &str) -> bool {
    match token.strip_prefix('+') {
        Some(stripped) => optab.get(stripped).is_some(),
        None => optab.get(token).is_some() || Directive::parse(token).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Option<Instruction>, Error> {
        Instruction::parse(0, raw, OpTable::builtin())
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   ").unwrap().is_none());
        assert!(parse(". initialize the index").unwrap().is_none());
        assert!(parse(".comment").unwrap().is_none());
    }

    #[test]
    fn symbol_mnemonic_operand() {
        let inst = parse("FIRST LDA ALPHA").unwrap().unwrap();
        assert_eq!(inst.symbol.as_deref(), Some("FIRST"));
        assert_eq!(inst.mnemonic, "LDA");
        assert_eq!(inst.operand, Operand::One("ALPHA".to_string()));
        assert_eq!(inst.line, 1);
    }

    #[test]
    fn comma_and_tab_separators() {
        let inst = parse("LOOP\tSTCH BUFFER,X").unwrap().unwrap();
        assert_eq!(inst.symbol.as_deref(), Some("LOOP"));
        assert_eq!(inst.mnemonic, "STCH");
        assert_eq!(
            inst.operand,
            Operand::List(vec!["BUFFER".to_string(), "X".to_string()])
        );
    }

    #[test]
    fn two_register_form() {
        let inst = parse("COMPR A,X").unwrap().unwrap();
        assert_eq!(inst.symbol, None);
        assert_eq!(inst.mnemonic, "COMPR");
        assert_eq!(
            inst.operand,
            Operand::List(vec!["A".to_string(), "X".to_string()])
        );
    }

    #[test]
    fn indexed_without_symbol() {
        let inst = parse("LDA BUFFER,X").unwrap().unwrap();
        assert_eq!(inst.symbol, None);
        assert_eq!(inst.operand.second(), Some("X"));
    }

    #[test]
    fn extern_lists() {
        let inst = parse("EXTDEF BUFFER,LENGTH").unwrap().unwrap();
        assert_eq!(inst.mnemonic, "EXTDEF");
        assert_eq!(
            inst.operand,
            Operand::List(vec!["BUFFER".to_string(), "LENGTH".to_string()])
        );
        assert!(matches!(
            parse("COPY EXTDEF BUFFER"),
            Err(Error::DirectiveWithSymbol { line: 1, .. })
        ));
    }

    #[test]
    fn symbol_only_mnemonics() {
        let inst = parse("RDREC CSECT").unwrap().unwrap();
        assert_eq!(inst.symbol.as_deref(), Some("RDREC"));
        assert_eq!(inst.mnemonic, "CSECT");
        assert_eq!(inst.operand, Operand::None);
    }

    #[test]
    fn extended_mnemonics_recognized() {
        let inst = parse("CLOOP +JSUB RDREC").unwrap().unwrap();
        assert_eq!(inst.mnemonic, "+JSUB");
        assert!(inst.is_extended());
        assert_eq!(inst.plain(), "JSUB");
    }

    #[test]
    fn rejects_unknown_mnemonics() {
        assert!(matches!(
            parse("FOO BAR BAZ"),
            Err(Error::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(parse("XYZZY"), Err(Error::UnknownMnemonic { .. })));
        assert!(matches!(parse("EQU 5"), Err(Error::EquWithoutSymbol { .. })));
    }
}
