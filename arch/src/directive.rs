use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Assembler directives, as distinct from machine mnemonics looked up in
/// the opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
pub enum Directive {
    START,
    END,
    BYTE,
    WORD,
    RESW,
    RESB,
    BASE,
    CSECT,
    EXTDEF,
    EXTREF,
    LTORG,
    EQU,
}

impl Directive {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Unknown directive: {s}")),
        }
    }
}

#[test]
fn test() {
    assert_eq!(Directive::parse("START"), Ok(Directive::START));
    assert_eq!(Directive::parse("LTORG"), Ok(Directive::LTORG));
    assert!(Directive::parse("start").is_err());
    assert!(Directive::parse("LDA").is_err());
}
