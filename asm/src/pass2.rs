use arch::directive::Directive;
use arch::op::{Format, OpTable};
use arch::reg::Reg;
use indexmap::IndexMap;

use crate::block::{Block, ModRecord};
use crate::error::Error;
use crate::parser::{Instruction, Operand};
use crate::pass1::Program;

// Flag bits of the x/b/p/e nibble.
const X: u8 = 0x8;
const B: u8 = 0x4;
const P: u8 = 0x2;
const E: u8 = 0x1;

/// Pass two: resolve the addressing mode of every instruction, fill in its
/// object bytes, and accumulate the modification records of each section.
pub fn encode(prog: &mut Program, optab: &OpTable) -> Result<(), Error> {
    let Program {
        instructions,
        blocks,
        ..
    } = prog;

    let mut cur = String::new();
    let mut base: u32 = 0;

    for inst in instructions.iter_mut() {
        match inst.directive() {
            Some(Directive::START | Directive::CSECT) => {
                cur = inst.symbol.clone().unwrap_or_default();
                base = 0;
            }
            Some(Directive::BASE) => {
                let sym = operand(inst)?;
                base = resolve(blocks, &cur, sym).ok_or_else(|| Error::UndefinedSymbol {
                    line: inst.line,
                    symbol: sym.to_string(),
                })?;
            }
            Some(Directive::BYTE) => {
                inst.code = data_bytes(inst, 1)?;
            }
            Some(Directive::WORD) => {
                let op = operand(inst)?;
                if op[1..].contains(['+', '-']) {
                    word_expr(inst, blocks, &cur)?;
                } else {
                    inst.code = data_bytes(inst, 3)?;
                }
            }
            // END keeps the section current for its trailing placeholders;
            // the rest was fully handled by pass one.
            Some(_) => {}
            None => {
                if inst.is_literal() {
                    inst.code = decode_data(&inst.mnemonic[1..]);
                } else {
                    machine(inst, blocks, &cur, base, optab)?;
                }
            }
        }
    }

    Ok(())
}

fn operand(inst: &Instruction) -> Result<&str, Error> {
    inst.operand
        .first()
        .ok_or(Error::MissingOperand { line: inst.line })
}

fn resolve(blocks: &IndexMap<String, Block>, cur: &str, symbol: &str) -> Option<u32> {
    blocks.get(cur).and_then(|b| b.resolve(symbol))
}

fn push_mod(blocks: &mut IndexMap<String, Block>, cur: &str, rec: ModRecord) {
    if let Some(block) = blocks.get_mut(cur) {
        block.mods.push(rec);
    }
}

// ----------------------------------------------------------------------------
// Data directives

/// WORD/BYTE payload: `C'…'`/`X'…'` decode as literal data, anything else
/// as a big-endian number of `width` bytes.
fn data_bytes(inst: &Instruction, width: usize) -> Result<Vec<u8>, Error> {
    let op = operand(inst)?;
    if op.starts_with("C'") || op.starts_with("X'") {
        return Ok(decode_data(op));
    }
    let value: i64 = op.parse().map_err(|_| Error::BadOperand {
        line: inst.line,
        operand: op.to_string(),
    })?;
    Ok((0..width)
        .rev()
        .map(|i| (value >> (8 * i)) as u8)
        .collect())
}

/// Quoted literal data: one byte per character, or one byte per hex pair.
fn decode_data(token: &str) -> Vec<u8> {
    let data = token.split('\'').nth(1).unwrap_or("");
    if token.starts_with('X') {
        (0..data.len() / 2)
            .map(|i| u8::from_str_radix(&data[2 * i..2 * i + 2], 16).unwrap_or(0))
            .collect()
    } else {
        data.bytes().collect()
    }
}

/// `WORD A+B` / `WORD A-B`: each operand resolves locally, falling back to
/// zero for names owned by another section; every fallback leaves a
/// six-half-byte modification record for the linker.
fn word_expr(
    inst: &mut Instruction,
    blocks: &mut IndexMap<String, Block>,
    cur: &str,
) -> Result<(), Error> {
    let op = operand(inst)?.to_string();
    let loc = inst.location.unwrap_or(0);
    let i = op[1..].find(['+', '-']).map(|i| i + 1).unwrap_or(0);
    let minus = op.as_bytes()[i] == b'-';
    let (lhs, rhs) = (&op[..i], &op[i + 1..]);

    let term = |blocks: &mut IndexMap<String, Block>, sym: &str, sign: char| match resolve(
        blocks, cur, sym,
    ) {
        Some(addr) => addr,
        None => {
            push_mod(
                blocks,
                cur,
                ModRecord {
                    offset: loc,
                    halves: 6,
                    symbol: format!("{sign}{sym}"),
                },
            );
            0
        }
    };

    let a = term(blocks, lhs, '+');
    let b = term(blocks, rhs, if minus { '-' } else { '+' });
    let value = if minus {
        a.wrapping_sub(b)
    } else {
        a.wrapping_add(b)
    };
    inst.code = (0..3).rev().map(|i| (value >> (8 * i)) as u8).collect();
    Ok(())
}

// ----------------------------------------------------------------------------
// Machine instructions

fn machine(
    inst: &mut Instruction,
    blocks: &mut IndexMap<String, Block>,
    cur: &str,
    base: u32,
    optab: &OpTable,
) -> Result<(), Error> {
    let desc = optab
        .get(inst.plain())
        .ok_or_else(|| Error::UnknownMnemonic {
            line: inst.line,
            mnemonic: inst.mnemonic.clone(),
        })?
        .clone();

    if desc.has(Format::One) {
        inst.code = vec![desc.code];
        return Ok(());
    }

    if desc.has(Format::Two) {
        let (r1, r2) = match &inst.operand {
            Operand::None => (0, 0),
            Operand::One(a) => (field(inst.line, a)?, 0),
            Operand::List(l) => {
                let r1 = field(inst.line, &l[0])?;
                let r2 = match l.get(1) {
                    Some(b) => field(inst.line, b)?,
                    None => 0,
                };
                (r1, r2)
            }
        };
        inst.code = vec![desc.code, (r1 << 4) | r2];
        return Ok(());
    }

    // RSUB and friends: no operand means n=i=1 with a zero displacement
    let Some(token) = inst.operand.first().map(str::to_string) else {
        inst.code = fmt3(desc.code | 0x03, 0, 0);
        return Ok(());
    };
    let loc = inst.location.unwrap_or(0);

    if let Some(sym) = token.strip_prefix('#') {
        // immediate: n=0 i=1
        inst.code = match resolve(blocks, cur, sym) {
            Some(addr) => relative(desc.code | 0x01, 0, loc, addr, base),
            None => {
                let value: u32 = sym.parse().map_err(|_| Error::BadOperand {
                    line: inst.line,
                    operand: token.clone(),
                })?;
                if value > 4095 {
                    fmt4(desc.code | 0x01, E, value)
                } else {
                    fmt3(desc.code | 0x01, 0, value as i32)
                }
            }
        };
        return Ok(());
    }

    if let Some(sym) = token.strip_prefix('@') {
        // indirect: n=1 i=0, and the target must be known
        let addr = resolve(blocks, cur, sym).ok_or_else(|| Error::UndefinedSymbol {
            line: inst.line,
            symbol: sym.to_string(),
        })?;
        inst.code = relative(desc.code | 0x02, 0, loc, addr, base);
        return Ok(());
    }

    // direct: n=1 i=1
    let x = if inst.operand.second() == Some("X") { X } else { 0 };
    if inst.is_extended() {
        match resolve(blocks, cur, &token) {
            Some(addr) => inst.code = fmt4(desc.code | 0x03, x | E, addr),
            None => {
                // external call: the linker patches the 5 address half-bytes
                inst.code = fmt4(desc.code | 0x03, x | E, 0);
                push_mod(
                    blocks,
                    cur,
                    ModRecord {
                        offset: loc + 1,
                        halves: 5,
                        symbol: format!("+{token}"),
                    },
                );
            }
        }
    } else {
        match resolve(blocks, cur, &token) {
            Some(addr) => {
                let disp = addr as i32 - loc as i32 - 3;
                if (-2048..=2047).contains(&disp) {
                    inst.code = fmt3(desc.code | 0x03, x | P, disp);
                } else {
                    inst.code = fmt3(desc.code | 0x03, x | B, addr as i32 - base as i32);
                }
            }
            // unresolved short form stays a zero placeholder and leaves no
            // modification record, unlike the extended form above
            None => inst.code = fmt3(desc.code | 0x03, x, 0),
        }
    }
    Ok(())
}

/// PC-relative when the signed 12-bit displacement fits, BASE-relative when
/// the unsigned one does, format 4 otherwise.
fn relative(op: u8, flags: u8, loc: u32, addr: u32, base: u32) -> Vec<u8> {
    let disp = addr as i32 - loc as i32 - 3;
    if (-2048..=2047).contains(&disp) {
        fmt3(op, flags | P, disp)
    } else if (0..=4095).contains(&(addr as i32 - base as i32)) {
        fmt3(op, flags | B, addr as i32 - base as i32)
    } else {
        fmt4(op, flags | E, addr)
    }
}

/// Register-pair field of a format-2 instruction; shift counts and SVC
/// numbers pack as plain values.
fn field(line: usize, s: &str) -> Result<u8, Error> {
    Reg::parse(s)
        .ok()
        .map(Reg::code)
        .or_else(|| s.parse().ok())
        .ok_or_else(|| Error::BadOperand {
            line,
            operand: s.to_string(),
        })
}

fn fmt3(op: u8, flags: u8, disp: i32) -> Vec<u8> {
    let d = (disp & 0xFFF) as u32;
    vec![op, (flags << 4) | (d >> 8) as u8, (d & 0xFF) as u8]
}

fn fmt4(op: u8, flags: u8, addr: u32) -> Vec<u8> {
    vec![
        op,
        (flags << 4) | ((addr >> 16) & 0xF) as u8,
        ((addr >> 8) & 0xFF) as u8,
        (addr & 0xFF) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembled(src: &str) -> Program {
        let optab = OpTable::builtin();
        let insts: Vec<Instruction> = src
            .lines()
            .enumerate()
            .filter_map(|(idx, raw)| Instruction::parse(idx, raw, optab).unwrap())
            .collect();
        let mut prog = crate::pass1::locate(insts, optab).unwrap();
        encode(&mut prog, optab).unwrap();
        prog
    }

    fn code_of<'a>(prog: &'a Program, mnemonic: &str) -> &'a [u8] {
        &prog
            .instructions
            .iter()
            .find(|i| i.mnemonic == mnemonic)
            .unwrap()
            .code
    }

    #[test]
    fn register_pairs_pack_into_one_byte() {
        let prog = assembled(
            "RT START 0\n\
             COMPR A,X\n\
             CLEAR X\n\
             TIXR T\n\
             SVC 5\n\
             SHIFTL T,2\n\
             END",
        );
        assert_eq!(code_of(&prog, "COMPR"), [0xA0, 0x01]);
        assert_eq!(code_of(&prog, "CLEAR"), [0xB4, 0x10]);
        assert_eq!(code_of(&prog, "TIXR"), [0xB8, 0x50]);
        assert_eq!(code_of(&prog, "SVC"), [0xB0, 0x50]);
        assert_eq!(code_of(&prog, "SHIFTL"), [0xA4, 0x52]);
    }

    #[test]
    fn rsub_is_fixed() {
        let prog = assembled("RT START 0\nRSUB\nEND");
        assert_eq!(code_of(&prog, "RSUB"), [0x4F, 0x00, 0x00]);
    }

    #[test]
    fn pc_relative_when_in_range() {
        // ALPHA at 6, LDA at 0: disp = 6 - 0 - 3 = 3
        let prog = assembled("PC START 0\nA LDA ALPHA\nB LDA ALPHA\nALPHA WORD 5\nEND");
        assert_eq!(prog.instructions[1].code, [0x03, 0x20, 0x03]);
        assert_eq!(prog.instructions[2].code, [0x03, 0x20, 0x00]);
    }

    #[test]
    fn negative_pc_displacement() {
        let prog = assembled("PC START 0\nALPHA WORD 5\nLOOP J LOOP\nEND");
        // J at 3 jumping to itself: disp = 3 - 3 - 3 = -3 = 0xFFD
        assert_eq!(code_of(&prog, "J"), [0x3F, 0x2F, 0xFD]);
    }

    #[test]
    fn base_relative_when_pc_overflows() {
        let prog = assembled(
            "TB START 0\n\
             FIRST LDA ALPHA\n\
             BASE FIRST\n\
             J FAR\n\
             ALPHA RESB 2100\n\
             FAR WORD 9\n\
             END FIRST",
        );
        // FAR at 2106 = 0x83A: out of PC range from 3, in base range from 0
        assert_eq!(code_of(&prog, "J"), [0x3F, 0x48, 0x3A]);
    }

    #[test]
    fn immediate_ladder() {
        let prog = assembled(
            "IM START 0\n\
             A LDA #3\n\
             B LDA #5000\n\
             C LDB #LEN\n\
             LEN RESB 1\n\
             END",
        );
        assert_eq!(prog.instructions[1].code, [0x01, 0x00, 0x03]);
        assert_eq!(prog.instructions[2].code, [0x01, 0x10, 0x13, 0x88]);
        // LEN at 9, LDB at 6: disp = 0
        assert_eq!(prog.instructions[3].code, [0x69, 0x20, 0x00]);
    }

    #[test]
    fn literal_placeholders_decode() {
        let prog = assembled("LT START 0\nA LDA =X'1A2B'\nB LDA =C'EOF'\nEND A");
        assert_eq!(code_of(&prog, "=X'1A2B'"), [0x1A, 0x2B]);
        assert_eq!(code_of(&prog, "=C'EOF'"), [0x45, 0x4F, 0x46]);
    }

    #[test]
    fn extended_external_reference_leaves_mod_record() {
        let prog = assembled(
            "MAIN START 0\n\
             EXTREF HANDLR\n\
             FIRST +JSUB HANDLR\n\
             END FIRST",
        );
        assert_eq!(code_of(&prog, "+JSUB"), [0x4B, 0x10, 0x00, 0x00]);
        assert_eq!(
            prog.blocks["MAIN"].mods,
            vec![ModRecord {
                offset: 1,
                halves: 5,
                symbol: "+HANDLR".to_string(),
            }]
        );
    }

    #[test]
    fn short_external_reference_leaves_no_mod_record() {
        let prog = assembled(
            "MAIN START 0\n\
             EXTREF HANDLR\n\
             FIRST JSUB HANDLR\n\
             END FIRST",
        );
        assert_eq!(code_of(&prog, "JSUB"), [0x4B, 0x00, 0x00]);
        assert!(prog.blocks["MAIN"].mods.is_empty());
    }

    #[test]
    fn word_expression_over_externals() {
        let prog = assembled(
            "SUB CSECT\n\
             EXTREF BUFEND,BUFA\n\
             LEN WORD BUFEND-BUFA\n\
             END",
        );
        assert_eq!(code_of(&prog, "WORD"), [0x00, 0x00, 0x00]);
        assert_eq!(
            prog.blocks["SUB"].mods,
            vec![
                ModRecord {
                    offset: 0,
                    halves: 6,
                    symbol: "+BUFEND".to_string(),
                },
                ModRecord {
                    offset: 0,
                    halves: 6,
                    symbol: "-BUFA".to_string(),
                },
            ]
        );
    }

    #[test]
    fn indirect_undefined_symbol_fails() {
        let optab = OpTable::builtin();
        let insts: Vec<Instruction> = "BAD START 0\nLDA @NOPE\nEND"
            .lines()
            .enumerate()
            .filter_map(|(idx, raw)| Instruction::parse(idx, raw, optab).unwrap())
            .collect();
        let mut prog = crate::pass1::locate(insts, optab).unwrap();
        assert!(matches!(
            encode(&mut prog, optab),
            Err(Error::UndefinedSymbol { line: 2, .. })
        ));
    }

    #[test]
    fn indirect_resolved_symbol() {
        let prog = assembled("IN START 0\nA LDA @PTR\nPTR WORD 0\nEND");
        // PTR at 3: disp = 0, n=1 i=0
        assert_eq!(prog.instructions[1].code, [0x02, 0x20, 0x00]);
    }
}
