use arch::directive::Directive;
use arch::op::{Format, OpTable};
use indexmap::IndexMap;

use crate::block::Block;
use crate::error::Error;
use crate::parser::{Instruction, Operand};

/// Output of pass one: the located instruction sequence (grown by literal
/// placeholders) plus the closed section tables, keyed by section name.
#[derive(Debug)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub blocks: IndexMap<String, Block>,
    pub entry: Option<String>,
}

/// Pass one: assign a location to every instruction, build the per-section
/// symbol/EXTDEF/EXTREF tables, evaluate EQU, and deposit literal pools.
///
/// Literal deposition pushes synthesized placeholder instructions right
/// after the triggering LTORG/END into the output list, so the input is
/// never grown while it is being walked.
pub fn locate(input: Vec<Instruction>, optab: &OpTable) -> Result<Program, Error> {
    let mut out: Vec<Instruction> = Vec::with_capacity(input.len());
    let mut blocks: IndexMap<String, Block> = IndexMap::new();
    let mut cur = Block::new("");
    let mut loc: u32 = 0;
    let mut entry: Option<String> = None;

    for mut inst in input {
        collect_literal(&mut cur, &inst);

        let directive = inst.directive();
        match directive {
            Some(Directive::START) => {
                cur = Block::new(inst.symbol.as_deref().unwrap_or(""));
                loc = 0;
            }
            Some(Directive::CSECT) => {
                close(&mut blocks, &mut cur);
                cur = Block::new(inst.symbol.as_deref().unwrap_or(""));
                loc = 0;
            }
            _ => {}
        }
        inst.location = Some(loc);

        match directive {
            Some(Directive::START | Directive::CSECT) => {}
            Some(Directive::EXTDEF) => {
                if let Operand::List(names) = &inst.operand {
                    for name in names {
                        let addr = cur.resolve(name);
                        cur.extdef.insert(name.clone(), addr);
                    }
                }
            }
            Some(Directive::EXTREF) => {
                if let Operand::List(names) = &inst.operand {
                    cur.extref.extend(names.iter().cloned());
                }
            }
            Some(Directive::RESW) => loc += 3 * count(&inst)?,
            Some(Directive::RESB) => loc += count(&inst)?,
            Some(Directive::WORD) => loc += 3,
            Some(Directive::BYTE) => loc += byte_len(&inst)?,
            Some(Directive::BASE | Directive::LTORG | Directive::EQU) => {}
            Some(Directive::END) => {
                if entry.is_none() {
                    entry = inst.operand.first().map(str::to_string);
                }
            }
            None => {
                if inst.is_extended() {
                    loc += 4;
                } else if !inst.is_literal() {
                    let desc =
                        optab
                            .get(inst.plain())
                            .ok_or_else(|| Error::UnknownMnemonic {
                                line: inst.line,
                                mnemonic: inst.mnemonic.clone(),
                            })?;
                    loc += match desc.formats.first() {
                        Some(Format::One) => 1,
                        Some(Format::Two) => 2,
                        _ => 3,
                    };
                }
            }
        }

        // Every symbol definition funnels through one step; EQU substitutes
        // its evaluated value for the location.
        let value = match directive {
            Some(Directive::EQU) => equ_value(&cur, &inst, loc)?,
            _ => inst.location.unwrap_or(0),
        };
        if let Some(sym) = inst.symbol.clone() {
            if sym != "*" {
                define(&mut cur, &sym, value);
            }
        }

        let is_ltorg = matches!(directive, Some(Directive::LTORG));
        let is_end = matches!(directive, Some(Directive::END));
        out.push(inst);
        if is_ltorg || is_end {
            deposit(&mut cur, &mut loc, &mut out);
        }
        if is_end {
            close(&mut blocks, &mut cur);
            loc = 0;
        }
    }

    close(&mut blocks, &mut cur);

    Ok(Program {
        instructions: out,
        blocks,
        entry,
    })
}

fn collect_literal(block: &mut Block, inst: &Instruction) {
    if let Some(op) = inst.operand.first() {
        if op.starts_with('=') && !block.pool.iter().any(|t| t == op) {
            block.pool.push(op.to_string());
        }
    }
}

fn define(block: &mut Block, symbol: &str, value: u32) {
    block.symbols.insert(symbol.to_string(), value);
    if let Some(slot) = block.extdef.get_mut(symbol) {
        *slot = Some(value);
    }
}

/// Move the finished section into the result map. The empty pre-START
/// section is discarded.
fn close(blocks: &mut IndexMap<String, Block>, cur: &mut Block) {
    let block = std::mem::take(cur);
    if !block.is_unnamed_and_empty() {
        blocks.insert(block.name.clone(), block);
    }
}

/// Deposit the pending pool in first-seen order, one placeholder
/// instruction per literal. The token doubles as a symbol so operand
/// references resolve in pass two.
fn deposit(block: &mut Block, loc: &mut u32, out: &mut Vec<Instruction>) {
    for token in std::mem::take(&mut block.pool) {
        let len = literal_len(&token);
        block.symbols.insert(token.clone(), *loc);
        out.push(Instruction {
            line: 0,
            symbol: Some("*".to_string()),
            mnemonic: token,
            operand: Operand::None,
            location: Some(*loc),
            code: vec![],
        });
        *loc += len;
    }
}

fn literal_len(token: &str) -> u32 {
    let data = token.split('\'').nth(1).unwrap_or("");
    if token.starts_with("=X") {
        (data.len() / 2) as u32
    } else {
        data.len() as u32
    }
}

fn count(inst: &Instruction) -> Result<u32, Error> {
    let op = inst
        .operand
        .first()
        .ok_or(Error::MissingOperand { line: inst.line })?;
    op.parse().map_err(|_| Error::BadOperand {
        line: inst.line,
        operand: op.to_string(),
    })
}

fn byte_len(inst: &Instruction) -> Result<u32, Error> {
    let op = inst
        .operand
        .first()
        .ok_or(Error::MissingOperand { line: inst.line })?;
    let data = op.split('\'').nth(1).unwrap_or("");
    Ok(if op.starts_with("X'") {
        (data.len() / 2) as u32
    } else if op.starts_with("C'") {
        data.len() as u32
    } else {
        1
    })
}

/// EQU value: `*` is the current location counter; `A+B`/`A-B` evaluates
/// over symbols already defined in the current section.
fn equ_value(block: &Block, inst: &Instruction, loc: u32) -> Result<u32, Error> {
    let op = inst
        .operand
        .first()
        .ok_or(Error::MissingOperand { line: inst.line })?;
    if op == "*" {
        return Ok(loc);
    }
    let Some(i) = op[1..].find(['+', '-']).map(|i| i + 1) else {
        return Err(Error::BadOperand {
            line: inst.line,
            operand: op.to_string(),
        });
    };
    let (lhs, rhs) = (&op[..i], &op[i + 1..]);
    let a = block.resolve(lhs).ok_or_else(|| Error::UndefinedSymbol {
        line: inst.line,
        symbol: lhs.to_string(),
    })?;
    let b = block.resolve(rhs).ok_or_else(|| Error::UndefinedSymbol {
        line: inst.line,
        symbol: rhs.to_string(),
    })?;
    Ok(if op.as_bytes()[i] == b'-' {
        a.wrapping_sub(b)
    } else {
        a.wrapping_add(b)
    })
}
