use arch::directive::Directive;

use crate::parser::Instruction;
use crate::pass1::Program;

/// Longest text-record payload, in hex characters (30 bytes).
const TEXT_CAP: usize = 60;

/// Render the object program: per section, a Header record, Define/Refer
/// records when the section exports/imports symbols, Text records capped at
/// 30 bytes, Modification records, and an End record. Sections are
/// separated by a blank line; only the one holding the program's first
/// instruction carries the entry address.
pub fn write(prog: &Program) -> String {
    let mut groups: Vec<(String, Vec<&Instruction>)> = vec![];
    for inst in &prog.instructions {
        if matches!(inst.directive(), Some(Directive::START | Directive::CSECT)) {
            groups.push((inst.symbol.clone().unwrap_or_default(), vec![]));
        } else if groups.is_empty() {
            groups.push((String::new(), vec![]));
        }
        groups.last_mut().unwrap().1.push(inst);
    }

    let mut out = String::new();
    for (gi, (name, insts)) in groups.iter().enumerate() {
        if gi > 0 {
            out.push('\n');
        }
        let block = prog.blocks.get(name);
        let start = insts.first().and_then(|i| i.location).unwrap_or(0);
        let length = insts
            .iter()
            .map(|i| i.location.unwrap_or(0) + i.code.len() as u32)
            .max()
            .unwrap_or(start);
        out.push_str(&format!("H{:<6}{:06X}{:06X}\n", name, start, length));

        if let Some(block) = block {
            if !block.extdef.is_empty() {
                out.push('D');
                for (sym, addr) in &block.extdef {
                    out.push_str(&format!("{:<6}{:06X}", sym, addr.unwrap_or(0)));
                }
                out.push('\n');
            }
            if !block.extref.is_empty() {
                out.push('R');
                for sym in &block.extref {
                    out.push_str(&format!("{:<6}", sym));
                }
                out.push('\n');
            }
        }

        let mut chunk = String::new();
        let mut chunk_start = start;
        for inst in insts {
            if inst.code.is_empty() {
                continue;
            }
            let hex: String = inst.code.iter().map(|b| format!("{:02X}", b)).collect();
            if !chunk.is_empty() && chunk.len() + hex.len() > TEXT_CAP {
                out.push_str(&text_record(chunk_start, &chunk));
                chunk.clear();
            }
            if chunk.is_empty() {
                chunk_start = inst.location.unwrap_or(0);
            }
            chunk.push_str(&hex);
        }
        if !chunk.is_empty() {
            out.push_str(&text_record(chunk_start, &chunk));
        }

        if let Some(block) = block {
            for m in &block.mods {
                out.push_str(&format!("M{:06X}{:02X}{}\n", m.offset, m.halves, m.symbol));
            }
        }

        if gi == 0 {
            let entry = prog
                .entry
                .as_ref()
                .and_then(|sym| block.and_then(|b| b.resolve(sym)))
                .unwrap_or(start);
            out.push_str(&format!("E{:06X}\n", entry));
        } else {
            out.push_str("E\n");
        }
    }
    out
}

fn text_record(start: u32, payload: &str) -> String {
    format!("T{:06X}{:02X}{}\n", start, payload.len() / 2, payload)
}
