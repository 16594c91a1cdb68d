use color_print::cformat;

use crate::pass1::Program;

/// Print the located and encoded instruction listing, one line per
/// instruction, with synthesized literal placeholders included.
pub fn print_dump(prog: &Program) {
    println!("-------+----------+----------------------------------------");
    for inst in &prog.instructions {
        let loc = match inst.location {
            Some(l) => cformat!("<green>{:06X}</>", l),
            None => " ".repeat(6),
        };
        let bytes: String = inst.code.iter().map(|b| format!("{:02X}", b)).collect();
        let symbol = inst.symbol.as_deref().unwrap_or("");
        println!(
            "{} | {:<8} | {:<8} {} {}",
            loc,
            bytes,
            symbol,
            cformat!("<red>{:<8}</>", inst.mnemonic),
            cformat!("<blue>{}</>", inst.operand),
        );
    }
    println!("-------+----------+----------------------------------------");
}
