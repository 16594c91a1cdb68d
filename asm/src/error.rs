use color_print::cprintln;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("line {line}: `{directive}` cannot have a symbol")]
    DirectiveWithSymbol { line: usize, directive: String },

    #[error("line {line}: unknown mnemonic `{mnemonic}`")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: EQU requires a symbol")]
    EquWithoutSymbol { line: usize },

    #[error("line {line}: cannot parse `{operand}` as an operand")]
    BadOperand { line: usize, operand: String },

    #[error("line {line}: missing operand")]
    MissingOperand { line: usize },

    #[error("line {line}: symbol not defined `{symbol}`")]
    UndefinedSymbol { line: usize, symbol: String },

    #[error("Bad opcode table: {0}")]
    BadOpTable(String),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to write file: {0}")]
    FileWrite(String, #[source] std::io::Error),
}

impl Error {
    fn line(&self) -> Option<usize> {
        match self {
            Error::DirectiveWithSymbol { line, .. }
            | Error::UnknownMnemonic { line, .. }
            | Error::EquWithoutSymbol { line }
            | Error::BadOperand { line, .. }
            | Error::MissingOperand { line }
            | Error::UndefinedSymbol { line, .. } => (*line > 0).then_some(*line),
            _ => None,
        }
    }

    /// Print the error with the offending source line when one is attached.
    pub fn print_diag(&self, path: &str, source: &str) {
        cprintln!("<red,bold>error</>: {}", self);
        if let Some(line) = self.line() {
            cprintln!("     <blue>--></> <underline>{}:{}</>", path, line);
            let content = source.lines().nth(line - 1).unwrap_or("");
            cprintln!("      <blue>|</>");
            cprintln!(" <blue>{:>4} |</> {}", line, content);
            cprintln!("      <blue>|</>");
        }
    }
}
