use arch::op::OpTable;
use color_print::cformat;
use sicasm::{encode, locate, print_dump, write, Error, Instruction};

const HELP_TEMPLATE: &str = "\
{before-help}{bin} {version}
  {about}

{usage-heading}
{tab}{usage}

{all-args}{after-help}";

#[derive(Debug, clap::Parser)]
#[clap(version, about, help_template = HELP_TEMPLATE)]
struct Args {
    /// Input source file
    #[clap()]
    input: String,

    /// Output object file
    #[clap(short, long, default_value = "output.txt")]
    output: String,

    /// Opcode table resource (builtin table when omitted)
    #[clap(long)]
    optab: Option<String>,

    /// Dump the located and encoded lines
    #[clap(short, long)]
    dump: bool,
}

fn main() {
    use clap::Parser;

    let args = Args::parse();
    println!("SIC/XE Assembler");

    let loaded;
    let optab = match &args.optab {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .expect(&cformat!("<r,s>Failed to open file</>: {}", path));
            loaded = OpTable::parse(&text)
                .unwrap_or_else(|e| fail(&Error::BadOpTable(e), path, &text));
            &loaded
        }
        None => OpTable::builtin(),
    };

    println!("1. Parse      < {}", &args.input);
    let source = std::fs::read_to_string(&args.input)
        .expect(&cformat!("<r,s>Failed to open file</>: {}", &args.input));
    let mut instructions = vec![];
    for (idx, raw) in source.lines().enumerate() {
        match Instruction::parse(idx, raw, optab) {
            Ok(Some(inst)) => instructions.push(inst),
            Ok(None) => {}
            Err(e) => fail(&e, &args.input, &source),
        }
    }

    println!("2. Locate");
    let mut prog = match locate(instructions, optab) {
        Ok(prog) => prog,
        Err(e) => fail(&e, &args.input, &source),
    };

    println!("3. Encode");
    if let Err(e) = encode(&mut prog, optab) {
        fail(&e, &args.input, &source);
    }

    println!("4. Write      > {}", &args.output);
    let object = write(&prog);
    std::fs::write(&args.output, &object)
        .expect(&cformat!("<r,s>Failed to write file</>: {}", &args.output));

    if args.dump {
        print_dump(&prog);
    }
}

fn fail(err: &Error, path: &str, source: &str) -> ! {
    err.print_diag(path, source);
    std::process::exit(1);
}
