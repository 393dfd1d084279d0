//! Command line front end: compile and run a tape program.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use bfjit::runtime::interpret;
use bfjit::x64::format_listing;
use bfjit::{object_file, JitConfig, JitResult, JitSession, UnknownCharPolicy};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bfjit", version, about = "JIT compiler for the eight-operation tape language")]
struct Args {
    /// Source file to run.
    #[arg(required_unless_present = "eval", conflicts_with = "eval")]
    file: Option<PathBuf>,

    /// Program text given inline instead of a file.
    #[arg(short, long)]
    eval: Option<String>,

    /// Run with the reference interpreter instead of generating code.
    #[arg(long)]
    interpret: bool,

    /// What to do with characters that are not operations or whitespace.
    #[arg(long, default_value_t = UnknownCharPolicy::Warn)]
    on_unknown: UnknownCharPolicy,

    /// Number of tape cells (at least one).
    #[arg(
        long,
        default_value_t = bfjit::core::DEFAULT_TAPE_SIZE,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    tape_size: usize,

    /// Dump code, nonzero tape cells and statistics after the run.
    #[arg(short, long)]
    verbose: bool,

    /// Where `--verbose` writes the raw code.
    #[arg(long, default_value = "/tmp/simplejit.bin")]
    dump_code: PathBuf,

    /// Also write the code as an ELF object with symbol `bf_main`.
    #[arg(long)]
    emit_object: Option<PathBuf>,

    /// Print a disassembly listing of the generated code to stderr.
    #[arg(long)]
    disasm: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> JitResult<()> {
    let source = match (&args.eval, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => unreachable!("clap requires a file or --eval"),
    };

    if args.interpret {
        let mut tape = bfjit::Tape::new(args.tape_size);
        interpret(
            &source,
            args.on_unknown,
            &mut tape,
            &mut io::stdin().lock(),
            &mut io::stdout().lock(),
        )?;
        if args.verbose {
            eprintln!("* Memory nonzero locations:");
            eprint!("{}", tape.format_nonzero());
        }
        return Ok(());
    }

    let config = JitConfig::default()
        .with_tape_size(args.tape_size)
        .with_unknown_char_policy(args.on_unknown);
    let mut session = JitSession::new(config)?;
    let program = session.compile(&source)?;
    if args.disasm {
        eprint!("{}", format_listing(program.code(), 0));
    }
    if let Some(path) = &args.emit_object {
        object_file::write_object(path, program.code())?;
        eprintln!("* emitted object to {}", path.display());
    }

    // Generated code writes straight to fd 1; flush anything buffered first.
    io::stdout().flush()?;
    session.execute(&program)?;

    if args.verbose {
        fs::write(&args.dump_code, program.code())?;
        eprintln!("* emitted code to {}", args.dump_code.display());
        eprintln!("* Memory nonzero locations:");
        eprint!("{}", session.tape().format_nonzero());
        eprint!("{}", program.stats());
        eprint!("{}", session.stats());
    }
    Ok(())
}
