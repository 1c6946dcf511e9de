//! `wave` — compile a `.wave` source file to a native ELF64 executable
//! (or, with `--raw`, to a bare code blob).

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use wave_core::{CompileOutput, CompileWarning};

/// Compile Wave source into a native executable.
#[derive(Parser, Debug)]
#[command(name = "wave", version, about)]
struct Cli {
    /// Path to the `.wave` source file to compile.
    input: Option<PathBuf>,

    /// Where to write the compiled output.
    #[arg(short = 'o', long = "output", default_value = "a.out")]
    output: PathBuf,

    /// Emit a bare code blob instead of a runnable ELF64 executable.
    #[arg(long)]
    raw: bool,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Fail the build instead of warning on unresolved fixups or
    /// capacity overflow.
    #[arg(long)]
    strict: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // wave-core logs through the `log` facade, matching cranelift-codegen's
    // own library-layer logging; bridge its records into the same
    // tracing-subscriber output the CLI uses for its own spans.
    tracing_log::LogTracer::init().ok();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(cli: Cli) -> Result<u8> {
    let Some(input) = cli.input else {
        print_usage();
        return Ok(1);
    };

    let source = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("Cannot open: {} ({err})", input.display());
            return Ok(1);
        }
    };

    let output = wave_core::compile_source(&source, cli.strict)
        .with_context(|| format!("compiling {}", input.display()))?;

    for warning in &output.warnings {
        tracing::warn!("{warning}");
    }

    if let Err(err) = write_output(&output, &cli.output, cli.raw) {
        eprintln!("Cannot write output: {} ({err})", cli.output.display());
        return Ok(1);
    }

    print_report(&output, &cli.output, cli.raw);
    Ok(0)
}

fn write_output(output: &CompileOutput, path: &PathBuf, raw: bool) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    if raw {
        wave_object::write_raw(&output.code, &mut file)?;
    } else {
        wave_object::write_elf(&output.code, &output.data, output.global_bytes, &mut file)?;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

fn print_report(output: &CompileOutput, path: &PathBuf, raw: bool) {
    if raw {
        println!("Generated raw: {} ({} bytes)", path.display(), output.code.len());
    } else {
        println!("Generated: {}", path.display());
        println!("   Code: {} bytes", output.code.len());
    }
    println!(
        "   Variables: {} | Functions: {}",
        output.var_count, output.func_count
    );
    println!(
        "   Unified: i={:.2} e={:.2} r={:.2}",
        output.unified_i, output.unified_e, output.unified_r
    );
    println!(
        "   Tile: {} bytes ({} pools)",
        output.tile_used, output.tile_pool_count
    );
    println!("   Fate: {}", if output.fate_dynamic { "dynamic" } else { "static" });
    println!(
        "   Platform: id={} syscall_base=0x{:x}",
        output.platform_id, output.platform_syscall_base
    );
    if !output.warnings.is_empty() {
        println!("   Warnings:");
        for w in &output.warnings {
            print_warning(w);
        }
    }
}

fn print_warning(w: &CompileWarning) {
    println!("     - {w}");
}

fn print_usage() {
    eprintln!("Usage: wave <input.wave> [-o output] [--raw] [--strict] [-v]...");
    eprintln!();
    eprintln!("Syntax:");
    eprintln!("  out \"text\"           write a string to stdout");
    eprintln!("  emit \"\\xHH\"          write raw bytes to stdout");
    eprintln!("  byte(N)              write a single byte to stdout");
    eprintln!("  getchar()            read one byte from stdin");
    eprintln!("  putchar(N)           write one byte to stdout");
    eprintln!("  name = expr          variable assignment");
    eprintln!("  when cond {{ }}        conditional");
    eprintln!("  loop {{ }}             loop");
    eprintln!("  break                exit the innermost loop");
    eprintln!("  fn name args {{ }}     function definition");
    eprintln!("  name(args)           function call");
    eprintln!("  keep                 spin forever in an event loop");
    eprintln!("  fate on/off          dynamic/static scheduling mode");
    eprintln!("  limit N              set the fate marginal threshold to 1/N");
    eprintln!("  -> value             return or break");
    eprintln!("  unified {{ i: e: r: }} set unified field parameters");
    eprintln!("  syscall.exit(N)      exit the program");
}
