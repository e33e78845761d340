//! crashsym CLI.
//!
//! Parses Apple-family crash reports, canonicalizes JSON payloads into the
//! classic plaintext form, and drives `symbolicatecrash`/`atos` against
//! dSYM bundles.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;

use crashsym::dsym::DsymFile;
use crashsym::report::SymbolicateMethod;
use crashsym::symbolication::{process, SystemRunner, Symbolicator, ToolPaths};
use crashsym::{parse, uuid_format};

#[derive(Parser)]
#[command(name = "crashsym")]
#[command(about = "Parse, convert and symbolicate Apple crash reports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the parsed header fields and binary images of a report
    Info {
        /// Report file, or - for stdin
        input: String,

        /// Emit the parsed report as JSON instead of the pretty summary
        #[arg(long)]
        json: bool,
    },

    /// Canonicalize a report into Apple plaintext form
    Convert {
        /// Report file, or - for stdin
        input: String,
    },

    /// Symbolicate a report against one or more dSYM bundles
    Symbolicate {
        /// Report file, or - for stdin
        input: String,

        /// dSYM bundle path; repeat for multiple bundles
        #[arg(short, long)]
        dsym: Vec<PathBuf>,

        /// Override the strategy the dialect would pick
        #[arg(short, long)]
        method: Option<MethodArg>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path of the symbolicatecrash script
        #[arg(long, env = "CRASHSYM_SYMBOLICATECRASH")]
        symbolicatecrash: Option<String>,
    },

    /// List the debug-ids of a dSYM bundle, or canonicalize a raw id
    Uuid {
        /// dSYM bundle, Mach-O binary, or a raw 32-char debug-id
        target: String,
    },
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum MethodArg {
    Symbolicatecrash,
    Atos,
}

impl From<MethodArg> for SymbolicateMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Symbolicatecrash => SymbolicateMethod::SymbolicateCrash,
            MethodArg::Atos => SymbolicateMethod::Atos,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input, json } => info(&input, json),
        Commands::Convert { input } => convert(&input),
        Commands::Symbolicate {
            input,
            dsym,
            method,
            output,
            symbolicatecrash,
        } => symbolicate(&input, &dsym, method, output, symbolicatecrash),
        Commands::Uuid { target } => uuid(&target),
    }
}

fn read_input(input: &str) -> std::io::Result<String> {
    if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input)
    }
}

fn info(input: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let content = read_input(input)?;
    let crash = parse(&content);

    if json {
        println!("{}", serde_json::to_string_pretty(&crash)?);
        return Ok(());
    }

    let field = |value: &Option<String>| value.as_deref().unwrap_or("-").to_string();
    println!("{} {:?}", "Format:".cyan(), crash.brand);
    println!("{} {}", "App:".cyan(), field(&crash.app_name));
    println!("{} {}", "Bundle:".cyan(), field(&crash.bundle_id));
    println!("{} {}", "Version:".cyan(), field(&crash.app_version));
    println!("{} {}", "Device:".cyan(), field(&crash.device));
    println!("{} {}", "OS:".cyan(), field(&crash.os_version));
    println!("{} {}", "Arch:".cyan(), field(&crash.arch));
    println!("{} {}", "UUID:".cyan(), field(&crash.uuid));

    let embedded = crash.embedded_binaries();
    if !embedded.is_empty() {
        println!();
        println!("{}", "Embedded binaries:".cyan());
        for binary in embedded {
            println!(
                "  {} {} {}",
                binary.name.green(),
                binary.uuid.as_deref().unwrap_or("-"),
                binary.load_address.as_deref().unwrap_or("-").dimmed()
            );
        }
    }

    if crash.needs_symbolicate() {
        println!();
        println!("{} report contains unresolved frames", "note:".yellow());
    }

    Ok(())
}

fn convert(input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let content = read_input(input)?;
    let crash = parse(&content);
    match crash.to_standard() {
        Some(standard) => {
            print!("{standard}");
            Ok(())
        }
        None => Err("this report format has no canonical plaintext form".into()),
    }
}

fn symbolicate(
    input: &str,
    dsym_paths: &[PathBuf],
    method: Option<MethodArg>,
    output: Option<PathBuf>,
    symbolicatecrash: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = read_input(input)?;
    let mut crash = parse(&content);
    if let Some(method) = method {
        crash.symbolicate_method = method.into();
    }

    if !crash.needs_symbolicate() {
        eprintln!("{} report already looks symbolicated", "note:".yellow());
    }

    let mut engine = Symbolicator::new();
    if let Some(script) = symbolicatecrash {
        engine.tools_mut().symbolicatecrash = script;
    }

    let runner = SystemRunner;
    let tools = ToolPaths::default();
    let dsyms: Vec<DsymFile> = dsym_paths
        .iter()
        .map(|p| load_dsym(p, &runner, &tools))
        .collect();
    for dsym in &dsyms {
        if dsym.uuids.is_empty() {
            eprintln!(
                "{} no debug-ids found in {}",
                "warning:".yellow(),
                dsym.path.display()
            );
        }
    }

    let result = engine.symbolicate(&crash, &dsyms)?;
    match output {
        Some(path) => {
            std::fs::write(&path, result)?;
            println!("{} wrote {}", "✓".green(), path.display());
        }
        None => print!("{result}"),
    }
    Ok(())
}

/// Build a [`DsymFile`] for a bundle path, querying `dwarfdump` for its
/// debug-ids. A bare Mach-O file works too; the DWARF path is then the
/// file itself.
fn load_dsym(path: &Path, runner: &SystemRunner, tools: &ToolPaths) -> DsymFile {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let dwarf = path.join("Contents/Resources/DWARF").join(&name);
    let binary_path = if dwarf.is_file() {
        dwarf
    } else {
        path.to_path_buf()
    };

    let uuids = process::dwarfdump_uuids(runner, tools, &path.to_string_lossy())
        .into_iter()
        .map(|u| u.uuid)
        .collect();

    DsymFile {
        name,
        path: path.to_path_buf(),
        binary_path,
        uuids,
        is_app: true,
    }
}

fn uuid(target: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(target);
    if !path.exists() {
        // Not a file: treat the argument as a raw debug-id.
        println!("{}", uuid_format(target));
        return Ok(());
    }

    let runner = SystemRunner;
    let tools = ToolPaths::default();
    let uuids = process::dwarfdump_uuids(&runner, &tools, target);
    if uuids.is_empty() {
        return Err(format!("no debug-ids found in {target}").into());
    }
    for entry in uuids {
        println!(
            "{} {} {}",
            entry.uuid.green(),
            entry.arch.as_deref().unwrap_or("-"),
            entry.path.as_deref().unwrap_or("").dimmed()
        );
    }
    Ok(())
}
