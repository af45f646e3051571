mod options;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use kdl_core::types::BinaryField;
use kdl_core::{
    compile, write_project, Diagnostic, DirectoryWriter, FileSystemProvider, Format, Project,
    ResourceEntry,
};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `KDLC_LOG=debug`.
const LOG_ENV: &str = "KDLC_LOG";

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// KDL resource compiler.
#[derive(Parser)]
#[command(name = "kdlc", version, about = "KDL resource compiler")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log compiler progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Path to the root .kdl source file
    file: PathBuf,
    /// Options file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Target format (classic, extended or rez); overrides the options file
    #[arg(long)]
    format: Option<Format>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source tree and list (or write) the encoded resources
    Compile {
        #[command(flatten)]
        source: SourceArgs,
        /// Write each unit as payload files plus manifest.json under this directory
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Compile without writing anything
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// List the resource types a source tree defines
    Types {
        #[command(flatten)]
        source: SourceArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile { source, out_dir } => {
            cmd_compile(&source, out_dir.as_deref(), cli.output, cli.quiet)
        }
        Commands::Check { source } => cmd_check(&source, cli.output, cli.quiet),
        Commands::Types { source } => cmd_types(&source, cli.output, cli.quiet),
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Compile `source` or exit with the diagnostic.
fn compile_or_exit(source: &SourceArgs, output: OutputFormat) -> Project {
    let options = match options::resolve(source.config.as_deref(), source.format) {
        Ok(options) => {
            debug!(format = %options.format, unit = %options.default_unit, "resolved options");
            options
        }
        Err(msg) => {
            report_error(&msg, output);
            process::exit(1);
        }
    };
    match compile(&source.file, &FileSystemProvider, options) {
        Ok(project) => project,
        Err(diag) => {
            report_diagnostic(&diag, output);
            process::exit(1);
        }
    }
}

fn cmd_compile(source: &SourceArgs, out_dir: Option<&Path>, output: OutputFormat, quiet: bool) {
    let project = compile_or_exit(source, output);

    let written = match out_dir {
        Some(dir) => match write_project(&project, &mut DirectoryWriter::new(dir)) {
            Ok(units) => Some(units),
            Err(diag) => {
                report_diagnostic(&diag, output);
                process::exit(1);
            }
        },
        None => None,
    };

    match output {
        OutputFormat::Json => {
            let units: Vec<Value> = project
                .units()
                .map(|unit| {
                    let resources: Vec<Value> = unit.entries().iter().map(entry_json).collect();
                    json!({ "unit": unit.path(), "resources": resources })
                })
                .collect();
            let report = json!({
                "format": project.format.as_str(),
                "metadata": project.metadata,
                "units": units,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            for unit in project.units() {
                for entry in unit.entries() {
                    println!("{}", entry_line(unit.path(), &entry));
                }
            }
            if let (Some(units), Some(dir)) = (written, out_dir) {
                println!("wrote {} unit(s) to {}", units, dir.display());
            }
        }
    }
}

fn cmd_check(source: &SourceArgs, output: OutputFormat, quiet: bool) {
    let project = compile_or_exit(source, output);
    let resources: usize = project.units().map(|unit| unit.resource_count()).sum();
    match output {
        OutputFormat::Json => {
            let report = json!({
                "ok": true,
                "types": project.types.len(),
                "resources": resources,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if !quiet {
                println!("ok");
            }
        }
    }
}

fn cmd_types(source: &SourceArgs, output: OutputFormat, quiet: bool) {
    let project = compile_or_exit(source, output);
    match output {
        OutputFormat::Json => {
            let types: Vec<Value> = project
                .types
                .iter()
                .map(|definition| {
                    json!({
                        "name": definition.name,
                        "code": definition.code,
                        "deprecated": definition.decorators.has("deprecated"),
                        "fields": definition.fields.iter().map(|f| &f.name).collect::<Vec<_>>(),
                        "constructors": definition
                            .constructors
                            .iter()
                            .map(|c| c.arity())
                            .collect::<Vec<_>>(),
                        "template": template_json(definition.template.fields()),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&Value::Array(types)).unwrap_or_default()
            );
        }
        OutputFormat::Text => {
            if quiet {
                return;
            }
            for definition in project.types.iter() {
                let deprecated = if definition.decorators.has("deprecated") {
                    " (deprecated)"
                } else {
                    ""
                };
                println!("{} \"{}\"{}", definition.name, definition.code, deprecated);
                print_template(definition.template.fields(), 1);
            }
        }
    }
}

fn print_template(fields: &[BinaryField], depth: usize) {
    for field in fields {
        println!("{}{} \"{}\"", "  ".repeat(depth), field.kind, field.label);
        print_template(&field.children, depth + 1);
    }
}

fn template_json(fields: &[BinaryField]) -> Value {
    Value::Array(
        fields
            .iter()
            .map(|field| {
                let mut slot = json!({ "label": field.label, "kind": field.kind.to_string() });
                if field.is_group() {
                    slot["children"] = template_json(&field.children);
                }
                slot
            })
            .collect(),
    )
}

fn entry_line(unit: &str, entry: &ResourceEntry) -> String {
    let container = if entry.container.is_empty() {
        "-"
    } else {
        entry.container.as_str()
    };
    format!(
        "{}\t{}\t{}\t#{}\t{:?}\t{} bytes",
        unit,
        container,
        entry.type_code,
        entry.id,
        entry.name,
        entry.data.len()
    )
}

fn entry_json(entry: &ResourceEntry) -> Value {
    json!({
        "container": entry.container,
        "type_code": entry.type_code,
        "type_name": entry.type_name,
        "id": entry.id,
        "name": entry.name,
        "data": hex(&entry.data),
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Diagnostics go to stderr as a report, or to stdout as JSON.
fn report_diagnostic(diag: &Diagnostic, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("{}", diag.report()),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&diag.to_json_value()).unwrap_or_default()
        ),
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => println!("{}", json!({ "error": msg })),
    }
}
