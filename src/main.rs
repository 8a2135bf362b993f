//! kicad-unit-swap: exchange two units of a multi-unit part in a KiCad
//! legacy hierarchical schematic.
//!
//! The board-side pad swap is left to the caller; the pad correspondence
//! between the two units is printed so it can be applied there.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use kicad_unit_swap::config;
use kicad_unit_swap::kicad::{EnvSnapshot, OutputMode, SwapPlan, SwapRequest, UnitSwapper};

/// Swap the schematic units behind two pads of a multi-unit footprint.
///
/// Finds the unit each pad belongs to in the project symbol cache, then
/// exchanges the unit designators of the two component instances across the
/// sheet hierarchy.
#[derive(Parser, Debug)]
#[command(name = "kicad-unit-swap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root schematic page of the project (`.sch`)
    #[arg(value_name = "ROOT_SCH")]
    root: PathBuf,

    /// Footprint reference (e.g. U1)
    #[arg(value_name = "REFERENCE")]
    reference: String,

    /// First pad designator
    #[arg(value_name = "PAD_A")]
    pad_a: String,

    /// Second pad designator
    #[arg(value_name = "PAD_B")]
    pad_b: String,

    /// Path to configuration file
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Symbol cache library (default: `<project>-cache.lib` next to the root page)
    #[arg(long, value_name = "LIB_FILE")]
    library: Option<PathBuf>,

    /// Write `<page><SUFFIX>` files instead of overwriting pages
    #[arg(
        long,
        value_name = "SUFFIX",
        num_args = 0..=1,
        default_missing_value = "_alt",
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    sibling: Option<String>,

    /// Do not keep timestamped backups of overwritten pages
    #[arg(long)]
    no_backup: bool,

    /// Resolve and report the swap without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the resolved swap as JSON
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(plan: &SwapPlan) {
    println!(
        "{} ({}): pad {} is unit {}, pad {} is unit {}",
        plan.reference, plan.symbol, plan.pad_a, plan.unit_a, plan.pad_b, plan.unit_b
    );
    for instance in &plan.instances {
        println!(
            "  unit {} at {} (byte {})",
            instance.unit,
            instance.page.display(),
            instance.offset
        );
    }
    if !plan.pad_map.is_empty() {
        println!("  pad map (unit {} -> unit {}):", plan.unit_a, plan.unit_b);
        for (from, to) in &plan.pad_map {
            println!("    {from} <-> {to}");
        }
    }
}

/// Loads configuration, plans the swap and writes it unless `--dry-run`.
fn run(args: Args) -> kicad_unit_swap::error::Result<()> {
    let cfg = config::load_config_or_default(args.config.as_deref())?;

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let env = EnvSnapshot::from_process().with_overrides(cfg.environment.clone());
    let swapper = UnitSwapper::new(env).with_max_depth(cfg.walk.max_depth);

    let mut request = SwapRequest::new(args.root, args.reference, args.pad_a, args.pad_b);
    if let Some(library) = args.library.or_else(|| cfg.library_path.clone()) {
        request = request.with_library(library);
    }

    let mut options = cfg.output_options();
    if let Some(suffix) = args.sibling {
        options.mode = OutputMode::Sibling { suffix };
    }
    if args.no_backup {
        options.backup = false;
    }

    info!(
        root = %request.root.display(),
        reference = %request.reference,
        "Planning unit swap"
    );
    let plan = swapper.plan(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_summary(&plan);
    }

    if args.dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }

    let written = plan.commit(&options)?;
    if !args.json {
        for path in &written {
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

/// Entry point for kicad-unit-swap.
fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Unit swap failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn sibling_flag_defaults_suffix() {
        let args = Args::parse_from(["kicad-unit-swap", "a.sch", "U1", "1", "4", "--sibling"]);
        assert_eq!(args.sibling.as_deref(), Some("_alt"));

        let args =
            Args::parse_from(["kicad-unit-swap", "a.sch", "U1", "1", "4", "--sibling", ".new"]);
        assert_eq!(args.sibling.as_deref(), Some(".new"));

        let empty = Args::try_parse_from(["kicad-unit-swap", "a.sch", "U1", "1", "4", "--sibling="]);
        assert!(empty.is_err());
    }

    #[test]
    fn log_level_precedence() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "debug"), Level::DEBUG);
        assert_eq!(get_log_level(2, false, "error"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
    }
}
