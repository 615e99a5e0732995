use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Parser};
use log::{error, LevelFilter};

use splitter::{config, open_extracts, run, Input, StrategyKind};

/// Extract geographic or tag-themed subsets from an OSM file.
// --hardcut claims -h, so clap's automatic short help flag is disabled and
// --help is added back by hand.
#[derive(Parser)]
#[command(name = "splitter", disable_help_flag = true)]
struct Args {
    /// Input OSM XML file, or - for stdin (hardcut only)
    osmfile: String,

    /// Extract configuration file, one extract per line
    configfile: PathBuf,

    /// Two-pass cut with reference-complete ways and cascading relations
    #[arg(short = 's', long)]
    softcut: bool,

    /// Single-pass cut, ways and relations cropped to the region
    #[arg(short = 'h', long)]
    hardcut: bool,

    /// Three-pass cut, reference-complete ways and relation members (default)
    #[arg(short = 'r', long)]
    softercut: bool,

    /// Softercut plus relation-to-relation cascade
    #[arg(short = 'u', long)]
    supersoftercut: bool,

    /// Select administrative boundary relations and their members
    #[arg(short = 'c', long)]
    cut_administrative: bool,

    /// Select everything tagged highway
    #[arg(short = 'w', long)]
    cut_highway: bool,

    /// Select administrative and territorial boundaries
    #[arg(short = 'b', long)]
    cut_all_borders: bool,

    /// Select everything carrying a ref-like tag
    #[arg(short = 'e', long)]
    cut_ref: bool,

    /// Select coastline ways and their nodes
    #[arg(short = 'a', long)]
    cut_water: bool,

    /// Two-pass cut, whole objects, no reference completion
    #[arg(short = 'p', long)]
    simplecut: bool,

    /// Verbose per-object trace on stderr
    #[arg(short = 'd', long)]
    debug: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

fn strategy(args: &Args) -> Result<StrategyKind, String> {
    let selected: Vec<StrategyKind> = [
        (args.softcut, StrategyKind::Softcut),
        (args.hardcut, StrategyKind::Hardcut),
        (args.softercut, StrategyKind::Softercut),
        (args.supersoftercut, StrategyKind::SuperSoftercut),
        (args.cut_administrative, StrategyKind::CutAdministrative),
        (args.cut_highway, StrategyKind::CutHighway),
        (args.cut_all_borders, StrategyKind::CutAllBorders),
        (args.cut_ref, StrategyKind::CutRef),
        (args.cut_water, StrategyKind::CutWater),
        (args.simplecut, StrategyKind::Simplecut),
    ]
    .into_iter()
    .filter_map(|(flag, kind)| flag.then_some(kind))
    .collect();

    match selected.as_slice() {
        [] => Ok(StrategyKind::Softercut),
        [kind] => Ok(*kind),
        many => Err(format!(
            "strategy flags are mutually exclusive, got {}",
            many.iter()
                .map(|kind| kind.name())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // clap exits 2 on usage errors by default; this tool promises 1.
            let _ = err.print();
            process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    env_logger::Builder::new()
        .filter_level(if args.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    if let Err(err) = try_main(args) {
        error!("{err:#}");
        process::exit(1);
    }
}

fn try_main(args: Args) -> anyhow::Result<()> {
    let kind = strategy(&args).map_err(anyhow::Error::msg)?;
    let input = if args.osmfile == "-" {
        Input::Stdin
    } else {
        Input::File(Path::new(&args.osmfile).to_path_buf())
    };
    let specs = config::load(&args.configfile)?;
    let extracts = open_extracts(specs)?;
    run(kind, input, extracts)
}
