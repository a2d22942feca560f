use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pretty_print_nalgebra::*;

use nonbpa::generator::fraction_at;
use nonbpa::{
    calculate_parameters, generate_fractions, parse_starts, resolve_alias_structure, DesignSpec,
    FractionMatrix, GenerationRequestBuilder, StartSelection,
};

#[derive(Parser, Debug)]
#[command(
    name = "nonbpa",
    version,
    about = "Generates near-orthogonal fractions of mixed-level designs and resolves their aliases"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the derived parameters of a design
    Params {
        /// Levels per factor, e.g. 2,3,5
        #[arg(long, value_delimiter = ',', required = true)]
        levels: Vec<usize>,
    },

    /// Generate and score fractions
    Generate {
        #[arg(long, value_delimiter = ',', required = true)]
        levels: Vec<usize>,

        /// Runs per fraction
        #[arg(long)]
        size: usize,

        /// Number of random fractions
        #[arg(long, conflicts_with = "starts", required_unless_present = "starts")]
        count: Option<usize>,

        /// Comma-separated 1-based starts, e.g. "[1, 5, 9]"
        #[arg(long)]
        starts: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        /// Print every fraction as well as its scores
        #[arg(long, default_value_t = false)]
        show_fractions: bool,

        /// Write each fraction as tab-separated text into this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Resolve the alias structure of a fraction
    Alias {
        /// Tab-separated fraction, one run per line
        #[arg(long, conflicts_with_all = ["levels", "size", "start"])]
        fraction_file: Option<PathBuf>,

        #[arg(long, value_delimiter = ',')]
        levels: Option<Vec<usize>>,

        #[arg(long)]
        size: Option<usize>,

        #[arg(long)]
        start: Option<usize>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Params { levels } => print_params(&levels),
        Command::Generate { levels, size, count, starts, seed, show_fractions, output_dir } => {
            let selection = match (count, starts) {
                (Some(count), _) => StartSelection::Random { count },
                (None, Some(text)) => StartSelection::Custom(parse_starts(&text)?),
                (None, None) => bail!("either --count or --starts is required"),
            };
            run_generate(levels, size, selection, seed, show_fractions, output_dir)
        }
        Command::Alias { fraction_file, levels, size, start } => {
            let fraction = match (fraction_file, levels, size, start) {
                (Some(path), ..) => read_fraction(&path)?,
                (None, Some(levels), Some(size), Some(start)) => fraction_at(&levels, size, start)?,
                _ => bail!("give --fraction-file, or all of --levels, --size and --start"),
            };
            let structure = resolve_alias_structure(&fraction).context("alias resolution failed")?;
            println!("fraction: {}", fraction.pretty());
            print!("{structure}");
            if structure.is_orthogonal() {
                println!("no aliasing detected");
            }
            Ok(())
        }
    }
}

fn print_params(levels: &[usize]) -> Result<()> {
    let params = calculate_parameters(levels).context("could not derive design parameters")?;
    println!("{params}");
    if params.is_valid_for_generation() {
        println!("fraction sizes: {}..{}", params.sf_min, params.tr);
    } else {
        println!("design is not valid for generation: levels must be pairwise coprime");
    }
    Ok(())
}

fn run_generate(
    levels: Vec<usize>,
    size: usize,
    selection: StartSelection,
    seed: Option<u64>,
    show_fractions: bool,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut builder = GenerationRequestBuilder::default();
    builder
        .levels(DesignSpec::new(levels)?)
        .fraction_size(size)
        .selection(selection);
    if let Some(seed) = seed {
        builder.seed(seed);
    }
    let request = builder.build()?;
    log::info!("generating fractions for design {}", request.levels);

    let results = generate_fractions(&request).context("fraction generation failed")?;
    for result in &results {
        println!("{}", result.summary_line());
        if show_fractions {
            println!("{}", result.fraction.pretty());
            println!("VIFs: {}", pretty_print!(&result.vifs.transpose()));
        }
        if let Some(dir) = &output_dir {
            let path = dir.join(format!("fraction_{}.tsv", result.index));
            fs::write(&path, result.fraction.to_tsv())
                .with_context(|| format!("could not write {}", path.display()))?;
        }
    }
    Ok(())
}

fn read_fraction(path: &Path) -> Result<FractionMatrix> {
    let text = fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;
    Ok(FractionMatrix::from_tsv(&text)?)
}
