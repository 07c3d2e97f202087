use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use env_logger::Builder;
use log::{info, LevelFilter};

use gwasplot::figure::{FileFormat, Output};
use gwasplot::man::{self, ManhattanOptions};
use gwasplot::qq::{self, QqOptions};
use gwasplot::table::{self, LoadOptions, Schema};
use gwasplot::PlotError;

fn main() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = real_main() {
        eprintln!("[ERROR] {e:?}");
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("gwasplot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Manhattan and Q-Q plots from a GWAS result table")
        .arg(
            Arg::new("input")
                .help("GWAS result file; needs at least a chromosome and a p-value column")
                .short('i')
                .long("input")
                .required(true)
                .value_name("FILE"),
        )
        .arg(
            Arg::new("significance")
                .help("Significance line on the -log10(p) scale, or NA for none")
                .short('s')
                .long("significance")
                .default_value("NA")
                .value_name("FLOAT|NA"),
        )
        .arg(
            Arg::new("output")
                .help("Manhattan plot output path")
                .short('o')
                .long("output")
                .default_value("Manhattan.png")
                .value_name("PNG"),
        )
        .arg(
            Arg::new("qq-output")
                .help("Q-Q plot output path")
                .long("qq-output")
                .default_value("Q-Q.png")
                .value_name("PNG"),
        )
        .arg(
            Arg::new("sep")
                .help("Field delimiter (a single character; \\t or 'tab' for tab)")
                .long("sep")
                .default_value("\\t")
                .value_name("CHAR"),
        )
        .arg(
            Arg::new("chr-col")
                .help("Chromosome column name")
                .long("chr-col")
                .default_value("chr")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("p-col")
                .help("P-value column name")
                .long("p-col")
                .default_value("p")
                .value_name("NAME"),
        )
        .arg(
            Arg::new("label-col")
                .help("Column used to label points at or above the significance line")
                .long("label-col")
                .required(false)
                .value_name("NAME"),
        )
        .arg(
            Arg::new("colors")
                .help("Comma-separated #rrggbb colours cycled over chromosomes")
                .long("colors")
                .default_value(man::DEFAULT_PALETTE)
                .value_name("HEX,HEX,..."),
        )
        .arg(
            Arg::new("alpha")
                .help("Q-Q point opacity in [0, 1]")
                .long("alpha")
                .value_parser(value_parser!(f64))
                .default_value("0.8")
                .value_name("FLOAT"),
        )
        .arg(
            Arg::new("dpi")
                .help("Output resolution in dots per inch")
                .long("dpi")
                .value_parser(value_parser!(u32).range(1..))
                .default_value("300"),
        )
        .arg(
            Arg::new("threads")
                .help("Rayon worker threads (optional)")
                .long("threads")
                .short('T')
                .required(false)
                .value_parser(value_parser!(usize)),
        )
}

fn real_main() -> Result<()> {
    let matches = cli().get_matches();

    let input = matches
        .get_one::<String>("input")
        .expect("required by clap")
        .to_string();
    let significance = parse_significance(
        matches
            .get_one::<String>("significance")
            .expect("default provided by clap"),
    )?;
    let output = PathBuf::from(
        matches
            .get_one::<String>("output")
            .expect("default provided by clap"),
    );
    let qq_output = PathBuf::from(
        matches
            .get_one::<String>("qq-output")
            .expect("default provided by clap"),
    );
    let delimiter = parse_delimiter(
        matches
            .get_one::<String>("sep")
            .expect("default provided by clap"),
    )?;
    let palette = man::parse_palette(
        matches
            .get_one::<String>("colors")
            .expect("default provided by clap"),
    )?;
    let label_col = matches.get_one::<String>("label-col").cloned();
    let alpha = *matches
        .get_one::<f64>("alpha")
        .expect("default provided by clap");
    let dpi = *matches
        .get_one::<u32>("dpi")
        .expect("default provided by clap");
    let threads = matches.get_one::<usize>("threads").copied();

    let schema = Schema {
        chromosome: matches
            .get_one::<String>("chr-col")
            .expect("default provided by clap")
            .to_string(),
        p_value: matches
            .get_one::<String>("p-col")
            .expect("default provided by clap")
            .to_string(),
        label: label_col.clone(),
    };

    if let Some(n) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
        info!("rayon threads = {}", n);
    }

    info!("Input : {}", input);
    match significance {
        Some(s) => info!("Signif: {}", s),
        None => info!("Signif: NA"),
    }
    if let Some(col) = &label_col {
        info!("Labels: {}", col);
    }
    info!("Output: {} / {}", output.display(), qq_output.display());
    // Catch a bad extension before the Q-Q file is written.
    FileFormat::from_path(&qq_output)?;
    FileFormat::from_path(&output)?;

    let table = table::load(&input, &LoadOptions { delimiter, schema })
        .with_context(|| format!("Failed to load GWAS results from {}", input))?;

    let qq_opts = QqOptions {
        alpha,
        size: QqOptions::default().size.with_dpi(dpi),
    };
    qq::run(&table.p_values(), &Output::File(qq_output.clone()), &qq_opts)
        .with_context(|| format!("Failed to draw Q-Q plot {}", qq_output.display()))?;

    let man_opts = ManhattanOptions {
        significance,
        palette,
        annotate: label_col.is_some(),
        size: ManhattanOptions::default().size.with_dpi(dpi),
    };
    man::run(&table, &Output::File(output.clone()), &man_opts)
        .with_context(|| format!("Failed to draw Manhattan plot {}", output.display()))?;

    Ok(())
}

/// `NA` means no significance line.
fn parse_significance(raw: &str) -> Result<Option<f64>, PlotError> {
    if raw == "NA" {
        return Ok(None);
    }
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(PlotError::Argument(format!(
            "--significance expects a number or NA, got '{raw}'"
        ))),
    }
}

fn parse_delimiter(raw: &str) -> Result<u8, PlotError> {
    match raw {
        "\\t" | "\t" | "tab" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        other => Err(PlotError::Argument(format!(
            "--sep must be a single ASCII character, got '{other}'"
        ))),
    }
}
