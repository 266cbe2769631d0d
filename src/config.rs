//! Command-line surface and the validated [`Config`] it produces. Filter
//! flags are repeatable; each occurrence is parsed by a small `value_parser`
//! function in the style of this tool family's existing argument validators
//! and merged into `filters` in literal command-line order (interleaved
//! across flag kinds via `ArgMatches::indices_of`), so duplicates are simply
//! applied twice.

use crate::args::abort_clap;
use crate::filters::{InfoDust, InfoN, LenMin, QualSld, QualTail};
use clap::{ArgMatches, Parser, error::ErrorKind};
use std::path::PathBuf;

use crate::filters::FilterKernel;

/// A single configured filter, in command-line order.
pub enum FilterSpec {
    QualTail(QualTail),
    QualSld(QualSld),
    LenMin(LenMin),
    InfoDust(InfoDust),
    InfoN(InfoN),
}

impl FilterSpec {
    pub fn kernel(&self) -> &dyn FilterKernel {
        match self {
            FilterSpec::QualTail(k) => k,
            FilterSpec::QualSld(k) => k,
            FilterSpec::LenMin(k) => k,
            FilterSpec::InfoDust(k) => k,
            FilterSpec::InfoN(k) => k,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kernel().kind_name()
    }

    pub fn params_string(&self) -> String {
        self.kernel().params_string()
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch-streaming FASTQ trimmer for NGS short reads", long_about = None)]
pub struct Cli {
    /// Forward (or single-end) input FASTQ file, optionally gzip compressed
    #[arg(long = "input-fastq-forward", visible_alias = "iff")]
    pub input_fastq_forward: Option<PathBuf>,

    /// Reverse-mate input FASTQ file
    #[arg(long = "input-fastq-reverse", visible_alias = "ifr")]
    pub input_fastq_reverse: Option<PathBuf>,

    /// Interleaved paired input FASTQ file (mates alternate, named with a trailing \1/\2)
    #[arg(long = "input-fastq-interleaved", visible_alias = "ifi")]
    pub input_fastq_interleaved: Option<PathBuf>,

    /// Forward (or single-end) output FASTQ file; stdout if omitted in single-end mode
    #[arg(long = "output-fastq-forward", visible_alias = "off")]
    pub output_fastq_forward: Option<PathBuf>,

    /// Reverse-mate output FASTQ file
    #[arg(long = "output-fastq-reverse", visible_alias = "ofr")]
    pub output_fastq_reverse: Option<PathBuf>,

    /// Interleaved paired output FASTQ file
    #[arg(long = "output-fastq-interleaved", visible_alias = "ofi")]
    pub output_fastq_interleaved: Option<PathBuf>,

    /// Discard sink; paired runs write it interleaved, single-end runs write plain FASTQ
    #[arg(short = 'u', long = "output-fastq-discard")]
    pub output_fastq_discard: Option<PathBuf>,

    /// JSON report output path
    #[arg(short = 'r', long = "output-report")]
    pub output_report: Option<PathBuf>,

    /// Tail quality trim: Q[:N[:P]], N default 1
    #[arg(long = "quality-tail", value_parser = parse_quality_tail)]
    pub quality_tail: Vec<QualTail>,

    /// Sliding-window mean quality trim: M:W
    #[arg(long = "quality-sliding-window", value_parser = parse_quality_sliding_window)]
    pub quality_sliding_window: Vec<QualSld>,

    /// Minimum length discard: L
    #[arg(long = "length-min", value_parser = parse_length_min)]
    pub length_min: Vec<LenMin>,

    /// DUST-like low-complexity discard: C
    #[arg(long = "information-dust", value_parser = parse_information_dust)]
    pub information_dust: Vec<InfoDust>,

    /// Excess-N discard: S
    #[arg(long = "information-n", value_parser = parse_information_n)]
    pub information_n: Vec<InfoN>,

    /// Worker thread count, 1..8
    #[arg(short = 't', long = "threads", default_value = "1", value_parser = validate_threads)]
    pub threads: usize,

    /// Reads per batch, 100..50_000_000
    #[arg(long = "reads-batch", visible_alias = "rb", default_value = "1000000", value_parser = validate_reads_batch)]
    pub reads_batch: usize,

    /// Verbosity level, 1..6
    #[arg(long = "verbose", visible_alias = "ver", default_value = "4", value_parser = validate_verbosity)]
    pub verbose: u8,
}

/// How the input is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    Single,
    PairedSplit,
    PairedInterleaved,
}

/// How the output is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    Single,
    PairedSplit,
    PairedInterleaved,
}

pub struct Config {
    pub input_forward:     Option<PathBuf>,
    pub input_reverse:     Option<PathBuf>,
    pub input_interleaved: Option<PathBuf>,
    pub input_layout:      InputLayout,

    pub output_forward:     Option<PathBuf>,
    pub output_reverse:     Option<PathBuf>,
    pub output_interleaved: Option<PathBuf>,
    pub output_layout:      OutputLayout,

    pub output_discard: Option<PathBuf>,
    pub output_report:  Option<PathBuf>,

    pub filters: Vec<FilterSpec>,

    pub threads:     usize,
    pub reads_batch: usize,
    pub verbose:     u8,
}

impl Config {
    pub fn is_paired(&self) -> bool {
        !matches!(self.input_layout, InputLayout::Single)
    }
}

/// Validates the CLI, resolves the input/output layout, and collects every
/// repeated filter flag into a single [`Vec<FilterSpec>`] ordered the way it
/// was given on the command line, interleaved across flag kinds. `matches` is
/// the raw [`ArgMatches`] `cli` was parsed from; it is only consulted for
/// `indices_of`, which the derive API doesn't expose.
pub fn from_cli(cli: Cli, matches: &ArgMatches) -> Config {
    let input_layout = match (&cli.input_fastq_forward, &cli.input_fastq_reverse, &cli.input_fastq_interleaved) {
        (Some(_), None, None) => InputLayout::Single,
        (Some(_), Some(_), None) => InputLayout::PairedSplit,
        (None, None, Some(_)) => InputLayout::PairedInterleaved,
        _ => abort_clap(
            ErrorKind::ArgumentConflict,
            "exactly one of: --input-fastq-forward alone, --input-fastq-forward with --input-fastq-reverse, or \
             --input-fastq-interleaved must be given",
            None,
        ),
    };

    let output_layout = match (&cli.output_fastq_forward, &cli.output_fastq_reverse, &cli.output_fastq_interleaved) {
        (_, None, None) => OutputLayout::Single,
        (Some(_), Some(_), None) => OutputLayout::PairedSplit,
        (None, None, Some(_)) => OutputLayout::PairedInterleaved,
        _ => abort_clap(
            ErrorKind::ArgumentConflict,
            "exactly one of: --output-fastq-forward alone, --output-fastq-forward with --output-fastq-reverse, or \
             --output-fastq-interleaved may be given",
            None,
        ),
    };

    let paired_in = !matches!(input_layout, InputLayout::Single);
    let paired_out = !matches!(output_layout, OutputLayout::Single);
    if paired_in != paired_out {
        abort_clap(
            ErrorKind::ArgumentConflict,
            "input and output must both be single-end or both be paired",
            None,
        );
    }

    // clap tracks the argv index of every occurrence of every arg; zip each
    // Vec<T> field with its indices so the merged list below can be sorted
    // back into literal command-line order instead of grouped by flag kind.
    let mut filters: Vec<(usize, FilterSpec)> = Vec::new();
    filters.extend(indexed(matches, "quality_tail", cli.quality_tail).into_iter().map(|(i, f)| (i, FilterSpec::QualTail(f))));
    filters.extend(
        indexed(matches, "quality_sliding_window", cli.quality_sliding_window)
            .into_iter()
            .map(|(i, f)| (i, FilterSpec::QualSld(f))),
    );
    filters.extend(indexed(matches, "length_min", cli.length_min).into_iter().map(|(i, f)| (i, FilterSpec::LenMin(f))));
    filters.extend(
        indexed(matches, "information_dust", cli.information_dust)
            .into_iter()
            .map(|(i, f)| (i, FilterSpec::InfoDust(f))),
    );
    filters.extend(indexed(matches, "information_n", cli.information_n).into_iter().map(|(i, f)| (i, FilterSpec::InfoN(f))));
    filters.sort_by_key(|(i, _)| *i);
    let filters = filters.into_iter().map(|(_, f)| f).collect();

    Config {
        input_forward: cli.input_fastq_forward,
        input_reverse: cli.input_fastq_reverse,
        input_interleaved: cli.input_fastq_interleaved,
        input_layout,
        output_forward: cli.output_fastq_forward,
        output_reverse: cli.output_fastq_reverse,
        output_interleaved: cli.output_fastq_interleaved,
        output_layout,
        output_discard: cli.output_fastq_discard,
        output_report: cli.output_report,
        filters,
        threads: cli.threads,
        reads_batch: cli.reads_batch,
        verbose: cli.verbose,
    }
}

fn validate_threads(value: &str) -> Result<usize, String> {
    let parsed = value.parse::<usize>().map_err(|_| format!("`{value}` is not a valid integer"))?;
    if (1..=8).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("threads must be between 1 and 8, but {parsed} was given"))
    }
}

fn validate_reads_batch(value: &str) -> Result<usize, String> {
    let parsed = value.parse::<usize>().map_err(|_| format!("`{value}` is not a valid integer"))?;
    if (100..=50_000_000).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("reads-batch must be between 100 and 50,000,000, but {parsed} was given"))
    }
}

fn validate_verbosity(value: &str) -> Result<u8, String> {
    let parsed = value.parse::<u8>().map_err(|_| format!("`{value}` is not a valid integer"))?;
    if (1..=6).contains(&parsed) {
        Ok(parsed)
    } else {
        Err(format!("verbose must be between 1 and 6, but {parsed} was given"))
    }
}

/// Pairs each already-parsed value of a repeated arg with the argv index its
/// occurrence started at, so callers can merge several repeated args back
/// into one literal command-line order.
fn indexed<T>(matches: &ArgMatches, id: &str, values: Vec<T>) -> Vec<(usize, T)> {
    match matches.indices_of(id) {
        Some(indices) => indices.zip(values).collect(),
        None => Vec::new(),
    }
}

fn split_args(value: &str) -> Vec<&str> {
    value.split(':').collect()
}

fn parse_u32_field(name: &str, raw: &str) -> Result<u32, String> {
    raw.parse::<u32>().map_err(|_| format!("{name} must be a non-negative integer, got `{raw}`"))
}

fn parse_quality_tail(value: &str) -> Result<QualTail, String> {
    let parts = split_args(value);
    let (q, n, p) = match parts.as_slice() {
        [q] => (*q, None, None),
        [q, n] => (*q, Some(*n), None),
        [q, n, p] => (*q, Some(*n), Some(*p)),
        _ => return Err(format!("--quality-tail expects Q[:N[:P]], got `{value}`")),
    };
    let base_quality = parse_u32_field("base_quality", q)?;
    let base_number = match n {
        Some(n) => parse_u32_field("base_number", n)?,
        None => 1,
    };
    let len_perc = p.map(|p| parse_u32_field("len_perc", p)).transpose()?;
    Ok(QualTail::new(base_quality, base_number, len_perc))
}

fn parse_quality_sliding_window(value: &str) -> Result<QualSld, String> {
    let parts = split_args(value);
    let [m, w] = parts.as_slice() else {
        return Err(format!("--quality-sliding-window expects M:W, got `{value}`"));
    };
    let mean_quality = parse_u32_field("mean_quality", m)?;
    let windows_length = parse_u32_field("windows_length", w)?;
    if windows_length == 0 {
        return Err("windows_length must be at least 1".to_string());
    }
    Ok(QualSld::new(mean_quality, windows_length))
}

fn parse_length_min(value: &str) -> Result<LenMin, String> {
    let len_min = parse_u32_field("len_min", value)?;
    Ok(LenMin::new(len_min))
}

fn parse_information_dust(value: &str) -> Result<InfoDust, String> {
    let score = parse_u32_field("score", value)?;
    Ok(InfoDust::new(score))
}

fn parse_information_n(value: &str) -> Result<InfoN, String> {
    let score = parse_u32_field("score", value)?;
    Ok(InfoN::new(score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};

    fn parse(argv: &[&str]) -> Config {
        let matches = Cli::command().try_get_matches_from(argv).expect("valid argv");
        let cli = Cli::from_arg_matches(&matches).expect("matches built from Cli::command()");
        from_cli(cli, &matches)
    }

    #[test]
    fn filters_interleave_in_literal_argv_order() {
        let config = parse(&[
            "fqtrim-core",
            "--input-fastq-forward",
            "in.fq",
            "--length-min",
            "10",
            "--quality-tail",
            "20:5",
            "--length-min",
            "5",
        ]);

        let kinds: Vec<&str> = config.filters.iter().map(FilterSpec::kind_name).collect();
        assert_eq!(kinds, vec!["LenMin", "QualTail", "LenMin"]);
        assert_eq!(config.filters[0].params_string(), "len_min:10");
        assert_eq!(config.filters[2].params_string(), "len_min:5");
    }

    #[test]
    fn single_end_layout_resolves_from_forward_only() {
        let config = parse(&["fqtrim-core", "--input-fastq-forward", "in.fq"]);
        assert_eq!(config.input_layout, InputLayout::Single);
        assert_eq!(config.output_layout, OutputLayout::Single);
    }

    #[test]
    fn paired_split_layout_resolves_from_forward_and_reverse() {
        let config = parse(&[
            "fqtrim-core",
            "--input-fastq-forward",
            "in_1.fq",
            "--input-fastq-reverse",
            "in_2.fq",
            "--output-fastq-forward",
            "out_1.fq",
            "--output-fastq-reverse",
            "out_2.fq",
        ]);
        assert_eq!(config.input_layout, InputLayout::PairedSplit);
        assert_eq!(config.output_layout, OutputLayout::PairedSplit);
    }
}
