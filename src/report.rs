//! The JSON run report (§6). Built up incrementally as the pipeline runs,
//! then serialised once at the end with `serde_json`.

use crate::config::{Config, FilterSpec, InputLayout};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Serialize)]
pub struct SoftwareInfo {
    pub name:    &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct Runtime {
    pub unit:  &'static str,
    pub value: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sequencing {
    Single,
    Paired,
    Undefined,
}

#[derive(Serialize)]
pub struct FileInfo {
    pub input:  Vec<String>,
    pub output: Vec<String>,
}

#[derive(Serialize)]
pub struct Analyze {
    pub runtime:    Runtime,
    pub sequencing: Sequencing,
    pub file:       FileInfo,
    pub trimmers:   BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct Statistics {
    pub total:                u64,
    pub kept:                 u64,
    pub discarded:            u64,
    pub length_reads_before:  BTreeMap<String, u64>,
    pub length_reads_after:   BTreeMap<String, u64>,
}

#[derive(Serialize)]
pub struct Report {
    pub software:   SoftwareInfo,
    pub analyze:    Analyze,
    pub statistics: Statistics,
}

/// Accumulates counters across batches; converted into a [`Report`] at the
/// end of the run.
#[derive(Default)]
pub struct ReportBuilder {
    pub total_reads:         u64,
    pub kept_reads:          u64,
    pub length_hist_before:  BTreeMap<usize, u64>,
    pub length_hist_after:   BTreeMap<usize, u64>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge_before(&mut self, histogram: &BTreeMap<usize, u64>) {
        for (&len, &count) in histogram {
            *self.length_hist_before.entry(len).or_insert(0) += count;
        }
    }

    pub fn merge_after(&mut self, histogram: &BTreeMap<usize, u64>) {
        for (&len, &count) in histogram {
            *self.length_hist_after.entry(len).or_insert(0) += count;
        }
    }

    pub fn finish(self, config: &Config, elapsed_secs: u64) -> Report {
        let sequencing = match config.input_layout {
            InputLayout::Single => Sequencing::Single,
            InputLayout::PairedSplit | InputLayout::PairedInterleaved => Sequencing::Paired,
        };

        let input = input_paths(config).into_iter().map(path_to_string).collect();
        let output = output_paths(config).into_iter().map(path_to_string).collect();

        let mut trimmers = BTreeMap::new();
        for filter in &config.filters {
            trimmers.insert(filter.kind_name().to_string(), filter.params_string());
        }

        let discarded = self.total_reads.saturating_sub(self.kept_reads);

        Report {
            software: SoftwareInfo {
                name:    env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
            },
            analyze: Analyze {
                runtime: Runtime {
                    unit:  "seconds",
                    value: elapsed_secs,
                },
                sequencing,
                file: FileInfo { input, output },
                trimmers,
            },
            statistics: Statistics {
                total: self.total_reads,
                kept: self.kept_reads,
                discarded,
                length_reads_before: stringify_histogram(&self.length_hist_before),
                length_reads_after: stringify_histogram(&self.length_hist_after),
            },
        }
    }
}

fn stringify_histogram(histogram: &BTreeMap<usize, u64>) -> BTreeMap<String, u64> {
    histogram.iter().map(|(&len, &count)| (len.to_string(), count)).collect()
}

fn input_paths(config: &Config) -> Vec<Option<PathBuf>> {
    vec![
        config.input_forward.clone().or_else(|| config.input_interleaved.clone()),
        config.input_reverse.clone(),
    ]
}

fn output_paths(config: &Config) -> Vec<Option<PathBuf>> {
    vec![
        config.output_forward.clone().or_else(|| config.output_interleaved.clone()),
        config.output_reverse.clone(),
    ]
}

fn path_to_string(path: Option<PathBuf>) -> String {
    match path {
        Some(p) => p.display().to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputLayout, OutputLayout};
    use crate::filters::LenMin;
    use std::path::PathBuf;

    fn single_end_config(filters: Vec<FilterSpec>) -> Config {
        Config {
            input_forward: Some(PathBuf::from("in.fq")),
            input_reverse: None,
            input_interleaved: None,
            input_layout: InputLayout::Single,
            output_forward: Some(PathBuf::from("out.fq")),
            output_reverse: None,
            output_interleaved: None,
            output_layout: OutputLayout::Single,
            output_discard: None,
            output_report: None,
            filters,
            threads: 1,
            reads_batch: 1000,
            verbose: 4,
        }
    }

    #[test]
    fn merge_before_after_accumulate_across_batches() {
        let mut builder = ReportBuilder::new();
        builder.merge_before(&BTreeMap::from([(100, 2), (150, 1)]));
        builder.merge_before(&BTreeMap::from([(100, 3)]));
        assert_eq!(builder.length_hist_before[&100], 5);
        assert_eq!(builder.length_hist_before[&150], 1);
    }

    #[test]
    fn finish_computes_discarded_and_sequencing_kind() {
        let mut builder = ReportBuilder::new();
        builder.total_reads = 10;
        builder.kept_reads = 7;
        builder.merge_after(&BTreeMap::from([(90, 7)]));
        let config = single_end_config(vec![FilterSpec::LenMin(LenMin::new(35))]);

        let report = builder.finish(&config, 3);

        assert_eq!(report.statistics.total, 10);
        assert_eq!(report.statistics.kept, 7);
        assert_eq!(report.statistics.discarded, 3);
        assert!(matches!(report.analyze.sequencing, Sequencing::Single));
        assert_eq!(report.analyze.trimmers.get("LenMin").map(String::as_str), Some("len_min:35"));
    }
}
