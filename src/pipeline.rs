//! The pipeline runner (C4): owns the batch store and the open readers and
//! writers, and drives the per-batch state machine described in the design
//! (fill → filter → partition → write) until the input is exhausted.

use crate::batch::ReadBatchStore;
use crate::config::{Config, InputLayout, OutputLayout};
use crate::driver;
use crate::error::{TrimError, TrimResult};
use crate::io::{self, FastQReaderGz, IoThread, WriteFileZipStdout};
use crate::report::ReportBuilder;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use zoe::data::err::WithErrorContext;
use zoe::data::fastq::FastQ;

static MODULE: &str = module_path!();

enum InputReaders {
    Single(FastQReaderGz),
    Split(FastQReaderGz, FastQReaderGz),
    Interleaved(FastQReaderGz),
}

enum OutputWriters {
    Single(WriteFileZipStdout),
    Split(WriteFileZipStdout, WriteFileZipStdout),
    Interleaved(WriteFileZipStdout),
}

/// Runs the full pipeline for `config`, returning the finished report (if
/// reporting was requested) or `None` otherwise.
pub fn run(config: &Config) -> TrimResult<Option<crate::report::Report>> {
    let start = Instant::now();

    build_thread_pool(config.threads)?;

    let mut decoder_threads: Vec<(IoThread, PathBuf)> = Vec::new();
    let readers = open_inputs(config, &mut decoder_threads)?;
    let mut writers = open_outputs(config)?;
    let mut discard_writer = match &config.output_discard {
        Some(path) => Some(io::create_writer(Some(path))?),
        None => None,
    };

    if config.filters.is_empty() && config.verbose >= 2 {
        eprintln!("{MODULE} WARNING! no filters configured, reads will pass through unmodified");
    }
    if config.output_discard.is_some() && config.output_report.is_none() && config.verbose >= 2 {
        eprintln!("{MODULE} WARNING! --output-fastq-discard given without --output-report");
    }

    let paired = config.is_paired();
    let mut store = ReadBatchStore::new(paired, discard_writer.is_some());
    let mut report = config.output_report.is_some().then(ReportBuilder::new);

    run_batches(config, readers, &mut store, &mut writers, discard_writer.as_mut(), report.as_mut())?;

    flush_outputs(&mut writers, discard_writer.as_mut())?;
    io::finalize_threads(decoder_threads)?;

    let elapsed = start.elapsed().as_secs();
    eprintln!("{MODULE}: finished in {elapsed}s");

    Ok(report.map(|r| r.finish(config, elapsed)))
}

fn build_thread_pool(threads: usize) -> TrimResult<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| TrimError::Resource(e.to_string()))
}

fn open_inputs(config: &Config, decoder_threads: &mut Vec<(IoThread, PathBuf)>) -> TrimResult<InputReaders> {
    match config.input_layout {
        InputLayout::Single => {
            let path = config.input_forward.as_ref().expect("validated by from_cli");
            let (reader, thread) = io::open_fastq_file(path)?;
            if let Some(t) = thread {
                decoder_threads.push((t, path.clone()));
            }
            Ok(InputReaders::Single(reader))
        }
        InputLayout::PairedSplit => {
            let fwd = config.input_forward.as_ref().expect("validated by from_cli");
            let rev = config.input_reverse.as_ref().expect("validated by from_cli");
            let (reader1, thread1) = io::open_fastq_file(fwd)?;
            let (reader2, thread2) = io::open_fastq_file(rev)?;
            if let Some(t) = thread1 {
                decoder_threads.push((t, fwd.clone()));
            }
            if let Some(t) = thread2 {
                decoder_threads.push((t, rev.clone()));
            }
            Ok(InputReaders::Split(reader1, reader2))
        }
        InputLayout::PairedInterleaved => {
            let path = config.input_interleaved.as_ref().expect("validated by from_cli");
            let (reader, thread) = io::open_fastq_file(path)?;
            if let Some(t) = thread {
                decoder_threads.push((t, path.clone()));
            }
            Ok(InputReaders::Interleaved(reader))
        }
    }
}

fn open_outputs(config: &Config) -> TrimResult<OutputWriters> {
    match config.output_layout {
        OutputLayout::Single => Ok(OutputWriters::Single(io::create_writer(config.output_forward.as_deref())?)),
        OutputLayout::PairedSplit => {
            let fwd = config.output_forward.as_ref().expect("validated by from_cli");
            let rev = config.output_reverse.as_ref().expect("validated by from_cli");
            Ok(OutputWriters::Split(io::create_writer(Some(fwd))?, io::create_writer(Some(rev))?))
        }
        OutputLayout::PairedInterleaved => {
            let path = config.output_interleaved.as_ref().expect("validated by from_cli");
            Ok(OutputWriters::Interleaved(io::create_writer(Some(path))?))
        }
    }
}

fn run_batches(
    config: &Config, mut readers: InputReaders, store: &mut ReadBatchStore, writers: &mut OutputWriters,
    mut discard_writer: Option<&mut WriteFileZipStdout>, mut report: Option<&mut ReportBuilder>,
) -> TrimResult<()> {
    let mut batch_index: u64 = 0;
    loop {
        let n = fill_batch(&mut readers, store, config.reads_batch)?;
        if n == 0 {
            break;
        }
        batch_index += 1;
        if config.verbose >= 4 {
            eprintln!("{MODULE}: batch {batch_index}, {n} reads read");
        }

        if let Some(report) = report.as_deref_mut() {
            report.total_reads += n as u64;
            let mut hist = BTreeMap::new();
            store.distribution_into(&mut hist);
            report.merge_before(&hist);
        }

        for filter in &config.filters {
            let before = if config.verbose >= 6 { store.discard_ids().lock().expect("discard_ids mutex poisoned").len() } else { 0 };

            if config.is_paired() {
                driver::run_paired(filter, store.reads_1_mut(), store.reads_2_mut(), store.discard_ids());
            } else {
                driver::run_single(filter, store.reads_1_mut(), store.discard_ids());
            }

            if config.verbose >= 6 {
                let after = store.discard_ids().lock().expect("discard_ids mutex poisoned").len();
                eprintln!(
                    "{MODULE}: batch {batch_index}, filter {} ({}) discarded {}",
                    filter.kind_name(),
                    filter.params_string(),
                    after - before
                );
            }
        }

        store.partition();

        if let Some(writer) = discard_writer.as_deref_mut()
            && let Some((mut discarded_1, mut discarded_2)) = store.take_discard_buffer()
        {
            write_batch(writer, &mut discarded_1, &mut discarded_2, config.is_paired())?;
        }

        if let Some(report) = report.as_deref_mut() {
            report.kept_reads += store.size() as u64;
            let mut hist = BTreeMap::new();
            store.distribution_into(&mut hist);
            report.merge_after(&hist);
        }

        write_survivors(writers, store, config.output_layout)?;
        store.clear();
    }

    Ok(())
}

fn fill_batch(readers: &mut InputReaders, store: &mut ReadBatchStore, capacity: usize) -> TrimResult<usize> {
    let wrap = |e: std::io::Error| TrimError::IoRead(e.with_context("Failed to read FASTQ record"));
    match readers {
        InputReaders::Single(r) => store.fill_single(r, capacity).map_err(wrap),
        InputReaders::Split(r1, r2) => store.fill_paired(r1, r2, capacity).map_err(wrap),
        InputReaders::Interleaved(r) => store.fill_interleaved(r, capacity).map_err(wrap),
    }
}

/// Writes a batch's surviving reads (or discard buffer) to `writer`(s),
/// re-appending mate labels when the target is interleaved.
fn write_batch(writer: &mut WriteFileZipStdout, reads_1: &mut [FastQ], reads_2: &mut [FastQ], paired: bool) -> TrimResult<()> {
    let wrap = |e: std::io::Error| TrimError::IoWrite(e.with_context("Failed to write FASTQ record"));
    if paired {
        for (r1, r2) in reads_1.iter_mut().zip(reads_2.iter_mut()) {
            ReadBatchStore::label_for_interleave(r1, r2);
            write!(writer, "{r1}").map_err(wrap)?;
            write!(writer, "{r2}").map_err(wrap)?;
        }
    } else {
        for r1 in reads_1.iter() {
            write!(writer, "{r1}").map_err(wrap)?;
        }
    }
    Ok(())
}

fn write_survivors(writers: &mut OutputWriters, store: &mut ReadBatchStore, layout: OutputLayout) -> TrimResult<()> {
    let wrap = |e: std::io::Error| TrimError::IoWrite(e.with_context("Failed to write FASTQ record"));
    match (writers, layout) {
        (OutputWriters::Single(w), OutputLayout::Single) => {
            for read in store.reads_1() {
                write!(w, "{read}").map_err(wrap)?;
            }
            Ok(())
        }
        (OutputWriters::Split(w1, w2), OutputLayout::PairedSplit) => {
            for read in store.reads_1() {
                write!(w1, "{read}").map_err(wrap)?;
            }
            for read in store.reads_2() {
                write!(w2, "{read}").map_err(wrap)?;
            }
            Ok(())
        }
        (OutputWriters::Interleaved(w), OutputLayout::PairedInterleaved) => {
            let (reads_1, reads_2) = (store.reads_1_mut(), store.reads_2_mut());
            for (r1, r2) in reads_1.iter_mut().zip(reads_2.iter_mut()) {
                ReadBatchStore::label_for_interleave(r1, r2);
                write!(w, "{r1}").map_err(wrap)?;
                write!(w, "{r2}").map_err(wrap)?;
            }
            Ok(())
        }
        _ => unreachable!("output writer/layout mismatch guarded by from_cli"),
    }
}

fn flush_outputs(writers: &mut OutputWriters, discard_writer: Option<&mut WriteFileZipStdout>) -> TrimResult<()> {
    let wrap = |e: std::io::Error| TrimError::IoWrite(e.with_context("Failed to flush output"));
    match writers {
        OutputWriters::Single(w) => w.flush().map_err(wrap)?,
        OutputWriters::Split(w1, w2) => {
            w1.flush().map_err(wrap)?;
            w2.flush().map_err(wrap)?;
        }
        OutputWriters::Interleaved(w) => w.flush().map_err(wrap)?,
    }
    if let Some(writer) = discard_writer {
        writer.flush().map_err(wrap)?;
    }
    Ok(())
}
