//! The parallel driver (C3): applies one filter kernel to every row of a
//! batch. Single-end batches parallelise directly over R1; paired batches run
//! R1 and R2 each serially in parallel with each other via `rayon::join`,
//! unioning both mates' decisions into one `discard_ids` set.

use crate::config::FilterSpec;
use std::collections::BTreeSet;
use std::sync::Mutex;
use zoe::data::fastq::FastQ;

use crate::filters::KernelEffect;

/// Applies `filter` to every row of `reads` in parallel, truncating in place
/// and recording discards (offset by `offset`, the row's position within the
/// whole batch) into `discard_ids`. Used for single-end batches, where there
/// is only one mate to parallelise over.
fn apply_to_mate_parallel(filter: &FilterSpec, reads: &mut [FastQ], offset: usize, discard_ids: &Mutex<BTreeSet<usize>>) {
    use rayon::prelude::*;

    let kernel = filter.kernel();
    let local_discards: Vec<usize> = reads
        .par_iter_mut()
        .enumerate()
        .filter_map(|(i, read)| apply_to_read(kernel, read).map(|()| offset + i))
        .collect();

    if !local_discards.is_empty() {
        discard_ids.lock().expect("discard_ids mutex poisoned").extend(local_discards);
    }
}

/// Applies `filter` to every row of `reads` serially, truncating in place and
/// recording discards into `discard_ids`. Used for each mate of a paired
/// batch, where the two mates already run in parallel with each other.
fn apply_to_mate_serial(filter: &FilterSpec, reads: &mut [FastQ], offset: usize, discard_ids: &Mutex<BTreeSet<usize>>) {
    let kernel = filter.kernel();
    let local_discards: Vec<usize> = reads
        .iter_mut()
        .enumerate()
        .filter_map(|(i, read)| apply_to_read(kernel, read).map(|()| offset + i))
        .collect();

    if !local_discards.is_empty() {
        discard_ids.lock().expect("discard_ids mutex poisoned").extend(local_discards);
    }
}

/// Applies one kernel decision to one read, truncating in place. Returns
/// `Some(())` if the read should be discarded.
fn apply_to_read(kernel: &dyn crate::filters::FilterKernel, read: &mut FastQ) -> Option<()> {
    match kernel.decide(read) {
        KernelEffect::KeepFull => None,
        KernelEffect::KeepPrefix(len) => {
            read.sequence.shorten_to(len);
            read.quality.shorten_to(len);
            None
        }
        KernelEffect::Discard => Some(()),
    }
}

/// Runs one filter over a single-end batch.
pub fn run_single(filter: &FilterSpec, reads_1: &mut [FastQ], discard_ids: &Mutex<BTreeSet<usize>>) {
    apply_to_mate_parallel(filter, reads_1, 0, discard_ids);
}

/// Runs one filter over a paired batch: R1 and R2 each processed serially,
/// the two mates in parallel with each other. Effects commute into the same
/// `discard_ids` set — if either mate is marked, the pair is discarded later
/// by [`crate::batch::ReadBatchStore::partition`].
pub fn run_paired(filter: &FilterSpec, reads_1: &mut [FastQ], reads_2: &mut [FastQ], discard_ids: &Mutex<BTreeSet<usize>>) {
    rayon::join(
        || apply_to_mate_serial(filter, reads_1, 0, discard_ids),
        || apply_to_mate_serial(filter, reads_2, 0, discard_ids),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::LenMin;
    use zoe::prelude::*;

    fn fq(seq: &str) -> FastQ {
        FastQ {
            header:   "@r".to_string(),
            sequence: Nucleotides::from(seq.as_bytes()),
            quality:  QualityScores::try_from("I".repeat(seq.len()).as_bytes()).unwrap(),
        }
    }

    #[test]
    fn run_single_marks_short_reads() {
        let filter = FilterSpec::LenMin(LenMin::new(5));
        let mut reads = vec![fq("ACGT"), fq("ACGTACGT")];
        let discard_ids = Mutex::new(BTreeSet::new());
        run_single(&filter, &mut reads, &discard_ids);
        assert_eq!(discard_ids.into_inner().unwrap(), BTreeSet::from([0]));
    }

    #[test]
    fn run_paired_unions_both_mates() {
        let filter = FilterSpec::LenMin(LenMin::new(5));
        let mut reads_1 = vec![fq("ACGTACGT"), fq("ACGT")];
        let mut reads_2 = vec![fq("ACGT"), fq("ACGTACGT")];
        let discard_ids = Mutex::new(BTreeSet::new());
        run_paired(&filter, &mut reads_1, &mut reads_2, &discard_ids);
        assert_eq!(discard_ids.into_inner().unwrap(), BTreeSet::from([0, 1]));
    }
}
