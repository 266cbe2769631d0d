//! The read batch store (C2): a columnar store of FASTQ records for R1 and
//! (when paired) R2, plus the discard-id set that the parallel driver
//! populates and that [`ReadBatchStore::partition`] consumes.
//!
//! A `FastQ` record already bundles a name (`header`) with its
//! quality-bearing sequence, so rather than keeping separate `names_*` and
//! `seqs_*` arrays this store keeps one `Vec<FastQ>` per mate — the same
//! record type the reader hands back and the writer consumes directly.

use crate::utils::mate_label::{append_mate_label, strip_mate_label};
use std::collections::BTreeSet;
use std::sync::Mutex;
use zoe::data::fastq::FastQ;

/// A columnar store of reads for one batch. See §3/§4.2 of the design for
/// the invariants this type must uphold (pair alignment, monotone shrink,
/// ordered discard ids, stable partitioning).
pub struct ReadBatchStore {
    reads_1:        Vec<FastQ>,
    reads_2:        Vec<FastQ>,
    scratch:        Vec<FastQ>,
    paired:         bool,
    discard_ids:    Mutex<BTreeSet<usize>>,
    discard_buffer: Option<(Vec<FastQ>, Vec<FastQ>)>,
}

impl ReadBatchStore {
    /// Creates an empty store. `paired` fixes whether this store ever holds
    /// an R2 stream; `keep_discards` enables the discard buffer used when a
    /// discard sink is configured.
    pub fn new(paired: bool, keep_discards: bool) -> Self {
        Self {
            reads_1: Vec::new(),
            reads_2: Vec::new(),
            scratch: Vec::new(),
            paired,
            discard_ids: Mutex::new(BTreeSet::new()),
            discard_buffer: keep_discards.then(|| (Vec::new(), Vec::new())),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.paired
    }

    /// Fills the store from a single-end stream, reading up to `capacity`
    /// records. Returns the number of records read.
    pub fn fill_single<I, E>(&mut self, source: &mut I, capacity: usize) -> Result<usize, E>
    where
        I: Iterator<Item = Result<FastQ, E>>, {
        debug_assert!(!self.paired);
        let mut n = 0;
        for record in source.by_ref().take(capacity) {
            self.reads_1.push(record?);
            n += 1;
        }
        Ok(n)
    }

    /// Fills the store from two mate streams (forward/reverse), reading up
    /// to `capacity` pairs. Returns the number of pairs read.
    pub fn fill_paired<I1, I2, E>(&mut self, r1: &mut I1, r2: &mut I2, capacity: usize) -> Result<usize, E>
    where
        I1: Iterator<Item = Result<FastQ, E>>,
        I2: Iterator<Item = Result<FastQ, E>>, {
        debug_assert!(self.paired);
        let mut n = 0;
        for _ in 0..capacity {
            match (r1.next(), r2.next()) {
                (Some(a), Some(b)) => {
                    self.reads_1.push(a?);
                    self.reads_2.push(b?);
                    n += 1;
                }
                _ => break,
            }
        }
        Ok(n)
    }

    /// Fills the store from a single interleaved stream, splitting by
    /// even/odd row index into R1/R2 and stripping a trailing `\1`/`\2` mate
    /// label from each name in place.
    pub fn fill_interleaved<I, E>(&mut self, source: &mut I, capacity: usize) -> Result<usize, E>
    where
        I: Iterator<Item = Result<FastQ, E>>, {
        debug_assert!(self.paired);
        self.scratch.clear();
        for record in source.by_ref().take(capacity * 2) {
            self.scratch.push(record?);
        }

        let mut n = 0;
        let mut drained = self.scratch.drain(..);
        while let (Some(mut r1), Some(mut r2)) = (drained.next(), drained.next()) {
            strip_mate_label(&mut r1.header);
            strip_mate_label(&mut r2.header);
            self.reads_1.push(r1);
            self.reads_2.push(r2);
            n += 1;
        }
        Ok(n)
    }

    pub fn reads_1(&self) -> &[FastQ] {
        &self.reads_1
    }

    pub fn reads_2(&self) -> &[FastQ] {
        &self.reads_2
    }

    pub fn reads_1_mut(&mut self) -> &mut [FastQ] {
        &mut self.reads_1
    }

    pub fn reads_2_mut(&mut self) -> &mut [FastQ] {
        &mut self.reads_2
    }

    pub fn discard_ids(&self) -> &Mutex<BTreeSet<usize>> {
        &self.discard_ids
    }

    /// Unions `ids` into the discard set. Safe to call from multiple driver
    /// workers concurrently.
    pub fn mark_discard<It: IntoIterator<Item = usize>>(&self, ids: It) {
        let mut guard = self.discard_ids.lock().expect("discard_ids mutex poisoned");
        guard.extend(ids);
    }

    /// Compacts the store to its surviving rows, preserving input order. If
    /// a discard buffer is enabled, the removed rows are appended to it (also
    /// preserving input order). Returns the number of rows removed.
    pub fn partition(&mut self) -> usize {
        let discard_ids = std::mem::take(&mut *self.discard_ids.lock().expect("discard_ids mutex poisoned"));
        let removed = discard_ids.len();
        if removed == 0 {
            return 0;
        }

        let mut kept_1 = Vec::with_capacity(self.reads_1.len() - removed);
        let mut kept_2 = Vec::with_capacity(self.reads_2.len().saturating_sub(removed));
        let (mut buffer_1, mut buffer_2) = match self.discard_buffer.take() {
            Some(buffers) => buffers,
            None => (Vec::new(), Vec::new()),
        };
        let want_buffer = self.discard_buffer.is_some() || !buffer_1.is_empty() || !buffer_2.is_empty();

        for (i, read_1) in self.reads_1.drain(..).enumerate() {
            if discard_ids.contains(&i) {
                if want_buffer {
                    buffer_1.push(read_1);
                }
            } else {
                kept_1.push(read_1);
            }
        }

        if self.paired {
            for (i, read_2) in self.reads_2.drain(..).enumerate() {
                if discard_ids.contains(&i) {
                    if want_buffer {
                        buffer_2.push(read_2);
                    }
                } else {
                    kept_2.push(read_2);
                }
            }
        }

        self.reads_1 = kept_1;
        self.reads_2 = kept_2;
        if want_buffer {
            self.discard_buffer = Some((buffer_1, buffer_2));
        }

        removed
    }

    /// Takes the staged discard buffer, leaving an empty (but still enabled)
    /// buffer behind.
    pub fn take_discard_buffer(&mut self) -> Option<(Vec<FastQ>, Vec<FastQ>)> {
        let enabled = self.discard_buffer.is_some();
        let taken = self.discard_buffer.take();
        if enabled {
            self.discard_buffer = Some((Vec::new(), Vec::new()));
        }
        taken
    }

    pub fn size(&self) -> usize {
        self.reads_1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads_1.is_empty()
    }

    /// Empties all columns and the discard set, ready for reuse.
    pub fn clear(&mut self) {
        self.reads_1.clear();
        self.reads_2.clear();
        self.scratch.clear();
        self.discard_ids.lock().expect("discard_ids mutex poisoned").clear();
    }

    /// Increments `histogram[len]` for every surviving read in R1 and (if
    /// paired) R2.
    pub fn distribution_into(&self, histogram: &mut std::collections::BTreeMap<usize, u64>) {
        for read in &self.reads_1 {
            *histogram.entry(read.sequence.len()).or_insert(0) += 1;
        }
        if self.paired {
            for read in &self.reads_2 {
                *histogram.entry(read.sequence.len()).or_insert(0) += 1;
            }
        }
    }

    /// Re-appends the `\1`/`\2` mate-label suffixes to a pair of reads about
    /// to be written out interleaved. Used by the pipeline's interleaved
    /// output path; does not mutate the store itself.
    pub fn label_for_interleave(read_1: &mut FastQ, read_2: &mut FastQ) {
        append_mate_label(&mut read_1.header, '1');
        append_mate_label(&mut read_2.header, '2');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe::prelude::*;

    fn fq(name: &str, seq: &str) -> FastQ {
        FastQ {
            header:   name.to_string(),
            sequence: Nucleotides::from(seq.as_bytes()),
            quality:  QualityScores::try_from("I".repeat(seq.len()).as_bytes()).unwrap(),
        }
    }

    #[test]
    fn partition_preserves_order_and_symmetry() {
        let mut store = ReadBatchStore::new(true, true);
        store.reads_1.push(fq("@a", "ACGT"));
        store.reads_1.push(fq("@b", "ACGT"));
        store.reads_1.push(fq("@c", "ACGT"));
        store.reads_2.push(fq("@a", "TTTT"));
        store.reads_2.push(fq("@b", "TTTT"));
        store.reads_2.push(fq("@c", "TTTT"));

        store.mark_discard([1]);
        let removed = store.partition();

        assert_eq!(removed, 1);
        assert_eq!(store.size(), 2);
        assert_eq!(store.reads_1()[0].header, "@a");
        assert_eq!(store.reads_1()[1].header, "@c");
        assert_eq!(store.reads_2()[0].header, "@a");
        assert_eq!(store.reads_2()[1].header, "@c");

        let (buf_1, buf_2) = store.take_discard_buffer().unwrap();
        assert_eq!(buf_1.len(), 1);
        assert_eq!(buf_1[0].header, "@b");
        assert_eq!(buf_2[0].header, "@b");
    }

    #[test]
    fn clear_empties_discard_ids_too() {
        let mut store = ReadBatchStore::new(false, false);
        store.reads_1.push(fq("@a", "ACGT"));
        store.mark_discard([0]);
        store.clear();
        assert!(store.is_empty());
        assert!(store.discard_ids.lock().unwrap().is_empty());
    }

    #[test]
    fn distribution_counts_both_mates() {
        let mut store = ReadBatchStore::new(true, false);
        store.reads_1.push(fq("@a", "ACGT"));
        store.reads_2.push(fq("@a", "ACGTAC"));
        let mut hist = std::collections::BTreeMap::new();
        store.distribution_into(&mut hist);
        assert_eq!(hist.get(&4), Some(&1));
        assert_eq!(hist.get(&6), Some(&1));
    }
}
