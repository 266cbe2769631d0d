//! The five per-read filter kernels (C1). Each kernel is a pure decision
//! function over one read: keep it whole, keep a prefix of it, or discard it.
//! None of them ever look at the other mate, and none of them mutate
//! anything directly — that is the driver's job (see [`crate::driver`]).

use zoe::data::fastq::FastQ;

/// The outcome of applying one filter kernel to one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelEffect {
    /// The read is unaffected.
    KeepFull,
    /// The read should be shortened to its first `len` bases (0 < len <
    /// original length).
    KeepPrefix(usize),
    /// The read (and its mate, if paired) should be removed from the batch.
    Discard,
}

/// Implemented by each of the five filter kinds. `decide` must not mutate
/// `read`; the driver applies the returned [`KernelEffect`] afterwards.
pub trait FilterKernel: Sync {
    fn decide(&self, read: &FastQ) -> KernelEffect;

    /// The `FilterSpec` kind name, used for the JSON report's `trimmers`
    /// object.
    fn kind_name(&self) -> &'static str;

    /// The kind's parameters rendered as `"k1:v1, k2:v2"`, used for the same
    /// report field.
    fn params_string(&self) -> String;
}

#[inline]
fn quality_bytes(read: &FastQ) -> &[u8] {
    read.quality.as_bytes()
}

#[inline]
fn phred_at(quality: &[u8], i: usize) -> u32 {
    (quality[i] - 33) as u32
}

/// 4.1.1 — tail quality trim.
pub struct QualTail {
    pub base_quality: u32,
    pub base_number:  u32,
    pub len_perc:     Option<u32>,
}

impl QualTail {
    pub fn new(base_quality: u32, base_number: u32, len_perc: Option<u32>) -> Self {
        Self {
            base_quality,
            base_number,
            len_perc,
        }
    }
}

impl FilterKernel for QualTail {
    fn decide(&self, read: &FastQ) -> KernelEffect {
        let size = read.sequence.len();
        let n = self.base_number as usize;

        if size < n {
            return KernelEffect::Discard;
        }

        let quality = quality_bytes(read);
        let q = self.base_quality as u32;

        let mut run = 0usize;
        let mut lentokeep = size;

        for i in (0..size).rev() {
            if phred_at(quality, i) <= q {
                run += 1;
            } else {
                run = 0;
            }
            if run >= n {
                lentokeep = i;
            }
        }

        if lentokeep == size {
            return KernelEffect::KeepFull;
        }

        let discard_by_length = lentokeep < 1;
        let discard_by_percent = match self.len_perc {
            Some(p) => (lentokeep * 100 / size) < p as usize,
            None => false,
        };

        if discard_by_length || discard_by_percent {
            KernelEffect::Discard
        } else {
            KernelEffect::KeepPrefix(lentokeep)
        }
    }

    fn kind_name(&self) -> &'static str {
        "QualTail"
    }

    fn params_string(&self) -> String {
        match self.len_perc {
            Some(p) => format!(
                "base_quality:{}, base_number:{}, len_perc:{p}",
                self.base_quality, self.base_number
            ),
            None => format!("base_quality:{}, base_number:{}", self.base_quality, self.base_number),
        }
    }
}

/// 4.1.2 — sliding-window mean quality.
pub struct QualSld {
    pub windows_length: u32,
    pub mean_quality:   u32,
}

impl QualSld {
    pub fn new(mean_quality: u32, windows_length: u32) -> Self {
        Self {
            windows_length,
            mean_quality,
        }
    }
}

impl FilterKernel for QualSld {
    fn decide(&self, read: &FastQ) -> KernelEffect {
        let size = read.sequence.len();
        let w = self.windows_length as usize;

        if size < w {
            return KernelEffect::Discard;
        }

        let quality = quality_bytes(read);
        let m = self.mean_quality as u32;

        let mut sum: u32 = 0;
        let mut lentokeep = size;

        for i in (0..size).rev() {
            // The window first becomes full (length exactly `w`) at
            // `size - i == w`; only once it has already been full on a prior
            // iteration is there an "oldest" element to retire.
            if size - i <= w {
                sum += phred_at(quality, i);
            } else {
                sum += phred_at(quality, i);
                sum -= phred_at(quality, i + w);
            }

            if size - i >= w && sum / w as u32 < m {
                lentokeep = i;
            }
        }

        let mut moved = false;
        while lentokeep > 1 && phred_at(quality, lentokeep) < m {
            lentokeep -= 1;
            moved = true;
        }
        if moved {
            lentokeep += 1;
        }

        if lentokeep < 1 || lentokeep < w {
            KernelEffect::Discard
        } else if lentokeep < size {
            KernelEffect::KeepPrefix(lentokeep)
        } else {
            KernelEffect::KeepFull
        }
    }

    fn kind_name(&self) -> &'static str {
        "QualSld"
    }

    fn params_string(&self) -> String {
        format!("mean_quality:{}, windows_length:{}", self.mean_quality, self.windows_length)
    }
}

/// 4.1.3 — minimum length.
pub struct LenMin {
    pub len_min: u32,
}

impl LenMin {
    pub fn new(len_min: u32) -> Self {
        Self { len_min }
    }
}

impl FilterKernel for LenMin {
    fn decide(&self, read: &FastQ) -> KernelEffect {
        if read.sequence.len() <= self.len_min as usize {
            KernelEffect::Discard
        } else {
            KernelEffect::KeepFull
        }
    }

    fn kind_name(&self) -> &'static str {
        "LenMin"
    }

    fn params_string(&self) -> String {
        format!("len_min:{}", self.len_min)
    }
}

const DUST_WINDOW: usize = 64;
const DUST_STEP: usize = 32;
const DUST_K: usize = 3;
const DUST_WINDOW_MAX: f64 = 62.0;

/// Sum of `c * (c - 1) / 2` over 3-mer counts in `seq[start..start + len]`.
fn triplet_score(seq: &[u8], start: usize, len: usize) -> f64 {
    // 5 bases (A, C, G, T, N) -> 125 possible 3-mers, small enough for a flat
    // array instead of a hash map.
    let mut counts = [0u32; 125];
    let end = start + len;
    let mut i = start;
    while i + DUST_K <= end {
        if let Some(code) = triplet_code(&seq[i..i + DUST_K]) {
            counts[code] += 1;
        }
        i += 1;
    }
    counts.iter().map(|&c| f64::from(c) * f64::from(c.saturating_sub(1)) / 2.0).sum()
}

fn triplet_code(triplet: &[u8]) -> Option<usize> {
    let mut code = 0usize;
    for &b in triplet {
        let digit = match b.to_ascii_uppercase() {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' => 3,
            _ => 4,
        };
        code = code * 5 + digit;
    }
    Some(code)
}

/// 4.1.4 — DUST-like low-complexity discard.
pub struct InfoDust {
    pub score: u32,
}

impl InfoDust {
    pub fn new(score: u32) -> Self {
        Self { score }
    }
}

impl FilterKernel for InfoDust {
    fn decide(&self, read: &FastQ) -> KernelEffect {
        let seq = read.sequence.as_bytes();
        let size = seq.len();

        let (steps, mut rest) = if size <= DUST_WINDOW {
            (0usize, size)
        } else {
            let mut steps = (size - DUST_WINDOW) / DUST_STEP + 1;
            let mut rest = size - steps * DUST_STEP;
            while rest <= DUST_STEP {
                rest += DUST_STEP;
                steps -= 1;
            }
            (steps, rest)
        };

        let mut values: Vec<f64> = Vec::with_capacity(steps + 1);

        for w in 0..steps {
            let start = w * DUST_STEP;
            let score = triplet_score(seq, start, DUST_WINDOW);
            values.push(score / DUST_WINDOW_MAX);
        }

        if rest > 5 {
            let start = steps * DUST_STEP;
            let score = triplet_score(seq, start, rest);
            values.push((score / (rest as f64 - 3.0)) * (DUST_WINDOW_MAX / (rest as f64 - 2.0)));
        } else {
            values.push(31.0);
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let normalised = (mean * 100.0 / 31.0).trunc();

        if normalised > f64::from(self.score) {
            KernelEffect::Discard
        } else {
            KernelEffect::KeepFull
        }
    }

    fn kind_name(&self) -> &'static str {
        "InfoDust"
    }

    fn params_string(&self) -> String {
        format!("score:{}", self.score)
    }
}

/// 4.1.5 — N-base discard.
pub struct InfoN {
    pub score: u32,
}

impl InfoN {
    pub fn new(score: u32) -> Self {
        Self { score }
    }
}

impl FilterKernel for InfoN {
    fn decide(&self, read: &FastQ) -> KernelEffect {
        let seq = read.sequence.as_bytes();
        let target = self.score as usize;

        let mut count = 0usize;
        for &base in seq {
            if base.to_ascii_uppercase() == b'N' {
                count += 1;
                if count >= target {
                    break;
                }
            }
        }

        if count >= target {
            KernelEffect::Discard
        } else {
            KernelEffect::KeepFull
        }
    }

    fn kind_name(&self) -> &'static str {
        "InfoN"
    }

    fn params_string(&self) -> String {
        format!("score:{}", self.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zoe::prelude::*;

    fn fq(seq: &str, qual: &str) -> FastQ {
        FastQ {
            header:   "@r".to_string(),
            sequence: Nucleotides::from(seq.as_bytes()),
            quality:  QualityScores::try_from(qual.as_bytes()).unwrap(),
        }
    }

    #[test]
    fn qual_tail_basic_s1() {
        // Phred '!' = 0, 'I' = 40. Low-quality run is the trailing four
        // bases (DESIGN.md documents why this, not "!!!!IIII", is the
        // reading consistent with the algorithm and the claimed lentokeep).
        let read = fq("ACGTACGT", "IIII!!!!");
        let kernel = QualTail {
            base_quality: 5,
            base_number:  2,
            len_perc:     None,
        };
        assert_eq!(kernel.decide(&read), KernelEffect::KeepPrefix(4));
    }

    #[test]
    fn qual_tail_discard_by_len_perc_s2() {
        let read = fq("AAAAAAAAAA", &"I".repeat(2) + &"!".repeat(8));
        let kernel = QualTail {
            base_quality: 5,
            base_number:  2,
            len_perc:     Some(50),
        };
        assert_eq!(kernel.decide(&read), KernelEffect::Discard);
    }

    #[test]
    fn len_min_boundary_s3() {
        let ten = fq(&"A".repeat(10), &"I".repeat(10));
        let eleven = fq(&"A".repeat(11), &"I".repeat(11));
        let kernel = LenMin { len_min: 10 };
        assert_eq!(kernel.decide(&ten), KernelEffect::Discard);
        assert_eq!(kernel.decide(&eleven), KernelEffect::KeepFull);
    }

    #[test]
    fn info_n_s4() {
        let read = fq("ACGTNNNACGT", &"I".repeat(11));
        assert_eq!(InfoN { score: 3 }.decide(&read), KernelEffect::Discard);
        assert_eq!(InfoN { score: 4 }.decide(&read), KernelEffect::KeepFull);
    }

    #[test]
    fn qual_sld_trims_bad_tail_window() {
        // 15 bases at Phred 40 followed by 5 bases at Phred 15: every window
        // overlapping the boundary still averages above the M=20 cutoff, so
        // only the fully-bad tail window triggers a trim.
        let seq = "A".repeat(20);
        let good = (33 + 40) as u8 as char;
        let bad = (33 + 15) as u8 as char;
        let qual: String = std::iter::repeat_n(good, 15).chain(std::iter::repeat_n(bad, 5)).collect();
        let read = fq(&seq, &qual);
        let kernel = QualSld {
            windows_length: 5,
            mean_quality:   20,
        };
        assert_eq!(kernel.decide(&read), KernelEffect::KeepPrefix(15));
    }

    #[test]
    fn qual_sld_discards_short_read() {
        let read = fq("ACG", "III");
        let kernel = QualSld {
            windows_length: 5,
            mean_quality:   20,
        };
        assert_eq!(kernel.decide(&read), KernelEffect::Discard);
    }

    #[test]
    fn len_min_idempotent_p3() {
        let read = fq(&"A".repeat(10), &"I".repeat(10));
        let kernel = LenMin { len_min: 10 };
        let first = kernel.decide(&read);
        let second = kernel.decide(&read);
        assert_eq!(first, second);
    }

    #[test]
    fn info_dust_low_complexity_discarded() {
        let read = fq(&"A".repeat(70), &"I".repeat(70));
        assert_eq!(InfoDust { score: 5 }.decide(&read), KernelEffect::Discard);
    }

    #[test]
    fn info_dust_high_complexity_kept() {
        let seq: String = "ACGT".repeat(20);
        let read = fq(&seq, &"I".repeat(80));
        assert_eq!(InfoDust { score: 90 }.decide(&read), KernelEffect::KeepFull);
    }
}
