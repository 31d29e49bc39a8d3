use crate::F;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};

/// Source of independent standard-normal draws.
pub trait NormalSource {
    fn next_standard_normal(&mut self) -> F;
}

impl<S: NormalSource + ?Sized> NormalSource for &mut S {
    fn next_standard_normal(&mut self) -> F {
        (**self).next_standard_normal()
    }
}

/// Hands out one independent source per path so paths can be generated on
/// different threads without sharing a generator.
pub trait NormalStreams: Sync {
    type Stream: NormalSource;

    fn stream(&self, path_id: u64) -> Self::Stream;
}

pub struct NoiseGenerator {
    rng: ChaCha20Rng,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn from_path_id(global_seed: u64, path_id: u64) -> Self {
        // Combine seeds deterministically
        let seed = global_seed.wrapping_add(path_id.wrapping_mul(0x9e3779b97f4a7c15));
        Self::new(seed)
    }

    /// `n` draws at once.
    pub fn sample_n(&mut self, n: usize) -> Vec<F> {
        (0..n).map(|_| self.next_standard_normal()).collect()
    }
}

impl NormalSource for NoiseGenerator {
    fn next_standard_normal(&mut self) -> F {
        StandardNormal.sample(&mut self.rng)
    }
}

/// Per-path ChaCha20 streams derived from one global seed.
#[derive(Clone, Copy, Debug)]
pub struct SeededStreams {
    pub global_seed: u64,
}

impl SeededStreams {
    pub fn new(global_seed: u64) -> Self {
        Self { global_seed }
    }
}

impl NormalStreams for SeededStreams {
    type Stream = NoiseGenerator;

    fn stream(&self, path_id: u64) -> NoiseGenerator {
        NoiseGenerator::from_path_id(self.global_seed, path_id)
    }
}

/// Replays a fixed sequence of draws, each exactly once.
///
/// Running past the end panics: handing out a draw twice would make later
/// paths copies of earlier ones. Size the buffer as
/// `path_count * step_count` and check `remaining()` when in doubt.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    draws: Vec<F>,
    cursor: usize,
}

impl ReplaySource {
    pub fn new(draws: Vec<F>) -> Self {
        Self { draws, cursor: 0 }
    }

    /// Draws handed out so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// Draws left before the source is exhausted.
    pub fn remaining(&self) -> usize {
        self.draws.len() - self.cursor
    }
}

impl NormalSource for ReplaySource {
    fn next_standard_normal(&mut self) -> F {
        let Some(&z) = self.draws.get(self.cursor) else {
            panic!("replay source exhausted after {} draws", self.draws.len());
        };
        self.cursor += 1;
        z
    }
}
