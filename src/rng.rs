//! Seedable deterministic generator backing the `rng_*` natives.
//!
//! Save/replay correctness depends on the sequence being bit-identical
//! across runs and process restarts, so the generator is a fixed
//! xorshift64* stepped from a SplitMix64-expanded seed rather than an
//! ecosystem RNG whose stream may change between crate versions.

pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    pub fn new(seed: i64) -> Self {
        let mut rng = Self { state: 1 };
        rng.seed(seed);
        rng
    }

    pub fn seed(&mut self, seed: i64) {
        self.state = splitmix64(seed as u64);
        if self.state == 0 {
            self.state = 0x9E3779B97F4A7C15;
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform in `[0, 1)` with 53 bits of mantissa.
    pub fn next_float(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform integer, both bounds inclusive. Callers must ensure
    /// `lo <= hi`.
    pub fn int_in(&mut self, lo: i64, hi: i64) -> i64 {
        let span = (hi as i128 - lo as i128 + 1) as u64;
        lo.wrapping_add((self.next_u64() % span) as i64)
    }

    /// Uniform index into a collection of `len` items (`len > 0`).
    pub fn index_in(&mut self, len: usize) -> usize {
        (self.next_u64() % len as u64) as usize
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}
