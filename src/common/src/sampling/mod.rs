//! Seedable stochastic primitives shared by all generators.
//!
//! Every random draw in the engine goes through a [`Sampler`] so tests can
//! request deterministic sequences while production code samples from
//! entropy. Degenerate parameters (non-positive rates, empty ranges) fall
//! back to the deterministic center value instead of panicking; parameter
//! validation proper happens in the generator configs.

use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Exp, LogNormal, Normal, Poisson};
use uuid::Uuid;

pub struct Sampler {
    rng: ChaCha8Rng,
}

impl Sampler {
    /// Deterministic sampler for tests and reproducible snapshots.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Entropy-seeded sampler for production use.
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Number of arrivals in one interval of a Poisson process with the
    /// given mean.
    pub fn poisson(&mut self, mean: f64) -> u64 {
        if mean <= 0.0 || !mean.is_finite() {
            return 0;
        }
        match Poisson::new(mean) {
            Ok(dist) => dist.sample(&mut self.rng) as u64,
            Err(_) => 0,
        }
    }

    /// Zero-mean gaussian noise.
    pub fn gaussian(&mut self, std_dev: f64) -> f64 {
        if std_dev <= 0.0 || !std_dev.is_finite() {
            return 0.0;
        }
        match Normal::new(0.0, std_dev) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    /// Exponentially distributed value with the given mean.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        if mean <= 0.0 || !mean.is_finite() {
            return 0.0;
        }
        match Exp::new(1.0 / mean) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }

    /// Log-normal draw, the usual shape for latency tails.
    pub fn log_normal(&mut self, mu: f64, sigma: f64) -> f64 {
        match LogNormal::new(mu, sigma.max(0.01)) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mu.exp(),
        }
    }

    /// Bernoulli draw; probabilities outside [0, 1] saturate.
    pub fn chance(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            false
        } else if p >= 1.0 {
            true
        } else {
            self.rng.gen_bool(p)
        }
    }

    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    /// Uniformly chosen element, `None` on an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.rng)
    }

    /// Weighted discrete choice over indices. `None` when the weights are
    /// empty, all zero, or otherwise unusable.
    pub fn weighted(&mut self, weights: &[f64]) -> Option<usize> {
        WeightedIndex::new(weights)
            .ok()
            .map(|dist| dist.sample(&mut self.rng))
    }

    /// 32-hex-char trace ID, W3C style.
    pub fn trace_id(&mut self) -> String {
        let bytes: [u8; 16] = self.rng.r#gen();
        hex::encode(bytes)
    }

    /// 16-hex-char span ID.
    pub fn span_id(&mut self) -> String {
        let bytes: [u8; 8] = self.rng.r#gen();
        hex::encode(bytes)
    }

    /// Random v4 UUID drawn from this sampler's stream, so seeded samplers
    /// produce reproducible IDs.
    pub fn uuid(&mut self) -> Uuid {
        let bytes: [u8; 16] = self.rng.r#gen();
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sampler_is_deterministic() {
        let mut a = Sampler::seeded(7);
        let mut b = Sampler::seeded(7);
        for _ in 0..32 {
            assert_eq!(a.range_u64(0, 1_000_000), b.range_u64(0, 1_000_000));
        }
        assert_eq!(a.trace_id(), b.trace_id());
        assert_eq!(a.uuid(), b.uuid());
    }

    #[test]
    fn test_poisson_mean_is_roughly_lambda() {
        let mut sampler = Sampler::seeded(42);
        let draws = 2_000;
        let total: u64 = (0..draws).map(|_| sampler.poisson(12.0)).sum();
        let mean = total as f64 / draws as f64;
        assert!((mean - 12.0).abs() < 1.0, "mean was {mean}");
    }

    #[test]
    fn test_poisson_degenerate_mean() {
        let mut sampler = Sampler::seeded(1);
        assert_eq!(sampler.poisson(0.0), 0);
        assert_eq!(sampler.poisson(-3.0), 0);
    }

    #[test]
    fn test_weighted_respects_zero_weights() {
        let mut sampler = Sampler::seeded(9);
        for _ in 0..100 {
            let idx = sampler.weighted(&[0.0, 1.0, 0.0]).unwrap();
            assert_eq!(idx, 1);
        }
        assert!(sampler.weighted(&[]).is_none());
    }

    #[test]
    fn test_chance_saturates() {
        let mut sampler = Sampler::seeded(3);
        assert!(!sampler.chance(0.0));
        assert!(sampler.chance(1.5));
    }

    #[test]
    fn test_id_shapes() {
        let mut sampler = Sampler::seeded(5);
        assert_eq!(sampler.trace_id().len(), 32);
        assert_eq!(sampler.span_id().len(), 16);
    }

    #[test]
    fn test_exponential_is_positive() {
        let mut sampler = Sampler::seeded(11);
        for _ in 0..100 {
            assert!(sampler.exponential(30.0) >= 0.0);
        }
    }
}
