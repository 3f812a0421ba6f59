use ::noise::{NoiseFn, Simplex};
use rand::Rng;

/// Monotonic seed source for noise construction. Every composer octave
/// consumes one seed, so generators built from equal counters sample
/// identical fields.
#[derive(Clone, Debug)]
pub struct SeedCounter {
    next: u32,
}

impl SeedCounter {
    pub fn new(seed: u32) -> Self {
        Self {
            next: seed & 0x3fff_ffff,
        }
    }

    /// Random 30-bit starting seed for callers that do not need
    /// reproducibility.
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen_range(0..1u32 << 30))
    }

    pub fn next_seed(&mut self) -> u32 {
        let seed = self.next;
        self.next = self.next.wrapping_add(1);
        seed
    }
}

/// Fractal 2D simplex field: octave `i` samples at
/// `(x / spread · lacunarity^i, z / spread · lacunarity^i)` weighted by
/// `persistence^i`; the weighted sum is scaled and offset.
#[derive(Clone, Debug)]
pub struct FractalNoise {
    offset: f64,
    scale: f64,
    spread: f64,
    persistence: f64,
    lacunarity: f64,
    octaves: Vec<Simplex>,
}

impl FractalNoise {
    pub fn new(
        counter: &mut SeedCounter,
        offset: f64,
        scale: f64,
        spread: f64,
        octaves: usize,
        persistence: f64,
        lacunarity: f64,
    ) -> Self {
        let octaves = (0..octaves)
            .map(|_| Simplex::new(counter.next_seed()))
            .collect();
        Self {
            offset,
            scale,
            spread,
            persistence,
            lacunarity,
            octaves,
        }
    }

    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0 / self.spread;
        for simplex in &self.octaves {
            sum += amplitude * simplex.get([x * frequency, z * frequency]);
            amplitude *= self.persistence;
            frequency *= self.lacunarity;
        }
        self.scale * sum + self.offset
    }
}

/// Ridged 2D field: octave `i` contributes `(1 − |noise(x·s, z·s)|) ·
/// persistence^i` with `s` doubling per octave from `scale`. Always sums
/// four octaves; the octave argument is accepted for signature parity.
#[derive(Clone, Debug)]
pub struct RidgeNoise {
    persistence: f64,
    scale: f64,
    octaves: [Simplex; 4],
}

impl RidgeNoise {
    pub fn new(counter: &mut SeedCounter, _octaves: usize, persistence: f64, scale: f64) -> Self {
        let octaves = [
            Simplex::new(counter.next_seed()),
            Simplex::new(counter.next_seed()),
            Simplex::new(counter.next_seed()),
            Simplex::new(counter.next_seed()),
        ];
        Self {
            persistence,
            scale,
            octaves,
        }
    }

    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.scale;
        for simplex in &self.octaves {
            sum += amplitude * (1.0 - simplex.get([x * frequency, z * frequency]).abs());
            amplitude *= self.persistence;
            frequency *= 2.0;
        }
        sum
    }
}
