//! Per-run color allocation for clusters.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Display colors handed out to clusters.
pub const PALETTE: [&str; 10] = [
    "#000000", "#0000FF", "#00FF00", "#EE00EE", "#8a0a19", "#AA00FF", "#2e2e2d", "#130930",
    "#053307", "#380f05",
];

/// Returned once every palette entry has been used.
pub const FALLBACK_COLOR: &str = "#000000";

/// Draws palette colors without replacement.
///
/// Build a fresh allocator for every clustering run; it is not meant to be
/// shared across requests.
#[derive(Debug)]
pub struct ColorAllocator {
    remaining: Vec<&'static str>,
    rng: StdRng,
}

impl ColorAllocator {
    pub fn new(seed: u64) -> Self {
        Self::with_palette(&PALETTE, seed)
    }

    pub fn with_palette(palette: &[&'static str], seed: u64) -> Self {
        Self {
            remaining: palette.to_vec(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Take a random unused color, or the fallback once the palette is spent.
    pub fn next_color(&mut self) -> &'static str {
        if self.remaining.is_empty() {
            return FALLBACK_COLOR;
        }
        let i = self.rng.gen_range(0..self.remaining.len());
        self.remaining.remove(i)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}
