// Seeded random source for terrain generation and agent headings.
//
// xoshiro256++ (Blackman & Vigna) with SplitMix64 state expansion. Hand
// rolled so a run is reproducible from its seed alone on every platform:
// the same `WalkerConfig` (seed included) always yields the same terrain,
// the same spawn points and the same sequence of headings.
//
// **Critical constraint: determinism.** The integer core uses no floating
// point. Floats are only derived from its output, never fed back into it.

use std::f32::consts::TAU;

#[derive(Clone, Debug)]
pub struct WalkRng {
    state: [u64; 4],
}

impl WalkRng {
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut state = [0u64; 4];
        for word in &mut state {
            *word = splitmix64(&mut sm);
        }
        Self { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let out = s[0].wrapping_add(s[3]).rotate_left(23).wrapping_add(s[0]);
        let t = s[1] << 17;
        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);
        out
    }

    /// Uniform in `[0, 1)` from the top 24 bits.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u32 << 24) as f32
    }

    /// Uniform in `[low, high)`.
    pub fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        low + self.next_f32() * (high - low)
    }

    /// Uniform in `[low, high)`, rejection-sampled. Returns `low` for an
    /// empty range.
    pub fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        if high <= low {
            return low;
        }
        let span = u64::from(high - low);
        let zone = u64::MAX - (u64::MAX % span);
        loop {
            let r = self.next_u64();
            if r < zone {
                return low + (r % span) as u32;
            }
        }
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }

    /// A lateral velocity of magnitude `speed` in a uniformly random
    /// direction. The vertical component is always zero; the locator owns
    /// height.
    pub fn heading(&mut self, speed: f32) -> [f32; 3] {
        let angle = self.range_f32(0.0, TAU);
        [angle.cos() * speed, angle.sin() * speed, 0.0]
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
