//! Soft-tissue-artifact low-pass.
//!
//! Channel-wise one-pole IIR: `α = dt/(RC+dt)`, `RC = 1/(2π·f_c)`. Skin and
//! muscle motion sits around 2-10 Hz on joint-angle traces; the default
//! cutoff is 6 Hz. For offline playback [`filtfilt`] runs the same filter
//! forward and backward for a zero-phase response.

/// N-channel one-pole low-pass.
#[derive(Debug, Clone)]
pub struct StaFilter<const N: usize> {
    rc: f64,
    state: Option<[f64; N]>,
}

impl<const N: usize> StaFilter<N> {
    /// Default 6 Hz cutoff.
    pub fn new() -> Self {
        Self::with_cutoff(6.0)
    }

    pub fn with_cutoff(cutoff_hz: f64) -> Self {
        Self {
            rc: 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz.max(1e-6)),
            state: None,
        }
    }

    /// Reset at start-of-recording; the next sample passes through
    /// unchanged and seeds the state.
    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn apply(&mut self, input: [f64; N], dt: f64) -> [f64; N] {
        let alpha = dt / (self.rc + dt);
        let mut out = match self.state {
            Some(prev) => {
                let mut next = [0.0; N];
                for i in 0..N {
                    next[i] = prev[i] + alpha * (input[i] - prev[i]);
                }
                next
            }
            None => input,
        };
        for v in &mut out {
            if !v.is_finite() {
                *v = 0.0;
            }
        }
        self.state = Some(out);
        out
    }
}

impl<const N: usize> Default for StaFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward-backward pass for offline traces: zero phase, squared magnitude
/// response.
pub fn filtfilt<const N: usize>(data: &[[f64; N]], cutoff_hz: f64, sample_rate_hz: f64) -> Vec<[f64; N]> {
    let dt = 1.0 / sample_rate_hz.max(1e-6);

    let mut forward = StaFilter::<N>::with_cutoff(cutoff_hz);
    let mut out: Vec<[f64; N]> = data.iter().map(|s| forward.apply(*s, dt)).collect();

    let mut backward = StaFilter::<N>::with_cutoff(cutoff_hz);
    for sample in out.iter_mut().rev() {
        *sample = backward.apply(*sample, dt);
    }

    out
}
