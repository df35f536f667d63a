//! Scalar control signals for the Rabi frequency and detuning.
//!
//! A waveform is a list of `(clock, value)` control points plus a closed
//! [`WaveformKind`] that says how to read between them:
//!
//! - `Constant`: step function, each value holds until the next clock
//! - `Linear`: straight lines between neighbouring control points
//! - `Smoothed`: the result of [`Waveform::smooth`], a finely sampled
//!   piecewise-linear fit of a kernel convolution
//!
//! All operations return new values; a waveform never changes after
//! construction.
//!
//! ```rust
//! use rymis_sim::waveform::{Kernel, Waveform};
//!
//! let delta = Waveform::piecewise_constant(vec![0.0, 1.0, 2.0], vec![-5.0, 5.0, 5.0]).unwrap();
//! assert_eq!(delta.evaluate(0.5).unwrap(), -5.0);
//!
//! let soft = delta.smooth(0.2, Kernel::Gaussian).unwrap();
//! assert_eq!(soft.duration(), 2.0);
//! let mid = soft.evaluate(1.0).unwrap();
//! assert!(mid > -5.0 && mid < 5.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// Uniform grid size used by [`Waveform::smooth`].
pub const SMOOTHING_GRID: usize = 1001;

/// Extra clocks spread across the kernel window around each source breakpoint.
const WINDOW_CLOCKS: usize = 17;

/// Quadrature nodes across one kernel window.
const KERNEL_NODES: usize = 129;

/// Relative slack (in units of the duration) accepted at the domain edges.
const DOMAIN_SLACK: f64 = 1e-12;

/// Interpolation mode requested at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Piecewise-constant.
    Constant,
    /// Piecewise-linear.
    Linear,
}

/// Symmetric smoothing kernels, all supported on `[-radius, radius]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    /// Gaussian truncated at three standard deviations.
    #[default]
    Gaussian,
    /// Linear decay to zero at the radius.
    Triangle,
    /// `(1 - u²)²`.
    Biweight,
    /// Flat moving average.
    Uniform,
}

impl Kernel {
    /// Unnormalised weight at `u ∈ [-1, 1]`.
    fn weight(self, u: f64) -> f64 {
        match self {
            Self::Gaussian => (-4.5 * u * u).exp(),
            Self::Triangle => 1.0 - u.abs(),
            Self::Biweight => {
                let a = 1.0 - u * u;
                a * a
            }
            Self::Uniform => 1.0,
        }
    }
}

/// How a waveform is read between control points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaveformKind {
    /// Step function.
    Constant,
    /// Straight lines between control points.
    Linear,
    /// Piecewise-linear fit of a convolution.
    Smoothed {
        /// Kernel used.
        kernel: Kernel,
        /// Kernel half-width.
        radius: f64,
    },
}

/// An immutable time-dependent scalar on `[0, duration]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waveform {
    clocks: Vec<f64>,
    values: Vec<f64>,
    kind: WaveformKind,
}

impl Waveform {
    /// Build a waveform from control points.
    ///
    /// Clocks must start at 0, increase strictly and match `values` in
    /// length; at least two points are required.
    pub fn new(clocks: Vec<f64>, values: Vec<f64>, mode: Interpolation) -> SimResult<Self> {
        validate_points(&clocks, &values)?;
        let kind = match mode {
            Interpolation::Constant => WaveformKind::Constant,
            Interpolation::Linear => WaveformKind::Linear,
        };
        Ok(Self {
            clocks,
            values,
            kind,
        })
    }

    /// Step function through the control points.
    pub fn piecewise_constant(clocks: Vec<f64>, values: Vec<f64>) -> SimResult<Self> {
        Self::new(clocks, values, Interpolation::Constant)
    }

    /// Linear interpolation through the control points.
    pub fn piecewise_linear(clocks: Vec<f64>, values: Vec<f64>) -> SimResult<Self> {
        Self::new(clocks, values, Interpolation::Linear)
    }

    /// A flat waveform of the given duration.
    pub fn constant(duration: f64, value: f64) -> SimResult<Self> {
        Self::piecewise_linear(vec![0.0, duration], vec![value, value])
    }

    /// Control-point clocks.
    pub fn clocks(&self) -> &[f64] {
        &self.clocks
    }

    /// Control-point values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Interpolation kind.
    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    /// End of the domain.
    pub fn duration(&self) -> f64 {
        self.clocks[self.clocks.len() - 1]
    }

    /// Times at which the waveform may change slope or jump.
    pub fn breakpoints(&self) -> &[f64] {
        &self.clocks
    }

    /// Largest absolute value reached.
    pub fn max_abs(&self) -> f64 {
        self.values.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    /// Value at time `t`.
    ///
    /// Times outside `[0, duration]` are an error, apart from a relative
    /// slack of `1e-12 × duration` that absorbs accumulated rounding.
    pub fn evaluate(&self, t: f64) -> SimResult<f64> {
        let t = self.clamp_to_domain(t)?;
        Ok(self.value_at(t))
    }

    /// Copy with every value multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> SimResult<Self> {
        if !factor.is_finite() {
            return Err(SimError::InvalidWaveformSpec(format!(
                "scale factor must be finite, got {factor}"
            )));
        }
        Ok(Self {
            clocks: self.clocks.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
            kind: self.kind,
        })
    }

    /// `n` uniformly spaced `(t, value)` pairs across the domain.
    pub fn sample(&self, n: usize) -> Vec<(f64, f64)> {
        match n {
            0 => Vec::new(),
            1 => vec![(0.0, self.value_at(0.0))],
            _ => {
                let dt = self.duration() / (n - 1) as f64;
                (0..n)
                    .map(|i| {
                        let t = if i == n - 1 { self.duration() } else { i as f64 * dt };
                        (t, self.value_at(t))
                    })
                    .collect()
            }
        }
    }

    /// Convolve with `kernel` of half-width `radius` on the default grid.
    pub fn smooth(&self, radius: f64, kernel: Kernel) -> SimResult<Self> {
        self.smooth_with(radius, kernel, SMOOTHING_GRID)
    }

    /// Convolve with `kernel` of half-width `radius`, sampled and re-fit
    /// piecewise-linearly.
    ///
    /// The sample clocks are `grid_points` uniform clocks plus a dense set
    /// across `[c - radius, c + radius]` around every breakpoint `c` of a
    /// piecewise source, so features narrower than the uniform spacing
    /// survive on long domains.
    ///
    /// The source is held at its edge values outside its domain, so the
    /// result spans the same interval and a constant input stays constant.
    pub fn smooth_with(&self, radius: f64, kernel: Kernel, grid_points: usize) -> SimResult<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SimError::InvalidWaveformSpec(format!(
                "kernel radius must be positive and finite, got {radius}"
            )));
        }
        if grid_points < 2 {
            return Err(SimError::InvalidWaveformSpec(format!(
                "smoothing grid needs at least 2 points, got {grid_points}"
            )));
        }

        // Trapezoid weights over the kernel window, normalised as a discrete
        // sum so that constants are reproduced exactly.
        let nodes: Vec<(f64, f64)> = (0..KERNEL_NODES)
            .map(|j| {
                let u = -1.0 + 2.0 * j as f64 / (KERNEL_NODES - 1) as f64;
                let edge = if j == 0 || j == KERNEL_NODES - 1 { 0.5 } else { 1.0 };
                (u, edge * kernel.weight(u))
            })
            .filter(|(_, w)| *w > 0.0)
            .collect();
        let norm: f64 = nodes.iter().map(|(_, w)| w).sum();

        let duration = self.duration();
        let step = duration / (grid_points - 1) as f64;
        let mut clocks: Vec<f64> = (0..grid_points)
            .map(|i| if i == grid_points - 1 { duration } else { i as f64 * step })
            .collect();
        match self.kind {
            WaveformKind::Smoothed { .. } => clocks.extend_from_slice(&self.clocks),
            WaveformKind::Constant | WaveformKind::Linear => {
                for &c in &self.clocks {
                    clocks.extend((0..WINDOW_CLOCKS).map(|j| {
                        let u = -1.0 + 2.0 * j as f64 / (WINDOW_CLOCKS - 1) as f64;
                        (c + radius * u).clamp(0.0, duration)
                    }));
                }
            }
        }
        clocks.sort_by(f64::total_cmp);
        let min_gap = DOMAIN_SLACK * duration;
        clocks.dedup_by(|next, kept| *next - *kept <= min_gap);
        if let Some(last) = clocks.last_mut() {
            *last = duration;
        }

        let values = clocks
            .iter()
            .map(|&s| {
                let acc: f64 = nodes
                    .iter()
                    .map(|&(u, w)| w * self.value_at((s - radius * u).clamp(0.0, duration)))
                    .sum();
                acc / norm
            })
            .collect();

        Ok(Self {
            clocks,
            values,
            kind: WaveformKind::Smoothed { kernel, radius },
        })
    }

    fn clamp_to_domain(&self, t: f64) -> SimResult<f64> {
        let duration = self.duration();
        let slack = DOMAIN_SLACK * duration.max(f64::MIN_POSITIVE);
        if t.is_nan() || t < -slack || t > duration + slack {
            return Err(SimError::InvalidWaveformSpec(format!(
                "t = {t} lies outside the domain [0, {duration}]"
            )));
        }
        Ok(t.clamp(0.0, duration))
    }

    /// Evaluate at a time already known to lie in the domain.
    fn value_at(&self, t: f64) -> f64 {
        let i = self.clocks.partition_point(|&c| c <= t);
        match self.kind {
            WaveformKind::Constant => self.values[i.saturating_sub(1)],
            WaveformKind::Linear | WaveformKind::Smoothed { .. } => {
                if i == 0 {
                    self.values[0]
                } else if i >= self.clocks.len() {
                    self.values[self.values.len() - 1]
                } else {
                    let (t0, t1) = (self.clocks[i - 1], self.clocks[i]);
                    let (v0, v1) = (self.values[i - 1], self.values[i]);
                    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
                }
            }
        }
    }
}

fn validate_points(clocks: &[f64], values: &[f64]) -> SimResult<()> {
    if clocks.len() != values.len() {
        return Err(SimError::InvalidWaveformSpec(format!(
            "{} clocks but {} values",
            clocks.len(),
            values.len()
        )));
    }
    if clocks.len() < 2 {
        return Err(SimError::InvalidWaveformSpec(
            "at least two control points are required".into(),
        ));
    }
    if clocks[0] != 0.0 {
        return Err(SimError::InvalidWaveformSpec(format!(
            "first clock must be 0, got {}",
            clocks[0]
        )));
    }
    if let Some(i) = clocks
        .iter()
        .chain(values)
        .position(|v| !v.is_finite())
    {
        return Err(SimError::InvalidWaveformSpec(format!(
            "non-finite control point entry at position {i}"
        )));
    }
    if let Some(w) = clocks.windows(2).position(|w| w[1] <= w[0]) {
        return Err(SimError::InvalidWaveformSpec(format!(
            "clocks must increase strictly (clock {} = {} follows {})",
            w + 1,
            clocks[w + 1],
            clocks[w]
        )));
    }
    Ok(())
}
