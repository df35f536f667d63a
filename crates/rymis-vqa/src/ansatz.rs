//! Parameterised control pulses.
//!
//! The Rabi drive is a fixed trapezoid. The detuning runs from
//! `delta_start` through the free interior values to `delta_end` at evenly
//! spaced clocks. When `free_duration` is set, the last parameter is the
//! total sweep time.

use rymis_sim::{Kernel, SimError, SimResult, Waveform};
use serde::{Deserialize, Serialize};

/// How the detuning passes through its control values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetuningShape {
    /// Straight lines between control values.
    Linear,
    /// A step function through the control values, convolved with a
    /// Gaussian of the given half-width.
    SmoothedConstant {
        /// Kernel half-width.
        radius: f64,
    },
}

/// A pulse family mapping a parameter vector to `(Ω(t), Δ(t))`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseAnsatz {
    /// Rabi plateau height.
    pub omega_max: f64,
    /// Rise and fall time of the Rabi trapezoid.
    pub ramp_time: f64,
    /// Detuning at `t = 0`.
    pub delta_start: f64,
    /// Detuning at the end of the sweep.
    pub delta_end: f64,
    /// Number of free detuning values between the endpoints.
    pub n_interior: usize,
    /// Sweep time when it is not itself a parameter.
    pub duration: f64,
    /// Treat the last parameter as the sweep time.
    #[serde(default)]
    pub free_duration: bool,
    /// Detuning interpolation.
    pub shape: DetuningShape,
}

impl Default for PulseAnsatz {
    fn default() -> Self {
        Self {
            omega_max: 15.7,
            ramp_time: 0.1,
            delta_start: -27.0,
            delta_end: 27.0,
            n_interior: 3,
            duration: 1.6,
            free_duration: false,
            shape: DetuningShape::SmoothedConstant { radius: 0.1 },
        }
    }
}

impl PulseAnsatz {
    /// Length of the parameter vector this ansatz expects.
    pub fn n_params(&self) -> usize {
        self.n_interior + usize::from(self.free_duration)
    }

    /// Parameters of the linear sweep from `delta_start` to `delta_end`:
    /// interior values on the straight line, plus `duration` if free.
    pub fn linear_guess(&self) -> Vec<f64> {
        let segments = (self.n_interior + 1) as f64;
        let mut params: Vec<f64> = (1..=self.n_interior)
            .map(|k| {
                self.delta_start + (self.delta_end - self.delta_start) * k as f64 / segments
            })
            .collect();
        if self.free_duration {
            params.push(self.duration);
        }
        params
    }

    /// Sweep time encoded by `params`.
    pub fn sweep_time(&self, params: &[f64]) -> SimResult<f64> {
        self.check(params)?;
        Ok(self.time_of(params))
    }

    /// Build the Rabi and detuning waveforms for `params`.
    pub fn waveforms(&self, params: &[f64]) -> SimResult<(Waveform, Waveform)> {
        self.check(params)?;
        let t = self.time_of(params);
        let r = self.ramp_time;

        let rabi = Waveform::piecewise_linear(
            vec![0.0, r, t - r, t],
            vec![0.0, self.omega_max, self.omega_max, 0.0],
        )?;

        let mut values = Vec::with_capacity(self.n_interior + 3);
        values.push(self.delta_start);
        values.extend_from_slice(&params[..self.n_interior]);
        values.push(self.delta_end);

        let detuning = match self.shape {
            DetuningShape::Linear => {
                Waveform::piecewise_linear(uniform_clocks(t, values.len()), values)?
            }
            DetuningShape::SmoothedConstant { radius } => {
                // Repeat the final value so the last step has non-zero width.
                values.push(self.delta_end);
                Waveform::piecewise_constant(uniform_clocks(t, values.len()), values)?
                    .smooth(radius, Kernel::Gaussian)?
            }
        };
        Ok((rabi, detuning))
    }

    fn time_of(&self, params: &[f64]) -> f64 {
        if self.free_duration {
            params[params.len() - 1]
        } else {
            self.duration
        }
    }

    fn check(&self, params: &[f64]) -> SimResult<()> {
        if params.len() != self.n_params() {
            return Err(SimError::InvalidParameterVector(format!(
                "expected {} parameters, got {}",
                self.n_params(),
                params.len()
            )));
        }
        if let Some(i) = params.iter().position(|p| !p.is_finite()) {
            return Err(SimError::InvalidParameterVector(format!(
                "parameter {i} is not finite ({})",
                params[i]
            )));
        }
        let t = self.time_of(params);
        if !(t.is_finite() && t > 0.0) {
            return Err(SimError::InvalidParameterVector(format!(
                "sweep time must be positive, got {t}"
            )));
        }
        if t <= 2.0 * self.ramp_time {
            return Err(SimError::InvalidParameterVector(format!(
                "sweep time {t} leaves no Rabi plateau after two ramps of {}",
                self.ramp_time
            )));
        }
        Ok(())
    }

    /// Reject ansatz settings that no parameter vector could satisfy.
    pub fn validate(&self) -> SimResult<()> {
        let fields = [
            ("omega_max", self.omega_max),
            ("ramp_time", self.ramp_time),
            ("delta_start", self.delta_start),
            ("delta_end", self.delta_end),
            ("duration", self.duration),
        ];
        if let Some((name, v)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SimError::Config(format!("ansatz.{name} must be finite, got {v}")));
        }
        if self.ramp_time <= 0.0 {
            return Err(SimError::Config("ansatz.ramp_time must be positive".into()));
        }
        if let DetuningShape::SmoothedConstant { radius } = self.shape {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(SimError::Config(format!(
                    "ansatz.shape.radius must be positive, got {radius}"
                )));
            }
        }
        Ok(())
    }
}

fn uniform_clocks(t: f64, n: usize) -> Vec<f64> {
    let dt = t / (n - 1) as f64;
    (0..n)
        .map(|k| if k == n - 1 { t } else { k as f64 * dt })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(n_interior: usize, free_duration: bool) -> PulseAnsatz {
        PulseAnsatz {
            n_interior,
            free_duration,
            shape: DetuningShape::Linear,
            ..PulseAnsatz::default()
        }
    }

    #[test]
    fn linear_guess_reproduces_straight_sweep() {
        let ansatz = linear(3, false);
        let (_, det) = ansatz.waveforms(&ansatz.linear_guess()).unwrap();
        let t = ansatz.duration;
        for s in [0.0, 0.3, 0.5, 0.77, 1.0] {
            let expected = ansatz.delta_start + (ansatz.delta_end - ansatz.delta_start) * s;
            assert!((det.evaluate(s * t).unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn rabi_is_trapezoid() {
        let ansatz = linear(1, true);
        let (rabi, _) = ansatz.waveforms(&[0.0, 2.0]).unwrap();
        assert_eq!(rabi.duration(), 2.0);
        assert_eq!(rabi.evaluate(0.0).unwrap(), 0.0);
        assert_eq!(rabi.evaluate(1.0).unwrap(), ansatz.omega_max);
        assert_eq!(rabi.evaluate(2.0).unwrap(), 0.0);
    }

    #[test]
    fn smoothed_shape_spans_the_sweep() {
        let ansatz = PulseAnsatz::default();
        let (rabi, det) = ansatz.waveforms(&[-10.0, 0.0, 10.0]).unwrap();
        assert_eq!(det.duration(), rabi.duration());
        assert!((det.evaluate(0.0).unwrap() - ansatz.delta_start).abs() < 1.0);
        assert!((det.evaluate(ansatz.duration).unwrap() - ansatz.delta_end).abs() < 1.0);
    }

    #[test]
    fn invalid_vectors_are_rejected() {
        let ansatz = linear(2, true);
        for bad in [
            vec![0.0, 0.0],
            vec![0.0, 0.0, 1.0, 2.0],
            vec![0.0, f64::NAN, 1.0],
            vec![0.0, 0.0, -1.0],
            vec![0.0, 0.0, 0.15],
        ] {
            assert!(matches!(
                ansatz.waveforms(&bad),
                Err(SimError::InvalidParameterVector(_))
            ));
        }
    }

    #[test]
    fn arity_follows_settings() {
        assert_eq!(linear(4, false).n_params(), 4);
        assert_eq!(linear(4, true).n_params(), 5);
        assert_eq!(linear(0, true).linear_guess(), vec![1.6]);
    }
}
