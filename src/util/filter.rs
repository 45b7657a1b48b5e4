// ============================================================
// Layer 7 — Zero-phase Butterworth Filter
// ============================================================
// Offline high/low-pass filtering of a whole audio buffer,
// used for cleaning up audio before plotting or listening.
// Never part of the training path.
//
// Design (digital, normalised so Nyquist = 1):
//
//   analog prototype poles  p_k = -exp(iπ(2k - N + 1) / 2N)
//        │  pre-warp  ω = 4·tan(π·Wn / 2)
//        ▼
//   lowpass  p·ω,  k·ω^N           highpass  ω/p, N zeros at 0
//        │
//        ▼  bilinear  z = (4 + s) / (4 - s)
//   b(z) / a(z)
//
// Application runs the filter forwards then backwards with odd
// padding and steady-state initial conditions, so the result has
// no phase shift.

use std::fmt;
use std::str::FromStr;

use num_complex::Complex64;

use crate::domain::error::{Result, VocoderError};

pub const DEFAULT_ORDER: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
}

impl FromStr for FilterType {
    type Err = VocoderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" | "lowpass" => Ok(FilterType::Lowpass),
            "high" | "highpass" => Ok(FilterType::Highpass),
            other => Err(VocoderError::Config(format!("unknown filter type '{other}'"))),
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterType::Lowpass => "lowpass",
            FilterType::Highpass => "highpass",
        })
    }
}

/// Transfer-function coefficients, `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// Digital Butterworth design. `wn` is the cutoff as a fraction of Nyquist.
pub fn butter(order: usize, wn: f64, filter_type: FilterType) -> Result<Coefficients> {
    if order == 0 {
        return Err(VocoderError::Config("filter order must be at least 1".into()));
    }
    if !(wn > 0.0 && wn < 1.0) {
        return Err(VocoderError::Config(format!(
            "normalised cutoff must lie in (0, 1), got {wn}"
        )));
    }

    let n = order as f64;
    let prototype: Vec<Complex64> = (0..order)
        .map(|k| {
            let m = 2.0 * k as f64 - n + 1.0;
            -Complex64::new(0.0, std::f64::consts::PI * m / (2.0 * n)).exp()
        })
        .collect();

    let fs2 = 4.0;
    let warped = fs2 * (std::f64::consts::PI * wn / 2.0).tan();

    let (zeros, poles, gain) = match filter_type {
        FilterType::Lowpass => {
            let poles: Vec<Complex64> = prototype.iter().map(|p| *p * warped).collect();
            (Vec::new(), poles, warped.powi(order as i32))
        }
        FilterType::Highpass => {
            let poles: Vec<Complex64> = prototype.iter().map(|p| warped / *p).collect();
            let denom: Complex64 = prototype.iter().map(|p| -*p).product();
            (vec![Complex64::new(0.0, 0.0); order], poles, (Complex64::new(1.0, 0.0) / denom).re)
        }
    };

    // bilinear transform
    let z_z: Vec<Complex64> = zeros.iter().map(|z| (fs2 + *z) / (fs2 - *z)).collect();
    let p_z: Vec<Complex64> = poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect();
    let num: Complex64 = zeros.iter().map(|z| fs2 - *z).product();
    let den: Complex64 = poles.iter().map(|p| fs2 - *p).product();
    let k_z = gain * (num / den).re;

    let mut all_zeros = z_z;
    all_zeros.resize(p_z.len(), Complex64::new(-1.0, 0.0));

    let b = poly(&all_zeros).into_iter().map(|c| c * k_z).collect();
    let a = poly(&p_z);
    Ok(Coefficients { b, a })
}

/// Real polynomial coefficients (highest power first) with the given roots.
fn poly(roots: &[Complex64]) -> Vec<f64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &r in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * r;
        }
        coeffs = next;
    }
    coeffs.into_iter().map(|c| c.re).collect()
}

// ─── Filtering ────────────────────────────────────────────────────────────────

/// Direct form II transposed, starting from state `zi`.
fn lfilter(c: &Coefficients, x: &[f64], zi: &[f64]) -> Vec<f64> {
    let n = c.a.len();
    let mut z = zi.to_vec();
    let mut y = Vec::with_capacity(x.len());
    for &xi in x {
        let yi = c.b[0] * xi + z[0];
        for i in 0..n - 2 {
            z[i] = c.b[i + 1] * xi + z[i + 1] - c.a[i + 1] * yi;
        }
        z[n - 2] = c.b[n - 1] * xi - c.a[n - 1] * yi;
        y.push(yi);
    }
    y
}

/// Steady-state filter state for a unit step input.
fn lfilter_zi(c: &Coefficients) -> Result<Vec<f64>> {
    let m = c.a.len() - 1;
    // (I - companion(a)^T) zi = b[1..] - a[1..] * b[0]
    let mut mat = vec![vec![0.0; m]; m];
    for i in 0..m {
        mat[i][i] = 1.0;
        mat[i][0] += c.a[i + 1];
        if i + 1 < m {
            mat[i][i + 1] = -1.0;
        }
    }
    let rhs: Vec<f64> = (0..m).map(|i| c.b[i + 1] - c.a[i + 1] * c.b[0]).collect();
    solve(mat, rhs)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut mat: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>> {
    let m = rhs.len();
    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&i, &j| mat[i][col].abs().total_cmp(&mat[j][col].abs()))
            .unwrap_or(col);
        if mat[pivot][col].abs() < 1e-300 {
            return Err(VocoderError::Config("filter has no steady state".into()));
        }
        mat.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in col + 1..m {
            let f = mat[row][col] / mat[col][col];
            for k in col..m {
                mat[row][k] -= f * mat[col][k];
            }
            rhs[row] -= f * rhs[col];
        }
    }
    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let tail: f64 = (row + 1..m).map(|k| mat[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / mat[row][row];
    }
    Ok(x)
}

/// Forward-backward filtering with odd extension of `3 * len(a)` samples.
pub fn filtfilt(c: &Coefficients, x: &[f64]) -> Result<Vec<f64>> {
    let padlen = 3 * c.a.len().max(c.b.len());
    if x.len() <= padlen {
        return Err(VocoderError::Config(format!(
            "signal of {} samples is too short to filter (needs more than {padlen})",
            x.len()
        )));
    }
    let n = x.len();
    let (first, last) = (x[0], x[n - 1]);

    let mut ext = Vec::with_capacity(n + 2 * padlen);
    ext.extend((1..=padlen).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=padlen).map(|i| 2.0 * last - x[n - 1 - i]));

    let zi = lfilter_zi(c)?;
    let scaled = |s: f64| zi.iter().map(|z| z * s).collect::<Vec<_>>();

    let forward = lfilter(c, &ext, &scaled(ext[0]));
    let reversed: Vec<f64> = forward.into_iter().rev().collect();
    let mut backward = lfilter(c, &reversed, &scaled(reversed[0]));
    backward.reverse();

    Ok(backward[padlen..padlen + n].to_vec())
}

/// Zero-phase Butterworth filtering of an audio buffer.
pub fn pass_filter(
    audio: &[f32],
    audio_rate: f64,
    cutoff: f64,
    filter_type: FilterType,
    order: usize,
) -> Result<Vec<f32>> {
    let wn = cutoff / (0.5 * audio_rate);
    let coeffs = butter(order, wn, filter_type)?;
    let x: Vec<f64> = audio.iter().map(|&s| s as f64).collect();
    let y = filtfilt(&coeffs, &x)?;
    tracing::debug!("{} filtered {} samples at {} Hz (order {})", filter_type, audio.len(), cutoff, order);
    Ok(y.into_iter().map(|s| s as f32).collect())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_first_order_half_band() {
        let c = butter(1, 0.5, FilterType::Lowpass).unwrap();
        assert_abs_diff_eq!(c.b[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c.b[1], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(c.a[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(c.a[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unity_gain_at_dc_and_nyquist() {
        let lp = butter(DEFAULT_ORDER, 0.2, FilterType::Lowpass).unwrap();
        let dc = lp.b.iter().sum::<f64>() / lp.a.iter().sum::<f64>();
        assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-9);

        let hp = butter(DEFAULT_ORDER, 0.2, FilterType::Highpass).unwrap();
        let alt = |v: &[f64]| v.iter().enumerate().map(|(i, c)| if i % 2 == 0 { *c } else { -c }).sum::<f64>();
        assert_abs_diff_eq!(alt(&hp.b) / alt(&hp.a), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(hp.b.iter().sum::<f64>(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lowpass_keeps_dc() {
        let audio = vec![0.25f32; 400];
        let out = pass_filter(&audio, 16000.0, 1000.0, FilterType::Lowpass, DEFAULT_ORDER).unwrap();
        assert_eq!(out.len(), 400);
        for s in out {
            assert_abs_diff_eq!(s, 0.25, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_highpass_removes_dc() {
        let audio = vec![0.5f32; 400];
        let out = pass_filter(&audio, 16000.0, 200.0, FilterType::Highpass, DEFAULT_ORDER).unwrap();
        for s in out {
            assert_abs_diff_eq!(s, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_lowpass_attenuates_nyquist_tone() {
        let audio: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let out = pass_filter(&audio, 16000.0, 500.0, FilterType::Lowpass, DEFAULT_ORDER).unwrap();
        let peak = out[300..700].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak < 1e-3, "peak {peak}");
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(butter(0, 0.5, FilterType::Lowpass).is_err());
        assert!(butter(3, 1.0, FilterType::Lowpass).is_err());
        assert!(pass_filter(&[0.0; 10], 16000.0, 100.0, FilterType::Lowpass, 5).is_err());
        assert!("band".parse::<FilterType>().is_err());
    }
}
