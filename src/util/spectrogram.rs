// ============================================================
// Layer 7 — Mel Spectrogram
// ============================================================
// Power mel spectrogram in dB, for looking at audio next to its
// f0 track. Framing follows the usual centred STFT:
//
//   zero-pad n_fft/2 on both sides
//        │
//        ▼  periodic Hann, hop = n_fft / 4
//   |FFT|²  per frame, bins 0..=n_fft/2
//        │
//        ▼  Slaney mel filterbank (area-normalised triangles)
//   mel power
//        │
//        ▼  10·log10(S / max S), floored 80 dB below the peak
//   dB
//
// Frame t is centred on sample t·hop.

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

use crate::domain::error::{Result, VocoderError};

pub const DEFAULT_N_FFT: usize = 8192;
pub const DEFAULT_N_MELS: usize = 1024;
pub const DEFAULT_FMAX: f64 = 24000.0;

const AMIN: f64 = 1e-10;
const TOP_DB: f64 = 80.0;

// Slaney scale: linear up to 1 kHz, logarithmic above.
const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MelOptions {
    pub n_fft:  usize,
    pub n_mels: usize,
    pub fmax:   f64,
}

impl Default for MelOptions {
    fn default() -> Self {
        Self { n_fft: DEFAULT_N_FFT, n_mels: DEFAULT_N_MELS, fmax: DEFAULT_FMAX }
    }
}

impl MelOptions {
    pub fn hop(&self) -> usize {
        (self.n_fft / 4).max(1)
    }

    fn validate(&self) -> Result<()> {
        if self.n_fft < 2 {
            return Err(VocoderError::Config(format!("n_fft must be at least 2, got {}", self.n_fft)));
        }
        if self.n_mels == 0 {
            return Err(VocoderError::Config("n_mels must be positive".into()));
        }
        if !(self.fmax.is_finite() && self.fmax > 0.0) {
            return Err(VocoderError::Config(format!("fmax must be positive, got {}", self.fmax)));
        }
        Ok(())
    }
}

// ─── Filterbank ───────────────────────────────────────────────────────────────
/// One triangular filter, stored from its first non-zero bin.
#[derive(Debug, Clone, PartialEq)]
pub struct MelFilter {
    pub start:   usize,
    pub weights: Vec<f32>,
}

impl MelFilter {
    fn apply(&self, power: &[f32]) -> f32 {
        self.weights
            .iter()
            .zip(power.iter().skip(self.start))
            .map(|(w, p)| w * p)
            .sum()
    }
}

/// Filters plus the `n_mels + 2` band edge frequencies in Hz; filter
/// `i` rises from `edges[i]`, peaks at `edges[i + 1]` and falls to
/// `edges[i + 2]`.
pub fn mel_filterbank(audio_rate: u32, n_fft: usize, n_mels: usize, fmax: f64) -> (Vec<MelFilter>, Vec<f64>) {
    let mel_max = hz_to_mel(fmax);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
        .collect();
    let bin_hz: Vec<f64> = (0..=n_fft / 2)
        .map(|k| k as f64 * audio_rate as f64 / n_fft as f64)
        .collect();

    let filters = edges
        .windows(3)
        .map(|w| {
            let (lo, mid, hi) = (w[0], w[1], w[2]);
            let norm = 2.0 / (hi - lo);
            let full: Vec<f32> = bin_hz
                .iter()
                .map(|f| {
                    let rising = (f - lo) / (mid - lo);
                    let falling = (hi - f) / (hi - mid);
                    (rising.min(falling).max(0.0) * norm) as f32
                })
                .collect();
            let start = full.iter().position(|w| *w > 0.0).unwrap_or(full.len());
            let end = full.iter().rposition(|w| *w > 0.0).map_or(start, |e| e + 1);
            MelFilter { start, weights: full[start..end].to_vec() }
        })
        .collect();
    (filters, edges)
}

// ─── Spectrogram ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct MelSpectrogram {
    /// dB relative to the loudest cell — shape: [frames][n_mels]
    pub db:       Vec<Vec<f32>>,
    /// Band edges in Hz, `n_mels + 2` of them.
    pub edges:    Vec<f64>,
    /// Seconds between frame centres.
    pub hop_secs: f64,
}

impl MelSpectrogram {
    pub fn n_frames(&self) -> usize {
        self.db.len()
    }

    /// Centre frequency of band `i` in Hz.
    pub fn center_hz(&self, i: usize) -> f64 {
        self.edges[i + 1]
    }
}

fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos()) as f32)
        .collect()
}

/// Scale power to dB against its maximum and clip the floor.
pub fn power_to_db(power: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let peak = power
        .iter()
        .flatten()
        .fold(AMIN, |m, p| m.max(*p as f64));
    let reference = 10.0 * peak.log10();
    let floor = -TOP_DB;
    power
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|p| ((10.0 * (*p as f64).max(AMIN).log10() - reference).max(floor)) as f32)
                .collect()
        })
        .collect()
}

pub fn mel_spectrogram(audio: &[f32], audio_rate: u32, opts: &MelOptions) -> Result<MelSpectrogram> {
    opts.validate()?;
    if audio_rate == 0 {
        return Err(VocoderError::Config("audio_rate must be positive".into()));
    }
    if audio.is_empty() {
        return Err(VocoderError::Config("cannot compute a spectrogram of empty audio".into()));
    }

    let n_fft = opts.n_fft;
    let hop = opts.hop();
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; pad];
    padded.extend_from_slice(audio);
    padded.resize(padded.len() + pad, 0.0);
    let n_frames = 1 + (padded.len() - n_fft) / hop;

    let window = hann(n_fft);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
    let (filters, edges) = mel_filterbank(audio_rate, n_fft, opts.n_mels, opts.fmax);

    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
    let mut mel_power = Vec::with_capacity(n_frames);
    for t in 0..n_frames {
        let frame = &padded[t * hop..t * hop + n_fft];
        for ((slot, x), w) in buffer.iter_mut().zip(frame).zip(&window) {
            *slot = Complex::new(x * w, 0.0);
        }
        fft.process(&mut buffer);
        let power: Vec<f32> = buffer[..=n_fft / 2].iter().map(|c| c.norm_sqr()).collect();
        mel_power.push(filters.iter().map(|f| f.apply(&power)).collect::<Vec<f32>>());
    }

    tracing::debug!(n_frames, n_mels = opts.n_mels, "Computed mel spectrogram");
    Ok(MelSpectrogram {
        db: power_to_db(&mel_power),
        edges,
        hop_secs: hop as f64 / audio_rate as f64,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_slaney_scale() {
        assert_relative_eq!(hz_to_mel(1000.0), 15.0, epsilon = 1e-12);
        assert_relative_eq!(hz_to_mel(500.0), 7.5, epsilon = 1e-12);
        for hz in [0.0, 300.0, 1000.0, 4000.0, 22050.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_filterbank_triangles_ordered() {
        let (filters, edges) = mel_filterbank(16000, 512, 20, 8000.0);
        assert_eq!(filters.len(), 20);
        assert_eq!(edges.len(), 22);
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
        let peaks: Vec<usize> = filters
            .iter()
            .map(|f| {
                let (i, _) = f
                    .weights
                    .iter()
                    .enumerate()
                    .fold((0, f32::MIN), |best, (i, w)| if *w > best.1 { (i, *w) } else { best });
                f.start + i
            })
            .collect();
        assert!(peaks.windows(2).all(|w| w[0] <= w[1]));
        assert!(filters.iter().flat_map(|f| f.weights.iter()).all(|w| *w >= 0.0));
    }

    #[test]
    fn test_sine_peaks_in_its_band() {
        let rate = 8000;
        let audio: Vec<f32> = (0..rate)
            .map(|i| (2.0 * PI * 440.0 * i as f64 / rate as f64).sin() as f32)
            .collect();
        let opts = MelOptions { n_fft: 1024, n_mels: 40, fmax: 4000.0 };
        let spec = mel_spectrogram(&audio, rate as u32, &opts).unwrap();
        assert_eq!(spec.n_frames(), 1 + rate / 256);
        assert_relative_eq!(spec.hop_secs, 256.0 / 8000.0);

        let middle = &spec.db[spec.n_frames() / 2];
        let loudest = (0..middle.len())
            .max_by(|a, b| middle[*a].total_cmp(&middle[*b]))
            .unwrap();
        assert!((spec.edges[loudest]..=spec.edges[loudest + 2]).contains(&440.0));
        assert!(spec.db.iter().flatten().all(|v| (-80.0..=0.0).contains(v)));
    }

    #[test]
    fn test_bad_options_rejected() {
        let audio = [0.0f32; 16];
        let bad = MelOptions { n_fft: 1, ..MelOptions::default() };
        assert!(matches!(mel_spectrogram(&audio, 16000, &bad), Err(VocoderError::Config(_))));
        assert!(mel_spectrogram(&[], 16000, &MelOptions::default()).is_err());
    }
}
