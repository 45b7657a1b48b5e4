// ============================================================
// Layer 6 — SVG Plots
// ============================================================
// Two figures, both written as SVG with plotters:
//
//   render_loss_curves  loss vs. epoch; train solid, others dashed,
//                       raw series faint behind a smoothed one
//   plot_example        audio on top, one row per conditioning input
//   plot_audio_f0       mel spectrogram with the f0 track dashed on top

use std::path::Path;

use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::domain::error::{Result, VocoderError};
use crate::domain::example::ExampleRecord;
use crate::infra::evaluation::LossCurve;
use crate::util::spectrogram::{mel_spectrogram, MelOptions};

/// Points drawn per audio row; longer buffers are strided.
const MAX_AUDIO_POINTS: usize = 4000;

fn plot_err<E: std::fmt::Display>(e: E) -> VocoderError {
    VocoderError::Plot(e.to_string())
}

/// Padded [min, max] of the given values, `default` when there are none.
fn span<'a>(values: impl Iterator<Item = &'a f64>, default: (f64, f64)) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if lo > hi {
        return default;
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 0.5, hi + 0.5);
    }
    (lo, hi)
}

pub fn render_loss_curves(
    path: &Path,
    curves: &[LossCurve],
    ylim: Option<(f64, f64)>,
    size: (u32, u32),
) -> Result<()> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let (x0, x1) = span(curves.iter().flat_map(|c| c.epochs.iter()), (0.0, 1.0));
    let (y0, y1) = ylim.unwrap_or_else(|| span(curves.iter().flat_map(|c| c.raw.iter()), (0.0, 1.0)));

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc("epoch")
        .y_desc("loss")
        .draw()
        .map_err(plot_err)?;

    for curve in curves {
        let (r, g, b) = curve.color;
        let color = RGBColor(r, g, b);
        let points = |ys: &[f64]| -> Vec<(f64, f64)> {
            curve.epochs.iter().copied().zip(ys.iter().copied()).collect()
        };

        if curve.smoothed.is_some() {
            let faint = color.mix(0.2).stroke_width(1);
            let drawn = if curve.dashed() {
                chart.draw_series(DashedLineSeries::new(points(&curve.raw), 6, 4, faint))
            } else {
                chart.draw_series(LineSeries::new(points(&curve.raw), faint))
            };
            drawn.map_err(plot_err)?;
        }

        let style = color.stroke_width(2);
        let series = if curve.dashed() {
            chart.draw_series(DashedLineSeries::new(points(curve.shown()), 6, 4, style))
        } else {
            chart.draw_series(LineSeries::new(points(curve.shown()), style))
        }
        .map_err(plot_err)?;
        series
            .label(format!("{} ({})", curve.model_id, curve.split))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    if !curves.is_empty() {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(plot_err)?;
    }
    root.present().map_err(plot_err)?;
    Ok(())
}

/// Stacked plot of a record: audio over `audio_rate`, every other
/// feature over `input_rate`. Time axes are in seconds.
pub fn plot_example(path: &Path, record: &ExampleRecord, audio_rate: f64, input_rate: f64) -> Result<()> {
    let audio = record
        .audio()
        .ok_or_else(|| VocoderError::Plot("record has no 'audio' feature".into()))?;
    let inputs: Vec<(&str, &[f32])> = record
        .features
        .iter()
        .filter(|(name, _)| name.as_str() != "audio")
        .map(|(name, values)| (name.as_str(), values.as_slice()))
        .collect();

    let n_rows = 1 + inputs.len();
    let root = SVGBackend::new(path, (1200, 160 * n_rows as u32)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let areas = root.split_evenly((n_rows, 1));

    let stride = (audio.len() / MAX_AUDIO_POINTS).max(1);
    let rows = std::iter::once(("audio", audio, audio_rate, stride))
        .chain(inputs.into_iter().map(|(name, values)| (name, values, input_rate, 1)));

    for ((name, values, rate, stride), area) in rows.zip(areas.iter()) {
        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .step_by(stride)
            .map(|(i, v)| (i as f64 / rate, *v as f64))
            .collect();
        let secs = values.len() as f64 / rate;
        let (y0, y1) = span(points.iter().map(|(_, y)| y), (-1.0, 1.0));

        let mut chart = ChartBuilder::on(area)
            .caption(name, ("sans-serif", 16))
            .margin(8)
            .x_label_area_size(25)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..secs.max(f64::EPSILON), y0..y1)
            .map_err(plot_err)?;
        chart.configure_mesh().x_desc("time [s]").draw().map_err(plot_err)?;
        chart
            .draw_series(LineSeries::new(points, &BLUE))
            .map_err(plot_err)?;
    }

    root.present().map_err(plot_err)?;
    tracing::debug!("Saved example plot to '{}'", path.display());
    Ok(())
}

// ─── Spectrogram ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SpectrogramPlot {
    pub mel:   MelOptions,
    /// Top of the frequency axis in Hz.
    pub ymax:  f64,
    pub title: Option<String>,
    pub size:  (u32, u32),
}

impl Default for SpectrogramPlot {
    fn default() -> Self {
        Self { mel: MelOptions::default(), ymax: 24000.0, title: None, size: (1000, 600) }
    }
}

/// Dark-to-light ramp for dB levels in [0, 1].
fn heat(level: f64) -> RGBColor {
    const STOPS: [(u8, u8, u8); 5] = [(0, 0, 4), (81, 18, 124), (183, 55, 121), (252, 137, 97), (252, 253, 191)];
    let x = level.clamp(0.0, 1.0) * (STOPS.len() - 1) as f64;
    let i = (x.floor() as usize).min(STOPS.len() - 2);
    let f = x - i as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let (lo, hi) = (STOPS[i], STOPS[i + 1]);
    RGBColor(lerp(lo.0, hi.0), lerp(lo.1, hi.1), lerp(lo.2, hi.2))
}

/// Mel spectrogram of `audio` with `f0` (sampled at `f0_rate`)
/// overlaid. Time in seconds, frequency in Hz up to `opts.ymax`.
pub fn plot_audio_f0(
    path: &Path,
    audio: &[f32],
    audio_rate: u32,
    f0: &[f32],
    f0_rate: f64,
    opts: &SpectrogramPlot,
) -> Result<()> {
    if f0_rate.is_nan() || f0_rate <= 0.0 {
        return Err(VocoderError::Config(format!("f0_rate must be positive, got {f0_rate}")));
    }
    if opts.ymax.is_nan() || opts.ymax <= 0.0 {
        return Err(VocoderError::Config(format!("ymax must be positive, got {}", opts.ymax)));
    }
    let spec = mel_spectrogram(audio, audio_rate, &opts.mel)?;
    let secs = audio.len() as f64 / audio_rate as f64;

    let root = SVGBackend::new(path, opts.size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut builder = ChartBuilder::on(&root);
    builder.margin(10).x_label_area_size(30).y_label_area_size(60);
    if let Some(title) = &opts.title {
        builder.caption(title, ("sans-serif", 18));
    }
    let mut chart = builder
        .build_cartesian_2d(0.0..secs, 0.0..opts.ymax)
        .map_err(plot_err)?;
    let step = if opts.ymax < 2000.0 { 100.0 } else { 1000.0 };
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("time [s]")
        .y_desc("frequency [Hz]")
        .y_labels((opts.ymax / step) as usize + 1)
        .draw()
        .map_err(plot_err)?;

    // Each band spans halfway to its neighbours' centres.
    let edges = &spec.edges;
    let bands: Vec<(f64, f64)> = (0..edges.len() - 2)
        .map(|i| ((edges[i] + edges[i + 1]) / 2.0, (edges[i + 1] + edges[i + 2]) / 2.0))
        .filter(|(lo, _)| *lo < opts.ymax)
        .collect();
    let half = spec.hop_secs / 2.0;
    let cells = spec.db.iter().enumerate().flat_map(|(t, frame)| {
        let centre = t as f64 * spec.hop_secs;
        let (x0, x1) = ((centre - half).max(0.0), (centre + half).min(secs));
        bands.iter().zip(frame).map(move |((y0, y1), db)| {
            let color = heat((*db as f64 + 80.0) / 80.0);
            Rectangle::new([(x0, *y0), (x1, y1.min(opts.ymax))], color.filled())
        })
    });
    chart.draw_series(cells).map_err(plot_err)?;

    let line = RGBColor(0, 200, 255);
    let track: Vec<(f64, f64)> = f0
        .iter()
        .enumerate()
        .map(|(k, hz)| (k as f64 / f0_rate, *hz as f64))
        .collect();
    chart
        .draw_series(DashedLineSeries::new(track, 6, 4, line.stroke_width(2)))
        .map_err(plot_err)?
        .label("f0")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line.stroke_width(2)));
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    tracing::debug!("Saved spectrogram plot to '{}'", path.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_handles_flat_and_empty() {
        assert_eq!(span([2.0, 2.0].iter(), (0.0, 1.0)), (1.5, 2.5));
        assert_eq!(span([0.0f64; 0].iter(), (0.0, 1.0)), (0.0, 1.0));
        assert_eq!(span([3.0, -1.0, f64::NAN].iter(), (0.0, 1.0)), (-1.0, 3.0));
    }

    #[test]
    fn test_plot_example_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.svg");
        let record = ExampleRecord::new()
            .with("audio", (0..800).map(|i| (i as f32 * 0.05).sin()).collect())
            .with("f0", vec![220.0; 5]);
        plot_example(&path, &record, 800.0, 5.0).unwrap();
        let svg = std::fs::read_to_string(path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("f0"));
    }

    #[test]
    fn test_heat_ramp_endpoints() {
        assert_eq!(heat(0.0), RGBColor(0, 0, 4));
        assert_eq!(heat(1.0), RGBColor(252, 253, 191));
        assert_eq!(heat(7.0), heat(1.0));
    }

    #[test]
    fn test_plot_audio_f0_writes_svg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.svg");
        let audio: Vec<f32> = (0..4000)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 4000.0).sin())
            .collect();
        let opts = SpectrogramPlot {
            mel:   MelOptions { n_fft: 256, n_mels: 32, fmax: 2000.0 },
            ymax:  1500.0,
            title: Some("voice".into()),
            ..SpectrogramPlot::default()
        };
        plot_audio_f0(&path, &audio, 4000, &[220.0; 4], 4.0, &opts).unwrap();
        let svg = std::fs::read_to_string(path).unwrap();
        assert!(svg.contains("<rect"));
        assert!(svg.contains("frequency [Hz]"));
        assert!(svg.contains("voice"));
    }

    #[test]
    fn test_plot_audio_f0_rejects_bad_rates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.svg");
        let audio = [0.0f32; 512];
        assert!(matches!(
            plot_audio_f0(&path, &audio, 4000, &[100.0], 0.0, &SpectrogramPlot::default()),
            Err(VocoderError::Config(_))
        ));
        let no_top = SpectrogramPlot { ymax: 0.0, ..SpectrogramPlot::default() };
        assert!(plot_audio_f0(&path, &audio, 4000, &[100.0], 1.0, &no_top).is_err());
    }

    #[test]
    fn test_plot_example_needs_audio() {
        let dir = tempfile::tempdir().unwrap();
        let record = ExampleRecord::new().with("f0", vec![1.0]);
        assert!(matches!(
            plot_example(&dir.path().join("x.svg"), &record, 1.0, 1.0),
            Err(VocoderError::Plot(_))
        ));
    }
}
