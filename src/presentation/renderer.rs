// Waveform renderer - screen-space trace geometry for one channel plot
use crate::domain::signal::WaveformSample;
use crate::domain::view::ViewTransform;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub x_px: f64,
    pub y_px: f64,
}

/// One unconnected polyline. The pen lifts between paths; no segment ever
/// bridges a lead dropout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TracePath {
    pub points: Vec<PlotPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    Clinical,
    HighContrast,
}

impl Palette {
    pub fn toggled(self) -> Self {
        match self {
            Palette::Clinical => Palette::HighContrast,
            Palette::HighContrast => Palette::Clinical,
        }
    }

    pub fn trace_color(self, channel: usize) -> &'static str {
        const CLINICAL: [&str; 3] = ["#2e7d32", "#1565c0", "#6a1b9a"];
        const HIGH_CONTRAST: [&str; 3] = ["#00e676", "#40c4ff", "#ff4081"];
        match self {
            Palette::Clinical => CLINICAL[channel % CLINICAL.len()],
            Palette::HighContrast => HIGH_CONTRAST[channel % HIGH_CONTRAST.len()],
        }
    }
}

/// What a redraw produces: either the placeholder (no data, coordinate math
/// skipped entirely) or the lead-gated trace paths.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotFrame {
    Placeholder,
    Traces {
        color: &'static str,
        paths: Vec<TracePath>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub sample_time: DateTime<Utc>,
    pub value_uv: f64,
}

/// One rendered channel plot. Owns its ViewTransform exclusively; the
/// transform survives sample refreshes because the instance does, and is
/// mutated only by direct interaction.
pub struct ChannelPlot {
    channel: usize,
    width_px: f64,
    height_px: f64,
    view: ViewTransform,
    palette: Palette,
    samples: Vec<WaveformSample>,
    panning: bool,
}

impl ChannelPlot {
    pub fn new(channel: usize, width_px: f64, height_px: f64) -> Self {
        Self {
            channel,
            width_px,
            height_px,
            view: ViewTransform::default(),
            palette: Palette::Clinical,
            samples: Vec::new(),
            panning: false,
        }
    }

    pub fn view(&self) -> &ViewTransform {
        &self.view
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Replace the bound sample sequence wholesale. Interaction state from
    /// the previous sequence does not carry over.
    pub fn set_samples(&mut self, samples: Vec<WaveformSample>) {
        self.samples = samples;
        self.panning = false;
    }

    pub fn zoom(&mut self, wheel_delta: f64) {
        self.view.zoom(wheel_delta);
    }

    pub fn compress_y(&mut self) {
        self.view.compress_y();
    }

    pub fn expand_y(&mut self) {
        self.view.expand_y();
    }

    /// Fit the y-range to the bound channel's observed amplitude span.
    pub fn fit_y(&mut self) {
        let mut observed_min = f64::INFINITY;
        let mut observed_max = f64::NEG_INFINITY;
        for sample in &self.samples {
            let v = sample.channel_uv[self.channel];
            observed_min = observed_min.min(v);
            observed_max = observed_max.max(v);
        }
        if observed_min.is_finite() && observed_max.is_finite() {
            self.view.fit_y(observed_min, observed_max);
        }
    }

    pub fn toggle_palette(&mut self) {
        self.palette = self.palette.toggled();
    }

    pub fn pointer_down(&mut self) {
        self.panning = true;
    }

    pub fn pointer_up(&mut self) {
        self.panning = false;
    }

    /// Pointer-leave discards the ephemeral interaction state.
    pub fn pointer_leave(&mut self) {
        self.panning = false;
    }

    /// While panning, accumulate the drag delta; otherwise look up the
    /// tooltip. The two are mutually exclusive on a single move.
    pub fn pointer_move(&mut self, x_px: f64, dx_px: f64) -> Option<Tooltip> {
        if self.panning {
            self.view.pan(dx_px);
            return None;
        }
        self.tooltip_at(x_px)
    }

    fn first_sample_time(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|s| s.sample_time)
    }

    fn total_ms(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => {
                ((last.sample_time - first.sample_time).num_milliseconds() as f64).max(1.0)
            }
            _ => 1.0,
        }
    }

    fn ms_in_view(&self) -> f64 {
        self.total_ms() / self.view.scale_x
    }

    fn pan_ms_offset(&self) -> f64 {
        -self.view.translate_x_px / self.width_px * self.ms_in_view()
    }

    fn x_at(&self, local_ms: f64) -> f64 {
        (local_ms - self.pan_ms_offset()) / self.ms_in_view() * self.width_px
    }

    fn y_at(&self, value_uv: f64) -> f64 {
        let span = self.view.y_max - self.view.y_min;
        self.height_px - (value_uv - self.view.y_min) / span * self.height_px
    }

    /// Off-screen points stay in their trace path (so the segment through
    /// the edge survives) but are not painted.
    pub fn on_screen(&self, point: &PlotPoint) -> bool {
        point.x_px >= 0.0 && point.x_px <= self.width_px
    }

    /// Invert the time mapping, then linear-scan for the nearest sample.
    /// The decimation contract bounds the sequence, so the scan is cheap.
    fn tooltip_at(&self, x_px: f64) -> Option<Tooltip> {
        let first = self.first_sample_time()?;
        let cursor_ms = x_px / self.width_px * self.ms_in_view() + self.pan_ms_offset();
        let cursor_time = first + Duration::milliseconds(cursor_ms.round() as i64);

        let nearest = self.samples.iter().min_by_key(|s| {
            (s.sample_time - cursor_time).num_milliseconds().abs()
        })?;
        Some(Tooltip {
            sample_time: nearest.sample_time,
            value_uv: nearest.channel_uv[self.channel],
        })
    }

    /// Full synchronous recompute of the frame geometry.
    pub fn render(&self) -> PlotFrame {
        if self.samples.is_empty() || self.view.y_max <= self.view.y_min {
            return PlotFrame::Placeholder;
        }
        let first = self.samples[0].sample_time;

        let mut paths = Vec::new();
        let mut current = TracePath::default();
        for sample in &self.samples {
            if !sample.lead_on(self.channel) {
                // pen lift: the dropout is never bridged
                if !current.points.is_empty() {
                    paths.push(std::mem::take(&mut current));
                }
                continue;
            }
            let local_ms = (sample.sample_time - first).num_milliseconds() as f64;
            current.points.push(PlotPoint {
                x_px: self.x_at(local_ms),
                y_px: self.y_at(sample.channel_uv[self.channel]),
            });
        }
        if !current.points.is_empty() {
            paths.push(current);
        }

        PlotFrame::Traces {
            color: self.palette.trace_color(self.channel),
            paths,
        }
    }
}
