// View transform - pan/zoom/y-range state for one rendered channel plot

/// Pan/zoom/y-range state owned by exactly one channel plot instance.
/// Never shared across channels; survives a data refresh only if the
/// instance itself does.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTransform {
    /// Horizontal zoom factor, clamped to [0.5, 10].
    pub scale_x: f64,
    /// Accumulated horizontal pan, screen pixels.
    pub translate_x_px: f64,
    pub y_min: f64,
    pub y_max: f64,
}

pub const SCALE_X_MIN: f64 = 0.5;
pub const SCALE_X_MAX: f64 = 10.0;
const ZOOM_IN_FACTOR: f64 = 1.1;
const ZOOM_OUT_FACTOR: f64 = 0.9;

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            translate_x_px: 0.0,
            y_min: -500.0,
            y_max: 500.0,
        }
    }
}

impl ViewTransform {
    /// Wheel zoom: positive delta zooms in, negative zooms out.
    pub fn zoom(&mut self, wheel_delta: f64) {
        let factor = if wheel_delta > 0.0 {
            ZOOM_IN_FACTOR
        } else {
            ZOOM_OUT_FACTOR
        };
        self.scale_x = (self.scale_x * factor).clamp(SCALE_X_MIN, SCALE_X_MAX);
    }

    /// Accumulate a pointer-drag pan delta.
    pub fn pan(&mut self, delta_px: f64) {
        self.translate_x_px += delta_px;
    }

    /// Shrink the y-range bounds toward zero. The scaling is multiplicative
    /// on the existing bounds, not a recentering around the data.
    pub fn compress_y(&mut self) {
        self.y_min *= 0.8;
        self.y_max *= 0.8;
    }

    /// Widen the y-range bounds away from zero.
    pub fn expand_y(&mut self) {
        self.y_min *= 1.2;
        self.y_max *= 1.2;
    }

    /// Fit the y-range to observed data with 10% padding on each side.
    /// No-op for empty or flat data.
    pub fn fit_y(&mut self, observed_min: f64, observed_max: f64) {
        if observed_min >= observed_max {
            return;
        }
        let pad = (observed_max - observed_min) * 0.1;
        self.y_min = observed_min - pad;
        self.y_max = observed_max + pad;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_clamps_both_ends() {
        let mut view = ViewTransform::default();
        for _ in 0..100 {
            view.zoom(1.0);
        }
        assert_eq!(view.scale_x, SCALE_X_MAX);
        for _ in 0..200 {
            view.zoom(-1.0);
        }
        assert_eq!(view.scale_x, SCALE_X_MIN);
    }

    #[test]
    fn test_zoom_steps_by_ten_percent() {
        let mut view = ViewTransform::default();
        view.zoom(1.0);
        assert!((view.scale_x - 1.1).abs() < 1e-12);
        view.zoom(-1.0);
        assert!((view.scale_x - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_compress_expand_scale_bounds_without_recentering() {
        let mut view = ViewTransform {
            y_min: -100.0,
            y_max: 300.0,
            ..Default::default()
        };
        view.compress_y();
        assert_eq!((view.y_min, view.y_max), (-80.0, 240.0));
        view.expand_y();
        assert_eq!((view.y_min, view.y_max), (-96.0, 288.0));
    }

    #[test]
    fn test_fit_pads_ten_percent() {
        let mut view = ViewTransform::default();
        view.fit_y(-50.0, 150.0);
        assert_eq!((view.y_min, view.y_max), (-70.0, 170.0));
    }

    #[test]
    fn test_fit_ignores_flat_data() {
        let mut view = ViewTransform::default();
        let before = view.clone();
        view.fit_y(42.0, 42.0);
        assert_eq!(view, before);
    }

    #[test]
    fn test_pan_accumulates() {
        let mut view = ViewTransform::default();
        view.pan(12.5);
        view.pan(-4.5);
        assert_eq!(view.translate_x_px, 8.0);
    }
}
