use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{RGBAColor, RGBColor};
use rayon::prelude::*;

use crate::error::{PlotError, Result};
use crate::figure::{self, Figure, FigureSize, Output, Rendered};

/// Matplotlib's first cycle colour, used for the scatter.
const POINT_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);

#[derive(Debug, Clone)]
pub struct QqOptions {
    /// Point opacity in [0, 1]
    pub alpha: f64,
    pub size: FigureSize,
}

impl Default for QqOptions {
    fn default() -> Self {
        Self {
            alpha: 0.8,
            size: FigureSize::new(6.4, 4.8),
        }
    }
}

/// Expected and observed -log10 quantiles, paired by rank.
#[derive(Debug, Clone, PartialEq)]
pub struct QqPoints {
    pub expected: Vec<f64>,
    pub observed: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct QqLayout {
    pub points: QqPoints,
    pub diagonal: [(f64, f64); 2],
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub alpha: f64,
    pub size: FigureSize,
}

/// e_k = -log10((k + 0.5) / L), o_k = -log10(p_(k)) with p sorted ascending.
pub fn qq_points(p_values: &[f64]) -> Result<QqPoints> {
    if p_values.is_empty() {
        return Err(PlotError::EmptyInput("Q-Q"));
    }
    if let Some(bad) = p_values.iter().find(|&&p| !(p > 0.0 && p <= 1.0)) {
        return Err(PlotError::DataFormat(format!(
            "p-value {bad} is outside (0, 1]"
        )));
    }

    let mut sorted = p_values.to_vec();
    sorted.par_sort_unstable_by(|a, b| a.total_cmp(b));

    let n = sorted.len() as f64;
    let expected: Vec<f64> = (0..sorted.len())
        .into_par_iter()
        .map(|k| -((k as f64 + 0.5) / n).log10())
        .collect();
    let observed: Vec<f64> = sorted.par_iter().map(|p| -p.log10()).collect();
    Ok(QqPoints { expected, observed })
}

pub fn layout(p_values: &[f64], opts: &QqOptions) -> Result<QqLayout> {
    if !(0.0..=1.0).contains(&opts.alpha) {
        return Err(PlotError::Argument(format!(
            "alpha must be within [0, 1], got {}",
            opts.alpha
        )));
    }
    let points = qq_points(p_values)?;

    // Expected values are strictly decreasing in k; observed are non-increasing.
    let e_max = points.expected[0];
    let e_min = points.expected[points.expected.len() - 1];
    let o_max = points.observed[0];
    let o_min = points.observed[points.observed.len() - 1];

    // Upper y bound comes from the data: points and the diagonal's end.
    let y_lo = o_min;
    let data_hi = o_max.max(e_max);
    let span = data_hi - y_lo;
    let y_hi = if span > f64::EPSILON {
        data_hi + 0.05 * span
    } else {
        y_lo + 1.0
    };

    Ok(QqLayout {
        diagonal: [(e_min, e_min), (e_max, e_max)],
        x_range: (e_min, 1.05 * e_max),
        y_range: (y_lo, y_hi),
        alpha: opts.alpha,
        size: opts.size,
        points,
    })
}

/// Lay out and draw the Q-Q plot.
pub fn run(p_values: &[f64], output: &Output, opts: &QqOptions) -> Result<Rendered<QqLayout>> {
    let layout = layout(p_values, opts)?;
    info!(
        "QQ: {} points, expected max {:.3}, observed max {:.3}",
        layout.points.expected.len(),
        layout.diagonal[1].0,
        layout.points.observed[0]
    );
    figure::render(layout, output)
}

impl Figure for QqLayout {
    fn size(&self) -> FigureSize {
        self.size
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
    ) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let size = self.size;
        let radius = (size.font_px(6.0) / 2).max(1);

        let mut chart = ChartBuilder::on(root)
            .margin(size.font_px(10.0))
            .x_label_area_size(size.font_px(30.0))
            .y_label_area_size(size.font_px(36.0))
            .build_cartesian_2d(
                self.x_range.0..self.x_range.1,
                self.y_range.0..self.y_range.1,
            )?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_desc("Expected(-log10)")
            .y_desc("Observed(-log10)")
            .label_style(("sans-serif", size.font_px(10.0)))
            .axis_desc_style(("sans-serif", size.font_px(10.0)))
            .draw()?;

        let fill = RGBAColor(POINT_COLOR.0, POINT_COLOR.1, POINT_COLOR.2, self.alpha);
        chart.draw_series(
            self.points
                .expected
                .iter()
                .zip(&self.points.observed)
                .map(|(&e, &o)| Circle::new((e, o), radius, fill.filled())),
        )?;

        chart.draw_series(std::iter::once(PathElement::new(
            self.diagonal.to_vec(),
            RED.stroke_width(size.font_px(1.5)),
        )))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn expected_quantiles_are_ppoints() {
        let q = qq_points(&[0.5, 0.01, 0.2, 0.9]).unwrap();
        assert!((q.expected[0] - 0.90309).abs() < 1e-5);
        for (k, e) in q.expected.iter().enumerate() {
            assert!(close(*e, -((k as f64 + 0.5) / 4.0).log10()));
        }
    }

    #[test]
    fn observed_quantiles_are_sorted_by_p() {
        let q = qq_points(&[0.5, 0.01, 0.2, 0.9]).unwrap();
        let want: Vec<f64> = [0.01, 0.2, 0.5, 0.9].iter().map(|p: &f64| -p.log10()).collect();
        for (o, w) in q.observed.iter().zip(&want) {
            assert!(close(*o, *w));
        }
    }

    #[test]
    fn axis_limits_and_diagonal() {
        let p = [0.5, 0.01, 0.2, 0.9];
        let l = layout(&p, &QqOptions::default()).unwrap();
        let e_min = -(3.5f64 / 4.0).log10();
        let e_max = -(0.5f64 / 4.0).log10();
        assert!(close(l.diagonal[0].0, e_min) && close(l.diagonal[0].1, e_min));
        assert!(close(l.diagonal[1].0, e_max) && close(l.diagonal[1].1, e_max));
        assert!(close(l.x_range.0, e_min));
        assert!(close(l.x_range.1, 1.05 * e_max));
        assert!(close(l.y_range.0, -(0.9f64).log10()));
        // observed max is 2.0 and dominates the diagonal
        assert!(l.y_range.1 > 2.0);
        assert_eq!(l.alpha, 0.8);
    }

    #[test]
    fn single_value_has_usable_range() {
        let l = layout(&[1.0], &QqOptions::default()).unwrap();
        assert!(l.x_range.1 > l.x_range.0);
        assert!(l.y_range.1 > l.y_range.0);
        assert!(close(l.points.expected[0], -(0.5f64).log10()));
    }

    #[test]
    fn empty_is_empty_input() {
        assert!(matches!(qq_points(&[]), Err(PlotError::EmptyInput("Q-Q"))));
        let err = run(&[], &Output::Memory, &QqOptions::default()).unwrap_err();
        assert!(matches!(err, PlotError::EmptyInput(_)));
    }

    #[test]
    fn out_of_range_p_is_rejected() {
        for bad in [0.0, -1.0, 1.5, f64::NAN] {
            assert!(matches!(qq_points(&[0.1, bad]), Err(PlotError::DataFormat(_))));
        }
    }

    #[test]
    fn draws_into_memory_buffer() {
        let opts = QqOptions {
            alpha: 0.5,
            size: FigureSize::new(6.4, 4.8).with_dpi(20),
        };
        let rendered = run(&[0.5, 0.01, 0.2, 0.9], &Output::Memory, &opts).unwrap();
        let (w, h) = opts.size.pixels();
        let buffer = rendered.buffer.expect("memory output keeps pixels");
        assert_eq!(buffer.len(), w as usize * h as usize * 3);
        assert!(buffer.iter().any(|&b| b != 255));
    }

    #[test]
    fn writes_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Q-Q.png");
        let opts = QqOptions {
            size: FigureSize::new(6.4, 4.8).with_dpi(20),
            ..QqOptions::default()
        };
        run(&[0.3, 0.001], &Output::File(path.clone()), &opts).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn alpha_must_be_a_fraction() {
        let opts = QqOptions {
            alpha: 1.5,
            ..QqOptions::default()
        };
        assert!(matches!(layout(&[0.1], &opts), Err(PlotError::Argument(_))));
    }
}
