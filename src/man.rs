use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::RGBColor;
use regex::Regex;

use crate::error::{PlotError, Result};
use crate::figure::{self, Figure, FigureSize, Output, Rendered};
use crate::table::ResultsTable;

pub const DEFAULT_PALETTE: &str = "#5da9fd,#fdb15d";
pub const Y_AXIS_TITLE: &str = "-log10(p_value)";

#[derive(Debug, Clone)]
pub struct ManhattanOptions {
    /// Threshold on the -log10(p) scale
    pub significance: Option<f64>,
    /// Cycled over chromosome groups
    pub palette: Vec<RGBColor>,
    /// Label points at or above the threshold with the table's label column
    pub annotate: bool,
    pub size: FigureSize,
}

impl Default for ManhattanOptions {
    fn default() -> Self {
        Self {
            significance: None,
            palette: vec![RGBColor(0x5d, 0xa9, 0xfd), RGBColor(0xfd, 0xb1, 0x5d)],
            annotate: false,
            size: FigureSize::new(12.0, 6.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSeries {
    pub label: String,
    pub color: RGBColor,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub x: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// Everything the Manhattan plot draws, in data coordinates.
#[derive(Debug, Clone)]
pub struct ManhattanLayout {
    pub series: Vec<GroupSeries>,
    pub ticks: Vec<Tick>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
    pub threshold: Option<f64>,
    pub annotations: Vec<Annotation>,
    pub size: FigureSize,
}

impl ManhattanLayout {
    /// The significance line spans the full x range.
    pub fn threshold_line(&self) -> Option<[(f64, f64); 2]> {
        self.threshold
            .map(|y| [(self.x_range.0, y), (self.x_range.1, y)])
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// Parse a comma-separated list of `#rrggbb` colours.
pub fn parse_palette(colors: &str) -> Result<Vec<RGBColor>> {
    let re_hex = Regex::new(r"^#?(?P<r>[0-9a-fA-F]{2})(?P<g>[0-9a-fA-F]{2})(?P<b>[0-9a-fA-F]{2})$")
        .expect("invalid regex");
    let channel = |hex: &str| u8::from_str_radix(hex, 16).unwrap_or(0);

    let mut palette = Vec::new();
    for token in colors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let caps = re_hex.captures(token).ok_or_else(|| {
            PlotError::Argument(format!("colour '{token}' is not a #rrggbb hex value"))
        })?;
        palette.push(RGBColor(
            channel(&caps["r"]),
            channel(&caps["g"]),
            channel(&caps["b"]),
        ));
    }
    if palette.is_empty() {
        return Err(PlotError::Argument(
            "colour palette must contain at least one colour".to_string(),
        ));
    }
    Ok(palette)
}

pub fn layout(table: &ResultsTable, opts: &ManhattanOptions) -> Result<ManhattanLayout> {
    let max_y = table
        .max_neg_log10_p()
        .ok_or(PlotError::EmptyInput("Manhattan"))?;
    if opts.palette.is_empty() {
        return Err(PlotError::Argument(
            "colour palette must contain at least one colour".to_string(),
        ));
    }
    if let Some(t) = opts.significance {
        if !t.is_finite() {
            return Err(PlotError::Argument(format!(
                "significance threshold must be finite, got {t}"
            )));
        }
    }
    if opts.annotate && table.rows.iter().any(|r| r.label.is_none()) {
        return Err(PlotError::Argument(
            "point labels requested but no label column was loaded".to_string(),
        ));
    }

    let mut series = Vec::with_capacity(table.groups.len());
    let mut ticks = Vec::with_capacity(table.groups.len());
    for (num, group) in table.groups.iter().enumerate() {
        let points = group
            .rows
            .iter()
            .map(|&pos| {
                let row = &table.rows[pos];
                (row.ind as f64, row.neg_log10_p)
            })
            .collect();
        series.push(GroupSeries {
            label: group.label.clone(),
            color: opts.palette[num % opts.palette.len()],
            points,
        });
        ticks.push(Tick {
            x: group.midpoint(),
            label: group.label.clone(),
        });
    }

    // Text goes at the table row index; with no filtering it equals `ind`.
    let mut annotations = Vec::new();
    if let (Some(threshold), true) = (opts.significance, opts.annotate) {
        for row in table.rows.iter().filter(|r| r.neg_log10_p >= threshold) {
            annotations.push(Annotation {
                x: row.index as f64,
                y: row.neg_log10_p,
                text: row.label.clone().unwrap_or_default(),
            });
        }
    }

    Ok(ManhattanLayout {
        series,
        ticks,
        x_range: (0.0, table.len() as f64),
        y_range: (0.0, max_y + 1.0),
        threshold: opts.significance,
        annotations,
        size: opts.size,
    })
}

/// Lay out and draw the Manhattan plot.
pub fn run(
    table: &ResultsTable,
    output: &Output,
    opts: &ManhattanOptions,
) -> Result<Rendered<ManhattanLayout>> {
    let layout = layout(table, opts)?;
    info!(
        "Manhattan: {} points in {} chromosome groups, {} palette colours",
        layout.point_count(),
        layout.series.len(),
        opts.palette.len()
    );
    if let Some(t) = layout.threshold {
        info!(
            "Manhattan: significance line at {} ({} labelled points)",
            t,
            layout.annotations.len()
        );
    }
    figure::render(layout, output)
}

impl Figure for ManhattanLayout {
    fn size(&self) -> FigureSize {
        self.size
    }

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
    ) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
        let size = self.size;
        let tick_font = size.font_px(8.0);
        let desc_font = size.font_px(10.0);
        let tick_len = size.font_px(3.5) as i32;
        let radius = (size.font_px(6.0) / 2).max(1);
        let (x0, x1) = self.x_range;
        let (y0, y1) = self.y_range;

        let mut chart = ChartBuilder::on(root)
            .margin(size.font_px(10.0))
            .x_label_area_size(size.font_px(32.0))
            .y_label_area_size(size.font_px(30.0))
            .build_cartesian_2d(x0..x1, y0..y1)?;

        // The x axis is drawn by hand below: its ticks sit at chromosome midpoints.
        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .disable_x_axis()
            .y_desc(Y_AXIS_TITLE)
            .label_style(("sans-serif", tick_font))
            .axis_desc_style(("sans-serif", desc_font))
            .draw()?;

        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x0, y0), (x1, y0)],
            BLACK.stroke_width(1),
        )))?;

        for s in &self.series {
            let color = s.color;
            chart.draw_series(
                s.points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), radius, color.filled())),
            )?;
        }

        if let Some(line) = self.threshold_line() {
            chart.draw_series(std::iter::once(PathElement::new(
                line.to_vec(),
                RED.stroke_width(size.font_px(1.0)),
            )))?;
        }

        let annotation_style = ("sans-serif", tick_font)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Bottom));
        for a in &self.annotations {
            chart.draw_series(std::iter::once(Text::new(
                a.text.clone(),
                (a.x, a.y),
                annotation_style.clone(),
            )))?;
        }

        let tick_style = ("sans-serif", tick_font)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Center, VPos::Top));
        for tick in &self.ticks {
            let (px, py) = chart.backend_coord(&(tick.x, y0));
            root.draw(&PathElement::new(
                vec![(px, py), (px, py + tick_len)],
                BLACK.stroke_width(1),
            ))?;
            root.draw(&Text::new(
                tick.label.clone(),
                (px, py + tick_len + 2),
                tick_style.clone(),
            ))?;
        }

        let (mid_px, base_py) = chart.backend_coord(&((x0 + x1) / 2.0, y0));
        root.draw(&Text::new(
            "Chromosome",
            (mid_px, base_py + tick_len + 2 * tick_font as i32),
            ("sans-serif", desc_font)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Top)),
        ))?;
        Ok(())
    }
}
