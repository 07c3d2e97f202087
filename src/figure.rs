use std::path::{Path, PathBuf};

use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{PlotError, Result};

pub const DEFAULT_DPI: u32 = 300;

/// Physical figure size; pixel dimensions follow from the resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FigureSize {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
}

impl FigureSize {
    pub fn new(width_in: f64, height_in: f64) -> Self {
        Self {
            width_in,
            height_in,
            dpi: DEFAULT_DPI,
        }
    }

    pub fn with_dpi(self, dpi: u32) -> Self {
        Self { dpi, ..self }
    }

    pub fn pixels(&self) -> (u32, u32) {
        let px = |inches: f64| (inches * self.dpi as f64).round().max(1.0) as u32;
        (px(self.width_in), px(self.height_in))
    }

    /// Typographic points -> pixels at this resolution
    pub fn font_px(&self, points: f64) -> u32 {
        (points * self.dpi as f64 / 72.0).round().max(1.0) as u32
    }
}

/// Where a rendered figure goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Encode to an image file; the format follows the extension.
    File(PathBuf),
    /// Keep the raw RGB pixels in memory and hand them back.
    Memory,
}

/// File encodings a figure can be written as, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Bitmap,
    Svg,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "bmp" => Ok(FileFormat::Bitmap),
            "svg" => Ok(FileFormat::Svg),
            _ => Err(PlotError::Argument(format!(
                "cannot pick an image format for '{}' (use .png, .jpg, .bmp or .svg)",
                path.display()
            ))),
        }
    }
}

/// A fully laid-out plot that can draw itself onto any plotters backend.
pub trait Figure {
    fn size(&self) -> FigureSize;

    fn draw<DB: DrawingBackend>(
        &self,
        root: &DrawingArea<DB, Shift>,
    ) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>>;
}

#[derive(Debug)]
pub struct Rendered<F> {
    pub figure: F,
    /// RGB pixels, row-major, only for `Output::Memory`
    pub buffer: Option<Vec<u8>>,
}

pub fn render<F: Figure>(figure: F, output: &Output) -> Result<Rendered<F>> {
    let (width, height) = figure.size().pixels();
    match output {
        Output::File(path) => {
            match FileFormat::from_path(path)? {
                FileFormat::Bitmap => {
                    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
                    draw_and_present(&figure, &root)?;
                }
                FileFormat::Svg => {
                    let root = SVGBackend::new(path, (width, height)).into_drawing_area();
                    draw_and_present(&figure, &root)?;
                }
            }
            info!("wrote {} ({}x{} px)", path.display(), width, height);
            Ok(Rendered {
                figure,
                buffer: None,
            })
        }
        Output::Memory => {
            let mut buffer = vec![0u8; width as usize * height as usize * 3];
            {
                let root =
                    BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
                draw_and_present(&figure, &root)?;
            }
            Ok(Rendered {
                figure,
                buffer: Some(buffer),
            })
        }
    }
}

fn draw_and_present<DB: DrawingBackend, F: Figure>(
    figure: &F,
    root: &DrawingArea<DB, Shift>,
) -> Result<()> {
    root.fill(&WHITE).map_err(render_error)?;
    figure.draw(root).map_err(render_error)?;
    root.present().map_err(render_error)
}

fn render_error<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Render(e.to_string())
}
