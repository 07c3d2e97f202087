use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("cannot read input file {path}: {source}")]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("data format error: {0}")]
    DataFormat(String),
    #[error("no rows to plot for the {0} plot")]
    EmptyInput(&'static str),
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("failed to render figure: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, PlotError>;
