//! Manhattan and Q-Q plots for GWAS result tables.
//!
//! [`table::load`] reads and annotates the results, [`man::run`] and
//! [`qq::run`] lay out and draw the two figures.

pub mod error;
pub mod figure;
pub mod man;
pub mod qq;
pub mod table;

pub use error::PlotError;
