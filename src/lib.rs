//! Graph layout, overlap removal and edge routing.
//!
//! [`logic::LogicCore`] runs the three stages in order; every algorithm is
//! also usable on its own through [`layout::LayoutAlgorithm`],
//! [`overlap::OverlapRemover`] and [`routing::EdgeRouter`].

pub mod cancel;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod graph;
pub mod layout;
pub mod layout_dump;
pub mod logic;
pub mod overlap;
pub mod parser;
pub mod routing;

pub use cancel::CancellationToken;
#[cfg(feature = "cli")]
pub use cli::run;
pub use error::{GraphError, LayoutError};
pub use factory::{EdgeRoutingKind, LayoutKind, OverlapRemovalKind};
pub use logic::{LayoutOutcome, LogicCore};
