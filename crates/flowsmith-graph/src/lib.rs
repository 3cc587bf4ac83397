//! Graph analysis for workflow graphs.
//!
//! Everything here is synchronous and pure: the same graph always yields the
//! same order, layers and positions. Edges whose endpoints do not exist are
//! ignored, and an edge that would re-enter a node still being resolved is
//! skipped, so malformed graphs degrade instead of failing. Use
//! [`check_acyclic`] to reject cycles up front.

pub mod deps;
pub mod integrity;
pub mod layout;
pub mod order;

pub use deps::DependencyMap;
pub use integrity::{check_acyclic, inspect, GraphIntegrityWarning};
pub use layout::{assign_layers, layout, HORIZONTAL_SPACING, START_X, START_Y, VERTICAL_SPACING};
pub use order::{execution_order, order};
