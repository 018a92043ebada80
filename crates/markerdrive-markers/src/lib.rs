//! Fiducial markers and corner-role resolution.
//!
//! This crate focuses on:
//! - the [`Marker`] type and the [`MarkerDetector`] trait hosts implement,
//! - a validated [`BindingTable`] mapping four marker ids to corner roles,
//! - the per-frame [`CornerResolver`] that turns markers into a rectifier quad.
//!
//! It does **not** decode markers from pixels.

mod marker;
mod resolver;
mod roles;

pub use marker::{Marker, MarkerDetector};
pub use resolver::{CornerResolver, Resolution, ResolveError, ResolverParams, UNRESOLVED};
pub use roles::{BindingError, BindingTable, CornerSelection, Role, RoleBinding};
