pub mod data;
pub mod projection;

pub use data::{DataPoint, MapData, PolygonRings, Province};
pub use projection::{Projection, ProjectionKind};
