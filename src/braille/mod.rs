mod canvas;
pub mod draw;

pub use canvas::BrailleCanvas;
