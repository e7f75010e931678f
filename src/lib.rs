//! Extruded 3D province map with data light pillars, hover picking and a
//! braille wireframe renderer for the terminal.

pub mod animation;
pub mod braille;
pub mod camera;
pub mod config;
pub mod geo;
pub mod geometry;
pub mod interaction;
pub mod map;
pub mod picking;
pub mod render;
pub mod scene;
