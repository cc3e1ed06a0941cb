//! Debug output formats.

pub mod vtk;

pub use vtk::write_debug_vtk;
