//! Legacy VTK (`.vtk`) writer for the coarsened forest.
//!
//! Debug-mode output: the leaf quads on the unit square as an ASCII
//! `UNSTRUCTURED_GRID`, with one `CELL_DATA` scalar field per (z-layer,
//! tracer) named `z{Z}_{name}`, plus `local_error_{name}` and
//! `global_error_{name}` per non-mass tracer.

use std::collections::BTreeMap;
use std::io::Write;

use crate::data::TracerChunk;
use crate::error::CouplerError;
use crate::forest::QuadForest;

/// Name of tracer slot `t`, falling back to a positional name for slots
/// that were never registered.
fn slot_name(chunk: &TracerChunk, t: usize) -> String {
    chunk
        .tracer_names()
        .get(t)
        .cloned()
        .unwrap_or_else(|| format!("tracer_{t}"))
}

fn write_scalar_field<W: Write>(
    writer: &mut W,
    name: &str,
    values: impl Iterator<Item = f64>,
) -> Result<(), CouplerError> {
    writeln!(writer, "SCALARS {name} double 1")?;
    writeln!(writer, "LOOKUP_TABLE default")?;
    for value in values {
        writeln!(writer, "{value}")?;
    }
    Ok(())
}

/// Write the forest and its tracer data as a legacy ASCII VTK file.
///
/// `errors` and `errors_global` hold `num_tracers - 1` values per leaf;
/// pass empty slices before the first coarsen call to skip the error
/// fields.
pub fn write_debug_vtk<W: Write>(
    mut writer: W,
    forest: &QuadForest,
    chunk: &TracerChunk,
    errors: &[f64],
    errors_global: &[f64],
) -> Result<(), CouplerError> {
    let level = forest.level();
    let extent = (1u64 << level as u32) as f64;
    let num_leaves = forest.num_leaves();

    // Deduplicate corner vertices on the reference grid.
    let mut vertex_index: BTreeMap<(u64, u64), usize> = BTreeMap::new();
    let mut connectivity = Vec::with_capacity(num_leaves);
    for cell in forest.leaves() {
        let scale = 1u64 << (level - cell.level) as u32;
        let (x0, y0) = (cell.x as u64 * scale, cell.y as u64 * scale);
        let (x1, y1) = (x0 + scale, y0 + scale);
        // Counter-clockwise VTK_QUAD corner order.
        let corners = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
        let mut quad = [0usize; 4];
        for (slot, corner) in corners.into_iter().enumerate() {
            let next = vertex_index.len();
            quad[slot] = *vertex_index.entry(corner).or_insert(next);
        }
        connectivity.push(quad);
    }

    writeln!(writer, "# vtk DataFile Version 3.0")?;
    writeln!(writer, "{}", chunk.description())?;
    writeln!(writer, "ASCII")?;
    writeln!(writer, "DATASET UNSTRUCTURED_GRID")?;

    writeln!(writer, "POINTS {} double", vertex_index.len())?;
    let mut points: Vec<(u64, u64)> = vec![(0, 0); vertex_index.len()];
    for (&coords, &index) in &vertex_index {
        points[index] = coords;
    }
    for (x, y) in points {
        writeln!(writer, "{} {} 0", x as f64 / extent, y as f64 / extent)?;
    }

    writeln!(writer, "CELLS {} {}", num_leaves, num_leaves * 5)?;
    for quad in &connectivity {
        writeln!(writer, "4 {} {} {} {}", quad[0], quad[1], quad[2], quad[3])?;
    }
    writeln!(writer, "CELL_TYPES {num_leaves}")?;
    for _ in 0..num_leaves {
        writeln!(writer, "9")?;
    }

    let t_count = chunk.num_tracers();
    let num_error_tracers = t_count - 1;
    writeln!(writer, "CELL_DATA {num_leaves}")?;
    for z in 0..chunk.z_length() {
        for t in 0..t_count {
            let name = format!("z{}_{}", z, slot_name(chunk, t));
            write_scalar_field(
                &mut writer,
                &name,
                (0..num_leaves).map(|leaf| chunk.value(leaf, z, t)),
            )?;
        }
    }
    if errors.len() == num_leaves * num_error_tracers {
        for t in 0..num_error_tracers {
            let name = format!("local_error_{}", slot_name(chunk, t));
            write_scalar_field(
                &mut writer,
                &name,
                (0..num_leaves).map(|leaf| errors[leaf * num_error_tracers + t]),
            )?;
        }
    }
    if errors_global.len() == num_leaves * num_error_tracers {
        for t in 0..num_error_tracers {
            let name = format!("global_error_{}", slot_name(chunk, t));
            write_scalar_field(
                &mut writer,
                &name,
                (0..num_leaves).map(|leaf| errors_global[leaf * num_error_tracers + t]),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{apply_morton_order, AxisMap};
    use crate::forest::{build_forest, GridMode};

    #[test]
    fn vtk_output_names_every_field() {
        let (forest, context) = build_forest(2, 2, 0, 0, GridMode::Coarsen).unwrap();
        let (axes, lengths) = AxisMap::parse("XYZ", [2, 2, 2]).unwrap();
        let mut chunk =
            TracerChunk::new("smoke", axes, lengths, [2, 2, 2], 0, 0, 2, -1e34, 1).unwrap();
        chunk.set_tracer_values("q", &[1.0; 8]).unwrap();
        chunk.set_tracer_values("mass", &[2.0; 8]).unwrap();
        apply_morton_order(&forest, &context, &mut chunk).unwrap();

        let errors = vec![0.5; 4];
        let errors_global = vec![1.5; 4];
        let mut out = Vec::new();
        write_debug_vtk(&mut out, &forest, &chunk, &errors, &errors_global).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("# vtk DataFile Version 3.0"));
        assert!(text.contains("DATASET UNSTRUCTURED_GRID"));
        assert!(text.contains("POINTS 9 double"));
        assert!(text.contains("CELLS 4 20"));
        assert!(text.contains("SCALARS z0_q double 1"));
        assert!(text.contains("SCALARS z1_mass double 1"));
        assert!(text.contains("SCALARS local_error_q double 1"));
        assert!(text.contains("SCALARS global_error_q double 1"));
        assert!(!text.contains("local_error_mass"));
    }
}
