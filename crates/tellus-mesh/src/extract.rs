//! The leaf walk: serial and range-parallel extraction over the shared tree.

use tellus_lod::{NodeIndex, TreeCore};

use crate::vertex::{TerrainMesh, TerrainVertex};

/// Clear `output` and emit one triangle per used leaf node.
///
/// Call with the read guard of the owning buffer (or any `&TreeCore`); the
/// guard's lifetime is the immutability window the walk relies on.
pub fn extract_mesh(core: &TreeCore, output: &mut TerrainMesh) {
    output.clear();
    extract_range(core, 0, core.used_nodes(), output);
}

/// Like [`extract_mesh`], but splits the used node prefix into contiguous
/// index ranges across `workers` threads.
///
/// The result is identical to the serial walk: per-range buffers are
/// concatenated in range order.
pub fn extract_mesh_parallel(core: &TreeCore, output: &mut TerrainMesh, workers: usize) {
    output.clear();
    let used = core.used_nodes();
    let workers = workers.clamp(1, used.max(1));
    let chunk = used.div_ceil(workers);

    let mut partials: Vec<Vec<TerrainVertex>> = Vec::with_capacity(workers);
    std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for w in 0..workers {
            let start = w * chunk;
            let end = (start + chunk).min(used);
            handles.push(scope.spawn(move || {
                let mut part = TerrainMesh::new();
                extract_range(core, start, end, &mut part);
                part.vertices
            }));
        }
        for handle in handles {
            partials.push(handle.join().expect("extraction worker panicked"));
        }
    });

    for mut part in partials {
        output.vertices.append(&mut part);
    }
}

/// A worker count that leaves headroom for the tick and render threads.
#[must_use]
pub fn default_worker_count() -> usize {
    (num_cpus::get().saturating_sub(2)).max(1)
}

fn extract_range(core: &TreeCore, start: usize, end: usize, output: &mut TerrainMesh) {
    for i in start..end {
        let index = NodeIndex::new(i);
        if !core.node(index).is_leaf() {
            continue;
        }
        let [a, b, c] = core.corner_positions(index);
        output.push_triangle(a, b, c);
    }
}
