//! Test structures shared by the integration tests

use implore_select::{Hierarchy, HierarchyBuilder, Level};

/// Leaf names of every item, in order
pub const LEAF_NAMES: [&str; 9] = ["N", "CA", "C", "O", "CB", "CG", "CD", "CE", "NZ"];

/// Item names of chain "A"
pub const ITEM_NAMES: [&str; 3] = ["GLY", "ALA", "LYS"];

/// The point proximity scenarios are centred on
pub const ORIGIN: [f64; 3] = [0.0, 0.0, 0.0];

/// Install a test-writer subscriber once; `RUST_LOG` controls the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Position of leaf `j` of item `i`
///
/// Leaves 0-2 of the first item and leaves 0-1 of the second lie within 3
/// units of the origin; everything else is at least 50 units away.
pub fn position(i: usize, j: usize) -> [f64; 3] {
    match (i, j) {
        (0, 0) => [0.0, 0.0, 0.0],
        (0, 1) => [1.0, 0.0, 0.0],
        (0, 2) => [0.0, 2.0, 0.0],
        (1, 0) => [0.0, 0.0, 2.5],
        (1, 1) => [-2.0, 0.0, 0.0],
        _ => [50.0 + 10.0 * i as f64, 5.0 * j as f64, 0.0],
    }
}

fn push_chain(mut builder: HierarchyBuilder, chain: &str, serial: &mut i64) -> HierarchyBuilder {
    builder = builder.group(chain);
    for (i, item) in ITEM_NAMES.iter().enumerate() {
        builder = builder
            .item(*item, i as i64 + 1)
            .attr("ss", if i == 0 { "coil" } else { "helix" });
        for (j, leaf) in LEAF_NAMES.iter().enumerate() {
            *serial += 1;
            builder = builder.leaf(*leaf, *serial, position(i, j));
            if j % 2 == 0 {
                builder = builder.attr("bfactor", 10.0 * j as f64);
            }
        }
    }
    builder
}

/// One group "A" with 3 items of 9 leaves each (27 leaves)
///
/// Items carry a text attribute `ss`: "coil" for GLY, "helix" otherwise.
pub fn single_chain() -> Hierarchy {
    let mut serial = 0;
    push_chain(Hierarchy::builder(), "A", &mut serial).build()
}

/// Groups "A" and "B", each shaped like `single_chain`, with B shifted far away
pub fn two_chains() -> Hierarchy {
    let mut serial = 0;
    let builder = push_chain(Hierarchy::builder(), "A", &mut serial);
    let mut builder = builder.group("B");
    for (i, item) in ITEM_NAMES.iter().enumerate() {
        builder = builder.item(*item, i as i64 + 4);
        for (j, leaf) in LEAF_NAMES.iter().enumerate() {
            serial += 1;
            let [x, y, z] = position(i, j);
            builder = builder.leaf(*leaf, serial, [x + 1000.0, y, z]);
        }
    }
    builder.declare(Level::Group, "segment").build()
}

/// A separate single-leaf structure used as a proximity reference
pub fn marker_at(position: [f64; 3]) -> Hierarchy {
    Hierarchy::builder()
        .group("M")
        .item("MRK", 1)
        .leaf("X", 1, position)
        .build()
}
