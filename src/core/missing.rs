//! Missing-tile records for partial panoramas: pruning of entries already
//! implied by a recorded parent, and the compact string encoding consumed by
//! the viewer.

use std::collections::HashSet;

use super::base83;
use super::pyramid::PyramidPlan;
use super::Face;

/// One tile omitted from the pyramid. Field order matches the sort order of
/// the encoded omission list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MissingTile {
    pub face: Face,
    pub level: u32,
    pub col: u32,
    pub row: u32,
}

impl MissingTile {
    /// The four tiles covering this one at the next finer level.
    fn children(self) -> [MissingTile; 4] {
        let MissingTile { face, level, col, row } = self;
        [
            MissingTile { face, level: level + 1, col: col * 2, row: row * 2 },
            MissingTile { face, level: level + 1, col: col * 2, row: row * 2 + 1 },
            MissingTile { face, level: level + 1, col: col * 2 + 1, row: row * 2 },
            MissingTile { face, level: level + 1, col: col * 2 + 1, row: row * 2 + 1 },
        ]
    }
}

/// Drop records whose direct parent is itself recorded; a viewer that already
/// knows the parent is missing never requests its children. Parents are
/// looked up in the unpruned input, so ancestor chains collapse to their
/// topmost recorded tiles in a single pass. Records are only ever removed,
/// never added.
pub fn prune(records: &[MissingTile]) -> Vec<MissingTile> {
    let implied: HashSet<MissingTile> = records.iter().flat_map(|r| r.children()).collect();
    records
        .iter()
        .copied()
        .filter(|r| !implied.contains(r))
        .collect()
}

/// Digit width for tile coordinates at `level`. A level holding a single tile
/// needs no digits at all; its sole record is implied by the level marker.
pub fn coord_digits(plan: &PyramidPlan, level: u32) -> usize {
    let scale = (1u64 << (plan.max_level - level)) as f64;
    let max_index =
        (plan.cube_size as f64 / scale / plan.tile_size as f64).ceil() as u64 - 1;
    let mut digits = 0;
    let mut cap = 1u64;
    while cap <= max_index {
        cap *= 83;
        digits += 1;
    }
    digits
}

/// Serialize records: `!` + face letter on face change, `>` + level digit on
/// level change, then fixed-width base-83 column and row digits per record.
/// Returns the empty string for an empty set.
pub fn encode(records: &[MissingTile], plan: &PyramidPlan) -> String {
    let mut sorted = records.to_vec();
    sorted.sort_unstable();

    let mut out = String::new();
    let mut prev_face = None;
    let mut prev_level = None;
    let mut digits = 0;
    for rec in sorted {
        if prev_face != Some(rec.face) {
            out.push('!');
            out.push(rec.face.letter());
            prev_face = Some(rec.face);
        }
        if prev_level != Some(rec.level) {
            out.push('>');
            base83::encode_into(rec.level as u64, 1, &mut out);
            digits = coord_digits(plan, rec.level);
            prev_level = Some(rec.level);
        }
        base83::encode_into(rec.col as u64, digits, &mut out);
        base83::encode_into(rec.row as u64, digits, &mut out);
    }
    out
}

/// Prune and serialize in one step.
pub fn compact(records: &[MissingTile], plan: &PyramidPlan) -> String {
    encode(&prune(records), plan)
}
