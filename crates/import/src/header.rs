use std::collections::HashSet;
use tally_core::{canonical_header, strip_bom, HeaderSpec, RawRow};

/// Index of the first row whose canonicalised cells include every mandatory
/// column of `spec`, or `None` if no row qualifies.
pub fn locate(rows: &[RawRow], spec: &HeaderSpec) -> Option<usize> {
    let required: HashSet<String> = spec.header_tokens().into_iter().collect();

    rows.iter().position(|row| {
        let cells: HashSet<String> = row
            .cells
            .iter()
            .map(|cell| canonical_header(&strip_bom(cell)))
            .collect();
        required.is_subset(&cells)
    })
}
