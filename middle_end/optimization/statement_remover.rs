//! Removal of statements by id.

use std::collections::BTreeSet as Set;

use crate::middle_end::sir::*;

/// Delete the statements with the given ids (pre-order positions, see
/// [StmtId]), together with everything nested in them.
/// Surviving statements keep their order.
pub fn remove_statements(program: &mut Program, ids: &Set<StmtId>) {
    if !ids.is_empty() {
        remove_in_block(&mut program.code, StmtId(0), ids);
    }
}

fn remove_in_block(block: &mut Block, first: StmtId, ids: &Set<StmtId>) {
    let mut keep = Vec::with_capacity(block.statements.len());
    let mut id = first;

    for stmt in &mut block.statements {
        // sizes are taken before anything nested is removed.
        let len = stmt.subtree_len();
        keep.push(!ids.contains(&id));

        let mut child_first = id.offset(1);
        for child in stmt.child_blocks_mut() {
            let child_len = child.subtree_len();
            remove_in_block(child, child_first, ids);
            child_first = child_first.offset(child_len);
        }

        id = id.offset(len);
    }

    let mut keep = keep.into_iter();
    block.statements.retain(|_| keep.next().unwrap_or(true));
}
