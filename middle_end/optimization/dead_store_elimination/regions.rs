//! Relations between the regions touched by two operations.
//!
//! Differences are computed modulo 2^256, so a difference only stands for a
//! non-negative distance while it is small.  Every bound used below is
//! checked against 2^128 - 1 first.

use primitive_types::U256;

use super::operations::*;
use crate::middle_end::analysis::knowledge_base::Knowledge;

fn largest_positive() -> U256 {
    U256::from(u128::MAX)
}

/// Whether the two operations certainly touch disjoint regions.  Symmetric.
pub fn known_unrelated(knowledge: &impl Knowledge, op1: &Operation, op2: &Operation) -> bool {
    if op1.location != op2.location {
        return true;
    }

    match op1.location {
        Location::Storage => match (&op1.start, &op2.start) {
            (Some(start1), Some(start2)) => knowledge.known_to_be_different(start1, start2),
            _ => false,
        },
        Location::Memory => {
            let empty = |length: &Option<_>| {
                length
                    .as_ref()
                    .map_or(false, |length| knowledge.known_to_be_zero(length))
            };
            if empty(&op1.length) || empty(&op2.length) {
                return true;
            }

            let (Some(start1), Some(start2), Some(length1), Some(length2)) =
                (&op1.start, &op2.start, &op1.length, &op2.length)
            else {
                return false;
            };

            // one region ends before the other starts.
            let ends_before = |length, start, other_start| {
                match (
                    knowledge.value_if_known_constant(length),
                    knowledge.difference_if_known_constant(other_start, start),
                ) {
                    (Some(length), Some(diff)) => {
                        length <= diff && length <= largest_positive() && diff <= largest_positive()
                    }
                    _ => false,
                }
            };
            ends_before(length1, start1, start2) || ends_before(length2, start2, start1)
        }
    }
}

/// Whether `covering` certainly overwrites everything `covered` touches.
pub fn known_covered(knowledge: &impl Knowledge, covered: &Operation, covering: &Operation) -> bool {
    if covered.location != covering.location {
        return false;
    }

    let same_start = covered.start.is_some() && covered.start == covering.start;
    let same_length = covered.length.is_some() && covered.length == covering.length;
    if same_start && (covered.location == Location::Storage || same_length) {
        return true;
    }
    if covered.location == Location::Storage {
        return false;
    }

    if let Some(length) = &covered.length {
        if knowledge.known_to_be_zero(length) {
            return true;
        }
    }

    // covering.start <= covered.start &&
    // covered.start + covered.length <= covering.start + covering.length
    let (Some(covered_start), Some(covering_start), Some(covered_length), Some(covering_length)) = (
        &covered.start,
        &covering.start,
        &covered.length,
        &covering.length,
    ) else {
        return false;
    };

    let start_diff = knowledge.difference_if_known_constant(covered_start, covering_start);
    let length_diff = knowledge.difference_if_known_constant(covering_length, covered_length);
    let covered_length = knowledge.value_if_known_constant(covered_length);

    match (start_diff, covered_length, length_diff) {
        (Some(start_diff), Some(covered_length), Some(length_diff)) => {
            start_diff <= largest_positive()
                && length_diff <= largest_positive()
                && start_diff <= length_diff
                && covered_length <= largest_positive()
        }
        _ => false,
    }
}
