//! Timeline projection.
//!
//! Pure function of the raw timeline: for every snapshot, find the next
//! meaningful state reachable by continuing execution in the same frame.
//! Loop markers pass through unchanged.

use crate::lang::ast::Statement;

use super::{Event, Snapshot, Timeline};

/// Project a raw timeline into, per location, the reachable next states.
///
/// A candidate successor is the first later snapshot of the identical frame.
/// It is accepted only if it carries an exception marker, or the current
/// line is not a loop header, or the candidate's line is indented strictly
/// deeper than the current line (the loop actually entered its body rather
/// than re-testing the header). Exception-marked successors are accepted
/// regardless of indentation; that asymmetry is long-standing behavior and
/// is preserved as-is.
pub fn project(timeline: &Timeline, statements: &[Statement]) -> Timeline {
    let mut by_time: std::collections::BTreeMap<u64, &Snapshot> = Default::default();
    for snapshot in timeline.snapshots() {
        by_time.insert(snapshot.time, snapshot);
    }

    let mut projected = Timeline::default();
    for (loc, events) in &timeline.entries {
        let mut out = Vec::new();
        for event in events {
            match event {
                Event::Marker(_) => out.push(event.clone()),
                Event::Snapshot(current) => {
                    let mut next_time = current.time + 1;
                    while let Some(candidate) = by_time.get(&next_time) {
                        if candidate.frame == current.frame {
                            if accepts(current, candidate, statements) {
                                out.push(Event::Snapshot((*candidate).clone()));
                            }
                            break;
                        }
                        next_time += 1;
                    }
                }
            }
        }
        projected.entries.insert(*loc, out);
    }
    projected
}

fn accepts(current: &Snapshot, candidate: &Snapshot, statements: &[Statement]) -> bool {
    if candidate.is_exception() {
        return true;
    }
    let curr_stmt = &statements[current.location.line()];
    if !curr_stmt.is_loop_header() {
        return true;
    }
    let cand_stmt = &statements[candidate.location.line()];
    cand_stmt.indent > curr_stmt.indent
}
