use log::debug;

use crate::control::{tracks, World};
use crate::error::{InterlockingError, Result};
use crate::topology::SegmentId;

/// Registers one physical train-detection event entering a segment. The
/// segment becomes occupied on the 0 -> 1 counter transition; further trains
/// on the same segment only raise the counter.
pub fn count_in(world: &mut World, segment: SegmentId) {
    let count = {
        let counter = world.state.occupancy.entry(segment).or_insert(0);
        *counter += 1;
        *counter
    };
    debug!(
        "detection count on {} now {}",
        world.topology.segment_name(segment),
        count
    );
    if count == 1 {
        tracks::occupy(world, segment);
    }
}

/// Registers one detection event leaving a segment; frees it on the 1 -> 0
/// transition. Counting out of a segment no train was counted into is an
/// internal consistency violation.
pub fn count_out(world: &mut World, segment: SegmentId) -> Result<()> {
    let count = match world.state.occupancy.get_mut(&segment) {
        Some(counter) if *counter > 0 => {
            *counter -= 1;
            *counter
        }
        _ => return Err(InterlockingError::UnknownSegmentOccupancy { segment }),
    };
    debug!(
        "detection count on {} now {}",
        world.topology.segment_name(segment),
        count
    );
    if count == 0 {
        tracks::free(world, segment)?;
    }
    Ok(())
}
