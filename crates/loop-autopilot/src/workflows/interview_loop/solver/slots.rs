use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::CandidateAvailabilityBlock;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// Fixed-width slice of candidate availability; `date_key` is the UTC date of `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub date_key: NaiveDate,
}

/// Discretizes availability into epoch-aligned slots of `granularity_minutes`.
///
/// Each block's start is snapped up to the next multiple of the granularity counted from the
/// Unix epoch, then slots are emitted while they still fit inside the block. Slots repeated by
/// overlapping blocks are emitted once. The result is sorted by start.
pub fn generate_slots(
    blocks: &[CandidateAvailabilityBlock],
    granularity_minutes: u32,
) -> Vec<CandidateSlot> {
    let step = i64::from(granularity_minutes.max(1)) * MILLIS_PER_MINUTE;
    let mut slots = Vec::new();

    for block in blocks {
        let block_end = block.end_at.timestamp_millis();
        let mut cursor = snap_up(block.start_at.timestamp_millis(), step);

        while cursor + step <= block_end {
            let (Some(start), Some(end)) = (
                DateTime::from_timestamp_millis(cursor),
                DateTime::from_timestamp_millis(cursor + step),
            ) else {
                break;
            };

            slots.push(CandidateSlot {
                start,
                end,
                date_key: start.date_naive(),
            });
            cursor += step;
        }
    }

    slots.sort_by_key(|slot| slot.start);
    slots.dedup_by_key(|slot| slot.start);
    slots
}

fn snap_up(millis: i64, step: i64) -> i64 {
    match millis.rem_euclid(step) {
        0 => millis,
        remainder => millis - remainder + step,
    }
}
