//! Effective-delta reduction of full book snapshots.
//!
//! A snapshot re-sends the whole book. Diffing it against the previous image
//! yields only the levels that actually changed, so downstream consumers see a
//! much smaller update for the common case of a snapshot that moves one or two
//! levels.

use std::collections::BTreeMap;

use itertools::{EitherOrBoth, Itertools};

use crate::engine::book::BookImage;
use crate::engine::types::{BookDelta, DeltaAction, DeltaSet, InstrumentId, Price, Side, Size};

/// Computes the minimal delta set that turns `old` into `new`.
///
/// A missing `old` is an empty book, so every level of `new` becomes an `Add`.
/// Records are ordered bids first then asks, ascending price within a side.
/// Neither image is modified; installing `new` as the shadow entry is the
/// caller's job.
pub fn reduce(old: Option<&BookImage>, new: &BookImage, instrument_id: &InstrumentId) -> DeltaSet {
    let empty = BookImage::new();
    let old = old.unwrap_or(&empty);

    let mut deltas = Vec::new();
    for side in [Side::Bid, Side::Ask] {
        reduce_side(instrument_id, side, old.side(side), new.side(side), &mut deltas);
    }
    DeltaSet::new(instrument_id.clone(), deltas, new.ts_ms)
}

// Both maps are price-sorted, so one merge pass compares them level by level
fn reduce_side(
    instrument_id: &InstrumentId,
    side: Side,
    old: &BTreeMap<Price, Size>,
    new: &BTreeMap<Price, Size>,
    out: &mut Vec<BookDelta>,
) {
    let delta = |action, price, size| BookDelta {
        instrument_id: instrument_id.clone(),
        action,
        side,
        price,
        size,
    };

    for pair in old.iter().merge_join_by(new.iter(), |(a, _), (b, _)| a.cmp(b)) {
        match pair {
            EitherOrBoth::Both((_, old_size), (&price, &size)) => {
                if *old_size != size {
                    out.push(delta(DeltaAction::Update, price, size));
                }
            }
            EitherOrBoth::Left((&price, _)) => out.push(delta(DeltaAction::Delete, price, 0)),
            EitherOrBoth::Right((&price, &size)) => out.push(delta(DeltaAction::Add, price, size)),
        }
    }
}

/// Full re-send of `book` as a snapshot delta set (used when reduction is disabled).
pub fn snapshot_deltas(book: &BookImage, instrument_id: &InstrumentId) -> DeltaSet {
    let mut deltas = Vec::with_capacity(book.len());
    for side in [Side::Bid, Side::Ask] {
        deltas.extend(book.side(side).iter().map(|(&price, &size)| BookDelta {
            instrument_id: instrument_id.clone(),
            action: DeltaAction::Add,
            side,
            price,
            size,
        }));
    }
    let mut set = DeltaSet::new(instrument_id.clone(), deltas, book.ts_ms);
    set.is_snapshot = true;
    set
}
