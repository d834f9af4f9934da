use ahash::AHashMap;
use parking_lot::Mutex;

use crate::engine::book::BookImage;
use crate::engine::types::{DeltaSet, InstrumentId, TopOfBook};

/// Per-instrument shadow books used as the "old" side of snapshot diffing.
///
/// Frames for different instruments may arrive from different connection
/// tasks, so every read-modify-write happens under one lock. Entries live until
/// `clear` (client teardown); the venue has no unsubscribe, so there is no
/// per-instrument removal.
#[derive(Debug, Default)]
pub struct ShadowStore {
    books: Mutex<AHashMap<InstrumentId, BookImage>>,
}

impl ShadowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instrument_id: &InstrumentId) -> Option<BookImage> {
        self.books.lock().get(instrument_id).cloned()
    }

    pub fn put(&self, instrument_id: InstrumentId, image: BookImage) {
        self.books.lock().insert(instrument_id, image);
    }

    pub fn contains(&self, instrument_id: &InstrumentId) -> bool {
        self.books.lock().contains_key(instrument_id)
    }

    /// Installs `new` as the shadow entry, handing `f` the previous image and
    /// the new one first. Get-old, compute, put-new is one atomic step per
    /// instrument.
    pub fn replace_with<R>(
        &self,
        instrument_id: &InstrumentId,
        new: BookImage,
        f: impl FnOnce(Option<&BookImage>, &BookImage) -> R,
    ) -> R {
        let mut books = self.books.lock();
        let result = f(books.get(instrument_id), &new);
        books.insert(instrument_id.clone(), new);
        result
    }

    /// Applies incremental deltas to a tracked book and returns its new top of
    /// book. Untracked instruments (no snapshot seen yet) are left alone.
    pub fn apply(&self, deltas: &DeltaSet) -> Option<TopOfBook> {
        let mut books = self.books.lock();
        let book = books.get_mut(&deltas.instrument_id)?;
        book.apply(deltas);
        Some(book.top_of_book())
    }

    pub fn len(&self) -> usize {
        self.books.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.lock().is_empty()
    }

    pub fn clear(&self) {
        self.books.lock().clear();
    }
}
