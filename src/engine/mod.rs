// Synchronous book logic: nothing in here awaits
pub mod types;
pub mod book;
pub mod deltas;
pub mod shadow;
pub mod quotes;
