// Market data module entrypoint
pub mod adapters;     // venue transports + wire types
pub mod normaliser;   // converts strings -> ticks/lots
pub mod parser;       // frames -> venue events
pub mod instruments;  // venue ids -> instrument ids
pub mod sink;         // where normalized events go
pub mod error;
pub mod connections;  // batched, staggered transport connections
pub mod feed;         // shadow books, effective deltas, quote dedup
pub mod client;       // subscribe/request surface
pub mod router;       // wires everything together for the binary
