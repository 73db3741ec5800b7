/// Storage layer.
///
/// One log segment is two files:
/// - Store: length-prefixed record frames, buffered appends, positional reads
/// - Index: memory-mapped fixed-width entries, entry number → store position
///
/// Segment composes the two and is the only place that sequences them.
///
/// Not implemented here:
/// - Multi-segment logs (rollover, retention)
/// - Compaction, compression, replication
pub mod encoding;
pub mod index;
pub mod segment;
pub mod store;
