/// Alert consolidation
///
/// Receives one event batch per check cycle and decides, under a single
/// lock, whether each event edits an earlier DOWN message or goes out as
/// part of a new grouped message.
pub mod consolidator;
pub mod format;


pub use consolidator::AlertConsolidator;
