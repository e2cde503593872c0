/// Turno core: shift-production report model, local storage adapter,
/// report editing, and the local/remote synchronization subsystem.
pub mod config;
pub mod export;
pub mod key;
pub mod report;
pub mod storage;
pub mod sync;
pub mod timeline;
pub mod types;
