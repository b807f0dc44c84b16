pub mod gc_handle;
pub mod gc_heap;
pub mod heap_entry;
pub mod telemetry;

pub use gc_handle::CellRef;
pub use gc_heap::{GcHeap, HeapError};
pub use heap_entry::HeapEntry;
pub use telemetry::{CycleMetrics, GcStats};
