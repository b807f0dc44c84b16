use std::{collections::VecDeque, rc::Rc, time::Instant};

use lasso::Spur;

use crate::runtime::{
    config::VmConfig,
    gc::{
        gc_handle::CellRef,
        heap_entry::HeapEntry,
        telemetry::{CycleMetrics, GcStats},
    },
    value::{CellKind, Scalar, Tag},
};

pub const DEFAULT_ARENA_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    #[error("heap exhausted: {arenas} arenas in use and growth is not allowed")]
    Exhausted { arenas: usize },
}

/// Arena-backed cell heap with a stop-the-world mark-and-sweep collector.
///
/// Cells live in fixed-size arenas that are never released, so a `CellRef`
/// stays valid for as long as the cell is reachable. Reclaimed cells are
/// threaded onto an index-based free list; a new arena is only added when
/// that list is empty.
pub struct GcHeap {
    arenas: Vec<Vec<HeapEntry>>,
    arena_size: usize,
    max_arenas: Option<usize>,
    free_head: CellRef,
    free_count: usize,
    allocation_count: usize,
    gc_threshold: usize,
    gc_enabled: bool,
    total_collections: usize,
    total_allocations: usize,
    last_cycle: Option<CycleMetrics>,
}

impl Default for GcHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl GcHeap {
    /// Creates an empty heap with default settings.
    ///
    /// Defaults:
    /// - arena size: `1024` cells
    /// - unbounded arena growth
    /// - collection enabled, threshold `0` (collect whenever asked)
    pub fn new() -> Self {
        Self::with_arena_size(DEFAULT_ARENA_SIZE)
    }

    pub fn with_arena_size(arena_size: usize) -> Self {
        Self {
            arenas: Vec::new(),
            arena_size: arena_size.max(1),
            max_arenas: None,
            free_head: CellRef::NULL,
            free_count: 0,
            allocation_count: 0,
            gc_threshold: 0,
            gc_enabled: true,
            total_collections: 0,
            total_allocations: 0,
            last_cycle: None,
        }
    }

    pub fn from_config(config: &VmConfig) -> Self {
        let mut heap = Self::with_arena_size(config.arena_size);
        heap.max_arenas = config.max_arenas;
        heap.gc_enabled = config.gc_enabled;
        heap.gc_threshold = config.gc_threshold;
        heap
    }

    /// Enables or disables collection checks.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.gc_enabled = enabled
    }

    /// Sets how many allocations must happen between two collections.
    pub fn set_threshold(&mut self, threshold: usize) {
        self.gc_threshold = threshold
    }

    /// Caps arena growth. `None` lets the heap grow without bound.
    pub fn set_max_arenas(&mut self, max_arenas: Option<usize>) {
        self.max_arenas = max_arenas
    }

    /// Returns `true` when collection is enabled and the threshold was reached.
    pub fn should_collect(&self) -> bool {
        self.gc_enabled && self.allocation_count >= self.gc_threshold
    }

    // -----------------------------------------------------------------------
    // Allocation
    // -----------------------------------------------------------------------

    /// Allocates a cell holding `kind`.
    ///
    /// The free list is consulted first; a new arena is carved only when it is
    /// empty. Fails once the arena cap is reached.
    pub fn alloc(&mut self, kind: CellKind) -> Result<CellRef, HeapError> {
        if self.free_head.is_null() {
            self.grow()?;
        }

        let cell = self.free_head;
        let entry = self
            .entry_mut(cell)
            .ok_or(HeapError::Exhausted { arenas: 0 })?;
        let next = match entry.kind {
            CellKind::Free { next } => next,
            _ => CellRef::NULL,
        };
        *entry = HeapEntry::new(kind);

        self.free_head = next;
        self.free_count -= 1;
        self.allocation_count += 1;
        self.total_allocations += 1;
        Ok(cell)
    }

    pub fn cons(&mut self, car: CellRef, cdr: CellRef) -> Result<CellRef, HeapError> {
        self.alloc(CellKind::Pair { car, cdr })
    }

    pub fn alloc_scalar(&mut self, scalar: Scalar) -> Result<CellRef, HeapError> {
        self.alloc(CellKind::Scalar(scalar))
    }

    pub fn integer(&mut self, value: i64) -> Result<CellRef, HeapError> {
        self.alloc_scalar(Scalar::Integer(value))
    }

    /// Builds a proper list back to front, starting from the null terminator.
    pub fn list(&mut self, items: &[CellRef]) -> Result<CellRef, HeapError> {
        self.list_with_tail(items, CellRef::NULL)
    }

    pub fn list_with_tail(
        &mut self,
        items: &[CellRef],
        tail: CellRef,
    ) -> Result<CellRef, HeapError> {
        let mut list = tail;
        for item in items.iter().rev() {
            list = self.cons(*item, list)?;
        }
        Ok(list)
    }

    fn grow(&mut self) -> Result<(), HeapError> {
        if let Some(max) = self.max_arenas {
            if self.arenas.len() >= max {
                return Err(HeapError::Exhausted {
                    arenas: self.arenas.len(),
                });
            }
        }

        let base = self.arenas.len() * self.arena_size;
        let mut arena = Vec::with_capacity(self.arena_size);
        for i in 0..self.arena_size {
            let next = if i + 1 < self.arena_size {
                CellRef::from_slot(base + i + 1)
            } else {
                self.free_head
            };
            arena.push(HeapEntry::new(CellKind::Free { next }));
        }
        self.arenas.push(arena);
        self.free_head = CellRef::from_slot(base);
        self.free_count += self.arena_size;

        log::debug!(
            "heap grew to {} arenas ({} cells)",
            self.arenas.len(),
            self.capacity()
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    fn locate(&self, cell: CellRef) -> Option<(usize, usize)> {
        let slot = cell.slot()?;
        let arena = slot / self.arena_size;
        (arena < self.arenas.len()).then_some((arena, slot % self.arena_size))
    }

    /// Returns the arena entry behind a handle, or `None` for null and
    /// out-of-range handles.
    pub fn entry(&self, cell: CellRef) -> Option<&HeapEntry> {
        let (arena, offset) = self.locate(cell)?;
        Some(&self.arenas[arena][offset])
    }

    fn entry_mut(&mut self, cell: CellRef) -> Option<&mut HeapEntry> {
        let (arena, offset) = self.locate(cell)?;
        Some(&mut self.arenas[arena][offset])
    }

    pub fn kind(&self, cell: CellRef) -> Option<&CellKind> {
        self.entry(cell).map(HeapEntry::kind)
    }

    pub fn is_pair(&self, cell: CellRef) -> bool {
        self.kind(cell).is_some_and(CellKind::is_pair)
    }

    /// Tag of a non-pair value. Null reports `Tag::Null`; pairs have no tag.
    pub fn tag(&self, cell: CellRef) -> Option<Tag> {
        if cell.is_null() {
            return Some(Tag::Null);
        }
        self.kind(cell)?.tag()
    }

    pub fn is_free(&self, cell: CellRef) -> bool {
        self.entry(cell).is_some_and(HeapEntry::is_free)
    }

    pub fn is_marked(&self, cell: CellRef) -> bool {
        self.entry(cell).is_some_and(HeapEntry::is_marked)
    }

    pub fn set_marked(&mut self, cell: CellRef) {
        if let Some(entry) = self.entry_mut(cell) {
            entry.marked = true;
        }
    }

    pub fn clear_marked(&mut self, cell: CellRef) {
        if let Some(entry) = self.entry_mut(cell) {
            entry.marked = false;
        }
    }

    /// Overwrites a live cell with a new scalar; the mark flag comes out clear.
    pub fn set_scalar(&mut self, cell: CellRef, scalar: Scalar) -> bool {
        match self.entry_mut(cell) {
            Some(entry) if !entry.is_free() => {
                entry.set_scalar(scalar);
                true
            }
            _ => false,
        }
    }

    pub fn scalar(&self, cell: CellRef) -> Option<&Scalar> {
        match self.kind(cell)? {
            CellKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn car(&self, cell: CellRef) -> Option<CellRef> {
        match self.kind(cell)? {
            CellKind::Pair { car, .. } => Some(*car),
            _ => None,
        }
    }

    pub fn cdr(&self, cell: CellRef) -> Option<CellRef> {
        match self.kind(cell)? {
            CellKind::Pair { cdr, .. } => Some(*cdr),
            _ => None,
        }
    }

    pub fn set_car(&mut self, cell: CellRef, value: CellRef) -> bool {
        match self.entry_mut(cell).map(|e| &mut e.kind) {
            Some(CellKind::Pair { car, .. }) => {
                *car = value;
                true
            }
            _ => false,
        }
    }

    pub fn set_cdr(&mut self, cell: CellRef, value: CellRef) -> bool {
        match self.entry_mut(cell).map(|e| &mut e.kind) {
            Some(CellKind::Pair { cdr, .. }) => {
                *cdr = value;
                true
            }
            _ => false,
        }
    }

    pub fn as_integer(&self, cell: CellRef) -> Option<i64> {
        match self.scalar(cell)? {
            Scalar::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_symbol(&self, cell: CellRef) -> Option<Spur> {
        match self.scalar(cell)? {
            Scalar::Symbol(spur) => Some(*spur),
            _ => None,
        }
    }

    /// Collects the elements of a proper list. Returns `None` when the chain
    /// does not end in null.
    pub fn list_to_vec(&self, mut list: CellRef) -> Option<Vec<CellRef>> {
        let mut items = Vec::new();
        while !list.is_null() {
            match self.kind(list)? {
                CellKind::Pair { car, cdr } => {
                    items.push(*car);
                    list = *cdr;
                }
                _ => return None,
            }
        }
        Some(items)
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    pub fn arena_count(&self) -> usize {
        self.arenas.len()
    }

    pub fn capacity(&self) -> usize {
        self.arenas.len() * self.arena_size
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Returns the number of cells currently holding a pair or scalar.
    pub fn live_count(&self) -> usize {
        self.capacity() - self.free_count
    }

    pub fn total_allocations(&self) -> usize {
        self.total_allocations
    }

    pub fn total_collections(&self) -> usize {
        self.total_collections
    }

    pub fn last_cycle(&self) -> Option<&CycleMetrics> {
        self.last_cycle.as_ref()
    }

    pub fn stats(&self) -> GcStats {
        GcStats {
            arenas: self.arena_count(),
            capacity: self.capacity(),
            live: self.live_count(),
            free: self.free_count,
            total_allocations: self.total_allocations,
            total_collections: self.total_collections,
            last_freed: self.last_cycle.as_ref().map_or(0, |c| c.freed),
        }
    }

    // -----------------------------------------------------------------------
    // Collection
    // -----------------------------------------------------------------------

    /// Runs a full mark-and-sweep cycle from the given root set.
    ///
    /// The caller owns root enumeration: every cell it does not pass (and that
    /// is not reachable from one it passes) is returned to the free list.
    /// Nothing moves, so surviving handles stay valid.
    pub fn collect<I>(&mut self, roots: I) -> CycleMetrics
    where
        I: IntoIterator<Item = CellRef>,
    {
        let started = Instant::now();
        let mut metrics = CycleMetrics {
            cycle_index: self.total_collections,
            ..CycleMetrics::default()
        };

        let mut queue = VecDeque::with_capacity(64);
        for root in roots {
            metrics.roots += 1;
            self.enqueue(root, &mut queue, &mut metrics);
        }

        let mut children = Vec::with_capacity(16);
        while let Some(cell) = queue.pop_front() {
            self.push_children(cell, &mut children);
            for child in children.drain(..) {
                self.enqueue(child, &mut queue, &mut metrics);
            }
        }

        self.sweep(&mut metrics);

        metrics.duration = started.elapsed();
        self.total_collections += 1;
        self.allocation_count = 0;

        log::debug!(
            "gc cycle {}: {} roots, {} marked, {} freed, {} live in {:?}",
            metrics.cycle_index,
            metrics.roots,
            metrics.marked,
            metrics.freed,
            self.live_count(),
            metrics.duration
        );
        self.last_cycle = Some(metrics.clone());
        metrics
    }

    // Marks on first visit so shared and cyclic structure is queued once.
    fn enqueue(&mut self, cell: CellRef, queue: &mut VecDeque<CellRef>, metrics: &mut CycleMetrics) {
        let Some(entry) = self.entry_mut(cell) else {
            return;
        };
        if entry.marked || entry.is_free() {
            return;
        }
        entry.marked = true;
        metrics.marked += 1;
        queue.push_back(cell);
    }

    fn push_children(&self, cell: CellRef, children: &mut Vec<CellRef>) {
        let Some(kind) = self.kind(cell) else {
            return;
        };
        match kind {
            CellKind::Pair { car, cdr } => {
                children.push(*car);
                children.push(*cdr);
            }
            CellKind::Scalar(Scalar::Function(info) | Scalar::Macro(info)) => {
                let info = Rc::clone(info);
                children.push(info.name);
                children.extend_from_slice(&info.constants);
                children.push(info.module);
            }
            // Module bindings are enumerated as roots, never traced through the cell.
            CellKind::Scalar(Scalar::Module(_)) => {}
            CellKind::Scalar(
                Scalar::Integer(_) | Scalar::Symbol(_) | Scalar::NativeFunction(_),
            ) => {}
            CellKind::Free { .. } => {}
        }
    }

    fn sweep(&mut self, metrics: &mut CycleMetrics) {
        let arena_size = self.arena_size;
        for (a, arena) in self.arenas.iter_mut().enumerate() {
            for (offset, entry) in arena.iter_mut().enumerate() {
                if entry.is_free() {
                    continue;
                }
                if entry.marked {
                    entry.marked = false;
                    metrics.record_survivor(entry.kind.tag());
                } else {
                    entry.kind = CellKind::Free {
                        next: self.free_head,
                    };
                    self.free_head = CellRef::from_slot(a * arena_size + offset);
                    self.free_count += 1;
                    metrics.freed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::runtime::{
        compiled_function::FunctionInfo,
        gc::{
            gc_handle::CellRef,
            gc_heap::{GcHeap, HeapError},
        },
        module::ModuleId,
        value::{CellKind, Scalar, Tag},
    };

    fn function_info(name: CellRef, constants: Vec<CellRef>, module: CellRef) -> FunctionInfo {
        FunctionInfo {
            name,
            param_count: 0,
            has_rest: false,
            slot_count: 0,
            constants,
            instructions: vec![],
            module,
        }
    }

    #[test]
    fn test_alloc_and_get() {
        let mut heap = GcHeap::new();
        let one = heap.integer(1).unwrap();
        let pair = heap.cons(one, CellRef::NULL).unwrap();

        assert!(heap.is_pair(pair));
        assert_eq!(heap.car(pair), Some(one));
        assert_eq!(heap.cdr(pair), Some(CellRef::NULL));
        assert_eq!(heap.as_integer(one), Some(1));
        assert_eq!(heap.live_count(), 2);
    }

    #[test]
    fn test_null_is_never_a_heap_cell() {
        let mut heap = GcHeap::with_arena_size(4);
        for _ in 0..8 {
            assert!(!heap.integer(0).unwrap().is_null());
        }
        assert_eq!(heap.tag(CellRef::NULL), Some(Tag::Null));
        assert!(heap.entry(CellRef::NULL).is_none());
    }

    #[test]
    fn test_tag_round_trip() {
        let mut heap = GcHeap::new();
        let name = heap.integer(0).unwrap();
        let scalars = [
            Scalar::Integer(-7),
            Scalar::Integer(i64::MAX),
            Scalar::Module(ModuleId(3)),
            Scalar::Function(Rc::new(function_info(name, vec![], CellRef::NULL))),
            Scalar::Macro(Rc::new(function_info(name, vec![], CellRef::NULL))),
        ];
        for scalar in scalars {
            let expected = scalar.tag();
            let cell = heap.alloc_scalar(scalar).unwrap();
            assert_eq!(heap.tag(cell), Some(expected));
            assert!(!heap.is_pair(cell));
        }

        let pair = heap.cons(name, name).unwrap();
        assert!(heap.is_pair(pair));
        assert_eq!(heap.tag(pair), None);
    }

    #[test]
    fn test_mark_idempotence() {
        let mut heap = GcHeap::new();
        let int = heap.integer(42).unwrap();
        let pair = heap.cons(int, CellRef::NULL).unwrap();

        for cell in [int, pair] {
            let was_pair = heap.is_pair(cell);
            let tag = heap.tag(cell);
            heap.set_marked(cell);
            assert!(heap.is_marked(cell));
            assert_eq!(heap.is_pair(cell), was_pair);
            heap.clear_marked(cell);
            assert!(!heap.is_marked(cell));
            assert_eq!(heap.tag(cell), tag);
        }
        assert_eq!(heap.as_integer(int), Some(42));
        assert_eq!(heap.car(pair), Some(int));
    }

    #[test]
    fn test_set_scalar_clears_mark() {
        let mut heap = GcHeap::new();
        let cell = heap.integer(1).unwrap();
        heap.set_marked(cell);
        assert!(heap.set_scalar(cell, Scalar::Integer(2)));
        assert!(!heap.is_marked(cell));
        assert_eq!(heap.as_integer(cell), Some(2));
    }

    #[test]
    fn test_collect_frees_unreachable() {
        let mut heap = GcHeap::new();
        for i in 0..100 {
            heap.integer(i).unwrap();
        }
        assert_eq!(heap.live_count(), 100);

        let metrics = heap.collect([]);
        assert_eq!(metrics.freed, 100);
        assert_eq!(heap.live_count(), 0);
        assert_eq!(heap.free_count(), heap.capacity());
    }

    #[test]
    fn test_collect_traces_nested_cons() {
        let mut heap = GcHeap::new();
        let one = heap.integer(1).unwrap();
        let two = heap.integer(2).unwrap();
        let inner = heap.cons(two, CellRef::NULL).unwrap();
        let outer = heap.cons(one, inner).unwrap();
        for _ in 0..10 {
            heap.integer(99).unwrap();
        }

        heap.collect([outer]);
        assert_eq!(heap.live_count(), 4);
        assert_eq!(heap.car(outer), Some(one));
        assert_eq!(heap.cdr(outer), Some(inner));
        assert_eq!(heap.as_integer(two), Some(2));
        assert!(!heap.is_marked(outer));
    }

    #[test]
    fn test_collect_terminates_on_cycles() {
        let mut heap = GcHeap::new();
        let a = heap.cons(CellRef::NULL, CellRef::NULL).unwrap();
        let b = heap.cons(a, a).unwrap();
        assert!(heap.set_cdr(a, b));
        assert!(heap.set_car(a, a));

        let metrics = heap.collect([a]);
        assert_eq!(metrics.marked, 2);
        assert_eq!(heap.live_count(), 2);

        heap.collect([]);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn test_function_cell_keeps_constants_name_and_module() {
        let mut heap = GcHeap::new();
        let name = heap.integer(0).unwrap();
        let constant = heap.integer(5).unwrap();
        let module = heap.alloc_scalar(Scalar::Module(ModuleId(0))).unwrap();
        let info = function_info(name, vec![constant], module);
        let function = heap.alloc_scalar(Scalar::Function(Rc::new(info))).unwrap();
        heap.integer(77).unwrap();

        heap.collect([function]);
        assert_eq!(heap.live_count(), 4);
        assert_eq!(heap.as_integer(constant), Some(5));
        assert_eq!(heap.tag(module), Some(Tag::Module));
    }

    #[test]
    fn test_swept_cells_are_tagged_free() {
        let mut heap = GcHeap::new();
        let cell = heap.integer(3).unwrap();
        heap.collect([]);
        assert!(heap.is_free(cell));
        assert_eq!(heap.tag(cell), Some(Tag::Free));
        assert!(matches!(heap.kind(cell), Some(CellKind::Free { .. })));
    }

    #[test]
    fn test_free_list_reuse() {
        let mut heap = GcHeap::with_arena_size(8);
        let cells: Vec<_> = (0..8).map(|i| heap.integer(i).unwrap()).collect();
        assert_eq!(heap.arena_count(), 1);

        heap.collect(cells[..5].iter().copied());
        assert_eq!(heap.free_count(), 3);

        let mut reused: Vec<_> = (0..3).map(|_| heap.integer(9).unwrap()).collect();
        reused.sort();
        assert_eq!(reused, cells[5..].to_vec());
        assert_eq!(heap.arena_count(), 1);
    }

    #[test]
    fn test_grows_only_when_free_list_empty() {
        let mut heap = GcHeap::with_arena_size(4);
        for i in 0..4 {
            heap.integer(i).unwrap();
        }
        assert_eq!(heap.arena_count(), 1);
        assert_eq!(heap.free_count(), 0);

        heap.integer(4).unwrap();
        assert_eq!(heap.arena_count(), 2);
        assert_eq!(heap.free_count(), 3);
    }

    #[test]
    fn test_exhaustion_when_growth_capped() {
        let mut heap = GcHeap::with_arena_size(2);
        heap.set_max_arenas(Some(1));
        heap.integer(1).unwrap();
        heap.integer(2).unwrap();
        assert_eq!(
            heap.integer(3).unwrap_err(),
            HeapError::Exhausted { arenas: 1 }
        );

        // A collection makes room again without growing.
        heap.collect([]);
        assert!(heap.integer(3).is_ok());
        assert_eq!(heap.arena_count(), 1);
    }

    #[test]
    fn test_should_collect_respects_threshold() {
        let mut heap = GcHeap::new();
        heap.set_threshold(5);
        assert!(!heap.should_collect());
        for i in 0..5 {
            heap.integer(i).unwrap();
        }
        assert!(heap.should_collect());
        heap.collect([]);
        assert!(!heap.should_collect());
    }

    #[test]
    fn test_should_collect_respects_enabled() {
        let mut heap = GcHeap::new();
        assert!(heap.should_collect());
        heap.set_enabled(false);
        assert!(!heap.should_collect());
    }

    #[test]
    fn test_list_to_vec_rejects_improper_lists() {
        let mut heap = GcHeap::new();
        let a = heap.integer(1).unwrap();
        let b = heap.integer(2).unwrap();
        let proper = heap.list(&[a, b]).unwrap();
        let improper = heap.cons(a, b).unwrap();

        assert_eq!(heap.list_to_vec(proper), Some(vec![a, b]));
        assert_eq!(heap.list_to_vec(improper), None);
        assert_eq!(heap.list_to_vec(CellRef::NULL), Some(vec![]));
    }

    #[test]
    fn test_stress_100k_allocations() {
        let mut heap = GcHeap::with_arena_size(256);
        heap.set_threshold(1024);

        let mut live = heap.integer(0).unwrap();
        for i in 1..100_000i64 {
            heap.integer(i).unwrap();
            if heap.should_collect() {
                heap.collect([live]);
            }
            if i % 10_000 == 0 {
                live = heap.integer(i).unwrap();
            }
        }

        heap.collect([live]);
        assert_eq!(heap.live_count(), 1);
        assert!(heap.total_collections() > 0);
        assert!(heap.arena_count() <= 6, "arenas: {}", heap.arena_count());
    }
}
