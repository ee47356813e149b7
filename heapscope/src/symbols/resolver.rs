//! Generational segment map and address lookup.

use std::collections::HashMap;

use heapscope_common::Segment;
use log::debug;

use super::dwarf::DwarfCache;
use super::ResolvedFrames;
use crate::domain::types::Generation;

/// One module announced by a SEGMENT_HEADER record: where it was loaded
/// and which ranges of it are mapped.
#[derive(Debug, Clone)]
struct LoadedModule {
    filename: String,
    load_address: u64,
    segments: Vec<Segment>,
}

impl LoadedModule {
    fn contains(&self, ip: u64) -> bool {
        self.segments.iter().any(|segment| {
            let start = self.load_address + segment.vaddr;
            ip >= start && ip < start + segment.memsz
        })
    }
}

/// The modules that make up one generation of the memory map.
#[derive(Debug, Clone, Default)]
struct SegmentMap {
    modules: Vec<LoadedModule>,
}

impl SegmentMap {
    fn locate(&self, ip: u64) -> Option<&LoadedModule> {
        // Later announcements shadow earlier ones.
        self.modules.iter().rev().find(|module| module.contains(ip))
    }
}

/// Maps native instruction pointers to resolved frames, versioned by
/// segment generation.
///
/// Every MEMORY_MAP_START bumps the generation and archives the segment
/// set it replaces, so allocations decoded before a map change can still
/// be symbolized correctly afterwards. Lookups under a generation that
/// was never reached return no result.
pub struct SymbolResolver {
    current: SegmentMap,
    generation: Generation,
    archive: HashMap<Generation, SegmentMap>,
    dwarf: DwarfCache,
}

impl SymbolResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: SegmentMap::default(),
            generation: Generation(0),
            archive: HashMap::new(),
            dwarf: DwarfCache::default(),
        }
    }

    #[must_use]
    pub fn current_generation(&self) -> Generation {
        self.generation
    }

    /// Drop the current segment set (archiving it under its generation)
    /// and start the next generation.
    pub fn clear_segments(&mut self) {
        let finished = std::mem::take(&mut self.current);
        debug!(
            "memory map cleared after generation {} ({} modules)",
            self.generation,
            finished.modules.len()
        );
        self.archive.insert(self.generation, finished);
        self.generation = Generation(self.generation.0 + 1);
    }

    /// Register a module's segments under the current generation.
    pub fn add_segments(&mut self, filename: String, load_address: u64, segments: Vec<Segment>) {
        self.current.modules.push(LoadedModule { filename, load_address, segments });
    }

    /// Resolve `ip` under the segment map that was current at
    /// `generation`. Returns `None` when the generation is unknown or no
    /// segment of that generation covers `ip`; a covered address whose
    /// binary cannot be symbolized resolves to an empty frame list.
    pub fn resolve(&mut self, ip: u64, generation: Generation) -> Option<ResolvedFrames> {
        let (filename, vaddr) = {
            let map = if generation == self.generation {
                &self.current
            } else {
                self.archive.get(&generation)?
            };
            let module = map.locate(ip)?;
            (module.filename.clone(), ip - module.load_address)
        };
        let frames = self.dwarf.resolve_in(&filename, vaddr);
        Some(ResolvedFrames { ip, frames })
    }
}

impl Default for SymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with_module(load_address: u64) -> SymbolResolver {
        let mut resolver = SymbolResolver::new();
        resolver.add_segments(
            "/nonexistent/libdemo.so".to_string(),
            load_address,
            vec![Segment { vaddr: 0x1000, memsz: 0x1000 }, Segment { vaddr: 0x4000, memsz: 0x100 }],
        );
        resolver
    }

    #[test]
    fn generation_starts_at_zero_and_increments_on_clear() {
        let mut resolver = SymbolResolver::new();
        assert_eq!(resolver.current_generation(), Generation(0));
        resolver.clear_segments();
        assert_eq!(resolver.current_generation(), Generation(1));
        resolver.clear_segments();
        assert_eq!(resolver.current_generation(), Generation(2));
    }

    #[test]
    fn locates_addresses_inside_mapped_ranges() {
        let mut resolver = resolver_with_module(0x7f00_0000_0000);

        // inside the first segment
        assert!(resolver.resolve(0x7f00_0000_1800, Generation(0)).is_some());
        // inside the second
        assert!(resolver.resolve(0x7f00_0000_4050, Generation(0)).is_some());
        // in the hole between them
        assert!(resolver.resolve(0x7f00_0000_3000, Generation(0)).is_none());
        // before the module entirely
        assert!(resolver.resolve(0x1000, Generation(0)).is_none());
    }

    #[test]
    fn stale_generations_resolve_from_the_archive() {
        let mut resolver = resolver_with_module(0x1_0000);
        resolver.clear_segments();
        resolver.add_segments(
            "/nonexistent/other.so".to_string(),
            0x9_0000,
            vec![Segment { vaddr: 0, memsz: 0x1000 }],
        );

        // the old mapping is gone from the current generation...
        assert!(resolver.resolve(0x1_1000, Generation(1)).is_none());
        // ...but still answers under its own
        let resolved = resolver.resolve(0x1_1000, Generation(0)).unwrap();
        assert_eq!(resolved.ip, 0x1_1000);
    }

    #[test]
    fn unknown_generation_is_no_result() {
        let mut resolver = resolver_with_module(0x1_0000);
        assert!(resolver.resolve(0x1_1000, Generation(7)).is_none());
    }

    #[test]
    fn later_modules_shadow_earlier_ones() {
        let mut resolver = SymbolResolver::new();
        resolver.add_segments(
            "/nonexistent/first.so".to_string(),
            0x1000,
            vec![Segment { vaddr: 0, memsz: 0x1000 }],
        );
        resolver.add_segments(
            "/nonexistent/second.so".to_string(),
            0x1000,
            vec![Segment { vaddr: 0, memsz: 0x1000 }],
        );

        let resolved = resolver.resolve(0x1800, Generation(0)).unwrap();
        // both modules are unreadable, so frames are empty either way;
        // the shadowing itself is what we can observe via locate()
        assert_eq!(resolved.ip, 0x1800);
        assert_eq!(
            resolver.current.locate(0x1800).map(|m| m.filename.as_str()),
            Some("/nonexistent/second.so")
        );
    }
}
