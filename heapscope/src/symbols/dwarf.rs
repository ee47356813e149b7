//! DWARF lookup contexts for the binaries named by segment records.
//!
//! Each distinct module filename gets at most one load attempt; a binary
//! that is missing on the analyzing machine, stripped, or unparseable is
//! remembered as unresolvable and never retried. Addresses handed in here
//! are link-time virtual addresses (the resolver already subtracted the
//! module's load address).

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianArcSlice, RunTimeEndian};
use log::warn;
use object::{Object, ObjectSection};
use rustc_demangle::demangle;

use super::ResolvedFrame;

/// Lookup state for one binary: the DWARF context, the (sorted) symbol
/// table fallback, and a per-address result cache.
pub(crate) struct ModuleContext {
    ctx: Context<EndianArcSlice<RunTimeEndian>>,
    symbols: Vec<(u64, String)>,
    resolved: HashMap<u64, Vec<ResolvedFrame>>,
}

impl ModuleContext {
    fn load(path: &str) -> Result<Self> {
        let binary_data = fs::read(path).with_context(|| format!("failed to read {path}"))?;
        let obj_file = object::File::parse(&*binary_data).context("failed to parse object file")?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianArcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(Cow::Borrowed(&[][..]));
                Ok(EndianArcSlice::new(Arc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("failed to load DWARF debug information")?;

        let mut symbols: Vec<(u64, String)> = obj_file
            .symbol_map()
            .symbols()
            .iter()
            .map(|symbol| (symbol.address(), symbol.name().to_string()))
            .collect();
        symbols.sort_unstable_by_key(|&(address, _)| address);

        Ok(Self { ctx, symbols, resolved: HashMap::new() })
    }

    /// Resolve a link-time virtual address to its (possibly inlined)
    /// source frames, innermost first.
    fn resolve(&mut self, vaddr: u64) -> Vec<ResolvedFrame> {
        if let Some(cached) = self.resolved.get(&vaddr) {
            return cached.clone();
        }

        let mut frames = Vec::new();
        if let Ok(mut frame_iter) = self.ctx.find_frames(vaddr).skip_all_loads() {
            while let Ok(Some(frame)) = frame_iter.next() {
                let function = frame
                    .function
                    .and_then(|f| f.demangle().ok().map(|name| name.to_string()));
                let (file, line) = frame
                    .location
                    .map(|loc| (loc.file.map(str::to_string), loc.line))
                    .unwrap_or((None, None));

                if let Some(function) = function.or_else(|| self.nearest_symbol(vaddr)) {
                    frames.push(ResolvedFrame { function, file, line });
                }
            }
        }

        // No line-table coverage; fall back to the symbol table alone.
        if frames.is_empty() {
            if let Some(function) = self.nearest_symbol(vaddr) {
                frames.push(ResolvedFrame { function, file: None, line: None });
            }
        }

        self.resolved.insert(vaddr, frames.clone());
        frames
    }

    fn nearest_symbol(&self, vaddr: u64) -> Option<String> {
        let at = self.symbols.partition_point(|&(address, _)| address <= vaddr);
        let (_, name) = self.symbols.get(at.checked_sub(1)?)?;
        Some(format!("{:#}", demangle(name)))
    }
}

/// Load-once cache of [`ModuleContext`]s keyed by module filename.
#[derive(Default)]
pub(crate) struct DwarfCache {
    modules: HashMap<String, Option<ModuleContext>>,
}

impl DwarfCache {
    pub(crate) fn resolve_in(&mut self, filename: &str, vaddr: u64) -> Vec<ResolvedFrame> {
        let module = self
            .modules
            .entry(filename.to_string())
            .or_insert_with(|| match ModuleContext::load(filename) {
                Ok(module) => Some(module),
                Err(err) => {
                    warn!("cannot symbolize addresses in {filename}: {err:#}");
                    None
                }
            });
        match module {
            Some(module) => module.resolve(vaddr),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_module_resolves_to_nothing_and_is_not_retried() {
        let mut cache = DwarfCache::default();
        assert!(cache.resolve_in("/nonexistent/lib.so", 0x1000).is_empty());
        assert!(cache.resolve_in("/nonexistent/lib.so", 0x2000).is_empty());
        assert_eq!(cache.modules.len(), 1);
    }

    #[test]
    fn resolves_symbols_in_own_binary() {
        // The test binary itself is the one ELF we always have on disk.
        let exe = std::env::current_exe().unwrap();
        let mut cache = DwarfCache::default();

        let Some(module) = cache
            .modules
            .entry(exe.to_string_lossy().into_owned())
            .or_insert_with(|| ModuleContext::load(&exe.to_string_lossy()).ok())
        else {
            // Stripped test environments are allowed to bail here.
            return;
        };

        let probe = module.symbols.iter().map(|&(address, _)| address).find(|&address| address != 0);
        if let Some(address) = probe {
            let frames = module.resolve(address);
            assert!(frames.iter().all(|frame| !frame.function.is_empty()));
        }
    }
}
