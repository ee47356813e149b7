//! # Native symbol resolution
//!
//! Converts raw return addresses from the tracer's native stacks into
//! function names, file paths, and line numbers using DWARF debug
//! information.
//!
//! The traced process can load and unload shared objects while the
//! capture runs, so the address-to-module mapping is *generational*: the
//! tracer re-announces the whole memory map after each change, the reader
//! bumps a generation counter on every re-announcement, and every
//! allocation remembers the generation that was current when it was
//! decoded. Resolution always happens under the allocation's own
//! generation, never under whatever map happens to be current.
//!
//! - [`resolver`]: segment bookkeeping, generations, address lookup
//! - [`dwarf`]: per-binary `addr2line` contexts with a symbol-table
//!   fallback, behind a load-once cache

pub mod dwarf;
pub mod resolver;

pub use resolver::SymbolResolver;

/// One source-level frame of a resolved native address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame {
    pub function: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

/// A resolved native address: the instruction pointer plus its frames,
/// innermost first. Inlining can make one address carry several frames;
/// an address inside a module with no usable debug info carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrames {
    pub ip: u64,
    pub frames: Vec<ResolvedFrame>,
}
