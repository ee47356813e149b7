//! Interned frame descriptors.

use std::collections::HashMap;

use heapscope_common::Frame;

use crate::domain::errors::ReaderError;
use crate::domain::types::FrameId;

/// Id-to-frame map with value-level deduplication.
///
/// Two id spaces feed the registry. FRAME_INDEX records bind dense,
/// tracer-chosen ids. Line patching (see the reader) interns frames the
/// tracer never named; those draw from a counter starting at
/// [`FrameId::PATCHED_BASE`], so the spaces cannot collide. Whichever way
/// an id was assigned, no two ids ever map to equal frame values: the
/// reverse index is consulted before a new id is minted.
pub struct FrameRegistry {
    frames: HashMap<FrameId, Frame>,
    ids_by_frame: HashMap<Frame, FrameId>,
    next_patched: u64,
}

impl FrameRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: HashMap::new(),
            ids_by_frame: HashMap::new(),
            next_patched: FrameId::PATCHED_BASE.0,
        }
    }

    /// Bind a tracer-emitted id to a frame descriptor.
    ///
    /// # Errors
    /// Returns [`ReaderError::DuplicateFrameId`] if the id is already
    /// bound; a tracer never legitimately redefines a frame.
    pub fn insert(&mut self, id: FrameId, frame: Frame) -> Result<(), ReaderError> {
        if self.frames.contains_key(&id) {
            return Err(ReaderError::DuplicateFrameId(id));
        }
        self.ids_by_frame.entry(frame.clone()).or_insert(id);
        self.frames.insert(id, frame);
        Ok(())
    }

    /// Intern a frame by value, minting a fresh patched-range id only if
    /// no equal frame is known. The flag reports whether the id is new.
    pub fn get_or_assign(&mut self, frame: Frame) -> (FrameId, bool) {
        if let Some(&id) = self.ids_by_frame.get(&frame) {
            return (id, false);
        }
        let id = FrameId(self.next_patched);
        self.next_patched += 1;
        self.ids_by_frame.insert(frame.clone(), id);
        self.frames.insert(id, frame);
        (id, true)
    }

    #[must_use]
    pub fn get(&self, id: FrameId) -> Option<&Frame> {
        self.frames.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Default for FrameRegistry {
    fn default() -> Self {
        Self::new()
    }
}
