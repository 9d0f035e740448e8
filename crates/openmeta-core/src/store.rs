//! Arena-backed metadata store.
//!
//! Decoders write blocks and entries in a single pass; consumers call
//! [`MetaStore::finalize`] once and then iterate. Entries are never removed:
//! the dedupe pass only marks losers [`EntryFlags::DELETED`], which keeps
//! every previously returned [`EntryId`] valid for the store's lifetime.

use crate::{ByteArena, ByteSpan, MetaKey, MetaValue, WireType};

/// Dense index into the store's block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct BlockId(u32);

impl BlockId {
    /// Sentinel for synthetic entries with no backing block.
    pub const INVALID: BlockId = BlockId(u32::MAX);

    /// True unless this is the invalid sentinel.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense index into the store's entry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct EntryId(u32);

impl EntryId {
    /// Raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Provenance record for a group of entries emitted together.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct BlockInfo {
    /// Interned IFD token naming the directory (`ifd0`, `exif`,
    /// `mk_sony_tag9050_0`, ...).
    pub token: ByteSpan,
    /// Enclosing block, or [`BlockId::INVALID`] for roots.
    pub parent: BlockId,
    /// Offset of the directory in the stream it was decoded from.
    pub wire_offset: u64,
    /// True for derived tables synthesised by a post-pass rather than
    /// walked off the wire.
    pub derived: bool,
}

/// Per-entry flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[must_use]
pub struct EntryFlags(u8);

impl EntryFlags {
    /// No flags set.
    pub const NONE: EntryFlags = EntryFlags(0);
    /// Synthesised rather than wire-parsed.
    pub const DERIVED: EntryFlags = EntryFlags(1 << 0);
    /// Value bytes exceeded `max_value_bytes`; payload left empty.
    pub const TRUNCATED: EntryFlags = EntryFlags(1 << 1);
    /// Value window clipped by the stream bounds; payload left empty.
    pub const UNREADABLE: EntryFlags = EntryFlags(1 << 2);
    /// Collapsed as a duplicate during [`MetaStore::finalize`].
    pub const DELETED: EntryFlags = EntryFlags(1 << 3);

    /// True when all bits of `other` are set.
    pub fn contains(self, other: EntryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for EntryFlags {
    type Output = EntryFlags;
    fn bitor(self, rhs: EntryFlags) -> EntryFlags {
        EntryFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EntryFlags {
    fn bitor_assign(&mut self, rhs: EntryFlags) {
        self.0 |= rhs.0;
    }
}

/// Where an entry came from on the wire.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct EntryOrigin {
    /// Block the entry was emitted into.
    pub block: BlockId,
    /// Position within the block, in wire order. Unique per block.
    pub order_in_block: u32,
    /// Original wire type code.
    pub wire: WireType,
    /// Original wire element count.
    pub wire_count: u32,
}

/// One decoded metadata entry.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct Entry {
    pub key: MetaKey,
    pub value: MetaValue,
    pub origin: EntryOrigin,
    pub flags: EntryFlags,
}

/// Append-only store of blocks and entries over one [`ByteArena`].
#[derive(Debug, Default)]
#[must_use]
pub struct MetaStore {
    arena: ByteArena,
    blocks: Vec<BlockInfo>,
    entries: Vec<Entry>,
    finalized: bool,
}

impl MetaStore {
    /// New empty store with the default arena cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing arena.
    pub fn arena(&self) -> &ByteArena {
        &self.arena
    }

    /// Mutable backing arena, for decoders writing payloads.
    pub fn arena_mut(&mut self) -> &mut ByteArena {
        &mut self.arena
    }

    /// Number of blocks recorded so far.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of entries recorded so far, deleted ones included.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Register a block; returns [`BlockId::INVALID`] only when the block
    /// table itself can no longer grow (arena exhaustion).
    pub fn add_block(&mut self, info: BlockInfo) -> BlockId {
        if self.blocks.len() >= u32::MAX as usize - 1 {
            return BlockId::INVALID;
        }
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(info);
        id
    }

    /// Register a block with an interned token string. Convenience over
    /// [`MetaStore::add_block`] for decoders that hold the token as `&str`.
    pub fn add_named_block(&mut self, token: &str, parent: BlockId, wire_offset: u64, derived: bool) -> BlockId {
        let Some(span) = self.arena.intern(token.as_bytes()) else {
            return BlockId::INVALID;
        };
        self.add_block(BlockInfo { token: span, parent, wire_offset, derived })
    }

    /// Block record by id; `None` for the invalid sentinel.
    pub fn block(&self, id: BlockId) -> Option<&BlockInfo> {
        self.blocks.get(id.index())
    }

    /// Append an entry. Never fails; callers pre-validate limits.
    pub fn add_entry(&mut self, entry: Entry) -> EntryId {
        let id = EntryId(self.entries.len() as u32);
        self.entries.push(entry);
        id
    }

    /// Entry by id.
    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id.index())
    }

    /// Dense id for an entry table index, if in range.
    pub fn entry_id_at(&self, index: usize) -> Option<EntryId> {
        (index < self.entries.len()).then(|| EntryId(index as u32))
    }

    /// All entries in emission order, deleted ones included. Use
    /// [`MetaStore::iter`] after finalize for consumer iteration.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Interned token text of a block.
    pub fn block_token(&self, id: BlockId) -> &str {
        match self.block(id) {
            Some(info) => std::str::from_utf8(self.arena.span(info.token)).unwrap_or(""),
            None => "",
        }
    }

    /// Deterministic dedupe pass: entries with the same key, origin block
    /// and order collapse to the last one emitted; earlier ones are marked
    /// [`EntryFlags::DELETED`] but stay in the table.
    pub fn finalize(&mut self) {
        use std::collections::HashMap;
        use std::hash::{Hash, Hasher};

        let mut last: HashMap<u64, Vec<usize>> = HashMap::new();
        for (idx, entry) in self.entries.iter().enumerate() {
            let mut h = std::collections::hash_map::DefaultHasher::new();
            match &entry.key {
                MetaKey::ExifTag { ifd, tag } => {
                    0u8.hash(&mut h);
                    self.arena.span(*ifd).hash(&mut h);
                    tag.hash(&mut h);
                }
                MetaKey::XmpProperty { ns, name } => {
                    1u8.hash(&mut h);
                    self.arena.span(*ns).hash(&mut h);
                    self.arena.span(*name).hash(&mut h);
                }
                MetaKey::GeoTiffKey(id) => {
                    2u8.hash(&mut h);
                    id.hash(&mut h);
                }
            }
            entry.origin.block.index().hash(&mut h);
            entry.origin.order_in_block.hash(&mut h);
            last.entry(h.finish()).or_default().push(idx);
        }

        for bucket in last.values() {
            if bucket.len() < 2 {
                continue;
            }
            // Hash buckets can collide; confirm with a full key compare
            // against the bucket's final (winning) entry.
            let winner = *bucket.last().unwrap_or(&0);
            for &idx in &bucket[..bucket.len() - 1] {
                let (a, b) = (self.entries[idx], self.entries[winner]);
                if a.origin.block == b.origin.block
                    && a.origin.order_in_block == b.origin.order_in_block
                    && a.key.same_key(&b.key, &self.arena)
                {
                    self.entries[idx].flags |= EntryFlags::DELETED;
                }
            }
        }
        self.finalized = true;
    }

    /// Iterate live entries (skips [`EntryFlags::DELETED`]).
    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &Entry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.flags.contains(EntryFlags::DELETED))
            .map(|(i, e)| (EntryId(i as u32), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WireType;

    fn entry(store: &mut MetaStore, ifd: &str, tag: u16, block: BlockId, order: u32) -> Entry {
        let span = store.arena_mut().intern(ifd.as_bytes()).unwrap();
        Entry {
            key: MetaKey::ExifTag { ifd: span, tag },
            value: MetaValue::u32(order),
            origin: EntryOrigin { block, order_in_block: order, wire: WireType::tiff(4), wire_count: 1 },
            flags: EntryFlags::NONE,
        }
    }

    #[test]
    fn add_and_lookup() {
        let mut store = MetaStore::new();
        let block = store.add_named_block("ifd0", BlockId::INVALID, 8, false);
        assert!(block.is_valid());
        assert_eq!(store.block_token(block), "ifd0");

        let e = entry(&mut store, "ifd0", 0x0112, block, 0);
        let id = store.add_entry(e);
        assert_eq!(store.entry(id).unwrap().key.exif_tag(), Some(0x0112));
    }

    #[test]
    fn finalize_marks_duplicates_deleted() {
        let mut store = MetaStore::new();
        let block = store.add_named_block("ifd0", BlockId::INVALID, 8, false);
        let a = entry(&mut store, "ifd0", 0x0112, block, 0);
        let b = entry(&mut store, "ifd0", 0x0112, block, 0);
        let first = store.add_entry(a);
        let second = store.add_entry(b);
        store.finalize();

        assert!(store.entry(first).unwrap().flags.contains(EntryFlags::DELETED));
        assert!(!store.entry(second).unwrap().flags.contains(EntryFlags::DELETED));
        assert_eq!(store.iter().count(), 1);
    }

    #[test]
    fn distinct_orders_survive_finalize() {
        let mut store = MetaStore::new();
        let block = store.add_named_block("ifd0", BlockId::INVALID, 8, false);
        let a = entry(&mut store, "ifd0", 0x0112, block, 0);
        let b = entry(&mut store, "ifd0", 0x0112, block, 1);
        store.add_entry(a);
        store.add_entry(b);
        store.finalize();
        assert_eq!(store.iter().count(), 2);
    }

    #[test]
    fn entry_ids_stable_across_adds() {
        let mut store = MetaStore::new();
        let block = store.add_named_block("ifd0", BlockId::INVALID, 0, false);
        let first = {
            let e = entry(&mut store, "ifd0", 1, block, 0);
            store.add_entry(e)
        };
        for i in 1..100 {
            let e = entry(&mut store, "ifd0", i, block, i as u32);
            store.add_entry(e);
        }
        assert_eq!(store.entry(first).unwrap().key.exif_tag(), Some(1));
    }
}
