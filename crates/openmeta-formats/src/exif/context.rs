//! Cached entry lookup over a store.
//!
//! Vendor post-passes repeatedly ask for the same handful of entries
//! (Make, Model, serial numbers, cipher keys). [`ExifContext`] wraps the
//! linear store scan with a small hit cache; entry ids stay valid for the
//! store's lifetime, so cached hits never go stale.

use openmeta_core::{EntryId, MetaKey, MetaStore, MetaValue, ValueKind};

const SLOT_COUNT: usize = 32;

#[derive(Debug, Clone, Default)]
struct Slot {
    ifd: String,
    tag: u16,
    entry: Option<EntryId>,
}

/// Lookup helper caching the most recent hits.
#[derive(Debug, Default)]
#[must_use]
pub struct ExifContext {
    slots: Vec<Slot>,
    next: usize,
}

impl ExifContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// First entry with the given IFD token and tag, in emission order.
    pub fn find_first_entry(&mut self, store: &MetaStore, ifd: &str, tag: u16) -> Option<EntryId> {
        if let Some(slot) = self
            .slots
            .iter()
            .find(|s| s.tag == tag && s.ifd == ifd)
        {
            return slot.entry;
        }
        let hit = store
            .entries()
            .iter()
            .enumerate()
            .find(|(_, e)| match e.key {
                MetaKey::ExifTag { ifd: token, tag: t } => {
                    t == tag && store.arena().span(token) == ifd.as_bytes()
                }
                _ => false,
            })
            .and_then(|(i, _)| {
                // Recover the dense id through the public accessor.
                store.entry_id_at(i)
            });
        if hit.is_some() {
            self.cache(ifd, tag, hit);
        }
        hit
    }

    /// First value for `(ifd, tag)`.
    pub fn find_first_value(&mut self, store: &MetaStore, ifd: &str, tag: u16) -> Option<MetaValue> {
        let id = self.find_first_entry(store, ifd, tag)?;
        store.entry(id).map(|e| e.value)
    }

    /// First value decoded as text, copied out of the arena.
    pub fn find_first_text(&mut self, store: &MetaStore, ifd: &str, tag: u16) -> Option<String> {
        let value = self.find_first_value(store, ifd, tag)?;
        if value.kind != ValueKind::Text {
            return None;
        }
        let span = value.span()?;
        Some(String::from_utf8_lossy(store.arena().span(span)).into_owned())
    }

    /// First value widened to u32 (scalar or first array element).
    pub fn find_first_u32(&mut self, store: &MetaStore, ifd: &str, tag: u16) -> Option<u32> {
        let value = self.find_first_value(store, ifd, tag)?;
        if let Some(v) = value.as_u32() {
            return Some(v);
        }
        value
            .array_u64(store.arena(), 0)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// First value as i32.
    pub fn find_first_i32(&mut self, store: &MetaStore, ifd: &str, tag: u16) -> Option<i32> {
        let value = self.find_first_value(store, ifd, tag)?;
        value.as_i64().and_then(|v| i32::try_from(v).ok())
    }

    fn cache(&mut self, ifd: &str, tag: u16, entry: Option<EntryId>) {
        let slot = Slot { ifd: ifd.to_string(), tag, entry };
        if self.slots.len() < SLOT_COUNT {
            self.slots.push(slot);
        } else {
            self.slots[self.next] = slot;
            self.next = (self.next + 1) % SLOT_COUNT;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_core::{
        BlockId, Entry, EntryFlags, EntryOrigin, MetaKey, MetaStore, MetaValue, TextEncoding,
        WireType,
    };

    fn store_with_make() -> MetaStore {
        let mut store = MetaStore::new();
        let block = store.add_named_block("ifd0", BlockId::INVALID, 8, false);
        let token = store.arena_mut().intern(b"ifd0").unwrap();
        let text = store.arena_mut().intern(b"Canon").unwrap();
        store.add_entry(Entry {
            key: MetaKey::ExifTag { ifd: token, tag: 0x010F },
            value: MetaValue::text(text, TextEncoding::Ascii),
            origin: EntryOrigin { block, order_in_block: 0, wire: WireType::tiff(2), wire_count: 6 },
            flags: EntryFlags::NONE,
        });
        store
    }

    #[test]
    fn finds_text_and_caches() {
        let store = store_with_make();
        let mut ctx = ExifContext::new();
        assert_eq!(ctx.find_first_text(&store, "ifd0", 0x010F).as_deref(), Some("Canon"));
        // Second call hits the cache.
        assert_eq!(ctx.find_first_text(&store, "ifd0", 0x010F).as_deref(), Some("Canon"));
        assert_eq!(ctx.find_first_text(&store, "exif", 0x010F), None);
    }
}
