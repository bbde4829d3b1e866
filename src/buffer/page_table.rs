//! Page records and the identity lookup cache.

use std::collections::HashMap;

use log::debug;

use crate::buffer::page::Page;
use crate::common::PageKey;

/// Reference to a page record: arena slot plus the generation it was
/// created in.
///
/// Slots are recycled; a reference taken before its page was destroyed no
/// longer matches the slot's generation and resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PageRef {
    index: usize,
    generation: u64,
}

struct Slot {
    generation: u64,
    page: Option<Page>,
}

/// Arena of live page records plus `PageKey → PageRef` lookup.
///
/// The lookup map never owns a page. An entry is only a hint; whether its
/// page is still alive is checked against the arena on every lookup, and a
/// dead entry is dropped and reported as a miss.
pub(crate) struct PageTable {
    slots: Vec<Slot>,
    free: Vec<usize>,
    lookup: HashMap<PageKey, PageRef>,
    live: usize,
}

impl PageTable {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            lookup: HashMap::new(),
            live: 0,
        }
    }

    /// Store a new record. It is not registered for lookup.
    pub(crate) fn insert(&mut self, page: Page) -> PageRef {
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.page = Some(page);
            return PageRef {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            page: Some(page),
        });
        PageRef {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, page_ref: PageRef) -> Option<&Page> {
        self.slots
            .get(page_ref.index)
            .filter(|slot| slot.generation == page_ref.generation)
            .and_then(|slot| slot.page.as_ref())
    }

    pub(crate) fn get_mut(&mut self, page_ref: PageRef) -> Option<&mut Page> {
        self.slots
            .get_mut(page_ref.index)
            .filter(|slot| slot.generation == page_ref.generation)
            .and_then(|slot| slot.page.as_mut())
    }

    /// Take a record out of the arena and unregister its key.
    pub(crate) fn remove(&mut self, page_ref: PageRef) -> Option<Page> {
        let slot = self
            .slots
            .get_mut(page_ref.index)
            .filter(|slot| slot.generation == page_ref.generation)?;
        let page = slot.page.take()?;

        slot.generation += 1;
        self.free.push(page_ref.index);
        self.live -= 1;

        if self.lookup.get(page.key()) == Some(&page_ref) {
            self.lookup.remove(page.key());
        }
        Some(page)
    }

    /// Find the live page registered under `key`.
    pub(crate) fn lookup(&mut self, key: &PageKey) -> Option<PageRef> {
        let page_ref = *self.lookup.get(key)?;
        if self.get(page_ref).is_some() {
            return Some(page_ref);
        }

        debug!("dropping stale lookup entry for {}", key);
        self.lookup.remove(key);
        None
    }

    pub(crate) fn register(&mut self, key: PageKey, page_ref: PageRef) {
        self.lookup.insert(key, page_ref);
    }

    /// Live records.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (PageRef, &Page)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.page.as_ref().map(|page| {
                (
                    PageRef {
                        index,
                        generation: slot.generation,
                    },
                    page,
                )
            })
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.live
    }
}
