use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use mesh_routes_controller_core::{Id, RefKey};

/// A bidirectional item↔link index. Tracking an item replaces all of its
/// prior links atomically; untracking removes them.
#[derive(Debug, Default)]
pub(crate) struct Bimapper {
    item_to_links: HashMap<Id, HashSet<RefKey>>,
    link_to_items: HashMap<RefKey, HashSet<Id>>,
}

impl Bimapper {
    pub(crate) fn track(&mut self, item: &Id, links: impl IntoIterator<Item = RefKey>) {
        self.untrack(item);
        let links: HashSet<RefKey> = links.into_iter().collect();
        if links.is_empty() {
            return;
        }
        for link in &links {
            self.link_to_items
                .entry(link.clone())
                .or_default()
                .insert(item.clone());
        }
        self.item_to_links.insert(item.clone(), links);
    }

    pub(crate) fn untrack(&mut self, item: &Id) {
        if let Some(links) = self.item_to_links.remove(item) {
            for link in links {
                if let Some(items) = self.link_to_items.get_mut(&link) {
                    items.remove(item);
                    if items.is_empty() {
                        self.link_to_items.remove(&link);
                    }
                }
            }
        }
    }

    /// Items currently linked to `link`, in sorted order so that callers
    /// observe deterministic results.
    pub(crate) fn items_by_link(&self, link: &RefKey) -> Vec<Id> {
        let mut items: Vec<Id> = self
            .link_to_items
            .get(link)
            .map(|items| items.iter().cloned().collect())
            .unwrap_or_default();
        items.sort();
        items
    }

    pub(crate) fn links_by_item(&self, item: &Id) -> Vec<RefKey> {
        let mut links: Vec<RefKey> = self
            .item_to_links
            .get(item)
            .map(|links| links.iter().cloned().collect())
            .unwrap_or_default();
        links.sort();
        links
    }

    pub(crate) fn item_count(&self) -> usize {
        self.item_to_links.len()
    }

    pub(crate) fn link_count(&self) -> usize {
        self.link_to_items.len()
    }
}
