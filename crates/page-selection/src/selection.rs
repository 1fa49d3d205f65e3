use std::collections::HashSet;

/// Set of selected 1-based page numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pages: HashSet<u32>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `page`. Returns `true` if the page is now selected.
    pub fn toggle(&mut self, page: u32) -> bool {
        if self.pages.remove(&page) {
            false
        } else {
            self.pages.insert(page);
            true
        }
    }

    pub fn insert(&mut self, page: u32) -> bool {
        self.pages.insert(page)
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains(&page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Selected pages in ascending order.
    pub fn sorted(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.pages.iter().copied().collect();
        pages.sort_unstable();
        pages
    }
}
