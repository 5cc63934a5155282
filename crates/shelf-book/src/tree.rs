//! Page tree of one book.
//!
//! Pages live in a flat `Vec` in breadth-first order with the root at index
//! 0. Parent and children links are indices, computed in one traversal from
//! the root; a page listed under several parents belongs to the first one
//! reached.

use std::collections::HashMap;

use crate::page::Page;

/// Tree of decorated pages.
#[derive(Debug)]
pub struct PageTree {
    pages: Vec<Page>,
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl PageTree {
    /// Arrange `pages` below the page with id `root_id`.
    ///
    /// Pages unreachable from the root are dropped. Returns `None` if the root
    /// itself is missing.
    pub fn build(root_id: &str, pages: Vec<Page>) -> Option<Self> {
        let mut by_id: HashMap<String, Page> =
            pages.into_iter().map(|p| (p.id.clone(), p)).collect();
        let root = by_id.remove(root_id)?;

        let mut tree = Self {
            pages: vec![root],
            parents: vec![None],
            children: vec![Vec::new()],
        };

        let mut next = 0;
        while next < tree.pages.len() {
            let child_ids = tree.pages[next].child_ids.clone();
            for child_id in child_ids {
                // Already placed pages (and the root) are gone from `by_id`.
                let Some(child) = by_id.remove(&child_id) else {
                    continue;
                };
                let idx = tree.pages.len();
                tree.pages.push(child);
                tree.parents.push(Some(next));
                tree.children.push(Vec::new());
                tree.children[next].push(idx);
            }
            next += 1;
        }
        Some(tree)
    }

    pub fn root(&self) -> &Page {
        &self.pages[0]
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, idx: usize) -> Option<&Page> {
        self.pages.get(idx)
    }

    pub fn parent(&self, idx: usize) -> Option<usize> {
        self.parents.get(idx).copied().flatten()
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        self.children.get(idx).map_or(&[][..], Vec::as_slice)
    }

    /// Top-level chapters: the root's children.
    pub fn chapters(&self) -> &[usize] {
        self.children(0)
    }

    /// Ancestors of `idx` from the first chapter level down, excluding the
    /// root and `idx` itself.
    pub fn ancestors(&self, idx: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = self.parent(idx);
        while let Some(p) = current {
            if p == 0 {
                break;
            }
            chain.push(p);
            current = self.parent(p);
        }
        chain.reverse();
        chain
    }

    /// Depth below the root (chapters are 1).
    pub fn depth(&self, idx: usize) -> usize {
        let mut depth = 0;
        let mut current = self.parent(idx);
        while let Some(p) = current {
            depth += 1;
            current = self.parent(p);
        }
        depth
    }

    /// Indices of all pages except the root, breadth first.
    pub fn descendants(&self) -> impl Iterator<Item = usize> + '_ {
        1..self.pages.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Page)> {
        self.pages.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shelf_source::RemotePage;

    fn page(id: &str, children: &[&str]) -> Page {
        Page::decorate(
            &RemotePage {
                id: id.to_owned(),
                title: id.to_uppercase(),
                markdown: String::new(),
                children: children.iter().map(|c| (*c).to_owned()).collect(),
            },
            "/",
            None,
        )
    }

    fn sample() -> PageTree {
        PageTree::build(
            "root",
            vec![
                page("art", &[]),
                page("root", &["ch1", "ch2"]),
                page("ch1", &["art", "missing"]),
                page("ch2", &["art"]),
                page("orphan", &[]),
            ],
        )
        .unwrap()
    }

    fn ids(tree: &PageTree, idxs: &[usize]) -> Vec<String> {
        idxs.iter()
            .map(|&i| tree.page(i).unwrap().id.clone())
            .collect()
    }

    #[test]
    fn test_structure() {
        let tree = sample();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root().id, "root");
        assert_eq!(ids(&tree, tree.chapters()), vec!["ch1", "ch2"]);

        let art = tree.iter().find(|(_, p)| p.id == "art").unwrap().0;
        assert_eq!(ids(&tree, &[tree.parent(art).unwrap()]), vec!["ch1"]);
        assert!(tree.children(tree.chapters()[1]).is_empty());
    }

    #[test]
    fn test_ancestors_and_depth() {
        let tree = sample();
        let art = tree.iter().find(|(_, p)| p.id == "art").unwrap().0;
        assert_eq!(ids(&tree, &tree.ancestors(art)), vec!["ch1"]);
        assert_eq!(tree.depth(art), 2);
        assert_eq!(tree.depth(0), 0);
        assert!(tree.ancestors(tree.chapters()[0]).is_empty());
    }

    #[test]
    fn test_missing_root() {
        assert!(PageTree::build("root", vec![page("a", &[])]).is_none());
    }

    #[test]
    fn test_cycle_back_to_root_ignored() {
        let tree = PageTree::build("root", vec![page("root", &["a"]), page("a", &["root"])]).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.descendants().count(), 1);
    }
}
