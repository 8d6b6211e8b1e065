//! Union-find over arena handles.
//!
//! PtTs that name the same location, and spans known to be coincident, are
//! grouped into sets. Each root remembers the members of its set, so that
//! we can both answer "are these the same?" quickly and walk everything in
//! a set.

use std::cell::Cell;

#[derive(Clone, Debug)]
pub struct DisjointSets<I> {
    /// Shortened on every lookup, which is why it's a `Cell`.
    parent: Vec<Cell<usize>>,
    /// Only meaningful at roots.
    members: Vec<Vec<I>>,
}

impl<I> Default for DisjointSets<I> {
    fn default() -> Self {
        DisjointSets {
            parent: Vec::new(),
            members: Vec::new(),
        }
    }
}

impl<I: Copy + Eq + From<usize> + Into<usize>> DisjointSets<I> {
    /// Makes sure that `idx` (and everything before it) has a set.
    ///
    /// Newly covered handles start out in singleton sets.
    pub fn insert(&mut self, idx: I) {
        let idx: usize = idx.into();
        while self.parent.len() <= idx {
            let next = self.parent.len();
            self.parent.push(Cell::new(next));
            self.members.push(vec![I::from(next)]);
        }
    }

    /// The representative of the set containing `idx`.
    ///
    /// Sets are merged by size, and lookups halve the path they walk.
    pub fn find(&self, idx: I) -> I {
        let mut i: usize = idx.into();
        loop {
            let p = self.parent[i].get();
            if p == i {
                return I::from(i);
            }
            let grandparent = self.parent[p].get();
            self.parent[i].set(grandparent);
            i = grandparent;
        }
    }

    /// The representatives of all the sets.
    pub fn roots(&self) -> impl Iterator<Item = I> + '_ {
        (0..self.parent.len())
            .filter(move |&i| self.parent[i].get() == i)
            .map(I::from)
    }

    pub fn same(&self, a: I, b: I) -> bool {
        self.find(a) == self.find(b)
    }

    /// Merges the sets containing `a` and `b`. Returns false if they were already merged.
    pub fn union(&mut self, a: I, b: I) -> bool {
        let ra: usize = self.find(a).into();
        let rb: usize = self.find(b).into();
        if ra == rb {
            return false;
        }
        let (big, small) = if self.members[ra].len() >= self.members[rb].len() {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small].set(big);
        let moved = std::mem::take(&mut self.members[small]);
        self.members[big].extend(moved);
        true
    }

    /// All handles in the same set as `idx`, including `idx` itself.
    pub fn members(&self, idx: I) -> &[I] {
        let root: usize = self.find(idx).into();
        &self.members[root]
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::DisjointSets;

    #[test]
    fn singletons() {
        let mut sets = DisjointSets::<usize>::default();
        sets.insert(3);
        assert_eq!(sets.members(2), &[2]);
        assert!(!sets.same(0, 3));
    }

    #[test]
    fn union_is_transitive() {
        let mut sets = DisjointSets::<usize>::default();
        sets.insert(5);
        assert!(sets.union(0, 1));
        assert!(sets.union(4, 5));
        assert!(sets.union(1, 5));
        assert!(!sets.union(0, 4));
        assert!(sets.same(0, 4));
        let mut members = sets.members(5).to_vec();
        members.sort();
        assert_eq!(members, vec![0, 1, 4, 5]);
    }

    #[test]
    fn find_halves_paths() {
        let mut sets = DisjointSets::<usize>::default();
        sets.insert(3);
        sets.union(0, 1);
        sets.union(2, 3);
        sets.union(0, 2);
        // 3 -> 2 -> 0
        assert_eq!(sets.parent[3].get(), 2);
        assert_eq!(sets.find(3), 0);
        assert_eq!(sets.parent[3].get(), 0);
        assert_eq!(sets.roots().collect::<Vec<_>>(), vec![0]);
    }

    proptest! {
        #[test]
        fn members_partition(unions in proptest::collection::vec((0usize..20, 0usize..20), 0..40)) {
            let mut sets = DisjointSets::<usize>::default();
            sets.insert(19);
            for (a, b) in unions {
                sets.union(a, b);
            }
            let mut seen = vec![0; 20];
            for i in 0..20 {
                if sets.find(i) == i {
                    for &m in sets.members(i) {
                        seen[m] += 1;
                        prop_assert_eq!(sets.find(m), i);
                    }
                }
            }
            prop_assert!(seen.iter().all(|&c| c == 1));
        }
    }
}
