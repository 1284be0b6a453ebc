// crates/rollup-merge/src/union_find.rs
// ============================================================================
// Module: Union-Find
// Description: A disjoint-set-union structure over dense u32 indices.
// Purpose: Compute connected components of the (repoId, nodeId) match graph
//          for the merge engine (spec.md §4.D).
// Dependencies: none
// ============================================================================

/// A union-find (disjoint-set-union) structure over `0..n` indices, with
/// path compression and union by rank.
pub struct UnionFind {
    /// `parent[i]` is `i`'s parent, or `i` itself when `i` is a root.
    parent: Vec<u32>,
    /// Approximate tree height, used to keep unions balanced.
    rank: Vec<u8>,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        let parent = (0..n).map(|i| u32::try_from(i).unwrap_or(u32::MAX)).collect();
        Self { parent, rank: vec![0; n] }
    }

    /// Returns the representative of the set containing `x`, compressing
    /// the path traversed along the way.
    pub fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut current = x;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    /// Merges the sets containing `a` and `b`.
    pub fn union(&mut self, a: u32, b: u32) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let (small, large) =
            if self.rank[root_a as usize] < self.rank[root_b as usize] { (root_a, root_b) } else { (root_b, root_a) };
        self.parent[small as usize] = large;
        if self.rank[small as usize] == self.rank[large as usize] {
            self.rank[large as usize] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unioned_elements_share_a_root() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(1, 2);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
    }

    #[test]
    fn singletons_are_their_own_root() {
        let mut uf = UnionFind::new(3);
        assert_eq!(uf.find(0), 0);
        assert_eq!(uf.find(1), 1);
    }

    #[test]
    fn union_is_idempotent() {
        let mut uf = UnionFind::new(2);
        uf.union(0, 1);
        uf.union(0, 1);
        assert_eq!(uf.find(0), uf.find(1));
    }
}
