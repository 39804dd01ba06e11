use std::collections::BTreeMap;

/// Disjoint-set over place indices, keeping member lists per root so a
/// merge can be vetted before it happens.
#[derive(Debug, Clone)]
pub struct Clusters {
    parent: Vec<usize>,
    rank: Vec<u8>,
    members: Vec<Vec<usize>>,
}

impl Clusters {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
            members: (0..size).map(|i| vec![i]).collect(),
        }
    }

    pub fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // path compression
        let mut current = index;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    pub fn members_of(&mut self, index: usize) -> &[usize] {
        let root = self.find(index);
        &self.members[root]
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }

    /// Merge the sets of `a` and `b`. Returns false if they were already one set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        let (root, child) = match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => (rb, ra),
            std::cmp::Ordering::Greater => (ra, rb),
            std::cmp::Ordering::Equal => {
                self.rank[ra] += 1;
                (ra, rb)
            }
        };
        self.parent[child] = root;
        let moved = std::mem::take(&mut self.members[child]);
        self.members[root].extend(moved);
        true
    }

    /// Sets with at least `min_size` members, each sorted ascending, ordered
    /// by their smallest index.
    pub fn sets(&mut self, min_size: usize) -> Vec<Vec<usize>> {
        let mut by_first: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for index in 0..self.parent.len() {
            let root = self.find(index);
            if self.members[root].len() < min_size {
                continue;
            }
            if index == *self.members[root].iter().min().unwrap_or(&index) {
                let mut set = self.members[root].clone();
                set.sort_unstable();
                by_first.insert(index, set);
            }
        }
        by_first.into_values().collect()
    }
}
