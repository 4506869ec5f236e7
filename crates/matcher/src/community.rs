//! Streaming connected-components over band collision buckets.
//!
//! The report scan emits rows ordered by `(hashtable, value)`; consecutive
//! rows with an equal key form a collision bucket, and every bucket of size
//! ≥ 2 links its members. Components are tracked in a union-find so the edge
//! set is never materialized: a bucket of n members costs n-1 unions, not
//! n·(n-1)/2 edges.

use fxhash::FxHashMap;

/// Union-find over interned string keys, with path compression and
/// union-by-rank.
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    ids: FxHashMap<String, usize>,
    keys: Vec<String>,
}

impl UnionFind {
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            rank: Vec::new(),
            ids: FxHashMap::default(),
            keys: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Intern `key`, creating a fresh singleton set on first sight.
    pub fn intern(&mut self, key: &str) -> usize {
        if let Some(&id) = self.ids.get(key) {
            return id;
        }
        let id = self.parent.len();
        self.parent.push(id);
        self.rank.push(0);
        self.ids.insert(key.to_string(), id);
        self.keys.push(key.to_string());
        id
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Components with at least two members, each sorted ascending, ordered
    /// by (size desc, smallest member asc).
    pub fn communities(mut self) -> Vec<Vec<String>> {
        let mut by_root: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for id in 0..self.parent.len() {
            let root = self.find(id);
            by_root.entry(root).or_default().push(id);
        }

        let mut out: Vec<Vec<String>> = by_root
            .into_values()
            .filter(|members| members.len() >= 2)
            .map(|members| {
                let mut keys: Vec<String> = members
                    .into_iter()
                    .map(|id| self.keys[id].clone())
                    .collect();
                keys.sort_unstable();
                keys
            })
            .collect();

        out.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
        out
    }
}

impl Default for UnionFind {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds an ordered `(hashtable, value, sha)` row stream into communities.
pub struct CommunityBuilder {
    uf: UnionFind,
    current: Option<(u32, Vec<u8>)>,
    bucket: Vec<usize>,
}

impl CommunityBuilder {
    pub fn new() -> Self {
        Self {
            uf: UnionFind::new(),
            current: None,
            bucket: Vec::new(),
        }
    }

    /// Feed one row of the ordered scan.
    pub fn push_row(&mut self, hashtable: u32, value: &[u8], sha: &str) {
        let same = matches!(&self.current, Some((h, v)) if *h == hashtable && v.as_slice() == value);
        if !same {
            self.close_bucket();
            self.current = Some((hashtable, value.to_vec()));
        }
        let id = self.uf.intern(sha);
        self.bucket.push(id);
    }

    /// Feed one pre-grouped collision bucket (condensed strategy).
    pub fn push_bucket<S: AsRef<str>>(&mut self, members: &[S]) {
        if members.len() < 2 {
            return;
        }
        let first = self.uf.intern(members[0].as_ref());
        for member in &members[1..] {
            let id = self.uf.intern(member.as_ref());
            self.uf.union(first, id);
        }
    }

    fn close_bucket(&mut self) {
        if self.bucket.len() >= 2 {
            let first = self.bucket[0];
            for &id in &self.bucket[1..] {
                self.uf.union(first, id);
            }
        }
        self.bucket.clear();
    }

    pub fn finish(mut self) -> Vec<Vec<String>> {
        self.close_bucket();
        self.uf.communities()
    }
}

impl Default for CommunityBuilder {
    fn default() -> Self {
        Self::new()
    }
}
