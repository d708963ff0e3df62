use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash, RandomState};

const DEFAULT_CAPACITY: usize = 16;

const LOWER_LOAD_FACTOR: f64 = 0.25;
const UPPER_LOAD_FACTOR: f64 = 0.75;

/// A hash map with open chaining: every bucket is a vector of `(key, value)`
/// pairs in insertion order.
///
/// The bucket count starts at 16, stays a power of two, and is resized so
/// the load factor never settles above 0.75 after an insert or below 0.25
/// after a removal (down to a floor of one bucket). Iteration visits buckets
/// in ascending index order and pairs within a bucket in insertion order.
pub struct ChainedHashMap<K, V, S = RandomState> {
    buckets: Vec<Vec<(K, V)>>,
    num_elements: usize,
    hasher: S,
}

impl<K, V> ChainedHashMap<K, V, RandomState> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }
}

impl<K, V, S: Default> Default for ChainedHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> ChainedHashMap<K, V, S> {
    /// An empty map addressing keys through an explicit [`BuildHasher`].
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            buckets: (0..DEFAULT_CAPACITY).map(|_| Vec::new()).collect(),
            num_elements: 0,
            hasher,
        }
    }

    /// The amount of key/value pairs in the map.
    pub fn len(&self) -> usize {
        self.num_elements
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    /// The current bucket count.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// `len / capacity`.
    pub fn load_factor(&self) -> f64 {
        self.num_elements as f64 / self.buckets.len() as f64
    }

    /// Drops every pair while keeping the current capacity.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.num_elements = 0;
    }

    /// Pairs in ascending bucket order, insertion order within a bucket.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter { buckets: &self.buckets, bucket: 0, pos: 0 }
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> ChainedHashMap<K, V, S> {
    fn bucket_of<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        // capacity is a power of two, so the mod is a mask
        self.hasher.hash_one(key) as usize & (self.buckets.len() - 1)
    }

    fn position_in_bucket<Q>(&self, bucket: usize, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.buckets[bucket].iter().position(|(k, _)| k.borrow() == key)
    }

    /// Whether `key` is in the map.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).is_some()
    }

    /// The value stored under `key`, if any.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let bucket = self.bucket_of(key);
        let pos = self.position_in_bucket(bucket, key)?;
        Some(&self.buckets[bucket][pos].1)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let bucket = self.bucket_of(key);
        let pos = self.position_in_bucket(bucket, key)?;
        Some(&mut self.buckets[bucket][pos].1)
    }

    /// The index of the bucket holding `key`, or `None` if `key` is absent.
    pub fn bucket_index<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let bucket = self.bucket_of(key);
        self.position_in_bucket(bucket, key)?;
        Some(bucket)
    }

    /// The amount of pairs sharing `key`'s bucket (`key` included), or `None`
    /// if `key` is absent.
    pub fn bucket_size<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.bucket_index(key).map(|bucket| self.buckets[bucket].len())
    }

    /// Adds the pair to the map.
    ///
    /// Returns `false` without touching anything if `key` is already present;
    /// present values are never overwritten through this entry point.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.slot(key, move || value);
        true
    }

    /// Removes `key`'s pair, returning the value it held.
    ///
    /// The other pairs in the bucket keep their order. Shrinks the bucket
    /// array while more than one bucket remains and the load factor sits
    /// below the lower threshold.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let bucket = self.bucket_of(key);
        let pos = self.position_in_bucket(bucket, key)?;
        let (_, value) = self.buckets[bucket].remove(pos);
        self.num_elements -= 1;
        while self.buckets.len() > 1 && self.load_factor() < LOWER_LOAD_FACTOR {
            self.rehash(self.buckets.len() / 2);
        }
        Some(value)
    }

    /// A mutable reference to `key`'s value, inserting `V::default()` first
    /// if the key is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.slot(key, V::default)
    }

    /// Resolves `key` to its pair slot, appending `(key, make())` when absent.
    /// Growing happens before the append so the returned reference is already
    /// post-rehash.
    fn slot(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        let bucket = self.bucket_of(&key);
        match self.position_in_bucket(bucket, &key) {
            Some(pos) => &mut self.buckets[bucket][pos].1,
            None => {
                if (self.num_elements + 1) as f64 / self.buckets.len() as f64 > UPPER_LOAD_FACTOR {
                    self.rehash(self.buckets.len() * 2);
                }
                let bucket = self.bucket_of(&key);
                let pos = self.buckets[bucket].len();
                self.buckets[bucket].push((key, make()));
                self.num_elements += 1;
                &mut self.buckets[bucket][pos].1
            }
        }
    }

    /// Moves every pair into a fresh bucket array of `new_capacity` buckets,
    /// walking the old buckets in order so per-bucket insertion order survives.
    fn rehash(&mut self, new_capacity: usize) {
        log::debug!(
            "rehashing {} pairs from {} to {new_capacity} buckets",
            self.num_elements,
            self.buckets.len(),
        );
        let old = std::mem::replace(
            &mut self.buckets,
            (0..new_capacity).map(|_| Vec::new()).collect(),
        );
        for bucket in old {
            for (key, value) in bucket {
                let idx = self.hasher.hash_one(&key) as usize & (new_capacity - 1);
                self.buckets[idx].push((key, value));
            }
        }
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Extend<(K, V)> for ChainedHashMap<K, V, S> {
    /// Last write wins: a pair whose key is already present overwrites the value.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            let bucket = self.bucket_of(&key);
            match self.position_in_bucket(bucket, &key) {
                Some(pos) => self.buckets[bucket][pos].1 = value,
                None => {
                    self.insert(key, value);
                }
            }
        }
    }
}

impl<K: Hash + Eq, V, S: BuildHasher + Default> FromIterator<(K, V)> for ChainedHashMap<K, V, S> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

/// Forward cursor over a map's pairs.
///
/// Holds a shared borrow of the map, so the "no structural mutation while
/// iterating" rule is enforced at compile time.
pub struct Iter<'a, K, V> {
    buckets: &'a [Vec<(K, V)>],
    bucket: usize,
    pos: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        while let Some(bucket) = self.buckets.get(self.bucket) {
            if let Some((k, v)) = bucket.get(self.pos) {
                self.pos += 1;
                return Some((k, v));
            }
            self.bucket += 1;
            self.pos = 0;
        }
        None
    }
}

impl<'a, K, V, S> IntoIterator for &'a ChainedHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// Set equality over the pairs: same length, every key of one present in the
/// other with an equal value. Capacity and bucket layout play no part.
impl<K: Hash + Eq, V: PartialEq, S: BuildHasher> PartialEq for ChainedHashMap<K, V, S> {
    fn eq(&self, other: &Self) -> bool {
        self.num_elements == other.num_elements
            && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Hash + Eq, V: Eq, S: BuildHasher> Eq for ChainedHashMap<K, V, S> {}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for ChainedHashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Hasher that reports the key's own bits, so bucket placement in tests is
/// `key & (capacity - 1)`.
#[cfg(test)]
#[derive(Clone, Copy, Default)]
struct Identity;

#[cfg(test)]
#[derive(Default)]
struct IdentityHasher(u64);

#[cfg(test)]
impl std::hash::Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 << 8) | b as u64;
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
}

#[cfg(test)]
impl BuildHasher for Identity {
    type Hasher = IdentityHasher;

    fn build_hasher(&self) -> IdentityHasher {
        IdentityHasher(0)
    }
}

#[test]
fn thirteenth_insert_doubles_the_capacity() {
    crate::init_test_logging();
    let mut map = ChainedHashMap::new();
    for n in 0..12 {
        assert!(map.insert(n, n * n));
    }
    // 12/16 = 0.75 sits exactly on the threshold
    assert_eq!(map.capacity(), 16);
    assert!(map.insert(12, 144));
    assert_eq!(map.capacity(), 32);
    assert_eq!(map.len(), 13);
}

#[test]
fn duplicate_insert_is_a_rejected_noop() {
    let mut map = ChainedHashMap::new();
    assert!(map.insert("answer", 42));
    assert!(!map.insert("answer", 54));
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("answer"), Some(&42));
}

#[test]
fn pairs_round_trip_until_removed() {
    let mut map = ChainedHashMap::new();
    for n in 0..100u64 {
        map.insert(n, n.to_string());
    }
    for n in 0..100 {
        assert_eq!(map.get(&n).map(String::as_str), Some(n.to_string().as_str()));
    }
    assert_eq!(map.remove(&17), Some("17".to_string()));
    assert_eq!(map.remove(&17), None);
    assert_eq!(map.get(&17), None);
    assert_eq!(map.len(), 99);
}

#[test]
fn emptying_shrinks_down_to_one_bucket() {
    let mut map = ChainedHashMap::new();
    map.insert('x', 1);
    assert_eq!(map.capacity(), 16);
    map.remove(&'x');
    // 0/16 < 0.25, halving repeats while more than one bucket remains
    assert_eq!(map.capacity(), 1);
    assert!(map.is_empty());

    // one bucket holding one pair is over-full, so the next insert regrows
    map.insert('y', 2);
    assert_eq!(map.capacity(), 2);
    assert_eq!(map.get(&'y'), Some(&2));
}

#[test]
fn load_factor_stays_bounded_across_mixed_traffic() {
    let mut map = ChainedHashMap::new();
    for n in 0..200u32 {
        map.insert(n, ());
        assert!(map.load_factor() <= UPPER_LOAD_FACTOR);
    }
    for n in 0..200 {
        map.remove(&n);
        assert!(map.capacity() == 1 || map.load_factor() >= LOWER_LOAD_FACTOR);
        assert!(map.load_factor() <= UPPER_LOAD_FACTOR);
    }
    assert_eq!(map.capacity(), 1);
}

#[test]
fn rehashing_loses_no_pairs() {
    let mut map = ChainedHashMap::new();
    for n in 0..100u64 {
        map.insert(n, n + 1000);
    }
    assert!(map.capacity() > 16);
    assert_eq!(map.iter().count(), map.len());
    for n in 0..100 {
        assert_eq!(map.get(&n), Some(&(n + 1000)));
    }
    for n in 0..90 {
        map.remove(&n);
    }
    assert_eq!(map.capacity(), 32); // 10 pairs, halved until 10/32 clears 0.25
    assert_eq!(map.iter().count(), 10);
    for n in 90..100 {
        assert_eq!(map.get(&n), Some(&(n + 1000)));
    }
}

#[test]
fn identity_hashing_pins_buckets_and_iteration_order() {
    let mut map: ChainedHashMap<u64, &str, Identity> = ChainedHashMap::default();
    map.insert(1, "one");
    map.insert(17, "seventeen"); // 17 & 15 == 1, collides with 1
    map.insert(3, "three");

    assert_eq!(map.bucket_index(&1), Some(1));
    assert_eq!(map.bucket_index(&17), Some(1));
    assert_eq!(map.bucket_index(&3), Some(3));
    assert_eq!(map.bucket_index(&2), None);
    assert_eq!(map.bucket_size(&1), Some(2));
    assert_eq!(map.bucket_size(&3), Some(1));
    assert_eq!(map.bucket_size(&99), None);

    // bucket order first, then insertion order within bucket 1
    let keys: Vec<u64> = map.iter().map(|(&k, _)| k).collect();
    assert_eq!(keys, [1, 17, 3]);
}

#[test]
fn equality_ignores_capacity_history() {
    let mut a = ChainedHashMap::new();
    for n in 0..50u32 {
        a.insert(n, n * 2);
    }
    for n in 10..50 {
        a.remove(&n);
    }

    let b: ChainedHashMap<u32, u32> = (0..10).map(|n| (n, n * 2)).collect();
    assert_ne!(a.capacity(), b.capacity());
    assert_eq!(a, b);

    let mut c = b;
    if let Some(v) = c.get_mut(&3) {
        *v = 999;
    }
    assert_ne!(a, c);
}

#[test]
fn extend_overwrites_like_assignment() {
    let mut map: ChainedHashMap<&str, i32> = ChainedHashMap::new();
    map.extend([("a", 1), ("b", 2), ("a", 3)]);
    assert_eq!(map.len(), 2);
    assert_eq!(map.get("a"), Some(&3));
    assert_eq!(map.get("b"), Some(&2));
}

#[test]
fn clear_keeps_the_capacity() {
    let mut map = ChainedHashMap::new();
    for n in 0..20i32 {
        map.insert(n, ());
    }
    let capacity = map.capacity();
    map.clear();
    assert_eq!(map.capacity(), capacity);
    assert!(map.is_empty());
    assert_eq!(map.iter().count(), 0);
}

#[test]
fn default_values_are_created_on_demand() {
    let mut counts: ChainedHashMap<&str, u32> = ChainedHashMap::new();
    for word in "the cat and the hat and the bat".split_whitespace() {
        *counts.get_or_insert_default(word) += 1;
    }
    assert_eq!(counts.get("the"), Some(&3));
    assert_eq!(counts.get("and"), Some(&2));
    assert_eq!(counts.get("bat"), Some(&1));
    assert_eq!(counts.len(), 5);
}
