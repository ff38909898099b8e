use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::ops::AddAssign;

/// Integer keys that route to a bucket by `key mod bucket_count`.
pub trait BucketKey: Copy + Ord {
    fn bucket(self, bucket_count: usize) -> usize;
}

macro_rules! impl_bucket_key {
    ($($t:ty),*) => {
        $(impl BucketKey for $t {
            #[inline]
            fn bucket(self, bucket_count: usize) -> usize {
                (self as u64 % bucket_count as u64) as usize
            }
        })*
    };
}

impl_bucket_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

/// Map sharded into independently locked buckets.
///
/// Writers only contend when their keys share a bucket. Callers never see a
/// lock guard, so bucket locks are always taken one at a time and in a fixed
/// order.
pub struct ConcurrentMap<K, V> {
    buckets: Vec<Mutex<BTreeMap<K, V>>>,
}

impl<K: BucketKey, V> ConcurrentMap<K, V> {
    /// `bucket_count` is clamped to at least one bucket.
    pub fn new(bucket_count: usize) -> Self {
        let buckets = (0..bucket_count.max(1)).map(|_| Mutex::new(BTreeMap::new())).collect();
        Self { buckets }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, key: K) -> &Mutex<BTreeMap<K, V>> {
        &self.buckets[key.bucket(self.buckets.len())]
    }

    /// Run `f` on the value for `key`, inserting `V::default()` first if absent.
    pub fn update<F>(&self, key: K, f: F)
    where
        V: Default,
        F: FnOnce(&mut V),
    {
        let mut bucket = self.bucket(key).lock();
        f(bucket.entry(key).or_default());
    }

    pub fn add(&self, key: K, delta: V)
    where
        V: Default + AddAssign,
    {
        self.update(key, |value| *value += delta);
    }

    pub fn erase(&self, key: K) {
        self.bucket(key).lock().remove(&key);
    }

    /// Merge every bucket into one ordered map, locking buckets in index order.
    ///
    /// Only consistent once all writers of the current pass have finished.
    pub fn snapshot(&self) -> BTreeMap<K, V>
    where
        V: Clone,
    {
        let mut merged = BTreeMap::new();
        for bucket in &self.buckets {
            let bucket = bucket.lock();
            merged.extend(bucket.iter().map(|(k, v)| (*k, v.clone())));
        }
        merged
    }

    /// Like [`snapshot`](Self::snapshot) but moves values out.
    pub fn into_ordinary_map(self) -> BTreeMap<K, V> {
        let mut merged = BTreeMap::new();
        for bucket in self.buckets {
            merged.extend(bucket.into_inner());
        }
        merged
    }
}
