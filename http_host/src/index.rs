//! Static hash from lowercased header name to its cache slot.
//!
//! Built once at configuration time and never modified afterwards, so any
//! number of workers may read it without locking. The bucket sizing follows
//! the host's static hash: the smallest bucket count for which every bucket's
//! packed elements fit into `bucket_size` bytes.

use crate::hash::{hash_key_lc, to_lower};
use crate::headers::{HeaderOffset, KnownHeader};
use std::mem::size_of;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};

pub const HEADERS_IN_HASH_MAX_SIZE: usize = 512;
pub const HEADERS_IN_HASH_BUCKET_SIZE: usize = 64;

const WORD: usize = size_of::<usize>();

static HEADERS_IN: OnceLock<HeaderOffsetIndex> = OnceLock::new();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexBuildError {
    #[error("could not build header index, bucket_size {bucket_size} is too small for \"{name}\"")]
    BucketTooSmall { name: String, bucket_size: usize },

    #[error("duplicate header name \"{0}\" in header index")]
    Duplicate(String),

    #[error("header index max_size must be at least 1")]
    ZeroSize,
}

#[derive(Debug, Clone, Copy)]
pub struct HashSizing {
    pub max_size: usize,
    pub bucket_size: usize,
}

impl Default for HashSizing {
    fn default() -> Self {
        Self {
            max_size: HEADERS_IN_HASH_MAX_SIZE,
            bucket_size: HEADERS_IN_HASH_BUCKET_SIZE,
        }
    }
}

#[derive(Debug)]
struct Elt {
    name: Box<[u8]>,
    offset: HeaderOffset,
}

#[derive(Debug)]
pub struct HeaderOffsetIndex {
    buckets: Vec<Vec<Elt>>,
}

// Packed size of one element: a value pointer, a length, then the name
// padded to a word.
const fn elt_size(name_len: usize) -> usize {
    WORD + (name_len + 2).div_ceil(WORD) * WORD
}

impl HeaderOffsetIndex {
    /// The process-wide index over [`KnownHeader`], built on first use.
    pub fn global() -> &'static HeaderOffsetIndex {
        HEADERS_IN.get_or_init(|| {
            Self::build(
                KnownHeader::ALL.iter().map(|h| (h.name(), h.offset())),
                HashSizing::default(),
            )
            .expect("well-known header names fit the default bucket size")
        })
    }

    pub fn build<'a, I>(names: I, sizing: HashSizing) -> Result<Self, IndexBuildError>
    where
        I: IntoIterator<Item = (&'a str, HeaderOffset)>,
    {
        if sizing.max_size == 0 {
            return Err(IndexBuildError::ZeroSize);
        }

        let mut elts: Vec<(usize, Elt)> = Vec::new();
        for (name, offset) in names {
            if sizing.bucket_size < elt_size(name.len()) + WORD {
                return Err(IndexBuildError::BucketTooSmall {
                    name: name.to_string(),
                    bucket_size: sizing.bucket_size,
                });
            }

            let lowcase: Box<[u8]> = name.bytes().map(to_lower).collect();
            if elts.iter().any(|(_, e)| e.name == lowcase) {
                return Err(IndexBuildError::Duplicate(name.to_string()));
            }

            elts.push((hash_key_lc(name.as_bytes()), Elt { name: lowcase, offset }));
        }

        let size = Self::find_size(&elts, sizing);

        let mut buckets: Vec<Vec<Elt>> = (0..size).map(|_| Vec::new()).collect();
        for (key, elt) in elts {
            buckets[key % size].push(elt);
        }

        debug!(size, "built header offset index");

        Ok(Self { buckets })
    }

    fn find_size(elts: &[(usize, Elt)], sizing: HashSizing) -> usize {
        if elts.is_empty() {
            return 1;
        }

        // one word per bucket is reserved for the terminator
        let bucket_size = sizing.bucket_size - WORD;
        let start = (elts.len() / (bucket_size / (2 * WORD))).max(1);

        let mut test = vec![0usize; sizing.max_size];
        'size: for size in start..=sizing.max_size {
            test[..size].fill(0);
            for (key, elt) in elts {
                let bucket = key % size;
                let len = test[bucket] + elt_size(elt.name.len());
                if len > bucket_size {
                    continue 'size;
                }
                test[bucket] = len;
            }
            return size;
        }

        warn!(
            max_size = sizing.max_size,
            bucket_size = sizing.bucket_size,
            "could not build optimal header index, increase max_size or bucket_size"
        );
        sizing.max_size
    }

    /// `name` must already be lowercased and `key` computed over it.
    pub fn find(&self, key: usize, name: &[u8]) -> Option<HeaderOffset> {
        let bucket = self.buckets.get(key % self.buckets.len())?;
        bucket
            .iter()
            .find(|elt| elt.name.len() == name.len() && *elt.name == *name)
            .map(|elt| elt.offset)
    }

    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
