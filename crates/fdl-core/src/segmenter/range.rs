//! Fragment type and byte-range planning.

/// Worker count used when the caller leaves concurrency unset (or below 1).
pub const DEFAULT_CONCURRENCY: usize = 24;

/// A single fragment: byte range `[start, end]` (inclusive).
///
/// `end` is `None` only for the whole-resource fragment of a plan whose total
/// size is unknown; the fetch then reads to end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub index: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (inclusive), if known.
    pub end: Option<u64>,
}

impl Fragment {
    /// Length of this fragment in bytes, if known.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end + 1 - self.start)
    }

    /// HTTP Range header value: `bytes=start-end`, or `bytes=start-` for an open end.
    pub fn range_header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// How a resource is split into fragments.
///
/// Built once after probing; immutable while workers run. Fragment ranges are
/// computed on demand from the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentPlan {
    total_size: Option<u64>,
    chunk_size: u64,
    fragment_count: usize,
    concurrency: usize,
    ranged: bool,
}

impl FragmentPlan {
    /// Plans ranged fragments for a resource of `total_size` bytes.
    ///
    /// `concurrency < 1` falls back to [`DEFAULT_CONCURRENCY`]; `chunk_size < 1`
    /// falls back to `ceil(total_size / concurrency)`.
    pub fn new(total_size: u64, concurrency: usize, chunk_size: u64) -> Self {
        let concurrency = effective_concurrency(concurrency);
        let chunk_size = if chunk_size < 1 {
            total_size.div_ceil(concurrency as u64).max(1)
        } else {
            chunk_size
        };
        let fragment_count = total_size.div_ceil(chunk_size) as usize;
        Self {
            total_size: Some(total_size),
            chunk_size,
            fragment_count,
            concurrency,
            ranged: true,
        }
    }

    /// Plans a single unranged fragment covering the whole resource.
    ///
    /// Used when the server does not advertise byte-range support or does not
    /// report a length.
    pub fn whole(total_size: Option<u64>, concurrency: usize) -> Self {
        Self {
            total_size,
            chunk_size: total_size.unwrap_or(0),
            fragment_count: 1,
            concurrency: effective_concurrency(concurrency),
            ranged: false,
        }
    }

    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Number of workers to start (defaults already applied).
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// True when each fragment is fetched with a `Range` header.
    pub fn is_ranged(&self) -> bool {
        self.ranged
    }

    /// Byte range of fragment `index`. The last fragment is clamped to `total_size - 1`.
    pub fn fragment(&self, index: usize) -> Fragment {
        debug_assert!(index < self.fragment_count, "fragment index out of range");
        let Some(total) = self.total_size else {
            return Fragment {
                index,
                start: 0,
                end: None,
            };
        };
        if !self.ranged {
            return Fragment {
                index,
                start: 0,
                end: total.checked_sub(1),
            };
        }
        let start = index as u64 * self.chunk_size;
        let end = if index + 1 < self.fragment_count {
            start + self.chunk_size - 1
        } else {
            total - 1
        };
        Fragment {
            index,
            start,
            end: Some(end),
        }
    }

    /// All fragments in index order.
    pub fn fragments(&self) -> impl Iterator<Item = Fragment> + '_ {
        (0..self.fragment_count).map(move |i| self.fragment(i))
    }
}

fn effective_concurrency(concurrency: usize) -> usize {
    if concurrency < 1 {
        DEFAULT_CONCURRENCY
    } else {
        concurrency
    }
}
