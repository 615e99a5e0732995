/// Bits per segment. Tuned for OSM id density: one segment covers 50M ids in
/// ~6.25 MB, and a planet-scale node space stays under twenty segments.
const SEGMENT_BITS: u64 = 50 * 1024 * 1024;
const SEGMENT_WORDS: usize = (SEGMENT_BITS / 64) as usize;

/// A sparse bitset over the OSM id space. Segments materialize on first
/// write; reading an untouched range costs nothing and returns false.
///
/// Ids must be non-negative. Callers feed raw OSM ids here, and negative ids
/// (which some editors use for not-yet-uploaded objects) are outside the
/// supported universe; debug builds assert, release builds index garbage.
#[derive(Default)]
pub struct GrowingBitset {
    segments: Vec<Option<Box<[u64]>>>,
}

impl GrowingBitset {
    pub fn new() -> Self {
        Self::default()
    }

    fn split(id: i64) -> (usize, usize, u64) {
        debug_assert!(id >= 0, "negative id {id} passed to tracker");
        let id = id as u64;
        let segment = (id / SEGMENT_BITS) as usize;
        let bit = id % SEGMENT_BITS;
        (segment, (bit / 64) as usize, 1u64 << (bit % 64))
    }

    /// Mark `id`. Idempotent; allocates the containing segment on first use.
    pub fn set(&mut self, id: i64) {
        let (segment, word, mask) = Self::split(id);
        if segment >= self.segments.len() {
            self.segments.resize(segment + 1, None);
        }
        let words = self.segments[segment]
            .get_or_insert_with(|| vec![0u64; SEGMENT_WORDS].into_boxed_slice());
        words[word] |= mask;
    }

    pub fn get(&self, id: i64) -> bool {
        let (segment, word, mask) = Self::split(id);
        match self.segments.get(segment) {
            Some(Some(words)) => words[word] & mask != 0,
            _ => false,
        }
    }

    /// Zero every bit but keep the allocated segments.
    pub fn clear(&mut self) {
        for segment in self.segments.iter_mut().flatten() {
            segment.fill(0);
        }
    }
}
