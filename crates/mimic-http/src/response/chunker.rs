//! Splitting of response payloads into transport chunks.

use bytes::Bytes;
use std::num::NonZeroUsize;

/// Split `payload` into `chunks` contiguous pieces.
///
/// Each of the first `n - 1` pieces holds `len / n` bytes and the last one
/// absorbs the remainder. The count is clamped to `max(len, 1)` so that no
/// piece is empty unless the payload itself is. Slicing shares the payload
/// buffer; nothing is copied.
pub fn chunk(payload: &Bytes, chunks: NonZeroUsize) -> Vec<Bytes> {
    let len = payload.len();
    let n = chunks.get().min(len.max(1));
    let size = len / n;

    let mut pieces = Vec::with_capacity(n);
    for i in 0..n {
        let start = i * size;
        let end = if i + 1 == n { len } else { start + size };
        pieces.push(payload.slice(start..end));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn n(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).unwrap()
    }

    #[test]
    fn test_last_chunk_absorbs_remainder() {
        let payload = Bytes::from_static(b"abcdefghij");
        let pieces = chunk(&payload, n(3));
        assert_eq!(pieces, vec![Bytes::from_static(b"abc"), Bytes::from_static(b"def"), Bytes::from_static(b"ghij")]);
    }

    #[test]
    fn test_count_clamped_to_length() {
        let payload = Bytes::from_static(b"ab");
        let pieces = chunk(&payload, n(5));
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.len() == 1));
    }

    #[test]
    fn test_empty_payload_is_one_empty_chunk() {
        let pieces = chunk(&Bytes::new(), n(4));
        assert_eq!(pieces, vec![Bytes::new()]);
    }

    proptest! {
        #[test]
        fn chunks_concatenate_to_payload(data in proptest::collection::vec(any::<u8>(), 1..512), k in 1usize..600) {
            let payload = Bytes::from(data.clone());
            let count = k.min(data.len());
            let pieces = chunk(&payload, n(count));
            prop_assert_eq!(pieces.len(), count);
            let joined: Vec<u8> = pieces.iter().flat_map(|p| p.iter().copied()).collect();
            prop_assert_eq!(joined, data.clone());
            for piece in &pieces[..count - 1] {
                prop_assert_eq!(piece.len(), data.len() / count);
            }
        }
    }
}
