//! Property tests for the recursive chunker.

use std::collections::HashMap;

use docqa_rag::chunking::{Chunker, RecursiveChunker, TextSpan};
use docqa_rag::document::Document;
use proptest::prelude::*;

/// Text made of short words, single and double line breaks, and a
/// multi-byte character so byte and char offsets differ.
fn arb_text() -> impl Strategy<Value = String> {
    "[ab é\n]{0,300}"
}

/// A `(chunk_size, chunk_overlap)` pair with `overlap < size`.
fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Chunks are bounded, non-empty slices of the source text.
mod prop_chunks_are_bounded_slices {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn every_chunk_fits_and_matches_its_source_slice(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
            strip in any::<bool>(),
        ) {
            let chunker = RecursiveChunker::new(size, overlap).with_strip_whitespace(strip);
            for TextSpan { start, text: chunk } in chunker.split_text(&text) {
                prop_assert!(!chunk.is_empty());
                prop_assert!(char_len(&chunk) <= size);
                prop_assert_eq!(text.get(start..start + chunk.len()), Some(chunk.as_str()));
            }
        }
    }
}

/// Without trimming, chunks tile the text: contiguous, overlapping by at
/// most `chunk_overlap` characters, and reconstructing it exactly.
mod prop_unstripped_chunks_reconstruct_text {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn non_overlapping_parts_rebuild_the_text(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let spans = RecursiveChunker::new(size, overlap)
                .with_strip_whitespace(false)
                .split_text(&text);

            if text.is_empty() {
                prop_assert!(spans.is_empty());
                return Ok(());
            }

            prop_assert_eq!(spans[0].start, 0);
            let mut rebuilt = String::new();
            let mut end = 0usize;
            for span in &spans {
                prop_assert!(span.start <= end, "gap before byte {}", span.start);
                prop_assert!(char_len(&text[span.start..end]) <= overlap);

                let span_end = span.start + span.text.len();
                if span_end > end {
                    rebuilt.push_str(&text[end..span_end]);
                    end = span_end;
                }
            }
            prop_assert_eq!(end, text.len());
            prop_assert_eq!(rebuilt, text);
        }
    }
}

/// The same document always produces the same chunks.
mod prop_chunking_is_deterministic {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn chunking_twice_gives_identical_chunks(
            text in arb_text(),
            (size, overlap) in arb_sizes(),
        ) {
            let document = Document {
                id: "doc".to_string(),
                text,
                metadata: HashMap::from([("source".to_string(), "doc.txt".to_string())]),
                source_uri: None,
            };
            let chunker = RecursiveChunker::new(size, overlap);
            let first = chunker.chunk(&document);
            let second = chunker.chunk(&document);
            prop_assert_eq!(&first, &second);

            for (i, chunk) in first.iter().enumerate() {
                prop_assert_eq!(&chunk.id, &format!("doc_{i}"));
                prop_assert_eq!(chunk.source(), Some("doc.txt"));
                prop_assert!(chunk.embedding.is_empty());
            }
        }
    }
}

#[test]
fn default_sizes_split_a_long_text_into_overlapping_chunks() {
    let text: String = (0..400).map(|i| format!("word{i} ")).collect();
    let spans = RecursiveChunker::new(750, 80).split_text(&text);

    assert!(spans.len() > 1);
    for pair in spans.windows(2) {
        let prev_end = pair[0].start + pair[0].text.len();
        assert!(pair[1].start < prev_end, "consecutive chunks should share a tail");
        assert!(prev_end - pair[1].start <= 80);
    }
}
