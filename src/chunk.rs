//! Blank-line text splitter.
//!
//! Splits raw file content into retrievable units on paragraph boundaries
//! (two or more consecutive newlines). Whitespace-only fragments are
//! dropped; source order is preserved. There is no merging and no size
//! cap — an abnormally large paragraph becomes one large chunk.

/// Split content into paragraph chunks, keeping each paragraph's text
/// as-is. Trimming is only the discard criterion for whitespace-only
/// fragments, never applied to the stored text.
pub fn split_chunks(content: &str) -> Vec<String> {
    content
        .split("\n\n")
        .filter(|chunk| !chunk.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_paragraph() {
        let chunks = split_chunks("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_empty_content() {
        assert!(split_chunks("").is_empty());
        assert!(split_chunks("\n\n\n\n").is_empty());
        assert!(split_chunks("   \n\n \t ").is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let chunks = split_chunks("first\n\nsecond\n\nthird");
        assert_eq!(chunks, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_extra_blank_lines_collapse() {
        // Three or more newlines still separate exactly two chunks
        let chunks = split_chunks("alpha\n\n\n\nbeta");
        assert_eq!(chunks, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_surrounding_whitespace_preserved() {
        let chunks = split_chunks("  alpha  \n\nbeta\n");
        assert_eq!(chunks, vec!["  alpha  ", "beta\n"]);

        // An odd newline count leaves a leading newline on the next chunk
        let chunks = split_chunks("alpha\n\n\nbeta");
        assert_eq!(chunks, vec!["alpha", "\nbeta"]);
    }

    #[test]
    fn test_whitespace_only_fragments_dropped() {
        let chunks = split_chunks("alpha\n\n   \n\nbeta");
        assert_eq!(chunks, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_large_paragraph_stays_whole() {
        let big = "x".repeat(100_000);
        let chunks = split_chunks(&big);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 100_000);
    }
}
