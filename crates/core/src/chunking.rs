use crate::models::PipelineOptions;

/// `separators` is tried in order; the empty separator at the end
/// hard-splits on word boundaries.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<&'static str>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            chunk_size: options.chunk_size_words,
            chunk_overlap: options.chunk_overlap_words,
            separators: options.separators,
        }
    }
}

impl From<&PipelineOptions> for ChunkerConfig {
    fn from(options: &PipelineOptions) -> Self {
        Self {
            chunk_size: options.chunk_size_words,
            chunk_overlap: options.chunk_overlap_words,
            separators: options.separators.clone(),
        }
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Collapse whitespace runs while keeping line and paragraph breaks.
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut paragraphs = Vec::new();

    for paragraph in unified.split("\n\n") {
        let lines: Vec<String> = paragraph
            .lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect();

        if !lines.is_empty() {
            paragraphs.push(lines.join("\n"));
        }
    }

    paragraphs.join("\n\n")
}

/// Split `text` into chunks of at most `chunk_size` words, sharing the
/// trailing `chunk_overlap` words of the previous base chunk. A
/// whitespace-free token longer than the budget becomes one oversized
/// chunk.
pub fn split_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let size = config.chunk_size.max(1);

    let mut base = Vec::new();
    split_recursive(text, &config.separators, size, &mut base);

    if config.chunk_overlap == 0 || base.len() < 2 {
        return base;
    }

    let mut with_overlap = Vec::with_capacity(base.len());
    with_overlap.push(base[0].clone());
    for index in 1..base.len() {
        let previous: Vec<&str> = base[index - 1].split_whitespace().collect();
        let take = config.chunk_overlap.min(previous.len());
        let prefix = previous[previous.len() - take..].join(" ");
        if prefix.is_empty() {
            with_overlap.push(base[index].clone());
        } else {
            with_overlap.push(format!("{} {}", prefix, base[index]));
        }
    }

    with_overlap
}

fn split_recursive(text: &str, separators: &[&'static str], size: usize, out: &mut Vec<String>) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }

    if word_count(trimmed) <= size {
        out.push(trimmed.to_string());
        return;
    }

    let Some((&separator, rest)) = separators.split_first() else {
        out.push(trimmed.to_string());
        return;
    };

    if separator.is_empty() {
        let words: Vec<&str> = trimmed.split_whitespace().collect();
        if words.len() <= 1 {
            out.push(trimmed.to_string());
            return;
        }
        for group in words.chunks(size) {
            out.push(group.join(" "));
        }
        return;
    }

    let parts: Vec<&str> = trimmed.split_inclusive(separator).collect();
    if parts.len() <= 1 {
        split_recursive(trimmed, rest, size, out);
        return;
    }

    let mut current = String::new();
    for part in parts {
        if !current.trim().is_empty() && word_count(&current) + word_count(part) > size {
            flush_segment(&current, rest, size, out);
            current.clear();
        }
        current.push_str(part);
    }
    flush_segment(&current, rest, size, out);
}

fn flush_segment(segment: &str, rest: &[&'static str], size: usize, out: &mut Vec<String>) {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return;
    }
    if word_count(trimmed) > size {
        split_recursive(trimmed, rest, size, out);
    } else {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size,
            chunk_overlap,
            ..ChunkerConfig::default()
        }
    }

    #[test]
    fn whitespace_is_normalized_but_paragraphs_survive() {
        let input = "A  \t lot\nof   spacing\n\n\n\nnext   paragraph";
        let normalized = normalize_whitespace(input);
        assert_eq!(normalized, "A lot\nof spacing\n\nnext paragraph");
    }

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let chunks = split_text("  hello world  ", &config(10, 2));
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(split_text("   \n\n  ", &config(10, 2)).is_empty());
    }

    #[test]
    fn paragraph_boundary_is_preferred() {
        let text = "one two three four\n\nfive six seven eight";
        let chunks = split_text(text, &config(4, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "one two three four");
        assert_eq!(chunks[1], "five six seven eight");
    }

    #[test]
    fn overlap_repeats_trailing_words_without_compounding() {
        let text = "a b c d e f g h i j k l";
        let chunks = split_text(text, &config(5, 2));
        assert_eq!(chunks[0], "a b c d e");
        assert_eq!(chunks[1], "d e f g h i j");
        assert_eq!(chunks[2], "i j k l");
    }

    #[test]
    fn hard_split_applies_when_no_boundary_exists() {
        let chunks = split_text("one two three", &config(1, 0));
        assert_eq!(chunks, vec!["one", "two", "three"]);
    }

    #[test]
    fn oversized_single_token_terminates() {
        let token = "x".repeat(4000);
        let text = format!("{token} {token}");
        let chunks = split_text(&text, &config(1, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], token);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = (0..400)
            .map(|index| format!("word{index}"))
            .collect::<Vec<_>>()
            .join(" ");
        let first = split_text(&text, &config(50, 10));
        let second = split_text(&text, &config(50, 10));
        assert_eq!(first, second);
    }

    #[test]
    fn every_input_word_survives_with_default_budgets() {
        let text = (0..1_800)
            .map(|index| {
                if index % 90 == 89 {
                    format!("token{index}.\n\n")
                } else {
                    format!("token{index}")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        let chunks = split_text(&text, &config(500, 100));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
            assert!(word_count(chunk) <= 500 + 100);
        }
        for index in 0..1_800 {
            let needle = format!("token{index}");
            assert!(
                chunks.iter().any(|chunk| chunk.contains(&needle)),
                "missing {needle}"
            );
        }
    }

    #[test]
    fn sentence_boundary_is_used_before_raw_spaces() {
        let text = "Alpha beta gamma delta. Epsilon zeta eta theta. Iota kappa lambda mu.";
        let chunks = split_text(text, &config(4, 0));
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].starts_with("Alpha"));
        assert!(chunks[1].starts_with("Epsilon"));
    }
}
