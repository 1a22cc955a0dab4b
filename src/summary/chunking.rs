//! Sentence-boundary chunking for transcripts that exceed the prompt budget.

/// Split text after sentence terminators and at line breaks.
///
/// Each piece keeps its terminator and trailing whitespace, so concatenating
/// the pieces reproduces the input.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let boundary = match c {
            '\n' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |(_, next)| next.is_whitespace()),
            _ => false,
        };
        if !boundary {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, w)) = chars.peek() {
            if !w.is_whitespace() {
                break;
            }
            end = j + w.len_utf8();
            chars.next();
        }
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Pack sentences greedily into chunks of at most `max_chars` characters.
///
/// A single sentence longer than `max_chars` is split on whitespace; a
/// single word longer than that is split on characters.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();

        if len > max_chars {
            flush(&mut chunks, &mut current, &mut current_len);
            for piece in split_oversized(sentence, max_chars) {
                chunks.push(piece);
            }
            continue;
        }

        if current_len + len > max_chars {
            flush(&mut chunks, &mut current, &mut current_len);
        }
        current.push_str(sentence);
        current_len += len;
    }
    flush(&mut chunks, &mut current, &mut current_len);

    chunks
}

fn flush(chunks: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
    *current_len = 0;
}

fn split_oversized(sentence: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let text = "[00:00] Hello there. Version 1.5 is out! Really?\n[00:30] Next part";
        let pieces = split_sentences(text);
        assert_eq!(
            pieces,
            vec![
                "[00:00] Hello there. ",
                "Version 1.5 is out! ",
                "Really?\n",
                "[00:30] Next part"
            ]
        );
        assert_eq!(pieces.concat(), text);
    }

    #[test]
    fn test_chunks_respect_budget_and_boundaries() {
        let text = "One two three. Four five six. Seven eight nine. Ten eleven twelve.";
        let chunks = chunk_text(text, 32);

        assert_eq!(
            chunks,
            vec![
                "One two three. Four five six.",
                "Seven eight nine.",
                "Ten eleven twelve."
            ]
        );
        assert!(chunks.iter().all(|c| c.chars().count() <= 32));
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        assert_eq!(chunk_text("Just one sentence.", 100), vec!["Just one sentence."]);
        assert!(chunk_text("   ", 100).is_empty());
    }

    #[test]
    fn test_oversized_sentence_is_split_on_words() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = chunk_text(text, 12);

        assert!(chunks.iter().all(|c| c.chars().count() <= 12));
        assert_eq!(chunks.join(" "), text);
    }
}
