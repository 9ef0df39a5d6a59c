// Formatting utilities

/// Truncate string to max chars with ellipsis
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// `<#id>` or a placeholder when unset
pub fn channel_mention(id: Option<u64>) -> String {
    id.map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "Not set".to_string())
}

/// Split a message by lines (then words) so no chunk exceeds `max_len`
pub fn chunk_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for line in text.lines() {
        if line.len() > max_len {
            if !current_chunk.is_empty() {
                chunks.push(std::mem::take(&mut current_chunk));
            }

            // Long line: split by words
            let mut word_chunk = String::new();
            for word in line.split_whitespace() {
                if word.len() > max_len {
                    if !word_chunk.is_empty() {
                        chunks.push(std::mem::take(&mut word_chunk));
                    }
                    let mut pieces = split_on_char_boundaries(word, max_len);
                    word_chunk = pieces.pop().unwrap_or_default();
                    chunks.extend(pieces);
                    continue;
                }
                if !word_chunk.is_empty() && word_chunk.len() + word.len() + 1 > max_len {
                    chunks.push(std::mem::take(&mut word_chunk));
                }
                if !word_chunk.is_empty() {
                    word_chunk.push(' ');
                }
                word_chunk.push_str(word);
            }
            current_chunk = word_chunk;
        } else if current_chunk.len() + line.len() + 1 > max_len {
            if !current_chunk.is_empty() {
                chunks.push(std::mem::take(&mut current_chunk));
            }
            current_chunk = line.to_string();
        } else {
            if !current_chunk.is_empty() {
                current_chunk.push('\n');
            }
            current_chunk.push_str(line);
        }
    }

    if !current_chunk.is_empty() {
        chunks.push(current_chunk);
    }

    chunks
}

/// Hard-split a single word that is longer than `max_len` bytes
fn split_on_char_boundaries(word: &str, max_len: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();

    for ch in word.chars() {
        if !piece.is_empty() && piece.len() + ch.len_utf8() > max_len {
            pieces.push(std::mem::take(&mut piece));
        }
        piece.push(ch);
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }

    pieces
}
