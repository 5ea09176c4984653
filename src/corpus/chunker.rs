//! Sentence-aligned chunking with token overlap
//!
//! Sizes are counted in whitespace-separated tokens.

/// Splits documents into windows of whole sentences
#[derive(Debug, Clone, Copy)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let mut pieces: Vec<Vec<&str>> = Vec::new();
        for sentence in split_sentences(text) {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            // Sentences longer than a whole chunk are hard-split on token boundaries
            for piece in words.chunks(self.chunk_size) {
                pieces.push(piece.to_vec());
            }
        }

        let mut chunks = Vec::new();
        let mut window: Vec<Vec<&str>> = Vec::new();
        let mut window_len = 0;

        for piece in pieces {
            if window_len + piece.len() > self.chunk_size && !window.is_empty() {
                chunks.push(join(&window));

                // Carry trailing sentences forward as overlap
                let mut carried = Vec::new();
                let mut carried_len = 0;
                for prev in window.iter().rev() {
                    if carried_len + prev.len() > self.chunk_overlap {
                        break;
                    }
                    carried_len += prev.len();
                    carried.push(prev.clone());
                }
                carried.reverse();

                while carried_len + piece.len() > self.chunk_size && !carried.is_empty() {
                    carried_len -= carried.remove(0).len();
                }

                window = carried;
                window_len = carried_len;
            }

            window_len += piece.len();
            window.push(piece);
        }

        if !window.is_empty() {
            chunks.push(join(&window));
        }

        chunks
    }
}

fn join(window: &[Vec<&str>]) -> String {
    window
        .iter()
        .map(|sentence| sentence.join(" "))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sentence boundaries: terminal punctuation followed by whitespace, or a blank line
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let boundary = match c {
            '.' | '!' | '?' => chars.peek().map_or(true, |&(_, next)| next.is_whitespace()),
            '\n' => chars.peek().map_or(false, |&(_, next)| next == '\n'),
            _ => false,
        };

        if boundary {
            let end = idx + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}
