//! Sentence splitting and word tokenization
//!
//! Mention offsets produced by the coreference annotator are token indices, so
//! the realigner needs a tokenizer that splits text roughly the way the
//! annotator does. [`TreebankTokenizer`] follows Penn Treebank conventions:
//! punctuation becomes its own token, clitics are split off (`don't` ->
//! `do n't`), and only the sentence-final period is detached.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static CLITIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)(n['’]t|['’]s|['’]re|['’]ve|['’]ll|['’]d|['’]m)$")
        .unwrap_or_else(|e| panic!("invalid clitic pattern: {e}"))
});

const DEFAULT_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "gen", "col", "lt", "sgt",
    "rev", "fig", "e.g", "i.e", "cf", "approx", "ph",
];

/// Splits documents into sentences and sentences into tokens
pub trait Tokenizer: Send + Sync {
    /// Split a document into trimmed, non-empty sentences
    fn split_sentences(&self, text: &str) -> Vec<String>;

    /// Split one sentence into word tokens
    fn word_tokenize(&self, sentence: &str) -> Vec<String>;
}

/// Rule-based Penn Treebank style tokenizer
#[derive(Debug, Clone)]
pub struct TreebankTokenizer {
    abbreviations: HashSet<String>,
}

impl TreebankTokenizer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Register an extra abbreviation (without its final period, any case)
    #[must_use]
    pub fn with_abbreviation(mut self, abbreviation: &str) -> Self {
        self.abbreviations
            .insert(abbreviation.trim_end_matches('.').to_lowercase());
        self
    }

    /// Whether the word ending right before a period is an abbreviation or an
    /// initial ("Dr", "e.g", "J", "U.S")
    fn is_abbreviation(&self, preceding: &str) -> bool {
        let word = preceding
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default()
            .trim_start_matches(|c: char| !c.is_alphanumeric());

        if word.is_empty() {
            return false;
        }

        let last_segment = word.rsplit('.').next().unwrap_or(word);
        let is_initial = last_segment.chars().count() == 1
            && last_segment.chars().all(char::is_alphabetic);

        is_initial || self.abbreviations.contains(&word.to_lowercase())
    }
}

impl Default for TreebankTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for TreebankTokenizer {
    fn split_sentences(&self, text: &str) -> Vec<String> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut sentences = Vec::new();
        let mut start = 0;
        let mut i = 0;

        while i < chars.len() {
            let (pos, ch) = chars[i];
            if !is_terminator(ch) {
                i += 1;
                continue;
            }

            let mut j = i + 1;
            while j < chars.len() && (is_terminator(chars[j].1) || is_closing(chars[j].1)) {
                j += 1;
            }
            let end = chars.get(j).map_or(text.len(), |&(p, _)| p);

            // Input files are joined line by line without spaces, so an
            // uppercase letter right after a terminator also starts a sentence.
            let boundary = match chars.get(j) {
                None => true,
                Some(&(_, next)) if next.is_whitespace() => {
                    !(ch == '.' && self.is_abbreviation(&text[start..pos]))
                }
                Some(&(next_pos, next)) if next.is_uppercase() => {
                    !(ch == '.'
                        && (self.is_abbreviation(&text[start..pos])
                            || is_dotted_word_tail(&text[next_pos..])))
                }
                Some(_) => false,
            };

            if boundary {
                push_trimmed(&mut sentences, &text[start..end]);
                start = end;
            }
            i = j;
        }

        push_trimmed(&mut sentences, &text[start..]);
        sentences
    }

    fn word_tokenize(&self, sentence: &str) -> Vec<String> {
        let chunks: Vec<&str> = sentence.split_whitespace().collect();
        let mut tokens = Vec::with_capacity(chunks.len() + 4);

        for (idx, chunk) in chunks.iter().enumerate() {
            let is_last = idx + 1 == chunks.len();
            tokenize_chunk(chunk, is_last, &mut tokens);
        }

        tokens
    }
}

fn tokenize_chunk(chunk: &str, is_last: bool, tokens: &mut Vec<String>) {
    let mut core = chunk;

    while let Some(c) = core.chars().next() {
        if !is_opening(c) {
            break;
        }
        tokens.push(c.to_string());
        core = &core[c.len_utf8()..];
    }

    let mut trailing = Vec::new();
    loop {
        if is_last && core.ends_with('.') {
            let stripped = core.trim_end_matches('.');
            if stripped.is_empty() {
                break;
            }
            let dots = &core[stripped.len()..];
            trailing.push(if dots.len() > 1 { "...".to_string() } else { ".".to_string() });
            core = stripped;
            continue;
        }

        match core.chars().next_back() {
            Some(c) if is_trailing(c) && core.len() > c.len_utf8() => {
                trailing.push(c.to_string());
                core = &core[..core.len() - c.len_utf8()];
            }
            _ => break,
        }
    }

    if !core.is_empty() {
        if let Some(caps) = CLITIC.captures(core) {
            tokens.push(caps[1].to_string());
            tokens.push(caps[2].to_string());
        } else {
            tokens.push(core.to_string());
        }
    }

    tokens.extend(trailing.into_iter().rev());
}

/// Whether the word right after an unspaced period continues a dotted token
/// ("Node.JS", "Ph.D.") rather than starting a sentence: it is an acronym of
/// two or more capitals, or contains another period.
fn is_dotted_word_tail(rest: &str) -> bool {
    let word = rest
        .split(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_end_matches(|c: char| is_trailing(c) || is_closing(c));
    let letters = word.trim_end_matches('.');

    letters.contains('.')
        || (letters.chars().count() >= 2
            && letters.chars().all(|c| c.is_uppercase() || c.is_ascii_digit()))
}

fn push_trimmed(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

const fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

const fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '}' | '”' | '’')
}

const fn is_opening(c: char) -> bool {
    matches!(c, '"' | '\'' | '(' | '[' | '{' | '“' | '‘')
}

const fn is_trailing(c: char) -> bool {
    matches!(
        c,
        ',' | ';' | ':' | '!' | '?' | '"' | '\'' | ')' | ']' | '}' | '”' | '’'
    )
}
