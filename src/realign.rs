//! Coreference realignment
//!
//! Rewrites a document so that every mention in a coreference cluster is
//! replaced by the cluster's canonical mention:
//!
//! ```text
//! "Varun went home. He was tired."
//!   -> "Varun went home . Varun was tired . "
//! ```
//!
//! The canonical mention is the one matching a known named entity (falling
//! back to the first mention). Replacements are spliced in token space, last
//! mention first, so the offsets of earlier mentions stay valid. Rewritten
//! sentences come out space-joined with a trailing space and the sentences are
//! concatenated without a separator, so output is not meant to be fed back
//! through the realigner.
//!
//! Every mention is checked against the original sentences before anything
//! is spliced. In [`RewriteMode::Progressive`] a sentence is re-tokenized after
//! each replacement, so a later mention in the same bucket is spliced against
//! the partly rewritten tokens. If an earlier replacement shortened the
//! sentence, that mention can then fail with [`Error::IndexOutOfRange`] even
//! though it fits the original text. [`RewriteMode::Snapshot`] never shifts
//! offsets.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::tokenize::{Tokenizer, TreebankTokenizer};
use crate::types::{Cluster, CorefAnnotation, EntityMap, Mention};

/// Offset from a mention's `end_token` to the 0-based index of the first token
/// kept after it. Matches CoreNLP's 1-based, end-exclusive `endIndex`.
pub const AFTER_SPAN_OFFSET: usize = 1;

/// Offset from a mention's `start_token` to the 0-based index of the last token
/// kept before it. Matches CoreNLP's 1-based `startIndex`.
pub const BEFORE_SPAN_OFFSET: usize = 2;

/// How multiple replacements inside one sentence see each other
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RewriteMode {
    /// Each replacement re-tokenizes the sentence as rewritten so far
    #[default]
    Progressive,

    /// All offsets refer to the original tokenization; replacements are
    /// applied by descending start token regardless of bucket order
    Snapshot,
}

impl FromStr for RewriteMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "progressive" => Ok(Self::Progressive),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(Error::Config(format!("Unknown rewrite mode: {other}"))),
        }
    }
}

/// Configuration for the realigner
#[derive(Debug, Clone, Default)]
pub struct RealignerConfig {
    pub mode: RewriteMode,

    /// Sort every sentence's mentions by start token, not only the first
    /// sentence's
    pub sort_all_sentences: bool,

    /// Log every replacement decision at `debug` level
    pub verbose: bool,
}

/// A mention placed in its sentence bucket, tagged with its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedMention<'a> {
    pub mention: &'a Mention,

    /// Position of the cluster in the annotation; indexes the canonical texts
    pub cluster: usize,

    /// Annotator id of the cluster, reported in errors
    pub cluster_id: &'a str,
}

/// Mentions bucketed by 0-based sentence index
pub type SentenceMentions<'a> = BTreeMap<usize, Vec<PlacedMention<'a>>>;

/// One replacement performed while rewriting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// 0-based sentence index
    pub sentence: usize,
    pub cluster: usize,
    pub original: String,
    pub canonical: String,
}

/// Result of a realignment, with the decisions that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Realignment {
    pub resolved_text: String,
    pub replacements: Vec<Replacement>,
}

/// Choose the mention every other mention of `cluster` is replaced with
///
/// The first mention is the default. Every mention whose full text, or whose
/// head word, is a known entity overrides the current choice, so the last
/// matching mention wins.
///
/// # Errors
///
/// Returns [`Error::EmptyCluster`] if the cluster has no mentions
pub fn select_canonical<'a>(cluster: &'a Cluster, entities: &EntityMap) -> Result<&'a Mention> {
    let mut best = cluster
        .mentions
        .first()
        .ok_or_else(|| Error::EmptyCluster(cluster.id.clone()))?;

    for mention in &cluster.mentions {
        if entities.contains(&mention.text)
            || mention.head_word().is_some_and(|head| entities.contains(head))
        {
            best = mention;
        }
    }

    Ok(best)
}

/// Bucket every mention by its 0-based sentence index
///
/// Mentions keep cluster order inside a bucket. Only the first sentence's
/// bucket is sorted by start token.
///
/// # Errors
///
/// Returns [`Error::MalformedCluster`] for a mention with `sentNum` 0
pub fn group_mentions_by_sentence(clusters: &[Cluster]) -> Result<SentenceMentions<'_>> {
    let mut grouped: SentenceMentions<'_> = BTreeMap::new();

    for (position, cluster) in clusters.iter().enumerate() {
        for mention in &cluster.mentions {
            let sentence = mention.sentence_index.checked_sub(1).ok_or_else(|| {
                Error::MalformedCluster {
                    cluster: cluster.id.clone(),
                    reason: format!("mention '{}' has sentence index 0", mention.text),
                }
            })?;
            grouped.entry(sentence).or_default().push(PlacedMention {
                mention,
                cluster: position,
                cluster_id: &cluster.id,
            });
        }
    }

    if let Some(first) = grouped.get_mut(&0) {
        first.sort_by_key(|placed| placed.mention.start_token);
    }

    Ok(grouped)
}

/// Splice the canonical text of each mention into its sentence
///
/// `canonical` holds the replacement text per cluster position. Sentences
/// without mentions are left untouched; rewritten ones are rebuilt from their
/// tokens. The result is all sentences concatenated with no separator.
///
/// # Errors
///
/// Returns [`Error::MalformedCluster`] if a bucket addresses a sentence that
/// does not exist, and [`Error::IndexOutOfRange`] if a mention span does not
/// fit its sentence's tokens
pub fn rewrite(
    sentences: &[String],
    grouped: &SentenceMentions<'_>,
    canonical: &[String],
    tokenizer: &dyn Tokenizer,
    mode: RewriteMode,
) -> Result<String> {
    let mut rewritten = sentences.to_vec();

    for (&index, placed) in grouped {
        let sentence = rewritten.get_mut(index).ok_or_else(|| Error::MalformedCluster {
            cluster: placed
                .first()
                .map(|p| p.cluster_id.to_string())
                .unwrap_or_default(),
            reason: format!(
                "mention refers to sentence {} but the document has {}",
                index + 1,
                sentences.len()
            ),
        })?;

        *sentence = match mode {
            RewriteMode::Progressive => {
                rewrite_progressive(sentence, index, placed, canonical, tokenizer)?
            }
            RewriteMode::Snapshot => rewrite_snapshot(sentence, index, placed, canonical, tokenizer)?,
        };
    }

    Ok(rewritten.concat())
}

fn rewrite_progressive(
    sentence: &str,
    index: usize,
    placed: &[PlacedMention<'_>],
    canonical: &[String],
    tokenizer: &dyn Tokenizer,
) -> Result<String> {
    let mut current = sentence.to_string();

    for p in placed.iter().rev() {
        let words = tokenizer.word_tokenize(&current);
        let replacement = canonical_for(canonical, p)?;
        let (before, after) = split_around(&words, p.mention, index)?;

        let mut pieces: Vec<&str> = before.iter().map(String::as_str).collect();
        pieces.push(replacement);
        pieces.extend(after.iter().map(String::as_str));
        current = join_tokens(&pieces);
    }

    Ok(current)
}

fn rewrite_snapshot(
    sentence: &str,
    index: usize,
    placed: &[PlacedMention<'_>],
    canonical: &[String],
    tokenizer: &dyn Tokenizer,
) -> Result<String> {
    let words = tokenizer.word_tokenize(sentence);

    let mut ordered: Vec<&PlacedMention<'_>> = placed.iter().collect();
    ordered.sort_by(|a, b| b.mention.start_token.cmp(&a.mention.start_token));

    let mut pieces: Vec<String> = words.clone();
    for p in ordered {
        let replacement = canonical_for(canonical, p)?;
        // Validate against the original tokens; offsets never move because
        // everything to the right has already been spliced.
        split_around(&words, p.mention, index)?;

        let keep_before = before_len(p.mention);
        let resume_after = p.mention.end_token - AFTER_SPAN_OFFSET;
        let tail_from = resume_after.max(keep_before).min(pieces.len());
        let tail = pieces.split_off(tail_from);
        pieces.truncate(keep_before);
        pieces.push(replacement.to_string());
        pieces.extend(tail);
    }

    let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
    Ok(join_tokens(&refs))
}

/// Tokens kept before and after a mention
fn split_around<'w>(
    words: &'w [String],
    mention: &Mention,
    sentence: usize,
) -> Result<(&'w [String], &'w [String])> {
    let out_of_range = || Error::IndexOutOfRange {
        sentence: sentence + 1,
        start: mention.start_token,
        end: mention.end_token,
        len: words.len(),
    };

    if mention.start_token == 0 || mention.end_token < mention.start_token {
        return Err(out_of_range());
    }

    let keep_before = before_len(mention);
    let resume_after = mention.end_token - AFTER_SPAN_OFFSET;
    if keep_before > words.len() || resume_after > words.len() {
        return Err(out_of_range());
    }

    Ok((&words[..keep_before], &words[resume_after..]))
}

/// Number of tokens kept in front of a mention: indices `0..=start - 2`
fn before_len(mention: &Mention) -> usize {
    mention
        .start_token
        .checked_sub(BEFORE_SPAN_OFFSET)
        .map_or(0, |last| last + 1)
}

fn canonical_for<'c>(canonical: &'c [String], placed: &PlacedMention<'_>) -> Result<&'c str> {
    canonical
        .get(placed.cluster)
        .map(String::as_str)
        .ok_or_else(|| Error::MalformedCluster {
            cluster: placed.cluster_id.to_string(),
            reason: "no canonical mention for cluster".to_string(),
        })
}

/// Every token followed by a single space
fn join_tokens(pieces: &[&str]) -> String {
    let mut out = String::with_capacity(pieces.iter().map(|p| p.len() + 1).sum());
    for piece in pieces {
        out.push_str(piece);
        out.push(' ');
    }
    out
}

/// Rewrites documents using coreference clusters and a named entity map
pub struct CorefRealigner {
    config: RealignerConfig,
    tokenizer: Box<dyn Tokenizer>,
}

impl CorefRealigner {
    /// Create a realigner using the default Treebank tokenizer
    #[must_use]
    pub fn new(config: RealignerConfig) -> Self {
        Self::with_tokenizer(config, Box::new(TreebankTokenizer::new()))
    }

    #[must_use]
    pub fn with_tokenizer(config: RealignerConfig, tokenizer: Box<dyn Tokenizer>) -> Self {
        Self { config, tokenizer }
    }

    #[must_use]
    pub const fn config(&self) -> &RealignerConfig {
        &self.config
    }

    /// Replace coreferent mentions in `text` with their canonical forms
    ///
    /// # Errors
    ///
    /// Returns an error if a cluster is empty or a mention does not fit the
    /// document
    pub fn resolve(
        &self,
        annotation: &CorefAnnotation,
        text: &str,
        entities: &EntityMap,
    ) -> Result<String> {
        self.realign(annotation, text, entities)
            .map(|r| r.resolved_text)
    }

    /// Like [`resolve`](Self::resolve), also reporting each replacement
    ///
    /// # Errors
    ///
    /// Returns an error if a cluster is empty or a mention does not fit the
    /// document
    pub fn realign(
        &self,
        annotation: &CorefAnnotation,
        text: &str,
        entities: &EntityMap,
    ) -> Result<Realignment> {
        let clusters = &annotation.clusters;
        let sentences = self.tokenizer.split_sentences(text);

        tracing::debug!(
            clusters = clusters.len(),
            mentions = annotation.mention_count(),
            sentences = sentences.len(),
            entities = entities.len(),
            "Realigning coreferences"
        );

        let canonical = clusters
            .iter()
            .map(|cluster| select_canonical(cluster, entities).map(|m| m.text.clone()))
            .collect::<Result<Vec<_>>>()?;

        let mut grouped = group_mentions_by_sentence(clusters)?;
        if self.config.sort_all_sentences {
            for placed in grouped.values_mut() {
                placed.sort_by_key(|p| p.mention.start_token);
            }
        }

        validate(clusters, &grouped, &sentences, self.tokenizer.as_ref())?;

        let mut replacements = Vec::with_capacity(annotation.mention_count());
        for (&sentence, placed) in &grouped {
            for p in placed.iter().rev() {
                let replacement = Replacement {
                    sentence,
                    cluster: p.cluster,
                    original: p.mention.text.clone(),
                    canonical: canonical[p.cluster].clone(),
                };
                if self.config.verbose {
                    tracing::debug!(
                        sentence = sentence + 1,
                        cluster = p.cluster,
                        start = p.mention.start_token,
                        end = p.mention.end_token,
                        "'{}' -> '{}'",
                        replacement.original,
                        replacement.canonical
                    );
                }
                replacements.push(replacement);
            }
        }

        let resolved_text = rewrite(
            &sentences,
            &grouped,
            &canonical,
            self.tokenizer.as_ref(),
            self.config.mode,
        )?;

        if self.config.verbose {
            tracing::debug!(original = text, resolved = %resolved_text, "Coreferences resolved");
        }

        Ok(Realignment {
            resolved_text,
            replacements,
        })
    }
}

impl Default for CorefRealigner {
    fn default() -> Self {
        Self::new(RealignerConfig::default())
    }
}

/// Check every mention against the original sentences before any splicing
fn validate(
    clusters: &[Cluster],
    grouped: &SentenceMentions<'_>,
    sentences: &[String],
    tokenizer: &dyn Tokenizer,
) -> Result<()> {
    for cluster in clusters {
        for mention in &cluster.mentions {
            if mention.head_token_index < mention.start_token
                || mention.head_token_index > mention.end_token
            {
                return Err(Error::MalformedCluster {
                    cluster: cluster.id.clone(),
                    reason: format!(
                        "head index {} of '{}' lies outside {}..{}",
                        mention.head_token_index,
                        mention.text,
                        mention.start_token,
                        mention.end_token
                    ),
                });
            }
        }
    }

    for (&index, placed) in grouped {
        let Some(sentence) = sentences.get(index) else {
            return Err(Error::MalformedCluster {
                cluster: placed
                    .first()
                    .map(|p| p.cluster_id.to_string())
                    .unwrap_or_default(),
                reason: format!(
                    "mention refers to sentence {} but the document has {}",
                    index + 1,
                    sentences.len()
                ),
            });
        };

        let words = tokenizer.word_tokenize(sentence);
        for p in placed {
            split_around(&words, p.mention, index)?;
        }
    }

    Ok(())
}
