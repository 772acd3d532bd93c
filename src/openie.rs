//! Relation extraction with Stanford OpenIE
//!
//! Two backends: the `openie` annotator of a CoreNLP server, and the
//! standalone `process_large_corpus.sh` script that runs OpenIE over a file
//! and writes Ollie-formatted triples (`0.95: (Varun; went to; home)`).

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::process::Command;

use crate::corenlp::{CoreNlpClient, OPENIE_ANNOTATORS};
use crate::error::{Error, Result};
use crate::types::Triple;
use crate::RelationExtractor;

static OLLIE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(\d+(?:\.\d+)?)\s*:\s*)?\((.+?);\s*(.+?);\s*(.+)\)\s*$")
        .unwrap_or_else(|e| panic!("invalid ollie pattern: {e}"))
});

/// Extractor backed by the CoreNLP `openie` annotator
pub struct CoreNlpOpenIe {
    client: Arc<CoreNlpClient>,
}

impl CoreNlpOpenIe {
    #[must_use]
    pub const fn new(client: Arc<CoreNlpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RelationExtractor for CoreNlpOpenIe {
    async fn process(&self, text: &str) -> Result<Vec<Triple>> {
        let doc = self.client.annotate(text, OPENIE_ANNOTATORS).await?;

        Ok(doc
            .sentences
            .into_iter()
            .flat_map(|sentence| sentence.openie)
            .map(|rel| Triple::new(rel.subject, rel.relation, rel.object))
            .collect())
    }
}

/// Extractor that shells out to the Stanford OpenIE corpus script
///
/// The script is invoked as `<script> <input file> <output file>` from its
/// own directory, matching how the script locates its jars.
#[derive(Debug, Clone)]
pub struct OpenIeScript {
    script: PathBuf,
    interpreter: Option<String>,
}

impl OpenIeScript {
    #[must_use]
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            interpreter: None,
        }
    }

    /// Run the script through an interpreter (`sh`, `bash`) instead of
    /// executing it directly
    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    #[must_use]
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Run the script on a file already on disk and parse its output
    ///
    /// # Errors
    ///
    /// Returns [`Error::Collaborator`] if the script cannot be launched or
    /// exits unsuccessfully
    pub async fn process_file(&self, input: &Path, output: &Path) -> Result<Vec<Triple>> {
        // Relative paths must survive the change of working directory.
        let script = std::path::absolute(&self.script)?;
        let input = std::path::absolute(input)?;
        let output = std::path::absolute(output)?;

        let mut command = match &self.interpreter {
            Some(interpreter) => {
                let mut command = Command::new(interpreter);
                command.arg(&script);
                command
            }
            None => Command::new(&script),
        };
        command.arg(&input).arg(&output);
        if let Some(dir) = script.parent() {
            command.current_dir(dir);
        }

        tracing::info!(script = %self.script.display(), input = %input.display(), "Running OpenIE");

        let result = command.output().await.map_err(|e| {
            Error::Collaborator(format!(
                "Failed to launch OpenIE script {}: {e}",
                self.script.display()
            ))
        })?;

        if !result.status.success() {
            return Err(Error::Collaborator(format!(
                "OpenIE script exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let contents = tokio::fs::read_to_string(&output).await?;
        Ok(parse_ollie(&contents))
    }
}

#[async_trait]
impl RelationExtractor for OpenIeScript {
    async fn process(&self, text: &str) -> Result<Vec<Triple>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.txt");
        let output = dir.path().join("input.txt-out.csv");
        tokio::fs::write(&input, text).await?;

        self.process_file(&input, &output).await
    }
}

/// Parse Ollie-formatted OpenIE output, skipping lines that are not triples
#[must_use]
pub fn parse_ollie(output: &str) -> Vec<Triple> {
    output
        .lines()
        .filter_map(|line| {
            let caps = OLLIE_LINE.captures(line)?;
            let triple = Triple::new(caps[2].trim(), caps[3].trim(), caps[4].trim());
            Some(match caps.get(1).and_then(|c| c.as_str().parse::<f64>().ok()) {
                Some(confidence) => triple.with_confidence(confidence),
                None => triple,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ollie() {
        let output = "\
1.000: (Varun; went; home)
0.871: (Varun; was; tired)
Processing file input.txt
(Acme Corp; was founded in; 1999)
";
        let triples = parse_ollie(output);

        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0], Triple::new("Varun", "went", "home").with_confidence(1.0));
        assert_eq!(triples[1].confidence, Some(0.871));
        assert_eq!(triples[2].relation, "was founded in");
        assert_eq!(triples[2].confidence, None);
    }

    #[test]
    fn test_parse_ollie_ignores_noise() {
        assert!(parse_ollie("").is_empty());
        assert!(parse_ollie("Loading clauses... done [0.5 sec]").is_empty());
    }

    #[tokio::test]
    async fn test_missing_script_is_collaborator_error() {
        let extractor = OpenIeScript::new("/nonexistent/process_large_corpus.sh");
        let err = extractor.process("Varun went home.").await.unwrap_err();
        assert!(matches!(err, Error::Collaborator(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_output_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("process_large_corpus.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '1.000: (Varun; went; home)' > \"$2\"\n",
        )
        .unwrap();

        let triples = OpenIeScript::new(&script)
            .with_interpreter("sh")
            .process("Varun went home.")
            .await
            .unwrap();

        assert_eq!(triples, vec![Triple::new("Varun", "went", "home").with_confidence(1.0)]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_script_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "echo 'no java' >&2\nexit 3\n").unwrap();

        let err = OpenIeScript::new(&script)
            .with_interpreter("sh")
            .process("Varun went home.")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Collaborator(msg) if msg.contains("no java")));
    }
}
