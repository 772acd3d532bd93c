//! Directory-at-a-time graph building
//!
//! For every input file `<stem>.<ext>` the outputs are:
//! - `ner/named_entity_<stem>.json`: the named entity map
//! - `kg/<stem>.txt`: the coreference-resolved text
//! - `kg/<stem>.txt-out.csv`: extracted `subject,relation,object` rows
//! - `kg/<stem>.nt`: the graph as N-Triples
//!
//! A file that cannot be read, built or written is logged and skipped.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::pipeline::{KgOutput, KnowledgeGraphBuilder};

/// Counts of a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: Vec<PathBuf>,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    subject: &'a str,
    relation: &'a str,
    object: &'a str,
}

/// Regular files of `dir`, sorted by path
///
/// # Errors
///
/// Returns an error if the directory cannot be listed
pub fn input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Read a document, joining its lines without a separator
///
/// # Errors
///
/// Returns an error if the file cannot be read as UTF-8
pub fn read_document(file: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(file)?.lines().collect())
}

/// Build and write the outputs of one file
///
/// # Errors
///
/// Returns the first read, pipeline or write error
pub async fn process_file(
    builder: &KnowledgeGraphBuilder,
    file: &Path,
    output_dir: &Path,
    base_iri: &str,
) -> Result<KgOutput> {
    let text = read_document(file)?;
    let output = builder.build(&text).await?;
    write_outputs(output_dir, &file_stem(file), &output, base_iri)?;
    Ok(output)
}

/// Process every file, continuing past failures
pub async fn process_files(
    builder: &KnowledgeGraphBuilder,
    files: &[PathBuf],
    output_dir: &Path,
    base_iri: &str,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for file in files {
        tracing::info!(file = %file.display(), "Processing");

        match process_file(builder, file, output_dir, base_iri).await {
            Ok(output) => {
                summary.processed += 1;
                tracing::info!(
                    file = %file.display(),
                    entities = output.entities.len(),
                    triples = output.graph.len(),
                    "Outputs written"
                );
            }
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "Skipping file");
                summary.failed.push(file.clone());
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        failed = summary.failed.len(),
        "Batch complete"
    );

    summary
}

/// Write the four output files of one document
///
/// # Errors
///
/// Returns an error if a directory or file cannot be written
pub fn write_outputs(output_dir: &Path, stem: &str, output: &KgOutput, base_iri: &str) -> Result<()> {
    let ner_dir = output_dir.join("ner");
    let kg_dir = output_dir.join("kg");
    std::fs::create_dir_all(&ner_dir)?;
    std::fs::create_dir_all(&kg_dir)?;

    std::fs::write(
        ner_dir.join(format!("named_entity_{stem}.json")),
        serde_json::to_string_pretty(&output.entities)?,
    )?;

    std::fs::write(kg_dir.join(format!("{stem}.txt")), &output.resolved_text)?;

    let mut writer = csv::Writer::from_path(kg_dir.join(format!("{stem}.txt-out.csv")))?;
    for triple in output.graph.triples() {
        writer.serialize(CsvRow {
            subject: &triple.subject,
            relation: &triple.relation,
            object: &triple.object,
        })?;
    }
    writer.flush()?;

    std::fs::write(
        kg_dir.join(format!("{stem}.nt")),
        output.graph.to_ntriples(base_iri)?,
    )?;

    Ok(())
}

fn file_stem(file: &Path) -> String {
    file.file_stem()
        .map_or_else(|| "document".to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::KnowledgeGraph;
    use crate::types::{EntityMap, Triple};

    #[test]
    fn test_read_document_joins_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Varun went home.\nHe was tired.\n").unwrap();

        assert_eq!(read_document(&path).unwrap(), "Varun went home.He was tired.");
    }

    #[test]
    fn test_input_files_sorted_and_skip_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let names: Vec<String> = input_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_stem(p))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_write_outputs_layout() {
        let dir = tempfile::tempdir().unwrap();
        let entities: EntityMap = [("Varun", "PERSON")].into_iter().collect();
        let mut graph = KnowledgeGraph::new(entities.clone());
        graph.add_triple(Triple::new("Varun", "went to", "home, again"));
        let output = KgOutput {
            entities,
            resolved_text: "Varun went home . ".to_string(),
            graph,
        };

        write_outputs(dir.path(), "doc", &output, "http://example.org/kg/").unwrap();

        let csv = std::fs::read_to_string(dir.path().join("kg/doc.txt-out.csv")).unwrap();
        assert_eq!(csv, "subject,relation,object\nVarun,went to,\"home, again\"\n");
        let ner = std::fs::read_to_string(dir.path().join("ner/named_entity_doc.json")).unwrap();
        assert!(ner.contains("\"Varun\": \"PERSON\""));
        assert!(dir.path().join("kg/doc.txt").exists());
        assert!(dir.path().join("kg/doc.nt").exists());
    }
}
