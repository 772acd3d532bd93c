//! Knowledge graph assembled from named entities and extracted relations
//!
//! Every subject and object becomes a node `<base>/entity/<name>` labelled with
//! its surface text, every relation an edge `<base>/relation/<stem>`, and every
//! known entity gets an `rdf:type` of `<base>/type/<TYPE>`. The graph can be
//! written as N-Triples or loaded into an in-memory Oxigraph store for SPARQL.

use oxigraph::model::{GraphName, Literal, NamedNode, Quad, Term, Triple as RdfTriple};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::normalize::{normalize_entity_name, normalize_predicate};
use crate::types::{EntityMap, Triple};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

/// Entities and relation triples of one or more documents
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    entities: EntityMap,
    triples: Vec<Triple>,
}

impl KnowledgeGraph {
    #[must_use]
    pub fn new(entities: EntityMap) -> Self {
        Self {
            entities,
            triples: Vec::new(),
        }
    }

    pub fn add_triple(&mut self, triple: Triple) {
        self.triples.push(triple);
    }

    pub fn extend(&mut self, triples: impl IntoIterator<Item = Triple>) {
        self.triples.extend(triples);
    }

    #[must_use]
    pub const fn entities(&self) -> &EntityMap {
        &self.entities
    }

    #[must_use]
    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Drop triples repeating an earlier one, ignoring case and surrounding
    /// whitespace; the first occurrence is kept
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.triples.retain(|t| {
            seen.insert((
                t.subject.trim().to_lowercase(),
                t.relation.trim().to_lowercase(),
                t.object.trim().to_lowercase(),
            ))
        });
    }

    /// Triples whose subject matches `subject`, ignoring case
    #[must_use]
    pub fn triples_about(&self, subject: &str) -> Vec<&Triple> {
        let subject = subject.trim().to_lowercase();
        self.triples
            .iter()
            .filter(|t| t.subject.trim().to_lowercase() == subject)
            .collect()
    }

    /// Serialize the graph as N-Triples, one statement per line
    ///
    /// Entity type statements come first (sorted by entity), followed by the
    /// relation statements in extraction order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Graph`] if `base_iri` does not produce valid IRIs
    pub fn to_ntriples(&self, base_iri: &str) -> Result<String> {
        let mut out = String::new();
        for triple in self.rdf_triples(base_iri)? {
            out.push_str(&triple.to_string());
            out.push_str(" .\n");
        }
        Ok(out)
    }

    /// Load the graph into a fresh in-memory store
    ///
    /// # Errors
    ///
    /// Returns [`Error::Graph`] if an IRI is invalid or the store fails
    pub fn to_store(&self, base_iri: &str) -> Result<Store> {
        let store = Store::new().map_err(|e| Error::Graph(e.to_string()))?;
        for triple in self.rdf_triples(base_iri)? {
            let quad = Quad::new(
                triple.subject,
                triple.predicate,
                triple.object,
                GraphName::DefaultGraph,
            );
            store
                .insert(&quad)
                .map_err(|e| Error::Graph(e.to_string()))?;
        }
        Ok(store)
    }

    fn rdf_triples(&self, base_iri: &str) -> Result<Vec<RdfTriple>> {
        let iris = Iris::new(base_iri)?;
        let mut out = Vec::new();
        let mut labelled = HashSet::new();

        for name in self.entities.sorted_names() {
            let node = iris.entity(name)?;
            let entity_type = self.entities.entity_type(name).unwrap_or_default();
            out.push(RdfTriple::new(node.clone(), iris.rdf_type.clone(), iris.type_node(entity_type)?));
            if labelled.insert(node.clone()) {
                out.push(label(&iris, node, name));
            }
        }

        for triple in &self.triples {
            let subject = iris.entity(&triple.subject)?;
            let object = iris.entity(&triple.object)?;
            out.push(RdfTriple::new(
                subject.clone(),
                iris.relation(&triple.relation)?,
                object.clone(),
            ));
            if labelled.insert(subject.clone()) {
                out.push(label(&iris, subject, &triple.subject));
            }
            if labelled.insert(object.clone()) {
                out.push(label(&iris, object, &triple.object));
            }
        }

        Ok(out)
    }
}

fn label(iris: &Iris, node: NamedNode, text: &str) -> RdfTriple {
    RdfTriple::new(node, iris.rdfs_label.clone(), Literal::new_simple_literal(text))
}

/// IRI factory for one base namespace
struct Iris {
    base: String,
    rdf_type: NamedNode,
    rdfs_label: NamedNode,
}

impl Iris {
    fn new(base_iri: &str) -> Result<Self> {
        Ok(Self {
            base: base_iri.trim_end_matches('/').to_string(),
            rdf_type: named(RDF_TYPE)?,
            rdfs_label: named(RDFS_LABEL)?,
        })
    }

    fn entity(&self, name: &str) -> Result<NamedNode> {
        named(&format!("{}/entity/{}", self.base, normalize_entity_name(name)))
    }

    fn relation(&self, relation: &str) -> Result<NamedNode> {
        named(&format!("{}/relation/{}", self.base, normalize_predicate(relation)))
    }

    fn type_node(&self, entity_type: &str) -> Result<NamedNode> {
        named(&format!("{}/type/{}", self.base, normalize_entity_name(entity_type)))
    }
}

fn named(iri: &str) -> Result<NamedNode> {
    NamedNode::new(iri).map_err(|e| Error::Graph(format!("Invalid IRI '{iri}': {e}")))
}

/// Labels of every object linked from the node labelled `subject` by
/// `relation`
///
/// # Errors
///
/// Returns [`Error::Graph`] if the query fails
#[allow(deprecated)]
pub fn objects_of(store: &Store, base_iri: &str, subject: &str, relation: &str) -> Result<Vec<String>> {
    let predicate = Iris::new(base_iri)?.relation(relation)?;
    let query = format!(
        "SELECT ?label WHERE {{ ?s <{RDFS_LABEL}> {subject} . ?s {predicate} ?o . ?o <{RDFS_LABEL}> ?label }} ORDER BY ?label",
        subject = Literal::new_simple_literal(subject),
    );

    let results = store
        .query(query.as_str())
        .map_err(|e| Error::Graph(format!("SPARQL query failed: {e}")))?;

    let mut labels = Vec::new();
    if let QueryResults::Solutions(solutions) = results {
        for solution in solutions {
            let solution = solution.map_err(|e| Error::Graph(format!("Query solution error: {e}")))?;
            if let Some(Term::Literal(lit)) = solution.get("label") {
                labels.push(lit.value().to_string());
            }
        }
    }

    Ok(labels)
}
