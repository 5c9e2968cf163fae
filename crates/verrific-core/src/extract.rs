//! Reference extraction from GROBID TEI output.
//!
//! Entries are taken from `listBibl/biblStruct`; documents that deviate from the
//! expected layout fall back to every `biblStruct` in the document.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Reference;
use crate::tei::{self, Element};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("TEI path not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extract references from a TEI file on disk.
///
/// Fails only when the file is missing or unreadable. Malformed markup yields
/// whatever entries could be recovered.
pub fn extract_references(path: &Path) -> Result<Vec<Reference>, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let refs = extract_references_from_bytes(&bytes);
    tracing::info!(path = %path.display(), count = refs.len(), "extracted references");
    Ok(refs)
}

pub fn extract_references_from_str(input: &str) -> Vec<Reference> {
    extract_references_from_bytes(input.as_bytes())
}

pub fn extract_references_from_bytes(input: &[u8]) -> Vec<Reference> {
    let root = tei::parse(input);
    bibl_structs(&root)
        .into_iter()
        .map(reference_from_bibl_struct)
        .collect()
}

fn bibl_structs(root: &Element) -> Vec<&Element> {
    let listed: Vec<&Element> = root.find_tei_children("listBibl", "biblStruct").collect();
    if !listed.is_empty() {
        tracing::debug!(count = listed.len(), "biblStruct entries found under listBibl");
        return listed;
    }
    let anywhere: Vec<&Element> = root.find_tei("biblStruct").collect();
    tracing::debug!(count = anywhere.len(), "no listBibl entries, using document-wide biblStruct");
    anywhere
}

fn reference_from_bibl_struct(entry: &Element) -> Reference {
    Reference::new(
        doi(entry),
        title(entry),
        first_author_surname(entry),
        raw(entry),
    )
}

fn doi(entry: &Element) -> Option<String> {
    first_text(
        entry
            .find_tei("idno")
            .filter(|idno| idno.attr("type") == Some("DOI")),
    )
}

/// Article-level title first, then the container's.
fn title(entry: &Element) -> Option<String> {
    first_text(entry.find_tei_children("analytic", "title"))
        .or_else(|| first_text(entry.find_tei_children("monogr", "title")))
}

/// Surname of the first analytic author, falling back to monographic authors
/// (e.g. book authors or editors listed as authors).
fn first_author_surname(entry: &Element) -> Option<String> {
    ["analytic", "monogr"].into_iter().find_map(|context| {
        let authors = entry
            .find_tei(context)
            .flat_map(|ctx| ctx.find_tei("author"));
        first_text(authors.flat_map(|author| author.find_tei("surname")))
    })
}

/// The raw citation note, or the concatenation of the entry's text.
/// [`Reference::new`] applies the length bound.
fn raw(entry: &Element) -> Option<String> {
    let note = first_text(
        entry
            .find_tei("note")
            .filter(|note| note.attr("type") == Some("raw_reference")),
    );
    if note.is_some() {
        return note;
    }
    let joined = entry.text_fragments().join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn first_text<'a>(mut elements: impl Iterator<Item = &'a Element>) -> Option<String> {
    elements.find_map(|el| {
        let text = el.text();
        (!text.is_empty()).then_some(text)
    })
}
