//! `lopdf`-backed [`PdfRemediator`].
//!
//! Every pass rewrites the Info dictionary and the catalog `/Lang`; the
//! remaining edits are keyed off words in the issue types:
//!
//! | issue type mentions | edit                                          |
//! |---------------------|-----------------------------------------------|
//! | `title`             | `/ViewerPreferences /DisplayDocTitle true`     |
//! | `tagged`            | `/MarkInfo /Marked true` (needs a struct tree) |
//! | `tab order`         | `/Tabs /S` on every page                       |
//!
//! Alt text goes onto `/Figure` elements matched to an image through their
//! marked-content ids (`/Pg` + `MCID` and the page's `Do` operators) or an
//! `OBJR` reference.

use super::images::{image_id, page_image, page_resource, resolve};
use super::{AltTextOutcome, DocumentMetadata, PdfRemediator};
use crate::error::RemediationError;
use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

const DEFAULT_PRODUCER: &str = concat!("edgequake-pdf-a11y ", env!("CARGO_PKG_VERSION"));

pub struct LopdfRemediator {
    producer: String,
}

impl Default for LopdfRemediator {
    fn default() -> Self {
        Self {
            producer: DEFAULT_PRODUCER.to_string(),
        }
    }
}

impl LopdfRemediator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }
}

impl PdfRemediator for LopdfRemediator {
    fn remediate(
        &self,
        pdf: &[u8],
        issue_types: &[String],
        metadata: &DocumentMetadata,
    ) -> Result<Vec<u8>, RemediationError> {
        let mut doc = Document::load_mem(pdf)?;
        let mentions = |needle: &str| {
            issue_types
                .iter()
                .any(|t| t.to_lowercase().contains(needle))
        };

        write_info(&mut doc, metadata, &self.producer, Utc::now())?;

        let root = catalog_id(&doc)?;
        dict_mut(&mut doc, root, "Root")?.set("Lang", pdf_text(&metadata.language));

        if mentions("title") {
            update_sub_dictionary(&mut doc, root, b"ViewerPreferences", |prefs| {
                prefs.set("DisplayDocTitle", true);
            })?;
        }

        if mentions("tagged") {
            if dict(&doc, root, "Root")?.has(b"StructTreeRoot") {
                update_sub_dictionary(&mut doc, root, b"MarkInfo", |info| {
                    info.set("Marked", true);
                })?;
            } else {
                // Marking an untagged file as tagged would misreport it.
                debug!("No structure tree; leaving MarkInfo unset");
            }
        }

        if mentions("tab order") {
            for (_, page_id) in doc.get_pages() {
                dict_mut(&mut doc, page_id, "Page")?.set("Tabs", Object::Name(b"S".to_vec()));
            }
        }

        save(doc)
    }

    fn apply_alt_text(
        &self,
        pdf: &[u8],
        alt_texts: &[(String, String)],
    ) -> Result<AltTextOutcome, RemediationError> {
        let mut doc = Document::load_mem(pdf)?;
        let root = catalog_id(&doc)?;
        let tree = dict(&doc, root, "Root")?
            .get(b"StructTreeRoot")
            .map_err(|_| RemediationError::MissingStructure("StructTreeRoot"))?
            .clone();

        let figures = figures_without_alt(&doc, &tree);
        if figures.is_empty() {
            return Err(RemediationError::MissingStructure("Figure"));
        }

        let texts: HashMap<&str, &str> = alt_texts
            .iter()
            .map(|(id, text)| (id.as_str(), text.as_str()))
            .collect();
        let mut marked = MarkedContent::default();
        let mut writes = Vec::new();
        for id in &figures {
            let images = figure_images(&doc, *id, &mut marked);
            match images.as_slice() {
                [image] => {
                    if let Some(text) = texts.get(image_id(*image).as_str()) {
                        writes.push((*id, *text));
                    }
                }
                [] => debug!("Figure {} has no resolvable image", id.0),
                many => debug!("Figure {} shows {} images; leaving it alone", id.0, many.len()),
            }
        }
        if writes.is_empty() {
            return Err(RemediationError::MissingStructure("Figure image reference"));
        }

        for (id, text) in &writes {
            dict_mut(&mut doc, *id, "Figure")?.set("Alt", pdf_text(text));
        }
        let applied = writes.len();
        debug!("Applied alt text to {} of {} figures", applied, figures.len());
        Ok(AltTextOutcome {
            pdf: save(doc)?,
            applied,
            remaining: figures.len() - applied,
        })
    }
}

// ── Document helpers ─────────────────────────────────────────────────────────

fn save(mut doc: Document) -> Result<Vec<u8>, RemediationError> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| RemediationError::Serialise(e.to_string()))?;
    Ok(out)
}

fn catalog_id(doc: &Document) -> Result<ObjectId, RemediationError> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| RemediationError::MissingStructure("Root"))
}

fn dict<'a>(
    doc: &'a Document,
    id: ObjectId,
    what: &'static str,
) -> Result<&'a Dictionary, RemediationError> {
    doc.get_object(id)
        .and_then(Object::as_dict)
        .map_err(|_| RemediationError::MissingStructure(what))
}

fn dict_mut<'a>(
    doc: &'a mut Document,
    id: ObjectId,
    what: &'static str,
) -> Result<&'a mut Dictionary, RemediationError> {
    doc.get_object_mut(id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| RemediationError::MissingStructure(what))
}

/// Edit `owner[key]` whether it is an indirect or a direct dictionary,
/// creating it when absent.
fn update_sub_dictionary(
    doc: &mut Document,
    owner: ObjectId,
    key: &[u8],
    update: impl FnOnce(&mut Dictionary),
) -> Result<(), RemediationError> {
    let existing = dict(doc, owner, "Root")?.get(key).ok().cloned();
    let mut sub = match existing {
        Some(Object::Reference(id)) => {
            if let Ok(target) = doc.get_object_mut(id).and_then(Object::as_dict_mut) {
                update(target);
                return Ok(());
            }
            Dictionary::new()
        }
        Some(Object::Dictionary(d)) => d,
        _ => Dictionary::new(),
    };
    update(&mut sub);
    dict_mut(doc, owner, "Root")?.set(key.to_vec(), sub);
    Ok(())
}

fn write_info(
    doc: &mut Document,
    metadata: &DocumentMetadata,
    producer: &str,
    at: DateTime<Utc>,
) -> Result<(), RemediationError> {
    let info_id = match doc.trailer.get(b"Info").and_then(Object::as_reference) {
        Ok(id) => id,
        Err(_) => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", Object::Reference(id));
            id
        }
    };
    let info = dict_mut(doc, info_id, "Info")?;
    info.set("Title", pdf_text(&metadata.title));
    info.set("Author", pdf_text(&metadata.author));
    info.set("Subject", pdf_text(&metadata.subject));
    info.set("Producer", pdf_text(producer));
    info.set("ModDate", Object::string_literal(pdf_date(at)));
    Ok(())
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn pdf_text(s: &str) -> Object {
    if s.is_ascii() {
        return Object::string_literal(s);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn pdf_date(at: DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}

// ── Structure tree ───────────────────────────────────────────────────────────

/// Indirect `/Figure` elements without `/Alt`, depth-first in document order.
fn figures_without_alt(doc: &Document, tree: &Object) -> Vec<ObjectId> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    walk_struct(doc, tree, &mut seen, &mut found);
    found
}

fn walk_struct(
    doc: &Document,
    node: &Object,
    seen: &mut HashSet<ObjectId>,
    found: &mut Vec<ObjectId>,
) {
    match node {
        Object::Reference(id) => {
            if !seen.insert(*id) {
                return;
            }
            if let Ok(elem) = doc.get_object(*id).and_then(Object::as_dict) {
                if is_figure(elem) && !elem.has(b"Alt") {
                    found.push(*id);
                }
                if let Ok(kids) = elem.get(b"K") {
                    walk_struct(doc, kids, seen, found);
                }
            }
        }
        Object::Array(items) => {
            for item in items {
                walk_struct(doc, item, seen, found);
            }
        }
        // Direct elements cannot be addressed for editing; descend only.
        Object::Dictionary(elem) => {
            if let Ok(kids) = elem.get(b"K") {
                walk_struct(doc, kids, seen, found);
            }
        }
        _ => {}
    }
}

fn is_figure(elem: &Dictionary) -> bool {
    matches!(elem.get(b"S"), Ok(Object::Name(name)) if name.as_slice() == b"Figure")
}

// ── Figure → image resolution ───────────────────────────────────────────────

/// Image XObjects drawn inside each marked-content sequence, per page.
#[derive(Default)]
struct MarkedContent {
    pages: HashMap<ObjectId, HashMap<i64, Vec<ObjectId>>>,
}

impl MarkedContent {
    fn images(&mut self, doc: &Document, page: ObjectId, mcid: i64) -> &[ObjectId] {
        self.pages
            .entry(page)
            .or_insert_with(|| scan_page(doc, page))
            .get(&mcid)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Distinct images a figure element displays, through its marked-content
/// references (`MCID` on `/Pg`) and object references (`OBJR`).
fn figure_images(doc: &Document, figure: ObjectId, marked: &mut MarkedContent) -> Vec<ObjectId> {
    let mut found = BTreeSet::new();
    if let Ok(elem) = doc.get_object(figure).and_then(Object::as_dict) {
        let page = elem.get(b"Pg").and_then(Object::as_reference).ok();
        if let Ok(kids) = elem.get(b"K") {
            collect_content(doc, kids, page, marked, &mut found);
        }
    }
    found.into_iter().collect()
}

fn collect_content(
    doc: &Document,
    node: &Object,
    page: Option<ObjectId>,
    marked: &mut MarkedContent,
    found: &mut BTreeSet<ObjectId>,
) {
    match node {
        Object::Integer(mcid) => {
            if let Some(page) = page {
                found.extend(marked.images(doc, page, *mcid).iter().copied());
            }
        }
        Object::Array(items) => {
            for item in items {
                collect_content(doc, item, page, marked, found);
            }
        }
        Object::Dictionary(kid) => content_reference(doc, kid, page, marked, found),
        Object::Reference(id) => {
            if let Ok(kid) = doc.get_object(*id).and_then(Object::as_dict) {
                content_reference(doc, kid, page, marked, found);
            }
        }
        _ => {}
    }
}

/// `MCR` and `OBJR` kids. Nested structure elements are not followed.
fn content_reference(
    doc: &Document,
    kid: &Dictionary,
    page: Option<ObjectId>,
    marked: &mut MarkedContent,
    found: &mut BTreeSet<ObjectId>,
) {
    match kid.get(b"Type").and_then(Object::as_name) {
        Ok(b"MCR") => {
            let page = kid.get(b"Pg").and_then(Object::as_reference).ok().or(page);
            if let (Some(page), Ok(mcid)) = (page, kid.get(b"MCID").and_then(Object::as_i64)) {
                found.extend(marked.images(doc, page, mcid).iter().copied());
            }
        }
        Ok(b"OBJR") => {
            let Ok(target) = kid.get(b"Obj").and_then(Object::as_reference) else {
                return;
            };
            let is_image = doc
                .get_object(target)
                .and_then(Object::as_stream)
                .map(|s| s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice()))
                .unwrap_or(false);
            if is_image {
                found.insert(target);
            }
        }
        _ => {}
    }
}

/// Map each MCID on a page to the images painted (`Do`) while it is the
/// innermost open marked-content id.
fn scan_page(doc: &Document, page_id: ObjectId) -> HashMap<i64, Vec<ObjectId>> {
    let mut map: HashMap<i64, Vec<ObjectId>> = HashMap::new();
    let content = match doc.get_and_decode_page_content(page_id) {
        Ok(content) => content,
        Err(e) => {
            debug!("Page {} content unreadable: {}", page_id.0, e);
            return map;
        }
    };
    let properties = page_resource(doc, page_id, b"Properties");

    let mut open: Vec<Option<i64>> = Vec::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "BMC" => open.push(None),
            "BDC" => open.push(op.operands.get(1).and_then(|p| mcid_of(doc, p, properties))),
            "EMC" => {
                open.pop();
            }
            "Do" => {
                let image = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| page_image(doc, page_id, name));
                if let (Some(image), Some(mcid)) = (image, open.iter().rev().find_map(|m| *m)) {
                    map.entry(mcid).or_default().push(image);
                }
            }
            _ => {}
        }
    }
    map
}

/// MCID from an inline property list or a named `/Properties` entry.
fn mcid_of(doc: &Document, props: &Object, named: Option<&Dictionary>) -> Option<i64> {
    let dict = match props {
        Object::Dictionary(d) => d,
        Object::Name(name) => resolve(doc, named?.get(name).ok()?).as_dict().ok()?,
        _ => return None,
    };
    dict.get(b"MCID").and_then(Object::as_i64).ok()
}
