use lopdf::{Dictionary, Document, Object};
use quick_xml::Reader;
use quick_xml::events::Event;

use super::{is_facturx_filename, is_invoice_filename};
use crate::core::FacturxError;

/// An invoice attachment found in a PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct FacturxAttachment {
    /// Embedded file name (`factur-x.xml`, `xrechnung.xml`, ...).
    pub filename: String,
    /// Raw attachment bytes.
    pub xml: Vec<u8>,
    /// `/AFRelationship` of the file specification, if set.
    pub af_relationship: Option<String>,
    /// `fx:ConformanceLevel` from the XMP metadata, if present.
    pub conformance_level: Option<String>,
}

/// Extract the Factur-X/ZUGFeRD XML from a PDF.
///
/// Searches the `/Names /EmbeddedFiles` tree first, then the `/AF` array.
pub fn extract_xml(pdf_bytes: &[u8]) -> Result<Vec<u8>, FacturxError> {
    inspect(pdf_bytes).map(|a| a.xml)
}

/// Locate the invoice attachment and report how it is declared.
pub fn inspect(pdf_bytes: &[u8]) -> Result<FacturxAttachment, FacturxError> {
    let doc = Document::load_mem(pdf_bytes)
        .map_err(|e| FacturxError::Pdf(format!("failed to load PDF: {e}")))?;

    let (filename, filespec) = find_via_names(&doc)
        .or_else(|_| find_via_af(&doc))
        .map_err(|e| FacturxError::Pdf(format!("no Factur-X XML found in PDF: {e}")))?;

    let xml = read_embedded_file(&doc, filespec).map_err(FacturxError::Pdf)?;
    let af_relationship = filespec
        .get(b"AFRelationship")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).into_owned());

    Ok(FacturxAttachment {
        filename,
        xml,
        af_relationship,
        conformance_level: conformance_level(&doc),
    })
}

fn find_via_names(doc: &Document) -> Result<(String, &Dictionary), String> {
    let catalog = doc.catalog().map_err(|e| e.to_string())?;
    let names_dict = resolve_dict(doc, catalog.get(b"Names").map_err(|e| e.to_string())?)?;
    let ef_dict = resolve_dict(
        doc,
        names_dict.get(b"EmbeddedFiles").map_err(|e| e.to_string())?,
    )?;

    let mut entries = Vec::new();
    collect_name_tree(doc, ef_dict, &mut entries, 0);

    let named: Vec<(String, &Object)> = entries
        .into_iter()
        .map(|(name, value)| (pdf_string(&name), value))
        .collect();
    match pick_invoice(&named, |(name, _)| name) {
        Some((name, value)) => Ok((name.clone(), resolve_dict(doc, *value)?)),
        None => Err("no invoice in EmbeddedFiles name tree".to_string()),
    }
}

fn find_via_af(doc: &Document) -> Result<(String, &Dictionary), String> {
    let catalog = doc.catalog().map_err(|e| e.to_string())?;
    let af_obj = resolve_obj(doc, catalog.get(b"AF").map_err(|e| e.to_string())?)?;
    let af_array = af_obj.as_array().map_err(|e| e.to_string())?;

    let mut named = Vec::new();
    for obj in af_array {
        let fs_dict = resolve_dict(doc, obj)?;
        named.push((filespec_name(fs_dict).unwrap_or_default(), fs_dict));
    }
    match pick_invoice(&named, |(name, _)| name) {
        Some((name, fs_dict)) => Ok((name.clone(), *fs_dict)),
        None => Err("no invoice in AF array".to_string()),
    }
}

/// Prefer a standard invoice file name, then any name that mentions
/// Factur-X or ZUGFeRD.
fn pick_invoice<T>(candidates: &[T], name: impl Fn(&T) -> &String) -> Option<&T> {
    candidates
        .iter()
        .find(|c| is_invoice_filename(name(*c)))
        .or_else(|| candidates.iter().find(|c| is_facturx_filename(name(*c))))
}

fn read_embedded_file(doc: &Document, fs_dict: &Dictionary) -> Result<Vec<u8>, String> {
    let ef_dict = resolve_dict(doc, fs_dict.get(b"EF").map_err(|e| e.to_string())?)?;
    let f_obj = ef_dict
        .get(b"UF")
        .or_else(|_| ef_dict.get(b"F"))
        .map_err(|e| e.to_string())?;
    let stream = resolve_obj(doc, f_obj)?
        .as_stream()
        .map_err(|e| e.to_string())?;

    // decompressed_content() fails if no Filter key exists (uncompressed stream),
    // so fall back to raw content in that case.
    Ok(stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone()))
}

/// `fx:ConformanceLevel` of the catalog's XMP packet.
fn conformance_level(doc: &Document) -> Option<String> {
    let catalog = doc.catalog().ok()?;
    let stream = resolve_obj(doc, catalog.get(b"Metadata").ok()?)
        .ok()?
        .as_stream()
        .ok()?;
    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let xmp = String::from_utf8(content).ok()?;

    let mut reader = Reader::from_str(&xmp);
    reader.config_mut().trim_text(true);
    let mut inside = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => inside = e.local_name().as_ref() == b"ConformanceLevel",
            Ok(Event::Text(t)) if inside => {
                return t.unescape().ok().map(|s| s.into_owned());
            }
            Ok(Event::End(_)) => inside = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Flatten a name tree into `(key, value)` pairs, following `/Kids`.
pub(super) fn collect_name_tree<'a>(
    doc: &'a Document,
    node: &'a Dictionary,
    out: &mut Vec<(Vec<u8>, &'a Object)>,
    depth: usize,
) {
    if depth > 32 {
        return;
    }
    if let Some(names) = node
        .get(b"Names")
        .ok()
        .and_then(|o| resolve_obj(doc, o).ok())
        .and_then(|o| o.as_array().ok())
    {
        for pair in names.chunks(2) {
            if let [key, value] = pair {
                if let Object::String(bytes, _) = key {
                    out.push((bytes.clone(), value));
                }
            }
        }
    }
    if let Some(kids) = node
        .get(b"Kids")
        .ok()
        .and_then(|o| resolve_obj(doc, o).ok())
        .and_then(|o| o.as_array().ok())
    {
        for kid in kids {
            if let Ok(kid) = resolve_dict(doc, kid) {
                collect_name_tree(doc, kid, out, depth + 1);
            }
        }
    }
}

pub(super) fn filespec_name(fs_dict: &Dictionary) -> Option<String> {
    fs_dict
        .get(b"UF")
        .or_else(|_| fs_dict.get(b"F"))
        .ok()
        .and_then(|o| match o {
            Object::String(bytes, _) => Some(pdf_string(bytes)),
            _ => None,
        })
}

pub(super) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Dictionary, String> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).map_err(|e| e.to_string()),
        Object::Dictionary(d) => Ok(d),
        _ => Err("expected dictionary or reference".to_string()),
    }
}

pub(super) fn resolve_obj<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, String> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).map_err(|e| e.to_string()),
        other => Ok(other),
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, otherwise byte-wise).
pub(super) fn pdf_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|&b| b as char).collect(),
    }
}
