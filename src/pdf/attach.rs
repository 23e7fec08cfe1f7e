use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::extract::{collect_name_tree, filespec_name, pdf_string, resolve_dict, resolve_obj};
use super::xmp::{self, XmpInfo};
use super::{FacturxLevel, is_invoice_filename};
use crate::cii;
use crate::core::{DocumentTypeCode, FacturxError};

const DEFAULT_PRODUCER: &str = concat!("facturx ", env!("CARGO_PKG_VERSION"));

/// Settings for [`attach_xml_with`].
///
/// Fields left as `None` are derived: the level from the XML guideline,
/// title/author/subject from the invoice, the timestamp from the clock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachOptions {
    pub level: Option<FacturxLevel>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
    /// Fixed modification time for reproducible output.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Attach Factur-X XML to a PDF, producing a PDF/A-3 document.
///
/// `label` is the conformance level as written to the XMP metadata
/// (`MINIMUM`, `BASIC WL`, `BASIC`, `EN 16931`, `EXTENDED`, `XRECHNUNG`).
pub fn attach_xml(pdf_bytes: &[u8], xml: &[u8], label: &str) -> Result<Vec<u8>, FacturxError> {
    let level = label.parse::<FacturxLevel>()?;
    attach_xml_with(
        pdf_bytes,
        xml,
        &AttachOptions {
            level: Some(level),
            ..Default::default()
        },
    )
}

/// Attach Factur-X XML to a PDF with explicit options.
pub fn attach_xml_with(
    pdf_bytes: &[u8],
    xml: &[u8],
    options: &AttachOptions,
) -> Result<Vec<u8>, FacturxError> {
    let invoice = cii::parse(xml)?;
    let guideline = invoice.context.guideline_id.as_str();
    let declared = FacturxLevel::from_urn(guideline);

    let level = match (options.level, declared) {
        (Some(level), Some(declared)) => {
            if level != declared {
                warn!(
                    label = level.label(),
                    guideline,
                    "conformance level disagrees with the XML guideline"
                );
            }
            level
        }
        (Some(level), None) => {
            warn!(label = level.label(), guideline, "unrecognized XML guideline");
            level
        }
        (None, Some(declared)) => declared,
        (None, None) => {
            return Err(FacturxError::Profile(format!(
                "cannot derive a Factur-X level from guideline '{guideline}'"
            )));
        }
    };

    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| FacturxError::Pdf(format!("failed to load PDF: {e}")))?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(FacturxError::Pdf("encrypted PDFs are not supported".into()));
    }

    let now = options.timestamp.unwrap_or_else(Utc::now);
    let kind = match invoice.header.type_code {
        DocumentTypeCode::CreditNote => "Credit note",
        _ => "Invoice",
    };
    let seller = invoice.trade.agreement.seller.name.as_str();
    let title = options
        .title
        .clone()
        .unwrap_or_else(|| format!("{seller}: {kind} {}", invoice.header.id));
    let author = options.author.clone().unwrap_or_else(|| seller.to_string());
    let subject = options.subject.clone().unwrap_or_else(|| {
        format!(
            "Factur-X {kind} {} dated {} issued by {seller}",
            invoice.header.id,
            invoice.header.issue_date.format("%Y-%m-%d")
        )
    });
    let producer = options
        .producer
        .clone()
        .unwrap_or_else(|| DEFAULT_PRODUCER.to_string());

    let creator = existing_creator(&doc).unwrap_or_else(|| producer.clone());

    debug!(level = level.label(), bytes = xml.len(), "attaching invoice XML");

    let stale = stale_attachments(&doc);
    let filespec_id = add_embedded_file(&mut doc, xml, level, &now);
    let names = embedded_files_names(&doc, &stale, level.filename(), filespec_id);
    let af = associated_files(&doc, &stale, filespec_id);
    for id in &stale {
        doc.objects.remove(id);
    }

    let xmp = xmp::build_xmp(&XmpInfo {
        level,
        title: &title,
        author: &author,
        subject: &subject,
        producer: &producer,
        creator: &creator,
        created: &xmp_date(&now),
        modified: &xmp_date(&now),
    });
    let metadata_id = doc.add_object(
        Stream::new(
            dictionary! {
                "Type" => "Metadata",
                "Subtype" => "XML",
            },
            xmp.into_bytes(),
        )
        .with_compression(false),
    );

    let names_id = doc.add_object(names);
    let catalog = doc
        .catalog_mut()
        .map_err(|e| FacturxError::Pdf(format!("failed to get catalog: {e}")))?;
    catalog.set("Names", Object::Reference(names_id));
    catalog.set("AF", Object::Array(af));
    catalog.set("Metadata", Object::Reference(metadata_id));
    catalog.set("MarkInfo", dictionary! { "Marked" => Object::Boolean(true) });

    write_info(&mut doc, &title, &author, &subject, &producer, &creator, &now);

    if doc.version.parse::<f32>().map_or(true, |v| v < 1.7) {
        debug!(from = %doc.version, "raising PDF version to 1.7");
        doc.version = "1.7".to_string();
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| FacturxError::Pdf(format!("failed to save PDF: {e}")))?;
    debug!(bytes = output.len(), "PDF written");
    Ok(output)
}

fn add_embedded_file(
    doc: &mut Document,
    xml: &[u8],
    level: FacturxLevel,
    now: &DateTime<Utc>,
) -> ObjectId {
    let ef_stream = Stream::new(
        dictionary! {
            "Type" => "EmbeddedFile",
            "Subtype" => Object::Name(b"text/xml".to_vec()),
            "Params" => dictionary! {
                "Size" => Object::Integer(xml.len() as i64),
                "ModDate" => Object::string_literal(pdf_date(now)),
            },
        },
        xml.to_vec(),
    );
    let ef_stream_id = doc.add_object(ef_stream);

    let filename = level.filename();
    let filespec = dictionary! {
        "Type" => "Filespec",
        "F" => Object::string_literal(filename),
        "UF" => Object::string_literal(filename),
        "Desc" => Object::string_literal("Factur-X XML invoice"),
        "AFRelationship" => Object::Name(level.af_relationship().as_bytes().to_vec()),
        "EF" => dictionary! {
            "F" => Object::Reference(ef_stream_id),
            "UF" => Object::Reference(ef_stream_id),
        },
    };
    doc.add_object(filespec)
}

/// Filespecs of earlier invoice attachments and their embedded streams.
fn stale_attachments(doc: &Document) -> BTreeSet<ObjectId> {
    let mut filespecs = BTreeSet::new();
    let Ok(catalog) = doc.catalog() else {
        return filespecs;
    };

    if let Some(ef_tree) = catalog
        .get(b"Names")
        .ok()
        .and_then(|o| resolve_dict(doc, o).ok())
        .and_then(|names| names.get(b"EmbeddedFiles").ok())
        .and_then(|o| resolve_dict(doc, o).ok())
    {
        let mut entries = Vec::new();
        collect_name_tree(doc, ef_tree, &mut entries, 0);
        for (name, value) in entries {
            if let Object::Reference(id) = value {
                if is_invoice_filename(&pdf_string(&name)) {
                    filespecs.insert(*id);
                }
            }
        }
    }

    if let Some(af) = catalog
        .get(b"AF")
        .ok()
        .and_then(|o| resolve_obj(doc, o).ok())
        .and_then(|o| o.as_array().ok())
    {
        for obj in af {
            if let Object::Reference(id) = obj {
                let named = doc
                    .get_dictionary(*id)
                    .ok()
                    .and_then(filespec_name)
                    .is_some_and(|n| is_invoice_filename(&n));
                if named {
                    filespecs.insert(*id);
                }
            }
        }
    }

    let mut stale = filespecs.clone();
    for id in filespecs {
        if let Some(ef) = doc
            .get_dictionary(id)
            .ok()
            .and_then(|fs| fs.get(b"EF").ok())
            .and_then(|o| resolve_dict(doc, o).ok())
        {
            for (_, obj) in ef.iter() {
                if let Object::Reference(stream_id) = obj {
                    stale.insert(*stream_id);
                }
            }
        }
    }
    stale
}

/// The catalog `/Names` dictionary with a flat, sorted `/EmbeddedFiles`
/// tree holding the other attachments plus the new invoice.
fn embedded_files_names(
    doc: &Document,
    stale: &BTreeSet<ObjectId>,
    filename: &str,
    filespec_id: ObjectId,
) -> Dictionary {
    let existing = doc
        .catalog()
        .ok()
        .and_then(|c| c.get(b"Names").ok())
        .and_then(|o| resolve_dict(doc, o).ok());
    let mut names = existing.cloned().unwrap_or_else(Dictionary::new);

    let mut entries: Vec<(Vec<u8>, Object)> = Vec::new();
    if let Some(ef_tree) = existing
        .and_then(|n| n.get(b"EmbeddedFiles").ok())
        .and_then(|o| resolve_dict(doc, o).ok())
    {
        let mut found = Vec::new();
        collect_name_tree(doc, ef_tree, &mut found, 0);
        for (name, value) in found {
            let is_stale = matches!(value, Object::Reference(id) if stale.contains(id));
            if !is_stale && !is_invoice_filename(&pdf_string(&name)) {
                entries.push((name, value.clone()));
            }
        }
    }
    entries.push((filename.as_bytes().to_vec(), Object::Reference(filespec_id)));
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let flat: Vec<Object> = entries
        .into_iter()
        .flat_map(|(name, value)| [Object::String(name, StringFormat::Literal), value])
        .collect();
    names.set("EmbeddedFiles", dictionary! { "Names" => Object::Array(flat) });
    names
}

fn associated_files(
    doc: &Document,
    stale: &BTreeSet<ObjectId>,
    filespec_id: ObjectId,
) -> Vec<Object> {
    let mut af: Vec<Object> = doc
        .catalog()
        .ok()
        .and_then(|c| c.get(b"AF").ok())
        .and_then(|o| resolve_obj(doc, o).ok())
        .and_then(|o| o.as_array().ok())
        .map(|arr| {
            arr.iter()
                .filter(|o| !matches!(o, Object::Reference(id) if stale.contains(id)))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    af.push(Object::Reference(filespec_id));
    af
}

/// `/Creator` of the source document's `/Info`, if it names one.
fn existing_creator(doc: &Document) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let creator = pdf_string(info.get(b"Creator").ok()?.as_str().ok()?);
    (!creator.trim().is_empty()).then_some(creator)
}

fn write_info(
    doc: &mut Document,
    title: &str,
    author: &str,
    subject: &str,
    producer: &str,
    creator: &str,
    now: &DateTime<Utc>,
) {
    let info_ref = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    let mut info = info_ref
        .and_then(|id| doc.get_dictionary(id).ok().cloned())
        .or_else(|| {
            doc.trailer
                .get(b"Info")
                .ok()
                .and_then(|o| o.as_dict().ok().cloned())
        })
        .unwrap_or_else(Dictionary::new);

    info.set("Title", text_string(title));
    info.set("Author", text_string(author));
    info.set("Subject", text_string(subject));
    info.set("Producer", text_string(producer));
    info.set("Creator", text_string(creator));
    info.set("CreationDate", Object::string_literal(pdf_date(now)));
    info.set("ModDate", Object::string_literal(pdf_date(now)));

    match info_ref {
        Some(id) => {
            doc.objects.insert(id, Object::Dictionary(info));
        }
        None => {
            let id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(id));
        }
    }
}

/// PDF text string: literal when ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        Object::string_literal(s)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn pdf_date(t: &DateTime<Utc>) -> String {
    t.format("D:%Y%m%d%H%M%S+00'00'").to_string()
}

fn xmp_date(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}
