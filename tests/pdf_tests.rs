#![cfg(feature = "pdf")]

use chrono::{NaiveDate, TimeZone, Utc};
use facturx::cii::{self, SchemaProfile};
use facturx::core::*;
use facturx::pdf::{self, AttachOptions, FacturxLevel};
use facturx::sample;
use lopdf::{Document as PdfDocument, Object, Stream, StringFormat, dictionary};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn minimal_pdf_with(version: &str, configure: impl FnOnce(&mut PdfDocument, &mut lopdf::Dictionary)) -> Vec<u8> {
    let mut doc = PdfDocument::with_version(version);

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => Object::Reference(font_id),
        },
    });
    let content = Stream::new(
        dictionary! {},
        b"BT /F1 12 Tf 100 700 Td (Rechnung) Tj ET".to_vec(),
    );
    let content_id = doc.add_object(content);
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Contents" => Object::Reference(content_id),
        "Resources" => Object::Reference(resources_id),
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    };
    configure(&mut doc, &mut catalog);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn minimal_pdf() -> Vec<u8> {
    minimal_pdf_with("1.7", |_, _| {})
}

/// A PDF that already carries a plain attachment named `name`.
fn pdf_with_attachment(name: &str) -> Vec<u8> {
    minimal_pdf_with("1.7", |doc, catalog| {
        let stream_id = doc.add_object(Stream::new(
            dictionary! { "Type" => "EmbeddedFile" },
            b"attachment body".to_vec(),
        ));
        let fs_id = doc.add_object(dictionary! {
            "Type" => "Filespec",
            "F" => Object::string_literal(name),
            "UF" => Object::string_literal(name),
            "EF" => dictionary! { "F" => Object::Reference(stream_id) },
        });
        catalog.set(
            "Names",
            dictionary! {
                "EmbeddedFiles" => dictionary! {
                    "Names" => vec![
                        Object::String(name.as_bytes().to_vec(), StringFormat::Literal),
                        Object::Reference(fs_id),
                    ],
                },
            },
        );
    })
}

fn einfach_xml() -> Vec<u8> {
    cii::serialize(&sample::en16931_einfach(), SchemaProfile::En16931).unwrap()
}

fn document(profile: SchemaProfile) -> Document {
    DocumentBuilder::new("P-1", date(2024, 6, 1))
        .profile(profile)
        .seller(
            TradePartyBuilder::new("Muster GmbH", PostalAddressBuilder::new("DE").build())
                .tax_registration(TaxScheme::Vat, "DE123456789")
                .build(),
        )
        .buyer(TradePartyBuilder::new("Kunde AG", PostalAddressBuilder::new("DE").build()).build())
        .buyer_reference("04011000-12345-34")
        .add_item(LineItemBuilder::new("1", "Wartung", dec!(1), "C62", dec!(250)).build())
        .build_unchecked()
        .unwrap()
}

fn embedded_names(pdf_bytes: &[u8]) -> Vec<String> {
    let doc = PdfDocument::load_mem(pdf_bytes).unwrap();
    let catalog = doc.catalog().unwrap();
    let names = match catalog.get(b"Names").unwrap() {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        Object::Dictionary(d) => d,
        other => panic!("unexpected Names {other:?}"),
    };
    let tree = names.get(b"EmbeddedFiles").unwrap().as_dict().unwrap();
    tree.get(b"Names")
        .unwrap()
        .as_array()
        .unwrap()
        .chunks(2)
        .map(|pair| String::from_utf8(pair[0].as_str().unwrap().to_vec()).unwrap())
        .collect()
}

#[test]
fn attach_then_inspect() {
    let xml = einfach_xml();
    let out = pdf::attach_xml(&minimal_pdf(), &xml, "EN 16931").unwrap();

    let att = pdf::inspect(&out).unwrap();
    assert_eq!(att.filename, "factur-x.xml");
    assert_eq!(att.xml, xml);
    assert_eq!(att.af_relationship.as_deref(), Some("Alternative"));
    assert_eq!(att.conformance_level.as_deref(), Some("EN 16931"));
    assert_eq!(pdf::extract_xml(&out).unwrap(), xml);
}

#[test]
fn output_carries_pdfa_catalog_entries() {
    let out = pdf::attach_xml(&minimal_pdf_with("1.4", |_, _| {}), &einfach_xml(), "EN 16931").unwrap();
    let doc = PdfDocument::load_mem(&out).unwrap();
    assert_eq!(doc.version, "1.7");

    let catalog = doc.catalog().unwrap();
    assert!(catalog.get(b"Metadata").is_ok());
    assert!(catalog.get(b"MarkInfo").is_ok());
    assert_eq!(catalog.get(b"AF").unwrap().as_array().unwrap().len(), 1);

    let metadata_id = catalog.get(b"Metadata").unwrap().as_reference().unwrap();
    let stream = doc.get_object(metadata_id).unwrap().as_stream().unwrap();
    let xmp = String::from_utf8(stream.content.clone()).unwrap();
    assert!(xmp.contains("<pdfaid:part>3</pdfaid:part>"));
    assert!(xmp.contains("<fx:DocumentFileName>factur-x.xml</fx:DocumentFileName>"));
    assert!(xmp.contains("Lieferant GmbH"));

    let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info_id).unwrap();
    assert_eq!(
        info.get(b"Title").unwrap().as_str().unwrap(),
        b"Lieferant GmbH: Invoice 471102"
    );
    assert_eq!(info.get(b"Author").unwrap().as_str().unwrap(), b"Lieferant GmbH");
}

#[test]
fn explicit_options_override_derived_metadata() {
    let options = AttachOptions {
        level: Some(FacturxLevel::En16931),
        title: Some("Custom".into()),
        producer: Some("Buchhaltung 3.1".into()),
        ..Default::default()
    };
    let out = pdf::attach_xml_with(&minimal_pdf(), &einfach_xml(), &options).unwrap();
    let doc = PdfDocument::load_mem(&out).unwrap();
    let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info_id).unwrap();
    assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"Custom");
    assert_eq!(info.get(b"Producer").unwrap().as_str().unwrap(), b"Buchhaltung 3.1");
}

#[test]
fn reattaching_replaces_the_invoice() {
    let first = pdf::attach_xml(&minimal_pdf(), &einfach_xml(), "EN 16931").unwrap();

    let mut changed = sample::en16931_einfach();
    changed.header.id = "471103".into();
    let xml = cii::serialize(&changed, SchemaProfile::En16931).unwrap();
    let second = pdf::attach_xml(&first, &xml, "EN 16931").unwrap();

    assert_eq!(embedded_names(&second), vec!["factur-x.xml"]);
    assert_eq!(pdf::extract_xml(&second).unwrap(), xml);

    let doc = PdfDocument::load_mem(&second).unwrap();
    let af = doc.catalog().unwrap().get(b"AF").unwrap().as_array().unwrap().len();
    assert_eq!(af, 1);
}

#[test]
fn other_attachments_survive_sorted() {
    let out = pdf::attach_xml(&pdf_with_attachment("lieferschein.txt"), &einfach_xml(), "EN 16931")
        .unwrap();
    assert_eq!(embedded_names(&out), vec!["factur-x.xml", "lieferschein.txt"]);

    let out = pdf::attach_xml(&pdf_with_attachment("anhang.txt"), &einfach_xml(), "EN 16931").unwrap();
    assert_eq!(embedded_names(&out), vec!["anhang.txt", "factur-x.xml"]);
    assert_eq!(pdf::extract_xml(&out).unwrap(), einfach_xml());
}

#[test]
fn similarly_named_attachment_is_not_replaced() {
    let source = pdf_with_attachment("factur-x-terms.pdf");
    let out = pdf::attach_xml(&source, &einfach_xml(), "EN 16931").unwrap();

    assert_eq!(embedded_names(&out), vec!["factur-x-terms.pdf", "factur-x.xml"]);
    let att = pdf::inspect(&out).unwrap();
    assert_eq!(att.filename, "factur-x.xml");
    assert_eq!(att.xml, einfach_xml());

    let doc = PdfDocument::load_mem(&out).unwrap();
    let kept = doc
        .objects
        .values()
        .filter_map(|o| o.as_stream().ok())
        .any(|s| s.content == b"attachment body");
    assert!(kept);
}

#[test]
fn source_creator_is_kept() {
    let source = minimal_pdf_with("1.7", |doc, _| {
        let info_id = doc.add_object(dictionary! {
            "Creator" => Object::string_literal("LibreOffice Writer"),
        });
        doc.trailer.set("Info", Object::Reference(info_id));
    });
    let out = pdf::attach_xml(&source, &einfach_xml(), "EN 16931").unwrap();

    let doc = PdfDocument::load_mem(&out).unwrap();
    let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info_id).unwrap();
    assert_eq!(info.get(b"Creator").unwrap().as_str().unwrap(), b"LibreOffice Writer");
    assert_ne!(info.get(b"Producer").unwrap().as_str().unwrap(), b"LibreOffice Writer");

    let xmp = String::from_utf8(
        doc.get_object(doc.catalog().unwrap().get(b"Metadata").unwrap().as_reference().unwrap())
            .unwrap()
            .as_stream()
            .unwrap()
            .content
            .clone(),
    )
    .unwrap();
    assert!(xmp.contains("<xmp:CreatorTool>LibreOffice Writer</xmp:CreatorTool>"));
}

#[test]
fn minimum_is_data_relationship() {
    let xml = cii::serialize_unchecked(&document(SchemaProfile::Minimum), SchemaProfile::Minimum)
        .unwrap();
    let out = pdf::attach_xml(&minimal_pdf(), &xml, "MINIMUM").unwrap();
    let att = pdf::inspect(&out).unwrap();
    assert_eq!(att.af_relationship.as_deref(), Some("Data"));
    assert_eq!(att.conformance_level.as_deref(), Some("MINIMUM"));
}

#[test]
fn level_derived_from_xrechnung_guideline() {
    let xml = cii::serialize_unchecked(&document(SchemaProfile::XRechnung), SchemaProfile::XRechnung)
        .unwrap();
    let out = pdf::attach_xml_with(&minimal_pdf(), &xml, &AttachOptions::default()).unwrap();
    let att = pdf::inspect(&out).unwrap();
    assert_eq!(att.filename, "xrechnung.xml");
    assert_eq!(att.conformance_level.as_deref(), Some("XRECHNUNG"));
}

#[test]
fn label_mismatch_still_attaches() {
    let out = pdf::attach_xml(&minimal_pdf(), &einfach_xml(), "BASIC").unwrap();
    let att = pdf::inspect(&out).unwrap();
    assert_eq!(att.conformance_level.as_deref(), Some("BASIC"));
    assert_eq!(att.xml, einfach_xml());
}

#[test]
fn invalid_inputs_are_rejected() {
    assert!(matches!(
        pdf::attach_xml(&minimal_pdf(), &einfach_xml(), "PLATINUM"),
        Err(FacturxError::Profile(_))
    ));
    assert!(matches!(
        pdf::attach_xml(&minimal_pdf(), &[0xff, 0xfe, 0x00], "EN 16931"),
        Err(FacturxError::Xml(_))
    ));
    assert!(matches!(
        pdf::attach_xml(b"not a pdf", &einfach_xml(), "EN 16931"),
        Err(FacturxError::Pdf(_))
    ));
    assert!(matches!(pdf::extract_xml(&minimal_pdf()), Err(FacturxError::Pdf(_))));
}

#[test]
fn encrypted_pdf_is_rejected() {
    let mut doc = PdfDocument::load_mem(&minimal_pdf()).unwrap();
    doc.trailer.set(
        "Encrypt",
        dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
        },
    );
    let mut encrypted = Vec::new();
    doc.save_to(&mut encrypted).unwrap();

    assert!(matches!(
        pdf::attach_xml(&encrypted, &einfach_xml(), "EN 16931"),
        Err(FacturxError::Pdf(_))
    ));
}

#[test]
fn fixed_timestamp_is_reproducible() {
    let options = AttachOptions {
        level: Some(FacturxLevel::En16931),
        timestamp: Some(Utc.with_ymd_and_hms(2018, 3, 5, 9, 0, 0).unwrap()),
        ..Default::default()
    };
    let a = pdf::attach_xml_with(&minimal_pdf(), &einfach_xml(), &options).unwrap();
    let b = pdf::attach_xml_with(&minimal_pdf(), &einfach_xml(), &options).unwrap();
    assert_eq!(a, b);
    assert!(String::from_utf8_lossy(&a).contains("D:20180305090000+00'00'"));
}
