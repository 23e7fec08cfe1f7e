use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::FacturxError;

fn xml_io(e: std::io::Error) -> FacturxError {
    FacturxError::Xml(format!("XML write error: {e}"))
}

/// Thin wrapper over an indenting quick-xml writer that speaks in
/// qualified element names.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, FacturxError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, FacturxError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, FacturxError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, FacturxError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, FacturxError> {
        self.text_element_with_attrs(name, text, &[])
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, FacturxError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write an optional text element; `None` writes nothing.
    pub fn opt_text_element(
        &mut self,
        name: &str,
        text: Option<&str>,
    ) -> Result<&mut Self, FacturxError> {
        if let Some(text) = text {
            self.text_element(name, text)?;
        }
        Ok(self)
    }

    pub fn decimal_element(&mut self, name: &str, value: Decimal) -> Result<&mut Self, FacturxError> {
        self.text_element(name, &format_decimal(value))
    }

    /// Write a decimal amount with currencyID attribute.
    pub fn amount_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<&mut Self, FacturxError> {
        self.text_element_with_attrs(name, &format_decimal(amount), &[("currencyID", currency)])
    }

    /// Write a quantity with unitCode attribute.
    pub fn quantity_element(
        &mut self,
        name: &str,
        qty: Decimal,
        unit: &str,
    ) -> Result<&mut Self, FacturxError> {
        self.text_element_with_attrs(name, &format_decimal(qty), &[("unitCode", unit)])
    }

    /// `<name><udt:Indicator>true|false</udt:Indicator></name>`
    pub fn indicator_element(&mut self, name: &str, value: bool) -> Result<&mut Self, FacturxError> {
        self.start_element(name)?;
        self.text_element("udt:Indicator", if value { "true" } else { "false" })?;
        self.end_element(name)
    }
}

/// Format a Decimal for XML output. The scale the value carries is kept
/// (`9.9000` stays `9.9000`); values with fewer than two decimal places
/// are padded to two.
pub fn format_decimal(d: Decimal) -> String {
    if d.scale() < 2 {
        let mut padded = d;
        padded.rescale(2);
        padded.to_string()
    } else {
        d.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_decimal_cases() {
        assert_eq!(format_decimal(dec!(100)), "100.00");
        assert_eq!(format_decimal(dec!(1500.0)), "1500.00");
        assert_eq!(format_decimal(dec!(49.90)), "49.90");
        assert_eq!(format_decimal(dec!(9.9000)), "9.9000");
        assert_eq!(format_decimal(dec!(0.005)), "0.005");
        assert_eq!(format_decimal(dec!(-3.5)), "-3.50");
    }

    #[test]
    fn writer_escapes_text() {
        let mut w = XmlWriter::new().unwrap();
        w.text_element("ram:Name", "Müller & Söhne <GmbH>").unwrap();
        let xml = String::from_utf8(w.into_bytes()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<ram:Name>Müller &amp; Söhne &lt;GmbH&gt;</ram:Name>"));
    }
}
