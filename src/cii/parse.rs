use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use crate::core::*;

/// Parse CII XML into a [`Document`].
///
/// Element names are matched on their local part, so documents using other
/// namespace prefixes are read the same way.
pub fn parse(xml: &[u8]) -> Result<Document, FacturxError> {
    let xml = decode(xml)?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = CiiParser::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => p.start(e)?,
            Ok(Event::Empty(ref e)) => {
                p.start(e)?;
                p.end()?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| FacturxError::Xml(format!("XML parse error: {e}")))?;
                if !text.is_empty() {
                    p.text(&text)?;
                }
            }
            Ok(Event::End(_)) => p.end()?,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FacturxError::Xml(format!(
                    "XML parse error at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    if !p.seen_root {
        return Err(FacturxError::Xml("document has no root element".into()));
    }
    debug!(
        id = %p.doc.header.id,
        lines = p.doc.trade.items.len(),
        "parsed CII document"
    );
    Ok(p.doc)
}

/// Read only the BT-24 guideline identifier of a CII document.
pub fn guideline_id(xml: &[u8]) -> Result<String, FacturxError> {
    let xml = decode(xml)?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = local_name(e);
                if path.is_empty() && name != "CrossIndustryInvoice" {
                    return Err(not_cii(&name));
                }
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let in_guideline = path.len() >= 2
                    && path[path.len() - 2] == "GuidelineSpecifiedDocumentContextParameter"
                    && path[path.len() - 1] == "ID";
                if in_guideline {
                    let text = e
                        .unescape()
                        .map_err(|e| FacturxError::Xml(format!("XML parse error: {e}")))?;
                    return Ok(text.trim().to_string());
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FacturxError::Xml(format!("XML parse error: {e}"))),
            _ => {}
        }
    }

    Err(FacturxError::Xml(
        "no GuidelineSpecifiedDocumentContextParameter found".into(),
    ))
}

fn decode(xml: &[u8]) -> Result<&str, FacturxError> {
    let xml = std::str::from_utf8(xml)
        .map_err(|e| FacturxError::Xml(format!("XML is not valid UTF-8: {e}")))?;
    Ok(xml.trim_start_matches('\u{feff}'))
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn not_cii(root: &str) -> FacturxError {
    FacturxError::Xml(format!(
        "expected CrossIndustryInvoice root element, found '{root}'"
    ))
}

/// Attributes of the element whose text is being read.
#[derive(Default)]
struct Attrs {
    scheme_id: Option<String>,
    unit_code: Option<String>,
    currency_id: Option<String>,
}

/// BG-16 is collected here since its type code arrives after the element opens.
#[derive(Default)]
struct ParsedMeans {
    type_code: Option<u16>,
    information: Option<String>,
    payee_iban: Option<String>,
    payee_account_name: Option<String>,
    payee_bic: Option<String>,
}

#[derive(Default)]
struct CiiParser {
    doc: Document,
    path: Vec<String>,
    attrs: Attrs,
    seen_root: bool,
    means: Option<ParsedMeans>,
    period_start: Option<NaiveDate>,
    period_end: Option<NaiveDate>,
}

impl CiiParser {
    fn within(&self, name: &str) -> bool {
        self.path.iter().any(|p| p == name)
    }

    fn parent(&self) -> &str {
        if self.path.len() >= 2 {
            &self.path[self.path.len() - 2]
        } else {
            ""
        }
    }

    fn in_line(&self) -> bool {
        self.within("IncludedSupplyChainTradeLineItem")
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<(), FacturxError> {
        let name = local_name(e);
        if self.path.is_empty() {
            if name != "CrossIndustryInvoice" {
                return Err(not_cii(&name));
            }
            self.seen_root = true;
        }

        self.attrs = Attrs::default();
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let val = attr
                .unescape_value()
                .map_err(|e| FacturxError::Xml(format!("bad attribute value: {e}")))?
                .into_owned();
            match key.as_str() {
                "schemeID" => self.attrs.scheme_id = Some(val),
                "unitCode" => self.attrs.unit_code = Some(val),
                "currencyID" => self.attrs.currency_id = Some(val),
                _ => {}
            }
        }

        let parent = self.path.last().cloned().unwrap_or_default();
        let in_line = self.in_line();
        match name.as_str() {
            "IncludedSupplyChainTradeLineItem" => self.doc.trade.items.push(LineItem::default()),
            "IncludedNote" if parent == "ExchangedDocument" => {
                self.doc.header.notes.push(IncludedNote::default());
            }
            "ApplicableTradeTax" if parent == "ApplicableHeaderTradeSettlement" => {
                self.doc
                    .trade
                    .settlement
                    .trade_tax
                    .push(ApplicableTradeTax::default());
            }
            "SpecifiedTradeAllowanceCharge" => {
                let target = if in_line {
                    self.doc
                        .trade
                        .items
                        .last_mut()
                        .map(|line| &mut line.settlement.allowance_charges)
                } else {
                    Some(&mut self.doc.trade.settlement.allowance_charges)
                };
                if let Some(list) = target {
                    list.push(AllowanceCharge::default());
                }
            }
            "SpecifiedTradePaymentTerms" => {
                self.doc.trade.settlement.terms.push(PaymentTerms::default());
            }
            "SpecifiedTradeSettlementPaymentMeans" => self.means = Some(ParsedMeans::default()),
            "BillingSpecifiedPeriod" => {
                self.period_start = None;
                self.period_end = None;
            }
            "GrossPriceProductTradePrice" => {
                if let Some(line) = self.doc.trade.items.last_mut() {
                    line.agreement.gross = Some(Price::default());
                }
            }
            "SpecifiedLegalOrganization" => {
                if let Some(party) = self.current_party() {
                    party.legal_organization = Some(LegalOrganization::default());
                }
            }
            "DefinedTradeContact" => {
                if let Some(party) = self.current_party() {
                    party.contact = Some(TradeContact::default());
                }
            }
            _ => {}
        }

        self.path.push(name);
        Ok(())
    }

    fn end(&mut self) -> Result<(), FacturxError> {
        let ended = self.path.pop().unwrap_or_default();
        match ended.as_str() {
            "SpecifiedTradeSettlementPaymentMeans" => {
                if let Some(m) = self.means.take() {
                    let type_code = m.type_code.ok_or_else(|| {
                        FacturxError::Xml("payment means without TypeCode".into())
                    })?;
                    self.doc.trade.settlement.payment_means.push(PaymentMeans {
                        type_code: PaymentMeansCode::from_code(type_code),
                        information: m.information,
                        payee_iban: m.payee_iban,
                        payee_account_name: m.payee_account_name,
                        payee_bic: m.payee_bic,
                    });
                }
            }
            "BillingSpecifiedPeriod" => {
                let (Some(start), Some(end)) = (self.period_start.take(), self.period_end.take())
                else {
                    return Err(FacturxError::Xml(
                        "BillingSpecifiedPeriod needs start and end dates".into(),
                    ));
                };
                let period = Some(Period { start, end });
                if self.in_line() {
                    if let Some(line) = self.doc.trade.items.last_mut() {
                        line.settlement.billing_period = period;
                    }
                } else {
                    self.doc.trade.settlement.billing_period = period;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn current_party(&mut self) -> Option<&mut TradeParty> {
        let agreement = &mut self.doc.trade.agreement;
        if self.path.iter().any(|p| p == "SellerTradeParty") {
            Some(&mut agreement.seller)
        } else if self.path.iter().any(|p| p == "BuyerTradeParty") {
            Some(&mut agreement.buyer)
        } else {
            None
        }
    }

    fn text(&mut self, text: &str) -> Result<(), FacturxError> {
        let Some(leaf) = self.path.last().cloned() else {
            return Ok(());
        };
        let leaf = leaf.as_str();

        if self.within("ExchangedDocumentContext") {
            self.context_text(leaf, text)
        } else if self.within("ExchangedDocument") {
            self.header_text(leaf, text)
        } else if self.in_line() {
            self.line_text(leaf, text)
        } else if self.within("ApplicableHeaderTradeAgreement") {
            self.agreement_text(leaf, text)
        } else if self.within("ApplicableHeaderTradeDelivery") {
            if leaf == "DateTimeString" && self.within("OccurrenceDateTime") {
                self.doc.trade.delivery.occurrence = Some(parse_date(text)?);
            }
            Ok(())
        } else if self.within("ApplicableHeaderTradeSettlement") {
            self.settlement_text(leaf, text)
        } else {
            Ok(())
        }
    }

    fn context_text(&mut self, leaf: &str, text: &str) -> Result<(), FacturxError> {
        let parent = self.parent().to_string();
        let context = &mut self.doc.context;
        match (parent.as_str(), leaf) {
            ("TestIndicator", "Indicator") => context.test_indicator = Some(parse_bool(text)),
            ("BusinessProcessSpecifiedDocumentContextParameter", "ID") => {
                context.business_process_id = Some(text.to_string());
            }
            ("GuidelineSpecifiedDocumentContextParameter", "ID") => {
                context.guideline_id = text.to_string();
            }
            _ => {}
        }
        Ok(())
    }

    fn header_text(&mut self, leaf: &str, text: &str) -> Result<(), FacturxError> {
        let parent = self.parent().to_string();
        let header = &mut self.doc.header;
        match (parent.as_str(), leaf) {
            ("ExchangedDocument", "ID") => header.id = text.to_string(),
            ("ExchangedDocument", "TypeCode") => {
                let code = parse_u16(text, "TypeCode")?;
                header.type_code = DocumentTypeCode::from_code(code).ok_or_else(|| {
                    FacturxError::Xml(format!("unsupported document type code {code}"))
                })?;
            }
            ("IssueDateTime", "DateTimeString") => header.issue_date = parse_date(text)?,
            ("IncludedNote", "Content") => {
                if let Some(note) = header.notes.last_mut() {
                    note.content = text.to_string();
                }
            }
            ("IncludedNote", "SubjectCode") => {
                if let Some(note) = header.notes.last_mut() {
                    note.subject_code = Some(text.to_string());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn line_text(&mut self, leaf: &str, text: &str) -> Result<(), FacturxError> {
        let parent = self.parent().to_string();
        let in_period = self.within("BillingSpecifiedPeriod");
        let in_ac = self.within("SpecifiedTradeAllowanceCharge");
        let in_gross = self.within("GrossPriceProductTradePrice");
        let in_gross_ac = self.within("AppliedTradeAllowanceCharge");
        let in_net = self.within("NetPriceProductTradePrice");
        let in_product = self.within("SpecifiedTradeProduct");
        let in_settlement = self.within("SpecifiedLineTradeSettlement");

        if in_period {
            return self.period_text(leaf, text);
        }

        let attrs = std::mem::take(&mut self.attrs);
        let Some(line) = self.doc.trade.items.last_mut() else {
            return Ok(());
        };

        if in_ac {
            if let Some(ac) = line.settlement.allowance_charges.last_mut() {
                allowance_charge_text(ac, &parent, leaf, text)?;
            }
            return Ok(());
        }

        if in_product {
            let product = &mut line.product;
            match (parent.as_str(), leaf) {
                (_, "GlobalID") => {
                    product.global_id = Some(GlobalId::new(
                        attrs.scheme_id.unwrap_or_default(),
                        text,
                    ));
                }
                (_, "SellerAssignedID") => product.seller_assigned_id = Some(text.to_string()),
                (_, "BuyerAssignedID") => product.buyer_assigned_id = Some(text.to_string()),
                ("SpecifiedTradeProduct", "Name") => product.name = text.to_string(),
                (_, "Description") => product.description = Some(text.to_string()),
                ("OriginTradeCountry", "ID") => product.origin_country = Some(text.to_string()),
                _ => {}
            }
            return Ok(());
        }

        if in_gross {
            let Some(gross) = line.agreement.gross.as_mut() else {
                return Ok(());
            };
            match leaf {
                "ActualAmount" if in_gross_ac => {
                    line.agreement.gross_discount = Some(parse_decimal(text, leaf)?);
                }
                "ChargeAmount" => gross.amount = parse_decimal(text, leaf)?,
                "BasisQuantity" => gross.basis_quantity = Some(quantity(text, attrs)?),
                _ => {}
            }
            return Ok(());
        }

        if in_net {
            match leaf {
                "ChargeAmount" => line.agreement.net.amount = parse_decimal(text, leaf)?,
                "BasisQuantity" => line.agreement.net.basis_quantity = Some(quantity(text, attrs)?),
                _ => {}
            }
            return Ok(());
        }

        if in_settlement {
            let tax = &mut line.settlement.trade_tax;
            match (parent.as_str(), leaf) {
                ("ApplicableTradeTax", "TypeCode") => tax.type_code = text.to_string(),
                ("ApplicableTradeTax", "CategoryCode") => tax.category = parse_category(text)?,
                ("ApplicableTradeTax", "RateApplicablePercent") => {
                    tax.rate_applicable_percent = Some(parse_decimal(text, leaf)?);
                }
                (_, "LineTotalAmount") => {
                    line.settlement.total_amount = parse_decimal(text, leaf)?;
                }
                _ => {}
            }
            return Ok(());
        }

        match (parent.as_str(), leaf) {
            ("AssociatedDocumentLineDocument", "LineID") => {
                line.document.line_id = text.to_string();
            }
            ("IncludedNote", "Content") => line.document.note = Some(text.to_string()),
            (_, "BilledQuantity") => line.delivery.billed_quantity = quantity(text, attrs)?,
            _ => {}
        }
        Ok(())
    }

    fn agreement_text(&mut self, leaf: &str, text: &str) -> Result<(), FacturxError> {
        let parent = self.parent().to_string();
        let in_contact = self.within("DefinedTradeContact");
        let in_address = self.within("PostalTradeAddress");
        let attrs = std::mem::take(&mut self.attrs);

        if !self.within("SellerTradeParty") && !self.within("BuyerTradeParty") {
            let agreement = &mut self.doc.trade.agreement;
            match (parent.as_str(), leaf) {
                ("ApplicableHeaderTradeAgreement", "BuyerReference") => {
                    agreement.buyer_reference = Some(text.to_string());
                }
                ("BuyerOrderReferencedDocument", "IssuerAssignedID") => {
                    agreement.buyer_order_id = Some(text.to_string());
                }
                ("ContractReferencedDocument", "IssuerAssignedID") => {
                    agreement.contract_id = Some(text.to_string());
                }
                _ => {}
            }
            return Ok(());
        }
        let Some(party) = self.current_party() else {
            return Ok(());
        };

        if in_address {
            let address = &mut party.address;
            let value = Some(text.to_string());
            match leaf {
                "PostcodeCode" => address.postcode = value,
                "LineOne" => address.line_one = value,
                "LineTwo" => address.line_two = value,
                "LineThree" => address.line_three = value,
                "CityName" => address.city_name = value,
                "CountryID" => address.country_id = text.to_string(),
                "CountrySubDivisionName" => address.country_subdivision = value,
                _ => {}
            }
            return Ok(());
        }

        if in_contact {
            if let Some(contact) = party.contact.as_mut() {
                let value = Some(text.to_string());
                match leaf {
                    "PersonName" => contact.person_name = value,
                    "CompleteNumber" => contact.telephone = value,
                    "URIID" => contact.email = value,
                    _ => {}
                }
            }
            return Ok(());
        }

        match (parent.as_str(), leaf) {
            ("SellerTradeParty" | "BuyerTradeParty", "ID") => party.id = Some(text.to_string()),
            ("SellerTradeParty" | "BuyerTradeParty", "GlobalID") => {
                party
                    .global_ids
                    .push(GlobalId::new(attrs.scheme_id.unwrap_or_default(), text));
            }
            ("SellerTradeParty" | "BuyerTradeParty", "Name") => party.name = text.to_string(),
            ("SpecifiedLegalOrganization", "ID") => {
                if let Some(org) = party.legal_organization.as_mut() {
                    org.id = Some(text.to_string());
                    org.scheme_id = attrs.scheme_id;
                }
            }
            ("SpecifiedLegalOrganization", "TradingBusinessName") => {
                if let Some(org) = party.legal_organization.as_mut() {
                    org.trading_name = Some(text.to_string());
                }
            }
            ("URIUniversalCommunication", "URIID") => {
                party.electronic_address = Some(ElectronicAddress {
                    scheme_id: attrs.scheme_id.unwrap_or_default(),
                    value: text.to_string(),
                });
            }
            ("SpecifiedTaxRegistration", "ID") => {
                let code = attrs.scheme_id.unwrap_or_default();
                let scheme = TaxScheme::from_code(&code).ok_or_else(|| {
                    FacturxError::Xml(format!("unknown tax registration scheme '{code}'"))
                })?;
                party.tax_registrations.push(TaxRegistration::new(scheme, text));
            }
            _ => {}
        }
        Ok(())
    }

    fn settlement_text(&mut self, leaf: &str, text: &str) -> Result<(), FacturxError> {
        let parent = self.parent().to_string();

        if self.within("BillingSpecifiedPeriod") {
            return self.period_text(leaf, text);
        }

        if let Some(means) = self.means.as_mut() {
            let value = Some(text.to_string());
            match leaf {
                "TypeCode" => means.type_code = Some(parse_u16(text, leaf)?),
                "Information" => means.information = value,
                "IBANID" => means.payee_iban = value,
                "AccountName" => means.payee_account_name = value,
                "BICID" => means.payee_bic = value,
                _ => {}
            }
            return Ok(());
        }

        let in_ac = self.within("SpecifiedTradeAllowanceCharge");
        let in_tax = self.within("ApplicableTradeTax");
        let in_terms = self.within("SpecifiedTradePaymentTerms");
        let in_sums = self.within("SpecifiedTradeSettlementHeaderMonetarySummation");
        let attrs = std::mem::take(&mut self.attrs);
        let settlement = &mut self.doc.trade.settlement;

        if in_ac {
            if let Some(ac) = settlement.allowance_charges.last_mut() {
                allowance_charge_text(ac, &parent, leaf, text)?;
            }
        } else if in_tax {
            if let Some(tax) = settlement.trade_tax.last_mut() {
                match leaf {
                    "CalculatedAmount" => tax.calculated_amount = parse_decimal(text, leaf)?,
                    "TypeCode" => tax.type_code = text.to_string(),
                    "ExemptionReason" => tax.exemption_reason = Some(text.to_string()),
                    "BasisAmount" => tax.basis_amount = parse_decimal(text, leaf)?,
                    "CategoryCode" => tax.category = parse_category(text)?,
                    "ExemptionReasonCode" => tax.exemption_reason_code = Some(text.to_string()),
                    "RateApplicablePercent" => {
                        tax.rate_applicable_percent = Some(parse_decimal(text, leaf)?);
                    }
                    _ => {}
                }
            }
        } else if in_terms {
            if let Some(terms) = settlement.terms.last_mut() {
                match leaf {
                    "Description" => terms.description = Some(text.to_string()),
                    "DateTimeString" => terms.due_date = Some(parse_date(text)?),
                    "DirectDebitMandateID" => {
                        terms.direct_debit_mandate_id = Some(text.to_string());
                    }
                    _ => {}
                }
            }
        } else if in_sums {
            let sums = &mut settlement.monetary_summation;
            match leaf {
                "LineTotalAmount" => sums.line_total = parse_decimal(text, leaf)?,
                "ChargeTotalAmount" => sums.charge_total = Some(parse_decimal(text, leaf)?),
                "AllowanceTotalAmount" => sums.allowance_total = Some(parse_decimal(text, leaf)?),
                "TaxBasisTotalAmount" => sums.tax_basis_total = parse_decimal(text, leaf)?,
                "TaxTotalAmount" => {
                    let currency = attrs
                        .currency_id
                        .unwrap_or_else(|| settlement.currency_code.clone());
                    sums.tax_total = Some(CurrencyAmount {
                        amount: parse_decimal(text, leaf)?,
                        currency,
                    });
                }
                "RoundingAmount" => sums.rounding_amount = Some(parse_decimal(text, leaf)?),
                "GrandTotalAmount" => sums.grand_total = parse_decimal(text, leaf)?,
                "TotalPrepaidAmount" => sums.prepaid_total = Some(parse_decimal(text, leaf)?),
                "DuePayableAmount" => sums.due_amount = parse_decimal(text, leaf)?,
                _ => {}
            }
        } else {
            match leaf {
                "PaymentReference" => settlement.payment_reference = Some(text.to_string()),
                "TaxCurrencyCode" => settlement.tax_currency_code = Some(text.to_string()),
                "InvoiceCurrencyCode" => settlement.currency_code = text.to_string(),
                _ => {}
            }
        }
        Ok(())
    }

    fn period_text(&mut self, leaf: &str, text: &str) -> Result<(), FacturxError> {
        if leaf == "DateTimeString" {
            let date = parse_date(text)?;
            if self.within("StartDateTime") {
                self.period_start = Some(date);
            } else if self.within("EndDateTime") {
                self.period_end = Some(date);
            }
        }
        Ok(())
    }
}

fn allowance_charge_text(
    ac: &mut AllowanceCharge,
    parent: &str,
    leaf: &str,
    text: &str,
) -> Result<(), FacturxError> {
    match (parent, leaf) {
        ("ChargeIndicator", "Indicator") => ac.is_charge = parse_bool(text),
        (_, "CalculationPercent") => ac.percent = Some(parse_decimal(text, leaf)?),
        (_, "BasisAmount") => ac.basis_amount = Some(parse_decimal(text, leaf)?),
        (_, "ActualAmount") => ac.amount = parse_decimal(text, leaf)?,
        (_, "ReasonCode") => ac.reason_code = Some(text.to_string()),
        (_, "Reason") => ac.reason = Some(text.to_string()),
        ("CategoryTradeTax", "CategoryCode") => ac.category = Some(parse_category(text)?),
        ("CategoryTradeTax", "RateApplicablePercent") => {
            ac.rate = Some(parse_decimal(text, leaf)?);
        }
        _ => {}
    }
    Ok(())
}

fn quantity(text: &str, attrs: Attrs) -> Result<Quantity, FacturxError> {
    Ok(Quantity {
        value: parse_decimal(text, "quantity")?,
        unit_code: attrs.unit_code.unwrap_or_default(),
    })
}

fn parse_decimal(text: &str, field: &str) -> Result<Decimal, FacturxError> {
    Decimal::from_str(text.trim())
        .map_err(|e| FacturxError::Xml(format!("invalid decimal '{text}' in {field}: {e}")))
}

fn parse_u16(text: &str, field: &str) -> Result<u16, FacturxError> {
    text.trim()
        .parse()
        .map_err(|_| FacturxError::Xml(format!("invalid code '{text}' in {field}")))
}

/// Format 102 (`CCYYMMDD`).
fn parse_date(text: &str) -> Result<NaiveDate, FacturxError> {
    NaiveDate::parse_from_str(text.trim(), "%Y%m%d")
        .map_err(|e| FacturxError::Xml(format!("invalid date '{text}': {e}")))
}

fn parse_bool(text: &str) -> bool {
    matches!(text.trim(), "true" | "1")
}

fn parse_category(text: &str) -> Result<TaxCategory, FacturxError> {
    TaxCategory::from_code(text.trim())
        .ok_or_else(|| FacturxError::Xml(format!("unknown tax category code '{text}'")))
}
