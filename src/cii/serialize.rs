use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::debug;

use super::xml_utils::XmlWriter;
use super::{DATE_FORMAT_102, cii_ns};
use crate::core::*;

/// Serialize a document to CII XML for the given profile.
///
/// Fails with [`FacturxError::Profile`] when the document's guideline
/// identifier names another profile, and with [`FacturxError::Validation`]
/// when required fields are missing or the amounts do not reconcile.
pub fn serialize(doc: &Document, profile: SchemaProfile) -> Result<Vec<u8>, FacturxError> {
    debug!(profile = %profile, id = %doc.header.id, "serializing document");
    guideline_for(doc, profile)?;

    let mut findings = validate_profile(doc, profile);
    findings.extend(validate_totals(doc));
    if !findings.is_empty() {
        debug!(findings = findings.len(), "document failed validation");
        return Err(FacturxError::from_findings(&findings));
    }

    serialize_unchecked(doc, profile)
}

/// Serialize without validating fields or totals.
///
/// The guideline check still applies: a document that declares a different
/// profile cannot be written under this one.
pub fn serialize_unchecked(doc: &Document, profile: SchemaProfile) -> Result<Vec<u8>, FacturxError> {
    let guideline = guideline_for(doc, profile)?;

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "rsm:CrossIndustryInvoice",
        &[
            ("xmlns:rsm", cii_ns::RSM),
            ("xmlns:qdt", cii_ns::QDT),
            ("xmlns:ram", cii_ns::RAM),
            ("xmlns:udt", cii_ns::UDT),
        ],
    )?;

    write_context(&mut w, &doc.context, guideline)?;
    write_header(&mut w, &doc.header, profile)?;

    w.start_element("rsm:SupplyChainTradeTransaction")?;
    if profile.has_lines() {
        for line in &doc.trade.items {
            write_line(&mut w, line, profile)?;
        }
    }
    write_agreement(&mut w, &doc.trade.agreement, profile)?;
    write_delivery(&mut w, &doc.trade.delivery, profile)?;
    write_settlement(&mut w, &doc.trade.settlement, profile)?;
    w.end_element("rsm:SupplyChainTradeTransaction")?;

    w.end_element("rsm:CrossIndustryInvoice")?;

    let xml = w.into_bytes();
    debug!(bytes = xml.len(), "document serialized");
    Ok(xml)
}

fn guideline_for(doc: &Document, profile: SchemaProfile) -> Result<&str, FacturxError> {
    let declared = doc.context.guideline_id.trim();
    if declared.is_empty() {
        return Ok(profile.urn());
    }
    if declared != profile.urn() {
        return Err(FacturxError::Profile(format!(
            "document declares guideline '{declared}' but profile {profile} requires '{}'",
            profile.urn()
        )));
    }
    Ok(declared)
}

fn write_context(
    w: &mut XmlWriter,
    context: &DocumentContext,
    guideline: &str,
) -> Result<(), FacturxError> {
    w.start_element("rsm:ExchangedDocumentContext")?;
    if let Some(test) = context.test_indicator {
        w.indicator_element("ram:TestIndicator", test)?;
    }
    if let Some(bp) = &context.business_process_id {
        w.start_element("ram:BusinessProcessSpecifiedDocumentContextParameter")?;
        w.text_element("ram:ID", bp)?;
        w.end_element("ram:BusinessProcessSpecifiedDocumentContextParameter")?;
    }
    w.start_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.text_element("ram:ID", guideline)?;
    w.end_element("ram:GuidelineSpecifiedDocumentContextParameter")?;
    w.end_element("rsm:ExchangedDocumentContext")?;
    Ok(())
}

fn write_header(w: &mut XmlWriter, header: &Header, profile: SchemaProfile) -> Result<(), FacturxError> {
    w.start_element("rsm:ExchangedDocument")?;
    w.text_element("ram:ID", &header.id)?;
    w.text_element("ram:TypeCode", &header.type_code.code().to_string())?;
    write_date(w, "ram:IssueDateTime", &header.issue_date)?;
    if profile.has_header_details() {
        for note in &header.notes {
            w.start_element("ram:IncludedNote")?;
            w.text_element("ram:Content", &note.content)?;
            w.opt_text_element("ram:SubjectCode", note.subject_code.as_deref())?;
            w.end_element("ram:IncludedNote")?;
        }
    }
    w.end_element("rsm:ExchangedDocument")?;
    Ok(())
}

fn write_date(w: &mut XmlWriter, element: &str, date: &NaiveDate) -> Result<(), FacturxError> {
    w.start_element(element)?;
    w.text_element_with_attrs(
        "udt:DateTimeString",
        &date.format("%Y%m%d").to_string(),
        &[("format", DATE_FORMAT_102)],
    )?;
    w.end_element(element)?;
    Ok(())
}

fn write_period(w: &mut XmlWriter, period: &Period) -> Result<(), FacturxError> {
    w.start_element("ram:BillingSpecifiedPeriod")?;
    write_date(w, "ram:StartDateTime", &period.start)?;
    write_date(w, "ram:EndDateTime", &period.end)?;
    w.end_element("ram:BillingSpecifiedPeriod")?;
    Ok(())
}

fn write_line(w: &mut XmlWriter, line: &LineItem, profile: SchemaProfile) -> Result<(), FacturxError> {
    let details = profile.has_item_details();
    w.start_element("ram:IncludedSupplyChainTradeLineItem")?;

    w.start_element("ram:AssociatedDocumentLineDocument")?;
    w.text_element("ram:LineID", &line.document.line_id)?;
    if let Some(note) = &line.document.note {
        w.start_element("ram:IncludedNote")?;
        w.text_element("ram:Content", note)?;
        w.end_element("ram:IncludedNote")?;
    }
    w.end_element("ram:AssociatedDocumentLineDocument")?;

    let product = &line.product;
    w.start_element("ram:SpecifiedTradeProduct")?;
    if let Some(gid) = &product.global_id {
        w.text_element_with_attrs("ram:GlobalID", &gid.value, &[("schemeID", &gid.scheme_id)])?;
    }
    if details {
        w.opt_text_element("ram:SellerAssignedID", product.seller_assigned_id.as_deref())?;
        w.opt_text_element("ram:BuyerAssignedID", product.buyer_assigned_id.as_deref())?;
    }
    w.text_element("ram:Name", &product.name)?;
    if details {
        w.opt_text_element("ram:Description", product.description.as_deref())?;
        if let Some(country) = &product.origin_country {
            w.start_element("ram:OriginTradeCountry")?;
            w.text_element("ram:ID", country)?;
            w.end_element("ram:OriginTradeCountry")?;
        }
    }
    w.end_element("ram:SpecifiedTradeProduct")?;

    let agreement = &line.agreement;
    w.start_element("ram:SpecifiedLineTradeAgreement")?;
    if let Some(gross) = &agreement.gross {
        w.start_element("ram:GrossPriceProductTradePrice")?;
        w.decimal_element("ram:ChargeAmount", gross.amount)?;
        if let Some(bq) = &gross.basis_quantity {
            w.quantity_element("ram:BasisQuantity", bq.value, &bq.unit_code)?;
        }
        if let Some(discount) = agreement.gross_discount {
            w.start_element("ram:AppliedTradeAllowanceCharge")?;
            w.indicator_element("ram:ChargeIndicator", false)?;
            w.decimal_element("ram:ActualAmount", discount)?;
            w.end_element("ram:AppliedTradeAllowanceCharge")?;
        }
        w.end_element("ram:GrossPriceProductTradePrice")?;
    }
    w.start_element("ram:NetPriceProductTradePrice")?;
    w.decimal_element("ram:ChargeAmount", agreement.net.amount)?;
    if let Some(bq) = &agreement.net.basis_quantity {
        w.quantity_element("ram:BasisQuantity", bq.value, &bq.unit_code)?;
    }
    w.end_element("ram:NetPriceProductTradePrice")?;
    w.end_element("ram:SpecifiedLineTradeAgreement")?;

    let qty = &line.delivery.billed_quantity;
    w.start_element("ram:SpecifiedLineTradeDelivery")?;
    w.quantity_element("ram:BilledQuantity", qty.value, &qty.unit_code)?;
    w.end_element("ram:SpecifiedLineTradeDelivery")?;

    let settlement = &line.settlement;
    w.start_element("ram:SpecifiedLineTradeSettlement")?;
    w.start_element("ram:ApplicableTradeTax")?;
    w.text_element("ram:TypeCode", &settlement.trade_tax.type_code)?;
    w.text_element("ram:CategoryCode", settlement.trade_tax.category.code())?;
    if let Some(rate) = settlement.trade_tax.rate_applicable_percent {
        w.decimal_element("ram:RateApplicablePercent", rate)?;
    }
    w.end_element("ram:ApplicableTradeTax")?;
    if let Some(period) = &settlement.billing_period {
        write_period(w, period)?;
    }
    for ac in &settlement.allowance_charges {
        write_allowance_charge(w, ac, None)?;
    }
    w.start_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    w.decimal_element("ram:LineTotalAmount", settlement.total_amount)?;
    w.end_element("ram:SpecifiedTradeSettlementLineMonetarySummation")?;
    w.end_element("ram:SpecifiedLineTradeSettlement")?;

    w.end_element("ram:IncludedSupplyChainTradeLineItem")?;
    Ok(())
}

/// Line-level charges carry no tax; document-level ones pass their category
/// (BG-20/BG-21 require it).
fn write_allowance_charge(
    w: &mut XmlWriter,
    ac: &AllowanceCharge,
    tax: Option<(TaxCategory, Option<Decimal>)>,
) -> Result<(), FacturxError> {
    w.start_element("ram:SpecifiedTradeAllowanceCharge")?;
    w.indicator_element("ram:ChargeIndicator", ac.is_charge)?;
    if let Some(pct) = ac.percent {
        w.decimal_element("ram:CalculationPercent", pct)?;
    }
    if let Some(basis) = ac.basis_amount {
        w.decimal_element("ram:BasisAmount", basis)?;
    }
    w.decimal_element("ram:ActualAmount", ac.amount)?;
    w.opt_text_element("ram:ReasonCode", ac.reason_code.as_deref())?;
    w.opt_text_element("ram:Reason", ac.reason.as_deref())?;
    if let Some((category, rate)) = tax {
        w.start_element("ram:CategoryTradeTax")?;
        w.text_element("ram:TypeCode", VAT_TYPE_CODE)?;
        w.text_element("ram:CategoryCode", category.code())?;
        if let Some(rate) = rate {
            w.decimal_element("ram:RateApplicablePercent", rate)?;
        }
        w.end_element("ram:CategoryTradeTax")?;
    }
    w.end_element("ram:SpecifiedTradeAllowanceCharge")?;
    Ok(())
}

fn write_agreement(
    w: &mut XmlWriter,
    agreement: &TradeAgreement,
    profile: SchemaProfile,
) -> Result<(), FacturxError> {
    w.start_element("ram:ApplicableHeaderTradeAgreement")?;
    w.opt_text_element("ram:BuyerReference", agreement.buyer_reference.as_deref())?;
    write_party(w, &agreement.seller, "ram:SellerTradeParty", profile)?;
    write_party(w, &agreement.buyer, "ram:BuyerTradeParty", profile)?;
    if let Some(order) = &agreement.buyer_order_id {
        w.start_element("ram:BuyerOrderReferencedDocument")?;
        w.text_element("ram:IssuerAssignedID", order)?;
        w.end_element("ram:BuyerOrderReferencedDocument")?;
    }
    if profile.has_header_details() {
        if let Some(contract) = &agreement.contract_id {
            w.start_element("ram:ContractReferencedDocument")?;
            w.text_element("ram:IssuerAssignedID", contract)?;
            w.end_element("ram:ContractReferencedDocument")?;
        }
    }
    w.end_element("ram:ApplicableHeaderTradeAgreement")?;
    Ok(())
}

fn write_party(
    w: &mut XmlWriter,
    party: &TradeParty,
    element: &str,
    profile: SchemaProfile,
) -> Result<(), FacturxError> {
    // CII requires: ID → GlobalID → Name → SpecifiedLegalOrganization →
    // DefinedTradeContact → PostalTradeAddress → URIUniversalCommunication →
    // SpecifiedTaxRegistration
    let full = profile.has_header_details();
    let is_seller = element == "ram:SellerTradeParty";
    w.start_element(element)?;

    if full {
        w.opt_text_element("ram:ID", party.id.as_deref())?;
        for gid in &party.global_ids {
            w.text_element_with_attrs("ram:GlobalID", &gid.value, &[("schemeID", &gid.scheme_id)])?;
        }
    }
    w.text_element("ram:Name", &party.name)?;

    if let Some(org) = &party.legal_organization {
        w.start_element("ram:SpecifiedLegalOrganization")?;
        if let Some(id) = &org.id {
            match &org.scheme_id {
                Some(scheme) => w.text_element_with_attrs("ram:ID", id, &[("schemeID", scheme)])?,
                None => w.text_element("ram:ID", id)?,
            };
        }
        if full {
            w.opt_text_element("ram:TradingBusinessName", org.trading_name.as_deref())?;
        }
        w.end_element("ram:SpecifiedLegalOrganization")?;
    }

    if full {
        if let Some(contact) = &party.contact {
            w.start_element("ram:DefinedTradeContact")?;
            w.opt_text_element("ram:PersonName", contact.person_name.as_deref())?;
            if let Some(phone) = &contact.telephone {
                w.start_element("ram:TelephoneUniversalCommunication")?;
                w.text_element("ram:CompleteNumber", phone)?;
                w.end_element("ram:TelephoneUniversalCommunication")?;
            }
            if let Some(email) = &contact.email {
                w.start_element("ram:EmailURIUniversalCommunication")?;
                w.text_element("ram:URIID", email)?;
                w.end_element("ram:EmailURIUniversalCommunication")?;
            }
            w.end_element("ram:DefinedTradeContact")?;
        }
        write_address(w, &party.address)?;
        if let Some(ea) = &party.electronic_address {
            w.start_element("ram:URIUniversalCommunication")?;
            w.text_element_with_attrs("ram:URIID", &ea.value, &[("schemeID", &ea.scheme_id)])?;
            w.end_element("ram:URIUniversalCommunication")?;
        }
    } else if is_seller {
        // Minimum keeps only the seller country (BT-40)
        w.start_element("ram:PostalTradeAddress")?;
        w.text_element("ram:CountryID", &party.address.country_id)?;
        w.end_element("ram:PostalTradeAddress")?;
    }

    if full || is_seller {
        for reg in &party.tax_registrations {
            w.start_element("ram:SpecifiedTaxRegistration")?;
            w.text_element_with_attrs("ram:ID", &reg.id, &[("schemeID", reg.scheme.code())])?;
            w.end_element("ram:SpecifiedTaxRegistration")?;
        }
    }

    w.end_element(element)?;
    Ok(())
}

fn write_address(w: &mut XmlWriter, address: &PostalAddress) -> Result<(), FacturxError> {
    w.start_element("ram:PostalTradeAddress")?;
    w.opt_text_element("ram:PostcodeCode", address.postcode.as_deref())?;
    w.opt_text_element("ram:LineOne", address.line_one.as_deref())?;
    w.opt_text_element("ram:LineTwo", address.line_two.as_deref())?;
    w.opt_text_element("ram:LineThree", address.line_three.as_deref())?;
    w.opt_text_element("ram:CityName", address.city_name.as_deref())?;
    w.text_element("ram:CountryID", &address.country_id)?;
    w.opt_text_element("ram:CountrySubDivisionName", address.country_subdivision.as_deref())?;
    w.end_element("ram:PostalTradeAddress")?;
    Ok(())
}

fn write_delivery(
    w: &mut XmlWriter,
    delivery: &TradeDelivery,
    profile: SchemaProfile,
) -> Result<(), FacturxError> {
    w.start_element("ram:ApplicableHeaderTradeDelivery")?;
    if profile.has_header_details() {
        if let Some(date) = &delivery.occurrence {
            w.start_element("ram:ActualDeliverySupplyChainEvent")?;
            write_date(w, "ram:OccurrenceDateTime", date)?;
            w.end_element("ram:ActualDeliverySupplyChainEvent")?;
        }
    }
    w.end_element("ram:ApplicableHeaderTradeDelivery")?;
    Ok(())
}

fn write_settlement(
    w: &mut XmlWriter,
    settlement: &TradeSettlement,
    profile: SchemaProfile,
) -> Result<(), FacturxError> {
    let full = profile.has_header_details();
    w.start_element("ram:ApplicableHeaderTradeSettlement")?;

    if full {
        w.opt_text_element("ram:PaymentReference", settlement.payment_reference.as_deref())?;
        w.opt_text_element("ram:TaxCurrencyCode", settlement.tax_currency_code.as_deref())?;
    }
    w.text_element("ram:InvoiceCurrencyCode", &settlement.currency_code)?;

    if full {
        for means in &settlement.payment_means {
            write_payment_means(w, means)?;
        }

        for tax in &settlement.trade_tax {
            w.start_element("ram:ApplicableTradeTax")?;
            w.decimal_element("ram:CalculatedAmount", tax.calculated_amount)?;
            w.text_element("ram:TypeCode", &tax.type_code)?;
            w.opt_text_element("ram:ExemptionReason", tax.exemption_reason.as_deref())?;
            w.decimal_element("ram:BasisAmount", tax.basis_amount)?;
            w.text_element("ram:CategoryCode", tax.category.code())?;
            w.opt_text_element("ram:ExemptionReasonCode", tax.exemption_reason_code.as_deref())?;
            if let Some(rate) = tax.rate_applicable_percent {
                w.decimal_element("ram:RateApplicablePercent", rate)?;
            }
            w.end_element("ram:ApplicableTradeTax")?;
        }

        if let Some(period) = &settlement.billing_period {
            write_period(w, period)?;
        }

        for ac in &settlement.allowance_charges {
            write_allowance_charge(w, ac, ac.category.map(|c| (c, ac.rate)))?;
        }

        for terms in &settlement.terms {
            w.start_element("ram:SpecifiedTradePaymentTerms")?;
            w.opt_text_element("ram:Description", terms.description.as_deref())?;
            if let Some(due) = &terms.due_date {
                write_date(w, "ram:DueDateDateTime", due)?;
            }
            w.opt_text_element("ram:DirectDebitMandateID", terms.direct_debit_mandate_id.as_deref())?;
            w.end_element("ram:SpecifiedTradePaymentTerms")?;
        }
    }

    write_summation(w, &settlement.monetary_summation, full)?;

    w.end_element("ram:ApplicableHeaderTradeSettlement")?;
    Ok(())
}

fn write_payment_means(w: &mut XmlWriter, means: &PaymentMeans) -> Result<(), FacturxError> {
    w.start_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
    w.text_element("ram:TypeCode", &means.type_code.code().to_string())?;
    w.opt_text_element("ram:Information", means.information.as_deref())?;
    if let Some(iban) = &means.payee_iban {
        w.start_element("ram:PayeePartyCreditorFinancialAccount")?;
        w.text_element("ram:IBANID", iban)?;
        w.opt_text_element("ram:AccountName", means.payee_account_name.as_deref())?;
        w.end_element("ram:PayeePartyCreditorFinancialAccount")?;
    }
    if let Some(bic) = &means.payee_bic {
        w.start_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
        w.text_element("ram:BICID", bic)?;
        w.end_element("ram:PayeeSpecifiedCreditorFinancialInstitution")?;
    }
    w.end_element("ram:SpecifiedTradeSettlementPaymentMeans")?;
    Ok(())
}

fn write_summation(
    w: &mut XmlWriter,
    sums: &MonetarySummation,
    full: bool,
) -> Result<(), FacturxError> {
    w.start_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;
    if full {
        w.decimal_element("ram:LineTotalAmount", sums.line_total)?;
        if let Some(charges) = sums.charge_total {
            w.decimal_element("ram:ChargeTotalAmount", charges)?;
        }
        if let Some(allowances) = sums.allowance_total {
            w.decimal_element("ram:AllowanceTotalAmount", allowances)?;
        }
    }
    w.decimal_element("ram:TaxBasisTotalAmount", sums.tax_basis_total)?;
    if let Some(tax) = &sums.tax_total {
        w.amount_element("ram:TaxTotalAmount", tax.amount, &tax.currency)?;
    }
    if full {
        if let Some(rounding) = sums.rounding_amount {
            w.decimal_element("ram:RoundingAmount", rounding)?;
        }
    }
    w.decimal_element("ram:GrandTotalAmount", sums.grand_total)?;
    if full {
        if let Some(prepaid) = sums.prepaid_total {
            w.decimal_element("ram:TotalPrepaidAmount", prepaid)?;
        }
    }
    w.decimal_element("ram:DuePayableAmount", sums.due_amount)?;
    w.end_element("ram:SpecifiedTradeSettlementHeaderMonetarySummation")?;
    Ok(())
}
