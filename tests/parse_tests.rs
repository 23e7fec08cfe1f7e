#![cfg(feature = "xml")]

use chrono::NaiveDate;
use facturx::cii::{self, SchemaProfile};
use facturx::core::*;
use facturx::sample;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn einfach_reads_back_unchanged() {
    let doc = sample::en16931_einfach();
    let xml = cii::serialize(&doc, SchemaProfile::En16931).unwrap();
    let parsed = cii::parse(&xml).unwrap();

    assert_eq!(parsed, doc);
    assert_eq!(parsed.trade.items[0].agreement.net.amount.to_string(), "9.9000");
    assert_eq!(
        parsed.header.notes[1].subject_code.as_deref(),
        Some("REG")
    );
    assert!(parsed.header.notes[1].content.contains('\n'));
}

#[test]
fn guideline_id_reads_context_only() {
    let xml = cii::serialize(&sample::en16931_einfach(), SchemaProfile::En16931).unwrap();
    assert_eq!(cii::guideline_id(&xml).unwrap(), "urn:cen.eu:en16931:2017");
}

#[test]
fn parses_foreign_document() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<rsm:CrossIndustryInvoice xmlns:rsm="urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100"
    xmlns:ram="urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100"
    xmlns:udt="urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100">
  <rsm:ExchangedDocumentContext>
    <ram:BusinessProcessSpecifiedDocumentContextParameter>
      <ram:ID>A1</ram:ID>
    </ram:BusinessProcessSpecifiedDocumentContextParameter>
    <ram:GuidelineSpecifiedDocumentContextParameter>
      <ram:ID>urn:factur-x.eu:1p0:basicwl</ram:ID>
    </ram:GuidelineSpecifiedDocumentContextParameter>
  </rsm:ExchangedDocumentContext>
  <rsm:ExchangedDocument>
    <ram:ID>GS-17</ram:ID>
    <ram:TypeCode>381</ram:TypeCode>
    <ram:IssueDateTime><udt:DateTimeString format="102">20240229</udt:DateTimeString></ram:IssueDateTime>
  </rsm:ExchangedDocument>
  <rsm:SupplyChainTradeTransaction>
    <ram:ApplicableHeaderTradeAgreement>
      <ram:SellerTradeParty>
        <ram:Name>Verkauf &amp; Service GmbH</ram:Name>
        <ram:SpecifiedLegalOrganization>
          <ram:ID schemeID="0002">123456782</ram:ID>
          <ram:TradingBusinessName>V&amp;S</ram:TradingBusinessName>
        </ram:SpecifiedLegalOrganization>
        <ram:DefinedTradeContact>
          <ram:PersonName>Erika Muster</ram:PersonName>
          <ram:EmailURIUniversalCommunication><ram:URIID>erika@example.de</ram:URIID></ram:EmailURIUniversalCommunication>
        </ram:DefinedTradeContact>
        <ram:PostalTradeAddress>
          <ram:PostcodeCode>20095</ram:PostcodeCode>
          <ram:CityName>Hamburg</ram:CityName>
          <ram:CountryID>DE</ram:CountryID>
        </ram:PostalTradeAddress>
        <ram:URIUniversalCommunication><ram:URIID schemeID="EM">rechnung@example.de</ram:URIID></ram:URIUniversalCommunication>
        <ram:SpecifiedTaxRegistration><ram:ID schemeID="VA">DE999999999</ram:ID></ram:SpecifiedTaxRegistration>
      </ram:SellerTradeParty>
      <ram:BuyerTradeParty>
        <ram:Name>Kunde KG</ram:Name>
        <ram:PostalTradeAddress><ram:CountryID>AT</ram:CountryID></ram:PostalTradeAddress>
      </ram:BuyerTradeParty>
      <ram:BuyerOrderReferencedDocument><ram:IssuerAssignedID>PO-9</ram:IssuerAssignedID></ram:BuyerOrderReferencedDocument>
    </ram:ApplicableHeaderTradeAgreement>
    <ram:ApplicableHeaderTradeDelivery/>
    <ram:ApplicableHeaderTradeSettlement>
      <ram:PaymentReference>GS-17</ram:PaymentReference>
      <ram:InvoiceCurrencyCode>EUR</ram:InvoiceCurrencyCode>
      <ram:SpecifiedTradeSettlementPaymentMeans>
        <ram:TypeCode>58</ram:TypeCode>
        <ram:PayeePartyCreditorFinancialAccount><ram:IBANID>DE02120300000000202051</ram:IBANID></ram:PayeePartyCreditorFinancialAccount>
      </ram:SpecifiedTradeSettlementPaymentMeans>
      <ram:ApplicableTradeTax>
        <ram:CalculatedAmount>0.00</ram:CalculatedAmount>
        <ram:TypeCode>VAT</ram:TypeCode>
        <ram:ExemptionReason>Reverse charge</ram:ExemptionReason>
        <ram:BasisAmount>100.00</ram:BasisAmount>
        <ram:CategoryCode>AE</ram:CategoryCode>
        <ram:RateApplicablePercent>0</ram:RateApplicablePercent>
      </ram:ApplicableTradeTax>
      <ram:BillingSpecifiedPeriod>
        <ram:StartDateTime><udt:DateTimeString format="102">20240201</udt:DateTimeString></ram:StartDateTime>
        <ram:EndDateTime><udt:DateTimeString format="102">20240229</udt:DateTimeString></ram:EndDateTime>
      </ram:BillingSpecifiedPeriod>
      <ram:SpecifiedTradeAllowanceCharge>
        <ram:ChargeIndicator><udt:Indicator>true</udt:Indicator></ram:ChargeIndicator>
        <ram:ActualAmount>5.00</ram:ActualAmount>
        <ram:Reason>Fracht</ram:Reason>
        <ram:CategoryTradeTax>
          <ram:TypeCode>VAT</ram:TypeCode>
          <ram:CategoryCode>AE</ram:CategoryCode>
          <ram:RateApplicablePercent>0</ram:RateApplicablePercent>
        </ram:CategoryTradeTax>
      </ram:SpecifiedTradeAllowanceCharge>
      <ram:SpecifiedTradePaymentTerms>
        <ram:DueDateDateTime><udt:DateTimeString format="102">20240330</udt:DateTimeString></ram:DueDateDateTime>
      </ram:SpecifiedTradePaymentTerms>
      <ram:SpecifiedTradeSettlementHeaderMonetarySummation>
        <ram:LineTotalAmount>95.00</ram:LineTotalAmount>
        <ram:ChargeTotalAmount>5.00</ram:ChargeTotalAmount>
        <ram:TaxBasisTotalAmount>100.00</ram:TaxBasisTotalAmount>
        <ram:TaxTotalAmount currencyID="EUR">0.00</ram:TaxTotalAmount>
        <ram:GrandTotalAmount>100.00</ram:GrandTotalAmount>
        <ram:DuePayableAmount>100.00</ram:DuePayableAmount>
      </ram:SpecifiedTradeSettlementHeaderMonetarySummation>
    </ram:ApplicableHeaderTradeSettlement>
  </rsm:SupplyChainTradeTransaction>
</rsm:CrossIndustryInvoice>"#;

    let doc = cii::parse(xml.as_bytes()).unwrap();

    assert_eq!(doc.context.business_process_id.as_deref(), Some("A1"));
    assert_eq!(doc.context.guideline_id, SchemaProfile::BasicWl.urn());
    assert_eq!(doc.header.id, "GS-17");
    assert_eq!(doc.header.type_code, DocumentTypeCode::CreditNote);
    assert_eq!(doc.header.issue_date, date(2024, 2, 29));

    let seller = &doc.trade.agreement.seller;
    assert_eq!(seller.name, "Verkauf & Service GmbH");
    let org = seller.legal_organization.as_ref().unwrap();
    assert_eq!(org.id.as_deref(), Some("123456782"));
    assert_eq!(org.scheme_id.as_deref(), Some("0002"));
    assert_eq!(org.trading_name.as_deref(), Some("V&S"));
    let contact = seller.contact.as_ref().unwrap();
    assert_eq!(contact.person_name.as_deref(), Some("Erika Muster"));
    assert_eq!(contact.email.as_deref(), Some("erika@example.de"));
    assert_eq!(seller.address.city_name.as_deref(), Some("Hamburg"));
    assert_eq!(seller.electronic_address.as_ref().unwrap().value, "rechnung@example.de");
    assert_eq!(seller.vat_id(), Some("DE999999999"));
    assert_eq!(doc.trade.agreement.buyer.address.country_id, "AT");
    assert_eq!(doc.trade.agreement.buyer_order_id.as_deref(), Some("PO-9"));

    let settlement = &doc.trade.settlement;
    assert_eq!(settlement.payment_reference.as_deref(), Some("GS-17"));
    assert_eq!(settlement.payment_means.len(), 1);
    assert_eq!(settlement.payment_means[0].type_code, PaymentMeansCode::SepaCreditTransfer);
    assert_eq!(
        settlement.payment_means[0].payee_iban.as_deref(),
        Some("DE02120300000000202051")
    );

    let tax = &settlement.trade_tax[0];
    assert_eq!(tax.category, TaxCategory::ReverseCharge);
    assert_eq!(tax.exemption_reason.as_deref(), Some("Reverse charge"));
    assert_eq!(tax.basis_amount, dec!(100.00));

    let period = settlement.billing_period.as_ref().unwrap();
    assert_eq!(period.start, date(2024, 2, 1));
    assert_eq!(period.end, date(2024, 2, 29));

    let charge = &settlement.allowance_charges[0];
    assert!(charge.is_charge);
    assert_eq!(charge.amount, dec!(5.00));
    assert_eq!(charge.category, Some(TaxCategory::ReverseCharge));
    assert_eq!(charge.rate, Some(dec!(0)));

    assert_eq!(settlement.terms[0].due_date, Some(date(2024, 3, 30)));

    let sums = &settlement.monetary_summation;
    assert_eq!(sums.line_total, dec!(95.00));
    assert_eq!(sums.charge_total, Some(dec!(5.00)));
    assert_eq!(sums.allowance_total, None);
    assert_eq!(sums.tax_total.as_ref().unwrap().amount, dec!(0.00));
    assert_eq!(sums.due_amount, dec!(100.00));
    assert!(doc.trade.items.is_empty());
}

#[test]
fn line_details_read_back() {
    let mut doc = DocumentBuilder::new("L-1", date(2024, 5, 1))
        .seller(
            TradePartyBuilder::new("S GmbH", PostalAddressBuilder::new("DE").build())
                .tax_registration(TaxScheme::Vat, "DE123456789")
                .build(),
        )
        .buyer(TradePartyBuilder::new("B AG", PostalAddressBuilder::new("DE").build()).build())
        .add_item(
            LineItemBuilder::new("10", "Papier", dec!(5), "XPK", dec!(4.50))
                .gross_price(dec!(5.00))
                .buyer_assigned_id("B-77")
                .description("Kopierpapier A4, 500 Blatt")
                .note("Sonderposten")
                .billing_period(date(2024, 4, 1), date(2024, 4, 30))
                .add_allowance(AllowanceCharge {
                    amount: dec!(2.50),
                    reason: Some("Mengenrabatt".into()),
                    ..Default::default()
                })
                .build(),
        )
        .build()
        .unwrap();
    doc.trade.items[0].agreement.gross_discount = Some(dec!(0.50));
    doc.trade.items[0].product.origin_country = Some("FI".into());

    let xml = cii::serialize(&doc, SchemaProfile::En16931).unwrap();
    let parsed = cii::parse(&xml).unwrap();
    let line = &parsed.trade.items[0];

    assert_eq!(line.document.line_id, "10");
    assert_eq!(line.document.note.as_deref(), Some("Sonderposten"));
    assert_eq!(line.product.buyer_assigned_id.as_deref(), Some("B-77"));
    assert_eq!(line.product.origin_country.as_deref(), Some("FI"));
    assert_eq!(line.agreement.gross.as_ref().unwrap().amount, dec!(5.00));
    assert_eq!(line.agreement.gross_discount, Some(dec!(0.50)));
    assert_eq!(line.agreement.net.amount, dec!(4.50));
    assert_eq!(line.delivery.billed_quantity.unit_code, "XPK");
    assert_eq!(line.settlement.allowance_charges.len(), 1);
    assert!(!line.settlement.allowance_charges[0].is_charge);
    assert_eq!(line.settlement.total_amount, dec!(20.00));
    assert_eq!(
        line.settlement.billing_period.as_ref().unwrap().end,
        date(2024, 4, 30)
    );
    assert_eq!(parsed, doc);
}

#[test]
fn minimum_document_reads_back() {
    let doc = DocumentBuilder::new("M-1", date(2024, 1, 31))
        .profile(SchemaProfile::Minimum)
        .seller(
            TradePartyBuilder::new("S GmbH", PostalAddressBuilder::new("FR").build())
                .tax_registration(TaxScheme::Vat, "FR12345678901")
                .build(),
        )
        .buyer(TradePartyBuilder::new("B SA", PostalAddressBuilder::new("FR").build()).build())
        .add_item(LineItemBuilder::new("1", "Service", dec!(1), "C62", dec!(100)).build())
        .build()
        .unwrap();

    let xml = cii::serialize(&doc, SchemaProfile::Minimum).unwrap();
    let parsed = cii::parse(&xml).unwrap();

    assert!(parsed.trade.items.is_empty());
    assert!(parsed.trade.settlement.trade_tax.is_empty());
    assert_eq!(parsed.trade.agreement.seller.address.country_id, "FR");
    assert_eq!(parsed.trade.settlement.monetary_summation.grand_total, dec!(119.00));
    assert!(validate_profile(&parsed, SchemaProfile::Minimum).is_empty());
    assert!(validate_totals(&parsed).is_empty());
}

#[test]
fn rejects_malformed_input() {
    assert!(matches!(
        cii::parse(b"<rsm:CrossIndustryInvoice><ram:ID>1</ram:Other>"),
        Err(FacturxError::Xml(_))
    ));
    assert!(matches!(
        cii::parse(b"<Invoice xmlns=\"urn:oasis:names:specification:ubl:schema:xsd:Invoice-2\"/>"),
        Err(FacturxError::Xml(_))
    ));
    assert!(matches!(cii::parse(b""), Err(FacturxError::Xml(_))));
}

#[test]
fn rejects_bad_dates_and_codes() {
    let bad_date = br#"<rsm:CrossIndustryInvoice xmlns:rsm="r" xmlns:ram="a" xmlns:udt="u">
  <rsm:ExchangedDocument>
    <ram:IssueDateTime><udt:DateTimeString format="102">2024-01-01</udt:DateTimeString></ram:IssueDateTime>
  </rsm:ExchangedDocument>
</rsm:CrossIndustryInvoice>"#;
    assert!(cii::parse(bad_date).unwrap_err().to_string().contains("invalid date"));

    let bad_category = br#"<rsm:CrossIndustryInvoice xmlns:rsm="r" xmlns:ram="a">
  <rsm:SupplyChainTradeTransaction>
    <ram:ApplicableHeaderTradeSettlement>
      <ram:ApplicableTradeTax><ram:CategoryCode>Q</ram:CategoryCode></ram:ApplicableTradeTax>
    </ram:ApplicableHeaderTradeSettlement>
  </rsm:SupplyChainTradeTransaction>
</rsm:CrossIndustryInvoice>"#;
    assert!(cii::parse(bad_category).is_err());
}

#[test]
fn payment_means_given_as_other_code_reads_back_equal() {
    let mut doc = sample::en16931_einfach();
    doc.trade.settlement.payment_means.push(PaymentMeans {
        type_code: PaymentMeansCode::Other(30),
        information: Some("Überweisung".into()),
        payee_iban: Some("DE89370400440532013000".into()),
        payee_account_name: None,
        payee_bic: None,
    });

    let xml = cii::serialize(&doc, SchemaProfile::En16931).unwrap();
    let parsed = cii::parse(&xml).unwrap();
    assert!(matches!(
        parsed.trade.settlement.payment_means[0].type_code,
        PaymentMeansCode::CreditTransfer
    ));
    assert_eq!(parsed, doc);
}
