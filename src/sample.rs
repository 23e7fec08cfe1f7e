//! Reference documents.
//!
//! [`en16931_einfach`] is the "EN16931 Einfach" invoice from the ZUGFeRD
//! sample set, with every value assigned literally rather than derived.

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::core::*;

/// Invoice 471102 from Lieferant GmbH to Kunden AG Mitte: two VAT rates,
/// regulatory note, payment terms with discount.
pub fn en16931_einfach() -> Document {
    let mut doc = Document::default();
    doc.context.guideline_id = SchemaProfile::En16931.urn().to_string();
    doc.header.id = "471102".into();
    doc.header.type_code = DocumentTypeCode::Invoice;
    doc.header.issue_date = date(2018, 3, 5);

    doc.header
        .notes
        .push(IncludedNote::new("Rechnung gemäß Bestellung vom 01.03.2018."));
    doc.header.notes.push(IncludedNote::with_subject(
        "Lieferant GmbH\nLieferantenstraße 20\n80333 München\nDeutschland\nGeschäftsführer: Hans Muster\nHandelsregisternummer: H A 123",
        "REG",
    ));

    let mut li = LineItem::default();
    li.document.line_id = "1".into();
    li.product.global_id = Some(("0160", "4012345001235").into());
    li.product.seller_assigned_id = Some("TB100A4".into());
    li.product.name = "Trennblätter A4".into();
    li.agreement.gross = Some(Price::new(dec!(9.9000)));
    li.agreement.net = Price::new(dec!(9.9000));
    li.delivery.billed_quantity = (dec!(20.0000), "H87").into();
    li.settlement.trade_tax.category = TaxCategory::StandardRate;
    li.settlement.trade_tax.rate_applicable_percent = Some(dec!(19.00));
    li.settlement.total_amount = dec!(198.00);
    doc.trade.items.push(li);

    let mut li = LineItem::default();
    li.document.line_id = "2".into();
    li.product.global_id = Some(("0160", "4000050986428").into());
    li.product.seller_assigned_id = Some("ARNR2".into());
    li.product.name = "Joghurt Banane".into();
    li.agreement.gross = Some(Price::new(dec!(5.5000)));
    li.agreement.net = Price::new(dec!(5.5000));
    li.delivery.billed_quantity = (dec!(50.0000), "H87").into();
    li.settlement.trade_tax.category = TaxCategory::StandardRate;
    li.settlement.trade_tax.rate_applicable_percent = Some(dec!(7.00));
    li.settlement.total_amount = dec!(275.00);
    doc.trade.items.push(li);

    let seller = &mut doc.trade.agreement.seller;
    seller.id = Some("549910".into());
    seller.global_ids.push(("0088", "4000001123452").into());
    seller.name = "Lieferant GmbH".into();
    seller.address.postcode = Some("80333".into());
    seller.address.line_one = Some("Lieferantenstraße 20".into());
    seller.address.city_name = Some("München".into());
    seller.address.country_id = "DE".into();
    seller
        .tax_registrations
        .push(TaxRegistration::new(TaxScheme::FiscalNumber, "201/113/40209"));
    seller
        .tax_registrations
        .push(TaxRegistration::new(TaxScheme::Vat, "DE123456789"));

    let buyer = &mut doc.trade.agreement.buyer;
    buyer.id = Some("GE2020211".into());
    buyer.name = "Kunden AG Mitte".into();
    buyer.address.postcode = Some("69876".into());
    buyer.address.line_one = Some("Kundenstraße 15".into());
    buyer.address.city_name = Some("Frankfurt".into());
    buyer.address.country_id = "DE".into();

    doc.trade.delivery.occurrence = Some(date(2018, 3, 5));

    let settlement = &mut doc.trade.settlement;
    settlement.currency_code = "EUR".into();
    settlement.trade_tax.push(ApplicableTradeTax {
        calculated_amount: dec!(19.25),
        basis_amount: dec!(275.00),
        category: TaxCategory::StandardRate,
        rate_applicable_percent: Some(dec!(7.00)),
        ..Default::default()
    });
    settlement.trade_tax.push(ApplicableTradeTax {
        calculated_amount: dec!(37.62),
        basis_amount: dec!(198.00),
        category: TaxCategory::StandardRate,
        rate_applicable_percent: Some(dec!(19.00)),
        ..Default::default()
    });
    settlement.terms.push(PaymentTerms {
        description: Some(
            "Zahlbar innerhalb 30 Tagen netto bis 04.04.2018, 3% Skonto innerhalb 10 Tagen bis 15.03.2018"
                .into(),
        ),
        ..Default::default()
    });

    let sums = &mut settlement.monetary_summation;
    sums.line_total = dec!(473.00);
    sums.charge_total = Some(dec!(0.00));
    sums.allowance_total = Some(dec!(0.00));
    sums.tax_basis_total = dec!(473.00);
    sums.tax_total = Some((dec!(56.87), "EUR").into());
    sums.grand_total = dec!(529.87);
    sums.prepaid_total = Some(dec!(0.00));
    sums.due_amount = dec!(529.87);

    doc
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    // literal calendar dates, always valid
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}
