use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::error::FacturxError;
use super::profile::SchemaProfile;
use super::types::*;
use super::validation;

/// Builder for constructing valid documents.
///
/// `build()` derives line totals, the VAT breakdown and the monetary
/// summation, then checks the fields the target profile requires.
///
/// ```
/// use facturx::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let doc = DocumentBuilder::new("RE-2024-001", NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
///     .delivery_date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
///     .seller(TradePartyBuilder::new("ACME GmbH", PostalAddressBuilder::new("DE").city("Berlin").build())
///         .tax_registration(TaxScheme::Vat, "DE123456789")
///         .build())
///     .buyer(TradePartyBuilder::new("Kunde AG", PostalAddressBuilder::new("DE").city("München").build())
///         .build())
///     .add_item(LineItemBuilder::new("1", "Beratung", dec!(10), "HUR", dec!(150.00))
///         .tax(TaxCategory::StandardRate, dec!(19))
///         .build())
///     .build()
///     .unwrap();
/// assert_eq!(doc.trade.settlement.monetary_summation.due_amount, dec!(1785.00));
/// ```
pub struct DocumentBuilder {
    profile: SchemaProfile,
    business_process_id: Option<String>,
    id: String,
    type_code: DocumentTypeCode,
    issue_date: NaiveDate,
    notes: Vec<IncludedNote>,
    buyer_reference: Option<String>,
    buyer_order_id: Option<String>,
    contract_id: Option<String>,
    seller: Option<TradeParty>,
    buyer: Option<TradeParty>,
    delivery_date: Option<NaiveDate>,
    currency_code: String,
    payment_reference: Option<String>,
    payment_means: Vec<PaymentMeans>,
    billing_period: Option<Period>,
    allowance_charges: Vec<AllowanceCharge>,
    terms: Vec<PaymentTerms>,
    items: Vec<LineItem>,
    prepaid: Option<Decimal>,
}

impl DocumentBuilder {
    pub fn new(id: impl Into<String>, issue_date: NaiveDate) -> Self {
        Self {
            profile: SchemaProfile::En16931,
            business_process_id: None,
            id: id.into(),
            type_code: DocumentTypeCode::Invoice,
            issue_date,
            notes: Vec::new(),
            buyer_reference: None,
            buyer_order_id: None,
            contract_id: None,
            seller: None,
            buyer: None,
            delivery_date: None,
            currency_code: "EUR".to_string(),
            payment_reference: None,
            payment_means: Vec::new(),
            billing_period: None,
            allowance_charges: Vec::new(),
            terms: Vec::new(),
            items: Vec::new(),
            prepaid: None,
        }
    }

    /// Target profile; sets the guideline identifier and the checks run by `build()`.
    pub fn profile(mut self, profile: SchemaProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn business_process(mut self, id: impl Into<String>) -> Self {
        self.business_process_id = Some(id.into());
        self
    }

    pub fn type_code(mut self, code: DocumentTypeCode) -> Self {
        self.type_code = code;
        self
    }

    pub fn note(mut self, content: impl Into<String>) -> Self {
        self.notes.push(IncludedNote::new(content));
        self
    }

    /// Note with a UNTDID 4451 subject qualifier (BT-21), e.g. "REG".
    pub fn note_with_subject(
        mut self,
        content: impl Into<String>,
        subject_code: impl Into<String>,
    ) -> Self {
        self.notes
            .push(IncludedNote::with_subject(content, subject_code));
        self
    }

    pub fn buyer_reference(mut self, reference: impl Into<String>) -> Self {
        self.buyer_reference = Some(reference.into());
        self
    }

    pub fn buyer_order_id(mut self, id: impl Into<String>) -> Self {
        self.buyer_order_id = Some(id.into());
        self
    }

    pub fn contract_id(mut self, id: impl Into<String>) -> Self {
        self.contract_id = Some(id.into());
        self
    }

    pub fn seller(mut self, party: TradeParty) -> Self {
        self.seller = Some(party);
        self
    }

    pub fn buyer(mut self, party: TradeParty) -> Self {
        self.buyer = Some(party);
        self
    }

    pub fn delivery_date(mut self, date: NaiveDate) -> Self {
        self.delivery_date = Some(date);
        self
    }

    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency_code = code.into();
        self
    }

    pub fn payment_reference(mut self, reference: impl Into<String>) -> Self {
        self.payment_reference = Some(reference.into());
        self
    }

    pub fn payment_means(mut self, means: PaymentMeans) -> Self {
        self.payment_means.push(means);
        self
    }

    pub fn billing_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.billing_period = Some(Period { start, end });
        self
    }

    pub fn add_allowance(mut self, allowance: AllowanceCharge) -> Self {
        self.allowance_charges.push(AllowanceCharge {
            is_charge: false,
            ..allowance
        });
        self
    }

    pub fn add_charge(mut self, charge: AllowanceCharge) -> Self {
        self.allowance_charges.push(AllowanceCharge {
            is_charge: true,
            ..charge
        });
        self
    }

    pub fn payment_terms(mut self, description: impl Into<String>) -> Self {
        self.terms.push(PaymentTerms {
            description: Some(description.into()),
            ..Default::default()
        });
        self
    }

    pub fn add_terms(mut self, terms: PaymentTerms) -> Self {
        self.terms.push(terms);
        self
    }

    pub fn add_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn prepaid(mut self, amount: Decimal) -> Self {
        self.prepaid = Some(amount);
        self
    }

    /// Build the document, calculating totals and running profile validation.
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<Document, FacturxError> {
        let profile = self.profile;
        let doc = self.build_unchecked()?;

        let errors = validation::validate_profile(&doc, profile);
        if !errors.is_empty() {
            return Err(FacturxError::from_findings(&errors));
        }

        Ok(doc)
    }

    /// Build without profile validation. Totals are still calculated.
    pub fn build_unchecked(self) -> Result<Document, FacturxError> {
        let seller = self
            .seller
            .ok_or_else(|| FacturxError::Builder("seller is required".into()))?;
        let buyer = self
            .buyer
            .ok_or_else(|| FacturxError::Builder("buyer is required".into()))?;

        if self.items.len() > 10_000 {
            return Err(FacturxError::Builder(
                "document cannot have more than 10,000 line items".into(),
            ));
        }

        let mut doc = Document {
            context: DocumentContext {
                test_indicator: None,
                business_process_id: self.business_process_id,
                guideline_id: self.profile.urn().to_string(),
            },
            header: Header {
                id: self.id,
                type_code: self.type_code,
                issue_date: self.issue_date,
                notes: self.notes,
            },
            trade: Trade {
                items: self.items,
                agreement: TradeAgreement {
                    buyer_reference: self.buyer_reference,
                    seller,
                    buyer,
                    buyer_order_id: self.buyer_order_id,
                    contract_id: self.contract_id,
                },
                delivery: TradeDelivery {
                    occurrence: self.delivery_date,
                },
                settlement: TradeSettlement {
                    payment_reference: self.payment_reference,
                    tax_currency_code: None,
                    currency_code: self.currency_code,
                    payment_means: self.payment_means,
                    trade_tax: Vec::new(),
                    billing_period: self.billing_period,
                    allowance_charges: self.allowance_charges,
                    terms: self.terms,
                    monetary_summation: MonetarySummation {
                        prepaid_total: self.prepaid,
                        ..Default::default()
                    },
                },
            },
        };

        validation::calculate_totals(&mut doc)
            .map_err(|e| FacturxError::from_findings(&[e]))?;
        Ok(doc)
    }
}

/// Builder for a seller or buyer.
pub struct TradePartyBuilder {
    party: TradeParty,
}

impl TradePartyBuilder {
    pub fn new(name: impl Into<String>, address: PostalAddress) -> Self {
        Self {
            party: TradeParty {
                name: name.into(),
                address,
                ..Default::default()
            },
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.party.id = Some(id.into());
        self
    }

    pub fn global_id(mut self, scheme_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.party.global_ids.push(GlobalId::new(scheme_id, value));
        self
    }

    pub fn tax_registration(mut self, scheme: TaxScheme, id: impl Into<String>) -> Self {
        self.party
            .tax_registrations
            .push(TaxRegistration::new(scheme, id));
        self
    }

    pub fn legal_organization(mut self, id: impl Into<String>, scheme_id: Option<String>) -> Self {
        let org = self.party.legal_organization.get_or_insert_with(Default::default);
        org.id = Some(id.into());
        org.scheme_id = scheme_id;
        self
    }

    pub fn trading_name(mut self, name: impl Into<String>) -> Self {
        self.party
            .legal_organization
            .get_or_insert_with(Default::default)
            .trading_name = Some(name.into());
        self
    }

    pub fn contact(
        mut self,
        person_name: Option<String>,
        telephone: Option<String>,
        email: Option<String>,
    ) -> Self {
        self.party.contact = Some(TradeContact {
            person_name,
            telephone,
            email,
        });
        self
    }

    pub fn electronic_address(
        mut self,
        scheme_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.party.electronic_address = Some(ElectronicAddress {
            scheme_id: scheme_id.into(),
            value: value.into(),
        });
        self
    }

    pub fn build(self) -> TradeParty {
        self.party
    }
}

/// Builder for a postal address.
pub struct PostalAddressBuilder {
    address: PostalAddress,
}

impl PostalAddressBuilder {
    pub fn new(country_id: impl Into<String>) -> Self {
        Self {
            address: PostalAddress {
                country_id: country_id.into(),
                ..Default::default()
            },
        }
    }

    pub fn postcode(mut self, postcode: impl Into<String>) -> Self {
        self.address.postcode = Some(postcode.into());
        self
    }

    pub fn line_one(mut self, line: impl Into<String>) -> Self {
        self.address.line_one = Some(line.into());
        self
    }

    pub fn line_two(mut self, line: impl Into<String>) -> Self {
        self.address.line_two = Some(line.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.address.city_name = Some(city.into());
        self
    }

    pub fn subdivision(mut self, subdivision: impl Into<String>) -> Self {
        self.address.country_subdivision = Some(subdivision.into());
        self
    }

    pub fn build(self) -> PostalAddress {
        self.address
    }
}

/// Builder for an invoice line. Defaults to standard rate 19 %.
pub struct LineItemBuilder {
    item: LineItem,
}

impl LineItemBuilder {
    pub fn new(
        line_id: impl Into<String>,
        name: impl Into<String>,
        quantity: Decimal,
        unit_code: impl Into<String>,
        net_price: Decimal,
    ) -> Self {
        let mut item = LineItem::default();
        item.document.line_id = line_id.into();
        item.product.name = name.into();
        item.agreement.net = Price::new(net_price);
        item.delivery.billed_quantity = Quantity {
            value: quantity,
            unit_code: unit_code.into(),
        };
        item.settlement.trade_tax.rate_applicable_percent = Some(Decimal::new(19, 0));
        Self { item }
    }

    pub fn tax(mut self, category: TaxCategory, rate: Decimal) -> Self {
        self.item.settlement.trade_tax.category = category;
        self.item.settlement.trade_tax.rate_applicable_percent = Some(rate);
        self
    }

    pub fn gross_price(mut self, price: Decimal) -> Self {
        self.item.agreement.gross = Some(Price::new(price));
        self
    }

    pub fn price_basis_quantity(mut self, quantity: Decimal) -> Self {
        let unit_code = self.item.delivery.billed_quantity.unit_code.clone();
        self.item.agreement.net.basis_quantity = Some(Quantity {
            value: quantity,
            unit_code,
        });
        self
    }

    pub fn global_id(mut self, scheme_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.item.product.global_id = Some(GlobalId::new(scheme_id, value));
        self
    }

    pub fn seller_assigned_id(mut self, id: impl Into<String>) -> Self {
        self.item.product.seller_assigned_id = Some(id.into());
        self
    }

    pub fn buyer_assigned_id(mut self, id: impl Into<String>) -> Self {
        self.item.product.buyer_assigned_id = Some(id.into());
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.item.product.description = Some(desc.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.item.document.note = Some(note.into());
        self
    }

    pub fn billing_period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.item.settlement.billing_period = Some(Period { start, end });
        self
    }

    pub fn add_allowance(mut self, allowance: AllowanceCharge) -> Self {
        self.item.settlement.allowance_charges.push(AllowanceCharge {
            is_charge: false,
            ..allowance
        });
        self
    }

    pub fn add_charge(mut self, charge: AllowanceCharge) -> Self {
        self.item.settlement.allowance_charges.push(AllowanceCharge {
            is_charge: true,
            ..charge
        });
        self
    }

    pub fn build(self) -> LineItem {
        self.item
    }
}
