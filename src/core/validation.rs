use std::collections::{BTreeMap, HashSet};

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use super::codes;
use super::error::ValidationError;
use super::profile::SchemaProfile;
use super::types::*;

/// Check the fields a profile makes mandatory.
/// Returns all validation errors found (not just the first).
pub fn validate_profile(doc: &Document, profile: SchemaProfile) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // BR-02: An Invoice shall have an Invoice number
    if doc.header.id.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "header.id",
            "invoice number must not be empty",
            "BR-02",
        ));
    }

    // BR-05: An Invoice shall have an Invoice currency code
    let currency = &doc.trade.settlement.currency_code;
    if currency.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.settlement.currency_code",
            "currency code must not be empty",
            "BR-05",
        ));
    } else if !codes::is_known_currency_code(currency) {
        errors.push(ValidationError::with_rule(
            "trade.settlement.currency_code",
            format!("currency code '{currency}' is not a known ISO 4217 code"),
            "BR-05",
        ));
    }

    // BR-06 / BR-07: Seller and buyer name
    let agreement = &doc.trade.agreement;
    if agreement.seller.name.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.agreement.seller.name",
            "seller name must not be empty",
            "BR-06",
        ));
    }
    if agreement.buyer.name.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.agreement.buyer.name",
            "buyer name must not be empty",
            "BR-07",
        ));
    }

    if profile.has_header_details() {
        validate_header_details(doc, &mut errors);
    }

    if profile.has_lines() {
        validate_lines(doc, &mut errors);
    }

    errors
}

fn validate_header_details(doc: &Document, errors: &mut Vec<ValidationError>) {
    let agreement = &doc.trade.agreement;

    // BR-08/BR-09 and BR-10/BR-11: postal address with country code
    if agreement.seller.address.country_id.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.agreement.seller.address.country_id",
            "seller postal address must have a country code",
            "BR-09",
        ));
    }
    if agreement.buyer.address.country_id.trim().is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.agreement.buyer.address.country_id",
            "buyer postal address must have a country code",
            "BR-11",
        ));
    }

    for (i, note) in doc.header.notes.iter().enumerate() {
        if let Some(code) = &note.subject_code {
            if !codes::is_known_note_subject_code(code) {
                errors.push(ValidationError::new(
                    format!("header.notes[{i}].subject_code"),
                    format!("'{code}' is not a known UNTDID 4451 subject code"),
                ));
            }
        }
    }

    // BR-32 / BR-37: document level allowances and charges need a VAT category
    for (i, ac) in doc.trade.settlement.allowance_charges.iter().enumerate() {
        if ac.category.is_none() {
            let (kind, rule) = if ac.is_charge {
                ("charge", "BR-37")
            } else {
                ("allowance", "BR-32")
            };
            errors.push(ValidationError::with_rule(
                format!("trade.settlement.allowance_charges[{i}].category"),
                format!("document level {kind} must have a VAT category code"),
                rule,
            ));
        }
    }

    // BR-CO-18: at least one VAT breakdown
    let settlement = &doc.trade.settlement;
    if settlement.trade_tax.is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.settlement.trade_tax",
            "invoice must contain at least one VAT breakdown",
            "BR-CO-18",
        ));
    }

    // BR-S-02: standard rated supplies require a seller VAT identifier
    // (a German tax number is accepted as well)
    let has_standard_rate = settlement
        .trade_tax
        .iter()
        .any(|t| t.category == TaxCategory::StandardRate)
        || doc
            .trade
            .items
            .iter()
            .any(|l| l.settlement.trade_tax.category == TaxCategory::StandardRate);
    if has_standard_rate && agreement.seller.tax_registrations.is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.agreement.seller.tax_registrations",
            "seller must have a VAT identifier or tax number for standard rated supplies",
            "BR-S-02",
        ));
    }
}

fn validate_lines(doc: &Document, errors: &mut Vec<ValidationError>) {
    // BR-16: An Invoice shall have at least one Invoice line
    if doc.trade.items.is_empty() {
        errors.push(ValidationError::with_rule(
            "trade.items",
            "invoice must have at least one line item",
            "BR-16",
        ));
        return;
    }

    let mut seen = HashSet::new();
    for (i, line) in doc.trade.items.iter().enumerate() {
        let prefix = format!("trade.items[{i}]");

        if line.document.line_id.trim().is_empty() {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.document.line_id"),
                "line identifier must not be empty",
                "BR-21",
            ));
        } else if !seen.insert(line.document.line_id.as_str()) {
            errors.push(ValidationError::new(
                format!("{prefix}.document.line_id"),
                format!("duplicate line identifier '{}'", line.document.line_id),
            ));
        }

        if line.delivery.billed_quantity.unit_code.trim().is_empty() {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.delivery.billed_quantity.unit_code"),
                "invoiced quantity must have a unit of measure",
                "BR-23",
            ));
        } else if !codes::is_known_unit_code(&line.delivery.billed_quantity.unit_code) {
            errors.push(ValidationError::new(
                format!("{prefix}.delivery.billed_quantity.unit_code"),
                format!(
                    "unknown unit code '{}'",
                    line.delivery.billed_quantity.unit_code
                ),
            ));
        }

        if line.product.name.trim().is_empty() {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.product.name"),
                "item name must not be empty",
                "BR-25",
            ));
        }

        if line.agreement.net.amount < Decimal::ZERO {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.agreement.net.amount"),
                "item net price must not be negative",
                "BR-27",
            ));
        }
        if let Some(gross) = &line.agreement.gross {
            if gross.amount < Decimal::ZERO {
                errors.push(ValidationError::with_rule(
                    format!("{prefix}.agreement.gross.amount"),
                    "item gross price must not be negative",
                    "BR-28",
                ));
            }
        }

        // BR-x-01: every line category needs a matching VAT breakdown
        let tax = &line.settlement.trade_tax;
        let covered = doc.trade.settlement.trade_tax.iter().any(|t| {
            t.category == tax.category && t.rate_applicable_percent == tax.rate_applicable_percent
        });
        if !covered {
            errors.push(ValidationError::with_rule(
                format!("{prefix}.settlement.trade_tax"),
                format!(
                    "no VAT breakdown for category {} at rate {}",
                    tax.category.code(),
                    tax.rate_applicable_percent
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "-".into())
                ),
                format!("BR-{}-01", rule_prefix(tax.category)),
            ));
        }
    }
}

/// Check that all amounts of the document reconcile.
///
/// Amounts too large to add or multiply are reported as a single
/// "amount out of range" finding.
pub fn validate_totals(doc: &Document) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if reconcile(doc, &mut errors).is_none() {
        errors.push(out_of_range("trade.settlement.monetary_summation"));
    }
    errors
}

/// Returns `None` as soon as an intermediate amount overflows.
fn reconcile(doc: &Document, errors: &mut Vec<ValidationError>) -> Option<()> {
    let settlement = &doc.trade.settlement;
    let sums = &settlement.monetary_summation;

    let allowances_total = checked_sum(document_allowances(doc).map(|a| a.amount))?;
    let charges_total = checked_sum(document_charges(doc).map(|c| c.amount))?;

    if !doc.trade.items.is_empty() {
        for (i, line) in doc.trade.items.iter().enumerate() {
            let expected = line_net_amount(line)?;
            if line.settlement.total_amount != expected {
                errors.push(ValidationError::new(
                    format!("trade.items[{i}].settlement.total_amount"),
                    format!(
                        "line total {} does not match price x quantity {}",
                        line.settlement.total_amount, expected
                    ),
                ));
            }
        }

        // BR-CO-10: Sum of line net amounts
        let expected_line_total =
            checked_sum(doc.trade.items.iter().map(|l| l.settlement.total_amount))?;
        if sums.line_total != expected_line_total {
            errors.push(ValidationError::with_rule(
                "trade.settlement.monetary_summation.line_total",
                format!(
                    "line total {} does not match sum of line amounts {}",
                    sums.line_total, expected_line_total
                ),
                "BR-CO-10",
            ));
        }

        // BR-x-08: category basis equals its lines plus charges minus allowances
        let expected_bases = category_bases(doc)?;
        for (i, tax) in settlement.trade_tax.iter().enumerate() {
            let key = (tax.category, tax.rate_applicable_percent.unwrap_or(Decimal::ZERO));
            let expected = expected_bases.get(&key).copied().unwrap_or(Decimal::ZERO);
            if tax.basis_amount != expected {
                errors.push(ValidationError::with_rule(
                    format!("trade.settlement.trade_tax[{i}].basis_amount"),
                    format!(
                        "taxable amount {} does not match sum of category amounts {}",
                        tax.basis_amount, expected
                    ),
                    format!("BR-{}-08", rule_prefix(tax.category)),
                ));
            }
        }
    }

    // BR-CO-11 / BR-CO-12
    if sums.allowance_total.unwrap_or(Decimal::ZERO) != allowances_total {
        errors.push(ValidationError::with_rule(
            "trade.settlement.monetary_summation.allowance_total",
            format!("allowance total does not match sum of allowances {allowances_total}"),
            "BR-CO-11",
        ));
    }
    if sums.charge_total.unwrap_or(Decimal::ZERO) != charges_total {
        errors.push(ValidationError::with_rule(
            "trade.settlement.monetary_summation.charge_total",
            format!("charge total does not match sum of charges {charges_total}"),
            "BR-CO-12",
        ));
    }

    // BR-CO-13: tax basis = line total - allowances + charges
    let expected_basis = sums
        .line_total
        .checked_sub(sums.allowance_total.unwrap_or(Decimal::ZERO))?
        .checked_add(sums.charge_total.unwrap_or(Decimal::ZERO))?;
    if sums.tax_basis_total != expected_basis {
        errors.push(ValidationError::with_rule(
            "trade.settlement.monetary_summation.tax_basis_total",
            format!(
                "tax basis total {} does not match calculation {}",
                sums.tax_basis_total, expected_basis
            ),
            "BR-CO-13",
        ));
    }

    // BR-CO-17: category tax = basis x rate / 100, rounded to 2 places
    for (i, tax) in settlement.trade_tax.iter().enumerate() {
        let rate = tax.rate_applicable_percent.unwrap_or(Decimal::ZERO);
        let expected = category_tax(tax.basis_amount, rate)?;
        if tax.calculated_amount != expected {
            errors.push(ValidationError::with_rule(
                format!("trade.settlement.trade_tax[{i}].calculated_amount"),
                format!(
                    "tax amount {} does not match {} x {}% = {}",
                    tax.calculated_amount, tax.basis_amount, rate, expected
                ),
                "BR-CO-17",
            ));
        }
    }

    // BR-CO-14: tax total = sum of category tax amounts
    let breakdown_total = checked_sum(settlement.trade_tax.iter().map(|t| t.calculated_amount))?;
    let tax_total = sums
        .tax_total
        .as_ref()
        .map(|t| t.amount)
        .unwrap_or(Decimal::ZERO);
    // documents without a breakdown (MINIMUM) only carry the total
    if !settlement.trade_tax.is_empty() && tax_total != breakdown_total {
        errors.push(ValidationError::with_rule(
            "trade.settlement.monetary_summation.tax_total",
            format!(
                "VAT total {tax_total} does not match sum of breakdown amounts {breakdown_total}"
            ),
            "BR-CO-14",
        ));
    }
    if let Some(t) = &sums.tax_total {
        if t.currency != settlement.currency_code {
            errors.push(ValidationError::new(
                "trade.settlement.monetary_summation.tax_total",
                format!(
                    "VAT total currency {} differs from invoice currency {}",
                    t.currency, settlement.currency_code
                ),
            ));
        }
    }

    // BR-CO-15: grand total = tax basis + tax total
    let expected_grand = sums.tax_basis_total.checked_add(tax_total)?;
    if sums.grand_total != expected_grand {
        errors.push(ValidationError::with_rule(
            "trade.settlement.monetary_summation.grand_total",
            format!(
                "grand total {} does not match basis {} + VAT {}",
                sums.grand_total, sums.tax_basis_total, tax_total
            ),
            "BR-CO-15",
        ));
    }

    // BR-CO-16: due = grand total - prepaid + rounding
    let expected_due = sums
        .grand_total
        .checked_sub(sums.prepaid_total.unwrap_or(Decimal::ZERO))?
        .checked_add(sums.rounding_amount.unwrap_or(Decimal::ZERO))?;
    if sums.due_amount != expected_due {
        errors.push(ValidationError::with_rule(
            "trade.settlement.monetary_summation.due_amount",
            format!(
                "amount due {} does not match grand total - prepaid {}",
                sums.due_amount, expected_due
            ),
            "BR-CO-16",
        ));
    }

    Some(())
}

/// Derive line totals, the VAT breakdown and the monetary summation from
/// the line items and document-level allowances/charges (mutates in place).
///
/// Prepaid and rounding amounts already on the document are kept.
/// Exemption reasons of existing breakdown entries are carried over.
/// Fails without touching the document when an amount overflows.
pub fn calculate_totals(doc: &mut Document) -> Result<(), ValidationError> {
    let totals = compute_totals(doc).ok_or_else(|| out_of_range("trade"))?;

    for (line, amount) in doc.trade.items.iter_mut().zip(totals.line_amounts) {
        line.settlement.total_amount = amount;
    }

    let previous = std::mem::take(&mut doc.trade.settlement.trade_tax);
    let trade_tax: Vec<ApplicableTradeTax> = totals
        .breakdown
        .into_iter()
        .map(|(category, rate, basis_amount, calculated_amount)| {
            let carried = previous.iter().find(|t| {
                t.category == category
                    && t.rate_applicable_percent.unwrap_or(Decimal::ZERO) == rate
            });
            ApplicableTradeTax {
                calculated_amount,
                type_code: VAT_TYPE_CODE.to_string(),
                exemption_reason: carried.and_then(|t| t.exemption_reason.clone()),
                basis_amount,
                category,
                exemption_reason_code: carried.and_then(|t| t.exemption_reason_code.clone()),
                rate_applicable_percent: Some(rate),
            }
        })
        .collect();

    let settlement = &mut doc.trade.settlement;
    settlement.trade_tax = trade_tax;

    let sums = &mut settlement.monetary_summation;
    sums.line_total = totals.line_total;
    sums.allowance_total = totals.allowance_total;
    sums.charge_total = totals.charge_total;
    sums.tax_basis_total = totals.tax_basis_total;
    sums.tax_total = Some(CurrencyAmount {
        amount: totals.tax_total,
        currency: settlement.currency_code.clone(),
    });
    sums.grand_total = totals.grand_total;
    sums.due_amount = totals.due_amount;
    Ok(())
}

struct Totals {
    line_amounts: Vec<Decimal>,
    line_total: Decimal,
    allowance_total: Option<Decimal>,
    charge_total: Option<Decimal>,
    /// (category, rate, basis, tax)
    breakdown: Vec<(TaxCategory, Decimal, Decimal, Decimal)>,
    tax_basis_total: Decimal,
    tax_total: Decimal,
    grand_total: Decimal,
    due_amount: Decimal,
}

fn compute_totals(doc: &Document) -> Option<Totals> {
    let line_amounts = doc
        .trade
        .items
        .iter()
        .map(line_net_amount)
        .collect::<Option<Vec<_>>>()?;
    let line_total = checked_sum(line_amounts.iter().copied())?;

    let has_allowances = document_allowances(doc).next().is_some();
    let has_charges = document_charges(doc).next().is_some();
    let allowance_total = checked_sum(document_allowances(doc).map(|a| a.amount))?;
    let charge_total = checked_sum(document_charges(doc).map(|c| c.amount))?;

    let bases = category_bases_with(doc, &line_amounts)?;
    let mut breakdown = Vec::with_capacity(bases.len());
    for ((category, rate), basis) in bases {
        breakdown.push((category, rate, basis, category_tax(basis, rate)?));
    }
    let tax_total = checked_sum(breakdown.iter().map(|b| b.3))?;

    let tax_basis_total = line_total
        .checked_sub(allowance_total)?
        .checked_add(charge_total)?;
    let grand_total = tax_basis_total.checked_add(tax_total)?;
    let sums = &doc.trade.settlement.monetary_summation;
    let due_amount = grand_total
        .checked_sub(sums.prepaid_total.unwrap_or(Decimal::ZERO))?
        .checked_add(sums.rounding_amount.unwrap_or(Decimal::ZERO))?;

    Some(Totals {
        line_amounts,
        line_total,
        allowance_total: has_allowances.then_some(allowance_total),
        charge_total: has_charges.then_some(charge_total),
        breakdown,
        tax_basis_total,
        tax_total,
        grand_total,
        due_amount,
    })
}

/// BT-131: net price x quantity (per price base quantity), rounded to two
/// places, plus line charges minus line allowances.
///
/// Returns `None` when the amount does not fit a [`Decimal`].
pub fn line_net_amount(line: &LineItem) -> Option<Decimal> {
    let qty = line.delivery.billed_quantity.value;
    let price = &line.agreement.net;
    let per = price
        .basis_quantity
        .as_ref()
        .map(|q| q.value)
        .filter(|v| !v.is_zero())
        .unwrap_or(Decimal::ONE);
    let base = round_half_up(qty.checked_mul(price.amount)?.checked_div(per)?, 2);
    line.settlement
        .allowance_charges
        .iter()
        .try_fold(base, |acc, ac| {
            if ac.is_charge {
                acc.checked_add(ac.amount)
            } else {
                acc.checked_sub(ac.amount)
            }
        })
}

fn document_allowances(doc: &Document) -> impl Iterator<Item = &AllowanceCharge> {
    doc.trade
        .settlement
        .allowance_charges
        .iter()
        .filter(|ac| !ac.is_charge)
}

fn document_charges(doc: &Document) -> impl Iterator<Item = &AllowanceCharge> {
    doc.trade
        .settlement
        .allowance_charges
        .iter()
        .filter(|ac| ac.is_charge)
}

/// Taxable amount per (category, rate), ordered by category then rate.
fn category_bases(doc: &Document) -> Option<BTreeMap<(TaxCategory, Decimal), Decimal>> {
    let line_amounts: Vec<Decimal> = doc
        .trade
        .items
        .iter()
        .map(|l| l.settlement.total_amount)
        .collect();
    category_bases_with(doc, &line_amounts)
}

fn category_bases_with(
    doc: &Document,
    line_amounts: &[Decimal],
) -> Option<BTreeMap<(TaxCategory, Decimal), Decimal>> {
    let mut groups: BTreeMap<(TaxCategory, Decimal), Decimal> = BTreeMap::new();

    for (line, amount) in doc.trade.items.iter().zip(line_amounts) {
        let tax = &line.settlement.trade_tax;
        let key = (tax.category, tax.rate_applicable_percent.unwrap_or(Decimal::ZERO));
        let entry = groups.entry(key).or_insert(Decimal::ZERO);
        *entry = entry.checked_add(*amount)?;
    }

    // Allowances and charges without a category are reported by BR-32/BR-37
    // and do not contribute to any breakdown.
    for ac in &doc.trade.settlement.allowance_charges {
        let Some(category) = ac.category else {
            continue;
        };
        let key = (category, ac.rate.unwrap_or(Decimal::ZERO));
        let entry = groups.entry(key).or_insert(Decimal::ZERO);
        *entry = if ac.is_charge {
            entry.checked_add(ac.amount)?
        } else {
            entry.checked_sub(ac.amount)?
        };
    }

    Some(groups)
}

/// Basis x rate / 100, rounded half up to two places.
fn category_tax(basis: Decimal, rate: Decimal) -> Option<Decimal> {
    Some(round_half_up(basis.checked_mul(rate)?.checked_div(dec!(100))?, 2))
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::new(field, "amount out of range")
}

fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Rule family prefix EN 16931 uses per category (BR-S-*, BR-AE-*, ...).
fn rule_prefix(category: TaxCategory) -> &'static str {
    match category {
        TaxCategory::StandardRate => "S",
        TaxCategory::ZeroRated => "Z",
        TaxCategory::Exempt => "E",
        TaxCategory::ReverseCharge => "AE",
        TaxCategory::IntraCommunitySupply => "IC",
        TaxCategory::Export => "G",
        TaxCategory::NotSubjectToVat => "O",
        TaxCategory::CanaryIslands => "IG",
        TaxCategory::CeutaMelilla => "IP",
    }
}
