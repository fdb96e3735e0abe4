use chrono::NaiveDate;
use handlebars::Handlebars;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::issuer::Issuer;
use super::words::amount_in_words;
use crate::db::models::{DonationRecord, DonorKind, PaymentType};
use crate::error::CerfaError;

const COMPANY_PAGE_1: &str = include_str!("../../templates/companies_cerfa_page1.svg");
const COMPANY_PAGE_2: &str = include_str!("../../templates/companies_cerfa_page2.svg");
const INDIVIDUAL_PAGE_1: &str = include_str!("../../templates/individuals_cerfa_page1.svg");
const INDIVIDUAL_PAGE_2: &str = include_str!("../../templates/individuals_cerfa_page2.svg");

#[derive(Debug, Clone)]
pub struct TemplatePage {
    pub name: String,
    pub source: String,
}

impl TemplatePage {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), source: source.into() }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub template: String,
    pub markup: String,
}

/// SVG page templates per donor kind, in print order.
pub struct ReceiptTemplates {
    registry: Handlebars<'static>,
    companies: Vec<String>,
    individuals: Vec<String>,
}

impl ReceiptTemplates {
    pub fn new(companies: Vec<TemplatePage>, individuals: Vec<TemplatePage>) -> anyhow::Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);

        let mut register = |prefix: &str, pages: Vec<TemplatePage>| -> anyhow::Result<Vec<String>> {
            if pages.is_empty() {
                anyhow::bail!("no {} receipt templates configured", prefix);
            }
            let mut names = Vec::with_capacity(pages.len());
            for page in pages {
                let name = format!("{}/{}", prefix, page.name);
                registry
                    .register_template_string(&name, page.source)
                    .map_err(|e| anyhow::anyhow!("Invalid template {}: {}", name, e))?;
                names.push(name);
            }
            Ok(names)
        };

        let companies = register("companies", companies)?;
        let individuals = register("individuals", individuals)?;
        Ok(Self { registry, companies, individuals })
    }

    pub fn builtin() -> anyhow::Result<Self> {
        Self::new(
            vec![TemplatePage::new("page1", COMPANY_PAGE_1), TemplatePage::new("page2", COMPANY_PAGE_2)],
            vec![TemplatePage::new("page1", INDIVIDUAL_PAGE_1), TemplatePage::new("page2", INDIVIDUAL_PAGE_2)],
        )
    }

    /// Loads `{companies,individuals}_cerfa_page{1,2}.svg` from `dir`.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let load = |prefix: &str| -> anyhow::Result<Vec<TemplatePage>> {
            ["page1", "page2"]
                .iter()
                .map(|page| {
                    let path = dir.join(format!("{}_cerfa_{}.svg", prefix, page));
                    let source = fs::read_to_string(&path)
                        .map_err(|e| anyhow::anyhow!("Failed to read template {}: {}", path.display(), e))?;
                    Ok(TemplatePage::new(*page, source))
                })
                .collect()
        };
        Self::new(load("companies")?, load("individuals")?)
    }

    pub fn pages(&self, kind: DonorKind) -> &[String] {
        match kind {
            DonorKind::Company => &self.companies,
            DonorKind::Individual => &self.individuals,
        }
    }

    pub fn render(&self, record: &DonationRecord, issuer: &Issuer, issued_on: NaiveDate) -> Result<Vec<RenderedPage>, CerfaError> {
        let context = ReceiptContext::new(record, issuer, issued_on);
        self.pages(record.kind())
            .iter()
            .map(|name| {
                let markup = self.registry.render(name, &context).map_err(|e| CerfaError::render(name.as_str(), e))?;
                tracing::debug!("Rendered {} for {}", name, context.order_number);
                Ok(RenderedPage { template: name.clone(), markup })
            })
            .collect()
    }
}

/// French currency layout: `1 234,50`.
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    format!("{}{},{}", sign, grouped, frac_part)
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d/%m/%Y").to_string()).unwrap_or_default()
}

#[derive(Serialize)]
struct AmountContext {
    value: String,
    words: String,
    present: bool,
}

impl AmountContext {
    fn new(amount: Option<Decimal>) -> Self {
        let value = amount.unwrap_or(Decimal::ZERO);
        Self {
            value: format_amount(value),
            words: amount_in_words(value),
            present: amount.map(|a| !a.is_zero()).unwrap_or(false),
        }
    }
}

#[derive(Serialize)]
struct DonorContext {
    name: String,
    label: String,
    legal_form: String,
    repository_code: String,
    first_name: String,
    last_name: String,
    email: String,
    street: String,
    postal_code: String,
    municipality: String,
}

#[derive(Serialize)]
struct PaymentContext {
    label: String,
    cash: bool,
    cheque: bool,
    bank_transfer: bool,
    other: bool,
}

#[derive(Serialize)]
struct IssuerContext {
    label: String,
    repository_code: String,
    object: String,
    street: String,
    postal_code: String,
    municipality: String,
    signature: Option<String>,
}

#[derive(Serialize)]
struct ReceiptContext {
    order_number: String,
    kind: &'static str,
    donor: DonorContext,
    cash: AmountContext,
    inkind: AmountContext,
    inkind_description: String,
    total: AmountContext,
    payment: PaymentContext,
    date_start: String,
    end_date: String,
    valid_date: String,
    year: i32,
    issued_on: String,
    issuer: IssuerContext,
}

impl ReceiptContext {
    fn new(record: &DonationRecord, issuer: &Issuer, issued_on: NaiveDate) -> Self {
        let meta = record.meta();
        let address = record.address();
        let donation = record.donation();

        let donor = match record {
            DonationRecord::Company(c) => DonorContext {
                name: record.donor_name(),
                label: c.identity.label.clone(),
                legal_form: c.identity.legal_form.clone().unwrap_or_default(),
                repository_code: c.identity.repository_code.clone(),
                first_name: String::new(),
                last_name: String::new(),
                email: record.email().unwrap_or_default().to_string(),
                street: address.street_line(),
                postal_code: address.postal_code.clone(),
                municipality: address.municipality.clone(),
            },
            DonationRecord::Individual(i) => DonorContext {
                name: record.donor_name(),
                label: String::new(),
                legal_form: String::new(),
                repository_code: String::new(),
                first_name: i.identity.first_name.clone(),
                last_name: i.identity.last_name.clone(),
                email: record.email().unwrap_or_default().to_string(),
                street: address.street_line(),
                postal_code: address.postal_code.clone(),
                municipality: address.municipality.clone(),
            },
        };

        let payment_type = donation.cash_payment_type;
        let payment = PaymentContext {
            label: payment_type.map(|p| p.label().to_string()).unwrap_or_default(),
            cash: payment_type == Some(PaymentType::Cash),
            cheque: payment_type == Some(PaymentType::Cheque),
            bank_transfer: payment_type == Some(PaymentType::BankTransfer),
            other: payment_type == Some(PaymentType::Other),
        };

        let organization = &issuer.organization;
        Self {
            order_number: record.order_number(),
            kind: record.kind().as_str(),
            donor,
            cash: AmountContext::new(donation.cash_donation),
            inkind: AmountContext::new(donation.inkind_donation),
            inkind_description: donation.inkind_donation_description.clone(),
            total: AmountContext::new(Some(donation.total())),
            payment,
            date_start: format_date(Some(meta.date_start)),
            end_date: format_date(meta.end_date),
            valid_date: format_date(meta.valid_date),
            year: meta.year,
            issued_on: format_date(Some(issued_on)),
            issuer: IssuerContext {
                label: organization.label.clone(),
                repository_code: organization.repository_code.clone(),
                object: organization.object.clone(),
                street: organization.address.street_line(),
                postal_code: organization.address.postal_code.clone(),
                municipality: organization.address.municipality.clone(),
                signature: issuer.signature.as_ref().map(|s| s.data_uri()),
            },
        }
    }
}
