use serde::{Deserialize, Serialize};
use chrono::{NaiveDate, DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

/// Largest amount a receipt field can hold (12 digits, 2 decimals).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DonorKind {
    Company,
    Individual,
}

impl DonorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DonorKind::Company => "company",
            DonorKind::Individual => "individual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "company" => Some(DonorKind::Company),
            "individual" => Some(DonorKind::Individual),
            _ => None,
        }
    }

    /// Legal-person tag used in order numbers: personne morale / personne physique.
    pub fn tag(self) -> &'static str {
        match self {
            DonorKind::Company => "PM",
            DonorKind::Individual => "PP",
        }
    }

    pub fn order_number(self, year: i32, order: i64) -> String {
        format!("{}-{}-{}", year, self.tag(), order)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Cash,
    Cheque,
    BankTransfer,
    Other,
}

impl PaymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::Cash => "cash",
            PaymentType::Cheque => "cheque",
            PaymentType::BankTransfer => "bank_transfer",
            PaymentType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cash" => Some(PaymentType::Cash),
            "cheque" => Some(PaymentType::Cheque),
            "bank_transfer" => Some(PaymentType::BankTransfer),
            "other" => Some(PaymentType::Other),
            _ => None,
        }
    }

    /// Wording printed on the receipt's payment method box.
    pub fn label(self) -> &'static str {
        match self {
            PaymentType::Cash => "Espèces",
            PaymentType::Cheque => "Chèque",
            PaymentType::BankTransfer => "Virement, prélèvement, carte bancaire",
            PaymentType::Other => "Autre",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Address {
    pub street_number: Option<String>,
    pub street: Option<String>,
    pub postal_code: String,
    pub municipality: String,
}

/// Rejects characters that cannot appear in an XML document: C0/C1 control
/// characters other than tab and line breaks, and the U+FFFE/U+FFFF
/// noncharacters.
pub fn check_printable(field: &str, value: &str) -> Result<(), String> {
    let forbidden = |c: char| (c.is_control() && !matches!(c, '\t' | '\n' | '\r')) || matches!(c, '\u{FFFE}' | '\u{FFFF}');
    if value.chars().any(forbidden) {
        return Err(format!("{} contains unprintable characters", field));
    }
    Ok(())
}

impl Address {
    pub fn check_printable(&self) -> Result<(), String> {
        check_printable("street_number", self.street_number.as_deref().unwrap_or_default())?;
        check_printable("street", self.street.as_deref().unwrap_or_default())?;
        check_printable("postal_code", &self.postal_code)?;
        check_printable("municipality", &self.municipality)
    }

    pub fn street_line(&self) -> String {
        [self.street_number.as_deref(), self.street.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DonationAmounts {
    pub cash_donation: Option<Decimal>,
    pub cash_payment_type: Option<PaymentType>,
    pub inkind_donation: Option<Decimal>,
    #[serde(default)]
    pub inkind_donation_description: String,
}

impl DonationAmounts {
    /// Cash plus in-kind, absent amounts counting as zero.
    pub fn total(&self) -> Decimal {
        self.cash_donation.unwrap_or(Decimal::ZERO) + self.inkind_donation.unwrap_or(Decimal::ZERO)
    }

    /// Rounds both amounts to cents and checks their bounds.
    pub fn normalize(&mut self) -> Result<(), String> {
        for (name, amount) in [
            ("cash_donation", &mut self.cash_donation),
            ("inkind_donation", &mut self.inkind_donation),
        ] {
            if let Some(value) = amount.as_mut() {
                let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
                rounded.rescale(2);
                if rounded.is_sign_negative() && !rounded.is_zero() {
                    return Err(format!("{} must not be negative", name));
                }
                if rounded > MAX_AMOUNT {
                    return Err(format!("{} exceeds {}", name, MAX_AMOUNT));
                }
                *value = rounded;
            }
        }
        self.inkind_donation_description = self.inkind_donation_description.trim().to_string();
        Ok(())
    }
}

/// Bookkeeping shared by every donation record. `year` and `order` are
/// assigned once at creation and never rewritten.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecordMeta {
    pub uuid: Uuid,
    pub year: i32,
    pub order: i64,
    pub date_start: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub valid_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompanyIdentity {
    pub label: String,
    pub legal_form: Option<String>,
    pub repository_code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndividualIdentity {
    pub first_name: String,
    pub last_name: String,
}

/// Fields common to both donor forms.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecordForm {
    pub email: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    #[serde(flatten)]
    pub donation: DonationAmounts,
    pub date_start: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub declarative_structure_id: i64,
}

impl RecordForm {
    pub fn validate(&mut self) -> Result<(), String> {
        if self.address.postal_code.trim().is_empty() {
            return Err("postal_code is required".to_string());
        }
        if self.address.municipality.trim().is_empty() {
            return Err("municipality is required".to_string());
        }
        if let Some(end) = self.end_date {
            if end < self.date_start {
                return Err("end_date must not precede date_start".to_string());
            }
        }
        self.address.check_printable()?;
        check_printable("email", self.email.as_deref().unwrap_or_default())?;
        check_printable("inkind_donation_description", &self.donation.inkind_donation_description)?;
        self.email = self.email.take().map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
        self.donation.normalize()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompanyForm {
    #[serde(flatten)]
    pub identity: CompanyIdentity,
    #[serde(flatten)]
    pub record: RecordForm,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndividualForm {
    #[serde(flatten)]
    pub identity: IndividualIdentity,
    #[serde(flatten)]
    pub record: RecordForm,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DonorForm {
    Company(CompanyForm),
    Individual(IndividualForm),
}

impl DonorForm {
    pub fn kind(&self) -> DonorKind {
        match self {
            DonorForm::Company(_) => DonorKind::Company,
            DonorForm::Individual(_) => DonorKind::Individual,
        }
    }

    pub fn record(&self) -> &RecordForm {
        match self {
            DonorForm::Company(f) => &f.record,
            DonorForm::Individual(f) => &f.record,
        }
    }

    pub fn validate(&mut self) -> Result<(), String> {
        match self {
            DonorForm::Company(f) => {
                if f.identity.label.trim().is_empty() {
                    return Err("label is required".to_string());
                }
                if f.identity.repository_code.trim().is_empty() {
                    return Err("repository_code is required".to_string());
                }
                check_printable("label", &f.identity.label)?;
                check_printable("legal_form", f.identity.legal_form.as_deref().unwrap_or_default())?;
                check_printable("repository_code", &f.identity.repository_code)?;
                f.record.validate()
            }
            DonorForm::Individual(f) => {
                if f.identity.last_name.trim().is_empty() {
                    return Err("last_name is required".to_string());
                }
                check_printable("first_name", &f.identity.first_name)?;
                check_printable("last_name", &f.identity.last_name)?;
                f.record.validate()
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Company {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub identity: CompanyIdentity,
    pub email: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    #[serde(flatten)]
    pub donation: DonationAmounts,
    pub declarative_structure_id: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Individual {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub identity: IndividualIdentity,
    pub email: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    #[serde(flatten)]
    pub donation: DonationAmounts,
    pub declarative_structure_id: i64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DonationRecord {
    Company(Company),
    Individual(Individual),
}

impl DonationRecord {
    pub fn kind(&self) -> DonorKind {
        match self {
            DonationRecord::Company(_) => DonorKind::Company,
            DonationRecord::Individual(_) => DonorKind::Individual,
        }
    }

    pub fn meta(&self) -> &RecordMeta {
        match self {
            DonationRecord::Company(c) => &c.meta,
            DonationRecord::Individual(i) => &i.meta,
        }
    }

    pub fn address(&self) -> &Address {
        match self {
            DonationRecord::Company(c) => &c.address,
            DonationRecord::Individual(i) => &i.address,
        }
    }

    pub fn donation(&self) -> &DonationAmounts {
        match self {
            DonationRecord::Company(c) => &c.donation,
            DonationRecord::Individual(i) => &i.donation,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            DonationRecord::Company(c) => c.email.as_deref(),
            DonationRecord::Individual(i) => i.email.as_deref(),
        }
    }

    pub fn declarative_structure_id(&self) -> i64 {
        match self {
            DonationRecord::Company(c) => c.declarative_structure_id,
            DonationRecord::Individual(i) => i.declarative_structure_id,
        }
    }

    pub fn donor_name(&self) -> String {
        match self {
            DonationRecord::Company(c) => c.identity.label.clone(),
            DonationRecord::Individual(i) => {
                format!("{} {}", i.identity.first_name.trim(), i.identity.last_name.trim())
                    .trim()
                    .to_string()
            }
        }
    }

    pub fn total_donation(&self) -> Decimal {
        self.donation().total()
    }

    pub fn order_number(&self) -> String {
        let meta = self.meta();
        self.kind().order_number(meta.year, meta.order)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeclarativeStructure {
    pub id: i64,
    pub label: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompanyLegalForm {
    pub code: String,
    pub label: String,
}

/// The nonprofit issuing receipts. `signature` is an object-storage path.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BeneficiaryOrganization {
    pub id: i64,
    pub label: String,
    pub repository_code: String,
    pub object: String,
    #[serde(flatten)]
    pub address: Address,
    pub signature: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BeneficiaryForm {
    pub label: String,
    pub repository_code: String,
    #[serde(default)]
    pub object: String,
    #[serde(flatten)]
    pub address: Address,
}

impl BeneficiaryForm {
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("label", &self.label),
            ("repository_code", &self.repository_code),
            ("postal_code", &self.address.postal_code),
            ("municipality", &self.address.municipality),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} is required", field));
            }
        }
        check_printable("label", &self.label)?;
        check_printable("repository_code", &self.repository_code)?;
        check_printable("object", &self.object)?;
        self.address.check_printable()
    }
}
