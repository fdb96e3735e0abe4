use chrono::{DateTime, Datelike, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

pub mod models;

use models::{
    Address, BeneficiaryForm, BeneficiaryOrganization, Company, CompanyIdentity, CompanyLegalForm,
    DeclarativeStructure, DonationAmounts, DonationRecord, DonorForm, DonorKind, Individual,
    IndividualIdentity, PaymentType, RecordMeta,
};

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = include_str!("../../migrations/init.sql");

const DONATION_COLUMNS: &str = "uuid, kind, label, legal_form, repository_code, first_name, last_name, \
    email, street_number, street, postal_code, municipality, cash_donation, cash_payment_type, \
    inkind_donation, inkind_donation_description, year, sequence, date_start, end_date, valid_date, \
    declarative_structure_id, created_at";

const BENEFICIARY_COLUMNS: &str =
    "id, label, repository_code, object, street_number, street, postal_code, municipality, signature";

// Writers queue on the database lock instead of failing with SQLITE_BUSY.
fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

pub async fn init_pool(path: &str, max_size: u32) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(init_connection);
    let pool = Pool::builder()
        .max_size(max_size)
        .connection_timeout(std::time::Duration::from_secs(30))
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool for {}: {}", path, e))?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Single shared in-memory connection; the database lives as long as the pool.
pub async fn init_memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(init_connection);
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)
        .map_err(|e| anyhow::anyhow!("Failed to create in-memory DB pool: {}", e))?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    with_conn(pool, |conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
    })
    .await
}

async fn with_conn<T, F>(pool: &DbPool, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_column(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|v| Decimal::from_str(&v).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn unknown_value(idx: usize, value: &str) -> rusqlite::Error {
    let err = std::io::Error::new(std::io::ErrorKind::InvalidData, format!("unexpected value {:?}", value));
    conversion_error(idx, err)
}

fn donation_from_row(row: &Row) -> rusqlite::Result<DonationRecord> {
    let uuid_raw: String = row.get(0)?;
    let uuid = Uuid::parse_str(&uuid_raw).map_err(|e| conversion_error(0, e))?;
    let kind_raw: String = row.get(1)?;
    let kind = DonorKind::parse(&kind_raw).ok_or_else(|| unknown_value(1, &kind_raw))?;

    let payment_type = match row.get::<_, Option<String>>(13)? {
        Some(raw) => Some(PaymentType::parse(&raw).ok_or_else(|| unknown_value(13, &raw))?),
        None => None,
    };

    let meta = RecordMeta {
        uuid,
        year: row.get(16)?,
        order: row.get(17)?,
        date_start: row.get(18)?,
        end_date: row.get(19)?,
        valid_date: row.get(20)?,
        created_at: row.get(22)?,
    };
    let address = Address {
        street_number: row.get(8)?,
        street: row.get(9)?,
        postal_code: row.get(10)?,
        municipality: row.get(11)?,
    };
    let donation = DonationAmounts {
        cash_donation: decimal_column(row, 12)?,
        cash_payment_type: payment_type,
        inkind_donation: decimal_column(row, 14)?,
        inkind_donation_description: row.get(15)?,
    };
    let email: Option<String> = row.get(7)?;
    let declarative_structure_id: i64 = row.get(21)?;

    Ok(match kind {
        DonorKind::Company => DonationRecord::Company(Company {
            meta,
            identity: CompanyIdentity {
                label: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                legal_form: row.get(3)?,
                repository_code: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            },
            email,
            address,
            donation,
            declarative_structure_id,
        }),
        DonorKind::Individual => DonationRecord::Individual(Individual {
            meta,
            identity: IndividualIdentity {
                first_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                last_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            },
            email,
            address,
            donation,
            declarative_structure_id,
        }),
    })
}

/// (label, legal_form, repository_code, first_name, last_name)
type IdentityColumns = (Option<String>, Option<String>, Option<String>, Option<String>, Option<String>);

fn identity_columns(form: &DonorForm) -> IdentityColumns {
    match form {
        DonorForm::Company(f) => (
            Some(f.identity.label.trim().to_string()),
            f.identity.legal_form.clone().filter(|c| !c.trim().is_empty()),
            Some(f.identity.repository_code.trim().to_string()),
            None,
            None,
        ),
        DonorForm::Individual(f) => (
            None,
            None,
            None,
            Some(f.identity.first_name.trim().to_string()),
            Some(f.identity.last_name.trim().to_string()),
        ),
    }
}

fn select_donation(conn: &Connection, kind: DonorKind, uuid: &Uuid) -> rusqlite::Result<Option<DonationRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM donations WHERE uuid = ?1 AND kind = ?2", DONATION_COLUMNS),
        params![uuid.to_string(), kind.as_str()],
        donation_from_row,
    )
    .optional()
}

/// Creates a donation record. The yearly order number is one past the highest
/// existing one for the same kind and year; the IMMEDIATE transaction holds the
/// database write lock between the read and the insert.
pub async fn create_donation(pool: &DbPool, form: &DonorForm, now: DateTime<Utc>) -> anyhow::Result<DonationRecord> {
    let form = form.clone();
    with_conn(pool, move |conn| {
        let kind = form.kind();
        let record = form.record();
        let year = record.date_start.year();
        let uuid = Uuid::new_v4();
        let (label, legal_form, repository_code, first_name, last_name) = identity_columns(&form);

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sequence: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM donations WHERE kind = ?1 AND year = ?2",
            params![kind.as_str(), year],
            |row| row.get(0),
        )?;
        tx.execute(
            &format!("INSERT INTO donations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)", DONATION_COLUMNS),
            params![
                uuid.to_string(),
                kind.as_str(),
                label,
                legal_form,
                repository_code,
                first_name,
                last_name,
                record.email,
                record.address.street_number,
                record.address.street,
                record.address.postal_code.trim(),
                record.address.municipality.trim(),
                record.donation.cash_donation.map(|d| d.to_string()),
                record.donation.cash_payment_type.map(PaymentType::as_str),
                record.donation.inkind_donation.map(|d| d.to_string()),
                record.donation.inkind_donation_description,
                year,
                sequence,
                record.date_start,
                record.end_date,
                Option::<NaiveDate>::None,
                record.declarative_structure_id,
                now,
            ],
        )?;
        let created = select_donation(&tx, kind, &uuid)?
            .ok_or_else(|| anyhow::anyhow!("donation {} vanished after insert", uuid))?;
        tx.commit()?;

        tracing::debug!("Created {} donation {} as {}", kind.as_str(), uuid, created.order_number());
        Ok(created)
    })
    .await
}

/// Rewrites the editable fields; year and order number stay as assigned.
pub async fn update_donation(pool: &DbPool, uuid: Uuid, form: &DonorForm) -> anyhow::Result<Option<DonationRecord>> {
    let form = form.clone();
    with_conn(pool, move |conn| {
        let kind = form.kind();
        let record = form.record();
        let (label, legal_form, repository_code, first_name, last_name) = identity_columns(&form);

        let changed = conn.execute(
            "UPDATE donations SET label = ?1, legal_form = ?2, repository_code = ?3, first_name = ?4, \
             last_name = ?5, email = ?6, street_number = ?7, street = ?8, postal_code = ?9, municipality = ?10, \
             cash_donation = ?11, cash_payment_type = ?12, inkind_donation = ?13, inkind_donation_description = ?14, \
             date_start = ?15, end_date = ?16, declarative_structure_id = ?17 \
             WHERE uuid = ?18 AND kind = ?19",
            params![
                label,
                legal_form,
                repository_code,
                first_name,
                last_name,
                record.email,
                record.address.street_number,
                record.address.street,
                record.address.postal_code.trim(),
                record.address.municipality.trim(),
                record.donation.cash_donation.map(|d| d.to_string()),
                record.donation.cash_payment_type.map(PaymentType::as_str),
                record.donation.inkind_donation.map(|d| d.to_string()),
                record.donation.inkind_donation_description,
                record.date_start,
                record.end_date,
                record.declarative_structure_id,
                uuid.to_string(),
                kind.as_str(),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Ok(select_donation(conn, kind, &uuid)?)
    })
    .await
}

pub async fn get_donation(pool: &DbPool, kind: DonorKind, uuid: Uuid) -> anyhow::Result<Option<DonationRecord>> {
    with_conn(pool, move |conn| Ok(select_donation(conn, kind, &uuid)?)).await
}

pub async fn list_donations(pool: &DbPool, kind: DonorKind) -> anyhow::Result<Vec<DonationRecord>> {
    with_conn(pool, move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM donations WHERE kind = ?1 ORDER BY year DESC, sequence DESC",
            DONATION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![kind.as_str()], donation_from_row)?;
        let list = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(list)
    })
    .await
}

/// Stamps `valid_date` on every listed record of the given kind. Returns how many matched.
pub async fn mark_validated(pool: &DbPool, kind: DonorKind, uuids: &[Uuid], date: NaiveDate) -> anyhow::Result<usize> {
    let mut uuids = uuids.to_vec();
    uuids.sort_unstable();
    uuids.dedup();
    with_conn(pool, move |conn| {
        let tx = conn.transaction()?;
        let mut updated = 0usize;
        {
            let mut stmt = tx.prepare("UPDATE donations SET valid_date = ?1 WHERE uuid = ?2 AND kind = ?3")?;
            for uuid in &uuids {
                updated += stmt.execute(params![date, uuid.to_string(), kind.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    })
    .await
}

pub async fn create_declarative_structure(pool: &DbPool, label: &str) -> anyhow::Result<DeclarativeStructure> {
    let label = label.trim().to_string();
    with_conn(pool, move |conn| {
        conn.execute("INSERT INTO declarative_structures (label) VALUES (?1)", params![label])?;
        Ok(DeclarativeStructure { id: conn.last_insert_rowid(), label })
    })
    .await
}

pub async fn get_declarative_structure(pool: &DbPool, id: i64) -> anyhow::Result<Option<DeclarativeStructure>> {
    with_conn(pool, move |conn| {
        Ok(conn
            .query_row(
                "SELECT id, label FROM declarative_structures WHERE id = ?1",
                params![id],
                |row| Ok(DeclarativeStructure { id: row.get(0)?, label: row.get(1)? }),
            )
            .optional()?)
    })
    .await
}

pub async fn list_declarative_structures(pool: &DbPool) -> anyhow::Result<Vec<DeclarativeStructure>> {
    with_conn(pool, |conn| {
        let mut stmt = conn.prepare("SELECT id, label FROM declarative_structures ORDER BY label")?;
        let rows = stmt.query_map([], |row| Ok(DeclarativeStructure { id: row.get(0)?, label: row.get(1)? }))?;
        let list = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(list)
    })
    .await
}

pub async fn create_legal_form(pool: &DbPool, code: &str, label: &str) -> anyhow::Result<CompanyLegalForm> {
    let form = CompanyLegalForm { code: code.trim().to_string(), label: label.trim().to_string() };
    with_conn(pool, move |conn| {
        conn.execute(
            "INSERT INTO company_legal_forms (code, label) VALUES (?1, ?2)",
            params![form.code, form.label],
        )?;
        Ok(form)
    })
    .await
}

pub async fn legal_form_exists(pool: &DbPool, code: &str) -> anyhow::Result<bool> {
    let code = code.to_string();
    with_conn(pool, move |conn| {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM company_legal_forms WHERE code = ?1", params![code], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    })
    .await
}

pub async fn list_legal_forms(pool: &DbPool) -> anyhow::Result<Vec<CompanyLegalForm>> {
    with_conn(pool, |conn| {
        let mut stmt = conn.prepare("SELECT code, label FROM company_legal_forms ORDER BY label")?;
        let rows = stmt.query_map([], |row| Ok(CompanyLegalForm { code: row.get(0)?, label: row.get(1)? }))?;
        let list = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(list)
    })
    .await
}

fn beneficiary_from_row(row: &Row) -> rusqlite::Result<BeneficiaryOrganization> {
    Ok(BeneficiaryOrganization {
        id: row.get(0)?,
        label: row.get(1)?,
        repository_code: row.get(2)?,
        object: row.get(3)?,
        address: Address {
            street_number: row.get(4)?,
            street: row.get(5)?,
            postal_code: row.get(6)?,
            municipality: row.get(7)?,
        },
        signature: row.get(8)?,
    })
}

fn select_beneficiary(conn: &Connection) -> rusqlite::Result<Option<BeneficiaryOrganization>> {
    conn.query_row(
        &format!("SELECT {} FROM beneficiary_organizations ORDER BY id LIMIT 1", BENEFICIARY_COLUMNS),
        [],
        beneficiary_from_row,
    )
    .optional()
}

/// The authoritative issuer: the first beneficiary organization row.
pub async fn get_beneficiary_organization(pool: &DbPool) -> anyhow::Result<Option<BeneficiaryOrganization>> {
    with_conn(pool, |conn| Ok(select_beneficiary(conn)?)).await
}

pub async fn upsert_beneficiary_organization(pool: &DbPool, form: &BeneficiaryForm) -> anyhow::Result<BeneficiaryOrganization> {
    let form = form.clone();
    with_conn(pool, move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match select_beneficiary(&tx)? {
            Some(existing) => {
                tx.execute(
                    "UPDATE beneficiary_organizations SET label = ?1, repository_code = ?2, object = ?3, \
                     street_number = ?4, street = ?5, postal_code = ?6, municipality = ?7 WHERE id = ?8",
                    params![
                        form.label.trim(),
                        form.repository_code.trim(),
                        form.object.trim(),
                        form.address.street_number,
                        form.address.street,
                        form.address.postal_code.trim(),
                        form.address.municipality.trim(),
                        existing.id,
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO beneficiary_organizations \
                     (label, repository_code, object, street_number, street, postal_code, municipality) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        form.label.trim(),
                        form.repository_code.trim(),
                        form.object.trim(),
                        form.address.street_number,
                        form.address.street,
                        form.address.postal_code.trim(),
                        form.address.municipality.trim(),
                    ],
                )?;
            }
        }
        let saved = select_beneficiary(&tx)?
            .ok_or_else(|| anyhow::anyhow!("beneficiary organization vanished after save"))?;
        tx.commit()?;
        Ok(saved)
    })
    .await
}

/// Points the authoritative beneficiary at a stored signature image.
/// Returns false when no beneficiary exists yet.
pub async fn set_beneficiary_signature(pool: &DbPool, path: &str) -> anyhow::Result<bool> {
    let path = path.to_string();
    with_conn(pool, move |conn| {
        let changed = conn.execute(
            "UPDATE beneficiary_organizations SET signature = ?1 \
             WHERE id = (SELECT id FROM beneficiary_organizations ORDER BY id LIMIT 1)",
            params![path],
        )?;
        Ok(changed > 0)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{CompanyForm, IndividualForm, RecordForm};

    fn record_form(structure_id: i64, date_start: NaiveDate) -> RecordForm {
        RecordForm {
            email: None,
            address: Address {
                street_number: None,
                street: None,
                postal_code: "75002".into(),
                municipality: "Paris".into(),
            },
            donation: DonationAmounts {
                cash_donation: Some(Decimal::new(10000, 2)),
                cash_payment_type: Some(PaymentType::Cheque),
                inkind_donation: Some(Decimal::new(5000, 2)),
                inkind_donation_description: String::new(),
            },
            date_start,
            end_date: None,
            declarative_structure_id: structure_id,
        }
    }

    fn company(structure_id: i64, date_start: NaiveDate) -> DonorForm {
        DonorForm::Company(CompanyForm {
            identity: CompanyIdentity {
                label: "Test Company".into(),
                legal_form: None,
                repository_code: "54321".into(),
            },
            record: record_form(structure_id, date_start),
        })
    }

    fn individual(structure_id: i64, date_start: NaiveDate) -> DonorForm {
        DonorForm::Individual(IndividualForm {
            identity: IndividualIdentity { first_name: "Jeanne".into(), last_name: "Martin".into() },
            record: record_form(structure_id, date_start),
        })
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[tokio::test]
    async fn order_numbers_restart_each_year_and_per_kind() {
        let pool = init_memory_pool().await.expect("init pool");
        let structure = create_declarative_structure(&pool, "Test Structure").await.expect("structure");
        let now = Utc::now();

        let a = create_donation(&pool, &company(structure.id, date(2024, 1, 5)), now).await.unwrap();
        let b = create_donation(&pool, &company(structure.id, date(2024, 6, 1)), now).await.unwrap();
        let c = create_donation(&pool, &company(structure.id, date(2025, 2, 1)), now).await.unwrap();
        let d = create_donation(&pool, &individual(structure.id, date(2024, 3, 3)), now).await.unwrap();
        let e = create_donation(&pool, &company(structure.id, date(2024, 12, 31)), now).await.unwrap();

        assert_eq!(a.order_number(), "2024-PM-1");
        assert_eq!(b.order_number(), "2024-PM-2");
        assert_eq!(c.order_number(), "2025-PM-1");
        assert_eq!(d.order_number(), "2024-PP-1");
        assert_eq!(e.order_number(), "2024-PM-3");
    }

    #[tokio::test]
    async fn update_keeps_the_assigned_order_number() {
        let pool = init_memory_pool().await.expect("init pool");
        let structure = create_declarative_structure(&pool, "Test Structure").await.unwrap();
        let created = create_donation(&pool, &company(structure.id, date(2024, 1, 5)), Utc::now()).await.unwrap();

        let mut form = company(structure.id, date(2025, 4, 2));
        if let DonorForm::Company(f) = &mut form {
            f.identity.label = "Updated Company".into();
            f.record.donation.cash_donation = Some(Decimal::new(15000, 2));
            f.record.donation.inkind_donation = Some(Decimal::new(7500, 2));
        }
        let updated = update_donation(&pool, created.meta().uuid, &form).await.unwrap().expect("updated");

        assert_eq!(updated.order_number(), "2024-PM-1");
        assert_eq!(updated.meta().date_start, date(2025, 4, 2));
        assert_eq!(updated.donor_name(), "Updated Company");
        assert_eq!(updated.total_donation(), Decimal::new(22500, 2));
    }

    #[tokio::test]
    async fn records_are_scoped_by_kind() {
        let pool = init_memory_pool().await.expect("init pool");
        let structure = create_declarative_structure(&pool, "Test Structure").await.unwrap();
        let created = create_donation(&pool, &individual(structure.id, date(2024, 1, 5)), Utc::now()).await.unwrap();
        let uuid = created.meta().uuid;

        assert!(get_donation(&pool, DonorKind::Company, uuid).await.unwrap().is_none());
        let fetched = get_donation(&pool, DonorKind::Individual, uuid).await.unwrap().expect("found");
        assert_eq!(fetched.donor_name(), "Jeanne Martin");
        assert!(update_donation(&pool, uuid, &company(structure.id, date(2024, 1, 5))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn amounts_survive_storage_exactly() {
        let pool = init_memory_pool().await.expect("init pool");
        let structure = create_declarative_structure(&pool, "Test Structure").await.unwrap();
        let created = create_donation(&pool, &company(structure.id, date(2024, 1, 5)), Utc::now()).await.unwrap();
        let fetched = get_donation(&pool, DonorKind::Company, created.meta().uuid).await.unwrap().unwrap();

        assert_eq!(fetched.donation().cash_donation, Some(Decimal::new(10000, 2)));
        assert_eq!(fetched.donation().cash_payment_type, Some(PaymentType::Cheque));
        assert_eq!(fetched.total_donation().to_string(), "150.00");
    }

    #[tokio::test]
    async fn mark_validated_only_touches_matching_kind() {
        let pool = init_memory_pool().await.expect("init pool");
        let structure = create_declarative_structure(&pool, "Test Structure").await.unwrap();
        let c = create_donation(&pool, &company(structure.id, date(2024, 1, 5)), Utc::now()).await.unwrap();
        let i = create_donation(&pool, &individual(structure.id, date(2024, 1, 5)), Utc::now()).await.unwrap();

        let today = date(2024, 7, 14);
        let updated = mark_validated(&pool, DonorKind::Company, &[c.meta().uuid, i.meta().uuid], today).await.unwrap();
        assert_eq!(updated, 1);

        let c = get_donation(&pool, DonorKind::Company, c.meta().uuid).await.unwrap().unwrap();
        let i = get_donation(&pool, DonorKind::Individual, i.meta().uuid).await.unwrap().unwrap();
        assert_eq!(c.meta().valid_date, Some(today));
        assert_eq!(i.meta().valid_date, None);
    }

    #[tokio::test]
    async fn repeated_uuids_count_once() {
        let pool = init_memory_pool().await.expect("init pool");
        let structure = create_declarative_structure(&pool, "Test Structure").await.unwrap();
        let c = create_donation(&pool, &company(structure.id, date(2024, 1, 5)), Utc::now()).await.unwrap();
        let uuid = c.meta().uuid;

        let updated = mark_validated(&pool, DonorKind::Company, &[uuid, uuid, uuid], date(2024, 7, 14)).await.unwrap();
        assert_eq!(updated, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creations_get_distinct_consecutive_orders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.sqlite3");
        let pool = init_pool(path.to_str().unwrap(), 8).await.expect("init pool");
        let structure = create_declarative_structure(&pool, "Test Structure").await.unwrap();

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let pool = pool.clone();
                let form = company(structure.id, date(2024, 5, 1));
                tokio::spawn(async move { create_donation(&pool, &form, Utc::now()).await })
            })
            .collect();

        let mut orders = Vec::new();
        for task in tasks {
            let record = task.await.expect("task joined").expect("donation created");
            orders.push(record.meta().order);
        }
        orders.sort_unstable();
        assert_eq!(orders, (1..=40).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn unknown_structure_is_rejected_by_the_schema() {
        let pool = init_memory_pool().await.expect("init pool");
        assert!(create_donation(&pool, &company(42, date(2024, 1, 5)), Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn first_beneficiary_is_authoritative() {
        let pool = init_memory_pool().await.expect("init pool");
        assert!(get_beneficiary_organization(&pool).await.unwrap().is_none());
        assert!(!set_beneficiary_signature(&pool, "signatures/a.png").await.unwrap());

        let form = BeneficiaryForm {
            label: "Test Beneficiary".into(),
            repository_code: "12345".into(),
            object: "Aide alimentaire".into(),
            address: Address {
                street_number: None,
                street: None,
                postal_code: "75001".into(),
                municipality: "Paris".into(),
            },
        };
        let first = upsert_beneficiary_organization(&pool, &form).await.unwrap();
        let mut renamed = form.clone();
        renamed.label = "Renamed".into();
        let second = upsert_beneficiary_organization(&pool, &renamed).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.label, "Renamed");

        assert!(set_beneficiary_signature(&pool, "signatures/a.png").await.unwrap());
        let current = get_beneficiary_organization(&pool).await.unwrap().unwrap();
        assert_eq!(current.signature.as_deref(), Some("signatures/a.png"));
    }
}
