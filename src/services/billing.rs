//! Debit-order billing: the monthly export, reconciliation of the bank's results
//! file and the yearly fee increase.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::TagSettings;
use crate::domain::batch::batch_id;
use crate::domain::{
    BillingBatch, FeeAdjustment, PaymentStatus, PetFilter, PetRecord, PetUpdate, TagStatus,
    UpdateOutcome,
};
use crate::error::AppError;
use crate::ports::{BlobStore, Bucket, LedgerRepository, PetRepository};
use crate::services::notifier::{Notification, NotificationDispatcher, TEMPLATE_PAYMENT_REMINDER};

pub const BILLING_HEADER: [&str; 5] = [
    "Customer_ID",
    "Account_Holder_Name",
    "Account_Number",
    "Branch_Code",
    "Amount",
];

const CUSTOMER_ID_COLUMN: &str = "Customer_ID";
const STATUS_COLUMN: &str = "Status";

/// Rounds to cents and pins the scale so the value prints with two decimals.
pub fn to_cents(amount: &BigDecimal) -> BigDecimal {
    amount.round(2).with_scale(2)
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingManifest {
    pub batch_id: String,
    pub filename: String,
    pub download_path: String,
    pub customer_count: i64,
    pub total_amount: BigDecimal,
}

/// One row of a bank results file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentResult {
    pub customer_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentResults {
    pub rows: Vec<PaymentResult>,
    /// Rows that could not be read at all.
    pub malformed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub updated_count: u64,
    pub failed_count: u64,
    pub skipped_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_pets: u64,
    pub paid_count: u64,
    pub arrears_count: u64,
    pub monthly_revenue: BigDecimal,
    pub by_tag_status: BTreeMap<TagStatus, u64>,
}

enum Outcome {
    Paid,
    Failed,
}

fn classify(status: &str) -> Option<Outcome> {
    match status.trim().to_ascii_lowercase().as_str() {
        "success" | "paid" => Some(Outcome::Paid),
        "failed" | "declined" => Some(Outcome::Failed),
        _ => None,
    }
}

/// Renders the debit-order file. Returns the bytes and the total billed.
pub fn render_billing_csv(pets: &[PetRecord]) -> Result<(Vec<u8>, BigDecimal), AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(BILLING_HEADER).map_err(csv_error)?;

    let mut total = BigDecimal::from(0);
    for pet in pets {
        let amount = to_cents(&pet.monthly_fee);
        writer
            .write_record([
                pet.identifier.as_str(),
                pet.owner.account_holder_name.as_str(),
                pet.owner.bank_account_number.as_str(),
                pet.owner.branch_code.as_str(),
                amount.to_string().as_str(),
            ])
            .map_err(csv_error)?;
        total += amount;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("failed to flush billing file: {}", e)))?;
    Ok((bytes, to_cents(&total)))
}

/// Reads a results file. The header must name `Customer_ID` and `Status` (in any
/// case, any position); other columns are ignored.
/// Unique per batch: carries the random part of the batch id.
fn export_filename(batch_id: &str, created_at: DateTime<Utc>) -> String {
    let suffix = batch_id.rsplit_once('-').map_or(batch_id, |(_, suffix)| suffix);
    format!("billing_{}_{}.csv", created_at.format("%Y%m%d_%H%M%S"), suffix)
}

pub fn parse_payment_results<R: Read>(reader: R) -> Result<PaymentResults, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::InvalidInput(format!("unreadable results header: {}", e)))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
            .ok_or_else(|| AppError::InvalidInput(format!("results file has no {} column", name)))
    };
    let id_at = column(CUSTOMER_ID_COLUMN)?;
    let status_at = column(STATUS_COLUMN)?;

    let mut results = PaymentResults::default();
    for record in reader.records() {
        let Ok(record) = record else {
            results.malformed += 1;
            continue;
        };
        match (record.get(id_at), record.get(status_at)) {
            (Some(customer_id), Some(status)) if !customer_id.is_empty() && !status.is_empty() => {
                results.rows.push(PaymentResult {
                    customer_id: customer_id.to_string(),
                    status: status.to_string(),
                });
            }
            _ => results.malformed += 1,
        }
    }
    Ok(results)
}

fn csv_error(err: csv::Error) -> AppError {
    AppError::Internal(format!("failed to write billing file: {}", err))
}

/// First instant of the calendar year containing `now`.
fn start_of_year(now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
    NaiveDate::from_ymd_opt(now.year(), 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| AppError::Internal(format!("no January 1st in {}", now.year())))
}

pub struct BillingService {
    pets: Arc<dyn PetRepository>,
    ledger: Arc<dyn LedgerRepository>,
    blobs: Arc<dyn BlobStore>,
    notifications: NotificationDispatcher,
    settings: TagSettings,
}

impl BillingService {
    pub fn new(
        pets: Arc<dyn PetRepository>,
        ledger: Arc<dyn LedgerRepository>,
        blobs: Arc<dyn BlobStore>,
        notifications: NotificationDispatcher,
        settings: TagSettings,
    ) -> Self {
        Self {
            pets,
            ledger,
            blobs,
            notifications,
            settings,
        }
    }

    /// Writes one debit row per paid record to the billing exports bucket.
    pub async fn generate_billing_batch(&self) -> Result<BillingManifest, AppError> {
        let paid = self.pets.list(&billable()).await?;
        if paid.is_empty() {
            return Err(AppError::NoEligibleRecords(
                "no paid records to bill".to_string(),
            ));
        }

        let (bytes, total_amount) = render_billing_csv(&paid)?;
        let created_at = Utc::now();
        let batch_id = batch_id("BILL", created_at);
        let filename = export_filename(&batch_id, created_at);
        let download_path = self
            .blobs
            .put(Bucket::BillingExports, &filename, &bytes)
            .await?;

        let batch = BillingBatch {
            batch_id,
            filename,
            customer_count: paid.len() as i64,
            total_amount,
            created_at,
        };
        self.ledger.insert_billing_batch(&batch).await?;

        tracing::info!(
            batch_id = %batch.batch_id,
            filename = %batch.filename,
            customers = batch.customer_count,
            total = %batch.total_amount,
            "billing file generated"
        );
        Ok(BillingManifest {
            batch_id: batch.batch_id,
            filename: batch.filename,
            download_path,
            customer_count: batch.customer_count,
            total_amount: batch.total_amount,
        })
    }

    pub async fn download(&self, filename: &str) -> Result<Vec<u8>, AppError> {
        Ok(self.blobs.get(Bucket::BillingExports, filename).await?)
    }

    pub async fn list_billing_batches(&self) -> Result<Vec<BillingBatch>, AppError> {
        Ok(self.ledger.list_billing_batches().await?)
    }

    /// Best-effort reconciliation. Rows naming an unknown pet or carrying an
    /// unrecognised status are skipped, never rejected.
    pub async fn import_payment_results(
        &self,
        results: &PaymentResults,
    ) -> Result<ImportSummary, AppError> {
        let mut summary = ImportSummary {
            skipped_count: results.malformed,
            ..Default::default()
        };

        for row in &results.rows {
            let Some(outcome) = classify(&row.status) else {
                tracing::debug!(customer_id = %row.customer_id, status = %row.status, "unrecognised payment status");
                summary.skipped_count += 1;
                continue;
            };
            let Some(pet) = self.pets.find(row.customer_id.trim()).await? else {
                tracing::debug!(customer_id = %row.customer_id, "payment result for unknown pet");
                summary.skipped_count += 1;
                continue;
            };

            let now = Utc::now();
            match outcome {
                Outcome::Paid => {
                    let update = PetUpdate {
                        payment_status: Some(PaymentStatus::Paid),
                        last_payment_at: Some(now),
                        ..Default::default()
                    };
                    if self.pets.update_one(&pet.identifier, &update).await? == UpdateOutcome::Modified {
                        summary.updated_count += 1;
                    }
                }
                Outcome::Failed => {
                    let remind = self.settings.send_payment_reminders;
                    let update = PetUpdate {
                        payment_status: Some(PaymentStatus::Arrears),
                        last_reminder_sent_at: remind.then_some(now),
                        ..Default::default()
                    };
                    if self.pets.update_one(&pet.identifier, &update).await? == UpdateOutcome::Modified {
                        summary.failed_count += 1;
                        if remind {
                            self.send_reminder(&pet);
                        }
                    }
                }
            }
        }

        tracing::info!(
            updated = summary.updated_count,
            failed = summary.failed_count,
            skipped = summary.skipped_count,
            "payment results imported"
        );
        Ok(summary)
    }

    fn send_reminder(&self, pet: &PetRecord) {
        self.notifications.dispatch(Notification {
            recipient: pet.owner.email.clone(),
            subject: format!("Payment failed for {}", pet.name),
            template: TEMPLATE_PAYMENT_REMINDER.to_string(),
            context: serde_json::json!({
                "owner_name": pet.owner.name,
                "pet_name": pet.name,
                "pet_id": pet.identifier,
                "amount": to_cents(&pet.monthly_fee).to_string(),
            }),
            attachments: Vec::new(),
        });
    }

    /// Raises the fee of every paid record not yet adjusted this calendar year.
    /// Running it twice in one year changes nothing the second time.
    pub async fn apply_annual_fee_adjustment(
        &self,
        percentage: BigDecimal,
    ) -> Result<FeeAdjustment, AppError> {
        if percentage <= BigDecimal::from(-100) {
            return Err(AppError::InvalidInput(format!(
                "fee adjustment of {}% would leave no fee",
                percentage
            )));
        }

        let now = Utc::now();
        let filter = PetFilter {
            payment_status: Some(PaymentStatus::Paid),
            not_adjusted_since: Some(start_of_year(now)?),
            ..Default::default()
        };
        let candidates = self.pets.list(&filter).await?;
        let factor = BigDecimal::from(1) + &percentage / BigDecimal::from(100);

        let mut affected_count = 0;
        for pet in &candidates {
            let update = PetUpdate {
                monthly_fee: Some(to_cents(&(&pet.monthly_fee * &factor))),
                last_adjustment_at: Some(now),
                ..Default::default()
            };
            if self.pets.update_one(&pet.identifier, &update).await? == UpdateOutcome::Modified {
                affected_count += 1;
            }
        }

        let adjustment = FeeAdjustment {
            adjustment_id: Uuid::new_v4().to_string(),
            percentage,
            affected_count,
            applied_at: now,
        };
        self.ledger.insert_fee_adjustment(&adjustment).await?;

        tracing::info!(
            adjustment_id = %adjustment.adjustment_id,
            percentage = %adjustment.percentage,
            affected = affected_count,
            "annual fee adjustment applied"
        );
        Ok(adjustment)
    }

    pub async fn list_fee_adjustments(&self) -> Result<Vec<FeeAdjustment>, AppError> {
        Ok(self.ledger.list_fee_adjustments().await?)
    }

    pub async fn update_payment_status(
        &self,
        identifier: &str,
        status: PaymentStatus,
    ) -> Result<(), AppError> {
        let update = PetUpdate {
            payment_status: Some(status),
            last_payment_at: (status == PaymentStatus::Paid).then(Utc::now),
            ..Default::default()
        };
        if self.pets.update_one(identifier, &update).await? == UpdateOutcome::Missing {
            return Err(AppError::NotFound(format!("Pet {} not found", identifier)));
        }

        tracing::info!(%identifier, %status, "payment status updated");
        Ok(())
    }

    pub async fn stats(&self) -> Result<DashboardStats, AppError> {
        let pets = self.pets.list(&PetFilter::default()).await?;

        let mut by_tag_status: BTreeMap<TagStatus, u64> =
            TagStatus::ALL.into_iter().map(|status| (status, 0)).collect();
        let mut paid_count = 0;
        let mut revenue = BigDecimal::from(0);
        for pet in &pets {
            *by_tag_status.entry(pet.tag_status).or_default() += 1;
            if pet.payment_status == PaymentStatus::Paid {
                paid_count += 1;
                if pet.tag_status != TagStatus::Replaced {
                    revenue += &pet.monthly_fee;
                }
            }
        }

        Ok(DashboardStats {
            total_pets: pets.len() as u64,
            paid_count,
            arrears_count: pets.len() as u64 - paid_count,
            monthly_revenue: to_cents(&revenue),
            by_tag_status,
        })
    }
}

/// Paid records still carrying a live tag. A replaced tag's fee moves to its
/// successor.
fn billable() -> PetFilter {
    PetFilter {
        payment_status: Some(PaymentStatus::Paid),
        exclude_replaced: true,
        ..Default::default()
    }
}
