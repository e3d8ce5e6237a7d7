mod common;

use bigdecimal::BigDecimal;
use std::str::FromStr;

use common::{harness, harness_with, register};
use pettag_core::config::TagSettings;
use pettag_core::domain::{PaymentStatus, PetUpdate, ReplacementReason, TagStatus};
use pettag_core::error::AppError;
use pettag_core::ports::PetRepository;
use pettag_core::services::billing::{parse_payment_results, PaymentResult, PaymentResults};
use pettag_core::services::notifier::TEMPLATE_PAYMENT_REMINDER;

fn decimal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn results(rows: &[(&str, &str)]) -> PaymentResults {
    PaymentResults {
        rows: rows
            .iter()
            .map(|(customer_id, status)| PaymentResult {
                customer_id: customer_id.to_string(),
                status: status.to_string(),
            })
            .collect(),
        malformed: 0,
    }
}

async fn set_fee(h: &common::Harness, identifier: &str, fee: &str) {
    let update = PetUpdate {
        monthly_fee: Some(decimal(fee)),
        ..Default::default()
    };
    h.store.update_one(identifier, &update).await.unwrap();
}

async fn set_payment(h: &common::Harness, identifier: &str, status: PaymentStatus) {
    h.state
        .billing
        .update_payment_status(identifier, status)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_billing_without_paid_records_fails() {
    let h = harness().await;
    let err = h.state.billing.generate_billing_batch().await.unwrap_err();
    assert!(matches!(err, AppError::NoEligibleRecords(_)));

    let id = register(&h, "Rex").await;
    set_payment(&h, &id, PaymentStatus::Arrears).await;
    let err = h.state.billing.generate_billing_batch().await.unwrap_err();
    assert!(matches!(err, AppError::NoEligibleRecords(_)));
}

#[tokio::test]
async fn test_billing_file_has_one_row_per_paid_record() {
    let h = harness().await;
    let a = register(&h, "Rex").await;
    let b = register(&h, "Bella").await;
    let c = register(&h, "Max").await;
    set_fee(&h, &b, "3.5").await;
    set_payment(&h, &c, PaymentStatus::Arrears).await;

    let manifest = h.state.billing.generate_billing_batch().await.unwrap();

    assert_eq!(manifest.customer_count, 2);
    assert_eq!(manifest.total_amount.to_string(), "5.50");
    assert!(manifest.filename.starts_with("billing_"));
    assert!(manifest.filename.ends_with(".csv"));
    assert_eq!(
        manifest.download_path,
        format!("/billing_exports/{}", manifest.filename)
    );

    let bytes = h.state.billing.download(&manifest.filename).await.unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Customer_ID,Account_Holder_Name,Account_Number,Branch_Code,Amount".to_string(),
            format!("{},J Doe,123456789,250655,2.00", a),
            format!("{},J Doe,123456789,250655,3.50", b),
        ]
    );

    let batches = h.state.billing.list_billing_batches().await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].batch_id, manifest.batch_id);
    assert_eq!(batches[0].customer_count, 2);
}

#[tokio::test]
async fn test_back_to_back_exports_keep_their_own_files() {
    let h = harness().await;
    register(&h, "Rex").await;
    let b = register(&h, "Bella").await;

    let first = h.state.billing.generate_billing_batch().await.unwrap();
    set_payment(&h, &b, PaymentStatus::Arrears).await;
    let second = h.state.billing.generate_billing_batch().await.unwrap();

    assert_ne!(first.filename, second.filename);
    assert_eq!(first.customer_count, 2);
    assert_eq!(second.customer_count, 1);

    let bytes = h.state.billing.download(&first.filename).await.unwrap();
    let rows = String::from_utf8(bytes).unwrap().lines().count() - 1;
    assert_eq!(rows as i64, first.customer_count);

    let bytes = h.state.billing.download(&second.filename).await.unwrap();
    let rows = String::from_utf8(bytes).unwrap().lines().count() - 1;
    assert_eq!(rows as i64, second.customer_count);
}

#[tokio::test]
async fn test_replaced_tag_is_billed_once_through_its_successor() {
    let h = harness().await;
    let original = register(&h, "Rex").await;
    let successor = h
        .state
        .replacements
        .create_replacement(&original, ReplacementReason::Lost)
        .await
        .unwrap()
        .new_identifier;

    let manifest = h.state.billing.generate_billing_batch().await.unwrap();
    assert_eq!(manifest.customer_count, 1);
    assert_eq!(manifest.total_amount.to_string(), "2.00");

    let bytes = h.state.billing.download(&manifest.filename).await.unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains(&successor));
    assert!(!text.contains(&original));

    let stats = h.state.billing.stats().await.unwrap();
    assert_eq!(stats.monthly_revenue.to_string(), "2.00");
}

#[tokio::test]
async fn test_fee_adjustment_applies_once_per_year() {
    let h = harness().await;
    let paid = register(&h, "Rex").await;
    let behind = register(&h, "Bella").await;
    set_payment(&h, &behind, PaymentStatus::Arrears).await;

    let first = h
        .state
        .billing
        .apply_annual_fee_adjustment(decimal("10"))
        .await
        .unwrap();
    assert_eq!(first.affected_count, 1);

    let pet = h.store.find(&paid).await.unwrap().unwrap();
    assert_eq!(pet.monthly_fee.to_string(), "2.20");
    assert!(pet.last_adjustment_at.is_some());
    let untouched = h.store.find(&behind).await.unwrap().unwrap();
    assert_eq!(untouched.monthly_fee.to_string(), "2.00");

    let second = h
        .state
        .billing
        .apply_annual_fee_adjustment(decimal("10"))
        .await
        .unwrap();
    assert_eq!(second.affected_count, 0);
    assert_eq!(
        h.store.find(&paid).await.unwrap().unwrap().monthly_fee.to_string(),
        "2.20"
    );

    let audit = h.state.billing.list_fee_adjustments().await.unwrap();
    assert_eq!(audit.len(), 2);
}

#[tokio::test]
async fn test_fee_adjustment_rounds_to_cents() {
    let h = harness().await;
    let id = register(&h, "Rex").await;
    set_fee(&h, &id, "3.33").await;

    h.state
        .billing
        .apply_annual_fee_adjustment(decimal("7.5"))
        .await
        .unwrap();

    // 3.33 * 1.075 = 3.57975
    let pet = h.store.find(&id).await.unwrap().unwrap();
    assert_eq!(pet.monthly_fee.to_string(), "3.58");
}

#[tokio::test]
async fn test_fee_adjustment_rejects_wiping_out_fees() {
    let h = harness().await;
    let err = h
        .state
        .billing
        .apply_annual_fee_adjustment(decimal("-100"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn test_import_unknown_customer_changes_nothing() {
    let h = harness().await;
    register(&h, "Rex").await;

    let summary = h
        .state
        .billing
        .import_payment_results(&results(&[("PET424242", "success"), ("PET434343", "failed")]))
        .await
        .unwrap();

    assert_eq!(summary.updated_count, 0);
    assert_eq!(summary.failed_count, 0);
    assert_eq!(summary.skipped_count, 2);
}

#[tokio::test]
async fn test_import_reconciles_payments() {
    let h = harness().await;
    let recovering = register(&h, "Rex").await;
    let bouncing = register(&h, "Bella").await;
    set_payment(&h, &recovering, PaymentStatus::Arrears).await;

    let summary = h
        .state
        .billing
        .import_payment_results(&results(&[
            (recovering.as_str(), "Success"),
            (bouncing.as_str(), "DECLINED"),
            (bouncing.as_str(), "pending"),
        ]))
        .await
        .unwrap();

    assert_eq!(summary.updated_count, 1);
    assert_eq!(summary.failed_count, 1);
    assert_eq!(summary.skipped_count, 1);

    let paid = h.store.find(&recovering).await.unwrap().unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.last_payment_at.is_some());

    let arrears = h.store.find(&bouncing).await.unwrap().unwrap();
    assert_eq!(arrears.payment_status, PaymentStatus::Arrears);
    assert!(arrears.last_reminder_sent_at.is_some());

    let sent = h.notifications(3).await;
    let reminders: Vec<_> = sent
        .iter()
        .filter(|n| n.template == TEMPLATE_PAYMENT_REMINDER)
        .collect();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].recipient, "jane@example.com");
}

#[tokio::test]
async fn test_import_without_reminders() {
    let h = harness_with(TagSettings {
        send_payment_reminders: false,
        ..TagSettings::default()
    })
    .await;
    let id = register(&h, "Rex").await;

    let summary = h
        .state
        .billing
        .import_payment_results(&results(&[(id.as_str(), "failed")]))
        .await
        .unwrap();
    assert_eq!(summary.failed_count, 1);

    let pet = h.store.find(&id).await.unwrap().unwrap();
    assert_eq!(pet.payment_status, PaymentStatus::Arrears);
    assert!(pet.last_reminder_sent_at.is_none());
}

#[tokio::test]
async fn test_import_from_csv_counts_malformed_rows() {
    let h = harness().await;
    let id = register(&h, "Rex").await;
    set_payment(&h, &id, PaymentStatus::Arrears).await;

    let csv = format!(
        "Customer_ID,Status,Reference\n{},paid,REF1\n,failed,REF2\nPET000099,success,REF3\n",
        id
    );
    let parsed = parse_payment_results(csv.as_bytes()).unwrap();
    let summary = h
        .state
        .billing
        .import_payment_results(&parsed)
        .await
        .unwrap();

    assert_eq!(summary.updated_count, 1);
    assert_eq!(summary.failed_count, 0);
    assert_eq!(summary.skipped_count, 2);
}

#[tokio::test]
async fn test_update_payment_status_unknown_pet() {
    let h = harness().await;
    let err = h
        .state
        .billing
        .update_payment_status("PET000404", PaymentStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_dashboard_stats() {
    let h = harness().await;
    let a = register(&h, "Rex").await;
    let b = register(&h, "Bella").await;
    register(&h, "Max").await;
    set_fee(&h, &a, "3.5").await;
    set_payment(&h, &b, PaymentStatus::Arrears).await;
    h.state.lifecycle.set_status(&a, TagStatus::Shipped).await.unwrap();

    let stats = h.state.billing.stats().await.unwrap();

    assert_eq!(stats.total_pets, 3);
    assert_eq!(stats.paid_count, 2);
    assert_eq!(stats.arrears_count, 1);
    assert_eq!(stats.monthly_revenue.to_string(), "5.50");
    assert_eq!(stats.by_tag_status[&TagStatus::Ordered], 2);
    assert_eq!(stats.by_tag_status[&TagStatus::Shipped], 1);
    assert_eq!(stats.by_tag_status[&TagStatus::Replaced], 0);
}

#[tokio::test]
async fn test_reminders_are_sent_once_notifications_drain() {
    let h = harness().await;
    let id = register(&h, "Rex").await;

    h.state
        .billing
        .import_payment_results(&results(&[(id.as_str(), "failed")]))
        .await
        .unwrap();
    h.state.notifications.drain().await;

    let sent = h.notifier.sent.lock().await;
    assert!(sent
        .iter()
        .any(|n| n.template == TEMPLATE_PAYMENT_REMINDER && n.recipient == "jane@example.com"));
}
