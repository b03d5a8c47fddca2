use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, PaymentMethod, PaymentRecord, checked_sum};

/// Derived state of a record's payments. Always rebuilt from the payment list,
/// except for `total_payment` which is the billed amount set by contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSnapshot {
    pub total_payment: Cents,
    pub current_receiving_payment: Cents,
    pub remaining_amount: Cents,
    pub last_payment_method: Option<PaymentMethod>,
    pub last_payment_account: Option<String>,
    pub last_payer_name: Option<String>,
    pub last_payment_date: Option<DateTime<Utc>>,
}

impl PricingSnapshot {
    /// Snapshot of a record with nothing received yet.
    pub fn zero(total_payment: Cents) -> Self {
        Self {
            total_payment,
            current_receiving_payment: 0,
            remaining_amount: total_payment.max(0),
            last_payment_method: None,
            last_payment_account: None,
            last_payer_name: None,
            last_payment_date: None,
        }
    }

    /// Amount received beyond the billed total (clipped out of `remaining_amount`).
    pub fn overpayment(&self) -> Cents {
        self.current_receiving_payment
            .saturating_sub(self.total_payment)
            .max(0)
    }

    pub fn is_settled(&self) -> bool {
        self.remaining_amount == 0
    }
}

/// Rebuild a snapshot for `total_payment` from the payment list.
///
/// The denormalized `last_*` fields always mirror the last payment by list
/// position, regardless of payment dates. Returns `None` when the received
/// amount does not fit in `Cents`.
pub fn recompute_snapshot(
    total_payment: Cents,
    payments: &[PaymentRecord],
) -> Option<PricingSnapshot> {
    let received = checked_sum(payments.iter().map(|p| p.amount))?;

    let mut snapshot = PricingSnapshot::zero(total_payment);
    snapshot.current_receiving_payment = received;
    snapshot.remaining_amount = total_payment.saturating_sub(received).max(0);

    if let Some(last) = payments.last() {
        snapshot.last_payment_method = Some(last.method);
        snapshot.last_payment_account = last.account_number.clone();
        snapshot.last_payer_name = last.payer_name.clone();
        snapshot.last_payment_date = Some(last.date);
    }

    Some(snapshot)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::PaymentDraft;

    fn payment(amount: Cents, day: u32, method: PaymentMethod, position: usize) -> PaymentRecord {
        PaymentDraft::new(amount, Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap(), method)
            .into_record(position)
            .unwrap()
    }

    #[test]
    fn test_empty_list_is_zero_state() {
        let snapshot = recompute_snapshot(10000, &[]).unwrap();
        assert_eq!(snapshot, PricingSnapshot::zero(10000));
        assert_eq!(snapshot.remaining_amount, 10000);
        assert!(snapshot.last_payment_method.is_none());
    }

    #[test]
    fn test_partial_payment() {
        let payments = vec![payment(4000, 1, PaymentMethod::Cash, 0)];
        let snapshot = recompute_snapshot(10000, &payments).unwrap();

        assert_eq!(snapshot.current_receiving_payment, 4000);
        assert_eq!(snapshot.remaining_amount, 6000);
        assert!(!snapshot.is_settled());
    }

    #[test]
    fn test_overpayment_is_clipped() {
        let payments = vec![payment(7000, 1, PaymentMethod::Cash, 0)];
        let snapshot = recompute_snapshot(5000, &payments).unwrap();

        assert_eq!(snapshot.current_receiving_payment, 7000);
        assert_eq!(snapshot.remaining_amount, 0);
        assert_eq!(snapshot.overpayment(), 2000);
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_last_fields_follow_position_not_date() {
        // Second entry is dated earlier but is still the last by position
        let payments = vec![
            payment(1000, 20, PaymentMethod::Bank, 0),
            payment(2000, 3, PaymentMethod::Easypaisa, 1),
        ];
        let snapshot = recompute_snapshot(5000, &payments).unwrap();

        assert_eq!(snapshot.last_payment_method, Some(PaymentMethod::Easypaisa));
        assert_eq!(
            snapshot.last_payment_date,
            Some(Utc.with_ymd_and_hms(2024, 5, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_sum_is_order_independent() {
        let forward = vec![
            payment(333, 1, PaymentMethod::Cash, 0),
            payment(1, 2, PaymentMethod::Cash, 1),
            payment(9999, 3, PaymentMethod::Cash, 2),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        assert_eq!(
            recompute_snapshot(0, &forward).map(|s| s.current_receiving_payment),
            recompute_snapshot(0, &backward).map(|s| s.current_receiving_payment)
        );
    }

    #[test]
    fn test_received_overflow_is_reported() {
        let payments = vec![
            payment(i64::MAX - 10, 1, PaymentMethod::Bank, 0),
            payment(11, 2, PaymentMethod::Cash, 1),
        ];
        assert_eq!(recompute_snapshot(1000, &payments), None);

        // Overpaying up to the limit still fits
        let payments = vec![payment(i64::MAX, 1, PaymentMethod::Bank, 0)];
        let snapshot = recompute_snapshot(0, &payments).unwrap();
        assert_eq!(snapshot.remaining_amount, 0);
        assert_eq!(snapshot.overpayment(), i64::MAX);
    }
}
