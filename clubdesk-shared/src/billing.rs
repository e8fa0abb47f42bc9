/// Lesson balances, per-lesson pricing and monthly tariff debts
///
/// Everything here is pure: the route handlers load totals from the database
/// and pass them in, so the arithmetic can be tested without PostgreSQL.
///
/// # Balance
///
/// A student with a priced tariff has
///
/// ```text
/// paid_lessons = floor(total_paid / (price / lessons_count))
/// balance      = paid_lessons - attendance_count
/// ```
///
/// Students without a usable tariff fall back to their manually kept
/// `stored_balance`.
///
/// # Example
///
/// ```
/// use clubdesk_shared::billing::{compute_balance, BalanceInput, TariffTerms};
///
/// let input = BalanceInput {
///     tariff: Some(TariffTerms { lessons_count: 12, price: 600_000 }),
///     total_paid: 300_000,
///     attendance_count: 4,
///     stored_balance: 0,
/// };
/// assert_eq!(compute_balance(&input), 2);
/// ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dashboard threshold: students at or below this many lessons count as "low balance"
pub const LOW_BALANCE_THRESHOLD: i64 = 2;

/// Billing rule violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// Amount must be strictly positive
    #[error("Amount must be positive")]
    NonPositiveAmount,

    /// Month outside 1..=12
    #[error("Month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    /// Future month while the club blocks advance payments
    #[error("Payments for future months are blocked by club settings")]
    FutureMonthBlocked,

    /// Payment would push the month's total over the tariff price
    #[error("Payment exceeds the tariff price. At most {remaining} can still be paid for this month")]
    ExceedsTariff { remaining: i64 },
}

/// The two numbers of a tariff that pricing depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TariffTerms {
    /// Lessons included in the tariff
    pub lessons_count: i32,

    /// Price of the whole tariff
    pub price: i64,
}

impl TariffTerms {
    fn is_priced(&self) -> bool {
        self.lessons_count > 0 && self.price > 0
    }
}

/// Price of a single lesson, if the tariff is usable for pricing
pub fn lesson_price(tariff: &TariffTerms) -> Option<f64> {
    tariff
        .is_priced()
        .then(|| tariff.price as f64 / tariff.lessons_count as f64)
}

/// Number of whole lessons covered by `total_paid`
///
/// Computed as `total_paid * lessons_count / price` in integer arithmetic so
/// no float rounding can steal a lesson. Returns 0 for unpriced tariffs.
pub fn paid_lessons(total_paid: i64, tariff: &TariffTerms) -> i64 {
    if !tariff.is_priced() || total_paid <= 0 {
        return 0;
    }

    let lessons = (total_paid as i128 * tariff.lessons_count as i128) / tariff.price as i128;
    lessons as i64
}

/// Inputs to [`compute_balance`]
#[derive(Debug, Clone, Copy)]
pub struct BalanceInput {
    /// The student's assigned tariff, if any
    pub tariff: Option<TariffTerms>,

    /// Sum of all the student's payments
    pub total_paid: i64,

    /// Number of attendance records
    pub attendance_count: i64,

    /// Manually maintained balance
    pub stored_balance: i32,
}

/// Remaining lessons for a student. May be negative.
pub fn compute_balance(input: &BalanceInput) -> i64 {
    match input.tariff {
        Some(tariff) if tariff.is_priced() => {
            paid_lessons(input.total_paid, &tariff) - input.attendance_count
        }
        _ => input.stored_balance as i64,
    }
}

/// Whether a student should be warned about running out of lessons
///
/// Club-funded students never are.
pub fn is_low_balance(balance: i64, club_funded: bool) -> bool {
    !club_funded && balance <= 0
}

/// A calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    /// Builds a month, rejecting values outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `date`
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The following month
    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month
    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// `"M/YYYY"`, used in payment notes
    pub fn slash_label(&self) -> String {
        format!("{}/{}", self.month, self.year)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// All months from `start` to `end`, both inclusive
///
/// Empty when `start` is after `end`.
pub fn months_between(start: YearMonth, end: YearMonth) -> Vec<YearMonth> {
    let mut months = Vec::new();
    let mut current = start;
    while current <= end {
        months.push(current);
        current = current.succ();
    }
    months
}

/// Whether `(year, month)` lies after the month of `today`
pub fn is_future_month(year: i32, month: u32, today: NaiveDate) -> bool {
    year > today.year() || (year == today.year() && month > today.month())
}

/// Rejects a payment that would push the month's total above the tariff price
///
/// # Errors
///
/// `BillingError::ExceedsTariff` with the amount that can still be paid.
pub fn check_month_capacity(price: i64, already_paid: i64, amount: i64) -> Result<(), BillingError> {
    if amount <= 0 {
        return Err(BillingError::NonPositiveAmount);
    }

    if already_paid.checked_add(amount).map_or(true, |total| total > price) {
        return Err(BillingError::ExceedsTariff {
            remaining: (price - already_paid).max(0),
        });
    }

    Ok(())
}

/// Validates a month-covering payment before it is written
pub fn check_monthly_payment(
    year: i32,
    month: u32,
    amount: i64,
    block_future_payments: bool,
    today: NaiveDate,
) -> Result<YearMonth, BillingError> {
    let covered = YearMonth::new(year, month).ok_or(BillingError::InvalidMonth(month))?;

    if amount <= 0 {
        return Err(BillingError::NonPositiveAmount);
    }

    if block_future_payments && is_future_month(year, month, today) {
        return Err(BillingError::FutureMonthBlocked);
    }

    Ok(covered)
}

/// One month for which a student still owes money
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthDebt {
    pub year: i32,
    pub month: u32,
    pub amount_paid: i64,
    pub amount_due: i64,
}

/// Months from admission up to today where the tariff was not paid in full
///
/// When the admission date is unknown the check starts in January of the
/// current year. `paid_by_month` holds the sum of payments covering each month.
pub fn monthly_debts(
    tariff_price: i64,
    admission_date: Option<NaiveDate>,
    today: NaiveDate,
    paid_by_month: &HashMap<YearMonth, i64>,
) -> Vec<MonthDebt> {
    let start = admission_date.map(YearMonth::of).unwrap_or(YearMonth {
        year: today.year(),
        month: 1,
    });

    months_between(start, YearMonth::of(today))
        .into_iter()
        .filter_map(|ym| {
            let paid = paid_by_month.get(&ym).copied().unwrap_or(0);
            let debt = (tariff_price - paid).max(0);
            (debt > 0).then_some(MonthDebt {
                year: ym.year,
                month: ym.month,
                amount_paid: paid,
                amount_due: debt,
            })
        })
        .collect()
}

/// Minimal view of a payment for month bucketing
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentLine {
    pub id: Uuid,
    pub amount_paid: i64,
    pub payment_date: DateTime<Utc>,
    pub payment_month: Option<i32>,
    pub payment_year: Option<i32>,
    pub notes: Option<String>,
}

impl PaymentLine {
    /// Month this payment is attributed to
    ///
    /// Uses the explicit covered month when present, otherwise the payment date.
    pub fn covered_month(&self) -> YearMonth {
        match (self.payment_year, self.payment_month) {
            (Some(year), Some(month)) => {
                YearMonth::new(year, month as u32).unwrap_or(YearMonth::of(self.payment_date.date_naive()))
            }
            _ => YearMonth::of(self.payment_date.date_naive()),
        }
    }
}

/// A payment inside a [`MonthBucket`]
#[derive(Debug, Clone, Serialize)]
pub struct BucketPayment {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub amount: i64,
    pub notes: String,
}

/// Payments of one month with what remains to be paid
#[derive(Debug, Clone, Serialize)]
pub struct MonthBucket {
    pub payments: Vec<BucketPayment>,
    pub total_paid: i64,
    pub tariff_price: i64,
    pub remainder: i64,
}

/// Groups payments by covered month, keyed `YYYY-MM`
pub fn group_payments_by_month(
    payments: &[PaymentLine],
    tariff_price: i64,
) -> BTreeMap<String, MonthBucket> {
    let mut buckets: BTreeMap<String, MonthBucket> = BTreeMap::new();

    for payment in payments {
        let bucket = buckets
            .entry(payment.covered_month().to_string())
            .or_insert_with(|| MonthBucket {
                payments: Vec::new(),
                total_paid: 0,
                tariff_price,
                remainder: tariff_price,
            });

        bucket.payments.push(BucketPayment {
            id: payment.id,
            date: payment.payment_date,
            amount: payment.amount_paid,
            notes: payment.notes.clone().unwrap_or_default(),
        });
        bucket.total_paid += payment.amount_paid;
    }

    for bucket in buckets.values_mut() {
        bucket.remainder = (bucket.tariff_price - bucket.total_paid).max(0);
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const MONTHLY: TariffTerms = TariffTerms {
        lessons_count: 12,
        price: 600_000,
    };

    #[test]
    fn test_lesson_price() {
        assert_eq!(lesson_price(&MONTHLY), Some(50_000.0));
        assert_eq!(
            lesson_price(&TariffTerms {
                lessons_count: 0,
                price: 100
            }),
            None
        );
    }

    #[test]
    fn test_paid_lessons_floors() {
        assert_eq!(paid_lessons(600_000, &MONTHLY), 12);
        assert_eq!(paid_lessons(599_999, &MONTHLY), 11);
        assert_eq!(paid_lessons(49_999, &MONTHLY), 0);
        assert_eq!(paid_lessons(0, &MONTHLY), 0);
    }

    #[test]
    fn test_paid_lessons_uneven_price() {
        // 100 / 3 = 33.33 per lesson; 100 paid covers exactly 3 lessons
        let tariff = TariffTerms {
            lessons_count: 3,
            price: 100,
        };
        assert_eq!(paid_lessons(100, &tariff), 3);
        assert_eq!(paid_lessons(66, &tariff), 1);
        assert_eq!(paid_lessons(67, &tariff), 2);
    }

    #[test]
    fn test_balance_with_tariff() {
        let input = BalanceInput {
            tariff: Some(MONTHLY),
            total_paid: 600_000,
            attendance_count: 15,
            stored_balance: 99,
        };
        assert_eq!(compute_balance(&input), -3);
    }

    #[test]
    fn test_balance_falls_back_to_stored() {
        let input = BalanceInput {
            tariff: None,
            total_paid: 1_000_000,
            attendance_count: 3,
            stored_balance: 7,
        };
        assert_eq!(compute_balance(&input), 7);

        let unpriced = BalanceInput {
            tariff: Some(TariffTerms {
                lessons_count: 8,
                price: 0,
            }),
            ..input
        };
        assert_eq!(compute_balance(&unpriced), 7);
    }

    #[test]
    fn test_low_balance() {
        assert!(is_low_balance(0, false));
        assert!(is_low_balance(-2, false));
        assert!(!is_low_balance(1, false));
        assert!(!is_low_balance(-5, true));
    }

    #[test]
    fn test_months_between_crosses_year() {
        let months = months_between(
            YearMonth { year: 2024, month: 11 },
            YearMonth { year: 2025, month: 2 },
        );
        let labels: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["2024-11", "2024-12", "2025-01", "2025-02"]);
    }

    #[test]
    fn test_months_between_empty_when_reversed() {
        let months = months_between(
            YearMonth { year: 2025, month: 3 },
            YearMonth { year: 2025, month: 1 },
        );
        assert!(months.is_empty());
    }

    #[test]
    fn test_year_month_pred_and_succ() {
        let jan = YearMonth { year: 2025, month: 1 };
        assert_eq!(jan.pred(), YearMonth { year: 2024, month: 12 });
        assert_eq!(jan.pred().succ(), jan);
        assert!(YearMonth::new(2025, 13).is_none());
        assert_eq!(jan.slash_label(), "1/2025");
    }

    #[test]
    fn test_is_future_month() {
        let today = date(2025, 5, 20);
        assert!(is_future_month(2025, 6, today));
        assert!(is_future_month(2026, 1, today));
        assert!(!is_future_month(2025, 5, today));
        assert!(!is_future_month(2024, 12, today));
    }

    #[test]
    fn test_month_capacity() {
        assert!(check_month_capacity(500, 200, 300).is_ok());
        assert_eq!(
            check_month_capacity(500, 200, 301),
            Err(BillingError::ExceedsTariff { remaining: 300 })
        );
        assert_eq!(
            check_month_capacity(500, 600, 1),
            Err(BillingError::ExceedsTariff { remaining: 0 })
        );
        assert_eq!(
            check_month_capacity(500, 0, 0),
            Err(BillingError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_month_capacity_rejects_overflowing_amount() {
        assert_eq!(
            check_month_capacity(500, 100, i64::MAX),
            Err(BillingError::ExceedsTariff { remaining: 400 })
        );
    }

    #[test]
    fn test_monthly_payment_checks() {
        let today = date(2025, 5, 20);
        assert_eq!(
            check_monthly_payment(2025, 13, 100, false, today),
            Err(BillingError::InvalidMonth(13))
        );
        assert_eq!(
            check_monthly_payment(2025, 6, 100, true, today),
            Err(BillingError::FutureMonthBlocked)
        );
        assert_eq!(
            check_monthly_payment(2025, 6, 100, false, today),
            Ok(YearMonth { year: 2025, month: 6 })
        );
        assert_eq!(
            check_monthly_payment(2025, 5, -1, false, today),
            Err(BillingError::NonPositiveAmount)
        );
    }

    #[test]
    fn test_monthly_debts_from_admission() {
        let mut paid = HashMap::new();
        paid.insert(YearMonth { year: 2025, month: 2 }, 500);
        paid.insert(YearMonth { year: 2025, month: 3 }, 200);

        let debts = monthly_debts(500, Some(date(2025, 1, 15)), date(2025, 3, 10), &paid);

        assert_eq!(
            debts,
            vec![
                MonthDebt {
                    year: 2025,
                    month: 1,
                    amount_paid: 0,
                    amount_due: 500
                },
                MonthDebt {
                    year: 2025,
                    month: 3,
                    amount_paid: 200,
                    amount_due: 300
                },
            ]
        );
    }

    #[test]
    fn test_monthly_debts_without_admission_starts_in_january() {
        let debts = monthly_debts(100, None, date(2025, 3, 1), &HashMap::new());
        let months: Vec<u32> = debts.iter().map(|d| d.month).collect();
        assert_eq!(months, vec![1, 2, 3]);
    }

    #[test]
    fn test_monthly_debts_future_admission_is_empty() {
        let debts = monthly_debts(100, Some(date(2025, 9, 1)), date(2025, 3, 1), &HashMap::new());
        assert!(debts.is_empty());
    }

    #[test]
    fn test_group_payments_by_month() {
        let id = Uuid::new_v4;
        let payments = vec![
            PaymentLine {
                id: id(),
                amount_paid: 300,
                payment_date: Utc.with_ymd_and_hms(2025, 4, 2, 10, 0, 0).unwrap(),
                payment_month: Some(3),
                payment_year: Some(2025),
                notes: None,
            },
            PaymentLine {
                id: id(),
                amount_paid: 250,
                payment_date: Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap(),
                payment_month: None,
                payment_year: None,
                notes: Some("cash".to_string()),
            },
            PaymentLine {
                id: id(),
                amount_paid: 100,
                payment_date: Utc.with_ymd_and_hms(2025, 4, 9, 10, 0, 0).unwrap(),
                payment_month: Some(4),
                payment_year: Some(2025),
                notes: None,
            },
        ];

        let buckets = group_payments_by_month(&payments, 500);

        let march = &buckets["2025-03"];
        assert_eq!(march.payments.len(), 2);
        assert_eq!(march.total_paid, 550);
        assert_eq!(march.remainder, 0);

        let april = &buckets["2025-04"];
        assert_eq!(april.total_paid, 100);
        assert_eq!(april.remainder, 400);
    }
}
