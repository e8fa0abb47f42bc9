/// Finance reports
///
/// All money figures are whole currency units. "Today" and month boundaries
/// follow the club's clock.
///
/// # Endpoints
///
/// - `GET /api/finances/income` - Income today, this month, overall, latest payments
/// - `GET /api/finances/expenses` - The same for expenses
/// - `GET /api/finances/debtors` - Unpaid tariff months per student
/// - `GET /api/finances/analytics` - Income and expense over the last 12 months
/// - `GET /api/finances/monthly` - Income, expense and balance per month of a year

use crate::{app::AppState, error::ApiResult, routes::expenses::RECENT_LIMIT};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate};
use clubdesk_shared::{
    analytics::{month_label, trailing_months},
    billing::{monthly_debts, YearMonth},
    models::{
        expense::Expense,
        payment::{Payment, PaymentWithStudent},
        student::{DebtorCandidate, Student},
    },
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const ANALYTICS_MONTHS: usize = 12;
const NO_PHONE: &str = "-";

#[derive(Debug, Serialize)]
pub struct IncomeResponse {
    pub today: i64,
    pub month: i64,
    pub total: i64,
    pub payments: Vec<PaymentWithStudent>,
}

#[derive(Debug, Serialize)]
pub struct ExpensesResponse {
    pub today: i64,
    pub month: i64,
    pub total: i64,
    pub expenses: Vec<Expense>,
}

/// One unpaid month of one student
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtorItem {
    pub student_id: Uuid,
    pub student_name: String,
    pub student_phone: String,
    pub tariff_name: String,
    pub tariff_price: i64,
    pub amount_paid: i64,
    pub amount_due: i64,
    pub month: u32,
    pub year: i32,

    /// `"M/YYYY"`
    pub month_label: String,
}

#[derive(Debug, Serialize)]
pub struct DebtorsResponse {
    pub total_debt: i64,
    pub count: usize,
    pub debtors: Vec<DebtorItem>,
}

#[derive(Debug, Serialize)]
pub struct MonthFlow {
    /// `"Mar 2025"`
    pub month_name: String,
    pub income: i64,
    pub expense: i64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub months: Vec<MonthFlow>,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct MonthBalance {
    pub month: u32,
    pub income: i64,
    pub expense: i64,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
pub struct MonthlyResponse {
    pub year: i32,
    pub months: Vec<MonthBalance>,
}

/// Unpaid months of one candidate, oldest first
fn debts_of(
    candidate: &DebtorCandidate,
    today: NaiveDate,
    paid_by_month: &HashMap<YearMonth, i64>,
) -> Vec<DebtorItem> {
    let present = |p: &&str| !p.trim().is_empty();
    let phone = candidate
        .phone
        .as_deref()
        .filter(present)
        .or(candidate.parent_phone.as_deref().filter(present))
        .unwrap_or(NO_PHONE);

    monthly_debts(
        candidate.tariff_price,
        candidate.admission_date,
        today,
        paid_by_month,
    )
    .into_iter()
    .map(|debt| DebtorItem {
        student_id: candidate.student_id,
        student_name: candidate.full_name.clone(),
        student_phone: phone.to_string(),
        tariff_name: candidate.tariff_name.clone(),
        tariff_price: candidate.tariff_price,
        amount_paid: debt.amount_paid,
        amount_due: debt.amount_due,
        month: debt.month,
        year: debt.year,
        month_label: format!("{}/{}", debt.month, debt.year),
    })
    .collect()
}

pub async fn income(State(state): State<AppState>) -> ApiResult<Json<IncomeResponse>> {
    let today = state.clock.today();
    let (day_start, day_end) = state.clock.day_bounds(today);
    let (month_start, month_end) = state.clock.month_bounds(YearMonth::of(today));

    Ok(Json(IncomeResponse {
        today: Payment::sum_between(&state.db, day_start, day_end).await?,
        month: Payment::sum_between(&state.db, month_start, month_end).await?,
        total: Payment::total(&state.db).await?,
        payments: Payment::recent(&state.db, RECENT_LIMIT).await?,
    }))
}

pub async fn expenses(State(state): State<AppState>) -> ApiResult<Json<ExpensesResponse>> {
    let today = state.clock.today();
    let (day_start, day_end) = state.clock.day_bounds(today);
    let (month_start, month_end) = state.clock.month_bounds(YearMonth::of(today));

    Ok(Json(ExpensesResponse {
        today: Expense::sum_between(&state.db, day_start, day_end).await?,
        month: Expense::sum_between(&state.db, month_start, month_end).await?,
        total: Expense::total(&state.db).await?,
        expenses: Expense::recent(&state.db, RECENT_LIMIT).await?,
    }))
}

/// Every month from admission to now in which an active student paid less
/// than their tariff price
///
/// # Response
///
/// ```json
/// {
///   "total_debt": 900000,
///   "count": 2,
///   "debtors": [
///     {
///       "student_name": "Aziz Karimov",
///       "student_phone": "+998901234567",
///       "tariff_price": 600000,
///       "amount_paid": 300000,
///       "amount_due": 300000,
///       "month_label": "3/2025"
///     }
///   ]
/// }
/// ```
pub async fn debtors(State(state): State<AppState>) -> ApiResult<Json<DebtorsResponse>> {
    let today = state.clock.today();
    let candidates = Student::debtor_candidates(&state.db).await?;
    let paid = Payment::covered_month_totals(&state.db).await?;
    let nothing_paid = HashMap::new();

    let debtors: Vec<DebtorItem> = candidates
        .iter()
        .flat_map(|candidate| {
            debts_of(
                candidate,
                today,
                paid.get(&candidate.student_id).unwrap_or(&nothing_paid),
            )
        })
        .collect();

    Ok(Json(DebtorsResponse {
        total_debt: debtors.iter().map(|d| d.amount_due).sum(),
        count: debtors.len(),
        debtors,
    }))
}

/// Income and expense of the last twelve months, oldest first
pub async fn analytics(State(state): State<AppState>) -> ApiResult<Json<AnalyticsResponse>> {
    let mut months = Vec::with_capacity(ANALYTICS_MONTHS);

    for month in trailing_months(state.clock.today(), ANALYTICS_MONTHS) {
        let (start, end) = state.clock.month_bounds(month);
        months.push(MonthFlow {
            month_name: month_label(month.year, month.month),
            income: Payment::sum_between(&state.db, start, end).await?,
            expense: Expense::sum_between(&state.db, start, end).await?,
        });
    }

    Ok(Json(AnalyticsResponse { months }))
}

/// January to December of `?year` (default: current year)
pub async fn monthly(
    State(state): State<AppState>,
    Query(query): Query<MonthlyQuery>,
) -> ApiResult<Json<MonthlyResponse>> {
    let year = query.year.unwrap_or_else(|| state.clock.today().year());
    let mut months = Vec::with_capacity(12);

    for month in 1..=12 {
        let (start, end) = state.clock.month_bounds(YearMonth { year, month });
        let income = Payment::sum_between(&state.db, start, end).await?;
        let expense = Expense::sum_between(&state.db, start, end).await?;
        months.push(MonthBalance {
            month,
            income,
            expense,
            balance: income - expense,
        });
    }

    Ok(Json(MonthlyResponse { year, months }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(phone: Option<&str>, parent_phone: Option<&str>) -> DebtorCandidate {
        DebtorCandidate {
            student_id: Uuid::new_v4(),
            full_name: "Aziz Karimov".to_string(),
            phone: phone.map(str::to_string),
            parent_phone: parent_phone.map(str::to_string),
            admission_date: NaiveDate::from_ymd_opt(2025, 1, 20),
            tariff_name: "Monthly".to_string(),
            tariff_price: 600_000,
        }
    }

    #[test]
    fn test_debts_of_lists_unpaid_months() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        let paid = HashMap::from([
            (YearMonth { year: 2025, month: 1 }, 600_000),
            (YearMonth { year: 2025, month: 2 }, 200_000),
        ]);

        let debts = debts_of(&candidate(None, Some("+998911112233")), today, &paid);

        assert_eq!(debts.len(), 2);
        assert_eq!(debts[0].month_label, "2/2025");
        assert_eq!(debts[0].amount_due, 400_000);
        assert_eq!(debts[1].month_label, "3/2025");
        assert_eq!(debts[1].amount_paid, 0);
        assert_eq!(debts[1].student_phone, "+998911112233");
    }

    #[test]
    fn test_phone_fallback() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 25).unwrap();
        let debts = debts_of(&candidate(None, None), today, &HashMap::new());

        assert_eq!(debts.len(), 1);
        assert_eq!(debts[0].student_phone, NO_PHONE);

        let debts = debts_of(&candidate(Some("  "), Some("+998935554433")), today, &HashMap::new());
        assert_eq!(debts[0].student_phone, "+998935554433");
    }
}
