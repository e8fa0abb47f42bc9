/// Dashboard endpoint
///
/// # Endpoint
///
/// ```text
/// GET /api/dashboard
/// ```
///
/// # Response
///
/// ```json
/// {
///   "total_students": 120,
///   "students_low_balance": 9,
///   "today_attendance": 47,
///   "month_income": 18400000,
///   "month_expenses": 6200000,
///   "profit": 12200000
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use clubdesk_shared::{
    billing::{YearMonth, LOW_BALANCE_THRESHOLD},
    models::{attendance::Attendance, expense::Expense, payment::Payment, student::Student},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// Active students
    pub total_students: i64,

    /// Active students with at most two lessons left
    pub students_low_balance: i64,

    pub today_attendance: i64,
    pub month_income: i64,
    pub month_expenses: i64,
    pub profit: i64,
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardResponse>> {
    let today = state.clock.today();
    let (month_start, month_end) = state.clock.month_bounds(YearMonth::of(today));

    let total_students = Student::count_active(&state.db).await?;
    let students_low_balance = Student::active_balances(&state.db)
        .await?
        .iter()
        .filter(|facts| facts.balance() <= LOW_BALANCE_THRESHOLD)
        .count() as i64;
    let today_attendance = Attendance::count_on(&state.db, today).await?;
    let month_income = Payment::sum_between(&state.db, month_start, month_end).await?;
    let month_expenses = Expense::sum_between(&state.db, month_start, month_end).await?;

    Ok(Json(DashboardResponse {
        total_students,
        students_low_balance,
        today_attendance,
        month_income,
        month_expenses,
        profit: month_income - month_expenses,
    }))
}
