/// Face recognition lookups
///
/// Probes are face encodings computed by the camera client. They are matched
/// against the in-memory index of active students; nothing is recorded here,
/// check-in is a separate call.
///
/// # Endpoints
///
/// - `POST /api/recognize` - Match one encoding
/// - `POST /api/recognize/multiple` - Match every face in a frame

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use clubdesk_shared::{
    face::{validate_encoding, FaceMatch},
    models::student::Student,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RecognizeRequest {
    pub encoding: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct RecognizeManyRequest {
    pub encodings: Vec<Vec<f64>>,
}

/// A recognized student
#[derive(Debug, Serialize)]
pub struct RecognizedStudent {
    pub student_id: Uuid,
    pub student_name: String,
    pub balance: i64,
    pub low_balance: bool,
    pub photo: Option<String>,
    pub distance: f64,
}

#[derive(Debug, Serialize)]
pub struct RecognizeResponse {
    pub matched: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<RecognizedStudent>,
}

#[derive(Debug, Serialize)]
pub struct RecognizeManyResponse {
    pub matched: bool,
    pub count: usize,
    pub students: Vec<RecognizedStudent>,
}

/// Current card of a matched student
///
/// `None` when the student was removed after the index was last loaded.
async fn describe(state: &AppState, found: FaceMatch) -> ApiResult<Option<RecognizedStudent>> {
    let Some(student) = Student::find_by_id(&state.db, found.student_id).await? else {
        return Ok(None);
    };
    let Some(facts) = Student::balance(&state.db, student.id).await? else {
        return Ok(None);
    };

    Ok(Some(RecognizedStudent {
        student_id: student.id,
        student_name: student.full_name,
        balance: facts.balance(),
        low_balance: facts.low_balance(),
        photo: student.photo_path,
        distance: found.distance,
    }))
}

/// Match one face encoding
///
/// # Endpoint
///
/// ```text
/// POST /api/recognize
///
/// { "encoding": [0.01, -0.12, ...] }
/// ```
///
/// # Response
///
/// ```json
/// { "matched": true, "student": { "student_name": "Aziz Karimov", "balance": 7, ... } }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Encoding is not 128 finite values
pub async fn recognize(
    State(state): State<AppState>,
    Json(req): Json<RecognizeRequest>,
) -> ApiResult<Json<RecognizeResponse>> {
    validate_encoding(&req.encoding)?;

    let found = state
        .face_index
        .best_match(&req.encoding, state.face_tolerance())
        .await;

    let student = match found {
        Some(found) => describe(&state, found).await?,
        None => None,
    };

    tracing::debug!(matched = student.is_some(), "Face lookup");

    Ok(Json(RecognizeResponse {
        matched: student.is_some(),
        student,
    }))
}

/// Match several encodings, each student reported once
pub async fn recognize_multiple(
    State(state): State<AppState>,
    Json(req): Json<RecognizeManyRequest>,
) -> ApiResult<Json<RecognizeManyResponse>> {
    for encoding in &req.encodings {
        validate_encoding(encoding)?;
    }

    let found = state
        .face_index
        .match_many(&req.encodings, state.face_tolerance())
        .await;

    let mut students = Vec::with_capacity(found.len());
    for face in found {
        if let Some(student) = describe(&state, face).await? {
            students.push(student);
        }
    }

    tracing::debug!(probes = req.encodings.len(), matched = students.len(), "Face lookup");

    Ok(Json(RecognizeManyResponse {
        matched: !students.is_empty(),
        count: students.len(),
        students,
    }))
}
