use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::committee::{CommitteeError, CommitteeRequest, EvaluationInput};
use super::documents::{DocumentReviewError, DocumentUpload, ReviewVerdict};
use super::domain::{
    ApplicationId, ApplicationStatus, CommitteeId, ConvocatoriaId, DecisionOutcome, DocumentId,
    ExemptionId, InterviewId, Timestamp, UserId, VacancyId,
};
use super::engine::RecruitmentEngine;
use super::exemptions::{ExemptionError, ExemptionGrant};
use super::interviews::{InterviewRequest, InterviewResult, SchedulingError};
use super::repository::{RecruitmentStore, RepositoryError};
use super::requirements::RequirementError;
use super::service::{ApplicationServiceError, ApplicationSubmission};

/// Header carrying the authenticated user id; authentication itself happens upstream.
pub const ACTOR_HEADER: &str = "x-actor-id";

type EngineState<S> = State<Arc<RecruitmentEngine<S>>>;

/// Router exposing the recruitment engine over HTTP.
pub fn recruitment_router<S>(engine: Arc<RecruitmentEngine<S>>) -> Router
where
    S: RecruitmentStore + 'static,
{
    Router::new()
        .route("/api/v1/applications", post(submit_handler::<S>))
        .route("/api/v1/applications/:id", get(application_handler::<S>))
        .route(
            "/api/v1/applications/:id/status",
            post(change_status_handler::<S>),
        )
        .route(
            "/api/v1/applications/:id/withdraw",
            post(withdraw_handler::<S>),
        )
        .route(
            "/api/v1/applications/:id/reviewer",
            post(assign_reviewer_handler::<S>),
        )
        .route(
            "/api/v1/applications/:id/history",
            get(history_handler::<S>),
        )
        .route(
            "/api/v1/applications/:id/checklist",
            get(checklist_handler::<S>),
        )
        .route(
            "/api/v1/applications/:id/documents",
            post(upload_handler::<S>),
        )
        .route(
            "/api/v1/applications/:id/review/complete",
            post(complete_review_handler::<S>),
        )
        .route(
            "/api/v1/applications/:id/interviews/outcomes",
            get(outcomes_handler::<S>),
        )
        .route(
            "/api/v1/documents/:id/review",
            post(review_document_handler::<S>),
        )
        .route(
            "/api/v1/vacancies/:id/requirements",
            get(requirements_handler::<S>),
        )
        .route("/api/v1/vacancies/:id/ranking", get(ranking_handler::<S>))
        .route("/api/v1/interviews", post(schedule_handler::<S>))
        .route(
            "/api/v1/interviews/:id/reschedule",
            post(reschedule_handler::<S>),
        )
        .route("/api/v1/interviews/:id/cancel", post(cancel_handler::<S>))
        .route(
            "/api/v1/interviews/:id/complete",
            post(complete_interview_handler::<S>),
        )
        .route("/api/v1/interviews/:id/confirm", post(confirm_handler::<S>))
        .route("/api/v1/interviews/:id/noshow", post(noshow_handler::<S>))
        .route(
            "/api/v1/interviewers/:id/slots",
            get(slots_handler::<S>),
        )
        .route("/api/v1/committees", post(create_committee_handler::<S>))
        .route("/api/v1/evaluations", post(evaluate_handler::<S>))
        .route(
            "/api/v1/committees/:committee/applications/:application/summary",
            get(aggregate_handler::<S>),
        )
        .route(
            "/api/v1/committees/:committee/applications/:application/decision",
            post(decision_handler::<S>),
        )
        .route("/api/v1/exemptions", post(grant_exemption_handler::<S>))
        .route(
            "/api/v1/exemptions/:id/revoke",
            post(revoke_exemption_handler::<S>),
        )
        .route(
            "/api/v1/convocatorias/:id/exemptions/:code",
            post(add_convocatoria_exemption_handler::<S>)
                .delete(remove_convocatoria_exemption_handler::<S>),
        )
        .with_state(engine)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChangeBody {
    status: String,
    #[serde(default)]
    comments: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReasonBody {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewerBody {
    reviewer_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentReviewBody {
    verdict: ReviewVerdict,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RequirementsQuery {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RescheduleBody {
    scheduled_at: Timestamp,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SlotsQuery {
    day: NaiveDate,
    #[serde(default)]
    slot_minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionBody {
    outcome: DecisionOutcome,
    #[serde(default)]
    notes: String,
}

#[derive(Debug, Serialize)]
struct RemovedView {
    removed: bool,
}

pub(crate) async fn submit_handler<S>(
    State(engine): EngineState<S>,
    Json(submission): Json<ApplicationSubmission>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let application = engine.applications.submit(submission)?;
    Ok((StatusCode::CREATED, Json(application)).into_response())
}

pub(crate) async fn application_handler<S>(
    State(engine): EngineState<S>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let application = engine.applications.get_required(ApplicationId(id))?;
    Ok(Json(application).into_response())
}

pub(crate) async fn change_status_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<StatusChangeBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let status = ApplicationStatus::parse(&body.status).ok_or_else(|| {
        ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("unknown status {}", body.status),
        )
    })?;
    let application =
        engine
            .applications
            .change_status(ApplicationId(id), status, &body.comments, actor)?;
    Ok(Json(application).into_response())
}

pub(crate) async fn withdraw_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<ReasonBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let application = engine
        .applications
        .withdraw(ApplicationId(id), &body.reason, actor)?;
    Ok(Json(application).into_response())
}

pub(crate) async fn assign_reviewer_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<ReviewerBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let application =
        engine
            .applications
            .assign_reviewer(ApplicationId(id), body.reviewer_id, actor)?;
    Ok(Json(application).into_response())
}

pub(crate) async fn history_handler<S>(
    State(engine): EngineState<S>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let entries = engine.applications.history(ApplicationId(id))?;
    Ok(Json(entries).into_response())
}

pub(crate) async fn checklist_handler<S>(
    State(engine): EngineState<S>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let checklist = engine.documents.checklist(ApplicationId(id))?;
    let missing: Vec<String> = checklist
        .missing_required()
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(Json(json!({
        "application_id": checklist.application_id,
        "items": checklist.items,
        "missing_required": missing,
    }))
    .into_response())
}

pub(crate) async fn upload_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(upload): Json<DocumentUpload>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let document = engine.documents.upload(ApplicationId(id), upload, actor)?;
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

pub(crate) async fn complete_review_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let application = engine
        .documents
        .complete_review(ApplicationId(id), actor)?;
    Ok(Json(application).into_response())
}

pub(crate) async fn review_document_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<DocumentReviewBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let document = engine.documents.review(
        DocumentId(id),
        body.verdict,
        body.reason.as_deref(),
        actor,
    )?;
    Ok(Json(document).into_response())
}

pub(crate) async fn requirements_handler<S>(
    State(engine): EngineState<S>,
    Path(id): Path<u64>,
    Query(query): Query<RequirementsQuery>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let views = engine.requirements.resolve(VacancyId(id), query.user_id)?;
    Ok(Json(views).into_response())
}

pub(crate) async fn ranking_handler<S>(
    State(engine): EngineState<S>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let ranking = engine.committees.ranking(VacancyId(id))?;
    Ok(Json(ranking).into_response())
}

pub(crate) async fn schedule_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Json(request): Json<InterviewRequest>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let interview = engine.interviews.schedule(request, actor)?;
    Ok((StatusCode::CREATED, Json(interview)).into_response())
}

pub(crate) async fn reschedule_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<RescheduleBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let interview = engine.interviews.reschedule(
        InterviewId(id),
        body.scheduled_at,
        body.duration_minutes,
        &body.reason,
        actor,
    )?;
    Ok((StatusCode::CREATED, Json(interview)).into_response())
}

pub(crate) async fn cancel_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<ReasonBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let interview = engine
        .interviews
        .cancel(InterviewId(id), &body.reason, actor)?;
    Ok(Json(interview).into_response())
}

pub(crate) async fn complete_interview_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(result): Json<InterviewResult>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let interview = engine.interviews.complete(InterviewId(id), result, actor)?;
    Ok(Json(interview).into_response())
}

pub(crate) async fn confirm_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let interview = engine.interviews.confirm(InterviewId(id), actor)?;
    Ok(Json(interview).into_response())
}

pub(crate) async fn noshow_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let interview = engine.interviews.mark_noshow(InterviewId(id), actor)?;
    Ok(Json(interview).into_response())
}

pub(crate) async fn outcomes_handler<S>(
    State(engine): EngineState<S>,
    Path(id): Path<u64>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let summary = engine.interviews.outcomes(ApplicationId(id))?;
    Ok(Json(summary).into_response())
}

pub(crate) async fn slots_handler<S>(
    State(engine): EngineState<S>,
    Path(id): Path<u64>,
    Query(query): Query<SlotsQuery>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let slots = engine
        .interviews
        .available_slots(UserId(id), query.day, query.slot_minutes)?;
    Ok(Json(slots).into_response())
}

pub(crate) async fn create_committee_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Json(request): Json<CommitteeRequest>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let committee = engine.committees.create_committee(request, actor)?;
    Ok((StatusCode::CREATED, Json(committee)).into_response())
}

pub(crate) async fn evaluate_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Json(input): Json<EvaluationInput>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let evaluation = engine.committees.evaluate(input, actor)?;
    Ok(Json(evaluation).into_response())
}

pub(crate) async fn aggregate_handler<S>(
    State(engine): EngineState<S>,
    Path((committee, application)): Path<(u64, u64)>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let summary = engine
        .committees
        .aggregate(ApplicationId(application), CommitteeId(committee))?;
    Ok(Json(summary).into_response())
}

pub(crate) async fn decision_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path((committee, application)): Path<(u64, u64)>,
    Json(body): Json<DecisionBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let application = engine.committees.record_decision(
        ApplicationId(application),
        CommitteeId(committee),
        body.outcome,
        actor,
        &body.notes,
    )?;
    Ok(Json(application).into_response())
}

pub(crate) async fn grant_exemption_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Json(grant): Json<ExemptionGrant>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let exemption = engine.exemptions.grant(grant, actor)?;
    Ok((StatusCode::CREATED, Json(exemption)).into_response())
}

pub(crate) async fn revoke_exemption_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(body): Json<ReasonBody>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let exemption = engine
        .exemptions
        .revoke(ExemptionId(id), actor, &body.reason)?;
    Ok(Json(exemption).into_response())
}

pub(crate) async fn add_convocatoria_exemption_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path((id, code)): Path<(u64, String)>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    engine
        .exemptions
        .add_convocatoria_exemption(ConvocatoriaId(id), &code, actor)?;
    Ok(StatusCode::CREATED.into_response())
}

pub(crate) async fn remove_convocatoria_exemption_handler<S>(
    State(engine): EngineState<S>,
    headers: HeaderMap,
    Path((id, code)): Path<(u64, String)>,
) -> Result<Response, ApiError>
where
    S: RecruitmentStore + 'static,
{
    let actor = actor(&headers)?;
    let removed = engine
        .exemptions
        .remove_convocatoria_exemption(ConvocatoriaId(id), &code, actor)?;
    Ok(Json(RemovedView { removed }).into_response())
}

fn actor(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(UserId)
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                format!("missing or invalid {ACTOR_HEADER} header"),
            )
        })
}

/// Error payload returned by every recruitment route.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict | RepositoryError::StaleVersion { .. } => StatusCode::CONFLICT,
        RepositoryError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn application_status(error: &ApplicationServiceError) -> StatusCode {
    use ApplicationServiceError as E;
    match error {
        E::VacancyNotFound(_) | E::ApplicationNotFound(_) => StatusCode::NOT_FOUND,
        E::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        E::MissingConsent | E::ReviewerNotEligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
        E::VacancyClosed(_)
        | E::DuplicateApplication { .. }
        | E::InvalidTransition { .. }
        | E::ConcurrentModification(_)
        | E::ApplicationClosed { .. } => StatusCode::CONFLICT,
        E::Repository(inner) => repository_status(inner),
    }
}

fn exemption_status(error: &ExemptionError) -> StatusCode {
    match error {
        ExemptionError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        ExemptionError::InvalidWindow => StatusCode::UNPROCESSABLE_ENTITY,
        ExemptionError::NotFound(_) => StatusCode::NOT_FOUND,
        ExemptionError::AlreadyRevoked(_)
        | ExemptionError::DuplicateConvocatoriaExemption { .. } => StatusCode::CONFLICT,
        ExemptionError::Repository(inner) => repository_status(inner),
    }
}

fn requirement_status(error: &RequirementError) -> StatusCode {
    match error {
        RequirementError::VacancyNotFound(_) => StatusCode::NOT_FOUND,
        RequirementError::Exemption(inner) => exemption_status(inner),
        RequirementError::Repository(inner) => repository_status(inner),
    }
}

impl From<ApplicationServiceError> for ApiError {
    fn from(error: ApplicationServiceError) -> Self {
        Self::new(application_status(&error), error.to_string())
    }
}

impl From<ExemptionError> for ApiError {
    fn from(error: ExemptionError) -> Self {
        Self::new(exemption_status(&error), error.to_string())
    }
}

impl From<RequirementError> for ApiError {
    fn from(error: RequirementError) -> Self {
        Self::new(requirement_status(&error), error.to_string())
    }
}

impl From<DocumentReviewError> for ApiError {
    fn from(error: DocumentReviewError) -> Self {
        use DocumentReviewError as E;
        let status = match &error {
            E::ApplicationNotFound(_) | E::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            E::NotOwner { .. } | E::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            E::UploadClosed { .. } => StatusCode::CONFLICT,
            E::NotRequired(_) | E::MissingFileName | E::MissingRejectionReason => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            E::Requirements(inner) => requirement_status(inner),
            E::Application(inner) => application_status(inner),
            E::Repository(inner) => repository_status(inner),
        };
        Self::new(status, error.to_string())
    }
}

impl From<SchedulingError> for ApiError {
    fn from(error: SchedulingError) -> Self {
        use SchedulingError as E;
        let status = match &error {
            E::ApplicationNotFound(_) | E::InterviewNotFound(_) => StatusCode::NOT_FOUND,
            E::PermissionDenied { .. } | E::NotApplicant { .. } => StatusCode::FORBIDDEN,
            E::NoInterviewers | E::InvalidDuration(_) | E::InvalidRating(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            E::ApplicationNotSchedulable { .. }
            | E::InvalidInterviewState { .. }
            | E::Conflict(_)
            | E::Superseded(_) => StatusCode::CONFLICT,
            E::Application(inner) => application_status(inner),
            E::Repository(inner) => repository_status(inner),
        };
        Self::new(status, error.to_string())
    }
}

impl From<CommitteeError> for ApiError {
    fn from(error: CommitteeError) -> Self {
        use CommitteeError as E;
        let status = match &error {
            E::CommitteeNotFound(_) | E::ApplicationNotFound(_) => StatusCode::NOT_FOUND,
            E::PermissionDenied { .. }
            | E::NotMember { .. }
            | E::InactiveMember { .. }
            | E::ObserverCannotVote(_)
            | E::NotChair { .. } => StatusCode::FORBIDDEN,
            E::MissingName
            | E::DuplicateMember(_)
            | E::ChairCount(_)
            | E::ScoreOutOfRange(_)
            | E::CriterionOutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            E::DuplicateCommittee(_) | E::CommitteeInactive(_) | E::NotInInterview { .. } => {
                StatusCode::CONFLICT
            }
            E::Application(inner) => application_status(inner),
            E::Repository(inner) => repository_status(inner),
        };
        Self::new(status, error.to_string())
    }
}
