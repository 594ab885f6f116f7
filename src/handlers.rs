use crate::auth::{IdentityProvider, normalize_email};
use crate::errors::{AppError, AuthError};
use crate::models::{
    AuthView, CellRef, ConfirmRequest, Habit, HabitDraft, HabitPatch, MAX_YEAR, MIN_YEAR,
    MonthStats, MonthView, NavigateRequest, Period, SessionRequest, SetCellRequest,
    SignInLinkRequest, SyncResponse, TitleRequest,
};
use crate::state::AppState;
use crate::stats::build_stats;
use crate::store::Confirmed;
use crate::sync::SyncStatus;
use crate::ui::render_index;
use axum::{
    Form, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::info;

async fn month_view(state: &AppState) -> MonthView {
    let dataset = state.store.lock().await.export_dataset();
    let stats = build_stats(&dataset);
    MonthView {
        dataset,
        stats,
        sync_status: state.sync.last_status().await.map(|status| status.to_string()),
        auth: auth_view(state).await,
    }
}

async fn auth_view(state: &AppState) -> AuthView {
    state
        .sync
        .auth_view(state.identity_provider.is_some())
        .await
}

fn sync_response(status: SyncStatus) -> Json<SyncResponse> {
    Json(SyncResponse {
        status: status.to_string(),
    })
}

fn parse_period(year: i32, month: u32) -> Result<Period, AppError> {
    Period::new(year, month).ok_or_else(|| {
        AppError::bad_request(format!(
            "year must be within {MIN_YEAR}..={MAX_YEAR} and month within 1..=12"
        ))
    })
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&month_view(&state).await))
}

pub async fn get_month(State(state): State<AppState>) -> Json<MonthView> {
    Json(month_view(&state).await)
}

pub async fn get_stats(State(state): State<AppState>) -> Json<MonthStats> {
    let store = state.store.lock().await;
    Json(build_stats(store.dataset()))
}

pub async fn set_title(
    State(state): State<AppState>,
    Json(payload): Json<TitleRequest>,
) -> Result<Json<MonthView>, AppError> {
    state.store.lock().await.set_title(&payload.title).await;
    Ok(Json(month_view(&state).await))
}

pub async fn set_title_form(
    State(state): State<AppState>,
    Form(payload): Form<TitleRequest>,
) -> Redirect {
    state.store.lock().await.set_title(&payload.title).await;
    Redirect::to("/")
}

pub async fn set_cell(
    State(state): State<AppState>,
    Json(payload): Json<SetCellRequest>,
) -> Result<Json<MonthView>, AppError> {
    state
        .store
        .lock()
        .await
        .set_cell(&payload.habit_id, payload.day, payload.value)
        .await?;
    Ok(Json(month_view(&state).await))
}

pub async fn cycle_cell(
    State(state): State<AppState>,
    Json(payload): Json<CellRef>,
) -> Result<Json<MonthView>, AppError> {
    state
        .store
        .lock()
        .await
        .cycle_cell(&payload.habit_id, payload.day)
        .await?;
    Ok(Json(month_view(&state).await))
}

pub async fn cycle_cell_form(
    State(state): State<AppState>,
    Form(payload): Form<CellRef>,
) -> Result<Redirect, AppError> {
    state
        .store
        .lock()
        .await
        .cycle_cell(&payload.habit_id, payload.day)
        .await?;
    Ok(Redirect::to("/"))
}

pub async fn clear_cell_form(
    State(state): State<AppState>,
    Form(payload): Form<CellRef>,
) -> Result<Redirect, AppError> {
    state
        .store
        .lock()
        .await
        .clear_cell(&payload.habit_id, payload.day)
        .await?;
    Ok(Redirect::to("/"))
}

pub async fn clear_month(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmRequest>,
) -> Result<Json<MonthView>, AppError> {
    state
        .store
        .lock()
        .await
        .clear_all_cells_in_month(&Confirmed(payload.confirmed))
        .await?;
    Ok(Json(month_view(&state).await))
}

pub async fn clear_month_form(
    State(state): State<AppState>,
    Form(payload): Form<ConfirmRequest>,
) -> Result<Redirect, AppError> {
    state
        .store
        .lock()
        .await
        .clear_all_cells_in_month(&Confirmed(payload.confirmed))
        .await?;
    Ok(Redirect::to("/"))
}

pub async fn add_habit(
    State(state): State<AppState>,
    Json(draft): Json<HabitDraft>,
) -> Result<(StatusCode, Json<Habit>), AppError> {
    let habit = state.store.lock().await.add_habit(draft).await?;
    Ok((StatusCode::CREATED, Json(habit)))
}

pub async fn add_habit_form(
    State(state): State<AppState>,
    Form(draft): Form<HabitDraft>,
) -> Result<Redirect, AppError> {
    state.store.lock().await.add_habit(draft).await?;
    Ok(Redirect::to("/"))
}

pub async fn update_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<HabitPatch>,
) -> Result<Json<Habit>, AppError> {
    let habit = state.store.lock().await.update_habit(&id, patch).await?;
    Ok(Json(habit))
}

pub async fn update_habit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(patch): Form<HabitPatch>,
) -> Result<Redirect, AppError> {
    state.store.lock().await.update_habit(&id, patch).await?;
    Ok(Redirect::to("/"))
}

pub async fn remove_habit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(payload): Form<ConfirmRequest>,
) -> Result<Redirect, AppError> {
    state
        .store
        .lock()
        .await
        .remove_habit(&id, &Confirmed(payload.confirmed))
        .await?;
    Ok(Redirect::to("/"))
}

pub async fn remove_habit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConfirmRequest>,
) -> Result<Json<Habit>, AppError> {
    let habit = state
        .store
        .lock()
        .await
        .remove_habit(&id, &Confirmed(query.confirmed))
        .await?;
    Ok(Json(habit))
}

pub async fn navigate(
    State(state): State<AppState>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<MonthView>, AppError> {
    let period = parse_period(payload.year, payload.month)?;
    state.sync.navigate(period).await;
    Ok(Json(month_view(&state).await))
}

pub async fn navigate_form(
    State(state): State<AppState>,
    Form(payload): Form<NavigateRequest>,
) -> Result<Redirect, AppError> {
    let period = parse_period(payload.year, payload.month)?;
    state.sync.navigate(period).await;
    Ok(Redirect::to("/"))
}

pub async fn export_month(State(state): State<AppState>) -> Result<Response, AppError> {
    let store = state.store.lock().await;
    let body = store.export_json()?;
    let disposition = format!("attachment; filename=\"{}\"", store.export_file_name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub async fn import_month(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<MonthView>, AppError> {
    state.store.lock().await.import_dataset(&body).await?;
    Ok(Json(month_view(&state).await))
}

pub async fn cloud_save(State(state): State<AppState>) -> Json<SyncResponse> {
    sync_response(state.sync.save().await)
}

pub async fn cloud_load(State(state): State<AppState>) -> Json<SyncResponse> {
    sync_response(state.sync.load().await)
}

pub async fn cloud_save_form(State(state): State<AppState>) -> Redirect {
    state.sync.save().await;
    Redirect::to("/")
}

pub async fn cloud_load_form(State(state): State<AppState>) -> Redirect {
    state.sync.load().await;
    Redirect::to("/")
}

pub async fn get_auth(State(state): State<AppState>) -> Json<AuthView> {
    Json(auth_view(&state).await)
}

fn identity_provider(state: &AppState) -> Result<&Arc<dyn IdentityProvider>, AuthError> {
    state
        .identity_provider
        .as_ref()
        .ok_or(AuthError::NotConfigured)
}

async fn request_sign_in_link(state: &AppState, email: &str) -> Result<(), AppError> {
    let provider = identity_provider(state)?;
    let email = normalize_email(email)?;
    provider.send_sign_in_link(&email).await?;
    state.sync.record(SyncStatus::LinkSent).await;
    Ok(())
}

pub async fn send_sign_in_link(
    State(state): State<AppState>,
    Json(payload): Json<SignInLinkRequest>,
) -> Result<StatusCode, AppError> {
    request_sign_in_link(&state, &payload.email).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn send_sign_in_link_form(
    State(state): State<AppState>,
    Form(payload): Form<SignInLinkRequest>,
) -> Result<Redirect, AppError> {
    request_sign_in_link(&state, &payload.email).await?;
    Ok(Redirect::to("/"))
}

pub async fn complete_sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> Result<Json<SyncResponse>, AppError> {
    let session = identity_provider(&state)?
        .resolve_session(&payload.access_token)
        .await?;
    info!(user_id = %session.user_id, "session established");
    Ok(sync_response(state.sync.sign_in(session).await))
}

pub async fn sign_out(State(state): State<AppState>) -> Json<SyncResponse> {
    sync_response(state.sync.sign_out().await)
}

pub async fn sign_out_form(State(state): State<AppState>) -> Redirect {
    state.sync.sign_out().await;
    Redirect::to("/")
}
