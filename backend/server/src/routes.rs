use std::{convert::Infallible, sync::Arc};

use axum::{
    Json,
    extract::{Path, State as Shared, rejection::JsonRejection},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use bank::Coupon;
use futures::{Stream, stream};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::{
    auth::Session,
    error::{AppError, AppResult},
    manager::{Calendar, ContentEdit, CouponDetail, Source, Wallet},
    state::State,
};

#[derive(Serialize)]
pub struct Reloaded {
    source: Source,
    coupons: usize,
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn calendar_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
) -> Json<Calendar> {
    Json(state.manager.calendar(&actor).await)
}

pub async fn current_handler(
    Shared(state): Shared<Arc<State>>,
    Session(_): Session,
) -> AppResult<Json<Coupon>> {
    state
        .manager
        .coupon_of_the_month()
        .await
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!("month {}", state.manager.current_month()))
        })
}

pub async fn wallet_handler(
    Shared(state): Shared<Arc<State>>,
    Session(_): Session,
) -> Json<Wallet> {
    Json(state.manager.wallet().await)
}

pub async fn reveal_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
    Path(id): Path<String>,
) -> AppResult<Json<CouponDetail>> {
    Ok(Json(state.manager.reveal(&actor, &id).await?))
}

pub async fn save_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
    Path(id): Path<String>,
) -> AppResult<Json<Coupon>> {
    Ok(Json(state.manager.save(&actor, &id).await?))
}

pub async fn request_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
    Path(id): Path<String>,
) -> AppResult<Json<Coupon>> {
    Ok(Json(state.manager.request_redemption(&actor, &id).await?))
}

pub async fn approve_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
    Path(id): Path<String>,
) -> AppResult<Json<Coupon>> {
    Ok(Json(state.manager.approve(&actor, &id).await?))
}

pub async fn edit_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
    Path(id): Path<String>,
    payload: Result<Json<ContentEdit>, JsonRejection>,
) -> AppResult<Json<Coupon>> {
    let Json(edit) = payload.map_err(|e| {
        warn!("Rejected edit payload for {id}: {e}");
        AppError::MalformedPayload
    })?;

    Ok(Json(state.manager.edit(&actor, &id, edit).await?))
}

pub async fn reload_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
) -> AppResult<Json<Reloaded>> {
    if !actor.role.is_owner() {
        return Err(AppError::Forbidden(format!(
            "{} may not reload coupons",
            actor.username
        )));
    }

    let source = state.manager.reload().await;
    let coupons = state.manager.coupons().await.len();
    info!("{} reloaded {coupons} coupons from {source:?}", actor.username);

    Ok(Json(Reloaded { source, coupons }))
}

/// Change events as server-sent events, named after their kind.
pub async fn events_handler(
    Shared(state): Shared<Arc<State>>,
    Session(actor): Session,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("{} subscribed to coupon events", actor.username);

    let stream = stream::unfold(state.manager.subscribe(), |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().event(event.kind.as_str()).json_data(&event) {
                    Ok(sse) => return Some((Ok(sse), receiver)),
                    Err(e) => warn!("Failed to encode {} event: {e}", event.kind.as_str()),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {skipped} events")
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
