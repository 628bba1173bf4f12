//! # Coupon Lifecycle Manager
//!
//! Owns the twelve coupons for the running process.
//!
//! ## Flow
//!
//! - On load, select everything from the store ordered by month
//! - Store down or empty: fall back to the seed for the current month, kept in memory only
//! - Every mutation is planned against the local copy, persisted, and only then applied locally
//! - A failed store call leaves the local copy exactly as it was, no retry
//! - Each applied mutation is broadcast as a [`CouponEvent`]
//!
//! Mutations hold the list lock across plan, persist and apply, so two of
//! them never interleave.
use std::{collections::HashSet, sync::Arc};

use bank::{
    Action, Actor, Clock, Coupon, CouponPatch, Flags,
    coupons::is_valid_month,
    lifecycle::{self, Badge},
    seed::seed_coupons,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info, warn};

use crate::{
    database::CouponStore,
    error::{AppError, AppResult},
};

const EVENT_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Saved,
    RedemptionRequested,
    Approved,
    Edited,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Saved => "saved",
            EventKind::RedemptionRequested => "redemption_requested",
            EventKind::Approved => "approved",
            EventKind::Edited => "edited",
        }
    }
}

impl From<Action> for EventKind {
    fn from(action: Action) -> Self {
        match action {
            Action::Save => EventKind::Saved,
            Action::RequestRedemption => EventKind::RedemptionRequested,
            Action::Approve => EventKind::Approved,
            Action::Edit => EventKind::Edited,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponEvent {
    pub kind: EventKind,
    pub actor: String,
    pub coupon: Coupon,
}

/// Where the current list came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Store,
    Seed,
}

#[derive(Clone, Debug, Serialize)]
pub struct CouponCard {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub flags: Flags,
    pub badge: Badge,
    pub revealable: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct Calendar {
    pub current_month: u8,
    pub source: Source,
    pub coupons: Vec<CouponCard>,
    pub wallet_badge: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct Wallet {
    pub coupons: Vec<Coupon>,
    pub badge: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct CouponDetail {
    pub coupon: Coupon,
    pub flags: Flags,
    pub actions: Vec<Action>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ContentEdit {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

struct Loaded {
    coupons: Vec<Coupon>,
    source: Source,
}

pub struct CouponManager {
    store: Arc<dyn CouponStore>,
    clock: Arc<dyn Clock>,
    loaded: Mutex<Loaded>,
    events: broadcast::Sender<CouponEvent>,
}

impl CouponManager {
    pub async fn new(store: Arc<dyn CouponStore>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let loaded = fetch(store.as_ref(), clock.current_month()).await;

        Self {
            store,
            clock,
            loaded: Mutex::new(loaded),
            events,
        }
    }

    pub fn current_month(&self) -> u8 {
        self.clock.current_month()
    }

    /// Throw away the local copy and fetch again.
    pub async fn reload(&self) -> Source {
        let fresh = fetch(self.store.as_ref(), self.current_month()).await;
        let source = fresh.source;

        *self.loaded.lock().await = fresh;

        source
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CouponEvent> {
        self.events.subscribe()
    }

    pub async fn coupons(&self) -> Vec<Coupon> {
        self.loaded.lock().await.coupons.clone()
    }

    pub async fn calendar(&self, actor: &Actor) -> Calendar {
        let current_month = self.current_month();
        let loaded = self.loaded.lock().await;

        let coupons = loaded
            .coupons
            .iter()
            .map(|coupon| {
                let flags = Flags::derive(coupon, current_month);

                CouponCard {
                    coupon: coupon.clone(),
                    flags,
                    badge: flags.badge(),
                    revealable: lifecycle::is_revealable(coupon, actor.role, current_month),
                }
            })
            .collect();

        Calendar {
            current_month,
            source: loaded.source,
            coupons,
            wallet_badge: lifecycle::wallet_badge(&loaded.coupons),
        }
    }

    pub async fn wallet(&self) -> Wallet {
        let loaded = self.loaded.lock().await;

        let coupons: Vec<Coupon> = lifecycle::wallet(&loaded.coupons)
            .into_iter()
            .cloned()
            .collect();

        Wallet {
            badge: coupons.len(),
            coupons,
        }
    }

    pub async fn coupon_of_the_month(&self) -> Option<Coupon> {
        let current_month = self.current_month();

        self.loaded
            .lock()
            .await
            .coupons
            .iter()
            .find(|coupon| coupon.month_number == current_month)
            .cloned()
    }

    /// Open a coupon's detail view, if the actor is allowed to see it.
    pub async fn reveal(&self, actor: &Actor, id: &str) -> AppResult<CouponDetail> {
        let current_month = self.current_month();
        let loaded = self.loaded.lock().await;
        let coupon = find(&loaded.coupons, id)?;

        lifecycle::ensure_revealable(coupon, actor.role, current_month)?;

        Ok(CouponDetail {
            coupon: coupon.clone(),
            flags: Flags::derive(coupon, current_month),
            actions: lifecycle::available_actions(coupon, actor.role, current_month),
        })
    }

    pub async fn save(&self, actor: &Actor, id: &str) -> AppResult<Coupon> {
        self.transition(actor, id, Action::Save).await
    }

    pub async fn request_redemption(&self, actor: &Actor, id: &str) -> AppResult<Coupon> {
        self.transition(actor, id, Action::RequestRedemption).await
    }

    pub async fn approve(&self, actor: &Actor, id: &str) -> AppResult<Coupon> {
        self.transition(actor, id, Action::Approve).await
    }

    pub async fn edit(&self, actor: &Actor, id: &str, edit: ContentEdit) -> AppResult<Coupon> {
        let blank = edit.title.trim().is_empty();
        let patch = lifecycle::plan_edit(actor, edit.title, edit.description)?;

        if blank {
            return Err(AppError::MalformedPayload);
        }

        self.commit(actor, id, Action::Edit, |_| Ok(patch)).await
    }

    async fn transition(&self, actor: &Actor, id: &str, action: Action) -> AppResult<Coupon> {
        let current_month = self.current_month();
        let now = self.clock.now_utc();

        self.commit(actor, id, action, |coupon| {
            lifecycle::plan_transition(coupon, action, actor, current_month, now)
        })
        .await
    }

    async fn commit<F>(&self, actor: &Actor, id: &str, action: Action, plan: F) -> AppResult<Coupon>
    where
        F: FnOnce(&Coupon) -> Result<CouponPatch, bank::LifecycleError>,
    {
        let mut loaded = self.loaded.lock().await;
        let index = position(&loaded.coupons, id)?;

        let patch = plan(&loaded.coupons[index]).map_err(|e| {
            warn!("{} tried to {action} {id}: {e}", actor.username);
            e
        })?;

        let stored = self.store.update(id, &patch).await.map_err(|e| {
            error!("Failed to persist {action} on {id}: {e}");
            e
        })?;

        let coupon = &mut loaded.coupons[index];
        coupon.apply(&patch);

        if stored != *coupon {
            warn!("Store returned a different record for {id}, keeping the stored one");
            *coupon = stored;
        }

        info!(
            "{} did {action} on month {} ({id}), now {}",
            actor.username, coupon.month_number, coupon.state
        );

        let event = CouponEvent {
            kind: action.into(),
            actor: actor.username.clone(),
            coupon: coupon.clone(),
        };

        // no subscribers is fine
        let _ = self.events.send(event);

        Ok(coupon.clone())
    }
}

fn position(coupons: &[Coupon], id: &str) -> AppResult<usize> {
    coupons
        .iter()
        .position(|coupon| coupon.id == id)
        .ok_or_else(|| AppError::NotFound(format!("coupon {id}")))
}

fn find<'a>(coupons: &'a [Coupon], id: &str) -> AppResult<&'a Coupon> {
    position(coupons, id).map(|index| &coupons[index])
}

async fn fetch(store: &dyn CouponStore, current_month: u8) -> Loaded {
    match store.select_all().await {
        Ok(coupons) if !coupons.is_empty() => Loaded {
            coupons: normalise(coupons),
            source: Source::Store,
        },
        Ok(_) => {
            warn!("Store has no coupons, falling back to seed for month {current_month}");
            seeded(current_month)
        }
        Err(e) => {
            error!("Failed to load coupons: {e}, falling back to seed for month {current_month}");
            seeded(current_month)
        }
    }
}

fn seeded(current_month: u8) -> Loaded {
    Loaded {
        coupons: seed_coupons(current_month),
        source: Source::Seed,
    }
}

/// Order by month, drop anything outside 1-12 and any second coupon for a month.
fn normalise(mut coupons: Vec<Coupon>) -> Vec<Coupon> {
    coupons.sort_by_key(|coupon| coupon.month_number);

    let mut seen = HashSet::new();
    coupons.retain(|coupon| {
        if !is_valid_month(coupon.month_number) {
            warn!("Dropping {} with month {}", coupon.id, coupon.month_number);
            return false;
        }
        if !seen.insert(coupon.month_number) {
            warn!("Dropping {}, month {} already has a coupon", coupon.id, coupon.month_number);
            return false;
        }
        true
    });

    coupons
}
