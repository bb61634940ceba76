use crate::{
    error::AccessError,
    models::{GuardDecision, Role},
    resolver::RoleResolver,
    session::SessionWatch,
};
use std::{collections::BTreeSet, fmt, str::FromStr};
use tokio::sync::watch;

/// AllowedRoles
///
/// The static set of roles a guarded route subtree accepts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllowedRoles(BTreeSet<Role>);

impl AllowedRoles {
    pub fn only(role: Role) -> Self {
        Self(BTreeSet::from([role]))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Role> for AllowedRoles {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for AllowedRoles {
    type Err = crate::models::ParseRoleError;

    /// Parses a comma separated list such as `estudiante,consejero`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Role::from_str)
            .collect()
    }
}

impl fmt::Display for AllowedRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Role::as_str).collect();
        f.write_str(&names.join(","))
    }
}

/// GuardState
///
/// `Pending` until the first evaluation settles; then `Authorized` or `Denied` for the
/// rest of this mount. The denial reason is kept for logs and tests only.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GuardState {
    #[default]
    Pending,
    Authorized(Role),
    Denied(AccessError),
}

impl GuardState {
    pub fn is_pending(&self) -> bool {
        matches!(self, GuardState::Pending)
    }

    /// The outward decision. Every denial looks the same.
    pub fn decision(&self) -> Option<GuardDecision> {
        match self {
            GuardState::Pending => None,
            GuardState::Authorized(role) => Some(GuardDecision::granted(*role)),
            GuardState::Denied(_) => Some(GuardDecision::denied()),
        }
    }

    fn outcome(&self) -> Option<Result<Role, AccessError>> {
        match self {
            GuardState::Pending => None,
            GuardState::Authorized(role) => Some(Ok(*role)),
            GuardState::Denied(e) => Some(Err(e.clone())),
        }
    }
}

/// GuardView
///
/// What the UI shell should show for the guarded subtree right now.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardView<T> {
    Loading,
    Content(T),
    Redirect(String),
}

#[derive(Debug, Clone, Default)]
struct GuardSlot {
    // Bumped by every reset so a late evaluation cannot settle a newer mount.
    epoch: u64,
    allowed: AllowedRoles,
    state: GuardState,
}

/// RouteGuard
///
/// Decides render-vs-redirect for one guarded subtree. It fails closed: a missing
/// principal, an unknown role, a backend failure or a session change mid-resolution all
/// end in `Denied`.
///
/// This is presentation-level gating only. The backend's row-level policies must reject
/// unauthorized reads and writes on their own.
#[derive(Debug)]
pub struct RouteGuard {
    fallback: String,
    slot: watch::Sender<GuardSlot>,
}

impl RouteGuard {
    pub fn new(allowed: AllowedRoles, fallback: impl Into<String>) -> Self {
        let (slot, _rx) = watch::channel(GuardSlot {
            epoch: 0,
            allowed,
            state: GuardState::Pending,
        });
        Self {
            fallback: fallback.into(),
            slot,
        }
    }

    pub fn state(&self) -> GuardState {
        self.slot.borrow().state.clone()
    }

    pub fn allowed_roles(&self) -> AllowedRoles {
        self.slot.borrow().allowed.clone()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn subscribe(&self) -> GuardWatch {
        GuardWatch {
            rx: self.slot.subscribe(),
        }
    }

    /// Back to `Pending`, discarding any settled or in-flight outcome.
    pub fn reset(&self) {
        self.slot.send_modify(|slot| {
            slot.epoch += 1;
            slot.state = GuardState::Pending;
        });
    }

    /// Points the guard at a different role set. Only a different set forces a
    /// re-evaluation.
    pub fn retarget(&self, allowed: AllowedRoles) {
        self.slot.send_if_modified(|slot| {
            if slot.allowed == allowed {
                return false;
            }
            tracing::debug!(from = %slot.allowed, to = %allowed, "guard retargeted");
            slot.epoch += 1;
            slot.allowed = allowed;
            slot.state = GuardState::Pending;
            true
        });
    }

    /// evaluate
    ///
    /// Settles `Pending` into `Authorized` or `Denied` and returns the outcome. Once
    /// settled, later calls return the same outcome without touching the backend.
    ///
    /// The returned value always matches the guard's own state: an outcome computed for
    /// an epoch that was reset or retargeted meanwhile is discarded and the evaluation
    /// runs again against the current allowed set.
    pub async fn evaluate(
        &self,
        session: &SessionWatch,
        resolver: &RoleResolver,
    ) -> Result<Role, AccessError> {
        loop {
            // 1. Snapshot the epoch and allowed set, or return an already settled outcome.
            let (epoch, allowed) = {
                let slot = self.slot.borrow();
                if let Some(settled) = slot.state.outcome() {
                    return settled;
                }
                (slot.epoch, slot.allowed.clone())
            };

            // 2. Decide without holding the slot.
            let outcome = decide(&allowed, session, resolver).await;

            // 3. Settle, but only the epoch this outcome was computed for.
            let mut applied = false;
            self.slot.send_if_modified(|slot| {
                if slot.epoch != epoch || !slot.state.is_pending() {
                    return false;
                }
                slot.state = match &outcome {
                    Ok(role) => GuardState::Authorized(*role),
                    Err(e) => GuardState::Denied(e.clone()),
                };
                applied = true;
                true
            });

            if applied {
                if let Err(e) = &outcome {
                    e.log();
                }
                return outcome;
            }

            // 4. Another evaluation settled this epoch first: report its outcome.
            {
                let slot = self.slot.borrow();
                if slot.epoch == epoch {
                    if let Some(settled) = slot.state.outcome() {
                        return settled;
                    }
                }
            }

            // 5. Reset or retargeted mid-flight; `outcome` answers a question nobody asks
            // any more.
            tracing::debug!(epoch, "guard moved on during evaluation; re-evaluating");
        }
    }

    /// render
    ///
    /// `content` runs only in `Authorized`; never while pending.
    pub fn render<T>(&self, content: impl FnOnce(Role) -> T) -> GuardView<T> {
        match self.state() {
            GuardState::Pending => GuardView::Loading,
            GuardState::Authorized(role) => GuardView::Content(content(role)),
            GuardState::Denied(_) => GuardView::Redirect(self.fallback.clone()),
        }
    }

    /// follow_session
    ///
    /// Keeps the guard in step with the principal-change feed: evaluates, then resets and
    /// re-evaluates after every sign-in or sign-out. Returns when the session is dropped.
    pub async fn follow_session(&self, session: &SessionWatch, resolver: &RoleResolver) {
        let mut feed = session.clone();
        loop {
            let _ = self.evaluate(session, resolver).await;
            if !feed.changed().await {
                return;
            }
            self.reset();
        }
    }
}

/// The actual decision, independent of guard state.
async fn decide(
    allowed: &AllowedRoles,
    session: &SessionWatch,
    resolver: &RoleResolver,
) -> Result<Role, AccessError> {
    let snapshot = session.snapshot();
    let Some(principal) = snapshot.principal else {
        return Err(AccessError::Unauthenticated);
    };

    let mut feed = session.clone();
    let resolved = tokio::select! {
        biased;
        _ = feed.superseded(snapshot.generation) => {
            return Err(AccessError::StaleSession { principal_id: principal.id });
        }
        resolved = resolver.resolve(principal.id) => resolved,
    };

    // The session may have moved on between the backend answering and this point.
    if session.snapshot().generation != snapshot.generation {
        return Err(AccessError::StaleSession {
            principal_id: principal.id,
        });
    }

    match resolved {
        Err(e) => Err(AccessError::BackendUnavailable(e)),
        Ok(None) => Err(AccessError::NoRecognizedRole {
            principal_id: principal.id,
        }),
        Ok(Some(role)) if allowed.contains(role) => Ok(role),
        Ok(Some(role)) => Err(AccessError::RoleMismatch {
            principal_id: principal.id,
            role,
        }),
    }
}

/// GuardWatch
///
/// Observes a guard's state transitions.
#[derive(Debug, Clone)]
pub struct GuardWatch {
    rx: watch::Receiver<GuardSlot>,
}

impl GuardWatch {
    pub fn state(&self) -> GuardState {
        self.rx.borrow().state.clone()
    }

    /// Waits until the guard leaves `Pending`. Returns `None` if the guard is dropped first.
    pub async fn settled(&mut self) -> Option<GuardState> {
        let slot = self.rx.wait_for(|slot| !slot.state.is_pending()).await.ok()?;
        Some(slot.state.clone())
    }
}
