use crate::models::Principal;
use tokio::sync::watch;

/// SessionSnapshot
///
/// The ambient principal at one point in time. `generation` increases on every sign-in
/// or sign-out, so two snapshots with the same principal can still be told apart.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub principal: Option<Principal>,
}

/// Session
///
/// Owner of the ambient principal. Guards only ever read it through a `SessionWatch`;
/// sign-in and sign-out are driven by whoever owns the session (the identity backend
/// adapter or, for an HTTP request, the request itself).
#[derive(Debug)]
pub struct Session {
    tx: watch::Sender<SessionSnapshot>,
}

impl Session {
    pub fn signed_out() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self { tx }
    }

    pub fn signed_in(principal: Principal) -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot {
            generation: 0,
            principal: Some(principal),
        });
        Self { tx }
    }

    pub fn sign_in(&self, principal: Principal) {
        tracing::debug!(principal_id = %principal.id, "session: sign in");
        self.replace(Some(principal));
    }

    pub fn sign_out(&self) {
        tracing::debug!("session: sign out");
        self.replace(None);
    }

    fn replace(&self, principal: Option<Principal>) {
        self.tx.send_modify(|snapshot| {
            snapshot.generation += 1;
            snapshot.principal = principal;
        });
    }

    pub fn current(&self) -> Option<Principal> {
        self.tx.borrow().principal.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    /// Principal-change feed.
    pub fn subscribe(&self) -> SessionWatch {
        SessionWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// SessionWatch
///
/// Read-only handle on a `Session`, cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<SessionSnapshot>,
}

impl SessionWatch {
    pub fn current(&self) -> Option<Principal> {
        self.rx.borrow().principal.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.rx.borrow().clone()
    }

    /// Waits for the next sign-in or sign-out. Returns `false` once the `Session` is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Resolves once the session has moved past `generation`, or never if the session
    /// is dropped first (a dropped session can no longer supersede anything).
    pub async fn superseded(&mut self, generation: u64) {
        let closed = self
            .rx
            .wait_for(|s| s.generation != generation)
            .await
            .is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
