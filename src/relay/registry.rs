use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

/// Kind of LINE endpoint a push message can be addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    User,
    Group,
    Room,
}

impl TargetKind {
    /// Classify a bare LINE id by its prefix (`C...` group, `R...` room).
    /// Anything else is treated as a user id.
    pub fn infer(id: &str) -> Self {
        match id.chars().next() {
            Some('C') => TargetKind::Group,
            Some('R') => TargetKind::Room,
            _ => TargetKind::User,
        }
    }
}

/// An addressable LINE recipient. Identity is the id alone.
#[derive(Debug, Clone)]
pub struct RecipientTarget {
    pub id: String,
    pub kind: TargetKind,
}

impl RecipientTarget {
    pub fn new(id: impl Into<String>, kind: TargetKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        let kind = TargetKind::infer(&id);
        Self { id, kind }
    }
}

impl PartialEq for RecipientTarget {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecipientTarget {}

impl Hash for RecipientTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Default)]
struct Targets {
    ordered: Vec<RecipientTarget>,
    seen: HashSet<String>,
}

/// Every LINE user, group and room that has talked to the bot since startup.
///
/// Grows for the process lifetime; nothing is ever evicted.
#[derive(Default)]
pub struct TargetRegistry {
    inner: RwLock<Targets>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target if its id is new. Returns `true` when it was inserted.
    pub async fn register(&self, target: RecipientTarget) -> bool {
        let mut targets = self.inner.write().await;
        if !targets.seen.insert(target.id.clone()) {
            return false;
        }
        info!(
            target_id = %target.id,
            kind = ?target.kind,
            total = targets.ordered.len() + 1,
            "Registered LINE recipient"
        );
        targets.ordered.push(target);
        true
    }

    /// Point-in-time copy of all targets in first-seen order
    pub async fn snapshot(&self) -> Vec<RecipientTarget> {
        self.inner.read().await.ordered.clone()
    }

    #[cfg(test)]
    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.seen.contains(id)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.ordered.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.ordered.is_empty()
    }
}

/// Where Discord messages get pushed on the LINE side.
#[derive(Clone)]
pub enum Recipients {
    /// One preconfigured id; inbound LINE events never change it.
    Fixed(RecipientTarget),
    /// Everyone who has messaged the bot on LINE.
    Registry(Arc<TargetRegistry>),
}

impl Recipients {
    /// Record a target seen in an inbound LINE event. No-op for `Fixed`.
    pub async fn register(&self, target: RecipientTarget) {
        if let Recipients::Registry(registry) = self {
            registry.register(target).await;
        }
    }

    pub async fn snapshot(&self) -> Vec<RecipientTarget> {
        match self {
            Recipients::Fixed(target) => vec![target.clone()],
            Recipients::Registry(registry) => registry.snapshot().await,
        }
    }
}
