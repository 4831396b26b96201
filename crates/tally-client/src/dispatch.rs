//! Side-effect fan-out for annotated inbound traffic.
//!
//! Inbound messages and notifications can reference server-side task or
//! debt state. The plan computed here decides which dependent caches must
//! refresh; the engine fires the refreshes on the runtime without blocking
//! message or unread processing.

use tally_shared::protocol::{Annotation, AnnotationKind, NotificationFrame};

/// Which dependent caches must refresh after an inbound event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshPlan {
    pub tasks: bool,
    pub debts: bool,
    pub balance: bool,
}

impl RefreshPlan {
    pub fn is_empty(&self) -> bool {
        !(self.tasks || self.debts || self.balance)
    }

    /// Plan for a message annotation.
    ///
    /// Balance is derived from debts, so the two always refresh together.
    pub fn for_annotation(annotation: Option<&Annotation>) -> Self {
        match annotation.map(|a| a.kind) {
            Some(AnnotationKind::Task) => Self {
                tasks: true,
                ..Self::default()
            },
            Some(AnnotationKind::Expense) => Self {
                tasks: true,
                debts: true,
                balance: true,
            },
            Some(AnnotationKind::Unknown) | None => Self::default(),
        }
    }

    /// Plan for a bare notification frame.
    pub fn for_notification(frame: &NotificationFrame) -> Self {
        Self {
            tasks: frame.task_id.is_some(),
            debts: frame.debt_id.is_some(),
            balance: frame.debt_id.is_some(),
        }
    }
}
