use std::cell::RefCell;
use std::rc::Rc;

use log::debug;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirmed,
    Cancelled,
}

/// What the user did with the open dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Confirm,
    Cancel,
    /// Click on the backdrop; same as Cancel.
    OutsideClick,
}

struct Pending {
    message: String,
    reply: oneshot::Sender<Decision>,
}

/// Modal yes/no gate in front of destructive actions. At most one dialog is
/// open; opening another replaces it and the replaced one resolves as
/// cancelled.
#[derive(Clone, Default)]
pub struct ConfirmationGate {
    pending: Rc<RefCell<Option<Pending>>>,
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the dialog and wait for the user's single answer.
    pub async fn confirm(&self, message: impl Into<String>) -> Decision {
        let (reply, decision) = oneshot::channel();
        let replaced = self.pending.borrow_mut().replace(Pending {
            message: message.into(),
            reply,
        });
        if let Some(old) = replaced {
            debug!("confirmation replaced: {}", old.message);
            let _ = old.reply.send(Decision::Cancelled);
        }
        decision.await.unwrap_or(Decision::Cancelled)
    }

    /// Resolve the open dialog. Returns false when nothing was open.
    pub fn answer(&self, action: ConfirmAction) -> bool {
        let Some(pending) = self.pending.borrow_mut().take() else {
            return false;
        };
        let decision = match action {
            ConfirmAction::Confirm => Decision::Confirmed,
            ConfirmAction::Cancel | ConfirmAction::OutsideClick => Decision::Cancelled,
        };
        let _ = pending.reply.send(decision);
        true
    }

    /// Message of the open dialog, if any.
    pub fn pending(&self) -> Option<String> {
        self.pending.borrow().as_ref().map(|p| p.message.clone())
    }
}
