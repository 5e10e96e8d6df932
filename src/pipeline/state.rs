//! Per-page processing states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, FailureCategory, Result};

/// Where a page is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Pending,
    Extracting,
    LayoutAnalyzed,
    Built,
    Fitted,
    Written,
    Failed,
}

impl PageState {
    /// Terminal states never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, PageState::Written | PageState::Failed)
    }

    /// The state that follows on success.
    pub fn next(self) -> Option<PageState> {
        match self {
            PageState::Pending => Some(PageState::Extracting),
            PageState::Extracting => Some(PageState::LayoutAnalyzed),
            PageState::LayoutAnalyzed => Some(PageState::Built),
            PageState::Built => Some(PageState::Fitted),
            PageState::Fitted => Some(PageState::Written),
            PageState::Written | PageState::Failed => None,
        }
    }

    /// Whether `self -> to` is allowed.
    pub fn can_transition_to(self, to: PageState) -> bool {
        if to == PageState::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageState::Pending => "PENDING",
            PageState::Extracting => "EXTRACTING",
            PageState::LayoutAnalyzed => "LAYOUT_ANALYZED",
            PageState::Built => "BUILT",
            PageState::Fitted => "FITTED",
            PageState::Written => "WRITTEN",
            PageState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Why a page failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub reason: String,
    pub category: FailureCategory,
}

impl From<&Error> for PageFailure {
    fn from(error: &Error) -> Self {
        Self {
            reason: error.to_string(),
            category: error.category(),
        }
    }
}

/// One page moving through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageJob {
    pub page: u32,
    state: PageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<PageFailure>,
}

impl PageJob {
    pub fn new(page: u32) -> Self {
        Self {
            page,
            state: PageState::Pending,
            failure: None,
        }
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn failure(&self) -> Option<&PageFailure> {
        self.failure.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.state == PageState::Failed
    }

    /// Move to `to`, rejecting illegal transitions.
    pub fn advance(&mut self, to: PageState) -> Result<()> {
        if to == PageState::Failed || !self.state.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        log::trace!("Page {}: {} -> {}", self.page, self.state, to);
        self.state = to;
        Ok(())
    }

    /// Mark the page failed. Terminal pages keep their state.
    pub fn fail(&mut self, error: &Error) {
        if self.state.is_terminal() {
            log::debug!(
                "Page {}: ignoring failure in terminal state {}: {}",
                self.page,
                self.state,
                error
            );
            return;
        }
        log::warn!("Page {} failed in state {}: {}", self.page, self.state, error);
        self.state = PageState::Failed;
        self.failure = Some(PageFailure::from(error));
    }
}
