//! Workflow trigger evaluation.
//!
//! Decides whether an event fires the CI pipeline: pushes fire only for
//! watched branches, pull requests fire for any base branch. Under a CI
//! host the event is reconstructed from the environment; locally the
//! current branch is treated as a push.

use crate::config::WorkflowConfig;
use crate::core::git::Workspace;
use std::env;

/// A repository event the workflow may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A push to a branch.
    Push {
        /// Branch that was pushed to.
        branch: String,
    },
    /// A pull request.
    PullRequest {
        /// Base branch the pull request targets.
        base: String,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push { branch } => write!(f, "push to {branch}"),
            Self::PullRequest { base } => write!(f, "pull request against {base}"),
        }
    }
}

/// Reason for a trigger decision - useful for debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Push to a branch listed in `workflow.push_branches`.
    WatchedBranch(String),
    /// Push to a branch not listed in `workflow.push_branches`.
    UnwatchedBranch(String),
    /// Pull request, which fires regardless of its base branch.
    PullRequest(String),
    /// Pull requests are disabled in configuration.
    PullRequestsDisabled,
    /// Gate bypassed with --force.
    Forced,
    /// No event could be determined.
    NoEvent,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WatchedBranch(branch) => write!(f, "push to watched branch {branch}"),
            Self::UnwatchedBranch(branch) => write!(f, "branch {branch} is not watched"),
            Self::PullRequest(base) => write!(f, "pull request against {base}"),
            Self::PullRequestsDisabled => write!(f, "pull requests are disabled"),
            Self::Forced => write!(f, "forced"),
            Self::NoEvent => write!(f, "no event detected"),
        }
    }
}

/// Result of evaluating an event against the workflow configuration.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Whether the pipeline should run.
    pub fired: bool,
    /// Reason for the decision.
    pub reason: Reason,
}

/// Trigger gate for the CI pipeline.
#[derive(Debug)]
pub struct Trigger<'a> {
    config: &'a WorkflowConfig,
}

impl<'a> Trigger<'a> {
    /// Creates a new trigger gate with the given workflow configuration.
    #[must_use]
    pub const fn new(config: &'a WorkflowConfig) -> Self {
        Self { config }
    }

    /// Evaluates an event against the configured triggers.
    #[must_use]
    pub fn evaluate(&self, event: &Event) -> Decision {
        match event {
            Event::Push { branch } => {
                if self.config.push_branches.iter().any(|b| b == branch) {
                    Decision {
                        fired: true,
                        reason: Reason::WatchedBranch(branch.clone()),
                    }
                } else {
                    Decision {
                        fired: false,
                        reason: Reason::UnwatchedBranch(branch.clone()),
                    }
                }
            },
            Event::PullRequest { base } => {
                if self.config.pull_request {
                    Decision {
                        fired: true,
                        reason: Reason::PullRequest(base.clone()),
                    }
                } else {
                    Decision {
                        fired: false,
                        reason: Reason::PullRequestsDisabled,
                    }
                }
            },
        }
    }

    /// Returns the decision for a bypassed gate.
    #[must_use]
    pub const fn forced() -> Decision {
        Decision {
            fired: true,
            reason: Reason::Forced,
        }
    }
}

/// Detects the current event from the environment.
///
/// Under GitHub Actions the event name and refs are taken from the standard
/// variables; anywhere else the workspace's current branch counts as a push.
#[must_use]
pub fn detect_event(workspace: Option<&Workspace>) -> Option<Event> {
    let event = from_env_parts(
        env::var("GITHUB_EVENT_NAME").ok().as_deref(),
        env::var("GITHUB_REF_NAME").ok().as_deref(),
        env::var("GITHUB_BASE_REF").ok().as_deref(),
    );
    if event.is_some() {
        return event;
    }

    let branch = workspace?.current_branch().ok()?;
    Some(Event::Push { branch })
}

/// Builds an event from CI environment variable values.
fn from_env_parts(
    event_name: Option<&str>,
    ref_name: Option<&str>,
    base_ref: Option<&str>,
) -> Option<Event> {
    match event_name? {
        "push" => Some(Event::Push {
            branch: ref_name?.to_string(),
        }),
        "pull_request" | "pull_request_target" => Some(Event::PullRequest {
            base: base_ref.unwrap_or("main").to_string(),
        }),
        _ => None,
    }
}
