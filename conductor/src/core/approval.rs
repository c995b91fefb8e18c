//! Default-deny approval decisions for tool calls.
//!
//! Every tool call the model requests is routed through an ordered table of
//! independent predicates. The first predicate that matches approves the call;
//! when none match, the caller-supplied approver decides, and a missing
//! approver denies. Routing is a pure function of [`ApprovalInput`], so the
//! only effect in this module is invoking the approver.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{
    ApprovalCategory, ApprovalMode, ApprovalQuery, ToolDescriptor, ToolUse,
};

/// Per-session approval state, persisted by the session approval store and
/// re-read before every decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionApprovalPolicy {
    pub approval_mode_override: Option<ApprovalMode>,
    pub pre_approved_tools: BTreeSet<String>,
}

impl SessionApprovalPolicy {
    pub fn is_pre_approved(&self, tool_name: &str) -> bool {
        self.pre_approved_tools.contains(tool_name)
    }
}

/// What happens to calls naming a tool that is not in the task's tool set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownToolPolicy {
    /// Approve unconditionally.
    #[default]
    Approve,
    /// Fall through to the session allow-list and the approver.
    Confirm,
}

/// Caller-side confirmation hook: `(tool_use, category) -> approved`.
pub type Approver<'a> = &'a mut dyn FnMut(&ToolUse, Option<ApprovalCategory>) -> bool;

/// Everything a decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalInput<'a> {
    pub tool_use: &'a ToolUse,
    /// Descriptor from the task's tool set, when the name is known.
    pub tool: Option<&'a ToolDescriptor>,
    pub mode: ApprovalMode,
    pub auto_approve_tools: bool,
    pub policy: &'a SessionApprovalPolicy,
    pub unknown_tools: UnknownToolPolicy,
    pub cwd: &'a Path,
}

impl ApprovalInput<'_> {
    fn category(&self) -> Option<ApprovalCategory> {
        self.tool.map(ToolDescriptor::category)
    }
}

/// Which rule settled a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalRule {
    AutoApproveTools,
    Yolo,
    UnknownTool,
    ReadOnly,
    NotRequired,
    AutoEdit,
    SessionAllowList,
    /// The approver answered.
    Approver,
    /// Nothing approved the call and no approver was supplied.
    NoApprover,
}

impl ApprovalRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoApproveTools => "auto_approve_tools",
            Self::Yolo => "yolo",
            Self::UnknownTool => "unknown_tool",
            Self::ReadOnly => "read_only",
            Self::NotRequired => "not_required",
            Self::AutoEdit => "auto_edit",
            Self::SessionAllowList => "session_allow_list",
            Self::Approver => "approver",
            Self::NoApprover => "no_approver",
        }
    }
}

impl fmt::Display for ApprovalRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type RulePredicate = fn(&ApprovalInput<'_>) -> bool;

/// Ordered approval rules; first match wins.
const RULES: &[(ApprovalRule, RulePredicate)] = &[
    (ApprovalRule::AutoApproveTools, auto_approve_tools),
    (ApprovalRule::Yolo, yolo),
    (ApprovalRule::UnknownTool, unknown_tool),
    (ApprovalRule::ReadOnly, read_only),
    (ApprovalRule::NotRequired, not_required),
    (ApprovalRule::AutoEdit, auto_edit),
    (ApprovalRule::SessionAllowList, session_allow_list),
];

fn auto_approve_tools(input: &ApprovalInput<'_>) -> bool {
    input.auto_approve_tools
}

fn yolo(input: &ApprovalInput<'_>) -> bool {
    input.mode == ApprovalMode::Yolo
}

fn unknown_tool(input: &ApprovalInput<'_>) -> bool {
    input.tool.is_none() && input.unknown_tools == UnknownToolPolicy::Approve
}

fn read_only(input: &ApprovalInput<'_>) -> bool {
    input.category() == Some(ApprovalCategory::Read)
}

fn not_required(input: &ApprovalInput<'_>) -> bool {
    let Some(tool) = input.tool else {
        return false;
    };
    let Some(predicate) = &tool.approval.needs_approval else {
        return false;
    };
    let query = ApprovalQuery {
        tool_name: &input.tool_use.name,
        params: &input.tool_use.params,
        mode: input.mode,
        cwd: input.cwd,
    };
    !predicate(&query)
}

fn auto_edit(input: &ApprovalInput<'_>) -> bool {
    input.category() == Some(ApprovalCategory::Write)
        && (input.policy.approval_mode_override == Some(ApprovalMode::AutoEdit)
            || input.mode == ApprovalMode::AutoEdit)
}

fn session_allow_list(input: &ApprovalInput<'_>) -> bool {
    input.policy.is_pre_approved(&input.tool_use.name)
}

/// Outcome of routing before any approver is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Approve {
        rule: ApprovalRule,
        /// Approver should still see the call; its answer is ignored.
        notify: bool,
    },
    NeedsConfirmation {
        category: Option<ApprovalCategory>,
    },
}

/// Pure routing over the ordered rule table.
pub fn route(input: &ApprovalInput<'_>) -> Routing {
    RULES
        .iter()
        .find(|(_, predicate)| predicate(input))
        .map_or(
            Routing::NeedsConfirmation {
                category: input.category(),
            },
            |&(rule, _)| Routing::Approve {
                rule,
                notify: rule == ApprovalRule::AutoApproveTools,
            },
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub rule: ApprovalRule,
}

/// Decide whether `input.tool_use` may execute.
pub fn decide(input: &ApprovalInput<'_>, approver: Option<Approver<'_>>) -> ApprovalDecision {
    let decision = match route(input) {
        Routing::Approve { rule, notify } => {
            if notify {
                if let Some(approver) = approver {
                    approver(input.tool_use, input.category());
                }
            }
            ApprovalDecision {
                approved: true,
                rule,
            }
        }
        Routing::NeedsConfirmation { category } => match approver {
            Some(approver) => ApprovalDecision {
                approved: approver(input.tool_use, category),
                rule: ApprovalRule::Approver,
            },
            None => ApprovalDecision {
                approved: false,
                rule: ApprovalRule::NoApprover,
            },
        },
    };
    debug!(
        tool = %input.tool_use.name,
        call_id = %input.tool_use.call_id,
        approved = decision.approved,
        rule = %decision.rule,
        "tool approval decided"
    );
    decision
}
