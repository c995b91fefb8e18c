//! Tool approval through the full task pipeline.

use std::cell::RefCell;

use conductor::callbacks::TaskCallbacks;
use conductor::core::types::{ApprovalCategory, ApprovalMode};
use conductor::io::tools::ToolCatalog;
use conductor::service::{AgentService, ServiceOptions};
use conductor::task::TaskRequest;
use conductor::test_support::{
    EngineStep, ScriptedEngine, StaticModelResolver, TestWorkspace, tool_use,
};
use serde_json::json;

fn service_with(
    workspace: &TestWorkspace,
    mode: ApprovalMode,
    steps: Vec<EngineStep>,
) -> AgentService<ScriptedEngine, ToolCatalog, StaticModelResolver> {
    let mut options = workspace.context_options();
    options.overrides.approval_mode = Some(mode);
    AgentService::open(
        ServiceOptions {
            context: options,
            session_id: None,
        },
        ScriptedEngine::new(steps),
        ToolCatalog::new(),
        StaticModelResolver::default(),
    )
    .expect("service")
}

fn call(name: &str) -> EngineStep {
    EngineStep::ToolCall(tool_use(name, json!({"path": "src/lib.rs"})))
}

fn approvals(
    service: &AgentService<ScriptedEngine, ToolCatalog, StaticModelResolver>,
) -> Vec<(String, bool)> {
    service.engine().approvals.borrow().clone()
}

#[test]
fn default_mode_without_approver_denies_writes_but_allows_reads() {
    let workspace = TestWorkspace::new();
    let mut service = service_with(
        &workspace,
        ApprovalMode::Default,
        vec![call("read"), call("edit"), call("bash")],
    );

    assert!(service.send("go", &mut TaskCallbacks::new()).is_success());
    assert_eq!(
        approvals(&service),
        vec![
            ("read".to_string(), true),
            ("edit".to_string(), false),
            ("bash".to_string(), false),
        ]
    );
}

#[test]
fn approver_sees_only_calls_no_rule_settled() {
    let workspace = TestWorkspace::new();
    let mut service = service_with(
        &workspace,
        ApprovalMode::Default,
        vec![
            call("read"),
            call("grep"),
            call("write"),
            EngineStep::ToolCall(tool_use("bash", json!({"command": "git status"}))),
        ],
    );

    let asked = RefCell::new(Vec::new());
    let mut callbacks = TaskCallbacks::new().on_tool_approve(|tool_use, category| {
        asked.borrow_mut().push((tool_use.name.clone(), category));
        true
    });
    assert!(service.send("go", &mut callbacks).is_success());
    drop(callbacks);

    assert_eq!(
        asked.into_inner(),
        vec![("write".to_string(), Some(ApprovalCategory::Write))]
    );
    assert!(approvals(&service).iter().all(|(_, approved)| *approved));
}

#[test]
fn yolo_approves_everything_without_an_approver() {
    let workspace = TestWorkspace::new();
    let mut service = service_with(
        &workspace,
        ApprovalMode::Yolo,
        vec![call("write"), call("bash"), call("not_a_tool")],
    );

    assert!(service.send("go", &mut TaskCallbacks::new()).is_success());
    assert!(approvals(&service).iter().all(|(_, approved)| *approved));
}

#[test]
fn auto_edit_mode_covers_write_tools_only() {
    let workspace = TestWorkspace::new();
    let mut service = service_with(
        &workspace,
        ApprovalMode::AutoEdit,
        vec![call("edit"), call("todo_write")],
    );

    assert!(service.send("go", &mut TaskCallbacks::new()).is_success());
    assert_eq!(
        approvals(&service),
        vec![("edit".to_string(), true), ("todo_write".to_string(), false)]
    );
}

#[test]
fn plan_tasks_auto_approve_and_still_notify_the_approver() {
    let workspace = TestWorkspace::new();
    let mut service = service_with(
        &workspace,
        ApprovalMode::Default,
        vec![call("read"), call("fetch")],
    );

    let notified = RefCell::new(0);
    let mut callbacks = TaskCallbacks::new().on_tool_approve(|_, _| {
        *notified.borrow_mut() += 1;
        false
    });
    let result = service.run(TaskRequest::plan("look around"), &mut callbacks);
    drop(callbacks);

    assert!(result.is_success());
    assert_eq!(notified.into_inner(), 2);
    assert!(approvals(&service).iter().all(|(_, approved)| *approved));
}

/// Policy edits made while a turn is running apply to the very next call.
#[test]
fn session_policy_is_reread_for_every_call() {
    let workspace = TestWorkspace::new();
    let mut service = service_with(
        &workspace,
        ApprovalMode::Default,
        vec![call("bash"), call("bash")],
    );
    let policy = service.policy().clone();

    let asked = RefCell::new(0);
    let mut callbacks = TaskCallbacks::new().on_tool_approve(|tool_use, _| {
        *asked.borrow_mut() += 1;
        policy.approve_tool(&tool_use.name).expect("approve for session");
        true
    });
    assert!(service.send("go", &mut callbacks).is_success());
    drop(callbacks);

    assert_eq!(asked.into_inner(), 1);
    assert_eq!(
        approvals(&service),
        vec![("bash".to_string(), true), ("bash".to_string(), true)]
    );
}

#[test]
fn session_mode_override_enables_auto_edit() {
    let workspace = TestWorkspace::new();
    let mut service = service_with(&workspace, ApprovalMode::Default, vec![call("write")]);
    service
        .policy()
        .set_mode_override(Some(ApprovalMode::AutoEdit))
        .expect("override");

    assert!(service.send("go", &mut TaskCallbacks::new()).is_success());
    assert_eq!(approvals(&service), vec![("write".to_string(), true)]);
    assert_eq!(service.history().len(), 1);
}

#[test]
fn bash_calls_that_write_or_spawn_programs_ask_the_approver() {
    let workspace = TestWorkspace::new();
    let bash = |command: &str| EngineStep::ToolCall(tool_use("bash", json!({"command": command})));
    let mut service = service_with(
        &workspace,
        ApprovalMode::Default,
        vec![
            bash("rg --pre ./payload.sh x"),
            bash("git diff --output=/tmp/clobbered"),
            bash("find . -fprint /tmp/clobbered"),
            bash("tail -n 5 notes.txt"),
        ],
    );

    let asked = RefCell::new(0);
    let mut callbacks = TaskCallbacks::new().on_tool_approve(|_, _| {
        *asked.borrow_mut() += 1;
        false
    });
    assert!(service.send("go", &mut callbacks).is_success());
    drop(callbacks);

    assert_eq!(asked.into_inner(), 3);
    assert_eq!(
        approvals(&service)
            .into_iter()
            .map(|(_, approved)| approved)
            .collect::<Vec<_>>(),
        vec![false, false, false, true]
    );
}
