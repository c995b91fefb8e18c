//! Branching from earlier messages of a committed session.

use conductor::callbacks::TaskCallbacks;
use conductor::core::types::{FailureStage, TaskResult};
use conductor::io::approval_store::FilePolicyStore;
use conductor::io::message_log::JsonlMessageLog;
use conductor::io::session_store::{FileSessionStore, SessionStore};
use conductor::io::tools::ToolCatalog;
use conductor::task::{Collaborators, TaskRequest, execute_task};
use conductor::test_support::{
    MemoryRequestLog, ScriptedEngine, StaticModelResolver, TestWorkspace, chain,
};

struct Fixture {
    workspace: TestWorkspace,
    session: FileSessionStore,
}

impl Fixture {
    /// Session whose committed history is `m1 -> m2 -> m3`.
    fn new() -> Self {
        let workspace = TestWorkspace::new();
        let mut session =
            FileSessionStore::open_or_create(&workspace.paths(), "branchy").expect("session");
        session
            .replace_history(chain(&["m1", "m2", "m3"]))
            .expect("seed history");
        Self { workspace, session }
    }

    fn run(&mut self, request: TaskRequest, engine: &ScriptedEngine) -> TaskResult {
        let context = self.workspace.context();
        let mut message_log = JsonlMessageLog::new(context.paths.clone());
        let mut request_log = MemoryRequestLog::default();
        let policy =
            FilePolicyStore::for_session(&context.paths, self.session.id()).expect("policy");
        execute_task(
            request,
            &context,
            &mut self.session,
            Collaborators {
                engine,
                tools: &ToolCatalog::new(),
                models: &StaticModelResolver::default(),
                message_log: &mut message_log,
                request_log: &mut request_log,
                policy: &policy,
            },
            &mut TaskCallbacks::new(),
        )
    }
}

fn ids(messages: &[conductor::core::types::Message]) -> Vec<&str> {
    messages.iter().map(|m| m.uuid.as_str()).collect()
}

#[test]
fn branch_at_middle_message_feeds_prefix_plus_new_message() {
    let mut fixture = Fixture::new();
    let engine = ScriptedEngine::reply("branched");

    let result = fixture.run(TaskRequest::send("try again").with_parent("m2"), &engine);
    assert!(result.is_success(), "{result:?}");

    let input = engine.last_request().expect("request").input;
    assert_eq!(input.len(), 3);
    assert_eq!(ids(&input[..2]), vec!["m1", "m2"]);
    assert_eq!(input[2].parent_uuid.as_deref(), Some("m2"));
}

#[test]
fn committed_branch_replaces_path_but_keeps_old_branch_reachable() {
    let mut fixture = Fixture::new();
    let engine = ScriptedEngine::reply("branched");

    let result = fixture.run(TaskRequest::send("try again").with_parent("m2"), &engine);
    let TaskResult::Success { data, .. } = result else {
        panic!("expected success");
    };

    let committed = fixture.session.history().messages();
    assert_eq!(committed, data.history);
    assert_eq!(ids(&committed[..2]), vec!["m1", "m2"]);
    assert!(!ids(&committed).contains(&"m3"));

    let old = fixture
        .session
        .history()
        .messages_up_to("m3")
        .expect("old branch");
    assert_eq!(ids(&old), vec!["m1", "m2", "m3"]);

    let reopened =
        FileSessionStore::open(&fixture.workspace.paths(), "branchy").expect("reopen");
    assert_eq!(reopened.history(), fixture.session.history());
}

#[test]
fn branching_from_an_abandoned_branch_still_works() {
    let mut fixture = Fixture::new();
    let first = ScriptedEngine::reply("branch one");
    assert!(
        fixture
            .run(TaskRequest::send("a").with_parent("m1"), &first)
            .is_success()
    );

    let second = ScriptedEngine::reply("back to m3");
    let result = fixture.run(TaskRequest::send("b").with_parent("m3"), &second);
    assert!(result.is_success(), "{result:?}");

    let input = second.last_request().expect("request").input;
    assert_eq!(ids(&input[..3]), vec!["m1", "m2", "m3"]);
    assert_eq!(input[3].parent_uuid.as_deref(), Some("m3"));
}

#[test]
fn unknown_branch_point_is_a_preflight_error() {
    let mut fixture = Fixture::new();
    let engine = ScriptedEngine::reply("never");
    let before = fixture.session.history().clone();

    let result = fixture.run(TaskRequest::send("x").with_parent("ghost"), &engine);

    let error = result.error().expect("failure");
    assert_eq!(error.stage, FailureStage::Preflight);
    assert!(error.message.contains("ghost"));
    assert_eq!(engine.run_count(), 0);
    assert_eq!(fixture.session.history(), &before);
}

#[test]
fn null_message_replays_the_selected_prefix() {
    let mut fixture = Fixture::new();
    let engine = ScriptedEngine::reply("regenerated");

    let mut request = TaskRequest::send("unused").with_parent("m2");
    request.message = None;
    let result = fixture.run(request, &engine);
    assert!(result.is_success(), "{result:?}");

    let input = engine.last_request().expect("request").input;
    assert_eq!(ids(&input), vec!["m1", "m2"]);
}
