//! End-to-end dialogue tests.
//!
//! Each test drives the engine turn by turn against the built-in actions,
//! an in-memory database and an in-memory context store. Classification
//! and general replies are stubbed so flows are deterministic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use docket_action::{
    ActionDefinition, ActionError, ActionRegistry, ActionResult, CandidateSource,
    CollectedFields, EntityCandidate, EntityKind, FetchTrigger, FieldSpec, RepositoryCandidates,
    TracingNotifier,
};
use docket_chat::{
    prompts, AgentSessionStore, ChatError, ConversationSession, DialogueEngine, EngineParts,
    GeneralReply, GeneralResponder, IntentClassification, IntentClassifier, TurnResponse,
};
use docket_core::config::DialogueConfig;
use docket_core::types::{AutoSource, HistoryMessage, TokenUsage, UserContext};
use docket_core::DocketError;
use docket_storage::{
    merge_context, ContextRecord, ContextStore, Database, InMemoryContextStore, NewCategory,
    TicketRepository, SESSION_KEY,
};

// =============================================================================
// Helpers
// =============================================================================

const CONV: &str = "conv-1";

struct StubClassifier {
    table: HashMap<&'static str, (&'static str, f64)>,
}

impl StubClassifier {
    fn new() -> Self {
        let table = HashMap::from([
            ("create a request form", ("CREATE_REQUEST_FORM", 0.95)),
            ("add a new category", ("CREATE_CATEGORY", 0.9)),
            ("raise a ticket please", ("CREATE_INTERNAL_TICKET", 0.9)),
            ("what about my ticket", ("CREATE_INTERNAL_TICKET", 0.5)),
            ("log a note", ("LOG_NOTE", 0.9)),
        ]);
        Self { table }
    }
}

#[async_trait]
impl IntentClassifier for StubClassifier {
    async fn classify(&self, message: &str) -> Result<IntentClassification, ChatError> {
        Ok(match self.table.get(message) {
            Some((intent, confidence)) => IntentClassification::new(*intent, *confidence),
            None => IntentClassification::general(),
        })
    }
}

struct StubResponder {
    calls: AtomicUsize,
}

#[async_trait]
impl GeneralResponder for StubResponder {
    async fn reply(
        &self,
        history: &[HistoryMessage],
        _context: &ContextRecord,
    ) -> Result<GeneralReply, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = history.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(GeneralReply {
            response: format!("general: {}", last),
            usage: Some(TokenUsage {
                input_tokens: 12,
                output_tokens: 5,
            }),
        })
    }
}

struct Harness {
    engine: DialogueEngine,
    repo: Arc<TicketRepository>,
    store: Arc<InMemoryContextStore>,
    responder: Arc<StubResponder>,
    user: UserContext,
}

impl Harness {
    fn new(role: &str) -> Self {
        Self::with_actions(role, |registry, repo| {
            registry.register_defaults(Arc::clone(repo), Arc::new(TracingNotifier));
        })
    }

    fn with_actions(
        role: &str,
        register: impl FnOnce(&mut ActionRegistry, &Arc<TicketRepository>),
    ) -> Self {
        let repo = Arc::new(TicketRepository::new(Arc::new(
            Database::in_memory().unwrap(),
        )));
        let mut registry = ActionRegistry::new();
        register(&mut registry, &repo);
        let store = Arc::new(InMemoryContextStore::new());
        let responder = Arc::new(StubResponder {
            calls: AtomicUsize::new(0),
        });

        let engine = DialogueEngine::new(
            EngineParts {
                registry: Arc::new(registry),
                context_store: store.clone(),
                candidates: Arc::new(RepositoryCandidates::new(Arc::clone(&repo))),
                classifier: Arc::new(StubClassifier::new()),
                responder: responder.clone(),
            },
            DialogueConfig::default(),
        );

        Self {
            engine,
            repo,
            store,
            responder,
            user: UserContext {
                role: role.to_string(),
                ..admin()
            },
        }
    }

    async fn say(&self, message: &str) -> TurnResponse {
        self.engine
            .handle_turn(
                CONV,
                message,
                &[HistoryMessage::user(message)],
                &ContextRecord::new(),
                &self.user,
            )
            .await
            .unwrap()
    }

    async fn session(&self) -> Option<Value> {
        self.store
            .load(CONV)
            .await
            .unwrap()
            .and_then(|record| record.get(SESSION_KEY).cloned())
    }

    fn seed_category(&self, name: &str) -> docket_storage::Category {
        let team = self.repo.create_team("org-a", "Legal Team").unwrap();
        self.repo
            .create_category(NewCategory {
                organization_id: "org-a".to_string(),
                name: name.to_string(),
                assigned_team_id: Some(team.id),
                auto_reply_enabled: false,
                auto_reply_message: None,
                created_by: "u-0".to_string(),
            })
            .unwrap()
    }
}

fn admin() -> UserContext {
    UserContext {
        user_id: "u-1".to_string(),
        organization_id: "org-a".to_string(),
        email: "ada@example.com".to_string(),
        name: "Ada".to_string(),
        role: "admin".to_string(),
    }
}

/// Engine over the built-in actions with the given store and candidates.
fn engine_with(
    store: Arc<dyn ContextStore>,
    candidates: Arc<dyn CandidateSource>,
) -> DialogueEngine {
    let repo = Arc::new(TicketRepository::new(Arc::new(
        Database::in_memory().unwrap(),
    )));
    let mut registry = ActionRegistry::new();
    registry.register_defaults(repo, Arc::new(TracingNotifier));
    DialogueEngine::new(
        EngineParts {
            registry: Arc::new(registry),
            context_store: store,
            candidates,
            classifier: Arc::new(StubClassifier::new()),
            responder: Arc::new(StubResponder {
                calls: AtomicUsize::new(0),
            }),
        },
        DialogueConfig::default(),
    )
}

/// Context store whose backend is down.
struct UnavailableStore;

#[async_trait]
impl ContextStore for UnavailableStore {
    async fn load(&self, _conversation_id: &str) -> Result<Option<ContextRecord>, DocketError> {
        Err(DocketError::Storage("connection refused".to_string()))
    }

    async fn store(
        &self,
        _conversation_id: &str,
        _record: ContextRecord,
    ) -> Result<(), DocketError> {
        Err(DocketError::Storage("connection refused".to_string()))
    }
}

/// Candidate source whose lookups always fail.
struct UnavailableCandidates;

#[async_trait]
impl CandidateSource for UnavailableCandidates {
    async fn fetch_candidates(
        &self,
        kind: EntityKind,
        _organization_id: &str,
    ) -> Result<Vec<EntityCandidate>, ActionError> {
        Err(ActionError::CandidateFetch(format!("{} lookup timed out", kind)))
    }
}

/// Note with an optional team, resolved once the title is known.
struct LogNote {
    schema: Vec<FieldSpec>,
}

impl LogNote {
    fn new() -> Self {
        Self {
            schema: vec![
                FieldSpec::required("title", "Name", "Name?"),
                FieldSpec::resolved(
                    "teamId",
                    "Team",
                    "Which team?",
                    false,
                    EntityKind::Team,
                    FetchTrigger::AfterField("title"),
                ),
                FieldSpec::optional("tags", "Tags", "Tags?"),
                FieldSpec::auto("organizationId", "Organization", AutoSource::OrganizationId),
            ],
        }
    }
}

#[async_trait]
impl ActionDefinition for LogNote {
    fn id(&self) -> &'static str {
        "LOG_NOTE"
    }

    fn label(&self) -> &'static str {
        "log a note"
    }

    fn field_schema(&self) -> &[FieldSpec] {
        &self.schema
    }

    async fn execute(
        &self,
        fields: &CollectedFields,
        _user: &UserContext,
    ) -> Result<ActionResult, ActionError> {
        Ok(ActionResult::Success(json!({ "fields": fields.len() })))
    }

    fn render_success(&self, _data: &Value) -> String {
        "✅ Note logged.".to_string()
    }
}

const FORM_NAME_PROMPT: &str = "*(required)* What would you like to name this request form?";
const FORM_AUTO_REPLY_PROMPT: &str = "*(optional)* Enable auto-reply for submissions? (yes/no)";

/// Walk a request form flow up to its confirmation summary.
async fn request_form_to_summary(h: &Harness) -> TurnResponse {
    h.say("create a request form").await;
    h.say("NDA Intake").await;
    h.say("").await;
    h.say("").await;
    h.say("no").await
}

// =============================================================================
// Request form
// =============================================================================

#[tokio::test]
async fn test_request_form_full_flow() {
    let h = Harness::new("admin");

    let r = h.say("create a request form").await;
    assert!(r.is_agent_flow);
    assert_eq!(
        r.response,
        format!(
            "Sure! I can help you create a Request Form.\n\n**I'll ask you for:**\n• Form Name\n\n**Auto-filled from your account:**\n• Organization: org-a\n• Created By: u-1\n\nLet's start!\n\n{}",
            FORM_NAME_PROMPT
        )
    );

    let r = h.say("NDA Intake").await;
    assert_eq!(
        r.response,
        "*(optional)* Add tags for this form? (comma-separated e.g: legal, NDA, contract)"
    );

    let r = h.say("").await;
    assert_eq!(r.response, "*(optional)* Provide a description for this form?");

    let r = h.say("").await;
    assert_eq!(r.response, FORM_AUTO_REPLY_PROMPT);

    let r = h.say("maybe").await;
    assert_eq!(
        r.response,
        format!(
            "⚠️ Please answer yes or no.\n\nPlease try again:\n{}",
            FORM_AUTO_REPLY_PROMPT
        )
    );

    // "no" turns off the auto-reply message question.
    let r = h.say("no").await;
    assert_eq!(
        r.response,
        "📋 **Summary before proceeding:**\n\n- **Form Name:** NDA Intake\n\n🤖 **Auto-filled from your account:**\n- **Organization:** org-a\n- **Created By:** u-1\n\nShall I proceed? (yes/no)"
    );
    let session = h.session().await.unwrap();
    assert_eq!(session["state"]["kind"], "AWAITING_CONFIRMATION");
    assert_eq!(session["collectedFields"]["autoReplyMessage"], json!(null));

    let r = h.say("yes").await;
    assert!(r.is_agent_flow);
    assert_eq!(
        r.response,
        "✅ Request Form created!\n- **Name:** NDA Intake\n- **Slug:** nda-intake\n- **Public URL:** /request/nda-intake\n\nIs there anything else I can help you with?"
    );
    assert!(h.session().await.is_none());
    assert!(h.repo.slug_exists("nda-intake").unwrap());
}

#[tokio::test]
async fn test_skipping_required_field_repeats_prompt() {
    let h = Harness::new("admin");
    h.say("create a request form").await;

    let first = h.say("").await;
    let second = h.say("   ").await;
    assert_eq!(first.response, FORM_NAME_PROMPT);
    assert_eq!(second.response, FORM_NAME_PROMPT);
    assert!(first.is_agent_flow);

    let session = h.session().await.unwrap();
    assert_eq!(session["currentFieldIndex"], 0);
    assert!(session["collectedFields"].get("name").is_none());
}

#[tokio::test]
async fn test_auto_reply_message_asked_when_enabled() {
    let h = Harness::new("owner");
    h.say("create a request form").await;
    h.say("Vendor Contracts").await;
    h.say("vendor, contract").await;
    h.say("Intake for vendor contracts").await;

    let r = h.say("Y").await;
    assert_eq!(r.response, "*(optional)* What should the auto-reply message say?");

    let r = h.say("We got it.").await;
    assert!(r.response.contains("- **Tags:** vendor, contract"));
    assert!(r.response.contains("- **Auto Reply:** Y"));
    assert!(r.response.contains("- **Auto Reply Message:** We got it."));
}

#[tokio::test]
async fn test_declining_confirmation_creates_nothing() {
    let h = Harness::new("admin");
    request_form_to_summary(&h).await;

    let r = h.say("not now").await;
    assert_eq!(r.response, prompts::DECLINED);
    assert!(r.is_agent_flow);
    assert!(h.session().await.is_none());
    assert!(!h.repo.slug_exists("nda-intake").unwrap());
}

#[tokio::test]
async fn test_role_denied_starts_no_flow() {
    let h = Harness::new("member");

    let r = h.say("create a request form").await;
    assert!(!r.is_agent_flow);
    assert!(r.response.starts_with("🚫 **Access Denied**"));
    assert!(r.response.contains("permission to create Request Forms"));
    assert!(r.response.contains("- **Your role:** member"));
    assert!(r.response.contains("- **Required roles:** admin, owner, legal"));
    assert!(h.session().await.is_none());
}

// =============================================================================
// Category
// =============================================================================

#[tokio::test]
async fn test_category_flow_with_team_selection() {
    let h = Harness::new("Legal");
    h.repo.create_team("org-a", "Legal Team").unwrap();
    let compliance = h.repo.create_team("org-a", "Compliance Team").unwrap();

    let r = h.say("add a new category").await;
    assert!(r.response.ends_with("*(required)* What is the name of this category?"));

    let list = "1. Compliance Team\n2. Legal Team";
    let r = h.say("Contracts").await;
    assert_eq!(
        r.response,
        format!(
            "Please select a team to assign this category to (can not be skipped):\n\n{}",
            list
        )
    );
    assert_eq!(
        h.session().await.unwrap()["state"]["kind"],
        "AWAITING_ENTITY_SELECTION"
    );

    let retry = format!(
        "⚠️ Could not find that team. Please pick by name or number:\n\n{}",
        list
    );
    assert_eq!(h.say("7").await.response, retry);
    assert_eq!(h.say("").await.response, retry);

    let r = h.say("1").await;
    assert_eq!(
        r.response,
        "Great! Team set to **Compliance Team**.\n\n*(optional)* Enable auto-reply for this category? (yes/no)"
    );

    assert_eq!(
        h.say("yes").await.response,
        "*(optional)* What should the auto-reply message say?"
    );

    let r = h.say("Thanks, we received your request.").await;
    assert!(r.response.contains("- **Category Name:** Contracts"));
    assert!(r.response.contains("- **Assigned Team:** Compliance Team"));
    assert!(r
        .response
        .contains("- **Auto Reply Message:** Thanks, we received your request."));

    let r = h.say("y").await;
    assert!(r.response.starts_with("✅ Category created!\n- **Name:** Contracts"));

    let category = h
        .repo
        .find_category_by_name("org-a", "Contracts")
        .unwrap()
        .unwrap();
    assert_eq!(category.assigned_team_id, Some(compliance.id));
    assert!(category.auto_reply_enabled);
    assert!(h.session().await.is_none());
}

#[tokio::test]
async fn test_category_without_teams_skips_assignment() {
    let h = Harness::new("admin");
    h.say("add a new category").await;

    let r = h.say("Contracts").await;
    assert_eq!(
        r.response,
        "No teams found in your organization, skipping team assignment.\n\n*(optional)* Enable auto-reply for this category? (yes/no)"
    );
    let session = h.session().await.unwrap();
    assert_eq!(session["collectedFields"]["assignedTeamId"], json!(null));

    let r = h.say("").await;
    assert!(!r.response.contains("Assigned Team"));
    let r = h.say("yes").await;
    assert!(r.response.starts_with("✅ Category created!"));
}

#[tokio::test]
async fn test_duplicate_category_fails_and_clears_session() {
    let h = Harness::new("admin");
    h.seed_category("Contracts");

    h.say("add a new category").await;
    h.say("Contracts").await;
    h.say("Legal Team").await;
    h.say("").await;

    let r = h.say("yes").await;
    assert!(r.is_agent_flow);
    assert_eq!(
        r.response,
        "❌ Failed: Category with this name already exists in the organization\n\nWould you like to try again?"
    );
    assert!(h.session().await.is_none());
}

// =============================================================================
// Internal ticket
// =============================================================================

#[tokio::test]
async fn test_internal_ticket_by_name_then_inactive_category_fails() {
    let h = Harness::new("member");
    let category = h.seed_category("NDA Management");

    let r = h.say("raise a ticket please").await;
    assert!(r.response.starts_with("Sure! I can help you raise an Internal Ticket."));
    assert!(r
        .response
        .ends_with("Let's start!\n\nPlease select a category by name or number:\n\n1. NDA Management"));

    let r = h.say("  nda management ").await;
    assert_eq!(
        r.response,
        "Great! Category set to **NDA Management**.\n\n*(required)* Please describe the issue in detail."
    );

    let r = h.say("short").await;
    assert!(r
        .response
        .starts_with("⚠️ Description must be at least 10 characters."));

    let r = h.say("Please review the supplier NDA draft").await;
    assert_eq!(
        r.response,
        "*(optional)* What is the objective or expected outcome?"
    );
    h.say("").await;

    let r = h.say("").await;
    assert!(r.response.contains("- **Category:** NDA Management"));
    assert!(r
        .response
        .contains("- **Description:** Please review the supplier NDA draft"));
    assert!(r.response.contains("- **Your Name:** Ada"));
    assert!(r.response.contains("- **Your Email:** ada@example.com"));

    h.repo.set_category_active(&category.id, false).unwrap();

    let r = h.say("yes").await;
    assert_eq!(
        r.response,
        "❌ Failed: Invalid or inactive category\n\nWould you like to try again?"
    );
    assert!(h.session().await.is_none());

    // The conversation is back to normal chat.
    let r = h.say("hello there").await;
    assert!(!r.is_agent_flow);
    assert_eq!(r.response, "general: hello there");
}

#[tokio::test]
async fn test_internal_ticket_created() {
    let h = Harness::new("member");
    h.seed_category("NDA Management");

    h.say("raise a ticket please").await;
    h.say("1").await;
    h.say("Please review the supplier NDA draft").await;
    h.say("Sign before Friday").await;
    h.say("").await;

    let r = h.say("yes").await;
    assert!(r.response.starts_with("✅ Ticket raised!\n- **Ticket ID:** "));
    let tickets = h.repo.list_tickets("org-a").unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].email, "ada@example.com");
    assert_eq!(tickets[0].objective.as_deref(), Some("Sign before Friday"));
}

#[tokio::test]
async fn test_internal_ticket_without_categories() {
    let h = Harness::new("member");

    let r = h.say("raise a ticket please").await;
    assert!(r.is_agent_flow);
    assert_eq!(
        r.response,
        "⚠️ No active categories found for your organization. Please create a category first."
    );
    assert!(h.session().await.is_none());
}

// =============================================================================
// Cancellation, general replies and context
// =============================================================================

#[tokio::test]
async fn test_cancel_keyword_mid_flow() {
    let h = Harness::new("admin");
    h.say("create a request form").await;

    let r = h.say("Never Mind").await;
    assert!(!r.is_agent_flow);
    assert_eq!(r.response, prompts::CANCELLED);
    assert!(h.session().await.is_none());
    assert_eq!(h.responder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_general_reply_carries_usage() {
    let h = Harness::new("admin");

    let r = h.say("What is an indemnity clause?").await;
    assert!(!r.is_agent_flow);
    assert_eq!(r.response, "general: What is an indemnity clause?");
    assert_eq!(
        r.usage,
        Some(TokenUsage {
            input_tokens: 12,
            output_tokens: 5
        })
    );
    assert!(h.session().await.is_none());
}

#[tokio::test]
async fn test_low_confidence_intent_goes_to_general_reply() {
    let h = Harness::new("member");
    h.seed_category("NDA Management");

    let r = h.say("what about my ticket").await;
    assert!(!r.is_agent_flow);
    assert_eq!(h.responder.calls.load(Ordering::SeqCst), 1);
    assert!(h.session().await.is_none());
}

#[tokio::test]
async fn test_message_too_long_is_rejected() {
    let h = Harness::new("admin");
    let long = "a".repeat(4001);

    let err = h
        .engine
        .handle_turn(CONV, &long, &[], &ContextRecord::new(), &h.user)
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::MessageTooLong(4000)));
}

#[tokio::test]
async fn test_sibling_context_keys_survive_flow() {
    let h = Harness::new("admin");
    let mut updates = ContextRecord::new();
    updates.insert("legalTopic".to_string(), json!("contracts"));
    merge_context(h.store.as_ref(), CONV, updates).await.unwrap();

    h.say("create a request form").await;
    let record = h.store.load(CONV).await.unwrap().unwrap();
    assert_eq!(record["legalTopic"], "contracts");
    assert!(record.contains_key(SESSION_KEY));

    h.say("cancel").await;
    let record = h.store.load(CONV).await.unwrap().unwrap();
    assert_eq!(record["legalTopic"], "contracts");
    assert!(!record.contains_key(SESSION_KEY));
}

#[tokio::test]
async fn test_session_for_unknown_action_is_dropped() {
    let h = Harness::new("admin");
    let sessions = AgentSessionStore::new(h.store.clone());
    sessions
        .save(CONV, &ConversationSession::new("ARCHIVE_TICKETS", h.user.clone()))
        .await
        .unwrap();

    let r = h.say("hello").await;
    assert_eq!(r.response, "general: hello");
    assert!(h.session().await.is_none());
}

#[tokio::test]
async fn test_conversations_are_independent() {
    let h = Harness::new("admin");
    h.say("create a request form").await;

    let other = h
        .engine
        .handle_turn(
            "conv-2",
            "hi",
            &[HistoryMessage::user("hi")],
            &ContextRecord::new(),
            &h.user,
        )
        .await
        .unwrap();
    assert_eq!(other.response, "general: hi");
    assert!(h.session().await.is_some());
}

// =============================================================================
// Optional entity selection
// =============================================================================

#[tokio::test]
async fn test_optional_team_can_be_skipped() {
    let h = Harness::with_actions("member", |registry, _repo| {
        registry.register(Arc::new(LogNote::new()));
    });
    h.repo.create_team("org-a", "Legal Team").unwrap();

    let r = h.say("log a note").await;
    assert!(r.response.ends_with("*(required)* Name?"));

    let r = h.say("Legal Review").await;
    assert_eq!(r.response, "Which team?\n\n1. Legal Team");

    let r = h.say("").await;
    assert_eq!(r.response, "Skipped team assignment.\n\n*(optional)* Tags?");
    let session = h.session().await.unwrap();
    assert_eq!(session["collectedFields"]["teamId"], json!(null));
    assert_eq!(session["collectedFields"]["_teamName"], json!(null));
    assert_eq!(session["currentFieldIndex"], json!(2));

    let r = h.say("").await;
    assert!(r.response.contains("- **Name:** Legal Review"));
    assert!(!r.response.contains("Team"));
    assert!(!r.response.contains("Tags"));

    let r = h.say("yes").await;
    assert!(r.response.starts_with("✅ Note logged."));
    assert!(h.session().await.is_none());
}

// =============================================================================
// Infrastructure failures
// =============================================================================

#[tokio::test]
async fn test_context_store_failure_is_returned() {
    let engine = engine_with(Arc::new(UnavailableStore), Arc::new(UnavailableCandidates));

    let result = engine
        .handle_turn(
            CONV,
            "hello",
            &[HistoryMessage::user("hello")],
            &ContextRecord::new(),
            &admin(),
        )
        .await;
    match result {
        Err(ChatError::StorageError(msg)) => assert!(msg.contains("connection refused")),
        other => panic!("expected storage error, got {:?}", other),
    }
    assert_eq!(engine.active_turn_locks(), 0);
}

#[tokio::test]
async fn test_failed_upfront_fetch_starts_no_flow() {
    let store = Arc::new(InMemoryContextStore::new());
    let engine = engine_with(store.clone(), Arc::new(UnavailableCandidates));

    let result = engine
        .handle_turn(
            CONV,
            "raise a ticket please",
            &[HistoryMessage::user("raise a ticket please")],
            &ContextRecord::new(),
            &admin(),
        )
        .await;
    match result {
        Err(ChatError::ActionError(msg)) => assert!(msg.contains("category lookup timed out")),
        other => panic!("expected action error, got {:?}", other),
    }
    let record = store.load(CONV).await.unwrap().unwrap_or_default();
    assert!(!record.contains_key(SESSION_KEY));
}

#[tokio::test]
async fn test_failed_team_fetch_leaves_session_at_last_prompt() {
    let store = Arc::new(InMemoryContextStore::new());
    let engine = engine_with(store.clone(), Arc::new(UnavailableCandidates));
    let user = admin();
    let context = ContextRecord::new();

    let r = engine
        .handle_turn(CONV, "add a new category", &[], &context, &user)
        .await
        .unwrap();
    assert!(r.response.ends_with("*(required)* What is the name of this category?"));

    let result = engine
        .handle_turn(CONV, "Contracts", &[], &context, &user)
        .await;
    assert!(matches!(result, Err(ChatError::ActionError(_))));

    let record = store.load(CONV).await.unwrap().unwrap();
    let session = &record[SESSION_KEY];
    assert_eq!(session["currentFieldIndex"], json!(0));
    assert_eq!(session["state"]["kind"], "COLLECTING");
    assert!(session["collectedFields"].get("name").is_none());
}

// =============================================================================
// Turn locks
// =============================================================================

#[tokio::test]
async fn test_turn_locks_released_after_one_off_conversations() {
    let h = Harness::new("admin");

    for i in 0..200 {
        let id = format!("one-off-{}", i);
        h.engine
            .handle_turn(
                &id,
                "hi",
                &[HistoryMessage::user("hi")],
                &ContextRecord::new(),
                &h.user,
            )
            .await
            .unwrap();
    }
    assert_eq!(h.engine.active_turn_locks(), 0);
}

#[tokio::test]
async fn test_turn_locks_released_after_overlapping_turns() {
    let h = Harness::new("admin");

    let (a, b) = tokio::join!(h.say("create a request form"), h.say("hello"));
    assert!(a.is_agent_flow);
    assert!(!b.response.is_empty());
    assert_eq!(h.engine.active_turn_locks(), 0);

    // Mid-flow conversations keep their session but not their lock.
    assert!(h.session().await.is_some());
    h.say("NDA Intake").await;
    assert_eq!(h.engine.active_turn_locks(), 0);
}
