#![cfg(test)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth;
use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::models::agency::{Agency, AgencyProfileForm, MonthlyCounter};
use crate::models::contact::ContactMessage;
use crate::models::message::Message;
use crate::models::plan::{Plan, PlanForm};
use crate::models::project::{Project, ProjectFilters, ProjectForm};
use crate::models::response::ProjectResponse;
use crate::models::reveal::IdentityReveal;
use crate::models::review::Review;
use crate::models::settings::Setting;
use crate::models::ticket::{Ticket, TicketResponse};
use crate::models::user_override::{OverrideForm, UserOverride};
use crate::plans::{self, LimitAction};
use crate::rate_limit::RateLimiter;

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Create a fresh in-memory SQLite pool with all migrations + seed defaults
/// applied. Uses a named shared-cache in-memory DB so multiple connections see
/// the same data. Pre-seeds the admin account with a fast bcrypt hash to avoid
/// the expensive DEFAULT_COST hash in seed_defaults.
fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri);
    let pool = Pool::builder()
        .max_size(2)
        .build(manager)
        .expect("Failed to create test pool");
    {
        let conn = pool.get().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    }
    run_migrations(&pool).expect("Failed to run migrations");
    {
        let conn = pool.get().unwrap();
        let fast = bcrypt::hash("admin123", 4).unwrap();
        conn.execute(
            "INSERT INTO admin_users (email, password_hash) VALUES ('admin@minerva.com', ?1)",
            rusqlite::params![fast],
        )
        .unwrap();
    }
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

fn profile(name: &str) -> AgencyProfileForm {
    AgencyProfileForm {
        agency_name: name.to_string(),
        contact_name: "Contact".to_string(),
        website: None,
        location: None,
        description: None,
        skills: None,
        platforms: Some("google_ads,meta".to_string()),
        verticals: None,
        certifications: None,
    }
}

fn make_agency(pool: &DbPool, name: &str, email: &str, tier: &str, status: &str) -> i64 {
    let id = Agency::create(pool, &profile(name), email, "x").unwrap();
    Agency::update_status(pool, id, status).unwrap();
    if tier != "free" {
        Agency::update_subscription(pool, id, tier).unwrap();
    }
    id
}

fn project_form(title: &str, hide_identity: bool) -> ProjectForm {
    ProjectForm {
        title: title.to_string(),
        description: "Need a partner agency".to_string(),
        project_type: "collaboration".to_string(),
        platforms_involved: Some("google_ads".to_string()),
        budget_range: Some("$1k-$5k".to_string()),
        deadline: None,
        hide_identity: Some(hide_identity),
    }
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let pool = test_pool();
    Setting::set(&pool, "test_key", "hello").unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("hello".to_string()));
    assert_eq!(Setting::get_or(&pool, "missing", "fallback"), "fallback");
}

#[test]
fn settings_seeded_numbers() {
    let pool = test_pool();
    assert_eq!(Setting::get_i64(&pool, "login_rate_limit"), 5);
    assert_eq!(Setting::get_i64(&pool, "session_expiry_hours"), 168);
    assert_eq!(Setting::get_i64(&pool, "not_a_key"), 0);
}

// ═══════════════════════════════════════════════════════════
// Plans
// ═══════════════════════════════════════════════════════════

#[test]
fn stock_plans_seeded() {
    let pool = test_pool();
    let plans = Plan::list_active(&pool);
    assert_eq!(plans.len(), 3);

    let free = Plan::find_by_name(&pool, "Free").unwrap();
    assert!(free.is_default);
    assert_eq!(free.max_projects, 2);
    assert_eq!(free.max_responses, 5);

    let premium = Plan::find_by_name(&pool, "Premium").unwrap();
    assert_eq!(premium.max_projects, -1);
}

#[test]
fn plan_lookup_ignores_tier_case() {
    let pool = test_pool();
    // Agency rows store the tier lowercase; plan names are capitalized.
    let plan = Plan::find_by_name(&pool, "premium").unwrap();
    assert_eq!(plan.name, "Premium");
}

#[test]
fn default_plan_is_free() {
    let pool = test_pool();
    assert_eq!(Plan::default_plan(&pool).unwrap().name, "Free");
}

#[test]
fn plan_crud() {
    let pool = test_pool();
    let form = PlanForm {
        name: "Agency Plus".to_string(),
        max_projects: 20,
        max_responses: 60,
        max_collabs: 10,
        max_messages: 200,
        highlight_label: Some("Plus".to_string()),
        highlight_badge_color: Some("#00ff00".to_string()),
        price: 99.0,
        description: None,
        is_default: None,
    };
    let id = Plan::create(&pool, &form).unwrap();
    assert_eq!(Plan::find_by_id(&pool, id).unwrap().max_projects, 20);

    Plan::set_active(&pool, id, false).unwrap();
    assert!(Plan::list_active(&pool).iter().all(|p| p.id != id));
    assert!(Plan::list_all(&pool).iter().any(|p| p.id == id));
}

// ═══════════════════════════════════════════════════════════
// Effective limits
// ═══════════════════════════════════════════════════════════

#[test]
fn limits_without_override_match_plan_exactly() {
    let pool = test_pool();
    let id = make_agency(&pool, "Acme", "acme@example.com", "pro", "approved");

    let limits = plans::effective_limits(&pool, id).unwrap();
    let plan = Plan::find_by_name(&pool, "Pro").unwrap();
    assert!(!limits.is_override);
    assert_eq!(limits.plan_name, "Pro");
    assert_eq!(limits.max_projects, plan.max_projects);
    assert_eq!(limits.max_responses, plan.max_responses);
    assert_eq!(limits.max_collabs, plan.max_collabs);
    assert_eq!(limits.max_messages, plan.max_messages);
    assert_eq!(limits.badge_label, plan.highlight_label);
    assert_eq!(limits.badge_color, plan.highlight_badge_color);
}

#[test]
fn override_fields_replace_plan_field_by_field() {
    let pool = test_pool();
    let id = make_agency(&pool, "Acme", "acme@example.com", "free", "approved");

    UserOverride::upsert(
        &pool,
        id,
        &OverrideForm {
            override_plan_id: None,
            custom_max_projects: Some(7),
            custom_max_responses: None,
            custom_max_messages: Some(-1),
            custom_max_collabs: None,
            custom_badge_label: Some("VIP".to_string()),
            custom_badge_color: None,
            admin_notes: None,
            expiration_date: None,
            is_permanent: Some(true),
        },
    )
    .unwrap();

    let limits = plans::effective_limits(&pool, id).unwrap();
    let free = Plan::find_by_name(&pool, "Free").unwrap();
    assert!(limits.is_override);
    assert_eq!(limits.max_projects, 7);
    assert_eq!(limits.max_responses, free.max_responses); // null falls back
    assert_eq!(limits.max_messages, -1);
    assert_eq!(limits.max_collabs, free.max_collabs);
    assert_eq!(limits.badge_label, Some("VIP".to_string()));
}

#[test]
fn override_plan_pointer_changes_base_plan() {
    let pool = test_pool();
    let id = make_agency(&pool, "Acme", "acme@example.com", "free", "approved");
    let pro = Plan::find_by_name(&pool, "Pro").unwrap();

    UserOverride::upsert(
        &pool,
        id,
        &OverrideForm {
            override_plan_id: Some(pro.id),
            custom_max_projects: None,
            custom_max_responses: Some(3),
            custom_max_messages: None,
            custom_max_collabs: None,
            custom_badge_label: None,
            custom_badge_color: None,
            admin_notes: None,
            expiration_date: None,
            is_permanent: Some(true),
        },
    )
    .unwrap();

    let limits = plans::effective_limits(&pool, id).unwrap();
    assert_eq!(limits.plan_name, "Pro");
    assert_eq!(limits.max_projects, pro.max_projects); // from the pointed plan
    assert_eq!(limits.max_responses, 3); // custom wins over pointed plan
    assert_eq!(limits.badge_label, pro.highlight_label);
}

#[test]
fn dangling_override_plan_pointer_falls_back_to_tier_plan() {
    let pool = test_pool();
    let id = make_agency(&pool, "Acme", "acme@example.com", "pro", "approved");

    UserOverride::upsert(
        &pool,
        id,
        &OverrideForm {
            override_plan_id: None,
            custom_max_projects: None,
            custom_max_responses: None,
            custom_max_messages: None,
            custom_max_collabs: None,
            custom_badge_label: None,
            custom_badge_color: None,
            admin_notes: None,
            expiration_date: None,
            is_permanent: Some(true),
        },
    )
    .unwrap();
    // Simulate a plan that was deleted after the override pointed at it.
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "UPDATE user_overrides SET override_plan_id = NULL WHERE user_id = ?1",
            rusqlite::params![id],
        )
        .unwrap();
    }

    let limits = plans::effective_limits(&pool, id).unwrap();
    assert!(limits.is_override);
    assert_eq!(limits.plan_name, "Pro");
}

#[test]
fn expired_override_is_ignored_but_not_deleted_by_reads() {
    let pool = test_pool();
    let id = make_agency(&pool, "Acme", "acme@example.com", "free", "approved");

    UserOverride::upsert(
        &pool,
        id,
        &OverrideForm {
            override_plan_id: None,
            custom_max_projects: Some(100),
            custom_max_responses: None,
            custom_max_messages: None,
            custom_max_collabs: None,
            custom_badge_label: None,
            custom_badge_color: None,
            admin_notes: None,
            expiration_date: Some("2001-01-01 00:00:00".to_string()),
            is_permanent: Some(false),
        },
    )
    .unwrap();

    let limits = plans::effective_limits(&pool, id).unwrap();
    assert!(!limits.is_override);
    assert_eq!(limits.max_projects, Plan::find_by_name(&pool, "Free").unwrap().max_projects);

    // The decision path must not have removed the row.
    assert!(UserOverride::find_by_user(&pool, id).is_some());
}

#[test]
fn permanent_override_survives_its_expiration_date() {
    let pool = test_pool();
    let id = make_agency(&pool, "Acme", "acme@example.com", "free", "approved");

    UserOverride::upsert(
        &pool,
        id,
        &OverrideForm {
            override_plan_id: None,
            custom_max_projects: Some(100),
            custom_max_responses: None,
            custom_max_messages: None,
            custom_max_collabs: None,
            custom_badge_label: None,
            custom_badge_color: None,
            admin_notes: None,
            expiration_date: Some("2001-01-01 00:00:00".to_string()),
            is_permanent: Some(true),
        },
    )
    .unwrap();

    let limits = plans::effective_limits(&pool, id).unwrap();
    assert!(limits.is_override);
    assert_eq!(limits.max_projects, 100);
}

#[test]
fn sweep_removes_only_expired_non_permanent_overrides() {
    let pool = test_pool();
    let expired = make_agency(&pool, "A", "a@example.com", "free", "approved");
    let permanent = make_agency(&pool, "B", "b@example.com", "free", "approved");
    let current = make_agency(&pool, "C", "c@example.com", "free", "approved");

    let base = OverrideForm {
        override_plan_id: None,
        custom_max_projects: Some(9),
        custom_max_responses: None,
        custom_max_messages: None,
        custom_max_collabs: None,
        custom_badge_label: None,
        custom_badge_color: None,
        admin_notes: None,
        expiration_date: Some("2001-01-01 00:00:00".to_string()),
        is_permanent: Some(false),
    };
    UserOverride::upsert(&pool, expired, &base).unwrap();
    UserOverride::upsert(&pool, permanent, &OverrideForm { is_permanent: Some(true), ..base_clone(&base) }).unwrap();
    UserOverride::upsert(
        &pool,
        current,
        &OverrideForm { expiration_date: Some("2999-01-01 00:00:00".to_string()), ..base_clone(&base) },
    )
    .unwrap();

    let removed = UserOverride::sweep_expired(&pool).unwrap();
    assert_eq!(removed, 1);
    assert!(UserOverride::find_by_user(&pool, expired).is_none());
    assert!(UserOverride::find_by_user(&pool, permanent).is_some());
    assert!(UserOverride::find_by_user(&pool, current).is_some());
}

fn base_clone(form: &OverrideForm) -> OverrideForm {
    OverrideForm {
        override_plan_id: form.override_plan_id,
        custom_max_projects: form.custom_max_projects,
        custom_max_responses: form.custom_max_responses,
        custom_max_messages: form.custom_max_messages,
        custom_max_collabs: form.custom_max_collabs,
        custom_badge_label: form.custom_badge_label.clone(),
        custom_badge_color: form.custom_badge_color.clone(),
        admin_notes: form.admin_notes.clone(),
        expiration_date: form.expiration_date.clone(),
        is_permanent: form.is_permanent,
    }
}

#[test]
fn override_upsert_replaces_existing_row() {
    let pool = test_pool();
    let id = make_agency(&pool, "Acme", "acme@example.com", "free", "approved");

    let mut form = base_clone(&OverrideForm {
        override_plan_id: None,
        custom_max_projects: Some(3),
        custom_max_responses: None,
        custom_max_messages: None,
        custom_max_collabs: None,
        custom_badge_label: None,
        custom_badge_color: None,
        admin_notes: None,
        expiration_date: None,
        is_permanent: Some(true),
    });
    UserOverride::upsert(&pool, id, &form).unwrap();
    form.custom_max_projects = Some(8);
    UserOverride::upsert(&pool, id, &form).unwrap();

    let conn = pool.get().unwrap();
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM user_overrides WHERE user_id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(
        UserOverride::find_by_user(&pool, id).unwrap().custom_max_projects,
        Some(8)
    );
}

// ═══════════════════════════════════════════════════════════
// Limit decisions
// ═══════════════════════════════════════════════════════════

#[test]
fn check_action_boundary_conditions() {
    let pool = test_pool();
    let free = make_agency(&pool, "Free Co", "free@example.com", "free", "approved");
    let premium = make_agency(&pool, "Prem Co", "prem@example.com", "premium", "approved");

    // Free plan: 2 projects/month.
    assert!(plans::check_action(&pool, free, LimitAction::CreateProject, 0).unwrap().allowed);
    assert!(plans::check_action(&pool, free, LimitAction::CreateProject, 1).unwrap().allowed);
    let at_limit = plans::check_action(&pool, free, LimitAction::CreateProject, 2).unwrap();
    assert!(!at_limit.allowed);
    assert!(at_limit.reason.unwrap().contains("limit"));

    // -1 is unlimited at any count.
    assert!(plans::check_action(&pool, premium, LimitAction::CreateProject, 10_000).unwrap().allowed);
}

#[test]
fn check_action_zero_limit_denies_immediately() {
    let pool = test_pool();
    let id = make_agency(&pool, "Zero", "zero@example.com", "free", "approved");
    UserOverride::upsert(
        &pool,
        id,
        &OverrideForm {
            override_plan_id: None,
            custom_max_projects: Some(0),
            custom_max_responses: None,
            custom_max_messages: None,
            custom_max_collabs: None,
            custom_badge_label: None,
            custom_badge_color: None,
            admin_notes: None,
            expiration_date: None,
            is_permanent: Some(true),
        },
    )
    .unwrap();

    assert!(!plans::check_action(&pool, id, LimitAction::CreateProject, 0).unwrap().allowed);
}

#[test]
fn try_consume_stops_exactly_at_the_limit() {
    let pool = test_pool();
    let id = make_agency(&pool, "Free Co", "free@example.com", "free", "approved");

    // Free plan allows 2 projects per month.
    assert!(plans::try_consume(&pool, id, LimitAction::CreateProject).unwrap().allowed);
    assert!(plans::try_consume(&pool, id, LimitAction::CreateProject).unwrap().allowed);
    let denied = plans::try_consume(&pool, id, LimitAction::CreateProject).unwrap();
    assert!(!denied.allowed);
    assert_eq!(denied.current, 2);

    // The denied attempt must not have bumped the counter.
    assert_eq!(Agency::monthly_count(&pool, id, MonthlyCounter::ProjectsCreated), 2);
}

#[test]
fn try_consume_unlimited_keeps_counting() {
    let pool = test_pool();
    let id = make_agency(&pool, "Prem Co", "prem@example.com", "premium", "approved");

    for _ in 0..5 {
        assert!(plans::try_consume(&pool, id, LimitAction::SendResponse).unwrap().allowed);
    }
    assert_eq!(Agency::monthly_count(&pool, id, MonthlyCounter::ResponsesSent), 5);
}

#[test]
fn try_consume_without_counter_reduces_to_check() {
    let pool = test_pool();
    let id = make_agency(&pool, "Free Co", "free@example.com", "free", "approved");

    // Free plan: 20 messages; no persisted counter backs the action.
    let decision = plans::try_consume(&pool, id, LimitAction::SendMessage).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.limit, 20);
}

#[test]
fn counter_reset_restores_allowance() {
    let pool = test_pool();
    let id = make_agency(&pool, "Free Co", "free@example.com", "free", "approved");

    plans::try_consume(&pool, id, LimitAction::CreateProject).unwrap();
    plans::try_consume(&pool, id, LimitAction::CreateProject).unwrap();
    assert!(!plans::try_consume(&pool, id, LimitAction::CreateProject).unwrap().allowed);

    Agency::reset_monthly_counters(&pool).unwrap();
    assert!(plans::try_consume(&pool, id, LimitAction::CreateProject).unwrap().allowed);
}

#[test]
fn plan_badge_prefers_override_label() {
    let pool = test_pool();
    let free = make_agency(&pool, "Free Co", "free@example.com", "free", "approved");
    let pro = make_agency(&pool, "Pro Co", "pro@example.com", "pro", "approved");

    assert!(plans::plan_badge(&pool, free).is_none());

    let badge = plans::plan_badge(&pool, pro).unwrap();
    assert_eq!(badge.label, "Pro Member");
    assert_eq!(badge.color, "#8b5cf6");

    UserOverride::upsert(
        &pool,
        pro,
        &OverrideForm {
            override_plan_id: None,
            custom_max_projects: None,
            custom_max_responses: None,
            custom_max_messages: None,
            custom_max_collabs: None,
            custom_badge_label: Some("Founding Partner".to_string()),
            custom_badge_color: None,
            admin_notes: None,
            expiration_date: None,
            is_permanent: Some(true),
        },
    )
    .unwrap();
    let badge = plans::plan_badge(&pool, pro).unwrap();
    assert_eq!(badge.label, "Founding Partner");
    assert_eq!(badge.color, "#8b5cf6"); // color falls back to the plan
}

// ═══════════════════════════════════════════════════════════
// Reviews, ratings, badges
// ═══════════════════════════════════════════════════════════

#[test]
fn review_uniqueness_per_reviewer_target_project() {
    let pool = test_pool();
    let reviewer = make_agency(&pool, "A", "a@example.com", "free", "approved");
    let target = make_agency(&pool, "B", "b@example.com", "free", "approved");
    let project = Project::create(&pool, target, &project_form("P", false)).unwrap();

    assert!(!Review::exists(&pool, reviewer, target, project));
    Review::create(&pool, reviewer, target, Some(project), 5, Some("great")).unwrap();
    assert!(Review::exists(&pool, reviewer, target, project));

    // The UNIQUE constraint rejects the duplicate outright.
    assert!(Review::create(&pool, reviewer, target, Some(project), 4, None).is_err());
}

#[test]
fn rating_recompute_tracks_creates_and_deletes() {
    let pool = test_pool();
    let r1 = make_agency(&pool, "A", "a@example.com", "free", "approved");
    let r2 = make_agency(&pool, "B", "b@example.com", "free", "approved");
    let target = make_agency(&pool, "C", "c@example.com", "free", "approved");

    let id1 = Review::create(&pool, r1, target, None, 5, None).unwrap();
    Agency::recompute_rating(&pool, target).unwrap();
    Review::create(&pool, r2, target, None, 3, None).unwrap();
    Agency::recompute_rating(&pool, target).unwrap();

    let agency = Agency::find_by_id(&pool, target).unwrap();
    assert_eq!(agency.rating_count, 2);
    assert!((agency.rating_average - 4.0).abs() < f64::EPSILON);

    Review::delete(&pool, id1).unwrap();
    Agency::recompute_rating(&pool, target).unwrap();
    let agency = Agency::find_by_id(&pool, target).unwrap();
    assert_eq!(agency.rating_count, 1);
    assert!((agency.rating_average - 3.0).abs() < f64::EPSILON);
}

#[test]
fn deleting_only_review_zeroes_rating_and_badges() {
    let pool = test_pool();
    let reviewer = make_agency(&pool, "A", "a@example.com", "free", "approved");
    let target = make_agency(&pool, "B", "b@example.com", "free", "approved");

    let review_id = Review::create(&pool, reviewer, target, None, 5, None).unwrap();
    Agency::recompute_rating(&pool, target).unwrap();
    Agency::recompute_badges(&pool, target).unwrap();

    Review::delete(&pool, review_id).unwrap();
    Agency::recompute_rating(&pool, target).unwrap();
    Agency::recompute_badges(&pool, target).unwrap();

    let agency = Agency::find_by_id(&pool, target).unwrap();
    assert_eq!(agency.rating_count, 0);
    assert_eq!(agency.rating_average, 0.0);
    assert!(agency.badge_list().is_empty());
}

#[test]
fn badge_rules() {
    let pool = test_pool();
    let target = make_agency(&pool, "Target", "t@example.com", "free", "approved");

    // Ten 5-star reviews from distinct reviewers → Top Collaborator.
    for i in 0..10 {
        let reviewer = make_agency(
            &pool,
            &format!("R{}", i),
            &format!("r{}@example.com", i),
            "free",
            "approved",
        );
        Review::create(&pool, reviewer, target, None, 5, None).unwrap();
    }
    Agency::recompute_rating(&pool, target).unwrap();
    Agency::recompute_badges(&pool, target).unwrap();
    assert_eq!(
        Agency::find_by_id(&pool, target).unwrap().badge_list(),
        vec!["Top Collaborator"]
    );

    // Premium on top of that earns all three.
    Agency::update_subscription(&pool, target, "premium").unwrap();
    Agency::recompute_badges(&pool, target).unwrap();
    assert_eq!(
        Agency::find_by_id(&pool, target).unwrap().badge_list(),
        vec!["Top Collaborator", "Elite Member", "Elite Partner"]
    );
}

#[test]
fn premium_without_reviews_gets_partner_badge_only() {
    let pool = test_pool();
    let id = make_agency(&pool, "P", "p@example.com", "premium", "approved");
    Agency::recompute_badges(&pool, id).unwrap();
    assert_eq!(Agency::find_by_id(&pool, id).unwrap().badge_list(), vec!["Elite Partner"]);
}

// ═══════════════════════════════════════════════════════════
// Identity reveal
// ═══════════════════════════════════════════════════════════

#[test]
fn reveal_is_idempotent() {
    let pool = test_pool();
    let owner = make_agency(&pool, "Owner", "o@example.com", "free", "approved");
    let responder = make_agency(&pool, "Resp", "r@example.com", "free", "approved");
    let project = Project::create(&pool, owner, &project_form("Hidden", true)).unwrap();

    assert!(!IdentityReveal::is_revealed(&pool, project, responder));

    IdentityReveal::grant(&pool, project, responder).unwrap();
    IdentityReveal::grant(&pool, project, responder).unwrap();
    assert!(IdentityReveal::is_revealed(&pool, project, responder));

    let conn = pool.get().unwrap();
    let (rows, revealed): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), MAX(revealed) FROM project_identity_reveals
             WHERE project_id = ?1 AND responder_agency_id = ?2",
            rusqlite::params![project, responder],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(revealed, 1);
}

#[test]
fn identity_visibility_policy() {
    let pool = test_pool();
    let owner = make_agency(&pool, "Owner", "o@example.com", "free", "approved");
    let responder = make_agency(&pool, "Resp", "r@example.com", "free", "approved");
    let stranger = make_agency(&pool, "Other", "x@example.com", "free", "approved");

    let public_id = Project::create(&pool, owner, &project_form("Public", false)).unwrap();
    let hidden_id = Project::create(&pool, owner, &project_form("Hidden", true)).unwrap();
    let public = Project::find_by_id(&pool, public_id).unwrap();
    let hidden = Project::find_by_id(&pool, hidden_id).unwrap();

    // Public project: visible to everyone, logged in or not.
    assert!(public.identity_visible_to(&pool, None, false));
    assert!(public.identity_visible_to(&pool, Some(stranger), false));

    // Hidden project: owner and admin only, until a reveal is granted.
    assert!(hidden.identity_visible_to(&pool, Some(owner), false));
    assert!(hidden.identity_visible_to(&pool, None, true));
    assert!(!hidden.identity_visible_to(&pool, Some(stranger), false));
    assert!(!hidden.identity_visible_to(&pool, Some(responder), false));
    assert!(!hidden.identity_visible_to(&pool, None, false));

    IdentityReveal::grant(&pool, hidden_id, responder).unwrap();
    assert!(hidden.identity_visible_to(&pool, Some(responder), false));
    assert!(!hidden.identity_visible_to(&pool, Some(stranger), false));
}

#[test]
fn reveal_listing_joins_responder() {
    let pool = test_pool();
    let owner = make_agency(&pool, "Owner", "o@example.com", "free", "approved");
    let responder = make_agency(&pool, "Resp Agency", "r@example.com", "free", "approved");
    let project = Project::create(&pool, owner, &project_form("Hidden", true)).unwrap();

    IdentityReveal::grant(&pool, project, responder).unwrap();
    let listings = IdentityReveal::list_for_project(&pool, project);
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].agency_name, "Resp Agency");
}

// ═══════════════════════════════════════════════════════════
// Agencies & auth
// ═══════════════════════════════════════════════════════════

#[test]
fn agency_registration_defaults() {
    let pool = test_pool();
    let id = Agency::create(&pool, &profile("New Co"), "new@example.com", "hash").unwrap();
    let agency = Agency::find_by_id(&pool, id).unwrap();
    assert_eq!(agency.status, "pending");
    assert_eq!(agency.subscription_tier, "free");
    assert!(!agency.is_approved());
    assert_eq!(agency.projects_created_this_month, 0);

    assert!(Agency::find_by_email(&pool, "new@example.com").is_some());
    assert!(Agency::find_by_email(&pool, "nobody@example.com").is_none());

    // Email uniqueness is enforced by the schema.
    assert!(Agency::create(&pool, &profile("Dup"), "new@example.com", "hash").is_err());
}

#[test]
fn agency_status_listing_filter() {
    let pool = test_pool();
    make_agency(&pool, "A", "a@example.com", "free", "approved");
    make_agency(&pool, "B", "b@example.com", "free", "pending");

    assert_eq!(Agency::list(&pool, Some("approved")).len(), 1);
    assert_eq!(Agency::list(&pool, None).len(), 2);
    assert_eq!(Agency::count(&pool, Some("pending")), 1);
}

#[test]
fn agency_stats_count_related_rows() {
    let pool = test_pool();
    let owner = make_agency(&pool, "Owner", "o@example.com", "free", "approved");
    let other = make_agency(&pool, "Other", "x@example.com", "free", "approved");
    let project = Project::create(&pool, owner, &project_form("P", false)).unwrap();
    ProjectResponse::create(&pool, project, other, "hi", "x@example.com").unwrap();
    Review::create(&pool, other, owner, Some(project), 4, None).unwrap();

    let stats = Agency::stats(&pool, owner);
    assert_eq!(stats.projects, 1);
    assert_eq!(stats.responses, 0);
    assert_eq!(stats.reviews, 1);

    let stats = Agency::stats(&pool, other);
    assert_eq!(stats.responses, 1);
}

#[test]
fn password_hash_roundtrip() {
    let hash = bcrypt::hash("s3cret", 4).unwrap();
    assert!(auth::verify_password("s3cret", &hash));
    assert!(!auth::verify_password("wrong", &hash));
    assert!(!auth::verify_password("s3cret", "not-a-hash"));
}

#[test]
fn sessions_are_typed_and_expire() {
    let pool = test_pool();
    let id = make_agency(&pool, "A", "a@example.com", "free", "approved");

    let session = auth::create_session(&pool, "agency", id, Some("10.0.0.1")).unwrap();
    assert_eq!(auth::session_user(&pool, &session, "agency"), Some(id));
    // An agency session must not authenticate admin requests.
    assert_eq!(auth::session_user(&pool, &session, "admin"), None);

    auth::destroy_session(&pool, &session).unwrap();
    assert_eq!(auth::session_user(&pool, &session, "agency"), None);

    // Expired rows are invisible and swept by cleanup.
    {
        let conn = pool.get().unwrap();
        let past = chrono::Utc::now().naive_utc() - chrono::Duration::hours(2);
        conn.execute(
            "INSERT INTO sessions (id, user_type, user_id, created_at, expires_at)
             VALUES ('stale', 'agency', ?1, ?2, ?2)",
            rusqlite::params![id, past],
        )
        .unwrap();
    }
    assert_eq!(auth::session_user(&pool, "stale", "agency"), None);
    auth::cleanup_expired_sessions(&pool).unwrap();
    let conn = pool.get().unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions WHERE id = 'stale'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn rate_limiter_blocks_after_max_attempts() {
    let limiter = RateLimiter::new();
    let window = std::time::Duration::from_secs(60);

    for _ in 0..5 {
        assert!(limiter.check_and_record("login:abc", 5, window));
    }
    assert!(!limiter.check_and_record("login:abc", 5, window));
    // Other keys are unaffected.
    assert!(limiter.check_and_record("login:def", 5, window));
}

// ═══════════════════════════════════════════════════════════
// Projects & responses
// ═══════════════════════════════════════════════════════════

#[test]
fn marketplace_filters() {
    let pool = test_pool();
    let a = make_agency(&pool, "A", "a@example.com", "free", "approved");

    Project::create(&pool, a, &project_form("Open collab", false)).unwrap();
    let closed = Project::create(&pool, a, &project_form("Closed", false)).unwrap();
    Project::set_status(&pool, closed, "closed").unwrap();
    Project::create(
        &pool,
        a,
        &ProjectForm {
            project_type: "overflow".to_string(),
            platforms_involved: Some("tiktok".to_string()),
            ..project_form("Overflow work", false)
        },
    )
    .unwrap();

    let open = Project::list(&pool, &ProjectFilters { status: Some("open"), ..Default::default() });
    assert_eq!(open.len(), 2);

    let overflow = Project::list(
        &pool,
        &ProjectFilters { status: Some("open"), project_type: Some("overflow"), ..Default::default() },
    );
    assert_eq!(overflow.len(), 1);
    assert_eq!(overflow[0].project.title, "Overflow work");

    let tiktok = Project::list(
        &pool,
        &ProjectFilters { status: Some("open"), platform: Some("tiktok"), ..Default::default() },
    );
    assert_eq!(tiktok.len(), 1);
}

#[test]
fn marketplace_orders_premium_first() {
    let pool = test_pool();
    let free = make_agency(&pool, "Free Co", "f@example.com", "free", "approved");
    let premium = make_agency(&pool, "Prem Co", "p@example.com", "premium", "approved");

    Project::create(&pool, free, &project_form("From free", false)).unwrap();
    Project::create(&pool, premium, &project_form("From premium", false)).unwrap();

    let listings = Project::list(&pool, &ProjectFilters { status: Some("open"), ..Default::default() });
    assert_eq!(listings[0].subscription_tier, "premium");
}

#[test]
fn project_update_and_response_count() {
    let pool = test_pool();
    let owner = make_agency(&pool, "Owner", "o@example.com", "free", "approved");
    let other = make_agency(&pool, "Other", "x@example.com", "free", "approved");
    let id = Project::create(&pool, owner, &project_form("Before", false)).unwrap();

    Project::update(&pool, id, &project_form("After", true)).unwrap();
    let project = Project::find_by_id(&pool, id).unwrap();
    assert_eq!(project.title, "After");
    assert!(project.hide_identity);

    assert_eq!(Project::response_count(&pool, id), 0);
    ProjectResponse::create(&pool, id, other, "interested", "x@example.com").unwrap();
    assert_eq!(Project::response_count(&pool, id), 1);

    let listed = ProjectResponse::list_for_project(&pool, id);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].agency_name, "Other");
}

#[test]
fn response_admin_listing_and_delete() {
    let pool = test_pool();
    let owner = make_agency(&pool, "Owner", "o@example.com", "free", "approved");
    let other = make_agency(&pool, "Other", "x@example.com", "free", "approved");
    let project = Project::create(&pool, owner, &project_form("P", false)).unwrap();
    let response = ProjectResponse::create(&pool, project, other, "hi", "x@example.com").unwrap();

    let all = ProjectResponse::list_all(&pool);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].project_title, "P");

    ProjectResponse::delete(&pool, response).unwrap();
    assert_eq!(ProjectResponse::count(&pool), 0);
}

// ═══════════════════════════════════════════════════════════
// Tickets
// ═══════════════════════════════════════════════════════════

#[test]
fn ticket_thread_lifecycle() {
    let pool = test_pool();
    let agency = make_agency(&pool, "A", "a@example.com", "free", "approved");

    let ticket = Ticket::create(&pool, agency, "Filter broken", "Technical Support", "It 404s").unwrap();
    TicketResponse::create(&pool, ticket, "agency", agency, "It 404s").unwrap();

    let loaded = Ticket::find_by_id(&pool, ticket).unwrap();
    assert_eq!(loaded.status, "open");
    assert_eq!(TicketResponse::list_for_ticket(&pool, ticket).len(), 1);
    assert_eq!(Ticket::count_open(&pool), 1);

    // Staff reply moves it along; agency reply re-opens a settled thread.
    Ticket::update_status(&pool, ticket, "resolved").unwrap();
    TicketResponse::create(&pool, ticket, "agency", agency, "still broken").unwrap();
    Ticket::update_status(&pool, ticket, "open").unwrap();
    assert_eq!(Ticket::find_by_id(&pool, ticket).unwrap().status, "open");

    let listings = Ticket::list_all(&pool);
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].agency_name, "A");

    Ticket::delete(&pool, ticket).unwrap();
    assert!(Ticket::find_by_id(&pool, ticket).is_none());
    assert!(TicketResponse::list_for_ticket(&pool, ticket).is_empty());
}

// ═══════════════════════════════════════════════════════════
// Messages & contact
// ═══════════════════════════════════════════════════════════

#[test]
fn broadcast_targets_only_approved_agencies() {
    let pool = test_pool();
    let approved = make_agency(&pool, "A", "a@example.com", "free", "approved");
    let pending = make_agency(&pool, "B", "b@example.com", "free", "pending");

    let sent = Message::send_to_all(&pool, "Welcome", "Hello all").unwrap();
    assert_eq!(sent, 1);
    assert_eq!(Message::unread_count(&pool, approved), 1);
    assert_eq!(Message::unread_count(&pool, pending), 0);
}

#[test]
fn tier_broadcast_matches_subscription() {
    let pool = test_pool();
    let free = make_agency(&pool, "A", "a@example.com", "free", "approved");
    let premium = make_agency(&pool, "B", "b@example.com", "premium", "approved");

    let sent = Message::send_to_tier(&pool, "Premium", "Perk", "New perk for you").unwrap();
    assert_eq!(sent, 1);
    assert_eq!(Message::unread_count(&pool, premium), 1);
    assert_eq!(Message::unread_count(&pool, free), 0);
}

#[test]
fn inbox_read_tracking() {
    let pool = test_pool();
    let sender = make_agency(&pool, "S", "s@example.com", "free", "approved");
    let recipient = make_agency(&pool, "R", "r@example.com", "free", "approved");

    let first = Message::create(&pool, sender, recipient, "Hi", "First").unwrap();
    Message::create(&pool, 0, recipient, "System", "Second").unwrap();
    assert_eq!(Message::unread_count(&pool, recipient), 2);

    Message::mark_read(&pool, first).unwrap();
    assert_eq!(Message::unread_count(&pool, recipient), 1);

    Message::mark_all_read(&pool, recipient).unwrap();
    assert_eq!(Message::unread_count(&pool, recipient), 0);

    let inbox = Message::list_for_recipient(&pool, recipient);
    assert_eq!(inbox.len(), 2);
    // Sender 0 is the system; there is no agency row to join.
    assert!(inbox.iter().any(|m| m.sender_name.is_none()));
    assert!(inbox.iter().any(|m| m.sender_name.as_deref() == Some("S")));
}

#[test]
fn contact_message_read_tracking() {
    let pool = test_pool();
    let id = ContactMessage::create(&pool, "Visitor", "v@example.com", "Hello", "Question").unwrap();
    assert_eq!(ContactMessage::unread_count(&pool), 1);

    ContactMessage::mark_read(&pool, id).unwrap();
    assert_eq!(ContactMessage::unread_count(&pool), 0);
    assert!(ContactMessage::find_by_id(&pool, id).unwrap().is_read);
    assert_eq!(ContactMessage::list_all(&pool).len(), 1);
}
