//! Effective-limit resolution for the subscription system.
//!
//! A decision merges three layers: the agency's optional override row, the
//! override's own plan pointer (if any), and the plan named by the agency's
//! subscription tier, falling back to the default plan. A limit of -1 means
//! unlimited.

use serde::Serialize;

use crate::db::DbPool;
use crate::models::agency::{Agency, MonthlyCounter};
use crate::models::plan::Plan;
use crate::models::user_override::UserOverride;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitAction {
    CreateProject,
    SendResponse,
    CreateCollab,
    SendMessage,
}

impl LimitAction {
    pub fn label(&self) -> &'static str {
        match self {
            LimitAction::CreateProject => "projects",
            LimitAction::SendResponse => "responses",
            LimitAction::CreateCollab => "collaborations",
            LimitAction::SendMessage => "messages",
        }
    }

    /// Which agency-row counter backs this action, for the actions whose
    /// usage is persisted per month.
    fn counter(&self) -> Option<MonthlyCounter> {
        match self {
            LimitAction::CreateProject => Some(MonthlyCounter::ProjectsCreated),
            LimitAction::SendResponse => Some(MonthlyCounter::ResponsesSent),
            LimitAction::CreateCollab | LimitAction::SendMessage => None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct EffectiveLimits {
    pub max_projects: i64,
    pub max_responses: i64,
    pub max_collabs: i64,
    pub max_messages: i64,
    pub badge_label: Option<String>,
    pub badge_color: Option<String>,
    pub plan_name: String,
    pub is_override: bool,
}

impl EffectiveLimits {
    pub fn limit_for(&self, action: LimitAction) -> i64 {
        match action {
            LimitAction::CreateProject => self.max_projects,
            LimitAction::SendResponse => self.max_responses,
            LimitAction::CreateCollab => self.max_collabs,
            LimitAction::SendMessage => self.max_messages,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct LimitDecision {
    pub allowed: bool,
    /// -1 means unlimited.
    pub limit: i64,
    pub current: i64,
    pub remaining: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct PlanBadge {
    pub label: String,
    pub color: String,
}

const DEFAULT_BADGE_COLOR: &str = "#6366f1";

/// Resolve the base plan for an agency with an override: the override's plan
/// pointer wins, then the plan named by the subscription tier, then the
/// default plan.
fn base_plan(pool: &DbPool, agency: &Agency, override_plan_id: Option<i64>) -> Result<Plan, String> {
    if let Some(plan_id) = override_plan_id {
        if let Some(plan) = Plan::find_by_id(pool, plan_id) {
            return Ok(plan);
        }
    }
    Plan::find_by_name(pool, &agency.subscription_tier)
        .or_else(|| Plan::default_plan(pool))
        .ok_or_else(|| "no plan configured".to_string())
}

/// Effective limits for an agency. The read path only reads: an expired
/// non-permanent override is ignored here and removed by the explicit
/// `UserOverride::sweep_expired` maintenance pass.
pub fn effective_limits(pool: &DbPool, agency_id: i64) -> Result<EffectiveLimits, String> {
    let agency =
        Agency::find_by_id(pool, agency_id).ok_or_else(|| "agency not found".to_string())?;

    if let Some(ov) = UserOverride::active_for_user(pool, agency_id) {
        let plan = base_plan(pool, &agency, ov.override_plan_id)?;
        return Ok(EffectiveLimits {
            max_projects: ov.custom_max_projects.unwrap_or(plan.max_projects),
            max_responses: ov.custom_max_responses.unwrap_or(plan.max_responses),
            max_collabs: ov.custom_max_collabs.unwrap_or(plan.max_collabs),
            max_messages: ov.custom_max_messages.unwrap_or(plan.max_messages),
            badge_label: ov.custom_badge_label.or(plan.highlight_label),
            badge_color: ov.custom_badge_color.or(plan.highlight_badge_color),
            plan_name: plan.name,
            is_override: true,
        });
    }

    let plan = base_plan(pool, &agency, None)?;
    Ok(EffectiveLimits {
        max_projects: plan.max_projects,
        max_responses: plan.max_responses,
        max_collabs: plan.max_collabs,
        max_messages: plan.max_messages,
        badge_label: plan.highlight_label,
        badge_color: plan.highlight_badge_color,
        plan_name: plan.name,
        is_override: false,
    })
}

fn decision(limit: i64, current: i64, action: LimitAction) -> LimitDecision {
    if limit == -1 {
        return LimitDecision {
            allowed: true,
            limit,
            current,
            remaining: None,
            reason: None,
        };
    }
    if current >= limit {
        return LimitDecision {
            allowed: false,
            limit,
            current,
            remaining: Some(0),
            reason: Some(format!(
                "You have reached the limit of your current plan ({} {} per month)",
                limit,
                action.label()
            )),
        };
    }
    LimitDecision {
        allowed: true,
        limit,
        current,
        remaining: Some(limit - current),
        reason: None,
    }
}

/// Pure limit check: allowed iff the limit is -1 or the count is below it.
/// Does not mutate anything.
pub fn check_action(
    pool: &DbPool,
    agency_id: i64,
    action: LimitAction,
    current_count: i64,
) -> Result<LimitDecision, String> {
    let limits = effective_limits(pool, agency_id)?;
    Ok(decision(limits.limit_for(action), current_count, action))
}

/// Check the limit and consume one unit of monthly usage in a single
/// conditional UPDATE, so concurrent requests cannot overshoot the limit.
/// Actions without a persisted counter reduce to a plain check.
pub fn try_consume(pool: &DbPool, agency_id: i64, action: LimitAction) -> Result<LimitDecision, String> {
    let limits = effective_limits(pool, agency_id)?;
    let limit = limits.limit_for(action);

    let counter = match action.counter() {
        Some(c) => c,
        None => return Ok(decision(limit, 0, action)),
    };

    let consumed = Agency::try_increment_monthly(pool, agency_id, counter, limit)?;
    let current = Agency::monthly_count(pool, agency_id, counter);

    if consumed {
        Ok(LimitDecision {
            allowed: true,
            limit,
            current,
            remaining: if limit == -1 { None } else { Some(limit - current) },
            reason: None,
        })
    } else {
        Ok(decision(limit, current, action))
    }
}

/// The badge shown next to the agency name, from the effective limits.
pub fn plan_badge(pool: &DbPool, agency_id: i64) -> Option<PlanBadge> {
    let limits = effective_limits(pool, agency_id).ok()?;
    limits.badge_label.map(|label| PlanBadge {
        label,
        color: limits
            .badge_color
            .unwrap_or_else(|| DEFAULT_BADGE_COLOR.to_string()),
    })
}
