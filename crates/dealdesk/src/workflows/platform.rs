//! Composition root for the workflow services.

use std::sync::Arc;

use axum::Router;

use super::approvals::{approval_router, ApprovalService};
use super::context::Context;
use super::deals::{deal_router, DealService};
use super::lenders::{lender_router, LenderService};
use super::onboarding::{onboarding_router, OnboardingService};
use super::sla::{cron_router, Scheduler, SlaService, SweepService};

/// Every workflow service wired against one [`Context`].
#[derive(Clone)]
pub struct Platform {
    pub ctx: Context,
    pub sla: Arc<SlaService>,
    pub approvals: Arc<ApprovalService>,
    pub onboarding: Arc<OnboardingService>,
    pub lenders: Arc<LenderService>,
    pub deals: Arc<DealService>,
    pub sweeps: Arc<SweepService>,
    pub scheduler: Arc<Scheduler>,
}

impl Platform {
    pub fn new(ctx: Context) -> Self {
        let sla = Arc::new(SlaService::new(ctx.clone()));
        let approvals = Arc::new(ApprovalService::new(ctx.clone(), Arc::clone(&sla)));
        let onboarding = Arc::new(OnboardingService::new(
            ctx.clone(),
            Arc::clone(&approvals),
            Arc::clone(&sla),
        ));
        let lenders = Arc::new(LenderService::new(ctx.clone()));
        let deals = Arc::new(DealService::new(
            ctx.clone(),
            Arc::clone(&approvals),
            Arc::clone(&sla),
            Arc::clone(&lenders),
        ));
        let sweeps = Arc::new(SweepService::new(
            ctx.clone(),
            Arc::clone(&approvals),
            Arc::clone(&deals),
        ));
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&sweeps), Arc::clone(&ctx.clock)));
        Self {
            ctx,
            sla,
            approvals,
            onboarding,
            lenders,
            deals,
            sweeps,
            scheduler,
        }
    }
}

/// All workflow routes. Callers layer a [`Principal`](super::common::Principal) extension on top.
pub fn platform_router(platform: &Platform) -> Router {
    Router::new()
        .merge(onboarding_router(Arc::clone(&platform.onboarding)))
        .merge(approval_router(Arc::clone(&platform.approvals)))
        .merge(deal_router(Arc::clone(&platform.deals)))
        .merge(lender_router(Arc::clone(&platform.lenders)))
        .merge(cron_router(Arc::clone(&platform.scheduler)))
}
