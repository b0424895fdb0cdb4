use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Args;
use dealdesk::error::AppError;
use dealdesk::workflows::approvals::RequestType;
use dealdesk::workflows::common::{FixedClock, Principal, Role};
use dealdesk::workflows::deals::{CounterOffer, DisbursementStep, NewBid, NewBill, NewCwc};
use dealdesk::workflows::lenders::{LenderDecision, NbfcResponse, NewNbfc};
use dealdesk::workflows::onboarding::{ChecklistItem, NewCompany, NewSubContractor};
use dealdesk::workflows::ports::{MemoryDocumentStorage, RecordingNotifier};
use dealdesk::workflows::{Context, Platform, Stores};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Working-capital amount requested against the invoice, in rupees.
    #[arg(long, default_value_t = 2_500_000.0)]
    pub(crate) amount: f64,
    /// Interest rate the lender sanctions, in percent per annum.
    #[arg(long, default_value_t = 14.0)]
    pub(crate) rate: f64,
    /// Leave the deal unpaid this many days past due and run the sweeps instead of settling.
    #[arg(long)]
    pub(crate) days_late: Option<i64>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let clock = Arc::new(FixedClock::new(Utc::now()));
    let notifier = RecordingNotifier::default();
    let platform = Platform::new(Context::new(
        Stores::in_memory(),
        clock.clone(),
        Arc::new(notifier.clone()),
        Arc::new(MemoryDocumentStorage::default()),
    ));

    let sales = Principal::new("sales-1", Role::Sales);
    let ops = Principal::new("ops-1", Role::Ops);
    let rmt = Principal::new("rmt-1", Role::Rmt);
    let ops_manager = Principal::new("om-1", Role::OpsManager);
    let founder = Principal::new("founder-1", Role::Founder);

    println!("Deal desk demo");
    println!("Requested amount: ₹{:.0} at {:.2}% p.a.", args.amount, args.rate);

    println!("\nSeller onboarding");
    let seller = platform.onboarding.create_lead(
        &sales,
        NewSubContractor {
            name: "Ravi Solar Installations".to_string(),
            pan: Some("AAACR4821R".to_string()),
            gstin: None,
            email: Some("accounts@ravisolar.example".to_string()),
            geography: Some("Maharashtra".to_string()),
            sector: Some("Solar EPC".to_string()),
            agent_id: None,
        },
    )?;
    platform.onboarding.submit_profile(&sales, &seller.id)?;
    platform.onboarding.verify_kyc(&ops, &seller.id)?;
    let assessment = platform
        .onboarding
        .start_assessment(&rmt, &seller.id, None)?;
    let checklist: BTreeMap<String, bool> = ChecklistItem::ALL
        .into_iter()
        .map(|item| (item.key().to_string(), true))
        .collect();
    platform
        .onboarding
        .update_checklist(&rmt, &assessment.id, &checklist)?;
    let assessment = platform.onboarding.submit_assessment(&rmt, &assessment.id)?;
    println!(
        "  Risk assessment: {:?} risk, recommendation {:?}",
        assessment.risk_category, assessment.recommendation
    );
    if let Some(approval_id) = assessment.approval_id.as_deref() {
        platform.approvals.approve(&ops_manager, approval_id, None)?;
    }
    let seller = platform.onboarding.sub_contractor(&seller.id)?;
    println!("  {} is {:?}", seller.name, seller.status());

    let company = platform.onboarding.register_company(
        &sales,
        NewCompany {
            name: "Sunrise EPC Ltd".to_string(),
            pan: Some("AAACS7310S".to_string()),
            gstin: None,
            email: None,
            geography: Some("Maharashtra".to_string()),
            sector: Some("Solar EPC".to_string()),
        },
    )?;
    for (name, email) in [
        ("Bharat Capital", "credit@bharatcapital.example"),
        ("Western Trade Finance", "deals@wtf.example"),
    ] {
        platform.lenders.register(
            &ops_manager,
            NewNbfc {
                name: name.to_string(),
                email: email.to_string(),
                preferences: Default::default(),
            },
        )?;
    }

    println!("\nBill to commercial lock");
    let seller_principal = Principal::new(seller.id.clone(), Role::SubContractor);
    let epc = Principal::new(company.id.clone(), Role::Epc);
    let bill = platform.deals.upload_bill(
        &seller_principal,
        NewBill {
            sub_contractor_id: seller.id.clone(),
            company_id: company.id.clone(),
            invoice_number: "INV-DEMO-001".to_string(),
            amount: args.amount * 1.25,
            due_date: None,
        },
        b"%PDF-1.4 demo invoice",
        &mime::APPLICATION_PDF,
    )?;
    platform.deals.verify_bill(&ops, &bill.id, true, None)?;
    let cwc = platform.deals.submit_cwc(
        &seller_principal,
        NewCwc {
            bill_id: bill.id.clone(),
            amount: args.amount,
            duration_days: 60,
        },
    )?;
    let case = platform.deals.create_case(&ops, &cwc.id)?;
    platform.deals.review_case(&epc, &case.id, true, None)?;
    let bid = platform.deals.place_bid(
        &epc,
        NewBid {
            case_id: case.id.clone(),
            amount: args.amount * 0.95,
            duration_days: 60,
        },
    )?;
    println!("  Buyer bid ₹{:.0} for 60 days", args.amount * 0.95);
    platform.deals.negotiate(
        &seller_principal,
        &bid.id,
        CounterOffer {
            amount: args.amount,
            duration_days: 45,
            note: Some("full amount, shorter tenor".to_string()),
        },
    )?;
    println!("  Seller countered ₹{:.0} for 45 days", args.amount);
    let case = platform.deals.lock_bid(&epc, &bid.id)?;
    println!("  Case {} is {:?}", case.id, case.status());

    if let Some(gate) = platform
        .approvals
        .open_for(RequestType::DealAbove1Cr, &case.id)?
    {
        platform.approvals.approve(&ops_manager, &gate.id, None)?;
        platform.approvals.approve(&founder, &gate.id, None)?;
        println!("  High-value gate {} signed off by ops manager and founder", gate.id);
    }

    println!("\nLender matching");
    let candidates = platform.lenders.match_case(&ops, &case.id)?;
    for candidate in &candidates {
        println!(
            "  {:<24} score {:>6.1}  approval rate {:>5.1}%",
            candidate.name,
            candidate.score,
            candidate.approval_rate * 100.0
        );
    }
    let case = platform.lenders.share_case(&ops, &case.id, None)?;
    println!("  Shared with {} lenders", case.nbfc_shares.len());
    let lender_id = candidates
        .first()
        .map(|candidate| candidate.nbfc_id.clone())
        .unwrap_or_default();
    let case = platform.lenders.respond(
        &Principal::new(lender_id, Role::Nbfc),
        &case.id,
        NbfcResponse {
            nbfc_id: None,
            decision: LenderDecision::Approve,
            interest_rate: Some(args.rate),
            notes: None,
        },
    )?;
    println!("  Case {} is {:?}", case.id, case.status());

    println!("\nFunding");
    let txn = platform.deals.create_transaction(&ops, &case.id)?;
    platform.deals.setup_escrow(&ops, &txn.id, "TRA-DEMO-01")?;
    platform
        .deals
        .disburse(&ops, &txn.id, DisbursementStep::Initiate, None, None)?;
    let txn = platform.deals.disburse(
        &ops,
        &txn.id,
        DisbursementStep::Complete,
        Some("UTR-DEMO-01".to_string()),
        None,
    )?;
    println!(
        "  Transaction {} disbursed; ₹{:.2} due",
        txn.id, txn.repayment.total_due
    );

    match args.days_late {
        Some(days_late) => {
            let tenor = case
                .commercial_snapshot
                .as_ref()
                .map_or(45, |snapshot| i64::from(snapshot.duration_days));
            clock.advance(Duration::days(tenor + days_late));
            println!("\nSweeps after {days_late} days past due");
            for report in platform.scheduler.run_all_now() {
                println!(
                    "  {:<24} scanned {:>3}  affected {:>3}  failures {}",
                    report.job.name(),
                    report.scanned,
                    report.affected,
                    report.failures.len()
                );
            }
            let txn = platform.deals.transaction(&txn.id)?;
            let case = platform.deals.case(&case.id)?;
            println!(
                "  Transaction {:?}, {} days overdue; case {:?}",
                txn.status(),
                txn.repayment.overdue_by,
                case.status()
            );
        }
        None => {
            let txn = platform
                .deals
                .record_repayment(&ops, &txn.id, txn.repayment.total_due, None)?;
            let case = platform.deals.case(&case.id)?;
            println!("\nSettlement");
            println!("  Transaction {:?}; case {:?}", txn.status(), case.status());
        }
    }

    let mut templates: BTreeMap<String, usize> = BTreeMap::new();
    for notice in notifier.notices() {
        *templates.entry(notice.template).or_default() += 1;
    }
    println!("\nNotifications sent");
    for (template, count) in templates {
        println!("  {template:<28} {count}");
    }

    Ok(())
}
