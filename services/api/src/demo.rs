use crate::infra::{
    in_memory_engine, seed_sample_data, InMemoryWiring, ADMIN, SAMPLE_COMPANY, SAMPLE_VACANCY,
};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use jobboard::config::{AppConfig, EngineConfig};
use jobboard::error::AppError;
use jobboard::workflows::exemption_import::ExemptionImporter;
use jobboard::workflows::recruitment::{
    ApplicationStatus, ApplicationSubmission, Clock, CommitteeRequest, CommitteeRole, DecisionOutcome,
    DocumentUpload, EvaluationInput, ExemptionGrant, ExemptionType, InterviewKind,
    InterviewRequest, InterviewResult, ManualClock, MemberRequest, Recommendation, ReviewVerdict,
    SystemClock, UserId, Vote,
};
use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

const APPLICANT: UserId = UserId(100);
const REHIRED_APPLICANT: UserId = UserId(101);
const INTERVIEWER: UserId = UserId(10);
const PANELISTS: [UserId; 2] = [UserId(11), UserId(12)];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Day of the interview (YYYY-MM-DD). Defaults to two days from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) interview_day: Option<NaiveDate>,
    /// Print the full workflow log of the demo application.
    #[arg(long)]
    pub(crate) show_history: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export with email/username/idnumber, exemptiontype and validfrom columns
    #[arg(long)]
    pub(crate) path: PathBuf,
    /// User recorded as the grantor (defaults to the built-in administrator)
    #[arg(long)]
    pub(crate) actor: Option<u64>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let engine_config = engine_config()?;
    let clock = ManualClock::new(Utc::now());
    let wiring = in_memory_engine(&engine_config, Arc::new(clock.clone()));
    seed_sample_data(&wiring.store, clock.now());

    println!("Recruitment engine demo");
    if let Err(err) = walk_application(&wiring, &clock, &args) {
        println!("  Demo stopped: {err}");
    }
    Ok(())
}

fn walk_application(
    wiring: &InMemoryWiring,
    clock: &ManualClock,
    args: &DemoArgs,
) -> Result<(), Box<dyn Error>> {
    let engine = &wiring.engine;

    engine.exemptions.grant(
        ExemptionGrant {
            user_id: REHIRED_APPLICANT,
            exemption_type: ExemptionType::Recontratacion,
            document_ref: Some("RES-2025-031".to_string()),
            notes: None,
            valid_from: clock.now() - Duration::days(1),
            valid_until: None,
        },
        ADMIN,
    )?;
    println!("\nDocument checklists for vacancy {SAMPLE_VACANCY}");
    for applicant in [APPLICANT, REHIRED_APPLICANT, UserId(102)] {
        let views = engine.requirements.resolve(SAMPLE_VACANCY, applicant)?;
        let codes: Vec<_> = views.iter().map(|view| view.code.as_str()).collect();
        println!("  - user {applicant}: {}", codes.join(", "));
    }

    let application = engine.applications.submit(ApplicationSubmission {
        vacancy_id: SAMPLE_VACANCY,
        applicant_id: APPLICANT,
        consent_text: "Autorizo el tratamiento de mis datos personales".to_string(),
        ip_address: None,
        user_agent: None,
        is_exemption: false,
        exemption_reason: None,
    })?;
    println!("\nApplication {} submitted", application.id);
    engine.applications.assign_reviewer(application.id, ADMIN, ADMIN)?;
    engine
        .applications
        .change_status(application.id, ApplicationStatus::UnderReview, "", ADMIN)?;

    let checklist = engine.documents.checklist(application.id)?;
    for item in &checklist.items {
        let document = engine.documents.upload(
            application.id,
            DocumentUpload {
                document_code: item.requirement.code.clone(),
                file_name: format!("{}.pdf", item.requirement.code),
                issue_date: Some(clock.now().date_naive() - Duration::days(5)),
            },
            APPLICANT,
        )?;
        engine
            .documents
            .review(document.id, ReviewVerdict::Approved, None, ADMIN)?;
    }
    let reviewed = engine.documents.complete_review(application.id, ADMIN)?;
    println!(
        "  {} documents approved; status {}",
        checklist.items.len(),
        reviewed.status
    );

    let day = args
        .interview_day
        .unwrap_or_else(|| clock.now().date_naive() + Duration::days(2));
    let slots = engine
        .interviews
        .available_slots(INTERVIEWER, day, Some(45))?;
    let Some(slot) = slots.first() else {
        println!("  No free interview slot on {day}");
        return Ok(());
    };
    let interview = engine.interviews.schedule(
        InterviewRequest {
            application_id: application.id,
            scheduled_at: slot.start,
            duration_minutes: Some(45),
            kind: InterviewKind::Video,
            location: None,
            interviewers: vec![INTERVIEWER],
            notes: "Clase demostrativa".to_string(),
        },
        ADMIN,
    )?;
    println!("  Interview {} booked for {}", interview.id, interview.window());
    clock.set(slot.end + Duration::minutes(5));
    engine.interviews.complete(
        interview.id,
        InterviewResult {
            rating: 5,
            feedback: "Strong command of the syllabus".to_string(),
            recommendation: Recommendation::Hire,
        },
        ADMIN,
    )?;

    let committee = engine.committees.create_committee(
        CommitteeRequest {
            company_id: SAMPLE_COMPANY,
            vacancy_id: Some(SAMPLE_VACANCY),
            name: "Comité de selección docente".to_string(),
            members: vec![
                MemberRequest {
                    user_id: ADMIN,
                    role: CommitteeRole::Chair,
                },
                MemberRequest {
                    user_id: PANELISTS[0],
                    role: CommitteeRole::Evaluator,
                },
                MemberRequest {
                    user_id: PANELISTS[1],
                    role: CommitteeRole::Evaluator,
                },
            ],
        },
        ADMIN,
    )?;
    for (evaluator, score, vote) in [
        (ADMIN, 91.0, Vote::Approve),
        (PANELISTS[0], 84.5, Vote::Approve),
        (PANELISTS[1], 62.0, Vote::Reject),
    ] {
        engine.committees.evaluate(
            EvaluationInput {
                committee_id: committee.id,
                application_id: application.id,
                score,
                vote,
                comments: String::new(),
                criteria: BTreeMap::from([("pedagogia".to_string(), score)]),
            },
            evaluator,
        )?;
    }
    let summary = engine.committees.aggregate(application.id, committee.id)?;
    println!(
        "\nCommittee votes: approve {} / reject {} / abstain {} -> {}",
        summary.approve, summary.reject, summary.abstain, summary.recommendation
    );
    let decided = engine.committees.record_decision(
        application.id,
        committee.id,
        DecisionOutcome::Selected,
        ADMIN,
        "",
    )?;
    println!("  Final status: {}", decided.status);

    if args.show_history {
        println!("\nWorkflow log");
        for entry in engine.applications.history(application.id)? {
            let from = entry
                .from_status
                .map_or_else(|| "-".to_string(), |status| status.to_string());
            println!(
                "  {} {} -> {} by {} {}",
                entry.created_at.format("%Y-%m-%d %H:%M"),
                from,
                entry.to_status,
                entry.actor_id,
                entry.comments
            );
        }
    }

    let templates = wiring.notifications.templates_for(APPLICANT);
    println!("\nNotifications queued for the applicant: {}", templates.join(", "));
    Ok(())
}

pub(crate) fn run_exemption_import(args: ImportArgs) -> Result<(), AppError> {
    let engine_config = engine_config()?;
    let wiring = in_memory_engine(&engine_config, Arc::new(SystemClock));
    seed_sample_data(&wiring.store, SystemClock.now());

    let importer = ExemptionImporter::new(
        wiring.store.clone(),
        wiring.collaborators.clone(),
        &engine_config,
    );
    let actor = args.actor.map_or(ADMIN, UserId);
    let report = importer.from_path(&args.path, actor)?;

    println!(
        "Imported {} of {} rows from {}",
        report.imported.len(),
        report.rows(),
        args.path.display()
    );
    for issue in &report.issues {
        println!("  - line {}: {}", issue.line, issue.message);
    }
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("Import report unavailable: {err}"),
    }
    Ok(())
}

fn engine_config() -> Result<EngineConfig, AppError> {
    Ok(AppConfig::load()?.engine)
}
