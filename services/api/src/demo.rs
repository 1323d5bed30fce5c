use crate::infra::{build_pipeline, ServicePipeline};
use clap::Args;
use leadflow::config::AppConfig;
use leadflow::error::AppError;
use leadflow::pipeline::{Lead, LeadId, WorkflowBucket};
use std::path::PathBuf;

const SAMPLE_CSV: &str = "\
Company Name,Number of Employees,City,user_name,user_surname,phone_number
Acme Logistics,120,Berlin,Ada,Lovelace,+491701234567
Globex,45,Paris,Hank,Scorpio,+33612345678
Initech,800,Austin,,,+15125550100
acme logistics,120,Berlin,Ada,Lovelace,+491701234567
Umbrella Corp,3,Raccoon City,Alice,Abernathy,+17025550100
";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// CSV file to import. Defaults to a small built-in sample.
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
    /// Send the generated queue to the configured calling service.
    #[arg(long)]
    pub(crate) dispatch: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { csv, dispatch } = args;
    let config = AppConfig::load()?;
    let pipeline = build_pipeline(&config)?;

    println!("Lead lifecycle demo");
    let summary = match &csv {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            println!("- importing {}", path.display());
            pipeline.importer().ingest_csv(file)?
        }
        None => {
            println!("- importing built-in sample");
            pipeline.importer().ingest_csv(SAMPLE_CSV.as_bytes())?
        }
    };
    println!(
        "- {} rows read | {} imported | {} duplicates skipped | {} leads total",
        summary.total_in_input, summary.inserted, summary.skipped, summary.total_now
    );

    let fresh: Vec<LeadId> = pipeline
        .engine()
        .list_leads(Some(WorkflowBucket::All))?
        .iter()
        .map(|lead| lead.id)
        .collect();
    let ready = pipeline.engine().bulk_mark_ready(&fresh)?;
    println!("- {ready} leads marked ready");

    promote_complete_leads(&pipeline)?;

    let scheduled = pipeline.scheduler().generate_queue()?;
    let queue = pipeline.scheduler().list_queue()?;
    println!("\nCall queue ({scheduled} newly scheduled)");
    render_queue(&queue);

    if dispatch && !queue.is_empty() {
        let ids: Vec<LeadId> = queue.iter().map(|lead| lead.id).collect();
        println!("\nDispatching to {}", config.dialer.endpoint);
        match pipeline.scheduler().dispatch(&ids).await {
            Ok(receipt) => println!(
                "- sent {} | file {} | inserted {} | skipped {}",
                receipt.sent_count,
                receipt.upstream_file_id.as_deref().unwrap_or("-"),
                receipt.upstream_inserted,
                receipt.upstream_skipped
            ),
            Err(err) => println!("- dispatch failed: {err}"),
        }
    }

    Ok(())
}

/// Promotes ready leads one by one so incomplete ones are reported instead of blocking
/// the rest.
fn promote_complete_leads(pipeline: &ServicePipeline) -> Result<(), AppError> {
    let ready = pipeline
        .engine()
        .list_leads(Some(WorkflowBucket::Ready))?;
    let (complete, incomplete): (Vec<&Lead>, Vec<&Lead>) = ready
        .iter()
        .partition(|lead| lead.missing_kanban_fields().is_empty());

    let ids: Vec<LeadId> = complete.iter().map(|lead| lead.id).collect();
    let promoted = pipeline.engine().bulk_promote_to_kanban(&ids)?;
    println!("- {} leads promoted to the Kanban board", promoted.len());

    for lead in incomplete {
        println!(
            "  - {} stays ready: missing {}",
            lead.name,
            lead.missing_kanban_fields().join(", ")
        );
    }
    Ok(())
}

fn render_queue(queue: &[Lead]) {
    if queue.is_empty() {
        println!("  (empty)");
        return;
    }
    for lead in queue {
        let slot = lead
            .scheduled_at
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_default();
        println!(
            "  {slot} | #{} {} | {} | {}",
            lead.id,
            lead.name,
            lead.contact_phone.as_deref().unwrap_or("-"),
            lead.status
        );
    }
}
