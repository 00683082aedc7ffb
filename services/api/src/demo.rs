use crate::infra::{InMemoryStore, NewCase};
use clap::Args;
use frontline_support::error::AppError;
use frontline_support::workflows::casework::{
    offline_recommendation, CaseWorkflowEngine, CitizenId, EventPublisher,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Case title shown in the printed progress log
    #[arg(long, default_value = "Medical emergency")]
    pub(crate) title: String,
    /// Case description fed to the triage classifier
    #[arg(
        long,
        default_value = "I have severe chest pain and need urgent medical attention"
    )]
    pub(crate) description: String,
}

#[derive(Args, Debug)]
pub(crate) struct OfflineArgs {
    /// Case description to classify
    pub(crate) description: String,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(InMemoryStore::default());
    store.seed_demo_data();

    let engine = CaseWorkflowEngine::new(store.clone(), store.clone(), EventPublisher::new());

    let case = store.create_case(NewCase {
        citizen_id: CitizenId(1),
        title: args.title,
        description: args.description,
    })?;

    println!("Citizen case processing demo");
    println!("Submitted case {} ({})", case.id, case.title);

    let outcome = engine.run(case.id, false).await;

    println!("\nProgress log");
    for message in &outcome.messages {
        println!("- {message}");
    }

    println!(
        "\nFinal status: {} ({})",
        outcome.final_status,
        if outcome.success { "success" } else { "halted" }
    );
    if let Some(error) = &outcome.error {
        println!("Halt reason: {error}");
    }
    if let Some(appointment) = &outcome.appointment {
        println!(
            "Appointment: {} at {}, {} minutes, contact {}",
            appointment.scheduled_time.format("%Y-%m-%d %H:%M"),
            appointment.service_name,
            appointment.duration_minutes,
            appointment.contact
        );
    }

    if let Some(detail) = store.case_detail(case.id) {
        println!("\nRecorded updates");
        for update in &detail.updates {
            println!("- [{}] {}", update.stage, update.message);
        }
    }

    Ok(())
}

pub(crate) fn run_offline(args: OfflineArgs) -> Result<(), AppError> {
    let recommendation = offline_recommendation(&args.description);

    println!("Offline recommendation");
    println!("- Urgency: {}", recommendation.urgency);
    println!("- Service: {}", recommendation.recommended_service);
    println!("- {}", recommendation.message);
    println!("- Next steps: {}", recommendation.next_steps);

    Ok(())
}
