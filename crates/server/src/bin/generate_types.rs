//! Run with: cargo run --package server --bin generate-types --features typescript

use std::fs;
use std::path::Path;

fn main() {
    println!("Generating TypeScript types...");

    let out_dir = Path::new("frontend/workflow-ui/src/types/generated");

    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Failed to create output directory: {}", e);
        std::process::exit(1);
    }

    #[cfg(feature = "typescript")]
    {
        use ts_rs::TS;

        crewflow_core::Stage::export_all_to(out_dir).expect("Failed to export Stage");
        crewflow_core::ProgressPhase::export_all_to(out_dir)
            .expect("Failed to export ProgressPhase");
        crewflow_core::ProgressUpdate::export_all_to(out_dir)
            .expect("Failed to export ProgressUpdate");
        crewflow_core::ExecutionStatus::export_all_to(out_dir)
            .expect("Failed to export ExecutionStatus");
        crewflow_core::Priority::export_all_to(out_dir).expect("Failed to export Priority");
        crewflow_core::Recommendation::export_all_to(out_dir)
            .expect("Failed to export Recommendation");
        crewflow_core::ImplementationStatus::export_all_to(out_dir)
            .expect("Failed to export ImplementationStatus");
        crewflow_core::ErrorReport::export_all_to(out_dir).expect("Failed to export ErrorReport");

        events::EventEnvelope::export_all_to(out_dir).expect("Failed to export EventEnvelope");
        events::Event::export_all_to(out_dir).expect("Failed to export Event");

        orchestrator::Acknowledgement::export_all_to(out_dir)
            .expect("Failed to export Acknowledgement");
    }

    println!("TypeScript types generated in {}", out_dir.display());
}
