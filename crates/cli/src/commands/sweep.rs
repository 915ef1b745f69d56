use std::sync::Arc;

use chrono::Utc;
use leaveflow_core::audit::TracingAuditSink;
use leaveflow_workflow::{LeaveWorkflowService, SweepReport, WorkflowDependencies};
use serde_json::json;

use crate::commands::{open_database, prepare, CommandResult};

/// Runs the document-deadline sweep and then the stale-approval sweep once.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("sweep") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let service = LeaveWorkflowService::new(WorkflowDependencies::sqlite(
            pool.clone(),
            Arc::new(TracingAuditSink),
        ));

        let now = Utc::now();
        let reports = async {
            let document = service.run_document_sweep(now).await?;
            let stale = service.run_stale_approval_sweep(now).await?;
            Ok::<_, leaveflow_core::errors::ApplicationError>((document, stale))
        }
        .await
        .map_err(|error| ("sweep_execution", error.to_string(), 7u8));

        pool.close().await;
        reports
    });

    match result {
        Ok((document, stale)) => CommandResult::success_with_details(
            "sweep",
            summary(&[&document, &stale]),
            Some(json!({ "document_deadline": document, "stale_approval": stale })),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sweep", error_class, message, exit_code)
        }
    }
}

fn summary(reports: &[&SweepReport]) -> String {
    reports
        .iter()
        .map(|report| {
            format!(
                "{}: {} examined, {} acted, {} skipped, {} failed",
                report.sweep.as_str(),
                report.examined,
                report.acted,
                report.skipped,
                report.failed
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}
