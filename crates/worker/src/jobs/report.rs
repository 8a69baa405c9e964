use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tenvault_core::retry::{retry_with_backoff, RetryError, RetryPolicy};
use tenvault_core::task::TaskKind;

use crate::error::TaskError;
use crate::report::{ReportBuilder, ReportError, ReportRequest, ReportState};
use crate::scheduler::{Job, JobContext, JobOutput};

/// Start a remote document build and poll it to completion.
pub struct ReportJob {
    pub builder: Arc<dyn ReportBuilder>,
    pub request: ReportRequest,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub retry: RetryPolicy,
}

fn report_failure(err: RetryError<ReportError>) -> TaskError {
    match err.into_inner() {
        Some(e) => TaskError::Report(e),
        None => TaskError::Cancelled,
    }
}

impl ReportJob {
    async fn start_build(&self, ctx: &JobContext) -> Result<String, TaskError> {
        retry_with_backoff(
            &self.retry,
            &ctx.cancel,
            "start_report",
            ReportError::is_transient,
            |_| self.builder.start(&self.request),
        )
        .await
        .map_err(report_failure)
    }

    async fn poll_once(&self, ctx: &JobContext, build: &str) -> Result<ReportState, TaskError> {
        retry_with_backoff(
            &self.retry,
            &ctx.cancel,
            "poll_report",
            ReportError::is_transient,
            |_| self.builder.poll(build),
        )
        .await
        .map_err(report_failure)
    }
}

#[async_trait]
impl Job for ReportJob {
    fn kind(&self) -> TaskKind {
        TaskKind::Report
    }

    async fn run(self: Box<Self>, ctx: &JobContext) -> Result<JobOutput, TaskError> {
        let build = self.start_build(ctx).await?;
        tracing::info!(task_id = %ctx.task_id, build = %build, template = %self.request.template, "Report build started");

        for _ in 0..self.max_polls {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(TaskError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            match self.poll_once(ctx, &build).await? {
                ReportState::InProgress(percent) => ctx.progress.set_percent(percent).await?,
                ReportState::Done(url) if url.trim().is_empty() => {
                    return Err(ReportError::Failed("build finished without a document URL".into()).into())
                }
                ReportState::Done(url) => {
                    return Ok(JobOutput {
                        artifact: Some(url),
                        warnings: Vec::new(),
                    })
                }
                ReportState::Failed(reason) => return Err(ReportError::Failed(reason).into()),
            }
        }

        Err(ReportError::Timeout {
            polls: self.max_polls,
        }
        .into())
    }
}
