//! Runs a compiled stylesheet on the tokio runtime.
//!
//! The first call runs straight away. Every call it schedules is spawned as
//! a task that sleeps for the call's delay and then runs on its own
//! executor, and anything those calls schedule is spawned the same way.

use crate::error::ScrivenerError;
use log::{debug, info, warn};
use scrivener_xpath::AtomicValue;
use scrivener_xslt::{Executable, ExecutionError, Executor, QueueScheduler, ScheduledCall};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

pub const DEFAULT_MAX_SCHEDULED: usize = 1000;

/// Output of one template call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub template: String,
    /// Zero for the initial call.
    pub delay: Duration,
    pub text: String,
}

type CallResult = Result<(RunOutput, Vec<ScheduledCall>), ExecutionError>;

pub struct Runner {
    executable: Arc<Executable>,
    max_scheduled: usize,
}

impl Runner {
    pub fn new(executable: Executable) -> Self {
        Self {
            executable: Arc::new(executable),
            max_scheduled: DEFAULT_MAX_SCHEDULED,
        }
    }

    /// Caps the number of scheduled calls run in total. Calls past the cap
    /// are dropped with a warning.
    pub fn with_max_scheduled(mut self, max_scheduled: usize) -> Self {
        self.max_scheduled = max_scheduled;
        self
    }

    /// Runs `template`, then every call scheduled from it, until none remain.
    /// Outputs are returned in completion order.
    pub async fn run(
        &self,
        template: &str,
        context_item: Option<AtomicValue>,
    ) -> Result<Vec<RunOutput>, ScrivenerError> {
        let mut scheduler = QueueScheduler::new();
        let text = Executor::new(&self.executable, &mut scheduler).call_template(
            template,
            HashMap::new(),
            context_item,
        )?;
        let mut outputs = vec![RunOutput {
            template: template.to_string(),
            delay: Duration::ZERO,
            text,
        }];

        let mut tasks: JoinSet<CallResult> = JoinSet::new();
        let mut spawned = 0;
        self.spawn_all(&mut tasks, scheduler.drain(), &mut spawned);

        while let Some(joined) = tasks.join_next().await {
            let (output, followups) = joined??;
            info!("'{}' ran after {:?}", output.template, output.delay);
            outputs.push(output);
            self.spawn_all(&mut tasks, followups, &mut spawned);
        }
        Ok(outputs)
    }

    fn spawn_all(&self, tasks: &mut JoinSet<CallResult>, calls: Vec<ScheduledCall>, spawned: &mut usize) {
        for call in calls {
            if *spawned >= self.max_scheduled {
                warn!(
                    "Dropping scheduled call of '{}': limit of {} reached",
                    call.template, self.max_scheduled
                );
                continue;
            }
            *spawned += 1;
            debug!("Spawning '{}' to run after {:?}", call.template, call.delay);
            let executable = Arc::clone(&self.executable);
            tasks.spawn(async move {
                tokio::time::sleep(call.delay).await;
                run_call(&executable, call)
            });
        }
    }
}

fn run_call(executable: &Executable, call: ScheduledCall) -> CallResult {
    let template = call.template.clone();
    let delay = call.delay;
    let mut scheduler = QueueScheduler::new();
    let text = Executor::new(executable, &mut scheduler).run_scheduled(call)?;
    Ok((
        RunOutput {
            template,
            delay,
            text,
        },
        scheduler.drain(),
    ))
}

/// Runs `template` and its scheduled calls with the default limit.
pub async fn run_template(
    executable: Executable,
    template: &str,
    context_item: Option<AtomicValue>,
) -> Result<Vec<RunOutput>, ScrivenerError> {
    Runner::new(executable).run(template, context_item).await
}
