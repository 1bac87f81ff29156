// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::alerts::AlertSink;
use crate::policy::{EffectivePolicy, RulePolicy};
use crate::registry::{RuleDescriptor, RuleRegistry};
use crate::scanners::{RuleContext, StopFlag};
use crate::transport::{ProbeRequest, Transport};
use crate::types::{Strength, Threshold};

const DEFAULT_CONCURRENCY: usize = 10;

/// Outcome of one scheduler run
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// (rule, target) pairs that ran to completion
    pub rules_run: usize,
    /// Rules not dispatched: disabled by policy or metadata-only
    pub rules_skipped: usize,
    /// (rule, target) pairs whose scan returned an error or panicked
    pub rules_failed: usize,
    pub alerts_raised: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

enum JobOutcome {
    Completed,
    Failed,
    NotStarted,
}

struct RuleJob {
    descriptor: RuleDescriptor,
    policy: RulePolicy,
    base: ProbeRequest,
}

/// Dispatches one rule instance per (enabled rule, target) on a bounded pool
pub struct ScanScheduler {
    registry: Arc<RuleRegistry>,
    transport: Arc<dyn Transport>,
    sink: AlertSink,
    stop: StopFlag,
    concurrency: usize,
}

impl ScanScheduler {
    pub fn new(registry: Arc<RuleRegistry>, transport: Arc<dyn Transport>, sink: AlertSink) -> Self {
        Self {
            registry,
            transport,
            sink,
            stop: StopFlag::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Handle for cancelling a running scan
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn sink(&self) -> &AlertSink {
        &self.sink
    }

    /// Run every enabled rule against every target. Without an effective
    /// policy all executable rules run at medium strength and threshold.
    pub async fn run(
        &self,
        targets: &[ProbeRequest],
        policy: Option<&EffectivePolicy>,
    ) -> ScanSummary {
        let started = Instant::now();
        let alerts_before = self.sink.len();
        let ambient = EffectivePolicy::new(Strength::Medium, Threshold::Medium);
        let policy = policy.unwrap_or(&ambient);

        let mut summary = ScanSummary::default();
        let mut jobs = Vec::new();

        for descriptor in self.registry.descriptors() {
            let rule_policy = policy.rule(descriptor.id);
            if !rule_policy.enabled {
                debug!("Rule {} is disabled by policy", descriptor.id);
                summary.rules_skipped += 1;
                continue;
            }
            if !self.registry.is_executable(descriptor.id) {
                debug!("Rule {} has no implementation, skipping", descriptor.id);
                summary.rules_skipped += 1;
                continue;
            }
            for base in targets {
                jobs.push(RuleJob {
                    descriptor: descriptor.clone(),
                    policy: rule_policy,
                    base: base.clone(),
                });
            }
        }

        info!(
            "Scheduling {} rule executions across {} targets (concurrency {})",
            jobs.len(),
            targets.len(),
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::with_capacity(jobs.len());

        for job in jobs {
            let sem = Arc::clone(&semaphore);
            let registry = Arc::clone(&self.registry);
            let transport = Arc::clone(&self.transport);
            let sink = self.sink.clone();
            let stop = self.stop.clone();

            let task = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return JobOutcome::NotStarted;
                };
                if stop.is_stopped() {
                    return JobOutcome::NotStarted;
                }
                Self::execute(registry, transport, sink, stop, job).await
            });

            tasks.push(task);
        }

        for result in join_all(tasks).await {
            match result {
                Ok(JobOutcome::Completed) => summary.rules_run += 1,
                Ok(JobOutcome::Failed) => summary.rules_failed += 1,
                Ok(JobOutcome::NotStarted) => {}
                Err(e) => {
                    error!("Rule task join error: {}", e);
                    summary.rules_failed += 1;
                }
            }
        }

        summary.cancelled = self.stop.is_stopped();
        summary.alerts_raised = self.sink.len().saturating_sub(alerts_before);
        summary.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            "Scan completed: {} rule executions, {} skipped, {} failed, {} alerts{}",
            summary.rules_run,
            summary.rules_skipped,
            summary.rules_failed,
            summary.alerts_raised,
            if summary.cancelled { " (cancelled)" } else { "" }
        );

        summary
    }

    async fn execute(
        registry: Arc<RuleRegistry>,
        transport: Arc<dyn Transport>,
        sink: AlertSink,
        stop: StopFlag,
        job: RuleJob,
    ) -> JobOutcome {
        let Some(mut rule) = registry.instantiate(job.descriptor.id) else {
            return JobOutcome::NotStarted;
        };

        let RulePolicy {
            strength,
            threshold,
            ..
        } = job.policy;
        rule.init(&job.base, strength, threshold);

        let url = job.base.url.to_string();
        let ctx = RuleContext::new(transport, sink, stop, job.descriptor, job.base)
            .with_strength(strength)
            .with_threshold(threshold);

        debug!(
            "Running rule {} ({}) on {} [strength {}, threshold {}]",
            rule.id(),
            rule.name(),
            url,
            strength.as_str(),
            threshold.as_str()
        );

        match rule.scan(&ctx).await {
            Ok(()) => JobOutcome::Completed,
            Err(e) => {
                warn!("Rule {} failed on {}: {}", rule.id(), url, e);
                JobOutcome::Failed
            }
        }
    }
}
