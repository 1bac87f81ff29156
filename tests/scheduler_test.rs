// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Scheduler Tests
 * Policy-driven dispatch, cancellation and failure accounting
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

mod common;

use async_trait::async_trait;
use std::sync::Arc;

use common::ScriptedTransport;
use lonkero_probe::alerts::AlertSink;
use lonkero_probe::errors::{EngineError, EngineResult};
use lonkero_probe::policy::{resolve, ConfigProgress, PolicyDefinition, PolicyRuleOverride};
use lonkero_probe::registry::{RuleCategory, RuleDescriptor, RuleRegistry};
use lonkero_probe::scanners::{RuleContext, ScanRule};
use lonkero_probe::transport::{HttpResponse, ProbeRequest};
use lonkero_probe::types::{Risk, Strength, Threshold};
use lonkero_probe::worker::ScanScheduler;

struct FailingRule {
    descriptor: RuleDescriptor,
}

#[async_trait]
impl ScanRule for FailingRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn init(&mut self, _base: &ProbeRequest, _strength: Strength, _threshold: Threshold) {}

    async fn scan(&mut self, _ctx: &RuleContext) -> EngineResult<()> {
        Err(EngineError::Rule {
            rule_id: self.descriptor.id,
            reason: "parser gave up".to_string(),
        })
    }
}

fn refusing_transport() -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new(|_| Ok(HttpResponse::new(405))))
}

fn targets(urls: &[&str]) -> Vec<ProbeRequest> {
    urls.iter().map(|u| ProbeRequest::get(u).unwrap()).collect()
}

#[tokio::test]
async fn test_builtin_rules_run_without_policy() {
    let transport = refusing_transport();
    let registry = Arc::new(RuleRegistry::with_builtin_rules());
    let scheduler = ScanScheduler::new(registry, transport.clone(), AlertSink::new());

    let summary = scheduler
        .run(&targets(&["http://target.example/"]), None)
        .await;

    assert_eq!(summary.rules_run, 2);
    assert_eq!(summary.rules_skipped, 0);
    assert_eq!(summary.rules_failed, 0);
    assert_eq!(summary.alerts_raised, 0);
    assert!(!summary.cancelled);

    let methods = transport.methods();
    assert!(methods.contains(&"OPTIONS".to_string()));
    assert!(methods.contains(&"TRACE".to_string()));
}

#[tokio::test]
async fn test_every_target_gets_every_rule() {
    let transport = refusing_transport();
    let registry = Arc::new(RuleRegistry::with_builtin_rules());
    let scheduler =
        ScanScheduler::new(registry, transport, AlertSink::new()).with_concurrency(1);

    let summary = scheduler
        .run(
            &targets(&["http://one.example/", "http://two.example/"]),
            None,
        )
        .await;

    assert_eq!(summary.rules_run, 4);
}

#[tokio::test]
async fn test_threshold_off_skips_rule() {
    let transport = refusing_transport();
    let registry = Arc::new(RuleRegistry::with_builtin_rules());

    let definition = PolicyDefinition::new()
        .with_default_strength(Strength::Medium)
        .with_rule(PolicyRuleOverride::new(40025, Strength::Default, Threshold::Off));
    let mut progress = ConfigProgress::new();
    let effective = resolve(Some(&definition), &registry.snapshot(), &mut progress);
    assert!(effective.is_some());

    let scheduler = ScanScheduler::new(registry, transport.clone(), AlertSink::new());
    let summary = scheduler
        .run(&targets(&["http://target.example/"]), effective.as_ref())
        .await;

    assert_eq!(summary.rules_run, 1);
    assert_eq!(summary.rules_skipped, 1);
    assert_eq!(transport.methods(), vec!["OPTIONS"]);
}

#[tokio::test]
async fn test_alerts_are_counted() {
    let transport = Arc::new(ScriptedTransport::new(|request| match request.method.as_str() {
        "OPTIONS" => Ok(HttpResponse::new(200).with_header("Allow", "GET, DELETE")),
        _ => Ok(HttpResponse::new(405)),
    }));
    let sink = AlertSink::new();
    let scheduler = ScanScheduler::new(
        Arc::new(RuleRegistry::with_builtin_rules()),
        transport,
        sink.clone(),
    );

    let summary = scheduler
        .run(&targets(&["http://target.example/"]), None)
        .await;

    assert_eq!(summary.alerts_raised, 1);
    assert_eq!(sink.alerts_for_rule(90028).len(), 1);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["alertsRaised"], 1);
    assert_eq!(json["rulesRun"], 2);
}

#[tokio::test]
async fn test_metadata_only_rule_is_skipped() {
    let mut registry = RuleRegistry::with_builtin_rules();
    registry
        .register(
            RuleDescriptor::new(100001, "Scripted Rule", RuleCategory::Misc, Risk::Low)
                .with_tag("PENTEST", ""),
        )
        .unwrap();

    let scheduler = ScanScheduler::new(Arc::new(registry), refusing_transport(), AlertSink::new());
    let summary = scheduler
        .run(&targets(&["http://target.example/"]), None)
        .await;

    assert_eq!(summary.rules_run, 2);
    assert_eq!(summary.rules_skipped, 1);
}

#[tokio::test]
async fn test_failing_rule_is_counted() {
    let mut registry = RuleRegistry::with_builtin_rules();
    registry
        .register_rule(Arc::new(|| {
            Box::new(FailingRule {
                descriptor: RuleDescriptor::new(
                    100002,
                    "Failing Rule",
                    RuleCategory::Misc,
                    Risk::Info,
                ),
            }) as Box<dyn ScanRule>
        }))
        .unwrap();

    let scheduler = ScanScheduler::new(Arc::new(registry), refusing_transport(), AlertSink::new());
    let summary = scheduler
        .run(&targets(&["http://target.example/"]), None)
        .await;

    assert_eq!(summary.rules_run, 2);
    assert_eq!(summary.rules_failed, 1);
}

#[tokio::test]
async fn test_stopped_scan_dispatches_nothing() {
    let transport = refusing_transport();
    let scheduler = ScanScheduler::new(
        Arc::new(RuleRegistry::with_builtin_rules()),
        transport.clone(),
        AlertSink::new(),
    );
    scheduler.stop_flag().stop();

    let summary = scheduler
        .run(&targets(&["http://target.example/"]), None)
        .await;

    assert!(summary.cancelled);
    assert_eq!(summary.rules_run, 0);
    assert!(transport.requests().is_empty());
}
