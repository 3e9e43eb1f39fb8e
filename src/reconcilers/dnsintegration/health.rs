// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health of an integration's provider worker, observed through its Deployment.

use crate::crd::{Condition, ConditionStatus, DNSIntegration};
use crate::reconcilers::dnsintegration::deployment::selector_labels;
use crate::reconcilers::lock::Task;
use crate::status_reasons::{reason_deployment_unhealthy, REASON_HEALTHY, REASON_WAITING_FOR_DEPLOYMENT};
use crate::store::{ListFilter, ObjectStore};
use anyhow::{bail, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition};
use kube::ResourceExt;
use tracing::debug;

/// Conditions reported by the Deployment controller, or `None` when it has not
/// observed the Deployment yet
fn reported_conditions(deployment: &Deployment) -> Option<&[DeploymentCondition]> {
    deployment
        .status
        .as_ref()?
        .conditions
        .as_deref()
        .filter(|conditions| !conditions.is_empty())
}

/// Poll the worker Deployments labelled for an integration.
///
/// - no Deployment, or none reporting conditions yet: `Waiting`
/// - any Deployment condition that is not `True`: error
/// - otherwise: `Completed`
pub struct HealthTask<'a> {
    deployments: &'a dyn ObjectStore<Deployment>,
    namespace: &'a str,
}

impl<'a> HealthTask<'a> {
    #[must_use]
    pub fn new(deployments: &'a dyn ObjectStore<Deployment>, namespace: &'a str) -> Self {
        Self {
            deployments,
            namespace,
        }
    }
}

#[async_trait]
impl Task<DNSIntegration> for HealthTask<'_> {
    async fn run(&mut self, integration: &mut DNSIntegration, mut condition: Condition) -> Result<Condition> {
        let mut filter = ListFilter::all().in_namespace(self.namespace);
        for (key, value) in selector_labels(&integration.name_any()) {
            filter = filter.with_label(key, value);
        }
        let deployments = self.deployments.list(&filter).await?;

        let mut observed = 0;
        for deployment in &deployments {
            let Some(conditions) = reported_conditions(deployment) else {
                continue;
            };
            observed += 1;
            for c in conditions {
                debug!(deployment = %deployment.name_any(), condition = %c.type_, status = %c.status, "Deployment condition");
                if c.status != "True" {
                    bail!(reason_deployment_unhealthy(&deployment.name_any()));
                }
            }
        }

        if observed == 0 {
            condition.status = ConditionStatus::Waiting;
            condition.reason = REASON_WAITING_FOR_DEPLOYMENT.to_string();
        } else {
            condition.status = ConditionStatus::Completed;
            condition.reason = REASON_HEALTHY.to_string();
        }
        Ok(condition)
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
