// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider worker Deployment for a `DNSIntegration`.
//!
//! Each integration gets one Deployment named `provider-<integration>` in the
//! controller's namespace. It is owned by the integration, so deleting the
//! integration lets the garbage collector remove the worker.

use crate::config::ControllerConfig;
use crate::constants::{
    API_GROUP_VERSION, ENV_INTEGRATION, ENV_NAMESPACE, ENV_PROVIDER, ENV_ZONES,
    KIND_DNS_INTEGRATION, PROVIDER_CONTAINER_NAME, PROVIDER_DEPLOYMENT_PREFIX, PROVIDER_REPLICAS,
};
use crate::crd::{Condition, ConditionStatus, DNSIntegration, DeploymentReference};
use crate::dns_errors::StoreError;
use crate::labels::{
    COMPONENT_PROVIDER, DEPLOYMENT_LABEL, K8S_COMPONENT, K8S_MANAGED_BY, K8S_NAME, K8S_PART_OF,
    MANAGED_BY_DNS_INTEGRATION, PART_OF_PHONEBOOK,
};
use crate::metrics::record_resource_created;
use crate::providers::default_image;
use crate::reconcilers::lock::Task;
use crate::status_reasons::reason_deployment_created;
use crate::store::ObjectStore;
use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, SecretKeySelector,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Name of the worker Deployment for `integration`
#[must_use]
pub fn deployment_name(integration: &str) -> String {
    format!("{PROVIDER_DEPLOYMENT_PREFIX}{integration}")
}

/// Selector labels shared by the Deployment and its pods
#[must_use]
pub fn selector_labels(integration: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(DEPLOYMENT_LABEL.to_string(), integration.to_string())])
}

fn build_labels(integration: &DNSIntegration) -> BTreeMap<String, String> {
    let mut labels = selector_labels(&integration.name_any());
    labels.insert(K8S_NAME.into(), deployment_name(&integration.name_any()));
    labels.insert(K8S_COMPONENT.into(), COMPONENT_PROVIDER.into());
    labels.insert(K8S_PART_OF.into(), PART_OF_PHONEBOOK.into());
    labels.insert(K8S_MANAGED_BY.into(), MANAGED_BY_DNS_INTEGRATION.into());
    labels
}

/// Owner reference making the integration the controller of its worker
#[must_use]
pub fn build_owner_references(integration: &DNSIntegration) -> Vec<OwnerReference> {
    vec![OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_DNS_INTEGRATION.to_string(),
        name: integration.name_any(),
        uid: integration.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]
}

/// Worker environment, in precedence order.
///
/// The integration's own `env` comes first, then its secret keys, then the
/// variables the worker needs to identify itself.
#[must_use]
pub fn build_env(integration: &DNSIntegration, namespace: &str) -> Vec<EnvVar> {
    let mut env = integration.spec.env.clone().unwrap_or_default();

    if let Some(secret) = &integration.spec.secret_ref {
        env.extend(secret.keys.iter().map(|key| EnvVar {
            name: key.name.clone(),
            value_from: Some(EnvVarSource {
                secret_key_ref: Some(SecretKeySelector {
                    name: secret.name.clone(),
                    key: key.key.clone(),
                    optional: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        }));
    }

    let plain = |name: &str, value: String| EnvVar {
        name: name.to_string(),
        value: Some(value),
        ..Default::default()
    };
    env.push(plain(ENV_INTEGRATION, integration.name_any()));
    env.push(plain(ENV_ZONES, integration.spec.zones.join(",")));
    env.push(plain(ENV_PROVIDER, integration.spec.provider.name.clone()));
    env.push(plain(ENV_NAMESPACE, namespace.to_string()));
    env
}

/// Build the worker Deployment for `integration`.
#[must_use]
pub fn build_deployment(integration: &DNSIntegration, config: &ControllerConfig) -> Deployment {
    let name = deployment_name(&integration.name_any());
    let provider = &integration.spec.provider;
    debug!(deployment = %name, namespace = %config.namespace, provider = %provider.name, "Building provider Deployment");

    let image = provider
        .image
        .clone()
        .unwrap_or_else(|| default_image(&provider.name, &config.provider_version));

    let container = Container {
        name: PROVIDER_CONTAINER_NAME.into(),
        image: Some(image),
        image_pull_policy: Some("IfNotPresent".into()),
        env: Some(build_env(integration, &config.namespace)),
        command: (!provider.command.is_empty()).then(|| provider.command.clone()),
        args: (!provider.args.is_empty()).then(|| provider.args.clone()),
        ..Default::default()
    };

    let selector = selector_labels(&integration.name_any());
    let labels = build_labels(integration);

    Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(config.namespace.clone()),
            labels: Some(labels.clone()),
            owner_references: Some(build_owner_references(integration)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(PROVIDER_REPLICAS),
            selector: LabelSelector {
                match_labels: Some(selector),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(config.provider_service_account.clone()),
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Provision the worker Deployment and record a reference to it.
///
/// A Deployment that already exists under the same name is adopted: it was created
/// by an earlier pass whose status write was lost.
pub struct DeploymentTask<'a> {
    deployments: &'a dyn ObjectStore<Deployment>,
    config: &'a ControllerConfig,
}

impl<'a> DeploymentTask<'a> {
    #[must_use]
    pub fn new(deployments: &'a dyn ObjectStore<Deployment>, config: &'a ControllerConfig) -> Self {
        Self {
            deployments,
            config,
        }
    }
}

#[async_trait]
impl Task<DNSIntegration> for DeploymentTask<'_> {
    async fn run(&mut self, integration: &mut DNSIntegration, mut condition: Condition) -> Result<Condition> {
        let deployment = build_deployment(integration, self.config);
        let name = deployment.name_any();

        match self.deployments.create(&deployment).await {
            Ok(_) => {
                info!(integration = %integration.name_any(), deployment = %name, "Created provider Deployment");
                record_resource_created("Deployment");
            }
            Err(StoreError::AlreadyExists { .. }) => {
                info!(integration = %integration.name_any(), deployment = %name, "Provider Deployment already exists, adopting it");
            }
            Err(e) => return Err(e.into()),
        }

        integration.status.get_or_insert_with(Default::default).deployment = Some(DeploymentReference {
            name: name.clone(),
            namespace: self.config.namespace.clone(),
        });
        condition.status = ConditionStatus::Created;
        condition.reason = reason_deployment_created(&name);
        Ok(condition)
    }
}

#[cfg(test)]
#[path = "deployment_tests.rs"]
mod deployment_tests;
