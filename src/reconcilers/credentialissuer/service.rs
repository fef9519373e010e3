// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Front-door Service lifecycle for the impersonation proxy.
//!
//! The two possible Services (LoadBalancer and ClusterIP) have distinct,
//! fixed names, so a change of service type is a delete of one name and a
//! create of the other. Existing Services are replaced only when the
//! spec-controlled attributes (annotations, static LB IP) drift; `clusterIP`
//! allocations made by the API server are always preserved on update.

#[allow(clippy::wildcard_imports)]
use super::types::*;

use super::config::{ProxyConfig, ServiceType};
use crate::constants::{PROXY_SERVER_PORT, PROXY_SERVICE_PORT};
use crate::crd::{SERVICE_TYPE_CLUSTER_IP, SERVICE_TYPE_LOAD_BALANCER};
use crate::labels::APP_LABEL;

/// Converge the front-door Services onto the configured type.
pub(super) async fn ensure_service(
    client: &Client,
    settings: &Settings,
    config: &ProxyConfig,
) -> Result<()> {
    match config.service_type {
        ServiceType::None => {
            delete_service_if_exists(client, settings, &settings.load_balancer_service_name)
                .await?;
            delete_service_if_exists(client, settings, &settings.cluster_ip_service_name).await?;
        }
        ServiceType::LoadBalancer => {
            delete_service_if_exists(client, settings, &settings.cluster_ip_service_name).await?;
            let desired = build_load_balancer_service(settings, config);
            create_or_update_service(client, settings, &settings.load_balancer_service_name, desired)
                .await?;
        }
        ServiceType::ClusterIp => {
            delete_service_if_exists(client, settings, &settings.load_balancer_service_name)
                .await?;
            let desired = build_cluster_ip_service(settings, config);
            create_or_update_service(client, settings, &settings.cluster_ip_service_name, desired)
                .await?;
        }
    }
    Ok(())
}

/// Delete both possible front-door Services. Used on the disabled path.
pub(super) async fn delete_services(client: &Client, settings: &Settings) -> Result<()> {
    delete_service_if_exists(client, settings, &settings.load_balancer_service_name).await?;
    delete_service_if_exists(client, settings, &settings.cluster_ip_service_name).await?;
    Ok(())
}

/// Delete one Service when present; a missing Service is success.
async fn delete_service_if_exists(
    client: &Client,
    settings: &Settings,
    name: &str,
) -> Result<()> {
    let api: Api<Service> = Api::namespaced(client.clone(), &settings.namespace);

    // Read first so a steady state produces no write attempts at all.
    match api.get(name).await {
        Err(kube::Error::Api(ae)) if ae.code == 404 => return Ok(()),
        Err(e) => return Err(e.into()),
        Ok(_) => {}
    }

    info!("Deleting Service {}/{}", settings.namespace, name);
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn create_or_update_service(
    client: &Client,
    settings: &Settings,
    name: &str,
    desired: Service,
) -> Result<()> {
    let api: Api<Service> = Api::namespaced(client.clone(), &settings.namespace);

    let existing = match api.get(name).await {
        Ok(service) => Some(service),
        Err(kube::Error::Api(ae)) if ae.code == 404 => None,
        Err(e) => return Err(e.into()),
    };

    let Some(existing) = existing else {
        info!("Creating Service {}/{}", settings.namespace, name);
        api.create(&PostParams::default(), &desired).await?;
        return Ok(());
    };

    if !service_needs_update(&existing, &desired) {
        debug!(
            "Service {}/{} is up to date, skipping update",
            settings.namespace, name
        );
        return Ok(());
    }

    // Carry over the server-assigned fields that a PUT must not clobber.
    info!("Updating Service {}/{}", settings.namespace, name);
    let mut updated = desired;
    updated.metadata.resource_version = existing.metadata.resource_version.clone();
    if let Some(ref mut spec) = updated.spec {
        if let Some(ref existing_spec) = existing.spec {
            spec.cluster_ip.clone_from(&existing_spec.cluster_ip);
            spec.cluster_ips.clone_from(&existing_spec.cluster_ips);
        }
    }
    api.replace(name, &PostParams::default(), &updated).await?;

    Ok(())
}

/// Whether the spec-controlled attributes of the Service drifted.
pub(super) fn service_needs_update(existing: &Service, desired: &Service) -> bool {
    let existing_annotations = existing
        .metadata
        .annotations
        .clone()
        .unwrap_or_default();
    let desired_annotations = desired.metadata.annotations.clone().unwrap_or_default();
    if existing_annotations != desired_annotations {
        debug!("Service annotations changed");
        return true;
    }

    let existing_lb_ip = existing
        .spec
        .as_ref()
        .and_then(|s| s.load_balancer_ip.as_deref())
        .unwrap_or_default();
    let desired_lb_ip = desired
        .spec
        .as_ref()
        .and_then(|s| s.load_balancer_ip.as_deref())
        .unwrap_or_default();
    if existing_lb_ip != desired_lb_ip {
        debug!(
            "Service loadBalancerIP changed: current={:?}, desired={:?}",
            existing_lb_ip, desired_lb_ip
        );
        return true;
    }

    false
}

/// Build the LoadBalancer Service.
pub(super) fn build_load_balancer_service(settings: &Settings, config: &ProxyConfig) -> Service {
    let mut service = build_base_service(
        settings,
        &settings.load_balancer_service_name,
        SERVICE_TYPE_LOAD_BALANCER,
        config.annotations.clone(),
    );
    if let Some(ref mut spec) = service.spec {
        spec.load_balancer_ip.clone_from(&config.load_balancer_ip);
    }
    service
}

/// Build the ClusterIP Service.
pub(super) fn build_cluster_ip_service(settings: &Settings, config: &ProxyConfig) -> Service {
    build_base_service(
        settings,
        &settings.cluster_ip_service_name,
        SERVICE_TYPE_CLUSTER_IP,
        config.annotations.clone(),
    )
}

fn build_base_service(
    settings: &Settings,
    name: &str,
    service_type: &str,
    annotations: Option<BTreeMap<String, String>>,
) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(settings.namespace.clone()),
            labels: Some(settings.labels.clone()),
            annotations,
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some(service_type.to_string()),
            selector: Some(BTreeMap::from([(
                APP_LABEL.to_string(),
                settings.app_name.clone(),
            )])),
            ports: Some(vec![ServicePort {
                name: Some("https".to_string()),
                port: PROXY_SERVICE_PORT,
                target_port: Some(IntOrString::Int(i32::from(PROXY_SERVER_PORT))),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
