// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-kind "equal enough" comparison of live and desired objects.
//!
//! Live objects carry server-populated fields (status, defaulted spec fields,
//! cluster IPs, token data) that a generated object never has. Comparing whole
//! structs would report drift on every pass, so each kind compares an explicit
//! allow-list of fields and, when they differ, copies exactly those fields
//! onto the live object before it is written back.
//!
//! | Kind | Compared fields |
//! |------|-----------------|
//! | `ServiceAccount` | none (existence only) |
//! | `Service` | selector, ports, type, serving-cert annotation |
//! | `ConfigMap` | data |
//! | `Secret` | type, data (when the desired object has data), annotations |
//! | `ClusterRole` | rules |
//! | `ClusterRoleBinding` | subjects, roleRef |
//! | `NetworkPolicy`, `ServiceMonitor`, `PrometheusRule`, `ConsolePlugin` | spec |
//! | `Deployment` | see [`deployment_changes`] |

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, PodSpec, ResourceRequirements, Secret, Service, ServiceAccount,
    ServicePort, Volume,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

use crate::constants::SERVING_CERT_SECRET_ANNOTATION_KEY;
use crate::external_types::{ConsolePlugin, PrometheusRule, ServiceMonitor};

/// Allow-listed comparison and merge for one resource kind.
pub trait Equivalent {
    /// Whether `self` (the live object) already matches `desired` on every
    /// field this controller owns.
    fn equivalent(&self, desired: &Self) -> bool;

    /// Copy the owned fields of `desired` onto `self`, keeping everything the
    /// server populated.
    fn merge_from(&mut self, desired: &Self);
}

/// Overlay `desired` annotations onto `existing`, leaving foreign keys alone.
fn merge_annotations(existing: &mut ObjectMeta, desired: &ObjectMeta) {
    if let Some(desired) = desired.annotations.as_ref() {
        let annotations = existing.annotations.get_or_insert_with(BTreeMap::new);
        for (key, value) in desired {
            annotations.insert(key.clone(), value.clone());
        }
    }
}

fn annotations_contained(existing: &ObjectMeta, desired: &ObjectMeta) -> bool {
    desired.annotations.as_ref().is_none_or(|wanted| {
        wanted.iter().all(|(key, value)| {
            existing
                .annotations
                .as_ref()
                .and_then(|a| a.get(key))
                .is_some_and(|v| v == value)
        })
    })
}

fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a String> {
    meta.annotations.as_ref().and_then(|a| a.get(key))
}

impl Equivalent for ServiceAccount {
    fn equivalent(&self, _desired: &Self) -> bool {
        true
    }

    fn merge_from(&mut self, _desired: &Self) {}
}

fn port_identity(port: &ServicePort) -> (Option<&str>, i32, Option<&str>, Option<&IntOrString>) {
    (
        port.name.as_deref(),
        port.port,
        port.protocol.as_deref(),
        port.target_port.as_ref(),
    )
}

impl Equivalent for Service {
    fn equivalent(&self, desired: &Self) -> bool {
        let (Some(live), Some(want)) = (self.spec.as_ref(), desired.spec.as_ref()) else {
            return self.spec.is_none() && desired.spec.is_none();
        };
        let live_ports: Vec<_> = live.ports.iter().flatten().map(port_identity).collect();
        let want_ports: Vec<_> = want.ports.iter().flatten().map(port_identity).collect();
        // A live service without an explicit type was defaulted to ClusterIP.
        let type_matches = want.type_.is_none() || live.type_ == want.type_;

        live.selector == want.selector
            && live_ports == want_ports
            && type_matches
            && annotation(&self.metadata, SERVING_CERT_SECRET_ANNOTATION_KEY)
                == annotation(&desired.metadata, SERVING_CERT_SECRET_ANNOTATION_KEY)
    }

    fn merge_from(&mut self, desired: &Self) {
        if let Some(want) = desired.spec.as_ref() {
            let spec = self.spec.get_or_insert_with(Default::default);
            spec.selector.clone_from(&want.selector);
            spec.ports.clone_from(&want.ports);
            if want.type_.is_some() {
                spec.type_.clone_from(&want.type_);
            }
        }
        match annotation(&desired.metadata, SERVING_CERT_SECRET_ANNOTATION_KEY) {
            Some(value) => {
                self.metadata
                    .annotations
                    .get_or_insert_with(BTreeMap::new)
                    .insert(SERVING_CERT_SECRET_ANNOTATION_KEY.to_string(), value.clone());
            }
            None => {
                if let Some(annotations) = self.metadata.annotations.as_mut() {
                    annotations.remove(SERVING_CERT_SECRET_ANNOTATION_KEY);
                }
            }
        }
        self.metadata.labels.clone_from(&desired.metadata.labels);
    }
}

impl Equivalent for ConfigMap {
    fn equivalent(&self, desired: &Self) -> bool {
        self.data == desired.data && annotations_contained(&self.metadata, &desired.metadata)
    }

    fn merge_from(&mut self, desired: &Self) {
        self.data.clone_from(&desired.data);
        merge_annotations(&mut self.metadata, &desired.metadata);
    }
}

impl Equivalent for Secret {
    fn equivalent(&self, desired: &Self) -> bool {
        let data_matches = desired.data.is_none() || self.data == desired.data;
        self.type_ == desired.type_
            && data_matches
            && annotations_contained(&self.metadata, &desired.metadata)
    }

    fn merge_from(&mut self, desired: &Self) {
        if desired.data.is_some() {
            self.data.clone_from(&desired.data);
        }
        self.type_.clone_from(&desired.type_);
        merge_annotations(&mut self.metadata, &desired.metadata);
    }
}

impl Equivalent for ClusterRole {
    fn equivalent(&self, desired: &Self) -> bool {
        self.rules == desired.rules
    }

    fn merge_from(&mut self, desired: &Self) {
        self.rules.clone_from(&desired.rules);
    }
}

impl Equivalent for ClusterRoleBinding {
    fn equivalent(&self, desired: &Self) -> bool {
        self.subjects == desired.subjects && self.role_ref == desired.role_ref
    }

    fn merge_from(&mut self, desired: &Self) {
        self.subjects.clone_from(&desired.subjects);
        self.role_ref.clone_from(&desired.role_ref);
    }
}

macro_rules! spec_equivalent {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl Equivalent for $kind {
                fn equivalent(&self, desired: &Self) -> bool {
                    self.spec == desired.spec
                }

                fn merge_from(&mut self, desired: &Self) {
                    self.spec.clone_from(&desired.spec);
                }
            }
        )+
    };
}

spec_equivalent!(NetworkPolicy, ServiceMonitor, PrometheusRule, ConsolePlugin);

// ============================================================================
// Deployments
// ============================================================================

/// Identity of a volume: its name plus the object or medium backing it.
///
/// Default-populated fields (`defaultMode`, `optional`, `sizeLimit`) are
/// deliberately left out.
fn volume_identity(volume: &Volume) -> (String, &'static str, Option<String>) {
    let name = volume.name.clone();
    if let Some(secret) = volume.secret.as_ref() {
        (name, "secret", secret.secret_name.clone())
    } else if let Some(config_map) = volume.config_map.as_ref() {
        (name, "configMap", Some(config_map.name.clone()))
    } else if let Some(empty_dir) = volume.empty_dir.as_ref() {
        (name, "emptyDir", empty_dir.medium.clone())
    } else if let Some(claim) = volume.persistent_volume_claim.as_ref() {
        (name, "persistentVolumeClaim", Some(claim.claim_name.clone()))
    } else {
        (name, "other", None)
    }
}

fn volumes_equal(live: Option<&Vec<Volume>>, want: Option<&Vec<Volume>>) -> bool {
    let live: Vec<_> = live.into_iter().flatten().map(volume_identity).collect();
    let want: Vec<_> = want.into_iter().flatten().map(volume_identity).collect();
    live == want
}

/// Field-by-field container equality over the fields the generators set.
#[must_use]
pub fn containers_equal(live: &Container, want: &Container) -> bool {
    live.name == want.name
        && live.image == want.image
        && (want.image_pull_policy.is_none() || live.image_pull_policy == want.image_pull_policy)
        && live.command == want.command
        && live.args == want.args
        && live.env == want.env
        && live.ports == want.ports
        && live.volume_mounts == want.volume_mounts
        && resources_equal(live.resources.as_ref(), want.resources.as_ref())
}

/// Resource requirements compared by quantity value, not spelling.
///
/// The API server canonicalizes quantities (`0.5` is read back as `500m`,
/// `1024Mi` as `1Gi`), so string equality would report drift forever.
#[must_use]
pub fn resources_equal(
    live: Option<&ResourceRequirements>,
    want: Option<&ResourceRequirements>,
) -> bool {
    let empty = ResourceRequirements::default();
    let live = live.unwrap_or(&empty);
    let want = want.unwrap_or(&empty);
    quantity_maps_equal(live.limits.as_ref(), want.limits.as_ref())
        && quantity_maps_equal(live.requests.as_ref(), want.requests.as_ref())
        && live.claims.as_deref().unwrap_or_default() == want.claims.as_deref().unwrap_or_default()
}

fn quantity_maps_equal(
    live: Option<&BTreeMap<String, Quantity>>,
    want: Option<&BTreeMap<String, Quantity>>,
) -> bool {
    let empty = BTreeMap::new();
    let live = live.unwrap_or(&empty);
    let want = want.unwrap_or(&empty);
    live.len() == want.len()
        && live
            .iter()
            .all(|(name, quantity)| want.get(name).is_some_and(|w| quantities_equal(quantity, w)))
}

/// Whether two quantities denote the same amount.
///
/// Unparseable quantities only match their exact spelling.
#[must_use]
pub fn quantities_equal(a: &Quantity, b: &Quantity) -> bool {
    if a.0 == b.0 {
        return true;
    }
    match (quantity_nanos(&a.0), quantity_nanos(&b.0)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Decimal and binary exponents of a quantity suffix.
fn suffix_exponents(suffix: &str) -> Option<(i32, u32)> {
    let exponents = match suffix {
        "" => (0, 0),
        "n" => (-9, 0),
        "u" => (-6, 0),
        "m" => (-3, 0),
        "k" => (3, 0),
        "M" => (6, 0),
        "G" => (9, 0),
        "T" => (12, 0),
        "P" => (15, 0),
        "E" => (18, 0),
        "Ki" => (0, 10),
        "Mi" => (0, 20),
        "Gi" => (0, 30),
        "Ti" => (0, 40),
        "Pi" => (0, 50),
        "Ei" => (0, 60),
        _ => {
            // Decimal exponent form: 1e3, 5E-1
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            (exponent.parse().ok()?, 0)
        }
    };
    Some(exponents)
}

/// A quantity's value in nano-units, rounded up like the API server does.
fn quantity_nanos(quantity: &str) -> Option<i128> {
    let quantity = quantity.trim();
    let (negative, unsigned) = match quantity.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, quantity.strip_prefix('+').unwrap_or(quantity)),
    };
    let split = unsigned
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    let (exp10, exp2) = suffix_exponents(suffix)?;

    let digits: i128 = format!("{whole}{fraction}").parse().ok()?;
    let scaled = digits.checked_mul(1_i128.checked_shl(exp2)?)?;
    let fraction_len = i32::try_from(fraction.len()).ok()?;
    let exp = exp10.checked_add(9)?.checked_sub(fraction_len)?;
    let nanos = if exp >= 0 {
        scaled.checked_mul(10_i128.checked_pow(u32::try_from(exp).ok()?)?)?
    } else {
        let divisor = 10_i128.checked_pow(exp.unsigned_abs())?;
        scaled.checked_add(divisor - 1)? / divisor
    };
    Some(if negative { -nanos } else { nanos })
}

fn container_lists_equal(live: Option<&Vec<Container>>, want: Option<&Vec<Container>>) -> bool {
    let live = live.map_or(&[][..], Vec::as_slice);
    let want = want.map_or(&[][..], Vec::as_slice);
    live.len() == want.len() && live.iter().zip(want).all(|(l, w)| containers_equal(l, w))
}

/// `hash/*` annotations, the only annotations the deployment comparison owns.
fn hash_annotations(meta: Option<&ObjectMeta>) -> BTreeMap<&str, &str> {
    meta.and_then(|m| m.annotations.as_ref())
        .into_iter()
        .flatten()
        .filter(|(key, _)| key.starts_with("hash/"))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

fn node_selector(spec: Option<&PodSpec>) -> Option<&BTreeMap<String, String>> {
    spec.and_then(|s| s.node_selector.as_ref()).filter(|m| !m.is_empty())
}

fn tolerations(spec: Option<&PodSpec>) -> Option<&Vec<k8s_openapi::api::core::v1::Toleration>> {
    spec.and_then(|s| s.tolerations.as_ref()).filter(|t| !t.is_empty())
}

/// Names of the deployment fields that differ between `live` and `want`.
///
/// Compared: `hash/*` annotations on the deployment and on the pod template,
/// replicas, node selector, tolerations, volumes by identity, init containers
/// and containers field by field. An empty result means no update is needed.
#[must_use]
pub fn deployment_changes(live: &Deployment, want: &Deployment) -> Vec<&'static str> {
    let mut changes = Vec::new();
    if hash_annotations(Some(&live.metadata)) != hash_annotations(Some(&want.metadata)) {
        changes.push("annotations");
    }

    let live_spec = live.spec.as_ref();
    let want_spec = want.spec.as_ref();
    let live_template = live_spec.map(|s| &s.template);
    let want_template = want_spec.map(|s| &s.template);
    if hash_annotations(live_template.and_then(|t| t.metadata.as_ref()))
        != hash_annotations(want_template.and_then(|t| t.metadata.as_ref()))
    {
        changes.push("template annotations");
    }

    if live_spec.and_then(|s| s.replicas) != want_spec.and_then(|s| s.replicas) {
        changes.push("replicas");
    }

    let live_pod = live_template.and_then(|t| t.spec.as_ref());
    let want_pod = want_template.and_then(|t| t.spec.as_ref());
    if node_selector(live_pod) != node_selector(want_pod) {
        changes.push("nodeSelector");
    }
    if tolerations(live_pod) != tolerations(want_pod) {
        changes.push("tolerations");
    }
    if !volumes_equal(
        live_pod.and_then(|p| p.volumes.as_ref()),
        want_pod.and_then(|p| p.volumes.as_ref()),
    ) {
        changes.push("volumes");
    }
    if !container_lists_equal(
        live_pod.and_then(|p| p.init_containers.as_ref()),
        want_pod.and_then(|p| p.init_containers.as_ref()),
    ) {
        changes.push("initContainers");
    }
    if !container_lists_equal(
        live_pod.map(|p| &p.containers),
        want_pod.map(|p| &p.containers),
    ) {
        changes.push("containers");
    }
    changes
}

impl Equivalent for Deployment {
    fn equivalent(&self, desired: &Self) -> bool {
        deployment_changes(self, desired).is_empty()
    }

    fn merge_from(&mut self, desired: &Self) {
        self.spec.clone_from(&desired.spec);
        self.metadata.labels.clone_from(&desired.metadata.labels);
        // Fingerprints of switched-off features must go with them.
        if let Some(annotations) = self.metadata.annotations.as_mut() {
            annotations.retain(|key, _| !key.starts_with("hash/"));
        }
        merge_annotations(&mut self.metadata, &desired.metadata);
    }
}

#[cfg(test)]
#[path = "comparators_tests.rs"]
mod comparators_tests;
