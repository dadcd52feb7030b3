//! Registry namespaces to harvest and the tier each one is labelled with

use serde::{Deserialize, Serialize};
use url::Url;

/// Namespace holding the registry's official images
pub const OFFICIAL_NAMESPACE: &str = "library";

/// Publishers whose images carry the verified badge
pub const VERIFIED_PUBLISHERS: &[&str] = &[
    "datadog",
    "grafana",
    "bitnami",
    "rancher",
    "amazon",
    "newrelic",
    "google",
    "nginxnc",
    "docker",
    "kong",
    "hashicorp",
    "mirantis",
    "atlassian",
    "jetbrains",
    "cimg",
    "intel",
    "snyk",
    "redhat",
    "ksamweb",
    "circleci",
];

/// Open source projects sponsored by the registry
pub const SPONSORED_OSS_NAMESPACES: &[&str] = &[
    "fluent",
    "istio",
    "containerrr",
    "envoyproxy",
    "jenkins",
    "linuxserver",
    "fluxcd",
    "apache",
    "pihole",
    "moby",
    "selenium",
    "itzg",
    "alpine",
    "coredns",
    "nodered",
    "localstack",
    "jellyfin",
    "verdaccio",
    "postgis",
    "tautulli",
    "vaultwarden",
    "jupyterhub",
    "requarks",
    "eclipse",
    "gogs",
    "jupyter",
    "paketobuildpacks",
    "crossplane",
    "falcosecurity",
    "kubernetes",
    "projectcontour",
];

/// Classification attached to every record harvested from a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Official,
    Verified,
    Sponsored,
}

impl Tier {
    /// Label stored in the `image_type` column
    pub fn label(self) -> &'static str {
        match self {
            Tier::Official => "Docker Official Image",
            Tier::Verified => "Verified Publisher",
            Tier::Sponsored => "Sponsored OSS",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One namespace to paginate end to end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub namespace: String,
    pub tier: Tier,
}

impl Source {
    pub fn new(namespace: impl Into<String>, tier: Tier) -> Self {
        Self {
            namespace: namespace.into(),
            tier,
        }
    }

    /// First page of this namespace under `registry_base`
    ///
    /// `registry_base` must end with a `/`; [`crate::config::IngestConfig`] guarantees it.
    pub fn root_url(&self, registry_base: &Url) -> Result<Url, url::ParseError> {
        registry_base.join(&format!("{}/", self.namespace))
    }
}

/// The built-in harvest order: official images, then verified publishers, then sponsored OSS
///
/// A namespace appears at most once; the first occurrence wins.
pub fn default_sources() -> Vec<Source> {
    let mut sources = vec![Source::new(OFFICIAL_NAMESPACE, Tier::Official)];

    let tiered = VERIFIED_PUBLISHERS
        .iter()
        .map(|ns| (*ns, Tier::Verified))
        .chain(SPONSORED_OSS_NAMESPACES.iter().map(|ns| (*ns, Tier::Sponsored)));

    for (namespace, tier) in tiered {
        if !sources.iter().any(|s| s.namespace == namespace) {
            sources.push(Source::new(namespace, tier));
        }
    }

    sources
}

/// Narrow `sources` to the given namespaces and tiers, keeping the original order
///
/// Empty filters match everything.
pub fn select_sources(sources: Vec<Source>, namespaces: &[String], tiers: &[Tier]) -> Vec<Source> {
    sources
        .into_iter()
        .filter(|s| namespaces.is_empty() || namespaces.iter().any(|ns| ns == &s.namespace))
        .filter(|s| tiers.is_empty() || tiers.contains(&s.tier))
        .collect()
}
