mod common;

use common::StaticResolver;
use ctf_gallery::config::PublicConfig;
use ctf_gallery::public::proxy::{check_target, resolve_target};
use ctf_gallery::ssrf::SsrfPolicy;

fn resolver() -> StaticResolver {
    StaticResolver::default()
        .with("admin-api", &["172.18.0.3"])
        .with("intranet.corp", &["10.20.30.40"])
        .with("evil.example", &["93.184.216.34"])
        .with("split.example", &["10.0.0.1", "8.8.8.8"])
        .with("res.cloudinary.com", &["104.18.1.1"])
}

async fn allowed(raw: &str) -> bool {
    let config = PublicConfig::default();
    let policy = SsrfPolicy::default();
    let target = resolve_target(raw, &config).unwrap();
    check_target(&target, &policy, &resolver()).await.allowed
}

#[tokio::test]
async fn listed_hostnames_pass_even_when_they_resolve_publicly() {
    assert!(allowed("https://res.cloudinary.com/demo/image/upload/sample.jpg").await);
}

#[tokio::test]
async fn listed_hostnames_pass_without_resolving() {
    // suid-sim is not in the resolver table
    assert!(allowed("http://suid-sim/").await);
}

#[tokio::test]
async fn private_resolution_passes() {
    assert!(allowed("http://intranet.corp:8000/secrets").await);
    assert!(allowed("http://192.168.1.20/").await);
    assert!(allowed("http://127.0.0.1:8080/status").await);
}

#[tokio::test]
async fn public_and_unresolvable_targets_are_blocked() {
    assert!(!allowed("http://evil.example/").await);
    assert!(!allowed("http://8.8.8.8/").await);
    assert!(!allowed("http://nowhere.invalid/").await);
}

#[tokio::test]
async fn every_address_must_be_private() {
    assert!(!allowed("http://split.example/").await);
}

#[tokio::test]
async fn aliased_admin_target_is_checked_under_its_alias() {
    let config = PublicConfig::default();
    let target = resolve_target("http://localhost:9000/render", &config).unwrap();
    assert_eq!(target.hostname, "admin_api");

    // admin_api is neither listed nor resolvable here
    let verdict = check_target(&target, &SsrfPolicy::default(), &resolver()).await;
    assert!(!verdict.allowed);
    assert!(verdict.resolved.is_empty());

    let verdict = check_target(
        &target,
        &SsrfPolicy::default(),
        &resolver().with("admin_api", &["172.18.0.3"]),
    )
    .await;
    assert!(verdict.allowed);
    assert!(verdict.ips_allowed);
    assert!(!verdict.hostname_listed);
}

#[tokio::test]
async fn custom_policy_replaces_defaults() {
    let policy = SsrfPolicy::new(["100.64.0.0/10"], ["only.me"]).unwrap();
    let config = PublicConfig::default();
    let resolver = resolver().with("cgnat.host", &["100.100.1.1"]);

    let t = resolve_target("http://cgnat.host/", &config).unwrap();
    assert!(check_target(&t, &policy, &resolver).await.allowed);

    let t = resolve_target("http://intranet.corp/", &config).unwrap();
    assert!(!check_target(&t, &policy, &resolver).await.allowed);

    let t = resolve_target("http://only.me/", &config).unwrap();
    assert!(check_target(&t, &policy, &resolver).await.allowed);
}
