//! End-to-end resolution scenarios against a mock fetcher

mod common;

use common::{engine, license_text, memory_config, MockFetcher};
use license_resolver::{
    ArtifactSignals, DeclaredLicense, Expression, RawSignal, Registry, StaticSignalSource,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn declared_name_resolves_without_network() {
    let fetcher = Arc::new(MockFetcher::new());
    let engine = engine(memory_config(), StaticSignalSource::new(), fetcher.clone());

    let expression = engine.normalize(&RawSignal::declared(Some("MIT"), vec![])).await;
    assert_eq!(expression, Expression::single("MIT"));
    assert!(expression.is_fully_identified());
    assert_eq!(fetcher.total(), 0);
}

#[tokio::test]
async fn declared_url_resolves_by_fetched_text() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve_text("https://example.test/LICENSE", &license_text("Apache-2.0"));
    let engine = engine(memory_config(), StaticSignalSource::new(), fetcher.clone());

    let signal = RawSignal::declared(None, vec!["https://example.test/LICENSE".into()]);
    assert_eq!(engine.normalize(&signal).await, Expression::single("Apache-2.0"));
}

#[tokio::test]
async fn copyleft_texts_resolve_by_content() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve_text("https://example.test/COPYING", &license_text("GPL-3.0-only"));
    fetcher.serve_text("https://example.test/COPYING.LESSER", &license_text("LGPL-2.1-only"));
    let engine = engine(memory_config(), StaticSignalSource::new(), fetcher);

    assert_eq!(
        engine.resolve_url(None, "https://example.test/COPYING").await,
        Expression::single("GPL-3.0-only")
    );
    assert_eq!(
        engine.resolve_url(None, "https://example.test/COPYING.LESSER").await,
        Expression::single("LGPL-2.1-only")
    );
}

#[tokio::test]
async fn html_page_resolves_from_content_paragraphs() {
    let paragraphs: String = license_text("MIT")
        .split("\n\n")
        .map(|p| format!("<p>{}</p>", p.replace('<', "&lt;").replace('>', "&gt;")))
        .collect();
    let page = format!(
        "<!DOCTYPE html><html><head><title>MIT</title></head><body>\
         <nav><a href=\"/\">Home</a> <a href=\"/about\">About</a></nav>\
         <div class=\"content\">{}</div>\
         <footer><p>Hosted by Example &amp; Co.</p></footer></body></html>",
        paragraphs
    );
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve_html("https://example.test/mit.html", &page);
    let engine = engine(memory_config(), StaticSignalSource::new(), fetcher);

    assert_eq!(
        engine.resolve_url(None, "https://example.test/mit.html").await,
        Expression::single("MIT")
    );
}

#[tokio::test]
async fn unknown_text_stays_unresolved() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve_text(
        "https://example.test/custom.txt",
        "FooCorp grants you nothing at all. Do not redistribute.",
    );
    let engine = engine(memory_config(), StaticSignalSource::new(), fetcher.clone());

    let signal = RawSignal::declared(
        Some("FooCorp Custom License"),
        vec!["https://example.test/custom.txt".into()],
    );
    match engine.normalize(&signal).await {
        Expression::Unresolved(unresolved) => {
            assert_eq!(unresolved.raw_id, "FooCorp Custom License");
            assert_eq!(unresolved.source_urls, vec!["https://example.test/custom.txt".to_string()]);
            assert!(unresolved.raw_text.contains("FooCorp grants you nothing"));
        }
        other => panic!("expected unresolved, got {}", other),
    }
}

#[tokio::test]
async fn bundle_header_becomes_disjunction() {
    let source = StaticSignalSource::new().with(
        "org.example:dual:1.0",
        ArtifactSignals {
            bundle_header: Some("Apache-2.0, MIT".into()),
            ..Default::default()
        },
    );
    let engine = engine(memory_config(), source, Arc::new(MockFetcher::new()));

    let expression = engine.get("org.example:dual:1.0").await;
    assert_eq!(expression.to_string(), "(Apache-2.0 OR MIT)");
}

#[tokio::test]
async fn declared_license_beats_unreadable_scan() {
    let source = StaticSignalSource::new().with(
        "org.example:lib:2.0",
        ArtifactSignals {
            archive_url: Some("https://repo.test/lib-2.0/".into()),
            declared: vec![DeclaredLicense::new(
                Some("The Apache Software License, Version 2.0"),
                Some("http://www.apache.org/licenses/LICENSE-2.0.txt"),
            )],
            bundle_header: None,
            license_files: vec!["META-INF/LICENSE".into(), "META-INF/NOTICE".into()],
        },
    );
    let fetcher = Arc::new(MockFetcher::new());
    let engine = engine(memory_config(), source, fetcher.clone());

    assert_eq!(engine.get("org.example:lib:2.0").await, Expression::single("Apache-2.0"));
    // Only the license file was fetched; NOTICE is not a license file.
    assert_eq!(fetcher.calls("https://repo.test/lib-2.0/META-INF/LICENSE"), 1);
    assert_eq!(fetcher.total(), 1);
}

#[tokio::test]
async fn scanned_license_file_fills_missing_declaration() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve_text("https://repo.test/x/LICENSE.txt", &license_text("BSD-2-Clause"));
    let source = StaticSignalSource::new().with(
        "org.example:x:1",
        ArtifactSignals {
            archive_url: Some("https://repo.test/x/".into()),
            license_files: vec!["LICENSE.txt".into()],
            ..Default::default()
        },
    );
    let engine = engine(memory_config(), source, fetcher);
    assert_eq!(engine.get("org.example:x:1").await, Expression::single("BSD-2-Clause"));
}

#[tokio::test]
async fn redirect_chain_converges_and_caches_every_hop() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve_redirect("https://a.test/L", "https://b.test/L");
    fetcher.serve_redirect("https://b.test/L", "/moved");
    fetcher.serve_redirect("https://b.test/moved", "https://d.test/LICENSE");
    fetcher.serve_text("https://d.test/LICENSE", &license_text("Zlib"));
    let engine = engine(memory_config(), StaticSignalSource::new(), fetcher.clone());

    assert_eq!(engine.resolve_url(None, "https://a.test/L").await, Expression::single("Zlib"));
    assert_eq!(fetcher.total(), 4);

    for hop in ["https://b.test/L", "https://b.test/moved", "https://d.test/LICENSE"] {
        assert_eq!(engine.resolve_url(None, hop).await, Expression::single("Zlib"));
    }
    assert_eq!(fetcher.total(), 4);
    assert_eq!(engine.registry().by_url("https://a.test/L").unwrap().id.as_str(), "Zlib");
}

#[tokio::test]
async fn resolution_is_idempotent() {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.serve_text("https://repo.test/y/LICENSE", &license_text("ISC"));
    let source = StaticSignalSource::new().with(
        "org.example:y:1",
        ArtifactSignals {
            declared: vec![DeclaredLicense::new(None, Some("https://repo.test/y/LICENSE"))],
            ..Default::default()
        },
    );
    let engine = engine(memory_config(), source, fetcher.clone());

    let first = engine.get("org.example:y:1").await;
    let second = engine.get("org.example:y:1").await;
    assert_eq!(first, second);
    assert_eq!(first, Expression::single("ISC"));
    assert_eq!(fetcher.total(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolution_fetches_once() {
    let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(50)));
    fetcher.serve_text("https://shared.test/LICENSE", &license_text("MIT"));

    let mut source = StaticSignalSource::new();
    let keys: Vec<String> = (0..12).map(|i| format!("org.example:m{}:1", i)).collect();
    for key in &keys {
        source.insert(
            key.clone(),
            ArtifactSignals {
                declared: vec![DeclaredLicense::new(None, Some("https://shared.test/LICENSE"))],
                ..Default::default()
            },
        );
    }
    let engine = engine(memory_config(), source, fetcher.clone());

    let report = engine.resolve_all(&keys).await;
    assert_eq!(report.results.len(), 12);
    assert_eq!(report.fully_identified(), 12);
    assert!(report.unresolved().is_empty());
    assert_eq!(
        report.results.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(),
        keys
    );
    assert_eq!(fetcher.calls("https://shared.test/LICENSE"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redirect_hop_waits_for_in_flight_fetch() {
    let fetcher = Arc::new(MockFetcher::with_delay(Duration::from_millis(100)));
    fetcher.serve_redirect("https://a.test/LICENSE", "https://b.test/LICENSE");
    fetcher.serve_text("https://b.test/LICENSE", &license_text("MIT"));
    let engine = engine(memory_config(), StaticSignalSource::new(), fetcher.clone());

    let (via_redirect, direct) = tokio::join!(
        engine.resolve_url(None, "https://a.test/LICENSE"),
        engine.resolve_url(None, "https://b.test/LICENSE"),
    );
    assert_eq!(via_redirect, Expression::single("MIT"));
    assert_eq!(direct, Expression::single("MIT"));
    assert_eq!(fetcher.calls("https://a.test/LICENSE"), 1);
    assert_eq!(fetcher.calls("https://b.test/LICENSE"), 1);
}

#[tokio::test]
async fn failing_urls_degrade_without_blocking_the_batch() {
    let source = StaticSignalSource::new()
        .with(
            "g:broken:1",
            ArtifactSignals {
                declared: vec![DeclaredLicense::new(Some("Mystery"), Some("https://gone.test/L"))],
                ..Default::default()
            },
        )
        .with(
            "g:fine:1",
            ArtifactSignals {
                declared: vec![DeclaredLicense::named("BSD 3-Clause")],
                ..Default::default()
            },
        );
    let engine = engine(memory_config(), source, Arc::new(MockFetcher::new()));

    let report = engine.resolve_all(&["g:broken:1", "g:fine:1"]).await;
    assert_eq!(report.unresolved(), vec!["g:broken:1"]);
    assert!(report.results[0].1.is_unresolved());
    assert_eq!(report.results[1].1, Expression::single("BSD-3-Clause"));
}

#[test]
fn alias_normalization() {
    let registry = Registry::bundled().unwrap();
    let a = registry.lookup("Apache License, Version 2.0").unwrap();
    let b = registry.lookup("apache-license-2.0").unwrap();
    let c = registry.lookup("Apache-2.0").unwrap();
    assert_eq!(a.id, c.id);
    assert_eq!(b.id, c.id);
}

#[tokio::test]
async fn project_license_and_verification() {
    let engine = engine(memory_config(), StaticSignalSource::new(), Arc::new(MockFetcher::new()));

    let declared = [RawSignal::declared(Some("The MIT License"), vec![])];
    let expression = engine.resolve_project_license(&declared).await;
    assert_eq!(expression, Expression::single("MIT"));

    assert!(engine.verify_license_text(&expression, &license_text("MIT")));
    assert!(!engine.verify_license_text(&expression, &license_text("ISC")));
    let dual = Expression::any_of([Expression::single("MIT"), Expression::single("ISC")]);
    assert!(!engine.verify_license_text(&dual, &license_text("MIT")));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("LICENSE");
    std::fs::write(&path, license_text("MIT")).unwrap();
    assert!(engine.verify_license_file(&expression, &path).await.unwrap());
    assert!(engine.verify_license_file(&expression, &dir.path().join("missing")).await.is_err());
}

#[tokio::test]
async fn unpacked_archive_is_scanned() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("META-INF")).unwrap();
    std::fs::write(
        dir.path().join("META-INF/MANIFEST.MF"),
        "Manifest-Version: 1.0\nBundle-License: BSL-1.0\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("META-INF/LICENSE"), license_text("BSL-1.0")).unwrap();

    let signals = license_resolver::ingest::scan_extracted(dir.path());
    let source = StaticSignalSource::new().with("org.boost:b:1", signals);

    // Real fetcher: license files are read through file: URLs.
    let engine = license_resolver::LicenseEngine::new(memory_config(), Arc::new(source)).unwrap();
    assert_eq!(engine.get("org.boost:b:1").await, Expression::single("BSL-1.0"));
}
