//! Performance benchmarks for Relman.
//!
//! This module contains benchmarks for:
//! - Format-preserving YAML edits on values documents of growing size
//! - Change detection and shell-safe encoding of the record list
//! - Manifest collection from package.json files
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use relman::chart::{apply_edits, ScalarEdit};
use relman::core::ApplicationId;
use relman::detect::{decode_shell_arg, detect_changes, ReleaseValues};
use relman::{ApplicationRecord, ManifestWriter};

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    use super::*;

    /// Generate a values document with `groups` groups of `components` components.
    pub fn generate_values_yaml(groups: usize, components: usize) -> String {
        let mut out = String::from("# Image tags per component\n");
        for g in 0..groups {
            out.push_str(&format!("group{}:\n", g));
            for c in 0..components {
                out.push_str(&format!("  comp{}:\n", c));
                out.push_str("    # pinned by release pipeline\n");
                out.push_str(&format!("    tag: \"1.{}.{}\"\n", g, c));
                out.push_str("    replicas: 2\n");
                out.push_str("    env:\n      - name: LOG_LEVEL\n        value: info\n");
            }
        }
        out
    }

    /// One tag edit per component of the first `groups` groups.
    pub fn generate_edits(groups: usize, components: usize) -> Vec<ScalarEdit> {
        (0..groups)
            .flat_map(|g| {
                (0..components).map(move |c| {
                    ScalarEdit::new(&[format!("group{}", g), format!("comp{}", c), "tag".into()], "2.0.0")
                })
            })
            .collect()
    }

    /// Generate application ids shaped like `group-component`.
    pub fn generate_apps(count: usize) -> Vec<ApplicationId> {
        (0..count).map(|i| ApplicationId::new(format!("group{}-comp{}", i % 4, i))).collect()
    }

    /// Every other application changed.
    pub fn generate_values(apps: &[ApplicationId]) -> ReleaseValues {
        let mut values = ReleaseValues::new();
        for (i, app) in apps.iter().enumerate() {
            let value = if i % 2 == 0 { format!("1.0.{}", i) } else { "not-changed".to_string() };
            values.insert(app.clone(), value);
        }
        values
    }
}

// ============================================================================
// YAML Editor Benchmarks
// ============================================================================

fn bench_yaml_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("chart/yaml_edit");

    for (groups, components) in [(2, 4), (4, 10), (8, 25)].iter() {
        let text = fixtures::generate_values_yaml(*groups, *components);
        let edits = fixtures::generate_edits(*groups, *components);

        group.throughput(Throughput::Elements(edits.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("apply_edits", edits.len()),
            &(text, edits),
            |b, (text, edits)| {
                b.iter(|| {
                    let result = apply_edits(black_box(text), black_box(edits), "values.yaml");
                    black_box(result)
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Detector Benchmarks
// ============================================================================

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("detect");

    for count in [9, 50, 200].iter() {
        let apps = fixtures::generate_apps(*count);
        let values = fixtures::generate_values(&apps);

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("detect_changes", count), count, |b, _| {
            b.iter(|| {
                let changes = detect_changes(black_box(&apps), black_box(&values), "not-changed")
                    .expect("detection failed");
                black_box(changes.to_shell_line())
            });
        });

        let changes = detect_changes(&apps, &values, "not-changed").expect("detection failed");
        let line = changes.to_shell_line().expect("encoding failed");
        let records = line.split_once(' ').map(|(_, r)| r.to_string()).unwrap_or_default();
        group.bench_with_input(BenchmarkId::new("decode_records", count), &records, |b, records| {
            b.iter(|| {
                let decoded: Vec<ApplicationRecord> =
                    decode_shell_arg(black_box(records)).expect("decoding failed");
                black_box(decoded)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Manifest Benchmarks
// ============================================================================

fn bench_manifest_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest");

    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    for count in [9, 50].iter() {
        let root = temp_dir.path().join(format!("workspace_{}", count));
        let dirs: Vec<String> = (0..*count).map(|i| format!("group{}/comp{}", i % 4, i)).collect();
        for dir in &dirs {
            std::fs::create_dir_all(root.join(dir)).expect("Failed to create app dir");
            std::fs::write(root.join(dir).join("package.json"), r#"{"name": "x", "version": "1.2.3"}"#)
                .expect("Failed to write package.json");
        }

        let writer = ManifestWriter::new(&root, root.join("releases"));
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("collect", count), count, |b, _| {
            b.iter(|| black_box(writer.collect(black_box(&dirs), "v1.0.0")));
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Groups and Main
// ============================================================================

criterion_group!(chart_benches, bench_yaml_edits,);

criterion_group!(detect_benches, bench_detect,);

criterion_group!(manifest_benches, bench_manifest_collect,);

criterion_main!(chart_benches, detect_benches, manifest_benches,);
