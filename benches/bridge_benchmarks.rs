//! Performance benchmarks for the live bridge hot paths
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use waav_live_bridge::core::bridge::{ClientEnvelope, ClientMessage, classify};
use waav_live_bridge::core::render::{HtmlRenderer, MarkupRenderer};

/// Benchmark client frame parsing and chunk classification
fn bench_client_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("client_frames");
    group.measurement_time(Duration::from_secs(5));

    let text_frame = r#"{"realtime_input":{"media_chunks":[{"mime_type":"application/json","data":"hello"}]}}"#;

    // 100 ms of 16 kHz mono PCM, base64 encoded
    let audio_frame = format!(
        r#"{{"realtime_input":{{"media_chunks":[{{"mime_type":"audio/pcm","data":"{}"}}]}}}}"#,
        "AAAA".repeat(1067)
    );

    for (name, frame) in [("text", text_frame.to_string()), ("pcm_100ms", audio_frame)] {
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse_and_classify", name), &frame, |b, frame| {
            b.iter(|| {
                let envelope: ClientEnvelope = serde_json::from_str(black_box(frame)).unwrap();
                for chunk in envelope.realtime_input.unwrap().media_chunks.iter() {
                    let _ = black_box(classify(chunk));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark rendering of model text
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let renderer = HtmlRenderer::new();

    let short = "Here is **one** line.";
    let long = "| Currency | Rate |\n|---|---|\n| EUR | 0.91 |\n\n- item with `code`\n- another *item*\n"
        .repeat(20);

    for (name, text) in [("short", short.to_string()), ("table_list", long)] {
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("html", name), &text, |b, text| {
            b.iter(|| renderer.render(black_box(text)));
        });
    }

    group.finish();
}

/// Benchmark outgoing message serialization
fn bench_outgoing(c: &mut Criterion) {
    let audio = ClientMessage::Audio("UklG".repeat(2000));
    let turn_complete = ClientMessage::turn_complete();

    c.bench_function("serialize_audio", |b| {
        b.iter(|| serde_json::to_string(black_box(&audio)).unwrap())
    });
    c.bench_function("serialize_turn_complete", |b| {
        b.iter(|| serde_json::to_string(black_box(&turn_complete)).unwrap())
    });
}

criterion_group!(benches, bench_client_frames, bench_render, bench_outgoing);
criterion_main!(benches);
