use calrecon_core::DriftDetector;
use calrecon_domain::constants::PROP_IDENTITY;
use calrecon_domain::{
    Attributes, DateRange, EventFields, EventRecord, Identity, LiveEvent, SourceKind,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const LOCATION: &str = "work";

fn sample(count: usize) -> (Vec<LiveEvent>, Vec<EventRecord>) {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let mut live = Vec::with_capacity(count);
    let mut records = Vec::with_capacity(count);

    for idx in 0..count {
        let start = base + Duration::hours(i64::try_from(idx).unwrap_or(0));
        let fields = EventFields {
            summary: format!("Session {idx}"),
            location: "Hoover 105".to_string(),
            description: String::new(),
            start,
            end: start + Duration::minutes(50),
            all_day: false,
        };
        let identity = Identity::reservation(&format!("R{idx}"));
        let external_ref = format!("evt-{idx}");

        let kind = SourceKind::FedClass;
        let mut record = EventRecord::new(identity.clone(), LOCATION, kind, fields.clone(), base);
        record.external_ref = Some(external_ref.clone());
        // Every tenth record has gone missing from the calendar.
        if idx % 10 != 0 {
            let mut props = Attributes::new();
            props.insert(PROP_IDENTITY.to_string(), identity.to_string());
            live.push(LiveEvent {
                external_ref,
                uid: Some(format!("evt-{idx}@google.com")),
                instance_start: None,
                recurrence: None,
                fields,
                private_properties: props,
                declined: false,
                cancelled: false,
                organizer_self: true,
            });
        }
        records.push(record);
    }

    (live, records)
}

fn detect_benchmark(c: &mut Criterion) {
    let detector = DriftDetector::new(vec!["Classes".to_string()]);
    let window = DateRange::new(
        NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
    )
    .unwrap()
    .to_window();
    let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();

    let mut group = c.benchmark_group("drift_detector");
    group.sample_size(20).measurement_time(std::time::Duration::from_secs(10));

    for count in [100_usize, 1_000, 5_000] {
        let (live, records) = sample(count);
        group.bench_with_input(BenchmarkId::new("detect", count), &count, |b, _| {
            b.iter(|| {
                let report =
                    detector.detect(LOCATION, window, black_box(&live), black_box(&records), now);
                black_box(report.drifts.len());
            });
        });
    }

    group.finish();
}

criterion_group!(core_benchmarks, detect_benchmark);
criterion_main!(core_benchmarks);
