use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use bof_core::{Filters, OrderBy, PageRequest, RequestContext, TenantId};
use bof_events::NoopSink;
use bof_infra::{InMemoryEntityStore, Repository};
use bof_parties::{Partner, PartnerDraft};

type PartnerRepo = Repository<Partner, InMemoryEntityStore<Partner>, NoopSink>;

fn drafts(count: usize, offset: usize) -> Vec<PartnerDraft> {
    (0..count)
        .map(|i| {
            let n = offset + i;
            let kind = if n % 3 == 0 { "supplier" } else { "customer" };
            PartnerDraft::new(format!("Partner {n:05}"))
                .with_code(format!("P{n:05}"))
                .with_type(kind)
        })
        .collect()
}

/// Repository with `rows` partners in tenant 1 and a few in tenant 2.
fn seeded(rows: usize) -> PartnerRepo {
    let repo = Repository::new(InMemoryEntityStore::new(), NoopSink);
    repo.bulk_create(&RequestContext::new(TenantId::new(1)), drafts(rows, 0))
        .unwrap();
    repo.bulk_create(&RequestContext::new(TenantId::new(2)), drafts(10, 0))
        .unwrap();
    repo
}

fn bench_create_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_latency");
    group.sample_size(500);

    group.bench_function("create_partner_with_code", |b| {
        let repo = seeded(0);
        let ctx = RequestContext::new(TenantId::new(1));
        let mut n = 0usize;

        b.iter(|| {
            n += 1;
            let draft = PartnerDraft::new("ACME").with_code(format!("C{n}"));
            black_box(repo.create(&ctx, draft).unwrap());
        });
    });

    group.finish();
}

fn bench_bulk_create_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_create_throughput");

    for batch_size in [1usize, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                let ctx = RequestContext::new(TenantId::new(1));
                b.iter_batched(
                    || (seeded(0), drafts(batch_size, 0)),
                    |(repo, batch)| black_box(repo.bulk_create(&ctx, batch).unwrap()),
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

fn bench_list_pages(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_pages");

    for rows in [100usize, 1000, 10000].iter() {
        let repo = seeded(*rows);
        let ctx = RequestContext::new(TenantId::new(1));
        let by_name: OrderBy = "-name".parse().unwrap();

        group.bench_with_input(BenchmarkId::new("first_page", rows), rows, |b, _| {
            b.iter(|| {
                let page = repo
                    .list(&ctx, &Filters::default(), PageRequest::page(1, 50).unwrap(), None)
                    .unwrap();
                black_box(page.total)
            });
        });

        group.bench_with_input(BenchmarkId::new("suppliers_by_name", rows), rows, |b, _| {
            let suppliers = Partner::suppliers();
            b.iter(|| {
                let page = repo
                    .list(&ctx, &suppliers, PageRequest::page(2, 50).unwrap(), Some(&by_name))
                    .unwrap();
                black_box(page.items.len())
            });
        });
    }

    group.finish();
}

fn bench_get_by_code(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_by_code");

    for rows in [100usize, 10000].iter() {
        let repo = seeded(*rows);
        let ctx = RequestContext::new(TenantId::new(1));
        let code = format!("p{:05}", rows / 2);

        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            b.iter(|| black_box(repo.get_by_code(&ctx, &code).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_create_latency,
    bench_bulk_create_throughput,
    bench_list_pages,
    bench_get_by_code
);
criterion_main!(benches);
