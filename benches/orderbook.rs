//! Benchmarks for orderbook operations.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lob_mirror::orderbook::{InstrumentBook, OrderBook};
use lob_mirror::types::{FeedEvent, OrderId, Side};
use rust_decimal::Decimal;

/// One order per level, prices 100.00, 100.01, ...
fn populated(levels: u64) -> OrderBook {
    let mut book = OrderBook::new("BENCH", Side::Bid, 15);
    for i in 0..levels {
        let price = Decimal::new(10_000 + i as i64, 2);
        book.receive_insert(OrderId::from(i), price, Decimal::ONE).unwrap();
    }
    book.mark_ready();
    book
}

fn bench_insert_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_insert_remove");

    for size in [10u64, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut book = populated(size);
            let id = OrderId::from("bench");
            let price = Decimal::new(10_000 + size as i64 / 2, 2);

            b.iter(|| {
                // Joins an existing level, then leaves it
                book.receive_insert(id.clone(), black_box(price), Decimal::TWO).unwrap();
                book.receive_remove(black_box(&id)).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_change(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_change");

    for size in [10u64, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut book = populated(size);
            let id = OrderId::from(size / 2);
            let sizes = [Decimal::TWO, Decimal::ONE];
            let mut flip = 0;

            b.iter(|| {
                flip ^= 1;
                book.receive_change(black_box(&id), sizes[flip]).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_best(c: &mut Criterion) {
    let mut group = c.benchmark_group("orderbook_best");

    for size in [10u64, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let book = populated(size);

            b.iter(|| {
                black_box(book.best());
            });
        });
    }

    group.finish();
}

fn bench_depth(c: &mut Criterion) {
    let book = populated(1000);

    c.bench_function("orderbook_depth_15", |b| {
        b.iter(|| {
            black_box(book.depth(black_box(15)).count());
        });
    });
}

fn bench_route_and_describe(c: &mut Criterion) {
    let mut book = InstrumentBook::new("bench", "BENCH", 15);

    // Set up a realistic book
    for i in 1..=50i64 {
        let bid = FeedEvent::insert(format!("b{i}"), Side::Bid, Decimal::new(9_900 - i, 2), Decimal::ONE);
        let ask = FeedEvent::insert(format!("a{i}"), Side::Ask, Decimal::new(10_100 + i, 2), Decimal::ONE);
        book.route(bid).unwrap();
        book.route(ask).unwrap();
    }
    book.mark_side_ready(Side::Bid);
    book.mark_side_ready(Side::Ask);

    c.bench_function("instrument_route_match", |b| {
        let refill = FeedEvent::change("b1", Side::Bid, Decimal::ONE);
        let fill = FeedEvent::matched("b1", Side::Bid, Decimal::new(5, 1));

        b.iter(|| {
            book.route(black_box(fill.clone())).unwrap();
            book.route(black_box(refill.clone())).unwrap();
        });
    });

    c.bench_function("instrument_describe", |b| {
        b.iter(|| {
            black_box(book.describe());
        });
    });
}

criterion_group!(
    benches,
    bench_insert_remove,
    bench_change,
    bench_best,
    bench_depth,
    bench_route_and_describe
);
criterion_main!(benches);
