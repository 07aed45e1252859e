//! Randomized invariant checks for the order book.
//!
//! Each case replays a seeded stream of inserts, matches, changes and
//! removes (including ids that were never live) and checks after every step
//! that each level equals the sum and count of its live orders.

use std::collections::BTreeMap;

use lob_mirror::orderbook::{InstrumentBook, OrderBook};
use lob_mirror::types::{FeedEvent, OrderId, Side};
use lob_mirror::Error;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

const STEPS: usize = 2_000;

/// Prices on a coarse grid so that orders share levels
fn price(rng: &mut StdRng) -> Decimal {
    Decimal::new(rng.gen_range(9_990..10_010), 2)
}

fn size(rng: &mut StdRng) -> Decimal {
    Decimal::new(rng.gen_range(1..500), 2)
}

fn random_id(rng: &mut StdRng) -> OrderId {
    // Ids wrap so that duplicates and stale references happen regularly
    OrderId::from(rng.gen_range(0..300u64))
}

fn step(book: &mut OrderBook, rng: &mut StdRng) -> Result<(), Error> {
    let id = random_id(rng);
    match rng.gen_range(0..10) {
        0..=3 => book.receive_insert(id, price(rng), size(rng)),
        4..=5 => book.receive_match(&id, size(rng)),
        6..=7 => book.receive_change(&id, size(rng)),
        8 => book.receive_change(&id, Decimal::ZERO),
        _ => book.receive_remove(&id),
    }
}

#[test]
fn test_random_streams_keep_levels_consistent() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let side = if seed % 2 == 0 { Side::Bid } else { Side::Ask };
        let mut book = OrderBook::new("RAND", side, 15);

        for i in 0..STEPS {
            let before = book.len();
            match step(&mut book, &mut rng) {
                Ok(()) => {}
                Err(Error::DuplicateOrder(_) | Error::UnknownOrder(_)) => {
                    // Rejected events never mutate state
                    assert_eq!(book.len(), before, "seed {seed} step {i}");
                }
                Err(other) => panic!("seed {seed} step {i}: unexpected {other}"),
            }
            if let Err(e) = book.verify_consistency() {
                panic!("seed {seed} step {i}: {e}");
            }
        }
    }
}

#[test]
fn test_depth_matches_reference_model() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut book = OrderBook::new("RAND", Side::Bid, 10);
    let mut live: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();

    for _ in 0..STEPS {
        let id = random_id(&mut rng);
        match rng.gen_range(0..3) {
            0 => {
                let (p, s) = (price(&mut rng), size(&mut rng));
                if book.receive_insert(id.clone(), p, s).is_ok() {
                    live.insert(id.as_str().to_string(), (p, s));
                }
            }
            1 => {
                let filled = size(&mut rng);
                if book.receive_match(&id, filled).is_ok() {
                    let key = id.as_str().to_string();
                    let remaining = live[&key].1 - filled;
                    if remaining > Decimal::ZERO {
                        live.get_mut(&key).unwrap().1 = remaining;
                    } else {
                        live.remove(&key);
                    }
                }
            }
            _ => {
                if book.receive_remove(&id).is_ok() {
                    live.remove(id.as_str());
                }
            }
        }
    }

    let mut expected: BTreeMap<Decimal, (Decimal, u32)> = BTreeMap::new();
    for (p, s) in live.values() {
        let entry = expected.entry(*p).or_insert((Decimal::ZERO, 0));
        entry.0 += *s;
        entry.1 += 1;
    }

    // Warm-up hides everything
    assert_eq!(book.depth(10).count(), 0);
    book.mark_ready();

    let rows: Vec<_> = book.depth(100).collect();
    assert_eq!(rows.len(), expected.len().min(10));
    for (row, (p, (s, n))) in rows.iter().zip(expected.iter().rev()) {
        assert_eq!(row.price, *p);
        assert_eq!(row.size, *s);
        assert_eq!(row.order_count, *n);
    }
    assert_eq!(book.len(), live.len());
}

#[test]
fn test_clear_is_idempotent_after_random_stream() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut book = OrderBook::new("RAND", Side::Ask, 15);
    for _ in 0..500 {
        let _ = step(&mut book, &mut rng);
    }
    book.mark_ready();

    book.clear();
    let (len, levels, warming) = (book.len(), book.num_levels(), book.is_warming_up());
    book.clear();

    assert_eq!((len, levels, warming), (0, 0, true));
    assert_eq!((book.len(), book.num_levels(), book.is_warming_up()), (len, levels, warming));
    assert!(book.best().is_none());
}

#[test]
fn test_warm_up_only_ends_on_ready() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut book = InstrumentBook::new("rand", "RAND", 15);

    for _ in 0..200 {
        let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
        let event = FeedEvent::insert(random_id(&mut rng), side, price(&mut rng), size(&mut rng));
        let _ = book.route(event);
        assert!(book.is_warming_up());
        assert!(book.bids().best().is_none() && book.asks().best().is_none());
    }

    book.mark_side_ready(Side::Bid);
    assert!(book.is_warming_up());
    book.mark_side_ready(Side::Ask);
    assert!(!book.is_warming_up());

    for _ in 0..200 {
        let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
        let _ = book.route(FeedEvent::remove(random_id(&mut rng), side));
        assert!(!book.is_warming_up());
    }
}
