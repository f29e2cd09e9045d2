//! Concurrent park/exit traffic against shared lots.
//!
//! Every scenario checks the same end state: each occupied space belongs to
//! exactly one parked vehicle, and each van holds either one space or three
//! adjacent ones, never a partial set.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use lot_allocator::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ════════════════════════════════════════════════════════════
// INFRASTRUCTURE
// ════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct StressReport {
    parks_ok: AtomicU64,
    parks_rejected: AtomicU64,
    parks_conflicted: AtomicU64,
    exits_ok: AtomicU64,
    exits_missing: AtomicU64,
    unexpected: AtomicU64,
}

impl StressReport {
    fn total(&self) -> u64 {
        [
            &self.parks_ok,
            &self.parks_rejected,
            &self.parks_conflicted,
            &self.exits_ok,
            &self.exits_missing,
            &self.unexpected,
        ]
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .sum()
    }

    fn print(&self, name: &str, elapsed: Duration) {
        eprintln!(
            "[{name}] ops={} parked={} rejected={} conflicted={} exited={} missing={} unexpected={} in {elapsed:?}",
            self.total(),
            self.parks_ok.load(Ordering::Relaxed),
            self.parks_rejected.load(Ordering::Relaxed),
            self.parks_conflicted.load(Ordering::Relaxed),
            self.exits_ok.load(Ordering::Relaxed),
            self.exits_missing.load(Ordering::Relaxed),
            self.unexpected.load(Ordering::Relaxed),
        );
    }
}

/// Long gate waits so slow machines report real conflicts, not timeouts.
fn patient_service() -> ParkingService {
    let mut config = Config::default();
    config.engine.lock_timeout_ms = 5_000;
    ParkingService::new(&config)
}

fn request(kind: u8, lot: &str, plate: &str) -> ParkRequest {
    ParkRequest {
        kind,
        lot_name: lot.to_string(),
        license_plate: plate.to_string(),
    }
}

/// Ledger and registry agree, and no vehicle holds a malformed footprint.
fn assert_consistent(svc: &ParkingService) {
    let parked = svc.parked_vehicles();
    let mut expected: HashMap<String, HashMap<usize, VehicleId>> = HashMap::new();
    for vehicle in &parked {
        let spaces = &vehicle.spaces;
        match spaces.as_slice() {
            [_] => {}
            [a, b, c] => {
                assert_eq!(vehicle.kind, Kind::Van, "{vehicle:?}");
                assert_eq!((*b, *c), (a + 1, a + 2), "{vehicle:?}");
            }
            other => panic!("vehicle {} holds {other:?}", vehicle.license_plate),
        }
        let lot = expected.entry(vehicle.lot.clone()).or_default();
        for &index in spaces {
            assert!(
                lot.insert(index, vehicle.id).is_none(),
                "space {index} in {} held twice",
                vehicle.lot
            );
        }
    }

    for name in svc.lot_names() {
        let snap = svc.lot_snapshot(&name).unwrap();
        let wanted = expected.remove(&name).unwrap_or_default();
        for space in snap.spaces() {
            let holder = space.occupant.map(|o| o.vehicle);
            assert_eq!(
                holder,
                wanted.get(&space.index).copied(),
                "space {} in {name}",
                space.index
            );
        }
    }
    assert!(expected.is_empty(), "vehicles in unknown lots: {expected:?}");
}

// ════════════════════════════════════════════════════════════
// SCENARIO: two vans race for one car triplet
// ════════════════════════════════════════════════════════════

#[test]
fn two_vans_one_triplet_exactly_one_wins() {
    for round in 0..50 {
        let svc = Arc::new(patient_service());
        svc.create_lot("race", &[2, 2, 2, 1]).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["VAN-A", "VAN-B"]
            .into_iter()
            .map(|plate| {
                let svc = Arc::clone(&svc);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    svc.park(&request(3, "race", plate))
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<&ParkOutcome> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1, "round {round}: {results:?}");
        assert_eq!(winners[0].occupied_space_indices, vec![0, 1, 2]);

        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(
            matches!(
                loser,
                LotError::NoSpotAvailable { .. } | LotError::AllocationConflict { .. }
            ),
            "round {round}: unexpected {loser:?}"
        );

        let status = svc.lot_status("race").unwrap();
        assert_eq!(status.spots_taken_by_vans, 3);
        assert_eq!(status.motorcycle_spots_available, 1);
        assert_consistent(&svc);
    }
}

// ════════════════════════════════════════════════════════════
// SCENARIO: observers never see a partial triplet
// ════════════════════════════════════════════════════════════

#[test]
fn observer_never_sees_partial_van_footprint() {
    let svc = Arc::new(patient_service());
    svc.create_lot("watch", &[2, 2, 2, 2, 2, 2]).unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let observer = {
        let svc = Arc::clone(&svc);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut looks = 0_u64;
            loop {
                let snap = svc.lot_snapshot("watch").unwrap();
                let mut per_vehicle: HashMap<VehicleId, usize> = HashMap::new();
                for space in snap.spaces() {
                    if let Some(occupant) = space.occupant {
                        *per_vehicle.entry(occupant.vehicle).or_default() += 1;
                    }
                }
                for (vehicle, held) in per_vehicle {
                    assert_eq!(held, 3, "vehicle {vehicle} seen holding {held} spaces");
                }
                looks += 1;
                if stop.load(Ordering::Relaxed) {
                    break looks;
                }
            }
        })
    };

    let workers: Vec<_> = (0..2)
        .map(|w| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                for i in 0..300 {
                    let plate = format!("W{w}-{i}");
                    if svc.park(&request(3, "watch", &plate)).is_ok() {
                        svc.exit(&plate).unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    let looks = observer.join().unwrap();
    assert!(looks > 0);
    assert!(svc.parked_vehicles().is_empty());
    assert_eq!(svc.lot_status("watch").unwrap().car_spots_available, 6);
}

// ════════════════════════════════════════════════════════════
// SCENARIO: same plate from many threads
// ════════════════════════════════════════════════════════════

#[test]
fn same_plate_parks_at_most_once() {
    let svc = Arc::new(patient_service());
    svc.create_lot("plates", &[2; 16]).unwrap();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                svc.park(&request(2, "plates", "SAME"))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LotError::DuplicateVehicle { .. }))
    );
    assert_eq!(svc.lot_status("plates").unwrap().car_spots_available, 15);
    assert_consistent(&svc);
}

// ════════════════════════════════════════════════════════════
// SCENARIO: randomized mixed traffic
// ════════════════════════════════════════════════════════════

#[test]
fn randomized_mixed_traffic_keeps_ledger_consistent() {
    const THREADS: usize = 6;
    const OPS_PER_THREAD: usize = 400;
    let lots = ["alpha", "beta"];

    let svc = Arc::new(patient_service());
    svc.create_lot("alpha", &[1, 1, 2, 2, 2, 2, 2, 3, 3, 2, 2, 2])
        .unwrap();
    svc.create_lot("beta", &[2, 2, 2, 1, 2, 2, 2]).unwrap();

    let report = Arc::new(StressReport::default());
    let start = Instant::now();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let svc = Arc::clone(&svc);
            let report = Arc::clone(&report);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(0x10_7A + t as u64);
                let mut mine: Vec<String> = Vec::new();
                for i in 0..OPS_PER_THREAD {
                    let exit_now = !mine.is_empty() && rng.random_bool(0.45);
                    if exit_now {
                        let at = rng.random_range(0..mine.len());
                        let plate = mine.swap_remove(at);
                        match svc.exit(&plate) {
                            Ok(_) => report.exits_ok.fetch_add(1, Ordering::Relaxed),
                            Err(LotError::NoSuchVehicle { .. }) => {
                                report.exits_missing.fetch_add(1, Ordering::Relaxed)
                            }
                            Err(_) => report.unexpected.fetch_add(1, Ordering::Relaxed),
                        };
                    } else {
                        let kind = rng.random_range(1..=3_u8);
                        let lot = lots[rng.random_range(0..lots.len())];
                        let plate = format!("T{t}N{i}");
                        match svc.park(&request(kind, lot, &plate)) {
                            Ok(_) => {
                                mine.push(plate);
                                report.parks_ok.fetch_add(1, Ordering::Relaxed)
                            }
                            Err(LotError::NoSpotAvailable { .. }) => {
                                report.parks_rejected.fetch_add(1, Ordering::Relaxed)
                            }
                            Err(LotError::AllocationConflict { .. }) => {
                                report.parks_conflicted.fetch_add(1, Ordering::Relaxed)
                            }
                            Err(_) => report.unexpected.fetch_add(1, Ordering::Relaxed),
                        };
                    }
                }
                mine
            })
        })
        .collect();

    let mut still_parked = BTreeSet::new();
    for handle in handles {
        still_parked.extend(handle.join().unwrap());
    }
    report.print("mixed_traffic", start.elapsed());

    assert_eq!(report.unexpected.load(Ordering::Relaxed), 0);
    assert_eq!(report.exits_missing.load(Ordering::Relaxed), 0);
    assert_eq!(report.total(), (THREADS * OPS_PER_THREAD) as u64);

    let registered: BTreeSet<String> = svc
        .parked_vehicles()
        .into_iter()
        .map(|v| v.license_plate)
        .collect();
    assert_eq!(registered, still_parked);
    assert_consistent(&svc);

    for plate in &still_parked {
        svc.exit(plate).unwrap();
    }
    let alpha = svc.lot_status("alpha").unwrap();
    assert_eq!(
        (
            alpha.motorcycle_spots_available,
            alpha.car_spots_available,
            alpha.van_spots_available,
            alpha.spots_taken_by_vans,
        ),
        (2, 8, 2, 0)
    );
    let beta = svc.lot_status("beta").unwrap();
    assert_eq!(beta.car_spots_available, 6);
    assert_eq!(beta.motorcycle_spots_available, 1);
}
