//! Background ticking, lifecycle and concurrent access.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use venus_sim::config::SimulatorConfig;
use venus_sim::sim::engine::BatterySimulator;
use venus_sim::sim::mode::Mode;

fn fast_config() -> SimulatorConfig {
    let mut cfg = SimulatorConfig::quiet();
    cfg.simulation.tick_interval_ms = 10;
    cfg
}

#[test]
fn background_thread_ticks() {
    let sim = BatterySimulator::new(&fast_config()).expect("valid config");
    sim.start().expect("started");
    thread::sleep(Duration::from_millis(200));
    sim.stop().expect("clean stop");

    let s = sim.get_state();
    assert!(s.ticks >= 3, "got {} ticks", s.ticks);
    assert!(s.totals.load_wh > 0.0);
}

#[test]
fn start_twice_is_a_no_op() {
    let sim = BatterySimulator::new(&fast_config()).expect("valid config");
    sim.start().expect("started");
    sim.start().expect("second start is accepted");
    assert!(sim.is_running());
    sim.stop().expect("clean stop");
    assert!(!sim.is_running());
}

#[test]
fn stop_freezes_state() {
    let sim = BatterySimulator::new(&fast_config()).expect("valid config");
    sim.start().expect("started");
    thread::sleep(Duration::from_millis(50));
    sim.stop().expect("clean stop");

    let frozen = sim.get_state().ticks;
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sim.get_state().ticks, frozen);
}

#[test]
fn stop_is_prompt_with_long_interval() {
    let mut cfg = SimulatorConfig::quiet();
    cfg.simulation.tick_interval_ms = 10_000;
    let sim = BatterySimulator::new(&cfg).expect("valid config");
    sim.start().expect("started");

    let began = Instant::now();
    sim.stop().expect("clean stop");
    assert!(began.elapsed() < Duration::from_secs(2));
}

#[test]
fn restart_after_stop() {
    let sim = BatterySimulator::new(&fast_config()).expect("valid config");
    sim.start().expect("started");
    sim.stop().expect("clean stop");
    sim.start().expect("restarted");
    assert!(sim.is_running());
    sim.stop().expect("clean stop");
}

#[test]
fn stop_without_start() {
    let sim = BatterySimulator::new(&fast_config()).expect("valid config");
    assert!(sim.stop().is_ok());
    assert!(sim.stop().is_ok());
}

#[test]
fn readers_and_writers_see_consistent_snapshots() {
    let sim = Arc::new(BatterySimulator::new(&fast_config()).expect("valid config"));
    sim.start().expect("started");

    let writer = {
        let sim = Arc::clone(&sim);
        thread::spawn(move || {
            for i in 0..200 {
                let power = if i % 2 == 0 { -1000 } else { 1000 };
                sim.set_mode(common::passive(power, 600)).expect("accepted");
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let sim = Arc::clone(&sim);
            thread::spawn(move || {
                for _ in 0..500 {
                    let s = sim.get_state();
                    assert!((0.0..=100.0).contains(&s.soc));
                    let balance = s.household_w - s.pv_w - s.actual_power_w;
                    assert!((s.grid_power_w - balance).abs() <= 2);
                    if s.mode == Mode::Passive {
                        assert!(s.passive_remaining_secs.is_some());
                    }
                }
            })
        })
        .collect();

    writer.join().expect("writer finished");
    for reader in readers {
        reader.join().expect("reader finished");
    }
    sim.stop().expect("clean stop");

    let s = sim.get_state();
    assert_eq!(s.mode, Mode::Passive);
    // the last write was a discharge request
    assert_eq!(s.actual_power_w, 1000);
}

#[test]
fn drop_stops_the_worker() {
    let sim = BatterySimulator::new(&fast_config()).expect("valid config");
    sim.start().expect("started");
    drop(sim);
}
