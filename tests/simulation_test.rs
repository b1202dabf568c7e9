//! End-to-end simulation tests through the public crate surface.
//!
//! Tests cover:
//! - Scripted multi-day runs: rule fires, ledger math, tick records
//! - Market-closure fallback across a gap day
//! - Registry lifecycle: create, poll, complete, remove
//! - Cancellation observed at a tick boundary mid-run
//! - Panic isolation: a failing provider fails its run, not the registry

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration as StdDuration;

use common::*;
use portsim::domain::simulation::Simulation;
use portsim::runner::{RunRegistry, RunSnapshot, RunStatus};
use uuid::Uuid;

fn wait_terminal(registry: &RunRegistry, id: Uuid) -> RunSnapshot {
    for _ in 0..400 {
        if let Some(snap) = registry.snapshot(id) {
            if snap.status.is_terminal() {
                return snap;
            }
        }
        thread::sleep(StdDuration::from_millis(5));
    }
    panic!("run did not reach a terminal status in time");
}

fn wait_flag(flag: &AtomicBool) {
    for _ in 0..400 {
        if flag.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(StdDuration::from_millis(5));
    }
    panic!("flag was never raised");
}

/// Five-day scripted scenario shared by the synchronous and registry
/// tests: a starting position and a sell rule that fires twice.
fn scripted_market() -> MockMarket {
    let prices = [100.0, 104.0, 108.0, 112.0, 109.0, 111.0];
    let mut market = MockMarket::new();
    for (i, &price) in prices.iter().enumerate() {
        market = market.with_price("NVDA", day(i as i64), price);
    }
    market
}

fn scripted_config() -> portsim::domain::simulation::SimulationConfig {
    let mut config = make_config(5);
    config.holdings = vec![("NVDA".to_string(), 10)];
    config.rules = vec![sell_rule("NVDA", 110.0, 5)];
    config
}

mod full_simulation {
    use super::*;

    #[test]
    fn sell_rule_fires_twice_over_five_days() {
        let market = scripted_market();
        let mut sim = Simulation::new(scripted_config(), &market);
        let ticks = sim.run();

        assert_eq!(ticks.len(), 5);

        // setup bought 10 @ 100; ticks 1-2 just mark to market
        assert!(ticks[0].trades.is_empty());
        assert!((ticks[0].cash - 99_000.0).abs() < 1e-9);
        assert!((ticks[0].portfolio_value - 100_040.0).abs() < 1e-9);
        assert!((ticks[1].portfolio_value - 100_080.0).abs() < 1e-9);

        // day 3 at 112 crosses 110: sell 5 of 10
        assert_eq!(ticks[2].trades, vec!["Sold 5 NVDA @ $112.00"]);
        assert!((ticks[2].cash - 99_560.0).abs() < 1e-9);
        assert!((ticks[2].portfolio_value - 100_120.0).abs() < 1e-9);
        assert_eq!(ticks[2].positions.get("NVDA"), Some(&5));

        // day 4 back under the threshold
        assert!(ticks[3].trades.is_empty());
        assert!((ticks[3].portfolio_value - 100_105.0).abs() < 1e-9);

        // day 5 crosses again and empties the position
        assert_eq!(ticks[4].trades, vec!["Sold 5 NVDA @ $111.00"]);
        assert!((ticks[4].cash - 100_115.0).abs() < 1e-9);
        assert!((ticks[4].portfolio_value - 100_115.0).abs() < 1e-9);
        assert_eq!(ticks[4].positions.get("NVDA"), Some(&0));

        for (i, tick) in ticks.iter().enumerate() {
            assert_eq!(tick.tick, i + 1);
            assert_eq!(tick.at, day(i as i64 + 1));
            assert!((tick.pnl - (tick.portfolio_value - 100_000.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn scripted_run_summary() {
        let market = scripted_market();
        let mut sim = Simulation::new(scripted_config(), &market);
        let ticks = sim.run();
        let summary = sim.summary(&ticks).unwrap();

        // 100_040 -> 100_115 over the run
        assert!((summary.total_return_pct - 0.07).abs() < 1e-9);
        assert!((summary.final_value - 100_115.0).abs() < 1e-9);
        assert!((summary.total_pnl - 115.0).abs() < 1e-9);
        assert_eq!(summary.total_trades, 3);
        assert_eq!(summary.final_positions.get("NVDA"), Some(&0));
        assert!(summary.sharpe_ratio.is_some());
        assert!(summary.volatility_pct.is_some());
    }

    #[test]
    fn rules_across_symbols_fire_in_config_order() {
        let market = MockMarket::new()
            .with_price("NVDA", day(0), 100.0)
            .with_price("NVDA", day(1), 104.0)
            .with_price("NVDA", day(2), 112.0)
            .with_price("NVDA", day(3), 108.0)
            .with_price("AMZN", day(1), 155.0)
            .with_price("AMZN", day(2), 148.0)
            .with_price("AMZN", day(3), 149.0);
        let mut config = make_config(3);
        config.holdings = vec![("NVDA".to_string(), 10)];
        config.rules = vec![sell_rule("NVDA", 110.0, 5), buy_rule("AMZN", 150.0, 4)];

        let mut sim = Simulation::new(config, &market);
        let ticks = sim.run();

        assert!(ticks[0].trades.is_empty());

        // day 2: both rules fire, listed in config order
        assert_eq!(
            ticks[1].trades,
            vec!["Sold 5 NVDA @ $112.00", "Bought 4 AMZN @ $148.00"]
        );
        assert!((ticks[1].cash - 98_968.0).abs() < 1e-9);
        assert!((ticks[1].portfolio_value - 100_120.0).abs() < 1e-9);

        // day 3: only the buy fires again
        assert_eq!(ticks[2].trades, vec!["Bought 4 AMZN @ $149.00"]);
        assert!((ticks[2].cash - 98_372.0).abs() < 1e-9);
        assert!((ticks[2].portfolio_value - 100_104.0).abs() < 1e-9);

        assert_eq!(sim.portfolio().shares_held("NVDA"), 5);
        assert_eq!(sim.portfolio().shares_held("AMZN"), 8);
        assert_eq!(sim.portfolio().trade_count(), 4);
    }

    #[test]
    fn gap_day_keeps_last_valuation() {
        // no bar on day 2; day 3 reopens higher
        let market = MockMarket::new()
            .with_price("NVDA", day(0), 100.0)
            .with_price("NVDA", day(1), 110.0)
            .with_price("NVDA", day(3), 120.0);
        let mut config = make_config(3);
        config.holdings = vec![("NVDA".to_string(), 10)];

        let mut sim = Simulation::new(config, &market);
        let ticks = sim.run();

        assert!((ticks[0].portfolio_value - 100_100.0).abs() < 1e-9);
        assert!(ticks[1].prices.is_empty());
        assert!((ticks[1].portfolio_value - 100_100.0).abs() < 1e-9);
        assert!((ticks[2].portfolio_value - 100_200.0).abs() < 1e-9);
    }
}

mod registry {
    use super::*;

    #[test]
    fn lifecycle_create_poll_complete_remove() {
        let market = scripted_market();
        let registry = RunRegistry::new();
        let id = registry.create(scripted_config(), Arc::new(market)).unwrap();

        let snap = wait_terminal(&registry, id);
        assert_eq!(snap.status, RunStatus::Complete);
        assert_eq!(snap.ticks.len(), 5);
        assert!((snap.progress - 1.0).abs() < 1e-12);
        assert_eq!(snap.error, None);

        // the background run produced the same records a synchronous
        // run would
        assert_eq!(snap.ticks[2].trades, vec!["Sold 5 NVDA @ $112.00"]);
        let summary = snap.summary.expect("completed run carries a summary");
        assert!((summary.total_pnl - 115.0).abs() < 1e-9);
        assert_eq!(summary.total_trades, 3);

        assert!(registry.remove(id));
        assert!(registry.snapshot(id).is_none());
    }

    #[test]
    fn two_runs_do_not_share_state() {
        let registry = RunRegistry::new();
        let mut config_a = make_config(2);
        config_a.holdings = vec![("NVDA".to_string(), 10)];
        let mut config_b = make_config(4);
        config_b.holdings = vec![("NVDA".to_string(), 50)];

        let a = registry
            .create(config_a, Arc::new(FlatMarket(100.0)))
            .unwrap();
        let b = registry
            .create(config_b, Arc::new(FlatMarket(200.0)))
            .unwrap();

        let snap_a = wait_terminal(&registry, a);
        let snap_b = wait_terminal(&registry, b);

        assert_eq!(snap_a.ticks.len(), 2);
        assert_eq!(snap_b.ticks.len(), 4);
        assert!((snap_a.ticks[0].cash - 99_000.0).abs() < 1e-9);
        assert!((snap_b.ticks[0].cash - 90_000.0).abs() < 1e-9);
    }

    #[test]
    fn cancel_stops_at_the_next_tick_boundary() {
        let market = GatedMarket::new(100.0);
        let entered = Arc::clone(&market.entered);
        let release = Arc::clone(&market.release);

        let mut config = make_config(600);
        config.holdings = vec![("NVDA".to_string(), 10)];

        let registry = RunRegistry::new();
        let id = registry.create(config, Arc::new(market)).unwrap();

        // the run is provably inside its first price query; cancel lands
        // before the tick finishes, so exactly one tick completes
        wait_flag(&entered);
        assert!(registry.cancel(id));
        release.store(true, Ordering::SeqCst);

        let snap = wait_terminal(&registry, id);
        assert_eq!(snap.status, RunStatus::Stopped);
        assert_eq!(snap.ticks.len(), 1);
        assert!(snap.progress < 0.01);
        assert!(snap.summary.is_some());
        assert_eq!(snap.error, None);
    }

    #[test]
    fn panicking_provider_fails_only_its_run() {
        let market = PanicMarket {
            price: 100.0,
            panic_at: day(3),
        };
        let mut config = make_config(4);
        config.holdings = vec![("NVDA".to_string(), 10)];

        let registry = RunRegistry::new();
        let id = registry.create(config, Arc::new(market)).unwrap();

        let snap = wait_terminal(&registry, id);
        assert_eq!(snap.status, RunStatus::Failed);
        assert_eq!(snap.ticks.len(), 2);
        assert!(
            snap.error
                .as_deref()
                .unwrap_or("")
                .contains("price feed disconnected")
        );
        assert!(snap.summary.is_none());

        // the registry keeps serving new runs
        let mut config = make_config(2);
        config.holdings = vec![("NVDA".to_string(), 10)];
        let next = registry.create(config, Arc::new(FlatMarket(100.0))).unwrap();
        let snap = wait_terminal(&registry, next);
        assert_eq!(snap.status, RunStatus::Complete);
    }
}
