mod common;

use common::{MockExchange, RecordingNotifier, ScriptedSignals, make_candles, sample_config};
use perpbot::domain::position::CloseReason;
use perpbot::domain::session::TradingSession;
use perpbot::domain::signal::Signal;
use perpbot::ports::exchange_port::OrderSide;

fn make_session(
    config: perpbot::domain::config::SessionConfig,
    script: Vec<Signal>,
    exchange: MockExchange,
) -> (TradingSession, std::sync::Arc<std::sync::Mutex<Vec<(OrderSide, f64)>>>) {
    let orders = std::sync::Arc::clone(&exchange.orders);
    let session = TradingSession::new(
        config,
        Box::new(ScriptedSignals::new(script)),
        Box::new(exchange),
        Box::new(RecordingNotifier::new()),
    );
    (session, orders)
}

mod backtest_flow {
    use super::*;

    #[test]
    fn winning_long_round_trip() {
        // 1% of 10_000 over a 5-point stop distance sizes to 20 units;
        // the take-profit at 110 banks 200.
        let (mut session, orders) = make_session(
            sample_config(),
            vec![Signal::Long],
            MockExchange::new(),
        );
        let report = session.run_backtest(&make_candles(&[100.0, 105.0, 110.0]));

        assert_eq!(report.total_trades, 1);
        assert_eq!(report.winning_trades, 1);
        assert!((report.final_balance - 10_200.0).abs() < 1e-9);

        let orders = orders.lock().unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].0, OrderSide::Buy);
        assert!((orders[0].1 - 20.0).abs() < 1e-9);
        assert_eq!(orders[1].0, OrderSide::Sell);

        let trade = &session.ledger().trades()[0];
        assert_eq!(trade.reason, CloseReason::TakeProfit);
    }

    #[test]
    fn losing_long_stops_out() {
        let (mut session, _) = make_session(
            sample_config(),
            vec![Signal::Long],
            MockExchange::new(),
        );
        let report = session.run_backtest(&make_candles(&[100.0, 97.0, 95.0]));

        assert_eq!(report.total_trades, 1);
        assert_eq!(report.losing_trades, 1);
        assert!((report.final_balance - 9_900.0).abs() < 1e-9);
        assert_eq!(session.ledger().trades()[0].reason, CloseReason::StopLoss);
    }

    #[test]
    fn short_round_trip_gains_on_drop() {
        let (mut session, orders) = make_session(
            sample_config(),
            vec![Signal::Short],
            MockExchange::new(),
        );
        let report = session.run_backtest(&make_candles(&[100.0, 95.0, 90.0]));

        assert_eq!(orders.lock().unwrap()[0].0, OrderSide::Sell);
        assert_eq!(session.ledger().trades()[0].reason, CloseReason::TakeProfit);
        assert!((report.final_balance - 10_200.0).abs() < 1e-9);
    }

    #[test]
    fn sustained_signal_enters_once_per_onset() {
        // Raw script long/long/flat/long: only bars 1 and 4 may enter.
        // The take-profit on bar 2 frees the ledger for the second onset.
        let script = vec![Signal::Long, Signal::Long, Signal::Flat, Signal::Long];
        let (mut session, orders) = make_session(
            sample_config(),
            script,
            MockExchange::new(),
        );
        session.run_backtest(&make_candles(&[100.0, 111.0, 100.0, 100.0]));

        let orders = orders.lock().unwrap();
        // Entry, take-profit close, then the re-entry on the fresh onset.
        assert_eq!(orders.len(), 3);
        assert_eq!(orders[2].0, OrderSide::Buy);
        assert!(!session.ledger().is_flat());
        assert_eq!(session.ledger().trades().len(), 1);
    }

    #[test]
    fn balance_equals_initial_plus_realized_pnl() {
        let script = vec![
            Signal::Long,
            Signal::Short,
            Signal::Flat,
            Signal::Short,
            Signal::Long,
            Signal::Flat,
        ];
        let (mut session, _) = make_session(sample_config(), script, MockExchange::new());
        session.run_backtest(&make_candles(&[100.0, 102.0, 101.0, 103.0, 99.0, 101.0]));

        let pnl_sum: f64 = session.ledger().trades().iter().map(|t| t.pnl).sum();
        assert!((session.ledger().balance() - (10_000.0 + pnl_sum)).abs() < 1e-9);
    }

    #[test]
    fn equity_curve_has_one_point_per_good_bar() {
        let (mut session, _) = make_session(
            sample_config(),
            vec![Signal::Flat; 4],
            MockExchange::new(),
        );
        let mut candles = make_candles(&[100.0, 101.0, 102.0, 103.0]);
        candles[2].close = f64::NAN;
        session.run_backtest(&candles);

        assert_eq!(session.ledger().equity_curve().len(), 3);
    }
}

mod trailing {
    use super::*;

    #[test]
    fn trailing_stop_closes_after_ratchet() {
        let mut config = sample_config();
        config.use_trailing_stop = true;
        config.tp_multiplier = 0.50; // keep the target out of reach

        let (mut session, _) = make_session(config, vec![Signal::Long], MockExchange::new());
        // Arm at 104 (trail 103.48), then close on the dip through it.
        let report = session.run_backtest(&make_candles(&[100.0, 104.0, 102.0]));

        assert_eq!(report.total_trades, 1);
        let trade = &session.ledger().trades()[0];
        assert_eq!(trade.reason, CloseReason::TrailingStop);
        assert!(trade.trailing_stop.is_some());
        assert!((report.final_balance - 10_040.0).abs() < 1e-9);
    }

    #[test]
    fn trail_never_loosens_across_bars() {
        let mut config = sample_config();
        config.use_trailing_stop = true;
        config.tp_multiplier = 0.50;

        let (mut session, _) = make_session(config, vec![Signal::Long], MockExchange::new());
        // Rally, shallow dip above the trail, rally on; still open at end.
        session.run_backtest(&make_candles(&[100.0, 104.0, 103.8, 106.0]));

        let position = session.ledger().position().expect("still open");
        let trail = position.trailing_stop.expect("armed");
        assert!((trail - 106.0 * 0.995).abs() < 1e-9);
    }
}

mod retries {
    use super::*;

    #[test]
    fn exhausted_retries_abandon_the_entry() {
        let exchange = MockExchange::failing(3);
        let notifier = RecordingNotifier::new();
        let events = std::sync::Arc::clone(&notifier.events);

        let mut session = TradingSession::new(
            sample_config(),
            Box::new(ScriptedSignals::new(vec![
                Signal::Long,
                Signal::Flat,
                Signal::Long,
            ])),
            Box::new(exchange),
            Box::new(notifier),
        );
        let report = session.run_backtest(&make_candles(&[100.0, 100.5, 101.0]));

        // First onset burns all three attempts; the session stays flat and
        // keeps running, and the next onset fills normally.
        assert_eq!(session.ledger().trades().len(), 0);
        assert!(!session.ledger().is_flat());
        assert_eq!(report.total_trades, 0);
        assert!(
            events
                .lock()
                .unwrap()
                .iter()
                .any(|e| e == "error:place_market_order")
        );
    }

    #[test]
    fn transient_failures_recover_within_the_bar() {
        let exchange = MockExchange::failing(2);
        let (mut session, orders) = make_session(
            sample_config(),
            vec![Signal::Long],
            exchange,
        );
        session.run_backtest(&make_candles(&[100.0]));

        // Third attempt succeeds, so the position opens on the same bar.
        assert_eq!(orders.lock().unwrap().len(), 1);
        assert!(!session.ledger().is_flat());
    }
}

mod live_loop {
    use super::*;
    use super::common::make_candle;

    #[test]
    fn overlapping_polls_process_each_bar_once() {
        let seed = vec![make_candle(0, 100.0), make_candle(1, 100.5)];
        let overlap = vec![make_candle(1, 100.5), make_candle(2, 101.0), make_candle(3, 101.5)];
        let exchange = MockExchange::new().with_feed(vec![seed, overlap]);

        let (mut session, _) = make_session(sample_config(), vec![Signal::Flat; 8], exchange);
        let report = session.run_live().unwrap();

        // Two seeded bars never trade; only the two genuinely new candles
        // from the second poll are processed.
        assert_eq!(session.ledger().equity_curve().len(), 2);
        assert_eq!(report.total_trades, 0);
    }

    #[test]
    fn empty_poll_ends_the_session() {
        let seed = vec![make_candle(0, 100.0)];
        let exchange = MockExchange::new().with_feed(vec![seed]);

        let (mut session, _) = make_session(sample_config(), vec![Signal::Flat; 4], exchange);
        let report = session.run_live().unwrap();
        assert_eq!(report.total_trades, 0);
    }

    #[test]
    fn stop_flag_winds_the_loop_down() {
        let exchange = MockExchange::new().with_feed(vec![
            vec![make_candle(0, 100.0)],
            vec![make_candle(1, 101.0)],
        ]);
        let (mut session, _) = make_session(sample_config(), vec![Signal::Long; 4], exchange);

        let stop = session.stop_handle();
        stop.store(true, std::sync::atomic::Ordering::Relaxed);

        let report = session.run_live().unwrap();
        // Cancelled before any poll: nothing traded, report still produced.
        assert_eq!(report.total_trades, 0);
        assert!(session.ledger().is_flat());
    }

    #[test]
    fn untracked_venue_position_is_reported() {
        let exchange = MockExchange::new().with_feed(vec![vec![make_candle(0, 100.0)]]);
        // Exposure the session did not open, as after a crash mid-trade.
        exchange
            .orders
            .lock()
            .unwrap()
            .push((OrderSide::Buy, 2.0));

        let notifier = RecordingNotifier::new();
        let events = std::sync::Arc::clone(&notifier.events);
        let mut session = TradingSession::new(
            sample_config(),
            Box::new(ScriptedSignals::new(vec![Signal::Flat; 4])),
            Box::new(exchange),
            Box::new(notifier),
        );
        session.run_live().unwrap();

        assert!(events.lock().unwrap().iter().any(|e| e == "error:reconcile"));
        assert!(session.ledger().is_flat());
    }

    #[test]
    fn live_entry_uses_the_polled_candle() {
        let seed = vec![make_candle(0, 100.0)];
        let batch = vec![make_candle(1, 100.0)];
        let exchange = MockExchange::new().with_feed(vec![seed, batch]);

        let (mut session, orders) = make_session(sample_config(), vec![Signal::Long; 2], exchange);
        session.run_live().unwrap();

        assert_eq!(orders.lock().unwrap().len(), 1);
        let position = session.ledger().position().expect("opened");
        assert!((position.entry_price - 100.0).abs() < 1e-9);
        assert!((position.stop_loss - 95.0).abs() < 1e-9);
    }
}
