//! End-to-end scenarios across fills, positions, margin and liquidation.
//!
//! Each test drives the public API the way a ledger would: take a snapshot,
//! compute, then commit the returned values.

use vamm_core::*;

fn perp_market(base: i128, quote: i128) -> PerpMarket {
    PerpMarket::new(
        MarketIndex(0),
        Amm {
            base_asset_reserve: BaseAmount::from_raw(base),
            quote_asset_reserve: QuoteReserve::from_raw(quote),
            ..Amm::balanced(500_000_000_000_000, Peg::one())
        },
    )
}

fn one_base(direction: PositionDirection, price: OrderPrice) -> TakerOrder {
    TakerOrder {
        direction,
        base_asset_amount: BaseAmount::from_raw(BASE_PRECISION),
        price,
    }
}

// fill, then commit the delta to the position and the market aggregates
fn trade(market: &PerpMarket, position: &PerpPosition, order: &TakerOrder, oracle: &OraclePriceData) -> (PerpMarket, PositionUpdate) {
    let FillOutcome::Filled(fill) = fill_with_amm(market, order, oracle).unwrap() else {
        panic!("expected a fill");
    };
    let update = apply_position_delta(position, &fill.delta).unwrap();
    let amm = update_market_with_delta(&fill.market.amm, position, &update.position).unwrap();
    (fill.market.with_amm(amm), update)
}

#[test]
fn long_fill_below_oracle() {
    // base reserve at 110% of quote: pool trades around 0.909
    let market = perp_market(550_000_000_000_000, 500_000_000_000_000);
    let oracle = OraclePriceData::at(Price::from_raw(PRICE_PRECISION));
    let order = one_base(PositionDirection::Long, OrderPrice::OracleOffset(Price::from_raw(-50_000)));

    let (market, update) = trade(&market, &PerpPosition::new(MarketIndex(0)), &order, &oracle);

    assert_eq!(update.update_type, PositionUpdateType::Open);
    assert_eq!(update.position.base_asset_amount.raw(), BASE_PRECISION);
    assert_eq!(update.position.quote_asset_amount.raw(), -909_093);
    assert_eq!(update.position.entry_price().unwrap(), Some(Price::from_raw(909_093)));
    assert_eq!(market.amm.net_base_asset_amount.raw(), BASE_PRECISION);
    assert_eq!(market.amm.quote_asset_amount_long.raw(), -909_093);
}

#[test]
fn short_fill_above_oracle() {
    let market = perp_market(500_000_000_000_000, 550_000_000_000_000);
    let oracle = OraclePriceData::at(Price::from_raw(PRICE_PRECISION));
    let order = one_base(PositionDirection::Short, OrderPrice::OracleOffset(Price::from_raw(50_000)));

    let (market, update) = trade(&market, &PerpPosition::new(MarketIndex(0)), &order, &oracle);

    assert_eq!(update.position.base_asset_amount.raw(), -BASE_PRECISION);
    assert_eq!(update.position.quote_asset_amount.raw(), 1_099_997);
    assert_eq!(market.amm.net_base_asset_amount.raw(), -BASE_PRECISION);
    assert_eq!(market.amm.quote_asset_amount_short.raw(), 1_099_997);
}

#[test]
fn liquidation_takes_deposit_for_losses() {
    // short 1 base at oracle 50 for 40.988997: pnl -9.011003 against 10 USDC deposited
    let market = PerpMarket {
        margin_ratio_initial: MarginRatio::from_raw(3_000),
        margin_ratio_maintenance: MarginRatio::from_raw(2_000),
        liquidator_fee: LiquidationFee::from_raw(150_000),
        pnl_pool: PoolBalance {
            balance: Balance::from_raw(1_000 * BALANCE_PRECISION),
            ..PoolBalance::default()
        },
        ..PerpMarket::new(MarketIndex(0), Amm::balanced(500_000_000_000_000, Peg::from_raw(50 * PRICE_PRECISION)))
    };
    let bank = SpotMarket {
        deposit_balance: Balance::from_raw(1_010 * BALANCE_PRECISION),
        ..SpotMarket::quote_market()
    };
    let snapshot = MarketSnapshot::new()
        .with_perp_market(market, OraclePriceData::at(Price::from_raw(50 * PRICE_PRECISION)))
        .with_spot_market(bank, None);

    let mut user = UserAccount::new(AccountId(42));
    user.spot_positions.push(SpotPosition {
        balance: Balance::from_raw(10 * BALANCE_PRECISION),
        ..SpotPosition::new(MarketIndex(0))
    });
    let perp = user.force_get_perp_position_mut(MarketIndex(0));
    perp.base_asset_amount = BaseAmount::from_raw(-BASE_PRECISION);
    perp.quote_asset_amount = QuoteAmount::from_raw(40_988_997);
    perp.quote_entry_amount = QuoteAmount::from_raw(40_988_997);

    let before =
        calculate_margin_requirement_and_total_collateral(&user, &snapshot, MarginRequirementType::Maintenance).unwrap();
    assert_eq!(before.margin_requirement.raw(), 10_000_000);
    assert_eq!(before.total_collateral.raw(), 988_997);
    assert!(can_be_liquidated(&user, &snapshot).unwrap());

    let config = CoreConfig::default();
    let ctx = LiquidationContext {
        now: Timestamp::from_millis(1_700_000_000_000),
        liquidator: AccountId(99),
    };
    let outcome = liquidate_perp_pnl_for_deposit(
        &ctx,
        &user,
        MarketIndex(0),
        MarketIndex(0),
        config.liquidation.max_pnl_transfer,
        &snapshot,
    )
    .unwrap();
    let LiquidationOutcome::Liquidated { user: after, record } = outcome else {
        panic!("expected a liquidation");
    };

    let mut sink = RecordCollector::new();
    sink.record(record);
    let record = &sink.records()[0];
    assert_eq!(record.liquidation_id, 1);
    assert_eq!(record.liquidation_type(), "liquidatePerpPnlForDeposit");
    let LiquidationKind::LiquidatePerpPnlForDeposit(ref detail) = record.kind else {
        panic!("wrong record kind");
    };
    assert_eq!(detail.pnl_transfer.raw(), 9_011_003);
    assert_eq!(detail.asset_transfer.amount, 10_000_000);
    assert_eq!(detail.asset_price.raw(), PRICE_PRECISION);

    assert_eq!(after.next_liquidation_id, 2);
    assert_eq!(after.status, UserStatus::BeingLiquidated);
    assert!(after.get_spot_position(MarketIndex(0)).unwrap().balance.is_zero());

    let json = serde_json::to_value(record).unwrap();
    assert_eq!(json["liquidationType"], "liquidatePerpPnlForDeposit");
    assert_eq!(json["pnlTransfer"], 9_011_003);
}

#[test]
fn jit_sizing_follows_inventory() {
    let mut market = perp_market(500_000_000_000_000, 500_000_000_000_000);
    market.amm.amm_jit_intensity = 100;
    market.amm.net_base_asset_amount = BaseAmount::from_raw(1_000 * BASE_PRECISION);
    let oracle = Price::from_raw(PRICE_PRECISION);

    // balanced pool: a quarter of the maker's size
    let jit = calculate_jit_base_asset_amount(
        &market,
        BaseAmount::from_raw(100 * BASE_PRECISION),
        oracle,
        Some(oracle),
        PositionDirection::Long,
    )
    .unwrap();
    assert_eq!(jit.raw(), 25 * BASE_PRECISION);

    market.amm.amm_jit_intensity = 0;
    let jit = calculate_jit_base_asset_amount(
        &market,
        BaseAmount::from_raw(100 * BASE_PRECISION),
        oracle,
        Some(oracle),
        PositionDirection::Long,
    )
    .unwrap();
    assert!(jit.is_zero());
}

#[test]
fn environment_presets_validate() {
    for env in [Environment::Development, Environment::Testnet, Environment::Mainnet] {
        let config = env.config();
        assert!(config.validate().is_ok(), "{:?} preset invalid", env);
        assert!(config.liquidation.max_pnl_transfer.is_positive());
    }
    let fees = [
        FeeSample { slot: 12, fee: 3_000 },
        FeeSample { slot: 11, fee: 9_000 },
    ];
    assert_eq!(Environment::Testnet.config().priority_fee.priority_fee(&fees).unwrap(), 9_000);
}
