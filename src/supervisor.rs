//! Supervisor (C9, spec.md §4.9): startup sequencing, the feed event
//! loop, timers, and graceful shutdown.
//!
//! Author: AI-Generated
//! Created: 2026-02-14

use alloy::providers::Provider;
use dashmap::DashMap;
use futures::stream::StreamExt;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::aggregation::AggregationState;
use crate::chain;
use crate::config::{self, Settings};
use crate::control::{self, AppState};
use crate::feed::events::FeedEvent;
use crate::feed::FeedClient;
use crate::policy::{PolicySandbox, PredicateKind};
use crate::swap::RouterAddresses;
use crate::trade::TradeBook;
use crate::types::{GasSnapshot, NormalizedEvent as PolicyEvent, PolicyContext};

const GAS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const GROUP_CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);
const RECONCILE_INTERVAL: Duration = Duration::from_secs(5 * 60);
const STATUS_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(60);
const MIN_WARN_BALANCE_WEI: u128 = 1_000_000_000_000_000; // 0.001 ETH
const PRICE_CACHE_KEYS: &[&str] = &["weth", "eth", "zora", "clanker"];
const STALE_PAIR_MAX_AGE_SECS: i64 = 24 * 60 * 60;

fn now_ts() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Deployment-wide router addresses. Nothing in spec.md ties these to
/// the tunable `Config`; an operator supplies them as environment
/// overrides at startup, defaulting to the zero address so a
/// misconfigured deployment fails a swap attempt fast and visibly
/// rather than silently routing through the wrong contract.
fn router_addresses() -> RouterAddresses {
    use alloy::primitives::Address;
    fn env_addr(key: &str) -> Address {
        std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(Address::ZERO)
    }
    RouterAddresses {
        v2_swapper: env_addr("V2_SWAPPER_ADDRESS"),
        v3_router: env_addr("V3_ROUTER_ADDRESS"),
        aerodrome_router: env_addr("AERODROME_ROUTER_ADDRESS"),
        universal_router: env_addr("UNIVERSAL_ROUTER_ADDRESS"),
        permit2: env_addr("PERMIT2_ADDRESS"),
    }
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let config = config::load_config_file(&settings.config_path)?;
    let chain = chain::connect(&settings.rpc_url, &settings.private_key).await?;

    let native_balance = chain.native_balance(chain.wallet_address()).await.unwrap_or_default();
    info!(
        wallet = %chain.wallet_address(),
        rpc = %settings.rpc_url,
        server = %settings.server_url,
        config_path = %settings.config_path.display(),
        policies = config.policies.len(),
        balance_wei = %native_balance,
        "agent starting"
    );
    if native_balance < alloy::primitives::U256::from(MIN_WARN_BALANCE_WEI) {
        warn!(balance_wei = %native_balance, "native balance below 0.001 ETH");
    }

    let trades = Arc::new(TradeBook::load(settings.trades_path.clone(), settings.trade_log_path.clone())?);
    if trades.lifecycle.reconcile(&chain, now_ts()).await {
        trades.persist()?;
    }

    let routers = router_addresses();
    let aggregation = AggregationState::new();
    let policy_sandbox = Arc::new(PolicySandbox::new());
    let chain = Arc::new(chain);
    let prices: Arc<DashMap<String, f64>> = Arc::new(DashMap::new());
    let gas_cache = Arc::new(std::sync::RwLock::new(GasSnapshot::default()));

    let state = Arc::new(AppState {
        chain: chain.clone(),
        aggregation: aggregation.clone(),
        trades: trades.clone(),
        config: RwLock::new(config),
        config_path: settings.config_path.clone(),
        routers,
        paused: std::sync::atomic::AtomicBool::new(false),
        started_at: now_ts(),
        global_data: std::sync::Mutex::new(HashMap::new()),
    });

    let mut tasks = JoinSet::new();

    let (feed_tx, mut feed_rx) = mpsc::unbounded_channel::<FeedEvent>();
    let feed_client = FeedClient::new(settings.server_url.clone(), vec!["base_v3".into(), "base_v4".into()]);
    tasks.spawn(async move {
        feed_client.run(feed_tx).await;
    });

    {
        let router = control::router(state.clone());
        let addr = control::bind_address(settings.control_port);
        info!(%addr, "control API listening");
        tasks.spawn(async move {
            if let Err(e) = axum::Server::bind(&addr).serve(router.into_make_service()).await {
                error!(error = %e, "control server exited");
            }
        });
    }

    {
        let state = state.clone();
        let policy_sandbox = policy_sandbox.clone();
        let prices = prices.clone();
        let gas_cache = gas_cache.clone();
        tasks.spawn(async move {
            while let Some(event) = feed_rx.recv().await {
                handle_feed_event(event, &state, &policy_sandbox, &prices, &gas_cache).await;
            }
        });
    }

    spawn_timer(&mut tasks, GAS_REFRESH_INTERVAL, {
        let chain = chain.clone();
        let gas_cache = gas_cache.clone();
        move || {
            let chain = chain.clone();
            let gas_cache = gas_cache.clone();
            async move {
                let fee = chain.fee_suggestion().await;
                let snapshot = GasSnapshot {
                    max_fee_gwei: fee.max_fee as f64 / 1e9,
                    priority_fee_gwei: fee.priority_fee as f64 / 1e9,
                };
                *gas_cache.write().unwrap() = snapshot;
            }
        }
    });

    spawn_timer(&mut tasks, GROUP_CLEANUP_INTERVAL, {
        let aggregation = aggregation.clone();
        let trades = trades.clone();
        let state = state.clone();
        move || {
            let aggregation = aggregation.clone();
            let trades = trades.clone();
            let state = state.clone();
            async move {
                let max_groups = state.config.read().await.max_groups;
                aggregation.trim_all_groups(max_groups);
                let stale = aggregation.pairs_for_cleanup(now_ts(), STALE_PAIR_MAX_AGE_SECS, |pair| trades.lifecycle.has_active_trade(pair));
                for pair in stale {
                    aggregation.remove(&pair);
                }
            }
        }
    });

    spawn_timer(&mut tasks, RECONCILE_INTERVAL, {
        let chain = chain.clone();
        let trades = trades.clone();
        move || {
            let chain = chain.clone();
            let trades = trades.clone();
            async move {
                if trades.lifecycle.reconcile(&chain, now_ts()).await {
                    if let Err(e) = trades.persist() {
                        error!(error = %e, "failed to persist after reconciliation");
                    }
                }
            }
        }
    });

    spawn_timer(&mut tasks, STATUS_SNAPSHOT_INTERVAL, {
        let trades = trades.clone();
        let aggregation = aggregation.clone();
        move || {
            let trades = trades.clone();
            let aggregation = aggregation.clone();
            async move {
                let (pair_count, _) = aggregation.stats();
                let summary = trades.summary();
                info!(pair_count, open = summary.open_trades, closed = summary.closed_trades, "status");
                if let Err(e) = trades.persist() {
                    error!(error = %e, "failed to persist snapshot");
                }
            }
        }
    });

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
    let signals_handle = signals.handle();

    loop {
        tokio::select! {
            Some(signal) = signals.next() => {
                match signal {
                    SIGINT | SIGTERM => {
                        info!("shutdown signal received");
                        let open = trades.lifecycle.snapshot_active();
                        for (pair, trade) in &open {
                            info!(%pair, eth_spent = %trade.eth_spent, "open position at shutdown (not auto-closed)");
                        }
                        if let Err(e) = trades.persist() {
                            error!(error = %e, "failed to persist snapshot on shutdown");
                        }
                        break;
                    }
                    SIGHUP => {
                        info!("SIGHUP received; reloading config from disk");
                        match config::load_config_file(&settings.config_path) {
                            Ok(reloaded) => *state.config.write().await = reloaded,
                            Err(e) => error!(error = %e, "config reload failed"),
                        }
                    }
                    _ => {}
                }
            }
            Some(res) = tasks.join_next() => {
                if let Err(e) = res {
                    error!(error = %e, "supervisor task panicked");
                }
            }
            else => break,
        }
    }

    signals_handle.close();
    tasks.shutdown().await;
    Ok(())
}

fn spawn_timer<F, Fut>(tasks: &mut JoinSet<()>, interval: Duration, mut make_tick: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tasks.spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume the immediate first tick
        loop {
            ticker.tick().await;
            make_tick().await;
        }
    });
}

/// Fold one feed event into aggregation state and, for `marketData`,
/// run it through the policy sandbox (spec.md §4.4, §4.5, §4.9's
/// normalize -> integrate -> evaluate -> dispatch pipeline).
async fn handle_feed_event<P: Provider + Clone>(
    event: FeedEvent,
    state: &AppState<P>,
    policy_sandbox: &PolicySandbox,
    prices: &DashMap<String, f64>,
    gas_cache: &std::sync::RwLock<GasSnapshot>,
) {
    match event {
        FeedEvent::UsdRatesUpdate(raw) => {
            if let Some(obj) = raw.as_object() {
                for key in PRICE_CACHE_KEYS {
                    if let Some(v) = obj.get(*key).and_then(|v| v.as_f64()) {
                        prices.insert((*key).to_string(), v);
                    }
                }
            }
        }
        FeedEvent::SubscribeMarketDataAck(_) => {
            info!("feed subscription acknowledged");
        }
        FeedEvent::Unknown(kind) => {
            warn!(kind, "unhandled feed event kind");
        }
        FeedEvent::MarketData(raw) => {
            let Some(normalized) = crate::aggregation::normalize::normalize(&raw, now_ts() / 60) else {
                return;
            };

            let pair_lower = format!("{:#x}", normalized.pair_address).to_lowercase();
            let config_snapshot = state.config.read().await.clone();
            if !config_snapshot.pair_allowed(&pair_lower) {
                return;
            }

            let result = state.aggregation.integrate(&normalized, config_snapshot.group_interval, config_snapshot.max_groups, now_ts());
            let Some(pair) = state.aggregation.get(&normalized.pair_address) else { return };

            if state.paused.load(Ordering::SeqCst) {
                return;
            }

            let active_trade = state.trades.lifecycle.get_active(&normalized.pair_address);
            let group = pair.groups.get(&result.group_key).cloned().unwrap_or_else(|| crate::types::Group::seed(pair.last_price));
            let groups: Vec<_> = pair.groups.values().cloned().collect();
            let price_map: HashMap<String, f64> = prices.iter().map(|e| (e.key().clone(), *e.value())).collect();
            let gas = *gas_cache.read().unwrap();

            let mut ctx = PolicyContext {
                event: PolicyEvent {
                    pair_address: format!("{:#x}", normalized.pair_address),
                    chain_tag: normalized.chain_tag.clone(),
                    last_price: normalized.last_price,
                    buy_volume: normalized.buy_volume,
                    sell_volume: normalized.sell_volume,
                    liquidity: normalized.liquidity,
                    minute_key: normalized.minute_key,
                },
                group,
                groups,
                pair: pair.clone(),
                trade: active_trade.clone(),
                prices: price_map,
                gas,
                custom_data: pair.custom_data.clone(),
                global_data: state.global_data.lock().unwrap().clone(),
            };

            let mut entered_this_cycle = false;
            for policy in &config_snapshot.policies {
                if active_trade.is_none() {
                    if entered_this_cycle {
                        continue;
                    }
                    let action = policy_sandbox.evaluate(PredicateKind::Entry, &policy.id, policy.entry_predicate.as_deref(), &mut ctx);
                    if action.is_none() {
                        continue;
                    }
                    let can_enter = crate::trade::lifecycle::can_enter(
                        false,
                        state.trades.lifecycle.active_count(),
                        config_snapshot.max_positions,
                        state.trades.lifecycle.has_active_trade(&normalized.pair_address),
                        !state.trades.lifecycle.is_locked(&normalized.pair_address),
                    );
                    if !can_enter {
                        continue;
                    }
                    let eth_amount = crate::trade::lifecycle::compute_entry_amount(config_snapshot.max_eth_per_trade, action.0);
                    match state
                        .trades
                        .lifecycle
                        .enter(&state.chain, &pair, &config_snapshot, state.routers, eth_amount, action.0, &policy.id, now_ts())
                        .await
                    {
                        Ok(_) => entered_this_cycle = true,
                        Err(e) => warn!(pair = %normalized.pair_address, error = %e, "entry failed"),
                    }
                } else if let Some(trade) = &active_trade {
                    if trade.policy_id != policy.id {
                        continue;
                    }
                    let action = policy_sandbox.evaluate(PredicateKind::Exit, &policy.id, policy.exit_predicate.as_deref(), &mut ctx);
                    if action.is_none() {
                        continue;
                    }
                    if let Err(e) = state.trades.lifecycle.exit(&state.chain, &pair, &config_snapshot, state.routers, action.0, now_ts()).await {
                        warn!(pair = %normalized.pair_address, error = %e, "exit failed");
                    }
                }
            }

            state.aggregation.set_custom_data(&normalized.pair_address, ctx.custom_data);
            *state.global_data.lock().unwrap() = ctx.global_data;
            if let Err(e) = state.trades.persist() {
                error!(error = %e, "failed to persist after policy evaluation");
            }
        }
    }
}
