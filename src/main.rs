use navscope::api;
use navscope::config::Config;
use navscope::datasource::{
    CsvCandleFeed, HttpPriceSource, PriceSource, SuiLedgerSource, SuiNavSource,
};
use navscope::domain::{Address, AssetBook, Symbol};
use navscope::engine::Market;
use navscope::orchestration::Reconstructor;
use navscope::pricing::{DailyValuationMerger, LivePriceService, PricePointStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Interval of the background valuation merge.
const VALUATION_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    let store = match PricePointStore::open(&config.price_cache_path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Failed to open price store: {}", e);
            std::process::exit(1);
        }
    };

    let assets = AssetBook::mainnet();
    let market = Market::new(
        config.pool_module.clone(),
        Symbol::new(config.quote_asset.clone()),
        Symbol::new(config.base_asset.clone()),
        Symbol::new(config.fee_asset.clone()),
    );

    let price_source: Arc<dyn PriceSource> = match &config.candle_feed_path {
        Some(path) => Arc::new(CsvCandleFeed::new(path)),
        None => Arc::new(HttpPriceSource::new(config.price_api_url.clone())),
    };
    let live = LivePriceService::new(price_source, market.quote.clone());

    let ledger = Arc::new(SuiLedgerSource::new(config.ledger_rpc_url.clone()));
    let reconstructor = Reconstructor::new(
        ledger,
        store.clone(),
        live.clone(),
        market.clone(),
        assets.clone(),
        config.page_limit,
        Duration::from_millis(config.page_delay_ms),
        config.shares_outstanding,
    );

    let nav_source = Arc::new(SuiNavSource::new(
        config.ledger_rpc_url.clone(),
        assets,
        live.clone(),
    ));
    let merger = DailyValuationMerger::new(
        store.clone(),
        live.clone(),
        nav_source,
        config.fund_address.clone().map(Address::new),
        vec![market.base.clone(), market.fee.clone()],
        config.shares_outstanding,
    );

    // Periodic valuation merge; each failure is logged and the next tick
    // tries again.
    if config.fund_address.is_some() {
        let merger = merger.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(VALUATION_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = merger.refresh().await {
                    tracing::warn!(error = %e, "scheduled valuation merge failed");
                }
            }
        });
    } else {
        tracing::info!("FUND_ADDRESS not set; scheduled valuation merge disabled");
    }

    let app = api::create_router(api::AppState::new(
        config,
        reconstructor,
        store,
        live,
        merger,
    ));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
