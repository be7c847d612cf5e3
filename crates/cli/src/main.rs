use anyhow::Context;
use clap::{Parser, Subcommand};
use spike_core::analysis::{self, Collaborators, DetailOptions, StockDetail};
use spike_core::movers::{self, format_change, mover_label, SummaryRow};
use spike_core::news::GoogleNewsRss;
use spike_core::prices::YahooChartProvider;
use spike_core::sentiment::HfInferenceModel;
use spike_core::session::{MoversSnapshot, Session};
use spike_core::universe;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "spike", about = "Biggest NIFTY 100 movers and the news behind them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rank the universe by price change over the window.
    Movers(WindowArgs),

    /// Rank the universe, then explain one stock's move from recent headlines.
    Inspect {
        /// Ticker (`TCS.NS`) or bare symbol (`TCS`).
        ticker: String,

        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Debug, clap::Args)]
struct WindowArgs {
    /// Look-back window in calendar days (1-30).
    #[arg(long, default_value_t = 7)]
    days: u32,

    /// Number of gainers and losers to show.
    #[arg(long, default_value_t = 5)]
    top_n: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = spike_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let cli = Cli::parse();
    let prices = YahooChartProvider::from_settings(&settings)?;
    let tickers = universe::tickers();
    let mut session = Session::new();

    match cli.command {
        Command::Movers(window) => {
            let snapshot =
                refresh(&mut session, &prices, &tickers, window.days, window.top_n).await?;
            print_movers(snapshot);
        }
        Command::Inspect { ticker, window } => {
            let ticker = universe::resolve(&ticker)
                .with_context(|| format!("{ticker:?} is not a NIFTY 100 constituent"))?;

            let feed = GoogleNewsRss::from_env()?;
            let model = HfInferenceModel::from_settings(&settings)?;
            let generator = spike_core::llm::from_settings(&settings)?;
            if generator.is_none() {
                tracing::warn!("no LLM API key configured; explanations use the template");
            }

            let snapshot =
                refresh(&mut session, &prices, &tickers, window.days, window.top_n).await?;
            print_movers(snapshot);

            let deps = Collaborators {
                prices: &prices,
                feed: &feed,
                sentiment: &model,
                generator: generator.as_deref(),
            };
            let detail =
                analysis::inspect_stock(&mut session, deps, ticker, &DetailOptions::from_env())
                    .await
                    .with_context(|| format!("inspect {ticker} failed"))?;
            print_detail(&detail);
        }
    }

    Ok(())
}

async fn refresh<'s>(
    session: &'s mut Session,
    prices: &YahooChartProvider,
    tickers: &[String],
    days: u32,
    top_n: usize,
) -> anyhow::Result<&'s MoversSnapshot> {
    match analysis::refresh_movers(session, prices, tickers, days, top_n).await {
        Ok(snapshot) => Ok(snapshot),
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(days, top_n, error = %err, "movers refresh failed");
            Err(err.context("could not rank movers; retry in a moment"))
        }
    }
}

fn print_movers(snapshot: &MoversSnapshot) {
    let report = &snapshot.report;
    println!(
        "Movers over the last {} days ({} stocks, refreshed {})",
        report.window_days,
        report.ranked.len(),
        snapshot.refreshed_at.format("%Y-%m-%d %H:%M UTC")
    );

    if let Some(pulse) = movers::market_pulse(report) {
        let volatility = pulse
            .volatility
            .map(|v| format!("{v:.2}%"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "Market pulse: top gainer {}, top loser {}, avg move {}, volatility {}",
            mover_label(&pulse.top_gainer),
            mover_label(&pulse.top_loser),
            format_change(pulse.avg_move),
            volatility
        );
    }

    println!();
    print_rows("Top gainers", &movers::summary_rows(&report.gainers));
    println!();
    print_rows("Top losers", &movers::summary_rows(&report.losers));
}

fn print_rows(title: &str, rows: &[SummaryRow]) {
    println!("{title}");
    for row in rows {
        println!("  {:<12} {:<40} {:>8}", row.ticker, row.company, row.change);
    }
}

fn print_detail(detail: &StockDetail) {
    println!();
    println!(
        "{} ({}) {} over {} days",
        detail.company,
        detail.symbol,
        format_change(detail.change_pct),
        detail.window_days
    );
    if let Some(chart) = detail.chart {
        println!("Close range: {:.2} .. {:.2}", chart.y_min, chart.y_max);
    }

    println!();
    if detail.headlines.is_empty() {
        println!("No recent news found for this stock.");
    } else {
        println!("Latest headlines");
        for h in &detail.headlines {
            println!(
                "  [{} {:+.2}] {} ({}{})",
                h.sentiment_label,
                h.sentiment_score,
                h.title(),
                h.headline.source,
                if h.headline.published.is_empty() {
                    String::new()
                } else {
                    format!(", {}", h.headline.published)
                }
            );
            println!("      {}", h.headline.link);
        }
    }

    println!();
    println!("{}", detail.explanation);
}

fn init_sentry(settings: &spike_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
