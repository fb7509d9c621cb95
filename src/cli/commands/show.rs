//! Show command - fetch and display the configured rate

use crate::binding::Binding;
use crate::cache::ResourceCache;
use crate::cli::args::ShowArgs;
use crate::config::Config;
use crate::error::RateviewResult;
use crate::fetch::JsonValueFetcher;
use crate::ui::{self, TaskSpinner, UiContext};
use futures_util::future::join_all;
use std::time::Duration;
use tracing::info;

/// Execute the show command
pub async fn execute(args: ShowArgs, config: &Config) -> RateviewResult<()> {
    let ctx = UiContext::detect();
    let cache: ResourceCache<f64> = ResourceCache::new();

    let fetcher = JsonValueFetcher::new(
        config.source.url.clone(),
        config.source.pointer.clone(),
        Duration::from_secs(config.source.timeout_secs),
    );

    let key = config.display.label.as_str();
    let consumers = args.consumers.max(1);
    info!("Mounting {} consumer(s) for {}", consumers, key);

    // Mount every consumer before the fetch settles; they all attach
    // to the same in-flight operation.
    let primary = Binding::mount(&cache, key, fetcher.clone(), config.display.fallback);
    let extras: Vec<Binding<f64>> = (1..consumers)
        .map(|_| Binding::mount(&cache, key, fetcher.clone(), config.display.fallback))
        .collect();

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Fetching {}...", key));

    // A stuck fetch keeps every consumer loading; the only timeout is
    // the fetcher's transport timeout.
    join_all(std::iter::once(&primary).chain(extras.iter()).map(|binding| {
        let mut rx = binding.subscribe();
        async move {
            let _ = rx.wait_for(|view| !view.is_loading).await;
        }
    }))
    .await;

    spinner.clear();

    let view = primary.view();
    let rendered = format!(
        "{} {:.prec$}",
        key,
        view.value,
        prec = config.display.precision
    );

    match cache.resolved_at(key) {
        Some(at) => {
            ui::step_ok_detail(&ctx, &rendered, &format!("fetched at {}", at.format("%H:%M:%S")));
        }
        None => {
            ui::step_warn_hint(&ctx, &rendered, "live rate unavailable, showing fallback");
        }
    }

    if args.stats {
        let stats = cache.stats();
        ui::key_value(&ctx, "consumers", &consumers.to_string());
        ui::key_value(&ctx, "cached entries", &stats.cached.to_string());
        ui::key_value(&ctx, "fetches in flight", &stats.in_flight.to_string());
    }

    Ok(())
}
