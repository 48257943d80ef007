//! ImageLoadController Tests
//!
//! Lifecycle, failure policies, source changes and rendering against a
//! scripted network.

use futures::future::join_all;
use imgworker_loader::prelude::*;
use imgworker_loader::{Decoder, Element, LoaderError, PrefetchConfig};
use imgworker_pool::{PoolConfig, SaturationPolicy, WorkerPool};
use imgworker_test_utils::{
    init_test_tracing, png_fixture, settle_tasks, settled, test_pool, test_prefetcher,
    wait_for_source, RecordingDecoder, ScriptedFetcher, GARBAGE,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const A: &str = "https://img.test/a.png";
const B: &str = "https://img.test/b.png";

#[tokio::test]
async fn placeholder_until_loaded_then_image() -> anyhow::Result<()> {
    init_test_tracing();
    let fetcher = ScriptedFetcher::new();
    let gate = fetcher.gated(A, png_fixture(4, 3));
    let prefetcher = test_prefetcher(test_pool(1, fetcher), LoaderConfig::default());

    let props = ImageProps::new(A)
        .placeholder("spinner.gif")
        .placeholder_alt("loading")
        .alt("a");
    let controller = prefetcher.load(props)?;

    assert_eq!(controller.state(), LoadState::Loading);
    assert_eq!(
        controller.render(),
        Rendered::Placeholder(
            Element::new("img")
                .with_attr("src", "spinner.gif")
                .with_attr("alt", "loading")
        )
    );

    gate.open();
    let status = settled(&controller).await;

    assert_eq!(status.state, LoadState::Loaded);
    let displayed = status.displayed.expect("image displayed");
    assert_eq!(displayed.source, A);
    assert_eq!(displayed.info.map(|info| (info.width, info.height)), Some((4, 3)));

    let rendered = controller.render();
    assert!(!rendered.is_placeholder());
    assert_eq!(rendered.element().attr("src"), Some(displayed.url.as_str()));
    assert_eq!(rendered.element().attr("alt"), Some("a"));
    assert_eq!(controller.image_bytes().as_deref(), Some(&png_fixture(4, 3)[..]));
    assert!(prefetcher.pool().busy_flags().iter().all(|busy| !busy));
    Ok(())
}

#[tokio::test]
async fn data_src_is_used_when_src_is_missing() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(A, png_fixture(1, 1));
    let prefetcher = test_prefetcher(test_pool(1, Arc::clone(&fetcher)), LoaderConfig::default());

    let controller = prefetcher.load(ImageProps::with_data_src(A))?;
    let status = settled(&controller).await;

    assert_eq!(status.displayed_source(), Some(A));
    assert_eq!(fetcher.calls(), vec![A.to_string()]);
    Ok(())
}

#[tokio::test]
async fn missing_source_is_rejected() {
    let prefetcher = test_prefetcher(test_pool(1, ScriptedFetcher::new()), LoaderConfig::default());

    let result = prefetcher.load(ImageProps::default().placeholder("spinner.gif"));
    assert!(matches!(result, Err(LoaderError::MissingSource)));
}

#[tokio::test]
async fn fetch_failure_still_ends_loaded_with_reference() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail(A);
    let prefetcher = test_prefetcher(test_pool(1, fetcher), LoaderConfig::default());

    let controller = prefetcher.load(ImageProps::new(A))?;
    let status = settled(&controller).await;

    assert_eq!(status.state, LoadState::Loaded);
    let displayed = status.displayed.expect("reference applied");
    assert_eq!(displayed.url, A);
    assert_eq!(displayed.info, None);
    assert!(status.error.is_some());
    assert_eq!(controller.render().element().attr("src"), Some(A));
    assert_eq!(prefetcher.stats().failed, 1);
    Ok(())
}

#[tokio::test]
async fn surface_policy_keeps_placeholder_on_failure() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    let gate = fetcher.gated_failure(A);
    fetcher.respond(B, png_fixture(1, 1));
    let config = LoaderConfig::new().with_failure_policy(FailurePolicy::Surface);
    let prefetcher = test_prefetcher(test_pool(1, Arc::clone(&fetcher)), config);

    let controller = prefetcher.load(ImageProps::new(A).placeholder("spinner.gif"))?;
    settle_tasks().await;
    assert_eq!(controller.state(), LoadState::Loading);

    gate.open();
    let status = settled(&controller).await;

    assert_eq!(status.state, LoadState::Failed);
    assert_eq!(status.displayed, None);
    assert!(controller.render().is_placeholder());

    // Failed is terminal: a later source is neither fetched nor applied.
    assert!(!controller.on_source_changed(ImageProps::new(B).class_name("big"))?);
    settle_tasks().await;
    assert_eq!(controller.state(), LoadState::Failed);
    assert_eq!(controller.source(), A);
    assert_eq!(fetcher.calls(), vec![A.to_string()]);
    assert_eq!(prefetcher.stats().dispatched, 1);
    assert!(controller.render().is_placeholder());
    assert!(prefetcher.pool().blobs().is_empty());
    assert_eq!(prefetcher.pool().busy_flags(), vec![false]);
    Ok(())
}

#[tokio::test]
async fn surface_policy_fails_on_undecodable_bytes() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(A, GARBAGE.to_vec());
    let config = LoaderConfig::new().with_failure_policy(FailurePolicy::Surface);
    let prefetcher = test_prefetcher(test_pool(1, fetcher), config);

    let controller = prefetcher.load(ImageProps::new(A).placeholder("spinner.gif"))?;
    let status = settled(&controller).await;

    assert_eq!(status.state, LoadState::Failed);
    assert_eq!(status.displayed, None);
    assert!(status.error.is_some());
    assert!(controller.render().is_placeholder());
    // The fetch itself succeeded; only the decode failed.
    assert_eq!(prefetcher.stats().completed, 1);
    assert_eq!(prefetcher.stats().failed, 0);
    assert!(prefetcher.pool().blobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn loaded_never_reverts_on_later_failure() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(A, png_fixture(2, 2));
    fetcher.fail(B);
    let prefetcher = test_prefetcher(test_pool(1, fetcher), LoaderConfig::default());

    let controller = prefetcher.load(ImageProps::new(A))?;
    assert_eq!(settled(&controller).await.state, LoadState::Loaded);

    controller.on_source_changed(ImageProps::new(B))?;
    let status = wait_for_source(&controller, B).await;

    assert_eq!(status.state, LoadState::Loaded);
    assert_eq!(status.displayed.map(|image| image.url), Some(B.to_string()));
    // The replaced blob was revoked.
    assert!(prefetcher.pool().blobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn unchanged_source_does_not_redispatch() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(A, png_fixture(1, 1));
    let prefetcher = test_prefetcher(test_pool(1, Arc::clone(&fetcher)), LoaderConfig::default());

    let controller = prefetcher.load(ImageProps::new(A))?;
    settled(&controller).await;

    let changed = controller.on_source_changed(ImageProps::new(A).class_name("big"))?;
    assert!(!changed);
    assert_eq!(controller.render().element().attr("class"), Some("big"));
    assert_eq!(fetcher.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn newer_source_wins_over_late_stale_result() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    let gate_a = fetcher.gated(A, png_fixture(1, 1));
    fetcher.respond(B, png_fixture(2, 2));
    let prefetcher = test_prefetcher(test_pool(2, fetcher), LoaderConfig::default());

    let controller = prefetcher.load(ImageProps::new(A))?;
    settle_tasks().await;
    controller.on_source_changed(ImageProps::new(B))?;
    wait_for_source(&controller, B).await;

    gate_a.open();
    settle_tasks().await;

    let status = controller.status();
    assert_eq!(status.displayed_source(), Some(B));
    assert_eq!(prefetcher.pool().blobs().len(), 1);
    assert!(prefetcher.stats().cancelled >= 1);
    assert!(prefetcher.pool().busy_flags().iter().all(|busy| !busy));
    Ok(())
}

#[tokio::test]
async fn without_cancellation_last_delivery_wins() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    let gate_a = fetcher.gated(A, png_fixture(1, 1));
    fetcher.respond(B, png_fixture(2, 2));
    let config = LoaderConfig::new().with_cancel_stale(false);
    let prefetcher = test_prefetcher(test_pool(2, fetcher), config);

    let controller = prefetcher.load(ImageProps::new(A))?;
    settle_tasks().await;
    controller.on_source_changed(ImageProps::new(B))?;
    wait_for_source(&controller, B).await;

    // A was requested first but is delivered last, so it ends up displayed.
    gate_a.open();
    let status = wait_for_source(&controller, A).await;

    assert_eq!(status.state, LoadState::Loaded);
    assert_eq!(controller.source(), B);
    assert_eq!(prefetcher.pool().blobs().len(), 1);
    Ok(())
}

#[tokio::test]
async fn decode_and_probe_paths_reach_the_same_state() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(A, png_fixture(3, 3));
    fetcher.respond(B, GARBAGE.to_vec());
    let pool = test_pool(2, fetcher);

    for decoder in [RecordingDecoder::full(), RecordingDecoder::header_only()] {
        let prefetcher = Prefetcher::new(
            Arc::clone(&pool),
            Arc::clone(&decoder) as Arc<dyn Decoder>,
            LoaderConfig::default(),
        );

        let good = prefetcher.load(ImageProps::new(A))?;
        let bad = prefetcher.load(ImageProps::new(B))?;
        let good = settled(&good).await;
        let bad = settled(&bad).await;

        assert_eq!(good.state, LoadState::Loaded);
        assert_eq!(bad.state, LoadState::Loaded);
        assert!(good.displayed.and_then(|image| image.info).is_some());
        assert!(bad.displayed.and_then(|image| image.info).is_none());

        if decoder.can_decode() {
            assert_eq!((decoder.decodes(), decoder.loads()), (2, 0));
        } else {
            assert_eq!((decoder.decodes(), decoder.loads()), (0, 2));
        }
    }
    Ok(())
}

#[tokio::test]
async fn render_fn_placeholder_is_called_while_loading() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    let _gate = fetcher.gated(A, png_fixture(1, 1));
    let prefetcher = test_prefetcher(test_pool(1, fetcher), LoaderConfig::default());

    let props = ImageProps::new(A)
        .size(10, 20)
        .placeholder(Placeholder::render_fn(|props| {
            Element::new("div")
                .with_attr("class", "skeleton")
                .with_opt_attr("data-height", props.height)
        }));
    let controller = prefetcher.load(props)?;

    assert_eq!(
        controller.render(),
        Rendered::Placeholder(
            Element::new("div")
                .with_attr("class", "skeleton")
                .with_attr("data-height", "20")
        )
    );
    Ok(())
}

#[tokio::test]
async fn dropping_controller_cancels_and_frees_unit() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    let gate = fetcher.gated(A, png_fixture(1, 1));
    let pool = test_pool(1, fetcher);
    let prefetcher = test_prefetcher(Arc::clone(&pool), LoaderConfig::default());

    let controller = prefetcher.load(ImageProps::new(A))?;
    settle_tasks().await;
    assert_eq!(pool.busy_flags(), vec![true]);

    drop(controller);
    settle_tasks().await;
    gate.open();
    settle_tasks().await;

    assert_eq!(pool.busy_flags(), vec![false]);
    assert_eq!(pool.stats().completed, 0);
    assert!(pool.blobs().is_empty());
    Ok(())
}

#[tokio::test]
async fn queued_controllers_all_load_on_one_unit() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    let gate = fetcher.gated(A, png_fixture(1, 1));
    fetcher.respond(B, png_fixture(1, 1));
    let config = PoolConfig::new()
        .with_size(1)
        .with_saturation(SaturationPolicy::Queue);
    let pool = Arc::new(WorkerPool::init(config, fetcher)?);
    let prefetcher = test_prefetcher(Arc::clone(&pool), LoaderConfig::default());

    let first = prefetcher.load(ImageProps::new(A))?;
    let second = prefetcher.load(ImageProps::new(B))?;
    settle_tasks().await;
    assert_eq!(second.state(), LoadState::Loading);

    gate.open();
    let statuses = join_all([settled(&first), settled(&second)]).await;

    assert!(statuses.iter().all(|status| status.state == LoadState::Loaded));
    assert_eq!(pool.stats().saturated, 1);
    assert_eq!(pool.busy_flags(), vec![false]);
    Ok(())
}

#[tokio::test]
async fn fallback_controllers_share_unit_zero() -> anyhow::Result<()> {
    let fetcher = ScriptedFetcher::new();
    let gate = fetcher.gated(A, png_fixture(1, 1));
    fetcher.respond(B, png_fixture(2, 2));
    let prefetcher = Prefetcher::with_fetcher(
        PrefetchConfig::default(),
        fetcher,
        RecordingDecoder::full(),
    )?;
    let pool = Arc::clone(prefetcher.pool());

    let first = prefetcher.load(ImageProps::new(A))?;
    settle_tasks().await;
    let second = prefetcher.load(ImageProps::new(B))?;
    settle_tasks().await;

    // The second request queues behind the first on unit 0.
    assert_eq!(pool.busy_flags(), vec![true]);
    assert_eq!(pool.stats().saturated, 1);
    assert_eq!(second.state(), LoadState::Loading);

    gate.open();
    let statuses = join_all([settled(&first), settled(&second)]).await;

    assert!(statuses.iter().all(|status| status.state == LoadState::Loaded));
    assert_eq!(statuses[0].displayed_source(), Some(A));
    assert_eq!(statuses[1].displayed_source(), Some(B));
    assert_eq!(pool.busy_flags(), vec![false]);
    assert_eq!(pool.blobs().len(), 2);
    Ok(())
}

#[tokio::test]
async fn prefetcher_from_config_degrades_unreachable_urls() -> anyhow::Result<()> {
    let config = PrefetchConfig::from_toml_str("[pool]\nsize = 2")?;
    let prefetcher = Prefetcher::from_config(config)?;

    let controller = prefetcher.load(ImageProps::new("not a url"))?;
    let status = settled(&controller).await;

    assert_eq!(status.state, LoadState::Loaded);
    assert_eq!(status.displayed_source(), Some("not a url"));
    assert_eq!(prefetcher.stats().size, 2);
    Ok(())
}
