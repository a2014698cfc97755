use super::*;

fn numbered_items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| item("artist", &format!("track {i}")))
        .collect()
}

fn test_reporter(unit: &FetchUnit, dir: &Path, total: usize) -> RunReporter {
    RunReporter::new(
        total,
        unit.error_log.clone(),
        dir.join("failed_tracks.csv"),
        unit.event_tx.clone(),
    )
}

#[tokio::test]
async fn test_concurrency_never_exceeds_batch_size() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MockSource::new(2048).with_open_delay(Duration::from_millis(100)));
    let (unit, _rx) = create_test_unit(source.clone(), temp_dir.path());
    let items = numbered_items(10);
    let mut reporter = test_reporter(&unit, temp_dir.path(), items.len());

    let failed = BatchScheduler::new(&unit)
        .run(&items, 3, Duration::ZERO, &mut reporter)
        .await;

    assert!(failed.is_empty());
    assert_eq!(source.total_calls(), 10);
    assert!(
        source.max_in_flight() <= 3,
        "At most one batch may be in flight, saw {}",
        source.max_in_flight()
    );
    assert_eq!(
        source.max_in_flight(),
        3,
        "Items of a batch should be fetched concurrently"
    );
}

#[tokio::test(start_paused = true)]
async fn test_delay_between_batches_not_after_last() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MockSource::new(2048));
    let (unit, _rx) = create_test_unit(source.clone(), temp_dir.path());
    let items = numbered_items(5);
    let mut reporter = test_reporter(&unit, temp_dir.path(), items.len());

    let start = tokio::time::Instant::now();
    BatchScheduler::new(&unit)
        .run(&items, 2, Duration::from_secs(1), &mut reporter)
        .await;
    let elapsed = start.elapsed();

    // Three batches, two pauses
    assert!(
        elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2500),
        "Expected two inter-batch pauses, took {elapsed:?}"
    );

    // Each batch starts only after the previous one settled and the pause ran
    let times = source.open_times();
    assert_eq!(times.len(), 5);
    assert!(times[2] - times[1] >= Duration::from_secs(1));
    assert!(times[4] - times[3] >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_single_batch_has_no_trailing_delay() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MockSource::new(2048));
    let (unit, _rx) = create_test_unit(source.clone(), temp_dir.path());
    let items = numbered_items(2);
    let mut reporter = test_reporter(&unit, temp_dir.path(), items.len());

    let start = tokio::time::Instant::now();
    BatchScheduler::new(&unit)
        .run(&items, 25, Duration::from_secs(10), &mut reporter)
        .await;

    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_progress_reported_after_every_batch() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MockSource::new(2048));
    let (unit, mut rx) = create_test_unit(source.clone(), temp_dir.path());
    let items = numbered_items(5);
    let mut reporter = test_reporter(&unit, temp_dir.path(), items.len());

    BatchScheduler::new(&unit)
        .run(&items, 2, Duration::ZERO, &mut reporter)
        .await;

    let progress: Vec<(usize, usize)> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            Event::BatchCompleted {
                processed, total, ..
            } => Some((processed, total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(2, 5), (4, 5), (5, 5)]);
    assert_eq!(reporter.state().percent(), 100.0);
}

#[tokio::test]
async fn test_failure_does_not_cancel_siblings() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MockSource::new(2048));
    let items = numbered_items(4);
    source.set(&items[1].permalink_url, Behavior::AlwaysFail);
    let (unit, _rx) = create_test_unit(source.clone(), temp_dir.path());
    let mut reporter = test_reporter(&unit, temp_dir.path(), items.len());

    let failed = BatchScheduler::new(&unit)
        .run(&items, 4, Duration::ZERO, &mut reporter)
        .await;

    assert_eq!(failed, vec![items[1].clone()]);
    assert_eq!(reporter.state().downloaded, 3);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(
            item.output_path(temp_dir.path(), "mp3").exists(),
            i != 1,
            "Unexpected output state for {}",
            item.title
        );
    }
}
