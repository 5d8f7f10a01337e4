//! End-to-end flows mirroring an edit panel: a keyed save call plus a backlog of
//! autosave jobs flushed in order.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tandem_ops::{CallCoordinator, FieldErrors, JobQueue, OpsConfig, Outcome, QueueDrainer, Settlement};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Delivery {
	panel: u32,
	first_name: String,
}

#[tokio::test]
async fn switching_panels_discards_the_pending_save() {
	let (release_tx, release_rx) = oneshot::channel::<()>();
	let release_rx = Arc::new(Mutex::new(Some(release_rx)));
	let config = OpsConfig::default();

	let save = CallCoordinator::with_config(&config, Some(1u32), move |(panel, first_name): (u32, String)| {
		let gate = release_rx.lock().take();
		async move {
			if let Some(gate) = gate {
				let _ = gate.await;
			}
			if first_name.len() > 8 {
				Outcome::Failure(FieldErrors::single("lastName", "Too long"))
			} else {
				Outcome::Success(Delivery { panel, first_name })
			}
		}
	});
	let saved = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&saved);
	save.on_success(move |delivery: &Delivery, _| sink.lock().push(delivery.clone()));
	save.on_error(|error, helpers| helpers.set(error.display("firstName")));

	let mut watcher = save.subscribe();
	let pending = save.submit((1, "Ada".to_string()));
	watcher.wait_for(|state| state.is_fetching).await.unwrap();

	assert!(save.invalidate(2u32));
	release_tx.send(()).unwrap();
	assert_eq!(pending.await.unwrap(), Settlement::Invalidated);
	assert!(saved.lock().is_empty());
	assert!(!save.is_fetching());

	assert_eq!(save.run((2, "Bartholomew".to_string())).await, Settlement::Accepted);
	assert_eq!(save.state().error_text, "Too long");
	assert_eq!(save.display_error("firstName"), "Too long");

	assert_eq!(save.run((2, "Bart".to_string())).await, Settlement::Accepted);
	let state = save.state();
	assert_eq!(state.last_payload, Some(Delivery { panel: 2, first_name: "Bart".to_string() }));
	assert_eq!(state.error_text, "");
	assert_eq!(saved.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn autosave_backlog_flushes_in_order_despite_failures() {
	let queue = JobQueue::new();
	let server = Arc::new(Mutex::new(Vec::new()));

	for revision in 1..=5u32 {
		let server = Arc::clone(&server);
		queue.push_job(move || {
			let server = Arc::clone(&server);
			async move {
				tokio::time::sleep(Duration::from_millis(u64::from(6 - revision))).await;
				if revision == 3 {
					anyhow::bail!("revision {revision} rejected");
				}
				server.lock().push(revision);
				Ok(())
			}
		});
	}

	let handle = QueueDrainer::new().attach(&queue);
	tokio::time::timeout(Duration::from_secs(5), queue.wait_empty()).await.expect("backlog should drain");
	assert_eq!(*server.lock(), vec![1, 2, 4, 5]);
	handle.shutdown().await.unwrap();
}
