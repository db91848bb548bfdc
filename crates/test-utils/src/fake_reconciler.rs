use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use seedwatch::errors::{Result, SeedwatchError};
use seedwatch::reconcile::{Reconcile, ReconcileReport};

/// A fake reconciler that:
/// - records the repository name every time it is invoked
/// - optionally notifies a channel (so tests can await invocations)
/// - optionally takes a while, like a redeploy waiting out a grace period
/// - optionally fails with a fatal host-address error.
pub struct FakeReconciler {
    repository: String,
    invoked: Arc<Mutex<Vec<String>>>,
    notify: Option<mpsc::UnboundedSender<String>>,
    delay: Option<Duration>,
    fail_fatally: bool,
}

impl FakeReconciler {
    pub fn new(repository: &str, invoked: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            repository: repository.to_string(),
            invoked,
            notify: None,
            delay: None,
            fail_fatally: false,
        }
    }

    pub fn notifying(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.notify = Some(tx);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_fatally(mut self) -> Self {
        self.fail_fatally = true;
        self
    }
}

impl Reconcile for FakeReconciler {
    fn repository(&self) -> &str {
        &self.repository
    }

    fn reconcile(&mut self) -> Pin<Box<dyn Future<Output = Result<ReconcileReport>> + Send + '_>> {
        let name = self.repository.clone();
        let invoked = Arc::clone(&self.invoked);
        let notify = self.notify.clone();
        let delay = self.delay;
        let fail_fatally = self.fail_fatally;

        Box::pin(async move {
            invoked.lock().unwrap().push(name.clone());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(tx) = notify {
                let _ = tx.send(name.clone());
            }
            if fail_fatally {
                return Err(SeedwatchError::HostAddress("no address in test".to_string()));
            }
            Ok(ReconcileReport::unchanged(name))
        })
    }
}
