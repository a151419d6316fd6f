//! Background removal of documents that depended on a deleted item.

use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::context::ServiceContext;
use crate::application::repos::DocumentStore;
use crate::domain::entities::Item;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub collection: String,
    pub id: String,
    pub error: String,
}

/// Outcome of a dependent-document cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub item_id: String,
    pub removed_questions: Vec<String>,
    pub removed_offers: Vec<String>,
    pub failures: Vec<CleanupFailure>,
    pub aborted: Option<String>,
}

impl CleanupReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.aborted.is_none()
    }
}

/// Handle on a cleanup that keeps running whether or not it is awaited.
#[derive(Debug)]
pub struct PendingCleanup {
    item_id: String,
    handle: JoinHandle<CleanupReport>,
}

impl PendingCleanup {
    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait(self) -> CleanupReport {
        let PendingCleanup { item_id, handle } = self;
        match handle.await {
            Ok(report) => report,
            Err(err) => {
                warn!(
                    target = "bidhall::cleanup",
                    item_id = %item_id,
                    error = %err,
                    "cleanup task did not complete"
                );
                CleanupReport {
                    item_id,
                    aborted: Some(err.to_string()),
                    ..CleanupReport::default()
                }
            }
        }
    }
}

/// Delete the questions and offers of `item` in the background.
pub(crate) fn spawn_item_cleanup(ctx: &ServiceContext, item: &Item) -> PendingCleanup {
    let ctx = ctx.clone();
    let item_id = item.id.clone();
    let questions = item.questions.clone();
    let offers = item.offers.clone();
    let report_id = item_id.clone();

    let handle = tokio::spawn(async move {
        let store = ctx.documents.as_ref();
        let ((removed_questions, question_failures), (removed_offers, offer_failures)) = futures::join!(
            delete_documents(store, &ctx.collections.questions, questions),
            delete_documents(store, &ctx.collections.offers, offers),
        );

        ctx.state
            .questions()
            .remove_many(removed_questions.iter().map(String::as_str));
        ctx.state
            .offers()
            .remove_many(removed_offers.iter().map(String::as_str));

        let mut failures = question_failures;
        failures.extend(offer_failures);
        info!(
            target = "bidhall::cleanup",
            item_id = %report_id,
            questions = removed_questions.len(),
            offers = removed_offers.len(),
            failures = failures.len(),
            "item cleanup finished"
        );

        CleanupReport {
            item_id: report_id,
            removed_questions,
            removed_offers,
            failures,
            aborted: None,
        }
    });

    PendingCleanup { item_id, handle }
}

async fn delete_documents(
    store: &dyn DocumentStore,
    collection: &str,
    ids: Vec<String>,
) -> (Vec<String>, Vec<CleanupFailure>) {
    let results = join_all(ids.into_iter().map(|id| async move {
        let result = store.delete(collection, &id).await;
        (id, result)
    }))
    .await;

    let mut removed = Vec::new();
    let mut failures = Vec::new();
    for (id, result) in results {
        match result {
            Ok(()) => removed.push(id),
            Err(err) => {
                warn!(
                    target = "bidhall::cleanup",
                    collection,
                    id = %id,
                    error = %err,
                    "dependent document was not deleted"
                );
                failures.push(CleanupFailure {
                    collection: collection.to_string(),
                    id,
                    error: err.to_string(),
                });
            }
        }
    }
    (removed, failures)
}
