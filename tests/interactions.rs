//! Offers and questions on a selected item.

mod common;

use bidhall::application::error::AppError;
use bidhall::application::questions::QuestionEdit;
use bidhall::application::repos::DocumentStore;
use bidhall::domain::error::DomainError;
use serde_json::{Value, json};

use common::{Harness, catalogue, item_with, offer, question, question_ids};

async fn storefront_with_selection(item_id: &str) -> Harness {
    let harness = Harness::new(catalogue(3, "owner"), 9);
    harness
        .storefront
        .items
        .load_storefront()
        .await
        .expect("storefront loads");
    harness
        .storefront
        .items
        .select_item(item_id)
        .expect("cached item");
    harness
}

fn amounts(offers: &[bidhall::domain::entities::Offer]) -> Vec<f64> {
    offers.iter().map(|offer| offer.amount).collect()
}

#[tokio::test]
async fn offers_are_listed_highest_first() {
    let harness = storefront_with_selection("item-01").await;
    let offers = &harness.storefront.offers;

    for (bidder, amount) in [("b1", 10.0), ("b2", 50.0), ("b3", 30.0)] {
        harness.sign_in(bidder);
        offers.set_offer(amount).await.expect("offer placed");
    }

    assert_eq!(amounts(&offers.item_offers("item-01")), [50.0, 30.0, 10.0]);

    let reloaded = offers.load_item_offers("item-01").await.expect("offers load");
    assert_eq!(amounts(&reloaded), [50.0, 30.0, 10.0]);
    assert_eq!(reloaded[0].user_id, "b2");
}

#[tokio::test]
async fn raising_an_offer_replaces_the_previous_one() {
    let harness = storefront_with_selection("item-01").await;
    let offers = &harness.storefront.offers;

    harness.sign_in("b1");
    offers.set_offer(10.0).await.expect("first offer");
    offers.set_offer(60.0).await.expect("raised offer");

    let listed = offers.item_offers("item-01");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "item-01_b1");
    assert_eq!(listed[0].amount, 60.0);
    assert_eq!(harness.store.count("offers").await.expect("count"), 1);
}

#[tokio::test]
async fn offers_below_the_minimum_or_by_the_owner_are_rejected() {
    let harness = storefront_with_selection("item-02").await;
    let offers = &harness.storefront.offers;

    harness.sign_in("b1");
    let err = offers.set_offer(4.99).await.expect_err("below minimum");
    assert!(matches!(err, AppError::Domain(DomainError::Validation { .. })));

    harness.sign_in("owner");
    let err = offers.set_offer(100.0).await.expect_err("own item");
    assert!(err.is_precondition());
    assert_eq!(harness.store.count("offers").await.expect("count"), 0);
}

#[tokio::test]
async fn accepted_offer_closes_bidding() {
    let harness = storefront_with_selection("item-00").await;
    let offers = &harness.storefront.offers;
    harness.sign_in("b1");
    let placed = offers.set_offer(12.0).await.expect("offer placed");

    harness.sign_in("owner");
    let err = offers
        .accept_offer("item-00_nobody")
        .await
        .expect_err("unknown offer");
    assert!(matches!(err, AppError::NotFound { entity: "offer", .. }));

    let item = offers.accept_offer(&placed.id).await.expect("accepted");
    assert_eq!(item.accepted_offer.as_deref(), Some("item-00_b1"));
    let selected = harness.storefront.state().selected_item().expect("selected");
    assert_eq!(selected.accepted_offer.as_deref(), Some("item-00_b1"));

    harness.sign_in("b2");
    let err = offers.set_offer(99.0).await.expect_err("bidding closed");
    assert!(err.is_precondition());
}

#[tokio::test]
async fn dangling_offer_references_are_skipped() {
    let harness = Harness::new(
        vec![
            item_with(
                "lot",
                "Lot",
                0,
                1_000,
                "owner",
                json!({ "offers": ["lot_b1", "lot_ghost"] }),
            ),
            offer("lot", "b1", 25.0),
        ],
        9,
    );

    let loaded = harness
        .storefront
        .offers
        .load_item_offers("lot")
        .await
        .expect("offers load");
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, "lot_b1");
}

#[tokio::test]
async fn questions_need_a_selected_item() {
    let harness = Harness::new(catalogue(1, "owner"), 9);
    harness.sign_in("asker");

    let err = harness
        .storefront
        .questions
        .add_question("Does it fold?")
        .await
        .expect_err("nothing selected");
    assert!(err.is_precondition());
}

#[tokio::test]
async fn reloading_questions_does_not_duplicate_them() {
    let harness = storefront_with_selection("item-01").await;
    let questions = &harness.storefront.questions;
    harness.sign_in("asker");

    let asked = questions.add_question("  Does it fold? ").await.expect("asked");
    assert_eq!(asked.text, "Does it fold?");
    assert_eq!(asked.item_creator_id, "owner");

    questions.load_item_questions().await.expect("first reload");
    let reloaded = questions.load_item_questions().await.expect("second reload");

    assert_eq!(question_ids(&reloaded), [asked.id.as_str()]);
    let selected = harness.storefront.state().selected_item().expect("selected");
    assert_eq!(selected.questions, [asked.id.clone()]);
    assert_eq!(harness.storefront.state().questions().len(), 1);
}

#[tokio::test]
async fn editing_text_marks_only_that_question() {
    let harness = storefront_with_selection("item-01").await;
    let questions = &harness.storefront.questions;
    harness.sign_in("asker");
    let first = questions.add_question("Is it oak?").await.expect("first");
    let second = questions.add_question("Any scratches?").await.expect("second");

    let edited = questions
        .update_question(&first.id, QuestionEdit::Text("Is it solid oak?".into()))
        .await
        .expect("edited");
    assert!(edited.updated);
    assert_eq!(edited.text, "Is it solid oak?");

    let listed = questions.item_questions("item-01");
    assert_eq!(
        question_ids(&listed),
        [second.id.as_str(), first.id.as_str()]
    );
    assert!(!listed[0].updated);
    assert!(listed[1].updated);

    let remote = harness
        .store
        .get("questions", &second.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(remote.get("updated"), Some(&json!(false)));
}

#[tokio::test]
async fn only_the_owner_answers() {
    let harness = storefront_with_selection("item-02").await;
    let questions = &harness.storefront.questions;
    harness.sign_in("asker");
    let asked = questions.add_question("Still available?").await.expect("asked");

    let err = questions
        .update_question(&asked.id, QuestionEdit::Answer(Some("Yes".into())))
        .await
        .expect_err("asker cannot answer");
    assert!(err.is_precondition());

    harness.sign_in("owner");
    let err = questions
        .update_question(&asked.id, QuestionEdit::Text("Rewritten".into()))
        .await
        .expect_err("owner cannot rewrite");
    assert!(err.is_precondition());

    let answered = questions
        .update_question(&asked.id, QuestionEdit::Answer(Some("Yes".into())))
        .await
        .expect("answered");
    assert_eq!(answered.answer.as_deref(), Some("Yes"));
    assert!(!answered.updated);

    let cleared = questions
        .update_question(&asked.id, QuestionEdit::Answer(None))
        .await
        .expect("cleared");
    assert_eq!(cleared.answer, None);
    let remote = harness
        .store
        .get("questions", &asked.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(remote.get("answer"), Some(&Value::Null));
}

#[tokio::test]
async fn asker_or_owner_may_delete_a_question() {
    let harness = storefront_with_selection("item-00").await;
    let questions = &harness.storefront.questions;
    harness.sign_in("asker");
    let asked = questions.add_question("Weight?").await.expect("asked");

    harness.sign_in("stranger");
    let err = questions
        .delete_question(&asked.id)
        .await
        .expect_err("stranger");
    assert!(err.is_precondition());

    harness.sign_in("owner");
    questions.delete_question(&asked.id).await.expect("deleted");

    assert!(questions.item_questions("item-00").is_empty());
    assert_eq!(harness.store.count("questions").await.expect("count"), 0);
    let remote = harness
        .store
        .get("items", "item-00")
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(remote.get("questions"), Some(&json!([])));
}

#[tokio::test]
async fn editing_an_uncached_question_is_a_consistency_error() {
    let mut documents = catalogue(1, "owner");
    documents.push(question("q1", "Hello?", "asker", "owner", 10));
    let harness = Harness::new(documents, 9);
    harness.sign_in("asker");

    let err = harness
        .storefront
        .questions
        .update_question("q1", QuestionEdit::Text("Hi?".into()))
        .await
        .expect_err("not cached");
    assert!(matches!(err, AppError::Consistency { .. }));
}

#[tokio::test]
async fn offers_of_an_unloaded_item_can_be_read_back() {
    let harness = Harness::new(
        vec![
            item_with(
                "lot",
                "Lot",
                0,
                1_000,
                "owner",
                json!({ "offers": ["lot_b1", "lot_b2", "lot_b3"] }),
            ),
            offer("lot", "b1", 10.0),
            offer("lot", "b2", 50.0),
            offer("lot", "b3", 30.0),
        ],
        9,
    );
    let offers = &harness.storefront.offers;

    let loaded = offers.load_item_offers("lot").await.expect("offers load");
    assert_eq!(amounts(&loaded), [50.0, 30.0, 10.0]);

    assert_eq!(amounts(&offers.item_offers("lot")), [50.0, 30.0, 10.0]);
    assert!(harness.storefront.state().items().contains("lot"));
}

fn item_with_question() -> Harness {
    Harness::new(
        vec![
            item_with(
                "lot",
                "Lot",
                0,
                1_000,
                "owner",
                json!({ "questions": ["q1"] }),
            ),
            question("q1", "Is it signed?", "asker", "owner", 10),
            question("q2", "Elsewhere?", "asker", "owner", 20),
        ],
        9,
    )
}

#[tokio::test]
async fn uncached_questions_still_check_who_deletes_them() {
    let harness = item_with_question();
    let questions = &harness.storefront.questions;
    harness
        .storefront
        .items
        .load_item("lot")
        .await
        .expect("item loads");
    assert!(!harness.storefront.state().questions().contains("q1"));

    harness.sign_in("stranger");
    let err = questions
        .delete_question("q1")
        .await
        .expect_err("stranger");
    assert!(err.is_precondition());
    assert_eq!(harness.store.count("questions").await.expect("count"), 2);

    harness.sign_in("asker");
    questions.delete_question("q1").await.expect("asker deletes");
    assert_eq!(harness.store.count("questions").await.expect("count"), 1);
    let selected = harness.storefront.state().selected_item().expect("selected");
    assert!(selected.questions.is_empty());
}

#[tokio::test]
async fn questions_of_other_items_cannot_be_deleted() {
    let harness = item_with_question();
    harness
        .storefront
        .items
        .load_item("lot")
        .await
        .expect("item loads");
    harness.sign_in("asker");

    let err = harness
        .storefront
        .questions
        .delete_question("q2")
        .await
        .expect_err("not on the selected item");
    assert!(matches!(
        err,
        AppError::NotFound {
            entity: "question",
            ..
        }
    ));
    assert_eq!(harness.store.count("questions").await.expect("count"), 2);
}
