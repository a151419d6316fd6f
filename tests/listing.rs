//! Listing pagination and search against the in-memory backend.

mod common;

use bidhall::application::error::AppError;
use bidhall::application::pagination::{ListingCursor, PaginationError};
use bidhall::application::search::SearchFilter;
use bidhall::domain::types::{PageDirection, SortDimension};
use serde_json::json;

use common::{Harness, catalogue, item, item_ids, item_with};

#[tokio::test]
async fn storefront_load_fills_the_first_page_of_both_listings() {
    let harness = Harness::new(catalogue(12, "owner"), 5);
    let items = &harness.storefront.items;

    items.load_storefront().await.expect("storefront loads");

    let latest = items.current_page(SortDimension::Latest).expect("latest page");
    assert_eq!(latest.page, 1);
    assert_eq!(
        item_ids(&latest.items),
        ["item-11", "item-10", "item-09", "item-08", "item-07"]
    );
    let cursor = ListingCursor::decode(latest.next_cursor.as_deref().expect("cursor"))
        .expect("cursor decodes");
    assert_eq!(cursor.id(), "item-07");
    assert_eq!(cursor.dimension(), SortDimension::Latest);

    let hottest = items.current_page(SortDimension::Hottest).expect("hottest page");
    assert_eq!(item_ids(&hottest.items)[0], "item-11");
    assert_eq!(items.published_count(), 12);
    assert_eq!(harness.storefront.state().items().len(), 5);
}

#[tokio::test]
async fn hottest_ties_are_broken_by_id() {
    let harness = Harness::new(
        vec![
            item("a", "Anvil", 5, 1_000, "owner"),
            item("b", "Bell", 5, 2_000, "owner"),
            item("c", "Clock", 9, 3_000, "owner"),
        ],
        2,
    );
    let items = &harness.storefront.items;
    items.load_storefront().await.expect("storefront loads");

    let first = items.current_page(SortDimension::Hottest).expect("page");
    assert_eq!(item_ids(&first.items), ["c", "b"]);

    let second = items
        .load_page(SortDimension::Hottest, PageDirection::Next)
        .await
        .expect("next page");
    assert_eq!(item_ids(&second.items), ["a"]);
}

#[tokio::test]
async fn next_pages_never_revisit_items() {
    let harness = Harness::new(catalogue(12, "owner"), 5);
    let items = &harness.storefront.items;
    items.load_storefront().await.expect("storefront loads");

    let second = items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect("second page");
    assert_eq!(second.page, 2);
    assert_eq!(
        item_ids(&second.items),
        ["item-06", "item-05", "item-04", "item-03", "item-02"]
    );

    let third = items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect("third page");
    assert_eq!(third.page, 3);
    assert_eq!(item_ids(&third.items), ["item-01", "item-00"]);

    let past_end = items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect("empty page");
    assert!(past_end.items.is_empty());

    let tracker = harness.storefront.state().pagination();
    let tracked = tracker.dimension(SortDimension::Latest).ids();
    assert_eq!(tracked.len(), 12);
    let mut unique = tracked.to_vec();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 12);
}

#[tokio::test]
async fn prev_then_next_returns_to_the_same_page() {
    let harness = Harness::new(catalogue(12, "owner"), 5);
    let items = &harness.storefront.items;
    items.load_storefront().await.expect("storefront loads");

    let first = items.current_page(SortDimension::Latest).expect("first page");
    let second = items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect("second page");

    let back = items
        .load_page(SortDimension::Latest, PageDirection::Prev)
        .await
        .expect("previous page");
    assert_eq!(back.page, 1);
    assert_eq!(item_ids(&back.items), item_ids(&first.items));

    let forward = items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect("next page again");
    assert_eq!(forward.page, 2);
    assert_eq!(item_ids(&forward.items), item_ids(&second.items));
}

#[tokio::test]
async fn prev_is_local_and_stops_at_the_first_page() {
    let harness = Harness::new(catalogue(3, "owner"), 5);
    let items = &harness.storefront.items;
    items.load_storefront().await.expect("storefront loads");

    harness.store.fail_reads(true);
    let page = items
        .load_page(SortDimension::Hottest, PageDirection::Prev)
        .await
        .expect("prev needs no backend");
    assert_eq!(page.page, 1);
    assert_eq!(page.items.len(), 3);
}

#[tokio::test]
async fn next_before_any_load_has_no_cursor() {
    let harness = Harness::new(catalogue(3, "owner"), 5);

    let err = harness
        .storefront
        .items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect_err("nothing loaded yet");
    assert!(matches!(
        err,
        AppError::Pagination(PaginationError::NoCursor {
            dimension: SortDimension::Latest
        })
    ));
}

#[tokio::test]
async fn failed_page_load_keeps_the_tracker() {
    let harness = Harness::new(catalogue(12, "owner"), 5);
    let items = &harness.storefront.items;
    items.load_storefront().await.expect("storefront loads");
    let before = harness.storefront.state().pagination();

    harness.store.fail_reads(true);
    let err = items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect_err("backend down");
    assert!(matches!(err, AppError::OperationFailed { .. }));
    assert_eq!(harness.storefront.state().pagination(), before);
}

#[tokio::test]
async fn failed_count_keeps_both_listings() {
    let harness = Harness::new(catalogue(12, "owner"), 5);
    let items = &harness.storefront.items;
    items.load_storefront().await.expect("storefront loads");
    items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect("second page");
    let before = harness.storefront.state().pagination();

    harness.store.fail_counts(true);
    let err = items.load_storefront().await.expect_err("count fails");

    assert!(matches!(
        err,
        AppError::OperationFailed {
            operation: "count_items",
            ..
        }
    ));
    assert_eq!(harness.storefront.state().pagination(), before);
    assert_eq!(before.dimension(SortDimension::Latest).page(), 2);
    assert_eq!(items.published_count(), 12);
}

#[tokio::test]
async fn initial_reload_resets_the_dimension() {
    let harness = Harness::new(catalogue(12, "owner"), 5);
    let items = &harness.storefront.items;
    items.load_storefront().await.expect("storefront loads");
    items
        .load_page(SortDimension::Latest, PageDirection::Next)
        .await
        .expect("second page");

    let page = items
        .load_page(SortDimension::Latest, PageDirection::Initial)
        .await
        .expect("reload");
    assert_eq!(page.page, 1);
    let tracker = harness.storefront.state().pagination();
    assert_eq!(tracker.dimension(SortDimension::Latest).ids().len(), 5);
}

fn search_fixture() -> Harness {
    Harness::new(
        vec![
            item_with("g1", "Gold Ring", 1, 1_000, "owner", json!({ "categories": ["Jewelry"] })),
            item_with("g2", "golden lamp", 2, 2_000, "owner", json!({ "categories": ["Home"] })),
            item_with("g3", "Golf club", 3, 3_000, "owner", json!({ "categories": ["Sports"] })),
            item_with("g4", "Old gold", 4, 4_000, "owner", json!({ "categories": ["Jewelry"] })),
            item_with("s1", "Silver spoon", 5, 5_000, "owner", json!({ "categories": ["Kitchen"] })),
        ],
        9,
    )
}

#[tokio::test]
async fn name_search_is_a_case_insensitive_prefix_match() {
    let harness = search_fixture();

    let results = harness
        .storefront
        .search
        .search(&SearchFilter::by_name("Gold"))
        .await
        .expect("search");

    assert_eq!(item_ids(&results), ["g1", "g2"]);
    assert!(harness.storefront.state().items().contains("g1"));
}

#[tokio::test]
async fn category_search_matches_exact_members() {
    let harness = search_fixture();

    let results = harness
        .storefront
        .search
        .search(&SearchFilter::by_category("Jewelry"))
        .await
        .expect("search");

    assert_eq!(item_ids(&results), ["g1", "g4"]);
}

#[tokio::test]
async fn combined_search_unions_both_filters() {
    let harness = search_fixture();
    let filter = SearchFilter {
        name: Some("gold".into()),
        category: Some("Jewelry".into()),
    };

    let results = harness.storefront.search.search(&filter).await.expect("search");

    assert_eq!(item_ids(&results), ["g1", "g2", "g4"]);
}

#[tokio::test]
async fn empty_search_does_not_reach_the_backend() {
    let harness = search_fixture();
    harness.store.fail_reads(true);

    let results = harness
        .storefront
        .search
        .search(&SearchFilter::default())
        .await
        .expect("no query issued");
    assert!(results.is_empty());
}
