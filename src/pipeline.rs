//! Runs one scrape request end to end: provision a session, load the page,
//! locate the listing container, extract fields, retry once for anything
//! still missing, and tear the session down no matter what happened.

use tracing::{error, info};

use crate::extract::{self, PageSnapshot};
use crate::models::{ListingQuery, ListingRecord, ScrapeError};
use crate::session::{BrowserSession, RENDER_SETTLE, RETRY_SETTLE};

pub async fn scrape_listing(query: &ListingQuery) -> Result<ListingRecord, ScrapeError> {
    info!(url = %query.url, "scraping listing");

    let mut session = BrowserSession::launch().await?;
    let outcome = run(&mut session, query).await;
    // Single teardown point for every exit path.
    session.close().await;

    if let Err(ref e) = outcome {
        error!(url = %query.url, error = %e, "scrape failed");
    }
    outcome
}

async fn run(
    session: &mut BrowserSession,
    query: &ListingQuery,
) -> Result<ListingRecord, ScrapeError> {
    session.open(&query.url).await?;
    session.wait_for_heading().await;
    tokio::time::sleep(RENDER_SETTLE).await;
    session.scroll_sequence().await;

    let html = session.snapshot().await?;
    let mut record = ListingRecord::default();
    fill_missing_fields(&html, query, &mut record, true);

    if query.is_marketplace
        && (record.price.is_none() || record.location.is_none() || record.image_url.is_none())
    {
        info!("price, location or image missing after first pass, retrying once");
        tokio::time::sleep(RETRY_SETTLE).await;
        session.scroll_sequence().await;

        // The DOM may have shifted after the extra scroll; the pass-one
        // container is stale, so re-locate it in a fresh snapshot.
        let html = session.snapshot().await?;
        fill_missing_fields(&html, query, &mut record, false);
    }

    // A title with several price markers means the locator landed on a
    // "similar items" block; drop it and let the presenter substitute.
    if record
        .title
        .as_ref()
        .is_some_and(|t| t.matches('$').count() > 1)
    {
        record.title = None;
    }

    Ok(record)
}

/// Parses one snapshot, locates the container and fills whichever record
/// fields are still empty. The description is only taken on the initial
/// pass. Synchronous on purpose: the parsed tree holds non-`Send` state and
/// must never live across an await point.
fn fill_missing_fields(
    html: &str,
    query: &ListingQuery,
    record: &mut ListingRecord,
    initial_pass: bool,
) {
    let snapshot = PageSnapshot::parse(html);
    let container = snapshot.locate_container();

    if record.title.is_none() {
        record.title = extract::extract_title(container);
    }
    if initial_pass && record.description.is_none() {
        record.description = extract::extract_description(container);
    }
    if record.image_url.is_none() {
        record.image_url = extract::extract_image(container);
    }
    if query.is_marketplace {
        if record.price.is_none() {
            record.price = extract::extract_price(container);
        }
        if record.location.is_none() {
            record.location = extract::extract_location(container);
        }
    }
}
