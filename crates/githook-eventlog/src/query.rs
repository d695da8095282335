use githook_core::{
    BreakdownQuery, BreakdownRow, Ctx, EventLogFilter, EventLogRecord, EventLogStore, PageToken,
    Result, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

/// One page of results plus the opaque token for the next one, empty when
/// this was the last page (spec §4.5 "Pagination for list and breakdown
/// uses an opaque base64 token").
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: String,
}

fn clamp_page_size(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// List one page of event log rows. `page_token` must decode via
/// `PageToken` or this fails with `InvalidArgument`.
pub async fn list_page(
    ctx: &Ctx,
    store: &dyn EventLogStore,
    mut filter: EventLogFilter,
    page_token: &str,
    page_size: Option<u32>,
) -> Result<Page<EventLogRecord>> {
    let offset = PageToken::decode(page_token)?;
    let size = clamp_page_size(page_size);
    filter.offset = Some(offset);
    filter.limit = Some(size);
    let items = store.list(ctx, filter).await?;
    let next_page_token = if items.len() as u32 == size {
        PageToken::encode(offset + items.len() as u64)
    } else {
        String::new()
    };
    Ok(Page {
        items,
        next_page_token,
    })
}

/// `Breakdown` paginates the same way as `List` (spec §4.2), just over
/// aggregated rows instead of raw event log rows.
pub async fn breakdown_page(
    ctx: &Ctx,
    store: &dyn EventLogStore,
    mut query: BreakdownQuery,
    page_token: &str,
) -> Result<Page<BreakdownRow>> {
    let offset = PageToken::decode(page_token)?;
    query.offset = offset;
    let size = clamp_page_size(Some(query.page_size));
    query.page_size = size;
    let items = store.breakdown(ctx, query).await?;
    let next_page_token = if items.len() as u32 == size {
        PageToken::encode(offset + items.len() as u64)
    } else {
        String::new()
    };
    Ok(Page {
        items,
        next_page_token,
    })
}
