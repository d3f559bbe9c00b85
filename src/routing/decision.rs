//! Adapter selection.
//!
//! Picks the adapter responsible for a request.

use crate::log_debug;
use crate::logging::structured::LogContext;
use crate::model::{Adapter, Request};

/// Whether `adapter` handles `request`: any endpoint matcher accepts the
/// endpoint URL and the extra predicate, if declared, holds.
pub fn adapter_accepts(adapter: &Adapter, request: &Request) -> bool {
    adapter
        .endpoint_urls
        .iter()
        .any(|matcher| matcher.matches(&request.endpoint_url))
        && adapter
            .predicate
            .as_ref()
            .map_or(true, |predicate| predicate.accepts(request))
}

/// First adapter in catalog order that accepts `request`.
///
/// # Decision Tree
/// 1. Walk the catalog in order
/// 2. Skip adapters none of whose endpoint URLs match
/// 3. Skip adapters whose predicate rejects the request
/// 4. Return the first survivor, or `None` (undetected, not an error)
pub fn adapter_for_request<'a>(request: &Request, catalog: &'a [Adapter]) -> Option<&'a Adapter> {
    adapter_for_request_with_context(request, catalog, &LogContext::for_request())
}

/// [`adapter_for_request`] logging under an existing context.
pub fn adapter_for_request_with_context<'a>(
    request: &Request,
    catalog: &'a [Adapter],
    ctx: &LogContext,
) -> Option<&'a Adapter> {
    let found = catalog.iter().find(|adapter| adapter_accepts(adapter, request));

    match found {
        Some(adapter) => log_debug!(
            ctx,
            "ADAPTER_MATCHED",
            adapter = adapter.id(),
            endpoint = request.endpoint_url,
        ),
        None => log_debug!(
            ctx,
            "ADAPTER_NONE",
            endpoint = request.endpoint_url,
            candidates = catalog.len(),
        ),
    }

    found
}
