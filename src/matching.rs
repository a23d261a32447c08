use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::publication::ResourcePayload;
use crate::udata::RemoteResource;

pub const EMBED_MARKER: &str = "datafair_embed";

/// Copies remote ids onto freshly built resources so republishing updates
/// them in place instead of creating new ones. Returns how many ids were kept.
///
/// A remote resource is claimed at most once.
pub fn reconcile_resource_ids(resources: &mut [ResourcePayload], existing: &[RemoteResource]) -> usize {
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut preserved = 0;
    for resource in resources.iter_mut() {
        if let Some(found) = find_match(resource, existing, &claimed) {
            claimed.insert(found.id.as_str());
            resource.id = Some(found.id.clone());
            preserved += 1;
        }
    }
    preserved
}

/// Generated download links (`/raw`, `/convert`) match on their suffix alone.
/// Any other link needs an identical URL, plus agreeing embed markers when both
/// sides carry one, or identical titles when only one side does.
pub fn find_match<'a>(
    resource: &ResourcePayload,
    existing: &'a [RemoteResource],
    claimed: &HashSet<&str>,
) -> Option<&'a RemoteResource> {
    let mut available = existing
        .iter()
        .filter(|remote| !claimed.contains(remote.id.as_str()));

    if let Some(suffix) = generated_suffix(&resource.url) {
        return available.find(|remote| remote.url.as_deref().and_then(generated_suffix) == Some(suffix));
    }

    available.find(|remote| {
        remote.url.as_deref() == Some(resource.url.as_str()) && markers_agree(resource, remote)
    })
}

pub fn generated_suffix(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url).trim_end_matches('/');
    if path.ends_with("/raw") {
        Some("raw")
    } else if path.ends_with("/convert") {
        Some("convert")
    } else {
        None
    }
}

pub fn embed_marker(extras: &Map<String, Value>) -> Option<&str> {
    extras.get(EMBED_MARKER).and_then(Value::as_str)
}

fn markers_agree(resource: &ResourcePayload, remote: &RemoteResource) -> bool {
    match (embed_marker(&resource.extras), embed_marker(&remote.extras)) {
        (Some(ours), Some(theirs)) => ours == theirs,
        (None, None) => true,
        _ => remote.title.as_deref() == Some(resource.title.as_str()),
    }
}
