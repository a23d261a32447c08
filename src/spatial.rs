use std::thread;

use serde::Serialize;

use crate::app::Connector;
use crate::error::CatalogError;
use crate::log::LogSink;
use crate::udata::{CatalogClient, SpatialZone};

pub const SUGGEST_SIZE: usize = 10;

pub const MIXED_GRANULARITY: &str = "other";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpatialCoverage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    pub zones: Vec<String>,
}

impl SpatialCoverage {
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

impl<C: CatalogClient> Connector<C> {
    pub fn map_spatial_coverage(&self, text: &str, log: &dyn LogSink) -> SpatialCoverage {
        resolve_spatial_coverage(&self.client, text, log)
    }
}

pub fn resolve_spatial_coverage<C: CatalogClient + ?Sized>(
    client: &C,
    text: &str,
    log: &dyn LogSink,
) -> SpatialCoverage {
    let candidates = split_candidates(text);
    if candidates.is_empty() {
        return SpatialCoverage::default();
    }
    log.task("spatial", "Resolving spatial coverage", candidates.len() as u64);

    let lookups: Vec<Result<Vec<SpatialZone>, CatalogError>> = thread::scope(|scope| {
        let handles = candidates
            .iter()
            .map(|candidate| scope.spawn(move || client.suggest_zones(candidate, SUGGEST_SIZE)))
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(CatalogError::Http {
                        url: "spatial/zones/suggest".to_string(),
                        message: "lookup thread panicked".to_string(),
                    })
                })
            })
            .collect()
    });

    let mut resolved: Vec<SpatialZone> = Vec::new();
    for (index, (candidate, lookup)) in candidates.iter().zip(lookups).enumerate() {
        log.progress("spatial", index as u64 + 1, None);
        let suggestions = match lookup {
            Ok(suggestions) => suggestions,
            Err(err) => {
                log.warning(&format!("Spatial lookup failed for \"{candidate}\": {err}"));
                continue;
            }
        };
        match pick_zone(candidate, &suggestions) {
            Some(zone) => {
                log.info(&format!(
                    "Spatial coverage \"{candidate}\" mapped to zone {} ({})",
                    zone.id, zone.name
                ));
                resolved.push(zone.clone());
            }
            None => log.warning(&format!("No spatial zone found for \"{candidate}\"")),
        }
    }

    let levels = resolved
        .iter()
        .map(|zone| zone.level.as_deref())
        .collect::<Vec<_>>();
    SpatialCoverage {
        granularity: consensus_granularity(&levels),
        zones: resolved.into_iter().map(|zone| zone.id).collect(),
    }
}

pub fn split_candidates(text: &str) -> Vec<String> {
    text.split(';')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(str::to_string)
        .collect()
}

/// Exact match on the normalized name wins. Otherwise the top-ranked suggestion is taken,
/// provided its name carries every non-numeric word of the candidate.
pub fn pick_zone<'a>(candidate: &str, suggestions: &'a [SpatialZone]) -> Option<&'a SpatialZone> {
    let wanted = normalize_name(candidate);
    if let Some(exact) = suggestions
        .iter()
        .find(|zone| normalize_name(&zone.name) == wanted)
    {
        return Some(exact);
    }
    let top = suggestions.first()?;
    let name = normalize_name(&top.name);
    let name_words = name.split(' ').collect::<Vec<_>>();
    wanted
        .split(' ')
        .filter(|word| !word.is_empty() && !word.chars().all(|ch| ch.is_ascii_digit()))
        .all(|word| name_words.contains(&word))
        .then_some(top)
}

pub fn consensus_granularity(levels: &[Option<&str>]) -> Option<String> {
    let (first, rest) = levels.split_first()?;
    if rest.iter().all(|level| level == first) {
        first.map(str::to_string)
    } else {
        Some(MIXED_GRANULARITY.to_string())
    }
}

pub fn normalize_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.chars().flat_map(char::to_lowercase) {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            match fold_diacritic(ch) {
                Some(folded) => out.push_str(folded),
                None => out.push(ch),
            }
        } else {
            pending_space = true;
        }
    }
    out
}

fn is_combining_mark(ch: char) -> bool {
    matches!(ch, '\u{300}'..='\u{36f}' | '\u{1ab0}'..='\u{1aff}' | '\u{1dc0}'..='\u{1dff}' | '\u{20d0}'..='\u{20ff}')
}

fn fold_diacritic(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}
