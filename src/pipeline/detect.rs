//! Map detection: per-page vision classification with graceful degradation.
//!
//! Detection is advisory by design. A page whose classification fails after
//! all retries is reported as "no map on this page" rather than an error —
//! one flaky API response must never block the rest of the document. The
//! real extraction work downstream re-validates everything anyway.
//!
//! ## Retry Strategy
//!
//! Capability calls fail transiently and often under concurrent load.
//! Exponential backoff (`detect_backoff_ms * 2^attempt`) avoids the
//! thundering herd: with a 2 s base and 3 attempts the wait sequence is
//! 2 s → 4 s, totalling 6 s of back-off per page worst-case.

use crate::capability::parse::{self, ParseError};
use crate::capability::PageClassifier;
use crate::config::ExtractionConfig;
use crate::output::MapType;
use crate::pipeline::encode::encode_png;
use crate::pipeline::render::PageAssets;
use crate::prompts::DETECTION_PROMPT;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Classification result for one page.
///
/// Invariant: `map_type` and `name` are `Some` iff `has_map` is true.
/// [`MapDetectionResult::no_map`] and the parsing path below are the only
/// constructors, so the invariant holds everywhere by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDetectionResult {
    pub has_map: bool,
    pub map_type: Option<MapType>,
    pub name: Option<String>,
}

impl MapDetectionResult {
    /// The graceful-degradation value: nothing detected.
    pub fn no_map() -> Self {
        Self {
            has_map: false,
            map_type: None,
            name: None,
        }
    }
}

/// Wire shape of the classifier's JSON answer.
#[derive(Debug, Deserialize)]
struct DetectionReply {
    has_map: bool,
    #[serde(rename = "type")]
    map_type: Option<MapType>,
    name: Option<String>,
}

/// Clamp a model-supplied name to at most 3 whitespace-delimited words.
fn clamp_name(name: &str) -> String {
    name.split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Interpret a raw classifier response, enforcing the result invariant.
fn interpret_reply(raw: &str) -> Result<MapDetectionResult, ParseError> {
    let reply: DetectionReply = parse::parse_json(raw)?;

    if !reply.has_map {
        return Ok(MapDetectionResult::no_map());
    }

    match (reply.map_type, reply.name) {
        (Some(map_type), Some(name)) if !name.trim().is_empty() => Ok(MapDetectionResult {
            has_map: true,
            map_type: Some(map_type),
            name: Some(clamp_name(&name)),
        }),
        // has_map without type/name violates the contract; the safe reading
        // is "the model wasn't sure", so degrade to no-map.
        _ => Ok(MapDetectionResult::no_map()),
    }
}

/// Classify one page, with bounded retries.
///
/// Never returns an error: exhausted retries degrade to
/// [`MapDetectionResult::no_map`].
pub async fn detect(
    classifier: &Arc<dyn PageClassifier>,
    page_png: &[u8],
    page_num: usize,
    config: &ExtractionConfig,
) -> MapDetectionResult {
    for attempt in 0..config.detect_retries {
        if attempt > 0 {
            let backoff = config.detect_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: detection retry {}/{} after {}ms",
                page_num, attempt, config.detect_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let raw = match classifier.classify(page_png, DETECTION_PROMPT).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Page {}: detection call failed — {}", page_num, e);
                continue;
            }
        };

        match interpret_reply(&raw) {
            Ok(result) => {
                debug!(
                    "Page {}: has_map={} type={:?} name={:?}",
                    page_num, result.has_map, result.map_type, result.name
                );
                return result;
            }
            Err(e) => {
                warn!("Page {}: unparseable detection reply — {}", page_num, e);
            }
        }
    }

    warn!(
        "Page {}: detection exhausted {} attempts, assuming no map",
        page_num, config.detect_retries
    );
    MapDetectionResult::no_map()
}

/// Classify every page concurrently, preserving page order.
///
/// Results are keyed by page index, never by completion order: the fan-out
/// uses `buffer_unordered` for throughput, and the fan-in re-sorts by index
/// so `result[i]` always describes `pages[i]`.
pub async fn detect_all(
    classifier: &Arc<dyn PageClassifier>,
    pages: &[PageAssets],
    config: &ExtractionConfig,
) -> Vec<MapDetectionResult> {
    let mut indexed: Vec<(usize, MapDetectionResult)> =
        stream::iter(pages.iter().map(|page| {
            let classifier = Arc::clone(classifier);
            let config = config.clone();
            async move {
                let png = match encode_png(&page.image) {
                    Ok(png) => png,
                    Err(e) => {
                        warn!("Page {}: could not encode for detection: {}", page.page_num(), e);
                        return (page.index, MapDetectionResult::no_map());
                    }
                };
                let result = detect(&classifier, &png, page.page_num(), &config).await;
                (page.index, result)
            }
        }))
        .buffer_unordered(config.workers)
        .collect()
        .await;

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedClassifier {
        replies: Vec<Result<String, CapabilityError>>,
        calls: AtomicU32,
    }

    impl ScriptedClassifier {
        fn new(replies: Vec<Result<String, CapabilityError>>) -> Arc<Self> {
            Arc::new(Self {
                replies,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl PageClassifier for ScriptedClassifier {
        async fn classify(&self, _png: &[u8], _ins: &str) -> Result<String, CapabilityError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.replies[n.min(self.replies.len() - 1)].clone()
        }
    }

    fn quick_config() -> ExtractionConfig {
        ExtractionConfig::builder()
            .detect_backoff_ms(1)
            .build()
            .unwrap()
    }

    #[test]
    fn interpret_fenced_reply() {
        let raw = "```json\n{\"has_map\": true, \"type\": \"battle_map\", \"name\": \"Goblin Cave\"}\n```";
        let r = interpret_reply(raw).unwrap();
        assert!(r.has_map);
        assert_eq!(r.map_type, Some(MapType::BattleMap));
        assert_eq!(r.name.as_deref(), Some("Goblin Cave"));
    }

    #[test]
    fn interpret_enforces_invariant() {
        // has_map true but no name: degrade to no-map, fields cleared.
        let r = interpret_reply(r#"{"has_map": true, "type": "battle_map"}"#).unwrap();
        assert_eq!(r, MapDetectionResult::no_map());
    }

    #[test]
    fn interpret_clamps_long_names() {
        let raw = r#"{"has_map": true, "type": "navigation_map", "name": "The Great Sunken Temple of Zeal"}"#;
        let r = interpret_reply(raw).unwrap();
        assert_eq!(r.name.as_deref(), Some("The Great Sunken"));
    }

    #[tokio::test]
    async fn detect_degrades_to_no_map_on_exhaustion() {
        let classifier = ScriptedClassifier::new(vec![Err(CapabilityError::Api("down".into()))]);
        let cfg = quick_config();

        let result = detect(
            &(classifier.clone() as Arc<dyn PageClassifier>),
            b"png",
            1,
            &cfg,
        )
        .await;
        assert_eq!(result, MapDetectionResult::no_map());
        assert_eq!(classifier.calls.load(Ordering::SeqCst), cfg.detect_retries);
    }

    #[tokio::test]
    async fn detect_recovers_after_transient_failure() {
        let classifier = ScriptedClassifier::new(vec![
            Err(CapabilityError::Api("blip".into())),
            Ok(r#"{"has_map": true, "type": "navigation_map", "name": "Crypt"}"#.into()),
        ]);

        let result = detect(
            &(classifier as Arc<dyn PageClassifier>),
            b"png",
            3,
            &quick_config(),
        )
        .await;
        assert!(result.has_map);
        assert_eq!(result.map_type, Some(MapType::NavigationMap));
    }

    /// Completion order is scrambled on purpose; results must still come
    /// back indexed by page.
    #[tokio::test]
    async fn detect_all_preserves_page_order() {
        struct DelayedClassifier;

        #[async_trait]
        impl PageClassifier for DelayedClassifier {
            async fn classify(&self, png: &[u8], _ins: &str) -> Result<String, CapabilityError> {
                // Later pages answer faster: page N sleeps inversely to its
                // payload size marker (embedded in the PNG by page dims).
                let decoded = image::load_from_memory(png).unwrap();
                let index = (decoded.width() - 10) as u64;
                sleep(Duration::from_millis(30u64.saturating_sub(index * 10))).await;
                Ok(format!(
                    r#"{{"has_map": true, "type": "battle_map", "name": "Map {}"}}"#,
                    index
                ))
            }
        }

        let pages: Vec<PageAssets> = (0..3)
            .map(|i| PageAssets {
                index: i,
                image: RgbImage::new(10 + i as u32, 10),
                embedded: vec![],
            })
            .collect();

        let classifier: Arc<dyn PageClassifier> = Arc::new(DelayedClassifier);
        let results = detect_all(&classifier, &pages, &quick_config()).await;

        assert_eq!(results.len(), 3);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.name.as_deref(), Some(format!("Map {}", i).as_str()));
        }
    }
}
