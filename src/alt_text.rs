//! Alt-text generation for the images embedded in a record's PDF.
//!
//! ```text
//! download ─▶ extract + encode (blocking pool) ─▶ describe (N concurrent)
//!          ─▶ clean ─▶ [autoApply] write /Alt ─▶ upload ─▶ mark issues ─▶ rescore
//! ```
//!
//! Each image succeeds or fails on its own; a failed image gets a placeholder
//! and does not stop the batch. Only a missing record or unreadable source
//! file fails the whole request.
//!
//! Descriptions are applied by image id, never by position. Alt-text issues
//! count as actually fixed only when no figure is left without `/Alt`.

use crate::ai::encode::encode_image;
use crate::ai::postprocess::clean_alt_text;
use crate::ai::AiService;
use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::fix::store_new_version;
use crate::remediate::{extract_images, run_blocking, PdfRemediator};
use crate::storage::ObjectStore;
use crate::store::{load_owned, save, RecordStore};
use chrono::Utc;
use edgequake_llm::ImageData;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const PLACEHOLDER_ALT_TEXT: &str = "Image description unavailable";

/// Issue types containing any of these (case-insensitive) are resolved by
/// applying alt text.
const ALT_TEXT_ISSUE_MARKERS: [&str; 3] = ["alternate text", "alt text", "figure"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AltTextItem {
    pub image_id: String,
    pub page: u32,
    pub alt_text: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AltTextResult {
    pub alt_texts: Vec<AltTextItem>,
    /// USD.
    pub cost: f64,
    pub new_score: Option<u8>,
}

pub fn is_alt_text_issue(issue_type: &str) -> bool {
    let lower = issue_type.to_lowercase();
    ALT_TEXT_ISSUE_MARKERS.iter().any(|m| lower.contains(m))
}

/// An extracted image ready for the model, or the reason it is not.
struct Prepared {
    index: usize,
    image_id: String,
    page: u32,
    data: Result<ImageData, String>,
}

struct Described {
    index: usize,
    item: AltTextItem,
    input_tokens: usize,
    output_tokens: usize,
}

pub struct AltTextOrchestrator {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    remediator: Arc<dyn PdfRemediator>,
    ai: Arc<dyn AiService>,
    config: Arc<ServiceConfig>,
}

impl AltTextOrchestrator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        remediator: Arc<dyn PdfRemediator>,
        ai: Arc<dyn AiService>,
        config: Arc<ServiceConfig>,
    ) -> Self {
        Self {
            records,
            objects,
            remediator,
            ai,
            config,
        }
    }

    /// Describe the record's images, optionally writing the results into the
    /// PDF. `image_ids` restricts the batch; `None` means every image.
    pub async fn generate(
        &self,
        owner_id: &str,
        pdf_id: &str,
        image_ids: Option<&[String]>,
        auto_apply: bool,
    ) -> Result<AltTextResult, ApiError> {
        let mut record = load_owned(self.records.as_ref(), pdf_id, owner_id).await?;
        let source = self
            .objects
            .get(&record.file_url)
            .await
            .map_err(|e| ApiError::Internal(format!("reading {}: {e}", record.file_url)))?;

        // ── Extract and encode ───────────────────────────────────────────
        let wanted = image_ids.map(<[String]>::to_vec);
        let max_edge = self.config.max_image_edge;
        let extract_source = source.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            prepare_images(&extract_source, wanted.as_deref(), max_edge)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("image extraction panicked: {e}")))?;
        info!("{}: {} images selected for alt text", pdf_id, prepared.len());

        // ── Describe ─────────────────────────────────────────────────────
        let llm_start = Instant::now();
        let mut described = self.describe_all(&record.file_name, prepared).await;
        described.sort_by_key(|d| d.index);
        debug!("Described {} images in {:?}", described.len(), llm_start.elapsed());

        let (input_tokens, output_tokens) = described
            .iter()
            .fold((0, 0), |(i, o), d| (i + d.input_tokens, o + d.output_tokens));
        let cost = self.config.cost_usd(input_tokens, output_tokens);
        let alt_texts: Vec<AltTextItem> = described.into_iter().map(|d| d.item).collect();

        // ── Apply ────────────────────────────────────────────────────────
        let accepted: Vec<(String, String)> = alt_texts
            .iter()
            .filter(|a| a.success)
            .map(|a| (a.image_id.clone(), a.alt_text.clone()))
            .collect();
        let new_score = if auto_apply && !accepted.is_empty() {
            let now = Utc::now();
            let actually_fixed = match run_blocking(Arc::clone(&self.remediator), move |r| {
                r.apply_alt_text(&source, &accepted)
            })
            .await
            {
                Ok(outcome) => {
                    if outcome.remaining > 0 {
                        warn!(
                            "Alt text for {}: {} figures still lack alternate text",
                            pdf_id, outcome.remaining
                        );
                    }
                    match store_new_version(self.objects.as_ref(), &mut record, &outcome.pdf, now)
                        .await
                    {
                        Ok(()) => outcome.remaining == 0,
                        Err(e) => {
                            warn!("Alt text for {}: upload failed: {}", pdf_id, e);
                            false
                        }
                    }
                }
                Err(e) => {
                    warn!("Alt text for {}: could not write into PDF: {}", pdf_id, e);
                    false
                }
            };
            for issue in record
                .raw_report
                .iter_mut()
                .filter(|i| is_alt_text_issue(&i.issue_type))
            {
                issue.mark_fixed(actually_fixed, now);
            }
            let score = record.rescore();
            save(self.records.as_ref(), &mut record).await?;
            Some(score)
        } else {
            None
        };

        Ok(AltTextResult {
            alt_texts,
            cost,
            new_score,
        })
    }

    async fn describe_all(&self, file_name: &str, prepared: Vec<Prepared>) -> Vec<Described> {
        stream::iter(prepared.into_iter().map(|p| {
            let ai = Arc::clone(&self.ai);
            let context = format!("{}, page {}", file_name, p.page);
            async move {
                let failed = |index, image_id, page, error: String| Described {
                    index,
                    item: AltTextItem {
                        image_id,
                        page,
                        alt_text: PLACEHOLDER_ALT_TEXT.to_string(),
                        success: false,
                        error: Some(error),
                    },
                    input_tokens: 0,
                    output_tokens: 0,
                };

                let data = match p.data {
                    Ok(data) => data,
                    Err(e) => return failed(p.index, p.image_id, p.page, e),
                };
                match ai.describe_image(data, Some(context.as_str())).await {
                    Ok(draft) => {
                        let text = clean_alt_text(&draft.text);
                        if text.is_empty() {
                            warn!("Empty alt text for {}", p.image_id);
                            return failed(p.index, p.image_id, p.page, "empty response".into());
                        }
                        Described {
                            index: p.index,
                            item: AltTextItem {
                                image_id: p.image_id,
                                page: p.page,
                                alt_text: text,
                                success: true,
                                error: None,
                            },
                            input_tokens: draft.input_tokens,
                            output_tokens: draft.output_tokens,
                        }
                    }
                    Err(e) => {
                        warn!("Alt text for {} failed: {}", p.image_id, e);
                        failed(p.index, p.image_id, p.page, e.to_string())
                    }
                }
            }
        }))
        .buffer_unordered(self.config.concurrency)
        .collect()
        .await
    }
}

/// Extract, filter and encode. An unparseable PDF yields no images.
fn prepare_images(pdf: &[u8], wanted: Option<&[String]>, max_edge: u32) -> Vec<Prepared> {
    let images = match extract_images(pdf) {
        Ok(images) => images,
        Err(e) => {
            warn!("Could not read images from PDF: {}", e);
            return Vec::new();
        }
    };

    images
        .into_iter()
        .filter(|img| wanted.map_or(true, |ids| ids.iter().any(|id| *id == img.id)))
        .enumerate()
        .map(|(index, img)| Prepared {
            index,
            data: encode_image(&img.image, max_edge)
                .map_err(|e| format!("image encoding failed: {e}")),
            image_id: img.id,
            page: img.page,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PdfRecord;
    use crate::remediate::fixtures::{raw_rgb_image, text_of, PdfBuilder};
    use crate::remediate::LopdfRemediator;
    use crate::storage::MemoryStore;
    use crate::store::MemoryRecordStore;
    use crate::test_support::*;
    use std::sync::atomic::Ordering;

    fn two_page_pdf() -> Vec<u8> {
        PdfBuilder::new()
            .page(vec![raw_rgb_image(8, 8, [200, 10, 10])])
            .page(vec![raw_rgb_image(4, 4, [10, 10, 200])])
            .build()
    }

    fn record_with_alt_issue() -> PdfRecord {
        let mut record = analysed_record(0);
        record.raw_report = vec![
            issue(1, "Alternate Text - Figures alternate text"),
            issue(2, "Document - Title"),
        ];
        record.rescore();
        record
    }

    struct Harness {
        records: Arc<MemoryRecordStore>,
        objects: Arc<MemoryStore>,
        ai: Arc<ScriptedAi>,
        alt: AltTextOrchestrator,
        record: PdfRecord,
    }

    async fn harness(pdf: Option<Vec<u8>>, ai: ScriptedAi, remediator: Arc<dyn PdfRemediator>) -> Harness {
        let record = record_with_alt_issue();
        let records = Arc::new(MemoryRecordStore::new());
        records.insert(&record).await.unwrap();
        let objects = Arc::new(MemoryStore::new());
        if let Some(pdf) = pdf {
            objects.put(&record.file_url, &pdf).await.unwrap();
        }
        let ai = Arc::new(ai);
        let config = ServiceConfig::builder().jwt_secret("t").build().unwrap();
        let alt = AltTextOrchestrator::new(
            records.clone(),
            objects.clone(),
            remediator,
            ai.clone(),
            Arc::new(config),
        );
        Harness {
            records,
            objects,
            ai,
            alt,
            record,
        }
    }

    #[test]
    fn alt_text_issue_matching() {
        assert!(is_alt_text_issue("Alternate Text - Figures alternate text"));
        assert!(is_alt_text_issue("Images - Missing ALT TEXT"));
        assert!(is_alt_text_issue("Structure - Figure caption"));
        assert!(!is_alt_text_issue("Document - Title"));
    }

    #[tokio::test]
    async fn failed_image_gets_placeholder_and_no_cost() {
        let ai = ScriptedAi {
            fail_pages: vec![2],
            ..Default::default()
        };
        let h = harness(Some(two_page_pdf()), ai, Arc::new(MarkerRemediator::default())).await;

        let result = h.alt.generate(OWNER, &h.record.id, None, false).await.unwrap();
        assert_eq!(result.alt_texts.len(), 2);

        let first = &result.alt_texts[0];
        assert!(first.success);
        assert_eq!(first.page, 1);
        assert_eq!(first.alt_text, "Figure from report.pdf, page 1");

        let second = &result.alt_texts[1];
        assert!(!second.success);
        assert_eq!(second.page, 2);
        assert_eq!(second.alt_text, PLACEHOLDER_ALT_TEXT);
        assert!(second.error.as_deref().unwrap().contains("model timeout"));

        // 1000 input and 100 output tokens at 0.10 / 0.40 USD per million.
        assert!((result.cost - 0.00014).abs() < 1e-12);
        assert_eq!(result.new_score, None);
        assert_eq!(h.records.get(&h.record.id).await.unwrap().unwrap(), h.record);
    }

    #[tokio::test]
    async fn image_ids_restrict_the_batch() {
        let pdf = two_page_pdf();
        let ids: Vec<String> = extract_images(&pdf).unwrap().into_iter().map(|i| i.id).collect();
        let h = harness(Some(pdf), ScriptedAi::default(), Arc::new(MarkerRemediator::default())).await;

        let wanted = vec![ids[1].clone()];
        let result = h.alt.generate(OWNER, &h.record.id, Some(&wanted), false).await.unwrap();
        assert_eq!(result.alt_texts.len(), 1);
        assert_eq!(result.alt_texts[0].image_id, ids[1]);
        assert_eq!(h.ai.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auto_apply_writes_successes_and_fixes_alt_issues() {
        let ai = ScriptedAi {
            fail_pages: vec![2],
            ..Default::default()
        };
        let remediator = Arc::new(MarkerRemediator::default());
        let pdf = two_page_pdf();
        let first_id = extract_images(&pdf).unwrap()[0].id.clone();
        let h = harness(Some(pdf), ai, remediator.clone()).await;

        let result = h.alt.generate(OWNER, &h.record.id, None, true).await.unwrap();
        assert_eq!(result.new_score, Some(95));
        assert_eq!(
            *remediator.seen_alt_texts.lock().unwrap(),
            vec![(first_id, "Figure from report.pdf, page 1".to_string())]
        );

        let stored = h.records.get(&h.record.id).await.unwrap().unwrap();
        assert!(stored.raw_report[0].fixed && stored.raw_report[0].actually_fixed);
        assert!(!stored.raw_report[1].fixed);
        assert_ne!(stored.file_url, h.record.file_url);
        assert_eq!(h.objects.get(&stored.file_url).await.unwrap(), REMEDIATED);
    }

    #[tokio::test]
    async fn failed_first_image_does_not_shift_descriptions() {
        let pdf = PdfBuilder::new()
            .page(vec![raw_rgb_image(8, 8, [200, 10, 10])])
            .page(vec![raw_rgb_image(4, 4, [10, 10, 200])])
            .with_figures()
            .build();
        let ai = ScriptedAi {
            fail_pages: vec![1],
            ..Default::default()
        };
        let h = harness(Some(pdf), ai, Arc::new(LopdfRemediator::new())).await;

        let result = h.alt.generate(OWNER, &h.record.id, None, true).await.unwrap();
        assert!(!result.alt_texts[0].success);
        assert!(result.alt_texts[1].success);

        let stored = h.records.get(&h.record.id).await.unwrap().unwrap();
        assert_ne!(stored.file_url, h.record.file_url);
        // The page-1 figure stays undescribed, so the issue is not really fixed.
        assert!(stored.raw_report[0].fixed && !stored.raw_report[0].actually_fixed);

        let bytes = h.objects.get(&stored.file_url).await.unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        let page_of = |d: &lopdf::Dictionary| {
            let pg = d.get(b"Pg").unwrap().as_reference().unwrap();
            pages.iter().find(|(_, id)| **id == pg).map(|(n, _)| *n).unwrap()
        };
        let mut alts: Vec<(u32, Option<String>)> = doc
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| matches!(d.get(b"S"), Ok(lopdf::Object::Name(n)) if n.as_slice() == b"Figure"))
            .map(|d| (page_of(d), d.get(b"Alt").ok().map(text_of)))
            .collect();
        alts.sort();
        assert_eq!(
            alts,
            vec![
                (1, None),
                (2, Some("Figure from report.pdf, page 2".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn auto_apply_without_structure_is_metadata_only() {
        let h = harness(Some(two_page_pdf()), ScriptedAi::default(), Arc::new(FailingRemediator)).await;

        let result = h.alt.generate(OWNER, &h.record.id, None, true).await.unwrap();
        assert_eq!(result.new_score, Some(95));
        let stored = h.records.get(&h.record.id).await.unwrap().unwrap();
        assert!(stored.raw_report[0].fixed && !stored.raw_report[0].actually_fixed);
        assert_eq!(stored.file_url, h.record.file_url);
    }

    #[tokio::test]
    async fn auto_apply_with_no_successes_changes_nothing() {
        let ai = ScriptedAi {
            fail_pages: vec![1, 2],
            ..Default::default()
        };
        let h = harness(Some(two_page_pdf()), ai, Arc::new(MarkerRemediator::default())).await;

        let result = h.alt.generate(OWNER, &h.record.id, None, true).await.unwrap();
        assert!(result.alt_texts.iter().all(|a| !a.success));
        assert_eq!(result.cost, 0.0);
        assert_eq!(result.new_score, None);
        assert_eq!(h.records.get(&h.record.id).await.unwrap().unwrap(), h.record);
    }

    #[tokio::test]
    async fn unreadable_pdf_yields_no_images() {
        let h = harness(
            Some(b"not a pdf".to_vec()),
            ScriptedAi::default(),
            Arc::new(MarkerRemediator::default()),
        )
        .await;
        let result = h.alt.generate(OWNER, &h.record.id, None, true).await.unwrap();
        assert!(result.alt_texts.is_empty());
        assert_eq!(result.new_score, None);
    }

    #[tokio::test]
    async fn missing_source_is_internal() {
        let h = harness(None, ScriptedAi::default(), Arc::new(MarkerRemediator::default())).await;
        let err = h.alt.generate(OWNER, &h.record.id, None, false).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[tokio::test]
    async fn other_owner_is_not_found() {
        let h = harness(Some(two_page_pdf()), ScriptedAi::default(), Arc::new(MarkerRemediator::default())).await;
        let err = h.alt.generate("mallory", &h.record.id, None, false).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn alt_text_item_omits_absent_error() {
        let item = AltTextItem {
            image_id: "img-4".into(),
            page: 1,
            alt_text: "A chart".into(),
            success: true,
            error: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["imageId"], "img-4");
        assert_eq!(json["altText"], "A chart");
        assert!(json.get("error").is_none());
    }
}
