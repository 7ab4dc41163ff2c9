//! Extraction orchestrator: picks the direct or staged path for an input file,
//! drives the page-annotation loop, and owns the staged object's lifecycle.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ExtractError, Result};
use crate::mime::PDF_MIME_TYPE;
use crate::ocr::OcrService;
use crate::schema::{ExtractionResult, StagedObject};
use crate::staging::StagingStore;

/// How a given input will be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionPath {
    /// Inline bytes, one whole-document annotation.
    Direct,
    /// Upload to `bucket`, annotate page by page, delete.
    Staged { bucket: String, mime_type: String },
}

impl ExtractionPath {
    /// Decide the path from the detected MIME type. Performs no I/O.
    pub fn resolve(input: &Path, mime_type: Option<&str>, bucket: Option<&str>) -> Result<Self> {
        let mime_type = match mime_type.map(str::trim) {
            Some(m) if !m.is_empty() => m,
            _ => {
                return Err(ExtractError::UnknownFormat {
                    path: input.to_path_buf(),
                })
            }
        };

        if mime_type != PDF_MIME_TYPE {
            return Ok(Self::Direct);
        }

        match bucket.map(str::trim) {
            Some(b) if !b.is_empty() => Ok(Self::Staged {
                bucket: b.to_string(),
                mime_type: mime_type.to_string(),
            }),
            _ => Err(ExtractError::MissingConfiguration),
        }
    }
}

pub struct Extractor {
    staging: Arc<dyn StagingStore>,
    ocr: Arc<dyn OcrService>,
}

impl Extractor {
    pub fn new(staging: Arc<dyn StagingStore>, ocr: Arc<dyn OcrService>) -> Self {
        Self { staging, ocr }
    }

    /// Extract paginated text from `input`.
    pub async fn extract(
        &self,
        input: &Path,
        mime_type: Option<&str>,
        bucket: Option<&str>,
    ) -> Result<ExtractionResult> {
        let path = ExtractionPath::resolve(input, mime_type, bucket)?;
        self.run(input, &path).await
    }

    /// Extract along an already resolved path.
    pub async fn run(&self, input: &Path, path: &ExtractionPath) -> Result<ExtractionResult> {
        match path {
            ExtractionPath::Direct => self.extract_direct(input).await,
            ExtractionPath::Staged { bucket, mime_type } => {
                self.extract_staged(input, bucket, mime_type).await
            }
        }
    }

    async fn extract_direct(&self, input: &Path) -> Result<ExtractionResult> {
        let data = tokio::fs::read(input).await.map_err(|source| ExtractError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        info!(
            "Annotating {:?} ({} bytes) as a single image via {}",
            input,
            data.len(),
            self.ocr.name()
        );

        let annotation = self
            .ocr
            .detect_whole_image(&data)
            .await
            .map_err(|source| ExtractError::OcrRequestFailed { page: 1, source })?;

        Ok(ExtractionResult::single(annotation.text))
    }

    async fn extract_staged(
        &self,
        input: &Path,
        bucket: &str,
        mime_type: &str,
    ) -> Result<ExtractionResult> {
        let staged = StagedObject::fresh(bucket);

        self.staging
            .upload(input, &staged.object_id, &staged.bucket)
            .await
            .map_err(|source| ExtractError::StagingUploadFailed {
                bucket: staged.bucket.clone(),
                source,
            })?;

        let uri = staged.uri();
        let outcome = self.annotate_pages(&uri, mime_type).await;

        // Cleanup runs on every path and never replaces the outcome.
        if let Err(source) = self
            .staging
            .delete(&staged.object_id, &staged.bucket)
            .await
        {
            let err = ExtractError::StagingDeleteFailed { uri, source };
            warn!("{}", err);
        }

        outcome
    }

    /// Request one page at a time until the reported total is reached.
    ///
    /// Invariant: `result.len()` == pages fetched == next page requested - 1.
    /// The first response fixes the total; a later change is a protocol error,
    /// so the loop never issues more requests than that first total.
    async fn annotate_pages(&self, uri: &str, mime_type: &str) -> Result<ExtractionResult> {
        info!("Beginning PDF annotation of {}", uri);

        let mut result = ExtractionResult::new();
        let mut expected_total: Option<u32> = None;

        loop {
            let page = result.next_page();
            let annotation = self
                .ocr
                .detect_single_page(uri, mime_type, page)
                .await
                .map_err(|source| ExtractError::OcrRequestFailed { page, source })?;

            let reported = annotation.total_pages;
            let total = match expected_total {
                None => {
                    if reported == 0 {
                        return Err(ExtractError::EmptyDocument);
                    }
                    expected_total = Some(reported);
                    reported
                }
                Some(expected) if reported != expected => {
                    return Err(ExtractError::InconsistentPageCount {
                        page,
                        expected,
                        reported,
                    })
                }
                Some(expected) => expected,
            };

            debug!(
                "Annotated page {}/{} ({} chars)",
                page,
                total,
                annotation.text.len()
            );
            result.push_next(annotation.text);

            if result.len() as u32 >= total {
                break;
            }
        }

        info!("Done annotating {} pages.", result.len());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{ImageAnnotation, PageAnnotation};
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum StoreCall {
        Upload { object_id: String, bucket: String },
        Delete { object_id: String, bucket: String },
    }

    #[derive(Default)]
    struct FakeStore {
        calls: Mutex<Vec<StoreCall>>,
        fail_upload: bool,
        fail_delete: bool,
    }

    impl FakeStore {
        fn calls(&self) -> Vec<StoreCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl StagingStore for FakeStore {
        async fn upload(&self, _local_path: &Path, object_id: &str, bucket: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(StoreCall::Upload {
                object_id: object_id.to_string(),
                bucket: bucket.to_string(),
            });
            if self.fail_upload {
                anyhow::bail!("upload refused");
            }
            Ok(())
        }

        async fn delete(&self, object_id: &str, bucket: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(StoreCall::Delete {
                object_id: object_id.to_string(),
                bucket: bucket.to_string(),
            });
            if self.fail_delete {
                anyhow::bail!("delete refused");
            }
            Ok(())
        }
    }

    /// Scripted OCR: `pages[i]` answers the request for page `i + 1`.
    #[derive(Default)]
    struct FakeOcr {
        image_text: Option<String>,
        pages: Vec<anyhow::Result<PageAnnotation>>,
        page_requests: Mutex<Vec<(String, String, u32)>>,
        image_requests: Mutex<usize>,
    }

    impl FakeOcr {
        fn with_pages(total: u32, texts: &[&str]) -> Self {
            Self {
                pages: texts
                    .iter()
                    .map(|t| {
                        Ok(PageAnnotation {
                            text: t.to_string(),
                            total_pages: total,
                        })
                    })
                    .collect(),
                ..Self::default()
            }
        }

        fn requested_pages(&self) -> Vec<u32> {
            self.page_requests.lock().unwrap().iter().map(|r| r.2).collect()
        }

        fn network_calls(&self) -> usize {
            self.page_requests.lock().unwrap().len() + *self.image_requests.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl OcrService for FakeOcr {
        fn name(&self) -> &str {
            "fake"
        }

        async fn detect_whole_image(&self, _data: &[u8]) -> anyhow::Result<ImageAnnotation> {
            *self.image_requests.lock().unwrap() += 1;
            match &self.image_text {
                Some(text) => Ok(ImageAnnotation { text: text.clone() }),
                None => anyhow::bail!("vision unavailable"),
            }
        }

        async fn detect_single_page(
            &self,
            uri: &str,
            mime_type: &str,
            page: u32,
        ) -> anyhow::Result<PageAnnotation> {
            self.page_requests
                .lock()
                .unwrap()
                .push((uri.to_string(), mime_type.to_string(), page));
            match self.pages.get(page as usize - 1) {
                Some(Ok(annotation)) => Ok(annotation.clone()),
                Some(Err(e)) => anyhow::bail!("{}", e),
                None => anyhow::bail!("page {} out of range", page),
            }
        }
    }

    fn input_file(name: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.4 fake bytes").unwrap();
        (dir, path)
    }

    fn extractor(store: &Arc<FakeStore>, ocr: &Arc<FakeOcr>) -> Extractor {
        Extractor::new(store.clone(), ocr.clone())
    }

    fn texts(result: &ExtractionResult) -> Vec<(u32, &str)> {
        result.pages().iter().map(|p| (p.page, p.text.as_str())).collect()
    }

    #[test]
    fn test_resolve_paths() {
        let input = Path::new("doc.pdf");
        assert_eq!(
            ExtractionPath::resolve(input, Some("image/jpeg"), None).unwrap(),
            ExtractionPath::Direct
        );
        assert_eq!(
            ExtractionPath::resolve(input, Some(PDF_MIME_TYPE), Some("tmp")).unwrap(),
            ExtractionPath::Staged {
                bucket: "tmp".to_string(),
                mime_type: PDF_MIME_TYPE.to_string()
            }
        );
        assert!(matches!(
            ExtractionPath::resolve(input, None, Some("tmp")),
            Err(ExtractError::UnknownFormat { .. })
        ));
        assert!(matches!(
            ExtractionPath::resolve(input, Some(""), None),
            Err(ExtractError::UnknownFormat { .. })
        ));
        assert!(matches!(
            ExtractionPath::resolve(input, Some(PDF_MIME_TYPE), None),
            Err(ExtractError::MissingConfiguration)
        ));
        assert!(matches!(
            ExtractionPath::resolve(input, Some(PDF_MIME_TYPE), Some("  ")),
            Err(ExtractError::MissingConfiguration)
        ));
    }

    #[tokio::test]
    async fn test_single_image_is_page_one() {
        let (_dir, input) = input_file("photo.jpg");
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr {
            image_text: Some("Hello World".to_string()),
            ..FakeOcr::default()
        });

        let result = extractor(&store, &ocr)
            .extract(&input, Some("image/jpeg"), Some("ignored"))
            .await
            .unwrap();

        assert_eq!(texts(&result), vec![(1, "Hello World")]);
        assert!(store.calls().is_empty());
        assert_eq!(ocr.network_calls(), 1);
    }

    #[tokio::test]
    async fn test_single_image_without_text_is_empty_page() {
        let (_dir, input) = input_file("blank.png");
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr {
            image_text: Some(String::new()),
            ..FakeOcr::default()
        });

        let result = extractor(&store, &ocr)
            .extract(&input, Some("image/png"), None)
            .await
            .unwrap();
        assert_eq!(texts(&result), vec![(1, "")]);
    }

    #[tokio::test]
    async fn test_missing_input_file_is_io_error() {
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr::default());

        let err = extractor(&store, &ocr)
            .extract(Path::new("/nonexistent/photo.jpg"), Some("image/jpeg"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
        assert_eq!(ocr.network_calls(), 0);
    }

    #[tokio::test]
    async fn test_staged_pdf_pages_in_order() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr::with_pages(3, &["A", "B", "C"]));

        let result = extractor(&store, &ocr)
            .extract(&input, Some(PDF_MIME_TYPE), Some("tmp"))
            .await
            .unwrap();

        assert_eq!(texts(&result), vec![(1, "A"), (2, "B"), (3, "C")]);
        assert_eq!(ocr.requested_pages(), vec![1, 2, 3]);

        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        let (uploaded, deleted) = match (&calls[0], &calls[1]) {
            (
                StoreCall::Upload { object_id: up, bucket: b1 },
                StoreCall::Delete { object_id: del, bucket: b2 },
            ) => {
                assert_eq!(b1, "tmp");
                assert_eq!(b2, "tmp");
                (up.clone(), del.clone())
            }
            other => panic!("unexpected store calls: {:?}", other),
        };
        assert_eq!(uploaded, deleted);

        let requests = ocr.page_requests.lock().unwrap();
        for (uri, mime, _) in requests.iter() {
            assert_eq!(uri, &format!("gs://tmp/{}", uploaded));
            assert_eq!(mime, PDF_MIME_TYPE);
        }
    }

    #[tokio::test]
    async fn test_ocr_failure_still_deletes() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr {
            pages: vec![
                Ok(PageAnnotation {
                    text: "A".to_string(),
                    total_pages: 3,
                }),
                Err(anyhow::anyhow!("503 Service Unavailable")),
            ],
            ..FakeOcr::default()
        });

        let err = extractor(&store, &ocr)
            .extract(&input, Some(PDF_MIME_TYPE), Some("tmp"))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::OcrRequestFailed { page: 2, .. }));
        assert_eq!(ocr.requested_pages(), vec![1, 2]);
        let calls = store.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[1], StoreCall::Delete { .. }));
    }

    #[tokio::test]
    async fn test_upload_failure_skips_ocr_and_delete() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore {
            fail_upload: true,
            ..FakeStore::default()
        });
        let ocr = Arc::new(FakeOcr::with_pages(1, &["A"]));

        let err = extractor(&store, &ocr)
            .extract(&input, Some(PDF_MIME_TYPE), Some("tmp"))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::StagingUploadFailed { .. }));
        assert_eq!(ocr.network_calls(), 0);
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_mask_success() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore {
            fail_delete: true,
            ..FakeStore::default()
        });
        let ocr = Arc::new(FakeOcr::with_pages(2, &["A", "B"]));

        let result = extractor(&store, &ocr)
            .extract(&input, Some(PDF_MIME_TYPE), Some("tmp"))
            .await
            .unwrap();
        assert_eq!(texts(&result), vec![(1, "A"), (2, "B")]);
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_mask_ocr_error() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore {
            fail_delete: true,
            ..FakeStore::default()
        });
        let ocr = Arc::new(FakeOcr {
            pages: vec![Err(anyhow::anyhow!("quota exceeded"))],
            ..FakeOcr::default()
        });

        let err = extractor(&store, &ocr)
            .extract(&input, Some(PDF_MIME_TYPE), Some("tmp"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::OcrRequestFailed { page: 1, .. }));
    }

    #[tokio::test]
    async fn test_changed_total_is_inconsistent() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr {
            pages: vec![
                Ok(PageAnnotation {
                    text: "A".to_string(),
                    total_pages: 2,
                }),
                Ok(PageAnnotation {
                    text: "B".to_string(),
                    total_pages: 5,
                }),
            ],
            ..FakeOcr::default()
        });

        let err = extractor(&store, &ocr)
            .extract(&input, Some(PDF_MIME_TYPE), Some("tmp"))
            .await
            .unwrap_err();

        match err {
            ExtractError::InconsistentPageCount {
                page,
                expected,
                reported,
            } => assert_eq!((page, expected, reported), (2, 2, 5)),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_zero_total_is_empty_document() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr::with_pages(0, &[""]));

        let err = extractor(&store, &ocr)
            .extract(&input, Some(PDF_MIME_TYPE), Some("tmp"))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::EmptyDocument));
        assert_eq!(ocr.requested_pages(), vec![1]);
        assert!(matches!(store.calls()[1], StoreCall::Delete { .. }));
    }

    #[tokio::test]
    async fn test_unknown_and_missing_bucket_make_no_calls() {
        let (_dir, input) = input_file("doc.pdf");
        let store = Arc::new(FakeStore::default());
        let ocr = Arc::new(FakeOcr::with_pages(1, &["A"]));
        let extractor = extractor(&store, &ocr);

        let err = extractor.extract(&input, None, Some("tmp")).await.unwrap_err();
        assert_eq!(err.exit_code(), 1);

        let err = extractor
            .extract(&input, Some(PDF_MIME_TYPE), None)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        assert!(store.calls().is_empty());
        assert_eq!(ocr.network_calls(), 0);
    }
}
