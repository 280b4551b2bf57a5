//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the pipeline
//! without making real model or network calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult, PipelineError, Result};
use crate::traits::{
    fetcher::{FetchedPage, PageFetcher},
    model::LanguageModel,
};

#[derive(Debug, Clone)]
enum ScriptedReply {
    Text(String),
    Error(String),
}

/// A mock language model for testing.
///
/// Replies are scripted in order; every prompt is recorded so tests can
/// assert how many calls a run made and what they contained. Clones share
/// the same script and call history.
///
/// # Example
///
/// ```rust,ignore
/// let model = MockModel::new()
///     .with_response(r#"{"client_name": "ACME"}"#)
///     .with_error("timeout");
/// ```
#[derive(Clone, Default)]
pub struct MockModel {
    replies: Arc<RwLock<VecDeque<ScriptedReply>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockModel {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.replies
            .write()
            .unwrap()
            .push_back(ScriptedReply::Text(response.into()));
        self
    }

    /// Queue a JSON reply.
    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.with_response(value.to_string())
    }

    /// Queue a failed call (timeout, network error...).
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.replies
            .write()
            .unwrap()
            .push_back(ScriptedReply::Error(message.into()));
        self
    }

    /// Every prompt submitted so far, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.read().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn submit(&self, prompt: &str) -> Result<String> {
        self.calls.write().unwrap().push(prompt.to_string());

        match self.replies.write().unwrap().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Error(message)) => Err(PipelineError::Model(message.into())),
            None => Err(PipelineError::Model("mock model has no scripted reply".into())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock page fetcher for testing.
///
/// Serves canned pages by URL; unknown or failing URLs return an HTTP
/// error.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, FetchedPage>>>,
    fail_urls: Arc<RwLock<Vec<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page to serve.
    pub fn with_page(self, page: FetchedPage) -> Self {
        self.pages.write().unwrap().insert(page.url.clone(), page);
        self
    }

    /// Configure a URL to fail.
    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.fail_urls.write().unwrap().push(url.into());
        self
    }

    /// URLs requested so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        if self.fail_urls.read().unwrap().iter().any(|u| u == url) {
            return Err(FetchError::Http(format!("mock failure for {url}").into()));
        }

        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Http(format!("no mock page for {url}").into()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Build a PDF with one page per entry; an empty entry is a blank page.
pub fn pdf_bytes(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let operations = if text.is_empty() {
                vec![]
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(12)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            Object::Reference(doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            }))
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => Object::Integer(kids.len() as i64),
            "Kids" => kids,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Build a DOCX with one paragraph per entry; an empty entry is a blank paragraph.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| {
            if p.is_empty() {
                "<w:p/>".to_string()
            } else {
                let escaped = p.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;");
                format!("<w:p><w:r><w:t>{escaped}</w:t></w:r></w:p>")
            }
        })
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_model_replays_script_in_order() {
        let model = MockModel::new().with_response("first").with_error("boom");

        assert_eq!(model.submit("p1").await.unwrap(), "first");
        assert!(matches!(model.submit("p2").await, Err(PipelineError::Model(_))));
        assert!(model.submit("p3").await.is_err());
        assert_eq!(model.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn test_mock_model_clones_share_history() {
        let model = MockModel::new().with_response("ok");
        let handle = model.clone();
        handle.submit("hello").await.unwrap();
        assert_eq!(model.call_count(), 1);
        assert_eq!(model.remaining(), 0);
    }

    #[tokio::test]
    async fn test_mock_fetcher() {
        let fetcher = MockFetcher::new()
            .with_page(FetchedPage::new("https://a.test", "body"))
            .fail_url("https://b.test");

        assert_eq!(fetcher.fetch("https://a.test").await.unwrap().body, "body");
        assert!(fetcher.fetch("https://b.test").await.is_err());
        assert!(fetcher.fetch("https://c.test").await.is_err());
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[test]
    fn test_fixture_documents_load() {
        let pdf = lopdf::Document::load_mem(&pdf_bytes(&["one", "", "three"])).unwrap();
        assert_eq!(pdf.get_pages().len(), 3);

        let docx = docx_bytes(&["a & b", ""]);
        assert!(zip::ZipArchive::new(Cursor::new(docx)).is_ok());
    }
}
