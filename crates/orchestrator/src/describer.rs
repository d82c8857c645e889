//! Builds per-attachment descriptions: extract text once per file, then ask
//! the model to describe each attachment from its text and pixels. Failures
//! degrade to empty descriptions, never abort the message.

use std::collections::HashMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use claim_llm::{ContentBlock, SchemaSpec};

use crate::engine::Orchestrator;
use crate::error::Result;
use crate::extract::extension;

const ATTACHMENT_INSTRUCTION: &str = "\
You are the Attachment Details Assistant.
For each attachment, combine any provided OCR / extracted text and the visual
content to craft a concise, vivid description. Return exactly one JSON object
that matches the schema.";

const OCR_TEXT_LIMIT: usize = 1_000;

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

fn attachment_schema() -> SchemaSpec {
    SchemaSpec::new(
        "ATTACHMENT_DETAILS",
        json!({
            "type": "object",
            "properties": {
                "attachment_details": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "details": { "type": "string" }
                        },
                        "required": ["name", "details"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["attachment_details"],
            "additionalProperties": false
        }),
    )
}

impl Orchestrator {
    pub(crate) async fn describe_attachments(
        &self,
        claim_id: &str,
        filenames: &[String],
    ) -> Result<()> {
        // Extraction happens once per filename; replaced files aside, a
        // parsed doc is never recomputed.
        let already_parsed = self.store.load_parsed_docs(claim_id).await?;
        for filename in filenames {
            if already_parsed.contains_key(filename) {
                continue;
            }
            let path = self.store.attachment_path(claim_id, filename);
            let text = self.extractor.extract(&path).await;
            self.store.record_parsed_doc(claim_id, filename, &text).await?;
        }
        let parsed = self.store.load_parsed_docs(claim_id).await?;

        let mut blocks = Vec::new();
        for filename in filenames {
            let Some(doc) = parsed.get(filename) else { continue };
            let text = doc.text.trim();
            if !text.is_empty() {
                let truncated: String = text.chars().take(OCR_TEXT_LIMIT).collect();
                blocks.push(ContentBlock::text(format!("{filename} OCR:\n{truncated}")));
            }
        }
        for filename in filenames {
            let path = self.store.attachment_path(claim_id, filename);
            let ext = extension(filename);
            if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                if let Some(url) = encode_image(&path, &ext).await {
                    blocks.push(ContentBlock::image(url));
                }
            } else if ext == "pdf" {
                for url in self.extractor.page_images(&path).await {
                    blocks.push(ContentBlock::image(url));
                }
            }
        }

        let mut details: HashMap<String, String> = filenames
            .iter()
            .map(|filename| (filename.clone(), String::new()))
            .collect();

        if !blocks.is_empty() {
            match self
                .model
                .respond(ATTACHMENT_INSTRUCTION, blocks, &attachment_schema())
                .await
            {
                Ok(reply) => {
                    if let Some(items) = reply["attachment_details"].as_array() {
                        for item in items {
                            let (Some(name), Some(text)) =
                                (item["name"].as_str(), item["details"].as_str())
                            else {
                                continue;
                            };
                            details.insert(name.to_string(), text.to_string());
                        }
                    }
                }
                Err(err) => {
                    log::warn!("[{claim_id}] attachment description failed: {err}");
                }
            }
        }

        self.store.write_attachment_descriptions(claim_id, details).await?;
        Ok(())
    }
}

async fn encode_image(path: &Path, ext: &str) -> Option<String> {
    let bytes = tokio::fs::read(path).await.ok()?;
    let mime = if ext == "jpg" { "jpeg" } else { ext };
    Some(format!("data:image/{mime};base64,{}", BASE64.encode(bytes)))
}
