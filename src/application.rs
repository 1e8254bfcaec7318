// src/application.rs
//! Job applications: cover letter from a text template, delivery through an HTTP mail relay

use crate::core::FsOps;
use crate::types::JobRecord;
use crate::utils::normalize_file_name;
use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const SEND_ENDPOINT: &str = "/send";

/// Replace every `{{key}}` placeholder with its value
pub fn process_variables(content: &str, vars: &HashMap<String, String>) -> String {
    vars.iter().fold(content.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{{{}}}}}", key), value)
    })
}

pub struct CoverLetter {
    template_path: PathBuf,
    output_dir: PathBuf,
    sender_name: String,
}

impl CoverLetter {
    pub fn new(template_path: PathBuf, output_dir: PathBuf, sender_name: String) -> Self {
        Self {
            template_path,
            output_dir,
            sender_name,
        }
    }

    pub fn render(&self, template: &str, job_title: &str) -> String {
        let mut variables = HashMap::new();
        variables.insert("job_title".to_string(), job_title.to_string());
        variables.insert("sender_name".to_string(), self.sender_name.clone());
        process_variables(template, &variables)
    }

    /// Write the letter for `job_title` into the output directory
    pub async fn render_to_file(&self, job_title: &str) -> Result<PathBuf> {
        let template = FsOps::read_file_safe(&self.template_path)
            .await
            .context("Failed to read cover letter template")?;

        let output_path = self
            .output_dir
            .join(format!("anschreiben_{}.txt", normalize_file_name(job_title)));
        FsOps::write_file_atomic(&output_path, &self.render(&template, job_title)).await?;

        info!("Cover letter written to {}", output_path.display());
        Ok(output_path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl ApplicationEmail {
    pub fn new(to: &str, job_title: &str, sender_name: &str, attachments: Vec<PathBuf>) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Bewerbung: {}", job_title),
            body: format!(
                "Sehr geehrte Damen und Herren,\n\nhiermit bewerbe ich mich auf die Stelle '{}'.\nIm Anhang finden Sie meine Unterlagen.\n\nMit freundlichen Grüßen\n{}",
                job_title, sender_name
            ),
            attachments,
        }
    }
}

/// Client of the mail relay service that performs the SMTP delivery.
pub struct MailRelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl MailRelayClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn send(&self, email: &ApplicationEmail) -> Result<()> {
        let url = format!("{}{}", self.base_url, SEND_ENDPOINT);

        let mut form = Form::new()
            .text("to", email.to.clone())
            .text("subject", email.subject.clone())
            .text("body", email.body.clone());

        for path in &email.attachments {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("attachment")
                .to_string();
            let content = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read attachment: {}", path.display()))?;

            form = form.part(
                "attachments",
                Part::bytes(content)
                    .file_name(file_name.clone())
                    .mime_str(content_type(&file_name))
                    .context("Failed to create multipart")?,
            );
        }

        info!("Sending application to {} via mail relay", email.to);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Failed to call mail relay")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Mail relay error response: {}", error_text);
            anyhow::bail!("Mail relay returned error status {}: {}", status, error_text);
        }

        info!("Application sent to {}", email.to);
        Ok(())
    }
}

fn content_type(file_name: &str) -> &'static str {
    match Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Everything the Apply action needs.
pub struct ApplicationService {
    cover_letter: CoverLetter,
    documents: Vec<PathBuf>,
    sender_name: String,
    mailer: Option<MailRelayClient>,
}

impl ApplicationService {
    pub fn new(
        cover_letter: CoverLetter,
        documents: Vec<PathBuf>,
        sender_name: String,
        mailer: Option<MailRelayClient>,
    ) -> Self {
        Self {
            cover_letter,
            documents,
            sender_name,
            mailer,
        }
    }

    /// Assemble the attachments: existing documents, then the cover letter if it could be rendered
    pub async fn prepare(&self, job: &JobRecord, to: &str) -> ApplicationEmail {
        let mut attachments: Vec<PathBuf> = self
            .documents
            .iter()
            .filter(|path| path.exists())
            .cloned()
            .collect();

        match self.cover_letter.render_to_file(&job.title).await {
            Ok(letter) => attachments.push(letter),
            Err(e) => warn!("Sending application without cover letter: {:#}", e),
        }

        ApplicationEmail::new(to, &job.title, &self.sender_name, attachments)
    }

    pub async fn apply(&self, job: &JobRecord, to: &str) -> Result<()> {
        let mailer = self
            .mailer
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No mail relay configured"))?;

        let email = self.prepare(job, to).await;
        mailer.send(&email).await
    }
}
