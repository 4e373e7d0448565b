use std::sync::Arc;

use tracing::info;

use wd_core::models::{Article, JobError};
use wd_core::retry::{retry_with_backoff, MAX_ATTEMPTS, RETRY_DELAYS};
use wd_core::{Error, Result};

use crate::mailer::Mailer;

const FOOTER: &str = "Delivered automatically by the web digest pipeline.";

/// The deliver stage: renders and sends the digest, the empty notice and
/// the failure notice. Every send funnels through one retrying primitive.
pub struct DeliveryService {
    mailer: Arc<dyn Mailer>,
}

impl DeliveryService {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Send the day's digest. Fails fast on an empty article list.
    pub async fn send_digest(&self, recipient: &str, articles: &[Article]) -> Result<()> {
        if articles.is_empty() {
            return Err(Error::Delivery("no articles to send".into()));
        }
        let subject = format!("Daily article digest ({} articles)", articles.len());
        self.send_with_retry(recipient, &subject, &digest_body(articles))
            .await
    }

    /// Static notice sent when a run collected nothing and the settings ask
    /// for a notification.
    pub async fn send_empty_notice(&self, recipient: &str) -> Result<()> {
        self.send_with_retry(
            recipient,
            "Daily article digest (no new articles today)",
            &empty_notice_body(),
        )
        .await
    }

    /// One block per error, subject carrying the count.
    pub async fn send_failure_notice(&self, recipient: &str, errors: &[JobError]) -> Result<()> {
        let subject = format!("Digest job error report ({} errors)", errors.len());
        self.send_with_retry(recipient, &subject, &failure_notice_body(errors))
            .await
    }

    async fn send_with_retry(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        // Missing credentials is a configuration error, not a transient
        // failure; return it before the retry loop.
        self.mailer.check_configured()?;
        retry_with_backoff(MAX_ATTEMPTS, &RETRY_DELAYS, |attempt| {
            info!(to, subject, attempt, "sending email");
            self.mailer.send(to, subject, body)
        })
        .await
    }
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

fn page(title_color: &str, heading: &str, inner: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"></head>\n<body style=\"font-family: sans-serif; line-height: 1.6; color: #333;\">\n\
         <h1 style=\"color: {color}; border-bottom: 2px solid {color}; padding-bottom: 8px;\">{heading}</h1>\n\
         {inner}\n\
         <hr style=\"margin-top: 32px; border: none; border-top: 1px solid #e0e0e0;\">\n\
         <p style=\"color: #999; font-size: 12px;\">{footer}</p>\n\
         </body>\n</html>",
        color = title_color,
        heading = heading,
        inner = inner,
        footer = FOOTER,
    )
}

fn digest_body(articles: &[Article]) -> String {
    let items: String = articles
        .iter()
        .map(|article| {
            format!(
                "<div style=\"margin-bottom: 24px; padding-bottom: 16px; border-bottom: 1px solid #e0e0e0;\">\n\
                 <h2 style=\"margin: 0 0 8px 0; font-size: 18px;\">{}</h2>\n\
                 <p style=\"margin: 8px 0; color: #666;\">{}</p>\n\
                 <p style=\"margin: 8px 0;\"><a href=\"{}\">{}</a></p>\n\
                 </div>",
                escape_html(article.title.as_deref().unwrap_or("Untitled")),
                escape_html(article.summary.as_deref().unwrap_or("(no summary)")),
                escape_html(&article.url),
                escape_html(&article.url),
            )
        })
        .collect();
    let intro = format!(
        "<p style=\"color: #666;\">Articles collected today ({}).</p>",
        articles.len()
    );
    page("#1976d2", "Daily article digest", &format!("{}\n{}", intro, items))
}

fn empty_notice_body() -> String {
    page(
        "#1976d2",
        "Daily article digest",
        "<p style=\"color: #666;\">No new articles were collected today.</p>",
    )
}

fn failure_notice_body(errors: &[JobError]) -> String {
    let items: String = errors
        .iter()
        .map(|error| {
            let mut block = format!(
                "<div style=\"margin-bottom: 16px; padding: 12px; background-color: #fff3cd; border-left: 4px solid #ffc107;\">\n\
                 <p style=\"margin: 0 0 4px 0; font-weight: bold;\">Error type: {:?}</p>\n",
                error.kind
            );
            if let Some(source_url) = &error.source_url {
                block.push_str(&format!(
                    "<p style=\"margin: 4px 0;\">Source: <a href=\"{0}\">{0}</a></p>\n",
                    escape_html(source_url)
                ));
            }
            if let Some(article_url) = &error.article_url {
                block.push_str(&format!(
                    "<p style=\"margin: 4px 0;\">Article: <a href=\"{0}\">{0}</a></p>\n",
                    escape_html(article_url)
                ));
            }
            block.push_str(&format!(
                "<p style=\"margin: 4px 0 0 0;\">{}</p>\n</div>",
                escape_html(&error.message)
            ));
            block
        })
        .collect();
    let intro = format!(
        "<p style=\"color: #666;\">{} errors occurred during today's job run.</p>",
        errors.len()
    );
    page("#d32f2f", "Digest job error report", &format!("{}\n{}", intro, items))
}
