use std::future::Future;
use std::path::Path;

use reqwest::multipart::{Form, Part};

use crate::{GrobidConfig, GrobidError};

/// HTTP client for one GROBID server.
#[derive(Debug, Clone)]
pub struct GrobidClient {
    config: GrobidConfig,
    client: reqwest::Client,
}

fn transport(e: reqwest::Error) -> GrobidError {
    GrobidError::Transport(e.to_string())
}

fn flag(on: bool) -> &'static str {
    if on { "1" } else { "0" }
}

impl GrobidClient {
    pub fn new(config: GrobidConfig) -> Result<Self, GrobidError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("verrific/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &GrobidConfig {
        &self.config
    }

    fn endpoint(&self, service: &str) -> String {
        format!("{}/api/{}", self.config.url.trim_end_matches('/'), service)
    }

    /// Run `op` up to `max_attempts` times, waiting `retry_wait` between
    /// attempts. Only transient errors are retried.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, GrobidError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GrobidError>>,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        what,
                        attempt,
                        attempts,
                        error = %e,
                        "GROBID request failed, retrying in {:.1}s",
                        self.config.retry_wait.as_secs_f64()
                    );
                    tokio::time::sleep(self.config.retry_wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll `<url>/api/isalive` until the server answers.
    pub async fn check_alive(&self) -> Result<(), GrobidError> {
        let url = self.endpoint("isalive");
        let (url, client) = (&url, &self.client);

        self.with_retry("isalive", move || async move {
            let resp = client.get(url.as_str()).send().await.map_err(transport)?;
            let status = resp.status();
            if !status.is_success() {
                return Err(GrobidError::Status(status.as_u16()));
            }
            Ok(())
        })
        .await
        .map_err(|e| GrobidError::Unavailable {
            url: self.config.url.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(url = %self.config.url, "GROBID server is alive");
        Ok(())
    }

    fn form(&self) -> Form {
        Form::new()
            .text("start", self.config.start.to_string())
            .text("end", self.config.end.to_string())
            .text("consolidateCitations", flag(self.config.consolidate_citations))
            .text("consolidateHeader", flag(self.config.consolidate_header))
            .text("consolidateFunders", flag(self.config.consolidate_funders))
            .text("includeRawCitations", "1")
    }

    /// Upload `pdf` to `processFulltextDocument` and return the TEI body.
    ///
    /// Raw citation strings are always requested so that every extracted
    /// reference keeps its original text.
    pub async fn process_pdf(&self, pdf: &Path) -> Result<Vec<u8>, GrobidError> {
        if !pdf.is_file() {
            return Err(GrobidError::NotFound(pdf.to_path_buf()));
        }
        let data = tokio::fs::read(pdf).await.map_err(|source| GrobidError::Io {
            path: pdf.to_path_buf(),
            source,
        })?;
        let file_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.pdf".to_string());

        let url = self.endpoint("processFulltextDocument");
        let (url, data, file_name) = (&url, &data, &file_name);

        let body = self
            .with_retry("processFulltextDocument", move || async move {
                let part = Part::bytes(data.clone())
                    .file_name(file_name.clone())
                    .mime_str("application/pdf")
                    .map_err(transport)?;
                let resp = self
                    .client
                    .post(url.as_str())
                    .multipart(self.form().part("input", part))
                    .send()
                    .await
                    .map_err(transport)?;

                let status = resp.status();
                if !status.is_success() {
                    return Err(GrobidError::Status(status.as_u16()));
                }
                resp.bytes().await.map(|b| b.to_vec()).map_err(transport)
            })
            .await?;

        tracing::info!(pdf = %pdf.display(), bytes = body.len(), "converted PDF to TEI");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let client = GrobidClient::new(GrobidConfig {
            url: "http://grobid:8070/".into(),
            ..GrobidConfig::default()
        })
        .unwrap();
        assert_eq!(client.endpoint("isalive"), "http://grobid:8070/api/isalive");
    }

    #[tokio::test]
    async fn missing_pdf_is_not_found() {
        let client = GrobidClient::new(GrobidConfig::default()).unwrap();
        let err = client
            .process_pdf(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, GrobidError::NotFound(_)));
    }
}
