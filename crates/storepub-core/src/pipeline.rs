//! Publish pipeline: upload → notify → poll → release.
//!
//! Only the poll step loops. Upload, notify and release are single-shot:
//! the store gives no idempotency guarantee for them, so a failure is
//! reported instead of repeated.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{HttpFailure, StoreClient};
use crate::config::PollConfig;
use crate::error::{PublishError, PublishResult};
use crate::types::{
    ChannelMap, NotifyResponse, PresentableCredential, PublishOutcome, PublishRequest,
    ReleaseResponse, Revision, UploadId, UploadRecord, UploadResponse, UploadedArtifact,
};

const UPLOAD_PATH: &str = "unscanned-upload/";
const NOTIFY_PATH: &str = "dev/api/snap-push/";
const RELEASE_PATH: &str = "dev/api/snap-release/";

/// Drives one publish run against a [`StoreClient`].
#[derive(Debug, Clone)]
pub struct Publisher<'a> {
    client: &'a StoreClient,
    poll: PollConfig,
}

#[derive(Serialize)]
struct NotifyRequest<'a> {
    name: &'a str,
    series: &'a str,
    updown_id: &'a str,
    binary_filesize: u64,
    source_uploaded: bool,
}

#[derive(Serialize)]
struct ReleaseRequest<'a> {
    name: &'a str,
    revision: String,
    channels: &'a [String],
    series: &'a str,
}

impl<'a> Publisher<'a> {
    pub fn new(client: &'a StoreClient, poll: PollConfig) -> Self {
        Self { client, poll }
    }

    /// Full run. Returns the assigned revision and the resulting channel map.
    pub async fn publish(
        &self,
        request: &PublishRequest,
        credential: &PresentableCredential,
        cancel: &CancellationToken,
    ) -> PublishResult<PublishOutcome> {
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        let artifact = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            uploaded = self.upload(&request.artifact) => uploaded?,
        };
        // Nothing is registered yet, so stopping here leaves no trace in the store.
        if cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        let status_url = self
            .notify(&artifact, credential, &request.name, &request.series)
            .await?;
        let revision = self.poll(&status_url, credential, cancel).await?;
        let (channel_map, opened_channels) = self
            .release_detailed(
                revision,
                credential,
                &request.name,
                &request.series,
                &request.channels,
            )
            .await?;

        info!(name = %request.name, revision, "publish complete");
        Ok(PublishOutcome {
            revision,
            channel_map,
            opened_channels,
        })
    }

    /// Stream the artifact to the upload server.
    pub async fn upload(&self, artifact: &Path) -> PublishResult<UploadedArtifact> {
        let read_failed = |e: std::io::Error| PublishError::UploadFailed {
            message: format!("failed to read {}: {}", artifact.display(), e),
        };
        let file = tokio::fs::File::open(artifact).await.map_err(read_failed)?;
        let binary_filesize = file.metadata().await.map_err(read_failed)?.len();
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());

        info!(file = %file_name, bytes = binary_filesize, "uploading");
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = reqwest::multipart::Part::stream_with_length(body, binary_filesize)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| PublishError::UploadFailed {
                message: e.to_string(),
            })?;
        let form = reqwest::multipart::Form::new().part("binary", part);

        let url = self.client.upload_url(UPLOAD_PATH);
        let response: UploadResponse = self
            .client
            .http
            .post_multipart(&url, form)
            .await
            .map_err(|f| PublishError::UploadFailed {
                message: f.to_string(),
            })?;

        match response.upload_id {
            Some(id) if response.successful => {
                debug!(upload_id = %id, "upload accepted");
                Ok(UploadedArtifact {
                    upload_id: UploadId(id),
                    binary_filesize,
                })
            }
            _ => Err(PublishError::UploadFailed {
                message: "upload server did not report success".to_string(),
            }),
        }
    }

    /// Register the upload under `name`/`series`. Returns the status URL.
    pub async fn notify(
        &self,
        artifact: &UploadedArtifact,
        credential: &PresentableCredential,
        name: &str,
        series: &str,
    ) -> PublishResult<String> {
        let url = self.client.dashboard_url(NOTIFY_PATH);
        let body = NotifyRequest {
            name,
            series,
            updown_id: &artifact.upload_id.0,
            binary_filesize: artifact.binary_filesize,
            source_uploaded: false,
        };

        let response: NotifyResponse = self
            .client
            .http
            .post_json(&url, &body, Some(credential))
            .await
            .map_err(|f| step_failure(f, "upload registration", |message| {
                PublishError::NotifyFailed { message }
            }))?;

        debug!(status_url = %response.status_details_url, "upload registered");
        Ok(response.status_details_url)
    }

    /// Poll `status_url` until a revision is assigned.
    ///
    /// Fixed interval, at most `max_attempts` requests. Cancellation is
    /// checked before each attempt and interrupts the sleep between them.
    pub async fn poll(
        &self,
        status_url: &str,
        credential: &PresentableCredential,
        cancel: &CancellationToken,
    ) -> PublishResult<Revision> {
        let started = Instant::now();
        let mut last_status = "no response".to_string();

        for attempt in 1..=self.poll.max_attempts {
            if cancel.is_cancelled() {
                return Err(PublishError::Cancelled);
            }

            match self.fetch_status(status_url, credential).await? {
                Some(record) => {
                    debug!(attempt, status = %record.summary(), "status");
                    match interpret(&record)? {
                        Some(revision) => {
                            info!(revision, attempt, "revision assigned");
                            return Ok(revision);
                        }
                        None => last_status = record.summary(),
                    }
                }
                None => last_status = "status request failed".to_string(),
            }

            if attempt < self.poll.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                    _ = tokio::time::sleep(self.poll.interval) => {}
                }
            }
        }

        Err(PublishError::PollingTimeout {
            attempts: self.poll.max_attempts,
            elapsed: started.elapsed(),
            last_status,
        })
    }

    /// One status request. `Ok(None)` when the attempt failed transiently.
    async fn fetch_status(
        &self,
        status_url: &str,
        credential: &PresentableCredential,
    ) -> PublishResult<Option<UploadRecord>> {
        match self
            .client
            .http
            .get_json::<UploadRecord>(status_url, Some(credential))
            .await
        {
            Ok(record) => Ok(Some(record)),
            Err(f) if f.is_transient() => {
                warn!(error = %f, "status request failed, will retry");
                Ok(None)
            }
            Err(f) => Err(step_failure(f, "status check", |message| {
                PublishError::StatusCheckFailed { message }
            })),
        }
    }

    /// Release `revision` to `channels`.
    pub async fn release(
        &self,
        revision: Revision,
        credential: &PresentableCredential,
        name: &str,
        series: &str,
        channels: &[String],
    ) -> PublishResult<ChannelMap> {
        self.release_detailed(revision, credential, name, series, channels)
            .await
            .map(|(map, _)| map)
    }

    async fn release_detailed(
        &self,
        revision: Revision,
        credential: &PresentableCredential,
        name: &str,
        series: &str,
        channels: &[String],
    ) -> PublishResult<(ChannelMap, Vec<String>)> {
        let url = self.client.dashboard_url(RELEASE_PATH);
        let body = ReleaseRequest {
            name,
            revision: revision.to_string(),
            channels,
            series,
        };

        let response: ReleaseResponse = self
            .client
            .http
            .post_json(&url, &body, Some(credential))
            .await
            .map_err(|f| step_failure(f, "release", |message| PublishError::ReleaseFailed {
                message,
            }))?;

        if !response.success {
            let message = if response.errors.is_empty() {
                "store did not report success".to_string()
            } else {
                response
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(PublishError::ReleaseFailed { message });
        }

        info!(revision, channels = ?channels, "released");
        Ok((response.channel_map, response.opened_channels))
    }
}

/// `Some(revision)` when releasable, `None` while processing, error on rejection.
fn interpret(record: &UploadRecord) -> PublishResult<Option<Revision>> {
    if !record.processed {
        return Ok(None);
    }
    if !record.can_release {
        return Err(PublishError::NotReleasable {
            message: record.error_text(),
        });
    }
    record
        .revision
        .map(Some)
        .ok_or_else(|| PublishError::StatusCheckFailed {
            message: "store reported a releasable upload without a revision".to_string(),
        })
}

fn step_failure(
    failure: HttpFailure,
    step: &'static str,
    otherwise: impl FnOnce(String) -> PublishError,
) -> PublishError {
    if failure.is_unauthorized() {
        PublishError::CredentialRejected { step }
    } else {
        otherwise(failure.to_string())
    }
}
